use std::thread::{self, JoinHandle};
use std::time::Duration;

use comboflow_core::InputEvent;
use crossbeam_channel::Sender;
use tracing::{error, warn};

use crate::events::classify;

const MAX_RETRIES: u32 = 5;

/// Start the global keystroke listener.
///
/// The rdev callback only classifies the event and pushes it into the
/// queue; all matching work happens on the consumer side so the OS hook
/// returns immediately and no event is ever dropped.
///
/// The spawned thread lives for the rest of the process: `rdev::listen`
/// has no shutdown mechanism, so it is simply detached when the queue
/// receiver goes away.
pub fn start_keyboard_listener(events: Sender<InputEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        let callback = move |event: rdev::Event| {
            if let Some(classified) = classify(&event) {
                // Send failure means the runtime is gone; nothing to do.
                let _ = events.send(classified);
            }
        };

        let mut retry_count = 0;
        while retry_count < MAX_RETRIES {
            match rdev::listen(callback.clone()) {
                Ok(()) => break,
                Err(err) => {
                    retry_count += 1;
                    warn!(
                        ?err,
                        retry = retry_count,
                        max = MAX_RETRIES,
                        "keyboard listener failed, retrying"
                    );
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
        if retry_count >= MAX_RETRIES {
            error!("failed to start keyboard listener after {MAX_RETRIES} attempts");
        }
    })
}
