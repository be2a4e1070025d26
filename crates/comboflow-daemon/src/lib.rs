pub mod events;
pub mod listener;
pub mod runtime;

pub use events::classify;
pub use listener::start_keyboard_listener;
pub use runtime::{Runtime, RuntimeHandle};

use tracing_subscriber::EnvFilter;

/// Install a tracing subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
