use std::thread;
use std::time::Duration;

use arboard::Clipboard;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use crate::error::InjectionError;

const CHUNK_SIZE: usize = 512;
const PASTE_SETTLE: Duration = Duration::from_millis(100);

/// OS-level output primitives the substitution executor drives.
///
/// `paste_via_clipboard` owns the whole save/set/paste/restore dance so
/// callers only pick a strategy.
pub trait InputInjector: Send {
    fn simulate_keystrokes(&mut self, text: &str, delay: Duration) -> Result<(), InjectionError>;
    fn simulate_backspaces(&mut self, count: usize) -> Result<(), InjectionError>;
    fn simulate_left_arrows(&mut self, count: usize) -> Result<(), InjectionError>;
    fn paste_via_clipboard(&mut self, text: &str) -> Result<(), InjectionError>;
}

/// Injector backed by enigo's synthetic keyboard events.
pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> Result<Self, InjectionError> {
        let settings = Settings::default();
        match Enigo::new(&settings) {
            Ok(enigo) => Ok(Self { enigo }),
            Err(err) => Err(InjectionError(format!(
                "failed to create keyboard controller: {}",
                err
            ))),
        }
    }

    fn click(&mut self, key: Key) -> Result<(), InjectionError> {
        self.enigo
            .key(key, Direction::Click)
            .map_err(|err| InjectionError(format!("failed to press key: {}", err)))
    }

    fn type_chunked(&mut self, line: &str) -> Result<(), InjectionError> {
        // Chunk long lines to avoid overwhelming the keyboard buffer.
        for chunk in line.chars().collect::<Vec<_>>().chunks(CHUNK_SIZE) {
            let chunk: String = chunk.iter().collect();
            self.enigo
                .text(&chunk)
                .map_err(|err| InjectionError(format!("failed to type text: {}", err)))?;
            thread::sleep(Duration::from_millis(20));
        }
        Ok(())
    }
}

impl InputInjector for EnigoInjector {
    fn simulate_keystrokes(&mut self, text: &str, delay: Duration) -> Result<(), InjectionError> {
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.click(Key::Return)?;
                thread::sleep(Duration::from_millis(15));
            }
            if delay.is_zero() {
                if !line.is_empty() {
                    self.type_chunked(line)?;
                }
            } else {
                for c in line.chars() {
                    self.enigo
                        .text(&c.to_string())
                        .map_err(|err| InjectionError(format!("failed to type text: {}", err)))?;
                    thread::sleep(delay);
                }
            }
        }
        Ok(())
    }

    fn simulate_backspaces(&mut self, count: usize) -> Result<(), InjectionError> {
        for _ in 0..count {
            thread::sleep(Duration::from_millis(2));
            self.click(Key::Backspace)?;
        }
        Ok(())
    }

    fn simulate_left_arrows(&mut self, count: usize) -> Result<(), InjectionError> {
        for _ in 0..count {
            thread::sleep(Duration::from_millis(2));
            self.click(Key::LeftArrow)?;
        }
        Ok(())
    }

    fn paste_via_clipboard(&mut self, text: &str) -> Result<(), InjectionError> {
        let mut clipboard =
            Clipboard::new().map_err(|err| InjectionError(format!("clipboard: {}", err)))?;
        let saved = clipboard.get_text().ok();
        clipboard
            .set_text(text)
            .map_err(|err| InjectionError(format!("clipboard: {}", err)))?;
        thread::sleep(PASTE_SETTLE);

        #[cfg(target_os = "macos")]
        let modifier = Key::Meta;
        #[cfg(not(target_os = "macos"))]
        let modifier = Key::Control;

        self.enigo
            .key(modifier, Direction::Press)
            .map_err(|err| InjectionError(format!("failed to press modifier: {}", err)))?;
        let result = self.click(Key::Unicode('v'));
        let _ = self.enigo.key(modifier, Direction::Release);
        result?;

        // Give the target application time to read the clipboard before
        // the previous content comes back.
        thread::sleep(PASTE_SETTLE);
        if let Some(saved) = saved {
            let _ = clipboard.set_text(saved);
        }
        Ok(())
    }
}
