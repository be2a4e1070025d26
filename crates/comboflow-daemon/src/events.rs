use comboflow_core::InputEvent;
use rdev::{Event, EventType, Key};

/// Classify a raw rdev event for the match engine.
///
/// Returns `None` for events the engine should never see (key releases,
/// bare shift presses, mouse movement); everything else maps onto an
/// [`InputEvent`] kind.
pub fn classify(event: &Event) -> Option<InputEvent> {
    match event.event_type {
        EventType::KeyPress(key) => classify_key(key, event),
        // A click can move the caret anywhere; treat it like navigation.
        EventType::ButtonPress(_) => Some(InputEvent::Navigation),
        _ => None,
    }
}

fn classify_key(key: Key, event: &Event) -> Option<InputEvent> {
    match key {
        Key::Backspace | Key::Delete => Some(InputEvent::Backspace),

        Key::LeftArrow
        | Key::RightArrow
        | Key::UpArrow
        | Key::DownArrow
        | Key::Home
        | Key::End
        | Key::PageUp
        | Key::PageDown
        | Key::Escape
        | Key::Return
        | Key::KpReturn
        | Key::Tab
        | Key::Insert => Some(InputEvent::Navigation),

        Key::ControlLeft
        | Key::ControlRight
        | Key::Alt
        | Key::AltGr
        | Key::MetaLeft
        | Key::MetaRight => Some(InputEvent::ModifierChord),

        // Shift and the lock keys feed character production and must not
        // disturb the buffer on their own.
        Key::ShiftLeft | Key::ShiftRight | Key::CapsLock | Key::NumLock | Key::ScrollLock => None,

        Key::Space => Some(InputEvent::Char(' ')),

        _ => match key_to_char(event) {
            Some(c) => Some(InputEvent::Char(c)),
            None => Some(InputEvent::Other),
        },
    }
}

/// The character a key press produced, as reported by the OS layer.
fn key_to_char(event: &Event) -> Option<char> {
    let name = event.name.as_deref()?;
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn press(key: Key, name: Option<&str>) -> Event {
        Event {
            time: SystemTime::now(),
            name: name.map(str::to_string),
            event_type: EventType::KeyPress(key),
        }
    }

    #[test]
    fn printable_keys_become_characters() {
        assert_eq!(
            classify(&press(Key::KeyA, Some("a"))),
            Some(InputEvent::Char('a'))
        );
        assert_eq!(
            classify(&press(Key::KeyA, Some("A"))),
            Some(InputEvent::Char('A'))
        );
        assert_eq!(
            classify(&press(Key::Space, None)),
            Some(InputEvent::Char(' '))
        );
        assert_eq!(
            classify(&press(Key::SemiColon, Some(";"))),
            Some(InputEvent::Char(';'))
        );
    }

    #[test]
    fn editing_and_navigation_keys_classify() {
        assert_eq!(
            classify(&press(Key::Backspace, None)),
            Some(InputEvent::Backspace)
        );
        assert_eq!(
            classify(&press(Key::LeftArrow, None)),
            Some(InputEvent::Navigation)
        );
        assert_eq!(
            classify(&press(Key::Return, Some("\r"))),
            Some(InputEvent::Navigation)
        );
        assert_eq!(
            classify(&press(Key::ControlLeft, None)),
            Some(InputEvent::ModifierChord)
        );
    }

    #[test]
    fn shift_alone_is_invisible() {
        assert_eq!(classify(&press(Key::ShiftLeft, None)), None);
    }

    #[test]
    fn releases_and_mouse_movement_are_ignored() {
        let release = Event {
            time: SystemTime::now(),
            name: None,
            event_type: EventType::KeyRelease(Key::KeyA),
        };
        assert_eq!(classify(&release), None);

        let motion = Event {
            time: SystemTime::now(),
            name: None,
            event_type: EventType::MouseMove { x: 1.0, y: 2.0 },
        };
        assert_eq!(classify(&motion), None);
    }

    #[test]
    fn unnamed_function_keys_reset_matching() {
        assert_eq!(classify(&press(Key::F5, None)), Some(InputEvent::Other));
    }
}
