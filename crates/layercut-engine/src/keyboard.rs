use crate::session::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key value as reported by the platform, e.g. `"z"`, `"Y"`, `" "`.
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    fn primary(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusContext {
    /// Focus is inside an editable text field.
    pub text_field: bool,
}

/// Map a key press to an editor command.
pub fn command_for_key(event: &KeyEvent, focus: FocusContext) -> Option<Command> {
    if focus.text_field {
        return None;
    }
    let key = event.key.to_lowercase();
    match key.as_str() {
        "z" if event.primary() && event.shift => Some(Command::Redo),
        "z" if event.primary() => Some(Command::Undo),
        "y" if event.primary() => Some(Command::Redo),
        " " | "space" if !event.primary() => Some(Command::TogglePlay),
        _ => None,
    }
}
