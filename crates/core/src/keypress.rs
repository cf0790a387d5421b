//! Visual cue for key presses.

use std::sync::{Arc, Mutex};

use crate::events::{EventChannel, Subscription};

/// A raw keydown event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    /// True when the OS auto-repeats a held key.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            repeat: false,
        }
    }

    pub fn repeated(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            repeat: true,
        }
    }
}

/// Latest key and a pulse counter. Consumers retrigger their animation
/// whenever `pulse_id` changes; its absolute value is meaningless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeypressState {
    pub last_key: Option<String>,
    pub pulse_id: u64,
}

impl KeypressState {
    /// Next state after a keydown, or `None` when the event is ignored.
    pub fn on_key_down(&self, event: &KeyEvent) -> Option<Self> {
        if event.repeat {
            return None;
        }
        let key = if event.key == " " {
            "Space".to_string()
        } else {
            event.key.clone()
        };
        Some(Self {
            last_key: Some(key),
            pulse_id: self.pulse_id.wrapping_add(1),
        })
    }
}

/// Keeps a [`KeypressState`] in sync with a keydown channel for as long as
/// it is alive.
pub struct KeypressFeedback {
    state: Arc<Mutex<KeypressState>>,
    _subscription: Subscription,
}

impl KeypressFeedback {
    pub fn attach(keys: &EventChannel<KeyEvent>) -> Self {
        let state = Arc::new(Mutex::new(KeypressState::default()));
        let handler_state = state.clone();
        let subscription = keys.listen(move |event| {
            let mut state = handler_state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(next) = state.on_key_down(event) {
                *state = next;
            }
        });
        Self {
            state,
            _subscription: subscription,
        }
    }

    pub fn snapshot(&self) -> KeypressState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_key(&self) -> Option<String> {
        self.snapshot().last_key
    }

    pub fn pulse_id(&self) -> u64 {
        self.snapshot().pulse_id
    }

    /// Stop listening. Equivalent to dropping the feedback.
    pub fn detach(self) {}
}
