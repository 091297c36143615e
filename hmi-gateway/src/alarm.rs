//! Alarm latch
//!
//! Two independent warning latches fed by the ingress pipeline, each
//! edge-detected against its own last-seen value. The combined state
//! is the OR of both latches. A rising edge emits a show-alert event
//! with the priority-selected message (second-level wins); a falling
//! edge that clears the last remaining latch emits a clear event.
//! Repeated identical input values produce no transition and no event,
//! so a steady warning bit repeated on every frame cannot re-pop the
//! alert.

use std::sync::Mutex;

use crate::sink::SinkPublisher;

/// Which warning input an observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningLevel {
    First,
    Second,
}

/// Alert texts carried by show-alert events
#[derive(Debug, Clone)]
pub struct AlarmMessages {
    pub first: String,
    pub second: String,
}

impl Default for AlarmMessages {
    fn default() -> Self {
        Self {
            first: "Driver: Pay Attention to the Road!".to_string(),
            second: "Driver: Pay Attention to the Road!\n\
                     ACC and LCC systems will be disabled for 30 seconds after attention is regained."
                .to_string(),
        }
    }
}

/// Consistent view of the latch state, safe to read from any thread
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmSnapshot {
    pub first: bool,
    pub second: bool,
    pub active: bool,
    /// Priority-selected message over the latches currently set
    pub message: Option<String>,
}

struct InputState {
    latched: bool,
    last_seen: Option<bool>,
}

impl InputState {
    fn new() -> Self {
        Self {
            latched: false,
            last_seen: None,
        }
    }
}

struct Inner {
    first: InputState,
    second: InputState,
    publisher: SinkPublisher,
}

/// The alarm latch state machine
///
/// Mutated only by the ingress thread; read snapshot-style by whoever
/// renders, so the two latch bits and the derived state never tear.
pub struct AlarmLatch {
    messages: AlarmMessages,
    inner: Mutex<Inner>,
}

impl AlarmLatch {
    pub fn new(messages: AlarmMessages, publisher: SinkPublisher) -> Self {
        Self {
            messages,
            inner: Mutex::new(Inner {
                first: InputState::new(),
                second: InputState::new(),
                publisher,
            }),
        }
    }

    /// Feed one normalized 0/1 observation of a warning signal
    pub fn observe(&self, level: WarningLevel, value: bool) {
        let mut inner = self.inner.lock().expect("alarm latch lock");

        let input = match level {
            WarningLevel::First => &mut inner.first,
            WarningLevel::Second => &mut inner.second,
        };

        // No edge, no transition
        if input.last_seen == Some(value) {
            return;
        }
        let was_latched = input.latched;
        input.last_seen = Some(value);

        if value && !was_latched {
            input.latched = true;
            // Re-evaluate priority on every set transition; second-level
            // wins when both latches are set.
            let message = if inner.second.latched {
                self.messages.second.clone()
            } else {
                self.messages.first.clone()
            };
            log::info!("Alarm latch set ({:?}): {}", level, message);
            inner.publisher.on_alarm(true, &message);
        } else if !value && was_latched {
            input.latched = false;
            if !inner.first.latched && !inner.second.latched {
                log::info!("Alarm latch cleared ({:?}): no active warnings", level);
                inner.publisher.on_alarm(false, "");
            }
            // One latch still set: the existing alert stays visible,
            // message unchanged; no event.
        }
    }

    /// Take a consistent snapshot of both latches and the derived state
    pub fn snapshot(&self) -> AlarmSnapshot {
        let inner = self.inner.lock().expect("alarm latch lock");
        let active = inner.first.latched || inner.second.latched;
        let message = if inner.second.latched {
            Some(self.messages.second.clone())
        } else if inner.first.latched {
            Some(self.messages.first.clone())
        } else {
            None
        };
        AlarmSnapshot {
            first: inner.first.latched,
            second: inner.second.latched,
            active,
            message,
        }
    }
}
