use std::sync::Arc;

use tracing::{debug, trace};

use crate::buffer::{InputBuffer, InputEvent};
use crate::config::{EngineConfig, TriggerPolicy};
use crate::index::{is_boundary, MatchCandidate, SnapshotHandle};
use crate::policy::PolicyGate;

/// Match engine state, advanced once per keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Accumulating,
    /// A substitution is in flight; keystrokes keep buffering for the
    /// next trigger but cannot fire a new one.
    Triggered,
    /// The policy gate is closed (paused or excluded application); the
    /// buffer still accumulates.
    Suppressed,
}

/// A fired trigger, handed to the substitution executor.
#[derive(Debug, Clone)]
pub struct TriggerFired {
    /// Matching combos in snapshot order; the first one is the winner.
    pub candidates: Vec<MatchCandidate>,
    /// Keyword text as typed.
    pub typed_keyword: String,
    /// The terminating character, when the trigger came from one.
    pub terminator: Option<char>,
    /// Whether the terminator survives the substitution; captured from
    /// the configuration at trigger time.
    pub keep_terminator: bool,
    /// Foreground process at trigger time.
    pub target_app: Option<String>,
}

impl TriggerFired {
    pub fn winner(&self) -> &MatchCandidate {
        &self.candidates[0]
    }
}

/// Incremental matcher over the keystroke stream.
///
/// Owns the rolling input buffer, consults the policy gate before every
/// keystroke, and queries the latest matching snapshot. Produces at most
/// one [`TriggerFired`] per keystroke; the caller must report back with
/// [`MatchEngine::substitution_complete`] before the next trigger can
/// fire.
pub struct MatchEngine {
    buffer: InputBuffer,
    state: EngineState,
    config: EngineConfig,
    snapshots: SnapshotHandle,
    gate: Arc<PolicyGate>,
}

impl MatchEngine {
    pub fn new(config: EngineConfig, snapshots: SnapshotHandle, gate: Arc<PolicyGate>) -> Self {
        Self {
            buffer: InputBuffer::default(),
            state: EngineState::Idle,
            config,
            snapshots,
            gate,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Process one classified keystroke from the foreground application.
    pub fn handle_event(
        &mut self,
        event: InputEvent,
        active_app: Option<&str>,
    ) -> Option<TriggerFired> {
        let snapshot = self.snapshots.current();
        self.buffer
            .ensure_capacity(snapshot.max_keyword_len(), self.config.buffer_ceiling);

        if self.gate.is_paused() || !self.gate.is_eligible(active_app) {
            self.track_event(event);
            if self.state != EngineState::Suppressed {
                trace!(?active_app, "matching suppressed by policy gate");
                self.state = EngineState::Suppressed;
            }
            return None;
        }
        if self.state == EngineState::Suppressed {
            self.state = EngineState::Idle;
        }

        if self.state == EngineState::Triggered {
            // One in-flight substitution at a time; keep buffering.
            self.track_event(event);
            return None;
        }

        match event {
            InputEvent::Char(c) => {
                self.buffer.push(c);
                self.state = EngineState::Accumulating;
                if self.config.trigger_policy == TriggerPolicy::Manual {
                    return None;
                }
                self.check_automatic(c, active_app)
            }
            InputEvent::Backspace => {
                self.buffer.backspace();
                if self.buffer.is_empty() {
                    self.state = EngineState::Idle;
                }
                None
            }
            _ => {
                self.buffer.clear();
                self.state = EngineState::Idle;
                None
            }
        }
    }

    /// Fire the best match for the current buffer, regardless of trigger
    /// policy. Bound by the embedding application to the combo-picker
    /// shortcut.
    pub fn trigger_manual(&mut self, active_app: Option<&str>) -> Option<TriggerFired> {
        if self.state == EngineState::Triggered
            || self.gate.is_paused()
            || !self.gate.is_eligible(active_app)
        {
            return None;
        }
        let tail = self.tail();
        self.fire(self.snapshots.current().lookup(&tail), None, active_app)
    }

    /// The substitution transaction finished (successfully or not); wipe
    /// the buffer so the injected expansion is not reconsidered as fresh
    /// typing.
    pub fn substitution_complete(&mut self) {
        self.buffer.clear();
        self.state = EngineState::Idle;
    }

    fn check_automatic(&mut self, typed: char, active_app: Option<&str>) -> Option<TriggerFired> {
        let snapshot = self.snapshots.current();
        let tail = self.tail();

        if is_boundary(typed) {
            let eligible_terminator = !self.config.only_trigger_on_space || typed == ' ';
            if eligible_terminator {
                let before_terminator = &tail[..tail.len() - typed.len_utf8()];
                let candidates = snapshot.lookup(before_terminator);
                if !candidates.is_empty() {
                    return self.fire(candidates, Some(typed), active_app);
                }
            }
        }

        // Immediate triggering on keyword completion; also covers
        // keywords that end in a boundary character themselves.
        if !self.config.only_trigger_on_space {
            let candidates = snapshot.lookup(&tail);
            if !candidates.is_empty() {
                return self.fire(candidates, None, active_app);
            }
        }
        None
    }

    fn fire(
        &mut self,
        candidates: Vec<MatchCandidate>,
        terminator: Option<char>,
        active_app: Option<&str>,
    ) -> Option<TriggerFired> {
        let winner = candidates.first()?;
        let typed_keyword = winner.keyword().to_string();
        debug!(
            keyword = %typed_keyword,
            candidates = candidates.len(),
            ?terminator,
            "combo triggered"
        );
        self.state = EngineState::Triggered;
        Some(TriggerFired {
            candidates,
            typed_keyword,
            terminator,
            keep_terminator: self.config.keep_terminator,
            target_app: active_app.map(str::to_string),
        })
    }

    /// Window large enough to decide both matching modes: the longest
    /// keyword, a possible terminator, and one preceding character.
    fn tail(&self) -> String {
        let max_len = self.snapshots.current().max_keyword_len();
        self.buffer.tail(max_len + 2)
    }

    fn track_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::Char(c) => self.buffer.push(c),
            InputEvent::Backspace => self.buffer.backspace(),
            _ => self.buffer.clear(),
        }
    }
}
