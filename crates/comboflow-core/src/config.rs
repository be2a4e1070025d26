use serde::{Deserialize, Serialize};

/// When the engine checks for a completed combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerPolicy {
    /// Fire as soon as typing satisfies a keyword (see
    /// [`EngineConfig::only_trigger_on_space`] for the terminator rules).
    Automatic,
    /// Accumulate only; substitution happens when the combo-picker
    /// shortcut invokes [`MatchEngine::trigger_manual`].
    ///
    /// [`MatchEngine::trigger_manual`]: crate::engine::MatchEngine::trigger_manual
    Manual,
}

/// Matching behavior supplied by the external preferences collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub trigger_policy: TriggerPolicy,
    /// When true, automatic matching fires only on an explicit space
    /// press and never immediately on keyword completion.
    pub only_trigger_on_space: bool,
    /// Whether the terminating character that fired a match survives the
    /// substitution. Evaluated at trigger time.
    pub keep_terminator: bool,
    /// Upper bound on the rolling input buffer, in characters.
    pub buffer_ceiling: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_policy: TriggerPolicy::Automatic,
            only_trigger_on_space: false,
            keep_terminator: true,
            buffer_ceiling: 256,
        }
    }
}

/// Gating and injection behavior supplied by the external preferences
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Glob patterns (case-insensitive) for foreground process names in
    /// which matching is disabled entirely.
    pub excluded_apps: Vec<String>,
    /// Glob patterns for applications with non-standard input handling;
    /// these get clipboard-based injection instead of simulated
    /// keystrokes, but matching is not blocked.
    pub sensitive_apps: Vec<String>,
    /// Delay between simulated keystrokes, in milliseconds.
    pub key_delay_ms: u64,
    /// Force clipboard-based substitution everywhere.
    pub use_clipboard_substitution: bool,
    /// Bounded wait for `#{shell:...}` variables, in milliseconds.
    pub script_timeout_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            excluded_apps: Vec::new(),
            sensitive_apps: Vec::new(),
            key_delay_ms: 0,
            use_clipboard_substitution: false,
            script_timeout_ms: 10_000,
        }
    }
}
