use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use regex::{Regex, RegexBuilder};
use tracing::warn;
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::index::SnapshotHandle;

/// Read-mostly gate consulted before any keystroke becomes match-eligible.
///
/// Pause state flips atomically; pattern lists are replaced wholesale when
/// the preferences collaborator pushes a new [`PolicyConfig`].
pub struct PolicyGate {
    paused: AtomicBool,
    rules: RwLock<GateRules>,
    snapshots: SnapshotHandle,
}

struct GateRules {
    excluded: Vec<Regex>,
    sensitive: Vec<Regex>,
    config: PolicyConfig,
}

impl PolicyGate {
    pub fn new(config: PolicyConfig, snapshots: SnapshotHandle) -> Self {
        Self {
            paused: AtomicBool::new(false),
            rules: RwLock::new(GateRules::compile(config)),
            snapshots,
        }
    }

    /// Replace the active configuration, recompiling the pattern lists.
    pub fn set_config(&self, config: PolicyConfig) {
        let compiled = GateRules::compile(config);
        match self.rules.write() {
            Ok(mut guard) => *guard = compiled,
            Err(poisoned) => *poisoned.into_inner() = compiled,
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Whether keystrokes from the given foreground process may match.
    /// An unknown process name is always eligible.
    pub fn is_eligible(&self, active_app: Option<&str>) -> bool {
        let app = match active_app {
            Some(app) => app,
            None => return true,
        };
        !self.read_rules(|rules| rules.excluded.iter().any(|re| re.is_match(app)))
    }

    /// Whether the foreground process needs clipboard-based injection.
    pub fn is_sensitive(&self, active_app: Option<&str>) -> bool {
        match active_app {
            Some(app) => self.read_rules(|rules| rules.sensitive.iter().any(|re| re.is_match(app))),
            None => false,
        }
    }

    pub fn is_group_enabled(&self, group: Uuid) -> bool {
        self.snapshots.current().group_enabled(group)
    }

    pub fn key_delay_ms(&self) -> u64 {
        self.read_rules(|rules| rules.config.key_delay_ms)
    }

    pub fn use_clipboard_substitution(&self) -> bool {
        self.read_rules(|rules| rules.config.use_clipboard_substitution)
    }

    pub fn script_timeout_ms(&self) -> u64 {
        self.read_rules(|rules| rules.config.script_timeout_ms)
    }

    fn read_rules<T>(&self, f: impl FnOnce(&GateRules) -> T) -> T {
        match self.rules.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

impl GateRules {
    fn compile(config: PolicyConfig) -> Self {
        Self {
            excluded: compile_patterns(&config.excluded_apps),
            sensitive: compile_patterns(&config.sensitive_apps),
            config,
        }
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match glob_to_regex(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(pattern = %pattern, %err, "ignoring unusable application pattern");
                None
            }
        })
        .collect()
}

/// Compile a glob-style pattern (`*`, `?`) into an anchored,
/// case-insensitive regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    RegexBuilder::new(&expr).case_insensitive(true).build()
}
