use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::TriggerFired;
use crate::error::{SubstitutionError, TemplateError};
use crate::evaluator::{self, TriggerContext};
use crate::injector::InputInjector;
use crate::policy::PolicyGate;
use crate::providers::VariableProviders;
use crate::template::{CacheMiss, TemplateCache};

/// User-visible engine failures, forwarded to the external UI
/// collaborator through a single report callback.
#[derive(Debug, Clone)]
pub enum EngineReport {
    TemplateInvalid {
        combo_name: String,
        keyword: String,
        error: TemplateError,
    },
    ExpansionFailed {
        keyword: String,
        reason: String,
    },
    SubstitutionFailed {
        keyword: String,
        reason: String,
    },
}

pub type ReportSink = Arc<dyn Fn(EngineReport) + Send + Sync>;
pub type LastUsedSink = Arc<dyn Fn(Uuid) + Send + Sync>;

/// Foreground-window oracle used to discard substitutions whose target
/// window went away while an asynchronous variable was pending.
pub trait FocusTracker: Send + Sync {
    fn active_app(&self) -> Option<String>;
}

/// Tracker for platforms where the embedding application supplies no
/// focus information; never vetoes an injection.
pub struct UnknownFocus;

impl FocusTracker for UnknownFocus {
    fn active_app(&self) -> Option<String> {
        None
    }
}

/// Performs the delete-keyword/insert-expansion transaction.
///
/// The visible effect is atomic: template and evaluation failures abort
/// before any key is injected, leaving the typed keyword untouched.
pub struct SubstitutionExecutor {
    injector: Box<dyn InputInjector>,
    providers: VariableProviders,
    gate: Arc<PolicyGate>,
    focus: Arc<dyn FocusTracker>,
    reports: Option<ReportSink>,
    last_used: Option<LastUsedSink>,
    templates: TemplateCache,
}

impl SubstitutionExecutor {
    pub fn new(
        injector: Box<dyn InputInjector>,
        providers: VariableProviders,
        gate: Arc<PolicyGate>,
    ) -> Self {
        Self {
            injector,
            providers,
            gate,
            focus: Arc::new(UnknownFocus),
            reports: None,
            last_used: None,
            templates: TemplateCache::new(),
        }
    }

    pub fn with_focus_tracker(mut self, focus: Arc<dyn FocusTracker>) -> Self {
        self.focus = focus;
        self
    }

    pub fn with_report_sink(mut self, sink: ReportSink) -> Self {
        self.reports = Some(sink);
        self
    }

    pub fn with_last_used_sink(mut self, sink: LastUsedSink) -> Self {
        self.last_used = Some(sink);
        self
    }

    /// Drop cached template state for an edited combo.
    pub fn invalidate_template(&mut self, combo: Uuid) {
        self.templates.invalidate(combo);
    }

    /// Run the substitution transaction for a fired trigger.
    pub fn execute(&mut self, trigger: &TriggerFired) -> Result<(), SubstitutionError> {
        let winner = trigger.winner();
        let combo = Arc::clone(&winner.combo);

        let template = match self.templates.template_for(&combo) {
            Ok(template) => template,
            Err(CacheMiss::Report(err)) => {
                self.report(EngineReport::TemplateInvalid {
                    combo_name: combo.name.clone(),
                    keyword: combo.keyword.clone(),
                    error: err.clone(),
                });
                return Err(SubstitutionError::InvalidTemplate(err));
            }
            Err(CacheMiss::AlreadyReported(err)) => {
                return Err(SubstitutionError::InvalidTemplate(err));
            }
        };

        let context = TriggerContext {
            combo: Arc::clone(&combo),
            keyword: trigger.typed_keyword.clone(),
            terminator: trigger.terminator,
            target_app: trigger.target_app.clone(),
        };
        let timeout = Duration::from_millis(self.gate.script_timeout_ms());
        let evaluated = match evaluator::evaluate(&template, &context, &self.providers, timeout) {
            Ok(evaluated) => evaluated,
            Err(err) => {
                self.report(EngineReport::ExpansionFailed {
                    keyword: combo.keyword.clone(),
                    reason: err.to_string(),
                });
                return Err(err.into());
            }
        };

        // An asynchronous variable may have suspended us for a while; if
        // the original target window is gone, discard the result rather
        // than inject into the wrong window.
        if let (Some(target), Some(current)) =
            (trigger.target_app.as_deref(), self.focus.active_app())
        {
            if target != current {
                warn!(wanted = target, now = %current, "discarding substitution, focus moved");
                self.report(EngineReport::SubstitutionFailed {
                    keyword: combo.keyword.clone(),
                    reason: "the target window lost focus".to_string(),
                });
                return Err(SubstitutionError::FocusLost);
            }
        }

        let keep_terminator = trigger.terminator.filter(|_| trigger.keep_terminator);
        let mut delete_count = trigger.typed_keyword.chars().count();
        if trigger.terminator.is_some() {
            delete_count += 1;
        }
        let mut inserted = evaluated.text.clone();
        if let Some(c) = keep_terminator {
            inserted.push(c);
        }

        let result = self.inject(trigger, delete_count, &inserted, evaluated.cursor);
        if let Err(err) = &result {
            self.report(EngineReport::SubstitutionFailed {
                keyword: combo.keyword.clone(),
                reason: err.to_string(),
            });
            return result;
        }

        debug!(keyword = %combo.keyword, chars = inserted.chars().count(), "substitution done");
        if let Some(sink) = &self.last_used {
            sink(combo.id);
        }
        Ok(())
    }

    fn inject(
        &mut self,
        trigger: &TriggerFired,
        delete_count: usize,
        inserted: &str,
        cursor: Option<usize>,
    ) -> Result<(), SubstitutionError> {
        let use_paste = self.gate.use_clipboard_substitution()
            || self.gate.is_sensitive(trigger.target_app.as_deref());

        self.injector.simulate_backspaces(delete_count)?;
        if use_paste {
            self.injector.paste_via_clipboard(inserted)?;
        } else {
            let delay = Duration::from_millis(self.gate.key_delay_ms());
            self.injector.simulate_keystrokes(inserted, delay)?;
        }

        if let Some(cursor) = cursor {
            let total = inserted.chars().count();
            let back = total.saturating_sub(cursor);
            if back > 0 {
                self.injector.simulate_left_arrows(back)?;
            }
        }
        Ok(())
    }

    fn report(&self, report: EngineReport) {
        if let Some(sink) = &self.reports {
            sink(report);
        }
    }
}
