use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::dateformat::{self, DEFAULT_DATETIME_FORMAT, DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT};
use crate::error::EvalError;
use crate::models::Combo;
use crate::providers::VariableProviders;
use crate::template::{KeywordCase, Node, Template};

/// Everything known about the trigger a template is expanded for.
#[derive(Clone)]
pub struct TriggerContext {
    pub combo: Arc<Combo>,
    /// Keyword text as it was typed.
    pub keyword: String,
    /// Terminating character that fired the match, if any.
    pub terminator: Option<char>,
    /// Foreground process at trigger time, if known.
    pub target_app: Option<String>,
}

/// Final text produced by evaluation, plus the caret position requested
/// by the first `#{cursor}` marker (a character offset into `text`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluated {
    pub text: String,
    pub cursor: Option<usize>,
}

/// Expand a template left to right.
///
/// Resolution is strictly sequential: a later clipboard read must see
/// side effects of an earlier script, and at most one suspending call
/// (shell, prompt) is outstanding per trigger. Any error aborts the
/// whole expansion; partial output is discarded.
pub fn evaluate(
    template: &Template,
    ctx: &TriggerContext,
    providers: &VariableProviders,
    script_timeout: Duration,
) -> Result<Evaluated, EvalError> {
    let mut text = String::new();
    let mut cursor = None;

    for node in template.nodes() {
        match node {
            Node::Text(literal) => text.push_str(literal),
            Node::Clipboard => {
                let content = providers.clipboard.read_text().map_err(|err| {
                    EvalError::VariableResolutionFailed {
                        name: "clipboard".to_string(),
                        reason: err.0,
                    }
                })?;
                text.push_str(&content);
            }
            Node::Date => text.push_str(&dateformat::format(
                providers.clock.now(),
                DEFAULT_DATE_FORMAT,
            )),
            Node::Time => text.push_str(&dateformat::format(
                providers.clock.now(),
                DEFAULT_TIME_FORMAT,
            )),
            Node::DateTime(format) => {
                let format = format.as_deref().unwrap_or(DEFAULT_DATETIME_FORMAT);
                text.push_str(&dateformat::format(providers.clock.now(), format));
            }
            Node::Cursor => {
                // Only the first marker positions the caret.
                if cursor.is_none() {
                    cursor = Some(text.chars().count());
                }
            }
            Node::EnvVar(name) => {
                // A missing variable is empty text, never an error.
                if let Some(value) = providers.env.get(name) {
                    text.push_str(&value);
                }
            }
            Node::Keyword(case) => text.push_str(&keyword_text(&ctx.keyword, *case)),
            Node::Shell(command) => {
                let output = providers
                    .scripts
                    .run(command, script_timeout)
                    .map_err(|err| EvalError::ScriptFailed(err.0))?;
                if !output.success() {
                    let detail = if output.stderr.trim().is_empty() {
                        format!("exit code {:?}", output.exit_code)
                    } else {
                        output.stderr.trim_end().to_string()
                    };
                    return Err(EvalError::ScriptFailed(detail));
                }
                text.push_str(output.stdout.trim_end());
            }
            Node::Input { label, default } => {
                let entered = providers
                    .prompt
                    .prompt(label, default.as_deref())
                    .map_err(|err| EvalError::VariableResolutionFailed {
                        name: "input".to_string(),
                        reason: err.0,
                    })?;
                match entered {
                    Some(value) => text.push_str(&value),
                    None => return Err(EvalError::UserCancelled),
                }
            }
        }
    }

    trace!(
        keyword = %ctx.keyword,
        chars = text.chars().count(),
        cursor = ?cursor,
        "template evaluated"
    );
    Ok(Evaluated { text, cursor })
}

fn keyword_text(keyword: &str, case: KeywordCase) -> String {
    match case {
        KeywordCase::Original => keyword.to_string(),
        KeywordCase::Upper => keyword.to_uppercase(),
        KeywordCase::Lower => keyword.to_lowercase(),
        KeywordCase::Trimmed => keyword.trim().to_string(),
    }
}
