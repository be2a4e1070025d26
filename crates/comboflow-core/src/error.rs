use thiserror::Error;

/// Errors detected while parsing a snippet template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated variable marker starting at offset {0}")]
    UnterminatedVariable(usize),
}

/// Errors raised while expanding a template into final text.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to resolve #{{{name}}}: {reason}")]
    VariableResolutionFailed { name: String, reason: String },
    #[error("script failed: {0}")]
    ScriptFailed(String),
    #[error("input cancelled by user")]
    UserCancelled,
}

/// Errors raised by the substitution transaction.
///
/// Template and evaluation failures abort the transaction before any
/// text is touched; injection failures abort it partway and are reported
/// rather than retried.
#[derive(Debug, Error)]
pub enum SubstitutionError {
    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] TemplateError),
    #[error(transparent)]
    Evaluation(#[from] EvalError),
    #[error("injection failed: {0}")]
    InjectionFailed(#[from] InjectionError),
    #[error("target window lost focus")]
    FocusLost,
}

/// Failure reported by an input injector primitive.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct InjectionError(pub String);

/// Failure reported by an external variable provider.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// Errors raised by combo/group catalog mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("the default group cannot be deleted")]
    DefaultGroupDeletion,
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown combo")]
    UnknownCombo,
    #[error("invalid keyword: {0}")]
    InvalidKeyword(String),
}
