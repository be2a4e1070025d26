use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a combo keyword is matched against the typed buffer.
///
/// `Loose` fires when the keyword appears at the end of the buffer right
/// after a non-alphanumeric boundary (or at the very start). `Strict`
/// additionally requires the whole word typed since the last boundary to
/// be exactly the keyword, so a keyword buried inside a longer word never
/// fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    Strict,
    Loose,
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Strict
    }
}

/// A keyword/snippet pair owned by a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combo {
    pub id: Uuid,
    /// Display name shown by the editor; defaults to the keyword.
    pub name: String,
    pub keyword: String,
    /// Snippet text, possibly containing `#{...}` variable markers.
    pub snippet: String,
    pub mode: MatchMode,
    pub enabled: bool,
    pub group: Uuid,
    pub created_at: DateTime<Local>,
    pub modified_at: DateTime<Local>,
    pub last_used: Option<DateTime<Local>>,
}

impl Combo {
    pub fn new(
        name: impl Into<String>,
        keyword: impl Into<String>,
        snippet: impl Into<String>,
        group: Uuid,
    ) -> Self {
        let now = Local::now();
        let keyword = keyword.into();
        let mut name = name.into();
        if name.is_empty() {
            name = keyword.clone();
        }
        Self {
            id: Uuid::new_v4(),
            name,
            keyword,
            snippet: snippet.into(),
            mode: MatchMode::default(),
            enabled: true,
            group,
            created_at: now,
            modified_at: now,
            last_used: None,
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn touch_modified(&mut self) {
        self.modified_at = Local::now();
    }
}

/// A named, ordered collection of combos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub enabled: bool,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            enabled: true,
        }
    }
}

/// Editor-side keyword check: non-empty and free of whitespace.
///
/// Duplicate keywords are intentionally not rejected anywhere; the
/// conflict resolver reports them instead.
pub fn is_valid_keyword(keyword: &str) -> bool {
    !keyword.is_empty() && !keyword.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_name_defaults_to_keyword() {
        let group = Uuid::new_v4();
        let combo = Combo::new("", "btw", "by the way", group);
        assert_eq!(combo.name, "btw");
        assert!(combo.enabled);
        assert_eq!(combo.mode, MatchMode::Strict);
    }

    #[test]
    fn keyword_validation() {
        assert!(is_valid_keyword("btw"));
        assert!(is_valid_keyword(";sig"));
        assert!(!is_valid_keyword(""));
        assert!(!is_valid_keyword("by the way"));
        assert!(!is_valid_keyword("a\tb"));
    }
}
