use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use crate::error::TemplateError;
use crate::models::Combo;

const MARKER_OPEN: &str = "#{";
const MARKER_CLOSE: char = '}';

/// Case transform applied by `#{keyword:...}` self-reference markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordCase {
    Original,
    Upper,
    Lower,
    Trimmed,
}

/// One node of a parsed snippet template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Clipboard,
    Date,
    Time,
    /// `None` uses the default `yyyy-MM-dd HH:mm:ss` rendering.
    DateTime(Option<String>),
    Cursor,
    EnvVar(String),
    Keyword(KeywordCase),
    Shell(String),
    Input {
        label: String,
        default: Option<String>,
    },
}

impl Node {
    /// Whether resolving this node suspends on an external collaborator.
    pub fn is_async(&self) -> bool {
        matches!(self, Node::Shell(_) | Node::Input { .. })
    }
}

/// A snippet parsed into literal and variable nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn has_async_nodes(&self) -> bool {
        self.nodes.iter().any(Node::is_async)
    }
}

/// Parse a snippet into a template.
///
/// An unrecognized variable name stays in the output as literal text;
/// only a `#{` with no closing brace is an error.
pub fn parse(snippet: &str) -> Result<Template, TemplateError> {
    let mut nodes = Vec::new();
    let mut literal = String::new();
    let mut rest = snippet;
    let mut offset = 0;

    while let Some(open) = rest.find(MARKER_OPEN) {
        literal.push_str(&rest[..open]);
        let marker_start = offset + open;
        let body_start = open + MARKER_OPEN.len();
        let close = rest[body_start..]
            .find(MARKER_CLOSE)
            .ok_or(TemplateError::UnterminatedVariable(marker_start))?;
        let body = &rest[body_start..body_start + close];
        match parse_marker(body) {
            Some(node) => {
                flush_literal(&mut nodes, &mut literal);
                nodes.push(node);
            }
            None => {
                literal.push_str(MARKER_OPEN);
                literal.push_str(body);
                literal.push(MARKER_CLOSE);
            }
        }
        let consumed = body_start + close + MARKER_CLOSE.len_utf8();
        rest = &rest[consumed..];
        offset += consumed;
    }
    literal.push_str(rest);
    flush_literal(&mut nodes, &mut literal);

    Ok(Template { nodes })
}

fn flush_literal(nodes: &mut Vec<Node>, literal: &mut String) {
    if !literal.is_empty() {
        nodes.push(Node::Text(std::mem::take(literal)));
    }
}

fn parse_marker(body: &str) -> Option<Node> {
    let (name, arg) = match body.find(':') {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    match (name, arg) {
        ("clipboard", None) => Some(Node::Clipboard),
        ("date", None) => Some(Node::Date),
        ("time", None) => Some(Node::Time),
        ("dateTime", None) => Some(Node::DateTime(None)),
        ("dateTime", Some(format)) if !format.is_empty() => {
            Some(Node::DateTime(Some(format.to_string())))
        }
        ("cursor", None) => Some(Node::Cursor),
        ("envVar", Some(var)) if !var.is_empty() => Some(Node::EnvVar(var.to_string())),
        ("keyword", None) => Some(Node::Keyword(KeywordCase::Original)),
        ("keyword", Some("upper")) => Some(Node::Keyword(KeywordCase::Upper)),
        ("keyword", Some("lower")) => Some(Node::Keyword(KeywordCase::Lower)),
        ("keyword", Some("trimmed")) => Some(Node::Keyword(KeywordCase::Trimmed)),
        ("shell", Some(command)) if !command.is_empty() => Some(Node::Shell(command.to_string())),
        ("input", Some(spec)) if !spec.is_empty() => {
            let (label, default) = match spec.find(':') {
                Some(idx) => (&spec[..idx], Some(spec[idx + 1..].to_string())),
                None => (spec, None),
            };
            Some(Node::Input {
                label: label.to_string(),
                default,
            })
        }
        _ => None,
    }
}

/// Per-session template cache keyed by combo id.
///
/// Parsing happens on first trigger; a malformed template is reported
/// exactly once per combo per session, after which triggers abort
/// silently until the combo changes.
#[derive(Default)]
pub struct TemplateCache {
    parsed: HashMap<Uuid, Arc<Template>>,
    failed: HashMap<Uuid, TemplateError>,
}

/// Outcome of a cache lookup for a combo whose template failed to parse.
pub enum CacheMiss {
    /// First failure this session; the caller should report it.
    Report(TemplateError),
    /// Already reported; abort quietly.
    AlreadyReported(TemplateError),
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template_for(&mut self, combo: &Combo) -> Result<Arc<Template>, CacheMiss> {
        if let Some(template) = self.parsed.get(&combo.id) {
            return Ok(Arc::clone(template));
        }
        if let Some(err) = self.failed.get(&combo.id) {
            return Err(CacheMiss::AlreadyReported(err.clone()));
        }
        match parse(&combo.snippet) {
            Ok(template) => {
                trace!(keyword = %combo.keyword, nodes = template.nodes().len(), "template parsed");
                let template = Arc::new(template);
                self.parsed.insert(combo.id, Arc::clone(&template));
                Ok(template)
            }
            Err(err) => {
                self.failed.insert(combo.id, err.clone());
                Err(CacheMiss::Report(err))
            }
        }
    }

    /// Drop cached state for a combo whose snippet was edited.
    pub fn invalidate(&mut self, combo: Uuid) {
        self.parsed.remove(&combo);
        self.failed.remove(&combo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_parses_to_a_single_literal() {
        let template = parse("by the way").unwrap();
        assert_eq!(
            template.nodes(),
            &[Node::Text("by the way".to_string())]
        );
        assert!(!template.has_async_nodes());
    }

    #[test]
    fn variables_split_the_literal_text() {
        let template = parse("hi #{clipboard}, sent #{dateTime:yyyy-MM-dd}#{cursor}!").unwrap();
        assert_eq!(
            template.nodes(),
            &[
                Node::Text("hi ".to_string()),
                Node::Clipboard,
                Node::Text(", sent ".to_string()),
                Node::DateTime(Some("yyyy-MM-dd".to_string())),
                Node::Cursor,
                Node::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn input_marker_carries_label_and_default() {
        let template = parse("#{input:Name:World}").unwrap();
        assert_eq!(
            template.nodes(),
            &[Node::Input {
                label: "Name".to_string(),
                default: Some("World".to_string()),
            }]
        );
        assert!(template.has_async_nodes());
    }

    #[test]
    fn unknown_variables_stay_literal() {
        let template = parse("a #{nope} b #{dateTime:} c").unwrap();
        assert_eq!(
            template.nodes(),
            &[Node::Text("a #{nope} b #{dateTime:} c".to_string())]
        );
    }

    #[test]
    fn unterminated_marker_is_an_error() {
        assert_eq!(
            parse("hello #{clipboard"),
            Err(TemplateError::UnterminatedVariable(6))
        );
    }

    #[test]
    fn cache_reports_a_parse_failure_once() {
        let mut cache = TemplateCache::new();
        let combo = Combo::new("", "kw", "bad #{", Uuid::new_v4());
        assert!(matches!(
            cache.template_for(&combo),
            Err(CacheMiss::Report(TemplateError::UnterminatedVariable(4)))
        ));
        assert!(matches!(
            cache.template_for(&combo),
            Err(CacheMiss::AlreadyReported(_))
        ));
        cache.invalidate(combo.id);
        assert!(matches!(
            cache.template_for(&combo),
            Err(CacheMiss::Report(_))
        ));
    }

    #[test]
    fn cache_returns_the_same_parsed_template() {
        let mut cache = TemplateCache::new();
        let combo = Combo::new("", "kw", "#{keyword:upper}", Uuid::new_v4());
        let first = cache.template_for(&combo).unwrap_or_else(|_| panic!());
        let second = cache.template_for(&combo).unwrap_or_else(|_| panic!());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.nodes(), &[Node::Keyword(KeywordCase::Upper)]);
    }
}
