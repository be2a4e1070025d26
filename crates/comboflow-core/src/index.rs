use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;
use uuid::Uuid;

use crate::models::{Combo, Group, MatchMode};

/// A combo whose keyword matches the current tail of the input buffer.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub combo: Arc<Combo>,
}

impl MatchCandidate {
    pub fn keyword(&self) -> &str {
        &self.combo.keyword
    }
}

/// Immutable view of all enabled combos in enabled groups, indexed for
/// tail lookup. Rebuilt as a whole on every catalog mutation and swapped
/// atomically; queries never observe a half-updated index.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    /// Group-then-insertion order; ties between combos sharing a keyword
    /// resolve to the first one here.
    combos: Vec<Arc<Combo>>,
    by_last_char: HashMap<char, Vec<usize>>,
    enabled_groups: HashSet<Uuid>,
    max_keyword_len: usize,
}

impl Snapshot {
    /// Build a snapshot from the full catalog contents.
    pub fn rebuild(groups: &[Group], combos: &[Combo], version: u64) -> Self {
        let enabled_groups: HashSet<Uuid> =
            groups.iter().filter(|g| g.enabled).map(|g| g.id).collect();

        let mut ordered: Vec<Arc<Combo>> = Vec::new();
        for group in groups {
            if !group.enabled {
                continue;
            }
            for combo in combos.iter().filter(|c| c.group == group.id) {
                if combo.enabled && !combo.keyword.is_empty() {
                    ordered.push(Arc::new(combo.clone()));
                }
            }
        }

        let mut by_last_char: HashMap<char, Vec<usize>> = HashMap::new();
        let mut max_keyword_len = 0;
        for (idx, combo) in ordered.iter().enumerate() {
            let len = combo.keyword.chars().count();
            max_keyword_len = max_keyword_len.max(len);
            if let Some(last) = combo.keyword.chars().last() {
                by_last_char.entry(last).or_default().push(idx);
            }
        }

        debug!(
            version,
            combos = ordered.len(),
            max_keyword_len,
            "matching snapshot rebuilt"
        );
        Self {
            version,
            combos: ordered,
            by_last_char,
            enabled_groups,
            max_keyword_len,
        }
    }

    pub fn empty() -> Self {
        Self::rebuild(&[], &[], 0)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Length in characters of the longest enabled keyword.
    pub fn max_keyword_len(&self) -> usize {
        self.max_keyword_len
    }

    pub fn group_enabled(&self, group: Uuid) -> bool {
        self.enabled_groups.contains(&group)
    }

    /// All combos whose keyword matches the end of `tail` under their own
    /// matching mode, in snapshot order. The first entry is the winner
    /// when several combos share a keyword.
    pub fn lookup(&self, tail: &str) -> Vec<MatchCandidate> {
        let last = match tail.chars().last() {
            Some(c) => c,
            None => return Vec::new(),
        };
        let indices = match self.by_last_char.get(&last) {
            Some(v) => v,
            None => return Vec::new(),
        };
        indices
            .iter()
            .map(|&i| &self.combos[i])
            .filter(|combo| keyword_matches(tail, &combo.keyword, combo.mode))
            .map(|combo| MatchCandidate {
                combo: Arc::clone(combo),
            })
            .collect()
    }
}

/// Shared handle to the latest snapshot. Readers take a cheap clone of
/// the inner `Arc`; the single writer replaces the whole snapshot.
#[derive(Clone)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub(crate) fn replace(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

/// Word-boundary test shared by both matching modes.
pub fn is_boundary(c: char) -> bool {
    !c.is_alphanumeric()
}

/// Keyword collision rule shared between the match engine's candidate
/// gathering and the conflict resolver. A Strict and a Loose combo with
/// the same keyword collide, so the mode is deliberately ignored.
pub fn keywords_collide(a: &Combo, b: &Combo) -> bool {
    a.keyword == b.keyword
}

fn keyword_matches(tail: &str, keyword: &str, mode: MatchMode) -> bool {
    if keyword.is_empty() || !tail.ends_with(keyword) {
        return false;
    }
    let prefix = &tail[..tail.len() - keyword.len()];
    let boundary_before = match prefix.chars().last() {
        None => true,
        Some(c) => is_boundary(c),
    };
    if !boundary_before {
        return false;
    }
    match mode {
        MatchMode::Loose => true,
        MatchMode::Strict => current_word(tail) == keyword,
    }
}

/// The word typed since the last boundary character.
fn current_word(tail: &str) -> &str {
    match tail.char_indices().rev().find(|(_, c)| is_boundary(*c)) {
        Some((idx, c)) => &tail[idx + c.len_utf8()..],
        None => tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_of(combos: Vec<Combo>) -> Snapshot {
        let group = Group::new("test");
        let combos: Vec<Combo> = combos
            .into_iter()
            .map(|mut c| {
                c.group = group.id;
                c
            })
            .collect();
        Snapshot::rebuild(&[group], &combos, 1)
    }

    fn combo(keyword: &str, mode: MatchMode) -> Combo {
        Combo::new("", keyword, "snippet", Uuid::new_v4()).with_mode(mode)
    }

    #[test]
    fn strict_keyword_inside_longer_word_never_fires() {
        let snap = snapshot_of(vec![combo("re", MatchMode::Strict)]);
        assert!(snap.lookup("tree").is_empty());
        assert!(snap.lookup("more").is_empty());
        assert_eq!(snap.lookup("re").len(), 1);
        assert_eq!(snap.lookup("a re").len(), 1);
    }

    #[test]
    fn loose_fires_after_any_boundary() {
        let snap = snapshot_of(vec![combo("sig", MatchMode::Loose)]);
        assert_eq!(snap.lookup("hello.sig").len(), 1);
        assert_eq!(snap.lookup("sig").len(), 1);
        assert!(snap.lookup("asig").is_empty());
    }

    #[test]
    fn loose_allows_boundary_characters_inside_keywords() {
        let snap = snapshot_of(vec![combo("a-b", MatchMode::Loose)]);
        assert_eq!(snap.lookup(" a-b").len(), 1);
        // Strict can never satisfy the whole-word rule for this keyword.
        let strict = snapshot_of(vec![combo("a-b", MatchMode::Strict)]);
        assert!(strict.lookup(" a-b").is_empty());
    }

    #[test]
    fn ties_resolve_in_snapshot_order() {
        let first = combo("dup", MatchMode::Strict);
        let second = combo("dup", MatchMode::Strict);
        let first_id = first.id;
        let snap = snapshot_of(vec![first, second]);
        for _ in 0..10 {
            let candidates = snap.lookup("dup");
            assert_eq!(candidates.len(), 2);
            assert_eq!(candidates[0].combo.id, first_id);
        }
    }

    #[test]
    fn disabled_combos_and_groups_are_excluded() {
        let mut enabled_group = Group::new("on");
        enabled_group.enabled = true;
        let mut disabled_group = Group::new("off");
        disabled_group.enabled = false;

        let mut a = Combo::new("", "aa", "x", enabled_group.id);
        a.enabled = false;
        let b = Combo::new("", "bb", "x", disabled_group.id);
        let c = Combo::new("", "cc", "x", enabled_group.id);

        let snap = Snapshot::rebuild(&[enabled_group.clone(), disabled_group], &[a, b, c], 3);
        assert!(snap.lookup("aa").is_empty());
        assert!(snap.lookup("bb").is_empty());
        assert_eq!(snap.lookup("cc").len(), 1);
        assert!(snap.group_enabled(enabled_group.id));
        assert_eq!(snap.version(), 3);
    }

    #[test]
    fn unicode_keywords_match_on_char_boundaries() {
        let snap = snapshot_of(vec![combo("café", MatchMode::Strict)]);
        assert_eq!(snap.lookup("café").len(), 1);
        assert!(snap.lookup("decafé").is_empty());
        assert_eq!(snap.max_keyword_len(), 4);
    }

    #[test]
    fn snapshot_handle_swaps_atomically() {
        let handle = SnapshotHandle::default();
        assert!(handle.current().is_empty());
        handle.replace(snapshot_of(vec![combo("x", MatchMode::Strict)]));
        assert_eq!(handle.current().len(), 1);
    }
}
