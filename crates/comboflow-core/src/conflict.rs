use crate::index::keywords_collide;
use crate::models::Combo;

/// Every other enabled combo whose keyword is identical to the
/// candidate's. Matching mode is ignored: a Strict and a Loose combo
/// with the same keyword still collide, since Loose is the superset
/// trigger. Uses the same collision rule as the match engine's
/// candidate gathering, so what the editor warns about is exactly what
/// fires.
pub fn find_conflicts<'a>(candidate: &Combo, all: &'a [Combo]) -> Vec<&'a Combo> {
    all.iter()
        .filter(|other| other.id != candidate.id && other.enabled)
        .filter(|other| keywords_collide(candidate, other))
        .collect()
}

/// Enabled combos whose keyword is a proper prefix of the candidate's
/// keyword, or vice versa. With automatic substitution the shorter
/// keyword fires first and can make the longer combo impossible to
/// trigger; the editor warns about these separately from duplicates.
pub fn find_shadow_conflicts<'a>(candidate: &Combo, all: &'a [Combo]) -> Vec<&'a Combo> {
    all.iter()
        .filter(|other| other.id != candidate.id && other.enabled)
        .filter(|other| !keywords_collide(candidate, other))
        .filter(|other| {
            other.keyword.starts_with(&candidate.keyword)
                || candidate.keyword.starts_with(&other.keyword)
        })
        .collect()
}
