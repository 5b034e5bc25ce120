//! "Related projects" ranking.
//!
//! The relatedness score is an unnormalized ordinal signal:
//!
//! | Signal | Points |
//! |--------|--------|
//! | each tag shared by both records | +3 |
//! | same non-empty primary language | +2 |
//! | same state | +1 |
//! | same city | +1 |

use std::collections::HashSet;

use crate::models::ProjectRecord;

/// Default number of related projects shown on a project page.
pub const DEFAULT_SIMILAR_LIMIT: usize = 4;

/// Pairwise relatedness score. Symmetric in its arguments.
pub fn relatedness(a: &ProjectRecord, b: &ProjectRecord) -> u32 {
    let a_tags: HashSet<&str> = a.tags.iter().map(String::as_str).collect();
    let b_tags: HashSet<&str> = b.tags.iter().map(String::as_str).collect();
    let shared = a_tags.intersection(&b_tags).count() as u32;

    let mut score = shared * 3;

    match (a.primary_lang.as_deref(), b.primary_lang.as_deref()) {
        (Some(x), Some(y)) if !x.is_empty() && x == y => score += 2,
        _ => {}
    }
    if a.location_indian_state == b.location_indian_state {
        score += 1;
    }
    if a.location_city == b.location_city {
        score += 1;
    }
    score
}

/// Rank `candidates` by relatedness to `subject`.
///
/// The subject itself (matched by slug) and candidates scoring zero are
/// dropped. Ties on score fall back to stars descending; the sort is stable
/// so remaining ties keep input order.
pub fn find_similar<'a>(
    subject: &ProjectRecord,
    candidates: &'a [ProjectRecord],
    limit: usize,
) -> Vec<&'a ProjectRecord> {
    let mut scored: Vec<(u32, &ProjectRecord)> = candidates
        .iter()
        .filter(|c| c.slug != subject.slug)
        .map(|c| (relatedness(subject, c), c))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(b.stars.cmp(&a.stars)));
    scored.truncate(limit);
    scored.into_iter().map(|(_, c)| c).collect()
}
