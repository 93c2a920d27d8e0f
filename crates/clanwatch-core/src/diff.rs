//! Point deltas and departures between two roster captures.
//!
//! Both operations match members by [`normalize`]d identity, so encoding
//! artifacts in display names never show up as a change or a leaver.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;
use crate::types::RosterEntry;

/// One member's point change between two captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Display name as it appears in the newer capture.
    pub identity: String,
    pub delta: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub total_delta: i64,
    pub changes: Vec<Change>,
}

impl Diff {
    /// Changes ordered for display: biggest gain first, ties by name.
    pub fn sorted_by_delta(&self) -> Vec<Change> {
        let mut changes = self.changes.clone();
        changes.sort_by(|a, b| b.delta.cmp(&a.delta).then_with(|| a.identity.cmp(&b.identity)));
        changes
    }
}

/// Per-member and aggregate point deltas for members present in both
/// captures. Zero deltas are omitted; `changes` follows `curr` order.
pub fn diff(prev: &[RosterEntry], curr: &[RosterEntry]) -> Diff {
    let before = index(prev);
    let mut seen = HashSet::new();
    let mut changes = Vec::new();

    for entry in curr {
        let key = normalize(&entry.identity);
        if !seen.insert(key.clone()) {
            continue;
        }
        let Some(old) = before.get(&key) else {
            continue;
        };
        let delta = point_delta(old.points, entry.points);
        if delta != 0 {
            changes.push(Change {
                identity: entry.identity.clone(),
                delta,
            });
        }
    }

    let total_delta = changes
        .iter()
        .fold(0i64, |acc, c| acc.saturating_add(c.delta));
    Diff {
        total_delta,
        changes,
    }
}

/// `new - old`, saturating at the `i64` bounds.
fn point_delta(old: u64, new: u64) -> i64 {
    let delta = i128::from(new) - i128::from(old);
    delta.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Entries of `prev` whose normalized identity is missing from `curr`.
pub fn find_leavers(prev: &[RosterEntry], curr: &[RosterEntry]) -> Vec<RosterEntry> {
    let present: HashSet<String> = curr.iter().map(|e| normalize(&e.identity)).collect();
    prev.iter()
        .filter(|e| !present.contains(&normalize(&e.identity)))
        .cloned()
        .collect()
}

/// First occurrence wins for duplicate identities.
fn index(entries: &[RosterEntry]) -> HashMap<String, &RosterEntry> {
    let mut map = HashMap::with_capacity(entries.len());
    for entry in entries {
        map.entry(normalize(&entry.identity)).or_insert(entry);
    }
    map
}

/// Sort descending by points and drop later duplicates of a normalized
/// identity. Applied to every roster the source hands back.
pub fn tidy_roster(entries: Vec<RosterEntry>) -> Vec<RosterEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut roster: Vec<RosterEntry> = entries
        .into_iter()
        .filter(|e| seen.insert(normalize(&e.identity)))
        .collect();
    // Stable sort keeps source order among equal point totals.
    roster.sort_by(|a, b| b.points.cmp(&a.points));
    roster
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(name: &str, points: u64) -> RosterEntry {
        RosterEntry::new(name, points)
    }

    #[test]
    fn empty_inputs_have_no_changes() {
        assert_eq!(diff(&[], &[]), Diff::default());
    }

    #[test]
    fn single_member_gain() {
        let d = diff(&[e("A", 10)], &[e("A", 15)]);
        assert_eq!(d.total_delta, 5);
        assert_eq!(
            d.changes,
            vec![Change {
                identity: "A".into(),
                delta: 5
            }]
        );
    }

    #[test]
    fn one_sided_identities_are_ignored() {
        let d = diff(&[e("A", 10), e("Gone", 99)], &[e("A", 10), e("New", 50)]);
        assert_eq!(d, Diff::default());
    }

    #[test]
    fn matches_across_spacing_and_case() {
        let d = diff(&[e("John Smith", 100)], &[e("johnsmith\u{00A0}", 90)]);
        assert_eq!(d.total_delta, -10);
        assert_eq!(d.changes[0].identity, "johnsmith\u{00A0}");
    }

    #[test]
    fn total_sums_gains_and_losses() {
        let d = diff(
            &[e("A", 10), e("B", 20), e("C", 30)],
            &[e("A", 25), e("B", 15), e("C", 30)],
        );
        assert_eq!(d.total_delta, 10);
        assert_eq!(d.changes.len(), 2);
        let sorted = d.sorted_by_delta();
        assert_eq!(sorted[0].identity, "A");
        assert_eq!(sorted[1].delta, -5);
    }

    #[test]
    fn leavers_are_missing_from_newer() {
        let leavers = find_leavers(&[e("A", 1), e("B", 2)], &[e("A", 1)]);
        assert_eq!(leavers, vec![e("B", 2)]);
    }

    #[test]
    fn no_leavers_between_identical_rosters() {
        let roster = vec![e("A", 1), e("B", 2)];
        assert!(find_leavers(&roster, &roster).is_empty());
    }

    #[test]
    fn invisible_marks_are_not_leavers() {
        let leavers = find_leavers(&[e("Ra\u{200B}ven", 1)], &[e("RAVEN", 1)]);
        assert!(leavers.is_empty());
    }

    #[test]
    fn tidy_roster_sorts_and_dedupes() {
        let roster = tidy_roster(vec![e("Low", 5), e("High", 50), e("low", 500)]);
        assert_eq!(roster, vec![e("High", 50), e("Low", 5)]);
    }

    #[test]
    fn huge_point_totals_saturate() {
        let d = diff(&[e("Ash", 0)], &[e("Ash", u64::MAX)]);
        assert_eq!(d.changes[0].delta, i64::MAX);
        let d = diff(&[e("Ash", u64::MAX)], &[e("Ash", 0)]);
        assert_eq!(d.changes[0].delta, i64::MIN);

        let d = diff(
            &[e("Ash", 0), e("Birch", 0)],
            &[e("Ash", u64::MAX), e("Birch", u64::MAX)],
        );
        assert_eq!(d.total_delta, i64::MAX);
    }
}
