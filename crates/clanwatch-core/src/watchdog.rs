//! Tracked-member escalation state machine.
//!
//! A tracked member is `Active(warn_stage)` until it graduates (points reach
//! the success threshold), ages past the hard ceiling, or is unenrolled.
//! Each pass walks the tracked set in enrollment order:
//!
//! 1. refresh `last_known_points` from the roster (normalized-name match);
//! 2. at or above the threshold: graduate, and tell the enrolling actor
//!    only if a warning had already gone out;
//! 3. otherwise fire the first and second warnings once each, both in the
//!    same pass if intermediate runs were missed;
//! 4. at or past the age ceiling, graduated or not: remove with exactly one
//!    forced-removal notice.
//!
//! The pass only plans notices and persists the new state. Delivery belongs
//! to the caller, which treats every failed send as non-fatal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::normalize::normalize;
use crate::store::{get_json, set_json, KvStore};
use crate::types::{RosterEntry, TrackedMember, WarnStage};

const TRACKED_KEY: &str = "tracked";

// ---------------------------------------------------------------------------
// WatchdogPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogPolicy {
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u64,
    #[serde(default = "default_warn_first_days")]
    pub warn_first_days: i64,
    #[serde(default = "default_warn_second_days")]
    pub warn_second_days: i64,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
}

fn default_success_threshold() -> u64 {
    700
}

fn default_warn_first_days() -> i64 {
    7
}

fn default_warn_second_days() -> i64 {
    14
}

fn default_max_age_days() -> i64 {
    21
}

impl Default for WatchdogPolicy {
    fn default() -> Self {
        Self {
            success_threshold: default_success_threshold(),
            warn_first_days: default_warn_first_days(),
            warn_second_days: default_warn_second_days(),
            max_age_days: default_max_age_days(),
        }
    }
}

// ---------------------------------------------------------------------------
// Notice
// ---------------------------------------------------------------------------

/// Something the watchdog wants said. `member` is the state at the moment
/// the notice was raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Graduated {
        member: TrackedMember,
    },
    Warning {
        member: TrackedMember,
        stage: WarnStage,
        age_days: i64,
    },
    ForcedRemoval {
        member: TrackedMember,
        age_days: i64,
    },
}

impl Notice {
    pub fn member(&self) -> &TrackedMember {
        match self {
            Notice::Graduated { member }
            | Notice::Warning { member, .. }
            | Notice::ForcedRemoval { member, .. } => member,
        }
    }

    /// Actor id that receives the direct message.
    pub fn recipient(&self) -> &str {
        &self.member().enrolled_by
    }

    /// Warnings also go to every officer-capability holder.
    pub fn notifies_officers(&self) -> bool {
        matches!(self, Notice::Warning { .. })
    }
}

// ---------------------------------------------------------------------------
// Pass evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    /// Members still tracked after the pass, in their original order.
    pub retained: Vec<TrackedMember>,
    pub notices: Vec<Notice>,
}

/// Run one pass over `members` against `roster` at `now`.
///
/// An empty roster leaves every `last_known_points` untouched; age-based
/// transitions still apply.
pub fn evaluate(
    members: Vec<TrackedMember>,
    roster: &[RosterEntry],
    now: DateTime<Utc>,
    policy: &WatchdogPolicy,
) -> PassOutcome {
    let mut points_by_name: HashMap<String, u64> = HashMap::with_capacity(roster.len());
    for entry in roster {
        points_by_name
            .entry(normalize(&entry.identity))
            .or_insert(entry.points);
    }

    let mut outcome = PassOutcome::default();
    for mut member in members {
        if let Some(points) = points_by_name.get(&normalize(&member.identity)) {
            member.last_known_points = *points;
        }

        let age_days = member.age_days(now);
        let graduated = member.last_known_points >= policy.success_threshold;
        if graduated {
            // Members that never drew a warning leave silently.
            if member.warn_stage != WarnStage::None {
                outcome.notices.push(Notice::Graduated {
                    member: member.clone(),
                });
            }
            tracing::info!(identity = %member.identity, points = member.last_known_points, "tracked member graduated");
        } else {
            if age_days >= policy.warn_first_days && member.warn_stage == WarnStage::None {
                member.warn_stage = WarnStage::Warned7;
                outcome.notices.push(Notice::Warning {
                    member: member.clone(),
                    stage: WarnStage::Warned7,
                    age_days,
                });
            }
            if age_days >= policy.warn_second_days && member.warn_stage != WarnStage::Warned14 {
                member.warn_stage = WarnStage::Warned14;
                outcome.notices.push(Notice::Warning {
                    member: member.clone(),
                    stage: WarnStage::Warned14,
                    age_days,
                });
            }
        }

        // The ceiling holds whatever the points or stage.
        if age_days >= policy.max_age_days {
            tracing::info!(identity = %member.identity, age_days, "tracked member removed at age ceiling");
            outcome
                .notices
                .push(Notice::ForcedRemoval { member, age_days });
            continue;
        }
        if graduated {
            continue;
        }

        outcome.retained.push(member);
    }
    outcome
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Tracked-member collection over a borrowed key-value store.
pub struct Watchdog<'a> {
    kv: &'a mut dyn KvStore,
}

impl<'a> Watchdog<'a> {
    pub fn new(kv: &'a mut dyn KvStore) -> Self {
        Self { kv }
    }

    /// All tracked members in enrollment order. A corrupt record reads as
    /// an empty set.
    pub fn list(&self) -> Result<Vec<TrackedMember>> {
        Ok(get_json(&*self.kv, TRACKED_KEY)?.unwrap_or_default())
    }

    fn save(&mut self, members: &[TrackedMember]) -> Result<()> {
        set_json(self.kv, TRACKED_KEY, members)
    }

    /// Start tracking `identity`. Fails if a member with the same
    /// normalized name is already tracked.
    pub fn enroll(
        &mut self,
        identity: &str,
        enrolled_by: &str,
        now: DateTime<Utc>,
        current_points: u64,
    ) -> Result<TrackedMember> {
        let mut members = self.list()?;
        let key = normalize(identity);
        if key.is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "cannot track blank member name {identity:?}"
            )));
        }
        if members.iter().any(|m| normalize(&m.identity) == key) {
            return Err(CoreError::AlreadyTracked(identity.to_string()));
        }
        let member = TrackedMember {
            identity: identity.to_string(),
            enrolled_at: now,
            enrolled_by: enrolled_by.to_string(),
            warn_stage: WarnStage::None,
            last_known_points: current_points,
        };
        members.push(member.clone());
        self.save(&members)?;
        tracing::info!(identity, enrolled_by, "member enrolled");
        Ok(member)
    }

    /// Stop tracking `identity`, returning the removed record.
    pub fn unenroll(&mut self, identity: &str) -> Result<TrackedMember> {
        let mut members = self.list()?;
        let key = normalize(identity);
        let pos = members
            .iter()
            .position(|m| normalize(&m.identity) == key)
            .ok_or_else(|| CoreError::NotTracked(identity.to_string()))?;
        let removed = members.remove(pos);
        self.save(&members)?;
        tracing::info!(identity = %removed.identity, "member unenrolled");
        Ok(removed)
    }

    /// Evaluate every tracked member, persist the surviving set and return
    /// the notices to deliver.
    pub fn pass(
        &mut self,
        roster: &[RosterEntry],
        now: DateTime<Utc>,
        policy: &WatchdogPolicy,
    ) -> Result<Vec<Notice>> {
        let members = self.list()?;
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let outcome = evaluate(members, roster, now, policy);
        self.save(&outcome.retained)?;
        Ok(outcome.notices)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 30, 14, 0, 0).unwrap()
    }

    fn member(name: &str, days_ago: i64, stage: WarnStage, points: u64) -> TrackedMember {
        TrackedMember {
            identity: name.to_string(),
            enrolled_at: now() - Duration::days(days_ago) - Duration::minutes(5),
            enrolled_by: "officer-1".to_string(),
            warn_stage: stage,
            last_known_points: points,
        }
    }

    fn officer_batches(notices: &[Notice]) -> usize {
        notices.iter().filter(|n| n.notifies_officers()).count()
    }

    #[test]
    fn first_warning_fires_once() {
        let policy = WatchdogPolicy::default();
        let roster = vec![RosterEntry::new("Ash", 120)];

        let first = evaluate(vec![member("Ash", 8, WarnStage::None, 0)], &roster, now(), &policy);
        assert_eq!(officer_batches(&first.notices), 1);
        assert_eq!(first.retained[0].warn_stage, WarnStage::Warned7);
        assert_eq!(first.retained[0].last_known_points, 120);

        let second = evaluate(first.retained, &roster, now(), &policy);
        assert!(second.notices.is_empty());
        assert_eq!(second.retained[0].warn_stage, WarnStage::Warned7);
    }

    #[test]
    fn missed_runs_fire_both_warnings() {
        let policy = WatchdogPolicy::default();
        let out = evaluate(vec![member("Ash", 15, WarnStage::None, 0)], &[], now(), &policy);
        let stages: Vec<WarnStage> = out
            .notices
            .iter()
            .filter_map(|n| match n {
                Notice::Warning { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect();
        assert_eq!(stages, vec![WarnStage::Warned7, WarnStage::Warned14]);
        assert_eq!(out.retained[0].warn_stage, WarnStage::Warned14);
    }

    #[test]
    fn young_member_is_left_alone() {
        let policy = WatchdogPolicy::default();
        let out = evaluate(vec![member("Ash", 6, WarnStage::None, 10)], &[], now(), &policy);
        assert!(out.notices.is_empty());
        assert_eq!(out.retained.len(), 1);
    }

    #[test]
    fn age_ceiling_removes_with_one_notice() {
        let policy = WatchdogPolicy::default();
        let out = evaluate(
            vec![member("Ash", 22, WarnStage::Warned14, 650)],
            &[RosterEntry::new("ash", 690)],
            now(),
            &policy,
        );
        assert!(out.retained.is_empty());
        let removals = out
            .notices
            .iter()
            .filter(|n| matches!(n, Notice::ForcedRemoval { .. }))
            .count();
        assert_eq!(removals, 1);
        assert_eq!(out.notices.len(), 1);
    }

    fn removals(notices: &[Notice]) -> usize {
        notices
            .iter()
            .filter(|n| matches!(n, Notice::ForcedRemoval { .. }))
            .count()
    }

    #[test]
    fn age_ceiling_applies_to_graduates_too() {
        let policy = WatchdogPolicy::default();
        let roster = [RosterEntry::new("Ash", 800)];

        let silent = evaluate(vec![member("Ash", 22, WarnStage::None, 0)], &roster, now(), &policy);
        assert!(silent.retained.is_empty());
        assert_eq!(removals(&silent.notices), 1);
        assert_eq!(silent.notices.len(), 1);

        let warned = evaluate(vec![member("Ash", 22, WarnStage::Warned7, 0)], &roster, now(), &policy);
        assert!(warned.retained.is_empty());
        assert_eq!(removals(&warned.notices), 1);
        assert!(matches!(
            warned.notices.as_slice(),
            [Notice::Graduated { .. }, Notice::ForcedRemoval { .. }]
        ));
    }

    #[test]
    fn warned_member_graduates_with_notice() {
        let policy = WatchdogPolicy::default();
        let out = evaluate(
            vec![member("Ash", 9, WarnStage::Warned7, 500)],
            &[RosterEntry::new("ASH", 700)],
            now(),
            &policy,
        );
        assert!(out.retained.is_empty());
        assert!(matches!(out.notices.as_slice(), [Notice::Graduated { .. }]));
        assert_eq!(out.notices[0].recipient(), "officer-1");
        assert!(!out.notices[0].notifies_officers());
    }

    #[test]
    fn unwarned_member_graduates_silently() {
        let policy = WatchdogPolicy::default();
        let out = evaluate(
            vec![member("Ash", 3, WarnStage::None, 500)],
            &[RosterEntry::new("Ash", 800)],
            now(),
            &policy,
        );
        assert!(out.retained.is_empty());
        assert!(out.notices.is_empty());
    }

    #[test]
    fn empty_roster_freezes_points() {
        let policy = WatchdogPolicy::default();
        let out = evaluate(vec![member("Ash", 1, WarnStage::None, 321)], &[], now(), &policy);
        assert_eq!(out.retained[0].last_known_points, 321);
    }

    #[test]
    fn enroll_rejects_normalized_duplicates() {
        let mut kv = MemoryStore::new();
        let mut dog = Watchdog::new(&mut kv);
        dog.enroll("John Smith", "42", now(), 10).unwrap();
        let err = dog.enroll("johnsmith", "43", now(), 10).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyTracked(_)));
        assert_eq!(dog.list().unwrap().len(), 1);
    }

    #[test]
    fn unenroll_by_normalized_name() {
        let mut kv = MemoryStore::new();
        let mut dog = Watchdog::new(&mut kv);
        dog.enroll("John Smith", "42", now(), 10).unwrap();
        let removed = dog.unenroll("JOHNSMITH").unwrap();
        assert_eq!(removed.identity, "John Smith");
        assert!(dog.list().unwrap().is_empty());
        assert!(matches!(
            dog.unenroll("John Smith").unwrap_err(),
            CoreError::NotTracked(_)
        ));
    }

    #[test]
    fn pass_persists_stage_changes() {
        let mut kv = MemoryStore::new();
        let mut dog = Watchdog::new(&mut kv);
        dog.enroll("Ash", "42", now() - Duration::days(8), 0).unwrap();
        dog.enroll("Birch", "42", now() - Duration::days(30), 0).unwrap();

        let policy = WatchdogPolicy::default();
        let notices = dog.pass(&[], now(), &policy).unwrap();
        assert_eq!(officer_batches(&notices), 3);

        let remaining = dog.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].warn_stage, WarnStage::Warned7);

        let again = dog.pass(&[], now(), &policy).unwrap();
        assert!(again.is_empty());
    }
}
