use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RosterEntry
// ---------------------------------------------------------------------------

/// One member's display name and current point total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub identity: String,
    pub points: u64,
}

impl RosterEntry {
    pub fn new(identity: impl Into<String>, points: u64) -> Self {
        Self {
            identity: identity.into(),
            points,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A roster captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub entries: Vec<RosterEntry>,
}

impl Snapshot {
    pub fn new(captured_at: DateTime<Utc>, entries: Vec<RosterEntry>) -> Self {
        Self {
            captured_at,
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// WarnStage
// ---------------------------------------------------------------------------

/// Which watchdog warnings have fired for a tracked member.
///
/// Only ever moves forward: `None → Warned7 → Warned14`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnStage {
    #[default]
    None,
    #[serde(rename = "warned_7")]
    Warned7,
    #[serde(rename = "warned_14")]
    Warned14,
}

impl WarnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarnStage::None => "none",
            WarnStage::Warned7 => "warned_7",
            WarnStage::Warned14 => "warned_14",
        }
    }
}

impl fmt::Display for WarnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TrackedMember
// ---------------------------------------------------------------------------

/// A roster member under point-growth monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedMember {
    pub identity: String,
    pub enrolled_at: DateTime<Utc>,
    /// Actor id of whoever enrolled the member; receives direct notices.
    pub enrolled_by: String,
    #[serde(default)]
    pub warn_stage: WarnStage,
    #[serde(default)]
    pub last_known_points: u64,
}

impl TrackedMember {
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.enrolled_at).num_days()
    }
}
