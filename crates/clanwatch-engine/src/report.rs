//! Plain-text rendering of reports and watchdog notices.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Utc};
use clanwatch_core::diff::Diff;
use clanwatch_core::types::{RosterEntry, TrackedMember, WarnStage};
use clanwatch_core::watchdog::{Notice, WatchdogPolicy};
use serde::Serialize;

/// One capture measured against an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// `previous capture` or the label of the baseline.
    pub baseline: String,
    pub baseline_at: DateTime<Utc>,
    pub diff: Diff,
    pub leavers: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub captured_at: DateTime<Utc>,
    pub members: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_last: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_label: Option<Comparison>,
}

fn stamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string()
}

fn signed(n: i64) -> String {
    if n > 0 {
        format!("+{n}")
    } else {
        n.to_string()
    }
}

pub fn render_comparison(out: &mut String, cmp: &Comparison, offset: FixedOffset) {
    let _ = writeln!(
        out,
        "Since {} ({}): total {}",
        cmp.baseline,
        stamp(cmp.baseline_at, offset),
        signed(cmp.diff.total_delta)
    );
    for change in cmp.diff.sorted_by_delta() {
        let _ = writeln!(out, "  {:>7}  {}", signed(change.delta), change.identity);
    }
    if cmp.diff.changes.is_empty() {
        out.push_str("  no point changes\n");
    }
    if !cmp.leavers.is_empty() {
        let names: Vec<String> = cmp
            .leavers
            .iter()
            .map(|l| format!("{} ({})", l.identity, l.points))
            .collect();
        let _ = writeln!(out, "  left: {}", names.join(", "));
    }
}

pub fn render_stats(report: &StatsReport, offset: FixedOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Clan stats {} (UTC{}), {} members",
        stamp(report.captured_at, offset),
        offset,
        report.members
    );
    match &report.since_last {
        Some(cmp) => render_comparison(&mut out, cmp, offset),
        None => out.push_str("First capture, nothing to compare yet\n"),
    }
    if let Some(cmp) = &report.since_label {
        render_comparison(&mut out, cmp, offset);
    }
    out
}

pub fn notice_text(notice: &Notice, policy: &WatchdogPolicy) -> String {
    match notice {
        Notice::Graduated { member } => format!(
            "{} reached {} points and is no longer tracked.",
            member.identity, member.last_known_points
        ),
        Notice::Warning {
            member,
            stage,
            age_days,
        } => {
            let which = match stage {
                WarnStage::Warned14 => "second warning",
                _ => "first warning",
            };
            format!(
                "{}: {} days tracked, {}/{} points ({which}). Tracking ends after {} days.",
                member.identity,
                age_days,
                member.last_known_points,
                policy.success_threshold,
                policy.max_age_days
            )
        }
        Notice::ForcedRemoval { member, age_days } => format!(
            "{} was removed from tracking after {} days with {}/{} points.",
            member.identity, age_days, member.last_known_points, policy.success_threshold
        ),
    }
}

pub fn digest_text(
    members: &[TrackedMember],
    now: DateTime<Utc>,
    policy: &WatchdogPolicy,
) -> String {
    let mut out = format!("Tracked members ({}):\n", members.len());
    for m in members {
        let _ = writeln!(
            out,
            "  {}  {}/{} points, day {}, {}",
            m.identity,
            m.last_known_points,
            policy.success_threshold,
            m.age_days(now),
            m.warn_stage
        );
    }
    out
}
