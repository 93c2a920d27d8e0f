//! Wall-clock target arithmetic for the scheduler.
//!
//! Targets are `{hour, minute}` in a fixed UTC offset (no DST). The next
//! fire is always computed from the current wall-clock time, never
//! accumulated, so an overrunning job cannot drift the schedule.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTarget {
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleTarget {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        let target = Self { hour, minute };
        target.time()?;
        Ok(target)
    }

    pub fn time(&self) -> Result<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or(CoreError::InvalidTarget {
            hour: self.hour,
            minute: self.minute,
        })
    }
}

impl fmt::Display for ScheduleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ScheduleTarget {
    type Err = CoreError;

    /// Parses `HH:MM`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidConfig(format!("expected HH:MM, got {s:?}"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = h.parse().map_err(|_| invalid())?;
        let minute = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

pub fn fixed_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or(CoreError::InvalidOffset(hours))
}

/// The soonest upcoming fire among `targets`, with the index of the target
/// that produced it. A target at or before `now` rolls to the next day.
pub fn next_fire(
    targets: &[ScheduleTarget],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<(usize, DateTime<Utc>)> {
    let local = now.with_timezone(&offset);
    let mut best: Option<(usize, DateTime<Utc>)> = None;

    for (idx, target) in targets.iter().enumerate() {
        let naive = local.date_naive().and_time(target.time()?);
        let mut candidate = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or(CoreError::InvalidTarget {
                hour: target.hour,
                minute: target.minute,
            })?;
        if candidate <= local {
            candidate = candidate
                .checked_add_days(Days::new(1))
                .ok_or(CoreError::InvalidTarget {
                    hour: target.hour,
                    minute: target.minute,
                })?;
        }
        let candidate = candidate.with_timezone(&Utc);
        if best.map_or(true, |(_, at)| candidate < at) {
            best = Some((idx, candidate));
        }
    }

    best.ok_or(CoreError::NoTargets)
}

/// Time to wait from `now` until the soonest target.
pub fn compute_next_delay(
    targets: &[ScheduleTarget],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Duration> {
    let (_, at) = next_fire(targets, now, offset)?;
    Ok((at - now).to_std().unwrap_or(Duration::ZERO))
}
