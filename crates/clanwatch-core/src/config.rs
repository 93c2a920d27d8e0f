use crate::error::{CoreError, Result};
use crate::paths;
use crate::schedule::{fixed_offset, ScheduleTarget};
use crate::watchdog::WatchdogPolicy;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SourceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleConfig
// ---------------------------------------------------------------------------

/// A stats capture time. With `label` set the capture is also stored under
/// that label; with `compare_to` set it is diffed against the labeled
/// capture read *before* this one is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTarget {
    #[serde(flatten)]
    pub at: ScheduleTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_stats_targets")]
    pub stats: Vec<StatsTarget>,
    #[serde(default = "default_officer_targets")]
    pub officer: Vec<ScheduleTarget>,
}

fn default_utc_offset() -> i32 {
    3
}

fn default_stats_targets() -> Vec<StatsTarget> {
    vec![
        StatsTarget {
            at: ScheduleTarget {
                hour: 16,
                minute: 50,
            },
            label: Some("evening".to_string()),
            compare_to: Some("evening".to_string()),
        },
        StatsTarget {
            at: ScheduleTarget {
                hour: 1,
                minute: 20,
            },
            label: Some("night".to_string()),
            compare_to: Some("evening".to_string()),
        },
    ]
}

fn default_officer_targets() -> Vec<ScheduleTarget> {
    vec![ScheduleTarget {
        hour: 17,
        minute: 0,
    }]
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset(),
            stats: default_stats_targets(),
            officer: default_officer_targets(),
        }
    }
}

impl ScheduleConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        fixed_offset(self.utc_offset_hours)
    }

    pub fn stats_times(&self) -> Vec<ScheduleTarget> {
        self.stats.iter().map(|t| t.at).collect()
    }
}

// ---------------------------------------------------------------------------
// WatchdogConfig / NotifyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    #[serde(flatten)]
    pub policy: WatchdogPolicy,
    #[serde(default = "default_officer_role")]
    pub officer_role: String,
}

fn default_officer_role() -> String {
    "officer".to_string()
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            policy: WatchdogPolicy::default(),
            officer_role: default_officer_role(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Without a webhook, notices are only logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub clan_id: String,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(clan_id: impl Into<String>) -> Self {
        Self {
            version: 1,
            clan_id: clan_id.into(),
            source: SourceConfig::default(),
            schedule: ScheduleConfig::default(),
            watchdog: WatchdogConfig::default(),
            notify: NotifyConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(CoreError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        crate::io::atomic_write(&path, self.to_yaml()?.as_bytes())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if self.clan_id.trim().is_empty() {
            error("clan_id is empty".to_string());
        }
        if self.schedule.offset().is_err() {
            error(format!(
                "schedule.utc_offset_hours={} is out of range",
                self.schedule.utc_offset_hours
            ));
        }
        if self.schedule.stats.is_empty() {
            error("schedule.stats has no targets".to_string());
        }
        if self.schedule.officer.is_empty() {
            error("schedule.officer has no targets".to_string());
        }
        for target in self
            .schedule
            .stats
            .iter()
            .map(|t| &t.at)
            .chain(self.schedule.officer.iter())
        {
            if target.time().is_err() {
                error(format!("invalid schedule target {target}"));
            }
        }

        let p = &self.watchdog.policy;
        if !(p.warn_first_days <= p.warn_second_days && p.warn_second_days <= p.max_age_days) {
            error(format!(
                "watchdog days must be ordered: warn_first_days ({}) <= warn_second_days ({}) <= max_age_days ({})",
                p.warn_first_days, p.warn_second_days, p.max_age_days
            ));
        }

        // Labels that are compared against but never captured.
        for target in &self.schedule.stats {
            if let Some(other) = &target.compare_to {
                if !self
                    .schedule
                    .stats
                    .iter()
                    .any(|t| t.label.as_deref() == Some(other.as_str()))
                {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "stats target {} compares to label '{}' which no target captures",
                            target.at, other
                        ),
                    });
                }
            }
        }

        if self.notify.webhook_url.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "notify.webhook_url is not set; notices will only be logged".to_string(),
            });
        }
        if self.source.max_retries > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "source.max_retries={} (>10 is unusual)",
                    self.source.max_retries
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn errors(cfg: &Config) -> Vec<String> {
        cfg.validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("clan-7");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.clan_id, "clan-7");
        assert_eq!(parsed.schedule.stats, default_stats_targets());
        assert_eq!(parsed.watchdog.policy, WatchdogPolicy::default());
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("clan_id: abc\n").unwrap();
        assert_eq!(cfg.schedule.utc_offset_hours, 3);
        assert_eq!(cfg.schedule.officer, vec![ScheduleTarget { hour: 17, minute: 0 }]);
        assert_eq!(cfg.watchdog.policy.success_threshold, 700);
        assert_eq!(cfg.watchdog.officer_role, "officer");
        assert_eq!(cfg.source.max_retries, 3);
    }

    #[test]
    fn stats_target_yaml_is_flat() {
        let yaml = "hour: 16\nminute: 50\nlabel: evening\n";
        let target: StatsTarget = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(target.at, ScheduleTarget { hour: 16, minute: 50 });
        assert_eq!(target.label.as_deref(), Some("evening"));
        assert!(target.compare_to.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("clan-7");
        cfg.notify.webhook_url = Some("http://hooks.local/x".into());
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.notify.webhook_url.as_deref(), Some("http://hooks.local/x"));
    }

    #[test]
    fn load_without_config_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()).unwrap_err(),
            CoreError::NotInitialized
        ));
    }

    #[test]
    fn default_config_has_no_errors() {
        assert!(errors(&Config::new("clan-7")).is_empty());
    }

    #[test]
    fn validate_flags_bad_targets_and_thresholds() {
        let mut cfg = Config::new(" ");
        cfg.schedule.officer = vec![ScheduleTarget { hour: 25, minute: 0 }];
        cfg.watchdog.policy.warn_second_days = 30;
        let errs = errors(&cfg);
        assert!(errs.iter().any(|m| m.contains("clan_id")));
        assert!(errs.iter().any(|m| m.contains("25:00")));
        assert!(errs.iter().any(|m| m.contains("ordered")));
    }

    #[test]
    fn validate_flags_overflowing_offset() {
        let mut cfg = Config::new("clan-7");
        cfg.schedule.utc_offset_hours = i32::MAX;
        assert!(!errors(&cfg).is_empty());
    }

    #[test]
    fn validate_warns_on_dangling_compare_label() {
        let mut cfg = Config::new("clan-7");
        cfg.schedule.stats[1].compare_to = Some("dawn".into());
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("dawn")));
    }
}
