//! The two scheduled pipelines and their manual entry points.
//!
//! - **stats**: fetch → labeled compare/save → alternating save → diff and
//!   leavers against the previous capture → report channel.
//! - **officer**: fetch → watchdog pass → notice delivery → once-a-day
//!   digest of tracked members to the officer group.
//!
//! Every store mutation happens under the single [`Context::store`] lock,
//! so a manual trigger racing the scheduler cannot pair the wrong slots.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use clanwatch_core::config::{Config, StatsTarget};
use clanwatch_core::diff::{diff, find_leavers};
use clanwatch_core::paths;
use clanwatch_core::schedule::ScheduleTarget;
use clanwatch_core::snapshot::SnapshotStore;
use clanwatch_core::store::{get_json, set_json, KvStore, RedbStore};
use clanwatch_core::types::Snapshot;
use clanwatch_core::watchdog::{Notice, Watchdog};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::report::{self, Comparison, StatsReport};
use crate::scheduler::{Clock, Job, SystemClock};
use crate::source::{HttpRosterSource, RetryPolicy, RetryingSource, RosterSource};

const ANNOUNCED_KEY: &str = "pipeline/announced_on";

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a pipeline run needs, shared by the scheduler and manual
/// triggers.
pub struct Context {
    pub config: Config,
    /// redb calls run inline on the runtime while this is held. Each is a
    /// single small transaction, so it stays off `spawn_blocking`.
    pub store: Mutex<Box<dyn KvStore>>,
    /// Held across the digest check, send and mark.
    digest_gate: Mutex<()>,
    pub source: RetryingSource,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Context {
    pub fn new(
        config: Config,
        store: Box<dyn KvStore>,
        source: Box<dyn RosterSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = RetryPolicy::from(&config.source);
        Self {
            config,
            store: Mutex::new(store),
            digest_gate: Mutex::new(()),
            source: RetryingSource::new(source, policy),
            notifier,
            clock,
        }
    }

    /// Production wiring: redb under `root`, HTTP source, webhook notifier
    /// (or log-only when no webhook is configured), system clock.
    pub fn open(root: &Path, config: Config) -> Result<Self, EngineError> {
        let store = RedbStore::open(&paths::state_db_path(root))?;
        let source = HttpRosterSource::new(config.source.base_url.clone());
        let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(LogNotifier),
        };
        Ok(Self::new(
            config,
            Box::new(store),
            Box::new(source),
            notifier,
            Arc::new(SystemClock),
        ))
    }
}

fn compare(baseline: &Snapshot, current: &Snapshot, name: &str) -> Comparison {
    Comparison {
        baseline: name.to_string(),
        baseline_at: baseline.captured_at,
        diff: diff(&baseline.entries, &current.entries),
        leavers: find_leavers(&baseline.entries, &current.entries),
    }
}

// ---------------------------------------------------------------------------
// Stats pipeline
// ---------------------------------------------------------------------------

/// Capture the roster and report changes. Returns `None` when the source
/// had no data this cycle; nothing is saved in that case.
pub async fn run_stats(
    ctx: &Context,
    target: Option<&StatsTarget>,
) -> Result<Option<StatsReport>, EngineError> {
    let roster = ctx.source.fetch(&ctx.config.clan_id).await;
    if roster.is_empty() {
        tracing::warn!(clan_id = %ctx.config.clan_id, "no roster data, skipping stats capture");
        return Ok(None);
    }
    let snapshot = Snapshot::new(ctx.clock.now(), roster);
    let label = target.and_then(|t| t.label.clone());

    let report = {
        let mut kv = ctx.store.lock().await;
        let mut store = SnapshotStore::new(&mut **kv);

        // Read the baseline before a same-label save replaces it.
        let since_label = match target.and_then(|t| t.compare_to.as_deref()) {
            Some(other) => store
                .load_at(other)?
                .map(|baseline| compare(&baseline, &snapshot, other)),
            None => None,
        };
        if let Some(label) = &label {
            store.save_at(label, &snapshot)?;
        }
        store.save(&snapshot)?;
        let pair = store.load_prev_and_curr()?;

        StatsReport {
            captured_at: snapshot.captured_at,
            members: snapshot.entries.len(),
            label,
            since_last: pair
                .prev
                .map(|prev| compare(&prev, &snapshot, "previous capture")),
            since_label,
        }
    };

    tracing::info!(
        members = report.members,
        label = report.label.as_deref().unwrap_or("-"),
        "stats captured"
    );
    let text = report::render_stats(&report, ctx.config.schedule.offset()?);
    if let Err(e) = ctx.notifier.post_report(&text).await {
        tracing::warn!(error = %e, "failed to post stats report");
    }
    Ok(Some(report))
}

/// Diff two labeled captures without fetching anything.
pub async fn compare_labels(
    ctx: &Context,
    older: &str,
    newer: &str,
) -> Result<Option<Comparison>, EngineError> {
    let mut kv = ctx.store.lock().await;
    let store = SnapshotStore::new(&mut **kv);
    let (Some(a), Some(b)) = (store.load_at(older)?, store.load_at(newer)?) else {
        return Ok(None);
    };
    Ok(Some(compare(&a, &b, older)))
}

// ---------------------------------------------------------------------------
// Officer pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WatchdogRun {
    pub notices: usize,
    /// Officer notifications that were actually delivered.
    pub officer_deliveries: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfficerRun {
    #[serde(flatten)]
    pub watchdog: WatchdogRun,
    pub digest_sent: bool,
}

/// One watchdog pass: fetch, evaluate, persist, deliver.
pub async fn run_watchdog(ctx: &Context) -> Result<WatchdogRun, EngineError> {
    let roster = ctx.source.fetch(&ctx.config.clan_id).await;
    if roster.is_empty() {
        tracing::warn!("no roster data, tracked points frozen for this pass");
    }
    let now = ctx.clock.now();
    let notices = {
        let mut kv = ctx.store.lock().await;
        Watchdog::new(&mut **kv).pass(&roster, now, &ctx.config.watchdog.policy)?
    };
    let delivered = deliver(ctx, &notices).await;
    tracing::info!(notices = notices.len(), officer_deliveries = delivered, "watchdog pass done");
    Ok(WatchdogRun {
        notices: notices.len(),
        officer_deliveries: delivered,
    })
}

async fn deliver(ctx: &Context, notices: &[Notice]) -> usize {
    let policy = &ctx.config.watchdog.policy;
    let role = &ctx.config.watchdog.officer_role;
    let mut delivered = 0;
    for notice in notices {
        let text = report::notice_text(notice, policy);
        if let Err(e) = ctx.notifier.send_direct(notice.recipient(), &text).await {
            tracing::warn!(actor = notice.recipient(), error = %e, "direct notice not delivered");
        }
        if notice.notifies_officers() {
            match ctx.notifier.send_to_role_group(role, &text).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(role = %role, error = %e, "officer notice not delivered"),
            }
        }
    }
    delivered
}

/// Watchdog pass followed by the daily officer digest.
pub async fn run_officer(ctx: &Context) -> Result<OfficerRun, EngineError> {
    let watchdog = run_watchdog(ctx).await?;
    let digest_sent = announce_digest(ctx).await?;
    Ok(OfficerRun {
        watchdog,
        digest_sent,
    })
}

/// Send the tracked-member digest unless it already went out today (local
/// date). The day is only marked once the send succeeds.
async fn announce_digest(ctx: &Context) -> Result<bool, EngineError> {
    let _gate = ctx.digest_gate.lock().await;
    let now = ctx.clock.now();
    let today = now.with_timezone(&ctx.config.schedule.offset()?).date_naive();

    let members = {
        let mut kv = ctx.store.lock().await;
        let announced: Option<NaiveDate> = get_json(&**kv, ANNOUNCED_KEY)?;
        if announced == Some(today) {
            return Ok(false);
        }
        Watchdog::new(&mut **kv).list()?
    };
    if members.is_empty() {
        return Ok(false);
    }

    let text = report::digest_text(&members, now, &ctx.config.watchdog.policy);
    if let Err(e) = ctx
        .notifier
        .send_to_role_group(&ctx.config.watchdog.officer_role, &text)
        .await
    {
        tracing::warn!(error = %e, "officer digest not delivered");
        return Ok(false);
    }

    let mut kv = ctx.store.lock().await;
    set_json(&mut **kv, ANNOUNCED_KEY, &today)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

pub struct StatsJob(pub Arc<Context>);

#[async_trait]
impl Job for StatsJob {
    fn name(&self) -> &str {
        "stats"
    }

    fn targets(&self) -> Vec<ScheduleTarget> {
        self.0.config.schedule.stats_times()
    }

    async fn run(&self, target: usize) -> Result<(), EngineError> {
        let ctx = &self.0;
        run_stats(ctx, ctx.config.schedule.stats.get(target)).await?;
        Ok(())
    }
}

pub struct OfficerJob(pub Arc<Context>);

#[async_trait]
impl Job for OfficerJob {
    fn name(&self) -> &str {
        "officer"
    }

    fn targets(&self) -> Vec<ScheduleTarget> {
        self.0.config.schedule.officer.clone()
    }

    async fn run(&self, _target: usize) -> Result<(), EngineError> {
        run_officer(&self.0).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use clanwatch_core::store::MemoryStore;
    use clanwatch_core::types::{RosterEntry, WarnStage};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedSource(StdMutex<VecDeque<Vec<RosterEntry>>>);

    #[async_trait]
    impl RosterSource for ScriptedSource {
        async fn fetch_roster(&self, _clan_id: &str) -> Result<Vec<RosterEntry>, EngineError> {
            Ok(self.0.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Direct(String),
        Role(String),
        Report,
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<Sent>>,
        fail_roles: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_direct(&self, actor_id: &str, _text: &str) -> Result<(), EngineError> {
            self.sent.lock().unwrap().push(Sent::Direct(actor_id.into()));
            Ok(())
        }

        async fn send_to_role_group(&self, role: &str, _text: &str) -> Result<(), EngineError> {
            tokio::task::yield_now().await;
            if self.fail_roles {
                return Err(EngineError::Notify("role group unreachable".into()));
            }
            self.sent.lock().unwrap().push(Sent::Role(role.into()));
            Ok(())
        }

        async fn post_report(&self, _text: &str) -> Result<(), EngineError> {
            self.sent.lock().unwrap().push(Sent::Report);
            Ok(())
        }
    }

    struct FixedClock(StdMutex<DateTime<Utc>>);

    impl FixedClock {
        fn set(&self, at: DateTime<Utc>) {
            *self.0.lock().unwrap() = at;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 10, 13, 50, 0).unwrap()
    }

    fn ctx_with(
        rosters: Vec<Vec<RosterEntry>>,
        notifier: Arc<RecordingNotifier>,
    ) -> (Context, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock(StdMutex::new(t0())));
        let ctx = Context::new(
            Config::new("c1"),
            Box::new(MemoryStore::new()),
            Box::new(ScriptedSource(StdMutex::new(rosters.into()))),
            notifier,
            clock.clone(),
        );
        (ctx, clock)
    }

    fn e(name: &str, points: u64) -> RosterEntry {
        RosterEntry::new(name, points)
    }

    #[tokio::test]
    async fn stats_diffs_against_previous_capture() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (ctx, clock) = ctx_with(
            vec![
                vec![e("Ash", 100), e("Birch", 50)],
                vec![e("ash", 130), e("Cedar", 10)],
            ],
            notifier.clone(),
        );

        let first = run_stats(&ctx, None).await.unwrap().unwrap();
        assert!(first.since_last.is_none());

        clock.set(t0() + Duration::hours(9));
        let second = run_stats(&ctx, None).await.unwrap().unwrap();
        let cmp = second.since_last.unwrap();
        assert_eq!(cmp.baseline_at, t0());
        assert_eq!(cmp.diff.total_delta, 30);
        assert_eq!(cmp.leavers, vec![e("Birch", 50)]);
        assert_eq!(
            notifier.sent.lock().unwrap().as_slice(),
            &[Sent::Report, Sent::Report]
        );
    }

    #[tokio::test]
    async fn empty_fetch_saves_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (ctx, _clock) = ctx_with(vec![vec![e("Ash", 1)], vec![]], notifier.clone());

        run_stats(&ctx, None).await.unwrap().unwrap();
        assert!(run_stats(&ctx, None).await.unwrap().is_none());

        let mut kv = ctx.store.lock().await;
        let pair = SnapshotStore::new(&mut **kv).load_prev_and_curr().unwrap();
        assert!(pair.prev.is_none());
        assert_eq!(pair.curr.unwrap().entries, vec![e("Ash", 1)]);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn labeled_target_compares_before_overwriting() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (ctx, clock) = ctx_with(
            vec![vec![e("Ash", 100)], vec![e("Ash", 160)]],
            notifier,
        );
        let evening = ctx.config.schedule.stats[0].clone();
        assert_eq!(evening.label.as_deref(), Some("evening"));

        let first = run_stats(&ctx, Some(&evening)).await.unwrap().unwrap();
        assert!(first.since_label.is_none());

        clock.set(t0() + Duration::days(1));
        let second = run_stats(&ctx, Some(&evening)).await.unwrap().unwrap();
        let daily = second.since_label.unwrap();
        assert_eq!(daily.baseline, "evening");
        assert_eq!(daily.diff.total_delta, 60);

        let stored = compare_labels(&ctx, "evening", "evening").await.unwrap().unwrap();
        assert_eq!(stored.diff.total_delta, 0);
        assert!(compare_labels(&ctx, "evening", "night").await.unwrap().is_none());
    }

    async fn enroll(ctx: &Context, name: &str, days_ago: i64) {
        let mut kv = ctx.store.lock().await;
        Watchdog::new(&mut **kv)
            .enroll(name, "42", t0() - Duration::days(days_ago), 0)
            .unwrap();
    }

    #[tokio::test]
    async fn watchdog_counts_delivered_officer_notices() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (ctx, _clock) = ctx_with(vec![vec![e("Ash", 10)]], notifier.clone());
        enroll(&ctx, "Ash", 8).await;

        let run = run_watchdog(&ctx).await.unwrap();
        assert_eq!(run.notices, 1);
        assert_eq!(run.officer_deliveries, 1);
        assert_eq!(
            notifier.sent.lock().unwrap().as_slice(),
            &[Sent::Direct("42".into()), Sent::Role("officer".into())]
        );

        let run = run_watchdog(&ctx).await.unwrap();
        assert_eq!(run, WatchdogRun::default());
    }

    #[tokio::test]
    async fn failed_officer_delivery_does_not_stop_the_pass() {
        let notifier = Arc::new(RecordingNotifier {
            fail_roles: true,
            ..Default::default()
        });
        let (ctx, _clock) = ctx_with(vec![], notifier.clone());
        enroll(&ctx, "Ash", 8).await;
        enroll(&ctx, "Birch", 25).await;

        let run = run_watchdog(&ctx).await.unwrap();
        assert_eq!(run.officer_deliveries, 0);
        // Ash: first warning. Birch: both warnings and the removal.
        assert_eq!(run.notices, 4);
        let directs = notifier
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Sent::Direct(_)))
            .count();
        assert_eq!(directs, 4);

        let mut kv = ctx.store.lock().await;
        let left = Watchdog::new(&mut **kv).list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].warn_stage, WarnStage::Warned7);
    }

    #[tokio::test]
    async fn digest_goes_out_once_per_local_day() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (ctx, clock) = ctx_with(vec![], notifier.clone());
        enroll(&ctx, "Ash", 1).await;

        assert!(run_officer(&ctx).await.unwrap().digest_sent);
        assert!(!run_officer(&ctx).await.unwrap().digest_sent);

        clock.set(t0() + Duration::days(1));
        assert!(run_officer(&ctx).await.unwrap().digest_sent);
        let roles = notifier
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Sent::Role(_)))
            .count();
        assert_eq!(roles, 2);
    }

    #[tokio::test]
    async fn concurrent_officer_runs_send_one_digest() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (ctx, _clock) = ctx_with(vec![], notifier.clone());
        enroll(&ctx, "Ash", 1).await;

        let (a, b) = tokio::join!(run_officer(&ctx), run_officer(&ctx));
        let sent = [a.unwrap().digest_sent, b.unwrap().digest_sent];
        assert_eq!(sent.iter().filter(|s| **s).count(), 1);
        assert_eq!(
            notifier.sent.lock().unwrap().as_slice(),
            &[Sent::Role("officer".into())]
        );
    }

    #[tokio::test]
    async fn no_digest_without_tracked_members() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (ctx, _clock) = ctx_with(vec![], notifier.clone());
        let run = run_officer(&ctx).await.unwrap();
        assert_eq!(run, OfficerRun::default());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
