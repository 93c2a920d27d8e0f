use crate::output::{print_json, print_table};
use chrono::Utc;
use clanwatch_core::schedule::{next_fire, ScheduleTarget};
use clap::Subcommand;
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand)]
pub enum ScheduleSubcommand {
    /// Show when each job fires next
    Next,
}

#[derive(Serialize)]
struct NextFire {
    job: &'static str,
    target: String,
    at: String,
    in_minutes: i64,
}

pub fn run(root: &Path, subcommand: ScheduleSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        ScheduleSubcommand::Next => next(root, json),
    }
}

fn next(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let offset = config.schedule.offset()?;
    let now = Utc::now();

    let jobs: [(&'static str, Vec<ScheduleTarget>); 2] = [
        ("stats", config.schedule.stats_times()),
        ("officer", config.schedule.officer.clone()),
    ];
    let mut fires = Vec::new();
    for (job, targets) in jobs {
        let (idx, at) = next_fire(&targets, now, offset)?;
        fires.push(NextFire {
            job,
            target: targets[idx].to_string(),
            at: at.with_timezone(&offset).to_rfc3339(),
            in_minutes: (at - now).num_minutes(),
        });
    }

    if json {
        return print_json(&fires);
    }
    let rows = fires
        .into_iter()
        .map(|f| vec![f.job.to_string(), f.target, f.at, format!("{}m", f.in_minutes)])
        .collect();
    print_table(&["JOB", "TARGET", "NEXT FIRE", "IN"], rows);
    Ok(())
}
