use crate::output::{print_json, print_table};
use chrono::Utc;
use clanwatch_core::normalize::normalize;
use clanwatch_core::snapshot::SnapshotStore;
use clanwatch_core::watchdog::Watchdog;
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand tree
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum TrackSubcommand {
    /// Start tracking a new member
    Add {
        /// Member name as it appears in the roster
        name: String,

        /// Actor who receives this member's notices
        #[arg(long = "by")]
        enrolled_by: String,

        /// Current points (default: from the latest capture, else 0)
        #[arg(long)]
        points: Option<u64>,
    },

    /// Stop tracking a member
    Remove {
        name: String,
    },

    /// List tracked members
    List,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcommand: TrackSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        TrackSubcommand::Add {
            name,
            enrolled_by,
            points,
        } => add(root, &name, &enrolled_by, points, json),
        TrackSubcommand::Remove { name } => remove(root, &name, json),
        TrackSubcommand::List => list(root, json),
    }
}

fn add(
    root: &Path,
    name: &str,
    enrolled_by: &str,
    points: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let mut kv = super::open_store(root)?;
    let points = match points {
        Some(p) => p,
        None => {
            let key = normalize(name);
            SnapshotStore::new(&mut kv)
                .load_prev_and_curr()?
                .curr
                .and_then(|s| s.entries.into_iter().find(|e| normalize(&e.identity) == key))
                .map_or(0, |e| e.points)
        }
    };

    let member = Watchdog::new(&mut kv).enroll(name, enrolled_by, Utc::now(), points)?;
    if json {
        print_json(&member)?;
    } else {
        println!(
            "Tracking {} ({} points), notices go to {}",
            member.identity, member.last_known_points, member.enrolled_by
        );
    }
    Ok(())
}

fn remove(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let mut kv = super::open_store(root)?;
    let removed = Watchdog::new(&mut kv).unenroll(name)?;
    if json {
        print_json(&removed)?;
    } else {
        println!("Stopped tracking {}", removed.identity);
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let mut kv = super::open_store(root)?;
    let members = Watchdog::new(&mut kv).list()?;

    if json {
        print_json(&members)?;
        return Ok(());
    }
    if members.is_empty() {
        println!("No tracked members.");
        return Ok(());
    }

    let now = Utc::now();
    let threshold = config.watchdog.policy.success_threshold;
    let rows = members
        .iter()
        .map(|m| {
            vec![
                m.identity.clone(),
                format!("{}/{threshold}", m.last_known_points),
                m.age_days(now).to_string(),
                m.warn_stage.to_string(),
                m.enrolled_by.clone(),
            ]
        })
        .collect();
    print_table(&["MEMBER", "POINTS", "DAYS", "STAGE", "ENROLLED BY"], rows);
    Ok(())
}
