use crate::output::{print_json, print_table};
use clanwatch_core::snapshot::SnapshotStore;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum SnapshotSubcommand {
    /// Show the latest capture, or a labeled one
    Show {
        #[arg(long)]
        label: Option<String>,
    },
}

pub fn run(root: &Path, subcommand: SnapshotSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        SnapshotSubcommand::Show { label } => show(root, label.as_deref(), json),
    }
}

fn show(root: &Path, label: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let mut kv = super::open_store(root)?;
    let store = SnapshotStore::new(&mut kv);
    let snapshot = match label {
        Some(l) => store.load_at(l)?,
        None => store.load_prev_and_curr()?.curr,
    };
    let Some(snapshot) = snapshot else {
        match label {
            Some(l) => anyhow::bail!("no capture labeled '{l}'"),
            None => anyhow::bail!("no capture yet: run 'clanwatch stats'"),
        }
    };

    if json {
        return print_json(&snapshot);
    }
    let at = snapshot
        .captured_at
        .with_timezone(&config.schedule.offset()?)
        .format("%Y-%m-%d %H:%M %:z");
    println!("Captured {at}, {} members", snapshot.entries.len());
    let rows = snapshot
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| vec![(i + 1).to_string(), e.identity.clone(), e.points.to_string()])
        .collect();
    print_table(&["#", "MEMBER", "POINTS"], rows);
    Ok(())
}
