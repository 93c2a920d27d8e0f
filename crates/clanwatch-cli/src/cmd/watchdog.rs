use crate::output::print_json;
use clanwatch_engine::pipeline::{run_officer, run_watchdog, OfficerRun};
use std::path::Path;

pub fn run(root: &Path, digest: bool, json: bool) -> anyhow::Result<()> {
    let ctx = super::open_context(root)?;
    let outcome = if digest {
        super::block_on(run_officer(&ctx))??
    } else {
        OfficerRun {
            watchdog: super::block_on(run_watchdog(&ctx))??,
            digest_sent: false,
        }
    };

    if json {
        print_json(&outcome)?;
        return Ok(());
    }
    println!(
        "Watchdog pass: {} notice(s), {} officer notification(s) delivered",
        outcome.watchdog.notices, outcome.watchdog.officer_deliveries
    );
    if digest {
        if outcome.digest_sent {
            println!("Officer digest sent");
        } else {
            println!("Officer digest not sent (already sent today, nobody tracked, or delivery failed)");
        }
    }
    Ok(())
}
