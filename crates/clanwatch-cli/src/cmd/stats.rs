use crate::output::print_json;
use clanwatch_core::schedule::ScheduleTarget;
use clanwatch_engine::pipeline::run_stats;
use clanwatch_engine::report::render_stats;
use std::path::Path;

pub fn run(root: &Path, target: Option<&str>, json: bool) -> anyhow::Result<()> {
    let ctx = super::open_context(root)?;

    let target = match target {
        Some(at) => {
            let at: ScheduleTarget = at.parse()?;
            let found = ctx.config.schedule.stats.iter().find(|t| t.at == at);
            match found {
                Some(t) => Some(t.clone()),
                None => anyhow::bail!("no stats target configured at {at}"),
            }
        }
        None => None,
    };

    let report = super::block_on(run_stats(&ctx, target.as_ref()))??;
    let Some(report) = report else {
        anyhow::bail!(
            "no roster data for clan '{}': source unavailable or empty, nothing saved",
            ctx.config.clan_id
        );
    };

    if json {
        print_json(&report)?;
    } else {
        print!("{}", render_stats(&report, ctx.config.schedule.offset()?));
    }
    Ok(())
}
