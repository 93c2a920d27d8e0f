use crate::output::print_json;
use clanwatch_engine::pipeline::compare_labels;
use clanwatch_engine::report::render_comparison;
use std::path::Path;

pub fn run(root: &Path, older: &str, newer: &str, json: bool) -> anyhow::Result<()> {
    let ctx = super::open_context(root)?;
    let Some(cmp) = super::block_on(compare_labels(&ctx, older, newer))?? else {
        anyhow::bail!("need captures labeled '{older}' and '{newer}'");
    };

    if json {
        print_json(&cmp)?;
    } else {
        let mut out = String::new();
        render_comparison(&mut out, &cmp, ctx.config.schedule.offset()?);
        print!("{out}");
    }
    Ok(())
}
