mod cli;
mod frame;
mod paths;
mod presets;
mod run;
mod testcard;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let presets = presets::load(cli.presets.as_deref())?;
    if cli.list_presets {
        presets::print(&presets);
        return Ok(());
    }
    run::run(cli, presets)
}
