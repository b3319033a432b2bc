use clap::Parser;

mod console;

#[derive(Debug, Parser)]
#[command(name = "tasksync", version)]
#[command(about = "Follow document parsing tasks live from the terminal", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: console::config::ConfigOverrides,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = console::config::load(&cli.overrides)?;
    console::logging::initialize(
        config.log_destination,
        tasksync_logging::level_from_name(&config.log_level),
    );
    console::app::run(config)
}
