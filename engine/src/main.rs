// Superpilot task pilot
// Main entry point for the `pilot` binary

use clap::Parser;
use pilot_engine::cli::{Cli, Command};
use pilot_engine::handlers::{
    apply_overrides, handle_abilities, handle_make_settings, handle_run, load_settings,
    OutputFormat,
};
use pilot_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // make-settings must work without a readable settings file
    if let Command::MakeSettings { force } = cli.command {
        init_telemetry_with_level(cli.log.as_deref().unwrap_or("info"));
        return handle_make_settings(cli.settings_file.as_deref(), force, format);
    }

    let settings = load_settings(cli.settings_file.as_deref())?;

    // --log wins over the settings file; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&settings.core.log_level));

    tracing::info!(
        "Superpilot v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command {
        Command::Run {
            objective,
            mode,
            strategy,
        } => {
            let settings = apply_overrides(settings, mode, strategy);
            handle_run(objective, settings, format).await
        }
        Command::Abilities => handle_abilities(&settings, format),
        Command::MakeSettings { .. } => Ok(()),
    }
}
