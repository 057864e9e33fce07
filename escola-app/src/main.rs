use anyhow::Result;
use clap::Parser;
use escola_common::observability::{LogConfig, init_logging};

use cli::Cli;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config: explicit file, else ./escola.yaml and the user config dir; env wins.
    let cfg = commands::load_config(cli.config.as_deref())?;

    // 2) Logging from the `logging` section.
    let log_path = init_logging(LogConfig {
        app_name: "escola",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr || cli.verbose,
        format: cfg.logging.format,
        default_filter: if cli.verbose {
            "debug".into()
        } else {
            cfg.logging.filter.clone()
        },
    })?;
    tracing::info!(log = %log_path.display(), command = ?cli.command, "app.start");

    commands::run(cli.command, &cfg).await
}
