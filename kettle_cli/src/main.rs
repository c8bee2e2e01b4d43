mod cli;
mod commands;
mod device;
mod error_fmt;
mod sim;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{INVALID_CONFIG, exit_code_for_error, format_error_json, humanize};

fn load_config(path: &Path) -> Result<kettle_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = kettle_config::load_toml(&text)
        .map_err(eyre::Report::new)
        .wrap_err(INVALID_CONFIG)?;
    cfg.validate().wrap_err(INVALID_CONFIG)?;
    Ok(cfg)
}

/// Console layer on stderr (stdout carries command output), plus an optional
/// JSON-lines file sink from `[logging]`.
fn init_tracing(cli: &Cli, logging: Option<&kettle_config::Logging>) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let console = if cli.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(BoxMakeWriter::new(std::io::stderr))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(BoxMakeWriter::new(std::io::stderr))
            .boxed()
    };

    let file = logging.and_then(|l| l.file.as_deref()).map(|path| {
        let path = Path::new(path);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "kettlefill.log".into(), |n| n.to_os_string());
        let appender = match logging.and_then(|l| l.rotation.as_deref()) {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init();
}

fn dispatch(cli: &Cli, cfg: &kettle_config::Config) -> Result<()> {
    match &cli.cmd {
        Commands::Run {
            max_ticks,
            remote,
            status_every,
            virtual_time,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("install Ctrl-C handler")?;
            commands::run(
                cfg,
                *max_ticks,
                remote.clone(),
                *status_every,
                *virtual_time,
                &shutdown,
            )
        }
        Commands::CalibrateFactor {
            known_grams,
            samples,
            yes,
        } => commands::calibrate_factor(cfg, *known_grams, *samples, *yes),
        Commands::Status => commands::status(cfg),
        Commands::ResetCalibration => commands::reset_calibration(cfg),
        Commands::ResetFactor => commands::reset_factor(cfg),
        Commands::Remote { code } => commands::remote(cfg, *code),
        Commands::SelfCheck => commands::self_check(cfg),
    }
}

fn report(err: &eyre::Report) -> ! {
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
        tracing::debug!(error = ?err, "command failed");
    }
    std::process::exit(exit_code_for_error(err));
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(&cli, None);
            report(&e);
        }
    };
    init_tracing(&cli, Some(&cfg.logging));
    tracing::debug!(config = %cli.config.display(), "config loaded");

    if let Err(e) = dispatch(&cli, &cfg) {
        report(&e);
    }
}
