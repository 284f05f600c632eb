mod cli;
mod error_fmt;
mod rt;
mod shim;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use shim_config::{Config, RunMode};
use shim_core::error::ShimError;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match real_main(&cli) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if cli.json {
                eprintln!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::info!(config = %cli.config.display(), "config loaded");

    let base = cli
        .config
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        }) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    match &cli.cmd {
        Commands::Run {
            no_filter,
            acquisition_s,
            rt,
        } => shim::run_field_camera(
            &cfg,
            &base,
            &shim::RunOpts {
                no_filter: *no_filter,
                acquisition_s: *acquisition_s,
                rt,
            },
            stop,
            cli.json,
        ),
        Commands::Dynamic { waveform, rt } => shim::run_dynamic(
            &cfg,
            &base,
            waveform.map(Into::into),
            rt,
            stop,
            cli.json,
        ),
        Commands::Start { rt } => match cfg.protocol.mode {
            RunMode::FieldCamera => shim::run_field_camera(
                &cfg,
                &base,
                &shim::RunOpts {
                    no_filter: false,
                    acquisition_s: None,
                    rt,
                },
                stop,
                cli.json,
            ),
            RunMode::Dynamic => shim::run_dynamic(&cfg, &base, None, rt, stop, cli.json),
        },
        Commands::Reset => shim::reset(&cfg, cli.json),
        Commands::SelfCheck => shim::self_check(&cfg, &base, cli.json),
    }
}

/// Read, parse and validate the config; every failure is a configuration error.
fn load_config(path: &Path) -> eyre::Result<Config> {
    let config_err = |e: eyre::Report| eyre::Report::new(ShimError::Config(format!("{e:#}")));
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))
        .map_err(config_err)?;
    let cfg = shim_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))
        .map_err(config_err)?;
    cfg.validate().map_err(config_err)?;
    Ok(cfg)
}

fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    logging: &shim_config::Logging,
) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let level = cli_level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("log level {level:?}"))?,
    };

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
