mod analyze;
mod capture;
mod config;
mod display;
mod error;
mod frame;
mod orchestrator;
mod recognize;
mod session;
mod slot;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use dialoguer::Confirm;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::analyze::HttpAnalyzer;
use crate::capture::{ConsentToken, MonitorSource};
use crate::config::Config;
use crate::display::ConsoleDisplay;
use crate::orchestrator::AnalysisOptions;
use crate::recognize::{HttpRecognizer, PlayerSide};
use crate::session::{Session, SessionConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kibitzer=info")),
        )
        .init();

    let matches = Command::new("kibitzer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Chess assistant that watches your screen and suggests moves")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON config file (flags below override it)"),
        )
        .arg(
            Arg::new("side")
                .long("side")
                .value_name("SIDE")
                .value_parser(["white", "black"])
                .help("Which side you are playing"),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Delay between analysis iterations"),
        )
        .arg(
            Arg::new("capture-interval-ms")
                .long("capture-interval-ms")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Delay between screen captures"),
        )
        .arg(
            Arg::new("depth")
                .long("depth")
                .value_name("PLIES")
                .value_parser(clap::value_parser!(u32))
                .help("Engine search depth"),
        )
        .arg(
            Arg::new("multi-pv")
                .long("multi-pv")
                .value_name("N")
                .value_parser(clap::value_parser!(u32))
                .help("Number of principal variations"),
        )
        .arg(
            Arg::new("recognizer-url")
                .long("recognizer-url")
                .value_name("URL")
                .help("Board recognition endpoint"),
        )
        .arg(
            Arg::new("analyzer-url")
                .long("analyzer-url")
                .value_name("URL")
                .help("Engine analysis endpoint"),
        )
        .arg(
            Arg::new("yes")
                .long("yes")
                .short('y')
                .action(ArgAction::SetTrue)
                .help("Skip the screen capture consent prompt"),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let path = Path::new(path);
            if path.exists() {
                Config::load(path)?
            } else {
                // First run: write the defaults out so there is a file to edit.
                let config = Config::default();
                config.save(path)?;
                info!(path = %path.display(), "wrote default config");
                config
            }
        }
        None => Config::default(),
    };
    if let Some(side) = matches.get_one::<String>("side") {
        config.side = side.parse::<PlayerSide>().map_err(anyhow::Error::msg)?;
    }
    if let Some(&ms) = matches.get_one::<u64>("interval-ms") {
        config.interval_ms = ms;
    }
    if let Some(&ms) = matches.get_one::<u64>("capture-interval-ms") {
        config.capture_interval_ms = ms;
    }
    if let Some(&depth) = matches.get_one::<u32>("depth") {
        config.depth = depth;
    }
    if let Some(&multi_pv) = matches.get_one::<u32>("multi-pv") {
        config.multi_pv = multi_pv;
    }
    if let Some(url) = matches.get_one::<String>("recognizer-url") {
        config.recognizer_url = url.clone();
    }
    if let Some(url) = matches.get_one::<String>("analyzer-url") {
        config.analyzer_url = url.clone();
    }

    info!(
        side = %config.side,
        interval_ms = config.interval_ms,
        depth = config.depth,
        "starting kibitzer"
    );

    // Stand-in for the platform consent dialog: nothing captures until the
    // user says yes.
    let consented = matches.get_flag("yes")
        || Confirm::new()
            .with_prompt("kibitzer will periodically capture your screen. Continue?")
            .default(false)
            .interact()
            .context("Consent prompt failed")?;
    if !consented {
        info!("capture consent declined, exiting");
        return Ok(());
    }

    let recognizer = HttpRecognizer::new(
        config.recognizer_url.clone(),
        std::env::var("KIBITZER_RECOGNIZER_KEY").ok(),
        config.side,
    )
    .context("Failed to build recognition client")?;
    let analyzer = HttpAnalyzer::new(
        config.analyzer_url.clone(),
        std::env::var("KIBITZER_ANALYZER_KEY").ok(),
    )
    .context("Failed to build analysis client")?;

    let mut session = Session::start(
        ConsentToken::granted(),
        MonitorSource::new(),
        recognizer,
        analyzer,
        ConsoleDisplay,
        SessionConfig {
            loop_interval: config.loop_interval(),
            frame_interval: config.capture_interval(),
            options: AnalysisOptions {
                depth: config.depth,
                multi_pv: config.multi_pv,
            },
        },
    )
    .context("Failed to start the capture session")?;

    info!("session running, press Ctrl+C to stop");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
        fatal = session.capture_failed() => {
            if let Some(err) = fatal {
                error!(
                    error = %err,
                    "capture session failed; on macOS check Screen Recording permission \
                     in System Settings > Privacy & Security, then restart"
                );
            }
        }
    }
    session.stop().await;
    Ok(())
}
