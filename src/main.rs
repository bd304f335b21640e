use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod config;
mod engine;
mod env;
mod integrity;
mod logging;
mod manifest;
mod networking;
mod storage;
mod ui;
mod updater;
mod util;

use crate::config::LauncherConfig;
use crate::engine::LauncherEngine;
use crate::engine::state::BootstrapOutcome;
use crate::networking::NetworkClient;
use crate::storage::StorageManager;

#[derive(Parser, Debug)]
#[command(
    name = "Waypoint Launcher",
    author,
    version,
    about = "Picks a trustworthy game server, checks for launcher updates and hands off to the game",
    after_help = "The Windows-style switches /log and /uninstall are also accepted, in any letter case.\n\
                  A completed uninstall exits with code 3."
)]
struct Cli {
    /// Print launcher version and exit.
    #[arg(long)]
    version_only: bool,

    /// Also write log records to launcher.log in the data directory.
    #[arg(long)]
    log: bool,

    /// Remove launcher settings, server list and logs, then exit.
    #[arg(long)]
    uninstall: bool,

    /// Game install folder; replaces the stored one.
    #[arg(long, env = "WAYPOINT_INSTALL_PATH")]
    install_path: Option<PathBuf>,

    /// Directory holding settings, the server list and logs.
    #[arg(long, env = "WAYPOINT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Where the latest launcher version is published.
    #[arg(long, env = "WAYPOINT_VERSION_URL")]
    version_url: Option<String>,

    /// Manifest URL tried when no servers are saved. Repeatable.
    #[arg(
        long = "fallback-manifest",
        env = "WAYPOINT_FALLBACK_MANIFEST_URL",
        value_delimiter = ','
    )]
    fallback_manifests: Vec<String>,

    /// Keep going without asking when the launcher is outdated.
    #[arg(long)]
    accept_outdated: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_legacy_args(std::env::args_os()));
    if cli.version_only {
        println!("Waypoint Launcher {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = LauncherConfig::default()
        .with_data_dir(cli.data_dir)
        .with_version_url(cli.version_url)
        .with_fallback_manifests(cli.fallback_manifests)
        .with_install_path(cli.install_path);

    logging::init(cli.log, &config.paths, config.log_max_bytes);
    info!("data directory: {}", config.paths.root().display());

    let storage = StorageManager::new(config.paths.clone());
    storage.remove_legacy_launcher().await;

    if cli.uninstall {
        return uninstall(&storage).await;
    }

    let cancel = CancellationToken::new();
    tokio::spawn(relay_interrupts(tokio::signal::ctrl_c, cancel.clone()));

    let transport = NetworkClient::new(config.http_timeout);
    let prompts = ui::DesktopPrompts::new(cli.accept_outdated);
    let engine = LauncherEngine::new(config, storage, transport, prompts, cancel);

    let bar = ui::progress_bar();
    let (tx, rx) = mpsc::unbounded_channel();
    let view = ui::spawn_progress_view(rx, bar.clone());
    let mut presenter = ui::TerminalPresenter::new(bar);

    let outcome = engine.run(&tx, &mut presenter).await;
    drop(tx);
    if let Err(err) = view.await {
        warn!("progress view stopped abnormally: {err}");
    }

    match outcome {
        BootstrapOutcome::Ready => ExitCode::SUCCESS,
        BootstrapOutcome::Aborted(reason) => {
            eprintln!("Launcher stopped: {reason}");
            ExitCode::FAILURE
        }
    }
}

async fn uninstall(storage: &StorageManager) -> ExitCode {
    match storage.uninstall().await {
        // No logging past this point; a record would recreate launcher.log.
        Ok(removed) => {
            println!(
                "Removed {} launcher file(s) from {}",
                removed.len(),
                storage.paths().root().display()
            );
            ExitCode::from(config::EXIT_CODE_UNINSTALLED)
        }
        Err(err) => {
            error!("uninstall: {err}");
            eprintln!("Uninstall failed: {err}");
            logging::flush();
            ExitCode::FAILURE
        }
    }
}

/// Translate the Windows-style `/log` and `/uninstall` switches, in any
/// letter case, into their long forms.
fn normalize_legacy_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let long = arg.to_str().map(str::trim).and_then(|switch| {
                if switch.eq_ignore_ascii_case("/log") {
                    Some("--log")
                } else if switch.eq_ignore_ascii_case("/uninstall") {
                    Some("--uninstall")
                } else {
                    None
                }
            });
            long.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

/// The first interrupt cancels the run; a second one exits immediately,
/// even while a dialog is open.
async fn relay_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return;
    }
    warn!("interrupt received; cancelling startup");
    cancel.cancel();

    if next_interrupt().await.is_ok() {
        warn!("second interrupt received; exiting");
        logging::flush();
        std::process::exit(config::EXIT_CODE_INTERRUPTED);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn accepts_windows_style_switches_in_any_case() {
        let cli = Cli::try_parse_from(normalize_legacy_args(args(&[
            "launcher",
            "/LOG",
            " /Uninstall ",
        ])))
        .unwrap();
        assert!(cli.log);
        assert!(cli.uninstall);
    }

    #[test]
    fn leaves_other_arguments_alone() {
        let normalized = normalize_legacy_args(args(&["launcher", "--data-dir", "/data", "/logs"]));
        assert_eq!(normalized, args(&["launcher", "--data-dir", "/data", "/logs"]));
    }

    #[tokio::test]
    async fn first_interrupt_cancels_and_keeps_listening() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        relay_interrupts(
            || {
                let result = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(())
                } else {
                    Err(io::Error::other("signal handler gone"))
                };
                std::future::ready(result)
            },
            cancel.clone(),
        )
        .await;

        assert!(cancel.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_handler_leaves_run_alone() {
        let cancel = CancellationToken::new();
        relay_interrupts(
            || std::future::ready(Err(io::Error::other("unsupported"))),
            cancel.clone(),
        )
        .await;
        assert!(!cancel.is_cancelled());
    }
}
