use std::fmt::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::Presenter;
use crate::engine::models::LaunchContext;
use crate::engine::state::AppState;
use crate::util::format_size;

mod prompts;
pub use self::prompts::DesktopPrompts;

const TICK_INTERVAL: Duration = Duration::from_millis(120);

/// One-line description of a bootstrap state for the spinner.
pub fn status_line(state: &AppState) -> String {
    match state {
        AppState::Initialising => "Starting launcher...".into(),
        AppState::SettingsResolved { install_path } => {
            format!("Game folder: {}", install_path.display())
        }
        AppState::ServersLoaded {
            count,
            from_fallback: false,
        } => format!("Loaded {count} server(s)"),
        AppState::ServersLoaded {
            count,
            from_fallback: true,
        } => format!("No saved servers; trying {count} built-in server(s)"),
        AppState::ValidatingServer {
            name,
            position,
            total,
        } => format!("Checking {name} ({position}/{total})..."),
        AppState::ServerValidated { name } => format!("Using server {name}"),
        AppState::CheckingVersion => "Checking for launcher updates...".into(),
        AppState::VersionChecked {
            accepted_mismatch: Some(remote),
        } => format!("Continuing with an outdated launcher (latest is {remote})"),
        AppState::VersionChecked {
            accepted_mismatch: None,
        } => "Launcher is up to date".into(),
        AppState::Ready { server } => format!("Ready to play on {server}"),
        AppState::Aborted(reason) => format!("Startup stopped: {reason}"),
    }
}

pub fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.enable_steady_tick(TICK_INTERVAL);
    bar
}

/// Drain bootstrap updates into `bar` until a terminal state arrives or the
/// sender goes away.
pub fn spawn_progress_view(
    mut updates: mpsc::UnboundedReceiver<AppState>,
    bar: ProgressBar,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(state) = updates.recv().await {
            debug!("ui: {state:?}");
            let line = status_line(&state);
            if !state.is_terminal() {
                bar.set_message(line);
                continue;
            }
            if matches!(state, AppState::Aborted(_)) {
                bar.abandon_with_message(line);
            } else {
                bar.finish_with_message(line);
            }
            return;
        }
        bar.finish_and_clear();
    })
}

/// Prints what the selected server offers once startup succeeds.
pub struct TerminalPresenter {
    bar: ProgressBar,
}

impl TerminalPresenter {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Presenter for TerminalPresenter {
    fn enter(&mut self, context: LaunchContext) {
        let summary = render_summary(&context);
        self.bar.suspend(|| println!("{summary}"));
    }
}

pub fn render_summary(context: &LaunchContext) -> String {
    let selection = &context.selection;
    let manifest = &selection.manifest;
    let mut out = String::new();

    let _ = writeln!(out, "{} (via {})", manifest.label, selection.server.name);
    let _ = writeln!(out, "  manifest md5: {}", selection.manifest_hash);
    let _ = writeln!(out, "  install folder: {}", context.install_path.display());

    if let Some(primary) = manifest.primary_profile() {
        if let Some(motd) = &primary.motd {
            let _ = writeln!(out, "  {motd}");
        }
        if let Some(website) = &primary.website {
            let _ = writeln!(out, "  website: {website}");
        }
    }

    let _ = writeln!(out, "Launch profiles:");
    for profile in &manifest.profiles {
        let _ = write!(
            out,
            "  [{}] {}: {} {}",
            profile.order, profile.name, profile.exec, profile.params
        );
        if let Some(icon) = &profile.icon {
            let _ = write!(out, " (icon {icon})");
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "Game files: {} ({})",
        manifest.files.len(),
        format_size(manifest.total_size())
    );
    for file in &manifest.files {
        let _ = writeln!(
            out,
            "  {} {} from {} mirror(s){}",
            file.name,
            format_size(file.size_bytes),
            file.download_urls.len(),
            file.checksum
                .as_deref()
                .map(|sum| format!(", md5 {sum}"))
                .unwrap_or_default()
        );
    }

    let branding = &manifest.branding;
    if let Some(webpage) = &branding.webpage {
        let _ = writeln!(out, "News page: {webpage}");
    }
    if let Some(poster) = &branding.poster_image {
        let _ = writeln!(out, "Poster: {poster}");
    }
    for forum in &branding.forums {
        let _ = writeln!(out, "Forum {}: {}", forum.name, forum.url);
    }
    for button in &branding.buttons {
        let _ = writeln!(out, "Link {}: {}", button.label, button.url);
    }

    out.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::engine::models::{ServerEntry, ValidatedSelection};
    use crate::engine::state::AbortReason;
    use crate::manifest;
    use crate::manifest::tests::SAMPLE;

    fn context() -> LaunchContext {
        LaunchContext {
            selection: ValidatedSelection {
                server: ServerEntry::new("Main", "https://a.example.com/m.xml", None),
                manifest: manifest::parse(SAMPLE.as_bytes()).unwrap(),
                manifest_hash: "abc123".into(),
            },
            install_path: PathBuf::from("/games/waypoint"),
        }
    }

    #[test]
    fn status_lines_describe_each_state() {
        assert_eq!(
            status_line(&AppState::ValidatingServer {
                name: "Main".into(),
                position: 2,
                total: 3
            }),
            "Checking Main (2/3)..."
        );
        assert_eq!(
            status_line(&AppState::Aborted(AbortReason::NoServerValidated)),
            "Startup stopped: no server validated"
        );
        assert!(
            status_line(&AppState::ServersLoaded {
                count: 1,
                from_fallback: true
            })
            .contains("built-in")
        );
    }

    #[test]
    fn summary_lists_primary_profile_first() {
        let summary = render_summary(&context());
        assert!(summary.starts_with("Homecoming (via Main)"));
        assert!(summary.contains("install folder: /games/waypoint"));

        let live = summary.find("[1] Live").expect("primary profile listed");
        let other = summary.find("[2]").expect("secondary profile listed");
        assert!(live < other);
    }

    #[tokio::test]
    async fn progress_view_stops_on_terminal_state() {
        let (tx, rx) = mpsc::unbounded_channel();
        let bar = ProgressBar::hidden();
        let view = spawn_progress_view(rx, bar.clone());

        tx.send(AppState::Initialising).unwrap();
        tx.send(AppState::Ready {
            server: "Main".into(),
        })
        .unwrap();
        view.await.unwrap();

        assert!(bar.is_finished());
        assert_eq!(bar.message(), "Ready to play on Main");
    }
}
