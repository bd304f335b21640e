use std::path::PathBuf;

use thiserror::Error;

// Progress snapshots published while the bootstrap runs. Each variant is a
// state of the startup machine except `ValidatingServer`, which marks a trial
// inside the validation step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppState {
    Initialising,
    SettingsResolved {
        install_path: PathBuf,
    },
    ServersLoaded {
        count: usize,
        from_fallback: bool,
    },
    ValidatingServer {
        name: String,
        position: usize,
        total: usize,
    },
    ServerValidated {
        name: String,
    },
    CheckingVersion,
    VersionChecked {
        /// Remote version the user chose to run past, if any.
        accepted_mismatch: Option<String>,
    },
    Ready {
        server: String,
    },
    Aborted(AbortReason),
}

impl AppState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppState::Ready { .. } | AppState::Aborted(_))
    }
}

/// Why a bootstrap run stopped before reaching the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AbortReason {
    #[error("no install path")]
    NoInstallPath,
    #[error("no servers available")]
    NoServersAvailable,
    #[error("no server validated")]
    NoServerValidated,
    #[error("user declined to proceed")]
    UserDeclined,
    #[error("cancelled")]
    Cancelled,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Control was handed to the presentation layer.
    Ready,
    Aborted(AbortReason),
}
