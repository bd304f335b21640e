use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::LauncherConfig;
use crate::engine::models::{LaunchContext, ServerEntry, Settings};
use crate::engine::state::{AbortReason, AppState, BootstrapOutcome};
use crate::engine::validator::ServerValidator;
use crate::logging;
use crate::networking::{HttpTransport, RetryingFetcher};
use crate::storage::{ServerRecord, StorageManager, sanitize_servers};
use crate::updater::{VersionDecision, VersionGate};

pub mod models;
pub mod state;
pub mod validator;

/// Questions the bootstrap may need to ask the user.
#[allow(async_fn_in_trait)]
pub trait Prompts {
    /// Ask for the game install folder. `None` means the user cancelled.
    async fn pick_install_path(&self) -> Option<PathBuf>;

    /// Ask whether to keep going although the published launcher version
    /// differs from the running one.
    async fn confirm_outdated(&self, local_version: &str, remote_version: &str) -> bool;
}

impl<P: Prompts> Prompts for Arc<P> {
    async fn pick_install_path(&self) -> Option<PathBuf> {
        (**self).pick_install_path().await
    }

    async fn confirm_outdated(&self, local_version: &str, remote_version: &str) -> bool {
        (**self).confirm_outdated(local_version, remote_version).await
    }
}

/// The presentation layer. `enter` is the only way data leaves the
/// bootstrap, and it is called at most once per run.
pub trait Presenter {
    fn enter(&mut self, context: LaunchContext);
}

pub struct LauncherEngine<T, P> {
    config: LauncherConfig,
    storage: StorageManager,
    fetcher: RetryingFetcher<T>,
    prompts: P,
    cancel: CancellationToken,
}

impl<T: HttpTransport, P: Prompts> LauncherEngine<T, P> {
    pub fn new(
        config: LauncherConfig,
        storage: StorageManager,
        transport: T,
        prompts: P,
        cancel: CancellationToken,
    ) -> Self {
        let fetcher = RetryingFetcher::new(transport, config.retry);
        Self {
            config,
            storage,
            fetcher,
            prompts,
            cancel,
        }
    }

    /// Run the startup sequence once. On success the presenter receives the
    /// validated server and install path; otherwise the abort reason is
    /// returned. Nothing raised inside the run escapes it.
    pub async fn run<R: Presenter>(
        &self,
        updates: &mpsc::UnboundedSender<AppState>,
        presenter: &mut R,
    ) -> BootstrapOutcome {
        updates.send(AppState::Initialising).ok();
        info!("bootstrap: starting (launcher {})", self.config.local_version);

        let attempt = async {
            let context = self.drive(updates).await?;
            let server = context.selection.server.name.clone();
            updates
                .send(AppState::Ready {
                    server: server.clone(),
                })
                .ok();
            info!("bootstrap: ready with server {server}");
            presenter.enter(context);
            Ok::<(), AbortReason>(())
        };

        let reason = match AssertUnwindSafe(attempt).catch_unwind().await {
            Ok(Ok(())) => return BootstrapOutcome::Ready,
            Ok(Err(reason)) => reason,
            Err(panic) => AbortReason::Unexpected(panic_message(panic.as_ref())),
        };

        error!("bootstrap: aborted: {reason}");
        updates.send(AppState::Aborted(reason.clone())).ok();
        logging::flush();
        BootstrapOutcome::Aborted(reason)
    }

    async fn drive(
        &self,
        updates: &mpsc::UnboundedSender<AppState>,
    ) -> Result<LaunchContext, AbortReason> {
        let install_path = self.resolve_install_path().await?;
        updates
            .send(AppState::SettingsResolved {
                install_path: install_path.clone(),
            })
            .ok();

        let (servers, from_fallback) = self.load_servers().await?;
        updates
            .send(AppState::ServersLoaded {
                count: servers.len(),
                from_fallback,
            })
            .ok();

        let selection = ServerValidator::new(&self.fetcher)
            .validate(&servers, &self.cancel, |entry, position, total| {
                updates
                    .send(AppState::ValidatingServer {
                        name: entry.name.clone(),
                        position,
                        total,
                    })
                    .ok();
            })
            .await;
        let Some(selection) = selection else {
            return Err(self.cancelled_or(AbortReason::NoServerValidated));
        };
        updates
            .send(AppState::ServerValidated {
                name: selection.server.name.clone(),
            })
            .ok();

        updates.send(AppState::CheckingVersion).ok();
        let accepted_mismatch = self.check_version().await?;
        if self.cancel.is_cancelled() {
            return Err(AbortReason::Cancelled);
        }
        updates
            .send(AppState::VersionChecked { accepted_mismatch })
            .ok();

        Ok(LaunchContext {
            selection,
            install_path,
        })
    }

    async fn resolve_install_path(&self) -> Result<PathBuf, AbortReason> {
        let settings = self.storage.read_settings().await;

        if let Some(requested) = self.config.install_path_override.clone() {
            let path = prepare_install_dir(requested).await?;
            if settings.install_path.as_ref() != Some(&path) {
                info!("settings: install path set to {}", path.display());
                self.persist_install_path(&path).await;
            }
            return Ok(path);
        }

        if let Some(path) = settings.install_path {
            debug!("settings: using stored install path {}", path.display());
            return Ok(path);
        }

        info!("settings: no install path stored; asking the user");
        let Some(picked) = self.prompts.pick_install_path().await else {
            warn!("settings: install path selection cancelled");
            return Err(AbortReason::NoInstallPath);
        };
        let path = prepare_install_dir(picked).await?;
        info!("settings: install path set to {}", path.display());
        self.persist_install_path(&path).await;
        Ok(path)
    }

    /// A failed write is not fatal; the path is still used for this run.
    async fn persist_install_path(&self, path: &std::path::Path) {
        let settings = Settings {
            install_path: Some(path.to_path_buf()),
        };
        if let Err(err) = self.storage.write_settings(&settings).await {
            warn!("settings: {err}");
        }
    }

    async fn load_servers(&self) -> Result<(Vec<ServerEntry>, bool), AbortReason> {
        let servers = sanitize_servers(self.storage.read_servers().await);
        if !servers.is_empty() {
            info!("servers: loaded {} entr(ies)", servers.len());
            return Ok((servers, false));
        }

        warn!("servers: persisted list is empty; using built-in fallback");
        let fallback = sanitize_servers(
            self.config
                .fallback_servers
                .iter()
                .cloned()
                .map(ServerRecord::from),
        );
        if fallback.is_empty() {
            return Err(AbortReason::NoServersAvailable);
        }
        Ok((fallback, true))
    }

    /// `Ok(Some(remote))` when the versions differ and the user chose to go
    /// on anyway.
    async fn check_version(&self) -> Result<Option<String>, AbortReason> {
        let local = self.config.local_version.as_str();
        let gate = VersionGate::new(&self.fetcher, &self.config.version_url);
        match gate.check(local, &self.cancel).await {
            VersionDecision::Proceed => Ok(None),
            VersionDecision::Blocked { remote_version } => {
                if self.cancel.is_cancelled() {
                    return Err(AbortReason::Cancelled);
                }
                if self.prompts.confirm_outdated(local, &remote_version).await {
                    warn!("version check: user continues despite version {remote_version}");
                    Ok(Some(remote_version))
                } else {
                    Err(AbortReason::UserDeclined)
                }
            }
        }
    }

    fn cancelled_or(&self, reason: AbortReason) -> AbortReason {
        if self.cancel.is_cancelled() {
            AbortReason::Cancelled
        } else {
            reason
        }
    }
}

async fn prepare_install_dir(path: PathBuf) -> Result<PathBuf, AbortReason> {
    if path.as_os_str().is_empty() {
        return Err(AbortReason::NoInstallPath);
    }
    let path = std::path::absolute(&path).map_err(|e| {
        AbortReason::Unexpected(format!("invalid install path {}: {e}", path.display()))
    })?;
    tokio::fs::create_dir_all(&path).await.map_err(|e| {
        AbortReason::Unexpected(format!(
            "unable to create install folder {}: {e}",
            path.display()
        ))
    })?;
    Ok(path)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".into()
    }
}
