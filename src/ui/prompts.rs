use std::path::PathBuf;

use log::info;
use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageDialogResult, MessageLevel};

use crate::engine::Prompts;

/// Native dialogs for the two questions startup can ask.
pub struct DesktopPrompts {
    /// Skip the outdated-launcher question and keep going.
    assume_yes: bool,
}

impl DesktopPrompts {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompts for DesktopPrompts {
    async fn pick_install_path(&self) -> Option<PathBuf> {
        AsyncFileDialog::new()
            .set_title("Choose where to install the game")
            .pick_folder()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    async fn confirm_outdated(&self, local_version: &str, remote_version: &str) -> bool {
        if self.assume_yes {
            info!("version check: continuing without asking (--accept-outdated)");
            return true;
        }
        let answer = AsyncMessageDialog::new()
            .set_level(MessageLevel::Warning)
            .set_title("Launcher update available")
            .set_description(format!(
                "This launcher is version {local_version}, but version {remote_version} \
                 is available.\n\nContinue with the current launcher anyway?"
            ))
            .set_buttons(MessageButtons::YesNo)
            .show()
            .await;
        answer == MessageDialogResult::Yes
    }
}
