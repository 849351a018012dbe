use std::path::{Path, PathBuf};

/// Answer to the "unsaved changes" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SaveChoice {
    Save,
    Discard,
    Cancel,
}

/// What a save dialog should start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePathRequest {
    pub suggested_dir: Option<PathBuf>,
    pub suggested_name: String,
}

/// Native UI the coordinator talks to: prompts, dialogs and notifications.
///
/// Prompts are async because the user answers them while the dispatch loop
/// keeps running. Notifications are fire-and-forget.
#[async_trait::async_trait(?Send)]
pub trait HostUi {
    async fn confirm_save(&self, file_name: &str) -> SaveChoice;

    async fn choose_save_path(&self, request: &SavePathRequest) -> Option<PathBuf>;

    async fn choose_open_path(&self, initial_dir: Option<&Path>) -> Option<PathBuf>;

    fn warn(&self, title: &str, message: &str);

    fn copy_to_clipboard(&self, text: &str);

    fn reveal_in_folder(&self, path: &Path);

    /// A click landed in the document; dismiss any open host menus.
    fn close_menus(&self) {}
}
