//! Command-line flags for the headless host.

use std::path::PathBuf;

use clap::Parser;

use crate::ui::SaveChoice;

/// Answers the headless host gives in place of prompts and dialogs.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "markpad")]
#[command(version, about = "Headless markpad host speaking JSON lines on stdio", long_about = None)]
pub struct HeadlessOptions {
    /// Answer to every "unsaved changes" prompt
    #[arg(
        long,
        value_enum,
        value_name = "CHOICE",
        default_value_t = SaveChoice::Cancel,
        ignore_case = true
    )]
    pub unsaved: SaveChoice,

    /// Folder that save dialogs resolve into; without it they are cancelled
    #[arg(long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            unsaved: SaveChoice::Cancel,
            save_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cancel_without_a_save_dir() {
        let options = HeadlessOptions::try_parse_from(["markpad"]).unwrap();
        assert_eq!(options, HeadlessOptions::default());
    }

    #[test]
    fn flags_set_the_answers() {
        let options = HeadlessOptions::try_parse_from([
            "markpad",
            "--unsaved",
            "DISCARD",
            "--save-dir",
            "/tmp/out",
        ])
        .unwrap();
        assert_eq!(options.unsaved, SaveChoice::Discard);
        assert_eq!(options.save_dir, Some(PathBuf::from("/tmp/out")));

        let options = HeadlessOptions::try_parse_from(["markpad", "--unsaved=save"]).unwrap();
        assert_eq!(options.unsaved, SaveChoice::Save);
    }

    #[test]
    fn bad_flags_are_rejected() {
        assert!(HeadlessOptions::try_parse_from(["markpad", "--unsaved"]).is_err());
        assert!(HeadlessOptions::try_parse_from(["markpad", "--unsaved", "maybe"]).is_err());
        assert!(HeadlessOptions::try_parse_from(["markpad", "--verbose"]).is_err());
        assert!(HeadlessOptions::try_parse_from(["markpad", "--save-dir"]).is_err());
    }
}
