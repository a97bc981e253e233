//! Clap argument types.

use clap::Parser;
use std::path::PathBuf;

/// Upload files to S3-compatible storage and share them through short links.
#[derive(Parser, Debug)]
#[command(
    name = "minly",
    version = minly::constants::VERSION,
    about = super::ABOUT_STYLED,
)]
pub struct Cli {
    /// Project to operate on (defaults to MINLY_PROJECT, then the only
    /// configured project).
    #[arg(long, short = 'p', global = true)]
    pub project: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Create or reconfigure a project interactively.
    New(NewArgs),

    /// Work with all configured projects.
    Configs {
        #[command(subcommand)]
        action: ConfigsAction,
    },

    /// Inspect or remove one project's configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Upload a file and print its short link.
    Upload(UploadArgs),

    /// List recorded uploads of the project.
    Files(FilesArgs),

    /// Update minly to the latest release.
    Update(UpdateArgs),

    /// Print version and build information.
    Version,
}

/// Arguments for the `new` subcommand.
#[derive(Parser, Debug)]
pub struct NewArgs {
    /// Project name (4-16 lowercase letters). Prompted for when omitted.
    pub name: Option<String>,
}

/// Subcommands of `configs`.
#[derive(clap::Subcommand, Debug)]
pub enum ConfigsAction {
    /// List configured projects.
    List,
}

/// Subcommands of `config`.
#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the project configuration and which secrets are set.
    Show,

    /// Delete the project configuration and its stored secrets.
    Delete {
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },

    /// Import a project configuration from a TOML file.
    Import {
        /// Path to the TOML file.
        file: PathBuf,

        /// Replace an existing project with the same name.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

/// Arguments for the `upload` subcommand.
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// File to upload.
    pub file: PathBuf,

    /// Do not copy the short link to the clipboard.
    #[arg(long, default_value_t = false)]
    pub no_clip: bool,

    /// Run without writing a log file.
    #[arg(long, default_value_t = false)]
    pub test: bool,
}

/// Arguments for the `files` subcommand.
#[derive(Parser, Debug)]
pub struct FilesArgs {
    /// Include links that have already expired but were not pruned yet.
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

/// Arguments for the `update` subcommand.
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Reinstall even if already on the latest version.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn project_flag_is_global() {
        let cli = Cli::try_parse_from(["minly", "upload", "a.txt", "--project", "holiday"]).unwrap();
        assert_eq!(cli.project.as_deref(), Some("holiday"));
        match cli.command {
            Command::Upload(args) => assert_eq!(args.file, PathBuf::from("a.txt")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn update_force_flag() {
        let cli = Cli::try_parse_from(["minly", "update", "--force"]).unwrap();
        assert!(matches!(cli.command, Command::Update(UpdateArgs { force: true })));
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["minly", "-p", "demo", "config", "delete", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Delete { yes: true }
            }
        ));

        let cli = Cli::try_parse_from(["minly", "configs", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Configs {
                action: ConfigsAction::List
            }
        ));
    }

    #[test]
    fn new_name_is_optional() {
        let cli = Cli::try_parse_from(["minly", "new"]).unwrap();
        assert!(matches!(cli.command, Command::New(NewArgs { name: None })));
    }

    #[test]
    fn upload_requires_file() {
        assert!(Cli::try_parse_from(["minly", "upload"]).is_err());
    }

    #[test]
    fn upload_clipboard_and_test_flags() {
        let cli = Cli::try_parse_from(["minly", "upload", "cat.png"]).unwrap();
        match cli.command {
            Command::Upload(args) => {
                assert!(!args.no_clip);
                assert!(!args.test);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli =
            Cli::try_parse_from(["minly", "upload", "--no-clip", "--test", "cat.png"]).unwrap();
        match cli.command {
            Command::Upload(args) => {
                assert!(args.no_clip);
                assert!(args.test);
                assert_eq!(args.file, PathBuf::from("cat.png"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
