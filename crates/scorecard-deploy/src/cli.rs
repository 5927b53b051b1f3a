//! Command-line interface for the `scorecard-deploy` binary.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "scorecard-deploy")]
#[command(version)]
#[command(about = "Build, push, deploy and verify Pitcher Scorecard", long_about = None)]
#[command(after_help = "The commit defaults to $GITHUB_SHA, $SHORT_SHA, $COMMIT_SHA or \
`git rev-parse --short HEAD`.\nConfiguration comes from the environment (GCP_PROJECT_ID, GCP_LOCATION, ...).")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the commands a run would execute
    Plan {
        /// Commit to plan for
        #[arg(long)]
        sha: Option<String>,
    },

    /// Run the pipeline once
    Run {
        /// Git ref that triggered the run (defaults to $GITHUB_REF, $BRANCH_NAME or the main branch)
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,

        /// Commit to deploy
        #[arg(long)]
        sha: Option<String>,

        /// Treat the run as a manual dispatch, which deploys any ref
        #[arg(long)]
        manual: bool,
    },

    /// Poll a deployed URL until it serves the application title
    Verify {
        /// Service URL
        url: String,
    },

    /// Listen for push and dispatch webhooks
    Serve,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("scorecard-deploy").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_options() {
        assert_eq!(
            parse(&["run", "--ref", "refs/heads/main", "--sha", "3f2a9c1", "--manual"]).unwrap(),
            Command::Run {
                git_ref: Some("refs/heads/main".into()),
                sha: Some("3f2a9c1".into()),
                manual: true,
            }
        );
        assert_eq!(
            parse(&["run"]).unwrap(),
            Command::Run {
                git_ref: None,
                sha: None,
                manual: false
            }
        );
        assert_eq!(
            parse(&["plan", "--sha", "abc"]).unwrap(),
            Command::Plan { sha: Some("abc".into()) }
        );
        assert_eq!(parse(&["serve"]).unwrap(), Command::Serve);
    }

    #[test]
    fn test_verify_needs_url() {
        assert_eq!(
            parse(&["verify", "https://scorecard.run.app"]).unwrap(),
            Command::Verify {
                url: "https://scorecard.run.app".into()
            }
        );
        assert_eq!(
            parse(&["verify"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_help_and_errors() {
        assert_eq!(
            parse(&["run", "--help"]).unwrap_err().kind(),
            ErrorKind::DisplayHelp
        );
        assert_eq!(parse(&["deploy"]).unwrap_err().kind(), ErrorKind::InvalidSubcommand);
        assert!(parse(&["run", "--sha"]).is_err());
        assert_eq!(
            parse(&["run", "--force"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
    }
}
