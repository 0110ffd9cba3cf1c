use std::path::PathBuf;

use binrep_types::{RepositoryName, Timestamp};
use clap::{Args, Parser, Subcommand};

use crate::bandwidth::parse_bandwidth;

#[derive(Parser, Debug)]
#[command(
    name = "binrep",
    about = "The static binary repository manager",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backend storage endpoint (directory path or file:// URL)
    #[arg(short, long, global = true, env = "BINREP_BACKEND_ENDPOINT")]
    pub endpoint: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true, env = "BINREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show releases on the remote repository
    List(ListArgs),
    /// Show binary information of a release
    Show(ShowArgs),
    /// Push binaries as a new release
    Push(PushArgs),
    /// Pull the binaries of a release
    Pull(PullArgs),
    /// Mirror the latest release of every name into a local directory
    Sync(SyncArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only walk names below this prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// <host>/<user>/<project>
    pub name: RepositoryName,
    /// Release timestamp (latest when omitted)
    #[arg(short, long)]
    pub timestamp: Option<Timestamp>,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// <host>/<user>/<project>
    pub name: RepositoryName,
    /// Binaries to publish
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Release timestamp (current UTC time when omitted)
    #[arg(short, long)]
    pub timestamp: Option<Timestamp>,
    /// Number of releases to keep after the push [default: 5]
    #[arg(short, long)]
    pub keep_releases: Option<usize>,
    /// Push even if every checksum matches the latest release
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// <host>/<user>/<project>
    pub name: RepositoryName,
    /// Directory to install the binaries into
    pub dest: PathBuf,
    /// Release timestamp (latest when omitted)
    #[arg(short, long)]
    pub timestamp: Option<Timestamp>,
    /// Download cap in bytes per second, e.g. '1 MB' or '1024 KB'
    #[arg(long, alias = "bw", value_parser = parse_bandwidth)]
    pub max_bandwidth: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Local root directory of the mirror
    pub root: PathBuf,
    /// Releases downloaded in parallel [default: 1]
    #[arg(short, long)]
    pub concurrency: Option<usize>,
    /// Total download cap in bytes per second, shared by all workers
    #[arg(long, alias = "bw", value_parser = parse_bandwidth)]
    pub max_bandwidth: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_push() {
        let cli = Cli::try_parse_from([
            "binrep",
            "-e",
            "/srv/binrep",
            "push",
            "-k",
            "3",
            "--force",
            "github.com/yuuki/droot",
            "bin/droot",
            "bin/droot-helper",
        ])
        .unwrap();
        assert_eq!(cli.endpoint.as_deref(), Some("/srv/binrep"));
        match cli.command {
            Command::Push(args) => {
                assert_eq!(args.name.as_str(), "github.com/yuuki/droot");
                assert_eq!(args.paths.len(), 2);
                assert_eq!(args.keep_releases, Some(3));
                assert!(args.force);
                assert!(args.timestamp.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn push_requires_a_binary() {
        assert!(Cli::try_parse_from(["binrep", "push", "github.com/yuuki/droot"]).is_err());
    }

    #[test]
    fn parses_pull_with_bandwidth() {
        let cli = Cli::try_parse_from([
            "binrep",
            "pull",
            "--timestamp",
            "20171017152508",
            "--max-bandwidth",
            "1 MB",
            "github.com/yuuki/droot",
            "/usr/local/bin",
        ])
        .unwrap();
        match cli.command {
            Command::Pull(args) => {
                assert_eq!(args.max_bandwidth, Some(1_000_000));
                assert_eq!(args.timestamp.unwrap().as_str(), "20171017152508");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_timestamp() {
        let parsed = Cli::try_parse_from([
            "binrep",
            "show",
            "-t",
            "2017-10-17",
            "github.com/yuuki/droot",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parses_sync() {
        let cli =
            Cli::try_parse_from(["binrep", "sync", "-c", "4", "--bw", "4MiB", "/var/mirror"])
                .unwrap();
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.concurrency, Some(4));
                assert_eq!(args.max_bandwidth, Some(4 * 1024 * 1024));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
