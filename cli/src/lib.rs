use clap::{Parser, Subcommand};
use std::path::PathBuf;
use utils::app_config::AppConfig;
use utils::error::Result;

mod commands;
mod prompt;

#[derive(Parser)]
#[command(name = "sidclean", version)]
#[command(
    about = "Removes orphaned SIDs from ACLs and replaces orphaned owners",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set the logging level (debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file path (TOML), layered over the built-in defaults
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remove orphaned ACL entries and replace orphaned owners
    Clean {
        /// Root directory to remediate
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only clean ACL entries, keep owners
        #[arg(long, conflicts_with = "owner_only")]
        acl_only: bool,

        /// Only replace orphaned owners, keep ACL entries
        #[arg(long)]
        owner_only: bool,

        /// Replacement owner (account name or SID string)
        #[arg(short, long, value_name = "PRINCIPAL")]
        new_owner: Option<String>,

        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Prompt for path and new owner
        #[arg(short, long)]
        interactive: bool,
    },

    /// Delete temporary files (thumbs.db, Office lock files, ~*.tmp)
    Purge {
        /// Root directory to clean up
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Prompt for the path
        #[arg(short, long)]
        interactive: bool,
    },

    /// Count files below a directory
    Count {
        /// Root directory to count
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// 应用命令行覆盖项后初始化日志；返回的 guard 必须在整个运行期间保持存活
fn apply_globals(cli: &Cli) -> Result<slog_scope::GlobalLoggerGuard> {
    AppConfig::merge_config(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        AppConfig::set("log.level", level)?;
    }
    utils::logger::setup_logging()
}

pub async fn cli_match() -> Result<()> {
    let cli = Cli::parse();
    let _guard = apply_globals(&cli)?;

    // Execute the subcommand
    match &cli.command {
        Commands::Clean {
            path,
            acl_only,
            owner_only,
            new_owner,
            workers,
            interactive,
        } => {
            commands::clean_cmd(
                path.clone(),
                *acl_only,
                *owner_only,
                new_owner.clone(),
                *workers,
                *interactive,
            )
            .await?
        }
        Commands::Purge { path, interactive } => {
            commands::purge_cmd(path.clone(), *interactive).await?
        }
        Commands::Count { path } => commands::count_cmd(path.clone()).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn acl_only_conflicts_with_owner_only() {
        let parsed = Cli::try_parse_from(["sidclean", "clean", "--acl-only", "--owner-only", "D:\\"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn clean_defaults() {
        let cli = Cli::try_parse_from(["sidclean", "clean"]).unwrap();
        match cli.command {
            Commands::Clean {
                path,
                acl_only,
                owner_only,
                new_owner,
                workers,
                interactive,
            } => {
                assert_eq!(path, PathBuf::from("."));
                assert!(!acl_only && !owner_only && !interactive);
                assert!(new_owner.is_none() && workers.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sidclean", "count", "/srv", "--log-level", "debug", "--config", "site.toml",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
    }
}
