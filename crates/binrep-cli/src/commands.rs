use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use async_trait::async_trait;
use binrep_engine::{
    EngineConfig, EngineResult, PushOptions, PushOutcome, Release, ReleaseVisitor, Repository,
};
use binrep_meta::{BinarySource, FileSource};
use colored::Colorize;
use tracing::debug;

use crate::cli::*;
use crate::config::{resolve_endpoint, FileConfig};
use crate::output::{release_rows, render_table};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let mut config = file.engine_config()?;
    let endpoint = resolve_endpoint(cli.endpoint.as_deref(), &file)?;
    debug!(?endpoint, "resolved backend endpoint");
    let store = endpoint.open().await?;

    match cli.command {
        Command::List(args) => {
            let repo = Repository::new(store, config);
            cmd_list(&repo, args).await
        }
        Command::Show(args) => {
            let repo = Repository::new(store, config);
            cmd_show(&repo, args).await
        }
        Command::Push(args) => {
            if let Some(keep) = args.keep_releases {
                config.keep_releases = keep;
            }
            let repo = Repository::new(store, config);
            cmd_push(&repo, args).await
        }
        Command::Pull(args) => {
            if args.max_bandwidth.is_some() {
                config.max_bandwidth = args.max_bandwidth;
            }
            let repo = Repository::new(store, config);
            cmd_pull(&repo, args).await
        }
        Command::Sync(args) => {
            if let Some(concurrency) = args.concurrency {
                config.concurrency = concurrency;
            }
            if args.max_bandwidth.is_some() {
                config.max_bandwidth = args.max_bandwidth;
            }
            if config.concurrency == 0 {
                bail!("--concurrency must be at least 1");
            }
            let repo = Repository::new(store, config);
            cmd_sync(&repo, args).await
        }
    }
}

/// Collects release prefixes for `list`.
#[derive(Default)]
struct PrefixCollector(Mutex<Vec<String>>);

#[async_trait]
impl ReleaseVisitor for PrefixCollector {
    async fn visit(&self, release: Release) -> EngineResult<()> {
        self.0.lock().expect("lock poisoned").push(release.prefix());
        Ok(())
    }
}

async fn cmd_list(repo: &Repository, args: ListArgs) -> anyhow::Result<()> {
    let collector = Arc::new(PrefixCollector::default());
    let root = args
        .prefix
        .map(|p| format!("{}/", p.trim_end_matches('/')))
        .filter(|p| p != "/")
        .unwrap_or_default();
    repo.walker().walk_all(&root, collector.clone()).await?;

    let mut prefixes = std::mem::take(&mut *collector.0.lock().expect("lock poisoned"));
    prefixes.sort();
    for prefix in prefixes {
        println!("{prefix}");
    }
    Ok(())
}

async fn cmd_show(repo: &Repository, args: ShowArgs) -> anyhow::Result<()> {
    let release = match &args.timestamp {
        Some(ts) => repo.transfer().find_by_timestamp(&args.name, ts).await?,
        None => repo.transfer().find_latest(&args.name).await?,
    };
    print!("{}", render_table(&release_rows(&release)));
    Ok(())
}

async fn cmd_push(repo: &Repository, args: PushArgs) -> anyhow::Result<()> {
    let mut sources: Vec<Arc<dyn BinarySource>> = Vec::with_capacity(args.paths.len());
    let mut names = HashSet::new();
    for path in &args.paths {
        let source = FileSource::from_path(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        if !names.insert(source.name().to_string()) {
            bail!("duplicate binary name {:?}", source.name());
        }
        sources.push(Arc::new(source));
    }

    let options = PushOptions {
        force: args.force,
        timestamp: args.timestamp,
    };
    let keep = repo.config().keep_releases;
    let report = repo.push(&args.name, &sources, options, keep).await?;

    match &report.outcome {
        PushOutcome::Skipped { latest } => {
            println!(
                "{} Skipped: binaries match the latest release {}",
                "=".yellow().bold(),
                latest.prefix().cyan()
            );
        }
        PushOutcome::Created { release } => {
            println!("{} Uploaded {}", "✓".green().bold(), release.prefix().cyan());
            for binary in &release.meta.binaries {
                println!("  {} {}", binary.name.bold(), binary.checksum.short().dimmed());
            }
            if !report.pruned.is_empty() {
                let pruned: Vec<&str> = report.pruned.iter().map(|t| t.as_str()).collect();
                println!("  Cleaned up {}", pruned.join(",").yellow());
            }
        }
    }
    Ok(())
}

async fn cmd_pull(repo: &Repository, args: PullArgs) -> anyhow::Result<()> {
    let release = repo
        .pull(&args.name, args.timestamp.as_ref(), &args.dest)
        .await?;
    println!(
        "{} Pulled {} into {}",
        "✓".green().bold(),
        release.prefix().cyan(),
        args.dest.display()
    );
    Ok(())
}

async fn cmd_sync(repo: &Repository, args: SyncArgs) -> anyhow::Result<()> {
    log_bandwidth(repo.config());
    let report = repo.sync(&args.root).await?;
    for (name, timestamp) in &report.synced {
        println!("{} {}/{}", "✓".green().bold(), name, timestamp);
    }
    for (name, timestamp) in &report.skipped {
        println!("{} {}/{} (already present)", "-".dimmed(), name, timestamp);
    }
    println!(
        "Synced {}, skipped {}",
        report.synced.len().to_string().bold(),
        report.skipped.len()
    );
    Ok(())
}

fn log_bandwidth(config: &EngineConfig) {
    if let (Some(total), Some(per_worker)) = (config.max_bandwidth, config.per_worker_bandwidth()) {
        tracing::info!(total, per_worker, "bandwidth limit in bytes/sec");
    }
}
