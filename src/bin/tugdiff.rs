// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use tugdiff::{
    compare::progress::LoadingProgress,
    config::{read_config, TugdiffConfig},
    diff::{self, text::TextDiffer},
    path::{default_config_file, default_state_file},
    state::Observable,
    Comparison, DiffResult, TotalCount,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::{future::Future, path::PathBuf, process::exit};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Item = DiffResult<String>;

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  tugdiff [options] <tugdiff-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let config = match self.config {
            Some(path) => read_config(path)?,
            None => read_config(default_config_file()?)?,
        };

        match self.command {
            Command::Compare(opts) => run_compare(config, opts).await,
            Command::Environments => run_environments(config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Compare records of two environments page by page.
    #[command(override_usage = "tugdiff compare [options] <source> <target>")]
    Compare(CompareOptions),

    /// List configured environments.
    #[command(override_usage = "tugdiff environments")]
    Environments,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CompareOptions {
    /// Name of environment to compare from.
    #[arg(required = true, value_name = "source")]
    pub source: String,

    /// Name of environment to compare against.
    #[arg(required = true, value_name = "target")]
    pub target: String,

    /// Page to show, starting at one.
    #[arg(short, long, default_value_t = 1, value_name = "page")]
    pub page: usize,

    /// Number of keys per page. Remembered for later runs.
    #[arg(short = 's', long, value_name = "size")]
    pub page_size: Option<usize>,

    /// Show only keys whose values differ.
    #[arg(short = 'x', long)]
    pub changed_only: bool,

    /// Show only keys containing search term, ignoring case.
    #[arg(short = 'q', long, value_name = "term")]
    pub search: Option<String>,

    /// Count filtered items across all keys instead of the current page.
    #[arg(short, long)]
    pub filtered_total: bool,

    /// Number of keys to diff at once.
    #[arg(short = 'j', long, default_value_t = 1, value_name = "count")]
    pub concurrency: usize,
}

/// Preferences remembered between runs.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Preferences {
    page_size: Option<usize>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_compare(config: TugdiffConfig, opts: CompareOptions) -> Result<()> {
    let source = config.environment(&opts.source)?;
    let target = config.environment(&opts.target)?;

    let state_file = default_state_file()?;
    let prefs: Observable<Preferences> = Observable::load_or_default(&state_file)?;
    let page_size = opts
        .page_size
        .or(prefs.get().page_size)
        .unwrap_or(config.settings.page_size);
    let total_count = if opts.filtered_total {
        TotalCount::FilteredSet
    } else {
        config.settings.total_count
    };

    let mut engine = Comparison::<String, String, Item>::new()
        .with_page_size(page_size)?
        .with_total_count(total_count)
        .with_concurrency(opts.concurrency);

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling comparison");
                token.cancel();
            }
        }
    });

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<30}  [{wide_bar:.yellow/blue}] {pos:>3}%",
        )?
        .progress_chars("-Cco."),
    );

    let differ = TextDiffer::new()
        .with_labels(&source.name, &target.name)
        .with_context_radius(config.settings.context_radius);

    let changed_only = opts.changed_only;
    let mut changed = diff::changed_only::<String, String, Item>();
    let mut matches = diff::key_contains::<String, String, Item>(opts.search.unwrap_or_default());
    let filter = move |key: &String, old: Option<&String>, new: Option<&String>, item: &Item| {
        anyhow::Ok(
            (!changed_only || changed(key, old, new, item)?) && matches(key, old, new, item)?,
        )
    };

    let page = opts.page;
    let progress = engine.subscribe_progress();

    info!("compare {} against {}", source.name, target.name);
    with_progress_bar(progress, bar, async {
        engine
            .initialize_with(
                &token,
                async { anyhow::Ok(source.snapshot.load().await?) },
                async { anyhow::Ok(target.snapshot.load().await?) },
            )
            .await?;
        engine.set_current_page(page);
        engine.get_page_with(&token, &differ, filter).await
    })
    .await?;

    for item in engine.page_items() {
        if item.has_differences {
            print!("{}", item.formatted_diff);
        } else {
            println!("= {} (no differences)", item.key);
        }
    }

    let page_count = match total_count {
        TotalCount::PageLocal => engine.all_keys().len().div_ceil(engine.page_size()).max(1),
        TotalCount::FilteredSet => engine.page_count(),
    };
    println!(
        "page {} of {} ({} shown, {} keys)",
        engine.current_page(),
        page_count,
        engine.total_count(),
        engine.all_keys().len()
    );

    prefs.update(|prefs| prefs.page_size = Some(page_size));
    prefs.save_to(&state_file)?;

    Ok(())
}

/// Drive `bar` from engine progress for as long as `work` runs.
///
/// # Invariant
///
/// - Bar is cleared once `work` finishes, whether it failed or not.
async fn with_progress_bar<F: Future>(
    progress: watch::Receiver<LoadingProgress>,
    bar: ProgressBar,
    work: F,
) -> F::Output {
    let mirror = tokio::spawn(mirror_progress(progress, bar.clone()));
    let outcome = work.await;
    mirror.abort();
    bar.finish_and_clear();
    outcome
}

async fn mirror_progress(mut progress: watch::Receiver<LoadingProgress>, bar: ProgressBar) {
    while progress.changed().await.is_ok() {
        let LoadingProgress {
            progress_value,
            progress_label,
            ..
        } = progress.borrow_and_update().clone();
        bar.set_position(u64::from(progress_value));
        bar.set_message(progress_label);
    }
}

fn run_environments(config: TugdiffConfig) -> Result<()> {
    if config.environments.is_empty() {
        warn!("no environments configured");
        return Ok(());
    }

    for environment in &config.environments {
        println!("{:<12} {}", environment.name, environment.snapshot);
    }

    Ok(())
}
