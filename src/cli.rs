use anyhow::Result;
use clap::Parser;
use console::style;
use log::{info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::Token;
use crate::client::{ApiRoutes, CircleCiClient};
use crate::config::Config;
use crate::crawl::Crawler;
use crate::error::CiStreamError;
use crate::progress::{MultiBarProgress, NoopProgress, ProgressObserver};
use crate::sink::JsonLinesSink;

#[derive(Parser)]
#[command(name = "cistream")]
#[command(author, version, about = "Stream CircleCI job step metrics to NDJSON", long_about = None)]
pub struct Cli {
    /// Organization or user the project belongs to
    org: String,

    /// Repository name
    repo: String,

    /// Output file path (newline-delimited JSON, one record per job step action)
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum number of pipelines to crawl (0 = unbounded)
    #[arg(short, long)]
    limit: Option<usize>,

    /// CircleCI API token
    #[arg(short, long, env = "CIRCLE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path to a config file (defaults to ~/.config/cistream/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// VCS provider slug used in project routes
    #[arg(long)]
    vcs: Option<String>,

    /// Suppress progress bars
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(vcs) = &self.vcs {
            config.circleci.vcs = vcs.clone();
        }
        if let Some(limit) = self.limit {
            config.crawl.limit = limit;
        }

        let token = self
            .token
            .clone()
            .or_else(|| config.circleci.token.clone())
            .map(Token::from)
            .ok_or_else(|| {
                CiStreamError::Config(
                    "No API token: pass --token, set CIRCLE_TOKEN, or add it to the config file"
                        .to_string(),
                )
            })?;

        let client = Arc::new(CircleCiClient::new(Some(&token), &config.crawl)?);
        let routes = ApiRoutes::new(&config.circleci, &self.org, &self.repo)?;

        let limit = match config.crawl.limit {
            0 => None,
            n => Some(n),
        };

        let bars = (!self.quiet).then(|| Arc::new(MultiBarProgress::new(limit)));
        let progress: Arc<dyn ProgressObserver> = match &bars {
            Some(bars) => Arc::clone(bars) as Arc<dyn ProgressObserver>,
            None => Arc::new(NoopProgress),
        };

        let file = File::create(&self.output)?;
        let sink = Box::new(JsonLinesSink::new(BufWriter::new(file)));

        let crawler = Crawler::new(client, routes, config.crawl.clone(), progress);

        let cancel = crawler.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping crawl...");
                cancel.cancel();
            }
        });

        info!(
            "Crawling {}/{}/{} (limit: {})",
            config.circleci.vcs,
            self.org,
            self.repo,
            limit.map_or_else(|| "unbounded".to_string(), |n| n.to_string())
        );

        let report = crawler.run(limit, sink).await?;

        if let Some(bars) = bars {
            bars.finish();
        }

        println!(
            "{} {} records written to {} ({} pipelines, {} workflows, {} jobs, {} skipped)",
            style("✓").green().bold(),
            style(report.records).bold(),
            self.output.display(),
            report.pipelines,
            report.workflows,
            report.jobs,
            report.skipped_jobs,
        );

        Ok(())
    }
}
