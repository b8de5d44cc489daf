use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use extractor_bot::catalog::{CatalogClient, CatalogService};
use extractor_bot::config;
use extractor_bot::extract;
use extractor_bot::model::BatchKind;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Query the course catalog with the bot's configuration"
)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List batches of one type ("live" or "recorded")
    Batches {
        #[arg(default_value = "live")]
        kind: String,
    },
    /// Print the extracted links of one batch
    Links { batch_id: String },
    /// Dump the JSON recovered from a path below the catalog base URL
    Raw { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let client = CatalogClient::from_config(&cfg.catalog)?;

    match args.cmd {
        Cmd::Batches { kind } => {
            let Some(kind) = BatchKind::parse_kind(&kind) else {
                bail!("unknown batch type '{kind}', expected live or recorded");
            };
            let batches = client.list_batches(kind).await?;
            println!("{} batches ({})", batches.len(), client.batches_url(kind));
            for batch in batches {
                println!("  {} -> {}", batch.id, batch.title);
            }
        }
        Cmd::Links { batch_id } => {
            let content = client.batch_content(&batch_id).await?;
            print!(
                "{}",
                extract::render_links(&extract::extract_links(&content))
            );
        }
        Cmd::Raw { path } => {
            let url = format!(
                "{}/{}",
                cfg.catalog.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            let value = client.fetch_json(&url).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
