use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use extractor_bot::catalog::CatalogClient;
use extractor_bot::config;
use extractor_bot::db;
use extractor_bot::flow::Flow;
use extractor_bot::handlers;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
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
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let catalog = CatalogClient::from_config(&cfg.catalog)?;
    info!(?catalog, "catalog client ready");
    let flow = Arc::new(Flow::new(
        pool,
        Arc::new(catalog),
        cfg.telegram.admin_id,
        cfg.app.exports_dir(),
    ));

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    handlers::register_commands(&bot).await;

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<handlers::Command>()
                .endpoint(handlers::on_command),
        )
        .branch(Update::filter_callback_query().endpoint(handlers::on_callback));

    info!("starting telegram bot");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![flow])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
