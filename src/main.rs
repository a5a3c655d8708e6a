use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod app;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod server;
mod services;
#[cfg(test)]
mod test_support;

use app::App;
use config::Config;
use db::Repository;
use error::Result;
use feed::FeedFetcher;
use services::{RefreshScheduler, Releasers};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Usage: nitter-filter [config.toml]
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let mut releasers = Releasers::new();
    let result = run(&config, &mut releasers).await;
    releasers.release_all().await;
    result
}

async fn run(config: &Config, releasers: &mut Releasers) -> Result<()> {
    tracing::info!("process id {}", std::process::id());
    if let Some(pid_file) = &config.pid_file {
        std::fs::write(pid_file, std::process::id().to_string())?;
        let pid_file = pid_file.clone();
        releasers.push("pid file", async move {
            std::fs::remove_file(&pid_file)?;
            Ok(())
        });
    }

    let repository = Repository::new(&config.db_path).await?;
    releasers.push("database", repository.clone().close());

    let fetcher = Arc::new(FeedFetcher::new(&config.upstream, &config.http)?);

    let app = Arc::new(App::new(config, repository.clone(), Arc::clone(&fetcher))?);

    if repository.is_new() {
        if let Some(subscriptions) = &config.subscriptions {
            app.seed_subscriptions(Path::new(subscriptions), &config.filter.subscription_prefix)
                .await;
        }
    }

    let scheduler = RefreshScheduler::new(repository, fetcher, config.schedule.clone());
    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));
    releasers.push("refresh scheduler", async move {
        shutdown.cancel();
        scheduler_task.await.map_err(anyhow::Error::from)?;
        Ok(())
    });

    let listener = TcpListener::bind((config.listen_addr.as_str(), config.listen_port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, server::router(app))
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    Ok(())
}
