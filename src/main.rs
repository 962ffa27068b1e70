mod catalog_source;
mod config;
mod credential_keyring;
mod db_manager;
mod enrichment_pipeline;
mod http_fetch;
mod metadata_client;
mod poster_store;
mod protocol;
mod rate_limiter;

use clap::Parser;
use log::{error, info, warn};

use catalog_source::HtmlCatalog;
use config::{Cli, RunSettings};
use db_manager::DbManager;
use enrichment_pipeline::EnrichmentPipeline;
use http_fetch::UreqFetcher;
use metadata_client::MetadataClient;
use poster_store::PosterDir;
use protocol::RunSummary;
use rate_limiter::{RateLimiter, SystemClock};

fn keyring_api_key(user: &str) -> Result<Option<String>, String> {
    match credential_keyring::get_api_key(user) {
        Ok(api_key) => Ok(api_key),
        Err(err) => {
            warn!("OS keyring unavailable: {err}");
            Ok(None)
        }
    }
}

fn enrich_catalog(settings: &RunSettings) -> Result<RunSummary, String> {
    let db = DbManager::open(&settings.store_path).map_err(|err| {
        format!(
            "failed to open record store {}: {err}",
            settings.store_path.display()
        )
    })?;
    let posters = PosterDir::new(&settings.asset_dir)?;
    let fetcher = UreqFetcher::new();

    let limiter = RateLimiter::new(
        settings.rate_limit_requests,
        settings.rate_limit_window,
        SystemClock,
    );
    let client = MetadataClient::new(
        &fetcher,
        limiter,
        settings.api_key.as_str(),
        settings.api_base_url.as_str(),
    );
    let mut pipeline = EnrichmentPipeline::start(client, &db, &posters)?;

    let entries = HtmlCatalog::new(&fetcher, settings.catalog_url.as_str()).fetch_entries()?;
    info!(
        "Enriching {} catalog entries into {} (posters in {})",
        entries.len(),
        settings.store_path.display(),
        posters.root().display()
    );
    let summary = pipeline.run(entries)?;

    match db.record_count() {
        Ok(count) => info!("Record store now holds {count} movies"),
        Err(err) => warn!("Couldn't count stored movies: {err}"),
    }
    Ok(summary)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::load_for_cli(&cli)?.apply_cli(&cli);

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if config.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let settings = config.resolve(keyring_api_key).map_err(|err| {
        error!("{err}");
        err
    })?;

    if cli.save_api_key {
        match credential_keyring::set_api_key(&settings.keyring_user, &settings.api_key) {
            Ok(()) => info!("Saved API key to the OS keyring"),
            Err(err) => warn!("Couldn't save API key: {err}"),
        }
    }

    let summary = enrich_catalog(&settings).map_err(|err| {
        error!("{err}");
        err
    })?;

    info!("{summary}");
    println!("{} movies processed.", summary.processed);
    Ok(())
}
