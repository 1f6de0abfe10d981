use std::path::PathBuf;

use fetchledger::ItemId;
use fetchledger::config::Config;
use fetchledger::fetch::{DirectorySink, HttpFetcher};
use fetchledger::ledger::LedgerStore;
use fetchledger::orchestrator::FetchOrchestrator;
use fetchledger::universe::load_universe;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{QuarantinedArgs, ReleaseArgs, RunArgs, StatusArgs};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn load_config(path: Option<PathBuf>) -> Result<Config, AnyError> {
    let config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn open_store(config: &Config) -> Result<LedgerStore, AnyError> {
    let store = LedgerStore::open(&config.ledger.path)?
        .with_refresh_after(config.ledger.refresh_after.map(|d| d.as_duration()));
    Ok(store)
}

pub async fn run(args: RunArgs, mut config: Config) -> Result<(), AnyError> {
    if let Some(workers) = args.workers {
        config.orchestrator.worker_pool_size = workers.max(1);
    }

    let universe = load_universe(&args.ids).await?;
    let store = open_store(&config)?;

    let mut fetcher = HttpFetcher::new(&args.provider, &args.url_template, config.http_config())?;
    for (name, value) in config.http.headers.iter().chain(args.headers.iter().map(|(n, v)| (n, v))) {
        fetcher = fetcher.with_header(name.clone(), value.clone());
    }
    let sink = DirectorySink::new(&args.out);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let orchestrator = FetchOrchestrator::from_config(store, &config);
    match orchestrator.run(universe, &fetcher, &sink, &cancel).await {
        Ok(summary) => {
            println!("{}", summary);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.summary());
            Err(e.into())
        }
    }
}

pub fn status(args: StatusArgs, config: &Config) -> Result<(), AnyError> {
    let store = open_store(config)?;

    if args.all {
        for (id, record) in store.status().records()? {
            println!("{}", serde_json::json!({ "item_id": id, "status": record }));
        }
        return Ok(());
    }

    if args.ids.is_empty() {
        let stats = store.stats()?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    for raw in args.ids {
        let id = ItemId::from(raw);
        let record = store.status().get(&id)?;
        let quarantine = store.failures().get(&id)?;
        println!(
            "{}",
            serde_json::json!({
                "item_id": id,
                "status": record,
                "quarantine": quarantine,
            })
        );
    }
    Ok(())
}

pub fn quarantined(args: QuarantinedArgs, config: &Config) -> Result<(), AnyError> {
    let store = open_store(config)?;
    let records = store.failures().list_quarantined()?;
    let limit = args.limit.unwrap_or(records.len());

    for record in records.iter().take(limit) {
        println!("{}", serde_json::to_string(record)?);
    }
    if records.len() > limit {
        info!(shown = limit, total = records.len(), "Output truncated");
    }
    Ok(())
}

pub fn release(args: ReleaseArgs, config: &Config) -> Result<(), AnyError> {
    let store = open_store(config)?;

    for raw in args.ids {
        let id = ItemId::from(raw);
        match store.failures().release(&id)? {
            Some(record) => {
                store.status().reset(&id)?;
                println!("released {} ({:?})", id, record.cause.kind);
            }
            None => warn!(item_id = %id, "Item is not quarantined"),
        }
    }
    store.persist()?;
    Ok(())
}

pub fn show_config(config: &Config) -> Result<(), AnyError> {
    print!("{}", config.to_toml()?);
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => return,
    }
    info!("Shutdown signal received, finishing in-flight attempts");
    cancel.cancel();
}
