//! Development session: watch, rebuild, live reload, preview.
//!
//! ```text
//! watch root ──▶ WatchSubscription ─┐
//! module roots ─▶ WatchSubscription ─┤ events
//!                                    ▼
//!                                 Session ──request_build──▶ Orchestrator
//!                                    ▲                            │
//!                                    └──────── BuildResult ◀──────┘
//!                                    │
//!                                    └─ success ──▶ LiveServer::broadcast
//! ```
//!
//! Edits to module description documents re-index the registry instead of
//! building.

mod reindex;
mod session;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::build::{Orchestrator, Trigger};
use crate::cli::common::{collect_sources, plural_count};
use crate::cli::modules::open_registry;
use crate::config::ProjectConfig;
use crate::live::LiveServer;
use crate::module::Registry;
use crate::preview::PreviewServer;
use crate::watch::{self, ChangeEvent, WatchError, WatchOptions, WatchSubscription};
use crate::{core, debug, log};

use session::Session;

const EVENT_CAPACITY: usize = 256;

type WatchItem = Result<ChangeEvent, WatchError>;

/// Run `serve` until Ctrl+C.
pub async fn serve(config: &ProjectConfig, watch: bool) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded::<()>(1);
    core::register_shutdown(shutdown_tx);

    let shutdown = async move {
        // crossbeam recv blocks; keep it off the async workers
        let _ = tokio::task::spawn_blocking(move || shutdown_rx.recv()).await;
    };
    run(config, watch, shutdown).await
}

/// Bring every component up, process events until `shutdown` resolves, then
/// tear down in reverse order.
pub async fn run(config: &ProjectConfig, watch: bool, shutdown: impl Future<Output = ()>) -> Result<()> {
    let registry = load_registry(config).await;

    let live = LiveServer::start(&config.live.interface.to_string(), config.live.port)
        .context("failed to start live reload server")?;
    let mut preview = PreviewServer::start(
        &config.serve.interface.to_string(),
        config.serve.port,
        config.serve_root().to_path_buf(),
        Some(live.port()),
    )?;
    core::register_server(preview.handle());
    log!("serve"; "http://{}", preview.addr());
    debug!("live"; "ws://{}", live.local_addr());

    let compiler = config
        .build
        .compiler()
        .context("build.compiler is empty")?;
    let (result_tx, mut results) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::start(compiler, config.build.workers, Some(result_tx));

    // subscribe before the initial build so edits made meanwhile are kept
    let (mut events, forwarders) = if watch {
        subscribe_all(config)?
    } else {
        let (_, rx) = mpsc::channel(1);
        (rx, Vec::new())
    };

    let mut sources = collect_sources(std::slice::from_ref(&config.watch.root), &config.watch.filter());
    sources.retain(|source| !config.is_module_path(source));
    log!("build"; "building {}", plural_count(sources.len(), "source"));
    for source in &sources {
        let _ = orchestrator.request_build(source, Trigger::Manual);
    }

    let session = Session::new(config, orchestrator, live, registry);

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(event) = events.recv() => session.on_watch(event),
            Some(result) = results.recv() => session.on_result(&result),
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    let reported = session.shutdown(&mut results).await;
    debug!("build"; "{} builds finished during shutdown", reported);
    preview.stop();
    debug!("serve"; "stopped");
    Ok(())
}

async fn load_registry(config: &ProjectConfig) -> Registry {
    let owned = config.clone();
    match tokio::task::spawn_blocking(move || open_registry(&owned, false)).await {
        Ok(Ok(registry)) => registry,
        Ok(Err(e)) => {
            log!("warning"; "module index unavailable: {:#}", e);
            Registry::new()
        }
        Err(e) => {
            log!("warning"; "module index unavailable: {}", e);
            Registry::new()
        }
    }
}

/// Subscribe to the watch root and every module root outside it, merging
/// their events into one channel.
fn subscribe_all(config: &ProjectConfig) -> Result<(mpsc::Receiver<WatchItem>, Vec<JoinHandle<()>>)> {
    let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
    let mut forwarders = Vec::new();

    let subscription = watch::subscribe(&config.watch.root, config.watch.options())
        .with_context(|| format!("failed to watch {}", config.watch.root.display()))?;
    log!("watch"; "watching {}", subscription.root().display());
    forwarders.push(tokio::spawn(forward(subscription, tx.clone())));

    for root in module_roots_outside(config) {
        let options = WatchOptions {
            extensions: vec!["chtl".into()],
            ..WatchOptions::default()
        };
        match watch::subscribe(&root, options) {
            Ok(subscription) => forwarders.push(tokio::spawn(forward(subscription, tx.clone()))),
            Err(e) => debug!("watch"; "not watching module root: {}", e),
        }
    }

    Ok((rx, forwarders))
}

fn module_roots_outside(config: &ProjectConfig) -> Vec<PathBuf> {
    config
        .modules
        .paths
        .iter()
        .filter(|root| !root.starts_with(&config.watch.root))
        .cloned()
        .collect()
}

/// Pump one subscription into the shared channel. A watch fault is passed
/// on and ends the forwarder.
async fn forward(mut subscription: WatchSubscription, tx: mpsc::Sender<WatchItem>) {
    while let Some(item) = subscription.recv().await {
        let fault = item.is_err();
        if tx.send(item).await.is_err() || fault {
            break;
        }
    }
    subscription.unsubscribe();
}
