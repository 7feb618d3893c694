#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! VNS node entrypoint (systemd-friendly).
//! Starts the namespace store, the replication stack and the HTTP API.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use vns::api::{router, ApiContext};
use vns::core::config::{VnsConfig, DELTA_QUEUE_CAPACITY, POW_DIFFICULTY};
use vns::core::security::admission::Admission;
use vns::core::security::keystore::Keystore;
use vns::core::store::blob::SledBlobStore;
use vns::core::store::namespace::NamespaceStore;
use vns::monitoring::metrics::Metrics;
use vns::networking::gossip::{spawn_gossip, GossipConfig};
use vns::networking::http_fanout::HttpFanout;
use vns::networking::replicator::{spawn_replicator, ReplicatorConfig};
use vns::networking::transport::Transport;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let cfg = match VnsConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };
    if !cfg.enabled {
        warn!("name service disabled (ENABLE_VNS=false); serving status only");
    }

    let metrics: Arc<Metrics> = Arc::new(Metrics::new().expect("metrics init failed"));

    let blobs = match SledBlobStore::open(&format!("{}/blobs", cfg.data_dir)) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            eprintln!("blob store open failed: {e}");
            std::process::exit(1);
        }
    };

    // Owner identity: used to sign local mutations via the CLI and to
    // recognize transfers addressed to this node.
    let local_owner = match Keystore::open(&cfg.data_dir) {
        Ok(ks) => Some(ks.owner_fingerprint()),
        Err(e) => {
            warn!(err = %e, "keystore unavailable; transfers to this node will not re-emit");
            None
        }
    };

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::channel(1024);

    let store = Arc::new(NamespaceStore::new(
        blobs,
        Admission::new(POW_DIFFICULTY),
        local_owner,
        cfg.strict_transfer,
        outbound_tx,
        metrics.clone(),
    ));
    match store.load_from_manifest() {
        Ok(0) => info!("starting with a fresh namespace"),
        Ok(n) => info!(entries = n, "namespace restored"),
        Err(e) => {
            eprintln!("namespace restore failed: {e}");
            std::process::exit(1);
        }
    }

    // Transport selection: configured HTTP peers take precedence over the
    // gossip mesh; both feed the same inbound channel (the HTTP transport
    // via the /push-delta route).
    let mut gossip_task = None;
    let (transport, local_peer): (Arc<dyn Transport>, String) =
        if !cfg.http_bootstrap_peers.is_empty() {
            info!(peers = cfg.http_bootstrap_peers.len(), "using HTTP fan-out transport");
            let local_peer = cfg
                .public_url
                .clone()
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", cfg.api_port));
            (
                Arc::new(HttpFanout::new(cfg.http_bootstrap_peers.clone())),
                local_peer,
            )
        } else {
            let gossip_cfg = GossipConfig {
                listen_addr: cfg.gossip_listen_addr.clone(),
                topic: cfg.gossip_topic.clone(),
                data_dir: cfg.data_dir.clone(),
                bootstrap: cfg.gossip_bootstrap.clone(),
                allow_peers: cfg.gossip_allow_peers.clone(),
            };
            match spawn_gossip(gossip_cfg, metrics.clone(), inbound_tx.clone()) {
                Ok((transport, peer_id, task)) => {
                    gossip_task = Some(task);
                    (Arc::new(transport), peer_id.to_string())
                }
                Err(e) => {
                    eprintln!("gossip start failed: {e}");
                    std::process::exit(1);
                }
            }
        };

    let availability = transport.availability();

    let replicator = spawn_replicator(
        ReplicatorConfig {
            local_peer,
            queue_capacity: DELTA_QUEUE_CAPACITY,
        },
        transport,
        store.clone(),
        outbound_rx,
        inbound_rx,
        metrics.clone(),
    );

    // Expiry sweep on a fixed cadence; also runs implicitly via resolve
    // reporting and on-demand API usage.
    let sweep_store = store.clone();
    let sweep_period = cfg.sweep_period_secs;
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_period.max(1)));
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let removed = sweep_store.sweep_expired();
            if removed > 0 {
                info!(removed, "expiry sweep finished");
            }
        }
    });

    let ctx = Arc::new(ApiContext {
        store,
        inbound_tx,
        metrics,
        config: cfg.clone(),
        availability,
    });
    let app = router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("bind {addr} failed: {e}");
            std::process::exit(1);
        }
    };
    info!(%addr, "vns node serving");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .into_future();

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                warn!(err = %e, "http server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // A pending sweep is cancelled on shutdown; partially-swept state is
    // valid because the sweep is idempotent.
    sweeper.abort();
    replicator.abort();
    if let Some(task) = gossip_task {
        task.abort();
    }
}
