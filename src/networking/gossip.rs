
#[allow(missing_docs)]
// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

// Gossip transport (libp2p): persistent identity + gossipsub namespace topic.

// - Outbound: Delta -> gossipsub publish (canonical JSON)
// - Inbound: gossipsub message -> Delta -> inbound channel
// - Allowlist: if allow_peers non-empty, disconnect peers not in allowlist
// - Availability: true while at least one peer is connected
// - Metrics: peer count gauge + invalid msg counter

use crate::{
    core::config::MAX_DELTA_BYTES,
    core::security::keystore::write_secret,
    core::types::{decode_delta_limited, encode_delta, Delta},
    monitoring::metrics::Metrics,
    networking::transport::{InboundTx, Transport, TransportError},
};
use std::{collections::HashSet, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use libp2p::{
    core::upgrade,
    gossipsub::{self, IdentTopic, MessageAuthenticity},
    identify, identity, noise, ping,
    swarm::{NetworkBehaviour, Swarm, SwarmEvent},
    tcp, yamux, Multiaddr, PeerId, Transport as _,
};

use libp2p::futures::StreamExt;
use libp2p::swarm::Config as SwarmConfig;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("io")]
    Io,
    #[error("identity")]
    Identity,
}

/// Runtime configuration for the gossip transport.
#[derive(Clone, Debug)]
pub struct GossipConfig {
    /// Listen address as string (e.g. "/ip4/0.0.0.0/tcp/4460").
    pub listen_addr: String,
    /// Gossipsub topic carrying namespace deltas.
    pub topic: String,
    /// Data directory used for the persistent identity.
    pub data_dir: String,
    /// Bootstrap peers.
    pub bootstrap: Vec<String>,
    /// Optional allowlist of peer ids (empty => allow all).
    pub allow_peers: Vec<String>,
}

/// Handle implementing [`Transport`] over the swarm task.
pub struct GossipTransport {
    outbound_tx: mpsc::Sender<Delta>,
    available_rx: watch::Receiver<bool>,
}

#[async_trait]
impl Transport for GossipTransport {
    async fn publish(&self, delta: &Delta) -> Result<(), TransportError> {
        // Gossipsub acknowledges asynchronously inside the swarm task; the
        // peer-count gate is the availability signal here.
        if !*self.available_rx.borrow() {
            return Err(TransportError::Unavailable);
        }
        self.outbound_tx
            .send(delta.clone())
            .await
            .map_err(|_| TransportError::Failed("swarm task gone".into()))
    }

    fn availability(&self) -> watch::Receiver<bool> {
        self.available_rx.clone()
    }
}

#[derive(Debug)]
enum BehaviourEvent {
    Gossipsub(gossipsub::Event),
    Identify(()),
    Ping(()),
}
impl From<gossipsub::Event> for BehaviourEvent {
    fn from(e: gossipsub::Event) -> Self {
        Self::Gossipsub(e)
    }
}
impl From<identify::Event> for BehaviourEvent {
    fn from(_e: identify::Event) -> Self {
        Self::Identify(())
    }
}
impl From<ping::Event> for BehaviourEvent {
    fn from(_e: ping::Event) -> Self {
        Self::Ping(())
    }
}

#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "BehaviourEvent")]
struct Behaviour {
    gossipsub: gossipsub::Behaviour,
    identify: identify::Behaviour,
    ping: ping::Behaviour,
}

// Persistent swarm identity at `<data_dir>/gossip.key` (libp2p protobuf
// keypair encoding), written through the keystore's secret-file primitive so
// every secret in the crate shares one atomic-write path. Losing this file
// only changes the node's peer id; the namespace is unaffected.
fn load_or_create_gossip_identity(
    data_dir: &str,
) -> Result<(PeerId, identity::Keypair), GossipError> {
    let path = Path::new(data_dir).join("gossip.key");
    let keypair = match std::fs::read(&path) {
        Ok(bytes) => identity::Keypair::from_protobuf_encoding(&bytes)
            .map_err(|_| GossipError::Identity)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let fresh = identity::Keypair::generate_ed25519();
            let bytes = fresh
                .to_protobuf_encoding()
                .map_err(|_| GossipError::Identity)?;
            write_secret(&path, &bytes).map_err(|_| GossipError::Io)?;
            fresh
        }
        Err(_) => return Err(GossipError::Io),
    };
    let peer_id = PeerId::from(keypair.public());
    Ok((peer_id, keypair))
}

/// Spawn the gossip swarm task.
///
/// Returns the transport handle, the local peer id, and the task handle.
/// Inbound deltas are tagged with the propagating peer and pushed into
/// `inbound_tx`.
pub fn spawn_gossip(
    cfg: GossipConfig,
    metrics: Arc<Metrics>,
    inbound_tx: InboundTx,
) -> Result<(GossipTransport, PeerId, tokio::task::JoinHandle<()>), GossipError> {
    let (local_peer_id, id_keys) = load_or_create_gossip_identity(&cfg.data_dir)?;

    // Build allowlist set.
    let mut allow_set: HashSet<PeerId> = HashSet::new();
    for s in cfg
        .allow_peers
        .iter()
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
    {
        match s.parse::<PeerId>() {
            Ok(pid) => {
                allow_set.insert(pid);
            }
            Err(_) => {
                warn!(peer = %s, "invalid allow_peers entry; ignoring");
            }
        }
    }

    // Channels
    let (out_tx, mut out_rx) = mpsc::channel::<Delta>(1024);
    let (avail_tx, avail_rx) = watch::channel(false);

    let listen_addr = cfg.listen_addr.clone();
    let topic_name = cfg.topic.clone();
    let bootstrap = cfg.bootstrap.clone();

    // Spawn swarm loop
    let join = tokio::spawn(async move {
        // --- Transport (TCP + Noise + Yamux) ---
        let noise_keys = match noise::Config::new(&id_keys) {
            Ok(v) => v,
            Err(_) => {
                warn!("failed to build noise config");
                return;
            }
        };

        let transport = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true))
            .upgrade(upgrade::Version::V1)
            .authenticate(noise_keys)
            .multiplex(yamux::Config::default())
            .boxed();

        // --- Gossipsub ---
        let gcfg = gossipsub::ConfigBuilder::default()
            .validation_mode(gossipsub::ValidationMode::Permissive)
            .heartbeat_interval(Duration::from_secs(1))
            .max_transmit_size(MAX_DELTA_BYTES)
            .build()
            .unwrap_or_else(|_| gossipsub::Config::default());

        let mut gossipsub =
            match gossipsub::Behaviour::new(MessageAuthenticity::Signed(id_keys.clone()), gcfg) {
                Ok(v) => v,
                Err(_) => {
                    warn!("failed to create gossipsub behaviour");
                    return;
                }
            };

        let topic = IdentTopic::new(topic_name.clone());
        if let Err(e) = gossipsub.subscribe(&topic) {
            warn!(err = ?e, "failed to subscribe topic");
        }

        // Identify + Ping
        let identify = identify::Behaviour::new(identify::Config::new(
            "vns/1.0.0".to_string(),
            id_keys.public(),
        ));

        let ping = ping::Behaviour::new(
            ping::Config::new()
                .with_interval(Duration::from_secs(10))
                .with_timeout(Duration::from_secs(20)),
        );

        let behaviour = Behaviour {
            gossipsub,
            identify,
            ping,
        };

        let mut swarm = Swarm::new(
            transport,
            behaviour,
            local_peer_id,
            SwarmConfig::with_tokio_executor(),
        );

        // Listen
        let listen: Multiaddr = match listen_addr.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(addr = %listen_addr, "bad listen_addr");
                return;
            }
        };

        if let Err(e) = swarm.listen_on(listen) {
            warn!(err = ?e, "listen_on failed");
            return;
        }

        // Bootstrap
        for b in bootstrap.iter().map(|x| x.trim()).filter(|x| !x.is_empty()) {
            match b.parse::<Multiaddr>() {
                Ok(ma) => {
                    if let Err(e) = swarm.dial(ma.clone()) {
                        warn!(boot = %b, err = ?e, "dial bootstrap failed");
                    } else {
                        info!(boot = %b, "dialing bootstrap");
                    }
                }
                Err(_) => warn!(boot = %b, "bad bootstrap addr; skipping"),
            }
        }

        info!(%local_peer_id, topic = %topic_name, "gossip loop started");

        // Ensure gauge starts at 0
        metrics.p2p_peers.set(0);
        let mut connected: usize = 0;

        loop {
            tokio::select! {
                maybe_delta = out_rx.recv() => {
                    match maybe_delta {
                        Some(delta) => {
                            match encode_delta(&delta) {
                                Ok(bytes) => {
                                    if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic.clone(), bytes) {
                                        warn!(err=?e, "gossipsub publish failed");
                                    }
                                }
                                Err(_) => {
                                    warn!("failed to encode delta");
                                    metrics.invalid_delta_total.inc();
                                }
                            }
                        }
                        None => {
                            warn!("outbound channel closed; stopping gossip task");
                            break;
                        }
                    }
                }

                ev = swarm.select_next_some() => {
                    match ev {
                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr=%address, "listening");
                        }

                        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                            if !allow_set.is_empty() && !allow_set.contains(&peer_id) {
                                warn!(%peer_id, "peer not in allowlist; disconnecting");
                                let _ = swarm.disconnect_peer_id(peer_id);
                                continue;
                            }
                            connected += 1;
                            metrics.p2p_peers.inc();
                            let _ = avail_tx.send(connected > 0);
                            info!(%peer_id, "peer connected");
                        }

                        SwarmEvent::ConnectionClosed { peer_id, .. } => {
                            connected = connected.saturating_sub(1);
                            metrics.p2p_peers.dec();
                            let _ = avail_tx.send(connected > 0);
                            info!(%peer_id, "peer disconnected");
                        }

                        SwarmEvent::Behaviour(BehaviourEvent::Gossipsub(gossipsub::Event::Message { propagation_source, message, .. })) => {
                            if !allow_set.is_empty() && !allow_set.contains(&propagation_source) {
                                warn!(%propagation_source, "message from non-allowlisted peer; dropping");
                                continue;
                            }
                            match decode_delta_limited(&message.data, MAX_DELTA_BYTES) {
                                Ok(delta) => {
                                    let _ = inbound_tx.send((delta, propagation_source.to_string())).await;
                                }
                                Err(_) => {
                                    warn!(%propagation_source, "invalid delta decode");
                                    metrics.invalid_delta_total.inc();
                                }
                            }
                        }

                        SwarmEvent::Behaviour(BehaviourEvent::Identify(_)) => {}
                        SwarmEvent::Behaviour(BehaviourEvent::Ping(_)) => {}

                        _ => {}
                    }
                }
            }
        }
    });

    Ok((
        GossipTransport {
            outbound_tx: out_tx,
            available_rx: avail_rx,
        },
        local_peer_id,
        join,
    ))
}
