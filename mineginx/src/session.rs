use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use minecraft::{
    packets::{HandshakeC2SPacket, MinecraftPacket, StatusRequestC2SPacket, StatusResponseS2CPacket},
    serialization::{truncate_to_zero, MinecraftStream, ReadingError},
};
use tokio::{io::AsyncWriteExt, net::TcpStream, task::JoinHandle, time::timeout};

use crate::{
    config::{MineginxConfig, ProxyMode},
    error::SessionError,
    resolve::{self, ResolvedAddress},
    stream,
};

const DOWNSTREAM_FRAME_BUFFER: usize = 4096;
const UPSTREAM_FRAME_BUFFER: usize = 4096;
const SPLICE_BUFFER_SIZE: usize = 8192;

/// Tagged routing decision for a single handshake, replacing the
/// mode-polymorphic-session approach of the original with a plain enum
/// and a common splice tail.
enum Routing {
    /// `pass_through_dedicated` and `pass_through_by_domain` both resolve to
    /// a single upstream target; they differ only in how `target` was
    /// derived.
    NonHidden { target: ResolvedAddress },
    /// `hidden` dials both a primary and a sidecar target, never via SRV.
    Hidden {
        primary: ResolvedAddress,
        sidecar: ResolvedAddress,
    },
}

fn violation(msg: impl Into<String>) -> SessionError {
    SessionError::ProtocolViolation(msg.into())
}

/// Determines the routing target(s) for a handshake.
fn route(config: &MineginxConfig, client_requested_host: &str) -> Result<Routing, SessionError> {
    match config.mode {
        ProxyMode::PassThroughDedicated => Ok(Routing::NonHidden {
            target: ResolvedAddress {
                host: config.primary_host.clone(),
                port: config.primary_port,
            },
        }),
        ProxyMode::PassThroughByDomain => {
            let target = resolve::decode(client_requested_host, &config.server_domain)?;
            Ok(Routing::NonHidden { target })
        }
        ProxyMode::Hidden => Ok(Routing::Hidden {
            primary: ResolvedAddress {
                host: config.primary_host.clone(),
                port: config.primary_port,
            },
            sidecar: ResolvedAddress {
                host: config.sidecar_host.clone(),
                port: config.sidecar_port,
            },
        }),
    }
}

/// Connects to `connect` and immediately emits the handshake packet.
/// `handshake_target` carries the pre-SRV host/port that must appear in the
/// handshake body even when `connect` was SRV-rewritten.
async fn dial(
    connect: &ResolvedAddress,
    handshake_target: &ResolvedAddress,
    protocol_version: i32,
    next_state: i32,
) -> Result<TcpStream, SessionError> {
    let mk_err = |source: std::io::Error| SessionError::UpstreamConnectFailed {
        host: connect.host.clone(),
        port: connect.port,
        source,
    };

    let mut upstream = TcpStream::connect((connect.host.as_str(), connect.port))
        .await
        .map_err(mk_err)?;
    upstream.set_nodelay(true).map_err(mk_err)?;

    let handshake = HandshakeC2SPacket {
        protocol_version,
        domain: handshake_target.host.clone(),
        server_port: handshake_target.port,
        next_state,
    };
    let packet = MinecraftPacket::make_raw(0, &handshake)
        .ok_or_else(|| violation("failed to encode upstream handshake"))?;
    upstream.write_all(&packet).await.map_err(mk_err)?;
    Ok(upstream)
}

/// Schedules the SRV lookup in the background; the result is picked up by
/// whichever of login_start/status_request arrives first, so the dial
/// happens on the continuation rather than blocking the handshake.
fn schedule_srv(target: ResolvedAddress) -> JoinHandle<ResolvedAddress> {
    tokio::spawn(async move { resolve::resolve_srv(&target).await })
}

async fn resolved_or_fallback(
    handle: JoinHandle<ResolvedAddress>,
    fallback: &ResolvedAddress,
) -> ResolvedAddress {
    handle.await.unwrap_or_else(|_| fallback.clone())
}

/// Entry point: owns a single downstream connection end to end.
pub async fn handle_client(mut client: TcpStream, config: Arc<MineginxConfig>) {
    let peer = client.peer_addr().ok();
    debug!("accepted connection from {:?}", peer);
    if let Err(e) = client.set_nodelay(true) {
        warn!("failed to set nodelay for client {:?}: {}", peer, e);
        return;
    }

    let handshake_timeout = Duration::from_millis(config.handshake_timeout_ms.unwrap_or(10_000));
    let idle_timeout = Duration::from_millis(config.idle_timeout_ms.unwrap_or(60_000));

    let mut downstream = MinecraftStream::new(&mut client, DOWNSTREAM_FRAME_BUFFER);

    let handshake = match timeout(handshake_timeout, read_handshake(&mut downstream)).await {
        Ok(Ok(handshake)) => handshake,
        Ok(Err(e)) => {
            warn!("handshake failed for {:?}: {}", peer, e);
            return;
        }
        Err(_) => {
            warn!("handshake timed out for {:?}", peer);
            return;
        }
    };

    let requested_host = truncate_to_zero(&handshake.domain).to_string();
    let routing = match route(&config, &requested_host) {
        Ok(routing) => routing,
        Err(e) => {
            info!(
                "routing failed for {:?} (requested host {:?}): {}",
                peer, requested_host, e
            );
            return;
        }
    };

    info!(
        "new connection from {:?} (protocol_version={}, requested_host={:?}, next_state={})",
        peer, handshake.protocol_version, requested_host, handshake.next_state
    );

    let result = match handshake.next_state {
        1 => handle_status(&mut downstream, &config, &handshake, routing, idle_timeout).await,
        2 => match handle_login(&mut downstream, &handshake, routing, idle_timeout).await {
            Ok((upstream, leftover)) => {
                // `downstream` borrows `client` mutably; it is not touched
                // again after this point, so the borrow can be released
                // and `client` moved into the splice.
                drop(downstream);
                finish_login(client, upstream, leftover, idle_timeout).await
            }
            Err(e) => Err(e),
        },
        other => Err(violation(format!("unknown next_state {other}"))),
    };

    if let Err(e) = result {
        warn!("session with {:?} ended: {}", peer, e);
    } else {
        info!("connection with {:?} closed", peer);
    }
}

async fn read_handshake(
    downstream: &mut MinecraftStream<&mut TcpStream>,
) -> Result<HandshakeC2SPacket, SessionError> {
    let signature = downstream
        .read_signature()
        .await
        .map_err(|_| violation("failed to read handshake signature"))?;
    if signature.packet_id != 0 {
        return Err(violation("first packet was not a handshake"));
    }
    downstream
        .read_data::<HandshakeC2SPacket>(signature)
        .await
        .map_err(|_| violation("malformed handshake body"))
}

async fn finish_login(
    client: TcpStream,
    mut upstream: TcpStream,
    leftover: Vec<u8>,
    idle_timeout: Duration,
) -> Result<(), SessionError> {
    if !leftover.is_empty() {
        upstream
            .write_all(&leftover)
            .await
            .map_err(|source| SessionError::UpstreamConnectFailed {
                host: upstream
                    .peer_addr()
                    .map(|a| a.ip().to_string())
                    .unwrap_or_default(),
                port: upstream.peer_addr().map(|a| a.port()).unwrap_or_default(),
                source,
            })?;
    }
    splice(client, upstream, idle_timeout).await;
    Ok(())
}

/// Terminal action once the framed login phase ends: bytes are copied
/// verbatim in both directions with no further parsing.
async fn splice(client: TcpStream, upstream: TcpStream, idle_timeout: Duration) {
    let (client_read, client_write) = client.into_split();
    let (upstream_read, upstream_write) = upstream.into_split();

    let c2u = stream::forward_half(client_read, upstream_write, SPLICE_BUFFER_SIZE, idle_timeout);
    let u2c = stream::forward_half(upstream_read, client_write, SPLICE_BUFFER_SIZE, idle_timeout);

    let _ = tokio::join!(c2u, u2c);
}

async fn handle_status(
    downstream: &mut MinecraftStream<&mut TcpStream>,
    config: &MineginxConfig,
    handshake: &HandshakeC2SPacket,
    routing: Routing,
    idle_timeout: Duration,
) -> Result<(), SessionError> {
    let target = match routing {
        Routing::NonHidden { target } => target,
        Routing::Hidden { primary, .. } => primary,
    };
    let mut srv_handle = Some(schedule_srv(target.clone()));

    loop {
        let (signature, body) = match timeout(idle_timeout, downstream.read_raw_packet()).await {
            Ok(Ok(v)) => v,
            Ok(Err(ReadingError::Closed)) => return Ok(()),
            Ok(Err(_)) => return Err(violation("malformed status packet")),
            Err(_) => return Err(SessionError::IdleTimeout),
        };

        match signature.packet_id {
            0 => {
                let json = if config.sync_motd {
                    let resolved = match srv_handle.take() {
                        Some(handle) => resolved_or_fallback(handle, &target).await,
                        None => target.clone(),
                    };
                    fetch_upstream_motd(&resolved, handshake.protocol_version).await?
                } else {
                    synthesize_motd(&config.motd_default)
                };
                downstream
                    .write_packet(&StatusResponseS2CPacket { json })
                    .await
                    .ok_or_else(|| violation("failed to write status response"))?;
            }
            1 => {
                let payload = decode_ping_payload(&body)?;
                // Pong keeps id 0x01 (matching the client's ping); write_packet
                // always frames under id 0x00, so this goes out raw instead.
                downstream
                    .write_raw_packet(1, &payload.to_be_bytes())
                    .await
                    .ok_or_else(|| violation("failed to write pong"))?;
            }
            other => {
                return Err(violation(format!(
                    "unexpected packet id {other} in status state"
                )))
            }
        }
    }
}

fn decode_ping_payload(body: &[u8]) -> Result<i64, SessionError> {
    if body.len() != 8 {
        return Err(violation("ping payload was not 8 bytes"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(body);
    Ok(i64::from_be_bytes(bytes))
}

fn synthesize_motd(motd_default: &str) -> String {
    serde_json::json!({
        "version": { "name": "mineginx", "protocol": 0 },
        "players": { "max": 0, "online": 0 },
        "description": { "text": motd_default },
    })
    .to_string()
}

/// Used only when `sync_motd` is set: opens a short-lived status connection
/// to the upstream and relays its response verbatim.
async fn fetch_upstream_motd(
    target: &ResolvedAddress,
    protocol_version: i32,
) -> Result<String, SessionError> {
    let mut upstream = dial(target, target, protocol_version, 1).await?;
    let mut framed = MinecraftStream::new(&mut upstream, UPSTREAM_FRAME_BUFFER);
    framed
        .write_packet(&StatusRequestC2SPacket {})
        .await
        .ok_or_else(|| violation("failed to send status_request upstream"))?;
    let response = framed
        .read_packet::<StatusResponseS2CPacket>()
        .await
        .map_err(|_| SessionError::UpstreamClosedPrematurely)?;
    Ok(response.json)
}

/// Drives the framed login exchange to completion and returns the upstream
/// connection (with its handshake and login_start already sent) plus any
/// bytes the client pipelined past login completion, ready to be flushed
/// ahead of the splice.
async fn handle_login(
    downstream: &mut MinecraftStream<&mut TcpStream>,
    handshake: &HandshakeC2SPacket,
    routing: Routing,
    idle_timeout: Duration,
) -> Result<(TcpStream, Vec<u8>), SessionError> {
    let (signature, login_start_body) = timeout(idle_timeout, downstream.read_raw_packet())
        .await
        .map_err(|_| SessionError::IdleTimeout)?
        .map_err(|_| violation("failed to read login_start"))?;
    if signature.packet_id != 0 {
        return Err(violation("out-of-order login: expected login_start"));
    }

    match routing {
        Routing::NonHidden { target } => {
            let srv_handle = schedule_srv(target.clone());
            let resolved = resolved_or_fallback(srv_handle, &target).await;
            let mut upstream = dial(&resolved, &target, handshake.protocol_version, 2).await?;
            upstream
                .write_all(&MinecraftPacket::make_raw_bytes(0, &login_start_body))
                .await
                .map_err(|source| SessionError::UpstreamConnectFailed {
                    host: resolved.host.clone(),
                    port: resolved.port,
                    source,
                })?;
            Ok((upstream, downstream.take_buffer()))
        }
        Routing::Hidden { primary, sidecar } => {
            handle_hidden_login(
                downstream,
                handshake,
                &login_start_body,
                &primary,
                &sidecar,
                idle_timeout,
            )
            .await
        }
    }
}

/// Implements the hidden-mode mediator: the sidecar performs the client's
/// encryption round-trip, then the primary is dialed only after the
/// encryption response has been relayed to the sidecar, and the sidecar's
/// further output is drained and discarded rather than reaching the
/// client.
async fn handle_hidden_login(
    downstream: &mut MinecraftStream<&mut TcpStream>,
    handshake: &HandshakeC2SPacket,
    login_start_body: &[u8],
    primary: &ResolvedAddress,
    sidecar: &ResolvedAddress,
    idle_timeout: Duration,
) -> Result<(TcpStream, Vec<u8>), SessionError> {
    let mut sidecar_conn = dial(sidecar, sidecar, handshake.protocol_version, 2).await?;
    sidecar_conn
        .write_all(&MinecraftPacket::make_raw_bytes(0, login_start_body))
        .await
        .map_err(|source| SessionError::UpstreamConnectFailed {
            host: sidecar.host.clone(),
            port: sidecar.port,
            source,
        })?;

    let mut sidecar_framed = MinecraftStream::new(&mut sidecar_conn, UPSTREAM_FRAME_BUFFER);
    let (signature, encryption_request_body) =
        timeout(idle_timeout, sidecar_framed.read_raw_packet())
            .await
            .map_err(|_| SessionError::IdleTimeout)?
            .map_err(|_| SessionError::UpstreamClosedPrematurely)?;
    if signature.packet_id != 1 {
        return Err(violation("sidecar did not send login_encryption_request"));
    }
    downstream
        .write_raw_packet(1, &encryption_request_body)
        .await
        .ok_or_else(|| violation("failed to forward encryption_request"))?;

    let (signature, encryption_response_body) =
        timeout(idle_timeout, downstream.read_raw_packet())
            .await
            .map_err(|_| SessionError::IdleTimeout)?
            .map_err(|_| violation("failed to read encryption_response"))?;
    if signature.packet_id != 1 {
        return Err(violation("expected login_encryption_response from client"));
    }
    sidecar_framed
        .write_raw_packet(1, &encryption_response_body)
        .await
        .ok_or_else(|| violation("failed to forward encryption_response"))?;

    // The sidecar has served its purpose; anything it sends from here on
    // must not reach the client. Drain it so its writes don't back up
    // while the primary is dialed, independent of whether it closes.
    let (sidecar_read, _sidecar_write) = sidecar_conn.into_split();
    stream::drain(sidecar_read);

    let mut primary_conn = dial(primary, primary, handshake.protocol_version, 2).await?;
    primary_conn
        .write_all(&MinecraftPacket::make_raw_bytes(0, login_start_body))
        .await
        .map_err(|source| SessionError::UpstreamConnectFailed {
            host: primary.host.clone(),
            port: primary.port,
            source,
        })?;

    Ok((primary_conn, downstream.take_buffer()))
}
