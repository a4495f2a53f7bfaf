//! Transport session lifecycle: one task per WebSocket connection.
//!
//! The task owns the socket for its whole life, so all writes — forwarded
//! envelopes, synthetic replies, presence frames — funnel through the
//! session's queue and are serialized against the read loop in a single
//! `select!`. Teardown runs exactly once on every exit path: decode error,
//! read failure, LEAVE, or client close.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;

use crate::protocol::{Envelope, ProtocolError};
use crate::registry::SessionHandle;
use crate::router::{self, RouteOutcome};
use crate::server::SharedState;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Drive one admitted session until it closes.
pub async fn run(mut socket: WebSocket, state: Arc<SharedState>, identity: String, addr: SocketAddr) {
    let session_id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let (tx, mut rx) = mpsc::channel::<String>(state.config.session_queue);
    let handle = SessionHandle::new(session_id, identity.clone(), addr.to_string(), tx);

    // Registration supersedes any previous session for this identity and
    // emits the ONLINE presence event.
    state.registry.register(handle.clone());

    loop {
        tokio::select! {
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if handle_frame(&state, &handle, text.as_str()) == RouteOutcome::Close {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Some clients send JSON frames as binary; same framing.
                        let text = String::from_utf8_lossy(&data);
                        if handle_frame(&state, &handle, &text) == RouteOutcome::Close {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(%identity, session_id, "client closed");
                        break;
                    }
                    Some(Ok(_)) => {} // Ping/Pong handled by axum
                    Some(Err(e)) => {
                        tracing::debug!(%identity, session_id, "read error: {e}");
                        break;
                    }
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if let Err(e) = socket.send(Message::Text(frame.into())).await {
                            tracing::debug!(%identity, session_id, "write error: {e}");
                            break;
                        }
                    }
                    // All handles (including our own) gone; nothing more
                    // can ever be queued.
                    None => break,
                }
            }
        }
    }

    // Ownership-guarded: if a newer session superseded us, this is a
    // no-op and no OFFLINE event is emitted.
    state.registry.unregister(&identity, session_id);
    tracing::info!(%identity, session_id, remote_addr = %handle.remote_addr(), "session closed");
}

/// Decode and route one inbound frame. Unrecognized or missing tags are
/// non-fatal (valid JSON, just not a type we route); only frames that are
/// not valid JSON end the session.
fn handle_frame(state: &SharedState, handle: &SessionHandle, text: &str) -> RouteOutcome {
    match Envelope::decode(text) {
        Ok(envelope) => {
            tracing::debug!(identity = %handle.identity(), kind = envelope.tag(), "frame received");
            router::route(state, handle, envelope)
        }
        Err(ProtocolError::UnknownVariant(tag)) => {
            tracing::warn!(identity = %handle.identity(), %tag, "unrecognized message type, ignoring");
            RouteOutcome::Continue
        }
        Err(e @ ProtocolError::MissingTag) => {
            tracing::warn!(identity = %handle.identity(), "ignoring frame: {e}");
            RouteOutcome::Continue
        }
        Err(e @ ProtocolError::Malformed(_)) => {
            tracing::warn!(identity = %handle.identity(), "undecodable frame, closing session: {e}");
            RouteOutcome::Close
        }
    }
}
