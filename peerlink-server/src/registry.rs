//! Live-connection registry: identity → active transport session.
//!
//! The registry is the only state shared by every session task. Each
//! operation takes the lock for a single short critical section; the lock
//! is never held across a socket write (outbound frames go through each
//! session's queue via `try_send`, which never blocks).

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::presence::PresenceEvent;
use crate::protocol::OnlineState;

/// A handle to one live transport session.
///
/// Cloning is cheap; the handle is just the session's outbound queue plus
/// identification. A handle can outlive its session — sends to a dead
/// session fail softly and callers treat that like an absent entry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: u64,
    identity: String,
    remote_addr: String,
    tx: mpsc::Sender<String>,
}

impl SessionHandle {
    pub fn new(session_id: u64, identity: String, remote_addr: String, tx: mpsc::Sender<String>) -> Self {
        Self {
            session_id,
            identity,
            remote_addr,
            tx,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Whether the session's read loop is still draining its queue.
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue one frame for this session, best-effort.
    pub fn send(&self, frame: String) -> Result<(), TrySendError<String>> {
        self.tx.try_send(frame)
    }
}

/// Concurrent identity → session mapping with presence side effects.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    presence_tx: mpsc::Sender<PresenceEvent>,
}

impl SessionRegistry {
    pub fn new(presence_tx: mpsc::Sender<PresenceEvent>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            presence_tx,
        }
    }

    /// Insert or overwrite the mapping for the handle's identity and emit
    /// an ONLINE presence event. Always succeeds: a newer session for the
    /// same identity silently supersedes the old one (last write wins).
    /// The superseded connection is not closed here; its own read loop
    /// owns that.
    pub fn register(&self, handle: SessionHandle) {
        let identity = handle.identity().to_string();
        let superseded = self.sessions.lock().insert(identity.clone(), handle).is_some();
        if superseded {
            tracing::info!(%identity, "superseding previous session for identity");
        } else {
            tracing::info!(%identity, "session registered");
        }
        self.enqueue_presence(PresenceEvent {
            subject: identity,
            state: OnlineState::Online,
        });
    }

    /// Non-blocking lookup. The returned handle may already be dead by the
    /// time the caller writes to it; that write fails softly.
    pub fn lookup(&self, identity: &str) -> Option<SessionHandle> {
        self.sessions.lock().get(identity).cloned()
    }

    /// Remove the mapping only if it still points at the caller's own
    /// session. A stale disconnect racing a newer registration for the
    /// same identity must not remove the newer session. Emits OFFLINE only
    /// when an entry was actually removed.
    pub fn unregister(&self, identity: &str, session_id: u64) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock();
            match sessions.get(identity) {
                Some(current) if current.session_id() == session_id => {
                    sessions.remove(identity);
                    true
                }
                _ => false,
            }
        };
        if removed {
            tracing::info!(%identity, "session unregistered");
            self.enqueue_presence(PresenceEvent {
                subject: identity.to_string(),
                state: OnlineState::Offline,
            });
        } else {
            tracing::debug!(%identity, session_id, "stale unregister ignored");
        }
        removed
    }

    /// Hand a presence event to the broadcaster without ever blocking the
    /// calling read loop. A full queue drops the event with a warning.
    pub fn enqueue_presence(&self, event: PresenceEvent) {
        match self.presence_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => {
                tracing::warn!(subject = %ev.subject, "presence queue full, dropping event");
            }
            Err(TrySendError::Closed(ev)) => {
                tracing::debug!(subject = %ev.subject, "presence broadcaster gone, dropping event");
            }
        }
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
