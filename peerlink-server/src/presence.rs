//! Presence broadcaster: a single consumer fanning out online-state
//! changes to the subject's social graph.
//!
//! Events reach this module through a bounded channel so a slow fan-out
//! never blocks a session's read loop. One event is consumed exactly once;
//! per-peer delivery failures are isolated and never abort the rest of the
//! fan-out.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::protocol::{Envelope, OnlineState};
use crate::server::SharedState;

/// One online-state change for a subject identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub subject: String,
    pub state: OnlineState,
}

/// Drain the presence queue until the server shuts down.
pub async fn broadcaster(state: Arc<SharedState>, mut events: mpsc::Receiver<PresenceEvent>) {
    tracing::debug!("presence broadcaster started");
    while let Some(event) = events.recv().await {
        apply(&state, event);
    }
    tracing::debug!("presence queue closed, broadcaster exiting");
}

/// Apply one event: refresh the cached state for the subject, then notify
/// every friend that is currently reachable and not OFFLINE.
pub fn apply(state: &SharedState, event: PresenceEvent) {
    {
        let mut states = state.presence_states.lock();
        if event.state == OnlineState::Offline {
            states.remove(&event.subject);
        } else {
            states.insert(event.subject.clone(), event.state);
        }
    }

    let friends = state.directory.friends_of(&event.subject);
    if friends.is_empty() {
        return;
    }

    let frame = Envelope::OnlineStateChange {
        from_id: event.subject.clone(),
        online_state: event.state,
    }
    .encode();

    let mut notified = 0usize;
    for peer in friends {
        let Some(handle) = state.registry.lookup(peer) else {
            continue;
        };
        let peer_state = state.presence_states.lock().get(peer).copied();
        if matches!(peer_state, None | Some(OnlineState::Offline)) {
            continue;
        }
        if handle.send(frame.clone()).is_err() {
            tracing::warn!(peer = %peer, subject = %event.subject, "presence delivery failed, dropping");
            continue;
        }
        notified += 1;
    }
    tracing::debug!(
        subject = %event.subject,
        state = ?event.state,
        notified,
        "presence fan-out complete"
    );
}
