//! Typed-message router: classify each inbound envelope and apply one
//! delivery policy.

use crate::presence::PresenceEvent;
use crate::protocol::Envelope;
use crate::registry::SessionHandle;
use crate::server::SharedState;

/// What the session's read loop should do after routing one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Keep reading.
    Continue,
    /// The client asked to leave; run the normal teardown path.
    Close,
}

/// Route one decoded envelope from `sender`'s read loop.
///
/// Forwards are a single best-effort write to the target's queue. A write
/// failure (target disconnected mid-flight) is logged and dropped — not
/// retried, not surfaced to the sender.
pub fn route(state: &SharedState, sender: &SessionHandle, envelope: Envelope) -> RouteOutcome {
    match &envelope {
        Envelope::Offer { from_id, to_id, .. } => {
            tracing::debug!(from = %from_id, to = %to_id, "routing OFFER");
            match state.registry.lookup(to_id) {
                Some(target) => deliver(&target, &envelope),
                None => {
                    // Only OFFER reports an unreachable target back to the
                    // sender; ANSWER/CANDIDATE misses stay silent. The
                    // asymmetry is part of the documented protocol.
                    tracing::debug!(target = %to_id, "offer target not registered");
                    let reply = Envelope::OfferResponse {
                        from_id: to_id.clone(),
                        success: false,
                    };
                    if sender.send(reply.encode()).is_err() {
                        tracing::warn!(
                            sender = %sender.identity(),
                            "could not queue offer failure reply"
                        );
                    }
                }
            }
            RouteOutcome::Continue
        }

        Envelope::Answer { to_id, .. } | Envelope::Candidate { to_id, .. } => {
            if let Some(target) = state.registry.lookup(to_id) {
                deliver(&target, &envelope);
            } else {
                tracing::debug!(target = %to_id, kind = envelope.tag(), "target not registered, dropping");
            }
            RouteOutcome::Continue
        }

        Envelope::OnlineStateChange { from_id, online_state } => {
            state.registry.enqueue_presence(PresenceEvent {
                subject: from_id.clone(),
                state: *online_state,
            });
            RouteOutcome::Continue
        }

        Envelope::Leave { from_id } => {
            tracing::info!(identity = %from_id, "client sent LEAVE");
            RouteOutcome::Close
        }

        Envelope::OfferResponse { .. } => {
            // Server-synthesized only; ignore it if a client sends one.
            tracing::debug!(sender = %sender.identity(), "ignoring client-sent OFFER_RESPONSE");
            RouteOutcome::Continue
        }
    }
}

/// Forward the envelope verbatim (re-serialized, fields untouched).
fn deliver(target: &SessionHandle, envelope: &Envelope) {
    if target.send(envelope.encode()).is_err() {
        tracing::warn!(
            target = %target.identity(),
            kind = envelope.tag(),
            "delivery failed, dropping"
        );
    }
}
