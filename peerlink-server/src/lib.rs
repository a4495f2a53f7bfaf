//! Peerlink: a signaling relay for peer-to-peer call setup.
//!
//! Clients authenticate over HTTP (`POST /auth/login`), receive a
//! short-lived session token, and open a WebSocket (`GET /ws?token=…`).
//! Each connection is bound to exactly one identity for its lifetime and
//! registered in the [`registry::SessionRegistry`]. Inbound envelopes
//! (offer/answer/candidate exchange) are forwarded between identities by
//! the [`router`]; online-state changes fan out to the subject's friends
//! through a dedicated [`presence`] broadcaster task so a slow fan-out
//! never blocks message routing.
//!
//! The relay is best-effort by design: a write to a dead peer is logged
//! and dropped, never retried, and no single bad message or dead peer can
//! take the process down.

pub mod auth;
pub mod config;
pub mod directory;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod web;
