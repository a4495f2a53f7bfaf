//! Server configuration via clap.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "peerlink-server", about = "Signaling relay with presence fan-out")]
pub struct ServerConfig {
    /// Address for the HTTP/WebSocket listener.
    #[arg(long, env = "PEERLINK_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// TOML file with user profiles, passwords, and friend lists.
    /// Falls back to the built-in seed accounts when omitted.
    #[arg(long, env = "PEERLINK_DIRECTORY")]
    pub directory_file: Option<String>,

    /// Directory with the static web client, served with an index.html
    /// fallback. Omit to run API-only.
    #[arg(long, env = "PEERLINK_WEB_DIR")]
    pub web_static_dir: Option<String>,

    /// Session token lifetime in seconds.
    #[arg(long, default_value_t = 1800)]
    pub token_ttl_secs: u64,

    /// Presence event queue capacity. A full queue drops events with a
    /// warning instead of stalling a session's read loop.
    #[arg(long, default_value_t = 256)]
    pub presence_queue: usize,

    /// Per-session outbound frame queue capacity.
    #[arg(long, default_value_t = 256)]
    pub session_queue: usize,
}

impl Default for ServerConfig {
    /// Defaults bind an ephemeral localhost port; handy in tests.
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".to_string(),
            directory_file: None,
            web_static_dir: None,
            token_ttl_secs: 1800,
            presence_queue: 256,
            session_queue: 256,
        }
    }
}
