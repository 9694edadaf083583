//! Endpoint transport — HTTP/JSON over Unix domain sockets.
//!
//! Every connected attachment serves its endpoint at
//! `<bus dir>/peers/<unique>.sock`. Peers talk to it directly:
//!
//! ```text
//! ┌──────────────┐   POST /session/join   ┌──────────────┐
//! │   client     │───────────────────────▶│   endpoint   │
//! │ attachment   │   POST /call           │   (axum)     │
//! │              │   POST /session/leave  │              │
//! └──────────────┘  HTTP/1.1 + JSON       └──────┬───────┘
//!                                                │
//!                                         ┌──────▼───────┐
//!                                         │  service     │
//!                                         │  attachment  │
//!                                         └──────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::EndpointClient;
pub use types::*;
