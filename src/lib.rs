//! Stateless HLS rewriting proxy.
//!
//! Two endpoints: `/proxy-manifest` fetches an upstream playlist and rewrites
//! every embedded URI into a same-origin proxy URL; `/proxy-segment` resolves
//! and forwards the opaque payloads those URLs point at. No persistence, no
//! sessions; every request stands alone.

pub mod config;
pub mod error;
pub mod fetch;
pub mod hls;
pub mod metrics;
pub mod server;
