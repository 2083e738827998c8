//! On-demand HLS transcoding and segment cache
//!
//! The streaming core: variant/cache-key derivation, the on-disk
//! segment cache, transcoder process management, per-item job
//! coordination, first-response readiness detection, and the
//! `Streamer` facade the HTTP layer talks to.

pub mod cache;
pub mod job;
pub mod playlist;
pub mod readiness;
pub mod registry;
pub mod streamer;
pub mod variant;

pub use cache::{CacheEntry, CacheStore};
pub use registry::JobRegistry;
pub use streamer::Streamer;
pub use variant::Variant;
