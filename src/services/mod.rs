//! Dispatcher services
//!
//! Resolution and failover serve playback requests; probing, rehashing and
//! update broadcasting back them up off the request path.

pub mod failover;
pub mod feed_resolver;
pub mod rehash;
pub mod stream_prober;
pub mod update_broadcaster;

pub use failover::FailoverSequencer;
pub use feed_resolver::{FeedResolver, transform};
pub use rehash::{RehashEngine, RehashReport, RehashStats};
pub use stream_prober::{ProbeOutcome, ProbePool, ProbeResult, ProbeTimeouts, StreamProber};
pub use update_broadcaster::{UPDATES_TOPIC, UpdateBroadcaster, UpdateEvent, UpdateMessage};
