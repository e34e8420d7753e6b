//! Client side of a proxy engine's live event feed.
//!
//! - [`FeedHandle`] runs one reconnecting WebSocket session loop against a
//!   single URL and exposes nothing but shutdown; output goes to a
//!   [`FeedSink`].
//! - [`FeedSink`] bundles the [`ReplayChannel`] of decoded [`EventRecord`]s
//!   with the observable [`FeedState`].
//! - [`ReplayChannel`] is a broadcast fan-out with a bounded replay window
//!   for late subscribers.

pub mod endpoint;
pub mod error;
pub mod event;
pub mod replay;
pub mod websocket;

pub use endpoint::FeedEndpoint;
pub use error::Error;
pub use event::EventRecord;
pub use replay::{ReplayChannel, ReplaySubscription};
pub use websocket::{FeedHandle, FeedSink, FeedState, ReconnectConfig};
