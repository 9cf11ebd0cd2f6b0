//! Analytics emission for server renders and client navigations.
//!
//! This crate provides:
//! - `AnalyticsBridge` - Fires events once a response is final
//! - `AnalyticsRouter` - Application hook for explicit pageview/event calls
//! - `DeliverySink` - Where events go (`RelaySink`, `LocalSink`)
//! - `AnalyticsReceiver` - Server endpoint for relayed client events
//! - `AccessRecord` - Common-log-format access lines

mod bridge;
mod common_log;
mod event;
mod receiver;
mod sink;

pub use bridge::*;
pub use common_log::*;
pub use event::*;
pub use receiver::*;
pub use sink::*;
