//! Message router
//!
//! One `Router` actor per host session owns every piece of shared mutable
//! state: the pending-request table, the endpoint registry and the engine
//! slot. Everything else talks to it through a cloneable `RouterHandle`.
//! Handlers run off the actor, so a slow handler never stalls correlation
//! of other traffic.

mod config;
mod core;
mod handle;
mod host_exec;
mod messages;
mod pending;
mod registry;

pub use config::RouterConfig;
pub use core::Router;
pub use handle::{EndpointHandle, PendingReply, RouterHandle};
pub use host_exec::HostExecutor;
pub use messages::{HandlerOutcome, NotificationListener, RequestOutcome, RouterMetrics, RouterRequest};
pub use registry::{Delivery, EndpointRegistry};
