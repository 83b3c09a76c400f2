//! Emergency-ambulance dispatch and simulation core.
//!
//! Given an incident location and triage classification, this crate selects
//! the best available ambulance, computes a route and ETA, and drives a
//! multi-phase simulated lifecycle (outbound travel, on-scene dwell,
//! hospital selection, inbound transport, completion), broadcasting live
//! position and status updates to connected dispatcher sessions.
//!
//! The surrounding HTTP layer, persistence engine, and mapping providers are
//! collaborators behind traits ([`store::Storage`], [`routing::RouteProvider`],
//! [`hazards::HazardSource`], [`lifecycle::events::EventBus`]); everything in
//! here is wired explicitly, no global state.

pub mod config;
pub mod geo;
pub mod hazards;
pub mod lifecycle;
pub mod model;
pub mod routing;
pub mod selection;
pub mod store;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
