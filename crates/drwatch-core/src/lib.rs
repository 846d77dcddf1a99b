//! Core of `drwatch`: primary/DR status aggregation and the cross-region
//! failover state machine.
//!
//! ```text
//! TriggerGateway ──► Dispatcher ──► ExecutionDb ◄── Scheduler::tick
//!                                                       │
//!                                                       ▼
//!                                   Orchestrator::advance (one step)
//!                                                       │
//!                                                       ▼
//! StatusAggregator ────────────────────────────────► RemoteOps
//! ```
//!
//! Remote calls go through the object-safe [`remote::RemoteOps`] trait so
//! every component receives its adapter at construction time.

pub mod config;
pub mod error;
pub mod gateway;
pub mod io;
pub mod orchestrator;
pub mod remote;
pub mod status;
pub mod types;

pub use error::{DrError, Result};
