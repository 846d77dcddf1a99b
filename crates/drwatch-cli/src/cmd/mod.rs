pub mod config;
pub mod executions;
pub mod failover;
pub mod serve;
pub mod status;
pub mod tick;
