pub mod executions;
pub mod failover;
pub mod health;
pub mod status;
