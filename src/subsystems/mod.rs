//! Subsystem modules for the chat agent.

pub mod agents;
pub mod comms;
pub mod memory;
pub mod runtime;
