//! Operations exposed to agents and front ends

pub mod agents;
pub mod catalog;
pub mod pods;
pub mod setups;
