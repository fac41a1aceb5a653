//! Kabinet Library
//!
//! Flavour matching and container lifecycle orchestration for the Kabinet control plane.

pub mod app;
pub mod backends;
pub mod channels;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod flavours;
pub mod logs;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workers;
