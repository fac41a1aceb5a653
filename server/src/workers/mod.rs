//! Long-running background workers

pub mod backend_worker;
pub mod status_poller;
