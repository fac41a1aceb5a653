//! Domain records

pub mod backend;
pub mod pod;
pub mod release;
pub mod setup;

pub use backend::{Backend, BackendKind, Deployment, Resource};
pub use pod::{LogDump, Pod, PodStatus};
pub use release::{Flavour, Release};
pub use setup::Setup;
