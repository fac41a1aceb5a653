//! Kabinet wire messages
//!
//! Shapes shared between the control plane and its subscribers. Field names and value
//! ranges are part of the public contract: `progress` is always within `[0, 1]`.

pub mod models;
pub mod status;
pub mod updates;

pub use status::PodStatus;
pub use updates::{DispatchFailure, FlavourUpdate, PodUpdateMessage, PullUpdate};
