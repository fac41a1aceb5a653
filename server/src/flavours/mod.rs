//! Flavour matching: selectors, backend capabilities and rating

pub mod capabilities;
pub mod rating;
pub mod selectors;

pub use capabilities::{Capabilities, GpuInfo};
pub use rating::{rate_flavour, rate_selectors, select_flavour, Selection, SelectionOrder};
pub use selectors::Selector;
