//! Data models for the Ultrawide layout engine

pub mod apply_result;
pub mod config_entry;
pub mod geometry;
pub mod layout_preset;
pub mod window;

pub use apply_result::*;
pub use config_entry::*;
pub use geometry::*;
pub use layout_preset::*;
pub use window::*;
