//! Configuration files: layout configurations, settings and auto-align presets

pub mod layout_config;
pub mod parser;
pub mod settings;
pub mod store;

pub use layout_config::*;
pub use parser::*;
pub use settings::*;
pub use store::*;
