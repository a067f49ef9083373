//! Core services for the Ultrawide layout engine

pub mod aot_toggle;
pub mod applied_state;
pub mod change_monitor;
pub mod config_applier;
pub mod layout_engine;
pub mod layout_generator;
pub mod title_matcher;
pub mod window_enumerator;
pub mod window_operator;

pub use aot_toggle::*;
pub use applied_state::*;
pub use change_monitor::*;
pub use config_applier::*;
pub use layout_engine::*;
pub use layout_generator::*;
pub use title_matcher::*;
pub use window_enumerator::*;
pub use window_operator::*;
