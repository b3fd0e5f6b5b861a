//! Core types for Tidings

mod configuration;
mod event;
pub mod event_type;

pub use configuration::*;
pub use event::*;
pub use event_type::EventType;
