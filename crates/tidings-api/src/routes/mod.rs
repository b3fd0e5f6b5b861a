//! Route handlers

mod events;
mod health;
mod notification;

pub use events::*;
pub use health::*;
pub use notification::*;
