//! State management module
//! 
//! This module contains the daemon's shared state: the timer it controls and
//! the bookkeeping around its fires.

pub mod app_state;
pub mod tick_state;

// Re-export main types
pub use app_state::AppState;
pub use tick_state::{TickEvent, TickState};
