//! Background tasks module
//! 
//! This module contains background tasks that run alongside the HTTP server.

pub mod tick_logger;

// Re-export main functions
pub use tick_logger::tick_logger_task;
