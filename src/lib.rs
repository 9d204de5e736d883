// Public API for integration tests and potential library usage

pub mod content;
pub mod protocol;
pub mod state;
pub mod timer;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;
