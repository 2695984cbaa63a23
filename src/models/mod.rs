pub mod event;
pub mod run_summary;
pub mod tracked_item;

// Re-exports for convenience
pub use event::*;
pub use run_summary::*;
pub use tracked_item::*;
