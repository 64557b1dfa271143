//! Output listeners attached to a [`LogBuffer`](crate::core::LogBuffer)

#[cfg(feature = "console")]
pub mod console;
pub mod json;

#[cfg(feature = "console")]
pub use console::ConsoleListener;
pub use json::JsonListener;

// Re-export the trait for listener authors
pub use crate::core::LogBufferListener;
