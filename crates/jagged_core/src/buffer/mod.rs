//! Reference counted native storage.

pub mod buffer_manager;
pub mod shared_buffer;
