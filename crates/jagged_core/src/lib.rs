//! Variable length list arrays stored as offsets into a shared content array,
//! along with kernels specialized per array type and marshaling to and from a
//! host object model.

pub mod arrays;
pub mod buffer;
pub mod config;
pub mod host;
pub mod kernels;
pub mod marshal;
pub mod testutil;
