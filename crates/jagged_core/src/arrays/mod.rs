pub mod array;
pub mod datatype;
pub mod format;
pub mod identity;
pub mod index;
pub mod list_offset;
pub mod primitive;
pub mod scalar;
