pub mod confine;
pub mod dir;
pub mod file;

pub use confine::Confiner;
pub use dir::{DirEntry, SortKey};
pub use file::{OpenFlags, StatFields, Whence};
