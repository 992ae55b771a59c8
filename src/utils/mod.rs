//! Small shared helpers.

pub mod fs;

pub use fs::write_atomic;
