//! Small filesystem primitives shared by the xcinfo crates.
//!
//! Writes go through a sibling temporary file that is renamed over the target,
//! so a reader either sees the previous content or the new content, never a
//! torn mix of both.

mod atomic;
mod error;

pub use atomic::{AtomicWriteOptions, atomic_read, atomic_write, ensure_dir, remove_if_exists};
pub use error::{Error, Result};
