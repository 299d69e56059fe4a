pub use error::{Error, Result};

pub mod dir;
mod error;
pub mod sleep;
