//! Pure transformations with no I/O.

mod outcome;
mod progress;
mod segment;

pub use outcome::{Outcome, classify};
pub use progress::{PlainProgress, plain_line, rich_message};
pub use segment::{Segment, calculate_segments};
