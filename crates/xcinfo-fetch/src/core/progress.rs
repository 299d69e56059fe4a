use indicatif::{DecimalBytes, HumanDuration};

use crate::data::ProgressSnapshot;

/// Percentage filter for plain (non-terminal) output.
///
/// Emits only on multiples of 5 and never the same value twice in a row.
#[derive(Debug, Default)]
pub struct PlainProgress {
    last: Option<u8>,
}

impl PlainProgress {
    pub fn new() -> Self { Self::default() }

    /// Percentage to print for `snapshot`, if any.
    pub fn advance(&mut self, snapshot: &ProgressSnapshot) -> Option<u8> {
        let percent = snapshot.percent();
        if percent % 5 != 0 || self.last == Some(percent) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }
}

pub fn plain_line(percent: u8) -> String { format!("Download progress: {percent} %") }

/// Trailing text of the rich progress line: remaining size, speed and,
/// once the speed is known, the estimated time left.
pub fn rich_message(snapshot: &ProgressSnapshot) -> String {
    let mut message = format!(
        "remaining: {}, speed: {}/s",
        DecimalBytes(snapshot.remaining_bytes),
        DecimalBytes(snapshot.speed as u64)
    );
    if snapshot.remaining_bytes > 0
        && let Some(eta) = snapshot.eta()
    {
        message.push_str(&format!(", eta: {}", HumanDuration(eta)));
    }
    message
}
