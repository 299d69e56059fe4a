use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::info;

use crate::core::{PlainProgress, plain_line, rich_message};
use crate::data::ProgressSnapshot;

/// Minimum spacing between two rendered updates.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

const BAR_LEN: u64 = 1000;

const PB_STYLE: &str = "[{bar:20}] {percent}%, {msg}";

const PB_CHARS: &str = "██░";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let pb_style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(pb_style) => pb_style.progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
});

/// How progress is rendered; chosen by the caller from terminal capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// In-place bar with remaining size and speed.
    #[default]
    Rich,
    /// Log lines at 5% steps.
    Plain,
}

enum Renderer {
    Rich {
        pb:   ProgressBar,
        last: Option<(u64, String)>,
    },
    Plain(PlainProgress),
}

/// Renders snapshots handed to it by the orchestrator, which is responsible
/// for throttling them to [`PROGRESS_INTERVAL`].
pub struct ProgressReporter {
    renderer: Renderer,
    finished: bool,
}

impl ProgressReporter {
    pub fn new(mode: ProgressMode) -> Self {
        let renderer = match mode {
            ProgressMode::Rich => Renderer::Rich {
                pb:   Self::bar(ProgressDrawTarget::stderr()),
                last: None,
            },
            ProgressMode::Plain => Renderer::Plain(PlainProgress::new()),
        };
        Self {
            renderer,
            finished: false,
        }
    }

    /// Rich reporter that draws nowhere.
    pub fn hidden() -> Self {
        Self {
            renderer: Renderer::Rich {
                pb:   Self::bar(ProgressDrawTarget::hidden()),
                last: None,
            },
            finished: false,
        }
    }

    fn bar(target: ProgressDrawTarget) -> ProgressBar {
        let pb = ProgressBar::with_draw_target(Some(BAR_LEN), target);
        match PB_TEMPLATE.as_ref() {
            Some(style) => pb.with_style(style.clone()),
            None => pb,
        }
    }

    /// Render `snapshot` unless it would repeat the previous render.
    ///
    /// Returns whether anything was drawn.
    pub fn render(&mut self, snapshot: &ProgressSnapshot) -> bool {
        if self.finished {
            return false;
        }
        match &mut self.renderer {
            Renderer::Rich { pb, last } => {
                let position = (snapshot.ratio.clamp(0.0, 1.0) * BAR_LEN as f64).round() as u64;
                let message = rich_message(snapshot);
                if last.as_ref().is_some_and(|(p, m)| *p == position && *m == message) {
                    return false;
                }
                pb.set_position(position);
                pb.set_message(message.clone());
                *last = Some((position, message));
                true
            }
            Renderer::Plain(plain) => match plain.advance(snapshot) {
                Some(percent) => {
                    info!("{}", plain_line(percent));
                    true
                }
                None => false,
            },
        }
    }

    /// Render the final 100% state once.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.render(&ProgressSnapshot::complete());
        self.finished = true;
        if let Renderer::Rich { pb, .. } = &self.renderer {
            pb.finish();
        }
    }

    /// Stop drawing without claiming completion.
    pub fn abandon(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Renderer::Rich { pb, .. } = &self.renderer {
            pb.abandon();
        }
    }

    pub fn is_finished(&self) -> bool { self.finished }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(received: u64) -> ProgressSnapshot {
        ProgressSnapshot::from_metrics(100, received, 1.0).unwrap()
    }

    #[test]
    fn test_rich_suppresses_duplicate_renders() {
        let mut reporter = ProgressReporter::hidden();
        assert!(reporter.render(&at(35)));
        assert!(!reporter.render(&at(35)));
        assert!(reporter.render(&at(36)));
    }

    #[test]
    fn test_plain_renders_on_boundaries_only() {
        let mut reporter = ProgressReporter::new(ProgressMode::Plain);
        assert!(reporter.render(&at(5)));
        assert!(!reporter.render(&at(7)));
        assert!(!reporter.render(&at(5)));
        assert!(reporter.render(&at(10)));
    }

    #[test]
    fn test_finish_renders_once() {
        let mut reporter = ProgressReporter::new(ProgressMode::Plain);
        reporter.finish();
        assert!(reporter.is_finished());
        assert!(!reporter.render(&at(50)));
        reporter.finish();
    }

    #[test]
    fn test_progress_mode_deserializes_lowercase() {
        let mode: ProgressMode = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(mode, ProgressMode::Plain);
    }
}
