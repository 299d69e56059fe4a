use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use url::Url;
use xcinfo_platform::sleep::SleepInhibitor;

use crate::core::{Outcome, classify};
use crate::data::{ProgressSnapshot, ResumeToken, TransferRequest, TransferState};
use crate::effects::engine::{Canceller, TransferEngine, TransferHandle};
use crate::effects::progress::{PROGRESS_INTERVAL, ProgressMode, ProgressReporter};
use crate::effects::registry::SubscriptionRegistry;
use crate::effects::resume::ResumeDataCache;
use crate::error::{Error, Result};

/// Runs one transfer at a time and collapses its state stream into a single
/// result.
pub struct Orchestrator<E: TransferEngine> {
    engine:        E,
    cache:         ResumeDataCache,
    registry:      Arc<SubscriptionRegistry>,
    progress:      ProgressMode,
    authorization: Option<String>,
    canceller:     Canceller,
}

impl<E: TransferEngine> Orchestrator<E> {
    pub fn new(engine: E, cache: ResumeDataCache) -> Self {
        let (canceller, _) = Canceller::pair();
        Self {
            engine,
            cache,
            registry: SubscriptionRegistry::global(),
            progress: ProgressMode::default(),
            authorization: None,
            canceller,
        }
    }

    pub fn with_registry(mut self, registry: Arc<SubscriptionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_progress(mut self, mode: ProgressMode) -> Self {
        self.progress = mode;
        self
    }

    /// Download authorization attached to every transfer request.
    pub fn with_authorization(mut self, authorization: Option<String>) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn cache(&self) -> &ResumeDataCache { &self.cache }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> { &self.registry }

    /// Handle that cancels the transfer currently in flight.
    ///
    /// A cancellation requested while nothing runs is cleared by the next
    /// [`Orchestrator::start`].
    pub fn canceller(&self) -> Canceller { self.canceller.clone() }

    /// Download `source`, resuming from `resume_token` when given.
    ///
    /// Resolves exactly once with the final file location or a classified
    /// [`Error`]. The engine's subscription is released before returning,
    /// on every path.
    pub async fn start(
        &mut self,
        source: &Url,
        disable_sleep: bool,
        concurrency: u32,
        resume_token: Option<ResumeToken>,
    ) -> Result<PathBuf> {
        self.canceller.reset();
        let _inhibitor = if disable_sleep { SleepInhibitor::try_acquire() } else { None };

        let request = match resume_token {
            Some(token) => {
                info!(url = %source, "resuming download");
                TransferRequest::resume(source.clone(), token)
            }
            None => {
                info!(url = %source, "starting download");
                TransferRequest::fresh(source.clone())
            }
        }
        .with_concurrency(concurrency)
        .with_authorization(self.authorization.clone());

        let handle = self.engine.start(request)?;
        let mut subscription = self.registry.register(source);

        let outcome = self.observe(handle).await;

        subscription.close();
        self.resolve(source, outcome)
    }

    async fn observe(&self, handle: TransferHandle) -> Outcome {
        let (mut states, engine_canceller) = handle.into_parts();
        let mut cancel = self.canceller.subscribe();
        let mut watcher = Watcher::new(ProgressReporter::new(self.progress));

        let mut ticker = interval(PROGRESS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cancel_forwarded = false;

        if let Some(outcome) = watcher.observe(&mut states) {
            return outcome;
        }

        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        warn!("transfer engine stopped without a terminal state");
                        watcher.reporter.abandon();
                        return Outcome::ArtifactMissing;
                    }
                    if let Some(outcome) = watcher.observe(&mut states) {
                        return outcome;
                    }
                }
                _ = ticker.tick() => {
                    watcher.flush();
                }
                _ = cancel.cancelled(), if !cancel_forwarded => {
                    debug!("forwarding cancellation to transfer engine");
                    engine_canceller.cancel();
                    cancel_forwarded = true;
                }
            }
        }
    }

    fn resolve(&self, source: &Url, outcome: Outcome) -> Result<PathBuf> {
        match outcome {
            Outcome::Completed(path) => {
                info!(url = %source, path = %path.display(), "download finished");
                Ok(path)
            }
            Outcome::ArtifactMissing => {
                warn!(url = %source, "transfer produced no usable file");
                Err(Error::ArtifactMissing)
            }
            Outcome::Interrupted { persist, discard } => {
                if let Some(token) = persist {
                    match self.cache.save(&token, source) {
                        Ok(path) => info!(path = %path.display(), "resume data saved"),
                        Err(e) => warn!(error = %e, "failed to save resume data"),
                    }
                }
                if let Some(partial) = discard {
                    match xcinfo_fs::remove_if_exists(&partial) {
                        Ok(_) => debug!(path = %partial.display(), "partial artifact discarded"),
                        Err(e) => warn!(error = %e, "failed to discard partial artifact"),
                    }
                }
                warn!(url = %source, "download interrupted");
                Err(Error::Interrupted)
            }
            Outcome::Recoverable(resume_token) => {
                warn!(url = %source, "download failed, resumable");
                Err(Error::Recoverable {
                    url: source.clone(),
                    resume_token,
                })
            }
        }
    }
}

/// Per-call observation state: latest-wins progress coalescing and the
/// one-time size log.
struct Watcher {
    reporter:    ProgressReporter,
    pending:     Option<ProgressSnapshot>,
    logged_size: Option<u64>,
}

impl Watcher {
    fn new(reporter: ProgressReporter) -> Self {
        Self {
            reporter,
            pending:     None,
            logged_size: None,
        }
    }

    /// Consume the current state; yields the outcome once it is terminal.
    fn observe(&mut self, states: &mut watch::Receiver<TransferState>) -> Option<Outcome> {
        let state = states.borrow_and_update().clone();

        if let TransferState::Downloading {
            total_bytes: Some(total),
            ..
        } = state
            && self.logged_size.is_none()
        {
            info!(total = %indicatif::DecimalBytes(total), "download size");
            self.logged_size = Some(total);
        }

        if let Some(snapshot) = state.snapshot() {
            self.pending = Some(snapshot);
        }

        let finished = matches!(state, TransferState::Finished { .. });
        let outcome = classify(state)?;
        self.pending = None;
        if finished {
            self.reporter.finish();
        } else {
            self.reporter.abandon();
        }
        Some(outcome)
    }

    /// Render the latest snapshot seen since the previous flush.
    fn flush(&mut self) -> Option<ProgressSnapshot> {
        let snapshot = self.pending.take()?;
        self.reporter.render(&snapshot);
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::engine::transfer_channel;

    fn downloading(total: Option<u64>, received: u64) -> TransferState {
        TransferState::Downloading {
            total_bytes:    total,
            bytes_received: received,
            speed:          0.0,
        }
    }

    #[test]
    fn test_burst_renders_only_latest_snapshot() {
        let (publisher, _cancel, handle) = transfer_channel();
        let (mut states, _) = handle.into_parts();
        let mut watcher = Watcher::new(ProgressReporter::hidden());

        for received in [100, 200, 300] {
            publisher.publish(downloading(Some(1000), received));
            assert!(watcher.observe(&mut states).is_none());
        }

        let rendered = watcher.flush().unwrap();
        assert_eq!(rendered.remaining_bytes, 700);
        assert_eq!(watcher.flush(), None);

        publisher.publish(downloading(Some(1000), 400));
        watcher.observe(&mut states);
        assert_eq!(watcher.flush().unwrap().remaining_bytes, 600);
    }

    #[test]
    fn test_size_logged_once_when_known() {
        let (publisher, _cancel, handle) = transfer_channel();
        let (mut states, _) = handle.into_parts();
        let mut watcher = Watcher::new(ProgressReporter::hidden());

        publisher.publish(downloading(None, 10));
        watcher.observe(&mut states);
        assert_eq!(watcher.logged_size, None);

        publisher.publish(downloading(Some(1000), 20));
        watcher.observe(&mut states);
        assert_eq!(watcher.logged_size, Some(1000));

        publisher.publish(downloading(Some(2000), 30));
        watcher.observe(&mut states);
        assert_eq!(watcher.logged_size, Some(1000));
    }

    #[test]
    fn test_terminal_state_drops_pending_snapshot() {
        let (publisher, _cancel, handle) = transfer_channel();
        let (mut states, _) = handle.into_parts();
        let mut watcher = Watcher::new(ProgressReporter::hidden());

        publisher.publish(downloading(Some(1000), 500));
        watcher.observe(&mut states);
        publisher.publish(TransferState::Finished {
            final_location: Some(PathBuf::from("/tmp/file")),
        });

        let outcome = watcher.observe(&mut states);
        assert_eq!(outcome, Some(Outcome::Completed(PathBuf::from("/tmp/file"))));
        assert!(watcher.reporter.is_finished());
        assert_eq!(watcher.flush(), None);
    }
}
