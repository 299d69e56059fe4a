//! End-to-end behaviour of the orchestrator against scripted engines.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::tempdir;
use url::Url;
use xcinfo_fetch::{
    Error, FRESH_HEADERS, Orchestrator, ProgressMode, Result, ResumeDataCache, ResumeToken,
    SubscriptionRegistry, TransferEngine, TransferHandle, TransferRequest, TransferState,
    transfer_channel,
};

/// What the scripted engine does after publishing its states.
#[derive(Clone)]
enum Script {
    /// Publish every state, then drop the publisher.
    States(Vec<TransferState>),
    /// Publish the states, wait for cancellation, then publish `on_cancel`.
    UntilCancelled {
        states:    Vec<TransferState>,
        on_cancel: TransferState,
    },
}

#[derive(Clone)]
struct ScriptedEngine {
    script:   Script,
    requests: Arc<Mutex<Vec<TransferRequest>>>,
}

impl ScriptedEngine {
    fn new(states: Vec<TransferState>) -> Self {
        Self {
            script:   Script::States(states),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn until_cancelled(states: Vec<TransferState>, on_cancel: TransferState) -> Self {
        Self {
            script:   Script::UntilCancelled { states, on_cancel },
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requests(&self) -> Vec<TransferRequest> { self.requests.lock().unwrap().clone() }
}

impl TransferEngine for ScriptedEngine {
    fn start(&self, request: TransferRequest) -> Result<TransferHandle> {
        self.requests.lock().unwrap().push(request);
        let (publisher, mut cancel, handle) = transfer_channel();
        let script = self.script.clone();
        tokio::spawn(async move {
            match script {
                Script::States(states) => {
                    for state in states {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        publisher.publish(state);
                    }
                }
                Script::UntilCancelled { states, on_cancel } => {
                    for state in states {
                        publisher.publish(state);
                    }
                    cancel.cancelled().await;
                    publisher.publish(on_cancel);
                }
            }
        });
        Ok(handle)
    }
}

fn url() -> Url { Url::parse("https://download.example.com/Xcode/A.xip").unwrap() }

fn downloading(received: u64) -> TransferState {
    TransferState::Downloading {
        total_bytes:    Some(100),
        bytes_received: received,
        speed:          10.0,
    }
}

fn failed(location: Option<PathBuf>, token: Option<&[u8]>, cancelled: bool) -> TransferState {
    TransferState::Failed {
        final_location: location,
        resume_token: token.map(|t| ResumeToken::new(t.to_vec())),
        cancelled,
    }
}

struct Fixture {
    _dir:     tempfile::TempDir,
    cache:    ResumeDataCache,
    registry: Arc<SubscriptionRegistry>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let cache = ResumeDataCache::with_root(dir.path().join("xcinfo"));
        Self {
            _dir: dir,
            cache,
            registry: SubscriptionRegistry::new(),
        }
    }

    fn orchestrator(&self, engine: ScriptedEngine) -> Orchestrator<ScriptedEngine> {
        Orchestrator::new(engine, self.cache.clone())
            .with_registry(Arc::clone(&self.registry))
            .with_progress(ProgressMode::Plain)
    }

    fn cache_file_exists(&self) -> bool { self.cache.location_for(&url()).unwrap().exists() }
}

#[tokio::test]
async fn test_fresh_download_succeeds() {
    let fixture = Fixture::new();
    let engine = ScriptedEngine::new(vec![
        downloading(50),
        downloading(90),
        TransferState::Finished {
            final_location: Some(PathBuf::from("/tmp/file")),
        },
    ]);
    let mut orchestrator = fixture.orchestrator(engine.clone());

    let path = orchestrator.start(&url(), false, 4, None).await.unwrap();

    assert_eq!(path, PathBuf::from("/tmp/file"));
    assert!(!fixture.cache_file_exists());
    assert!(fixture.registry.is_empty());

    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].resume_token, None);
    assert_eq!(requests[0].concurrency, 4);
    for (key, value) in FRESH_HEADERS {
        assert!(requests[0].headers.contains(&(key.to_string(), value.to_string())));
    }
}

#[tokio::test]
async fn test_cancelled_with_token_persists_and_interrupts() {
    let fixture = Fixture::new();
    let engine = ScriptedEngine::new(vec![downloading(10), failed(None, Some(b"R"), true)]);
    let mut orchestrator = fixture.orchestrator(engine);

    let err = orchestrator.start(&url(), false, 1, None).await.unwrap_err();

    assert!(matches!(err, Error::Interrupted));
    assert_eq!(fixture.cache.load(&url()), Some(ResumeToken::new(b"R".to_vec())));
    assert!(fixture.registry.is_empty());
}

#[tokio::test]
async fn test_uncancelled_with_token_is_recoverable_and_not_persisted() {
    let fixture = Fixture::new();
    fixture.cache.save(&ResumeToken::new(b"old".to_vec()), &url()).unwrap();
    let engine = ScriptedEngine::new(vec![downloading(30), failed(None, Some(b"T"), false)]);
    let mut orchestrator = fixture.orchestrator(engine);

    let err = orchestrator.start(&url(), false, 1, None).await.unwrap_err();

    match err {
        Error::Recoverable { url: failed_url, resume_token } => {
            assert_eq!(failed_url, url());
            assert_eq!(resume_token, ResumeToken::new(b"T".to_vec()));
        }
        other => panic!("expected recoverable, got {other:?}"),
    }
    assert_eq!(fixture.cache.load(&url()), Some(ResumeToken::new(b"old".to_vec())));
}

#[tokio::test]
async fn test_no_location_no_token_is_artifact_missing() {
    for cancelled in [true, false] {
        let fixture = Fixture::new();
        let engine = ScriptedEngine::new(vec![failed(None, None, cancelled)]);
        let mut orchestrator = fixture.orchestrator(engine);

        let err = orchestrator.start(&url(), false, 1, None).await.unwrap_err();

        assert!(matches!(err, Error::ArtifactMissing));
        assert!(!fixture.cache_file_exists());
        assert!(fixture.registry.is_empty());
    }
}

#[tokio::test]
async fn test_finished_without_location_is_artifact_missing() {
    let fixture = Fixture::new();
    let engine = ScriptedEngine::new(vec![
        downloading(100),
        TransferState::Finished { final_location: None },
    ]);
    let mut orchestrator = fixture.orchestrator(engine);

    let err = orchestrator.start(&url(), false, 1, None).await.unwrap_err();

    assert!(matches!(err, Error::ArtifactMissing));
    assert_eq!(err.to_string(), "could not move to final location");
}

#[tokio::test]
async fn test_partial_artifact_is_discarded() {
    let fixture = Fixture::new();
    let partial_dir = tempdir().unwrap();
    let partial = partial_dir.path().join("A.xip");
    std::fs::write(&partial, b"half").unwrap();

    let engine = ScriptedEngine::new(vec![failed(Some(partial.clone()), Some(b"R"), true)]);
    let mut orchestrator = fixture.orchestrator(engine);

    let err = orchestrator.start(&url(), false, 1, None).await.unwrap_err();

    assert!(matches!(err, Error::Interrupted));
    assert!(!partial.exists());
    assert!(!fixture.cache_file_exists());
}

#[tokio::test]
async fn test_resume_token_is_forwarded_without_fresh_headers() {
    let fixture = Fixture::new();
    let engine = ScriptedEngine::new(vec![TransferState::Finished {
        final_location: Some(PathBuf::from("/tmp/A.xip")),
    }]);
    let mut orchestrator = fixture.orchestrator(engine.clone());

    let token = ResumeToken::new(b"resume-me".to_vec());
    orchestrator.start(&url(), false, 2, Some(token.clone())).await.unwrap();

    let requests = engine.requests();
    assert_eq!(requests[0].resume_token, Some(token));
    assert!(requests[0].headers.is_empty());
}

#[tokio::test]
async fn test_only_first_terminal_state_counts() {
    let fixture = Fixture::new();
    let engine = ScriptedEngine::new(vec![
        TransferState::Finished {
            final_location: Some(PathBuf::from("/tmp/first")),
        },
        failed(None, Some(b"late"), true),
        TransferState::Finished {
            final_location: Some(PathBuf::from("/tmp/second")),
        },
    ]);
    let mut orchestrator = fixture.orchestrator(engine);

    let path = orchestrator.start(&url(), false, 1, None).await.unwrap();

    assert_eq!(path, PathBuf::from("/tmp/first"));
    assert!(!fixture.cache_file_exists());
}

#[tokio::test]
async fn test_engine_dropping_channel_is_artifact_missing() {
    let fixture = Fixture::new();
    let engine = ScriptedEngine::new(vec![downloading(20)]);
    let mut orchestrator = fixture.orchestrator(engine);

    let err = orchestrator.start(&url(), false, 1, None).await.unwrap_err();

    assert!(matches!(err, Error::ArtifactMissing));
    assert!(fixture.registry.is_empty());
}

#[tokio::test]
async fn test_caller_cancellation_reaches_engine() {
    let fixture = Fixture::new();
    let engine =
        ScriptedEngine::until_cancelled(vec![downloading(10)], failed(None, Some(b"C"), true));
    let mut orchestrator = fixture.orchestrator(engine);

    let canceller = orchestrator.canceller();
    let registry = Arc::clone(&fixture.registry);
    tokio::spawn(async move {
        while registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.start(&url(), false, 1, None),
    )
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, Error::Interrupted));
    assert_eq!(fixture.cache.load(&url()), Some(ResumeToken::new(b"C".to_vec())));
    assert!(fixture.registry.is_empty());
}

#[tokio::test]
async fn test_repeated_runs_do_not_leak_subscriptions() {
    let fixture = Fixture::new();
    let engine = ScriptedEngine::new(vec![failed(None, Some(b"T"), false)]);
    let mut orchestrator = fixture.orchestrator(engine);

    for _ in 0..5 {
        let err = orchestrator.start(&url(), false, 1, None).await.unwrap_err();
        assert!(err.resume_token().is_some());
    }
    assert!(fixture.registry.is_empty());
}
