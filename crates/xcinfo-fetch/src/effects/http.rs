//! Segmented HTTP transfer engine built on reqwest.
//!
//! One run downloads into `<download-dir>/<name>.part`, split into up to
//! `concurrency` ranged requests when the server advertises byte ranges,
//! then renames the partial file to `<download-dir>/<name>`. Interrupted
//! runs serialise their per-segment progress into the resume token.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, COOKIE, ETAG, IF_RANGE, RANGE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::calculate_segments;
use crate::data::{ResumeToken, TransferRequest, TransferState};
use crate::effects::engine::{
    CancelSignal, StatePublisher, TransferEngine, TransferHandle, transfer_channel,
};
use crate::error::{Error, Result};

const PUBLISH_INTERVAL: Duration = Duration::from_millis(250);

/// Cookie carrying the download authorization.
const AUTH_COOKIE: &str = "ADCDownloadAuth";

const FALLBACK_FILE_NAME: &str = "download";

pub struct ReqwestEngine {
    client:       Client,
    download_dir: PathBuf,
}

impl ReqwestEngine {
    pub fn new(download_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, download_dir))
    }

    pub fn with_client(client: Client, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path { &self.download_dir }
}

impl TransferEngine for ReqwestEngine {
    fn start(&self, request: TransferRequest) -> Result<TransferHandle> {
        let (publisher, cancel, handle) = transfer_channel();
        let job = Job {
            client: self.client.clone(),
            download_dir: self.download_dir.clone(),
            request,
        };
        tokio::spawn(job.run(publisher, cancel));
        Ok(handle)
    }
}

/// Serialised form of a resume token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ResumeData {
    url:         String,
    partial:     PathBuf,
    destination: PathBuf,
    total_bytes: Option<u64>,
    etag:        Option<String>,
    segments:    Vec<SegmentProgress>,
}

impl ResumeData {
    fn decode(token: &ResumeToken) -> Result<Self> {
        serde_json::from_slice(token.as_bytes()).map_err(Error::InvalidResumeToken)
    }

    fn encode(&self) -> Option<ResumeToken> {
        match serde_json::to_vec(self) {
            Ok(bytes) => Some(ResumeToken::new(bytes)),
            Err(e) => {
                warn!(error = %e, "failed to encode resume data");
                None
            }
        }
    }

    fn received(&self) -> u64 { self.segments.iter().map(|s| s.received).sum() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SegmentProgress {
    start:    u64,
    /// Exclusive; `None` when the size is unknown.
    end:      Option<u64>,
    received: u64,
}

impl SegmentProgress {
    fn offset(&self) -> u64 { self.start + self.received }

    fn is_complete(&self) -> bool { self.end.is_some_and(|end| self.offset() >= end) }

    /// `Range` header value for the bytes still missing.
    fn range_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.offset(), end.saturating_sub(1)),
            None => format!("bytes={}-", self.offset()),
        }
    }
}

/// Everything known before the first body byte is requested.
struct Plan {
    data:   ResumeData,
    ranges: bool,
}

enum Stop {
    Done,
    Cancelled,
    Failed(Error),
}

/// Result of one pass over a plan.
enum Attempt {
    Settled(TransferState),
    /// The remote file no longer matches the partial data.
    Stale(ResumeData),
}

struct Job {
    client:       Client,
    download_dir: PathBuf,
    request:      TransferRequest,
}

impl Job {
    async fn run(self, publisher: StatePublisher, mut cancel: CancelSignal) {
        let mut plan = match self.plan().await {
            Ok(plan) => plan,
            Err(e) => {
                publisher.publish(self.not_started(&e, &cancel));
                return;
            }
        };

        let mut restarted = false;
        let terminal = loop {
            match self.transfer(plan, &publisher, &mut cancel).await {
                Attempt::Settled(state) => break state,
                Attempt::Stale(data) => {
                    let _ = tokio::fs::remove_file(&data.partial).await;
                    if restarted {
                        break TransferState::Failed {
                            final_location: None,
                            resume_token:   None,
                            cancelled:      cancel.is_cancelled(),
                        };
                    }
                    restarted = true;
                    info!(url = %self.request.url, "restarting transfer from the beginning");
                    plan = match self.fresh_plan().await {
                        Ok(plan) => plan,
                        Err(e) => break self.not_started(&e, &cancel),
                    };
                }
            }
        };
        publisher.publish(terminal);
    }

    fn not_started(&self, error: &Error, cancel: &CancelSignal) -> TransferState {
        warn!(url = %self.request.url, error = %error, "transfer could not start");
        TransferState::Failed {
            final_location: None,
            resume_token:   None,
            cancelled:      cancel.is_cancelled(),
        }
    }

    async fn plan(&self) -> Result<Plan> {
        match &self.request.resume_token {
            Some(token) => {
                let data = ResumeData::decode(token)?;
                if !tokio::fs::try_exists(&data.partial).await? {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("partial file {} is gone", data.partial.display()),
                    )));
                }
                debug!(
                    partial = %data.partial.display(),
                    received = data.received(),
                    "resume data accepted"
                );
                Ok(Plan { data, ranges: true })
            }
            None => self.fresh_plan().await,
        }
    }

    async fn fresh_plan(&self) -> Result<Plan> {
        let url = &self.request.url;
        let response = self.prepare(self.client.head(url.clone())).send().await?;

        // Servers refusing HEAD still get a single unranged GET.
        let (total_bytes, ranges, etag) = if response.status().is_success() {
            let headers = response.headers();
            let total_bytes = headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let ranges = headers
                .get(ACCEPT_RANGES)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));
            let etag = headers
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            (total_bytes, ranges, etag)
        } else {
            debug!(url = %url, status = response.status().as_u16(), "HEAD rejected");
            (None, false, None)
        };

        let destination = self.download_dir.join(file_name(url));
        let partial = partial_path(&destination);

        let segments = match total_bytes {
            Some(total) if ranges && total > 0 && self.request.concurrency > 1 => {
                calculate_segments(total, self.request.concurrency)
                    .into_iter()
                    .map(|s| SegmentProgress {
                        start:    s.start,
                        end:      Some(s.end),
                        received: 0,
                    })
                    .collect()
            }
            _ => vec![SegmentProgress {
                start:    0,
                end:      total_bytes,
                received: 0,
            }],
        };

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let file = tokio::fs::File::create(&partial).await?;
        if let Some(total) = total_bytes {
            file.set_len(total).await?;
        }

        info!(
            url = %url,
            segments = segments.len(),
            ranges,
            "transfer planned"
        );

        Ok(Plan {
            data: ResumeData {
                url: url.to_string(),
                partial,
                destination,
                total_bytes,
                etag,
                segments,
            },
            ranges,
        })
    }

    async fn transfer(
        &self,
        plan: Plan,
        publisher: &StatePublisher,
        cancel: &mut CancelSignal,
    ) -> Attempt {
        let Plan { mut data, ranges } = plan;
        let counters: Arc<Vec<AtomicU64>> =
            Arc::new(data.segments.iter().map(|s| AtomicU64::new(s.received)).collect());
        // Content-Length of an unranged GET, 0 until known.
        let size_hint = Arc::new(AtomicU64::new(0));

        let mut tasks = JoinSet::new();
        for (index, segment) in data.segments.iter().enumerate() {
            if segment.is_complete() {
                continue;
            }
            let ranged = ranges && (data.segments.len() > 1 || segment.offset() > 0);
            let fetch = SegmentFetch {
                builder: self.prepare(self.client.get(self.request.url.clone())),
                partial: data.partial.clone(),
                segment: segment.clone(),
                etag: data.etag.clone(),
                ranged,
                counters: Arc::clone(&counters),
                size_hint: Arc::clone(&size_hint),
                index,
            };
            tasks.spawn(fetch.run());
        }

        let total_bytes = || {
            data.total_bytes
                .or_else(|| Some(size_hint.load(Ordering::Acquire)).filter(|n| *n > 0))
        };

        let mut ticker = tokio::time::interval(PUBLISH_INTERVAL);
        let mut last_sample = (Instant::now(), data.received());

        let stop = loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break Stop::Done,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => break Stop::Failed(e),
                    Some(Err(e)) => break Stop::Failed(Error::Task(e)),
                },
                _ = ticker.tick() => {
                    let received = sum(&counters);
                    let (at, before) = last_sample;
                    let elapsed = at.elapsed().as_secs_f64();
                    let speed = if elapsed > 0.0 {
                        received.saturating_sub(before) as f64 / elapsed
                    } else {
                        0.0
                    };
                    last_sample = (Instant::now(), received);
                    publisher.publish(TransferState::Downloading {
                        total_bytes: total_bytes(),
                        bytes_received: received,
                        speed,
                    });
                }
                _ = cancel.cancelled() => break Stop::Cancelled,
            }
        };

        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        let expected = total_bytes();
        for (segment, counter) in data.segments.iter_mut().zip(counters.iter()) {
            segment.received = counter.load(Ordering::Acquire);
        }
        let received = data.received();

        let stop = match stop {
            Stop::Done if expected.is_some_and(|total| received < total) => {
                Stop::Failed(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("received {received} of {expected:?} bytes"),
                )))
            }
            other => other,
        };

        let state = match stop {
            Stop::Done => {
                publisher.publish(TransferState::Downloading {
                    total_bytes: Some(received),
                    bytes_received: received,
                    speed: 0.0,
                });
                match tokio::fs::rename(&data.partial, &data.destination).await {
                    Ok(()) => TransferState::Finished {
                        final_location: Some(data.destination),
                    },
                    Err(e) => {
                        warn!(error = %e, "could not move download to its final location");
                        TransferState::Finished { final_location: None }
                    }
                }
            }
            Stop::Cancelled => {
                info!(received, "transfer cancelled");
                self.failed(data, ranges, received, true).await
            }
            Stop::Failed(Error::RemoteChanged { url }) => {
                warn!(url = %url, received, "remote file changed, partial data is stale");
                return Attempt::Stale(data);
            }
            Stop::Failed(e) => {
                warn!(error = %e, received, "transfer failed");
                self.failed(data, ranges, received, false).await
            }
        };
        Attempt::Settled(state)
    }

    async fn failed(
        &self,
        data: ResumeData,
        ranges: bool,
        received: u64,
        cancelled: bool,
    ) -> TransferState {
        let resume_token = if ranges && received > 0 { data.encode() } else { None };
        if resume_token.is_none() {
            let _ = tokio::fs::remove_file(&data.partial).await;
        }
        TransferState::Failed {
            final_location: None,
            resume_token,
            cancelled,
        }
    }

    /// Attach request-wide headers: content negotiation and authorization.
    fn prepare(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (key, value) in &self.request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(auth) = &self.request.authorization {
            builder = builder.header(COOKIE, format!("{AUTH_COOKIE}={auth}"));
        }
        builder
    }
}

struct SegmentFetch {
    builder:   RequestBuilder,
    partial:   PathBuf,
    segment:   SegmentProgress,
    etag:      Option<String>,
    ranged:    bool,
    counters:  Arc<Vec<AtomicU64>>,
    size_hint: Arc<AtomicU64>,
    index:     usize,
}

impl SegmentFetch {
    async fn run(self) -> Result<()> {
        let mut builder = self.builder;
        if self.ranged {
            builder = builder.header(RANGE, self.segment.range_header());
            if let Some(etag) = &self.etag {
                builder = builder.header(IF_RANGE, etag.as_str());
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        // A full body or a failed precondition answering a range request means
        // the validator no longer matches.
        if self.ranged && matches!(status, StatusCode::OK | StatusCode::PRECONDITION_FAILED) {
            return Err(Error::RemoteChanged {
                url: response.url().to_string(),
            });
        }
        if !status.is_success() || (self.ranged && status != StatusCode::PARTIAL_CONTENT) {
            return Err(Error::Status {
                url:    response.url().to_string(),
                status: status.as_u16(),
            });
        }
        if !self.ranged
            && self.segment.end.is_none()
            && let Some(length) = response.content_length()
        {
            self.size_hint.store(length, Ordering::Release);
        }

        let mut file = OpenOptions::new().write(true).open(&self.partial).await?;
        file.seek(SeekFrom::Start(self.segment.offset())).await?;

        let counter = &self.counters[self.index];
        let mut remaining = self.segment.end.map(|end| end.saturating_sub(self.segment.offset()));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let take = match remaining {
                Some(left) => (chunk.len() as u64).min(left) as usize,
                None => chunk.len(),
            };
            file.write_all(&chunk[..take]).await?;
            counter.fetch_add(take as u64, Ordering::Release);
            if let Some(left) = remaining.as_mut() {
                *left -= take as u64;
                if *left == 0 {
                    break;
                }
            }
        }
        file.flush().await?;
        Ok(())
    }
}

fn sum(counters: &[AtomicU64]) -> u64 { counters.iter().map(|c| c.load(Ordering::Acquire)).sum() }

fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string()
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.into());
    name.push(".part");
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: u64, end: Option<u64>, received: u64) -> SegmentProgress {
        SegmentProgress { start, end, received }
    }

    #[test]
    fn test_range_header_continues_after_received_bytes() {
        assert_eq!(segment(100, Some(200), 0).range_header(), "bytes=100-199");
        assert_eq!(segment(100, Some(200), 40).range_header(), "bytes=140-199");
        assert_eq!(segment(0, None, 512).range_header(), "bytes=512-");
    }

    #[test]
    fn test_segment_completion() {
        assert!(segment(0, Some(10), 10).is_complete());
        assert!(!segment(0, Some(10), 9).is_complete());
        assert!(!segment(0, None, 10_000).is_complete());
    }

    #[test]
    fn test_resume_data_survives_token_encoding() {
        let data = ResumeData {
            url:         "https://example.com/Xcode.xip".into(),
            partial:     PathBuf::from("/tmp/Xcode.xip.part"),
            destination: PathBuf::from("/tmp/Xcode.xip"),
            total_bytes: Some(30),
            etag:        Some("\"abc\"".into()),
            segments:    vec![segment(0, Some(15), 15), segment(15, Some(30), 4)],
        };
        let token = data.encode().unwrap();
        let decoded = ResumeData::decode(&token).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decoded.received(), 19);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let err = ResumeData::decode(&ResumeToken::new(b"not json".to_vec())).unwrap_err();
        assert!(matches!(err, Error::InvalidResumeToken(_)));
    }

    #[test]
    fn test_file_names() {
        let url = Url::parse("https://example.com/a/Xcode_15.xip?token=1").unwrap();
        assert_eq!(file_name(&url), "Xcode_15.xip");
        assert_eq!(file_name(&Url::parse("https://example.com/").unwrap()), FALLBACK_FILE_NAME);
        assert_eq!(
            partial_path(Path::new("/tmp/Xcode_15.xip")),
            PathBuf::from("/tmp/Xcode_15.xip.part")
        );
    }

    #[tokio::test]
    async fn test_missing_partial_fails_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let data = ResumeData {
            url:         "https://example.com/file.bin".into(),
            partial:     dir.path().join("file.bin.part"),
            destination: dir.path().join("file.bin"),
            total_bytes: Some(10),
            etag:        None,
            segments:    vec![segment(0, Some(10), 5)],
        };
        let engine = ReqwestEngine::new(dir.path()).unwrap();
        let url = Url::parse(&data.url).unwrap();
        let handle = engine
            .start(TransferRequest::resume(url, data.encode().unwrap()))
            .unwrap();

        let mut states = handle.states();
        let state = tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| s.is_terminal()))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(state, TransferState::Failed {
            final_location: None,
            resume_token:   None,
            cancelled:      false,
        });
    }
}
