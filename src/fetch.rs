use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Url;

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::FetchSettings;
use crate::domain::{Candidate, FetchOutcome};
use crate::error::HlsError;
use crate::rate::RateGate;
use crate::session::EarthdataSession;
use crate::store::{OutputStore, Promotion, filename_from_url};

/// An opened remote file, ready to be streamed.
pub struct RemoteFile {
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

pub trait DownloadClient: Send + Sync {
    fn open(&self, url: &str) -> Result<RemoteFile, HlsError>;
}

impl<T: DownloadClient + ?Sized> DownloadClient for &T {
    fn open(&self, url: &str) -> Result<RemoteFile, HlsError> {
        (**self).open(url)
    }
}

#[derive(Clone)]
pub struct HttpDownloadClient {
    session: EarthdataSession,
}

impl HttpDownloadClient {
    pub fn new(session: EarthdataSession) -> Self {
        Self { session }
    }
}

impl DownloadClient for HttpDownloadClient {
    fn open(&self, url: &str) -> Result<RemoteFile, HlsError> {
        let url = Url::parse(url).map_err(|err| HlsError::TransferHttp(err.to_string()))?;
        let response = self
            .session
            .send(url)
            .map_err(|err| HlsError::TransferHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let message = status
                .canonical_reason()
                .unwrap_or("download request failed")
                .to_string();
            return Err(HlsError::TransferStatus {
                status: status.as_u16(),
                message,
            });
        }
        Ok(RemoteFile {
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}

/// Cooperative cancellation flag checked between chunks and candidates.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct FetchEngine<D: DownloadClient> {
    client: D,
    store: OutputStore,
    gate: RateGate,
    chunk_size: usize,
    cancel: CancelToken,
}

impl<D: DownloadClient> FetchEngine<D> {
    pub fn new(client: D, store: OutputStore, settings: &FetchSettings) -> Self {
        Self {
            client,
            store,
            gate: RateGate::new(settings.request_interval),
            chunk_size: settings.chunk_size.max(1),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetches one candidate into the store. Never fails as a whole: every
    /// error is captured in the returned outcome.
    pub fn fetch(&self, candidate: &Candidate, sink: &dyn ProgressSink) -> FetchOutcome {
        let url = candidate.url.as_str();
        let filename = match filename_from_url(url) {
            Ok(filename) => filename,
            Err(err) => return FetchOutcome::failed(url, "", 0, &err),
        };

        if self.store.is_present(&filename) {
            tracing::info!(filename = %filename, "already present");
            return FetchOutcome::already_present(url, &filename);
        }
        if self.cancel.is_cancelled() {
            return FetchOutcome::failed(url, &filename, 0, &HlsError::Cancelled);
        }

        let _permit = self.gate.acquire();
        if self.cancel.is_cancelled() {
            return FetchOutcome::failed(url, &filename, 0, &HlsError::Cancelled);
        }
        tracing::info!(filename = %filename, band = %candidate.band, "downloading");
        let mut received = 0u64;
        match self.transfer(url, &filename, &mut received, sink) {
            Ok(Promotion::Promoted) => {
                tracing::info!(filename = %filename, bytes = received, "downloaded");
                FetchOutcome::downloaded(url, &filename, received)
            }
            Ok(Promotion::AlreadyPresent) => {
                tracing::info!(filename = %filename, "completed by another writer");
                FetchOutcome::already_present(url, &filename)
            }
            Err(err) => {
                tracing::warn!(
                    filename = %filename,
                    bytes = received,
                    error = %err,
                    "download failed"
                );
                FetchOutcome::failed(url, &filename, received, &err)
            }
        }
    }

    fn transfer(
        &self,
        url: &str,
        filename: &str,
        received: &mut u64,
        sink: &dyn ProgressSink,
    ) -> Result<Promotion, HlsError> {
        let mut remote = self.client.open(url)?;
        self.store.ensure_root()?;
        // Dropping `staged` on any early return deletes the partial file.
        let mut staged = self.store.stage(filename)?;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut last_percent = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(HlsError::Cancelled);
            }
            let read = match remote.body.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(HlsError::TransferHttp(err.to_string())),
            };
            staged
                .write_all(&buffer[..read])
                .map_err(|err| HlsError::Filesystem(err.to_string()))?;
            *received += read as u64;

            if let Some(total) = remote.content_length.filter(|total| *total > 0) {
                let percent = (*received * 100 / total).min(100) as u8;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    sink.event(ProgressEvent::Transfer {
                        filename: filename.to_string(),
                        received: *received,
                        total: Some(total),
                    });
                }
            }
        }

        match remote.content_length {
            Some(expected) if expected != *received => {
                return Err(HlsError::IncompleteTransfer {
                    expected,
                    received: *received,
                });
            }
            _ if *received == 0 => {
                return Err(HlsError::TransferHttp("empty response body".to_string()));
            }
            _ => {}
        }

        staged
            .as_file()
            .sync_all()
            .map_err(|err| HlsError::Filesystem(err.to_string()))?;
        self.store.promote(staged, filename)
    }
}
