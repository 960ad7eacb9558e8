use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::CatalogClient;
use crate::config::FetchSettings;
use crate::domain::{Candidate, FetchOutcome, RunReport, SearchRequest};
use crate::error::HlsError;
use crate::fetch::{CancelToken, DownloadClient, FetchEngine};
use crate::filter::filter_entries;
use crate::store::{OutputStore, StoredFile, filename_from_url};

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Searching {
        tile: String,
        start: NaiveDate,
        end: NaiveDate,
        bands: Vec<String>,
    },
    Found {
        entries: usize,
        candidates: usize,
    },
    Limited {
        max_files: usize,
    },
    Started {
        index: usize,
        total: usize,
        filename: String,
    },
    Transfer {
        filename: String,
        received: u64,
        total: Option<u64>,
    },
    Finished {
        index: usize,
        total: usize,
        outcome: FetchOutcome,
    },
}

/// Receives progress from every fetch worker, so it must be shareable.
pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedFile {
    pub granule_id: String,
    pub band: String,
    pub url: String,
    pub filename: String,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub requested: usize,
    pub output_directory: Utf8PathBuf,
    pub files: Vec<PlannedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub output_directory: Utf8PathBuf,
    pub files: Vec<StoredFile>,
}

/// Runs search, filter and fetch for one request.
pub struct App<C: CatalogClient, D: DownloadClient> {
    catalog: C,
    downloader: D,
    settings: FetchSettings,
    cancel: CancelToken,
}

impl<C: CatalogClient, D: DownloadClient> App<C, D> {
    pub fn new(catalog: C, downloader: D, settings: FetchSettings) -> Self {
        Self {
            catalog,
            downloader,
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    /// Candidates a run would attempt, in filter order, capped at
    /// `max_files` when given. A cap of zero means no cap.
    pub fn candidates(
        &self,
        request: &SearchRequest,
        max_files: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Candidate>, HlsError> {
        sink.event(ProgressEvent::Searching {
            tile: request.tile().to_string(),
            start: request.start_date(),
            end: request.end_date(),
            bands: request.bands().iter().map(|band| band.to_string()).collect(),
        });
        let entries = self.catalog.search(request)?;
        let mut candidates = filter_entries(&entries, request.tile(), request.bands());
        tracing::info!(
            entries = entries.len(),
            candidates = candidates.len(),
            "found files to download"
        );
        sink.event(ProgressEvent::Found {
            entries: entries.len(),
            candidates: candidates.len(),
        });

        if let Some(max_files) = max_files.filter(|max| *max > 0) {
            if candidates.len() > max_files {
                tracing::info!(max_files, "limiting to first files");
                candidates.truncate(max_files);
                sink.event(ProgressEvent::Limited { max_files });
            }
        }
        Ok(candidates)
    }

    pub fn plan(
        &self,
        request: &SearchRequest,
        output_dir: &Utf8Path,
        max_files: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<PlanResult, HlsError> {
        let store = OutputStore::new(output_dir);
        let candidates = self.candidates(request, max_files, sink)?;
        let files = candidates
            .into_iter()
            .map(|candidate| {
                let filename = filename_from_url(&candidate.url).unwrap_or_default();
                PlannedFile {
                    present: !filename.is_empty() && store.is_present(&filename),
                    granule_id: candidate.granule_id,
                    band: candidate.band.to_string(),
                    url: candidate.url,
                    filename,
                }
            })
            .collect::<Vec<_>>();
        Ok(PlanResult {
            requested: files.len(),
            output_directory: store.absolute_root(),
            files,
        })
    }

    /// A catalog failure aborts the run before anything is fetched; per-file
    /// failures are recorded in the report and never abort it.
    pub fn run(
        &self,
        request: &SearchRequest,
        output_dir: &Utf8Path,
        max_files: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, HlsError> {
        let store = OutputStore::new(output_dir);
        let candidates = self.candidates(request, max_files, sink)?;
        if candidates.is_empty() {
            tracing::info!("no granules found");
            return Ok(RunReport::empty(store.absolute_root()));
        }

        if let Err(err) = store.remove_stale_staging() {
            tracing::warn!(error = %err, "could not clean staging files");
        }
        let engine = FetchEngine::new(&self.downloader, store.clone(), &self.settings)
            .with_cancel(self.cancel.clone());
        let outcomes = self.fetch_all(&engine, &candidates, sink);
        let report = RunReport::from_outcomes(outcomes, store.absolute_root());
        tracing::info!(
            requested = report.requested,
            succeeded = report.succeeded,
            failed = report.failed,
            output = %report.output_directory,
            "run complete"
        );
        Ok(report)
    }

    fn fetch_all<E: DownloadClient>(
        &self,
        engine: &FetchEngine<E>,
        candidates: &[Candidate],
        sink: &dyn ProgressSink,
    ) -> Vec<FetchOutcome> {
        let total = candidates.len();
        let workers = self.settings.workers.clamp(1, total.max(1));
        let slots: Mutex<Vec<Option<FetchOutcome>>> = Mutex::new(vec![None; total]);
        let next = AtomicUsize::new(0);

        let work = || {
            loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(candidate) = candidates.get(index) else {
                    break;
                };
                sink.event(ProgressEvent::Started {
                    index: index + 1,
                    total,
                    filename: filename_from_url(&candidate.url)
                        .unwrap_or_else(|_| candidate.url.clone()),
                });
                let outcome = engine.fetch(candidate, sink);
                sink.event(ProgressEvent::Finished {
                    index: index + 1,
                    total,
                    outcome: outcome.clone(),
                });
                slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(outcome);
            }
        };

        if workers == 1 {
            work();
        } else {
            tracing::debug!(workers, "starting fetch workers");
            thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(work);
                }
            });
        }

        slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .zip(candidates)
            .map(|(slot, candidate)| {
                slot.unwrap_or_else(|| {
                    let filename = filename_from_url(&candidate.url).unwrap_or_default();
                    FetchOutcome::failed(&candidate.url, &filename, 0, &HlsError::Cancelled)
                })
            })
            .collect()
    }
}

pub fn list(output_dir: &Utf8Path) -> Result<ListResult, HlsError> {
    let store = OutputStore::new(output_dir);
    Ok(ListResult {
        files: store.list()?,
        output_directory: store.absolute_root(),
    })
}
