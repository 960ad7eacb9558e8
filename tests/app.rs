use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use hls_fetch::app::{App, NoopProgress, list};
use hls_fetch::catalog::{CatalogClient, RawEntry, RawLink};
use hls_fetch::config::FetchSettings;
use hls_fetch::domain::{FetchStatus, SearchRequest, parse_date};
use hls_fetch::error::HlsError;
use hls_fetch::fetch::{CancelToken, DownloadClient, RemoteFile};
use hls_fetch::filter::DATA_REL;

struct MockCatalog {
    entries: Vec<RawEntry>,
    fail: bool,
    calls: Mutex<usize>,
}

impl MockCatalog {
    fn with_entries(entries: Vec<RawEntry>) -> Self {
        Self {
            entries,
            fail: false,
            calls: Mutex::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            entries: Vec::new(),
            fail: true,
            calls: Mutex::new(0),
        }
    }
}

impl CatalogClient for MockCatalog {
    fn search(&self, _request: &SearchRequest) -> Result<Vec<RawEntry>, HlsError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(HlsError::CatalogStatus {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(self.entries.clone())
    }
}

#[derive(Default)]
struct MockDownloads {
    failing: HashSet<String>,
    opened: Mutex<Vec<String>>,
}

impl MockDownloads {
    fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|url| url.to_string()).collect(),
            opened: Mutex::new(Vec::new()),
        }
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl DownloadClient for MockDownloads {
    fn open(&self, url: &str) -> Result<RemoteFile, HlsError> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(HlsError::TransferStatus {
                status: 404,
                message: "Not Found".to_string(),
            });
        }
        let body = format!("contents of {url}").into_bytes();
        Ok(RemoteFile {
            content_length: Some(body.len() as u64),
            body: Box::new(Cursor::new(body)),
        })
    }
}

fn settings(workers: usize) -> FetchSettings {
    FetchSettings {
        request_interval: Duration::ZERO,
        workers,
        chunk_size: 16,
        ..FetchSettings::default()
    }
}

fn request() -> SearchRequest {
    SearchRequest::new(
        "T11SLS".parse().unwrap(),
        parse_date("2024-03-01").unwrap(),
        parse_date("2024-03-15").unwrap(),
        Some(vec!["B04".parse().unwrap(), "Fmask".parse().unwrap()]),
    )
    .unwrap()
}

fn granule(day: u32) -> RawEntry {
    let title = format!("HLS.S30.T11SLS.2024{day:03}T183919.v2.0");
    let links = ["B04", "B8A", "Fmask"]
        .iter()
        .map(|band| RawLink::new(DATA_REL, &format!("https://data.example.org/{title}.{band}.tif")))
        .collect();
    RawEntry { title, links }
}

fn granules(count: u32) -> Vec<RawEntry> {
    (0..count).map(|offset| granule(61 + offset)).collect()
}

fn output_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("hls_data")).unwrap()
}

fn stored_names(dir: &Utf8PathBuf) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn downloads_requested_bands() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let app = App::new(
        MockCatalog::with_entries(granules(2)),
        MockDownloads::default(),
        settings(1),
    );

    let report = app.run(&request(), &dir, None, &NoopProgress).unwrap();

    assert_eq!(report.requested, 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(
        stored_names(&dir),
        vec![
            "HLS.S30.T11SLS.2024061T183919.v2.0.B04.tif",
            "HLS.S30.T11SLS.2024061T183919.v2.0.Fmask.tif",
            "HLS.S30.T11SLS.2024062T183919.v2.0.B04.tif",
            "HLS.S30.T11SLS.2024062T183919.v2.0.Fmask.tif",
        ]
    );
    let first = fs::read_to_string(dir.join("HLS.S30.T11SLS.2024061T183919.v2.0.B04.tif")).unwrap();
    assert_eq!(
        first,
        "contents of https://data.example.org/HLS.S30.T11SLS.2024061T183919.v2.0.B04.tif"
    );
}

#[test]
fn second_run_fetches_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let app = App::new(
        MockCatalog::with_entries(granules(2)),
        MockDownloads::default(),
        settings(1),
    );

    app.run(&request(), &dir, None, &NoopProgress).unwrap();
    let opened_after_first = app.downloader().opened().len();
    let files_after_first = stored_names(&dir);

    let report = app.run(&request(), &dir, None, &NoopProgress).unwrap();

    assert_eq!(report.succeeded, report.requested);
    assert_eq!(report.failed, 0);
    assert_eq!(report.count(FetchStatus::AlreadyPresent), 4);
    assert_eq!(report.bytes_transferred(), 0);
    assert_eq!(app.downloader().opened().len(), opened_after_first);
    assert_eq!(stored_names(&dir), files_after_first);
}

#[test]
fn max_files_keeps_first_candidates_in_order() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let app = App::new(
        MockCatalog::with_entries(granules(5)),
        MockDownloads::default(),
        settings(1),
    );

    let report = app.run(&request(), &dir, Some(3), &NoopProgress).unwrap();

    assert_eq!(report.requested, 3);
    assert_eq!(
        app.downloader().opened(),
        vec![
            "https://data.example.org/HLS.S30.T11SLS.2024061T183919.v2.0.B04.tif",
            "https://data.example.org/HLS.S30.T11SLS.2024061T183919.v2.0.Fmask.tif",
            "https://data.example.org/HLS.S30.T11SLS.2024062T183919.v2.0.B04.tif",
        ]
    );
}

#[test]
fn zero_max_files_means_no_cap() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let app = App::new(
        MockCatalog::with_entries(granules(2)),
        MockDownloads::default(),
        settings(1),
    );

    let report = app.run(&request(), &dir, Some(0), &NoopProgress).unwrap();

    assert_eq!(report.requested, 4);
}

#[test]
fn one_failure_does_not_stop_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let broken = "https://data.example.org/HLS.S30.T11SLS.2024061T183919.v2.0.Fmask.tif";
    let app = App::new(
        MockCatalog::with_entries(granules(2)),
        MockDownloads::failing(&[broken]),
        settings(1),
    );

    let report = app.run(&request(), &dir, None, &NoopProgress).unwrap();

    assert_eq!(report.requested, report.succeeded + report.failed);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.outcomes[1].status, FetchStatus::Failed);
    assert_eq!(
        report.outcomes[1].error.as_deref(),
        Some("download returned status 404: Not Found")
    );
    assert!(!dir.join("HLS.S30.T11SLS.2024061T183919.v2.0.Fmask.tif").exists());
    assert_eq!(app.downloader().opened().len(), 4);
}

#[test]
fn empty_search_writes_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let mut other_tile = granule(61);
    other_tile.title = "HLS.S30.T99ZZZ.2024061T183919.v2.0".to_string();
    let app = App::new(
        MockCatalog::with_entries(vec![other_tile]),
        MockDownloads::default(),
        settings(1),
    );

    let report = app.run(&request(), &dir, None, &NoopProgress).unwrap();

    assert_eq!(report.requested, 0);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 0);
    assert!(report.outcomes.is_empty());
    assert!(!dir.exists());
    assert!(app.downloader().opened().is_empty());
}

#[test]
fn catalog_failure_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let app = App::new(MockCatalog::failing(), MockDownloads::default(), settings(1));

    let err = app.run(&request(), &dir, None, &NoopProgress).unwrap_err();

    assert_matches!(err, HlsError::CatalogStatus { status: 503, .. });
    assert!(err.is_catalog_unavailable());
    assert!(app.downloader().opened().is_empty());
    assert!(!dir.exists());
}

#[test]
fn parallel_workers_keep_candidate_order() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let app = App::new(
        MockCatalog::with_entries(granules(6)),
        MockDownloads::default(),
        settings(4),
    );

    let report = app.run(&request(), &dir, None, &NoopProgress).unwrap();

    assert_eq!(report.requested, 12);
    assert_eq!(report.succeeded, 12);
    let expected: Vec<String> = (0..6)
        .flat_map(|offset| {
            let title = format!("HLS.S30.T11SLS.2024{:03}T183919.v2.0", 61 + offset);
            ["B04", "Fmask"].map(|band| format!("{title}.{band}.tif"))
        })
        .collect();
    let filenames: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| outcome.filename.clone())
        .collect();
    assert_eq!(filenames, expected);
    assert_eq!(app.downloader().opened().len(), 12);
}

#[test]
fn cancelled_run_reports_every_file_as_failed() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let cancel = CancelToken::new();
    cancel.cancel();
    let app = App::new(
        MockCatalog::with_entries(granules(2)),
        MockDownloads::default(),
        settings(2),
    )
    .with_cancel(cancel);

    let report = app.run(&request(), &dir, None, &NoopProgress).unwrap();

    assert_eq!(report.requested, 4);
    assert_eq!(report.failed, 4);
    assert!(
        report
            .outcomes
            .iter()
            .all(|outcome| outcome.error.as_deref() == Some("download cancelled"))
    );
    assert!(app.downloader().opened().is_empty());
}

#[test]
fn plan_marks_present_files_without_downloading() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("HLS.S30.T11SLS.2024061T183919.v2.0.B04.tif"), b"done").unwrap();
    let app = App::new(
        MockCatalog::with_entries(granules(1)),
        MockDownloads::default(),
        settings(1),
    );

    let plan = app.plan(&request(), &dir, None, &NoopProgress).unwrap();

    assert_eq!(plan.requested, 2);
    assert!(plan.files[0].present);
    assert!(!plan.files[1].present);
    assert_eq!(plan.files[1].band, "Fmask");
    assert!(app.downloader().opened().is_empty());
}

#[test]
fn list_reports_downloaded_granules() {
    let temp = tempfile::tempdir().unwrap();
    let dir = output_dir(&temp);
    let app = App::new(
        MockCatalog::with_entries(granules(1)),
        MockDownloads::default(),
        settings(1),
    );
    app.run(&request(), &dir, None, &NoopProgress).unwrap();

    let listed = list(&dir).unwrap();

    assert_eq!(listed.files.len(), 2);
    assert_eq!(listed.files[0].label, "T11SLS on 2024061");
    assert_eq!(
        listed.files[1].granule.as_ref().map(|granule| granule.band.as_str()),
        Some("Fmask")
    );
}
