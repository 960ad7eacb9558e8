use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::HlsError;

pub const DEFAULT_BANDS: [&str; 3] = ["B04", "B8A", "Fmask"];

/// MGRS grid cell identifier as used in HLS granule names, e.g. `T11SLS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId(String);

impl TileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TileId {
    type Err = HlsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let upper = value.trim().to_uppercase();
        let normalized = if upper.starts_with('T') {
            upper
        } else {
            format!("T{upper}")
        };
        let body = &normalized[1..];
        let is_valid = body.is_ascii()
            && body.len() == 5
            && body[..2].chars().all(|ch| ch.is_ascii_digit())
            && body[2..].chars().all(|ch| ch.is_ascii_alphabetic());
        if !is_valid {
            return Err(HlsError::InvalidTile(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// A data channel distributed as its own file, e.g. `B04` or `Fmask`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Band(String);

impl Band {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filename suffix that marks a file of this band.
    pub fn suffix(&self) -> String {
        format!(".{}.tif", self.0)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Band {
    type Err = HlsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(HlsError::InvalidBand(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

pub fn default_bands() -> Vec<Band> {
    DEFAULT_BANDS
        .iter()
        .map(|band| Band(band.to_string()))
        .collect()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, HlsError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| HlsError::InvalidDate(value.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    tile: TileId,
    start_date: NaiveDate,
    end_date: NaiveDate,
    bands: Vec<Band>,
}

impl SearchRequest {
    pub fn new(
        tile: TileId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        bands: Option<Vec<Band>>,
    ) -> Result<Self, HlsError> {
        if start_date > end_date {
            return Err(HlsError::InvalidDateRange {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }
        let mut unique: Vec<Band> = Vec::new();
        for band in bands.filter(|list| !list.is_empty()).unwrap_or_else(default_bands) {
            if !unique.contains(&band) {
                unique.push(band);
            }
        }
        Ok(Self {
            tile,
            start_date,
            end_date,
            bands: unique,
        })
    }

    pub fn tile(&self) -> &TileId {
        &self.tile
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// CMR `temporal` parameter covering both days in full.
    pub fn temporal(&self) -> String {
        format!(
            "{}T00:00:00Z,{}T23:59:59Z",
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub granule_id: String,
    pub url: String,
    pub band: Band,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    AlreadyPresent,
    Downloaded,
    Failed,
}

impl FetchStatus {
    pub fn is_success(self) -> bool {
        !matches!(self, FetchStatus::Failed)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::AlreadyPresent => write!(f, "already_present"),
            FetchStatus::Downloaded => write!(f, "downloaded"),
            FetchStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub url: String,
    pub filename: String,
    pub status: FetchStatus,
    pub bytes_transferred: u64,
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn already_present(url: &str, filename: &str) -> Self {
        Self {
            url: url.to_string(),
            filename: filename.to_string(),
            status: FetchStatus::AlreadyPresent,
            bytes_transferred: 0,
            error: None,
        }
    }

    pub fn downloaded(url: &str, filename: &str, bytes: u64) -> Self {
        Self {
            url: url.to_string(),
            filename: filename.to_string(),
            status: FetchStatus::Downloaded,
            bytes_transferred: bytes,
            error: None,
        }
    }

    pub fn failed(url: &str, filename: &str, bytes: u64, error: &HlsError) -> Self {
        Self {
            url: url.to_string(),
            filename: filename.to_string(),
            status: FetchStatus::Failed,
            bytes_transferred: bytes,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub output_directory: Utf8PathBuf,
    pub outcomes: Vec<FetchOutcome>,
}

impl RunReport {
    pub fn empty(output_directory: Utf8PathBuf) -> Self {
        Self {
            requested: 0,
            succeeded: 0,
            failed: 0,
            output_directory,
            outcomes: Vec::new(),
        }
    }

    pub fn from_outcomes(outcomes: Vec<FetchOutcome>, output_directory: Utf8PathBuf) -> Self {
        let succeeded = outcomes
            .iter()
            .filter(|outcome| outcome.status.is_success())
            .count();
        Self {
            requested: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            output_directory,
            outcomes,
        }
    }

    pub fn count(&self, status: FetchStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|outcome| outcome.bytes_transferred)
            .sum()
    }
}
