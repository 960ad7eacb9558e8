use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{Band, SearchRequest, TileId, parse_date};
use crate::error::HlsError;

pub const DEFAULT_CONFIG_FILE: &str = "hls-fetch.json";
pub const DEFAULT_CATALOG_URL: &str = "https://cmr.earthdata.nasa.gov/search/granules.json";
pub const DEFAULT_SHORT_NAME: &str = "HLSS30";
pub const DEFAULT_VERSION: &str = "2.0";
pub const DEFAULT_PAGE_SIZE: u32 = 2000;
pub const DEFAULT_OUTPUT_DIR: &str = "hls_data";
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 500;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// On-disk configuration. Every field is optional; command-line flags are
/// layered on top with [`Config::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tile: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub bands: Option<Vec<String>>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default)]
    pub request_interval_ms: Option<u64>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

impl Config {
    pub fn apply(self, overrides: Config) -> Config {
        Config {
            tile: overrides.tile.or(self.tile),
            start_date: overrides.start_date.or(self.start_date),
            end_date: overrides.end_date.or(self.end_date),
            bands: overrides.bands.or(self.bands),
            output_dir: overrides.output_dir.or(self.output_dir),
            max_files: overrides.max_files.or(self.max_files),
            request_interval_ms: overrides.request_interval_ms.or(self.request_interval_ms),
            workers: overrides.workers.or(self.workers),
            page_size: overrides.page_size.or(self.page_size),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            catalog_url: overrides.catalog_url.or(self.catalog_url),
            short_name: overrides.short_name.or(self.short_name),
            version: overrides.version.or(self.version),
            chunk_size: overrides.chunk_size.or(self.chunk_size),
        }
    }

    pub fn output_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSettings {
    pub url: String,
    pub short_name: String,
    pub version: String,
    pub page_size: u32,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_CATALOG_URL.to_string(),
            short_name: DEFAULT_SHORT_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub request_interval: Duration,
    pub workers: usize,
    pub chunk_size: usize,
    /// Per-request timeout of the HTTP session shared with catalog search.
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_interval: Duration::from_millis(DEFAULT_REQUEST_INTERVAL_MS),
            workers: DEFAULT_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub request: SearchRequest,
    pub output_dir: Utf8PathBuf,
    pub max_files: Option<usize>,
    pub catalog: CatalogSettings,
    pub fetch: FetchSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the explicit config file, or the first default location that
    /// exists. No file at a default location yields an empty config.
    pub fn load(path: Option<&str>) -> Result<Config, HlsError> {
        let config_path = match path {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(HlsError::MissingConfig(path));
                }
                Some(path)
            }
            None => Self::default_locations()
                .into_iter()
                .find(|candidate| candidate.exists()),
        };

        let Some(config_path) = config_path else {
            return Ok(Config::default());
        };

        tracing::debug!(path = %config_path.display(), "loading config");
        let content = fs::read_to_string(&config_path)
            .map_err(|_| HlsError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| HlsError::ConfigParse(err.to_string()))
    }

    pub fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
        if let Some(dirs) = BaseDirs::new() {
            locations.push(
                dirs.home_dir()
                    .join(".config")
                    .join("hls-fetch")
                    .join("config.json"),
            );
        }
        locations
    }

    pub fn resolve(config: Config) -> Result<ResolvedConfig, HlsError> {
        let output_dir = config.output_dir();

        let tile: TileId = config
            .tile
            .as_deref()
            .ok_or_else(|| HlsError::MissingParameter("tile".to_string()))?
            .parse()?;
        let start_date = parse_date(
            config
                .start_date
                .as_deref()
                .ok_or_else(|| HlsError::MissingParameter("start date".to_string()))?,
        )?;
        let end_date = parse_date(
            config
                .end_date
                .as_deref()
                .ok_or_else(|| HlsError::MissingParameter("end date".to_string()))?,
        )?;
        let bands = config
            .bands
            .map(|values| {
                values
                    .iter()
                    .map(|value| value.parse::<Band>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        let request = SearchRequest::new(tile, start_date, end_date, bands)?;

        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let catalog = CatalogSettings {
            url: config
                .catalog_url
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            short_name: config
                .short_name
                .unwrap_or_else(|| DEFAULT_SHORT_NAME.to_string()),
            version: config
                .version
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            page_size: config.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        };
        let fetch = FetchSettings {
            request_interval: Duration::from_millis(
                config
                    .request_interval_ms
                    .unwrap_or(DEFAULT_REQUEST_INTERVAL_MS),
            ),
            workers: config.workers.unwrap_or(DEFAULT_WORKERS).max(1),
            chunk_size: config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1),
            timeout,
        };

        Ok(ResolvedConfig {
            request,
            output_dir,
            max_files: config.max_files,
            catalog,
            fetch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence() {
        let base = Config {
            tile: Some("T11SLS".to_string()),
            workers: Some(4),
            ..Config::default()
        };
        let merged = base.apply(Config {
            workers: Some(2),
            ..Config::default()
        });
        assert_eq!(merged.tile.as_deref(), Some("T11SLS"));
        assert_eq!(merged.workers, Some(2));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ConfigLoader::load(Some("/nonexistent/hls-fetch.json")).unwrap_err();
        assert!(matches!(err, HlsError::MissingConfig(_)));
    }
}
