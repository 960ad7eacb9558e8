use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::error::HlsError;

static GRANULE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^HLS\.(?P<product>[LS]30)\.(?P<tile>T\d{2}[A-Z]{3})\.(?P<year>\d{4})(?P<doy>\d{3})T(?P<time>\d{6})\.v(?P<version>\d+\.\d+)\.(?P<band>[A-Za-z0-9]+)\.tif$",
    )
    .expect("granule filename regex is valid")
});

/// Fields encoded in a canonical HLS band filename such as
/// `HLS.S30.T11SLS.2024061T183919.v2.0.B04.tif`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GranuleFile {
    pub product: String,
    pub tile: String,
    pub year: i32,
    pub day_of_year: u32,
    pub acquired: NaiveDate,
    pub time: String,
    pub version: String,
    pub band: String,
}

impl GranuleFile {
    /// `YYYYDDD`, the acquisition key used in the granule name.
    pub fn acquisition_key(&self) -> String {
        format!("{:04}{:03}", self.year, self.day_of_year)
    }

    pub fn label(&self) -> String {
        format!("{} on {}", self.tile, self.acquisition_key())
    }
}

impl FromStr for GranuleFile {
    type Err = HlsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || HlsError::InvalidFilename(value.to_string());
        let caps = GRANULE_FILE.captures(value).ok_or_else(invalid)?;
        let year: i32 = caps["year"].parse().map_err(|_| invalid())?;
        let day_of_year: u32 = caps["doy"].parse().map_err(|_| invalid())?;
        let acquired = NaiveDate::from_yo_opt(year, day_of_year).ok_or_else(invalid)?;
        Ok(Self {
            product: caps["product"].to_string(),
            tile: caps["tile"].to_string(),
            year,
            day_of_year,
            acquired,
            time: caps["time"].to_string(),
            version: caps["version"].to_string(),
            band: caps["band"].to_string(),
        })
    }
}
