use crate::catalog::RawEntry;
use crate::domain::{Band, Candidate, TileId};

/// Link relation CMR uses for direct data-access links.
pub const DATA_REL: &str = "http://esipfed.org/ns/fedsearch/1.1/data#";

/// Decides which granules and files belong to a request.
pub trait GranuleMatcher {
    fn matches_tile(&self, title: &str, tile: &TileId) -> bool;
    fn is_data_link(&self, rel: &str) -> bool;
    fn matches_band(&self, url: &str, band: &Band) -> bool;
}

/// Matching on the HLS naming convention: the tile id appears somewhere in
/// the granule title and each band file ends in `.<band>.tif`.
///
/// A band whose suffix is contained in another band's suffix matches both
/// files; no disambiguation is attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl GranuleMatcher for SubstringMatcher {
    fn matches_tile(&self, title: &str, tile: &TileId) -> bool {
        title_matches_tile(title, tile)
    }

    fn is_data_link(&self, rel: &str) -> bool {
        is_data_link(rel)
    }

    fn matches_band(&self, url: &str, band: &Band) -> bool {
        url_matches_band(url, band)
    }
}

pub fn title_matches_tile(title: &str, tile: &TileId) -> bool {
    title.contains(tile.as_str())
}

pub fn is_data_link(rel: &str) -> bool {
    rel == DATA_REL
}

pub fn url_matches_band(url: &str, band: &Band) -> bool {
    url.contains(&band.suffix())
}

pub fn filter_entries(entries: &[RawEntry], tile: &TileId, bands: &[Band]) -> Vec<Candidate> {
    filter_entries_with(&SubstringMatcher, entries, tile, bands)
}

/// Output order follows entry order, then link order, then band order.
pub fn filter_entries_with<M: GranuleMatcher + ?Sized>(
    matcher: &M,
    entries: &[RawEntry],
    tile: &TileId,
    bands: &[Band],
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for entry in entries {
        if !matcher.matches_tile(&entry.title, tile) {
            continue;
        }
        for link in entry.links.iter().filter(|link| matcher.is_data_link(&link.rel)) {
            for band in bands {
                if matcher.matches_band(&link.href, band) {
                    candidates.push(Candidate {
                        granule_id: entry.title.clone(),
                        url: link.href.clone(),
                        band: band.clone(),
                    });
                }
            }
        }
    }
    tracing::debug!(
        entries = entries.len(),
        candidates = candidates.len(),
        "filtered catalog entries"
    );
    candidates
}
