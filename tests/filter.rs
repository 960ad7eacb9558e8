use hls_fetch::catalog::{RawEntry, RawLink};
use hls_fetch::domain::{Band, TileId};
use hls_fetch::filter::{DATA_REL, filter_entries};

fn bands(values: &[&str]) -> Vec<Band> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

fn entry(title: &str, hrefs: &[&str]) -> RawEntry {
    RawEntry {
        title: title.to_string(),
        links: hrefs.iter().map(|href| RawLink::new(DATA_REL, href)).collect(),
    }
}

#[test]
fn keeps_requested_bands_of_matching_tile() {
    let tile: TileId = "T11SLS".parse().unwrap();
    let entries = vec![entry(
        "HLS.S30.T11SLS.2024061T183919.v2.0",
        &[
            "https://x.org/X.B04.tif",
            "https://x.org/X.B8A.tif",
            "https://x.org/X.Fmask.tif",
        ],
    )];

    let candidates = filter_entries(&entries, &tile, &bands(&["B04", "Fmask"]));

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].band.as_str(), "B04");
    assert_eq!(candidates[0].url, "https://x.org/X.B04.tif");
    assert_eq!(candidates[1].band.as_str(), "Fmask");
    assert_eq!(
        candidates[1].granule_id,
        "HLS.S30.T11SLS.2024061T183919.v2.0"
    );
}

#[test]
fn other_tiles_yield_nothing() {
    let tile: TileId = "T11SLS".parse().unwrap();
    let entries = vec![entry(
        "HLS.S30.T99ZZZ.2024061T183919.v2.0",
        &["https://x.org/X.B04.tif", "https://x.org/X.Fmask.tif"],
    )];

    let candidates = filter_entries(&entries, &tile, &bands(&["B04", "Fmask"]));

    assert!(candidates.is_empty());
}

#[test]
fn order_follows_entries_then_links_then_bands() {
    let tile: TileId = "T11SLS".parse().unwrap();
    let entries = vec![
        entry(
            "HLS.S30.T11SLS.2024061T183919.v2.0",
            &["https://x.org/A.Fmask.tif", "https://x.org/A.B04.tif"],
        ),
        entry(
            "HLS.S30.T11SLS.2024066T183921.v2.0",
            &["https://x.org/B.B04.tif"],
        ),
    ];

    let urls: Vec<String> = filter_entries(&entries, &tile, &bands(&["B04", "Fmask"]))
        .into_iter()
        .map(|candidate| candidate.url)
        .collect();

    assert_eq!(
        urls,
        vec![
            "https://x.org/A.Fmask.tif",
            "https://x.org/A.B04.tif",
            "https://x.org/B.B04.tif",
        ]
    );
}

#[test]
fn metadata_links_are_skipped() {
    let tile: TileId = "T11SLS".parse().unwrap();
    let entries = vec![RawEntry {
        title: "HLS.S30.T11SLS.2024061T183919.v2.0".to_string(),
        links: vec![
            RawLink::new(
                "http://esipfed.org/ns/fedsearch/1.1/metadata#",
                "https://x.org/A.B04.tif",
            ),
            RawLink::new("http://esipfed.org/ns/fedsearch/1.1/s3#", "s3://bucket/A.B04.tif"),
        ],
    }];

    assert!(filter_entries(&entries, &tile, &bands(&["B04"])).is_empty());
}

#[test]
fn band_match_is_case_sensitive() {
    let tile: TileId = "T11SLS".parse().unwrap();
    let entries = vec![entry(
        "HLS.S30.T11SLS.2024061T183919.v2.0",
        &["https://x.org/A.fmask.tif"],
    )];

    assert!(filter_entries(&entries, &tile, &bands(&["Fmask"])).is_empty());
}
