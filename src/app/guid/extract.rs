use regex::bytes::Regex;

use crate::app::guid::validator;
use crate::app::models::GuidCandidate;

/// Marker byte sequences anchoring the per-device database identifier inside
/// a raw diagnostic trace.
pub const MARKERS: [&[u8]; 4] = [
    b"BLDatabaseManager",
    b"BLDatabase",
    b"BLDatabaseManager.sqlite",
    b"bookassetd [Database]: Store is at file:///private/var/containers/Shared/SystemGroup",
];

pub const GUID_SHAPE: &str =
    r"(?i)[0-9A-F]{8}-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{4}-[0-9A-F]{12}";

const CONTEXT_BYTES: usize = 50;

/// Positions of every occurrence of every known marker, byte-offset
/// ascending.
pub fn scan_markers(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    for marker in MARKERS {
        let mut from = 0;
        while from + marker.len() <= data.len() {
            let Some(found) = find(&data[from..], marker) else {
                break;
            };
            let pos = from + found;
            positions.push(pos);
            from = pos + marker.len();
        }
    }
    positions.sort_unstable();
    positions
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Extracts validated GUID candidates inside `marker_pos ± window`, clipped
/// to the data bounds. Offsets are relative to the marker (negative = before
/// it); ordering follows byte offset ascending.
pub fn extract(data: &[u8], marker_pos: usize, window: usize) -> Vec<GuidCandidate> {
    let pattern = Regex::new(GUID_SHAPE).unwrap();
    let start = marker_pos.saturating_sub(window);
    let end = (marker_pos + window).min(data.len());
    if start >= end {
        return Vec::new();
    }
    let slice = &data[start..end];

    let mut candidates = Vec::new();
    for found in pattern.find_iter(slice) {
        let value = String::from_utf8_lossy(found.as_bytes()).to_uppercase();
        if !validator::validate(&value) {
            continue;
        }
        let position = (start + found.start()) as i64 - marker_pos as i64;
        candidates.push(GuidCandidate {
            value,
            position,
            context: context_excerpt(slice, found.start(), found.end()),
        });
    }
    candidates
}

/// Bounded human-readable excerpt around a match: decoded text when the bytes
/// are valid UTF-8, else a hex dump.
fn context_excerpt(data: &[u8], start: usize, end: usize) -> String {
    let from = start.saturating_sub(CONTEXT_BYTES);
    let to = (end + CONTEXT_BYTES).min(data.len());
    let excerpt = &data[from..to];
    match std::str::from_utf8(excerpt) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(excerpt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUID: &str = "2A22A82B-C342-444D-972F-5270FB5080DF";

    fn trace_with(parts: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        for part in parts {
            data.extend_from_slice(part);
        }
        data
    }

    #[test]
    fn finds_all_marker_occurrences() {
        let data = trace_with(&[
            b"noise ",
            b"BLDatabaseManager",
            b" more noise ",
            b"BLDatabaseManager",
            b" tail",
        ]);
        let positions = scan_markers(&data);
        // "BLDatabase" is a prefix of "BLDatabaseManager", so each occurrence
        // anchors twice.
        assert_eq!(positions.len(), 4);
        assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn extracts_candidate_near_marker() {
        let mut data = trace_with(&[b"BLDatabaseManager.sqlite at "]);
        let marker_pos = 0;
        data.extend_from_slice(GUID.as_bytes());
        let candidates = extract(&data, marker_pos, 512);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value, GUID);
        assert_eq!(candidates[0].position, 28);
        assert!(candidates[0].context.contains("BLDatabaseManager"));
    }

    #[test]
    fn candidate_before_marker_has_negative_offset() {
        let mut data = Vec::new();
        data.extend_from_slice(GUID.as_bytes());
        data.extend_from_slice(b" store BLDatabaseManager");
        let marker_pos = GUID.len() + 7;
        let candidates = extract(&data, marker_pos, 512);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].position, -(marker_pos as i64));
    }

    #[test]
    fn drops_shape_matches_failing_validation() {
        // Correct shape, wrong version nibble.
        let bad = "2A22A82B-C342-144D-972F-5270FB5080DF";
        let data = trace_with(&[b"BLDatabaseManager ", bad.as_bytes()]);
        assert!(extract(&data, 0, 512).is_empty());
    }

    #[test]
    fn window_is_clipped_to_bounds() {
        let data = trace_with(&[b"BLDatabase"]);
        assert!(extract(&data, 5, 512).is_empty());
        assert!(extract(&data, 0, 0).is_empty());
    }

    #[test]
    fn lowercase_match_is_normalized() {
        let lower = GUID.to_lowercase();
        let data = trace_with(&[b"BLDatabaseManager ", lower.as_bytes()]);
        let candidates = extract(&data, 0, 512);
        assert_eq!(candidates[0].value, GUID);
    }

    #[test]
    fn binary_context_falls_back_to_hex() {
        let mut data = vec![0xFF, 0xFE, 0xFD];
        data.extend_from_slice(GUID.as_bytes());
        data.extend_from_slice(&[0xFF, 0xFE]);
        let candidates = extract(&data, 0, 512);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].context.starts_with("fffefd"));
    }
}
