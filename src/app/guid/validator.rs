/// Structural check of a candidate device GUID: five hyphen-delimited hex
/// groups of lengths 8-4-4-4-12, version nibble `4`, variant nibble in
/// `{8, 9, A, B}`. Fails closed on any other shape.
pub fn validate(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    let lengths = [8, 4, 4, 4, 12];
    for (part, expected) in parts.iter().zip(lengths) {
        if part.len() != expected || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
    }
    if !parts[2].starts_with('4') {
        return false;
    }
    matches!(
        parts[3].chars().next(),
        Some('8' | '9' | 'a' | 'b' | 'A' | 'B')
    )
}
