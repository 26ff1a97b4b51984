//! Turns raw model text into a bounded, ordered list of bullets.
//!
//! Lines whose trimmed form starts with a marker are kept, with the leading run of
//! marker characters and the whitespace around it removed. Marker characters after
//! that first run belong to the bullet text (`-5%`, `**bold**`) and are kept. When the backend ignores the format
//! and no marker line carries text, the whole trimmed output becomes one bullet.
//! The result is truncated to `max_bullets` and never padded.

/// The marker the prompt asks the model to use.
pub const PRIMARY_MARKER: char = '•';

/// Every marker the parser accepts at the start of a line.
pub const MARKERS: &[char] = &[PRIMARY_MARKER, '-', '*'];

pub fn parse_bullets(raw: &str, max_bullets: usize) -> Vec<String> {
    if max_bullets == 0 {
        return Vec::new();
    }

    let bullets: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(MARKERS))
        .map(strip_markers)
        .filter(|bullet| !bullet.is_empty())
        .take(max_bullets)
        .map(str::to_string)
        .collect();

    if !bullets.is_empty() {
        return bullets;
    }

    let whole = raw.trim();
    if whole.is_empty() {
        Vec::new()
    } else {
        vec![whole.to_string()]
    }
}

fn strip_markers(line: &str) -> &str {
    line.trim().trim_start_matches(MARKERS).trim()
}
