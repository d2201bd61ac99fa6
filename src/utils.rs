//! Utility functions for file naming and message splitting.

use unicode_segmentation::UnicodeSegmentation;

/// Fallback name when a title sanitizes to nothing.
pub const DEFAULT_FILE_STEM: &str = "music";

/// Longest file stem kept, in characters.
const MAX_FILE_STEM_CHARS: usize = 100;

/// Characters that are invalid in file names on common platforms.
const RESERVED_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use song_relay::utils::truncate_str;
/// let s = "生日快乐歌";
/// assert_eq!(truncate_str(s, 2), "生日");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Turns a song title into a safe file stem.
///
/// Reserved and control characters become `_`, surrounding dots and spaces are
/// trimmed and the result is capped at 100 characters. An empty result falls back
/// to [`DEFAULT_FILE_STEM`].
///
/// # Examples
///
/// ```
/// use song_relay::utils::sanitize_filename;
/// assert_eq!(sanitize_filename("AC/DC: Live?"), "AC_DC_ Live_");
/// assert_eq!(sanitize_filename(" .. "), "music");
/// ```
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if c.is_control() || RESERVED_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let stem = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let trimmed = truncate_str(stem, MAX_FILE_STEM_CHARS);
    let trimmed = trimmed.trim_end();

    if trimmed.is_empty() {
        DEFAULT_FILE_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits a message into parts of at most `max_chars` characters.
///
/// Splits on line boundaries when possible; a single line longer than the limit is
/// cut between grapheme clusters so emoji and combined characters stay intact.
///
/// # Examples
///
/// ```
/// use song_relay::utils::split_message;
/// let parts = split_message("Line 1\nLine 2\nLine 3", 13);
/// assert_eq!(parts, vec!["Line 1\nLine 2", "Line 3"]);
/// ```
#[must_use]
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= max_chars {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= max_chars {
            current.push_str(line);
            current_len = line_len;
            continue;
        }

        // Oversized line
        for grapheme in line.graphemes(true) {
            let grapheme_len = grapheme.chars().count();
            if current_len + grapheme_len > max_chars && !current.is_empty() {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push_str(grapheme);
            current_len += grapheme_len;
        }
    }

    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts.retain(|p| !p.trim().is_empty());
    parts
}
