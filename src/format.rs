//! Cleanup of generated text before it is sent back to the chat.
//!
//! This is plain substring removal, not markdown parsing: a `**` or `# ` that
//! appears mid-word is stripped as well.

/// Symbol generators like to fill separator lines with.
pub const DECORATIVE_SYMBOL: char = '🎵';

/// Emphasis and heading markers removed from replies, longest headings first.
const MARKDOWN_TOKENS: &[&str] = &["**", "### ", "## ", "# "];

/// Clean a generated reply.
///
/// - Trims the text and turns literal `\n` escape sequences into newlines
/// - Removes bold and heading markers
/// - Drops lines left with nothing but whitespace and [`DECORATIVE_SYMBOL`]
///
/// # Examples
///
/// ```
/// use song_relay::format::format_reply;
///
/// let raw = "**Hello** ### World\n🎵🎵🎵\nDone";
/// assert_eq!(format_reply(raw), "Hello World\nDone");
/// ```
#[must_use]
pub fn format_reply(raw: &str) -> String {
    let unescaped = raw.trim().replace("\\n", "\n");
    // Markers go first so a line holding only "### " is dropped as well
    let stripped = strip_markdown(&unescaped);
    drop_decorative_lines(&stripped)
}

/// Remove lines made up only of whitespace and the decorative symbol.
///
/// Blank lines count as decorative and are dropped too.
#[must_use]
pub fn drop_decorative_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| {
            line.chars()
                .any(|c| !c.is_whitespace() && c != DECORATIVE_SYMBOL)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove bold and heading markers by substring replacement.
#[must_use]
pub fn strip_markdown(text: &str) -> String {
    MARKDOWN_TOKENS
        .iter()
        .fold(text.to_string(), |acc, token| acc.replace(token, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_example() {
        let raw = "**Hello** ### World\n🎵🎵🎵\nDone";
        assert_eq!(format_reply(raw), "Hello World\nDone");
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(strip_markdown("# One\n## Two\n### Three"), "One\nTwo\nThree");
    }

    #[test]
    fn test_mid_word_tokens_are_stripped() {
        assert_eq!(strip_markdown("a**b"), "ab");
        assert_eq!(strip_markdown("C# is fun"), "Cis fun");
    }

    #[test]
    fn test_decorative_lines_with_spaces() {
        let text = "Verse 1\n  🎵 🎵  🎵\nla la\n\t\nChorus";
        assert_eq!(drop_decorative_lines(text), "Verse 1\nla la\nChorus");
    }

    #[test]
    fn test_mixed_symbol_line_is_kept() {
        let text = "🎵 Happy Birthday 🎵";
        assert_eq!(format_reply(text), "🎵 Happy Birthday 🎵");
    }

    #[test]
    fn test_literal_escaped_newlines() {
        assert_eq!(format_reply("  Line 1\\nLine 2  "), "Line 1\nLine 2");
    }

    #[test]
    fn test_heading_only_line_is_dropped() {
        assert_eq!(format_reply("Title\n### \nBody"), "Title\nBody");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(format_reply("Happy Birthday"), "Happy Birthday");
    }

    proptest! {
        #[test]
        fn prop_no_decorative_lines_survive(raw in "[a-z#*🎵 \n]{0,40}") {
            let out = format_reply(&raw);
            for line in out.split('\n').filter(|_| !out.is_empty()) {
                prop_assert!(line.chars().any(|c| !c.is_whitespace() && c != DECORATIVE_SYMBOL));
            }
        }
    }
}
