//! Trigger prefix matching.
//!
//! A message triggers a plugin when it starts with one of the configured prefixes
//! and the character right after the prefix is not whitespace. Prefixes are tried in
//! configured order and the first hit wins, so when one prefix is a prefix of
//! another the longer one must be listed first to ever match.

/// A successful prefix match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    /// The configured prefix that matched
    pub prefix: &'a str,
    /// Text after the prefix, trimmed; never empty
    pub payload: &'a str,
}

/// Find the first prefix that triggers on `text`.
///
/// Returns `None` when no prefix matches, when the prefix is followed by whitespace
/// or nothing, or when the remaining payload is empty after trimming.
///
/// # Examples
///
/// ```
/// use song_relay::plugin::match_prefix;
///
/// let prefixes = vec!["唱".to_string(), "作曲".to_string()];
/// let hit = match_prefix("唱生日快乐歌", &prefixes).expect("should match");
/// assert_eq!(hit.prefix, "唱");
/// assert_eq!(hit.payload, "生日快乐歌");
///
/// assert!(match_prefix("唱 生日快乐歌", &prefixes).is_none());
/// ```
#[must_use]
pub fn match_prefix<'a, S>(text: &'a str, prefixes: &'a [S]) -> Option<PrefixMatch<'a>>
where
    S: AsRef<str>,
{
    prefixes.iter().map(AsRef::as_ref).find_map(|prefix| {
        if prefix.is_empty() {
            return None;
        }
        let rest = text.strip_prefix(prefix)?;
        let next = rest.chars().next()?;
        if next.is_whitespace() {
            return None;
        }
        let payload = rest.trim();
        (!payload.is_empty()).then_some(PrefixMatch { prefix, payload })
    })
}
