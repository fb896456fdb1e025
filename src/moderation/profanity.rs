// src/moderation/profanity.rs - Match compiled word lists against normalized text

use log::debug;

use crate::moderation::filter_registry::FilterSnapshot;
use crate::types::WordListKind;

/// A candidate match in normalized text. Byte offsets are best-effort and
/// only used to order and nest candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl MatchSpan {
    fn len(&self) -> usize {
        self.end - self.start
    }

    /// `self` sits inside `other`, is strictly shorter and its text is part
    /// of `other`'s text. Equal spans are not nested.
    fn is_nested_in(&self, other: &MatchSpan) -> bool {
        self.len() < other.len()
            && self.start >= other.start
            && self.end < other.end
            && other.text.contains(self.text.as_str())
    }
}

/// Symbols and wildcards used to disguise a word
fn is_noise(c: char) -> bool {
    !c.is_ascii_alphanumeric() && !c.is_whitespace()
}

fn trim_noise(text: &str) -> &str {
    text.trim_matches(is_noise)
}

/// Check normalized text against the patterns active for `list`.
///
/// Returns the offending evidence in text order, or `None` when nothing
/// matched or every surviving match is whitelisted. Whitelisted matches
/// stay in the evidence when something else was flagged.
pub fn check_profanity(
    normalized: &str,
    snapshot: &FilterSnapshot,
    list: WordListKind,
) -> Option<Vec<String>> {
    if normalized.is_empty() {
        return None;
    }

    let candidates = collect_candidates(normalized, snapshot, list);
    if candidates.is_empty() {
        return None;
    }

    let survivors = resolve_overlaps(candidates);
    if survivors
        .iter()
        .all(|span| snapshot.is_whitelisted(trim_noise(&span.text)))
    {
        debug!("All matches whitelisted: {:?}", survivors);
        return None;
    }

    Some(survivors.into_iter().map(|span| span.text).collect())
}

/// First match of every active pattern, widened over surrounding noise
pub fn collect_candidates(
    normalized: &str,
    snapshot: &FilterSnapshot,
    list: WordListKind,
) -> Vec<MatchSpan> {
    let mut candidates = Vec::new();

    for pattern in snapshot.active_patterns(list) {
        let Some((start, end)) = pattern.find(normalized) else {
            continue;
        };

        let span = widen(normalized, start, end);
        if !span.text.chars().any(|c| c.is_ascii_alphanumeric()) {
            debug!("Dropping wildcard-only match of '{}'", pattern.word());
            continue;
        }

        debug!("'{}' matched '{}' at {}..{}", pattern.word(), span.text, span.start, span.end);
        candidates.push(span);
    }

    candidates
}

/// Extend a match over adjacent noise so prefix and suffix obfuscation
/// (`$$duck!!`) ends up in the evidence
fn widen(text: &str, start: usize, end: usize) -> MatchSpan {
    let start = text[..start]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_noise(*c))
        .last()
        .map_or(start, |(index, _)| index);

    let end = text[end..]
        .char_indices()
        .find(|(_, c)| !is_noise(*c))
        .map_or(text.len(), |(offset, _)| end + offset);

    MatchSpan {
        start,
        end,
        text: text[start..end].to_string(),
    }
}

/// Drop duplicates and matches nested inside a longer match, then order by
/// position
pub fn resolve_overlaps(mut candidates: Vec<MatchSpan>) -> Vec<MatchSpan> {
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)).then(a.text.cmp(&b.text)));
    candidates.dedup();

    let survivors: Vec<MatchSpan> = candidates
        .iter()
        .filter(|a| !candidates.iter().any(|b| a.is_nested_in(b)))
        .cloned()
        .collect();

    if survivors.len() < candidates.len() {
        debug!("Discarded {} nested matches", candidates.len() - survivors.len());
    }

    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::normalizer::normalize;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn span(start: usize, end: usize, text: &str) -> MatchSpan {
        MatchSpan {
            start,
            end,
            text: text.to_string(),
        }
    }

    fn check(general: &[&str], whitelist: &[&str], raw: &str) -> Option<Vec<String>> {
        let snapshot = FilterSnapshot::compile(1, &words(general), &[], &words(whitelist));
        check_profanity(&normalize(raw), &snapshot, WordListKind::General)
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(check(&["duck"], &[], "what a lucky day"), None);
        assert_eq!(check(&["duck"], &[], ""), None);
    }

    #[test]
    fn test_evidence_includes_obfuscation() {
        assert_eq!(check(&["duck"], &[], "you $$d-u-c-k!!"), Some(words(&["$$d-u-c-k!!"])));
        assert_eq!(check(&["duck"], &[], "d u c k"), Some(words(&["d u c k"])));
    }

    #[test]
    fn test_whitelist_suppresses_sole_match() {
        assert_eq!(check(&["hell"], &["hell"], "what the hell"), None);
        assert_eq!(check(&["hell"], &["hell"], "what the hell!!"), None);
    }

    #[test]
    fn test_whitelisted_match_kept_as_evidence() {
        assert_eq!(
            check(&["hell", "duck"], &["hell"], "duck this hell"),
            Some(words(&["duck", "hell"]))
        );
    }

    #[test]
    fn test_nested_match_discarded() {
        assert_eq!(
            check(&["ass", "assassin"], &[], "ass.assin"),
            Some(words(&["ass.assin"]))
        );
    }

    #[test]
    fn test_resolve_overlaps() {
        let resolved = resolve_overlaps(vec![
            span(10, 18, "assassin"),
            span(10, 13, "ass"),
            span(0, 4, "duck"),
            span(0, 4, "duck"),
        ]);
        assert_eq!(resolved, vec![span(0, 4, "duck"), span(10, 18, "assassin")]);
    }

    #[test]
    fn test_overlap_ties_are_kept() {
        // Shares the end boundary, so not strictly inside
        let resolved = resolve_overlaps(vec![span(0, 8, "assassin"), span(5, 8, "sin")]);
        assert_eq!(resolved.len(), 2);

        // Same extent, different text
        let resolved = resolve_overlaps(vec![span(0, 4, "duck"), span(0, 4, "d*ck")]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_wildcard_only_match_dropped() {
        assert_eq!(check(&["f*ck"], &[], "😀😀😀😀"), None);
        assert!(check(&["f*ck"], &[], "fuck").is_some());
    }

    #[test]
    fn test_emoji_standing_in_for_letters() {
        assert_eq!(check(&["duck"], &[], "d😀ck😀 lol"), Some(words(&["d*ck*"])));
        assert_eq!(check(&["shit"], &[], "sh😀t😀"), Some(words(&["sh*t*"])));
        assert_eq!(check(&["duck"], &[], "d😀ck"), Some(words(&["d*ck"])));
    }

    #[test]
    fn test_humanities_channels_use_both_lists() {
        let snapshot = FilterSnapshot::compile(1, &words(&["duck"]), &words(&["goose"]), &[]);
        let text = normalize("goose and duck");

        assert_eq!(
            check_profanity(&text, &snapshot, WordListKind::General),
            Some(words(&["duck"]))
        );
        assert_eq!(
            check_profanity(&text, &snapshot, WordListKind::Humanities),
            Some(words(&["goose", "duck"]))
        );
    }
}
