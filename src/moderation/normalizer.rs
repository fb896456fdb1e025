// src/moderation/normalizer.rs - Canonical comparison form for message text

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Stand-in for any character the matcher cannot read (emoji, accented
/// letters, custom emoji tokens). Compiled patterns accept it in every
/// letter position.
pub const WILDCARD: char = '*';

/// Platform custom emoji: `<:name:id>` or animated `<a:name:id>`
pub(crate) static CUSTOM_EMOJI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<a?:\w+:\d+>").expect("Invalid custom emoji regex"));

const REGIONAL_INDICATOR_A: u32 = 0x1F1E6;
const REGIONAL_INDICATOR_Z: u32 = 0x1F1FF;

/// Look-alike characters mapped to ASCII. Keys are lower-case; lookups
/// lower-case the input first so capital Cyrillic/Greek forms hit as well.
static HOMOGLYPHS: Lazy<HashMap<char, char>> = Lazy::new(|| {
    [
        // Cyrillic lookalikes
        ('а', 'a'), ('в', 'b'), ('с', 'c'), ('ԁ', 'd'), ('е', 'e'), ('ё', 'e'),
        ('һ', 'h'), ('н', 'h'), ('і', 'i'), ('ї', 'i'), ('ј', 'j'), ('к', 'k'),
        ('ӏ', 'l'), ('м', 'm'), ('п', 'n'), ('о', 'o'), ('р', 'p'), ('ԛ', 'q'),
        ('г', 'r'), ('ѕ', 's'), ('т', 't'), ('и', 'u'), ('ѵ', 'v'), ('ԝ', 'w'),
        ('х', 'x'), ('у', 'y'), ('ӡ', 'z'),
        // Greek lookalikes
        ('α', 'a'), ('β', 'b'), ('ε', 'e'), ('η', 'n'), ('ι', 'i'), ('κ', 'k'),
        ('ν', 'v'), ('ο', 'o'), ('ρ', 'p'), ('τ', 't'), ('υ', 'u'), ('χ', 'x'),
        ('γ', 'y'), ('ω', 'w'), ('ζ', 'z'),
        // Stylized punctuation
        ('‘', '\''), ('’', '\''), ('‚', '\''), ('‛', '\''), ('′', '\''),
        ('“', '"'), ('”', '"'), ('„', '"'), ('″', '"'),
        ('‐', '-'), ('‑', '-'), ('‒', '-'), ('–', '-'), ('—', '-'), ('―', '-'), ('−', '-'),
        ('…', '.'), ('•', '.'), ('·', '.'),
        ('¡', '!'), ('ǃ', '!'), ('¿', '?'),
    ]
    .iter()
    .cloned()
    .collect()
});

/// Normalize raw message content into the form patterns are matched against.
///
/// Emphasis markers are stripped, look-alike characters folded to ASCII,
/// everything else non-ASCII replaced by [`WILDCARD`], and the result
/// lower-cased. Literal `?` always survives. The function is pure and
/// idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let stripped = strip_all_emphasis(raw);
    let folded = fold_lookalikes(&stripped);
    let masked = mask_non_ascii(&folded);
    let mut normalized = collapse_custom_emoji(&masked);

    // Wildcards introduced above can pair up into new emphasis markers
    // (`😀bad😀` -> `*bad*`); settle them now so a second pass is a no-op.
    // Markers touching a letter never pair, so a wildcard standing in for a
    // letter (`d😀ck😀` -> `d*ck*`) is never removed here.
    loop {
        let next = collapse_custom_emoji(&strip_all_emphasis(&normalized));
        if next == normalized {
            break;
        }
        normalized = next;
    }

    let trimmed = normalized.trim();
    if trimmed.len() != normalized.len() {
        normalized = trimmed.to_string();
    }

    debug!("Normalized {:?} -> {:?}", raw, normalized);
    normalized
}

/// Canonical form of a word-list entry before pattern compilation
pub fn normalize_word(word: &str) -> String {
    word.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Remove `**bold**` pairs, then `*italic*` pairs, keeping their text
fn strip_all_emphasis(text: &str) -> String {
    let without_bold = strip_emphasis(text, "**");
    strip_emphasis(&without_bold, "*")
}

/// Single left-to-right scan removing matched marker pairs. A marker opens
/// only when directly followed by a non-space, non-`*` character and closes
/// only when directly preceded by a non-space character, which keeps literal
/// asterisks such as `5 * 3` or `** **` intact. Markers inside a word
/// (`f*ck*`) are left alone: an opener may not follow a letter or digit and a
/// closer may not precede one.
fn strip_emphasis(text: &str, marker: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut copied_to = 0;
    let mut search_from = 0;

    while let Some(relative) = text[search_from..].find(marker) {
        let open = search_from + relative;
        let inner_start = open + marker.len();

        if !is_opening_marker(text, open, inner_start) {
            search_from = open + 1;
            continue;
        }

        match find_closing_marker(text, inner_start, marker) {
            Some(close) => {
                output.push_str(&text[copied_to..open]);
                output.push_str(&text[inner_start..close]);
                copied_to = close + marker.len();
                search_from = copied_to;
            }
            None => search_from = open + 1,
        }
    }

    output.push_str(&text[copied_to..]);
    output
}

fn is_opening_marker(text: &str, open: usize, inner_start: usize) -> bool {
    let previous = text[..open].chars().next_back();
    if previous.map_or(false, |prev| prev == WILDCARD || prev.is_alphanumeric()) {
        return false;
    }
    match text[inner_start..].chars().next() {
        Some(next) => !next.is_whitespace() && next != WILDCARD,
        None => false,
    }
}

fn find_closing_marker(text: &str, inner_start: usize, marker: &str) -> Option<usize> {
    // The interior holds at least the character that qualified the opener
    let first_len = text[inner_start..].chars().next()?.len_utf8();
    let mut search_from = inner_start + first_len;

    while let Some(relative) = text[search_from..].find(marker) {
        let close = search_from + relative;
        let after = close + marker.len();
        let preceded_by_text = text[..close]
            .chars()
            .next_back()
            .map_or(false, |prev| !prev.is_whitespace());
        let followed_by_word = text[after..]
            .chars()
            .next()
            .map_or(false, |next| next == WILDCARD || next.is_alphanumeric());

        if preceded_by_text && !followed_by_word {
            return Some(close);
        }
        search_from = close + 1;
    }

    None
}

/// Regional-indicator letters and homoglyphs to ASCII
fn fold_lookalikes(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    if c.is_ascii() {
        return c;
    }

    let code = c as u32;
    if (REGIONAL_INDICATOR_A..=REGIONAL_INDICATOR_Z).contains(&code) {
        if let Some(letter) = char::from_u32('a' as u32 + (code - REGIONAL_INDICATOR_A)) {
            return letter;
        }
    }

    let lower = c.to_lowercase().next().unwrap_or(c);
    if let Some(&ascii) = HOMOGLYPHS.get(&lower) {
        return ascii;
    }

    // Compatibility forms: superscript/subscript digits, full-width and
    // mathematical alphanumerics. Only single-char ASCII results are kept
    // so character positions stay aligned.
    let mut compat = c.nfkc();
    match (compat.next(), compat.next()) {
        (Some(folded), None) if folded.is_ascii() => folded,
        _ => c,
    }
}

/// Replace every non-ASCII (and non-whitespace control) character with the
/// wildcard and lower-case the rest, restoring literal `?` afterwards.
fn mask_non_ascii(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let question_marks: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| **c == '?')
        .map(|(i, _)| i)
        .collect();

    let mut masked: Vec<char> = chars
        .iter()
        .map(|&c| {
            if c.is_ascii() && (!c.is_ascii_control() || c.is_ascii_whitespace()) {
                c.to_ascii_lowercase()
            } else {
                WILDCARD
            }
        })
        .collect();

    for index in question_marks {
        masked[index] = '?';
    }

    masked.into_iter().collect()
}

fn collapse_custom_emoji(text: &str) -> String {
    CUSTOM_EMOJI
        .replace_all(text, WILDCARD.to_string().as_str())
        .into_owned()
}
