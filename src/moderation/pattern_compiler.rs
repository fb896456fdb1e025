// src/moderation/pattern_compiler.rs - Word list entries to obfuscation-tolerant regexes

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::error::{ModerationError, ModerationResult};
use crate::moderation::normalizer::{normalize_word, WILDCARD};

/// Zero or more spacing/punctuation characters allowed between two letters
/// of a word: `d-u.c.k`, `d u c k`, `(d)(u)(c)(k)`.
const LETTER_SEPARATOR: &str = r#"[\s\-._,\~'"|/\\()\[\]{}<>]*"#;

/// Looser gap allowed between the words of a phrase
const PHRASE_SEPARATOR: &str = r"[^a-z0-9]*";

/// What a `*` inside a masked word-list entry (`f*ck`) stands for: exactly
/// one letter, possibly stretched (`fuuuck`), one digit or symbol stand-in,
/// or a run of wildcards. Mixed runs such as `li` in `flick` never match.
static ANY_LETTER: Lazy<String> = Lazy::new(|| {
    let letters: Vec<String> = ('a'..='z').map(|letter| format!("{}+", letter)).collect();
    format!(r"(?:{}|[0-9@#$!|]|\*+)", letters.join("|"))
});

/// Word boundary used on both ends of every pattern. Normalized text is
/// ASCII, so "not alphanumeric" is the boundary.
const BOUNDARY_START: &str = r"(?:^|[^a-z0-9])";
const BOUNDARY_END: &str = r"(?:[^a-z0-9]|$)";

/// Digit and symbol look-alikes for each letter
fn substitutions(c: char) -> Option<&'static str> {
    match c {
        'a' => Some("a4@#"),
        'b' => Some("b86"),
        'c' => Some("c(<[{"),
        'e' => Some("e3&"),
        'g' => Some("g96"),
        'h' => Some("h#"),
        'i' | 'l' => Some("il1!|"),
        'o' => Some("o0"),
        's' => Some("s$5"),
        't' => Some("t7+"),
        'u' => Some("uv"),
        'z' => Some("z2"),
        _ => None,
    }
}

/// One fuzzy matcher compiled from one word-list entry
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    word: String,
    regex: Regex,
}

impl CompiledPattern {
    /// The normalized source word
    pub fn word(&self) -> &str {
        &self.word
    }

    /// Byte span of the first match of the word itself, excluding the
    /// boundary characters around it
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        self.regex
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|word| (word.start(), word.end()))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Compile one word (or space-separated phrase) into a fuzzy pattern
pub fn compile_word(word: &str) -> ModerationResult<CompiledPattern> {
    let normalized = normalize_word(word);
    if normalized.is_empty() {
        return Err(ModerationError::EmptyWord);
    }

    let body = normalized
        .split(' ')
        .map(compile_token)
        .collect::<Vec<_>>()
        .join(PHRASE_SEPARATOR);
    let expression = format!("{}({}){}", BOUNDARY_START, body, BOUNDARY_END);

    let regex = Regex::new(&expression).map_err(|source| ModerationError::Pattern {
        word: normalized.clone(),
        source,
    })?;

    Ok(CompiledPattern {
        word: normalized,
        regex,
    })
}

/// Compile a whole list, skipping blanks and duplicates. A word whose
/// pattern fails to build is logged and left out so one bad entry never
/// empties the list.
pub fn compile_word_list(words: &[String]) -> Vec<CompiledPattern> {
    let mut seen = HashSet::new();
    let mut patterns = Vec::with_capacity(words.len());

    for word in words {
        let normalized = normalize_word(word);
        if normalized.is_empty() || !seen.insert(normalized.clone()) {
            continue;
        }

        match compile_word(&normalized) {
            Ok(pattern) => patterns.push(pattern),
            Err(e) => warn!("Skipping word list entry '{}': {}", normalized, e),
        }
    }

    patterns
}

fn compile_token(token: &str) -> String {
    token
        .chars()
        .map(letter_class)
        .collect::<Vec<_>>()
        .join(LETTER_SEPARATOR)
}

/// Character class for one letter: itself, its look-alikes and the
/// wildcard, repeated so stretched letters (`fuuuu`) still match
fn letter_class(c: char) -> String {
    if c == WILDCARD {
        return ANY_LETTER.clone();
    }

    let members = match substitutions(c) {
        Some(variants) => variants.to_string(),
        None => {
            if !c.is_ascii_alphanumeric() {
                debug!("No substitutions for '{}', using a literal class", c);
            }
            c.to_string()
        }
    };

    let escaped: String = members
        .chars()
        .map(|member| regex::escape(&member.to_string()))
        .collect();

    format!("[{}{}]+", escaped, regex::escape(&WILDCARD.to_string()))
}
