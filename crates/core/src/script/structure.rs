//! Approximate segmentation of a script into timed sections.
//!
//! This is a keyword heuristic, not semantic parsing: a section closes on the
//! first line that mentions a transition word once more than
//! [`SECTION_MIN_WORDS`] words have accumulated.

use crate::types::{ScriptResult, Section};

/// Average narration speed
pub const WORDS_PER_MINUTE: f64 = 150.0;

pub const SECTION_MIN_WORDS: usize = 50;

/// Matched as substrings of the lowercased line.
pub const TRANSITION_KEYWORDS: [&str; 7] =
    ["next", "now", "so", "here", "first", "second", "finally"];

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn reading_seconds(words: usize) -> f64 {
    words as f64 / WORDS_PER_MINUTE * 60.0
}

pub fn estimate_minutes(words: usize) -> f64 {
    words as f64 / WORDS_PER_MINUTE
}

pub fn split_sections(script: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut words = 0usize;
    let mut start_seconds = 0.0;

    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        words += word_count(line);
        buffer.push(line);

        let lowered = line.to_lowercase();
        if words > SECTION_MIN_WORDS && TRANSITION_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            let duration_seconds = reading_seconds(words);
            sections.push(Section {
                content: buffer.join(" "),
                start_seconds,
                duration_seconds,
                word_count: words,
            });
            start_seconds += duration_seconds;
            buffer.clear();
            words = 0;
        }
    }

    if !buffer.is_empty() {
        sections.push(Section {
            content: buffer.join(" "),
            start_seconds,
            duration_seconds: reading_seconds(words),
            word_count: words,
        });
    }

    sections
}

pub fn structure(text: String, provider: &str) -> ScriptResult {
    let words = word_count(&text);
    ScriptResult {
        sections: split_sections(&text),
        word_count: words,
        estimated_minutes: estimate_minutes(words),
        provider: provider.to_string(),
        recovered_failures: Vec::new(),
        text,
    }
}
