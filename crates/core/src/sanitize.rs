//! Text cleaning applied to a script before it is spoken.
//!
//! Stage directions in `[...]` and asides in `(...)` are dropped, known
//! abbreviations are expanded so speech engines pronounce them, and
//! whitespace is collapsed. The transform is pure and idempotent.

use std::collections::{BTreeMap, HashMap};

use regex::{Captures, Regex};

use crate::error::{Result, TubeforgeError};

/// Abbreviation table used when none is configured.
pub fn default_abbreviations() -> BTreeMap<String, String> {
    [
        ("AI", "artificial intelligence"),
        ("API", "A P I"),
        ("URL", "U R L"),
        ("SEO", "S E O"),
        ("FAQ", "F A Q"),
        ("DIY", "D I Y"),
        ("CEO", "C E O"),
        ("UI", "user interface"),
        ("UX", "user experience"),
        ("vs", "versus"),
        ("&", "and"),
        ("%", "percent"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    brackets: Regex,
    parens: Regex,
    whitespace: Regex,
    abbreviations: Option<Regex>,
    /// Lowercased key -> (expansion, key is a symbol)
    expansions: HashMap<String, (String, bool)>,
}

fn is_word_key(key: &str) -> bool {
    key.chars().all(|c| c.is_alphanumeric() || c == '_')
}

impl Sanitizer {
    pub fn new(table: &BTreeMap<String, String>) -> Result<Self> {
        let mut keys: Vec<&String> = table.keys().filter(|k| !k.trim().is_empty()).collect();
        // Longest first so "API" is preferred over "AI" where both could apply.
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let alternatives: Vec<String> = keys
            .iter()
            .map(|k| {
                if is_word_key(k) {
                    format!(r"\b{}\b", regex::escape(k))
                } else {
                    regex::escape(k)
                }
            })
            .collect();

        let abbreviations = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i)(?:{})", alternatives.join("|")))?)
        };

        let expansions = keys
            .iter()
            .map(|k| {
                (
                    k.to_lowercase(),
                    (table[k.as_str()].clone(), !is_word_key(k)),
                )
            })
            .collect();

        let sanitizer = Self {
            brackets: Regex::new(r"\[.*?\]")?,
            parens: Regex::new(r"\(.*?\)")?,
            whitespace: Regex::new(r"\s+")?,
            abbreviations,
            expansions,
        };
        sanitizer.validate(table)?;
        Ok(sanitizer)
    }

    /// An expansion that reintroduces a key or a bracket would change on a
    /// second pass, so such tables are refused.
    fn validate(&self, table: &BTreeMap<String, String>) -> Result<()> {
        for (key, expansion) in table {
            if expansion.contains(['[', ']', '(', ')']) {
                return Err(TubeforgeError::InvalidConfig {
                    reason: format!("expansion for {key:?} contains brackets: {expansion:?}"),
                });
            }
            if let Some(re) = &self.abbreviations {
                if let Some(m) = re.find(expansion) {
                    return Err(TubeforgeError::InvalidConfig {
                        reason: format!(
                            "expansion for {key:?} contains abbreviation {:?}",
                            m.as_str()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn sanitize(&self, text: &str) -> String {
        let text = self.brackets.replace_all(text, "");
        let text = self.parens.replace_all(&text, "");

        let text = match &self.abbreviations {
            Some(re) => re
                .replace_all(&text, |caps: &Captures| {
                    let matched = &caps[0];
                    match self.expansions.get(&matched.to_lowercase()) {
                        Some((expansion, true)) => format!(" {expansion} "),
                        Some((expansion, false)) => expansion.clone(),
                        None => matched.to_string(),
                    }
                })
                .into_owned(),
            None => text.into_owned(),
        };

        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}
