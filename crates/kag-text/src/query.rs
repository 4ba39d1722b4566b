//! Weighted boolean/proximity query construction.
//!
//! Clause order is fixed: quoted phrases, multi-word sequences left over after
//! escaping, one proximity group, then single terms. Everything is joined
//! with `OR` and capped at `max_clauses`.

use std::borrow::Cow;
use std::collections::HashSet;

use kag_core::config::SearchSettings;

/// Words kept verbatim from the head of an overlong query.
const TRUNCATED_HEAD_WORDS: usize = 10;
/// Extra words (longer than `TRUNCATED_TAIL_MIN_LEN`) kept from the tail.
const TRUNCATED_TAIL_WORDS: usize = 20;
const TRUNCATED_TAIL_MIN_LEN: usize = 3;
/// Single terms must be longer than this many characters.
const MIN_TERM_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Phrase { text: String, weight: f32 },
    Proximity { terms: Vec<String>, distance: u32 },
    Term { term: String, weight: f32 },
}

impl Clause {
    pub fn render(&self, field: &str) -> String {
        match self {
            Clause::Phrase { text, weight } => format!("{field}:\"{text}\"^{weight}"),
            Clause::Proximity { terms, distance } => format!("{field}:\"{}\"~{distance}", terms.join(" ")),
            Clause::Term { term, weight } => format!("{field}:{term}^{weight}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextQuery {
    clauses: Vec<Clause>,
}

impl TextQuery {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn render(&self, field: &str) -> String {
        self.clauses.iter().map(|c| c.render(field)).collect::<Vec<_>>().join(" OR ")
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    exact_phrase_weight: f32,
    single_term_weight: f32,
    proximity_distance: u32,
    max_proximity_terms: usize,
    max_clauses: usize,
    max_query_length: usize,
}

impl QueryBuilder {
    pub fn new(settings: &SearchSettings) -> Self {
        Self {
            exact_phrase_weight: settings.exact_phrase_weight,
            single_term_weight: settings.single_term_weight,
            proximity_distance: settings.proximity_distance,
            max_proximity_terms: settings.max_proximity_terms,
            max_clauses: settings.max_clauses,
            max_query_length: settings.max_query_length,
        }
    }

    /// Shorten pathologically long input: the first ten words plus up to
    /// twenty later words longer than three characters.
    pub fn truncate<'a>(&self, query: &'a str) -> Cow<'a, str> {
        if query.chars().count() <= self.max_query_length {
            return Cow::Borrowed(query);
        }
        let words: Vec<&str> = query.split_whitespace().collect();
        let mut kept: Vec<&str> = words.iter().take(TRUNCATED_HEAD_WORDS).copied().collect();
        kept.extend(
            words
                .iter()
                .skip(TRUNCATED_HEAD_WORDS)
                .filter(|w| w.chars().count() > TRUNCATED_TAIL_MIN_LEN)
                .take(TRUNCATED_TAIL_WORDS),
        );
        Cow::Owned(kept.join(" "))
    }

    pub fn build(&self, query: &str) -> TextQuery {
        let truncated = self.truncate(query);
        let dehyphenated = truncated.replace('-', " ");
        let (quoted, remaining) = split_quoted(&dehyphenated);

        let mut clauses = Vec::new();
        let mut seen_phrases = HashSet::new();
        for phrase in quoted {
            let phrase = escape(&phrase);
            if !phrase.is_empty() && seen_phrases.insert(phrase.to_lowercase()) {
                clauses.push(Clause::Phrase { text: phrase, weight: self.exact_phrase_weight });
            }
        }

        let mut terms: Vec<String> = Vec::new();
        let mut seen_terms = HashSet::new();
        for token in remaining.split_whitespace() {
            let escaped = escape(token);
            if escaped.is_empty() {
                continue;
            }
            if escaped.contains(' ') {
                if seen_phrases.insert(escaped.to_lowercase()) {
                    clauses.push(Clause::Phrase { text: escaped, weight: self.exact_phrase_weight });
                }
            } else if escaped.chars().count() > MIN_TERM_LEN {
                let lower = escaped.to_lowercase();
                if seen_terms.insert(lower.clone()) {
                    terms.push(lower);
                }
            }
        }

        if terms.len() > 1 && self.max_proximity_terms > 1 {
            let group: Vec<String> = terms.iter().take(self.max_proximity_terms).cloned().collect();
            clauses.push(Clause::Proximity { terms: group, distance: self.proximity_distance });
        }
        for term in terms {
            clauses.push(Clause::Term { term, weight: self.single_term_weight });
        }

        clauses.truncate(self.max_clauses);
        TextQuery { clauses }
    }
}

/// Split `"..."` segments out of the input. An unmatched quote is left in
/// the remaining text, where escaping removes it.
fn split_quoted(input: &str) -> (Vec<String>, String) {
    let mut quoted = Vec::new();
    let mut remaining = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('"') {
        let after_open = &rest[open + 1..];
        match after_open.find('"') {
            Some(close) => {
                remaining.push_str(&rest[..open]);
                remaining.push(' ');
                quoted.push(after_open[..close].to_string());
                rest = &after_open[close + 1..];
            }
            None => break,
        }
    }
    remaining.push_str(rest);
    (quoted, remaining)
}

/// Replace anything the query parser could interpret as syntax with spaces
/// and collapse the result.
fn escape(token: &str) -> String {
    let replaced: String = token
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
