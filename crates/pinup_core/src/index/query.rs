//! Search query DSL.
//!
//! A query is a whitespace-separated list of tokens:
//!
//! - `tag:value` / `source:value`: exact, case-insensitive filters; the field
//!   name is case-insensitive and surrounding quotes on the value are stripped
//! - `"some phrase"`: a phrase; an unterminated quote runs to end of input
//! - anything else: a free-text term (including `field:value` for any other
//!   field)
//!
//! Free text is escaped into FTS5 string literals and ANDed, so no user input
//! ever reaches the FTS5 query parser as syntax. Parsing is a single linear
//! pass.

use crate::store::validate::fold;

/// A free-text piece of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A single bare word.
    Word(String),
    /// A quoted phrase.
    Phrase(String),
}

impl Term {
    /// The text inside the term.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Word(s) | Self::Phrase(s) => s,
        }
    }
}

/// A filter on a non-text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Snippet carries a tag with this (lowercased) name.
    Tag(String),
    /// Snippet's source equals this (lowercased) value.
    Source(String),
}

/// A parsed query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Free-text terms that survived escaping, in input order.
    pub terms: Vec<Term>,
    /// Field filters, in input order.
    pub filters: Vec<Filter>,
    /// Free-text tokens dropped because they carried no searchable content.
    pub dropped: usize,
}

impl ParsedQuery {
    /// True for a query with no tokens at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.filters.is_empty() && self.dropped == 0
    }

    /// True when the query had free text but none of it was searchable and
    /// no filter is present; such a query matches nothing.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        self.terms.is_empty() && self.filters.is_empty() && self.dropped > 0
    }

    /// The FTS5 `MATCH` expression, or `None` when there is no free text.
    #[must_use]
    pub fn fts_expression(&self) -> Option<String> {
        if self.terms.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.terms.iter().map(|t| escape(t.text())).collect();
        Some(parts.join(" AND "))
    }

    /// Tag filter values.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().filter_map(|f| match f {
            Filter::Tag(t) => Some(t.as_str()),
            Filter::Source(_) => None,
        })
    }

    /// Source filter values.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().filter_map(|f| match f {
            Filter::Source(s) => Some(s.as_str()),
            Filter::Tag(_) => None,
        })
    }
}

/// Wraps text in an FTS5 string literal, doubling embedded quotes.
#[must_use]
pub fn escape(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Parses a query string.
#[must_use]
pub fn parse(input: &str) -> ParsedQuery {
    let mut query = ParsedQuery::default();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        if first == '"' {
            chars.next();
            let phrase: String = chars.by_ref().take_while(|&c| c != '"').collect();
            push_term(&mut query, Term::Phrase(phrase));
            continue;
        }

        // A bare token ends at whitespace outside quotes, so `tag:"a b"` stays whole.
        let mut token = String::new();
        let mut quoted = false;
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() && !quoted {
                break;
            }
            if c == '"' {
                quoted = !quoted;
            }
            token.push(c);
            chars.next();
        }

        match as_filter(&token) {
            Some(filter) => query.filters.push(filter),
            None => push_term(&mut query, Term::Word(token)),
        }
    }

    query
}

fn as_filter(token: &str) -> Option<Filter> {
    let (field, value) = token.split_once(':')?;
    let value = value.trim_matches('"').trim();
    if value.is_empty() {
        return None;
    }
    match field.to_ascii_lowercase().as_str() {
        "tag" => Some(Filter::Tag(fold(value))),
        "source" => Some(Filter::Source(fold(value))),
        _ => None,
    }
}

fn push_term(query: &mut ParsedQuery, term: Term) {
    if term.text().chars().any(char::is_alphanumeric) {
        query.terms.push(term);
    } else {
        query.dropped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(q: &ParsedQuery) -> Vec<&str> {
        q.terms.iter().map(Term::text).collect()
    }

    #[test]
    fn empty_query() {
        assert!(parse("").is_empty());
        assert!(parse("   \t\n").is_empty());
        assert_eq!(parse("").fts_expression(), None);
    }

    #[test]
    fn words_and_filters() {
        let q = parse("useEffect tag:React source:ChatGPT cleanup");
        assert_eq!(words(&q), vec!["useEffect", "cleanup"]);
        assert_eq!(q.tags().collect::<Vec<_>>(), vec!["react"]);
        assert_eq!(q.sources().collect::<Vec<_>>(), vec!["chatgpt"]);
        assert_eq!(
            q.fts_expression().unwrap(),
            "\"useEffect\" AND \"cleanup\""
        );
    }

    #[test]
    fn field_names_are_case_insensitive() {
        let q = parse("TAG:rust Source:web");
        assert_eq!(q.filters, vec![Filter::Tag("rust".into()), Filter::Source("web".into())]);
    }

    #[test]
    fn quoted_filter_values() {
        let q = parse("tag:\"Machine Learning\" x");
        assert_eq!(q.filters, vec![Filter::Tag("machine learning".into())]);
        assert_eq!(words(&q), vec!["x"]);
    }

    #[test]
    fn unknown_fields_are_free_text() {
        let q = parse("lang:rust");
        assert!(q.filters.is_empty());
        assert_eq!(words(&q), vec!["lang:rust"]);
    }

    #[test]
    fn empty_filter_value_is_free_text() {
        let q = parse("tag:");
        assert!(q.filters.is_empty());
        assert_eq!(words(&q), vec!["tag:"]);
    }

    #[test]
    fn phrases() {
        let q = parse("\"error handling\" rust");
        assert_eq!(
            q.terms,
            vec![Term::Phrase("error handling".into()), Term::Word("rust".into())]
        );
        assert_eq!(q.fts_expression().unwrap(), "\"error handling\" AND \"rust\"");
    }

    #[test]
    fn unterminated_phrase_runs_to_end() {
        let q = parse("\"never closed tag:x");
        assert_eq!(q.terms, vec![Term::Phrase("never closed tag:x".into())]);
        assert!(q.filters.is_empty());
    }

    #[test]
    fn operators_are_neutralized() {
        let q = parse("NOT foo* OR (bar) NEAR");
        let expr = q.fts_expression().unwrap();
        assert_eq!(
            expr,
            "\"NOT\" AND \"foo*\" AND \"OR\" AND \"(bar)\" AND \"NEAR\""
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(escape("a\"b"), "\"a\"\"b\"");
        let q = parse("say\"hi\"");
        assert_eq!(q.fts_expression().unwrap(), "\"say\"\"hi\"\"\"");
    }

    #[test]
    fn punctuation_only_terms_are_dropped() {
        let q = parse("*** ( ) \"\"");
        assert!(q.terms.is_empty());
        assert_eq!(q.dropped, 4);
        assert!(q.matches_nothing());
        assert!(!q.is_empty());

        let with_filter = parse("*** tag:x");
        assert!(!with_filter.matches_nothing());
    }

    proptest! {
        #[test]
        fn expression_is_always_balanced(input in ".{0,64}") {
            let q = parse(&input);
            if let Some(expr) = q.fts_expression() {
                // every literal is closed: total quote count is even
                prop_assert_eq!(expr.matches('"').count() % 2, 0);
                prop_assert!(expr.starts_with('"') && expr.ends_with('"'));
            }
        }

        #[test]
        fn parse_never_loses_plain_words(words in proptest::collection::vec("[a-z]{1,8}", 0..8)) {
            let input = words.join(" ");
            let q = parse(&input);
            let parsed: Vec<String> = q.terms.iter().map(|t| t.text().to_string()).collect();
            prop_assert_eq!(parsed, words);
        }
    }
}
