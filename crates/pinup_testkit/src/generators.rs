//! Property-based test generators using proptest.
//!
//! Strategies produce inputs the vault accepts, so properties can focus on
//! behavior rather than validation.

use pinup_core::{NewSnippet, SnippetPatch};
use proptest::prelude::*;

/// Strategy for tag names as a user might type them (mixed case, padding).
pub fn tag_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(" {0,2}[a-zA-Z][a-zA-Z0-9_-]{0,15} {0,2}").expect("Invalid regex")
}

/// Strategy for collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z0-9 ]{0,23}[a-z0-9]")
        .expect("Invalid regex")
        .prop_filter("Collection name must not be blank", |s| !s.trim().is_empty())
}

/// Strategy for snippet bodies: a few words, sometimes spanning lines.
pub fn body_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[a-z]{1,12}").expect("Invalid regex"),
        1..12,
    )
    .prop_flat_map(|words| {
        let len = words.len();
        (Just(words), prop::collection::vec(any::<bool>(), len))
    })
    .prop_map(|(words, breaks)| {
        let mut body = String::new();
        for (i, (word, newline)) in words.iter().zip(breaks).enumerate() {
            if i > 0 {
                body.push(if newline { '\n' } else { ' ' });
            }
            body.push_str(word);
        }
        body
    })
}

/// Strategy for source labels.
pub fn source_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec![
        "chatgpt".to_string(),
        "claude".to_string(),
        "web".to_string(),
        "manual".to_string(),
    ]))
}

/// Strategy for complete snippet inputs.
pub fn new_snippet_strategy() -> impl Strategy<Value = NewSnippet> {
    (
        body_strategy(),
        prop::option::of(prop::string::string_regex("[A-Za-z][A-Za-z ]{0,30}").expect("Invalid regex")),
        source_strategy(),
        prop::collection::vec(tag_name_strategy(), 0..4),
        prop::collection::vec(collection_name_strategy(), 0..2),
    )
        .prop_map(|(body, title, source, tags, collections)| NewSnippet {
            title,
            body,
            source,
            tags,
            collections,
            ..NewSnippet::default()
        })
}

/// Strategy for partial snippet updates.
pub fn snippet_patch_strategy() -> impl Strategy<Value = SnippetPatch> {
    (
        prop::option::of(body_strategy()),
        prop::option::of(prop::collection::vec(tag_name_strategy(), 0..3)),
    )
        .prop_map(|(body, tags)| SnippetPatch {
            body,
            tags,
            ..SnippetPatch::default()
        })
}

/// Strategy for DSL query strings mixing free text, quotes and filters.
pub fn query_strategy() -> impl Strategy<Value = String> {
    let part = prop_oneof![
        prop::string::string_regex("[a-z]{1,10}").expect("Invalid regex"),
        prop::string::string_regex("\"[a-z ]{1,16}\"").expect("Invalid regex"),
        tag_name_strategy().prop_map(|t| format!("tag:{}", t.trim())),
        source_strategy().prop_map(|s| format!("source:{}", s.unwrap_or_default())),
        prop::string::string_regex("[*()^:\"-]{1,3}").expect("Invalid regex"),
    ];
    prop::collection::vec(part, 0..5).prop_map(|parts| parts.join(" "))
}
