//! Keyword extraction for story/task alignment checks.
//!
//! Text is split into ASCII alphabetic runs, lowercased, and filtered against a
//! fixed stop-word list. The list also carries roadmap vocabulary ("implement",
//! "story", "task") that appears in nearly every item and would otherwise make
//! unrelated items look aligned.

use roadmap_core::item::Item;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

/// Tokens shorter than this are never keywords.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Common English words plus generic roadmap/engineering vocabulary.
pub const STOP_WORDS: &[&str] = &[
    // English
    "the", "and", "for", "with", "that", "this", "from", "into", "onto", "are", "was", "were",
    "will", "would", "should", "could", "can", "has", "have", "had", "been", "being", "not", "but",
    "all", "any", "each", "every", "its", "our", "their", "they", "them", "then", "than", "there",
    "these", "those", "what", "when", "where", "which", "while", "who", "whom", "why", "how",
    "also", "such", "only", "other", "some", "more", "most", "very", "just", "about", "above",
    "after", "before", "between", "through", "during", "under", "over", "again", "further",
    "once", "here", "both", "few", "own", "same", "too", "out", "off", "per", "via", "you", "your",
    "use", "using", "used", "new", "make", "able", "allow", "allows", "based", "need", "needs",
    "well", "within", "without", "including", "like", "must", "may", "one", "two", "get", "set",
    // Roadmap vocabulary
    "implement", "implementation", "create", "configure", "configuration", "setup", "add",
    "build", "update", "ensure", "develop", "design", "define", "handle", "provide", "support",
    "integrate", "task", "tasks", "story", "stories", "epic", "epics", "milestone", "milestones",
    "feature", "features", "api",
];

static STOP_WORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORD_SET.contains(word)
}

/// Extract the normalized keyword set of a piece of text.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|token| token.len() >= MIN_KEYWORD_LEN)
        .map(|token| token.to_ascii_lowercase())
        .filter(|token| !is_stop_word(token))
        .collect()
}

/// Keywords of an item's name and description.
pub fn item_keywords(item: &Item) -> BTreeSet<String> {
    let mut keywords = extract_keywords(&item.name);
    keywords.extend(extract_keywords(&item.description));
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_core::item::ItemType;

    #[test]
    fn test_short_tokens_and_stop_words_are_dropped() {
        let kw = extract_keywords("A UI UX API for the web");
        assert!(kw.contains("web"));
        for excluded in ["ui", "ux", "api", "for", "the", "a"] {
            assert!(!kw.contains(excluded), "{} should be excluded", excluded);
        }
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("   \n\t ").is_empty());
    }

    #[test]
    fn test_lowercases_and_splits_on_non_alpha() {
        let kw = extract_keywords("OAuth2-based Login/Logout flow");
        assert_eq!(
            kw.into_iter().collect::<Vec<_>>(),
            vec!["flow", "login", "logout", "oauth"]
        );
    }

    #[test]
    fn test_roadmap_vocabulary_is_filtered() {
        let kw = extract_keywords("Implement and configure the invoice story task");
        assert_eq!(kw.into_iter().collect::<Vec<_>>(), vec!["invoice"]);
    }

    #[test]
    fn test_stop_words_are_lowercase_and_unique() {
        let unique: HashSet<&str> = STOP_WORDS.iter().copied().collect();
        assert_eq!(unique.len(), STOP_WORDS.len());
        assert!(STOP_WORDS.iter().all(|w| w.chars().all(|c| c.is_ascii_lowercase())));
    }

    #[test]
    fn test_item_keywords_combines_name_and_description() {
        let item = Item::new("1.1", "Invoice export", ItemType::Story)
            .with_description("Render PDF documents");
        let kw = item_keywords(&item);
        for expected in ["invoice", "export", "render", "pdf", "documents"] {
            assert!(kw.contains(expected));
        }
    }
}
