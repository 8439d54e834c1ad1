//! Token-based multilingual search: English stopwording and CJK bigramming.

use crate::entry::Entry;

/// Hard-coded for now; kept as a configuration-surface extension point
/// rather than something this reference implementation needs to
/// parameterize yet.
const MIN_TOKEN_LEN: usize = 2;
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "in", "on", "to", "for", "with", "is", "are", "am", "be",
];

fn is_han(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF)
}

fn dedupe_preserving_order(tokens: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// Tokenizes a search query: CJK bigrams when any rune is in the Han block,
/// otherwise whitespace-split English tokens with stopwording.
pub fn build_search_tokens(query: &str) -> Vec<String> {
    let lower = query.trim().to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }

    if lower.chars().any(is_han) {
        let runes: Vec<char> = lower.chars().filter(|c| c.is_alphanumeric()).collect();
        let tokens = if runes.len() <= 1 {
            runes.iter().map(|c| c.to_string()).collect()
        } else {
            runes.windows(2).map(|pair| pair.iter().collect::<String>()).collect()
        };
        return dedupe_preserving_order(tokens);
    }

    let normalized: String = lower
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let tokens: Vec<String> = normalized
        .split_whitespace()
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect();
    dedupe_preserving_order(tokens)
}

/// Returns true iff any search token substring-matches the lowercased memory
/// content or any lowercased topic; falls back to a raw substring match when
/// tokenization yields nothing (pure punctuation / pure stopwords), and
/// rejects a blank query outright.
pub fn match_memory_entry(entry: &Entry, query: &str) -> bool {
    let raw = query.trim();
    if raw.is_empty() {
        return false;
    }

    let tokens = build_search_tokens(query);
    if tokens.is_empty() {
        return contains_match(entry, &raw.to_lowercase());
    }
    tokens.iter().any(|token| contains_match(entry, token))
}

fn contains_match(entry: &Entry, needle: &str) -> bool {
    entry.memory.content.to_lowercase().contains(needle)
        || entry.memory.topics.iter().any(|topic| topic.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MemoryBody;
    use chrono::Utc;

    fn entry(content: &str, topics: &[&str]) -> Entry {
        Entry {
            id: "id".to_string(),
            app_name: "app".to_string(),
            user_id: "user".to_string(),
            memory: MemoryBody {
                content: content.to_string(),
                topics: topics.iter().map(|t| t.to_string()).collect(),
                last_updated: Utc::now(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn english_tokenization_drops_stopwords_and_short_tokens() {
        assert_eq!(
            build_search_tokens("the quick brown fox"),
            vec!["quick".to_string(), "brown".to_string(), "fox".to_string()]
        );
    }

    #[test]
    fn cjk_bigrams() {
        assert_eq!(
            build_search_tokens("中文测试"),
            vec!["中文".to_string(), "文测".to_string(), "测试".to_string()]
        );
    }

    #[test]
    fn single_han_rune_is_single_token() {
        assert_eq!(build_search_tokens("中"), vec!["中".to_string()]);
    }

    #[test]
    fn pure_punctuation_yields_no_tokens() {
        assert!(build_search_tokens("!@#$%").is_empty());
    }

    #[test]
    fn repeated_han_rune_dedupes() {
        assert_eq!(build_search_tokens("中中中中"), vec!["中中".to_string()]);
    }

    #[test]
    fn match_entry_against_various_queries() {
        let e = entry("Hello world, this is a test memory", &["test", "example"]);
        for q in ["hello world", "test memory", "example", "HELLO WORLD"] {
            assert!(match_memory_entry(&e, q), "expected match for {q:?}");
        }
        for q in ["nonexistent", "", "   ", "the and or", "!@#$%"] {
            assert!(!match_memory_entry(&e, q), "expected no match for {q:?}");
        }
    }
}
