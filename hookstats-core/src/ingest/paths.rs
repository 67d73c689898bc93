//! Path-like token extraction and frequency ranking.
//!
//! A token is path-like when, after splitting on whitespace and common
//! delimiters, it contains a `/` or `\`, is longer than one character, is
//! not made only of separators and dots, and is not a URL.

use std::collections::HashMap;

const DELIMITERS: &[char] = &[
    ',', ';', '(', ')', '[', ']', '{', '}', '<', '>', '"', '\'', '`', '=', '|',
];

/// Extract path-like tokens from free text, in order of appearance.
pub fn extract_paths(text: &str) -> Vec<&str> {
    text.split(|c: char| c.is_whitespace() || DELIMITERS.contains(&c))
        .map(|token| token.trim_end_matches(['.', ':']))
        .filter(|token| is_path_like(token))
        .collect()
}

fn is_path_like(token: &str) -> bool {
    token.len() > 1
        && token.contains(['/', '\\'])
        && !token.contains("://")
        && token.chars().any(|c| !matches!(c, '/' | '\\' | '.'))
}

/// Counts path occurrences and remembers the order paths were first seen.
#[derive(Debug, Default)]
pub struct PathCounter {
    counts: HashMap<String, (u64, usize)>,
}

impl PathCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &str) {
        let next_index = self.counts.len();
        match self.counts.get_mut(path) {
            Some((count, _)) => *count += 1,
            None => {
                self.counts.insert(path.to_string(), (1, next_index));
            }
        }
    }

    /// The `k` most frequent paths; ties go to the path seen first.
    pub fn top(&self, k: usize) -> Vec<String> {
        let mut ranked: Vec<(&String, &(u64, usize))> = self.counts.iter().collect();
        ranked.sort_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then_with(|| fa.cmp(fb)));
        ranked
            .into_iter()
            .take(k)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_paths_from_commands() {
        let tokens = extract_paths("cat src/main.rs | grep fn > /tmp/out.txt");
        assert_eq!(tokens, vec!["src/main.rs", "/tmp/out.txt"]);
    }

    #[test]
    fn test_strips_quotes_and_trailing_punctuation() {
        let tokens = extract_paths(r#"{"file_path":"/repo/README.md"} see docs/guide.md."#);
        assert_eq!(tokens, vec!["/repo/README.md", "docs/guide.md"]);
    }

    #[test]
    fn test_ignores_urls_and_bare_separators() {
        let tokens = extract_paths("curl https://example.com/x / // ./ and/or C:\\work\\a.txt");
        assert_eq!(tokens, vec!["and/or", "C:\\work\\a.txt"]);
    }

    #[test]
    fn test_top_orders_by_count_then_first_seen() {
        let mut counter = PathCounter::new();
        for path in ["b/x", "a/y", "c/z", "a/y", "c/z", "d/w"] {
            counter.record(path);
        }
        assert_eq!(counter.top(3), vec!["a/y", "c/z", "b/x"]);
        assert_eq!(counter.top(10).len(), 4);
        assert!(counter.top(0).is_empty());
    }
}
