//! Tokenisation and keyword derivation for job descriptions and resumes.

use std::collections::HashMap;

pub const DEFAULT_KEYWORD_LIMIT: usize = 20;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "all", "also", "an", "and", "any", "are", "as", "at",
    "be", "been", "being", "both", "but", "by", "can", "could", "do", "does", "each", "etc", "for",
    "from", "good", "has", "have", "having", "help", "how", "if", "in", "into", "is", "it", "its",
    "job", "join", "just", "least", "like", "looking", "make", "may", "more", "most", "must", "new",
    "no", "not", "of", "on", "one", "or", "other", "our", "out", "over", "own", "per", "plus",
    "role", "should", "so", "some", "strong", "such", "team", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "under", "up",
    "us", "using", "very", "want", "we", "well", "were", "what", "when", "where", "which", "while",
    "who", "will", "with", "within", "work", "working", "would", "year", "years", "yrs", "you",
    "your",
];

/// Lower-cases and splits text into tokens.
///
/// `+`, `#` and `.` are kept inside tokens so `c++`, `c#` and `node.js`
/// survive; leading and trailing dots are stripped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() || matches!(ch, '+' | '#' | '.') {
            current.extend(ch.to_lowercase());
        } else {
            push_token(&mut tokens, &mut current);
        }
    }
    push_token(&mut tokens, &mut current);

    tokens
}

fn push_token(tokens: &mut Vec<String>, current: &mut String) {
    let token = current.trim_matches('.');
    if !token.is_empty() {
        tokens.push(token.to_string());
    }
    current.clear();
}

fn is_candidate_keyword(token: &str) -> bool {
    token.chars().count() >= 2
        && !token.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '+'))
        && !STOP_WORDS.contains(&token)
}

/// The `limit` most frequent meaningful tokens of `text`, ties broken by first appearance.
pub fn derive_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();

    for (position, token) in tokenize(text).into_iter().enumerate() {
        if !is_candidate_keyword(&token) {
            continue;
        }
        stats
            .entry(token)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(String, usize, usize)> = stats
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(token, _, _)| token)
        .collect()
}

/// Normalises a skill list: trimmed, lower-cased, de-duplicated, order preserved.
pub fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Largest "N years" / "N+ years" / "N yrs" mention in the text.
pub fn max_years_mentioned(tokens: &[String]) -> Option<u32> {
    tokens
        .windows(2)
        .filter(|pair| matches!(pair[1].as_str(), "years" | "year" | "yrs" | "yr"))
        .filter_map(|pair| pair[0].trim_end_matches('+').parse::<u32>().ok())
        .filter(|years| *years <= 60)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keeps_language_names() {
        let tokens = tokenize("Experience with C++, C#, Node.js and Rust.");
        assert_eq!(
            tokens,
            vec!["experience", "with", "c++", "c#", "node.js", "and", "rust"]
        );
    }

    #[test]
    fn test_derive_keywords_ranks_by_frequency_then_position() {
        let text = "Kafka pipelines. Rust services, Rust tooling, Kafka ops, Postgres.";
        let keywords = derive_keywords(text, 3);
        assert_eq!(keywords, vec!["kafka", "rust", "pipelines"]);
    }

    #[test]
    fn test_derive_keywords_drops_stop_words_and_numbers() {
        let keywords = derive_keywords("We want you to have 5 years of experience in go", 10);
        assert!(!keywords.contains(&"we".to_string()));
        assert!(!keywords.contains(&"5".to_string()));
        assert!(keywords.contains(&"experience".to_string()));
        assert!(keywords.contains(&"go".to_string()));
    }

    #[test]
    fn test_normalize_skills() {
        let skills = vec![
            " Rust ".to_string(),
            "rust".to_string(),
            "".to_string(),
            "PostgreSQL".to_string(),
        ];
        assert_eq!(normalize_skills(&skills), vec!["rust", "postgresql"]);
    }

    #[test]
    fn test_years_mentioned() {
        let tokens = tokenize("3 years at Acme, then 5+ years leading a team. Born 1990.");
        assert_eq!(max_years_mentioned(&tokens), Some(5));
        assert_eq!(max_years_mentioned(&tokenize("no numbers here")), None);
    }
}
