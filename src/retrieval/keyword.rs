//! Keyword extraction and term-overlap scoring

/// Common English words excluded from keyword extraction. Count words like
/// "total" and "number" are deliberately kept because fact keys use them.
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "been", "being", "but", "by", "can",
    "could", "did", "do", "does", "for", "from", "had", "has", "have", "how", "i", "if", "in",
    "into", "is", "it", "its", "many", "me", "my", "no", "not", "of", "on", "or", "our", "should",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "to", "was", "we", "were", "what", "which", "who", "whom", "will", "with", "would", "you",
    "your",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Extract distinct, stopword-filtered keywords from a query, preserving
/// first-occurrence order
pub fn query_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if !keywords.iter().any(|k| k == &token) {
            keywords.push(token);
        }
    }
    keywords
}

/// Score a text by keyword occurrences
///
/// The raw score is the total number of keyword occurrences; fusion
/// normalizes it against the best-scoring chunk.
pub fn score_text(keywords: &[String], text: &str) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let mut occurrences = 0usize;
    for token in tokenize(text) {
        if keywords.iter().any(|k| k == &token) {
            occurrences += 1;
        }
    }
    occurrences as f32
}

/// Fraction of the query keywords present in the text
pub(crate) fn keyword_coverage(keywords: &[String], text: &str) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }

    let tokens: Vec<String> = tokenize(text).collect();
    let matched = keywords
        .iter()
        .filter(|k| tokens.iter().any(|t| t == *k))
        .count();
    matched as f32 / keywords.len() as f32
}

/// Occurrences of keywords per token of text
pub(crate) fn keyword_density(keywords: &[String], text: &str) -> f32 {
    let tokens: Vec<String> = tokenize(text).collect();
    if tokens.is_empty() {
        return 0.0;
    }

    let occurrences = tokens.iter().filter(|t| keywords.contains(t)).count();
    occurrences as f32 / (tokens.len() as f32 + 1.0)
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !is_stopword(t))
}
