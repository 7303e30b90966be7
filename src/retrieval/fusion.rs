//! Score fusion for combining vector and keyword candidate sets

use ahash::AHashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be positive")]
    InvalidWeights,
}

/// Configuration for score fusion
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Weight for normalized vector-similarity scores
    pub vector_weight: f32,

    /// Weight for normalized keyword scores
    pub keyword_weight: f32,
}

impl FusionConfig {
    pub fn new(vector_weight: f32, keyword_weight: f32) -> Result<Self, FusionError> {
        if vector_weight <= 0.0 || keyword_weight <= 0.0 {
            return Err(FusionError::InvalidWeights);
        }

        Ok(Self {
            vector_weight,
            keyword_weight,
        })
    }
}

/// Combine two ranked candidate sets into one weighted score per chunk
///
/// Each set is normalized by its best score, then a chunk's contributions
/// are summed as `vector_weight * v + keyword_weight * k`. A chunk present
/// in both sets appears exactly once in the output.
///
/// # Arguments
/// * `vector_results` - (chunk index, cosine score) pairs, best first
/// * `keyword_results` - (chunk index, keyword score) pairs, best first
///
/// # Returns
/// Fused (chunk index, combined score) pairs, sorted by score descending
pub fn fuse_scores(
    vector_results: &[(usize, f32)],
    keyword_results: &[(usize, f32)],
    config: &FusionConfig,
) -> Vec<(usize, f32)> {
    let mut combined: AHashMap<usize, f32> = AHashMap::new();

    // Candidates stay present even when their normalized contribution
    // clamps to zero (negative cosine scores).
    let max_vector = max_score(vector_results);
    for (idx, score) in vector_results {
        *combined.entry(*idx).or_insert(0.0) +=
            config.vector_weight * normalize(*score, max_vector);
    }

    let max_keyword = max_score(keyword_results);
    for (idx, score) in keyword_results {
        *combined.entry(*idx).or_insert(0.0) +=
            config.keyword_weight * normalize(*score, max_keyword);
    }

    let mut results: Vec<(usize, f32)> = combined.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    results
}

fn max_score(results: &[(usize, f32)]) -> f32 {
    results
        .iter()
        .map(|(_, s)| *s)
        .fold(f32::NEG_INFINITY, f32::max)
}

fn normalize(score: f32, max: f32) -> f32 {
    if max > 0.0 {
        (score / max).max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_weights() {
        assert!(FusionConfig::new(0.0, 0.3).is_err());
        assert!(FusionConfig::new(0.7, -1.0).is_err());
        assert!(FusionConfig::new(0.7, 0.3).is_ok());
    }

    #[test]
    fn chunk_in_both_sets_appears_once() {
        let config = FusionConfig::new(0.7, 0.3).unwrap();
        let vector = vec![(1, 0.9), (2, 0.8)];
        let keyword = vec![(2, 5.0), (3, 2.0)];

        let fused = fuse_scores(&vector, &keyword, &config);

        let twos = fused.iter().filter(|(idx, _)| *idx == 2).count();
        assert_eq!(twos, 1);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn chunk_in_both_sets_outranks_single_set_chunks() {
        let config = FusionConfig::new(0.5, 0.5).unwrap();
        let vector = vec![(1, 0.9), (2, 0.85)];
        let keyword = vec![(2, 4.0), (3, 3.0)];

        let fused = fuse_scores(&vector, &keyword, &config);
        assert_eq!(fused[0].0, 2);
    }

    #[test]
    fn weights_bias_the_ranking() {
        let vector = vec![(1, 1.0)];
        let keyword = vec![(2, 1.0)];

        let vector_heavy = FusionConfig::new(0.9, 0.1).unwrap();
        let fused = fuse_scores(&vector, &keyword, &vector_heavy);
        assert_eq!(fused[0].0, 1);

        let keyword_heavy = FusionConfig::new(0.1, 0.9).unwrap();
        let fused = fuse_scores(&vector, &keyword, &keyword_heavy);
        assert_eq!(fused[0].0, 2);
    }

    #[test]
    fn empty_keyword_set_degrades_to_vector_ranking() {
        let config = FusionConfig::new(0.7, 0.3).unwrap();
        let vector = vec![(1, 0.9), (2, 0.5)];

        let fused = fuse_scores(&vector, &[], &config);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].0, 1);
    }

    #[test]
    fn negative_cosine_scores_do_not_contribute() {
        let config = FusionConfig::new(0.7, 0.3).unwrap();
        let vector = vec![(1, 0.5), (2, -0.4)];

        let fused = fuse_scores(&vector, &[], &config);
        assert_eq!(fused[0].0, 1);
        let chunk2 = fused.iter().find(|(idx, _)| *idx == 2).unwrap();
        assert_eq!(chunk2.1, 0.0);
    }
}
