//! Scoring functions for one benchmark query.
//!
//! NDCG follows scikit-learn's `ndcg_score` for a single sample: items are
//! ranked by `y_score` (ties share the average gain of their group), gains
//! are linear in `y_true`, and position `i` (0-based) is discounted by
//! `1 / log2(i + 2)` up to the cutoff `k`.

use crate::document::RerankResult;

/// Arithmetic mean, `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the first `min(k, len)` values.
pub fn top_k_mean(values: &[f64], k: usize) -> f64 {
    mean(&values[..k.min(values.len())])
}

/// Discounted cumulative gain at `k`, tie-averaged over equal scores.
pub fn dcg_at_k(y_true: &[f64], y_score: &[f64], k: usize) -> f64 {
    let n = y_true.len().min(y_score.len());
    let discount = |pos: usize| {
        if pos < k {
            1.0 / (pos as f64 + 2.0).log2()
        } else {
            0.0
        }
    };

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        y_score[b]
            .partial_cmp(&y_score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut dcg = 0.0;
    let mut pos = 0;
    while pos < n.min(k) {
        let group_score = y_score[order[pos]];
        let group_len = order[pos..]
            .iter()
            .take_while(|&&i| y_score[i] == group_score)
            .count()
            .max(1);

        let gain: f64 = order[pos..pos + group_len]
            .iter()
            .map(|&i| y_true[i])
            .sum::<f64>()
            / group_len as f64;
        let discount_sum: f64 = (pos..pos + group_len).map(discount).sum();

        dcg += gain * discount_sum;
        pos += group_len;
    }
    dcg
}

/// Normalized DCG at `k`, in `[0, 1]`.
///
/// When the ideal DCG is zero there is nothing to get wrong, so the
/// ranking counts as perfect and the result is 1.0.
pub fn ndcg_at_k(y_true: &[f64], y_score: &[f64], k: usize) -> f64 {
    let ideal = dcg_at_k(y_true, y_true, k);
    if ideal == 0.0 {
        return 1.0;
    }
    dcg_at_k(y_true, y_score, k) / ideal
}

/// Agreement between the candidate order and the reranked order.
///
/// The reranked source indices serve as relevance labels and the reranked
/// positions `0..n` as scores, then NDCG@k compares them. The identity
/// permutation scores 1.0; the more the reranker reshuffles the candidates,
/// the lower the score.
pub fn rerank_agreement(rerank: &RerankResult, k: usize) -> f64 {
    let new_ranks: Vec<f64> = rerank.hits.iter().map(|h| h.index as f64).collect();
    let original_ranks: Vec<f64> = (0..new_ranks.len()).map(|i| i as f64).collect();
    ndcg_at_k(&new_ranks, &original_ranks, k)
}
