//! Scored outputs: reranker results and classification labels.

use serde_json::Value;

use super::ValidationResult;

/// One reranked document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedDocument {
    pub index: u64,
    pub score: f64,
}

/// Read reranker output: `response: [{id, score}]` or
/// `results|data: [{index, relevance_score}]`.
pub fn extract_rankings(value: &Value) -> Option<Vec<RankedDocument>> {
    if let Some(items) = value.get("response").and_then(Value::as_array) {
        return collect_rankings(items, "id", "score");
    }
    ["results", "data"]
        .iter()
        .filter_map(|key| value.get(key).and_then(Value::as_array))
        .find_map(|items| collect_rankings(items, "index", "relevance_score"))
}

fn collect_rankings(items: &[Value], index_key: &str, score_key: &str) -> Option<Vec<RankedDocument>> {
    items
        .iter()
        .map(|item| {
            Some(RankedDocument {
                index: item.get(index_key)?.as_u64()?,
                score: item
                    .get(score_key)
                    .or_else(|| item.get("score"))?
                    .as_f64()?,
            })
        })
        .collect()
}

pub fn validate_reranker(value: &Value, expected_top: usize) -> ValidationResult {
    let Some(rankings) = extract_rankings(value) else {
        return ValidationResult::fail("No ranked results found in response");
    };
    let Some(top) = rankings
        .iter()
        .copied()
        .max_by(|a, b| a.score.total_cmp(&b.score))
    else {
        return ValidationResult::fail("Reranker returned no results");
    };

    let details = if top.index == expected_top as u64 {
        format!(
            "{} results, top is document {} as expected (score {:.3})",
            rankings.len(),
            top.index,
            top.score
        )
    } else {
        format!(
            "{} results, top is document {} but expected {expected_top} (score {:.3})",
            rankings.len(),
            top.index,
            top.score
        )
    };
    ValidationResult::pass(details)
}

/// Labels with scores, from a bare list, a nested list, or a single object.
pub fn validate_classification(value: &Value) -> ValidationResult {
    let candidates: Vec<&Value> = match value {
        Value::Array(items) => match items.first() {
            Some(Value::Array(inner)) => inner.iter().collect(),
            _ => items.iter().collect(),
        },
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    if candidates.is_empty() {
        return ValidationResult::fail("No classification labels in response");
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in &candidates {
        let label = candidate.get("label").and_then(Value::as_str).unwrap_or("");
        if label.trim().is_empty() {
            return ValidationResult::fail("Classification entry has no label");
        }
        let Some(score) = candidate.get("score").and_then(Value::as_f64) else {
            return ValidationResult::fail(format!("Label '{label}' has no numeric score"));
        };
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((label, score));
        }
    }

    match best {
        Some((label, score)) => ValidationResult::pass(format!(
            "{} labels, top: {label} ({score:.3})",
            candidates.len()
        )),
        None => ValidationResult::fail("No classification labels in response"),
    }
}
