//! Embedding vector extraction.
//!
//! Providers return embeddings in many shapes. Each adapter either extracts
//! the first vector or declines; the first adapter that extracts wins.

use serde_json::Value;

use super::ValidationResult;

/// Shortest vector accepted as a real embedding.
pub const MIN_DIMENSION: usize = 10;

/// Largest magnitude accepted for a component.
pub const MAX_MAGNITUDE: f64 = 100.0;

type Adapter = fn(&Value) -> Option<&[Value]>;

const ADAPTERS: &[(&str, Adapter)] = &[
    ("data[][]", data_nested),
    ("data[].embedding", data_objects),
    ("shape+data", shaped_flat),
    ("embeddings", embeddings_field),
    ("embedding", embedding_field),
    ("vector", vector_field),
    ("values", values_field),
    ("bare array", nested_or_flat),
];

const WRAPPERS: [&str; 2] = ["result", "output"];

/// The first embedding vector in `value` and the shape it was found in.
pub fn extract_embedding(value: &Value) -> Option<(&'static str, &[Value])> {
    extract_with_depth(value, 0)
}

fn extract_with_depth(value: &Value, depth: usize) -> Option<(&'static str, &[Value])> {
    if let Some(found) = ADAPTERS
        .iter()
        .find_map(|(shape, adapter)| adapter(value).map(|v| (*shape, v)))
    {
        return Some(found);
    }
    if depth >= 2 {
        return None;
    }
    WRAPPERS
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(|inner| extract_with_depth(inner, depth + 1))
}

pub fn validate_embeddings(value: &Value) -> ValidationResult {
    let Some((shape, vector)) = extract_embedding(value) else {
        return ValidationResult::fail("No embedding vector found in response");
    };

    if vector.len() < MIN_DIMENSION {
        return ValidationResult::fail(format!(
            "Embedding dimension {} is below the minimum of {MIN_DIMENSION}",
            vector.len()
        ));
    }
    if !vector[0].is_number() {
        return ValidationResult::fail(format!(
            "Embedding values are not numeric (first element: {})",
            vector[0]
        ));
    }

    let mut components = Vec::with_capacity(vector.len());
    for (idx, v) in vector.iter().enumerate() {
        match v.as_f64() {
            Some(x) if x.abs() <= MAX_MAGNITUDE => components.push(x),
            Some(x) => {
                return ValidationResult::fail(format!(
                    "Embedding component {idx} is out of range: {x}"
                ));
            }
            None => {
                return ValidationResult::fail(format!(
                    "Embedding component {idx} is not numeric: {v}"
                ));
            }
        }
    }

    ValidationResult::pass(format!("dimension {} ({shape})", components.len()))
}

fn data_nested(value: &Value) -> Option<&[Value]> {
    value.get("data")?.get(0)?.as_array().map(Vec::as_slice)
}

fn data_objects(value: &Value) -> Option<&[Value]> {
    value
        .get("data")?
        .get(0)?
        .get("embedding")?
        .as_array()
        .map(Vec::as_slice)
}

/// `{shape: [n, d], data: [n * d numbers]}`, returning the first row.
fn shaped_flat(value: &Value) -> Option<&[Value]> {
    let shape = value.get("shape")?.as_array()?;
    let data = value.get("data")?.as_array()?;
    if !data.first()?.is_number() {
        return None;
    }
    let dimension = shape
        .last()
        .and_then(Value::as_u64)
        .map(|d| d as usize)
        .filter(|d| *d > 0 && *d <= data.len())
        .unwrap_or(data.len());
    Some(&data[..dimension])
}

fn embeddings_field(value: &Value) -> Option<&[Value]> {
    nested_or_flat(value.get("embeddings")?)
}

fn embedding_field(value: &Value) -> Option<&[Value]> {
    nested_or_flat(value.get("embedding")?)
}

fn vector_field(value: &Value) -> Option<&[Value]> {
    nested_or_flat(value.get("vector")?)
}

fn values_field(value: &Value) -> Option<&[Value]> {
    nested_or_flat(value.get("values")?)
}

/// `[[...]]` yields the first row; `[...]` of scalars yields itself.
fn nested_or_flat(value: &Value) -> Option<&[Value]> {
    let items = value.as_array()?;
    match items.first()? {
        Value::Array(row) => Some(row.as_slice()),
        Value::Object(_) => None,
        _ => Some(items.as_slice()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vector(dim: usize) -> Vec<f64> {
        (0..dim).map(|i| (i as f64 / dim as f64) - 0.5).collect()
    }

    #[test]
    fn test_same_dimension_across_shapes() {
        let v = vector(384);
        let shapes = [
            json!({"data": [v.clone()]}),
            json!({"data": [{"embedding": v.clone(), "index": 0}]}),
            json!({"shape": [1, 384], "data": v.clone()}),
            json!({"embeddings": [v.clone()]}),
            json!({"embedding": v.clone()}),
            json!({"vector": v.clone()}),
            json!({"values": v.clone()}),
            json!([v.clone()]),
            json!(v.clone()),
            json!({"result": {"shape": [1, 384], "data": [v.clone()]}}),
            json!({"output": {"embedding": v.clone()}}),
        ];

        for shape in &shapes {
            let (_, extracted) = extract_embedding(shape).unwrap_or_else(|| panic!("{shape}"));
            assert_eq!(extracted.len(), 384, "{shape}");

            let result = validate_embeddings(shape);
            assert!(result.valid, "{shape}: {:?}", result.error);
            assert!(result.details.unwrap().contains("384"));
        }
    }

    #[test]
    fn test_shape_with_batch_takes_first_row() {
        let flat: Vec<f64> = vector(20).into_iter().chain(vector(20)).collect();
        let body = json!({"shape": [2, 20], "data": flat});
        assert_eq!(extract_embedding(&body).unwrap().1.len(), 20);
    }

    #[test]
    fn test_short_vector_is_rejected() {
        let result = validate_embeddings(&json!({"data": [vector(8)]}));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("dimension 8"));
    }

    #[test]
    fn test_string_values_are_rejected() {
        let strings: Vec<String> = (0..384).map(|i| format!("v{i}")).collect();
        let result = validate_embeddings(&json!({"data": [strings]}));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not numeric"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut v = vector(32);
        v[5] = 250.0;
        let result = validate_embeddings(&json!({"embedding": v}));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("out of range"));
    }

    #[test]
    fn test_no_embedding_found() {
        let result = validate_embeddings(&json!({"message": "ok"}));
        assert!(!result.valid);
        assert!(extract_embedding(&json!({"data": [{"object": "list"}]})).is_none());
    }
}
