//! Curated smoke tests for platform modules.
//!
//! Each fixture exercises one model the way a platform feature uses it, with
//! a validator stricter than the generic capability check where the feature
//! depends on it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

use super::{Runner, TestResult};
use crate::{
    catalog::{Capability, CatalogExtraction},
    client::{ApiRequest, Endpoint, MultipartBody},
    synth::{DeferredInput, Payload, RERANK_EXPECTED_TOP, synthesize_embedding_batch},
    validate::{
        ValidationResult, unwrap_envelope, validate, validate_chat, validate_embeddings,
        validate_reranker,
    },
};

pub const SEARCH_BATCH_SIZE: usize = 8;

static SELECT_STATEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bselect\b.+\bfrom\b").unwrap());

/// How a fixture's request body is produced.
#[derive(Debug, Clone)]
pub enum PlatformInput {
    Json(fn() -> Value),
    /// Deferred audio sent as JSON to `/run`.
    Audio(DeferredInput),
    /// The cached speech clip as a multipart file upload.
    ClipUpload,
}

/// A static platform test.
#[derive(Clone)]
pub struct PlatformTest {
    pub name: &'static str,
    pub module: &'static str,
    pub model: &'static str,
    pub endpoint: Endpoint,
    pub input: PlatformInput,
    pub validator: fn(&Value) -> ValidationResult,
}

/// Every platform fixture, grouped by module.
pub fn platform_tests() -> Vec<PlatformTest> {
    vec![
        PlatformTest {
            name: "batch-embeddings",
            module: "search",
            model: "bge-base-en-v1.5",
            endpoint: Endpoint::Run,
            input: PlatformInput::Json(search_batch_input),
            validator: validate_search_batch,
        },
        PlatformTest {
            name: "rerank-chunks",
            module: "search",
            model: "bge-reranker-base",
            endpoint: Endpoint::Run,
            input: PlatformInput::Json(search_rerank_input),
            validator: validate_search_rerank,
        },
        PlatformTest {
            name: "memory-embedding",
            module: "memory",
            model: "bge-base-en-v1.5",
            endpoint: Endpoint::Run,
            input: PlatformInput::Json(memory_embedding_input),
            validator: validate_embeddings_response,
        },
        PlatformTest {
            name: "conversation-summary",
            module: "memory",
            model: "bart-large-cnn",
            endpoint: Endpoint::Run,
            input: PlatformInput::Json(memory_summary_input),
            validator: validate_summary_response,
        },
        PlatformTest {
            name: "text-to-sql",
            module: "sql",
            model: "llama-3.1-8b-instruct",
            endpoint: Endpoint::Chat,
            input: PlatformInput::Json(sql_input),
            validator: validate_sql,
        },
        PlatformTest {
            name: "clip-upload",
            module: "transcription",
            model: "whisper",
            endpoint: Endpoint::Transcription,
            input: PlatformInput::ClipUpload,
            validator: validate_transcription_response,
        },
        PlatformTest {
            name: "pcm-tone",
            module: "transcription",
            model: "deepgram-nova-3",
            endpoint: Endpoint::Run,
            input: PlatformInput::Audio(DeferredInput::default_tone()),
            validator: validate_transcription_response,
        },
    ]
}

fn search_batch_input() -> Value {
    synthesize_embedding_batch(SEARCH_BATCH_SIZE)
}

fn search_rerank_input() -> Value {
    json!({
        "query": "Which plan includes priority support?",
        "contexts": [
            {"text": "The Business plan includes priority support with a four hour response time."},
            {"text": "All plans can be cancelled at any time from the billing page."},
            {"text": "The Free plan is limited to three projects."},
            {"text": "Invoices are issued on the first day of each month."},
        ],
    })
}

fn memory_embedding_input() -> Value {
    json!({"text": "User prefers concise answers and works in the Europe/Berlin timezone."})
}

fn memory_summary_input() -> Value {
    json!({
        "input_text": "User: I need to move my dentist appointment from Monday to Thursday.\n\
            Assistant: Thursday at 10am or 3pm are available.\n\
            User: 3pm works, and please remind me the day before.\n\
            Assistant: Done. Your appointment is Thursday at 3pm with a reminder on Wednesday.",
        "max_length": 60,
    })
}

fn sql_input() -> Value {
    json!({
        "messages": [
            {
                "role": "system",
                "content": "You translate questions into SQL for this schema: \
                    CREATE TABLE orders (id INTEGER, customer TEXT, total REAL, created_at DATE). \
                    Reply with a single SQL statement only."
            },
            {"role": "user", "content": "What is the total revenue per customer?"}
        ],
        "max_tokens": 200,
    })
}

fn validate_search_batch(body: &Value) -> ValidationResult {
    let result = validate(&Capability::Embeddings, body);
    if !result.valid {
        return result;
    }
    let inner = unwrap_envelope(body).unwrap_or(body);
    match embedding_rows(inner) {
        Some(rows) if rows == SEARCH_BATCH_SIZE => result,
        Some(rows) => ValidationResult::fail(format!(
            "Expected {SEARCH_BATCH_SIZE} embeddings for the batch, got {rows}"
        )),
        None => ValidationResult::fail("Could not count embeddings in batch response"),
    }
}

/// Number of vectors in a batch response.
fn embedding_rows(body: &Value) -> Option<usize> {
    if let Some(rows) = body
        .get("shape")
        .and_then(|s| s.get(0))
        .and_then(Value::as_u64)
    {
        return Some(rows as usize);
    }
    ["data", "embeddings"]
        .iter()
        .filter_map(|k| body.get(k).and_then(Value::as_array))
        .find(|items| items.first().is_some_and(|f| f.is_array() || f.is_object()))
        .map(Vec::len)
}

fn validate_search_rerank(body: &Value) -> ValidationResult {
    validate_reranker(unwrap_envelope(body).unwrap_or(body), RERANK_EXPECTED_TOP)
}

fn validate_embeddings_response(body: &Value) -> ValidationResult {
    validate(&Capability::Embeddings, body)
}

fn validate_summary_response(body: &Value) -> ValidationResult {
    validate(&Capability::Summarization, body)
}

fn validate_transcription_response(body: &Value) -> ValidationResult {
    validate(&Capability::Audio, body)
}

fn validate_sql(body: &Value) -> ValidationResult {
    let inner = unwrap_envelope(body).unwrap_or(body);
    let chat = validate_chat(inner);
    if !chat.valid {
        return chat;
    }
    let content = inner
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if SELECT_STATEMENT.is_match(content) {
        chat
    } else {
        ValidationResult::fail("Response does not contain a SELECT statement")
    }
}

impl Runner<'_> {
    /// Run platform fixtures, optionally restricted to one model.
    pub async fn run_platform_tests(
        &self,
        catalog: &CatalogExtraction,
        model_filter: Option<&str>,
    ) -> Vec<TestResult> {
        let fixtures: Vec<PlatformTest> = platform_tests()
            .into_iter()
            .filter(|t| model_filter.is_none_or(|m| t.model == m))
            .collect();

        let mut results = Vec::new();
        let mut current_module = "";
        for fixture in &fixtures {
            if fixture.module != current_module {
                current_module = fixture.module;
                if self.trace {
                    let count = fixtures.iter().filter(|t| t.module == current_module).count();
                    crate::report::print_group_header(current_module, count);
                }
            }
            let result = self.run_fixture(fixture, catalog).await.with_test(fixture.name);
            self.record(result, &mut results);
        }
        results
    }

    async fn run_fixture(&self, fixture: &PlatformTest, catalog: &CatalogExtraction) -> TestResult {
        let Some(entry) = catalog.get(fixture.model) else {
            return TestResult::skipped(
                fixture.model,
                fixture.module,
                format!("model '{}' is not in the catalog", fixture.model),
            );
        };

        let request = match &fixture.input {
            PlatformInput::Json(build) => ApiRequest::json(fixture.endpoint, build()),
            PlatformInput::Audio(input) => match self.audio.resolve(input).await {
                Ok(Payload::Json(body)) => ApiRequest::json(fixture.endpoint, body),
                Ok(_) => {
                    return TestResult::failed(&entry.name, fixture.module, None, "Unexpected audio payload");
                }
                Err(e) => return TestResult::failed(&entry.name, fixture.module, None, e.to_string()),
            },
            PlatformInput::ClipUpload => match self.audio.clip().await {
                Ok(clip) => ApiRequest::multipart(
                    fixture.endpoint,
                    MultipartBody::new().file("file", clip_file_name(self.audio.clip_url()), "audio/flac", clip),
                ),
                Err(e) => return TestResult::failed(&entry.name, fixture.module, None, e.to_string()),
            },
        };

        let media = entry
            .capability
            .first()
            .cloned()
            .unwrap_or(Capability::Chat);
        self.execute(&entry.name, fixture.module, &media, &request, fixture.validator)
            .await
    }
}

fn clip_file_name(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("clip.flac")
        .to_string()
}
