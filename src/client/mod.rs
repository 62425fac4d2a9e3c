//! HTTP client for live model calls.
//!
//! [`ResilientClient::send`] wraps one logical request in a bounded attempt
//! loop:
//!
//! - `429` waits for the server-supplied delay ([`parse_retry_after`]) or an
//!   exponential backoff, then retries while attempts remain
//! - other non-2xx bodies are checked for a license gate; when the
//!   [`LicensePrompt`] accepts, the agreement is sent once and the original
//!   request retried, otherwise the call fails with
//!   [`ClientError::LicenseDeclined`]
//! - transport failures back off and retry, surfacing
//!   [`ClientError::Transport`] once attempts are exhausted
//!
//! Responses are read exactly once into [`ApiResponse`].

mod error;
mod license;
mod retry;
mod sleep;

use std::{borrow::Cow, sync::Arc, time::Duration};

use bytes::Bytes;
pub use error::ClientError;
pub use license::*;
use reqwest::{
    StatusCode,
    header::{CONTENT_TYPE, RETRY_AFTER},
    multipart::{Form, Part},
};
pub use retry::parse_retry_after;
use serde::Serialize;
use serde_json::{Value, json};
pub use sleep::*;

use crate::{
    catalog::Capability,
    config::{EndpointConfig, RetryConfig},
    observability::redacted_json,
};

/// Target endpoint, resolved against the configured base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// `/chat/completions`
    Chat,
    /// `/run`, with the model named in the body
    Run,
    /// `/audio/transcriptions`, multipart upload
    Transcription,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Chat => "chat/completions",
            Self::Run => "run",
            Self::Transcription => "audio/transcriptions",
        }
    }

    pub fn for_capability(capability: &Capability) -> Self {
        if capability.uses_chat_endpoint() {
            Self::Chat
        } else {
            Self::Run
        }
    }
}

/// A file in a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// A multipart form, kept as data so it can be rebuilt for every attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.files.push(FilePart {
            field: field.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        });
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name) || self.files.iter().any(|f| f.field == name)
    }

    fn to_form(&self) -> Result<Form, reqwest::Error> {
        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)?;
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }

    /// Loggable summary: text fields verbatim, files by size.
    fn describe(&self) -> Value {
        let mut summary = serde_json::Map::new();
        for (name, value) in &self.fields {
            summary.insert(name.clone(), Value::String(value.clone()));
        }
        for file in &self.files {
            summary.insert(
                file.field.clone(),
                json!(format!("<{} bytes {}>", file.bytes.len(), file.mime_type)),
            );
        }
        Value::Object(summary)
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartBody),
}

/// One logical call; its body is re-sent unchanged on every attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub body: RequestBody,

    /// The model takes image input, so a license agreement must carry one.
    pub image_input: bool,
}

impl ApiRequest {
    pub fn json(endpoint: Endpoint, body: Value) -> Self {
        Self {
            endpoint,
            body: RequestBody::Json(body),
            image_input: false,
        }
    }

    pub fn multipart(endpoint: Endpoint, body: MultipartBody) -> Self {
        Self {
            endpoint,
            body: RequestBody::Multipart(body),
            image_input: false,
        }
    }

    pub fn with_image_input(mut self, image_input: bool) -> Self {
        self.image_input = image_input;
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub retry_after: Option<String>,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The body as JSON, if it parses.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Whether the server sent raw media rather than a document.
    pub fn is_binary(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("audio/")
                || ct.starts_with("image/")
                || ct.starts_with("application/octet-stream")
        })
    }
}

/// Client for the endpoint under test.
#[derive(Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    prompt: Arc<dyn LicensePrompt>,
    sleeper: Arc<dyn Sleeper>,
}

impl ResilientClient {
    pub fn new(
        endpoint: &EndpointConfig,
        retry: RetryConfig,
        prompt: Arc<dyn LicensePrompt>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            retry,
            prompt,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Unauthenticated client sharing the connection pool, for fetching docs
    /// pages and fixtures.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    /// Send `request` for `model`, retrying per the retry policy.
    pub async fn send(&self, request: &ApiRequest, model: &str) -> Result<ApiResponse, ClientError> {
        let max_retries = self.retry.max_retries;
        let mut license_handled = false;
        let mut attempt: u32 = 0;

        loop {
            match self.execute(request, model).await {
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= max_retries {
                        tracing::warn!(
                            model = %model,
                            attempts = attempt + 1,
                            "Rate limited, retries exhausted"
                        );
                        return Ok(response);
                    }

                    let hint = parse_retry_after(&response.text(), response.retry_after.as_deref());
                    let (delay, delay_source) = match hint {
                        Some(requested) => {
                            let delay = self.retry.server_delay(requested);
                            if delay < requested {
                                tracing::warn!(
                                    model = %model,
                                    requested_ms = requested.as_millis() as u64,
                                    max_ms = self.retry.max_server_delay_ms,
                                    "Server retry delay exceeds ceiling, clamping"
                                );
                            }
                            (delay, "server")
                        }
                        None => (self.retry.rate_limit_delay(attempt), "backoff"),
                    };
                    tracing::warn!(
                        model = %model,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        delay_source,
                        "Rate limited, will retry after delay"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Ok(response) if !response.is_success() => {
                    if !license_handled && is_license_error(&response.text()) {
                        license_handled = true;
                        self.accept_license(request, model, &response).await?;
                        continue;
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(model = %model, attempts = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_builder() => {
                    return Err(ClientError::InvalidRequest {
                        model: model.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    if attempt >= max_retries {
                        tracing::error!(
                            model = %model,
                            attempts = attempt + 1,
                            error = %e,
                            "Request failed, retries exhausted"
                        );
                        return Err(ClientError::Transport {
                            model: model.to_string(),
                            attempts: attempt + 1,
                            source: e,
                        });
                    }

                    let delay = self.retry.transport_delay(attempt);
                    tracing::warn!(
                        model = %model,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        delay_source = "backoff",
                        error = %e,
                        "Request failed, will retry after delay"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One HTTP exchange, body read in full.
    async fn execute(&self, request: &ApiRequest, model: &str) -> Result<ApiResponse, reqwest::Error> {
        let mut builder = self.http.post(self.url(request.endpoint));
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        builder = match &request.body {
            RequestBody::Json(body) => {
                let body = with_model_field(body, model);
                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!(
                        model = %model,
                        endpoint = request.endpoint.path(),
                        body = %redacted_json(&body),
                        "Sending request"
                    );
                }
                builder.json(&body)
            }
            RequestBody::Multipart(form) => {
                let mut form = form.clone();
                if !form.has_field("model") {
                    form = form.text("model", model);
                }
                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!(
                        model = %model,
                        endpoint = request.endpoint.path(),
                        body = %form.describe(),
                        "Sending multipart request"
                    );
                }
                builder.multipart(form.to_form()?)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers();
        let content_type = header_string(headers, CONTENT_TYPE);
        let retry_after = header_string(headers, RETRY_AFTER);
        let body = response.bytes().await?;

        let response = ApiResponse {
            status,
            content_type,
            retry_after,
            body,
        };
        if tracing::enabled!(tracing::Level::DEBUG) {
            let logged = response
                .json()
                .map(|v| redacted_json(&v))
                .unwrap_or_else(|| format!("<{} bytes>", response.body.len()));
            tracing::debug!(model = %model, status = %status, body = %logged, "Received response");
        }
        Ok(response)
    }

    /// Ask the prompt and, on acceptance, send the agreement request.
    async fn accept_license(
        &self,
        request: &ApiRequest,
        model: &str,
        gate: &ApiResponse,
    ) -> Result<(), ClientError> {
        let license_url = extract_license_url(&gate.text());
        tracing::warn!(
            model = %model,
            status = %gate.status,
            license_url = license_url.as_deref().unwrap_or("-"),
            "Model requires license acceptance"
        );

        if !self.prompt.confirm(model, license_url.as_deref()).await {
            return Err(ClientError::LicenseDeclined {
                model: model.to_string(),
                license_url,
            });
        }

        let endpoint = match request.endpoint {
            Endpoint::Chat => Endpoint::Chat,
            Endpoint::Run | Endpoint::Transcription => Endpoint::Run,
        };
        let agreement = ApiRequest::json(endpoint, agreement_body(endpoint, request.image_input));

        let response = self.execute(&agreement, model).await.map_err(|e| {
            ClientError::LicenseAgreementFailed {
                model: model.to_string(),
                reason: e.to_string(),
            }
        })?;

        let text = response.text();
        if response.is_success() || is_agreement_success(&text) {
            tracing::info!(model = %model, "License accepted, retrying original request");
            Ok(())
        } else {
            Err(ClientError::LicenseAgreementFailed {
                model: model.to_string(),
                reason: format!("HTTP {}: {}", response.status, truncate(&text, 200)),
            })
        }
    }
}

fn with_model_field(body: &Value, model: &str) -> Value {
    let mut body = body.clone();
    if let Value::Object(map) = &mut body {
        map.entry("model")
            .or_insert_with(|| Value::String(model.to_string()));
    }
    body
}

fn header_string(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Shorten `text` to at most `max` characters for messages.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, body_string_contains, header, method, path},
    };

    use super::*;
    use crate::{
        synth::{Payload, synthesize},
        test_utils::{RecordingSleeper, SequentialResponder, endpoint_for},
    };

    fn client_for(server: &MockServer, prompt: Arc<dyn LicensePrompt>) -> (ResilientClient, RecordingSleeper) {
        let sleeper = RecordingSleeper::default();
        let client = ResilientClient::new(&endpoint_for(&server.uri()), RetryConfig::default(), prompt)
            .unwrap()
            .with_sleeper(Arc::new(sleeper.clone()));
        (client, sleeper)
    }

    fn license_gate() -> ResponseTemplate {
        ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{
                "message": "Prior to using this model, you must submit the prompt 'agree'. See https://example.com/llama/license"
            }],
            "success": false
        }))
    }

    #[tokio::test]
    async fn test_rate_limit_honors_server_delay() {
        let server = MockServer::start().await;
        let responder = SequentialResponder::new(vec![
            ResponseTemplate::new(429).set_body_json(json!({"retry_after": 2})),
            ResponseTemplate::new(200).set_body_json(json!({"result": {"ok": true}})),
        ]);
        Mock::given(method("POST"))
            .and(path("/run"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "m1"})))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, Arc::new(AutoDecline));
        let response = client
            .send(&ApiRequest::json(Endpoint::Run, json!({"text": "hi"})), "m1")
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(2000)]);
        assert_eq!(responder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_without_hint_uses_backoff() {
        let server = MockServer::start().await;
        let responder = SequentialResponder::new(vec![
            ResponseTemplate::new(429).set_body_string("slow down"),
            ResponseTemplate::new(429).set_body_string("slow down"),
            ResponseTemplate::new(200).set_body_json(json!({"ok": true})),
        ]);
        Mock::given(method("POST"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, Arc::new(AutoDecline));
        let response = client
            .send(&ApiRequest::json(Endpoint::Run, json!({})), "m1")
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_exhausted_returns_last_response() {
        let server = MockServer::start().await;
        let responder =
            SequentialResponder::new(vec![ResponseTemplate::new(429).set_body_json(json!({"retry_after": 1}))]);
        Mock::given(method("POST"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, Arc::new(AutoDecline));
        let response = client
            .send(&ApiRequest::json(Endpoint::Run, json!({})), "m1")
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(responder.call_count(), 4);
        assert_eq!(sleeper.recorded().len(), 3);
    }

    #[tokio::test]
    async fn test_license_declined_is_not_retried() {
        let server = MockServer::start().await;
        let responder = SequentialResponder::new(vec![license_gate()]);
        Mock::given(method("POST"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, Arc::new(AutoDecline));
        let err = client
            .send(&ApiRequest::json(Endpoint::Run, json!({"prompt": "hi"})), "llama-vision")
            .await
            .unwrap_err();

        match &err {
            ClientError::LicenseDeclined { model, license_url } => {
                assert_eq!(model, "llama-vision");
                assert_eq!(license_url.as_deref(), Some("https://example.com/llama/license"));
            }
            other => panic!("expected LicenseDeclined, got {other:?}"),
        }
        assert!(err.to_string().contains("not retried"));
        assert_eq!(responder.call_count(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_license_accepted_then_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .and(body_partial_json(json!({"prompt": "agree"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("Thank you for agreeing"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        let responder = SequentialResponder::new(vec![
            license_gate(),
            ResponseTemplate::new(200).set_body_json(json!({"result": {"description": "a cat"}})),
        ]);
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, Arc::new(AllowList::new(["llama-vision"])));
        let request = ApiRequest::json(Endpoint::Run, json!({"prompt": "describe"})).with_image_input(true);
        let response = client.send(&request, "llama-vision").await.unwrap();

        assert!(response.is_success());
        assert_eq!(responder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_vision_chat_agreement_carries_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains(r#""text":"agree""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        let responder = SequentialResponder::new(vec![
            license_gate(),
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"content": "A small square."}}]})),
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let Payload::Json(body) = synthesize(&Capability::Vision) else {
            panic!("vision input should be JSON");
        };
        let request = ApiRequest::json(Endpoint::for_capability(&Capability::Vision), body)
            .with_image_input(true);
        let (client, _) = client_for(&server, Arc::new(AllowList::new(["llama-3.2-11b-vision"])));
        let response = client.send(&request, "llama-3.2-11b-vision").await.unwrap();

        assert!(response.is_success());
        assert_eq!(responder.call_count(), 2);

        let requests = server.received_requests().await.unwrap();
        let agreement = requests
            .iter()
            .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap())
            .find(|b| b["messages"][0]["content"][0]["text"] == "agree")
            .expect("agreement request sent");
        assert_eq!(agreement["model"], "llama-3.2-11b-vision");
        let image = &agreement["messages"][0]["content"][1];
        assert_eq!(image["type"], "image_url");
        assert!(
            image["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
    }

    #[tokio::test]
    async fn test_license_handshake_runs_once_per_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"messages": [{"role": "user", "content": "agree"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        let responder = SequentialResponder::new(vec![license_gate()]);
        Mock::given(method("POST"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, Arc::new(AllowList::new(["m"])));
        let response = client
            .send(&ApiRequest::json(Endpoint::Chat, json!({"messages": []})), "m")
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(responder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_license_agreement_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"prompt": "agree"})))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad agreement"))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(license_gate())
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, Arc::new(AllowList::new(["m"])));
        let err = client
            .send(&ApiRequest::json(Endpoint::Run, json!({"text": "x"})), "m")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::LicenseAgreementFailed { .. }));
        assert!(err.is_license_gate());
    }

    #[tokio::test]
    async fn test_other_errors_returned_as_is() {
        let server = MockServer::start().await;
        let responder =
            SequentialResponder::new(vec![ResponseTemplate::new(500).set_body_string("internal error")]);
        Mock::given(method("POST"))
            .respond_with(responder.clone())
            .mount(&server)
            .await;

        let (client, sleeper) = client_for(&server, Arc::new(AutoDecline));
        let response = client
            .send(&ApiRequest::json(Endpoint::Run, json!({})), "m")
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "internal error");
        assert_eq!(responder.call_count(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_huge_server_delay_is_clamped() {
        let server = MockServer::start().await;
        let responder = SequentialResponder::new(vec![
            ResponseTemplate::new(429).set_body_json(json!({"retry_after": 1e9})),
            ResponseTemplate::new(200).set_body_json(json!({"result": {"ok": true}})),
        ]);
        Mock::given(method("POST")).respond_with(responder).mount(&server).await;

        let (client, sleeper) = client_for(&server, Arc::new(AutoDecline));
        let response = client
            .send(&ApiRequest::json(Endpoint::Run, json!({"prompt": "hi"})), "m")
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(120_000)]);
    }

    #[tokio::test]
    async fn test_unrepresentable_server_delay_falls_back_to_backoff() {
        let server = MockServer::start().await;
        let responder = SequentialResponder::new(vec![
            ResponseTemplate::new(429).set_body_string(r#"{"retry_after": 1e20}"#),
            ResponseTemplate::new(200).set_body_json(json!({"result": {"ok": true}})),
        ]);
        Mock::given(method("POST")).respond_with(responder).mount(&server).await;

        let (client, sleeper) = client_for(&server, Arc::new(AutoDecline));
        let response = client
            .send(&ApiRequest::json(Endpoint::Run, json!({"prompt": "hi"})), "m")
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(1000)]);
    }

    #[tokio::test]
    async fn test_transport_errors_exhaust_retries() {
        let sleeper = RecordingSleeper::default();
        let retry = RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        };
        let client = ResilientClient::new(&endpoint_for("http://127.0.0.1:1"), retry, Arc::new(AutoDecline))
            .unwrap()
            .with_sleeper(Arc::new(sleeper.clone()));

        let err = client
            .send(&ApiRequest::json(Endpoint::Chat, json!({})), "m")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport { attempts: 3, .. }));
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_multipart_upload_carries_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hello"})))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, Arc::new(AutoDecline));
        let body = MultipartBody::new().file("file", "clip.flac", "audio/flac", vec![0_u8; 16]);
        let response = client
            .send(&ApiRequest::multipart(Endpoint::Transcription, body), "whisper")
            .await
            .unwrap();
        assert_eq!(response.json().unwrap()["text"], "hello");

        let received = server.received_requests().await.unwrap();
        let raw = String::from_utf8_lossy(&received[0].body);
        assert!(raw.contains("name=\"model\""));
        assert!(raw.contains("whisper"));
    }

    #[test]
    fn test_binary_content_types() {
        let response = ApiResponse {
            status: StatusCode::OK,
            content_type: Some("audio/mpeg".into()),
            retry_after: None,
            body: Bytes::from_static(b"ID3"),
        };
        assert!(response.is_binary());
        assert!(response.json().is_none());
    }

    #[test]
    fn test_model_field_not_overwritten() {
        let body = with_model_field(&json!({"model": "explicit"}), "catalog-name");
        assert_eq!(body["model"], "explicit");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
    }
}
