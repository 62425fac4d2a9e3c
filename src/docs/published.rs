use std::{collections::BTreeSet, sync::LazyLock, time::Duration};

use regex::Regex;

use super::PublishedCoverage;

static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<code(?:\s[^>]*)?>(.*?)</code>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap());

/// Code tokens on documentation pages that are never model names.
const NON_MODEL_TOKENS: &[&str] = &[
    "get",
    "post",
    "put",
    "patch",
    "delete",
    "json",
    "true",
    "false",
    "null",
    "model",
    "messages",
    "prompt",
    "stream",
    "content-type",
    "application/json",
    "multipart/form-data",
    "max_tokens",
    "top_k",
    "num_steps",
    "source_lang",
    "target_lang",
    "api_key",
    "base_url",
    "chat.completions",
    "curl",
    "npm",
    "npx",
    "node.js",
    "e.g.",
    "i.e.",
];

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Pull the text content of every inline `<code>` element, entities decoded.
pub fn extract_code_tokens(html: &str) -> Vec<String> {
    CODE_SPAN
        .captures_iter(html)
        .filter_map(|caps| {
            let text = decode_entities(&TAG.replace_all(&caps[1], ""));
            let token = text.trim();
            (!token.is_empty()).then(|| token.to_string())
        })
        .collect()
}

/// Whether a docs-only token plausibly names a model.
fn looks_like_model(token: &str) -> bool {
    if token.chars().any(char::is_whitespace) {
        return false;
    }
    let lowered = token.to_ascii_lowercase();
    if NON_MODEL_TOKENS.contains(&lowered.as_str()) {
        return false;
    }
    token.contains(['-', '.', '_'])
}

impl PublishedCoverage {
    pub fn compute<'a, C>(catalog_names: C, tokens: &[String]) -> Self
    where
        C: IntoIterator<Item = &'a str>,
    {
        let catalog: BTreeSet<String> = catalog_names.into_iter().map(str::to_string).collect();
        let on_page: BTreeSet<String> = tokens.iter().cloned().collect();

        Self {
            synced: catalog.intersection(&on_page).cloned().collect(),
            missing_from_page: catalog.difference(&on_page).cloned().collect(),
            stale_on_page: on_page
                .difference(&catalog)
                .filter(|t| looks_like_model(t))
                .cloned()
                .collect(),
            fetch_error: None,
        }
    }
}

/// Fetch the published page and compare it against the catalog.
///
/// Transport errors and non-2xx statuses produce a degraded result.
pub async fn fetch_published<'a, C>(
    client: &reqwest::Client,
    url: &str,
    catalog_names: C,
) -> PublishedCoverage
where
    C: IntoIterator<Item = &'a str>,
{
    let response = match client.get(url).timeout(FETCH_TIMEOUT).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Failed to fetch published docs");
            return PublishedCoverage::failed(format!("request failed: {e}"));
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url = %url, status = %status, "Published docs returned an error status");
        return PublishedCoverage::failed(format!("HTTP {status}"));
    }

    match response.text().await {
        Ok(html) => {
            let tokens = extract_code_tokens(&html);
            tracing::debug!(url = %url, tokens = tokens.len(), "Fetched published docs");
            PublishedCoverage::compute(catalog_names, &tokens)
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Failed to read published docs body");
            PublishedCoverage::failed(format!("failed to read body: {e}"))
        }
    }
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <h2>Chat</h2>
        <p>Send a <code>POST</code> with <code>Content-Type</code> set to <code>application/json</code>.</p>
        <ul>
          <li><code>llama-3-8b</code> general chat</li>
          <li><code class="model"><span>bge-small</span></code> embeddings</li>
          <li><code>old-model-v1</code> retired</li>
          <li><code>&lt;model&gt;</code> placeholder</li>
          <li><code>whisper</code> transcription</li>
        </ul>
        </body></html>
    "#;

    #[test]
    fn test_extract_code_tokens() {
        let tokens = extract_code_tokens(PAGE);
        assert!(tokens.contains(&"llama-3-8b".to_string()));
        assert!(tokens.contains(&"bge-small".to_string()));
        assert!(tokens.contains(&"<model>".to_string()));
        assert!(tokens.contains(&"POST".to_string()));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a&amp;b &#x2F; &#47; &bogus;"), "a&b / / &bogus;");
    }

    #[test]
    fn test_stale_tokens_filtered() {
        let tokens = extract_code_tokens(PAGE);
        let coverage = PublishedCoverage::compute(["llama-3-8b", "bge-small", "melotts"], &tokens);

        assert_eq!(coverage.synced.len(), 2);
        assert!(coverage.missing_from_page.contains("melotts"));
        // denylisted, no separator, or placeholder tokens are not stale
        assert_eq!(
            coverage.stale_on_page.iter().collect::<Vec<_>>(),
            vec!["old-model-v1"]
        );
    }

    #[tokio::test]
    async fn test_fetch_published() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let coverage =
            fetch_published(&client, &format!("{}/models", server.uri()), ["whisper"]).await;
        assert!(!coverage.is_degraded());
        assert!(coverage.synced.contains("whisper"));
    }

    #[tokio::test]
    async fn test_fetch_published_error_status_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let coverage = fetch_published(&client, &server.uri(), ["whisper"]).await;
        assert!(coverage.is_degraded());
        assert!(coverage.fetch_error.unwrap().contains("503"));
        assert!(coverage.missing_from_page.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_published_unreachable_degrades() {
        let client = reqwest::Client::new();
        let coverage = fetch_published(&client, "http://127.0.0.1:1/models", ["whisper"]).await;
        assert!(coverage.is_degraded());
    }
}
