use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::types::{Model, RawLead, SearchParams};

/// The scraping/OSINT engine. It lives outside this client; the integrator
/// attaches an implementation at startup. Proxy persistence lands here too:
/// the engine owns the proxy pool and is the authority on entry validity.
#[async_trait]
pub trait LeadSource: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<Vec<RawLead>, String>;
    async fn update_proxies(&self, proxies: Vec<String>) -> Result<(), String>;
}

/// The command-executor boundary every cached operation delegates to.
/// Errors are operator-facing strings, surfaced verbatim in the UI.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn search_leads(&self, params: &SearchParams) -> Result<Vec<RawLead>, String>;
    async fn test_connection(&self) -> Result<String, String>;
    async fn fetch_models(&self, api_key: &str) -> Result<Vec<Model>, String>;
    async fn update_proxies(&self, proxies: Vec<String>) -> Result<(), String>;
}

const OPENROUTER_MODELS_URL: &str = "https://openrouter.ai/api/v1/models";

/// Per-request timeout for diagnostics probes and catalog fetches. The
/// query cache itself imposes no deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct ModelsResponse {
    // Extra catalog fields (context length, architecture, ...) are ignored.
    data: Vec<Model>,
}

/// Production backend: OpenRouter over HTTPS for the model catalog,
/// plain reachability probes for diagnostics, and an attached engine for
/// searches and proxies.
pub struct HttpBackend {
    client: Client,
    engine: Option<Arc<dyn LeadSource>>,
}

impl HttpBackend {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn LeadSource>) -> Self {
        self.engine = Some(engine);
        self
    }

    fn engine(&self) -> Result<&Arc<dyn LeadSource>, String> {
        self.engine
            .as_ref()
            .ok_or_else(|| "scrape engine is not attached".to_string())
    }

    /// One diagnostics line: reachability of a single endpoint.
    async fn probe(&self, label: &str, url: &str) -> String {
        match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => format!("✅ {label} reachable"),
            Ok(resp) => format!("❌ {label} returned status {}", resp.status()),
            Err(e) => format!("❌ {label} unreachable: {e}"),
        }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn search_leads(&self, params: &SearchParams) -> Result<Vec<RawLead>, String> {
        self.engine()?.search(params).await
    }

    async fn test_connection(&self) -> Result<String, String> {
        let mut report = String::from("=== LeadMiner Diagnostics ===\n\n");
        report.push_str(&self.probe("Internet", "https://8.8.8.8").await);
        report.push('\n');
        report.push_str(&self.probe("Google", "https://www.google.com").await);
        report.push('\n');
        report.push_str(&self.probe("OpenRouter", "https://openrouter.ai").await);
        report.push('\n');
        report.push_str(
            "\n=== Recommendations ===\n\
             1. Check your internet connection\n\
             2. Configure proxies if the target sites are blocked\n\
             3. Verify your OpenRouter API key in AI settings\n",
        );
        Ok(report)
    }

    async fn fetch_models(&self, api_key: &str) -> Result<Vec<Model>, String> {
        let resp = self
            .client
            .get(OPENROUTER_MODELS_URL)
            .header("Authorization", format!("Bearer {api_key}"))
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;

        if !resp.status().is_success() {
            return Err(format!("API error: {}", resp.status()));
        }

        let body: ModelsResponse = resp
            .json()
            .await
            .map_err(|e| format!("Parse error: {e}"))?;
        Ok(body.data)
    }

    async fn update_proxies(&self, proxies: Vec<String>) -> Result<(), String> {
        self.engine()?.update_proxies(proxies).await
    }
}
