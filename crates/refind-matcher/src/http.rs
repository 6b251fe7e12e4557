//! HTTP matcher backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use refind_core::{
    defaults, ComputedEmbeddings, Error, FindOutcome, Item, ItemEmbedding, ItemImage,
    MatchCandidate, MatchLevel, MatcherBackend, Result,
};

/// Default matching service endpoint.
pub const DEFAULT_MATCHER_URL: &str = defaults::MATCHER_URL;

/// Timeout for matcher requests (seconds).
pub const MATCHER_TIMEOUT_SECS: u64 = defaults::MATCHER_TIMEOUT_SECS;

/// Matcher client configuration.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MATCHER_URL.to_string(),
            timeout_secs: MATCHER_TIMEOUT_SECS,
        }
    }
}

/// HTTP client for the external matching service.
pub struct HttpMatcherBackend {
    client: Client,
    base_url: String,
}

impl HttpMatcherBackend {
    /// Create a new matcher backend with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(MatcherConfig::default())
    }

    /// Create a new matcher backend with custom configuration.
    pub fn with_config(config: MatcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            subsystem = "matcher",
            component = "http",
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Initializing matcher backend"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("MATCHER_BASE_URL").unwrap_or_else(|_| DEFAULT_MATCHER_URL.to_string());
        let timeout_secs = std::env::var("MATCHER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(MATCHER_TIMEOUT_SECS);

        Self::with_config(MatcherConfig {
            base_url,
            timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

// Wire types. The matching service speaks camelCase JSON and raw 0.0-1.0
// similarity fractions; scores are converted to percentages at this boundary.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbedResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    text_embedding: Option<JsonValue>,
    #[serde(default)]
    image_embedding: Option<JsonValue>,
    #[serde(default)]
    has_image: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    item_id: Uuid,
    item_type: String,
    title: &'a str,
    description: Option<&'a str>,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
    text_embedding: JsonValue,
    image_embedding: Option<JsonValue>,
    has_image: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindRequest {
    item_id: Uuid,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    lost_item_id: String,
    found_item_id: String,
    confidence_score: f64,
    #[serde(default)]
    image_similarity: f64,
    #[serde(default)]
    text_similarity: f64,
    #[serde(default)]
    category_match: f64,
    #[serde(default)]
    match_level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchesResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    matches: Vec<WireCandidate>,
}

/// Round a 0.0-1.0 fraction to a percentage with one decimal place.
fn to_percent(fraction: f64) -> f64 {
    (fraction * 1000.0).round() / 10.0
}

/// Whether a failure message means "item not in index" rather than a real
/// error. Drives the caller's self-heal re-registration.
fn is_index_miss(message: Option<&str>) -> bool {
    message
        .map(|m| m.to_lowercase().contains("not found"))
        .unwrap_or(false)
}

fn parse_candidates(wire: Vec<WireCandidate>) -> Vec<MatchCandidate> {
    wire.into_iter()
        .filter_map(|c| {
            let lost = Uuid::parse_str(&c.lost_item_id);
            let found = Uuid::parse_str(&c.found_item_id);
            match (lost, found) {
                (Ok(lost_item_id), Ok(found_item_id)) => Some(MatchCandidate {
                    lost_item_id,
                    found_item_id,
                    confidence_score: to_percent(c.confidence_score),
                    image_similarity: to_percent(c.image_similarity),
                    text_similarity: to_percent(c.text_similarity),
                    category_match: to_percent(c.category_match),
                    match_level: c
                        .match_level
                        .as_deref()
                        .unwrap_or("")
                        .parse()
                        .unwrap_or(MatchLevel::Unknown),
                }),
                _ => {
                    warn!(
                        subsystem = "matcher",
                        component = "http",
                        lost_item_id = %c.lost_item_id,
                        found_item_id = %c.found_item_id,
                        "Skipping candidate with malformed item ids"
                    );
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl MatcherBackend for HttpMatcherBackend {
    async fn embed_item(
        &self,
        item: &Item,
        image: Option<&ItemImage>,
    ) -> Result<ComputedEmbeddings> {
        let start = Instant::now();

        let mut form = Form::new()
            .text("itemId", item.id.to_string())
            .text("itemType", item.kind.to_string())
            .text("title", item.title.clone())
            .text("category", item.category.to_string());
        if let Some(description) = &item.description {
            form = form.text("description", description.clone());
        }
        if let Some(owner_id) = item.owner_id {
            form = form.text("userId", owner_id.to_string());
        }
        if let Some(image) = image {
            form = form.part(
                "image",
                Part::bytes(image.bytes.clone()).file_name(image.filename.clone()),
            );
        }

        let response = self
            .client
            .post(self.url("/embeddings/item"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "embedding request failed with status {status}"
            )));
        }

        let body: EmbedResponse = response.json().await?;
        if !body.success {
            return Err(Error::Upstream(format!(
                "embedding request rejected: {}",
                body.message.as_deref().unwrap_or("no message")
            )));
        }
        let text = body
            .text_embedding
            .ok_or_else(|| Error::Upstream("embedding response missing text vector".into()))?;

        debug!(
            subsystem = "matcher",
            component = "http",
            op = "embed_item",
            item_id = %item.id,
            has_image = body.has_image,
            duration_ms = start.elapsed().as_millis() as u64,
            "Computed embeddings"
        );

        Ok(ComputedEmbeddings {
            text_embedding: text.to_string(),
            image_embedding: body.image_embedding.map(|v| v.to_string()),
            has_image: body.has_image,
        })
    }

    async fn register_item(&self, item: &Item, embedding: &ItemEmbedding) -> Result<()> {
        let text_embedding: JsonValue = serde_json::from_str(&embedding.text_embedding)?;
        let image_embedding: Option<JsonValue> = embedding
            .image_embedding
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        let request = RegisterRequest {
            item_id: item.id,
            item_type: item.kind.to_string(),
            title: &item.title,
            description: item.description.as_deref(),
            category: item.category.to_string(),
            user_id: item.owner_id,
            text_embedding,
            image_embedding,
            has_image: embedding.has_image,
        };

        let response = self
            .client
            .post(self.url("/matching/register"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "registration failed with status {status}"
            )));
        }

        let body: StatusResponse = response.json().await?;
        if !body.success {
            return Err(Error::Upstream(format!(
                "registration rejected: {}",
                body.message.as_deref().unwrap_or("no message")
            )));
        }

        debug!(
            subsystem = "matcher",
            component = "http",
            op = "register_item",
            item_id = %item.id,
            "Registered item with matcher index"
        );
        Ok(())
    }

    async fn find_matches(&self, item_id: Uuid, top_k: u32) -> Result<FindOutcome> {
        let response = self
            .client
            .post(self.url("/matching/find"))
            .json(&FindRequest { item_id, top_k })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(
                subsystem = "matcher",
                component = "http",
                op = "find_matches",
                item_id = %item_id,
                "Matcher does not know this item (HTTP 404)"
            );
            return Ok(FindOutcome::IndexMiss);
        }
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "find request failed with status {status}"
            )));
        }

        let body: MatchesResponse = response.json().await?;
        if !body.success {
            if is_index_miss(body.message.as_deref()) {
                debug!(
                    subsystem = "matcher",
                    component = "http",
                    op = "find_matches",
                    item_id = %item_id,
                    "Matcher does not know this item (index miss)"
                );
                return Ok(FindOutcome::IndexMiss);
            }
            return Err(Error::Upstream(format!(
                "find rejected: {}",
                body.message.as_deref().unwrap_or("no message")
            )));
        }

        let candidates = parse_candidates(body.matches);
        debug!(
            subsystem = "matcher",
            component = "http",
            op = "find_matches",
            item_id = %item_id,
            candidate_count = candidates.len(),
            "Fetched match candidates"
        );
        Ok(FindOutcome::Matches(candidates))
    }

    async fn all_matches(&self, threshold: f64) -> Result<Vec<MatchCandidate>> {
        let response = self
            .client
            .get(self.url("/matching/all"))
            .query(&[("threshold", threshold)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "batch match request failed with status {status}"
            )));
        }

        let body: MatchesResponse = response.json().await?;
        if !body.success {
            return Err(Error::Upstream(format!(
                "batch match rejected: {}",
                body.message.as_deref().unwrap_or("no message")
            )));
        }

        Ok(parse_candidates(body.matches))
    }
}
