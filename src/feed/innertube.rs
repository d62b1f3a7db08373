use super::types::Page;
use super::{FeedClient, FirstPage};
use crate::config::ClientConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// JSON browse API client. Both the first page and every continuation go
/// through the same `/browse` endpoint; only the request body differs.
///
/// The service is expected to answer in the flattened page format decoded by
/// [`parse_page`], `{"contents": {"type", "contents"}, "continuation"}`. The
/// raw YouTube endpoint does not: it wants a `context.client` block and
/// returns deeply nested renderers, so point `base_url` at a proxy that does
/// that translation.
pub struct InnertubeClient {
    client: Client,
    base_url: String,
}

impl InnertubeClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn browse_url(&self) -> String {
        format!("{}/browse", self.base_url)
    }

    pub async fn browse(&self, browse_id: &str) -> Result<Page> {
        self.post(json!({ "browseId": browse_id }))
            .await
            .with_context(|| format!("browse {} failed", browse_id))
    }

    async fn post(&self, body: serde_json::Value) -> Result<Page> {
        let resp = self
            .client
            .post(self.browse_url())
            .json(&body)
            .send()
            .await
            .context("browse request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("browse endpoint ({}): {}", status, body);
        }

        let text = resp.text().await.context("failed to read browse response")?;
        parse_page(&text)
    }
}

#[async_trait]
impl FeedClient for InnertubeClient {
    async fn continuation(&self, page: &Page) -> Result<Page> {
        let token = page
            .continuation
            .as_ref()
            .filter(|t| !t.as_str().is_empty())
            .context("page has no continuation")?;
        tracing::debug!(token = token.as_str(), "requesting continuation");
        self.post(json!({ "continuation": token.as_str() })).await
    }
}

/// First page of a browse feed, e.g. `FEwhat_to_watch` for home or
/// `FEtrending` for trending.
#[derive(Debug, Clone)]
pub struct Browse {
    pub browse_id: String,
}

impl Browse {
    pub fn new(browse_id: impl Into<String>) -> Self {
        Self { browse_id: browse_id.into() }
    }
}

#[async_trait]
impl FirstPage<InnertubeClient> for Browse {
    async fn first_page(&self, client: &InnertubeClient) -> Result<Page> {
        client.browse(&self.browse_id).await
    }
}

/// Decode a browse response body. Pure so tests can run without a server.
pub fn parse_page(json: &str) -> Result<Page> {
    serde_json::from_str(json).context("failed to parse browse response")
}
