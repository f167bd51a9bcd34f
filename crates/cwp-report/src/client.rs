//! Console HTTP client
//!
//! [`ConsoleClient`] owns the authenticated reqwest client. A [`Listing`]
//! binds it to one paginated endpoint and is the production [`PageSource`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Serialize;
use url::Url;

use crate::config::ConsoleConfig;
use crate::error::{Error, Result};

/// One page as returned by a listing endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResponse {
    pub status: u16,
    /// Raw events; always empty unless `status` is 200
    pub events: Vec<serde_json::Value>,
}

impl PageResponse {
    pub fn ok(events: Vec<serde_json::Value>) -> Self {
        Self { status: 200, events }
    }

    pub fn status(status: u16) -> Self {
        Self { status, events: Vec::new() }
    }
}

/// A paginated listing endpoint
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Request `limit` events starting at `offset`
    async fn fetch_page(&self, offset: u64, limit: u32) -> Result<PageResponse>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for &T {
    async fn fetch_page(&self, offset: u64, limit: u32) -> Result<PageResponse> {
        (**self).fetch_page(offset, limit).await
    }
}

/// Authenticated console client
#[derive(Clone)]
pub struct ConsoleClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
}

impl ConsoleClient {
    /// Build a client sending `Authorization: Basic <token>` on every request
    pub fn new(config: &ConsoleConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Basic {}", config.token.trim()))
            .map_err(|_| Error::Config("token contains invalid header characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&format!("cwp-report/{}", crate::VERSION))
                .map_err(|_| Error::Config("invalid user agent".into()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner { http }),
        })
    }

    /// Bind the client to a listing endpoint
    pub fn listing(&self, url: &str) -> Result<Listing> {
        Ok(Listing {
            client: self.clone(),
            url: Url::parse(url)?,
        })
    }

    /// POST a JSON body, returning status and response text
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(u16, String)> {
        let response = self.inner.http.post(Url::parse(url)?).json(body).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.text().await?))
    }

    /// PUT a JSON body, returning status and response text
    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(u16, String)> {
        let response = self.inner.http.put(Url::parse(url)?).json(body).send().await?;
        let status = response.status().as_u16();
        Ok((status, response.text().await?))
    }
}

/// A console endpoint paged with `limit`/`offset`
#[derive(Clone)]
pub struct Listing {
    client: ConsoleClient,
    url: Url,
}

impl Listing {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PageSource for Listing {
    async fn fetch_page(&self, offset: u64, limit: u32) -> Result<PageResponse> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        let response = self.client.inner.http.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(status = status.as_u16(), offset, "listing request not successful");
            return Ok(PageResponse::status(status.as_u16()));
        }

        // The console answers `null` instead of `[]` past the last page
        let body = response.bytes().await?;
        let events: Option<Vec<serde_json::Value>> = serde_json::from_slice(&body)?;
        Ok(PageResponse::ok(events.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_token_with_newline() {
        let config = ConsoleConfig::new("https://console", "abc\ndef");
        assert!(matches!(ConsoleClient::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_listing_requires_absolute_url() {
        let config = ConsoleConfig::new("https://console", "token");
        let client = ConsoleClient::new(&config).unwrap();
        assert!(client.listing("/api/v1/audits").is_err());

        let listing = client.listing(&config.runtime_audits_url()).unwrap();
        assert_eq!(listing.url().path(), "/api/v1/audits/runtime/container");
    }

    #[test]
    fn test_page_response_helpers() {
        assert_eq!(PageResponse::ok(vec![]).status, 200);
        let limited = PageResponse::status(429);
        assert_eq!(limited.status, 429);
        assert!(limited.events.is_empty());
    }
}
