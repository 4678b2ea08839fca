//! HTTP origin client
//!
//! Joins the configured base URL with the inbound path and issues the
//! request through a shared `reqwest` client.
//!
//! `request_timeout` bounds the wait for response headers and each idle gap
//! while a body streams; a slow but steady transfer is never cut off.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{ACCEPT_ENCODING, HOST, RANGE};
use reqwest::{Client, ClientBuilder, Method, Url};

use super::{FetchRequest, ForwardRequest, Origin, OriginError, OriginResponse};
use crate::config::OriginConfig;
use crate::http::response::{is_hop_by_hop, BodyError, HeaderList};

/// Origin reached over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    base_url: String,
    client: Client,
    response_timeout: Duration,
}

impl HttpOrigin {
    pub fn new(config: &OriginConfig) -> Result<Self, OriginError> {
        Self::with_builder(config, Client::builder())
    }

    fn with_builder(config: &OriginConfig, builder: ClientBuilder) -> Result<Self, OriginError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| OriginError::InvalidUrl(format!("{base_url}: {e}")))?;

        let response_timeout = Duration::from_secs(config.request_timeout);
        // Per-read bound only, never the whole transfer
        let client = builder
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .read_timeout(response_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| OriginError::Unreachable(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            response_timeout,
        })
    }

    fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<OriginResponse, OriginError> {
        let response = tokio::time::timeout(self.response_timeout, request.send())
            .await
            .map_err(|_| OriginError::Timeout)?
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers: HeaderList = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes_stream()
            .map_err(|e| -> BodyError { Box::new(e) });

        Ok(OriginResponse::new(status, headers, Box::pin(body)))
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<OriginResponse, OriginError> {
        let method = if request.head { Method::HEAD } else { Method::GET };
        // Sizes must be byte counts of the stored representation
        let mut builder = self
            .client
            .request(method, self.url_for(request.path))
            .header(ACCEPT_ENCODING, "identity");
        if let Some(range) = request.range {
            builder = builder.header(RANGE, range);
        }
        self.send(builder).await
    }

    async fn forward(&self, request: ForwardRequest) -> Result<OriginResponse, OriginError> {
        let mut builder = self
            .client
            .request(request.method, self.url_for(&request.path_and_query));
        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case(HOST.as_str())
                || name.eq_ignore_ascii_case("content-length")
                || is_hop_by_hop(name)
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }
        self.send(builder).await
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn map_reqwest_error(err: reqwest::Error) -> OriginError {
    if err.is_timeout() {
        OriginError::Timeout
    } else {
        OriginError::Unreachable(err.to_string())
    }
}
