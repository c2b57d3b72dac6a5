//! HTTP client for the AniDB HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::AnimeSource;
use crate::config::UpstreamConfig;
use crate::error::{MirrorError, MirrorResult};

/// Fetches anime documents over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAnimeClient {
    config: UpstreamConfig,
    client: Client,
}

impl HttpAnimeClient {
    pub fn new(config: UpstreamConfig) -> MirrorResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MirrorError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Query parameters for one anime request.
    fn query(&self, aid: i64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("request", "anime".to_string()),
            ("client", self.config.client.clone()),
            ("clientver", self.config.client_version.clone()),
            ("protover", self.config.protocol_version.clone()),
            ("aid", aid.to_string()),
        ];
        if let Some((user, pass)) = self.config.credentials() {
            params.push(("user", user.to_string()));
            params.push(("pass", pass.to_string()));
        }
        params
    }
}

#[async_trait]
impl AnimeSource for HttpAnimeClient {
    async fn fetch(&self, aid: i64) -> MirrorResult<String> {
        let unavailable = |e: reqwest::Error| MirrorError::UpstreamUnavailable(e.to_string());

        let response = self
            .client
            .get(&self.config.url)
            .query(&self.query(aid))
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?;

        let body = response.text().await.map_err(unavailable)?;
        debug!("AID {}: received {} bytes", aid, body.len());
        Ok(body)
    }
}
