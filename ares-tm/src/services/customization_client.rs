//! Customization store HTTP client
//!
//! JSON over HTTP against the artist customization service. Lookups map
//! 404 to "absent"; creates map 409 to [`StoreError::Conflict`].

use crate::models::{
    alias_name, AliasPayload, AliasRecord, Franchise, GraphArtistPayload, GraphArtistRecord,
    SimpleArtistPayload, SimpleArtistRecord,
};
use crate::types::{CustomizationStore, StoreError, StoreResult};
use ares_common::config::StoreSettings;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("ares-tm/", env!("CARGO_PKG_VERSION"));

const GRAPH_ARTIST_ENDPOINT: &str = "api/mbartist";
const SIMPLE_ARTIST_ENDPOINT: &str = "api/artist";
const ALIAS_ENDPOINT: &str = "api/alias";
const FRANCHISE_ENDPOINT: &str = "api/franchise";
const HEALTH_ENDPOINT: &str = "health";

/// HTTP customization store
pub struct CustomizationClient {
    http_client: reqwest::Client,
    /// Separate client so the health check has its own short timeout
    health_client: reqwest::Client,
    base_url: String,
}

impl CustomizationClient {
    pub fn new(settings: &StoreSettings) -> StoreResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let health_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.health_timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            health_client,
            base_url: settings.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<Response> {
        request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    /// Fetch an optional JSON value; 404 means absent
    async fn get_optional<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> StoreResult<Option<T>> {
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse(response).await.map(Some)
    }

    /// Fetch a JSON list; 404 and empty bodies mean no records
    async fn get_list<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> StoreResult<Vec<T>> {
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = check(response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Parse(e.to_string()))
    }

    /// Send a create request; 409 names the unique field
    async fn create(
        &self,
        request: reqwest::RequestBuilder,
        conflict_field: &str,
    ) -> StoreResult<Response> {
        let response = self.send(request).await?;
        if response.status() == StatusCode::CONFLICT {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Conflict {
                field: conflict_field.to_string(),
                message,
            });
        }
        check(response).await
    }

    /// Send an update request; 404 means the record is gone
    async fn update<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: String,
    ) -> StoreResult<T> {
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(what));
        }
        parse(response).await
    }
}

/// Turn non-success statuses into errors
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        body,
    })
}

async fn parse<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
    check(response)
        .await?
        .json()
        .await
        .map_err(|e| StoreError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl CustomizationStore for CustomizationClient {
    async fn graph_artist(&self, external_id: &str) -> StoreResult<Option<GraphArtistRecord>> {
        let url = self.url(&format!("{}/mbid/{}", GRAPH_ARTIST_ENDPOINT, external_id));
        debug!(mbid = %external_id, url = %url, "Fetching graph artist");
        self.get_optional(self.http_client.get(&url)).await
    }

    async fn create_graph_artist(
        &self,
        payload: &GraphArtistPayload,
    ) -> StoreResult<GraphArtistRecord> {
        debug!(mbid = %payload.mb_id, name = %payload.name, "Creating graph artist");
        let request = self
            .http_client
            .post(self.url(GRAPH_ARTIST_ENDPOINT))
            .json(payload);
        let response = self.create(request, "mbId").await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn update_graph_artist(
        &self,
        id: i64,
        payload: &GraphArtistPayload,
    ) -> StoreResult<GraphArtistRecord> {
        debug!(id = id, mbid = %payload.mb_id, "Updating graph artist");
        let request = self
            .http_client
            .put(self.url(&format!("{}/id/{}", GRAPH_ARTIST_ENDPOINT, id)))
            .json(payload);
        self.update(request, format!("graph artist {}", id)).await
    }

    async fn simple_artists_by_name(&self, name: &str) -> StoreResult<Vec<SimpleArtistRecord>> {
        debug!(name = %name, "Looking up simple artist by name");
        let request = self
            .http_client
            .get(self.url(SIMPLE_ARTIST_ENDPOINT))
            .query(&[("name", name)]);
        self.get_list(request).await
    }

    async fn simple_artist(&self, id: i64) -> StoreResult<Option<SimpleArtistRecord>> {
        debug!(id = id, "Looking up simple artist by id");
        let request = self
            .http_client
            .get(self.url(SIMPLE_ARTIST_ENDPOINT))
            .query(&[("id", id)]);
        let records: Vec<SimpleArtistRecord> = self.get_list(request).await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn create_simple_artist(
        &self,
        payload: &SimpleArtistPayload,
    ) -> StoreResult<SimpleArtistRecord> {
        debug!(name = %payload.name, "Creating simple artist");
        let request = self
            .http_client
            .post(self.url(SIMPLE_ARTIST_ENDPOINT))
            .json(payload);
        let response = self.create(request, "name").await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn update_simple_artist(
        &self,
        id: i64,
        payload: &SimpleArtistPayload,
    ) -> StoreResult<SimpleArtistRecord> {
        debug!(id = id, name = %payload.name, "Updating simple artist");
        let request = self
            .http_client
            .put(self.url(&format!("{}/id/{}", SIMPLE_ARTIST_ENDPOINT, id)))
            .json(payload);
        self.update(request, format!("simple artist {}", id)).await
    }

    async fn aliases(&self, name: &str, franchise_id: i64) -> StoreResult<Vec<AliasRecord>> {
        let name = alias_name(name);
        debug!(alias = %name, franchise_id = franchise_id, "Looking up alias");
        let request = self
            .http_client
            .get(self.url(ALIAS_ENDPOINT))
            .query(&[("name", name.as_str())])
            .query(&[("franchiseId", franchise_id)]);
        self.get_list(request).await
    }

    async fn create_alias(&self, payload: &AliasPayload) -> StoreResult<()> {
        let payload = AliasPayload {
            name: alias_name(&payload.name),
            ..payload.clone()
        };
        debug!(
            alias = %payload.name,
            artist_id = payload.artist_id,
            franchise_id = payload.franchise_id,
            "Creating alias"
        );
        let request = self
            .http_client
            .post(self.url(ALIAS_ENDPOINT))
            .json(&payload);
        self.create(request, "name").await?;
        Ok(())
    }

    async fn delete_alias(&self, id: i64) -> StoreResult<()> {
        debug!(id = id, "Deleting alias");
        let request = self
            .http_client
            .delete(self.url(&format!("{}/id/{}", ALIAS_ENDPOINT, id)));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("alias {}", id)));
        }
        check(response).await?;
        Ok(())
    }

    async fn franchises(&self) -> StoreResult<Vec<Franchise>> {
        debug!("Fetching franchise list");
        self.get_list(self.http_client.get(self.url(FRANCHISE_ENDPOINT)))
            .await
    }

    async fn health(&self) -> bool {
        match self.health_client.get(self.url(HEALTH_ENDPOINT)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, url = %self.base_url, "Customization store health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(host: &str, port: u16) -> StoreSettings {
        StoreSettings {
            host: host.to_string(),
            port,
            timeout: Duration::from_secs(1),
            health_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = CustomizationClient::new(&settings("localhost", 23409)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:23409");
        assert_eq!(
            client.url(GRAPH_ARTIST_ENDPOINT),
            "http://localhost:23409/api/mbartist"
        );
    }

    #[tokio::test]
    async fn test_health_is_false_when_unreachable() {
        // port 9 (discard) is not expected to serve HTTP
        let client = CustomizationClient::new(&settings("127.0.0.1", 9)).unwrap();
        assert!(!client.health().await);
    }
}
