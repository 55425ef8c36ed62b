use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use things_core::{Error, Result};
use things_wire::EventRecord;
use tracing::instrument;

use crate::client_info::{ClientInfo, CLIENT_INFO_HEADER};

/// Everything needed to reach one Things Cloud account. The
/// transport's TLS/proxy configuration is outside the core's scope; this
/// holds only what the history endpoints need to authenticate a request.
#[derive(Debug, Clone)]
pub struct HistoryClientConfig {
    pub base_url: String,
    pub password: String,
    pub app_build: String,
    pub client_info: ClientInfo,
}

/// Stream metadata returned by `GET /history/{stream-id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMetadata {
    #[serde(rename = "latest-server-index")]
    pub latest_server_index: u64,
    #[serde(rename = "latest-schema-version")]
    pub latest_schema_version: i64,
    #[serde(rename = "is-empty")]
    pub is_empty: bool,
    #[serde(rename = "latest-total-content-size")]
    pub latest_total_content_size: u64,
}

/// One page of events plus the pagination bookkeeping the sync driver needs:
/// `loaded_index` is where the *next* `read_events` call must start — it is
/// the count of events consumed so far, never the server's
/// `latest_server_index`. Conflating the two truncates the tail of the log.
#[derive(Debug, Clone)]
pub struct EventsPage {
    pub events: Vec<EventRecord>,
    pub loaded_index: u64,
    pub latest_server_index: u64,
    pub has_more: bool,
}

/// Thin client over the history endpoints. Stateless beyond the headers it
/// sends on every request; cursor tracking lives in the sync driver, not
/// here.
pub struct HistoryClient {
    http: reqwest::Client,
    config: HistoryClientConfig,
}

impl HistoryClient {
    pub fn new(config: HistoryClientConfig) -> Result<HistoryClient> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| Error::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(HistoryClient { http, config })
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Password {}", self.config.password))
                .map_err(|err| Error::Transport(format!("invalid password header: {err}")))?,
        );
        headers.insert(
            "User-Agent",
            HeaderValue::from_str(&format!("ThingsMac/{}", self.config.app_build))
                .map_err(|err| Error::Transport(format!("invalid user-agent header: {err}")))?,
        );
        let client_info = self
            .config
            .client_info
            .to_header_value()
            .map_err(|err| Error::Transport(format!("failed to encode client info: {err}")))?;
        headers.insert(
            CLIENT_INFO_HEADER,
            HeaderValue::from_str(&client_info)
                .map_err(|err| Error::Transport(format!("invalid client-info header: {err}")))?,
        );
        Ok(headers)
    }

    async fn check_status(response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::UNAUTHORIZED => Err(Error::Unauthorized {
                message: "Things Cloud rejected the account password".to_string(),
            }),
            status if status.is_success() => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Transport(format!("unexpected status {status}: {body}")))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn list_streams(&self) -> Result<Vec<String>> {
        let url = format!("{}/version/1/own-history-ids", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .headers(self.default_headers()?)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| Error::Transport(format!("malformed stream list: {err}")))
    }

    #[instrument(skip(self))]
    pub async fn create_stream(&self) -> Result<String> {
        let url = format!("{}/version/1/history", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .headers(self.default_headers()?)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;

        #[derive(Deserialize)]
        struct CreateStreamResponse {
            #[serde(rename = "history-id")]
            history_id: String,
        }
        let body: CreateStreamResponse = response
            .json()
            .await
            .map_err(|err| Error::Transport(format!("malformed create-stream response: {err}")))?;
        Ok(body.history_id)
    }

    #[instrument(skip(self))]
    pub async fn delete_stream(&self, stream_id: &str) -> Result<()> {
        let url = format!("{}/version/1/history/{}", self.config.base_url, stream_id);
        let response = self
            .http
            .delete(&url)
            .headers(self.default_headers()?)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stream_metadata(&self, stream_id: &str) -> Result<StreamMetadata> {
        let url = format!("{}/version/1/history/{}", self.config.base_url, stream_id);
        let response = self
            .http
            .get(&url)
            .headers(self.default_headers()?)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| Error::Transport(format!("malformed stream metadata: {err}")))
    }

    /// Reads one page starting at `start_index`. Callers loop while
    /// `has_more` is true, passing the returned `loaded_index` as the next
    /// call's `start_index` — never `latest_server_index`.
    #[instrument(skip(self))]
    pub async fn read_events(&self, stream_id: &str, start_index: u64) -> Result<EventsPage> {
        let url = format!(
            "{}/version/1/history/{}/items?start-index={}",
            self.config.base_url, stream_id, start_index
        );
        let response = self
            .http
            .get(&url)
            .headers(self.default_headers()?)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        let response = Self::check_status(response).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| Error::Transport(format!("malformed history page: {err}")))?;

        let (events, latest_server_index) = things_wire::decode_page(&body)?;
        let loaded_index = start_index + events.len() as u64;
        Ok(EventsPage {
            events,
            loaded_index,
            latest_server_index,
            has_more: loaded_index < latest_server_index,
        })
    }

    /// Commits new events at `ancestor_index`. `entries` is the same
    /// map-of-identifier-to-envelope shape the history endpoint
    /// reads back; constructing it is the write path's job, out of this
    /// crate's scope beyond the wire-envelope level.
    #[instrument(skip(self, entries))]
    pub async fn commit_events(
        &self,
        stream_id: &str,
        ancestor_index: u64,
        entries: serde_json::Value,
    ) -> Result<()> {
        let url = format!(
            "{}/version/1/history/{}/commit?ancestor-index={}&_cnt=1",
            self.config.base_url, stream_id, ancestor_index
        );
        let response = self
            .http
            .post(&url)
            .headers(self.default_headers()?)
            .json(&entries)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> HistoryClient {
        HistoryClient::new(HistoryClientConfig {
            base_url: "https://example.invalid".to_string(),
            password: "hunter2".to_string(),
            app_build: "123".to_string(),
            client_info: ClientInfo {
                device_model: "Mac".to_string(),
                region: "US".to_string(),
                app_name: "Things".to_string(),
                app_version: "3.0".to_string(),
                os_name: "macOS".to_string(),
                os_version: "14.0".to_string(),
                primary_language: "en".to_string(),
                locale: "en_US".to_string(),
            },
        })
        .unwrap()
    }

    #[test]
    fn default_headers_carry_password_auth_and_user_agent() {
        let client = test_client();
        let headers = client.default_headers().unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "Password hunter2");
        assert_eq!(headers.get("User-Agent").unwrap(), "ThingsMac/123");
        assert!(headers.get(CLIENT_INFO_HEADER).is_some());
    }

    #[test]
    fn loaded_index_is_start_plus_events_consumed_not_the_latest_index() {
        // Page A has 1 event, current-item-index=2. The next start-index
        // must be 1 (loaded), not 2 (latest).
        let start_index = 0u64;
        let events_len = 1usize;
        let latest_server_index = 2u64;
        let loaded_index = start_index + events_len as u64;
        assert_eq!(loaded_index, 1);
        assert!(loaded_index < latest_server_index);
    }

    #[test]
    fn has_more_is_false_once_loaded_reaches_latest() {
        let loaded_index = 2u64;
        let latest_server_index = 2u64;
        assert!(!(loaded_index < latest_server_index));
    }
}
