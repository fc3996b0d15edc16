use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ApiError, MaintenanceApi, MaintenanceRequest, MaintenanceSummary, MaintenanceWindow};
use crate::config::{ClientConfig, ConfigError};
use crate::window::WindowId;

#[derive(Deserialize)]
struct Envelope<T> {
    maintenance: T,
}

#[derive(Deserialize)]
struct Created {
    id: u64,
}

#[derive(Deserialize)]
struct Updated {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    #[serde(default)]
    statusdesc: Option<String>,
    #[serde(default)]
    errormessage: Option<String>,
}

/// reqwest-backed [`MaintenanceApi`] speaking the Pingdom 3.1 JSON API.
#[derive(Clone)]
pub struct HttpMaintenanceClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpMaintenanceClient {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = Self::build_client(config.request_timeout)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        }
    }

    pub fn build_client(timeout: Duration) -> Result<Client, ConfigError> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("pingdom-maint/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<String, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(url, e))?;

        if !status.is_success() {
            let message = remote_message(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("Unknown").to_string()
            });
            warn!(url, status = status.as_u16(), %message, "Maintenance API returned error status");
            return Err(ApiError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl MaintenanceApi for HttpMaintenanceClient {
    async fn list(&self) -> Result<Vec<MaintenanceSummary>, ApiError> {
        let url = self.endpoint("maintenance");
        let body = self.send(self.client.get(&url), &url).await?;
        let envelope: Envelope<Vec<MaintenanceSummary>> = decode(&url, &body)?;
        debug!(url, count = envelope.maintenance.len(), "Listed maintenance windows");
        Ok(envelope.maintenance)
    }

    async fn get(&self, id: WindowId) -> Result<MaintenanceWindow, ApiError> {
        let url = self.endpoint(&format!("maintenance/{}", id));
        let body = self.send(self.client.get(&url), &url).await?;
        let envelope: Envelope<MaintenanceWindow> = decode(&url, &body)?;
        Ok(envelope.maintenance)
    }

    async fn create(&self, request: &MaintenanceRequest) -> Result<WindowId, ApiError> {
        let url = self.endpoint("maintenance");
        let body = self.send(self.client.post(&url).json(request), &url).await?;
        let envelope: Envelope<Created> = decode(&url, &body)?;
        Ok(WindowId(envelope.maintenance.id))
    }

    async fn update(&self, id: WindowId, request: &MaintenanceRequest) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("maintenance/{}", id));
        let body = self.send(self.client.put(&url).json(request), &url).await?;
        if !body.trim().is_empty() {
            let updated: Updated = decode(&url, &body)?;
            debug!(url, message = updated.message.as_deref().unwrap_or(""), "Maintenance window updated");
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn remote_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    envelope
        .error
        .errormessage
        .or(envelope.error.statusdesc)
        .filter(|m| !m.is_empty())
}

fn transport_error(url: &str, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        warn!(url, "Maintenance API call timed out");
        ApiError::Timeout {
            url: url.to_string(),
        }
    } else {
        warn!(url, error = %e, "Maintenance API network error");
        ApiError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::RecurrenceType;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpMaintenanceClient {
        let config = ClientConfig::new("test-token")
            .with_base_url(&format!("{}/api/3.1", server.uri()))
            .unwrap()
            .with_request_timeout(Duration::from_secs(5));
        HttpMaintenanceClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn list_decodes_envelope_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3.1/maintenance"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "maintenance": [
                    { "id": 1, "description": "a", "from": 10, "to": 20 },
                    { "id": 2, "description": "b", "from": 30, "to": 40 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let listed = client_for(&server).list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].id, 2);
        assert_eq!(listed[1].description, "b");
    }

    #[tokio::test]
    async fn get_decodes_full_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3.1/maintenance/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "maintenance": {
                    "id": 42,
                    "description": "release freeze",
                    "from": 1594900800,
                    "to": 1594904400,
                    "recurrencetype": "none",
                    "repeatevery": 0,
                    "effectiveto": 1594904400,
                    "checks": { "uptime": [11, 12], "tms": [] }
                }
            })))
            .mount(&server)
            .await;

        let window = client_for(&server).get(WindowId(42)).await.unwrap();
        assert_eq!(window.id, 42);
        assert_eq!(window.from, 1_594_900_800);
        assert_eq!(window.recurrencetype, Some(RecurrenceType::None));
        assert_eq!(window.checks.unwrap().uptime, vec![11, 12]);
    }

    #[tokio::test]
    async fn create_posts_json_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/3.1/maintenance"))
            .and(body_json(json!({
                "description": "release freeze",
                "from": 1594900800,
                "to": 1594904400,
                "uptimeids": "1,2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "maintenance": { "id": 42 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = MaintenanceRequest {
            description: Some("release freeze".into()),
            from: Some(1_594_900_800),
            to: Some(1_594_904_400),
            uptimeids: Some("1,2".into()),
            ..MaintenanceRequest::default()
        };
        let id = client_for(&server).create(&request).await.unwrap();
        assert_eq!(id, WindowId(42));
    }

    #[tokio::test]
    async fn update_puts_only_set_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/3.1/maintenance/42"))
            .and(body_json(json!({ "to": 1, "effectiveto": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Maintenance window successfully modified!"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .update(WindowId(42), &MaintenanceRequest::soft_delete())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn remote_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/3.1/maintenance"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "statuscode": 400,
                    "statusdesc": "Bad Request",
                    "errormessage": "Invalid parameter value: to"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create(&MaintenanceRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("Invalid parameter value: to"), "{}", err);
    }

    #[tokio::test]
    async fn error_without_body_uses_status_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3.1/maintenance"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).list().await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert!(err.to_string().contains("Service Unavailable"), "{}", err);
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/3.1/maintenance/5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).get(WindowId(5)).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let config = ClientConfig::new("t")
            .with_base_url("http://127.0.0.1:1/api")
            .unwrap();
        let client = HttpMaintenanceClient::from_config(&config).unwrap();
        let err = client.list().await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. } | ApiError::Timeout { .. }));
    }
}
