/// Cloud controller space lookups over HTTP

use crate::platform::{SpaceClient, SpaceLookup};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `GET {controller_url}/v3/spaces/{guid}` with an optional bearer token
#[derive(Debug, Clone)]
pub struct CloudControllerSpaceClient {
    client: reqwest::Client,
    controller_url: String,
    token: Option<String>,
}

impl CloudControllerSpaceClient {
    pub fn new(controller_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            controller_url: controller_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn space_url(&self, space_guid: &str) -> String {
        format!("{}/v3/spaces/{}", self.controller_url, space_guid)
    }
}

#[async_trait]
impl SpaceClient for CloudControllerSpaceClient {
    async fn get_space(&self, space_guid: &str) -> SpaceLookup {
        let mut request = self.client.get(self.space_url(space_guid));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!("🌍 Looking up space {}", space_guid);
        match request.send().await {
            Ok(response) if response.status().is_success() => SpaceLookup::Exists,
            Ok(response) if response.status() == StatusCode::NOT_FOUND => SpaceLookup::Absent,
            Ok(response) => SpaceLookup::Unknown(format!(
                "unexpected status {} for space {}",
                response.status(),
                space_guid
            )),
            Err(e) => SpaceLookup::Unknown(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn lookup_with_status(status: u16) -> SpaceLookup {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/spaces/space-1"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let client = CloudControllerSpaceClient::new(server.uri(), None).unwrap();
        client.get_space("space-1").await
    }

    #[tokio::test]
    async fn success_means_space_exists() {
        assert_eq!(lookup_with_status(200).await, SpaceLookup::Exists);
    }

    #[tokio::test]
    async fn not_found_means_space_is_absent() {
        assert_eq!(lookup_with_status(404).await, SpaceLookup::Absent);
    }

    #[tokio::test]
    async fn other_statuses_are_unknown() {
        assert!(matches!(lookup_with_status(500).await, SpaceLookup::Unknown(_)));
        assert!(matches!(lookup_with_status(403).await, SpaceLookup::Unknown(_)));
    }

    #[tokio::test]
    async fn bearer_token_is_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/spaces/space-1"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = CloudControllerSpaceClient::new(format!("{}/", server.uri()), Some("secret".into())).unwrap();

        assert_eq!(client.get_space("space-1").await, SpaceLookup::Exists);
    }

    #[tokio::test]
    async fn unreachable_controller_is_unknown() {
        let client = CloudControllerSpaceClient::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(client.get_space("space-1").await, SpaceLookup::Unknown(_)));
    }
}
