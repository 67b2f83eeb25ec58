use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use tracing::{error, info};

use crate::{
    constants::{ARCHIVE_PATH, FEED_TIMEOUT, MAX_BATCH_SIZE, UHD_HEIGHT, UHD_WIDTH},
    domain::retry::RetryPolicy,
    entities::{image::ImageBatch, zone::Zone},
    errors::FetchError,
    repositories::feed::ImageFeed,
};

/// Client for the `HPImageArchive` metadata endpoint.
#[derive(Clone)]
pub struct BingFeedClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    timeout: Duration,
}

impl BingFeedClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        BingFeedClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
            timeout: FEED_TIMEOUT,
        }
    }

    fn query(offset: u32, count: u8, zone: Zone) -> Vec<(&'static str, String)> {
        vec![
            ("format", "js".to_string()),
            ("idx", offset.to_string()),
            ("n", count.to_string()),
            ("nc", (Utc::now().timestamp() / 1000).to_string()),
            ("pid", "hp".to_string()),
            ("ensearch", zone.ensearch().to_string()),
            ("quiz", "1".to_string()),
            ("og", "1".to_string()),
            ("uhd", "1".to_string()),
            ("uhdwidth", UHD_WIDTH.to_string()),
            ("uhdheight", UHD_HEIGHT.to_string()),
        ]
    }

    async fn fetch_once(
        &self,
        offset: u32,
        count: u8,
        zone: Zone,
        attempt: u32,
    ) -> Result<ImageBatch, FetchError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, ARCHIVE_PATH))
            .query(&Self::query(offset, count, zone))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| log_transport_error(FetchError::from(e), attempt))?;

        let status = response.status();
        if status != StatusCode::OK {
            info!(target: "bing::feed", attempt, status = status.as_u16(), "Failed to get images");
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json::<ImageBatch>()
            .await
            .map_err(|e| log_transport_error(FetchError::from(e), attempt))
    }
}

fn log_transport_error(err: FetchError, attempt: u32) -> FetchError {
    match &err {
        FetchError::Timeout => info!(target: "bing::feed", attempt, "Timed out getting images"),
        _ => error!(target: "bing::feed", attempt, "Failed to get images: {}", err),
    }
    err
}

#[async_trait]
impl ImageFeed for BingFeedClient {
    async fn fetch(&self, offset: u32, count: u8, zone: Zone) -> Result<ImageBatch, FetchError> {
        let count = count.min(MAX_BATCH_SIZE);

        let batch = self
            .policy
            .run(|attempt| self.fetch_once(offset, count, zone, attempt))
            .await?;

        info!(target: "bing::feed", %zone, offset, images = batch.len(), "Fetched image batch");
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const BODY: &str = r#"{
        "images": [
            {"startdate": "20240115", "url": "/th?id=OHR.Foo&rf=Foo.jpg", "copyright": "X", "hsh": "abc123"},
            {"startdate": "20240114", "url": "/th?id=OHR.Bar_UHD.jpg&rf=Bar.jpg", "copyright": "Y", "hsh": "def456"}
        ],
        "tooltips": {"loading": "Loading..."}
    }"#;

    fn archive_path() -> Matcher {
        Matcher::Regex(r"^/HPImageArchive\.aspx".to_string())
    }

    fn client(server: &Server) -> BingFeedClient {
        BingFeedClient::new(Client::new(), &server.url())
    }

    #[tokio::test]
    async fn fetch_sends_archive_query_and_keeps_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", archive_path())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("format".into(), "js".into()),
                Matcher::UrlEncoded("idx".into(), "0".into()),
                Matcher::UrlEncoded("n".into(), "8".into()),
                Matcher::UrlEncoded("pid".into(), "hp".into()),
                Matcher::UrlEncoded("ensearch".into(), "1".into()),
                Matcher::UrlEncoded("uhd".into(), "1".into()),
                Matcher::UrlEncoded("uhdwidth".into(), "3840".into()),
                Matcher::UrlEncoded("uhdheight".into(), "2160".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let batch = client(&server).fetch(0, 8, Zone::En).await.unwrap();

        mock.assert_async().await;
        let hashes: Vec<_> = batch.images.iter().map(|i| i.hsh.as_str()).collect();
        assert_eq!(hashes, ["abc123", "def456"]);
    }

    #[tokio::test]
    async fn count_is_clamped_to_feed_maximum() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", archive_path())
            .match_query(Matcher::UrlEncoded("n".into(), "8".into()))
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        client(&server).fetch(0, 50, Zone::Cn).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_retried_three_times() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", archive_path())
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = client(&server).fetch(0, 8, Zone::Cn).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn undecodable_body_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", archive_path())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .expect(1)
            .create_async()
            .await;

        let err = client(&server).fetch(0, 8, Zone::Cn).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn connection_failure_is_fatal() {
        let feed = BingFeedClient::new(Client::new(), "http://127.0.0.1:9");

        let err = feed.fetch(0, 8, Zone::Cn).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn request_timeout_is_retried_three_times() {
        let feed = BingFeedClient {
            timeout: Duration::from_millis(200),
            ..BingFeedClient::new(Client::new(), &crate::http::silent_server().await)
        };

        let err = feed.fetch(0, 8, Zone::Cn).await.unwrap_err();

        match err {
            FetchError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, FetchError::Timeout);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
