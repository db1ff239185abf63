use crate::error::{Error, HttpError};
use crate::log::LogHandle;

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;

/// Thin reqwest wrapper for the node HTTP API.
#[derive(Clone, Debug)]
pub struct HttpPoster {
    client: Client,
}

impl HttpPoster {
    /// Creates a poster whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`HttpError::Client`] when the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HttpError::Client)?;
        Ok(Self { client })
    }

    /// `POST http://<node>/v1/event`, returning the response body on success.
    ///
    /// # Errors
    ///
    /// [`HttpError::Request`] on transport failure, [`HttpError::Status`] on a
    /// non-2xx answer.
    pub async fn post_event(&self, node: &str, body: Bytes) -> Result<Bytes, HttpError> {
        let url = format!("http://{node}/v1/event");
        let response = self
            .client
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(|source| HttpError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| HttpError::Request {
                url: url.clone(),
                source,
            })?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(HttpError::Status { url, status, body })
        }
    }

    /// Tries `nodes` in order and returns the first successful response body.
    ///
    /// # Errors
    ///
    /// The last node's [`HttpError`] when every node failed.
    pub async fn publish_first(
        &self,
        nodes: &[String],
        body: Bytes,
        log: &LogHandle,
    ) -> Result<Bytes, Error> {
        let mut last_error = None;

        for node in nodes {
            match self.post_event(node, body.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    log.error(format_args!("{e}"));
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map_or(Error::NoAvailableNode { source: None }, Error::Http))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::routing::post;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_post_honours_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let node = listener.local_addr().unwrap().to_string();
        let router = Router::new().route(
            "/v1/event",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let poster = HttpPoster::new(Duration::from_millis(100)).unwrap();

        let started = std::time::Instant::now();
        let err = poster.post_event(&node, Bytes::from("x")).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(err, HttpError::Request { ref source, .. } if source.is_timeout()));
    }
}
