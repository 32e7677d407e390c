//! HTTP client that classifies every failure and retries on transient ones.

use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::sync::Arc;

use super::retry::{RetryConfig, with_retry};
use crate::classify::{ErrorHandler, FailedResponse};
use crate::error::ClientError;

/// HTTP client with an injected [`ErrorHandler`] and classification-aware
/// retries.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    handler: Arc<dyn ErrorHandler>,
    retry: RetryConfig,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client, handing
    /// failures to `handler`.
    pub fn new(client: Client, handler: Arc<dyn ErrorHandler>, retry: RetryConfig) -> Self {
        Self {
            client,
            handler,
            retry,
        }
    }

    /// Returns the retry settings applied to every call.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Performs a GET request and deserializes the JSON response.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        debug!("GET JSON from {}...", url);

        with_retry(&self.retry, "GET JSON", || async move {
            self.fetch_json(url, self.client.get(url)).await
        })
        .await
    }

    /// Performs a GET request with query parameters and deserializes the JSON
    /// response.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        debug!("GET JSON from {} with query {:?}...", url, query);

        with_retry(&self.retry, "GET JSON with query", || async move {
            self.fetch_json(url, self.client.get(url).query(query))
                .await
        })
        .await
    }

    /// Streams a response body into a writer made by `create_writer`.
    ///
    /// `create_writer` is called once per attempt, so a retried download starts
    /// from a fresh sink. Returns the number of bytes written.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<u64, ClientError>
    where
        W: Write,
        F: Fn() -> std::io::Result<W>,
    {
        self.download_file_with_query(url, &[], create_writer).await
    }

    /// Like [`HttpClient::download_file`], with query parameters on the request.
    #[tracing::instrument(skip(self, query, create_writer))]
    pub async fn download_file_with_query<W, F>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        create_writer: F,
    ) -> Result<u64, ClientError>
    where
        W: Write,
        F: Fn() -> std::io::Result<W>,
    {
        debug!("Downloading file from {} with query {:?}...", url, query);

        let create_writer = &create_writer;
        with_retry(&self.retry, "Download", || async move {
            self.download_file_once(url, self.client.get(url).query(query), create_writer)
                .await
        })
        .await
    }

    async fn download_file_once<W, F>(
        &self,
        url: &str,
        request: RequestBuilder,
        create_writer: &F,
    ) -> Result<u64, ClientError>
    where
        W: Write,
        F: Fn() -> std::io::Result<W>,
    {
        let mut response = self.send(url, request).await?;

        let io_error = |source: std::io::Error| ClientError::Io {
            url: url.to_string(),
            source,
        };
        let mut writer = create_writer().map_err(io_error)?;
        let mut downloaded_bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.handler.handle_transport(url, e))?
        {
            writer.write_all(&chunk).map_err(io_error)?;
            downloaded_bytes += chunk.len() as u64;
        }
        writer.flush().map_err(io_error)?;

        debug!(
            "Downloaded {:.2} MB",
            downloaded_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(downloaded_bytes)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let body = self
            .send(url, request)
            .await?
            .bytes()
            .await
            .map_err(|e| self.handler.handle_transport(url, e))?;

        serde_json::from_slice(&body).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Sends a request, handing any failure to the error handler.
    async fn send(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.handler.handle_transport(url, e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let failed = FailedResponse::read(response).await;
        Err(self.handler.handle_status(&failed))
    }
}
