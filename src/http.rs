//! HTTP request/response types and the transport capability the cache wraps.
//!
//! `HttpTransport` abstracts the network call for testability.
//! `ReqwestTransport` sends real requests through `reqwest`.
//! The cache engine implements `HttpTransport` itself, so a cached transport
//! can stand in wherever the plain one was used.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::error::Result;

/// Callback receiving body chunks as they arrive.
pub type ChunkCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Where the response body goes.
#[derive(Clone, Default)]
pub enum BodyDelivery {
    /// Collect the whole body into [`HttpResponse::body`].
    #[default]
    Buffered,
    /// Hand every chunk to the callback; the response body stays empty.
    Callback(ChunkCallback),
}

impl fmt::Debug for BodyDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyDelivery::Buffered => f.write_str("Buffered"),
            BodyDelivery::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    pub headers: HeaderMap,
    pub delivery: BodyDelivery,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            delivery: BodyDelivery::Buffered,
        }
    }

    /// Plain buffered GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Add a header, ignoring names or values that are not valid HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_delivery(mut self, delivery: BodyDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Value of a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A received HTTP response with a fully buffered body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Insert or replace a header, ignoring invalid names or values.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The request-execution capability a cache can decorate.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and return the response.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request).await
    }
}

/// Real transport backed by a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            delivery,
        } = request;
        debug!(%method, %url, "sending HTTP request");

        let mut response = self
            .client
            .request(method.clone(), &url)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        debug!(%method, %url, %status, "received HTTP response");

        let body = match delivery {
            BodyDelivery::Buffered => response.bytes().await?.to_vec(),
            BodyDelivery::Callback(callback) => {
                while let Some(chunk) = response.chunk().await? {
                    callback(&chunk);
                }
                Vec::new()
            }
        };

        Ok(HttpResponse {
            url: final_url,
            status,
            headers,
            body,
        })
    }
}
