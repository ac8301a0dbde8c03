//! Executing `HttpRequest`s.
//!
//! `Transport` is the seam between the pure request builder and the network.
//! `ReqwestTransport` is the blocking default; tests and embedders can supply
//! their own.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::Method;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Executes one request and returns the response as data.
///
/// Implementations must hand back non-2xx responses as `Ok`; only failures to
/// obtain a response at all are errors.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a pooled `reqwest::blocking::Client`.
///
/// reqwest never turns a status code into an error on its own, so 4xx/5xx
/// responses come back as data. Bodies are read in full with no size cap.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// `timeout` applies to each whole request; `None` disables it.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { client })
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self.client.request(method(req.method), req.url.as_str());
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &req.body {
            None => builder,
            Some(RequestBody::Json(bytes)) => builder.body(bytes.clone()),
            Some(RequestBody::Multipart(file)) => {
                let part = Part::bytes(file.data.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime)?;
                builder.multipart(Form::new().part(file.field.clone(), part))
            }
        };

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes()?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}
