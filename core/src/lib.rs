//! Blocking client for the BagelDB content API.
//!
//! # Overview
//! Every operation maps to one HTTP request (one per page when listing a
//! collection) and returns the raw `HttpResponse`. Remote errors are left as
//! status codes for the caller; only transport and local failures are `Err`.
//!
//! # Design
//! - `BagelClient` builds `HttpRequest` values and decodes `HttpResponse`
//!   values without touching the network (host-does-IO pattern).
//! - `BagelDb` runs those requests on a `Transport`, by default a pooled
//!   blocking `reqwest` client.
//! - Collection listings are lazy, restartable page sequences whose paging
//!   mode is chosen per query.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod progress;
pub mod query;
pub mod transport;

pub use client::BagelClient;
pub use config::Config;
pub use db::{BagelDb, CollectionPages};
pub use error::ApiError;
pub use http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use progress::{ProgressReporter, TracingProgress};
pub use query::{CollectionQuery, Filter, Operator, Pagination};
pub use transport::{ReqwestTransport, Transport};
