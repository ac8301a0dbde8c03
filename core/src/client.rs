//! Stateless HTTP request builder and response parser for the BagelDB API.
//!
//! # Design
//! `BagelClient` holds the base URL and the headers every call carries, and
//! nothing else. Each operation has a `build_*` method that produces an
//! `HttpRequest`; the optional `parse_*` methods decode an `HttpResponse` for
//! callers who want typed bodies. Executing the round-trip is left to a
//! `Transport` (see `BagelDb`).

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::ApiError;
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::query::CollectionQuery;

/// Multipart field the image endpoint reads uploaded bytes from.
pub const IMAGE_FILE_FIELD: &str = "imageFile";
/// JSON field the image endpoint reads a remote image URL from.
pub const IMAGE_LINK_FIELD: &str = "imageLink";
/// Response header carrying the total number of matching items.
pub const ITEM_COUNT_HEADER: &str = "item-count";

/// Synchronous, stateless request builder for the BagelDB API.
#[derive(Debug, Clone)]
pub struct BagelClient {
    base_url: String,
    headers: Vec<(String, String)>,
}

impl BagelClient {
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {}", config.token)),
                ("Accept-Version".to_string(), config.accept_version.clone()),
            ],
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn items_url(&self, collection: &str) -> String {
        format!("{}/collection/{}/items", self.base_url, urlencoding::encode(collection))
    }

    fn item_url(&self, collection: &str, item_id: &str) -> String {
        format!("{}/{}", self.items_url(collection), urlencoding::encode(item_id))
    }

    fn nested_url(&self, collection: &str, item_id: &str, nested_id: &str) -> String {
        format!(
            "{}?nestedID={}",
            self.item_url(collection, item_id),
            urlencoding::encode(nested_id)
        )
    }

    fn image_url(&self, collection: &str, item_id: &str, image_slug: &str) -> String {
        format!(
            "{}/image?imageSlug={}",
            self.item_url(collection, item_id),
            urlencoding::encode(image_slug)
        )
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: self.headers.clone(),
            body: None,
        }
    }

    fn json_request<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        url: String,
        body: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_vec(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut req = self.request(method, url);
        req.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        req.body = Some(RequestBody::Json(body));
        Ok(req)
    }

    /// GET one page of a collection listing. `page` is 1-based and only used
    /// when the query paginates.
    pub fn build_get_collection_page(&self, collection: &str, query: &CollectionQuery, page: u32) -> HttpRequest {
        let mut url = self.items_url(collection);
        let qs = query.to_query_string(page);
        if !qs.is_empty() {
            url.push('?');
            url.push_str(&qs);
        }
        self.request(HttpMethod::Get, url)
    }

    pub fn build_get_single_item(&self, collection: &str, item_id: &str) -> HttpRequest {
        self.request(HttpMethod::Get, self.item_url(collection, item_id))
    }

    pub fn build_create_item<T: Serialize + ?Sized>(
        &self,
        collection: &str,
        item: &T,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, self.items_url(collection), item)
    }

    pub fn build_update_item<T: Serialize + ?Sized>(
        &self,
        collection: &str,
        item_id: &str,
        fields: &T,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, self.item_url(collection, item_id), fields)
    }

    pub fn build_delete_item(&self, collection: &str, item_id: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, self.item_url(collection, item_id))
    }

    pub fn build_write_to_nested_collection<T: Serialize + ?Sized>(
        &self,
        collection: &str,
        item_id: &str,
        nested_collection: &str,
        item: &T,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.nested_url(collection, item_id, nested_collection);
        self.json_request(HttpMethod::Post, url, item)
    }

    pub fn build_update_item_in_nested_collection<T: Serialize + ?Sized>(
        &self,
        collection: &str,
        item_id: &str,
        nested_collection: &str,
        nested_item_id: &str,
        fields: &T,
    ) -> Result<HttpRequest, ApiError> {
        let nested = format!("{nested_collection}.{nested_item_id}");
        let url = self.nested_url(collection, item_id, &nested);
        self.json_request(HttpMethod::Put, url, fields)
    }

    pub fn build_delete_nested_item(
        &self,
        collection: &str,
        item_id: &str,
        nested_collection: &str,
        nested_item_id: &str,
    ) -> HttpRequest {
        let nested = format!("{nested_collection}.{nested_item_id}");
        self.request(HttpMethod::Delete, self.nested_url(collection, item_id, &nested))
    }

    /// Ask the service to fetch `image_url` and store it under `image_slug`.
    pub fn build_add_image_to_item(
        &self,
        collection: &str,
        item_id: &str,
        image_slug: &str,
        image_url: &str,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.image_url(collection, item_id, image_slug);
        let body = serde_json::json!({ IMAGE_LINK_FIELD: image_url });
        self.json_request(HttpMethod::Put, url, &body)
    }

    /// Upload already-loaded image bytes under `image_slug`.
    pub fn build_add_image_bytes_to_item(
        &self,
        collection: &str,
        item_id: &str,
        image_slug: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> HttpRequest {
        let part = FilePart {
            field: IMAGE_FILE_FIELD.to_string(),
            file_name: file_name.to_string(),
            mime: guess_image_mime(Path::new(file_name)).to_string(),
            data,
        };
        let mut req = self.request(HttpMethod::Put, self.image_url(collection, item_id, image_slug));
        req.body = Some(RequestBody::Multipart(part));
        req
    }

    /// Read `path` and build a multipart upload of its bytes.
    pub fn build_add_local_image_to_item(
        &self,
        collection: &str,
        item_id: &str,
        image_slug: &str,
        path: &Path,
    ) -> Result<HttpRequest, ApiError> {
        let data = std::fs::read(path).map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(self.build_add_image_bytes_to_item(collection, item_id, image_slug, &file_name, data))
    }

    /// Decode a single item (GET by id).
    pub fn parse_item(&self, response: &HttpResponse) -> Result<Value, ApiError> {
        check_success(response)?;
        response.json()
    }

    /// Decode a page of a collection listing.
    pub fn parse_items(&self, response: &HttpResponse) -> Result<Vec<Value>, ApiError> {
        check_success(response)?;
        response.json()
    }

    /// Identifier assigned by the service to a created item or nested item.
    pub fn parse_created_id(&self, response: &HttpResponse) -> Result<String, ApiError> {
        check_success(response)?;
        let body: Value = response.json()?;
        body.get("id")
            .or_else(|| body.get("_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::DeserializationError("response has no id".to_string()))
    }

    /// Total matching items reported by a listing response, if present.
    pub fn parse_item_count(&self, response: &HttpResponse) -> Option<u64> {
        response.header(ITEM_COUNT_HEADER)?.trim().parse().ok()
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_success(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.text().into_owned(),
    })
}

/// Content type for an image file, by extension.
fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
