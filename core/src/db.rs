//! Blocking BagelDB client: builds each request with `BagelClient` and runs
//! it on a `Transport`, returning the raw response.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::client::BagelClient;
use crate::config::Config;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::progress::{ProgressReporter, TracingProgress};
use crate::query::{page_count, CollectionQuery, Pagination};
use crate::transport::{ReqwestTransport, Transport};

/// One method per BagelDB operation. Remote errors come back as responses
/// with their status code; only transport and local failures are `Err`.
pub struct BagelDb<T = ReqwestTransport> {
    client: BagelClient,
    transport: T,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl BagelDb<ReqwestTransport> {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(Config::from_env()?)
    }
}

impl<T: Transport> BagelDb<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        let progress: Option<Arc<dyn ProgressReporter>> = if config.progress {
            Some(Arc::new(TracingProgress))
        } else {
            None
        };
        Self {
            client: BagelClient::new(&config),
            transport,
            progress,
        }
    }

    /// Replace the progress reporter used by paginated listings.
    pub fn with_progress(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.progress = Some(Arc::new(reporter));
        self
    }

    pub fn client(&self) -> &BagelClient {
        &self.client
    }

    /// Execute an already-built request.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(request)?;
        tracing::debug!(status = response.status, url = %request.url, "received response");
        Ok(response)
    }

    /// Lazily list a collection, one response per page.
    ///
    /// No request is sent until the returned sequence is iterated.
    pub fn get_collection<'a>(&'a self, collection: &str, query: CollectionQuery) -> CollectionPages<'a, T> {
        CollectionPages {
            db: self,
            collection: collection.to_string(),
            query,
            next_page: 1,
            total_pages: None,
            done: false,
        }
    }

    pub fn get_single_item(&self, collection: &str, item_id: &str) -> Result<HttpResponse, ApiError> {
        self.send(&self.client.build_get_single_item(collection, item_id))
    }

    pub fn create_item<B: Serialize + ?Sized>(&self, collection: &str, item: &B) -> Result<HttpResponse, ApiError> {
        self.send(&self.client.build_create_item(collection, item)?)
    }

    pub fn update_item<B: Serialize + ?Sized>(
        &self,
        collection: &str,
        item_id: &str,
        fields: &B,
    ) -> Result<HttpResponse, ApiError> {
        self.send(&self.client.build_update_item(collection, item_id, fields)?)
    }

    pub fn delete_item(&self, collection: &str, item_id: &str) -> Result<HttpResponse, ApiError> {
        self.send(&self.client.build_delete_item(collection, item_id))
    }

    pub fn write_to_nested_collection<B: Serialize + ?Sized>(
        &self,
        collection: &str,
        item_id: &str,
        nested_collection: &str,
        item: &B,
    ) -> Result<HttpResponse, ApiError> {
        let req = self
            .client
            .build_write_to_nested_collection(collection, item_id, nested_collection, item)?;
        self.send(&req)
    }

    pub fn update_item_in_nested_collection<B: Serialize + ?Sized>(
        &self,
        collection: &str,
        item_id: &str,
        nested_collection: &str,
        nested_item_id: &str,
        fields: &B,
    ) -> Result<HttpResponse, ApiError> {
        let req = self.client.build_update_item_in_nested_collection(
            collection,
            item_id,
            nested_collection,
            nested_item_id,
            fields,
        )?;
        self.send(&req)
    }

    pub fn delete_nested_item(
        &self,
        collection: &str,
        item_id: &str,
        nested_collection: &str,
        nested_item_id: &str,
    ) -> Result<HttpResponse, ApiError> {
        let req = self
            .client
            .build_delete_nested_item(collection, item_id, nested_collection, nested_item_id);
        self.send(&req)
    }

    pub fn add_image_to_item(
        &self,
        collection: &str,
        item_id: &str,
        image_slug: &str,
        image_url: &str,
    ) -> Result<HttpResponse, ApiError> {
        let req = self
            .client
            .build_add_image_to_item(collection, item_id, image_slug, image_url)?;
        self.send(&req)
    }

    pub fn add_local_image_to_item(
        &self,
        collection: &str,
        item_id: &str,
        image_slug: &str,
        path: impl AsRef<Path>,
    ) -> Result<HttpResponse, ApiError> {
        let req = self
            .client
            .build_add_local_image_to_item(collection, item_id, image_slug, path.as_ref())?;
        self.send(&req)
    }
}

/// Lazy, finite, restartable sequence of listing pages.
///
/// With `Pagination::All` the first response's `item-count` header fixes the
/// page count; otherwise exactly one page is fetched. A transport error is
/// yielded once and ends the sequence.
pub struct CollectionPages<'a, T> {
    db: &'a BagelDb<T>,
    collection: String,
    query: CollectionQuery,
    next_page: u32,
    total_pages: Option<u32>,
    done: bool,
}

impl<T: Transport> CollectionPages<'_, T> {
    /// Page count, once the first page has been fetched.
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Rewind to the first page; the next iteration re-fetches everything.
    pub fn restart(&mut self) {
        self.next_page = 1;
        self.total_pages = None;
        self.done = false;
    }

    /// Drain every page and concatenate their JSON arrays.
    pub fn items(self) -> Result<Vec<Value>, ApiError> {
        let db = self.db;
        let mut items = Vec::new();
        for page in self {
            items.extend(db.client.parse_items(&page?)?);
        }
        Ok(items)
    }

    fn fetch(&self, page: u32) -> Result<HttpResponse, ApiError> {
        let req = self
            .db
            .client
            .build_get_collection_page(&self.collection, &self.query, page);
        self.db.send(&req)
    }

    fn total_from_first(&self, first: &HttpResponse) -> u32 {
        if self.query.pagination != Pagination::All || !first.is_success() {
            return 1;
        }
        match self.db.client.parse_item_count(first) {
            Some(count) => page_count(count, self.query.per_page),
            None => {
                tracing::warn!(collection = %self.collection, "listing response has no item-count header");
                1
            }
        }
    }
}

impl<T: Transport> Iterator for CollectionPages<'_, T> {
    type Item = Result<HttpResponse, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(total) = self.total_pages {
            if self.next_page > total {
                self.done = true;
                return None;
            }
        }

        let page = self.next_page;
        let response = match self.fetch(page) {
            Ok(response) => response,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        let total = match self.total_pages {
            Some(total) => total,
            None => {
                let total = self.total_from_first(&response);
                self.total_pages = Some(total);
                total
            }
        };
        if let Some(progress) = &self.db.progress {
            progress.on_page(&self.collection, page, total);
        }
        if page >= total {
            self.done = true;
        } else {
            self.next_page = page + 1;
        }
        Some(Ok(response))
    }
}
