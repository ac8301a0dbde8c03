use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const ITEM_COUNT_HEADER: &str = "item-count";
pub const DEFAULT_PER_PAGE: usize = 100;

#[derive(Debug, Default)]
pub struct StoredItem {
    pub id: String,
    pub fields: Map<String, Value>,
    /// Nested collections by name; every entry carries its own `_id`.
    pub nested: HashMap<String, Vec<Map<String, Value>>>,
    /// Uploaded image bytes by slug.
    pub images: HashMap<String, Vec<u8>>,
}

impl StoredItem {
    /// Full representation, nested collections included.
    fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        for (name, entries) in &self.nested {
            let list = entries.iter().cloned().map(Value::Object).collect();
            out.insert(name.clone(), Value::Array(list));
        }
        out.insert("_id".to_string(), Value::String(self.id.clone()));
        Value::Object(out)
    }

    /// Listing representation: nested collections only when projected.
    fn to_listing_json(&self, project_on: &[String]) -> Value {
        if project_on.is_empty() {
            let mut out = self.fields.clone();
            out.insert("_id".to_string(), Value::String(self.id.clone()));
            return Value::Object(out);
        }
        let full = self.to_json();
        let mut out = Map::new();
        out.insert("_id".to_string(), Value::String(self.id.clone()));
        for field in project_on {
            if let Some(v) = full.get(field) {
                out.insert(field.clone(), v.clone());
            }
        }
        Value::Object(out)
    }
}

pub type Collections = HashMap<String, Vec<StoredItem>>;
pub type Db = Arc<RwLock<Collections>>;

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    db: Db,
}

pub fn app(token: &str) -> Router {
    let state = AppState {
        token: Arc::from(token),
        db: Arc::new(RwLock::new(HashMap::new())),
    };
    Router::new()
        .route("/collection/{collection}/items", get(list_items).post(create_item))
        .route(
            "/collection/{collection}/items/{id}",
            get(get_item)
                .post(write_nested_item)
                .put(update_item)
                .delete(delete_item),
        )
        .route(
            "/collection/{collection}/items/{id}/image",
            get(get_image).put(put_image),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .with_state(state)
}

pub async fn run(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(token)).await
}

async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|t| !t.is_empty() && t == &*state.token);
    if !authorized {
        tracing::debug!(uri = %request.uri(), "rejecting request without valid bearer token");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    next.run(request).await
}

// --- filters ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Op {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Op::Eq),
            "!=" => Some(Op::Ne),
            ">" => Some(Op::Gt),
            "<" => Some(Op::Lt),
            ">=" => Some(Op::Gte),
            "<=" => Some(Op::Lte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    path: Vec<String>,
    op: Op,
    value: String,
}

impl Filter {
    /// `field:op:value`, or `field:value` meaning equality.
    fn parse(raw: &str) -> Option<Self> {
        let (field, rest) = raw.split_once(':')?;
        let (op, value) = match rest.split_once(':') {
            Some((op, value)) => match Op::parse(op) {
                Some(op) => (op, value),
                None => (Op::Eq, rest),
            },
            None => (Op::Eq, rest),
        };
        Some(Self {
            path: field.split('.').map(str::to_string).collect(),
            op,
            value: value.to_string(),
        })
    }

    fn matches(&self, item: &Value) -> bool {
        let mut current = item;
        for key in &self.path {
            match current.get(key) {
                Some(v) => current = v,
                None => return self.op == Op::Ne,
            }
        }
        let candidates: Vec<&Value> = match current {
            Value::Array(values) => values.iter().collect(),
            other => vec![other],
        };
        match self.op {
            Op::Eq => self
                .value
                .split(',')
                .any(|want| candidates.iter().any(|c| compare(c, want) == Some(Ordering::Equal))),
            Op::Ne => candidates.iter().all(|c| compare(c, &self.value) != Some(Ordering::Equal)),
            Op::Gt => candidates.iter().any(|c| compare(c, &self.value) == Some(Ordering::Greater)),
            Op::Lt => candidates.iter().any(|c| compare(c, &self.value) == Some(Ordering::Less)),
            Op::Gte => candidates
                .iter()
                .any(|c| matches!(compare(c, &self.value), Some(Ordering::Greater | Ordering::Equal))),
            Op::Lte => candidates
                .iter()
                .any(|c| matches!(compare(c, &self.value), Some(Ordering::Less | Ordering::Equal))),
        }
    }
}

/// Numeric comparison when both sides are numbers, string comparison otherwise.
fn compare(stored: &Value, wanted: &str) -> Option<Ordering> {
    let stored_text = match stored {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if let (Ok(a), Ok(b)) = (stored_text.parse::<f64>(), wanted.parse::<f64>()) {
        return a.partial_cmp(&b);
    }
    Some(stored_text.as_str().cmp(wanted))
}

// --- listing ---

#[derive(Debug, Default)]
struct ListParams {
    page: Option<usize>,
    per_page: Option<usize>,
    project_on: Vec<String>,
    filters: Vec<Filter>,
}

impl ListParams {
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, StatusCode> {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "pageNumber" => params.page = Some(value.parse().map_err(|_| StatusCode::BAD_REQUEST)?),
                "perPage" => params.per_page = Some(value.parse().map_err(|_| StatusCode::BAD_REQUEST)?),
                "projectOn" => params
                    .project_on
                    .extend(value.split(',').filter(|f| !f.is_empty()).map(str::to_string)),
                "query" => params
                    .filters
                    .push(Filter::parse(&value).ok_or(StatusCode::BAD_REQUEST)?),
                _ => {}
            }
        }
        Ok(params)
    }
}

async fn list_items(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, StatusCode> {
    let params = ListParams::from_pairs(pairs)?;
    let db = state.db.read().await;
    let matching: Vec<&StoredItem> = db
        .get(&collection)
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    let full = item.to_json();
                    params.filters.iter().all(|f| f.matches(&full))
                })
                .collect()
        })
        .unwrap_or_default();

    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
    let page = params.page.unwrap_or(1).max(1);
    let body: Vec<Value> = matching
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(|item| item.to_listing_json(&params.project_on))
        .collect();

    let mut headers = HeaderMap::new();
    headers.insert(ITEM_COUNT_HEADER, HeaderValue::from(matching.len()));
    Ok((headers, Json(body)).into_response())
}

// --- items ---

fn object(body: Value) -> Result<Map<String, Value>, StatusCode> {
    match body {
        Value::Object(mut map) => {
            map.remove("_id");
            Ok(map)
        }
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

async fn create_item(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let item = StoredItem {
        id: new_id(),
        fields: object(body)?,
        ..Default::default()
    };
    let id = item.id.clone();
    state.db.write().await.entry(collection).or_default().push(item);
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

fn find_item<'a>(db: &'a Collections, collection: &str, id: &str) -> Option<&'a StoredItem> {
    db.get(collection)?.iter().find(|item| item.id == id)
}

fn find_item_mut<'a>(db: &'a mut Collections, collection: &str, id: &str) -> Option<&'a mut StoredItem> {
    db.get_mut(collection)?.iter_mut().find(|item| item.id == id)
}

async fn get_item(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let db = state.db.read().await;
    find_item(&db, &collection, &id)
        .map(|item| Json(item.to_json()))
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
struct NestedParams {
    #[serde(rename = "nestedID")]
    nested_id: Option<String>,
}

/// Split `chapters.<id>` into the nested collection and nested item id.
fn nested_target(nested_id: &str) -> Result<(&str, &str), StatusCode> {
    nested_id.split_once('.').ok_or(StatusCode::BAD_REQUEST)
}

async fn write_nested_item(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<NestedParams>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let nested_name = params.nested_id.ok_or(StatusCode::BAD_REQUEST)?;
    let mut fields = object(body)?;
    let nested_item_id = new_id();
    fields.insert("_id".to_string(), Value::String(nested_item_id.clone()));

    let mut db = state.db.write().await;
    let item = find_item_mut(&mut db, &collection, &id).ok_or(StatusCode::NOT_FOUND)?;
    item.nested.entry(nested_name).or_default().push(fields);
    Ok((StatusCode::CREATED, Json(json!({ "id": nested_item_id }))))
}

async fn update_item(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<NestedParams>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let fields = object(body)?;
    let mut db = state.db.write().await;
    let item = find_item_mut(&mut db, &collection, &id).ok_or(StatusCode::NOT_FOUND)?;

    match params.nested_id.as_deref() {
        Some(nested_id) => {
            let (name, nested_item_id) = nested_target(nested_id)?;
            let entry = item
                .nested
                .get_mut(name)
                .and_then(|list| {
                    list.iter_mut()
                        .find(|e| e.get("_id").and_then(Value::as_str) == Some(nested_item_id))
                })
                .ok_or(StatusCode::NOT_FOUND)?;
            entry.extend(fields);
            Ok(Json(json!({ "id": nested_item_id })))
        }
        None => {
            item.fields.extend(fields);
            Ok(Json(json!({ "id": id })))
        }
    }
}

async fn delete_item(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<NestedParams>,
) -> Result<Json<Value>, StatusCode> {
    let mut db = state.db.write().await;

    match params.nested_id.as_deref() {
        Some(nested_id) => {
            let (name, nested_item_id) = nested_target(nested_id)?;
            let item = find_item_mut(&mut db, &collection, &id).ok_or(StatusCode::NOT_FOUND)?;
            let list = item.nested.get_mut(name).ok_or(StatusCode::NOT_FOUND)?;
            let before = list.len();
            list.retain(|e| e.get("_id").and_then(Value::as_str) != Some(nested_item_id));
            if list.len() == before {
                return Err(StatusCode::NOT_FOUND);
            }
            Ok(Json(json!({ "id": nested_item_id })))
        }
        None => {
            let items = db.get_mut(&collection).ok_or(StatusCode::NOT_FOUND)?;
            let index = items
                .iter()
                .position(|item| item.id == id)
                .ok_or(StatusCode::NOT_FOUND)?;
            items.remove(index);
            Ok(Json(json!({ "id": id })))
        }
    }
}

// --- images ---

#[derive(Debug, Deserialize)]
struct ImageParams {
    #[serde(rename = "imageSlug")]
    image_slug: String,
}

async fn put_image(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<ImageParams>,
    request: Request,
) -> Result<Json<Value>, StatusCode> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (meta, bytes) = if is_multipart {
        let mut multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        let mut upload = None;
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::warn!("failed to read multipart field: {e}");
            StatusCode::BAD_REQUEST
        })? {
            if field.name() == Some("imageFile") {
                let name = field.file_name().unwrap_or("image").to_string();
                let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                upload = Some((name, data.to_vec()));
            }
        }
        let (name, data) = upload.ok_or(StatusCode::BAD_REQUEST)?;
        (json!({ "imageName": name, "size": data.len() }), Some(data))
    } else {
        let Json(body) = Json::<Value>::from_request(request, &state)
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        let link = body
            .get("imageLink")
            .and_then(Value::as_str)
            .ok_or(StatusCode::BAD_REQUEST)?;
        let name = link.rsplit('/').next().unwrap_or(link);
        (json!({ "imageName": name, "imageLink": link }), None)
    };

    let mut db = state.db.write().await;
    let item = find_item_mut(&mut db, &collection, &id).ok_or(StatusCode::NOT_FOUND)?;
    item.fields.insert(params.image_slug.clone(), meta.clone());
    match bytes {
        Some(data) => {
            item.images.insert(params.image_slug, data);
        }
        None => {
            item.images.remove(&params.image_slug);
        }
    }
    Ok(Json(meta))
}

async fn get_image(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<ImageParams>,
) -> Result<Vec<u8>, StatusCode> {
    let db = state.db.read().await;
    find_item(&db, &collection, &id)
        .and_then(|item| item.images.get(&params.image_slug))
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}
