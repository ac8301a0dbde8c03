use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::Value;
use tower::ServiceExt;

const TOKEN: &str = "test-token";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn authed(method: &str, uri: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    authed(method, uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    authed(method, uri).body(String::new()).unwrap()
}

async fn send(app: &axum::Router, req: Request<String>) -> axum::response::Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn create(app: &axum::Router, collection: &str, body: &str) -> String {
    let resp = send(app, json_request("POST", &format!("/collection/{collection}/items"), body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_str().unwrap().to_string()
}

// --- auth ---

#[tokio::test]
async fn missing_token_returns_401() {
    let resp = app(TOKEN)
        .oneshot(
            Request::builder()
                .uri("/collection/articles/items")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_bearer_returns_401() {
    let resp = app(TOKEN)
        .oneshot(
            Request::builder()
                .uri("/collection/articles/items")
                .header(http::header::AUTHORIZATION, "Bearer ")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- list ---

#[tokio::test]
async fn list_unknown_collection_is_empty() {
    let resp = send(&app(TOKEN), empty_request("GET", "/collection/articles/items")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["item-count"], "0");
    assert_eq!(body_json(resp).await, Value::Array(Vec::new()));
}

#[tokio::test]
async fn list_pages_and_reports_item_count() {
    let app = app(TOKEN);
    for n in 0..5 {
        create(&app, "numbers", &format!(r#"{{"n":{n}}}"#)).await;
    }

    let resp = send(
        &app,
        empty_request("GET", "/collection/numbers/items?pageNumber=3&perPage=2"),
    )
    .await;
    assert_eq!(resp.headers()["item-count"], "5");
    let page = body_json(resp).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["n"], 4);
}

#[tokio::test]
async fn list_applies_filters_and_projection() {
    let app = app(TOKEN);
    create(&app, "articles", r#"{"title":"a","views":3}"#).await;
    create(&app, "articles", r#"{"title":"b","views":12}"#).await;
    create(&app, "articles", r#"{"title":"c","views":40}"#).await;

    let resp = send(
        &app,
        empty_request(
            "GET",
            "/collection/articles/items?projectOn=title&query=views:%3E:10&query=title:!%3D:c",
        ),
    )
    .await;
    assert_eq!(resp.headers()["item-count"], "1");
    let items = body_json(resp).await;
    assert_eq!(items[0]["title"], "b");
    assert!(items[0].get("views").is_none());
}

#[tokio::test]
async fn malformed_filter_returns_400() {
    let resp = send(&app(TOKEN), empty_request("GET", "/collection/a/items?query=bogus")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- get / delete ---

#[tokio::test]
async fn get_item_not_found() {
    let resp = send(&app(TOKEN), empty_request("GET", "/collection/articles/items/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_twice_returns_404_second_time() {
    let app = app(TOKEN);
    let id = create(&app, "articles", r#"{"title":"x"}"#).await;
    let uri = format!("/collection/articles/items/{id}");

    assert_eq!(send(&app, empty_request("DELETE", &uri)).await.status(), StatusCode::OK);
    assert_eq!(send(&app, empty_request("DELETE", &uri)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_non_object() {
    let resp = send(&app(TOKEN), json_request("POST", "/collection/a/items", "[1,2]")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- nested ---

#[tokio::test]
async fn nested_collection_lifecycle() {
    let app = app(TOKEN);
    let id = create(&app, "books", r#"{"title":"Dune"}"#).await;
    let item_uri = format!("/collection/books/items/{id}");

    let resp = send(
        &app,
        json_request("POST", &format!("{item_uri}?nestedID=chapters"), r#"{"name":"one"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let chapter_id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        json_request(
            "PUT",
            &format!("{item_uri}?nestedID=chapters.{chapter_id}"),
            r#"{"name":"One"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let item = body_json(send(&app, empty_request("GET", &item_uri)).await).await;
    assert_eq!(item["chapters"][0]["name"], "One");
    assert_eq!(item["title"], "Dune");

    // listing leaves nested collections out unless projected
    let listed = body_json(send(&app, empty_request("GET", "/collection/books/items")).await).await;
    assert!(listed[0].get("chapters").is_none());

    let resp = send(
        &app,
        empty_request("DELETE", &format!("{item_uri}?nestedID=chapters.{chapter_id}")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let item = body_json(send(&app, empty_request("GET", &item_uri)).await).await;
    assert_eq!(item["chapters"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn nested_write_without_nested_id_returns_400() {
    let app = app(TOKEN);
    let id = create(&app, "books", r#"{}"#).await;
    let resp = send(
        &app,
        json_request("POST", &format!("/collection/books/items/{id}"), r#"{}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- images ---

#[tokio::test]
async fn image_by_link_is_recorded_on_item() {
    let app = app(TOKEN);
    let id = create(&app, "articles", r#"{}"#).await;
    let resp = send(
        &app,
        json_request(
            "PUT",
            &format!("/collection/articles/items/{id}/image?imageSlug=logo"),
            r#"{"imageLink":"https://img.test/logo.png"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let item = body_json(
        send(&app, empty_request("GET", &format!("/collection/articles/items/{id}"))).await,
    )
    .await;
    assert_eq!(item["logo"]["imageLink"], "https://img.test/logo.png");
    assert_eq!(item["logo"]["imageName"], "logo.png");
}

#[tokio::test]
async fn image_upload_stores_raw_bytes() {
    let app = app(TOKEN);
    let id = create(&app, "articles", r#"{}"#).await;
    let uri = format!("/collection/articles/items/{id}/image?imageSlug=logo");

    let body = "--XYZ\r\n\
        Content-Disposition: form-data; name=\"imageFile\"; filename=\"logo.png\"\r\n\
        Content-Type: image/png\r\n\r\n\
        PNGDATA\r\n\
        --XYZ--\r\n";
    let req = authed("PUT", &uri)
        .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
        .body(body.to_string())
        .unwrap();
    let resp = send(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let meta = body_json(resp).await;
    assert_eq!(meta["imageName"], "logo.png");
    assert_eq!(meta["size"], 7);

    let stored = body_bytes(send(&app, empty_request("GET", &uri)).await).await;
    assert_eq!(&stored[..], b"PNGDATA");
}

#[tokio::test]
async fn image_on_missing_item_returns_404() {
    let resp = send(
        &app(TOKEN),
        json_request(
            "PUT",
            "/collection/articles/items/nope/image?imageSlug=logo",
            r#"{"imageLink":"https://img.test/a.png"}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
