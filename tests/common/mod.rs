#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use farafina::domain::interaction::UserIdentity;
use farafina::infra::memory::MemoryStore;
use farafina::infra::storage::{ObjectStore, Upload};
use farafina::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "farafina-test-boundary";
const UPLOAD_MAX_BYTES: usize = 1024 * 1024;
const STATS_MAX_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Object store double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub folder: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub len: usize,
}

/// Records every upload and hands back `https://cdn.test/{folder}/{n}`.
/// Flip `fail` to make every upload error out.
#[derive(Default)]
pub struct FakeObjectStore {
    pub stored: Mutex<Vec<StoredObject>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn store(&self, upload: Upload, folder: &str) -> anyhow::Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("object storage unavailable"));
        }
        let mut stored = self.stored.lock().unwrap();
        stored.push(StoredObject {
            folder: folder.to_string(),
            file_name: upload.file_name.clone(),
            content_type: upload.content_type().to_string(),
            len: upload.bytes.len(),
        });
        Ok(format!("https://cdn.test/{}/{}", folder, stored.len()))
    }
}

// ---------------------------------------------------------------------------
// TestApp: a fresh router over an empty in-memory store per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub objects: Arc<FakeObjectStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let objects = Arc::new(FakeObjectStore::default());
    let state = AppState::new(
        store.clone(),
        store.clone(),
        objects.clone(),
        UPLOAD_MAX_BYTES,
        STATS_MAX_LIMIT,
    );

    TestApp {
        router: farafina::http::router(state),
        store,
        objects,
    }
}

impl TestApp {
    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.request(request).await
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None).await
    }

    pub async fn delete_json(&self, path: &str, body: Value) -> TestResponse {
        self.send(Method::DELETE, path, Some(body)).await
    }

    pub async fn post_raw(&self, path: &str, content_type: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    pub async fn post_multipart(&self, path: &str, parts: &[Part<'_>]) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.request(request).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    pub fn register_user(&self, id: i64, username: &str) {
        self.store
            .register_user(UserIdentity {
                id,
                username: username.to_string(),
                email: format!("{}@example.com", username),
            })
            .expect("register user failed");
    }

    /// Creates a product through the JSON endpoint. `overrides` is merged
    /// over a valid baseline listing.
    pub async fn create_product(&self, overrides: Value) -> Value {
        let mut body = product_body();
        if let (Some(base), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }

        let resp = self.post_json("/api/products/json", body).await;
        assert_eq!(resp.status, StatusCode::OK, "create failed: {}", resp.json());
        resp.json()["product"].clone()
    }

    pub fn stored_objects(&self) -> Vec<StoredObject> {
        self.objects.stored.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self) {
        self.objects.fail.store(true, Ordering::SeqCst);
    }
}

pub fn product_body() -> Value {
    json!({
        "userId": 1,
        "productName": "Wax print fabric",
        "description": "Six yards, cotton",
        "category": "Clothing",
        "condition": "New",
        "price": "7500.00",
        "currency": "XOF",
        "country": "Senegal",
        "city": "Dakar",
        "shopName": "Marche Sandaga",
        "contactPhone": "+221 77 000 00 00"
    })
}

pub fn product_id(product: &Value) -> i64 {
    product["id"].as_i64().expect("product id")
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
