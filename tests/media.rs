//! Media Upload Tests
//!
//! Covers multipart product creation and the standalone upload endpoints.

mod common;

use axum::http::StatusCode;
use common::{app, Part};
use serde_json::json;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";
const MP4: &[u8] = b"\x00\x00\x00\x18ftypmp42";

fn listing_parts<'a>() -> Vec<Part<'a>> {
    vec![
        Part::Text("userId", "8"),
        Part::Text("productName", "Djembe"),
        Part::Text("description", "Goat skin, hand carved"),
        Part::Text("category", "Home & Garden"),
        Part::Text("condition", "New"),
        Part::Text("price", "35000"),
        Part::Text("currency", "XOF"),
        Part::Text("country", "Guinea"),
        Part::Text("city", "Conakry"),
        Part::Text("shippingAvailable", "true"),
    ]
}

// ===========================================================================
// Multipart product creation
// ===========================================================================

#[tokio::test]
async fn multipart_create_uploads_media_in_order() {
    let app = app();
    let mut parts = listing_parts();
    parts.push(Part::File {
        name: "images",
        file_name: "front.png",
        content_type: "image/png",
        bytes: PNG,
    });
    parts.push(Part::File {
        name: "images",
        file_name: "side.jpeg",
        content_type: "image/jpeg",
        bytes: PNG,
    });
    parts.push(Part::File {
        name: "video",
        file_name: "demo.mp4",
        content_type: "video/mp4",
        bytes: MP4,
    });

    let resp = app.post_multipart("/api/products", &parts).await;

    assert_eq!(resp.status, StatusCode::OK, "{}", resp.json());
    let product = &resp.json()["product"];
    assert_eq!(
        product["images"],
        json!(["https://cdn.test/products/1", "https://cdn.test/products/2"])
    );
    assert_eq!(product["videoUrl"], "https://cdn.test/videos/3");
    assert_eq!(product["price"], "35000.00");
    assert_eq!(product["shippingAvailable"], true);
    assert_eq!(product["quantity"], 1);

    let stored = app.stored_objects();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].file_name.as_deref(), Some("front.png"));
    assert_eq!(stored[1].content_type, "image/jpeg");
    assert_eq!(stored[2].folder, "videos");
    assert_eq!(stored[2].len, MP4.len());
}

#[tokio::test]
async fn multipart_create_without_files() {
    let app = app();

    let resp = app.post_multipart("/api/products", &listing_parts()).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["product"]["images"], json!([]));
    assert!(app.stored_objects().is_empty());
}

#[tokio::test]
async fn failed_upload_creates_no_product() {
    let app = app();
    app.fail_uploads();
    let mut parts = listing_parts();
    parts.push(Part::File {
        name: "images",
        file_name: "front.png",
        content_type: "image/png",
        bytes: PNG,
    });

    let resp = app.post_multipart("/api/products", &parts).await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "failed to create product");
    assert_eq!(body["details"], "object storage upload failed");

    let list = app.get("/api/products").await.json();
    assert_eq!(list["products"], json!([]));
}

#[tokio::test]
async fn invalid_listing_uploads_nothing() {
    let app = app();
    let parts = vec![
        Part::Text("userId", "8"),
        Part::Text("productName", "Djembe"),
        Part::File {
            name: "images",
            file_name: "front.png",
            content_type: "image/png",
            bytes: PNG,
        },
    ];

    let resp = app.post_multipart("/api/products", &parts).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(app.stored_objects().is_empty());
}

#[tokio::test]
async fn non_multipart_body_is_rejected_with_envelope() {
    let app = app();

    let resp = app
        .post_raw("/api/products", "application/json", "{\"userId\": 8}")
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["success"], false);
    assert_eq!(resp.error_message(), "invalid multipart body");

    let resp = app
        .post_raw("/api/upload-image", "text/plain", "not a file")
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["success"], false);
    assert!(app.stored_objects().is_empty());
}

#[tokio::test]
async fn multipart_rejects_non_numeric_user() {
    let app = app();
    let mut parts = listing_parts();
    parts[0] = Part::Text("userId", "eight");

    let resp = app.post_multipart("/api/products", &parts).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["details"].as_str().unwrap().contains("userId"));
}

// ===========================================================================
// Standalone uploads
// ===========================================================================

#[tokio::test]
async fn upload_image_returns_url() {
    let app = app();

    let resp = app
        .post_multipart(
            "/api/upload-image",
            &[Part::File {
                name: "image",
                file_name: "shop.webp",
                content_type: "image/webp",
                bytes: PNG,
            }],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json(),
        json!({ "success": true, "url": "https://cdn.test/products/1" })
    );
    assert_eq!(app.stored_objects()[0].content_type, "image/webp");
}

#[tokio::test]
async fn upload_video_goes_to_video_folder() {
    let app = app();

    let resp = app
        .post_multipart(
            "/api/upload-video",
            &[Part::File {
                name: "video",
                file_name: "tour.mp4",
                content_type: "video/mp4",
                bytes: MP4,
            }],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["url"], "https://cdn.test/videos/1");
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() {
    let app = app();

    let resp = app
        .post_multipart("/api/upload-image", &[Part::Text("caption", "hello")])
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["details"], "image: is required");
}

#[tokio::test]
async fn empty_video_is_rejected() {
    let app = app();

    let resp = app
        .post_multipart(
            "/api/upload-video",
            &[Part::File {
                name: "video",
                file_name: "empty.mp4",
                content_type: "video/mp4",
                bytes: b"",
            }],
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(app.stored_objects().is_empty());
}

#[tokio::test]
async fn upload_failure_is_reported() {
    let app = app();
    app.fail_uploads();

    let resp = app
        .post_multipart(
            "/api/upload-image",
            &[Part::File {
                name: "image",
                file_name: "shop.png",
                content_type: "image/png",
                bytes: PNG,
            }],
        )
        .await;

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.error_message(), "failed to upload image");
}
