//! # Catalog API Client
//!
//! The seam between the reconciler and the remote catalog service.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Remote Catalog Endpoints                             │
//! │                                                                         │
//! │  HEAD   /api/menu-items        liveness (no-cache)        probe         │
//! │  GET    /api/menu-items        full catalog               list          │
//! │  GET    /api/menu-items/:id    one item                   get           │
//! │  POST   /api/menu-items        multipart create           create        │
//! │  PUT    /api/menu-items/:id    multipart update           update        │
//! │  DELETE /api/menu-items/:id                               delete        │
//! │  GET    <imageUrl>             existing picture           fetch_image   │
//! │                                                                         │
//! │  Multipart fields:                                                      │
//! │    restaurantId, restaurantName, foodName, category,                    │
//! │    prices  = JSON string {"small": 9.99, ...}                           │
//! │    image   = file part "image.jpg" (optional)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Non-2xx responses become [`SyncError::Remote`] (or `NotFound` /
//! `Unauthorized`) with the message taken from the body's `error` or
//! `message` field.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use menu_core::{ImageRef, ItemId, MenuItem, Prices, ValidatedMenuItem};

use crate::config::{MenuConfig, TimeoutSettings};
use crate::error::{SyncError, SyncResult};

const ITEMS_PATH: &str = "/api/menu-items";

// =============================================================================
// Payload
// =============================================================================

/// Image bytes sent as the `image` file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImageUpload {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        ImageUpload {
            bytes,
            mime: "image/jpeg".to_string(),
        }
    }
}

/// Body of a create or update request.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPayload {
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub food_name: String,
    pub category: String,
    pub prices: Prices,
    pub image: Option<ImageUpload>,
}

impl ItemPayload {
    pub fn from_validated(item: &ValidatedMenuItem, image: Option<ImageUpload>) -> Self {
        ItemPayload {
            restaurant_id: item.restaurant_id.clone(),
            restaurant_name: item.restaurant_name.clone(),
            food_name: item.food_name.clone(),
            category: item.category.clone(),
            prices: item.prices.clone(),
            image,
        }
    }

    /// Builds the payload for replaying a queued item.
    ///
    /// An embedded image is decoded back into bytes. URL and path
    /// references are left for the caller to download with
    /// [`RemoteCatalog::fetch_image`].
    pub fn from_pending(item: &MenuItem) -> SyncResult<Self> {
        let image = match (
            item.image.as_ref().and_then(|i| i.embedded_payload()),
            item.image.as_ref().and_then(|i| i.embedded_mime()),
        ) {
            (Some(payload), mime) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| SyncError::ImageFailed(format!("bad embedded image: {}", e)))?;
                Some(ImageUpload {
                    bytes,
                    mime: mime.unwrap_or("image/jpeg").to_string(),
                })
            }
            (None, _) => None,
        };

        Ok(ItemPayload {
            restaurant_id: item.restaurant_id.clone(),
            restaurant_name: item.restaurant_name.clone(),
            food_name: item.food_name.clone(),
            category: item.category.clone(),
            prices: item.prices.clone(),
            image,
        })
    }

    fn into_form(self) -> SyncResult<Form> {
        let prices = serde_json::to_string(&self.prices)?;

        let mut form = Form::new()
            .text("restaurantId", self.restaurant_id)
            .text("restaurantName", self.restaurant_name)
            .text("foodName", self.food_name)
            .text("category", self.category)
            .text("prices", prices);

        if let Some(image) = self.image {
            let part = Part::bytes(image.bytes)
                .file_name("image.jpg")
                .mime_str(&image.mime)
                .map_err(|e| SyncError::ImageFailed(e.to_string()))?;
            form = form.part("image", part);
        }

        Ok(form)
    }
}

// =============================================================================
// Remote Catalog Trait
// =============================================================================

/// Remote catalog operations used by the prober, reconciler and view.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Sends the liveness request. Any HTTP answer is `Ok(status)`.
    async fn probe(&self) -> SyncResult<u16>;

    async fn list(&self) -> SyncResult<Vec<MenuItem>>;

    async fn get(&self, id: &ItemId) -> SyncResult<MenuItem>;

    /// Creates an item within `timeout`.
    ///
    /// Returns the stored item when the response body describes one.
    async fn create(&self, payload: ItemPayload, timeout: Duration) -> SyncResult<Option<MenuItem>>;

    async fn update(&self, id: &ItemId, payload: ItemPayload) -> SyncResult<Option<MenuItem>>;

    async fn delete(&self, id: &ItemId) -> SyncResult<()>;

    /// Downloads a picture the catalog already serves, so it can be sent
    /// again as the `image` part.
    async fn fetch_image(&self, image: &ImageRef, timeout: Duration) -> SyncResult<ImageUpload>;
}

// =============================================================================
// Response Shapes
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Items(Vec<MenuItem>),
    Wrapped {
        #[serde(alias = "menuItems", alias = "items")]
        data: Vec<MenuItem>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemBody {
    Item(MenuItem),
    Wrapped {
        #[serde(alias = "menuItem", alias = "item")]
        data: MenuItem,
    },
}

impl ItemBody {
    fn into_item(self) -> MenuItem {
        match self {
            ItemBody::Item(item) | ItemBody::Wrapped { data: item } => item,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Pulls a human message out of an error body.
fn error_message(status: StatusCode, text: &str) -> String {
    if let Ok(body) = serde_json::from_str::<ErrorBody>(text) {
        if let Some(msg) = body.error.or(body.message).filter(|m| !m.is_empty()) {
            return msg;
        }
    }
    let trimmed = text.trim();
    if !trimmed.is_empty() && trimmed.len() <= 200 {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

// =============================================================================
// HTTP Client
// =============================================================================

/// reqwest implementation of [`RemoteCatalog`].
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    timeouts: TimeoutSettings,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeouts: TimeoutSettings) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeouts.write())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpCatalogClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeouts,
        })
    }

    pub fn from_config(config: &MenuConfig) -> SyncResult<Self> {
        Self::new(config.catalog_url(), config.timeouts.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn items_url(&self) -> String {
        format!("{}{}", self.base_url, ITEMS_PATH)
    }

    fn item_url(&self, id: &ItemId) -> String {
        format!("{}{}/{}", self.base_url, ITEMS_PATH, id)
    }

    fn no_cache(request: RequestBuilder) -> RequestBuilder {
        request
            .header(reqwest::header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(reqwest::header::PRAGMA, "no-cache")
            .header(reqwest::header::EXPIRES, "0")
    }

    /// Maps non-2xx statuses to errors.
    async fn check_status(response: Response) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = error_message(status, &text);
        warn!(status = status.as_u16(), message = %message, "Catalog request rejected");

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized(message),
            StatusCode::NOT_FOUND => SyncError::NotFound(message),
            _ => SyncError::Remote {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Reads an optional item from a successful write response.
    async fn written_item(response: Response) -> SyncResult<Option<MenuItem>> {
        let text = response.text().await?;
        match serde_json::from_str::<ItemBody>(&text) {
            Ok(body) => Ok(Some(body.into_item())),
            Err(e) => {
                debug!(error = %e, "Write response did not describe an item");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl RemoteCatalog for HttpCatalogClient {
    async fn probe(&self) -> SyncResult<u16> {
        let response = Self::no_cache(self.client.head(self.items_url()))
            .timeout(self.timeouts.probe())
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn list(&self) -> SyncResult<Vec<MenuItem>> {
        let response = Self::no_cache(self.client.get(self.items_url()))
            .query(&[("_", Utc::now().timestamp_millis())])
            .timeout(self.timeouts.read())
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let text = response.text().await?;
        let items = match serde_json::from_str::<ListBody>(&text)? {
            ListBody::Items(items) | ListBody::Wrapped { data: items } => items,
        };

        debug!(count = items.len(), "Fetched remote catalog");
        Ok(items)
    }

    async fn get(&self, id: &ItemId) -> SyncResult<MenuItem> {
        let response = Self::no_cache(self.client.get(self.item_url(id)))
            .timeout(self.timeouts.read())
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let text = response.text().await?;
        Ok(serde_json::from_str::<ItemBody>(&text)?.into_item())
    }

    async fn create(&self, payload: ItemPayload, timeout: Duration) -> SyncResult<Option<MenuItem>> {
        let response = self
            .client
            .post(self.items_url())
            .multipart(payload.into_form()?)
            .timeout(timeout)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Self::written_item(response).await
    }

    async fn update(&self, id: &ItemId, payload: ItemPayload) -> SyncResult<Option<MenuItem>> {
        let response = self
            .client
            .put(self.item_url(id))
            .multipart(payload.into_form()?)
            .timeout(self.timeouts.write())
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Self::written_item(response).await
    }

    async fn delete(&self, id: &ItemId) -> SyncResult<()> {
        let response = self
            .client
            .delete(self.item_url(id))
            .timeout(self.timeouts.write())
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn fetch_image(&self, image: &ImageRef, timeout: Duration) -> SyncResult<ImageUpload> {
        let url = image.resolve(&self.base_url);
        let response = self.client.get(&url).timeout(timeout).send().await?;
        let response = Self::check_status(response).await?;

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|m| m.starts_with("image/"))
            .unwrap_or_else(|| "image/jpeg".to_string());
        let bytes = response.bytes().await?.to_vec();

        debug!(url = %url, size = bytes.len(), "Downloaded existing image");
        Ok(ImageUpload { bytes, mime })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use menu_core::{ImageRef, Money, SizeTier};
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpCatalogClient {
        HttpCatalogClient::new(server.uri(), TimeoutSettings::default()).unwrap()
    }

    fn payload() -> ItemPayload {
        ItemPayload {
            restaurant_id: "64b7f0c2a1d3e4f5a6b7c8d9".into(),
            restaurant_name: "Pizza Palace".into(),
            food_name: "Margherita".into(),
            category: "Pizza".into(),
            prices: Prices::new().with(SizeTier::Small, Money::from_cents(999)),
            image: None,
        }
    }

    fn item_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": id,
            "restaurantId": "64b7f0c2a1d3e4f5a6b7c8d9",
            "restaurantName": "Pizza Palace",
            "foodName": "Margherita",
            "category": "Pizza",
            "prices": { "small": 9.99, "large": "15.99" },
            "imageUrl": "/uploads/margherita.jpg"
        })
    }

    #[tokio::test]
    async fn test_probe_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/api/menu-items"))
            .and(header_exists("cache-control"))
            .and(header("pragma", "no-cache"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert_eq!(client(&server).probe().await.unwrap(), 503);
    }

    #[tokio::test]
    async fn test_list_accepts_plain_and_wrapped_arrays() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/menu-items"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": [item_json("a1"), item_json("b2")] })),
            )
            .mount(&server)
            .await;

        let items = client(&server).list().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].prices.get(SizeTier::Large), Some(Money::from_cents(1599)));
        assert!(matches!(items[0].image, Some(ImageRef::Path(_))));
    }

    #[tokio::test]
    async fn test_list_garbage_is_connectivity_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/menu-items"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = client(&server).list().await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn test_create_sends_multipart_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/menu-items"))
            .and(body_string_contains("name=\"foodName\""))
            .and(body_string_contains("Margherita"))
            .and(body_string_contains("\"small\":9.99"))
            .respond_with(ResponseTemplate::new(201).set_body_json(item_json("srv1")))
            .expect(1)
            .mount(&server)
            .await;

        let created = client(&server)
            .create(payload(), Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.id.as_str(), "srv1");
    }

    #[tokio::test]
    async fn test_error_message_from_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/menu-items/a1"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({ "error": "Invalid prices" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .update(&ItemId::new("a1"), payload())
            .await
            .unwrap_err();
        match err {
            SyncError::Remote { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid prices");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/menu-items/gone"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({ "message": "Menu item not found" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).delete(&ItemId::new("gone")).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(ref m) if m == "Menu item not found"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let client = HttpCatalogClient::new("http://127.0.0.1:9", TimeoutSettings::default()).unwrap();
        let err = client.list().await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[test]
    fn test_payload_from_pending_decodes_image() {
        let mut item = MenuItem {
            id: ItemId::new("temp_1_abc"),
            restaurant_id: "64b7f0c2a1d3e4f5a6b7c8d9".into(),
            restaurant_name: "Pizza Palace".into(),
            food_name: "Margherita".into(),
            category: "Pizza".into(),
            prices: Prices::new(),
            image: Some(ImageRef::embedded("image/png", "aGVsbG8=")),
            created_at: None,
            updated_at: None,
            is_pending: true,
            original_id: None,
            last_error: None,
        };

        let payload = ItemPayload::from_pending(&item).unwrap();
        let image = payload.image.unwrap();
        assert_eq!(image.bytes, b"hello");
        assert_eq!(image.mime, "image/png");

        item.image = ImageRef::parse("https://cdn.example.com/x.jpg");
        assert!(ItemPayload::from_pending(&item).unwrap().image.is_none());

        item.image = Some(ImageRef::embedded("image/jpeg", "!!!"));
        assert!(ItemPayload::from_pending(&item).is_err());
    }

    #[tokio::test]
    async fn test_fetch_image_resolves_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/m.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png-bytes".to_vec()),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let image = ImageRef::parse("/uploads/m.png").unwrap();
        let upload = client
            .fetch_image(&image, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(upload.bytes, b"png-bytes");
        assert_eq!(upload.mime, "image/png");

        let missing = ImageRef::parse("/uploads/gone.png").unwrap();
        assert!(client.fetch_image(&missing, Duration::from_secs(5)).await.is_err());
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"nope"}"#),
            "nope"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
    }
}
