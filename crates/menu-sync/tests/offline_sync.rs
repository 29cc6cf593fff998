//! End-to-end offline scenarios against a mock catalog service.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbImage};
use menu_core::{CatalogFilter, ImageRef, MenuItemDraft, SizeTier};
use menu_store::LocalStore;
use menu_sync::{
    CatalogView, ConnectivityProber, Destination, HttpCatalogClient, ImageUpload, MenuConfig,
    Reconciler, ReplayResult,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn reconciler(base_url: &str, store: &LocalStore) -> Reconciler {
    let config = MenuConfig::default();
    let remote = Arc::new(HttpCatalogClient::new(base_url, config.timeouts.clone()).unwrap());
    let prober = ConnectivityProber::new(remote.clone());
    Reconciler::new(remote, prober, store.clone(), &config)
}

fn view(base_url: &str, store: &LocalStore) -> CatalogView {
    let remote = HttpCatalogClient::new(base_url, MenuConfig::default().timeouts).unwrap();
    CatalogView::new(Arc::new(remote), store.clone())
}

fn draft(name: &str) -> MenuItemDraft {
    MenuItemDraft {
        restaurant_id: "64b7f0c2a1d3e4f5a6b7c8d9".into(),
        restaurant_name: "Pizza Palace".into(),
        food_name: name.into(),
        category: "Pizza".into(),
        ..Default::default()
    }
    .with_price(SizeTier::Small, "9.99")
    .with_price(SizeTier::Large, "15.99")
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn created(name: &str, id: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(serde_json::json!({
        "_id": id,
        "restaurantName": "Pizza Palace",
        "foodName": name,
        "category": "Pizza",
        "prices": { "small": 9.99 }
    }))
}

#[tokio::test]
async fn offline_creates_show_up_next_to_samples() {
    let store = LocalStore::in_memory();
    let r = reconciler(UNREACHABLE, &store);

    for name in ["Item 1", "Item 2", "Item 3"] {
        let outcome = r.create(&draft(name), None).await.unwrap();
        assert!(outcome.is_pending(), "{name} should be queued");
    }

    let listing = view(UNREACHABLE, &store)
        .list(&CatalogFilter::default())
        .await
        .unwrap();

    assert!(listing.is_fallback());
    assert_eq!(listing.pending_count, 3);
    let names: Vec<_> = listing.items.iter().map(|i| i.food_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Margherita Pizza",
            "Chicken Burger",
            "Vegetable Pasta",
            "Item 1",
            "Item 2",
            "Item 3"
        ]
    );
    assert!(listing.items[3..].iter().all(|i| i.is_pending && i.is_temporary()));
}

#[tokio::test]
async fn replay_keeps_only_the_failed_item() {
    let store = LocalStore::in_memory();
    let offline = reconciler(UNREACHABLE, &store);
    for name in ["Item 1", "Item 2", "Item 3"] {
        offline.create(&draft(name), None).await.unwrap();
    }

    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/menu-items"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/menu-items"))
        .and(body_string_contains("Item 2"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({ "error": "Database unavailable" })),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/menu-items"))
        .respond_with(created("Replayed", "srv1"))
        .expect(2)
        .mount(&server)
        .await;

    let online = reconciler(&server.uri(), &store);
    let report = online.replay().await.unwrap();

    assert!(report.attempted);
    assert_eq!((report.succeeded, report.failed), (2, 1));
    let order: Vec<_> = report.entries.iter().map(|e| e.food_name.as_str()).collect();
    assert_eq!(order, vec!["Item 1", "Item 2", "Item 3"]);
    assert!(matches!(report.entries[1].result, ReplayResult::Failed { .. }));

    let left = store.pending_items().load().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].food_name, "Item 2");
    assert!(left[0]
        .last_error
        .as_deref()
        .unwrap()
        .contains("Database unavailable"));
}

#[tokio::test]
async fn queued_image_is_embedded_and_uploaded_on_replay() {
    let store = LocalStore::in_memory();
    let offline = reconciler(UNREACHABLE, &store);

    let upload = ImageUpload {
        bytes: png(1600, 1200),
        mime: "image/png".into(),
    };
    let outcome = offline.create(&draft("Photo Pizza"), Some(upload)).await.unwrap();

    let item = match &outcome.destination {
        Destination::Pending { item, .. } => item.clone(),
        other => panic!("expected a pending item, got {other:?}"),
    };
    let image = item.image.as_ref().unwrap();
    assert!(image.is_embedded());
    assert_eq!(image.embedded_mime(), Some("image/jpeg"));
    assert!(outcome.warnings().is_empty());

    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/menu-items"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/menu-items"))
        .respond_with(created("Photo Pizza", "srv9"))
        .expect(1)
        .mount(&server)
        .await;

    let report = reconciler(&server.uri(), &store).replay().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(
        report.id_mapping(),
        vec![(item.id.clone(), menu_core::ItemId::new("srv9"))]
    );

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let needle = b"filename=\"image.jpg\"";
    assert!(post.body.windows(needle.len()).any(|w| w == needle));
    assert!(store.pending_items().load().await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_edit_hides_the_server_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/menu-items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "_id": "64b7f0c2a1d3e4f5a6b7c8d1",
                "restaurantName": "Pizza Palace",
                "foodName": "Margherita",
                "category": "Pizza",
                "imageUrl": "/uploads/margherita.jpg"
            }
        ])))
        .mount(&server)
        .await;

    let store = LocalStore::in_memory();
    let offline = reconciler(UNREACHABLE, &store);
    let edit = menu_sync::ItemEdit {
        draft: draft("Margherita Deluxe"),
        image: None,
        current_image: ImageRef::parse("/uploads/margherita.jpg"),
    };
    offline.update("64b7f0c2a1d3e4f5a6b7c8d1", edit).await.unwrap();

    let listing = view(&server.uri(), &store)
        .list(&CatalogFilter::default())
        .await
        .unwrap();
    assert!(listing.online);
    assert_eq!(listing.items.len(), 1);
    assert_eq!(listing.items[0].food_name, "Margherita Deluxe");
    assert_eq!(
        listing.items[0].image.as_ref().map(|i| i.as_str()),
        Some("/uploads/margherita.jpg")
    );
}

#[tokio::test]
async fn deleting_a_temporary_item_never_calls_the_service() {
    let store = LocalStore::in_memory();
    let offline = reconciler(UNREACHABLE, &store);
    let queued = offline.create(&draft("Item 1"), None).await.unwrap();
    let temp_id = queued.item().unwrap().id.clone();

    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = reconciler(&server.uri(), &store)
        .delete(temp_id.as_str())
        .await
        .unwrap();
    assert!(matches!(
        outcome.deletion,
        menu_sync::Deletion::Local { remaining: 0, .. }
    ));
    assert!(store.pending_items().load().await.unwrap().is_empty());
}

async fn queue_offline_edit(store: &LocalStore, image: &str) {
    let edit = menu_sync::ItemEdit {
        draft: draft("Margherita Deluxe"),
        image: None,
        current_image: ImageRef::parse(image),
    };
    let outcome = reconciler(UNREACHABLE, store)
        .update("64b7f0c2a1d3e4f5a6b7c8d1", edit)
        .await
        .unwrap();
    assert!(outcome.is_pending());
}

fn has_image_part(body: &[u8]) -> bool {
    let needle = b"filename=\"image.jpg\"";
    body.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn replayed_edit_uploads_the_existing_image_again() {
    let store = LocalStore::in_memory();
    queue_offline_edit(&store, "/uploads/m.jpg").await;

    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/menu-items"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/uploads/m.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(b"existing-jpeg".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/menu-items"))
        .and(body_string_contains("Margherita Deluxe"))
        .respond_with(created("Margherita Deluxe", "srv2"))
        .expect(1)
        .mount(&server)
        .await;

    let report = reconciler(&server.uri(), &store).replay().await.unwrap();
    assert_eq!(report.succeeded, 1);

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    assert!(has_image_part(&post.body));
    let bytes = b"existing-jpeg";
    assert!(post.body.windows(bytes.len()).any(|w| w == bytes));
    assert!(store.pending_items().load().await.unwrap().is_empty());
}

#[tokio::test]
async fn replayed_edit_goes_out_without_an_unreachable_image() {
    let store = LocalStore::in_memory();
    queue_offline_edit(&store, "/uploads/gone.jpg").await;

    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/menu-items"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/menu-items"))
        .respond_with(created("Margherita Deluxe", "srv2"))
        .expect(1)
        .mount(&server)
        .await;

    let report = reconciler(&server.uri(), &store).replay().await.unwrap();
    assert_eq!(report.succeeded, 1);

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    assert!(!has_image_part(&post.body));
}
