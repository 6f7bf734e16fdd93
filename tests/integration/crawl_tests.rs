//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the catalog site and its JSON
//! API and run the full crawl cycle end-to-end against a temporary database.

use catalog_crawler::config::{load_config_with_hash, Config};
use catalog_crawler::crawler::{run_crawl, RunOptions, TraversalOutcome};
use catalog_crawler::product::{DocumentProductRepository, NO_DATA};
use catalog_crawler::state::{FileStateStore, StateStore};
use catalog_crawler::storage::{RunStatus, SqliteStorage, Storage};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a configuration pointing at the mock server and loads it back
fn create_test_config(server: &MockServer, dir: &TempDir) -> (Config, String) {
    let base = server.uri();
    let content = format!(
        r#"
[site]
root-url = "{base}/katalog/c/0/"
api-base-url = "{base}/api"

[crawler]
checkpoint-interval = 1
product-delay-ms = 0
max-retries = 1
retry-base-delay-ms = 1

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "test@example.com"

[session]
warmup-url = "{base}/"

[storage]
database-path = "{db}"
state-file = "{state}"
"#,
        base = base,
        db = dir.path().join("catalog.db").display(),
        state = dir.path().join("state.json").display(),
    );

    let config_path = dir.path().join("crawler.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    load_config_with_hash(&config_path).expect("Failed to load config")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn category_links(hrefs: &[&str]) -> String {
    hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<li class="categories__subcategory"><a class="categories__link" href="{}">x</a></li>"#,
                href
            )
        })
        .collect()
}

fn product_links(articles: &[&str]) -> String {
    articles
        .iter()
        .map(|a| format!(r#"<a class="product-plain__name" href="/katalog/item/p/{}/">x</a>"#, a))
        .collect()
}

async fn mount_session(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .mount(server)
        .await;
}

async fn mount_root(server: &MockServer, children: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/katalog/c/0"))
        .and(header("cookie", "session=abc"))
        .respond_with(html(&category_links(children)))
        .mount(server)
        .await;
}

/// A leaf category header plus its listing pages
async fn mount_leaf(server: &MockServer, category_path: &str, total: u64, pages: &[&[&str]]) {
    Mock::given(method("GET"))
        .and(path(category_path))
        .respond_with(html(&format!(
            r#"<span class="catalog__header-sup">{}</span>{}"#,
            total,
            product_links(pages.first().copied().unwrap_or_default())
        )))
        .mount(server)
        .await;

    for (i, articles) in pages.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(format!("{}/", category_path)))
            .and(query_param("page", i.to_string()))
            .respond_with(html(&product_links(articles)))
            .expect(1)
            .mount(server)
            .await;
    }
}

async fn mount_product(server: &MockServer, article: &str, details: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/product/{}", article)))
        .respond_with(ResponseTemplate::new(200).set_body_json(details))
        .mount(server)
        .await;
}

async fn mount_price_block(server: &MockServer, article: &str, block: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(format!("/api/priceBlock/{}", article)))
        .respond_with(ResponseTemplate::new(200).set_body_json(block))
        .mount(server)
        .await;
}

fn open_products(config: &Config) -> DocumentProductRepository<SqliteStorage> {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .expect("Failed to open database");
    DocumentProductRepository::new(Arc::new(Mutex::new(storage)))
}

#[tokio::test]
async fn test_full_crawl_stores_products() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&server, &dir);

    mount_session(&server).await;
    mount_root(&server, &["/katalog/empty/c/1/", "/katalog/pens/c/2/"]).await;

    // A category with neither subcategories nor products
    Mock::given(method("GET"))
        .and(path("/katalog/empty/c/1"))
        .respond_with(html("<p>Раздел пуст</p>"))
        .mount(&server)
        .await;

    // 65 items make three listing pages; 101 is listed twice
    mount_leaf(
        &server,
        "/katalog/pens/c/2",
        65,
        &[&["101", "102"], &["103", "101"], &["104", "105"]],
    )
    .await;

    mount_product(
        &server,
        "101",
        json!({
            "name": "Ручка шариковая синяя",
            "trademark": { "name": "Attache" },
            "categories": [{ "name": "Канцтовары" }, { "name": "Ручки" }],
            "featureGroups": [{
                "features": [
                    { "name": "Гарантийный срок", "featureValues": [{ "value": "12" }] }
                ]
            }]
        }),
    )
    .await;
    mount_price_block(
        &server,
        "101",
        json!({
            "payload": { "product": {
                "price": { "value": "25.50", "crossedPrice": 30 },
                "stock": { "stockLevel": "120" },
                "unitName": "уп."
            }}
        }),
    )
    .await;

    // Only the details endpoint answers
    mount_product(&server, "102", json!({ "name": "Карандаш" })).await;

    // Only the price endpoint answers
    mount_price_block(
        &server,
        "103",
        json!({ "payload": { "product": { "name": "Ластик", "price": { "value": 10 } } } }),
    )
    .await;

    // 104 has no data at all and must not be stored
    // 105 answers on both endpoints but has no name anywhere
    mount_product(
        &server,
        "105",
        json!({ "description": "<p>Без названия</p>", "trademark": { "name": "Noname" } }),
    )
    .await;
    mount_price_block(
        &server,
        "105",
        json!({ "payload": { "product": { "price": { "value": 5 } } } }),
    )
    .await;

    let report = run_crawl(
        config.clone(),
        &hash,
        RunOptions::default(),
        Arc::new(AtomicBool::new(false)),
    )
    .await
    .expect("Crawl failed");

    assert_eq!(report.outcome, TraversalOutcome::Completed);
    assert_eq!(report.categories_processed, 1);
    assert_eq!(report.products_processed, 3);
    assert_eq!(report.failed_fetches, 0);
    assert!(report.state_cleared);

    let products = open_products(&config);
    assert_eq!(products.count().unwrap(), 3);
    assert!(products.get("104").unwrap().is_none());
    assert!(products.get("105").unwrap().is_none());

    let pen = products.get("101").unwrap().expect("101 not stored");
    assert_eq!(pen.title, "Ручка шариковая синяя");
    assert_eq!(pen.brand, "Attache");
    assert_eq!(pen.category, "Ручки");
    assert_eq!(pen.warranty_months, "12 мес");
    let offer = &pen.suppliers[0].offers[0];
    assert_eq!(offer.prices[0].price, 25.5);
    assert_eq!(offer.prices[0].discount, 15.0);
    assert_eq!(offer.stock, "120");
    assert_eq!(offer.package_info, "уп.");

    let pencil = products.get("102").unwrap().expect("102 not stored");
    assert_eq!(pencil.title, "Карандаш");
    assert_eq!(pencil.suppliers[0].offers[0].stock, NO_DATA);

    let eraser = products.get("103").unwrap().expect("103 not stored");
    assert_eq!(eraser.title, "Ластик");
    assert_eq!(eraser.description, NO_DATA);

    // A completed crawl leaves no progress behind
    let file_store = FileStateStore::new(&config.storage.state_file);
    assert!(file_store.load().unwrap().is_none());

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap();
    let runs = storage.recent_runs(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].products_processed, 3);
}

#[tokio::test]
async fn test_category_limit_then_resume() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&server, &dir);

    mount_session(&server).await;
    mount_root(&server, &["/katalog/a/c/2/", "/katalog/b/c/3/"]).await;

    // Each listing page is expected exactly once across both runs
    mount_leaf(&server, "/katalog/a/c/2", 2, &[&["201", "202"]]).await;
    mount_leaf(&server, "/katalog/b/c/3", 1, &[&["301"]]).await;

    for article in ["201", "202", "301"] {
        mount_product(&server, article, json!({ "name": format!("Товар {}", article) })).await;
    }

    let first = run_crawl(
        config.clone(),
        &hash,
        RunOptions {
            category_limit: Some(1),
            ..Default::default()
        },
        Arc::new(AtomicBool::new(false)),
    )
    .await
    .expect("First run failed");

    assert_eq!(first.outcome, TraversalOutcome::Halted);
    assert_eq!(first.categories_processed, 1);
    assert_eq!(first.products_processed, 2);
    assert!(!first.state_cleared);
    assert_eq!(open_products(&config).count().unwrap(), 2);

    let second = run_crawl(
        config.clone(),
        &hash,
        RunOptions::default(),
        Arc::new(AtomicBool::new(false)),
    )
    .await
    .expect("Second run failed");

    assert_eq!(second.outcome, TraversalOutcome::Completed);
    assert_eq!(second.leaves_handled, 1);
    assert_eq!(second.categories_processed, 2);
    assert_eq!(second.products_processed, 3);
    assert!(second.state_cleared);
    assert_eq!(open_products(&config).count().unwrap(), 3);

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap();
    let runs = storage.recent_runs(5).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[1].status, RunStatus::Halted);
}

#[tokio::test]
async fn test_fresh_run_starts_over() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&server, &dir);

    mount_session(&server).await;
    mount_root(&server, &["/katalog/a/c/2/", "/katalog/b/c/3/"]).await;

    Mock::given(method("GET"))
        .and(path("/katalog/a/c/2"))
        .respond_with(html(r#"<span class="catalog__header-sup">1</span>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/katalog/a/c/2/"))
        .respond_with(html(&product_links(&["201"])))
        .expect(2)
        .mount(&server)
        .await;
    mount_product(&server, "201", json!({ "name": "Товар 201" })).await;

    let limited = RunOptions {
        category_limit: Some(1),
        ..Default::default()
    };
    run_crawl(config.clone(), &hash, limited.clone(), Arc::new(AtomicBool::new(false)))
        .await
        .expect("First run failed");

    let report = run_crawl(
        config.clone(),
        &hash,
        RunOptions {
            fresh: true,
            ..limited
        },
        Arc::new(AtomicBool::new(false)),
    )
    .await
    .expect("Fresh run failed");

    // The first leaf is processed again instead of being skipped
    assert_eq!(report.outcome, TraversalOutcome::Halted);
    assert_eq!(report.leaves_handled, 1);
    assert_eq!(report.categories_processed, 1);
    assert_eq!(open_products(&config).count().unwrap(), 1);
}

#[tokio::test]
async fn test_unreachable_root_fails_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&server, &dir);

    mount_session(&server).await;
    Mock::given(method("GET"))
        .and(path("/katalog/c/0"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = run_crawl(
        config.clone(),
        &hash,
        RunOptions::default(),
        Arc::new(AtomicBool::new(false)),
    )
    .await;

    assert!(matches!(result, Err(catalog_crawler::CrawlError::Fetch(_))));

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path)).unwrap();
    let runs = storage.recent_runs(5).unwrap();
    assert_eq!(runs[0].status, RunStatus::Failed);
}
