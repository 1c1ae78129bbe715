//! BHL harvesting against a mocked API.

use std::path::Path;
use std::time::Duration;

use literature_harvester::harvester::{harvest, Completion};
use literature_harvester::http::HttpClient;
use literature_harvester::sources::bhl::{BhlClient, BhlStrategy};
use literature_harvester::{HarvesterConfig, HarvesterError, SourceRegistry};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

fn bhl_config(server: &MockServer, output: &Path, settings: Value) -> HarvesterConfig {
    let mut settings = settings;
    settings["api-url"] = json!(format!("{}/api3", server.uri()));
    HarvesterConfig::builder("bhl")
        .name("BHL")
        .api_key(API_KEY)
        .settings(settings)
        .output_root(output)
        .timeout(Duration::from_secs(5))
        .build()
}

async fn mount_api(server: &MockServer, op: &str, id: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api3"))
        .and(query_param("op", op))
        .and(query_param("id", id))
        .and(query_param("apikey", API_KEY))
        .and(query_param("format", "json"))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, file_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn text_of(xml: &str, tag: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    doc.descendants()
        .find(|node| node.has_tag_name(tag))
        .and_then(|node| node.text())
        .map(String::from)
}

/// Text of a direct child of the document root.
fn field_of(xml: &str, tag: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    doc.root_element()
        .children()
        .find(|node| node.has_tag_name(tag))
        .and_then(|node| node.text())
        .map(String::from)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_harvest_item_writes_artifacts_and_metadata() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_api(
        &server,
        "GetItemMetadata",
        "22314",
        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "ok",
            "ErrorMessage": "",
            "Result": [{
                "ItemID": 22314,
                "ItemUrl": "https://www.biodiversitylibrary.org/item/22314",
                "ItemPDFUrl": format!("{uri}/itempdf/22314"),
                "ItemTextUrl": format!("{uri}/itemtext/22314"),
                "Source": "Internet Archive",
                "Volume": "v.1 (1887)"
            }]
        })),
    )
    .await;
    mount_file(&server, "/itempdf/22314", "%PDF-1.4 scanned pages").await;
    mount_file(&server, "/itemtext/22314", "OCR text of the volume").await;

    let output = TempDir::new().unwrap();
    let config = bhl_config(&server, output.path(), json!({ "items": [22314] }));

    let report = tokio::task::spawn_blocking(move || harvest(&SourceRegistry::default(), &config))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.items, 1);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.metadata_files, 1);
    assert_eq!(report.completion, Completion::Exhausted);

    let root = output.path().join("bhl");
    assert_eq!(
        std::fs::read_to_string(root.join("text/pdf/22314.pdf")).unwrap(),
        "%PDF-1.4 scanned pages"
    );
    assert_eq!(
        std::fs::read_to_string(root.join("text/txt/22314.txt")).unwrap(),
        "OCR text of the volume"
    );

    let xml = std::fs::read_to_string(root.join("metadata/xml/22314.xml")).unwrap();
    assert_eq!(field_of(&xml, "itemID").as_deref(), Some("22314"));
    assert_eq!(field_of(&xml, "Source").as_deref(), Some("BHL"));
    assert_eq!(text_of(&xml, "Volume").as_deref(), Some("v.1 (1887)"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_api_key_aborts_run() {
    let server = MockServer::start().await;

    mount_api(&server, "GetItemMetadata", "1", ResponseTemplate::new(401)).await;

    let output = TempDir::new().unwrap();
    let config = bhl_config(&server, output.path(), json!({ "items": [1, 2] }));

    let report = tokio::task::spawn_blocking(move || harvest(&SourceRegistry::default(), &config))
        .await
        .unwrap()
        .unwrap();

    assert!(report.is_aborted());
    assert_eq!(report.items, 0);

    // Item 2 is never requested once the key was rejected
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_item_is_skipped() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_api(
        &server,
        "GetItemMetadata",
        "404",
        ResponseTemplate::new(200).set_body_json(json!({ "Status": "ok", "Result": [] })),
    )
    .await;
    mount_api(
        &server,
        "GetItemMetadata",
        "405",
        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "ok",
            "Result": [{ "ItemID": 405, "ItemPDFUrl": format!("{uri}/itempdf/405") }]
        })),
    )
    .await;
    mount_file(&server, "/itempdf/405", "%PDF").await;

    let output = TempDir::new().unwrap();
    let config = bhl_config(&server, output.path(), json!({ "items": [404, 405] }));

    let report = tokio::task::spawn_blocking(move || harvest(&SourceRegistry::default(), &config))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.items, 1);
    assert_eq!(report.completion, Completion::Exhausted);
    assert!(output.path().join("bhl/text/pdf/405.pdf").is_file());
    assert!(!output.path().join("bhl/metadata/xml/404.xml").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_download_keeps_metadata() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_api(
        &server,
        "GetItemMetadata",
        "7",
        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "ok",
            "Result": [{
                "ItemID": 7,
                "ItemPDFUrl": format!("{uri}/itempdf/7"),
                "ItemTextUrl": format!("{uri}/itemtext/7")
            }]
        })),
    )
    .await;
    // The PDF is served empty, the text file is missing entirely
    mount_file(&server, "/itempdf/7", "").await;

    let output = TempDir::new().unwrap();
    let config = bhl_config(&server, output.path(), json!({ "items": [7] }));

    let report = tokio::task::spawn_blocking(move || harvest(&SourceRegistry::default(), &config))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.items, 1);
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.failed, 2);
    assert_eq!(report.metadata_files, 1);
    assert!(!output.path().join("bhl/text/pdf/7.pdf").exists());
    assert!(output.path().join("bhl/metadata/xml/7.xml").is_file());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_title_expands_to_items() {
    let server = MockServer::start().await;

    mount_api(
        &server,
        "GetTitleMetadata",
        "60",
        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "ok",
            "Result": [{ "TitleID": 60, "Items": [{ "ItemID": 101 }, { "ItemID": 102 }] }]
        })),
    )
    .await;
    mount_api(
        &server,
        "GetTitleMetadata",
        "64",
        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "ok",
            "Result": [{ "TitleID": 64, "Items": [] }]
        })),
    )
    .await;

    let output = TempDir::new().unwrap();
    let config = bhl_config(&server, output.path(), json!({ "items": [5], "titles": [60, 64] }));

    let strategy = tokio::task::spawn_blocking(move || BhlStrategy::from_config(&config))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(strategy.pending_items(), vec![5, 101, 102]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_title_lookup_fails_harvest() {
    let server = MockServer::start().await;

    mount_api(
        &server,
        "GetTitleMetadata",
        "60",
        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "unauthorized",
            "ErrorMessage": "Invalid API key",
            "Result": null
        })),
    )
    .await;

    let output = TempDir::new().unwrap();
    let config = bhl_config(&server, output.path(), json!({ "titles": [60] }));

    let result = tokio::task::spawn_blocking(move || harvest(&SourceRegistry::default(), &config))
        .await
        .unwrap();

    let err = result.unwrap_err();
    assert!(matches!(err, HarvesterError::Authentication(_)));
    assert!(err.to_string().contains("Invalid API key"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_collection_search_pages_until_empty() {
    let server = MockServer::start().await;

    for (page, result) in [
        ("1", json!([{ "ItemID": 11, "Title": "Flora" }, { "ItemID": 12, "Title": "Fauna" }])),
        ("2", json!([{ "ItemID": 13, "Title": "Mosses" }, { "TitleID": 99, "Title": "No item" }])),
        ("3", json!([])),
    ] {
        Mock::given(method("GET"))
            .and(path("/api3"))
            .and(query_param("op", "PublicationSearchAdvanced"))
            .and(query_param("collection", "42"))
            .and(query_param("language", "ger"))
            .and(query_param("page", page))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "Status": "ok", "Result": result })),
            )
            .mount(&server)
            .await;
    }

    let api_url = format!("{}/api3", server.uri());
    let items = tokio::task::spawn_blocking(move || {
        let client = BhlClient::new(HttpClient::new(Duration::from_secs(5))?, api_url, API_KEY);
        client.get_items_for_collection(42, Some("ger"))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(items.keys().copied().collect::<Vec<_>>(), vec![11, 12, 13]);
    assert_eq!(items[&13], "Mosses");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_all_collections() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api3"))
        .and(query_param("op", "GetCollections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Status": "ok",
            "Result": [
                { "CollectionID": 3, "CollectionName": "Smithsonian Libraries" },
                { "CollectionID": 1, "CollectionName": "Biodiversity Heritage", "CollectionDescription": "Core" }
            ]
        })))
        .mount(&server)
        .await;

    let api_url = format!("{}/api3", server.uri());
    let collections = tokio::task::spawn_blocking(move || {
        let client = BhlClient::new(HttpClient::new(Duration::from_secs(5))?, api_url, API_KEY);
        client.get_all_collections()
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(collections.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(collections[&1].description, "Core");
    assert_eq!(collections[&3].name, "Smithsonian Libraries");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_external_item_is_harvested_from_bibdigital() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_api(
        &server,
        "GetItemMetadata",
        "300",
        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "ok",
            "Result": [{
                "ItemID": 300,
                "ItemPDFUrl": format!("{uri}/itempdf/300"),
                "Source": "Real Jardín Botánico, CSIC",
                "ExternalUrl": format!("{uri}/idurl/1/15729")
            }]
        })),
    )
    .await;

    let record_page = std::fs::read_to_string(format!(
        "{}/tests/fixtures/bibdigital/record_15729.html",
        env!("CARGO_MANIFEST_DIR")
    ))
    .unwrap();
    mount_file(&server, "/en/records/item/15729-redirection", &record_page).await;
    mount_file(&server, "/medias/fd/15729.pdf", "%PDF Flora de Filipinas").await;

    let output = TempDir::new().unwrap();
    let config = bhl_config(&server, output.path(), json!({ "items": [300] }));

    let report = tokio::task::spawn_blocking(move || harvest(&SourceRegistry::default(), &config))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.items, 1);
    assert_eq!(report.downloaded, 1);

    let root = output.path().join("bhl");
    assert_eq!(
        std::fs::read_to_string(root.join("text/pdf/300.pdf")).unwrap(),
        "%PDF Flora de Filipinas"
    );

    let xml = std::fs::read_to_string(root.join("metadata/xml/300.xml")).unwrap();
    assert_eq!(field_of(&xml, "itemID").as_deref(), Some("300"));
    assert_eq!(field_of(&xml, "Source").as_deref(), Some("Real Jardín Botánico"));
    assert_eq!(text_of(&xml, "publicationYear").as_deref(), Some("1837"));

    // The BHL scan is not downloaded for externally hosted items
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/itempdf/300"));
}
