//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a fake catalog and drive the full
//! groups -> diagrams -> reconcile cycle through the HTTP render backend.

use partsouq_harvester::config::{
    load_config, Config, CrawlerConfig, OutputConfig, ReconcileConfig, RenderBackend, RenderConfig,
    SessionConfig,
};
use partsouq_harvester::crawler::Coordinator;
use partsouq_harvester::storage::{CatalogStore, Pagination, SqliteStorage};
use partsouq_harvester::{DiagramKey, HarvestError};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GROUPS_PATH: &str = "/en/catalog/genuine/groups/";
const PARTS_PATH: &str = "/en/catalog/genuine/parts";

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(base_url: &str, db_path: &str, use_page_cache: bool) -> Config {
    Config {
        session: SessionConfig {
            car: "TOYOTA00".to_string(),
            ssd: "tok".to_string(),
            base_url: base_url.to_string(),
        },
        render: RenderConfig {
            backend: RenderBackend::Http,
            settle_ms: 0,
            timeout_ms: 5_000,
            ..RenderConfig::default()
        },
        crawler: CrawlerConfig {
            page_size: 50,
            request_delay_ms: 0,
            workers: 1,
            use_page_cache,
        },
        reconcile: ReconcileConfig::default(),
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

/// A listing with one header (100) over five leaf groups and one sub-header
fn listing_html() -> String {
    let mut rows = String::from(r#"<tr class="treegrid-100"><td>Engine</td></tr>"#);
    for gid in 1..=5 {
        rows.push_str(&format!(
            r#"<tr class="treegrid-{gid} treegrid-parent-100">
                 <td><a href="/en/catalog/genuine/parts?c=TOYOTA00&ssd=tok&gid={gid}">Unit {gid}</a></td>
               </tr>"#,
            gid = gid
        ));
    }
    rows.push_str(r#"<tr class="treegrid-6 treegrid-parent-100"><td>Fuel</td></tr>"#);
    format!(
        r#"<html><body><table class="tree"><tbody>{}</tbody></table></body></html>"#,
        rows
    )
}

/// Two panels: one part in the first, two in the second
fn diagrams_html(gid: i64) -> String {
    format!(
        r#"<html><body>
        <div class="panel panel-default"><h2>Intake {gid}</h2>
          <img src="/img/{gid}-0.png">
          <table><tbody>
            <tr><th>Number</th><th>Name</th></tr>
            <tr><td>17801-{gid:05}</td><td>Air Filter</td><td>X</td><td></td><td>X</td><td>1998-2002</td></tr>
          </tbody></table>
        </div>
        <div class="panel panel-default"><h2>Exhaust {gid}</h2>
          <table><tbody>
            <tr><td>17410-{gid:05}</td><td>Pipe</td><td></td><td>front</td><td>02</td><td></td></tr>
            <tr><td>90080-{gid:05}</td><td>Gasket</td><td></td><td></td><td>004</td><td></td></tr>
          </tbody></table>
        </div>
        </body></html>"#,
        gid = gid
    )
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(GROUPS_PATH))
        .and(query_param("c", "TOYOTA00"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_html())
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Serves every group's diagrams page except `failing`, which returns 500
async fn mount_diagrams(server: &MockServer, failing: Option<i64>, expected_hits: Option<u64>) {
    for gid in 1..=5 {
        let response = if Some(gid) == failing {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200)
                .set_body_string(diagrams_html(gid))
                .insert_header("content-type", "text/html")
        };

        let mock = Mock::given(method("GET"))
            .and(path(PARTS_PATH))
            .and(query_param("gid", gid.to_string().as_str()))
            .respond_with(response);
        let mock = match expected_hits {
            Some(hits) if Some(gid) != failing => mock.expect(hits),
            _ => mock,
        };
        mock.mount(server).await;
    }
}

fn open_db(path: &Path) -> SqliteStorage {
    SqliteStorage::new(path).expect("Failed to open database")
}

#[tokio::test]
async fn test_full_harvest_with_failing_group() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;
    mount_diagrams(&mock_server, Some(3), None).await;

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), false);

    let coordinator = Coordinator::new(config, false, CancellationToken::new())
        .expect("Failed to create coordinator");
    let summary = coordinator
        .harvest_diagrams(50, 0)
        .await
        .expect("Harvest failed");
    coordinator.close().await.unwrap();

    // Group #3 is skipped, the others complete
    assert_eq!(summary.outcome.succeeded, vec![1, 2, 4, 5]);
    assert_eq!(summary.outcome.failed.len(), 1);
    assert_eq!(summary.outcome.failed[0].group_id, 3);
    assert!(!summary.outcome.cancelled);

    assert_eq!(summary.diagrams.written.inserted, 8);
    assert_eq!(summary.parts.written.inserted, 12);
    assert!(summary.diagrams.is_clean());
    assert!(summary.parts.is_clean());

    let storage = open_db(&db_path);
    let counts = storage.counts().unwrap();
    assert_eq!(counts.groups, 7);
    assert_eq!(counts.groups_with_diagrams, 5);
    assert_eq!(counts.diagrams, 8);
    assert_eq!(counts.parts, 12);

    let group = storage.get_group_by_id(2).unwrap().unwrap();
    assert_eq!(group.parent_group_id, Some(100));
    assert!(group.diagrams_url.unwrap().contains("gid=2"));

    let diagram = storage
        .get_diagram_by_key(DiagramKey::new(2, 0))
        .unwrap()
        .unwrap();
    assert_eq!(diagram.id, 20);
    assert_eq!(diagram.name, "Intake 2");
    assert!(diagram.img_url.unwrap().ends_with("/img/2-0.png"));

    let parts = storage
        .get_parts_for_diagram(DiagramKey::new(2, 1))
        .unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].parent_diagram_id, 21);
    assert_eq!(parts[0].amount, Some(2));
    assert_eq!(parts[0].note, "front");
    assert_eq!(parts[1].amount, Some(4));

    let filters = storage
        .get_parts_for_diagram(DiagramKey::new(2, 0))
        .unwrap();
    assert_eq!(filters[0].name, "Air Filter");
    assert_eq!(filters[0].amount, None);
    assert_eq!(filters[0].date_range, "1998-2002");
}

#[tokio::test]
async fn test_repeat_harvest_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;
    mount_diagrams(&mock_server, None, None).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), false);

    let coordinator = Coordinator::new(config, false, CancellationToken::new()).unwrap();
    coordinator.harvest_diagrams(50, 0).await.unwrap();
    let second = coordinator.harvest_diagrams(50, 0).await.unwrap();

    assert_eq!(second.diagrams.written.inserted, 0);
    assert_eq!(second.diagrams.written.updated, 10);
    assert_eq!(second.parts.written.inserted, 0);
    assert_eq!(second.parts.written.updated, 15);

    let counts = coordinator.statistics().unwrap();
    assert_eq!(counts.diagrams, 10);
    assert_eq!(counts.parts, 15);
}

#[tokio::test]
async fn test_page_cache_avoids_second_render() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;
    mount_diagrams(&mock_server, None, Some(1)).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), true);

    let coordinator = Coordinator::new(config, false, CancellationToken::new()).unwrap();
    coordinator.harvest_diagrams(50, 0).await.unwrap();
    let second = coordinator.harvest_diagrams(50, 0).await.unwrap();

    assert_eq!(second.outcome.succeeded.len(), 5);
    assert_eq!(coordinator.statistics().unwrap().cached_pages, 5);

    let storage = open_db(&db_path);
    let page = storage.get_cached_page_html(4).unwrap().unwrap();
    assert!(page.html.contains("Intake 4"));
    assert_eq!(page.content_hash.len(), 64);
}

#[tokio::test]
async fn test_offline_extraction_from_cache() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;
    mount_diagrams(&mock_server, Some(3), None).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), true);

    let online = Coordinator::new(config.clone(), false, CancellationToken::new()).unwrap();
    online.harvest_diagrams(50, 0).await.unwrap();
    drop(online);

    // Pages are re-extracted without touching the catalog
    let offline_config = create_test_config("http://127.0.0.1:9", db_path.to_str().unwrap(), true);
    let offline = Coordinator::new(offline_config, true, CancellationToken::new()).unwrap();
    let summary = offline.harvest_diagrams(50, 0).await.unwrap();

    assert_eq!(summary.outcome.succeeded, vec![1, 2, 4, 5]);
    assert_eq!(summary.outcome.failed.len(), 1);
    assert!(summary.outcome.failed[0].reason.contains("No cached page"));
    assert_eq!(summary.parts.written.updated, 12);
    assert_eq!(summary.parts.written.inserted, 0);
}

#[tokio::test]
async fn test_groups_page_is_paginated() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;
    mount_diagrams(&mock_server, None, None).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), false);

    let coordinator = Coordinator::new(config, false, CancellationToken::new()).unwrap();
    let report = coordinator.harvest_groups().await.unwrap();
    assert_eq!(report.written.inserted, 7);

    let summary = coordinator.harvest_diagrams(2, 2).await.unwrap();
    assert_eq!(summary.outcome.succeeded, vec![3, 4]);

    let storage = open_db(&db_path);
    let with_diagrams = storage
        .get_groups_with_diagrams(Pagination::all())
        .unwrap();
    assert_eq!(with_diagrams.len(), 5);
    assert_eq!(storage.counts().unwrap().diagrams, 4);
}

#[tokio::test]
async fn test_single_group_and_unknown_group() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;
    mount_diagrams(&mock_server, None, None).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), false);

    let coordinator = Coordinator::new(config, false, CancellationToken::new()).unwrap();
    coordinator.harvest_groups().await.unwrap();

    let summary = coordinator.harvest_group(5).await.unwrap();
    assert_eq!(summary.diagrams.written.inserted, 2);
    assert_eq!(summary.parts.written.inserted, 3);

    let err = coordinator.harvest_group(42).await.unwrap_err();
    assert!(matches!(err, HarvestError::GroupNotFound(42)));
}

#[tokio::test]
async fn test_part_search() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/en/search/all/"))
        .and(query_param("q", "17801-50040"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <div class="product-col list clearfix">
              <img src="/img/17801.png">
              <h1>Air Filter</h1>
              <h2>Part number: 17801-50040</h2>
              <p class="mb-10px">In stock: Y</p>
              <p class="hidden-xs mb-10px">Weight: 0.35</p>
              <span class="price-new">12.40$</span>
            </div>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), false);

    let coordinator = Coordinator::new(config, false, CancellationToken::new()).unwrap();
    let hits = coordinator.search("17801-50040").await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "Air Filter");
    assert_eq!(hits[0].part_number, "17801-50040");
    assert_eq!(hits[0].available, "Y");
    assert_eq!(hits[0].weight_kg, "0.35");
    assert_eq!(hits[0].price_usd, "12.40");
    assert!(hits[0].img_url.as_deref().unwrap().ends_with("/img/17801.png"));
}

#[tokio::test]
async fn test_cancelled_crawl_returns_empty_outcome() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;
    mount_diagrams(&mock_server, None, None).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), false);

    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(config, false, cancel.clone()).unwrap();
    coordinator.harvest_groups().await.unwrap();

    cancel.cancel();
    let summary = coordinator.harvest_diagrams(50, 0).await.unwrap();

    assert!(summary.outcome.cancelled);
    assert!(summary.outcome.succeeded.is_empty());
    assert_eq!(coordinator.statistics().unwrap().diagrams, 0);
}

#[tokio::test]
async fn test_mid_crawl_cancel_keeps_finished_groups() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;

    // Groups 1 and 2 answer at once, group 3 hangs until the crawl is cancelled
    for gid in 1..=5_i64 {
        let mut response = ResponseTemplate::new(200)
            .set_body_string(diagrams_html(gid))
            .insert_header("content-type", "text/html");
        if gid >= 3 {
            response = response.set_delay(Duration::from_secs(30));
        }
        Mock::given(method("GET"))
            .and(path(PARTS_PATH))
            .and(query_param("gid", gid.to_string().as_str()))
            .respond_with(response)
            .mount(&mock_server)
            .await;
    }

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap(), false);

    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(config, false, cancel.clone()).unwrap();
    coordinator.harvest_groups().await.unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let summary = coordinator.harvest_diagrams(50, 0).await.unwrap();

    assert!(summary.outcome.cancelled);
    assert_eq!(summary.outcome.succeeded, vec![1, 2]);
    assert!(summary.outcome.failed.is_empty());
    assert_eq!(summary.diagrams.written.inserted, 4);
    assert_eq!(summary.parts.written.inserted, 6);

    let storage = open_db(&db_path);
    assert_eq!(storage.get_diagrams_for_group(1).unwrap().len(), 2);
    assert_eq!(storage.get_diagrams_for_group(2).unwrap().len(), 2);
    assert!(storage.get_diagrams_for_group(3).unwrap().is_empty());
    assert_eq!(storage.counts().unwrap().parts, 6);
}

#[tokio::test]
async fn test_config_file_drives_harvest() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let config_path = temp_dir.path().join("harvester.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[session]
car = "TOYOTA00"
ssd = "tok"
base-url = "{}"

[render]
backend = "http"
settle-ms = 0

[crawler]
request-delay-ms = 0

[output]
database-path = "{}"
"#,
            mock_server.uri(),
            db_path.display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).expect("Failed to load config");
    let coordinator = Coordinator::new(config, false, CancellationToken::new()).unwrap();
    let report = coordinator.harvest_groups().await.unwrap();

    assert_eq!(report.written.inserted, 7);
    assert_eq!(coordinator.wipe().unwrap().groups, 7);
    assert_eq!(coordinator.statistics().unwrap().groups, 0);
}
