use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use gridatlas::repository::interface::Repository;

use crate::http::*;

fn substations() -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "Kainji", "v_nom": 330},
                "geometry": {"type": "Point", "coordinates": [4.6, 9.9]}
            },
            {
                "type": "Feature",
                "properties": {"name": "Jebba", "v_nom": 330},
                "geometry": {"type": "Point", "coordinates": [4.8, 9.1]}
            }
        ]
    })
}

async fn mount_publication(server: &TestServer, name: &str) {
    Mock::given(method("GET"))
        .and(path("/geoserver/rest/workspaces/dashboard"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server.geoserver)
        .await;
    Mock::given(method("POST"))
        .and(path("/geoserver/rest/workspaces"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server.geoserver)
        .await;
    Mock::given(method("POST"))
        .and(path("/geoserver/rest/workspaces/dashboard/datastores"))
        .and(body_partial_json(json!({"dataStore": {"name": name}})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server.geoserver)
        .await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/geoserver/rest/workspaces/dashboard/datastores/{name}/featuretypes"
        )))
        .and(body_partial_json(json!({
            "featureType": {"name": name, "nativeName": format!("geojson_{name}")}
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server.geoserver)
        .await;
}

#[tokio::test]
async fn test_geojson_upload_published() {
    let server = start_server(InMemoryRepository::new(), false).await;
    mount_publication(&server, "substations").await;

    let (status, record) =
        upload(&server, "geojson", "substations", "subs.geojson", &substations()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["name"], json!("substations"));

    let table = server.repository.table("geojson_substations").unwrap();
    assert_eq!(table.row_count(), 2);

    // Deleting drops the table but leaves the layer alone
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server.geoserver)
        .await;
    let status = delete(&server, record["id"].as_i64().unwrap()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!server
        .repository
        .table_exists("geojson_substations")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_catalog_cleanup_on_delete() {
    let server = start_server(InMemoryRepository::new(), true).await;
    mount_publication(&server, "substations").await;
    Mock::given(method("DELETE"))
        .and(path(
            "/geoserver/rest/workspaces/dashboard/datastores/substations",
        ))
        .and(query_param("recurse", "true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server.geoserver)
        .await;

    let (status, record) =
        upload(&server, "geojson", "substations", "subs.geojson", &substations()).await;
    assert_eq!(status, StatusCode::CREATED);

    let status = delete(&server, record["id"].as_i64().unwrap()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_geoserver_down_keeps_upload() {
    let server = start_server(InMemoryRepository::new(), false).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server.geoserver)
        .await;

    let (status, _) =
        upload(&server, "geojson", "substations", "subs.geojson", &substations()).await;
    assert_eq!(status, StatusCode::CREATED);

    // The table is there even though publication failed
    assert!(server.repository.table("geojson_substations").is_some());
    assert_eq!(server.context.uploads.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_json_upload_queryable() {
    let server = start_server(InMemoryRepository::new(), false).await;
    // JSON uploads never reach the catalog
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server.geoserver)
        .await;

    let (status, _) = upload(
        &server,
        "json",
        "statistics_base_US",
        "stats.json",
        &json!({
            "columns": ["metric", "value"],
            "data": [["capex", 1.5e9], ["opex", 2.0e8]]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let table = server.repository.table("json_statistics_base_US").unwrap();
    assert_eq!(table.row_count(), 2);

    // Served as the economic data of the "base" scenario
    let (status, body) = get(&server, "/api/economic-data/United%20States/base").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&body).unwrap(),
        json!([
            {"metric": "capex", "value": 1.5e9},
            {"metric": "opex", "value": 2.0e8}
        ])
    );
}

#[tokio::test]
async fn test_unparseable_upload_still_recorded() {
    let server = start_server(InMemoryRepository::new(), false).await;

    let (status, record) =
        upload(&server, "geojson", "broken", "broken.geojson", &json!({"type": "Nope"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(server.repository.table("geojson_broken").is_none());

    let records = server.context.uploads.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record["id"].as_i64().unwrap());
}
