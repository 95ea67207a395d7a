use serde_json::{json, Value};

use crate::http::*;

#[tokio::test]
async fn test_query_views() {
    let server = start_server(seeded_repository(), false).await;

    let (status, body) = get(&server, "/api/optimal-generator-capacity/COLOMBIA").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!([
            {"carrier": "hydro", "p_nom_opt": 1200.5, "geom": [-75.5, 6.2]},
            {"carrier": "solar", "p_nom_opt": 0.0, "geom": null}
        ])
    );

    // Geometry collections flatten to their members' coordinates
    let (status, body) = get(&server, "/api/line-data/nigeria").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!([{
            "line_id": 4,
            "v_nom": 330,
            "line_geom": [[[3.0, 6.5], [4.0, 7.0]], [[4.0, 7.0], [5.0, 7.5]]]
        }])
    );
}

#[tokio::test]
async fn test_query_errors() {
    let server = start_server(seeded_repository(), false).await;

    let (status, body) = get(&server, "/api/nominal-storage-capacity/united%20states").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, "");

    let (status, body) = get(&server, "/api/line-data/atlantis").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Country not supported"}"#);

    let (status, _) = get(&server, "/api/economic-data/united%20states/missing").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = get(&server, "/nothing/here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors() {
    let server = start_server(seeded_repository(), false).await;

    let response = reqwest::Client::new()
        .get(server.url("/api/config"))
        .header("Origin", "https://dashboard.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
    assert_eq!(
        response.json::<Value>().await.unwrap()["workspace"],
        json!("dashboard")
    );
}
