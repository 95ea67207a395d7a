use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

use gridatlas::data_types::JsonObject;
use gridatlas::repository::memory::InMemoryRepository;

pub use crate::{start_server, TestServer, WRITE_PASSWORD};

mod query;
mod upload;

pub fn rows(value: Value) -> Vec<JsonObject> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row.as_object().unwrap().clone())
        .collect()
}

pub fn seeded_repository() -> InMemoryRepository {
    InMemoryRepository::new()
        .with_view(
            "view_optimal_generator_capacity_with_geom_co",
            rows(json!([
                {
                    "carrier": "hydro",
                    "p_nom_opt": 1200.5,
                    "geom": {"type": "Point", "coordinates": [-75.5, 6.2]}
                },
                {"carrier": "solar", "p_nom_opt": 0.0, "geom": null}
            ])),
        )
        .with_view(
            "network_lines_view",
            rows(json!([
                {
                    "line_id": 4,
                    "v_nom": 330,
                    "line_geom": {
                        "type": "GeometryCollection",
                        "geometries": [
                            {"type": "LineString", "coordinates": [[3.0, 6.5], [4.0, 7.0]]},
                            {"type": "LineString", "coordinates": [[4.0, 7.0], [5.0, 7.5]]}
                        ]
                    }
                }
            ])),
        )
}

pub async fn get(server: &TestServer, path: &str) -> (StatusCode, String) {
    let response = reqwest::get(server.url(path)).await.unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

pub async fn upload(
    server: &TestServer,
    kind: &str,
    name: &str,
    file_name: &str,
    contents: &Value,
) -> (StatusCode, Value) {
    let form = Form::new().text("name", name.to_string()).part(
        "file",
        Part::bytes(serde_json::to_vec(contents).unwrap()).file_name(file_name.to_string()),
    );

    let response = reqwest::Client::new()
        .post(server.url(&format!("/admin/uploads/{kind}")))
        .bearer_auth(WRITE_PASSWORD)
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

pub async fn delete(server: &TestServer, id: i64) -> StatusCode {
    reqwest::Client::new()
        .delete(server.url(&format!("/admin/uploads/{id}")))
        .bearer_auth(WRITE_PASSWORD)
        .send()
        .await
        .unwrap()
        .status()
}
