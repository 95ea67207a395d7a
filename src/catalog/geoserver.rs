use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::schema::GeoServer;

use super::{CatalogError, CatalogResult, DataStore, FeatureType, LayerCatalog};

/// GeoServer REST API client
#[derive(Debug, Clone)]
pub struct GeoServerCatalog {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl GeoServerCatalog {
    pub fn new(base_url: &str, username: &str, password: &str) -> CatalogResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::InvalidBaseUrl {
                url: base_url.to_string(),
            });
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn from_config(config: &GeoServer) -> CatalogResult<Self> {
        Self::new(&config.url, &config.username, &config.password)
    }

    /// `{base}/rest/{segments...}`, with every segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> CatalogResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidBaseUrl {
                url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .push("rest")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .header(
                "User-Agent",
                format!("gridatlas/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Send a request, converting non-2xx responses to actual Error structs
    async fn send(&self, builder: RequestBuilder) -> CatalogResult<Response> {
        let response = self.request(builder).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::UnexpectedStatus {
            status: status.as_u16(),
            url,
            body,
        })
    }
}

#[async_trait]
impl LayerCatalog for GeoServerCatalog {
    async fn ensure_workspace(&self, workspace: &str) -> CatalogResult<()> {
        let url = self.endpoint(&["workspaces", workspace])?;
        let response = self.request(self.client.get(url)).send().await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!("Creating GeoServer workspace {workspace}");
                let url = self.endpoint(&["workspaces"])?;
                self.send(
                    self.client
                        .post(url)
                        .json(&json!({ "workspace": { "name": workspace } })),
                )
                .await?;
                Ok(())
            }
            status => Err(CatalogError::UnexpectedStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn create_datastore(
        &self,
        workspace: &str,
        store: &DataStore,
    ) -> CatalogResult<()> {
        let url = self.endpoint(&["workspaces", workspace, "datastores"])?;
        let connection = &store.connection;

        let entries = [
            ("host", connection.host.clone()),
            ("port", connection.port.to_string()),
            ("database", connection.database.clone()),
            ("user", connection.user.clone()),
            ("passwd", connection.password.clone()),
            ("schema", connection.schema.clone()),
            ("dbtype", "postgis".to_string()),
        ]
        .into_iter()
        .map(|(key, value)| json!({ "@key": key, "$": value }))
        .collect::<Vec<_>>();

        let body = json!({
            "dataStore": {
                "name": store.name,
                "connectionParameters": { "entry": entries },
            }
        });

        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn publish_layer(
        &self,
        workspace: &str,
        store_name: &str,
        feature_type: &FeatureType,
    ) -> CatalogResult<()> {
        let url = self.endpoint(&[
            "workspaces",
            workspace,
            "datastores",
            store_name,
            "featuretypes",
        ])?;

        let body = json!({
            "featureType": {
                "name": feature_type.name,
                "nativeName": feature_type.native_name,
            }
        });

        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn refresh_layer(
        &self,
        workspace: &str,
        store_name: &str,
        feature_type: &FeatureType,
    ) -> CatalogResult<()> {
        let mut url = self.endpoint(&[
            "workspaces",
            workspace,
            "datastores",
            store_name,
            "featuretypes",
            &feature_type.name,
        ])?;
        url.query_pairs_mut()
            .append_pair("recalculate", "nativebbox,latlonbbox");

        let body = json!({
            "featureType": {
                "name": feature_type.name,
                "nativeName": feature_type.native_name,
            }
        });

        self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_datastore(
        &self,
        workspace: &str,
        store_name: &str,
    ) -> CatalogResult<()> {
        let mut url = self.endpoint(&["workspaces", workspace, "datastores", store_name])?;
        url.query_pairs_mut().append_pair("recurse", "true");

        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::GeoServerCatalog;
    use crate::catalog::{
        CatalogError, DataStore, FeatureType, LayerCatalog, PostGisConnection,
    };

    fn catalog(server: &MockServer) -> GeoServerCatalog {
        GeoServerCatalog::new(&format!("{}/geoserver", server.uri()), "admin", "geoserver")
            .unwrap()
    }

    fn store() -> DataStore {
        DataStore {
            name: "buses".to_string(),
            connection: PostGisConnection {
                host: "db".to_string(),
                port: 5432,
                database: "dashboard".to_string(),
                user: "user".to_string(),
                password: "pass".to_string(),
                schema: "public".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_ensure_existing_workspace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geoserver/rest/workspaces/PyPSAEarthDashboard"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        catalog(&server)
            .ensure_workspace("PyPSAEarthDashboard")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_missing_workspace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geoserver/rest/workspaces/PyPSAEarthDashboard"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/geoserver/rest/workspaces"))
            .and(body_json(json!({"workspace": {"name": "PyPSAEarthDashboard"}})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        catalog(&server)
            .ensure_workspace("PyPSAEarthDashboard")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_datastore() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/geoserver/rest/workspaces/ws/datastores"))
            .and(body_json(json!({
                "dataStore": {
                    "name": "buses",
                    "connectionParameters": {
                        "entry": [
                            {"@key": "host", "$": "db"},
                            {"@key": "port", "$": "5432"},
                            {"@key": "database", "$": "dashboard"},
                            {"@key": "user", "$": "user"},
                            {"@key": "passwd", "$": "pass"},
                            {"@key": "schema", "$": "public"},
                            {"@key": "dbtype", "$": "postgis"},
                        ]
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        catalog(&server).create_datastore("ws", &store()).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_datastore_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/geoserver/rest/workspaces/ws/datastores"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string("Store 'buses' already exists in workspace 'ws'"),
            )
            .mount(&server)
            .await;

        let error = catalog(&server)
            .create_datastore("ws", &store())
            .await
            .unwrap_err();
        assert!(error.is_already_exists());
        assert!(matches!(
            error,
            CatalogError::UnexpectedStatus { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_publish_layer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/geoserver/rest/workspaces/ws/datastores/buses/featuretypes",
            ))
            .and(body_json(json!({
                "featureType": {"name": "buses", "nativeName": "geojson_buses"}
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        catalog(&server)
            .publish_layer(
                "ws",
                "buses",
                &FeatureType {
                    name: "buses".to_string(),
                    native_name: "geojson_buses".to_string(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_layer() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(
                "/geoserver/rest/workspaces/ws/datastores/buses/featuretypes/buses",
            ))
            .and(query_param("recalculate", "nativebbox,latlonbbox"))
            .and(body_json(json!({
                "featureType": {"name": "buses", "nativeName": "geojson_buses"}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        catalog(&server)
            .refresh_layer(
                "ws",
                "buses",
                &FeatureType {
                    name: "buses".to_string(),
                    native_name: "geojson_buses".to_string(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_datastore() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/geoserver/rest/workspaces/ws/datastores/my%20buses"))
            .and(query_param("recurse", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        catalog(&server)
            .delete_datastore("ws", "my buses")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_datastore() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = catalog(&server)
            .delete_datastore("ws", "buses")
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            GeoServerCatalog::new("mailto:admin@example.com", "a", "b"),
            Err(CatalogError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            GeoServerCatalog::new("not a url", "a", "b"),
            Err(CatalogError::UrlParseError(_))
        ));
    }
}
