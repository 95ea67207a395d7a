use std::convert::Infallible;
use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use bytes::BufMut;
use futures::{pin_mut, TryStreamExt};
use percent_encoding::percent_decode_str;
use serde_json::json;
use tracing::{debug, info};
use warp::hyper::StatusCode;
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::auth::authorize_write;
use crate::context::GridAtlasContext;
use crate::data_types::{UploadId, UploadKind};
use crate::datasets::{
    economic_statistics_table, lookup, rows_with_coordinates, Country, DataSource,
    DatasetKind,
};
use crate::uploads::NewUpload;

use super::http_utils::{into_response, ApiError};

const AUTHORIZATION: &str = "authorization";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Error parsing the listen address: {0}")]
    InvalidAddress(#[from] AddrParseError),

    #[error("Error binding the HTTP server: {0}")]
    Bind(#[from] warp::Error),
}

fn with_context(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = (Arc<GridAtlasContext>,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}

fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

async fn dataset_rows(
    kind: DatasetKind,
    country: String,
    context: Arc<GridAtlasContext>,
) -> Result<Response, ApiError> {
    let country = decode_segment(&country)
        .and_then(|c| Country::from_token(&c))
        .ok_or(ApiError::CountryNotSupported)?;

    match lookup(kind, country) {
        Some(DataSource::View(source)) => {
            let rows = context
                .repository
                .select_rows(source.relation, Some(source.geometry_column))
                .await?;
            debug!("Read {} row(s) from {:?}", rows.len(), source.relation);
            Ok(warp::reply::json(&rows_with_coordinates(rows, &source)).into_response())
        }
        Some(DataSource::Unavailable) => {
            debug!("No {kind} data for {country}");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        None => Err(ApiError::CountryNotSupported),
    }
}

// GET /api/[dataset]/[country]
pub fn dataset_query(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / DatasetKind / String)
        .and(warp::get())
        .and(with_context(context))
        .then(dataset_rows)
        .map(into_response)
}

async fn economic_data(
    country: String,
    scenario: String,
    context: Arc<GridAtlasContext>,
) -> Result<Response, ApiError> {
    let country = decode_segment(&country).and_then(|c| Country::from_token(&c));
    if country != Some(Country::UnitedStates) {
        return Err(ApiError::EconomicDataUnavailable);
    }

    let table = decode_segment(&scenario)
        .and_then(|s| economic_statistics_table(&s))
        .ok_or(ApiError::InvalidScenario)?;
    let rows = context.repository.select_rows(&table, None).await?;
    Ok(warp::reply::json(&rows).into_response())
}

// GET /api/economic-data/[country]/[scenario]
pub fn economic_data_query(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "economic-data" / String / String)
        .and(warp::get())
        .and(with_context(context))
        .then(economic_data)
        .map(into_response)
}

// GET /api/config
pub fn frontend_config(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "config")
        .and(warp::get())
        .map(move || {
            let geoserver = &context.config.geoserver;
            warp::reply::json(&json!({
                "geoserver_url": geoserver.url,
                "workspace": geoserver.workspace,
            }))
        })
}

#[derive(Debug, Default)]
struct UploadForm {
    name: Option<String>,
    file: Option<(String, Vec<u8>)>,
    geometry: Option<String>,
}

fn form_text(field: &str, data: Vec<u8>) -> Result<String, ApiError> {
    String::from_utf8(data)
        .map_err(|_| ApiError::BadRequest(format!("Form field {field:?} must be UTF-8 text")))
}

async fn read_form(form: FormData) -> Result<UploadForm, ApiError> {
    let mut upload = UploadForm::default();

    pin_mut!(form);
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let field = part.name().to_string();
        let file_name = part.filename().map(str::to_string);
        let data = part
            .stream()
            .try_fold(Vec::new(), |mut acc, buf| {
                acc.put(buf);
                async move { Ok(acc) }
            })
            .await
            .map_err(|e| ApiError::BadRequest(format!("Error reading field {field:?}: {e}")))?;

        match field.as_str() {
            "name" => upload.name = Some(form_text(&field, data)?),
            "geometry" => upload.geometry = Some(form_text(&field, data)?),
            "file" => {
                upload.file = Some((file_name.unwrap_or_else(|| "upload".to_string()), data))
            }
            other => debug!("Ignoring form field {other:?}"),
        }
    }

    Ok(upload)
}

async fn upload(
    kind: String,
    authorization: Option<String>,
    form: FormData,
    context: Arc<GridAtlasContext>,
) -> Result<Response, ApiError> {
    authorize_write(authorization.as_deref(), &context.access_policy)?;
    let kind: UploadKind = kind
        .parse()
        .map_err(|_| ApiError::UnknownUploadKind(kind.clone()))?;

    let form = read_form(form).await?;
    let name = form
        .name
        .ok_or_else(|| ApiError::BadRequest("Missing form field \"name\"".to_string()))?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("Missing form field \"file\"".to_string()))?;

    let record = context
        .uploads
        .create(NewUpload {
            kind,
            name,
            file: Some(file),
            geometry: form.geometry,
        })
        .await?;

    Ok(
        warp::reply::with_status(warp::reply::json(&record), StatusCode::CREATED)
            .into_response(),
    )
}

// POST /admin/uploads/[kind]
pub fn create_upload(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let max_length = context.config.frontend.http.upload_data_max_length;

    warp::path!("admin" / "uploads" / String)
        .and(warp::post())
        .and(warp::header::optional::<String>(AUTHORIZATION))
        .and(warp::multipart::form().max_length(max_length))
        .and(with_context(context))
        .then(upload)
        .map(into_response)
}

async fn uploads(
    authorization: Option<String>,
    context: Arc<GridAtlasContext>,
) -> Result<Response, ApiError> {
    authorize_write(authorization.as_deref(), &context.access_policy)?;
    let records = context.uploads.list().await?;
    Ok(warp::reply::json(&records).into_response())
}

// GET /admin/uploads
pub fn list_uploads(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::path!("admin" / "uploads")
        .and(warp::get())
        .and(warp::header::optional::<String>(AUTHORIZATION))
        .and(with_context(context))
        .then(uploads)
        .map(into_response)
}

async fn remove_upload(
    id: UploadId,
    authorization: Option<String>,
    context: Arc<GridAtlasContext>,
) -> Result<Response, ApiError> {
    authorize_write(authorization.as_deref(), &context.access_policy)?;
    match context.uploads.delete(id).await? {
        Some(_) => Ok(StatusCode::NO_CONTENT.into_response()),
        None => Err(ApiError::UploadNotFound(id)),
    }
}

// DELETE /admin/uploads/[id]
pub fn delete_upload(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::path!("admin" / "uploads" / UploadId)
        .and(warp::delete())
        .and(warp::header::optional::<String>(AUTHORIZATION))
        .and(with_context(context))
        .then(remove_upload)
        .map(into_response)
}

pub fn filters(
    context: Arc<GridAtlasContext>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Authorization", "Content-Type"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    frontend_config(context.clone())
        .or(economic_data_query(context.clone()))
        .or(dataset_query(context.clone()))
        .or(list_uploads(context.clone()))
        .or(create_upload(context.clone()))
        .or(delete_upload(context))
        .with(cors)
        .with(warp::trace::request())
}

pub async fn run_server(
    context: Arc<GridAtlasContext>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let config = &context.config.frontend.http;
    let socket_addr: SocketAddr =
        format!("{}:{}", config.bind_host, config.bind_port).parse()?;

    let (addr, server) = warp::serve(filters(context.clone()))
        .try_bind_with_graceful_shutdown(socket_addr, shutdown)?;
    info!("Listening on http://{addr}");

    server.await;
    info!("HTTP server stopped");
    Ok(())
}
