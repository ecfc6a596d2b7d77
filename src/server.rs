use crate::config::ModelWeights;
use crate::pipeline::Processor;
use bytes::Buf;
use futures::StreamExt;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageOutputFormat};
use log::{debug, error, info, warn};
use serde_json::json;
use std::convert::Infallible;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("index.html");

pub struct AppState {
    pub processor: Processor,
    pub weights: Arc<ModelWeights>,
    pub annotated_dir: PathBuf,
    pub weights_dir: PathBuf,
    pub upload_limit: u64,
}

/// Problem with what the client sent, as opposed to a failure on our side.
#[derive(Debug, Fail)]
#[fail(display = "{}", _0)]
struct BadRequest(String);

#[derive(Debug)]
struct HandleRequestError {
    status: StatusCode,
    message: String,
}

impl warp::reject::Reject for HandleRequestError {}

impl From<failure::Error> for HandleRequestError {
    fn from(e: failure::Error) -> Self {
        let status = if e.downcast_ref::<BadRequest>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        HandleRequestError {
            status,
            message: e.to_string(),
        }
    }
}

pub async fn run(state: Arc<AppState>, addr: SocketAddr) {
    info!("Listening on {}", addr);
    warp::serve(routes(state)).run(addr).await;
}

pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let with_state = {
        let state = state.clone();
        warp::any().map(move || state.clone())
    };

    let index = warp::get()
        .and(warp::path::end())
        .map(|| warp::reply::html(INDEX_HTML));

    let process = warp::post()
        .and(warp::path!("process"))
        .and(warp::multipart::form().max_length(state.upload_limit))
        .and(with_state.clone())
        .and_then(|form, state| async move {
            into_reply(handle_process(form, state).await, "processing submission")
        });

    let weights = warp::post()
        .and(warp::path!("weights"))
        .and(warp::multipart::form().max_length(state.upload_limit))
        .and(with_state.clone())
        .and_then(|form, state| async move {
            into_reply(handle_weights(form, state).await, "updating weights")
        });

    let plates = warp::get()
        .and(warp::path!("plates"))
        .and(with_state)
        .and_then(|state: Arc<AppState>| async move {
            let result = state
                .processor
                .list_plates()
                .await
                .map(|plates| warp::reply::json(&json!({ "plates": plates })));
            into_reply(result, "listing plates")
        });

    let annotated = warp::path("annotated").and(warp::fs::dir(state.annotated_dir.clone()));

    index
        .or(process)
        .or(weights)
        .or(plates)
        .or(annotated)
        .recover(handle_rejection)
}

fn into_reply<T: Reply>(result: Result<T, failure::Error>, what: &str) -> Result<T, Rejection> {
    result.map_err(|e| {
        error!("Error {}: {}", what, e);
        warp::reject::custom(HandleRequestError::from(e))
    })
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<HandleRequestError>() {
        (e.status, e.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Upload too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        warn!("Rejected request: {:?}", err);
        (StatusCode::BAD_REQUEST, "Bad request".to_string())
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        status,
    ))
}

async fn handle_process(
    mut form: FormData,
    state: Arc<AppState>,
) -> Result<impl Reply, failure::Error> {
    let mut license: Option<DynamicImage> = None;
    let mut parking: Option<DynamicImage> = None;
    let mut add_to_db = false;

    while let Some(part) = form.next().await {
        let part = part?;
        debug!("Got part {}", part.name());
        match part.name() {
            "license" => license = Some(decode_image(&read_part(part).await?)?),
            "parking" => parking = Some(decode_image(&read_part(part).await?)?),
            "add_to_db" => {
                let value = read_part(part).await?;
                add_to_db = is_checked(&String::from_utf8_lossy(&value));
            }
            _ => warn!("Ignoring part {}", part.name()),
        }
    }

    let license = license.ok_or_else(|| BadRequest("Missing license plate image".into()))?;
    let parking = parking.ok_or_else(|| BadRequest("Missing parking lot image".into()))?;

    let submission = state.processor.process(&license, &parking, add_to_db).await?;

    let name = format!("{:x}.png", Uuid::new_v4().to_simple());
    let path = state.annotated_dir.join(&name);
    let mut data = vec![];
    DynamicImage::ImageRgba8(submission.annotated).write_to(&mut data, ImageOutputFormat::Png)?;
    std::fs::write(&path, &data)?;
    debug!("Saved annotated image to {:?}", path);

    Ok(warp::reply::json(&json!({
        "plate": submission.plate,
        "database": submission.database_message,
        "status": submission.outcome.map(|o| o.status.as_str()),
        "annotated_image": format!("/annotated/{}", name),
        "parking_html": submission.report.to_html(),
        "free_slots": submission.report.free,
        "occupied_slots": submission.report.occupied,
        "total_slots": submission.report.total(),
    })))
}

async fn handle_weights(
    mut form: FormData,
    state: Arc<AppState>,
) -> Result<impl Reply, failure::Error> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(part) = form.next().await {
        let part = part?;
        if part.name() != "weights" {
            warn!("Ignoring part {}", part.name());
            continue;
        }
        if upload.is_some() {
            return Err(BadRequest("Only one weights file may be uploaded".into()).into());
        }
        let original = part
            .filename()
            .and_then(|f| Path::new(f).file_name())
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "weights.pt".to_string());
        upload = Some((original, read_part(part).await?));
    }

    let (original, data) = upload.ok_or_else(|| BadRequest("Missing weights file".into()))?;
    if data.is_empty() {
        return Err(BadRequest("Uploaded weights file is empty".into()).into());
    }
    let path = state
        .weights_dir
        .join(format!("{:x}-{}", Uuid::new_v4().to_simple(), original));
    std::fs::write(&path, &data)?;
    info!("Saved {} bytes of weights to {:?}", data.len(), path);

    let effective = state.weights.update(path).await;
    Ok(warp::reply::json(&json!({
        "message": format!("YOLO weights updated: {}", effective.display()),
        "weights": effective.display().to_string(),
    })))
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    let mut data: Vec<u8> = vec![];
    let mut stream = part.stream();
    while let Some(buf) = stream.next().await {
        data.extend_from_slice(buf?.bytes());
    }
    Ok(data)
}

fn decode_image(data: &[u8]) -> Result<DynamicImage, failure::Error> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .map_err(|e| BadRequest(format!("Failed to decode image: {}", e)).into())
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}
