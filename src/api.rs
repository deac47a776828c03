//! HTTP API — thin boundary over the inventory store.
//!
//! Endpoints:
//!   GET    /cars/{status}                  → cars in status (JSON)
//!   POST   /cars                           → create (multipart, picture required)
//!   PUT    /cars/{id}                      → update (multipart, picture optional)
//!   DELETE /cars/{id}                      → delete
//!   POST   /cars/{id}/reserve              → reserve for customer (JSON)
//!   POST   /cars/{id}/sell                 → sell to customer (JSON)
//!   POST   /cars/{id}/cancel-reservation   → cancel reservation
//!   GET    /cars/image/{id}                → picture bytes (image/jpeg)
//!
//! Inventory calls are blocking and run on tokio's blocking pool.

use std::num::IntErrorKind;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::extract::multipart::MultipartError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::InventoryError;
use crate::inventory::{Image, Inventory};
use crate::model::{CarDetails, CarId, CarStatus, Customer, ValidationErrors, MIN_YEAR};
use crate::storage::blob_store::FileBlobStore;
use crate::storage::collection::JsonCollection;

pub type CarInventory = Inventory<JsonCollection, FileBlobStore>;

/// Shared state passed to all handlers.
pub struct AppState {
    pub inventory: CarInventory,
    pub max_upload_bytes: usize,
}

// ──────────────── errors ──────────────────────────────────────────────────

/// Failure of a request, mapped onto a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid status provided")]
    InvalidStatus,

    #[error("Invalid car ID")]
    InvalidCarId,

    #[error("Invalid customer data")]
    InvalidCustomer,

    #[error("Error parsing form data: {0}")]
    Form(#[from] MultipartError),

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                warn!(?errors, "Validation errors");
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::Form(e) => (e.status(), e.body_text()).into_response(),
            ApiError::Inventory(e) => {
                let status = match &e {
                    InventoryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                    InventoryError::NotMatched(_) | InventoryError::BlobNotFound { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %e, "Request failed");
                    (status, "Internal server error".to_string()).into_response()
                } else {
                    (status, e.to_string()).into_response()
                }
            }
            ApiError::Task(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            other => (StatusCode::BAD_REQUEST, other.to_string()).into_response(),
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ──────────────── request types ───────────────────────────────────────────

/// Customer body as sent by clients; absent fields surface as validation
/// errors rather than parse errors.
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CustomerBody {
    full_name: String,
    email: String,
    phone_number: String,
}

impl CustomerBody {
    fn parse(body: &[u8]) -> ApiResult<Customer> {
        let body: CustomerBody =
            serde_json::from_slice(body).map_err(|_| ApiError::InvalidCustomer)?;
        let customer = Customer {
            full_name: body.full_name,
            email: body.email,
            phone_number: body.phone_number,
        };
        customer.validate().map_err(ApiError::Validation)?;
        Ok(customer)
    }
}

/// Fields collected from a car multipart form. Unknown fields, including
/// any `status`, are ignored.
#[derive(Default)]
struct CarForm {
    make: String,
    model: String,
    year: Option<String>,
    price: Option<String>,
    picture: Option<(String, Bytes)>,
}

impl CarForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = CarForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "picture" => {
                    let file_name = field.file_name().unwrap_or("picture").to_owned();
                    let data = field.bytes().await?;
                    if !data.is_empty() {
                        form.picture = Some((file_name, data));
                    }
                }
                "make" => form.make = field.text().await?,
                "model" => form.model = field.text().await?,
                "year" => form.year = Some(field.text().await?),
                "price" => form.price = Some(field.text().await?),
                _ => {}
            }
        }
        Ok(form)
    }

    /// Parse and validate the car attributes.
    fn details(&self) -> ApiResult<CarDetails> {
        let (details, errors) = self.parse();
        if errors.is_empty() {
            Ok(details)
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    /// As `details`, for forms that must carry a picture.
    fn details_with_picture(self) -> ApiResult<(CarDetails, (String, Bytes))> {
        let (details, mut errors) = self.parse();
        match self.picture {
            Some(picture) if errors.is_empty() => Ok((details, picture)),
            picture => {
                if picture.is_none() {
                    errors.insert("picture".into(), "picture is required".into());
                }
                Err(ApiError::Validation(errors))
            }
        }
    }

    fn parse(&self) -> (CarDetails, ValidationErrors) {
        let mut parse_errors = ValidationErrors::new();
        let year = parse_year(&mut parse_errors, self.year.as_deref());
        let price = parse_price(&mut parse_errors, self.price.as_deref());

        let details = CarDetails {
            make: self.make.trim().to_string(),
            model: self.model.trim().to_string(),
            year: year.unwrap_or(MIN_YEAR),
            price: price.unwrap_or(1.0),
        };
        let mut errors = details.validate().err().unwrap_or_default();
        errors.extend(parse_errors);
        (details, errors)
    }

    fn image(&self) -> Option<Image<'_>> {
        self.picture.as_ref().map(|(name, data)| Image::new(name, data))
    }
}

fn required<'a>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    if value.is_none() {
        errors.insert(field.to_string(), format!("{field} is required"));
    }
    value
}

fn parse_year(errors: &mut ValidationErrors, value: Option<&str>) -> Option<i32> {
    let raw = required(errors, "year", value)?;
    match raw.parse::<i32>() {
        Ok(year) => Some(year),
        Err(e) => {
            let msg = match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => "year is out of range",
                _ => "year must be a number",
            };
            errors.insert("year".into(), msg.into());
            None
        }
    }
}

fn parse_price(errors: &mut ValidationErrors, value: Option<&str>) -> Option<f64> {
    let raw = required(errors, "price", value)?;
    match raw.parse::<f64>() {
        Ok(price) if price.is_infinite() => {
            errors.insert("price".into(), "price is out of range".into());
            None
        }
        Ok(price) => Some(price),
        Err(_) => {
            errors.insert("price".into(), "price must be a number".into());
            None
        }
    }
}

fn parse_car_id(raw: &str) -> ApiResult<CarId> {
    raw.parse().map_err(|_| ApiError::InvalidCarId)
}

/// Run an inventory call on the blocking pool.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> ApiResult<T>
where
    F: FnOnce(&CarInventory) -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.inventory))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?
        .map_err(ApiError::from)
}

// ──────────────── router ──────────────────────────────────────────────────

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/cars", post(handle_create))
        // GET reads the segment as a status; the router needs one param name per position.
        .route(
            "/cars/{id}",
            get(handle_list).put(handle_update).delete(handle_delete),
        )
        .route("/cars/{id}/reserve", post(handle_reserve))
        .route("/cars/{id}/sell", post(handle_sell))
        .route("/cars/{id}/cancel-reservation", post(handle_cancel))
        .route("/cars/image/{id}", get(handle_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server; returns after CTRL+C once in-flight requests finish.
pub async fn start_server(state: Arc<AppState>, port: u16) -> crate::error::Result<()> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(port, "HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received CTRL+C, shutting down…"),
        Err(e) => error!(error = %e, "Signal error"),
    }
}

// ──────────────── handlers ────────────────────────────────────────────────

async fn handle_list(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let status: CarStatus = status.parse().map_err(|_| ApiError::InvalidStatus)?;
    let cars = blocking(&state, move |inv| inv.list_by_status(status)).await?;
    Ok(Json(cars))
}

async fn handle_create(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (details, (name, data)) = CarForm::read(multipart).await?.details_with_picture()?;
    let res = blocking(&state, move |inv| inv.create_car(details, Image::new(&name, &data))).await?;
    Ok(Json(res))
}

async fn handle_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let id = parse_car_id(&id)?;
    let form = CarForm::read(multipart).await?;
    let details = form.details()?;
    let res = blocking(&state, move |inv| inv.update_car(id, details, form.image())).await?;
    Ok(Json(res))
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_car_id(&id)?;
    let res = blocking(&state, move |inv| inv.delete_car(id)).await?;
    Ok(Json(res))
}

async fn handle_reserve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id = parse_car_id(&id)?;
    let customer = CustomerBody::parse(&body)?;
    let res = blocking(&state, move |inv| inv.reserve_car(id, customer)).await?;
    Ok(Json(res))
}

async fn handle_sell(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let id = parse_car_id(&id)?;
    let customer = CustomerBody::parse(&body)?;
    let res = blocking(&state, move |inv| inv.sell_car(id, customer)).await?;
    Ok(Json(res))
}

async fn handle_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_car_id(&id)?;
    let res = blocking(&state, move |inv| inv.cancel_reservation(id)).await?;
    Ok(Json(res))
}

async fn handle_image(
    State(state): State<Arc<AppState>>,
    Path(picture_id): Path<String>,
) -> ApiResult<Response> {
    let data = blocking(&state, move |inv| inv.get_image(&picture_id)).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (header::CONTENT_LENGTH, data.len().to_string()),
        ],
        data,
    )
        .into_response())
}
