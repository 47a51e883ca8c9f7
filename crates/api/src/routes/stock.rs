//! Stock reservation endpoints.
//!
//! Bodies are read as raw bytes and validated by hand so that malformed JSON
//! and missing fields come back as `400 {"error": ...}` in the same shape as
//! every other failure, and so that a bad quantity is rejected before the
//! store is touched.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use pexpress_core::{OrderLine, ProductId, Quantity, RowKey};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::services::{LineReservation, Reservation, ReservationError};
use crate::state::AppState;

/// Response of a successful batch reservation.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub ok: bool,
    pub items: Vec<LineReservation>,
}

/// Take units out of one row.
///
/// POST /update-stock
///
/// Body: `{"productId": "...", "rowKey": "...", "quantity": 2}`
///
/// # Errors
///
/// 400 for invalid input or insufficient stock, 404 for an unknown
/// product/row, 409 when the write kept losing to other writers, 500 for
/// store failures.
pub async fn update_stock(State(state): State<AppState>, body: Bytes) -> Result<Json<Reservation>> {
    let request = parse_object(&body)?;
    let product_id = required_id(&request, "productId")?;
    let row_key = required_id(&request, "rowKey")?;
    let quantity = quantity_field(&request, "quantity")?;

    let reservation = state
        .reservations()
        .reserve(&ProductId::new(product_id), &RowKey::new(row_key), quantity)
        .await?;

    Ok(Json(reservation))
}

/// Take units out of several rows in one transaction.
///
/// POST /reservar-lote
///
/// Body: `{"items": [{"productId": "...", "rowKey": "...", "qty": 2}, ...]}`
///
/// # Errors
///
/// As for [`update_stock`]. Nothing is written unless every line fits.
pub async fn reserve_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchResponse>> {
    let request = parse_object(&body)?;
    let lines = order_lines(&request)?;

    let items = state.reservations().reserve_lines(lines).await?;

    Ok(Json(BatchResponse { ok: true, items }))
}

/// CORS preflight. The allow headers are added by the CORS middleware.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Any method a route does not serve.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

// =============================================================================
// Request parsing
// =============================================================================

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Reservation(ReservationError::InvalidInput(message.into()))
}

/// Decode the body as a JSON object. An empty body counts as `{}`.
fn parse_object(body: &[u8]) -> Result<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {e}"))),
    }
}

fn required_id<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    match object.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(invalid(format!("{field} is required")))
        }
        Some(_) => Err(invalid(format!("{field} must be a string"))),
    }
}

fn quantity_field(object: &Map<String, Value>, field: &str) -> Result<Quantity> {
    Quantity::from_json(object.get(field).unwrap_or(&Value::Null))
        .map_err(|e| invalid(e.to_string()))
}

fn order_lines(request: &Map<String, Value>) -> Result<Vec<OrderLine>> {
    let items = match request.get("items") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(invalid("items must be a non-empty array")),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let Value::Object(item) = item else {
                return Err(invalid(format!("items[{index}] must be an object")));
            };
            let prefixed = |e: AppError| match e {
                AppError::Reservation(ReservationError::InvalidInput(msg)) => {
                    invalid(format!("items[{index}]: {msg}"))
                }
                other => other,
            };
            Ok(OrderLine {
                product_id: ProductId::new(required_id(item, "productId").map_err(prefixed)?),
                row_key: RowKey::new(required_id(item, "rowKey").map_err(prefixed)?),
                quantity: quantity_field(item, "qty").map_err(prefixed)?,
            })
        })
        .collect()
}
