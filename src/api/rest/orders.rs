use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::AppError;
use crate::models::order::{NewOrder, Order, OrderView};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/user", get(list_customer_orders))
        .route("/orders/owner", get(list_owner_orders))
        .route("/orders/courier", get(list_courier_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/assign", patch(claim_order))
        .route("/orders/:id/rate", patch(rate_order))
        .route("/orders/:id/hide", patch(hide_order))
        .route("/orders/:id/unhide", patch(unhide_order))
}

#[derive(Serialize)]
pub struct OrderResponse<T> {
    pub success: bool,
    pub order: T,
}

#[derive(Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<OrderView>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct RateOrderRequest {
    pub rating: f64,
    #[serde(default)]
    pub review: Option<String>,
}

fn one<T>(order: T) -> Json<OrderResponse<T>> {
    Json(OrderResponse {
        success: true,
        order,
    })
}

fn many(orders: Vec<OrderView>) -> Json<OrdersResponse> {
    Json(OrdersResponse {
        success: true,
        orders,
    })
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse<Order>>), AppError> {
    let Json(payload) = payload?;
    let order = state.engine.create(&caller, payload).await?;
    Ok((StatusCode::CREATED, one(order)))
}

async fn list_customer_orders(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<OrdersResponse>, AppError> {
    Ok(many(state.engine.list_for_customer(&caller).await?))
}

async fn list_owner_orders(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<OrdersResponse>, AppError> {
    Ok(many(state.engine.list_for_owner(&caller).await?))
}

async fn list_courier_orders(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<OrdersResponse>, AppError> {
    Ok(many(state.engine.list_for_courier(&caller).await?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse<OrderView>>, AppError> {
    Ok(one(state.engine.get(id, &caller).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse<Order>>, AppError> {
    let Json(payload) = payload?;
    let order = state
        .engine
        .request_transition(id, &payload.status, &caller)
        .await?;
    Ok(one(order))
}

async fn claim_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse<OrderView>>, AppError> {
    Ok(one(state.engine.claim(id, &caller).await?))
}

async fn rate_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<RateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse<Order>>, AppError> {
    let Json(payload) = payload?;
    let order = state
        .engine
        .rate(id, payload.rating, payload.review, &caller)
        .await?;
    Ok(one(order))
}

async fn hide_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse<Order>>, AppError> {
    Ok(one(state.engine.set_hidden(id, true, &caller).await?))
}

async fn unhide_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse<Order>>, AppError> {
    Ok(one(state.engine.set_hidden(id, false, &caller).await?))
}
