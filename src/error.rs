use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::OrderStatus;
use crate::store::StoreError;

/// Input rejected before any state is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("items must be a non-empty list")]
    EmptyItems,

    #[error("totalPrice must be a positive number")]
    InvalidTotalPrice,

    #[error("missing pickupDate")]
    MissingPickupDate,

    #[error("missing pickupTime")]
    MissingPickupTime,

    #[error("missing deliveryDate")]
    MissingDeliveryDate,

    #[error("missing deliveryTime")]
    MissingDeliveryTime,

    #[error("missing addressId")]
    MissingAddressId,
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyItems => "items",
            ValidationError::InvalidTotalPrice => "totalPrice",
            ValidationError::MissingPickupDate => "pickupDate",
            ValidationError::MissingPickupTime => "pickupTime",
            ValidationError::MissingDeliveryDate => "deliveryDate",
            ValidationError::MissingDeliveryTime => "deliveryTime",
            ValidationError::MissingAddressId => "addressId",
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ForbiddenReason {
    #[error("unassigned")]
    Unassigned,

    #[error("wrong courier")]
    WrongCourier,

    #[error("role not permitted")]
    RoleNotPermitted,

    #[error("not the order's customer")]
    NotOrderCustomer,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("cannot change status from {current} to {requested}")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    #[error("forbidden: {0}")]
    Forbidden(ForbiddenReason),

    #[error("order is not claimable while {0}")]
    NotClaimable(OrderStatus),

    #[error("order already claimed by another courier")]
    AlreadyClaimed,

    #[error("rating must be between 0 and 5, got {0}")]
    InvalidRating(f64),

    #[error("order cannot be rated while {0}")]
    NotRateable(OrderStatus),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("order {order_id} was rated but the owner rating was not updated: {reason}")]
    AggregationFailed { order_id: Uuid, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) | AppError::MalformedBody(_) => "validation",
            AppError::InvalidStatus(_) => "invalid_status",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotClaimable(_) => "not_claimable",
            AppError::AlreadyClaimed => "already_claimed",
            AppError::InvalidRating(_) => "invalid_rating",
            AppError::NotRateable(_) => "not_rateable",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::AggregationFailed { .. } => "aggregation_failed",
            AppError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_)
            | AppError::MalformedBody(_)
            | AppError::InvalidStatus(_)
            | AppError::InvalidTransition { .. }
            | AppError::InvalidRating(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotClaimable(_)
            | AppError::AlreadyClaimed
            | AppError::NotRateable(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::AggregationFailed { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation(err) => Some(json!({ "field": err.field() })),
            AppError::InvalidTransition { current, requested } => Some(json!({
                "currentStatus": current,
                "requestedStatus": requested,
            })),
            AppError::NotClaimable(current) | AppError::NotRateable(current) => {
                Some(json!({ "currentStatus": current }))
            }
            AppError::Forbidden(reason) => Some(json!({ "reason": reason.to_string() })),
            AppError::AggregationFailed { order_id, .. } => Some(json!({ "orderId": order_id })),
            _ => None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });

        if let (Some(details), Some(map)) = (self.details(), body.as_object_mut()) {
            map.insert("details".to_string(), details);
        }

        (self.status_code(), Json(body)).into_response()
    }
}
