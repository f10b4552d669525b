use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::address::Address;
use crate::models::user::{Contact, Role};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingOwner,
    CourierAssigned,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::PendingOwner,
        OrderStatus::CourierAssigned,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingOwner => "pending_owner",
            OrderStatus::CourierAssigned => "courier_assigned",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for text that names none of the four statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    #[default]
    Standard,
    Express,
    DryClean,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, rename = "serviceType", alias = "serviceKind")]
    pub service_kind: ServiceKind,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub courier_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total_price: f64,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
    pub delivery_date: NaiveDate,
    pub delivery_time: String,
    pub address_id: Uuid,
    pub status: OrderStatus,
    pub notes: String,
    pub rating: Option<f64>,
    pub review: Option<String>,
    pub hidden_for_user: bool,
    pub hidden_for_owner: bool,
    pub hidden_for_courier: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_hidden_for(&self, role: Role) -> bool {
        match role {
            Role::Customer => self.hidden_for_user,
            Role::Owner => self.hidden_for_owner,
            Role::Courier => self.hidden_for_courier,
        }
    }

    pub fn set_hidden_for(&mut self, role: Role, hidden: bool) {
        match role {
            Role::Customer => self.hidden_for_user = hidden,
            Role::Owner => self.hidden_for_owner = hidden,
            Role::Courier => self.hidden_for_courier = hidden,
        }
    }

    /// Sum of `price * quantity` over the line items.
    pub fn items_subtotal(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum()
    }
}

/// An order with its actors and address resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Contact>,
    pub owner: Option<Contact>,
    pub courier: Option<Contact>,
    pub address: Option<Address>,
}

/// Order creation input as sent by the client. Every field is optional here
/// so that each missing one is reported on its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default, deserialize_with = "blank_date")]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default)]
    pub pickup_time: Option<String>,
    #[serde(default, deserialize_with = "blank_date")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_time: Option<String>,
    #[serde(default, deserialize_with = "blank_uuid")]
    pub address_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn into_order(
        self,
        customer_id: Uuid,
        owner_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Order, ValidationError> {
        let items = self
            .items
            .filter(|items| !items.is_empty())
            .ok_or(ValidationError::EmptyItems)?;
        let total_price = self
            .total_price
            .filter(|price| price.is_finite() && *price > 0.0)
            .ok_or(ValidationError::InvalidTotalPrice)?;
        let pickup_date = self.pickup_date.ok_or(ValidationError::MissingPickupDate)?;
        let pickup_time = present(self.pickup_time).ok_or(ValidationError::MissingPickupTime)?;
        let delivery_date = self
            .delivery_date
            .ok_or(ValidationError::MissingDeliveryDate)?;
        let delivery_time =
            present(self.delivery_time).ok_or(ValidationError::MissingDeliveryTime)?;
        let address_id = self.address_id.ok_or(ValidationError::MissingAddressId)?;

        Ok(Order {
            id: Uuid::new_v4(),
            customer_id,
            owner_id,
            courier_id: None,
            items,
            total_price,
            pickup_date,
            pickup_time,
            delivery_date,
            delivery_time,
            address_id,
            status: OrderStatus::PendingOwner,
            notes: self.notes.unwrap_or_default(),
            rating: None,
            review: None,
            hidden_for_user: false,
            hidden_for_owner: false,
            hidden_for_courier: false,
            created_at: now,
            updated_at: now,
        })
    }
}

fn present(text: Option<String>) -> Option<String> {
    text.filter(|value| !value.trim().is_empty())
}

// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; blank text is absent.
fn blank_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(text) = raw.as_deref().map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(Some(date));
    }

    DateTime::parse_from_rfc3339(text)
        .map(|timestamp| Some(timestamp.date_naive()))
        .map_err(|err| serde::de::Error::custom(format!("invalid date {text:?}: {err}")))
}

fn blank_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Uuid::parse_str(text)
            .map(Some)
            .map_err(|err| serde::de::Error::custom(format!("invalid id {text:?}: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn complete() -> serde_json::Value {
        json!({
            "items": [
                { "name": "Shirt", "quantity": 3, "serviceType": "express", "price": 8.5 },
                { "name": "Coat", "quantity": 1, "weight": 1.2, "serviceKind": "dry_clean", "price": 20.0 }
            ],
            "totalPrice": 45.5,
            "pickupDate": "2025-03-14",
            "pickupTime": "09:00-11:00",
            "deliveryDate": "2025-03-16T00:00:00.000Z",
            "deliveryTime": "18:00",
            "addressId": "00000000-0000-0000-0000-000000000042",
            "notes": "ring twice"
        })
    }

    fn parse(value: serde_json::Value) -> NewOrder {
        serde_json::from_value(value).unwrap()
    }

    fn build(value: serde_json::Value) -> Result<Order, ValidationError> {
        parse(value).into_order(Uuid::from_u128(1), None, Utc::now())
    }

    #[test]
    fn complete_input_creates_pending_order() {
        let order = build(complete()).unwrap();

        assert_eq!(order.status, OrderStatus::PendingOwner);
        assert_eq!(order.courier_id, None);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].service_kind, ServiceKind::Express);
        assert_eq!(order.items[1].service_kind, ServiceKind::DryClean);
        assert_eq!(order.delivery_date, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
        assert_eq!(order.notes, "ring twice");
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn service_kind_defaults_to_standard() {
        let mut input = complete();
        input["items"] = json!([{ "name": "Sock", "quantity": 2, "price": 1.0 }]);

        let order = build(input).unwrap();
        assert_eq!(order.items[0].service_kind, ServiceKind::Standard);
    }

    #[test]
    fn each_missing_field_has_its_own_error() {
        let cases = [
            ("items", ValidationError::EmptyItems),
            ("totalPrice", ValidationError::InvalidTotalPrice),
            ("pickupDate", ValidationError::MissingPickupDate),
            ("pickupTime", ValidationError::MissingPickupTime),
            ("deliveryDate", ValidationError::MissingDeliveryDate),
            ("deliveryTime", ValidationError::MissingDeliveryTime),
            ("addressId", ValidationError::MissingAddressId),
        ];

        for (field, expected) in cases {
            let mut input = complete();
            input.as_object_mut().unwrap().remove(field);
            assert_eq!(build(input).unwrap_err(), expected, "without {field}");
        }
    }

    #[test]
    fn blank_text_counts_as_missing() {
        let mut input = complete();
        input["pickupTime"] = json!("  ");
        assert_eq!(build(input).unwrap_err(), ValidationError::MissingPickupTime);

        let mut input = complete();
        input["deliveryDate"] = json!("");
        assert_eq!(build(input).unwrap_err(), ValidationError::MissingDeliveryDate);

        let mut input = complete();
        input["addressId"] = json!("");
        assert_eq!(build(input).unwrap_err(), ValidationError::MissingAddressId);
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let mut input = complete();
        input["items"] = json!([]);
        assert_eq!(build(input).unwrap_err(), ValidationError::EmptyItems);
    }

    #[test]
    fn total_price_must_be_strictly_positive() {
        for price in [0.0, -3.0] {
            let mut input = complete();
            input["totalPrice"] = json!(price);
            assert_eq!(build(input).unwrap_err(), ValidationError::InvalidTotalPrice);
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert_eq!(
            "shipped".parse::<OrderStatus>(),
            Err(UnknownStatus("shipped".to_string()))
        );
    }

    #[test]
    fn order_serializes_with_client_field_names() {
        let order = build(complete()).unwrap();
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(value["status"], "pending_owner");
        assert_eq!(value["totalPrice"], 45.5);
        assert!(value["courierId"].is_null());
        assert_eq!(value["hiddenForCourier"], false);
        assert_eq!(value["items"][1]["serviceType"], "dry_clean");
        assert!(value["items"][1].get("serviceKind").is_none());
    }

    #[test]
    fn item_keeps_the_client_service_field_name() {
        let item: OrderItem = serde_json::from_value(json!({
            "name": "Shirt", "quantity": 1, "serviceType": "express", "price": 8.5
        }))
        .unwrap();

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["serviceType"], "express");
        assert!(value.get("serviceKind").is_none());
    }
}
