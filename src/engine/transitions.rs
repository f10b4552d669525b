use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ForbiddenReason;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::Role;

/// Outgoing edges of the order lifecycle.
pub fn allowed_next(current: OrderStatus) -> &'static [OrderStatus] {
    match current {
        OrderStatus::PendingOwner => &[OrderStatus::CourierAssigned, OrderStatus::Cancelled],
        OrderStatus::CourierAssigned => &[OrderStatus::Delivered, OrderStatus::Cancelled],
        OrderStatus::Delivered | OrderStatus::Cancelled => &[],
    }
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        allowed_next(self).contains(&next)
    }
}

/// Roles that may request any status change at all.
pub fn role_may_transition(role: Role) -> bool {
    matches!(role, Role::Owner | Role::Courier)
}

/// Who may drive a permitted edge. Owners approve and cancel; couriers
/// deliver or cancel only what they hold.
pub fn authorize(
    order: &Order,
    requested: OrderStatus,
    caller: &Caller,
) -> Result<(), ForbiddenReason> {
    match (caller.role, requested) {
        (Role::Owner, OrderStatus::CourierAssigned | OrderStatus::Cancelled) => Ok(()),
        (Role::Courier, OrderStatus::Delivered | OrderStatus::Cancelled) => {
            courier_holds(order, caller.id)
        }
        _ => Err(ForbiddenReason::RoleNotPermitted),
    }
}

pub fn courier_holds(order: &Order, courier_id: Uuid) -> Result<(), ForbiddenReason> {
    match order.courier_id {
        None => Err(ForbiddenReason::Unassigned),
        Some(holder) if holder != courier_id => Err(ForbiddenReason::WrongCourier),
        Some(_) => Ok(()),
    }
}
