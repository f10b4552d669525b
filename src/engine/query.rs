use uuid::Uuid;

use crate::auth::Caller;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::Role;

/// Role-scoped order listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderQuery {
    Customer(Uuid),
    Owner,
    /// Unclaimed work plus this courier's own active and past claims.
    Courier(Uuid),
}

impl OrderQuery {
    pub fn for_caller(caller: &Caller) -> Self {
        match caller.role {
            Role::Customer => OrderQuery::Customer(caller.id),
            Role::Owner => OrderQuery::Owner,
            Role::Courier => OrderQuery::Courier(caller.id),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            OrderQuery::Customer(_) => Role::Customer,
            OrderQuery::Owner => Role::Owner,
            OrderQuery::Courier(_) => Role::Courier,
        }
    }

    /// Whether the order belongs to this view, ignoring hide flags.
    pub fn in_scope(&self, order: &Order) -> bool {
        match *self {
            OrderQuery::Customer(customer_id) => order.customer_id == customer_id,
            OrderQuery::Owner => true,
            OrderQuery::Courier(courier_id) => match order.status {
                OrderStatus::CourierAssigned => {
                    order.courier_id.is_none() || order.courier_id == Some(courier_id)
                }
                OrderStatus::Delivered | OrderStatus::Cancelled => {
                    order.courier_id == Some(courier_id)
                }
                OrderStatus::PendingOwner => false,
            },
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.in_scope(order) && !order.is_hidden_for(self.role())
    }
}
