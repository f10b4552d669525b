use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::engine::query::OrderQuery;
use crate::engine::rating::RatingAggregator;
use crate::engine::transitions;
use crate::error::{AppError, ForbiddenReason};
use crate::models::order::{NewOrder, Order, OrderStatus, OrderView, UnknownStatus};
use crate::models::user::{Contact, Role};
use crate::observability::metrics::Metrics;
use crate::store::{ClaimOutcome, Directory, OrderStore, StatusWrite, StoreError};

const PRICE_EPSILON: f64 = 0.005;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Reject ratings on orders that are not yet delivered or cancelled.
    pub rating_requires_terminal: bool,
    /// Owner stamped on every new order in a single-owner deployment.
    pub default_owner_id: Option<Uuid>,
}

/// Applies order lifecycle operations against an injected store.
pub struct OrderEngine {
    store: Arc<dyn OrderStore>,
    directory: Arc<dyn Directory>,
    ratings: RatingAggregator,
    config: EngineConfig,
    metrics: Metrics,
}

impl OrderEngine {
    pub fn new(
        store: Arc<dyn OrderStore>,
        directory: Arc<dyn Directory>,
        config: EngineConfig,
        metrics: Metrics,
    ) -> Self {
        let ratings = RatingAggregator::new(store.clone(), directory.clone(), metrics.clone());

        Self {
            store,
            directory,
            ratings,
            config,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    pub async fn create(&self, caller: &Caller, input: NewOrder) -> Result<Order, AppError> {
        self.timed("create", self.create_order(caller, input)).await
    }

    pub async fn request_transition(
        &self,
        order_id: Uuid,
        requested: &str,
        caller: &Caller,
    ) -> Result<Order, AppError> {
        self.timed("transition", self.transition(order_id, requested, caller))
            .await
    }

    pub async fn claim(&self, order_id: Uuid, caller: &Caller) -> Result<OrderView, AppError> {
        self.timed("claim", self.claim_order(order_id, caller)).await
    }

    pub async fn rate(
        &self,
        order_id: Uuid,
        rating: f64,
        review: Option<String>,
        caller: &Caller,
    ) -> Result<Order, AppError> {
        self.timed("rate", self.rate_order(order_id, rating, review, caller))
            .await
    }

    pub async fn set_hidden(
        &self,
        order_id: Uuid,
        hidden: bool,
        caller: &Caller,
    ) -> Result<Order, AppError> {
        self.timed("hide", self.hide_order(order_id, hidden, caller))
            .await
    }

    /// Detail read; orders outside the caller's view report `NotFound`.
    pub async fn get(&self, order_id: Uuid, caller: &Caller) -> Result<OrderView, AppError> {
        let order = self.load(order_id).await?;
        if !OrderQuery::for_caller(caller).in_scope(&order) {
            return Err(not_found(order_id));
        }
        Ok(self.enrich(order).await?)
    }

    pub async fn list_for_customer(&self, caller: &Caller) -> Result<Vec<OrderView>, AppError> {
        require_role(caller, Role::Customer)?;
        self.list(OrderQuery::Customer(caller.id)).await
    }

    pub async fn list_for_owner(&self, caller: &Caller) -> Result<Vec<OrderView>, AppError> {
        require_role(caller, Role::Owner)?;
        self.list(OrderQuery::Owner).await
    }

    pub async fn list_for_courier(&self, caller: &Caller) -> Result<Vec<OrderView>, AppError> {
        require_role(caller, Role::Courier)?;
        self.list(OrderQuery::Courier(caller.id)).await
    }

    async fn create_order(&self, caller: &Caller, input: NewOrder) -> Result<Order, AppError> {
        require_role(caller, Role::Customer)?;

        let order = input.into_order(caller.id, self.config.default_owner_id, Utc::now())?;

        let subtotal = order.items_subtotal();
        if (subtotal - order.total_price).abs() > PRICE_EPSILON {
            warn!(
                customer_id = %caller.id,
                total_price = order.total_price,
                items_subtotal = subtotal,
                "client total differs from item subtotal; keeping client total"
            );
        }

        self.store.insert(order.clone()).await?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            items = order.items.len(),
            total_price = order.total_price,
            "order created"
        );
        Ok(order)
    }

    async fn transition(
        &self,
        order_id: Uuid,
        requested: &str,
        caller: &Caller,
    ) -> Result<Order, AppError> {
        if !transitions::role_may_transition(caller.role) {
            return Err(AppError::Forbidden(ForbiddenReason::RoleNotPermitted));
        }

        let order = self.load(order_id).await?;
        let requested: OrderStatus = requested
            .parse()
            .map_err(|UnknownStatus(raw)| AppError::InvalidStatus(raw))?;

        if !order.status.can_transition_to(requested) {
            warn!(
                order_id = %order_id,
                from = %order.status,
                to = %requested,
                caller_id = %caller.id,
                "rejected status transition"
            );
            return Err(AppError::InvalidTransition {
                current: order.status,
                requested,
            });
        }

        transitions::authorize(&order, requested, caller).map_err(|reason| {
            warn!(order_id = %order_id, caller_id = %caller.id, reason = %reason, "transition forbidden");
            AppError::Forbidden(reason)
        })?;

        let approving_owner = (caller.role == Role::Owner
            && requested == OrderStatus::CourierAssigned)
            .then_some(caller.id);

        match self
            .store
            .set_status_if(order_id, order.status, requested, approving_owner)
            .await?
        {
            StatusWrite::Applied(updated) => {
                self.metrics
                    .order_transitions_total
                    .with_label_values(&[order.status.as_str(), requested.as_str()])
                    .inc();
                info!(
                    order_id = %order_id,
                    from = %order.status,
                    to = %requested,
                    caller_id = %caller.id,
                    role = %caller.role,
                    "order status changed"
                );
                Ok(updated)
            }
            StatusWrite::Stale(fresh) if !fresh.status.can_transition_to(requested) => {
                Err(AppError::InvalidTransition {
                    current: fresh.status,
                    requested,
                })
            }
            StatusWrite::Stale(fresh) => Err(AppError::Conflict(format!(
                "order {order_id} changed to {} while moving it to {requested}",
                fresh.status
            ))),
            StatusWrite::Missing => Err(not_found(order_id)),
        }
    }

    async fn claim_order(&self, order_id: Uuid, caller: &Caller) -> Result<OrderView, AppError> {
        require_role(caller, Role::Courier)?;

        let outcome = self.store.claim(order_id, caller.id).await?;
        let label = match &outcome {
            ClaimOutcome::Claimed(_) => "claimed",
            ClaimOutcome::AlreadyHeld(_) => "already_held",
            ClaimOutcome::HeldByOther(_) => "already_claimed",
            ClaimOutcome::NotClaimable(_) => "not_claimable",
            ClaimOutcome::Missing => "not_found",
        };
        self.metrics
            .order_claims_total
            .with_label_values(&[label])
            .inc();

        match outcome {
            ClaimOutcome::Claimed(order) => {
                info!(order_id = %order_id, courier_id = %caller.id, "order claimed");
                Ok(self.enrich(order).await?)
            }
            ClaimOutcome::AlreadyHeld(order) => {
                debug!(order_id = %order_id, courier_id = %caller.id, "claim already held");
                Ok(self.enrich(order).await?)
            }
            ClaimOutcome::HeldByOther(_) => {
                info!(order_id = %order_id, courier_id = %caller.id, "claim lost to another courier");
                Err(AppError::AlreadyClaimed)
            }
            ClaimOutcome::NotClaimable(order) => Err(AppError::NotClaimable(order.status)),
            ClaimOutcome::Missing => Err(not_found(order_id)),
        }
    }

    async fn rate_order(
        &self,
        order_id: Uuid,
        rating: f64,
        review: Option<String>,
        caller: &Caller,
    ) -> Result<Order, AppError> {
        if !(0.0..=5.0).contains(&rating) {
            return Err(AppError::InvalidRating(rating));
        }
        require_role(caller, Role::Customer)?;

        let order = self.load(order_id).await?;
        if order.customer_id != caller.id {
            return Err(AppError::Forbidden(ForbiddenReason::NotOrderCustomer));
        }
        if self.config.rating_requires_terminal && !order.status.is_terminal() {
            return Err(AppError::NotRateable(order.status));
        }

        let rated = self
            .store
            .set_rating(order_id, rating, review)
            .await?
            .ok_or_else(|| not_found(order_id))?;

        self.metrics.order_ratings_total.inc();
        info!(order_id = %order_id, rating, status = %rated.status, "order rated");

        match rated.owner_id {
            Some(owner_id) => {
                self.ratings
                    .recompute_owner_rating(owner_id)
                    .await
                    .map_err(|err| AppError::AggregationFailed {
                        order_id,
                        reason: err.to_string(),
                    })?;
            }
            None => self.ratings.skip_unowned(order_id),
        }

        Ok(rated)
    }

    async fn hide_order(
        &self,
        order_id: Uuid,
        hidden: bool,
        caller: &Caller,
    ) -> Result<Order, AppError> {
        let order = self.load(order_id).await?;
        if !OrderQuery::for_caller(caller).in_scope(&order) {
            return Err(not_found(order_id));
        }

        // The courier flag is shared by every courier.
        if caller.role == Role::Courier {
            transitions::courier_holds(&order, caller.id).map_err(AppError::Forbidden)?;
        }

        let updated = self
            .store
            .set_hidden(order_id, caller.role, hidden)
            .await?
            .ok_or_else(|| not_found(order_id))?;

        debug!(order_id = %order_id, role = %caller.role, hidden, "order visibility changed");
        Ok(updated)
    }

    async fn list(&self, query: OrderQuery) -> Result<Vec<OrderView>, AppError> {
        let orders = self.store.list(&query).await?;
        let views = try_join_all(orders.into_iter().map(|order| self.enrich(order))).await?;
        Ok(views)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| not_found(order_id))
    }

    async fn enrich(&self, order: Order) -> Result<OrderView, StoreError> {
        let (customer, owner, courier, address) = tokio::try_join!(
            self.contact(Some(order.customer_id)),
            self.contact(order.owner_id),
            self.contact(order.courier_id),
            self.directory.get_address(order.address_id),
        )?;

        Ok(OrderView {
            order,
            customer,
            owner,
            courier,
            address,
        })
    }

    async fn contact(&self, user_id: Option<Uuid>) -> Result<Option<Contact>, StoreError> {
        let Some(user_id) = user_id else {
            return Ok(None);
        };
        Ok(self.directory.get_user(user_id).await?.map(Contact::from))
    }

    async fn timed<T, F>(&self, operation: &str, work: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let start = Instant::now();
        let result = work.await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };

        self.metrics
            .engine_operation_latency_seconds
            .with_label_values(&[operation, outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}

fn require_role(caller: &Caller, role: Role) -> Result<(), AppError> {
    if caller.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden(ForbiddenReason::RoleNotPermitted))
    }
}

fn not_found(order_id: Uuid) -> AppError {
    AppError::NotFound(format!("order {order_id} not found"))
}
