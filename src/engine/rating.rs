use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::observability::metrics::Metrics;
use crate::store::{Directory, OrderStore, StoreError};

/// Recomputes owner ratings from the orders rated against them.
#[derive(Clone)]
pub struct RatingAggregator {
    store: Arc<dyn OrderStore>,
    directory: Arc<dyn Directory>,
    metrics: Metrics,
}

impl RatingAggregator {
    pub fn new(store: Arc<dyn OrderStore>, directory: Arc<dyn Directory>, metrics: Metrics) -> Self {
        Self {
            store,
            directory,
            metrics,
        }
    }

    /// Writes the mean of every rating on the owner's orders back to the
    /// owner. Returns `None` and leaves the owner untouched when nothing has
    /// been rated yet.
    pub async fn recompute_owner_rating(&self, owner_id: Uuid) -> Result<Option<f64>, AppError> {
        let ratings = self.store.owner_ratings(owner_id).await?;

        let Some(average) = mean(&ratings) else {
            debug!(owner_id = %owner_id, "owner has no rated orders; rating unchanged");
            self.record("no_ratings");
            return Ok(None);
        };

        match self.directory.set_user_rating(owner_id, average).await {
            Ok(()) => {
                info!(owner_id = %owner_id, rating = average, rated_orders = ratings.len(), "owner rating updated");
                self.record("updated");
                Ok(Some(average))
            }
            Err(StoreError::Missing(_)) => {
                warn!(owner_id = %owner_id, "owner missing from directory; rating not written");
                self.record("error");
                Err(AppError::NotFound(format!("owner {owner_id} not found")))
            }
            Err(err) => {
                warn!(owner_id = %owner_id, error = %err, "failed to write owner rating");
                self.record("error");
                Err(err.into())
            }
        }
    }

    /// Orders without an owner contribute to no aggregate.
    pub fn skip_unowned(&self, order_id: Uuid) {
        debug!(order_id = %order_id, "order has no owner; skipping rating aggregation");
        self.record("skipped");
    }

    fn record(&self, outcome: &str) {
        self.metrics
            .owner_rating_recomputations_total
            .with_label_values(&[outcome])
            .inc();
    }
}

pub fn mean(ratings: &[f64]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }

    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::models::order::{Order, OrderStatus};
    use crate::store::memory::{MemoryDirectory, MemoryOrderStore};

    fn rated_order(owner_id: Uuid, rating: f64) -> Order {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::from_u128(1),
            owner_id: Some(owner_id),
            courier_id: None,
            items: Vec::new(),
            total_price: 10.0,
            pickup_date: date,
            pickup_time: "09:00".to_string(),
            delivery_date: date,
            delivery_time: "18:00".to_string(),
            address_id: Uuid::from_u128(2),
            status: OrderStatus::Delivered,
            notes: String::new(),
            rating: Some(rating),
            review: None,
            hidden_for_user: false,
            hidden_for_owner: false,
            hidden_for_courier: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn owner_missing_from_directory_is_not_found_and_counted() {
        let store = Arc::new(MemoryOrderStore::new());
        let metrics = Metrics::new();
        let owner_id = Uuid::from_u128(7);
        store.insert(rated_order(owner_id, 3.0)).await.unwrap();

        let aggregator =
            RatingAggregator::new(store, Arc::new(MemoryDirectory::new()), metrics.clone());
        let err = aggregator.recompute_owner_rating(owner_id).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(
            metrics
                .owner_rating_recomputations_total
                .with_label_values(&["error"])
                .get(),
            1
        );
    }

    #[test]
    fn mean_of_no_ratings_is_undefined() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn mean_of_single_rating_is_that_rating() {
        assert_eq!(mean(&[4.5]), Some(4.5));
    }

    #[test]
    fn mean_averages_all_ratings() {
        assert_eq!(mean(&[3.0, 5.0, 4.0, 2.0]), Some(3.5));
    }
}
