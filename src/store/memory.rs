use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::query::OrderQuery;
use crate::models::address::Address;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::{Role, UserProfile};
use crate::store::{ClaimOutcome, Directory, OrderStore, StatusWrite, StoreError};

/// Orders held in a `DashMap`.
///
/// Conditional writes run while holding the entry's shard lock, which makes
/// each of them a single atomic step with respect to other writers of the
/// same order id.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<Uuid, Order>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), StoreError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(order.id)),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn set_status_if(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
        owner_if_unset: Option<Uuid>,
    ) -> Result<StatusWrite, StoreError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(StatusWrite::Missing);
        };

        if order.status != expected {
            return Ok(StatusWrite::Stale(order.clone()));
        }

        order.status = next;
        if order.owner_id.is_none() {
            order.owner_id = owner_if_unset;
        }
        order.updated_at = Utc::now();

        Ok(StatusWrite::Applied(order.clone()))
    }

    async fn claim(&self, id: Uuid, courier_id: Uuid) -> Result<ClaimOutcome, StoreError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(ClaimOutcome::Missing);
        };

        if order.status != OrderStatus::CourierAssigned {
            return Ok(ClaimOutcome::NotClaimable(order.clone()));
        }

        match order.courier_id {
            Some(holder) if holder == courier_id => Ok(ClaimOutcome::AlreadyHeld(order.clone())),
            Some(_) => Ok(ClaimOutcome::HeldByOther(order.clone())),
            None => {
                order.courier_id = Some(courier_id);
                order.updated_at = Utc::now();
                Ok(ClaimOutcome::Claimed(order.clone()))
            }
        }
    }

    async fn set_rating(
        &self,
        id: Uuid,
        rating: f64,
        review: Option<String>,
    ) -> Result<Option<Order>, StoreError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(None);
        };

        order.rating = Some(rating);
        order.review = review;
        order.updated_at = Utc::now();

        Ok(Some(order.clone()))
    }

    async fn set_hidden(
        &self,
        id: Uuid,
        role: Role,
        hidden: bool,
    ) -> Result<Option<Order>, StoreError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(None);
        };

        order.set_hidden_for(role, hidden);
        order.updated_at = Utc::now();

        Ok(Some(order.clone()))
    }

    async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn owner_ratings(&self, owner_id: Uuid) -> Result<Vec<f64>, StoreError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| entry.owner_id == Some(owner_id))
            .filter_map(|entry| entry.rating)
            .collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.orders.len())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// Users and their addresses. Addresses are grouped per user so that
/// moving the default flag happens under one entry lock.
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<Uuid, UserProfile>,
    addresses: DashMap<Uuid, Vec<Address>>,
    address_owner: DashMap<Uuid, Uuid>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_seed(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
            StoreError::Backend(format!("failed to read {}: {err}", path.display()))
        })?;
        let seed: DirectorySeed = serde_json::from_str(&raw).map_err(|err| {
            StoreError::Backend(format!("invalid seed {}: {err}", path.display()))
        })?;

        Ok(Self::from_seed(seed))
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for user in seed.users {
            directory.insert_user(user);
        }
        for address in seed.addresses {
            directory.insert_address(address);
        }
        directory
    }

    pub fn insert_user(&self, user: UserProfile) {
        self.users.insert(user.id, user);
    }

    pub fn user(&self, id: Uuid) -> Option<UserProfile> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    /// Adds an address; a default address clears the user's previous default.
    pub fn insert_address(&self, address: Address) {
        let address_id = address.id;
        let user_id = address.user_id;

        {
            let mut book = self.addresses.entry(user_id).or_default();
            if address.is_default {
                book.iter_mut().for_each(|existing| existing.is_default = false);
            }
            book.retain(|existing| existing.id != address_id);
            book.push(address);
        }

        self.address_owner.insert(address_id, user_id);
    }

    /// Marks one address as the user's default and clears every other one.
    pub fn set_default_address(&self, user_id: Uuid, address_id: Uuid) -> Result<(), StoreError> {
        let mut book = self
            .addresses
            .get_mut(&user_id)
            .ok_or(StoreError::Missing(user_id))?;

        if !book.iter().any(|address| address.id == address_id) {
            return Err(StoreError::Missing(address_id));
        }

        for address in book.iter_mut() {
            address.is_default = address.id == address_id;
        }
        Ok(())
    }

    pub fn addresses_for(&self, user_id: Uuid) -> Vec<Address> {
        self.addresses
            .get(&user_id)
            .map(|book| book.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_address(&self, id: Uuid) -> Result<Option<Address>, StoreError> {
        let Some(user_id) = self.address_owner.get(&id).map(|entry| *entry.value()) else {
            return Ok(None);
        };

        Ok(self.addresses.get(&user_id).and_then(|book| {
            book.iter().find(|address| address.id == id).cloned()
        }))
    }

    async fn set_user_rating(&self, id: Uuid, rating: f64) -> Result<(), StoreError> {
        let mut user = self.users.get_mut(&id).ok_or(StoreError::Missing(id))?;
        user.rating = Some(rating);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(user_id: Uuid, seed: u128, is_default: bool) -> Address {
        Address {
            id: Uuid::from_u128(seed),
            user_id,
            title: format!("address-{seed}"),
            street: "Bağdat Cd. 12".to_string(),
            city: "Istanbul".to_string(),
            zip_code: "34710".to_string(),
            phone: "05551234567".to_string(),
            is_default,
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn new_default_address_clears_previous_default() {
        let directory = MemoryDirectory::new();
        let user = Uuid::from_u128(1);

        directory.insert_address(address(user, 10, true));
        directory.insert_address(address(user, 11, false));
        directory.insert_address(address(user, 12, true));

        let defaults: Vec<Uuid> = directory
            .addresses_for(user)
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect();
        assert_eq!(defaults, vec![Uuid::from_u128(12)]);
    }

    #[test]
    fn set_default_address_leaves_exactly_one_default() {
        let directory = MemoryDirectory::new();
        let user = Uuid::from_u128(1);
        directory.insert_address(address(user, 10, true));
        directory.insert_address(address(user, 11, false));

        directory
            .set_default_address(user, Uuid::from_u128(11))
            .unwrap();

        let book = directory.addresses_for(user);
        assert_eq!(book.iter().filter(|a| a.is_default).count(), 1);
        assert!(book.iter().any(|a| a.id == Uuid::from_u128(11) && a.is_default));
    }

    #[test]
    fn default_flags_of_other_users_are_untouched() {
        let directory = MemoryDirectory::new();
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);
        directory.insert_address(address(alice, 10, true));
        directory.insert_address(address(bob, 20, true));

        assert!(directory.addresses_for(alice)[0].is_default);
        assert!(directory.addresses_for(bob)[0].is_default);
    }

    #[tokio::test]
    async fn address_lookup_resolves_through_owner_index() {
        let directory = MemoryDirectory::new();
        let user = Uuid::from_u128(1);
        directory.insert_address(address(user, 10, false));

        let found = directory.get_address(Uuid::from_u128(10)).await.unwrap();
        assert_eq!(found.map(|a| a.user_id), Some(user));
        assert!(directory
            .get_address(Uuid::from_u128(99))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn rating_write_back_requires_known_user() {
        let directory = MemoryDirectory::new();
        let result = directory.set_user_rating(Uuid::from_u128(5), 4.0).await;
        assert!(matches!(result, Err(StoreError::Missing(_))));
    }
}
