//! In-process store implementations for unit tests of the layers above the
//! database. They honour the same not-found contracts as the Postgres stores.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::StoreError;
use super::identities::{IdentityStore, NewSubject, Subject};
use super::orders::{NewOrder, Order, OrderDetail, OrderInput, OrderPatch, OrderStore};
use super::products::{Product, ProductInput, ProductPatch, ProductStore};
use crate::auth::role::Role;

#[derive(Default)]
pub struct MemoryIdentityStore {
    subjects: Mutex<HashMap<Uuid, Subject>>,
}

impl MemoryIdentityStore {
    pub fn insert(&self, email: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.subjects.lock().unwrap().insert(
            id,
            Subject {
                user_id: id,
                name: "test".into(),
                email: email.into(),
                password_hash: String::new(),
                role,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn remove(&self, id: Uuid) {
        self.subjects.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_by_email(&self, email: &str) -> Result<Subject, StoreError> {
        self.subjects
            .lock()
            .unwrap()
            .values()
            .find(|s| s.email == email)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", email))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Subject, StoreError> {
        self.subjects
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn create(&self, subject: &NewSubject) -> Result<Uuid, StoreError> {
        let mut subjects = self.subjects.lock().unwrap();
        if subjects.values().any(|s| s.email == subject.email) {
            return Err(StoreError::Conflict {
                entity: "user",
                reason: "already exists",
            });
        }
        let id = Uuid::new_v4();
        let now = Utc::now();
        subjects.insert(
            id,
            Subject {
                user_id: id,
                name: subject.name.clone(),
                email: subject.email.clone(),
                password_hash: subject.password_hash.clone(),
                role: subject.role,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }
}

#[derive(Default)]
pub struct MemoryProductStore {
    products: Mutex<HashMap<Uuid, Product>>,
}

impl MemoryProductStore {
    pub fn count(&self) -> usize {
        self.products.lock().unwrap().len()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.products.lock().unwrap().values().cloned().collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Product, StoreError> {
        self.products
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn create(&self, input: &ProductInput) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.products.lock().unwrap().insert(
            id,
            Product {
                product_id: id,
                name: input.name.clone(),
                description: input.description.clone(),
                price: input.price,
                stock: input.stock,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn replace_by_id(&self, id: Uuid, input: &ProductInput) -> Result<(), StoreError> {
        let mut products = self.products.lock().unwrap();
        let p = products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        p.name.clone_from(&input.name);
        p.description.clone_from(&input.description);
        p.price = input.price;
        p.stock = input.stock;
        p.updated_at = Utc::now();
        Ok(())
    }

    async fn merge_by_id(&self, id: Uuid, patch: &ProductPatch) -> Result<(), StoreError> {
        let patch = patch.clone().normalized();
        let mut products = self.products.lock().unwrap();
        let p = products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        if let Some(v) = patch.name {
            p.name = v;
        }
        if let Some(v) = patch.description {
            p.description = v;
        }
        if let Some(v) = patch.price {
            p.price = v;
        }
        if let Some(v) = patch.stock {
            p.stock = v;
        }
        p.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), StoreError> {
        self.products
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("product", id))
    }
}

/// Orders without line pricing: `items_price` stays zero.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
    fn owned(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, StoreError> {
        self.orders
            .lock()
            .unwrap()
            .get(&order_id)
            .filter(|o| o.user_id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("order", order_id))
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get_all(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderDetail, StoreError> {
        Ok(OrderDetail {
            order: self.owned(user_id, order_id)?,
            items: vec![],
        })
    }

    async fn create(&self, user_id: Uuid, order: &NewOrder) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.orders.lock().unwrap().insert(
            id,
            Order {
                order_id: id,
                user_id,
                address: order.address.clone(),
                payment_method: order.payment_method.clone(),
                status: "pending".into(),
                items_price: 0.0,
                tax_price: order.tax_price,
                shipping_price: order.shipping_price,
                total_price: order.tax_price + order.shipping_price,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn replace_by_id(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: &OrderInput,
    ) -> Result<(), StoreError> {
        self.owned(user_id, order_id)?;
        let mut orders = self.orders.lock().unwrap();
        let o = orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;
        o.address.clone_from(&input.address);
        o.payment_method.clone_from(&input.payment_method);
        o.status.clone_from(&input.status);
        o.tax_price = input.tax_price;
        o.shipping_price = input.shipping_price;
        o.total_price = o.items_price + o.tax_price + o.shipping_price;
        Ok(())
    }

    async fn merge_by_id(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        patch: &OrderPatch,
    ) -> Result<(), StoreError> {
        self.owned(user_id, order_id)?;
        let patch = patch.clone().normalized();
        let mut orders = self.orders.lock().unwrap();
        let o = orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;
        if let Some(v) = patch.address {
            o.address = v;
        }
        if let Some(v) = patch.payment_method {
            o.payment_method = v;
        }
        if let Some(v) = patch.status {
            o.status = v;
        }
        if let Some(v) = patch.tax_price {
            o.tax_price = v;
        }
        if let Some(v) = patch.shipping_price {
            o.shipping_price = v;
        }
        o.total_price = o.items_price + o.tax_price + o.shipping_price;
        Ok(())
    }

    async fn delete_by_id(&self, user_id: Uuid, order_id: Uuid) -> Result<(), StoreError> {
        self.owned(user_id, order_id)?;
        self.orders.lock().unwrap().remove(&order_id);
        Ok(())
    }
}
