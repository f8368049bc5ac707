use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use super::ServiceError;
use crate::auth::middleware::Principal;
use crate::store::orders::{NewOrder, Order, OrderDetail, OrderInput, OrderPatch, OrderStore};
use crate::validation;

pub const ORDER_STATUSES: [&str; 5] = ["pending", "paid", "shipped", "delivered", "cancelled"];

/// Order operations on behalf of a caller. The owning subject always comes
/// from the [`Principal`], never from the request body, so a caller can only
/// see and change their own orders.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.get_all(principal.subject_id).await?)
    }

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<OrderDetail, ServiceError> {
        Ok(self.store.get_by_id(principal.subject_id, id).await?)
    }

    pub async fn create(&self, principal: &Principal, order: &NewOrder) -> Result<Uuid, ServiceError> {
        validate_new_order(order)?;
        Ok(self.store.create(principal.subject_id, order).await?)
    }

    pub async fn replace(
        &self,
        principal: &Principal,
        id: Uuid,
        input: &OrderInput,
    ) -> Result<(), ServiceError> {
        validate_input(input)?;
        self.store.get_by_id(principal.subject_id, id).await?;
        Ok(self.store.replace_by_id(principal.subject_id, id, input).await?)
    }

    pub async fn merge(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: &OrderPatch,
    ) -> Result<(), ServiceError> {
        validate_patch(patch)?;
        self.store.get_by_id(principal.subject_id, id).await?;
        Ok(self.store.merge_by_id(principal.subject_id, id, patch).await?)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<(), ServiceError> {
        self.store.get_by_id(principal.subject_id, id).await?;
        Ok(self.store.delete_by_id(principal.subject_id, id).await?)
    }
}

fn validate_new_order(order: &NewOrder) -> Result<(), ServiceError> {
    validation::check_length("address", order.address.trim(), 1, 1000)?;
    validation::check_length("payment_method", order.payment_method.trim(), 1, 100)?;
    check_charges(order.tax_price, order.shipping_price)?;

    if order.items.is_empty() {
        return Err(ServiceError::InvalidField("order must contain at least one item".into()));
    }
    let mut seen = HashSet::with_capacity(order.items.len());
    for item in &order.items {
        if item.quantity <= 0 {
            return Err(ServiceError::InvalidQuantity);
        }
        if !seen.insert(item.product_id) {
            return Err(ServiceError::InvalidField(format!(
                "product {} appears more than once",
                item.product_id
            )));
        }
    }
    Ok(())
}

fn validate_input(input: &OrderInput) -> Result<(), ServiceError> {
    validation::check_length("address", input.address.trim(), 1, 1000)?;
    validation::check_length("payment_method", input.payment_method.trim(), 1, 100)?;
    check_status(&input.status)?;
    check_charges(input.tax_price, input.shipping_price)
}

fn validate_patch(patch: &OrderPatch) -> Result<(), ServiceError> {
    if let Some(status) = patch.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        check_status(status)?;
    }
    check_charges(
        patch.tax_price.unwrap_or_default(),
        patch.shipping_price.unwrap_or_default(),
    )?;
    if let Some(address) = patch.address.as_deref() {
        validation::check_length("address", address.trim(), 0, 1000)?;
    }
    if let Some(method) = patch.payment_method.as_deref() {
        validation::check_length("payment_method", method.trim(), 0, 100)?;
    }
    Ok(())
}

fn check_status(status: &str) -> Result<(), ServiceError> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ServiceError::InvalidStatus)
    }
}

fn check_charges(tax: f64, shipping: f64) -> Result<(), ServiceError> {
    if tax.is_nan() || shipping.is_nan() || tax < 0.0 || shipping < 0.0 {
        return Err(ServiceError::InvalidCharge);
    }
    Ok(())
}
