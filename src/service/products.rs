use std::sync::Arc;

use uuid::Uuid;

use super::ServiceError;
use crate::store::products::{Product, ProductInput, ProductPatch, ProductStore};
use crate::validation;

#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn ProductStore>,
}

impl ProductService {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.store.get_all().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, ServiceError> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn create(&self, input: &ProductInput) -> Result<Uuid, ServiceError> {
        validate_input(input)?;
        Ok(self.store.create(input).await?)
    }

    pub async fn replace(&self, id: Uuid, input: &ProductInput) -> Result<(), ServiceError> {
        validate_input(input)?;
        self.store.get_by_id(id).await?;
        Ok(self.store.replace_by_id(id, input).await?)
    }

    pub async fn merge(&self, id: Uuid, patch: &ProductPatch) -> Result<(), ServiceError> {
        validate_patch(patch)?;
        self.store.get_by_id(id).await?;
        Ok(self.store.merge_by_id(id, patch).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.get_by_id(id).await?;
        Ok(self.store.delete_by_id(id).await?)
    }
}

fn validate_input(input: &ProductInput) -> Result<(), ServiceError> {
    if input.price.is_nan() || input.price <= 0.0 {
        return Err(ServiceError::InvalidPrice);
    }
    if input.stock < 0 {
        return Err(ServiceError::InvalidStock);
    }
    validation::check_length("name", &input.name, 1, 255)?;
    validation::check_length("description", &input.description, 0, 10_000)
}

// Zero means "keep", so only a supplied non-zero price is judged.
fn validate_patch(patch: &ProductPatch) -> Result<(), ServiceError> {
    if let Some(price) = patch.price
        && price != 0.0
        && (price.is_nan() || price < 0.0)
    {
        return Err(ServiceError::InvalidPrice);
    }
    if patch.stock.is_some_and(|s| s < 0) {
        return Err(ServiceError::InvalidStock);
    }
    if let Some(name) = patch.name.as_deref().filter(|n| !n.is_empty()) {
        validation::check_length("name", name, 1, 255)?;
    }
    if let Some(description) = patch.description.as_deref() {
        validation::check_length("description", description, 0, 10_000)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::store::StoreError;
    use crate::store::memory::MemoryProductStore;

    fn input(price: f64, stock: i32) -> ProductInput {
        ProductInput {
            name: "Widget".into(),
            description: "A widget".into(),
            price,
            stock,
        }
    }

    fn service() -> (ProductService, Arc<MemoryProductStore>) {
        let store = Arc::new(MemoryProductStore::default());
        (ProductService::new(store.clone()), store)
    }

    #[rstest]
    #[case(9.99, 0, None)]
    #[case(0.01, 100, None)]
    #[case(0.0, 1, Some("price"))]
    #[case(-1.0, 1, Some("price"))]
    #[case(5.0, -1, Some("stock"))]
    #[case(-5.0, -1, Some("price"))]
    fn create_validation(#[case] price: f64, #[case] stock: i32, #[case] rejected: Option<&str>) {
        let result = validate_input(&input(price, stock));
        match rejected {
            None => assert!(result.is_ok()),
            Some("price") => assert!(matches!(result, Err(ServiceError::InvalidPrice))),
            Some(_) => assert!(matches!(result, Err(ServiceError::InvalidStock))),
        }
    }

    #[rstest]
    #[case(Some(0.0), None, true)]
    #[case(Some(2.5), None, true)]
    #[case(Some(-2.5), None, false)]
    #[case(None, Some(0), true)]
    #[case(None, Some(5), true)]
    #[case(None, Some(-1), false)]
    fn patch_validation(#[case] price: Option<f64>, #[case] stock: Option<i32>, #[case] ok: bool) {
        let patch = ProductPatch {
            price,
            stock,
            ..ProductPatch::default()
        };
        assert_eq!(validate_patch(&patch).is_ok(), ok);
    }

    #[test]
    fn empty_name_rejected_on_create() {
        let mut bad = input(1.0, 1);
        bad.name = String::new();
        assert!(matches!(validate_input(&bad), Err(ServiceError::InvalidField(_))));
    }

    #[tokio::test]
    async fn invalid_create_never_reaches_store() {
        let (svc, store) = service();
        let err = svc.create(&input(0.0, 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPrice));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn create_then_get() {
        let (svc, _) = service();
        let id = svc.create(&input(9.99, 3)).await.unwrap();
        let product = svc.get(id).await.unwrap();
        assert_eq!(product.name, "Widget");
        assert!((product.price - 9.99).abs() < f64::EPSILON);
        assert_eq!(product.stock, 3);
    }

    #[tokio::test]
    async fn replace_missing_is_not_found() {
        let (svc, store) = service();
        let err = svc.replace(Uuid::new_v4(), &input(1.0, 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound { .. })));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn zero_price_patch_keeps_price() {
        let (svc, _) = service();
        let id = svc.create(&input(9.99, 3)).await.unwrap();
        let patch = ProductPatch {
            price: Some(0.0),
            stock: Some(5),
            ..ProductPatch::default()
        };
        svc.merge(id, &patch).await.unwrap();

        let product = svc.get(id).await.unwrap();
        assert!((product.price - 9.99).abs() < f64::EPSILON);
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn delete_twice() {
        let (svc, _) = service();
        let id = svc.create(&input(1.0, 1)).await.unwrap();
        svc.delete(id).await.unwrap();
        let err = svc.delete(id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound { .. })));
    }
}
