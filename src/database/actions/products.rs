use crate::{
    error::ServiceError,
    schema::{Id, NewProduct, Product},
    store::Store,
};

pub async fn create_product<S: Store>(
    product: &NewProduct,
    store: &S,
) -> Result<Product, ServiceError> {
    let product = NewProduct {
        name: product.name.trim().to_owned(),
        measurement_unit: product.measurement_unit.trim().to_owned(),
    };
    if product.name.is_empty() || product.measurement_unit.is_empty() {
        return Err(ServiceError::validation(
            "Product name and measurement unit are required",
        ));
    }

    let row = store.insert_product(&product).await?;
    log::info!("Created product {} ({})", row.name, row.measurement_unit);

    Ok(row)
}

pub async fn get_product<S: Store>(id: Id, store: &S) -> Result<Product, ServiceError> {
    store
        .get_product(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("product".to_owned()))
}

pub async fn list_products<S: Store>(store: &S) -> Result<Vec<Product>, ServiceError> {
    Ok(store.list_products(None).await?)
}

/// Case-insensitive name prefix search. A blank prefix lists everything.
pub async fn search_products<S: Store>(
    prefix: &str,
    store: &S,
) -> Result<Vec<Product>, ServiceError> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return list_products(store).await;
    }

    Ok(store.list_products(Some(prefix)).await?)
}
