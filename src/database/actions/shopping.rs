use std::collections::BTreeMap;

use crate::{
    error::ServiceError,
    export::{ShoppingListDocument, ShoppingListFile},
    schema::{ComponentLine, Id, ShoppingListEntry},
    store::Store,
};

/// Groups component lines by (product name, unit) and sums their amounts.
///
/// The result is ordered by product name, then unit, and does not depend on
/// the order of `lines`.
pub fn aggregate<I>(lines: I) -> Result<Vec<ShoppingListEntry>, ServiceError>
where
    I: IntoIterator<Item = ComponentLine>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for line in lines {
        let total = totals
            .entry((line.name, line.measurement_unit))
            .or_insert(0);
        *total = total
            .checked_add(i64::from(line.amount))
            .ok_or_else(|| ServiceError::validation("Ingredient amount is too large"))?;
    }

    Ok(totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListEntry {
            name,
            amount,
            measurement_unit,
        })
        .collect())
}

pub async fn shopping_list<S: Store>(
    user_id: Id,
    store: &S,
) -> Result<Vec<ShoppingListEntry>, ServiceError> {
    let lines = store.basket_lines(user_id).await?;
    if lines.is_empty() {
        return Err(ServiceError::EmptyBasket);
    }

    log::debug!("Aggregating {} basket lines for user {user_id}", lines.len());
    aggregate(lines)
}

/// The shopping list rendered as the downloadable text file.
pub async fn download_shopping_list<S: Store>(
    user_id: Id,
    store: &S,
) -> Result<ShoppingListFile, ServiceError> {
    let entries = shopping_list(user_id, store).await?;

    Ok(ShoppingListDocument::new(entries).into_file())
}
