//! Business listing commands.

use stampcard_core::BusinessId;
use stampcard_core::search::compare_customers;
use stampcard_web::db::{BusinessRepository, CustomerRepository, RepositoryError};
use stampcard_web::services::store::DocumentStore;

/// List every business, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn list(store: &dyn DocumentStore) -> Result<(), RepositoryError> {
    let businesses = BusinessRepository::new(store).list().await?;
    if businesses.is_empty() {
        tracing::info!("No businesses");
    }
    for business in &businesses {
        tracing::info!(
            "{}  {}  goal={}  pass={}",
            business.id,
            business.name,
            business.goal_stamps,
            business.pass_type_identifier
        );
    }
    Ok(())
}

/// List the customers of one business, sorted by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn customers(
    store: &dyn DocumentStore,
    business_id: &str,
) -> Result<(), RepositoryError> {
    let business_id = BusinessId::new(business_id);
    let mut customers = CustomerRepository::new(store)
        .list_for_business(&business_id)
        .await?;
    customers.sort_by(compare_customers);
    let total: u64 = customers.iter().map(|c| u64::from(c.stamps)).sum();
    for customer in &customers {
        tracing::info!(
            "{}  {}  {}  stamps={}",
            customer.id,
            customer.display_name(),
            customer.email.as_deref().unwrap_or("-"),
            customer.stamps
        );
    }
    tracing::info!("{} customers, {} stamps", customers.len(), total);
    Ok(())
}
