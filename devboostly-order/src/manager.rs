use crate::error::{ServiceError, ServiceResult};
use crate::models::{Order, OrderStatus, TransitionError};
use crate::repository::Store;
use std::sync::Arc;
use uuid::Uuid;

pub(crate) const MAX_WRITE_ATTEMPTS: usize = 5;

/// Staff-driven order lifecycle (delivery progress after payment)
pub struct OrderManager {
    orders: Arc<dyn Store>,
}

impl OrderManager {
    pub fn new(orders: Arc<dyn Store>) -> Self {
        Self { orders }
    }

    pub async fn get_order(&self, order_id: Uuid) -> ServiceResult<Order> {
        self.orders.get_order(order_id).await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {}", order_id)))
    }

    /// All orders, newest first, optionally filtered by status
    pub async fn list_orders(&self, status: Option<OrderStatus>) -> ServiceResult<Vec<Order>> {
        let orders = self.orders.list_orders().await?;
        Ok(match status {
            Some(status) => orders.into_iter().filter(|o| o.status == status).collect(),
            None => orders,
        })
    }

    /// Transition: Paid → Processing → Completed (or Paid → Completed)
    pub async fn advance_status(&self, order_id: Uuid, status: OrderStatus) -> ServiceResult<Order> {
        let mut order = self.get_order(order_id).await?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let expected = order.version;
            let mut updated = order.clone();
            if !advance(&mut updated, status)? {
                return Ok(order);
            }
            updated.version += 1;

            if self.orders.update_order(&updated, expected).await? {
                tracing::info!("Order {} moved to {}", updated.number, status.as_str());
                return Ok(updated);
            }
            order = self.get_order(order_id).await?;
        }
        Err(ServiceError::Conflict("Order was modified concurrently, please retry".to_string()))
    }
}

/// Apply a delivery status change. Returns false when the order is already there.
pub fn advance(order: &mut Order, to: OrderStatus) -> Result<bool, TransitionError> {
    if order.status == to {
        return Ok(false);
    }

    let allowed = order.deposit.paid
        && matches!(
            (order.status, to),
            (OrderStatus::Paid, OrderStatus::Processing)
                | (OrderStatus::Paid, OrderStatus::Completed)
                | (OrderStatus::Processing, OrderStatus::Completed)
        );
    if !allowed {
        return Err(TransitionError::InvalidTransition {
            from: order.status.as_str().to_string(),
            to: to.as_str().to_string(),
        });
    }

    order.status = to;
    order.updated_at = chrono::Utc::now();
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::repository::OrderRepository;
    use crate::models::{BillingInfo, LegKind, NewOrder, OrderItem, ProjectDetails};
    use devboostly_catalog::ProductType;
    use devboostly_shared::Masked;

    fn pending_order() -> Order {
        Order::new(NewOrder {
            number: "ORD-2026-0007".into(),
            customer_id: Uuid::new_v4(),
            quote_id: None,
            item: OrderItem {
                item_id: "site-vitrine".into(),
                item_type: ProductType::Offer,
                name: "Site vitrine".into(),
                price: 59900,
                ephemeral: false,
            },
            currency: "eur".into(),
            deposit_percent: 40,
            project_details: ProjectDetails::default(),
            billing_info: BillingInfo {
                full_name: "Jeanne".into(),
                email: Masked::new("jeanne@example.com".into()),
                company: None,
                address: None,
                city: None,
                postal_code: None,
                country: None,
                vat_number: None,
            },
        })
        .unwrap()
    }

    fn paid_order() -> Order {
        let mut order = pending_order();
        order.attach_intent(LegKind::Deposit, "pi_dep".into());
        order.record_leg_paid(LegKind::Deposit, "pi_dep", chrono::Utc::now()).unwrap();
        order
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let store = Arc::new(InMemoryStore::new());
        let manager = OrderManager::new(store.clone());
        let order = paid_order();
        store.insert_order(&order).await.unwrap();

        // Paid → Processing
        let order = manager.advance_status(order.id, OrderStatus::Processing).await.unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.version, 1);

        // Processing → Completed
        let order = manager.advance_status(order.id, OrderStatus::Completed).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        // repeating is a no-op
        let again = manager.advance_status(order.id, OrderStatus::Completed).await.unwrap();
        assert_eq!(again.version, order.version);
    }

    #[test]
    fn test_invalid_transition() {
        // Cannot start work before the deposit
        let mut order = pending_order();
        assert!(advance(&mut order, OrderStatus::Processing).is_err());
        assert!(advance(&mut order, OrderStatus::Completed).is_err());

        // No going back
        let mut order = paid_order();
        advance(&mut order, OrderStatus::Completed).unwrap();
        assert!(advance(&mut order, OrderStatus::Processing).is_err());
        assert!(advance(&mut order, OrderStatus::Paid).is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = Arc::new(InMemoryStore::new());
        let manager = OrderManager::new(store.clone());
        store.insert_order(&pending_order()).await.unwrap();
        store.insert_order(&paid_order()).await.unwrap();

        assert_eq!(manager.list_orders(None).await.unwrap().len(), 2);
        assert_eq!(manager.list_orders(Some(OrderStatus::Paid)).await.unwrap().len(), 1);
    }
}
