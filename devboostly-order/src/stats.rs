use crate::account::User;
use crate::error::ServiceResult;
use crate::repository::Store;
use crate::models::{Order, OrderPaymentStatus, OrderStatus};
use crate::quote::{Quote, QuoteStatus};
use crate::ticket::Ticket;
use serde::Serialize;
use std::collections::BTreeMap;

/// Admin dashboard figures. Amounts in cents.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: usize,
    pub total_orders: usize,
    pub orders_by_status: BTreeMap<&'static str, usize>,
    pub orders_by_payment_status: BTreeMap<&'static str, usize>,
    /// Paid legs of non-cancelled orders
    pub revenue_collected: i64,
    /// Unpaid balances of orders whose deposit is in
    pub outstanding_balance: i64,
    pub quotes_by_status: BTreeMap<&'static str, usize>,
    pub quotes_awaiting_review: usize,
    pub open_tickets: usize,
}

impl DashboardStats {
    /// Full scan of the store; fine at agency volumes.
    pub async fn collect(store: &dyn Store) -> ServiceResult<Self> {
        let users = store.list_users().await?;
        let orders = store.list_orders().await?;
        let quotes = store.list_quotes().await?;
        let tickets = store.list_tickets().await?;
        Ok(Self::compute(&users, &orders, &quotes, &tickets))
    }

    pub fn compute(users: &[User], orders: &[Order], quotes: &[Quote], tickets: &[Ticket]) -> Self {
        let mut stats = DashboardStats {
            total_users: users.len(),
            total_orders: orders.len(),
            ..Default::default()
        };

        for order in orders {
            *stats.orders_by_status.entry(order.status.as_str()).or_default() += 1;
            *stats.orders_by_payment_status.entry(order.payment_status.as_str()).or_default() += 1;

            if order.status == OrderStatus::Cancelled {
                continue;
            }
            for leg in [&order.deposit, &order.balance] {
                if leg.paid {
                    stats.revenue_collected += leg.amount;
                }
            }
            if order.payment_status == OrderPaymentStatus::DepositPaid && !order.balance.paid {
                stats.outstanding_balance += order.balance.amount;
            }
        }

        for quote in quotes {
            *stats.quotes_by_status.entry(quote.status.as_str()).or_default() += 1;
            if quote.status == QuoteStatus::Pending {
                stats.quotes_awaiting_review += 1;
            }
        }

        stats.open_tickets = tickets.iter().filter(|t| !t.status.is_locked()).count();
        stats
    }
}
