use serde::{Deserialize, Serialize};
use devboostly_shared::money::percent_of;
pub use devboostly_shared::money::MIN_CHARGE_CENTS;

pub const DEFAULT_DEPOSIT_PERCENT: u8 = 40;

/// Largest order or quote total accepted, 1 000 000.00 €.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Amount of {0} cents is outside the accepted range (1 to {max})", max = MAX_AMOUNT_CENTS)]
    OutOfRange(i64),

    #[error("The {leg} of {cents} cents is below the minimum charge of {min} cents", min = MIN_CHARGE_CENTS)]
    BelowMinimumCharge { leg: &'static str, cents: i64 },
}

/// How the total of an order is collected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPlan {
    /// Deposit at checkout, balance once the project is delivered.
    Split,
    /// Everything at checkout, no balance leg.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSplit {
    pub deposit_cents: i64,
    pub balance_cents: i64,
}

impl PaymentPlan {
    /// Split `total_cents` into deposit and balance. The balance is the remainder, so the
    /// two always add up to the total. Every non-empty leg must be chargeable on its own.
    pub fn split(&self, total_cents: i64, deposit_percent: u8) -> Result<PaymentSplit, PricingError> {
        if !(1..=MAX_AMOUNT_CENTS).contains(&total_cents) {
            return Err(PricingError::OutOfRange(total_cents));
        }
        let deposit_cents = match self {
            PaymentPlan::Split => percent_of(total_cents, deposit_percent.min(100))
                .ok_or(PricingError::OutOfRange(total_cents))?,
            PaymentPlan::Full => total_cents,
        };
        let balance_cents = total_cents - deposit_cents;

        if deposit_cents < MIN_CHARGE_CENTS {
            return Err(PricingError::BelowMinimumCharge { leg: "deposit", cents: deposit_cents });
        }
        if balance_cents != 0 && balance_cents < MIN_CHARGE_CENTS {
            return Err(PricingError::BelowMinimumCharge { leg: "balance", cents: balance_cents });
        }
        Ok(PaymentSplit { deposit_cents, balance_cents })
    }
}
