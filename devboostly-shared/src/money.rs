//! Amounts are integer cents everywhere.

/// Smallest amount the payment gateway charges in one intent (Stripe, EUR).
pub const MIN_CHARGE_CENTS: i64 = 50;

/// `percent` of `cents`, rounded half-up to the cent. `None` when the result does not
/// fit in an `i64`.
pub fn percent_of(cents: i64, percent: u8) -> Option<i64> {
    let scaled = (i128::from(cents) * i128::from(percent) + 50).div_euclid(100);
    i64::try_from(scaled).ok()
}
