use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::{SchedulingError, SchedulingResult};

/// Fractional digits money columns are stored with.
pub const MONEY_SCALE: u32 = 2;

/// A price or fee must be positive and fit the ledger's two decimal places
/// exactly; anything finer would be rounded on write.
pub fn validate_amount(label: &str, amount: Decimal) -> SchedulingResult<()> {
    if amount <= Decimal::ZERO {
        return Err(SchedulingError::Validation(format!(
            "{label} must be greater than zero"
        )));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(SchedulingError::Validation(format!(
            "{label} may have at most {MONEY_SCALE} decimal places"
        )));
    }
    Ok(())
}

/// Number of days a venue booking is billed for.
///
/// Whole elapsed days, rounded down, plus one: a same-day booking is one
/// day, and a booking spanning 25 hours is two.
pub fn billable_days(start: DateTime<Utc>, end: DateTime<Utc>) -> SchedulingResult<i64> {
    if end < start {
        return Err(SchedulingError::InvalidRange { start, end });
    }
    Ok((end - start).num_days() + 1)
}

pub fn venue_fee(
    fee_per_day: Decimal,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> SchedulingResult<Decimal> {
    if fee_per_day.is_sign_negative() {
        return Err(SchedulingError::Validation(
            "fee per day cannot be negative".to_string(),
        ));
    }
    let days = billable_days(start, end)?;
    Ok(fee_per_day * Decimal::from(days))
}

pub fn ticket_fee(price_per_ticket: Decimal, quantity: i32) -> SchedulingResult<Decimal> {
    if quantity < 1 {
        return Err(SchedulingError::Validation(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    if price_per_ticket.is_sign_negative() {
        return Err(SchedulingError::Validation(
            "price per ticket cannot be negative".to_string(),
        ));
    }
    Ok(price_per_ticket * Decimal::from(quantity))
}
