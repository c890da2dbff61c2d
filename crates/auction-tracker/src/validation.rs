//! Payload validation for every command reaching the transport boundary:
//! runs before a request touches the core, so no invalid state or stack
//! trace ever crosses it.

use auction_core::{Strategy, MAX_BID_CAP};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

static AUCTION_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static pattern is valid"));

pub fn validate_auction_id(auction_id: &str) -> AppResult<()> {
    if AUCTION_ID_PATTERN.is_match(auction_id) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "auction_id must match ^[A-Za-z0-9_-]{{1,64}}$: {auction_id}"
        )))
    }
}

/// Validates an amount/max_bid field, which must be an integer in
/// `[0, MAX_BID_CAP]`.
pub fn validate_bid_amount(amount: i64) -> AppResult<()> {
    if (0..=MAX_BID_CAP).contains(&amount) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "amount must be in [0, {MAX_BID_CAP}]: {amount}"
        )))
    }
}

pub fn validate_strategy(raw: &str) -> AppResult<Strategy> {
    Strategy::parse_with_legacy_alias(raw)
        .ok_or_else(|| AppError::Validation(format!("strategy must be manual, auto or sniping: {raw}")))
}

pub fn validate_retry_attempts(attempts: u32) -> AppResult<()> {
    if (1..=10).contains(&attempts) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "retry_attempts must be in [1, 10]: {attempts}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_auction_ids() {
        assert!(validate_auction_id("abc-123_XYZ").is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_auction_ids() {
        assert!(validate_auction_id("").is_err());
        assert!(validate_auction_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn rejects_auction_id_with_illegal_characters() {
        assert!(validate_auction_id("abc/def").is_err());
    }

    #[test]
    fn bid_amount_bounds() {
        assert!(validate_bid_amount(0).is_ok());
        assert!(validate_bid_amount(MAX_BID_CAP).is_ok());
        assert!(validate_bid_amount(-1).is_err());
        assert!(validate_bid_amount(MAX_BID_CAP + 1).is_err());
    }

    #[test]
    fn strategy_accepts_legacy_alias() {
        assert_eq!(validate_strategy("increment").unwrap(), Strategy::Auto);
        assert!(validate_strategy("bogus").is_err());
    }

    #[test]
    fn retry_attempts_bounds() {
        assert!(validate_retry_attempts(1).is_ok());
        assert!(validate_retry_attempts(10).is_ok());
        assert!(validate_retry_attempts(0).is_err());
        assert!(validate_retry_attempts(11).is_err());
    }
}
