//! Amount normalization between the XRP Ledger and the EVM sidechain
//!
//! XRP has 6 decimal places (1 XRP = 1_000_000 drops) while the sidechain's
//! native XRP uses 18. Converting drops to sidechain units is therefore an
//! exact multiplication by 10^12.

use alloy::primitives::utils::parse_units;
use alloy::primitives::U256;
use thiserror::Error;

/// Decimal places of XRP on the ledger
pub const XRP_DECIMALS: u8 = 6;

/// Decimal places of XRP on the EVM sidechain
pub const DESTINATION_DECIMALS: u8 = 18;

/// Drops per XRP
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// 10^(18 - 6)
pub const DROPS_TO_DESTINATION_SCALE: u64 = 1_000_000_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount {amount} has more than {max} decimal places")]
    TooManyDecimals { amount: String, max: u8 },

    #[error("Amount must be positive, got {0}")]
    NotPositive(String),

    #[error("Amount {0} is out of range")]
    Overflow(String),
}

/// Convert an integer drop amount to 18-decimal sidechain units.
///
/// `native_amount` must be a non-negative base-10 integer string.
pub fn to_destination_units(native_amount: &str) -> Result<U256, AmountError> {
    if native_amount.is_empty() || !native_amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::InvalidAmount(native_amount.to_string()));
    }

    let drops = U256::from_str_radix(native_amount, 10)
        .map_err(|_| AmountError::Overflow(native_amount.to_string()))?;

    drops
        .checked_mul(U256::from(DROPS_TO_DESTINATION_SCALE))
        .ok_or_else(|| AmountError::Overflow(native_amount.to_string()))
}

/// Parse an XRP display amount ("10", "0.5") into drops.
///
/// Accepts plain positive decimals with at most 6 fractional digits. Signs,
/// exponents, whitespace and dangling decimal points are rejected.
pub fn xrp_to_drops(xrp: &str) -> Result<u64, AmountError> {
    let (whole, fraction) = match xrp.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (xrp, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || fraction.is_some_and(|f| !all_digits(f)) {
        return Err(AmountError::InvalidAmount(xrp.to_string()));
    }

    if fraction.is_some_and(|f| f.len() > XRP_DECIMALS as usize) {
        return Err(AmountError::TooManyDecimals {
            amount: xrp.to_string(),
            max: XRP_DECIMALS,
        });
    }

    let drops = parse_units(xrp, XRP_DECIMALS)
        .map_err(|_| AmountError::InvalidAmount(xrp.to_string()))?
        .get_absolute();

    if drops.is_zero() {
        return Err(AmountError::NotPositive(xrp.to_string()));
    }

    u64::try_from(drops).map_err(|_| AmountError::Overflow(xrp.to_string()))
}

/// Format drops as an XRP display amount without trailing zeros
pub fn drops_to_xrp(drops: u64) -> String {
    let whole = drops / DROPS_PER_XRP;
    let fraction = drops % DROPS_PER_XRP;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:06}", fraction);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_destination_units_scale() {
        assert_eq!(to_destination_units("0").unwrap(), U256::ZERO);
        assert_eq!(
            to_destination_units("1").unwrap(),
            U256::from(1_000_000_000_000u64)
        );
        // 10 XRP
        assert_eq!(
            to_destination_units("10000000").unwrap(),
            U256::from(10_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_to_destination_units_rejects_non_integers() {
        for bad in ["", "-1", "1.5", "abc", " 1", "1e6", "+5"] {
            assert_eq!(
                to_destination_units(bad),
                Err(AmountError::InvalidAmount(bad.to_string())),
                "input {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_to_destination_units_overflow() {
        let huge = "9".repeat(80);
        assert!(matches!(
            to_destination_units(&huge),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_to_destination_units_is_linear() {
        let pairs = [(0u64, 0u64), (1, 2), (1_000_000, 999), (123_456_789, 987_654_321)];
        for (a, b) in pairs {
            let sum = to_destination_units(&a.to_string()).unwrap()
                + to_destination_units(&b.to_string()).unwrap();
            assert_eq!(sum, to_destination_units(&(a + b).to_string()).unwrap());
        }
    }

    #[test]
    fn test_to_destination_units_order_preserving() {
        let small = to_destination_units("999999").unwrap();
        let large = to_destination_units("1000000").unwrap();
        assert!(small < large);
    }

    #[test]
    fn test_xrp_to_drops() {
        assert_eq!(xrp_to_drops("10").unwrap(), 10_000_000);
        assert_eq!(xrp_to_drops("0.5").unwrap(), 500_000);
        assert_eq!(xrp_to_drops("1.000001").unwrap(), 1_000_001);
        assert_eq!(xrp_to_drops("0.000001").unwrap(), 1);
    }

    #[test]
    fn test_xrp_to_drops_rejects_malformed() {
        for bad in ["", ".", "1.", ".5", "-1", "1e3", "1,5", "abc", "1.2.3"] {
            assert_eq!(
                xrp_to_drops(bad),
                Err(AmountError::InvalidAmount(bad.to_string())),
                "input {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_xrp_to_drops_rejects_excess_precision_and_zero() {
        assert!(matches!(
            xrp_to_drops("0.0000001"),
            Err(AmountError::TooManyDecimals { max: 6, .. })
        ));
        assert_eq!(
            xrp_to_drops("0.000"),
            Err(AmountError::NotPositive("0.000".to_string()))
        );
    }

    #[test]
    fn test_drops_to_xrp() {
        assert_eq!(drops_to_xrp(10_000_000), "10");
        assert_eq!(drops_to_xrp(500_000), "0.5");
        assert_eq!(drops_to_xrp(1_000_001), "1.000001");
        assert_eq!(drops_to_xrp(0), "0");
    }
}
