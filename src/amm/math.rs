//! Checked 256-bit arithmetic.
//!
//! Every helper fails instead of wrapping. Division always floors, which means
//! rounding dust stays with the pool and never with the caller.

use alloy::primitives::{U256, U512};

use super::error::PoolError;

/// `a + b`, failing with [`PoolError::Overflow`]
///
/// # Errors
/// Returns [`PoolError::Overflow`] if the sum exceeds `U256::MAX`
pub fn add(a: U256, b: U256) -> Result<U256, PoolError> {
    a.checked_add(b).ok_or(PoolError::Overflow)
}

/// `a - b`, failing with [`PoolError::Underflow`]
///
/// # Errors
/// Returns [`PoolError::Underflow`] if `b > a`
pub fn sub(a: U256, b: U256) -> Result<U256, PoolError> {
    a.checked_sub(b).ok_or(PoolError::Underflow)
}

/// `a * b`, failing with [`PoolError::Overflow`]
///
/// # Errors
/// Returns [`PoolError::Overflow`] if the product exceeds `U256::MAX`
pub fn mul(a: U256, b: U256) -> Result<U256, PoolError> {
    a.checked_mul(b).ok_or(PoolError::Overflow)
}

/// `floor(a / b)`
///
/// # Errors
/// Returns [`PoolError::DivisionByZero`] if `b` is zero
pub fn div(a: U256, b: U256) -> Result<U256, PoolError> {
    if b.is_zero() {
        return Err(PoolError::DivisionByZero);
    }
    Ok(a / b)
}

/// `floor(a * b / c)`
///
/// The intermediate product must fit in 256 bits.
///
/// # Errors
/// * [`PoolError::Overflow`] if `a * b` overflows
/// * [`PoolError::DivisionByZero`] if `c` is zero
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256, PoolError> {
    div(mul(a, b)?, c)
}

/// `a * b` in 512 bits, where it cannot overflow
#[must_use]
pub fn wide_mul(a: U256, b: U256) -> U512 {
    U512::from(a) * U512::from(b)
}

/// Integer square root: the largest `r` such that `r * r <= x`.
///
/// Babylonian iteration starting above the root, so the sequence decreases
/// monotonically until it settles on the floor.
#[must_use]
pub fn sqrt(x: U256) -> U256 {
    if x < U256::from(4) {
        return if x.is_zero() { U256::ZERO } else { U256::from(1) };
    }

    let two = U256::from(2);
    let mut root = x;
    let mut next = x / two + U256::from(1);
    while next < root {
        root = next;
        next = (x / next + next) / two;
    }
    root
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_mul_does_not_overflow() {
        let product = wide_mul(U256::MAX, U256::MAX);
        assert!(product > U512::from(U256::MAX));
        assert_eq!(product / U512::from(U256::MAX), U512::from(U256::MAX));
        assert_eq!(wide_mul(U256::from(6), U256::from(7)), U512::from(42));
    }

    #[test]
    fn test_add_overflow() {
        assert_eq!(add(U256::from(2), U256::from(3)), Ok(U256::from(5)));
        assert_eq!(add(U256::MAX, U256::from(1)), Err(PoolError::Overflow));
    }

    #[test]
    fn test_sub_underflow() {
        assert_eq!(sub(U256::from(3), U256::from(3)), Ok(U256::ZERO));
        assert_eq!(sub(U256::from(2), U256::from(3)), Err(PoolError::Underflow));
    }

    #[test]
    fn test_mul_overflow() {
        assert_eq!(mul(U256::from(6), U256::from(7)), Ok(U256::from(42)));
        assert_eq!(mul(U256::MAX, U256::ZERO), Ok(U256::ZERO));
        assert_eq!(mul(U256::MAX, U256::from(2)), Err(PoolError::Overflow));
    }

    #[test]
    fn test_div_floors() {
        assert_eq!(div(U256::from(7), U256::from(2)), Ok(U256::from(3)));
        assert_eq!(div(U256::from(1), U256::from(2)), Ok(U256::ZERO));
        assert_eq!(div(U256::from(1), U256::ZERO), Err(PoolError::DivisionByZero));
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(
            mul_div(U256::from(10), U256::from(30), U256::from(10_000)),
            Ok(U256::ZERO)
        );
        assert_eq!(
            mul_div(U256::from(1_000), U256::from(30), U256::from(10_000)),
            Ok(U256::from(3))
        );
    }

    #[test]
    fn test_sqrt_small_values() {
        for (x, expected) in &[
            // x, floor(sqrt(x))
            (0_u64, 0_u64),
            (1, 1),
            (2, 1),
            (3, 1),
            (4, 2),
            (8, 2),
            (9, 3),
            (99, 9),
            (100, 10),
            (10_000, 100),
            (1_000_001, 1_000),
        ] {
            assert_eq!(sqrt(U256::from(*x)), U256::from(*expected), "sqrt({x})");
        }
    }

    #[test]
    fn test_sqrt_is_floor_for_large_values() {
        for x in [U256::MAX, U256::from(u128::MAX), U256::from(10).pow(U256::from(40)) + U256::from(7)] {
            let r = sqrt(x);
            assert!(r.checked_mul(r).unwrap() <= x);
            let next = r + U256::from(1);
            assert!(next.checked_mul(next).map_or(true, |sq| sq > x));
        }
    }
}
