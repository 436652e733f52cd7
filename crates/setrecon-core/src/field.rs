//! Prime field arithmetic over arbitrary precision integers.
//!
//! Field elements are plain [`BigUint`] values in `[0, p)`. All operations
//! live on [`PrimeField`] so the modulus travels with the computation.

use num::{BigUint, Integer, One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Primes used for trial division and as Miller-Rabin witnesses.
const SMALL_PRIMES: [u32; 20] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
];

/// Miller-Rabin with fixed witnesses.
///
/// Exact below 3.3e24 and overwhelmingly likely to be correct above it.
pub fn is_probable_prime(n: &BigUint) -> bool {
    if *n < BigUint::from(2u32) {
        return false;
    }
    for p in SMALL_PRIMES {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let one = BigUint::one();
    let n_minus_one = n - &one;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1u32;
        s += 1;
    }

    'witness: for a in SMALL_PRIMES {
        let a = BigUint::from(a);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// The integers modulo a prime.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimeField {
    modulus: BigUint,
}

impl PrimeField {
    /// Create a field from a prime modulus.
    pub fn new(modulus: BigUint) -> Result<Self> {
        if !is_probable_prime(&modulus) {
            return Err(CoreError::InvalidParameter(format!(
                "field modulus {} is not prime",
                modulus
            )));
        }
        Ok(Self { modulus })
    }

    /// The field whose modulus is the smallest prime `>= lower`.
    pub fn first_prime_at_least(lower: &BigUint) -> Self {
        let two = BigUint::from(2u32);
        if *lower <= two {
            return Self { modulus: two };
        }
        let mut candidate = lower.clone();
        if candidate.is_even() {
            candidate += 1u32;
        }
        while !is_probable_prime(&candidate) {
            candidate += 2u32;
        }
        Self { modulus: candidate }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Number of bytes needed to hold any element of the field.
    pub fn element_len(&self) -> usize {
        let bits = (&self.modulus - 1u32).bits().max(1);
        ((bits + 7) / 8) as usize
    }

    pub fn reduce(&self, value: &BigUint) -> BigUint {
        value % &self.modulus
    }

    /// Map a signed machine integer into the field.
    pub fn from_i64(&self, value: i64) -> BigUint {
        let magnitude = self.reduce(&BigUint::from(value.unsigned_abs()));
        if value < 0 {
            self.neg(&magnitude)
        } else {
            magnitude
        }
    }

    pub fn add(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.modulus
    }

    pub fn sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let a = self.reduce(a);
        let b = self.reduce(b);
        if a >= b {
            a - b
        } else {
            a + &self.modulus - b
        }
    }

    pub fn neg(&self, a: &BigUint) -> BigUint {
        self.sub(&BigUint::zero(), a)
    }

    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }

    pub fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.modulus)
    }

    /// Multiplicative inverse via Fermat's little theorem.
    pub fn inv(&self, a: &BigUint) -> Result<BigUint> {
        let a = self.reduce(a);
        if a.is_zero() {
            return Err(CoreError::NotInvertible);
        }
        let exponent = &self.modulus - 2u32;
        Ok(a.modpow(&exponent, &self.modulus))
    }

    pub fn div(&self, a: &BigUint, b: &BigUint) -> Result<BigUint> {
        Ok(self.mul(a, &self.inv(b)?))
    }
}

impl fmt::Debug for PrimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimeField({})", self.modulus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_primality() {
        let primes = [2u64, 3, 97, 263, 7919, 982_451_653, 18_446_744_073_709_551_557];
        for p in primes {
            assert!(is_probable_prime(&big(p)), "{} is prime", p);
        }
        let composites = [0u64, 1, 4, 561, 1105, 7917, 3_215_031_751];
        for c in composites {
            assert!(!is_probable_prime(&big(c)), "{} is composite", c);
        }
    }

    #[test]
    fn test_first_prime_at_least() {
        assert_eq!(PrimeField::first_prime_at_least(&big(256 + 4 + 1)).modulus(), &big(263));
        assert_eq!(PrimeField::first_prime_at_least(&big(0)).modulus(), &big(2));
        assert_eq!(PrimeField::first_prime_at_least(&big(3)).modulus(), &big(3));
        assert_eq!(PrimeField::first_prime_at_least(&big(24)).modulus(), &big(29));
    }

    #[test]
    fn test_rejects_composite_modulus() {
        assert!(PrimeField::new(big(15)).is_err());
    }

    #[test]
    fn test_arithmetic() {
        let f = PrimeField::new(big(13)).unwrap();
        assert_eq!(f.add(&big(7), &big(9)), big(3));
        assert_eq!(f.sub(&big(2), &big(5)), big(10));
        assert_eq!(f.neg(&big(0)), big(0));
        assert_eq!(f.mul(&big(4), &big(5)), big(7));
        assert_eq!(f.from_i64(-1), big(12));
        let inv = f.inv(&big(4)).unwrap();
        assert_eq!(f.mul(&inv, &big(4)), big(1));
        assert!(matches!(f.inv(&big(26)), Err(CoreError::NotInvertible)));
    }

    #[test]
    fn test_element_len() {
        assert_eq!(PrimeField::new(big(263)).unwrap().element_len(), 2);
        assert_eq!(PrimeField::new(big(251)).unwrap().element_len(), 1);
    }
}
