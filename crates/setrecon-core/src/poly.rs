//! Dense univariate polynomials over a [`PrimeField`].
//!
//! Coefficients are stored lowest degree first and kept normalized, so the
//! zero polynomial has no coefficients and the last stored coefficient is
//! never zero.

use num::{BigUint, One, Zero};

use crate::error::{CoreError, Result};
use crate::field::PrimeField;

/// Fields at most this size have their roots found by exhaustive evaluation.
const EXHAUSTIVE_ROOT_LIMIT: u64 = 1024;

/// Upper bound on splitting attempts per factor during root finding.
const MAX_SPLIT_ATTEMPTS: u64 = 256;

/// A polynomial with reduced coefficients.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Poly {
    coeffs: Vec<BigUint>,
}

impl Poly {
    pub fn zero() -> Self {
        Self { coeffs: Vec::new() }
    }

    pub fn one() -> Self {
        Self {
            coeffs: vec![BigUint::one()],
        }
    }

    /// The polynomial `x`.
    pub fn x() -> Self {
        Self {
            coeffs: vec![BigUint::zero(), BigUint::one()],
        }
    }

    /// Build from coefficients (lowest degree first), reducing into the field.
    pub fn from_coeffs(coeffs: Vec<BigUint>, field: &PrimeField) -> Self {
        let coeffs = coeffs.iter().map(|c| field.reduce(c)).collect();
        Self::normalized(coeffs)
    }

    /// The monic linear polynomial `x - root`.
    pub fn linear(root: &BigUint, field: &PrimeField) -> Self {
        Self::normalized(vec![field.neg(root), BigUint::one()])
    }

    fn normalized(mut coeffs: Vec<BigUint>) -> Self {
        while coeffs.last().map_or(false, |c| c.is_zero()) {
            coeffs.pop();
        }
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[BigUint] {
        &self.coeffs
    }

    /// Degree, or `None` for the zero polynomial.
    pub fn degree(&self) -> Option<usize> {
        self.coeffs.len().checked_sub(1)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Coefficient of `x^i`.
    pub fn coeff(&self, i: usize) -> BigUint {
        self.coeffs.get(i).cloned().unwrap_or_default()
    }

    /// Leading coefficient (zero for the zero polynomial).
    pub fn leading(&self) -> BigUint {
        self.coeffs.last().cloned().unwrap_or_default()
    }

    pub fn eval(&self, at: &BigUint, field: &PrimeField) -> BigUint {
        self.coeffs.iter().rev().fold(BigUint::zero(), |acc, c| {
            field.add(&field.mul(&acc, at), c)
        })
    }

    pub fn add(&self, other: &Poly, field: &PrimeField) -> Poly {
        let len = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..len)
            .map(|i| field.add(&self.coeff(i), &other.coeff(i)))
            .collect();
        Self::normalized(coeffs)
    }

    pub fn sub(&self, other: &Poly, field: &PrimeField) -> Poly {
        let len = self.coeffs.len().max(other.coeffs.len());
        let coeffs = (0..len)
            .map(|i| field.sub(&self.coeff(i), &other.coeff(i)))
            .collect();
        Self::normalized(coeffs)
    }

    pub fn mul(&self, other: &Poly, field: &PrimeField) -> Poly {
        if self.is_zero() || other.is_zero() {
            return Poly::zero();
        }
        let mut coeffs = vec![BigUint::zero(); self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            if a.is_zero() {
                continue;
            }
            for (j, b) in other.coeffs.iter().enumerate() {
                coeffs[i + j] = field.add(&coeffs[i + j], &field.mul(a, b));
            }
        }
        Self::normalized(coeffs)
    }

    pub fn scale(&self, factor: &BigUint, field: &PrimeField) -> Poly {
        Self::normalized(self.coeffs.iter().map(|c| field.mul(c, factor)).collect())
    }

    /// Scale so the leading coefficient is one. The zero polynomial is returned as is.
    pub fn monic(&self, field: &PrimeField) -> Result<Poly> {
        if self.is_zero() {
            return Ok(Poly::zero());
        }
        Ok(self.scale(&field.inv(&self.leading())?, field))
    }

    /// Euclidean division: `self = q * divisor + r` with `deg r < deg divisor`.
    pub fn div_rem(&self, divisor: &Poly, field: &PrimeField) -> Result<(Poly, Poly)> {
        let d_deg = divisor.degree().ok_or(CoreError::NotInvertible)?;
        if self.coeffs.len() <= d_deg {
            return Ok((Poly::zero(), self.clone()));
        }
        let lead_inv = field.inv(&divisor.leading())?;
        let mut rem = self.coeffs.clone();
        let mut quot = vec![BigUint::zero(); rem.len() - d_deg];
        for i in (0..quot.len()).rev() {
            let c = field.mul(&rem[i + d_deg], &lead_inv);
            if !c.is_zero() {
                for (j, dc) in divisor.coeffs.iter().enumerate() {
                    rem[i + j] = field.sub(&rem[i + j], &field.mul(&c, dc));
                }
            }
            quot[i] = c;
        }
        rem.truncate(d_deg);
        Ok((Self::normalized(quot), Self::normalized(rem)))
    }

    pub fn rem(&self, divisor: &Poly, field: &PrimeField) -> Result<Poly> {
        Ok(self.div_rem(divisor, field)?.1)
    }

    /// Monic greatest common divisor. `gcd(0, 0)` is zero.
    pub fn gcd(&self, other: &Poly, field: &PrimeField) -> Result<Poly> {
        let mut a = self.clone();
        let mut b = other.clone();
        while !b.is_zero() {
            let r = a.rem(&b, field)?;
            a = b;
            b = r;
        }
        a.monic(field)
    }

    /// Formal derivative.
    pub fn derivative(&self, field: &PrimeField) -> Poly {
        let coeffs = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| field.mul(c, &field.reduce(&BigUint::from(i))))
            .collect();
        Self::normalized(coeffs)
    }

    /// True when the polynomial has no repeated factor, i.e. `gcd(f, f') = 1`.
    pub fn is_square_free(&self, field: &PrimeField) -> Result<bool> {
        let d = self.derivative(field);
        if d.is_zero() {
            return Ok(self.degree().map_or(false, |deg| deg == 0));
        }
        Ok(self.gcd(&d, field)?.degree() == Some(0))
    }

    /// `self^exponent mod modulus` by square and multiply.
    pub fn pow_mod(&self, exponent: &BigUint, modulus: &Poly, field: &PrimeField) -> Result<Poly> {
        let base = self.rem(modulus, field)?;
        let mut result = Poly::one().rem(modulus, field)?;
        for i in (0..exponent.bits()).rev() {
            result = result.mul(&result, field).rem(modulus, field)?;
            if exponent.bit(i) {
                result = result.mul(&base, field).rem(modulus, field)?;
            }
        }
        Ok(result)
    }

    /// Product of `(x - r)` over the given roots.
    pub fn from_roots(roots: &[BigUint], field: &PrimeField) -> Poly {
        roots
            .iter()
            .fold(Poly::one(), |acc, r| acc.mul(&Poly::linear(r, field), field))
    }
}

/// All roots of `f`, which must split into distinct linear factors.
///
/// Fails with [`CoreError::FactorizationFailure`] when `f` is zero, has a
/// repeated root, or has an irreducible factor of degree above one. Roots
/// are returned in ascending order.
pub fn find_roots(f: &Poly, field: &PrimeField) -> Result<Vec<BigUint>> {
    let deg = f
        .degree()
        .ok_or_else(|| CoreError::FactorizationFailure("zero polynomial".into()))?;
    if deg == 0 {
        return Ok(Vec::new());
    }
    let f = f.monic(field)?;
    if !f.is_square_free(field)? {
        return Err(CoreError::FactorizationFailure(
            "polynomial is not square-free".into(),
        ));
    }

    // x^p = x (mod f) exactly when f is a product of distinct linear factors.
    let p = field.modulus();
    if f.degree() > Some(1) && Poly::x().pow_mod(p, &f, field)? != Poly::x().rem(&f, field)? {
        return Err(CoreError::FactorizationFailure(
            "polynomial has a non-linear factor".into(),
        ));
    }

    let mut roots = if *p <= BigUint::from(EXHAUSTIVE_ROOT_LIMIT) {
        exhaustive_roots(&f, field)
    } else {
        split_roots(f, field)?
    };
    roots.sort();
    if roots.len() != deg {
        return Err(CoreError::FactorizationFailure(format!(
            "found {} roots for a degree {} polynomial",
            roots.len(),
            deg
        )));
    }
    Ok(roots)
}

fn exhaustive_roots(f: &Poly, field: &PrimeField) -> Vec<BigUint> {
    let mut roots = Vec::new();
    let mut x = BigUint::zero();
    while &x < field.modulus() {
        if f.eval(&x, field).is_zero() {
            roots.push(x.clone());
        }
        x += 1u32;
    }
    roots
}

/// Equal-degree splitting of a monic product of distinct linear factors.
///
/// `gcd((x + a)^((p-1)/2) - 1, f)` separates the roots `r` for which `r + a`
/// is a quadratic residue. Shifts `a = 0, 1, 2, ...` are tried in order so
/// both parties compute identical results.
fn split_roots(f: Poly, field: &PrimeField) -> Result<Vec<BigUint>> {
    let half = (field.modulus() - 1u32) >> 1u32;
    let mut roots = Vec::new();
    let mut pending = vec![f];

    while let Some(g) = pending.pop() {
        match g.degree() {
            None | Some(0) => continue,
            Some(1) => {
                roots.push(field.neg(&g.coeff(0)));
                continue;
            }
            Some(_) => {}
        }

        let mut split = None;
        for a in 0..MAX_SPLIT_ATTEMPTS {
            let shifted = Poly::from_coeffs(vec![BigUint::from(a), BigUint::one()], field);
            let probe = shifted.pow_mod(&half, &g, field)?.sub(&Poly::one(), field);
            let h = probe.gcd(&g, field)?;
            let h_deg = h.degree().unwrap_or(0);
            if h_deg > 0 && Some(h_deg) < g.degree() {
                split = Some(h);
                break;
            }
        }

        let h = split.ok_or_else(|| {
            CoreError::FactorizationFailure("root splitting did not converge".into())
        })?;
        let (q, _) = g.div_rem(&h, field)?;
        pending.push(h);
        pending.push(q);
    }

    tracing::trace!(count = roots.len(), "split polynomial into linear factors");
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    fn small_field() -> PrimeField {
        PrimeField::new(big(263)).unwrap()
    }

    fn large_field() -> PrimeField {
        // 2^61 - 1
        PrimeField::new(big(2_305_843_009_213_693_951)).unwrap()
    }

    #[test]
    fn test_div_rem_reconstructs() {
        let f = small_field();
        let a = Poly::from_coeffs(vec![big(5), big(0), big(3), big(1)], &f);
        let b = Poly::from_coeffs(vec![big(2), big(1)], &f);
        let (q, r) = a.div_rem(&b, &f).unwrap();
        assert_eq!(q.mul(&b, &f).add(&r, &f), a);
        assert!(r.degree().unwrap_or(0) < 1);
    }

    #[test]
    fn test_gcd_of_shared_roots() {
        let f = small_field();
        let a = Poly::from_roots(&[big(1), big(2), big(3)], &f);
        let b = Poly::from_roots(&[big(2), big(3), big(4)], &f);
        assert_eq!(a.gcd(&b, &f).unwrap(), Poly::from_roots(&[big(2), big(3)], &f));
    }

    #[test]
    fn test_square_free() {
        let f = small_field();
        assert!(Poly::from_roots(&[big(1), big(9)], &f).is_square_free(&f).unwrap());
        assert!(!Poly::from_roots(&[big(9), big(9)], &f).is_square_free(&f).unwrap());
    }

    #[test]
    fn test_find_roots_small_field() {
        let f = small_field();
        let poly = Poly::from_roots(&[big(200), big(3), big(77)], &f);
        assert_eq!(find_roots(&poly, &f).unwrap(), vec![big(3), big(77), big(200)]);
    }

    #[test]
    fn test_find_roots_large_field() {
        let f = large_field();
        let expected = vec![big(1), big(42), big(1 << 40), big(2_000_000_000_000_000_000)];
        let poly = Poly::from_roots(&expected, &f);
        assert_eq!(find_roots(&poly, &f).unwrap(), expected);
    }

    #[test]
    fn test_find_roots_rejects_irreducible_quadratic() {
        let f = large_field();
        // p = 3 (mod 4), so x^2 + 1 has no roots.
        let poly = Poly::from_coeffs(vec![big(1), big(0), big(1)], &f);
        assert!(matches!(
            find_roots(&poly, &f),
            Err(CoreError::FactorizationFailure(_))
        ));
    }

    #[test]
    fn test_find_roots_rejects_repeated_root() {
        let f = large_field();
        let poly = Poly::from_roots(&[big(5), big(5), big(6)], &f);
        assert!(matches!(
            find_roots(&poly, &f),
            Err(CoreError::FactorizationFailure(_))
        ));
    }

    #[test]
    fn test_constant_has_no_roots() {
        let f = small_field();
        assert!(find_roots(&Poly::one(), &f).unwrap().is_empty());
        assert!(find_roots(&Poly::zero(), &f).is_err());
    }
}
