//! Rational function interpolation.
//!
//! Given evaluations `f(k_i)` of a ratio `P(x)/Q(x)` of monic polynomials
//! whose degree difference is known, recover `P` and `Q` in lowest terms.
//! Unknown coefficients are found by Gaussian elimination over the field;
//! rank deficiency means the degree bounds were loose and both are
//! tightened before solving again.

use num::{BigUint, One, Zero};

use crate::error::{CoreError, Result};
use crate::field::PrimeField;
use crate::poly::Poly;

/// A reduced ratio of monic polynomials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalFunction {
    pub numerator: Poly,
    pub denominator: Poly,
}

enum Solved {
    Unique(Vec<BigUint>),
    Deficient { rank: usize },
}

/// Interpolate `P/Q` from `values[i] = P(points[i]) / Q(points[i])`.
///
/// `numerator_size` and `denominator_size` bound the degrees of `P` and `Q`
/// and fix their difference. The bounds are further limited by the number
/// of points supplied.
pub fn interpolate_rational(
    field: &PrimeField,
    points: &[BigUint],
    values: &[BigUint],
    numerator_size: u64,
    denominator_size: u64,
) -> Result<RationalFunction> {
    if points.len() != values.len() {
        return Err(CoreError::InvalidParameter(format!(
            "{} points but {} values",
            points.len(),
            values.len()
        )));
    }

    let budget = points.len() as i128;
    let delta = numerator_size as i128 - denominator_size as i128;
    if delta.abs() > budget {
        return Err(CoreError::InterpolationFailure(format!(
            "degree difference {} exceeds {} sample points",
            delta, budget
        )));
    }

    let mut m_a = (budget + delta) / 2;
    let mut m_b = (budget - delta) / 2;
    let excess = (m_a - numerator_size as i128).max(m_b - denominator_size as i128);
    if excess > 0 {
        m_a -= excess;
        m_b -= excess;
    }
    if m_a < 0 || m_b < 0 {
        return Err(CoreError::InterpolationFailure(
            "negative degree bound".into(),
        ));
    }
    let (mut m_a, mut m_b) = (m_a as usize, m_b as usize);

    loop {
        let rows = build_system(field, points, values, m_a, m_b);
        match solve(field, rows, m_a + m_b)? {
            Solved::Unique(solution) => {
                let mut p = solution[..m_a].to_vec();
                p.push(BigUint::one());
                let mut q = solution[m_a..].to_vec();
                q.push(BigUint::one());
                return reduce(field, Poly::from_coeffs(p, field), Poly::from_coeffs(q, field));
            }
            Solved::Deficient { rank } => {
                let shrink = m_a + m_b - rank;
                if shrink > m_a.min(m_b) {
                    return Err(CoreError::InterpolationFailure(
                        "degree bounds cannot be tightened further".into(),
                    ));
                }
                tracing::trace!(m_a, m_b, rank, "tightening interpolation degree bounds");
                m_a -= shrink;
                m_b -= shrink;
            }
        }
    }
}

/// Rows of `sum p_j k^j - f sum q_j k^j = f k^m_b - k^m_a`, one per point,
/// with the right-hand side in the last column.
fn build_system(
    field: &PrimeField,
    points: &[BigUint],
    values: &[BigUint],
    m_a: usize,
    m_b: usize,
) -> Vec<Vec<BigUint>> {
    points
        .iter()
        .zip(values)
        .map(|(k, f)| {
            let mut row = Vec::with_capacity(m_a + m_b + 1);
            let mut power = BigUint::one();
            let mut powers = Vec::with_capacity(m_a.max(m_b) + 1);
            for _ in 0..=m_a.max(m_b) {
                powers.push(power.clone());
                power = field.mul(&power, k);
            }
            row.extend(powers[..m_a].iter().cloned());
            row.extend(powers[..m_b].iter().map(|kj| field.neg(&field.mul(f, kj))));
            row.push(field.sub(&field.mul(f, &powers[m_b]), &powers[m_a]));
            row
        })
        .collect()
}

/// Reduced row echelon form over the field.
fn solve(field: &PrimeField, mut rows: Vec<Vec<BigUint>>, unknowns: usize) -> Result<Solved> {
    let mut rank = 0;
    for col in 0..unknowns {
        let Some(pivot) = (rank..rows.len()).find(|&r| !rows[r][col].is_zero()) else {
            continue;
        };
        rows.swap(rank, pivot);

        let inv = field.inv(&rows[rank][col])?;
        for v in rows[rank].iter_mut() {
            *v = field.mul(v, &inv);
        }

        let pivot_row = rows[rank].clone();
        for (r, row) in rows.iter_mut().enumerate() {
            if r == rank || row[col].is_zero() {
                continue;
            }
            let factor = row[col].clone();
            for (v, pv) in row.iter_mut().zip(&pivot_row) {
                *v = field.sub(v, &field.mul(&factor, pv));
            }
        }
        rank += 1;
    }

    if rows[rank..].iter().any(|row| !row[unknowns].is_zero()) {
        return Err(CoreError::InterpolationFailure(
            "inconsistent linear system".into(),
        ));
    }

    if rank < unknowns {
        return Ok(Solved::Deficient { rank });
    }
    Ok(Solved::Unique(
        rows[..unknowns].iter().map(|row| row[unknowns].clone()).collect(),
    ))
}

fn reduce(field: &PrimeField, p: Poly, q: Poly) -> Result<RationalFunction> {
    let g = p.gcd(&q, field)?;
    let (numerator, _) = p.div_rem(&g, field)?;
    let (denominator, _) = q.div_rem(&g, field)?;
    Ok(RationalFunction {
        numerator,
        denominator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poly::find_roots;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    /// Evaluation points and ratio values for two sets.
    fn ratios(field: &PrimeField, count: u64, ours: &[u64], theirs: &[u64]) -> (Vec<BigUint>, Vec<BigUint>) {
        let points: Vec<BigUint> = (0..count).map(|i| big(257 + i)).collect();
        let values = points
            .iter()
            .map(|k| {
                let eval = |set: &[u64]| {
                    set.iter()
                        .fold(BigUint::one(), |acc, &e| field.mul(&acc, &field.sub(k, &big(e))))
                };
                field.div(&eval(theirs), &eval(ours)).unwrap()
            })
            .collect();
        (points, values)
    }

    #[test]
    fn test_recovers_unique_elements() {
        let field = PrimeField::new(big(263)).unwrap();
        let ours = [2, 3, 4];
        let theirs = [1, 2, 3];
        let (points, values) = ratios(&field, 4, &ours, &theirs);
        let rf = interpolate_rational(&field, &points, &values, 3, 3).unwrap();
        assert_eq!(find_roots(&rf.numerator, &field).unwrap(), vec![big(1)]);
        assert_eq!(find_roots(&rf.denominator, &field).unwrap(), vec![big(4)]);
    }

    #[test]
    fn test_identical_sets_give_unit_ratio() {
        let field = PrimeField::new(big(263)).unwrap();
        let set = [10, 20, 30, 40];
        let (points, values) = ratios(&field, 5, &set, &set);
        let rf = interpolate_rational(&field, &points, &values, 4, 4).unwrap();
        assert_eq!(rf.numerator, Poly::one());
        assert_eq!(rf.denominator, Poly::one());
    }

    #[test]
    fn test_one_sided_difference() {
        let field = PrimeField::new(big(263)).unwrap();
        let (points, values) = ratios(&field, 5, &[], &[7, 8, 9]);
        let rf = interpolate_rational(&field, &points, &values, 3, 0).unwrap();
        assert_eq!(find_roots(&rf.numerator, &field).unwrap(), vec![big(7), big(8), big(9)]);
        assert_eq!(rf.denominator, Poly::one());
    }

    #[test]
    fn test_degree_difference_beyond_budget_fails() {
        let field = PrimeField::new(big(263)).unwrap();
        let (points, values) = ratios(&field, 2, &[], &[1, 2, 3]);
        assert!(matches!(
            interpolate_rational(&field, &points, &values, 3, 0),
            Err(CoreError::InterpolationFailure(_))
        ));
    }
}
