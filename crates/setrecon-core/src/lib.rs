//! # Set Reconciliation Core
//!
//! Pure computation for set reconciliation: elements, prime fields,
//! polynomials, rational interpolation and invertible Bloom lookup tables.
//!
//! This crate contains no I/O and no networking.
//!
//! ## Key Types
//!
//! - [`Element`] - An opaque datum viewed as a non-negative integer
//! - [`PrimeField`] - Arithmetic modulo a prime
//! - [`Poly`] - Dense polynomials with root finding
//! - [`Iblt`] / [`IbltMultiset`] - Invertible Bloom lookup tables
//!
//! ## Interpolation
//!
//! The characteristic polynomial of a set `S` is `prod (x - s)` over its
//! members. Evaluating two sets' characteristic polynomials at common
//! points and dividing yields samples of a rational function whose
//! numerator and denominator have exactly the unique elements of each side
//! as roots. See [`interp::interpolate_rational`] and [`poly::find_roots`].

pub mod element;
pub mod error;
pub mod field;
pub mod hash;
pub mod iblt;
pub mod iblt_multiset;
pub mod interp;
pub mod poly;

pub use element::Element;
pub use error::{CoreError, Result};
pub use field::{is_probable_prime, PrimeField};
pub use hash::{hash_to_bits, hash_u64};
pub use iblt::{Cell, Entry, Iblt, InvertibleTable, Lookup, PeelOutcome, N_HASH, N_HASHCHECK};
pub use iblt_multiset::{IbltMultiset, MultisetCell, LARGE_PRIME};
pub use interp::{interpolate_rational, RationalFunction};
pub use poly::{find_roots, Poly};
