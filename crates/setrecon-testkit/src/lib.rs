//! # Setrecon Testkit
//!
//! Testing utilities for the setrecon engines.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for pairs of sets with a bounded difference
//! - **Fixtures**: Helpers that run two engines against each other over an
//!   in-memory channel and report what each side learned
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use setrecon::{Engine, EngineConfig};
//! use setrecon_testkit::fixtures::{populated, run_pair_blocking};
//! use setrecon_testkit::generators::SetPair;
//!
//! proptest! {
//!     #[test]
//!     fn finds_difference(pair: SetPair) {
//!         let config = EngineConfig::default();
//!         let mut a = populated(Engine::from_config(&config).unwrap(), &pair.client());
//!         let mut b = populated(Engine::from_config(&config).unwrap(), &pair.server());
//!         let outcome = run_pair_blocking(&mut a, &mut b);
//!         prop_assert_eq!(outcome.client.unwrap(), pair.client_view());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{populated, run_pair, run_pair_blocking, SessionOutcome};
pub use generators::SetPair;
