//! Numerical building blocks for event prediction.

pub mod polynomial;

pub use polynomial::{Polynomial, RootSet};
