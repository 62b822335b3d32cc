//! NumPy-like array operations on 1D series.

mod array;

pub use array::*;
