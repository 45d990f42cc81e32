//! Game implementations.

pub mod drinks;
