//! Reply generation abstractions.

pub mod box_generator;
pub mod generator;
