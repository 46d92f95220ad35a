//! Observation data module
//!
//! Reading and validating sequences of discrete symbol indices.

mod sequence;

pub use sequence::ObservationSequence;
