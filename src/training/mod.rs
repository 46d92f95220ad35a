//! Model training module
//!
//! Baum-Welch (EM) re-estimation of discrete HMM parameters.

mod baum_welch;

pub use baum_welch::{
    BaumWelchTrainer, DegenerateUpdate, IterationRecord, ParameterKind, TrainingReport,
    TrainingStatus,
};
