//! Shared model types for SQL materialization connectors.
//!
//! This crate is pure data: the binding and projection model consumed by
//! binding validation, the constraint verdicts it produces, and the
//! checkpoint-table rows used by write fencing. It carries no I/O.

pub mod binding;
pub mod constraint;
pub mod fence;
pub mod inference;
pub mod names;
pub mod projection;

pub use binding::{BindingSpec, FieldSelection, MaterializationSpec};
pub use constraint::{Constraint, ConstraintType};
pub use fence::{Fence, InvalidKeyRange, KeyRange};
pub use inference::{Exists, Inference, StringInference};
pub use names::{CollectionName, MaterializationName};
pub use projection::{CollectionSpec, Projection};
