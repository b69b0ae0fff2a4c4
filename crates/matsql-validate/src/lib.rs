//! Binding validation for SQL materializations.
//!
//! Given a proposed binding of a collection to a destination table, the
//! [`Validator`] decides a [`Constraint`](matsql_types::Constraint) for every
//! candidate field and rejects proposals that would break schema-evolution
//! rules. Destination specifics enter through two seams: the
//! [`InfoSchema`] identifier translation and a connector-supplied
//! [`Constrainer`].

pub mod constrainer;
pub mod convert;
pub mod error;
pub mod flat_type;
pub mod info_schema;
pub mod type_map;
pub mod validator;

pub use constrainer::{baseline_constraints, Constrainer};
pub use error::{ConvertError, ValidateError};
pub use flat_type::{as_formatted_numeric, classify, formatted_numeric, FlatType, NumericStringFormat};
pub use info_schema::{EndpointField, InfoSchema, InfoSchemaSnapshot, TableSnapshot, Translation};
pub use type_map::{FieldConfig, MappedConstrainer, TypeMap};
pub use validator::{forbid_ambiguous_fields, Validator};
