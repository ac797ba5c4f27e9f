//! # Tag Validation Library
//!
//! Tag-driven struct validation with database-aware rules and locale
//! translated error messages.
//!
//! ## Features
//!
//! - Rules named by short tags (`required,mobile,uq=users;mobile`)
//! - `exists` / `uq` rules backed by PostgreSQL or an in-memory lookup
//! - A `current_password` rule delegating to a host-supplied checker
//! - Failures rendered as a JSON map of snake-cased field names to
//!   translated messages (`fa` and `en` built in, more from TOML)
//!
//! ## Example
//!
//! ```ignore
//! use tag_validation::prelude::*;
//!
//! #[derive(serde::Serialize)]
//! struct Register {
//!     mobile: String,
//!     name: String,
//! }
//!
//! impl Validate for Register {
//!     fn rules() -> FieldRules {
//!         FieldRules::builder()
//!             .field("mobile", "required,mobile,uq=users;mobile")
//!             .field("name", "required,string,max=64")
//!             .build()
//!     }
//! }
//!
//! let validation = Validation::init(lookup);
//! if let Err(err) = validation.validate(&request).await {
//!     // `err` displays as {"mobile":["..."]}
//! }
//! ```

mod errors;
mod field;
mod schema;
mod settings;
mod validation;
pub mod rules;
pub mod tags;
pub mod translation;

pub use errors::{FieldErrors, RuleError, ValidationError, ValidationResult, GENERIC_MESSAGE};
pub use field::{is_empty_value, FieldLevel};
pub use rules::{
    CurrentPasswordChecker, InMemoryRecordLookup, PgRecordLookup, RecordLookup, Rule,
};
pub use schema::{FieldRules, FieldRulesBuilder, Validate};
pub use settings::ValidationSettings;
pub use translation::{to_snake_case, Translator};
pub use validation::{StructLevel, Validation};

/// Re-export commonly used items for convenience
pub mod prelude {
    pub use crate::errors::{FieldErrors, ValidationError, ValidationResult};
    pub use crate::field::FieldLevel;
    pub use crate::rules::{CurrentPasswordChecker, InMemoryRecordLookup, PgRecordLookup, RecordLookup};
    pub use crate::schema::{FieldRules, Validate};
    pub use crate::settings::ValidationSettings;
    pub use crate::validation::{StructLevel, Validation};
}

/// Version of the validation library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
