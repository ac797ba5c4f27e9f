//! Per-type rule declarations
//!
//! A type opts into validation by implementing [`Validate`], naming a tag
//! for each field it wants checked. Field names are the keys the type
//! serializes to.

use serde::Serialize;

/// Ordered `(field, tag)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRules {
    fields: Vec<(String, String)>,
}

impl FieldRules {
    /// Empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder
    pub fn builder() -> FieldRulesBuilder {
        FieldRulesBuilder::new()
    }

    /// `(field, tag)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(field, tag)| (field.as_str(), tag.as_str()))
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is declared
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`FieldRules`]
#[derive(Debug, Default)]
pub struct FieldRulesBuilder {
    rules: FieldRules,
}

impl FieldRulesBuilder {
    /// Builder with no fields yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with its tag
    pub fn field(mut self, name: &str, tag: &str) -> Self {
        self.rules.fields.push((name.to_string(), tag.to_string()));
        self
    }

    /// Shorthand for a field whose tag starts with `required`
    pub fn required_field(self, name: &str, tag: &str) -> Self {
        if tag.is_empty() {
            self.field(name, "required")
        } else {
            self.field(name, &format!("required,{tag}"))
        }
    }

    /// Shorthand for a field whose tag starts with `omitempty`
    pub fn optional_field(self, name: &str, tag: &str) -> Self {
        self.field(name, &format!("omitempty,{tag}"))
    }

    /// Finish the rule set
    pub fn build(self) -> FieldRules {
        self.rules
    }
}

/// A struct that can be validated
///
/// ```ignore
/// #[derive(Serialize)]
/// struct ChangePassword {
///     user_id: u64,
///     current_password: String,
///     mobile: String,
/// }
///
/// impl Validate for ChangePassword {
///     fn rules() -> FieldRules {
///         FieldRules::builder()
///             .field("current_password", "required,current_password")
///             .field("mobile", "required,mobile,exists=users;mobile")
///             .build()
///     }
/// }
/// ```
pub trait Validate: Serialize + 'static {
    fn rules() -> FieldRules;
}
