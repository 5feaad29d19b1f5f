//! Column definitions: semantic kinds, behavior flags and validators.

use crate::error::{ColumnValidationError, Error, Result};
use crate::value::Value;

/// Semantic type tag for a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// Free-form text
    Text,
    /// 64-bit integer
    Integer,
    /// Arbitrary precision decimal
    Decimal,
    /// Boolean
    Boolean,
    /// Calendar date
    Date,
    /// Date and time
    Datetime,
    /// Foreign-key reference to another model
    Reference {
        /// Target model name
        target: String,
    },
}

impl ColumnKind {
    /// Create a reference kind pointing at `target`.
    pub fn reference(target: impl Into<String>) -> Self {
        ColumnKind::Reference {
            target: target.into(),
        }
    }

    /// Check if this kind is a reference.
    pub const fn is_reference(&self) -> bool {
        matches!(self, ColumnKind::Reference { .. })
    }

    /// The referenced model name, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            ColumnKind::Reference { target } => Some(target),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Bitmask of column behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u16 {
        /// Column cannot be set through the public API.
        const READ_ONLY = 1 << 0;
        /// Column carries no storage; resolved at query time.
        const VIRTUAL = 1 << 1;
        /// Column must be non-null at save time.
        const REQUIRED = 1 << 2;
        /// Column value must be unique across the table.
        const UNIQUE = 1 << 3;
        /// Column is populated by the database on insert.
        const AUTO_INCREMENT = 1 << 4;
        /// Column is stored per-locale in a side table.
        const I18N = 1 << 5;
        /// Column is excluded from serialized projections.
        const PRIVATE = 1 << 6;
    }
}

impl Default for ColumnFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl ColumnFlags {
    /// Names of the set flags, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        const ALL: [(ColumnFlags, &str); 7] = [
            (ColumnFlags::READ_ONLY, "ReadOnly"),
            (ColumnFlags::VIRTUAL, "Virtual"),
            (ColumnFlags::REQUIRED, "Required"),
            (ColumnFlags::UNIQUE, "Unique"),
            (ColumnFlags::AUTO_INCREMENT, "AutoIncrement"),
            (ColumnFlags::I18N, "I18n"),
            (ColumnFlags::PRIVATE, "Private"),
        ];
        ALL.iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// A value constraint attached to a column.
///
/// Checked synchronously before any statement is compiled.
#[derive(Debug, Clone)]
pub enum ColumnValidator {
    /// Value must match a regular expression.
    Pattern {
        pattern: String,
        regex: regex::Regex,
        message: String,
    },
    /// Text value must be at least this long.
    MinLength(usize),
}

impl ColumnValidator {
    /// Build a pattern validator from a regex source string.
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self> {
        let regex = regex::Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid validator pattern '{pattern}': {e}")))?;
        Ok(ColumnValidator::Pattern {
            pattern: pattern.to_string(),
            regex,
            message: message.into(),
        })
    }

    /// Check a value against this validator.
    ///
    /// Null values pass; Required-ness is a separate flag check.
    pub fn check(&self, column: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            ColumnValidator::Pattern { regex, message, .. } => {
                let text = value.as_str().ok_or_else(|| {
                    Error::validation(column, format!("expected text, got {}", value.type_name()))
                })?;
                if regex.is_match(text) {
                    Ok(())
                } else {
                    Err(Error::Validation(ColumnValidationError {
                        column: column.to_string(),
                        message: message.clone(),
                    }))
                }
            }
            ColumnValidator::MinLength(min) => {
                let len = value.as_str().map_or(0, str::len);
                if len >= *min {
                    Ok(())
                } else {
                    Err(Error::validation(
                        column,
                        format!("must be at least {min} characters, got {len}"),
                    ))
                }
            }
        }
    }
}

impl PartialEq for ColumnValidator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ColumnValidator::Pattern {
                    pattern: a,
                    message: ma,
                    ..
                },
                ColumnValidator::Pattern {
                    pattern: b,
                    message: mb,
                    ..
                },
            ) => a == b && ma == mb,
            (ColumnValidator::MinLength(a), ColumnValidator::MinLength(b)) => a == b,
            _ => false,
        }
    }
}

/// A single mapped field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Field name used in queries and record access
    name: String,
    /// Database column name (defaults to the field name)
    field: String,
    /// Semantic type tag
    kind: ColumnKind,
    /// Behavior flags
    flags: ColumnFlags,
    /// Default value applied on insert when the column is unset
    default: Option<Value>,
    /// Optional value constraint
    validator: Option<ColumnValidator>,
}

impl Column {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        let name = name.into();
        Self {
            field: name.clone(),
            name,
            kind,
            flags: ColumnFlags::empty(),
            default: None,
            validator: None,
        }
    }

    /// Set the database column name.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Add behavior flags.
    pub fn flags(mut self, flags: ColumnFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a validator.
    pub fn validator(mut self, validator: ColumnValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Field name used in queries.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database column name.
    pub fn field_name(&self) -> &str {
        &self.field
    }

    /// Semantic type tag.
    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Behavior flags.
    pub fn column_flags(&self) -> ColumnFlags {
        self.flags
    }

    /// Check whether the column carries all of the given flags.
    pub fn has_flags(&self, flags: ColumnFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Default value, if any.
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Check a value against this column's validator, if any.
    pub fn validate(&self, value: &Value) -> Result<()> {
        match &self.validator {
            Some(validator) => validator.check(&self.name, value),
            None => Ok(()),
        }
    }

    /// Verify that the flag combination is internally consistent.
    ///
    /// Virtual columns carry no storage and must be read-only; database
    /// generated columns must be read-only as well.
    pub fn check_flags(&self) -> std::result::Result<(), &'static str> {
        if self.has_flags(ColumnFlags::VIRTUAL) && !self.has_flags(ColumnFlags::READ_ONLY) {
            return Err("Virtual columns must be ReadOnly");
        }
        if self.has_flags(ColumnFlags::AUTO_INCREMENT) && !self.has_flags(ColumnFlags::READ_ONLY) {
            return Err("AutoIncrement columns must be ReadOnly");
        }
        if self.has_flags(ColumnFlags::VIRTUAL) && self.has_flags(ColumnFlags::I18N) {
            return Err("Virtual columns cannot be I18n");
        }
        Ok(())
    }
}
