//! Configuration validation utilities.
//!
//! Pluggable implementations receive their settings as a raw TOML table. Each one
//! declares a [`Schema`] of required and optional fields which is checked before
//! the implementation is constructed.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// The expected type of a configuration field.
#[derive(Debug, Clone)]
pub enum FieldType {
	String,
	/// An integer with inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// A string that must start with `http://` or `https://`.
	Url,
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Boolean => "boolean",
			FieldType::Url => "url string",
		}
	}
}

/// A named field in a configuration schema.
#[derive(Debug, Clone)]
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
		}
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		let mismatch = || ValidationError::TypeMismatch {
			field: self.name.clone(),
			expected: self.field_type.name().to_string(),
			actual: value.type_str().to_string(),
		};

		match &self.field_type {
			FieldType::String => value.as_str().map(|_| ()).ok_or_else(mismatch),
			FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
			FieldType::Url => {
				let url = value.as_str().ok_or_else(mismatch)?;
				if url.starts_with("http://") || url.starts_with("https://") {
					Ok(())
				} else {
					Err(ValidationError::InvalidValue {
						field: self.name.clone(),
						message: format!("'{}' is not an http(s) URL", url),
					})
				}
			},
			FieldType::Integer { min, max } => {
				let number = value.as_integer().ok_or_else(mismatch)?;
				if min.is_some_and(|min| number < min) || max.is_some_and(|max| number > max) {
					return Err(ValidationError::InvalidValue {
						field: self.name.clone(),
						message: format!(
							"{} is outside the allowed range {}..={}",
							number,
							min.map(|v| v.to_string()).unwrap_or_default(),
							max.map(|v| v.to_string()).unwrap_or_default()
						),
					});
				}
				Ok(())
			},
		}
	}
}

/// Required and optional fields of one implementation's configuration table.
#[derive(Debug, Clone, Default)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// Unknown keys are ignored so that configuration files can carry comments
	/// or settings for newer versions.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

/// Trait implemented by every pluggable implementation's configuration schema.
pub trait ConfigSchema: Send + Sync {
	/// Validates a TOML configuration value against this schema.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn webhook_schema() -> Schema {
		Schema::new(
			vec![Field::new("url", FieldType::Url)],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(120),
				},
			)],
		)
	}

	#[test]
	fn test_valid_table_passes() {
		let config: toml::Value = toml::from_str(
			r#"
url = "https://mail.example.com/send"
timeout_seconds = 5
"#,
		)
		.unwrap();
		assert!(webhook_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required_field() {
		let config: toml::Value = toml::from_str("timeout_seconds = 5").unwrap();
		let err = webhook_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(ref f) if f == "url"));
	}

	#[test]
	fn test_integer_out_of_range() {
		let config: toml::Value = toml::from_str(
			r#"
url = "http://localhost"
timeout_seconds = 0
"#,
		)
		.unwrap();
		let err = webhook_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::InvalidValue { .. }));
	}

	#[test]
	fn test_bad_url_and_type_mismatch() {
		let config: toml::Value = toml::from_str(r#"url = "smtp://host""#).unwrap();
		assert!(webhook_schema().validate(&config).is_err());

		let config: toml::Value = toml::from_str("url = 42").unwrap();
		let err = webhook_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { .. }));
	}
}
