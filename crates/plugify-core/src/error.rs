//! Error types for conversion and dynamic dispatch.

use thiserror::Error;

use crate::types::TypeInfo;
use crate::value::Value;

/// Errors raised while shaping a [`Value`] into a target type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConvertError {
    /// No conversion rule reconciles the two shapes.
    #[error("cannot convert {source_type} to {target_type}")]
    UnconvertibleType {
        source_type: String,
        target_type: String,
    },

    /// The value has the right kind but does not fit the target width.
    #[error("value {value} is out of range for {target_type}")]
    OutOfRange { value: String, target_type: String },

    /// A record field failed to convert.
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        source: Box<ConvertError>,
    },

    /// A sequence element failed to convert.
    #[error("element {index}: {source}")]
    Element {
        index: usize,
        source: Box<ConvertError>,
    },
}

impl ConvertError {
    /// Creates an [`UnconvertibleType`](Self::UnconvertibleType) error for `value` → `target`.
    pub fn unconvertible(value: &Value, target: &TypeInfo) -> Self {
        Self::UnconvertibleType {
            source_type: value.describe(),
            target_type: target.display_name(),
        }
    }

    pub fn out_of_range(value: impl ToString, target: &TypeInfo) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            target_type: target.display_name(),
        }
    }

    /// Wraps the error with the name of the field being converted.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Wraps the error with the index of the element being converted.
    pub fn at_element(self, index: usize) -> Self {
        Self::Element {
            index,
            source: Box::new(self),
        }
    }

    /// The innermost error, past field and element context.
    pub fn root(&self) -> &ConvertError {
        match self {
            Self::Field { source, .. } | Self::Element { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors raised by dynamic method invocation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvokeError {
    #[error("method {method} not found on {type_name}")]
    MethodNotFound { method: String, type_name: String },

    #[error("method {method} expects {expected} arguments, got {got}")]
    ArityMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index}: {reason}")]
    ArgumentConversion {
        index: usize,
        #[source]
        reason: ConvertError,
    },
}

impl InvokeError {
    pub fn method_not_found(method: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
            type_name: type_name.into(),
        }
    }
}

/// Result type for conversions.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Result type for method invocation.
pub type InvokeResult<T> = Result<T, InvokeError>;
