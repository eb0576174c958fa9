//! Runtime type model.
//!
//! [`TypeInfo`] describes the shape a [`Value`] must take to be materialised
//! as a concrete Rust type. Record fields hold their type lazily as a function
//! pointer so that self-referential types (`Option<Box<Self>>`, `Vec<Self>`)
//! can be described without infinite recursion.

use std::fmt;

use crate::value::{Record, Value};

/// Width of a signed integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    Isize,
}

impl IntKind {
    /// Inclusive bounds of the type, widened to `i64`.
    pub fn bounds(self) -> (i64, i64) {
        match self {
            Self::I8 => (i8::MIN.into(), i8::MAX.into()),
            Self::I16 => (i16::MIN.into(), i16::MAX.into()),
            Self::I32 => (i32::MIN.into(), i32::MAX.into()),
            Self::I64 => (i64::MIN, i64::MAX),
            Self::Isize => (isize::MIN as i64, isize::MAX as i64),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Isize => "isize",
        }
    }
}

/// Width of an unsigned integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UIntKind {
    U8,
    U16,
    U32,
    U64,
    Usize,
}

impl UIntKind {
    /// Inclusive upper bound of the type, widened to `u64`.
    pub fn max(self) -> u64 {
        match self {
            Self::U8 => u8::MAX.into(),
            Self::U16 => u16::MAX.into(),
            Self::U32 => u32::MAX.into(),
            Self::U64 => u64::MAX,
            Self::Usize => usize::MAX as u64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

// ─── TypeInfo ─────────────────────────────────────────────────────────────────

/// Shape descriptor for a reflected type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
    /// Accepts any value unchanged ([`Value`] itself).
    Any,
    Bool,
    Int(IntKind),
    UInt(UIntKind),
    Float(FloatKind),
    Str,
    Bytes,
    /// `Option<T>`: `Null` maps to `None`.
    Option(Box<TypeInfo>),
    /// `Box<T>` / `Arc<T>`: transparent in the value model.
    Pointer(Box<TypeInfo>),
    Seq(Box<TypeInfo>),
    /// Fixed-size array `[T; N]`.
    Array(Box<TypeInfo>, usize),
    /// String-keyed map with values of the inner type.
    Map(Box<TypeInfo>),
    Record(RecordInfo),
}

impl TypeInfo {
    /// Strips every pointer layer.
    pub fn deref(&self) -> &TypeInfo {
        match self {
            Self::Pointer(inner) => inner.deref(),
            other => other,
        }
    }

    /// Returns `true` for sequences, arrays, maps and records (through pointers).
    pub fn is_composite(&self) -> bool {
        matches!(
            self.deref(),
            Self::Seq(_) | Self::Array(..) | Self::Map(_) | Self::Record(_)
        )
    }

    pub fn as_record(&self) -> Option<&RecordInfo> {
        match self.deref() {
            Self::Record(info) => Some(info),
            _ => None,
        }
    }

    /// The type nested inside a wrapper or container, if any.
    pub fn element(&self) -> Option<&TypeInfo> {
        match self {
            Self::Option(inner)
            | Self::Pointer(inner)
            | Self::Seq(inner)
            | Self::Array(inner, _)
            | Self::Map(inner) => Some(inner),
            _ => None,
        }
    }

    /// Strips wrappers and containers down to the innermost type.
    pub fn innermost(&self) -> &TypeInfo {
        match self.element() {
            Some(inner) => inner.innermost(),
            None => self,
        }
    }

    /// The default value of the type.
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Any | Self::Option(_) => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Int(_) => Value::Int(0),
            Self::UInt(_) => Value::UInt(0),
            Self::Float(_) => Value::Float(0.0),
            Self::Str => Value::Str(String::new()),
            Self::Bytes => Value::Bytes(Vec::new()),
            Self::Pointer(inner) => inner.zero_value(),
            Self::Seq(_) => Value::Seq(Vec::new()),
            Self::Array(inner, len) => Value::Seq((0..*len).map(|_| inner.zero_value()).collect()),
            Self::Map(_) => Value::Map(Default::default()),
            Self::Record(info) => Value::Record(info.zero_record()),
        }
    }

    /// Human-readable name used in diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            Self::Any => "any".into(),
            Self::Bool => "bool".into(),
            Self::Int(kind) => kind.name().into(),
            Self::UInt(kind) => kind.name().into(),
            Self::Float(FloatKind::F32) => "f32".into(),
            Self::Float(FloatKind::F64) => "f64".into(),
            Self::Str => "String".into(),
            Self::Bytes => "Bytes".into(),
            Self::Option(inner) => format!("Option<{}>", inner.display_name()),
            Self::Pointer(inner) => format!("*{}", inner.display_name()),
            Self::Seq(inner) => format!("Vec<{}>", inner.display_name()),
            Self::Array(inner, len) => format!("[{}; {len}]", inner.display_name()),
            Self::Map(inner) => format!("Map<String, {}>", inner.display_name()),
            Self::Record(info) => info.qualified_name(),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

// ─── RecordInfo ───────────────────────────────────────────────────────────────

/// Describes a reflected record type.
///
/// Identity is the `(package, name)` pair; two descriptors for the same pair
/// compare equal regardless of their field lists.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    package: &'static str,
    name: &'static str,
    fields: Vec<FieldInfo>,
}

impl RecordInfo {
    pub fn new(package: &'static str, name: &'static str, fields: Vec<FieldInfo>) -> Self {
        Self {
            package,
            name,
            fields,
        }
    }

    /// Originating package (module path).
    pub fn package(&self) -> &'static str {
        self.package
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last segment of the package path.
    pub fn package_base(&self) -> &'static str {
        self.package.rsplit("::").next().unwrap_or(self.package)
    }

    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.package, self.name)
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if `record` was produced by this type.
    pub fn describes(&self, record: &Record) -> bool {
        record.package() == self.package && record.type_name() == self.name
    }

    /// A record with every field at its zero value.
    pub fn zero_record(&self) -> Record {
        self.fields.iter().fold(
            Record::new(self.package, self.name),
            |record, field| record.with_field(field.name, field.ty().zero_value()),
        )
    }
}

impl PartialEq for RecordInfo {
    fn eq(&self, other: &Self) -> bool {
        self.package == other.package && self.name == other.name
    }
}

/// One reflected field of a record.
#[derive(Clone, Copy)]
pub struct FieldInfo {
    name: &'static str,
    public: bool,
    ty: fn() -> TypeInfo,
}

impl FieldInfo {
    pub const fn new(name: &'static str, public: bool, ty: fn() -> TypeInfo) -> Self {
        Self { name, public, ty }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `false` for fields exposed through `#[reflect(private)]`.
    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn ty(&self) -> TypeInfo {
        (self.ty)()
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
