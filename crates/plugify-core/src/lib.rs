//! # Plugify Core
//!
//! Reflection foundation of the Plugify plugin runtime.
//!
//! This crate provides the loosely-typed value model plugins exchange with the
//! host, a structural conversion engine that shapes those values into concrete
//! Rust types, and dynamic method dispatch over reflected method tables.
//!
//! ## Building Blocks
//!
//! - **Values**: [`Value`], [`Mapping`] and [`Record`]
//! - **Type model**: [`TypeInfo`], [`RecordInfo`], [`FieldInfo`]
//! - **Reflection**: [`Typed`], [`Reflect`], [`FromValue`], `#[derive(Reflect)]`
//! - **Conversion**: [`convert_value`], [`convert_into`], [`convert_to`]
//! - **Dispatch**: [`Methods`], `#[reflect_methods]`, [`call_method`], [`call_method_mut`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use plugify_core::{Mapping, Reflect, Value, convert_into, reflect_methods, call_method};
//!
//! #[derive(Debug, Clone, Default, Reflect)]
//! pub struct Greeter {
//!     pub prefix: String,
//! }
//!
//! #[reflect_methods]
//! impl Greeter {
//!     pub fn greet(&self, name: &str) -> String {
//!         format!("{} {}", self.prefix, name)
//!     }
//! }
//!
//! let greeter: Greeter = convert_into(Value::Map(Mapping::new().with("PREFIX", "Hello")))?;
//! let out = call_method(&greeter, "greet", vec![Value::from("world")])?;
//! assert_eq!(out, vec![Value::from("Hello world")]);
//! ```

extern crate self as plugify_core;

pub mod convert;
pub mod error;
pub mod invoke;
pub mod methods;
pub mod reflect;
pub mod types;
pub mod value;

pub use convert::{convert_into, convert_to, convert_value};
pub use error::{ConvertError, ConvertResult, InvokeError, InvokeResult};
pub use invoke::{call_method, call_method_mut, method_infos};
pub use methods::{Args, Method, MethodInfo, Methods, Receiver};
pub use reflect::{Bytes, FromValue, Reflect, Typed};
pub use types::{FieldInfo, FloatKind, IntKind, RecordInfo, TypeInfo, UIntKind};
pub use value::{Mapping, Record, Value};

pub use plugify_macros::{Reflect, reflect_methods};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        FromValue, Mapping, Methods, Record, Reflect, TypeInfo, Typed, Value, call_method,
        call_method_mut, convert_into, convert_to, reflect_methods,
    };
}
