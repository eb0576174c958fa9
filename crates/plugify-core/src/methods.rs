//! Method tables for dynamic dispatch.
//!
//! `#[reflect_methods]` turns every public `&self` / `&mut self` method of an
//! inherent `impl` block into a [`Method`] entry. Each entry carries a
//! monomorphic thunk that converts positional [`Value`] arguments into the
//! declared parameter types and packs the return value into a result list.
//!
//! ```rust,ignore
//! #[derive(Clone, Reflect)]
//! pub struct Counter { pub count: i64 }
//!
//! #[reflect_methods(clone)]
//! impl Counter {
//!     pub fn get(&self) -> i64 { self.count }
//!     pub fn add(&mut self, by: i64) -> i64 { self.count += by; self.count }
//! }
//! ```

use std::fmt;

use crate::convert::convert_into;
use crate::error::{InvokeError, InvokeResult};
use crate::reflect::{FromValue, Typed};
use crate::types::TypeInfo;
use crate::value::Value;

/// Receiver kind of a reflected method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// `&self`
    Ref,
    /// `&mut self`
    Mut,
}

pub type RefThunk<T> = fn(&T, Args) -> InvokeResult<Vec<Value>>;
pub type MutThunk<T> = fn(&mut T, Args) -> InvokeResult<Vec<Value>>;

pub(crate) enum Thunk<T> {
    Ref(RefThunk<T>),
    Mut(MutThunk<T>),
}

/// One callable entry of a type's method table.
pub struct Method<T> {
    name: &'static str,
    params: fn() -> Vec<TypeInfo>,
    pub(crate) thunk: Thunk<T>,
}

impl<T> Method<T> {
    /// A method taking `&self`.
    pub fn by_ref(name: &'static str, params: fn() -> Vec<TypeInfo>, thunk: RefThunk<T>) -> Self {
        Self {
            name,
            params,
            thunk: Thunk::Ref(thunk),
        }
    }

    /// A method taking `&mut self`.
    pub fn by_mut(name: &'static str, params: fn() -> Vec<TypeInfo>, thunk: MutThunk<T>) -> Self {
        Self {
            name,
            params,
            thunk: Thunk::Mut(thunk),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn receiver(&self) -> Receiver {
        match self.thunk {
            Thunk::Ref(_) => Receiver::Ref,
            Thunk::Mut(_) => Receiver::Mut,
        }
    }

    /// Declared parameter types, receiver excluded.
    pub fn params(&self) -> Vec<TypeInfo> {
        (self.params)()
    }

    /// Type-erased description of the method.
    pub fn info(&self) -> MethodInfo {
        MethodInfo {
            name: self.name,
            receiver: self.receiver(),
            params: self.params(),
        }
    }
}

impl<T> fmt::Debug for Method<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("receiver", &self.receiver())
            .finish_non_exhaustive()
    }
}

/// Type-erased method signature, used for introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: &'static str,
    pub receiver: Receiver,
    pub params: Vec<TypeInfo>,
}

/// A type with a reflected method table.
pub trait Methods: Sized {
    fn method_table() -> Vec<Method<Self>>;

    /// A copy to run `&mut self` methods on when only a shared reference is
    /// available. `None` unless the table was generated with
    /// `#[reflect_methods(clone)]`.
    fn clone_for_call(&self) -> Option<Self> {
        None
    }
}

/// Positional arguments handed to a method thunk.
#[derive(Debug, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts the argument at `index` into `T`.
    ///
    /// Each argument can be taken once; a second take sees `Null`.
    pub fn take<T: Typed + FromValue>(&mut self, index: usize) -> InvokeResult<T> {
        let value = self
            .values
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or_default();
        convert_into(value).map_err(|reason| InvokeError::ArgumentConversion { index, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;

    #[test]
    fn test_args_take_converts() {
        let mut args = Args::new(vec![Value::Float(3.0), Value::from("x")]);

        let n: i32 = args.take(0).unwrap();
        assert_eq!(n, 3);

        let err = args.take::<bool>(1).unwrap_err();
        assert!(matches!(
            err,
            InvokeError::ArgumentConversion {
                index: 1,
                reason: ConvertError::UnconvertibleType { .. }
            }
        ));
    }
}
