//! Dynamic method invocation.
//!
//! Methods are resolved by exact name in the type's reflected method table.
//! Arguments are positional and converted one by one with the conversion
//! engine; the return value is packed into a result list:
//!
//! | Rust return type | Result list |
//! |------------------|-------------|
//! | `()`             | `[]` |
//! | `T`              | `[T]` |
//! | `Result<T, E>`   | `[T, Null]` or `[Null, Str(error)]` |

use tracing::trace;

use crate::error::{InvokeError, InvokeResult};
use crate::methods::{Args, Method, MethodInfo, Methods, Thunk};
use crate::reflect::Typed;
use crate::value::Value;

/// Calls the method `name` on a shared target.
///
/// `&mut self` methods run on the copy returned by
/// [`Methods::clone_for_call`]; mutations are not visible on `target`. Types
/// without such a copy report the method as not found.
pub fn call_method<T>(target: &T, name: &str, args: Vec<Value>) -> InvokeResult<Vec<Value>>
where
    T: Methods + Typed,
{
    let method = resolve::<T>(name, args.len())?;
    trace!(method = name, args = args.len(), "Invoking method");
    match method.thunk {
        Thunk::Ref(thunk) => thunk(target, Args::new(args)),
        Thunk::Mut(thunk) => {
            let mut copy = target
                .clone_for_call()
                .ok_or_else(|| not_found::<T>(name))?;
            thunk(&mut copy, Args::new(args))
        }
    }
}

/// Calls the method `name` on an exclusive target; both receiver kinds
/// resolve.
pub fn call_method_mut<T>(target: &mut T, name: &str, args: Vec<Value>) -> InvokeResult<Vec<Value>>
where
    T: Methods + Typed,
{
    let method = resolve::<T>(name, args.len())?;
    trace!(method = name, args = args.len(), "Invoking method");
    match method.thunk {
        Thunk::Ref(thunk) => thunk(target, Args::new(args)),
        Thunk::Mut(thunk) => thunk(target, Args::new(args)),
    }
}

/// Signatures of every reflected method of `T`.
pub fn method_infos<T: Methods>() -> Vec<MethodInfo> {
    T::method_table().iter().map(Method::info).collect()
}

fn resolve<T: Methods + Typed>(name: &str, got: usize) -> InvokeResult<Method<T>> {
    let method = T::method_table()
        .into_iter()
        .find(|m| m.name() == name)
        .ok_or_else(|| not_found::<T>(name))?;

    let expected = method.params().len();
    if expected != got {
        return Err(InvokeError::ArityMismatch {
            method: name.to_string(),
            expected,
            got,
        });
    }
    Ok(method)
}

fn not_found<T: Typed>(name: &str) -> InvokeError {
    InvokeError::method_not_found(name, T::type_info().display_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::methods::Receiver;
    use crate::{Reflect, reflect_methods};

    #[derive(Debug, Clone, Default, PartialEq, Reflect)]
    pub struct Item {
        pub name: String,
        pub qty: u32,
    }

    #[derive(Debug, Clone, Default, Reflect)]
    pub struct Cart {
        pub items: Vec<Item>,
    }

    #[reflect_methods(clone)]
    impl Cart {
        pub fn count(&self) -> usize {
            self.items.len()
        }

        pub fn add(&mut self, item: Item) -> usize {
            self.items.push(item);
            self.items.len()
        }

        pub fn add_all(&mut self, items: Vec<Item>) {
            self.items.extend(items);
        }

        pub fn find(&self, name: &str) -> Result<Item, String> {
            self.items
                .iter()
                .find(|i| i.name == name)
                .cloned()
                .ok_or_else(|| format!("no item named {name}"))
        }

        #[reflect(skip)]
        pub fn hidden(&self) -> bool {
            true
        }

        #[allow(dead_code)]
        fn internal(&self) {}
    }

    #[derive(Debug, Default, Reflect)]
    pub struct Tally {
        pub total: i64,
    }

    #[reflect_methods]
    impl Tally {
        pub fn bump(&mut self, by: i64) -> i64 {
            self.total += by;
            self.total
        }
    }

    fn item(name: &str, qty: i64) -> Value {
        Value::Map(crate::Mapping::new().with("name", name).with("qty", qty))
    }

    #[test]
    fn test_call_by_ref() {
        let cart = Cart {
            items: vec![Item { name: "a".into(), qty: 1 }],
        };
        assert_eq!(call_method(&cart, "count", vec![]), Ok(vec![Value::UInt(1)]));
    }

    #[test]
    fn test_call_mut_mutates_target() {
        let mut cart = Cart::default();
        let result = call_method_mut(&mut cart, "add", vec![item("pen", 2)]).unwrap();

        assert_eq!(result, vec![Value::UInt(1)]);
        assert_eq!(cart.items[0], Item { name: "pen".into(), qty: 2 });
    }

    #[test]
    fn test_mut_method_on_shared_target_uses_copy() {
        let cart = Cart::default();
        let result = call_method(&cart, "add", vec![item("pen", 2)]).unwrap();

        assert_eq!(result, vec![Value::UInt(1)]);
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_mut_method_without_copy_is_not_found() {
        let tally = Tally::default();
        let err = call_method(&tally, "bump", vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(err, InvokeError::MethodNotFound { .. }));

        let mut tally = Tally::default();
        assert_eq!(
            call_method_mut(&mut tally, "bump", vec![Value::Int(5)]),
            Ok(vec![Value::Int(5)])
        );
    }

    #[test]
    fn test_unit_return_is_empty() {
        let mut cart = Cart::default();
        let items = Value::Seq(vec![item("a", 1), item("b", 2)]);
        assert_eq!(call_method_mut(&mut cart, "add_all", vec![items]), Ok(vec![]));
        assert_eq!(cart.items.len(), 2);
    }

    #[test]
    fn test_result_return_packs_error() {
        let cart = Cart {
            items: vec![Item { name: "a".into(), qty: 4 }],
        };

        let found = call_method(&cart, "find", vec![Value::from("a")]).unwrap();
        assert_eq!(found[1], Value::Null);
        assert_eq!(found[0].get("qty"), Some(&Value::UInt(4)));

        let missing = call_method(&cart, "find", vec![Value::from("z")]).unwrap();
        assert_eq!(missing, vec![Value::Null, Value::from("no item named z")]);
    }

    #[test]
    fn test_unknown_and_hidden_methods() {
        let cart = Cart::default();
        for name in ["nope", "hidden", "internal"] {
            assert!(matches!(
                call_method(&cart, name, vec![]),
                Err(InvokeError::MethodNotFound { .. })
            ));
        }
    }

    #[test]
    fn test_arity_mismatch() {
        let cart = Cart::default();
        let err = call_method(&cart, "count", vec![Value::Int(1)]).unwrap_err();
        assert_eq!(
            err,
            InvokeError::ArityMismatch {
                method: "count".into(),
                expected: 0,
                got: 1
            }
        );
    }

    #[test]
    fn test_argument_conversion_failure_reports_index() {
        let mut cart = Cart::default();
        let items = Value::Seq(vec![item("a", 1), Value::Bool(true)]);
        let err = call_method_mut(&mut cart, "add_all", vec![items]).unwrap_err();

        match err {
            InvokeError::ArgumentConversion { index, reason } => {
                assert_eq!(index, 0);
                assert!(matches!(reason, ConvertError::Element { index: 1, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_method_infos() {
        let infos = method_infos::<Cart>();
        let names: Vec<&str> = infos.iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["count", "add", "add_all", "find"]);
        assert_eq!(infos[1].receiver, Receiver::Mut);
        assert_eq!(infos[3].params, vec![crate::TypeInfo::Str]);
    }
}
