//! Procedural macros for Plugify reflection.
//!
//! This crate provides:
//!
//! - `#[derive(Reflect)]` - Generates `Typed`, `Reflect` and `FromValue` for records
//! - `#[reflect_methods]` - Generates a `Methods` table for an inherent `impl` block
//!
//! Generated code refers to `::plugify_core`, so the crate using the macros
//! must depend on `plugify-core` directly.
//!
//! # Reflect Derive Macro
//!
//! ```rust,ignore
//! use plugify_core::Reflect;
//!
//! #[derive(Debug, Default, Reflect)]
//! pub struct Book {
//!     pub title: String,
//!     #[reflect(rename = "pageCount")]
//!     pub pages: u32,
//!     #[reflect(private)]
//!     isbn: String,
//!     #[reflect(skip)]
//!     pub cached: Option<String>,
//! }
//! ```
//!
//! # Method Tables
//!
//! ```rust,ignore
//! use plugify_core::reflect_methods;
//!
//! #[reflect_methods(clone)]
//! impl Book {
//!     pub fn title(&self) -> &str { &self.title }
//!     pub fn rename(&mut self, title: &str) { self.title = title.into(); }
//!
//!     #[reflect(skip)]
//!     pub fn not_exposed(&self) {}
//! }
//! ```

mod methods;
mod reflect;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemImpl, parse_macro_input};

/// Derives `Typed`, `Reflect` and `FromValue` for a struct with named fields.
///
/// Public fields are reflected; private fields only with `#[reflect(private)]`.
/// Fields that are not reflected are restored with `Default::default()` when
/// the struct is materialised from a value.
///
/// # Field Attributes
///
/// - `#[reflect(private)]` - Reflect a non-public field
/// - `#[reflect(skip)]` - Never reflect the field
/// - `#[reflect(rename = "...")]` - Use another name in the record
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match reflect::derive_reflect(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Generates a `Methods` implementation for an inherent `impl` block.
///
/// Every `pub` method taking `&self` or `&mut self` is registered, except
/// async methods, generic methods and methods marked `#[reflect(skip)]`.
/// Reference parameters are accepted in owned form (`&str` as `String`,
/// `&[T]` as `Vec<T>`) and passed on by reference.
///
/// `#[reflect_methods(clone)]` also implements `clone_for_call` through
/// `Clone`, which lets `&mut self` methods run on a shared target.
#[proc_macro_attribute]
pub fn reflect_methods(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut options = methods::Options::default();
    let parser = syn::meta::parser(|meta| options.parse(meta));
    parse_macro_input!(args with parser);

    let item = parse_macro_input!(input as ItemImpl);

    match methods::reflect_methods(item, &options) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
