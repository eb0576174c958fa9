//! `#[derive(Reflect)]` implementation.
//!
//! Generates three impls for a struct with named fields:
//!
//! 1. `Typed`: a `RecordInfo` whose package is the defining module path
//! 2. `Reflect`: renders the reflected fields into a `Record`
//! 3. `FromValue`: takes each reflected field back out of a record or mapping
//!
//! # Field attributes `#[reflect(...)]`
//!
//! | Key | Description |
//! |-----|-------------|
//! | `private` | Reflects a field that is not `pub` |
//! | `skip` | Excludes the field; it is restored with `Default::default()` |
//! | `rename = "…"` | Name used for the field in records |

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Fields, GenericParam, Generics, Ident, LitStr, Type, Visibility,
    parse_quote, spanned::Spanned,
};

// ============================================================================
// Attribute structures
// ============================================================================

#[derive(Default)]
struct FieldAttrs {
    private: bool,
    skip: bool,
    rename: Option<String>,
}

struct ReflectedField {
    ident: Ident,
    name: LitStr,
    ty: Type,
    public: bool,
}

// ============================================================================
// Entry point
// ============================================================================

pub fn derive_reflect(input: &DeriveInput) -> syn::Result<TokenStream> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "Reflect can only be derived for structs with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Reflect does not support enums",
            ));
        }
        Data::Union(_) => {
            return Err(syn::Error::new(
                input.span(),
                "Reflect cannot be derived for unions",
            ));
        }
    };

    let mut reflected = Vec::new();
    let mut defaulted = Vec::new();

    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let public = matches!(field.vis, Visibility::Public(_));

        if attrs.skip || !(public || attrs.private) {
            defaulted.push(ident);
            continue;
        }

        let name = attrs.rename.unwrap_or_else(|| ident.to_string());
        reflected.push(ReflectedField {
            name: LitStr::new(&name, ident.span()),
            ident,
            ty: field.ty.clone(),
            public,
        });
    }

    Ok(generate(input, &reflected, &defaulted))
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("reflect") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("private") {
                result.private = true;
            } else if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                result.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("expected `private`, `skip` or `rename = \"…\"`"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

// ============================================================================
// Code generation
// ============================================================================

/// Adds `Typed + Reflect + FromValue` bounds to every type parameter.
fn add_bounds(generics: &Generics) -> Generics {
    let mut generics = generics.clone();
    for param in &mut generics.params {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!(::plugify_core::Typed));
            ty.bounds.push(parse_quote!(::plugify_core::Reflect));
            ty.bounds.push(parse_quote!(::plugify_core::FromValue));
        }
    }
    generics
}

fn generate(input: &DeriveInput, reflected: &[ReflectedField], defaulted: &[Ident]) -> TokenStream {
    let name = &input.ident;
    let name_lit = LitStr::new(&name.to_string(), name.span());
    let generics = add_bounds(&input.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let field_infos = reflected.iter().map(|f| {
        let (lit, ty, public) = (&f.name, &f.ty, f.public);
        quote! {
            ::plugify_core::FieldInfo::new(#lit, #public, <#ty as ::plugify_core::Typed>::type_info)
        }
    });

    let to_fields = reflected.iter().map(|f| {
        let (lit, ident) = (&f.name, &f.ident);
        quote! {
            .with_field(#lit, ::plugify_core::Reflect::to_value(&self.#ident))
        }
    });

    let take_fields = reflected.iter().map(|f| {
        let (lit, ident) = (&f.name, &f.ident);
        quote! {
            #ident: ::plugify_core::reflect::take_field(&mut __fields, #lit)?
        }
    });

    let default_fields = defaulted.iter().map(|ident| {
        quote! { #ident: ::core::default::Default::default() }
    });

    quote! {
        impl #impl_generics ::plugify_core::Typed for #name #ty_generics #where_clause {
            fn type_info() -> ::plugify_core::TypeInfo {
                ::plugify_core::TypeInfo::Record(::plugify_core::RecordInfo::new(
                    ::core::module_path!(),
                    #name_lit,
                    ::std::vec![#(#field_infos),*],
                ))
            }
        }

        impl #impl_generics ::plugify_core::Reflect for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::plugify_core::Value {
                ::plugify_core::Value::Record(
                    ::plugify_core::Record::new(::core::module_path!(), #name_lit)
                        #(#to_fields)*
                )
            }
        }

        impl #impl_generics ::plugify_core::FromValue for #name #ty_generics #where_clause {
            #[allow(unused_mut, unused_variables)]
            fn from_value(value: ::plugify_core::Value) -> ::plugify_core::ConvertResult<Self> {
                let mut __fields = ::plugify_core::reflect::record_fields(
                    value,
                    <Self as ::plugify_core::Typed>::type_info,
                )?;
                ::core::result::Result::Ok(Self {
                    #(#take_fields,)*
                    #(#default_fields,)*
                })
            }
        }
    }
}
