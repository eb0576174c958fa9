//! `#[reflect_methods]` implementation.
//!
//! Keeps the annotated `impl` block as written (minus `#[reflect(...)]`
//! markers) and appends an `impl Methods` whose table holds one thunk per
//! eligible method. A thunk takes its arguments out of `Args` by position,
//! calls the method and packs the return value into a `Vec<Value>`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, FnArg, GenericArgument, ImplItem, ImplItemFn, ItemImpl, LitStr, PathArguments,
    ReturnType, Type, TypeReference, Visibility, meta::ParseNestedMeta, parse_quote,
    spanned::Spanned,
};

// ─── Options ──────────────────────────────────────────────────────────────────

/// Arguments of `#[reflect_methods(...)]`.
#[derive(Default)]
pub struct Options {
    clone: bool,
}

impl Options {
    pub fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("clone") {
            self.clone = true;
            Ok(())
        } else {
            Err(meta.error("expected `clone`"))
        }
    }
}

#[derive(Default)]
struct MethodAttrs {
    skip: bool,
    rename: Option<String>,
}

/// How a parameter is taken from `Args` and handed to the method.
struct Param {
    owned: Type,
    borrow: Option<TypeReference>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

pub fn reflect_methods(mut item: ItemImpl, options: &Options) -> syn::Result<TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new(
            path.span(),
            "#[reflect_methods] only applies to inherent impl blocks",
        ));
    }

    let mut entries = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        let attrs = take_method_attrs(&mut method.attrs)?;
        if attrs.skip || !is_eligible(method) {
            continue;
        }
        if let Some(entry) = generate_entry(method, attrs.rename)? {
            entries.push(entry);
        }
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    let clone_impl = options.clone.then(|| {
        quote! {
            fn clone_for_call(&self) -> ::core::option::Option<Self> {
                ::core::option::Option::Some(::core::clone::Clone::clone(self))
            }
        }
    });

    Ok(quote! {
        #item

        impl #impl_generics ::plugify_core::Methods for #self_ty #where_clause {
            fn method_table() -> ::std::vec::Vec<::plugify_core::Method<Self>> {
                ::std::vec![#(#entries),*]
            }

            #clone_impl
        }
    })
}

// ─── Method selection ─────────────────────────────────────────────────────────

/// Removes `#[reflect(...)]` markers from a method and returns their content.
fn take_method_attrs(attrs: &mut Vec<Attribute>) -> syn::Result<MethodAttrs> {
    let mut result = MethodAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("reflect")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                result.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("expected `skip` or `rename = \"…\"`"));
            }
            Ok(())
        })?;
    }
    attrs.retain(|a| !a.path().is_ident("reflect"));
    Ok(result)
}

/// Public, synchronous, non-generic, safe methods with a reference receiver.
fn is_eligible(method: &ImplItemFn) -> bool {
    let sig = &method.sig;
    let by_reference = matches!(
        sig.inputs.first(),
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some()
    );
    matches!(method.vis, Visibility::Public(_))
        && sig.asyncness.is_none()
        && sig.unsafety.is_none()
        && sig.variadic.is_none()
        && sig.generics.type_params().next().is_none()
        && sig.generics.const_params().next().is_none()
        && by_reference
}

fn receiver_is_mut(method: &ImplItemFn) -> bool {
    matches!(
        method.sig.inputs.first(),
        Some(FnArg::Receiver(receiver)) if receiver.mutability.is_some()
    )
}

// ─── Parameters ───────────────────────────────────────────────────────────────

/// Returns `None` for parameter types that have no owned counterpart.
fn param(ty: &Type) -> Option<Param> {
    match ty {
        Type::ImplTrait(_) | Type::TraitObject(_) | Type::BareFn(_) | Type::Infer(_) => None,
        Type::Reference(reference) => {
            let owned: Type = match &*reference.elem {
                Type::Path(path) if path.path.is_ident("str") => parse_quote!(::std::string::String),
                Type::Slice(slice) => {
                    let elem = &slice.elem;
                    parse_quote!(::std::vec::Vec<#elem>)
                }
                Type::Reference(_) | Type::ImplTrait(_) | Type::TraitObject(_) => return None,
                elem => elem.clone(),
            };
            Some(Param {
                owned,
                borrow: Some(reference.clone()),
            })
        }
        Type::Paren(inner) => param(&inner.elem),
        other => Some(Param {
            owned: other.clone(),
            borrow: None,
        }),
    }
}

// ─── Return packing ───────────────────────────────────────────────────────────

fn is_unit(output: &ReturnType) -> bool {
    match output {
        ReturnType::Default => true,
        ReturnType::Type(_, ty) => matches!(&**ty, Type::Tuple(tuple) if tuple.elems.is_empty()),
    }
}

/// `Result<T, E>` (or a `Result<T>` alias) is recognised by the last path segment.
fn is_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(path) = &**ty else {
        return false;
    };
    path.path.segments.last().is_some_and(|segment| {
        segment.ident == "Result"
            && matches!(
                &segment.arguments,
                PathArguments::AngleBracketed(args)
                    if args.args.iter().any(|a| matches!(a, GenericArgument::Type(_)))
            )
    })
}

// ─── Code generation ──────────────────────────────────────────────────────────

fn generate_entry(method: &ImplItemFn, rename: Option<String>) -> syn::Result<Option<TokenStream>> {
    let ident = &method.sig.ident;
    let name = LitStr::new(&rename.unwrap_or_else(|| ident.to_string()), ident.span());

    let mut params = Vec::new();
    for input in method.sig.inputs.iter().skip(1) {
        let FnArg::Typed(pat_type) = input else {
            return Err(syn::Error::new(input.span(), "unexpected receiver"));
        };
        match param(&pat_type.ty) {
            Some(p) => params.push(p),
            None => return Ok(None),
        }
    }

    let owned: Vec<&Type> = params.iter().map(|p| &p.owned).collect();
    let bindings: Vec<_> = (0..params.len()).map(|i| format_ident!("__a{}", i)).collect();
    let indices = 0..params.len();
    let passed = params.iter().zip(&bindings).map(|(p, binding)| match &p.borrow {
        Some(reference) if reference.mutability.is_some() => quote!(&mut #binding),
        Some(_) => quote!(&#binding),
        None => quote!(#binding),
    });
    let mut_bindings = params.iter().map(|p| {
        p.borrow
            .as_ref()
            .and_then(|r| r.mutability)
            .map(|_| quote!(mut))
    });
    let args_binding = if params.is_empty() {
        quote!(_)
    } else {
        quote!(mut __args)
    };

    let call = quote!(__this.#ident(#(#passed),*));
    let body = if is_unit(&method.sig.output) {
        quote! {
            #call;
            ::core::result::Result::Ok(::std::vec::Vec::new())
        }
    } else if is_result(&method.sig.output) {
        quote! {
            ::core::result::Result::Ok(match #call {
                ::core::result::Result::Ok(__value) => ::std::vec![
                    ::plugify_core::Reflect::to_value(&__value),
                    ::plugify_core::Value::Null,
                ],
                ::core::result::Result::Err(__error) => ::std::vec![
                    ::plugify_core::Value::Null,
                    ::plugify_core::Value::Str(::std::string::ToString::to_string(&__error)),
                ],
            })
        }
    } else {
        quote! {
            let __ret = #call;
            ::core::result::Result::Ok(::std::vec![::plugify_core::Reflect::to_value(&__ret)])
        }
    };

    let (constructor, receiver) = if receiver_is_mut(method) {
        (quote!(by_mut), quote!(&mut Self))
    } else {
        (quote!(by_ref), quote!(&Self))
    };

    Ok(Some(quote! {
        ::plugify_core::Method::#constructor(
            #name,
            || ::std::vec![#(<#owned as ::plugify_core::Typed>::type_info()),*],
            |__this: #receiver, #args_binding: ::plugify_core::Args| {
                #(let #mut_bindings #bindings: #owned = __args.take(#indices)?;)*
                #body
            },
        )
    }))
}
