//! Derive macros for tarpit
//!
//! - `#[derive(TpService)]` - Implement `tarpit::Component` for a service
//!   struct whose dependencies are its annotated fields
//!
//! # Example
//!
//! ```rust,ignore
//! use tarpit::TpService;
//! use std::sync::Arc;
//!
//! #[derive(TpService)]
//! struct UserService {
//!     #[inject]
//!     db: Arc<Database>,
//!     #[inject(optional)]
//!     cache: Option<Arc<Cache>>,
//!     #[inject(token = "greeting")]
//!     greeting: Arc<String>,
//!     // Fields without #[inject] use Default
//!     request_count: u64,
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Type, parse_macro_input};

/// Derive `tarpit::Component` for a service.
///
/// # Field attributes
///
/// - `#[inject]` - Required dependency on `T`. The field must be `Arc<T>`.
/// - `#[inject(optional)]` - Optional dependency. The field must be `Option<Arc<T>>`.
/// - `#[inject(token = "name")]` - Look up a string token instead of the type.
///   Combines with `optional`.
///
/// # Container attributes
///
/// - `#[tp(inject_root)]` - Register in the root injector.
/// - `#[tp(name = "Name")]` - Display name used in diagnostics.
#[proc_macro_derive(TpService, attributes(inject, tp))]
pub fn derive_tp_service(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input).unwrap_or_else(|err| err.to_compile_error()).into()
}

struct InjectAttr {
    optional: bool,
    token: Option<LitStr>,
}

#[derive(Default)]
struct ServiceAttr {
    inject_root: bool,
    name: Option<LitStr>,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let empty = syn::punctuated::Punctuated::new();
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => &empty,
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "TpService can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(input, "TpService can only be derived for structs"));
        }
    };

    let service = parse_service_attr(&input.attrs)?;
    let mut deps = Vec::new();
    let mut field_inits = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;

        let Some(inject) = parse_inject_attr(&field.attrs)? else {
            field_inits.push(quote! {
                #field_name: ::std::default::Default::default()
            });
            continue;
        };

        let index = deps.len();
        let inner = if inject.optional {
            extract_option_arc_inner_type(field_type).ok_or_else(|| {
                syn::Error::new_spanned(
                    field_type,
                    "Fields marked with #[inject(optional)] must have type Option<Arc<T>>",
                )
            })?
        } else {
            extract_arc_inner_type(field_type).ok_or_else(|| {
                syn::Error::new_spanned(
                    field_type,
                    "Fields marked with #[inject] must have type Arc<T>",
                )
            })?
        };

        let mut dep = quote! { ::tarpit::Dep::on::<#inner>() };
        if let Some(token) = &inject.token {
            dep = quote! { #dep.inject(#token) };
        }
        if inject.optional {
            dep = quote! { #dep.optional() };
            field_inits.push(quote! { #field_name: args.optional::<#inner>(#index)? });
        } else {
            field_inits.push(quote! { #field_name: args.get::<#inner>(#index)? });
        }
        deps.push(dep);
    }

    let mut meta = quote! { ::tarpit::ComponentMeta::service() };
    if service.inject_root {
        meta = quote! { #meta.inject_root() };
    }
    if let Some(display) = &service.name {
        meta = quote! { #meta.named(#display) };
    }

    Ok(quote! {
        impl #impl_generics ::tarpit::Component for #name #ty_generics #where_clause {
            fn meta() -> ::tarpit::ComponentMeta {
                #meta
            }

            fn dependencies() -> ::std::vec::Vec<::tarpit::Dep> {
                ::std::vec![#(#deps),*]
            }

            fn construct(args: &::tarpit::Args) -> ::tarpit::Result<Self> {
                let _ = args;
                Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    })
}

fn parse_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectAttr>> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("inject")) else {
        return Ok(None);
    };
    let mut inject = InjectAttr {
        optional: false,
        token: None,
    };
    if attr.meta.require_path_only().is_ok() {
        return Ok(Some(inject));
    }
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("optional") {
            inject.optional = true;
            Ok(())
        } else if meta.path.is_ident("token") {
            inject.token = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("expected `optional` or `token = \"...\"`"))
        }
    })?;
    Ok(Some(inject))
}

fn parse_service_attr(attrs: &[Attribute]) -> syn::Result<ServiceAttr> {
    let mut service = ServiceAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("tp")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("inject_root") {
                service.inject_root = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                service.name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `inject_root` or `name = \"...\"`"))
            }
        })?;
    }
    Ok(service)
}

/// Extract T from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    generic_argument(ty, "Arc")
}

/// Extract T from Option<Arc<T>>
fn extract_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    generic_argument(ty, "Option").and_then(extract_arc_inner_type)
}

fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(syn::GenericArgument::Type(inner)) => Some(inner),
        _ => None,
    }
}
