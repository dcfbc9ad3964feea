//! Derive macro for `armature_di::Inject`.
//!
//! Generates an `Inject::construct` impl that calls the right
//! [`armature_di::ResolveContext`] method for each field, decided once
//! here at expansion time instead of re-discovered by the resolver on
//! every call (see `SPEC_FULL.md` §10, "Rust translation decisions").
//!
//! # Attributes
//!
//! - `#[inject]` — required dependency, field type `Arc<T>`.
//! - `#[inject(optional)]` — field type `Option<Arc<T>>`.
//! - `#[inject(name = "...")]` — resolve under a named qualifier.
//! - `#[inject(provider)]` — field type `ProviderOf<T>`; defers
//!   resolution, the sanctioned way to break an interface-typed
//!   construction cycle.
//! - `#[inject(constant)]` — field type `Arc<T>` where `T: FromConstant`;
//!   resolves a string-constant binding instead of a constructed value.
//! - No attribute — the field uses `Default::default()`.
//!
//! ```rust,ignore
//! use armature_di::Inject;
//! use std::sync::Arc;
//!
//! #[derive(Inject)]
//! struct UserService {
//!     #[inject]
//!     db: Arc<Database>,
//!     #[inject(optional)]
//!     cache: Option<Arc<Cache>>,
//!     #[inject(name = "readonly")]
//!     replica: Arc<Database>,
//!     #[inject(constant)]
//!     max_connections: Arc<u32>,
//!     request_count: u64,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Type};

#[derive(Default)]
struct InjectSpec {
    present: bool,
    optional: bool,
    provider: bool,
    constant: bool,
    name: Option<String>,
}

fn parse_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectSpec>> {
    for attr in attrs {
        if !attr.path().is_ident("inject") {
            continue;
        }

        let mut spec = InjectSpec {
            present: true,
            ..Default::default()
        };

        if attr.meta.require_path_only().is_ok() {
            return Ok(Some(spec));
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("optional") {
                spec.optional = true;
                Ok(())
            } else if meta.path.is_ident("provider") {
                spec.provider = true;
                Ok(())
            } else if meta.path.is_ident("constant") {
                spec.constant = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                let value: syn::LitStr = meta.value()?.parse()?;
                spec.name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unrecognized #[inject(...)] key"))
            }
        })?;

        return Ok(Some(spec));
    }
    Ok(None)
}

/// `T` out of `Arc<T>`.
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_generic_inner(ty, "Arc")
}

/// `T` out of `Option<Arc<T>>`.
fn extract_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    extract_generic_inner(ty, "Option").and_then(extract_arc_inner_type)
}

/// `T` out of `ProviderOf<T>`.
fn extract_provider_of_inner_type(ty: &Type) -> Option<&Type> {
    extract_generic_inner(ty, "ProviderOf")
}

fn extract_generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == wrapper {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

#[proc_macro_derive(Inject, attributes(inject))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(&input, "Inject can only be derived for structs with named fields")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input, "Inject can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let mut field_inits: Vec<TokenStream2> = Vec::new();
    let mut dependency_specs: Vec<TokenStream2> = Vec::new();

    for field in fields.iter() {
        let field_name = field.ident.as_ref().unwrap();
        let field_type = &field.ty;

        let spec = match parse_inject_attr(&field.attrs) {
            Ok(spec) => spec,
            Err(err) => return err.to_compile_error().into(),
        };

        let Some(spec) = spec else {
            field_inits.push(quote! { #field_name: ::std::default::Default::default() });
            continue;
        };

        if spec.provider {
            let Some(inner) = extract_provider_of_inner_type(field_type) else {
                return syn::Error::new_spanned(field_type, "fields marked #[inject(provider)] must have type ProviderOf<T>")
                    .to_compile_error()
                    .into();
            };
            field_inits.push(quote! { #field_name: ctx.resolve_provider::<#inner>() });
            dependency_specs.push(quote! {
                ::armature_di::plan::DependencySpec {
                    key: ::armature_di::Key::of::<#inner>(),
                    optional: true,
                    dependencies: ::std::option::Option::None,
                }
            });
            continue;
        }

        let inner: &Type = if spec.optional {
            match extract_option_arc_inner_type(field_type) {
                Some(inner) => inner,
                None => {
                    return syn::Error::new_spanned(field_type, "fields marked #[inject(optional)] must have type Option<Arc<T>>")
                        .to_compile_error()
                        .into();
                }
            }
        } else {
            match extract_arc_inner_type(field_type) {
                Some(inner) => inner,
                None => {
                    return syn::Error::new_spanned(field_type, "fields marked #[inject] must have type Arc<T>")
                        .to_compile_error()
                        .into();
                }
            }
        };

        let field_name_str = field_name.to_string();

        let resolve_call = match (&spec.name, spec.optional, spec.constant) {
            (Some(name), false, true) => quote! { ctx.resolve_constant_named::<#inner>(#name, #field_name_str)? },
            (None, false, true) => quote! { ctx.resolve_constant::<#inner>(#field_name_str)? },
            (Some(name), true, _) => quote! { ctx.resolve_optional_named::<#inner>(#name)? },
            (None, true, _) => quote! { ctx.resolve_optional::<#inner>()? },
            (Some(name), false, false) => quote! { ctx.resolve_named::<#inner>(#name)? },
            (None, false, false) => quote! { ctx.resolve::<#inner>()? },
        };

        field_inits.push(quote! { #field_name: #resolve_call });

        let key_expr = match &spec.name {
            Some(name) => quote! { ::armature_di::Key::named::<#inner>(#name) },
            None => quote! { ::armature_di::Key::of::<#inner>() },
        };
        let optional = spec.optional;
        let nested_dependencies = if spec.constant {
            quote! { ::std::option::Option::None }
        } else {
            quote! { ::std::option::Option::Some(<#inner as ::armature_di::plan::Inject>::dependencies) }
        };
        dependency_specs.push(quote! {
            ::armature_di::plan::DependencySpec {
                key: #key_expr,
                optional: #optional,
                dependencies: #nested_dependencies,
            }
        });
    }

    let expanded = quote! {
        impl #impl_generics ::armature_di::plan::Inject for #name #ty_generics #where_clause {
            fn dependencies() -> ::std::vec::Vec<::armature_di::plan::DependencySpec> {
                vec![#(#dependency_specs),*]
            }

            fn construct(ctx: &::armature_di::plan::ResolveContext<'_>) -> ::armature_di::Result<Self> {
                Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    };

    TokenStream::from(expanded)
}
