//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations.
//!
//! # Usage
//!
//! ```ignore
//! use minicpu_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum CpuError {
//!     #[error("invalid opcode {opcode:#04x} at {ip:#06x}")]
//!     InvalidOpcode { ip: u16, opcode: u8 },
//!
//!     #[error("address {address:#x} out of range")]
//!     AddressOutOfRange { ip: u16, address: i64 },
//! }
//!
//! #[derive(Debug, Error)]
//! pub enum Error {
//!     #[error("{0}")]
//!     Cpu(#[from] CpuError),
//! }
//! ```
//!
//! # Supported Features
//!
//! - Unit variants: `#[error("message")]`
//! - Tuple variants with positional args: `#[error("error: {0}")]`
//! - Struct variants with named args: `#[error("expected {expected}")]`
//! - Fields the message does not mention are simply not formatted
//! - `#[from]` on the only field of a tuple variant generates a `From`
//!   impl and reports the field as the error `source()`

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, Type, parse_macro_input};

/// Derives `Display` and `Error` for an enum or struct.
///
/// Each variant must have an `#[error("...")]` attribute specifying
/// the display message. Supports field interpolation using `{0}`, `{1}`
/// for tuple fields or `{field_name}` for struct fields.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    match &input.data {
        Data::Enum(data_enum) => {
            let mut display_arms = Vec::new();
            let mut source_arms = Vec::new();
            let mut from_impls = Vec::new();

            for variant in &data_enum.variants {
                let variant_name = &variant.ident;
                let error_msg = extract_error_message(variant)?;
                display_arms.push(display_arm(variant_name, &variant.fields, &error_msg));

                if let Some(source_ty) = from_field(&variant.fields)? {
                    source_arms.push(quote! {
                        Self::#variant_name(source) => ::std::option::Option::Some(
                            source as &(dyn ::std::error::Error + 'static)
                        ),
                    });
                    from_impls.push(quote! {
                        impl #impl_generics ::std::convert::From<#source_ty> for #name #ty_generics #where_clause {
                            fn from(source: #source_ty) -> Self {
                                Self::#variant_name(source)
                            }
                        }
                    });
                }
            }

            let source_fn = if source_arms.is_empty() {
                quote! {}
            } else {
                quote! {
                    fn source(&self) -> ::std::option::Option<&(dyn ::std::error::Error + 'static)> {
                        #[allow(unreachable_patterns)]
                        match self {
                            #(#source_arms)*
                            _ => ::std::option::Option::None,
                        }
                    }
                }
            };

            Ok(quote! {
                impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
                    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                        match self {
                            #(#display_arms)*
                        }
                    }
                }

                impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {
                    #source_fn
                }

                #(#from_impls)*
            })
        }
        Data::Struct(data_struct) => {
            let error_msg = extract_error_message_from_attrs(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;

            let display_body = match &data_struct.fields {
                Fields::Unit => quote! { write!(f, #error_msg) },
                Fields::Named(fields) => {
                    let used: Vec<_> = fields
                        .named
                        .iter()
                        .filter_map(|field| field.ident.as_ref())
                        .filter(|ident| mentions(&error_msg, &ident.to_string()))
                        .collect();
                    quote! {
                        write!(f, #error_msg, #(#used = self.#used),*)
                    }
                }
                Fields::Unnamed(fields) => {
                    let format_str = convert_positional_to_named(&error_msg, fields.unnamed.len());
                    let (idents, indices): (Vec<_>, Vec<_>) = (0..fields.unnamed.len())
                        .filter(|i| mentions(&format_str, &format!("f{i}")))
                        .map(|i| (format_ident!("f{}", i), syn::Index::from(i)))
                        .unzip();
                    quote! {
                        write!(f, #format_str, #(#idents = self.#indices),*)
                    }
                }
            };

            Ok(quote! {
                impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
                    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                        #display_body
                    }
                }

                impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
            })
        }
        Data::Union(_) => Err(syn::Error::new_spanned(
            input,
            "Error derive does not support unions",
        )),
    }
}

/// Builds the `Display` match arm for one enum variant.
fn display_arm(variant_name: &syn::Ident, fields: &Fields, error_msg: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {
            Self::#variant_name => write!(f, #error_msg),
        },
        Fields::Unnamed(fields) => {
            let format_str = convert_positional_to_named(error_msg, fields.unnamed.len());
            let bindings: Vec<_> = (0..fields.unnamed.len())
                .map(|i| {
                    if mentions(&format_str, &format!("f{i}")) {
                        format_ident!("f{}", i).into_token_stream()
                    } else {
                        quote! { _ }
                    }
                })
                .collect();
            let used: Vec<_> = (0..fields.unnamed.len())
                .filter(|i| mentions(&format_str, &format!("f{i}")))
                .map(|i| format_ident!("f{}", i))
                .collect();
            quote! {
                Self::#variant_name(#(#bindings),*) => write!(f, #format_str, #(#used = #used),*),
            }
        }
        Fields::Named(fields) => {
            let used: Vec<_> = fields
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| mentions(error_msg, &ident.to_string()))
                .collect();
            quote! {
                Self::#variant_name { #(#used,)* .. } => write!(f, #error_msg, #(#used = #used),*),
            }
        }
    }
}

/// Returns the field type of a `Variant(#[from] T)` variant.
fn from_field(fields: &Fields) -> syn::Result<Option<&Type>> {
    let marked = |field: &syn::Field| field.attrs.iter().any(|a| a.path().is_ident("from"));
    match fields {
        Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            let field = &unnamed.unnamed[0];
            Ok(marked(field).then_some(&field.ty))
        }
        Fields::Unnamed(unnamed) => match unnamed.unnamed.iter().find(|f| marked(f)) {
            Some(field) => Err(syn::Error::new_spanned(
                field,
                "#[from] is only supported on single-field tuple variants",
            )),
            None => Ok(None),
        },
        Fields::Named(named) => match named.named.iter().find(|f| marked(f)) {
            Some(field) => Err(syn::Error::new_spanned(
                field,
                "#[from] is only supported on single-field tuple variants",
            )),
            None => Ok(None),
        },
        Fields::Unit => Ok(None),
    }
}

/// Extracts the error message from a variant's `#[error("...")]` attribute.
fn extract_error_message(variant: &syn::Variant) -> syn::Result<String> {
    extract_error_message_from_attrs(
        &variant.attrs,
        &variant.ident,
        &format!("variant `{}`", variant.ident),
    )
}

/// Extracts the error message from attributes.
fn extract_error_message_from_attrs<T: ToTokens>(
    attrs: &[syn::Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    for attr in attrs {
        if !attr.path().is_ident("error") {
            continue;
        }
        let Meta::List(meta_list) = &attr.meta else {
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")] to describe the error",
            ));
        };
        let lit = syn::parse2::<Lit>(meta_list.tokens.clone()).map_err(|_| {
            syn::Error::new_spanned(
                &attr.meta,
                "failed to parse #[error] attribute; expected a string literal like #[error(\"invalid opcode: {0}\")]",
            )
        })?;
        return match lit {
            Lit::Str(lit_str) => Ok(lit_str.value()),
            _ => Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute: message must be a string literal",
            )),
        };
    }

    Err(syn::Error::new_spanned(
        target,
        format!("missing #[error(\"...\")] attribute on {target_desc}"),
    ))
}

/// Whether the format string interpolates `name` (`{name}` or `{name:...}`).
fn mentions(format_str: &str, name: &str) -> bool {
    format_str.contains(&format!("{{{name}}}")) || format_str.contains(&format!("{{{name}:"))
}

/// Converts positional format args `{0}`, `{1:x}` to named args `{f0}`, `{f1:x}`.
fn convert_positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    result
}
