//! Derive macros for the minicpu crate.
//!
//! Provides:
//! - `#[derive(Error)]` - `Display`, `Error` and `From` boilerplate for error enums

mod error;

use proc_macro::TokenStream;

/// Automatically implements `Display` and `Error` (plus `From` for `#[from]` fields).
#[proc_macro_derive(Error, attributes(error, from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
