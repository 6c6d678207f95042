//! Derive macros generating the repetitive trait glue for the DP engine's
//! newtype index wrappers (`ModelPos`, `SeqPos`, `RowIdx`, ...).
//!
//! All of these types are `struct Foo(usize);` tuple structs; rather than
//! hand-write `Display`, `From<usize>`, and saturating `+`/`-` for every one
//! of them, `#[derive(DpIndex)]` generates them once. This is the same
//! division of labour as a genomic-coordinate derive crate: the struct
//! carries the data, the derive macro carries the boilerplate that every
//! such struct needs identically.
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derive `Display`, `From<usize>`/`From<Self> for usize`, `PartialEq<usize>`,
/// and saturating `Add<usize>`/`Sub<usize>` for a `struct Name(usize);`
/// newtype.
///
/// # Panics (macro expansion time)
/// Expansion panics (as a compile error) if applied to anything other than a
/// single-field tuple struct.
#[proc_macro_derive(DpIndex)]
pub fn derive_dp_index(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let is_single_tuple_field = matches!(
        &input.data,
        Data::Struct(data) if matches!(&data.fields, Fields::Unnamed(f) if f.unnamed.len() == 1)
    );
    if !is_single_tuple_field {
        return syn::Error::new_spanned(&input, "DpIndex can only be derived for a single-field tuple struct, e.g. `struct Foo(usize);`")
            .to_compile_error()
            .into();
    }

    let expanded = quote! {
        impl ::core::fmt::Display for #name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::convert::From<usize> for #name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }

        impl ::core::convert::From<#name> for usize {
            fn from(value: #name) -> Self {
                value.0
            }
        }

        impl #name {
            /// The wrapped zero-based index.
            #[must_use]
            pub const fn get(&self) -> usize {
                self.0
            }

            /// `self + rhs`, saturating at `usize::MAX` rather than overflowing.
            #[must_use]
            pub const fn saturating_add(&self, rhs: usize) -> Self {
                Self(self.0.saturating_add(rhs))
            }

            /// `self - rhs`, saturating at `0` rather than underflowing.
            #[must_use]
            pub const fn saturating_sub(&self, rhs: usize) -> Self {
                Self(self.0.saturating_sub(rhs))
            }
        }

        impl ::core::ops::Add<usize> for #name {
            type Output = Self;
            fn add(self, rhs: usize) -> Self {
                self.saturating_add(rhs)
            }
        }

        impl ::core::ops::Sub<usize> for #name {
            type Output = Self;
            fn sub(self, rhs: usize) -> Self {
                self.saturating_sub(rhs)
            }
        }

        impl ::core::cmp::PartialEq<usize> for #name {
            fn eq(&self, other: &usize) -> bool {
                self.0 == *other
            }
        }
    };
    expanded.into()
}
