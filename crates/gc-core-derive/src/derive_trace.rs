//! `#[derive(Trace)]` — auto-generate `gc_core::Trace` for Rust structs/enums.
//!
//! Visits every field in declaration order, calling `gc_core::Trace::trace` on it.
//! `#[trace(skip)]` excludes a field entirely (no bound required on its type).

use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Index};

fn has_skip_attr(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("trace")
            && attr
                .meta
                .require_list()
                .map(|list| {
                    let mut skip = false;
                    let _ = list.parse_nested_meta(|meta| {
                        if meta.path.is_ident("skip") {
                            skip = true;
                        }
                        Ok(())
                    });
                    skip
                })
                .unwrap_or(false)
    })
}

pub fn derive_trace_impl(input: DeriveInput) -> TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                let visits = fields.named.iter().filter(|f| !has_skip_attr(&f.attrs)).map(|f| {
                    let ident = f.ident.as_ref().unwrap();
                    quote! { gc_core::Trace::trace(&self.#ident, visitor); }
                });
                quote! { #(#visits)* }
            }
            Fields::Unnamed(fields) => {
                let visits = fields.unnamed.iter().enumerate().filter(|(_, f)| !has_skip_attr(&f.attrs)).map(
                    |(i, _)| {
                        let idx = Index::from(i);
                        quote! { gc_core::Trace::trace(&self.#idx, visitor); }
                    },
                );
                quote! { #(#visits)* }
            }
            Fields::Unit => quote! {},
        },
        Data::Enum(data) => {
            let arms = data.variants.iter().map(|variant| {
                let vident = &variant.ident;
                match &variant.fields {
                    Fields::Named(fields) => {
                        let names: Vec<_> = fields
                            .named
                            .iter()
                            .map(|f| f.ident.clone().unwrap())
                            .collect();
                        let skips: Vec<_> = fields.named.iter().map(|f| has_skip_attr(&f.attrs)).collect();
                        let visits = names.iter().zip(skips.iter()).filter(|(_, skip)| !**skip).map(|(n, _)| {
                            quote! { gc_core::Trace::trace(#n, visitor); }
                        });
                        quote! { Self::#vident { #(#names),* } => { #(#visits)* } }
                    }
                    Fields::Unnamed(fields) => {
                        let bindings: Vec<_> = (0..fields.unnamed.len())
                            .map(|i| syn::Ident::new(&format!("f{i}"), vident.span()))
                            .collect();
                        let skips: Vec<_> = fields.unnamed.iter().map(|f| has_skip_attr(&f.attrs)).collect();
                        let visits =
                            bindings.iter().zip(skips.iter()).filter(|(_, skip)| !**skip).map(|(b, _)| {
                                quote! { gc_core::Trace::trace(#b, visitor); }
                            });
                        quote! { Self::#vident( #(#bindings),* ) => { #(#visits)* } }
                    }
                    Fields::Unit => quote! { Self::#vident => {} },
                }
            });
            quote! {
                match self {
                    #(#arms),*
                }
            }
        }
        Data::Union(_) => {
            return syn::Error::new_spanned(&input.ident, "Trace cannot be derived for unions")
                .to_compile_error()
                .into();
        }
    };

    let expanded = quote! {
        impl #impl_generics gc_core::Trace for #name #ty_generics #where_clause {
            fn trace(&self, visitor: &mut dyn gc_core::Visitor) {
                #body
            }
        }
    };

    expanded.into()
}
