//! Procedural macros for gc-core's tracing interface.
//!
//! # Macros provided
//!
//! - `#[derive(Trace)]` — auto-generate `Trace` for structs and enums whose
//!   fields are themselves traceable (gc ids, `Option<T: Trace>`, `Vec<T: Trace>`,
//!   or plain data that needs no tracing).
//!
//! # Architecture
//!
//! - `derive_trace.rs` — `#[derive(Trace)]` implementation

mod derive_trace;

use proc_macro::TokenStream;
use syn::parse_macro_input;

/// Derive `Trace` for a struct or enum embedded in a host userdata payload.
///
/// Every field is visited in declaration order unless annotated `#[trace(skip)]`.
/// Skip fields that hold no outbound GC references (primitive data, `PhantomData`, etc.) —
/// visiting them would be a no-op anyway, but skipping documents the intent and avoids
/// requiring a `Trace` bound on their type.
///
/// # Example
/// ```ignore
/// #[derive(Trace)]
/// struct Node {
///     value: GcId,
///     children: Vec<GcId>,
///     #[trace(skip)]
///     label: String,
/// }
/// ```
#[proc_macro_derive(Trace, attributes(trace))]
pub fn derive_trace(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    derive_trace::derive_trace_impl(input)
}
