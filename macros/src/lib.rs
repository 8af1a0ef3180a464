extern crate proc_macro;

macro_rules! bail {
    ($item:expr, $fmt:literal $($tts:tt)*) => {
        return Err(Error::new_spanned(
            &$item,
            format!(concat!("flightcache: ", $fmt) $($tts)*)
        ))
    }
}

mod single_flight;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_quote, Error, Result};

/// Turn a pure function into a single-flight memoized one.
///
/// All arguments together form the key. Concurrent calls with equal
/// arguments share one execution of the body, and later calls are served
/// from a cache that lives for the rest of the program.
///
/// Argument types must be `Clone + Hash + Eq + Send + Sync + 'static` and the
/// return type `Clone + Send + Sync + 'static`. A `Result` return type is
/// cached like any other value, errors included.
///
/// ```ignore
/// #[single_flight]
/// fn fib(n: u64) -> u64 {
///     if n <= 1 { n } else { fib(n - 1) + fib(n - 2) }
/// }
/// ```
#[proc_macro_attribute]
pub fn single_flight(_: TokenStream, stream: TokenStream) -> TokenStream {
    let func = syn::parse_macro_input!(stream as syn::ItemFn);
    single_flight::expand(func)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
