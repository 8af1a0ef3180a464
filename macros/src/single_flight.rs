use super::*;

/// Wrap a function's body in a per-function single-flight executor.
pub fn expand(mut func: syn::ItemFn) -> Result<proc_macro2::TokenStream> {
    if let Some(param) = func.sig.generics.params.first() {
        bail!(param, "generic functions are not supported")
    }

    if let Some(asyncness) = &func.sig.asyncness {
        bail!(asyncness, "async functions are not supported")
    }

    let mut args = vec![];
    let mut types = vec![];
    for input in &func.sig.inputs {
        let typed = match input {
            syn::FnArg::Typed(typed) => typed,
            syn::FnArg::Receiver(_) => {
                bail!(input, "methods are not supported")
            }
        };

        let name = match typed.pat.as_ref() {
            syn::Pat::Ident(syn::PatIdent {
                by_ref: None,
                mutability: None,
                ident,
                subpat: None,
                ..
            }) => ident,
            pat => bail!(pat, "only simple identifiers are supported"),
        };

        args.push(name);
        types.push(typed.ty.as_ref());
    }

    let output: syn::Type = match &func.sig.output {
        syn::ReturnType::Default => parse_quote! { () },
        syn::ReturnType::Type(_, ty) => ty.as_ref().clone(),
    };

    // The key is the tuple of all arguments.
    let key = quote! { (#(#args,)*) };
    let key_type = quote! { (#(#types,)*) };

    // Construct assertions that the types fulfill the necessary bounds.
    let bounds = types.iter().map(|ty| {
        quote! {
            ::flightcache::internal::assert_key::<#ty>();
        }
    });

    // The original body becomes a closure over the destructured key.
    let body = &func.block;
    func.block = parse_quote! { {
        #(#bounds)*
        ::flightcache::internal::assert_output::<#output>();

        static EXECUTOR: ::flightcache::Executor<#key_type, #output> =
            ::flightcache::Executor::new();

        let __flightcache_body = |#key: #key_type| -> #output #body;
        ::flightcache::internal::unwrap_infallible(EXECUTOR.evaluate(
            #key,
            |key| Ok(__flightcache_body(::std::clone::Clone::clone(key))),
        ))
    } };

    Ok(quote! { #func })
}
