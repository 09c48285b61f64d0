use proc_macro::TokenStream;
use quote::{quote, quote_spanned};
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Checks the shape shared by every entry point: an `async fn` without
/// arguments. Returns the compile error to emit if the shape is wrong.
fn check_entry(input: &ItemFn, attr: &str) -> Option<TokenStream> {
    if input.sig.asyncness.is_none() {
        return Some(quote_spanned! { input.sig.fn_token.span()=>
            compile_error!("fn must be `async fn`");
        }
        .into());
    }

    if !input.sig.inputs.is_empty() {
        let msg = format!("arguments are not supported by #[deferred::{attr}]");
        return Some(quote_spanned! { input.sig.inputs.span()=>
            compile_error!(#msg);
        }
        .into());
    }
    None
}

/// Runs `async fn main` to completion on a fresh event loop.
///
/// ```ignore
/// #[deferred::main]
/// async fn main() {
///     let value = deferred::Future::complete(1).await.unwrap();
///     assert_eq!(value, 1);
/// }
/// ```
#[proc_macro_attribute]
pub fn attr_macro_main(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    if let Some(err) = check_entry(&input, "main") {
        return err;
    }

    if input.sig.ident != "main" {
        return quote_spanned! { input.sig.ident.span()=>
            compile_error!("only `async fn main` can be used for #[deferred::main]");
        }
        .into();
    }

    let attrs = input.attrs;
    let output = input.sig.output;
    let block = input.block;
    quote! {
        pub fn main() #output {

            #(#attrs)*
            async fn __run() #output {
                #block
            }

            ::deferred::runtime::block_on(async {
                __run().await
            })
        }
    }
    .into()
}

/// Turns an `async fn` into a `#[test]` that runs on its own event loop.
#[proc_macro_attribute]
pub fn attr_macro_test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    if let Some(err) = check_entry(&input, "test") {
        return err;
    }

    let name = input.sig.ident;
    let attrs = input.attrs;
    let output = input.sig.output;
    let block = input.block;
    quote! {
        #[test]
        #(#attrs)*
        pub fn #name() #output {

            async fn __run() #output {
                #block
            }

            ::deferred::runtime::block_on(async {
                __run().await
            })
        }
    }
    .into()
}
