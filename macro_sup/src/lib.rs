use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{parse::Parse, parse_macro_input};

#[proc_macro]
/// Generates a private `mlog` module whose `debug!`, `info!`, `warn!` and `error!` macros
/// log to a fixed target.
///
/// # Example
///
/// ```ignore
/// set_mlog!(stringify!(DuplicateGroupResolver));
///
/// mlog::info!("resolved {} groups", n);
/// ```
pub fn set_mlog(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let minput = parse_macro_input!(input as MInput);

    make_mlog_mod(&minput).into()
}

const DEBUG: &str = "debug";
const INFO: &str = "info";
const WARN: &str = "warn";
const ERROR: &str = "error";

fn make_mlog_mod(minput: &MInput) -> TokenStream {
    let target = &minput.target;
    let log_macro_ts = [DEBUG, INFO, WARN, ERROR]
        .into_iter()
        .map(|level| define_log_macro(minput, level));

    quote!(
        #[allow(dead_code)]
        mod mlog {
            pub(super) const TARGET: &str = #target;

            #(
                #log_macro_ts
            )*
        }
    )
}

fn define_log_macro(minput: &MInput, level: &str) -> TokenStream {
    let level_ident = syn::Ident::new(level, Span::call_site());
    let target = &minput.target;

    // `warn` collides with the builtin lint attribute name inside macro_rules.
    let macro_ident = if level == WARN {
        syn::Ident::new("warns", Span::call_site())
    } else {
        level_ident.clone()
    };

    quote!(
        #[allow(unused_macros)]
        macro_rules! #macro_ident {
            ($($tt:tt)+) => {
                log::#level_ident!(target: #target, $($tt)+)
            }
        }

        #[allow(unused_imports)]
        pub(super) use #macro_ident as #level_ident;
    )
}

struct MInput {
    target: syn::Expr,
}

impl Parse for MInput {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        Ok(Self {
            target: input.parse()?,
        })
    }
}
