extern crate proc_macro;

mod common;
mod migrate;

use proc_macro::TokenStream;
use quote::quote;
use syn::parse_macro_input;

/// Embeds the migrations found in a directory, relative to the crate root.
///
/// ```ignore
/// strata::migrate::migrations!(pub register_migrations, "migrations");
///
/// let mut registry = Registry::new();
/// register_migrations(&mut registry);
/// ```
///
/// Every `.rs` file whose name starts with a number is a migration. Files are
/// registered in order of that number, each one getting the next available
/// version. A migration file defines any of `up`, `down` (taking a
/// `&mut ChangeSet`) or `migrate` (also taking the `Direction`), plus the
/// optional `pre_up`, `pre_down`, `post_up` and `post_down` hooks and a
/// `description` function.
#[proc_macro]
pub fn migrations(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as migrate::MigrationsInput);
    match migrate::expand_migrations_from_lit_dir(input) {
        Ok(ts) => ts.into(),
        Err(e) => {
            if let Some(parse_err) = e.downcast_ref::<syn::Error>() {
                parse_err.to_compile_error().into()
            } else {
                let msg = e.to_string();
                quote!(::std::compile_error!(#msg)).into()
            }
        }
    }
}
