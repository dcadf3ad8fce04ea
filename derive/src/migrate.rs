use crate::common::{resolve_path, Result};
use proc_macro2::{Ident, Span, TokenStream};
use quote::{quote, ToTokens, TokenStreamExt};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use syn::parse::Parse;
use syn::token::Super;
use syn::{Item, LitStr, Token, VisRestricted, Visibility};
use walkdir::WalkDir;

const HOOKS: [&str; 7] = [
    "up",
    "down",
    "migrate",
    "pre_up",
    "post_up",
    "pre_down",
    "post_down",
];

pub(crate) struct MigrationsInput {
    pub_token: Option<Token![pub]>,
    ident: Ident,
    _comma: Token![,],
    path: LitStr,
}

impl Parse for MigrationsInput {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let pub_token = if input.peek(Token![pub]) {
            Some(input.parse()?)
        } else {
            None
        };

        Ok(Self {
            pub_token,
            ident: input.parse()?,
            _comma: input.parse()?,
            path: input.parse()?,
        })
    }
}

struct QuotedMigration {
    mod_name: Ident,
    path: String,
    default_description: String,
    has_description: bool,
    hooks: Vec<Ident>,
}

impl ToTokens for QuotedMigration {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let QuotedMigration {
            mod_name,
            path,
            default_description,
            has_description,
            hooks,
        } = self;

        let description = if *has_description {
            quote! { #mod_name::description() }
        } else {
            quote! { #default_description }
        };

        let ts = quote! {
            (
                ::strata::migrate::Migration::new(#description)
                    #(.#hooks(#mod_name::#hooks))*,
                ::std::path::Path::new(#path),
            )
        };

        tokens.append_all(ts);
    }
}

pub(crate) fn expand_migrations_from_lit_dir(input: MigrationsInput) -> Result<TokenStream> {
    let path = resolve_path(input.path.value(), input.path.span())?;
    expand_migrations(&path, &input.ident, &input.pub_token)
}

fn collect_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in WalkDir::new(directory).follow_links(true) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "rs") {
            continue;
        }

        // files not starting with a number are not migrations; ignore
        let is_migration = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with(|c: char| c.is_ascii_digit()));
        if is_migration {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

pub(crate) fn expand_migrations(
    path: &Path,
    fn_name: &Ident,
    pub_token: &Option<Token![pub]>,
) -> Result<TokenStream> {
    let mut files = collect_files(path)?;
    files.sort();

    let mut migrations = Vec::new();
    let mut migrations_mods = Vec::new();

    for (position, file_path) in files.iter().enumerate() {
        let stem = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let sanitized = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>();
        let mod_name = Ident::new(&format!("migration_{}_{}", position, sanitized), Span::call_site());

        let migration_file = read_to_string(file_path)?;
        let mut program = syn::parse_file(&migration_file)?;

        let mut has_description = false;
        let mut hooks = vec![];
        for item in program.items.iter_mut() {
            if let Item::Fn(func) = item {
                func.vis = Visibility::Restricted(VisRestricted {
                    pub_token: Default::default(),
                    paren_token: Default::default(),
                    in_token: None,
                    path: Box::new(syn::Path::from(syn::parse_str::<Super>("super")?)),
                });

                let func_name = func.sig.ident.to_string();
                if func_name == "description" {
                    has_description = true;
                } else if HOOKS.contains(&func_name.as_str()) {
                    hooks.push(func.sig.ident.clone());
                }
            }
        }

        if !hooks
            .iter()
            .any(|h| h == "up" || h == "down" || h == "migrate")
        {
            return Err(format!(
                "migration {} must define at least one of `up`, `down` or `migrate`",
                file_path.display()
            )
            .into());
        }

        let path_str = file_path.display().to_string();
        migrations_mods.push(quote! {
            #[allow(dead_code)]
            mod #mod_name {
                // makes the compiler watch this file for changes
                const _: &[u8] = include_bytes!(#path_str);

                #program
            }
        });

        migrations.push(QuotedMigration {
            mod_name,
            path: path_str,
            default_description: stem,
            has_description,
            hooks,
        });
    }

    let token_stream: TokenStream = quote! {
        #pub_token fn #fn_name(registry: &mut ::strata::migrate::Registry) -> ::std::vec::Vec<i64> {
            registry.register_sources(::std::vec![
                #(#migrations),*
            ])
        }

        #(#migrations_mods)*
    };

    Ok(token_stream)
}
