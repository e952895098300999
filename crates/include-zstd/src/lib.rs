use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use std::env;
use std::fs;
use std::path::PathBuf;
use syn::parse::{Parse, ParseStream};
use syn::{Error, LitByteStr, LitInt, LitStr, Token, parse_macro_input};

/// Compression level used when the caller does not pass one.
const DEFAULT_LEVEL: i32 = 19;

macro_rules! bail {
    ($call:expr) => {
        match $call {
            Ok(val) => val,
            Err(err) => return Error::new(Span::call_site(), err).to_compile_error().into(),
        }
    };
}

/// `"path/relative/to/manifest"` optionally followed by `, level`.
struct IncludeArgs {
    path: LitStr,
    level: Option<LitInt>,
}

impl Parse for IncludeArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let path = input.parse()?;
        let level = if input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                None
            } else {
                Some(input.parse()?)
            }
        } else {
            None
        };
        Ok(Self { path, level })
    }
}

/// Embed a file as a zstd-compressed byte string.
///
/// The file is also referenced through `include_bytes!` so cargo rebuilds the
/// crate when the file changes.
#[proc_macro]
pub fn include_zstd(input: TokenStream) -> TokenStream {
    let IncludeArgs { path, level } = parse_macro_input!(input as IncludeArgs);
    let level = match level {
        Some(lit) => bail!(lit.base10_parse::<i32>()),
        None => DEFAULT_LEVEL,
    };

    let manifest_dir = bail!(env::var("CARGO_MANIFEST_DIR"));
    let full_path = PathBuf::from(manifest_dir).join(path.value());

    let content = bail!(fs::read(&full_path));
    let compressed_data = bail!(zstd::stream::encode_all(&content[..], level));

    let literal_bytes = LitByteStr::new(&compressed_data, Span::call_site());
    let tracked = full_path.to_string_lossy().into_owned();

    quote!({
        const _: &[u8] = include_bytes!(#tracked);
        #literal_bytes
    })
    .into()
}
