//! Derive support for `operational` instruction vocabularies.
//!
//! `#[derive(Instructions)]` on an enum implements `operational::Instruction`
//! and adds one constructor per variant. A constructor takes the variant's
//! fields in order and returns the instruction emitted as a program:
//!
//! ```ignore
//! #[derive(Debug, Clone, Instructions)]
//! #[instructions(vocabulary = "TokenStore")]
//! pub enum Store {
//!     #[output(Vec<Token>)]
//!     ListTokens,
//!     #[output(Result<Token, StoreError>)]
//!     CreateToken { name: String },
//!     DeleteToken(u64),
//! }
//!
//! // Store::list_tokens()        -> Program<Store, Vec<Token>>
//! // Store::create_token(name)   -> Program<Store, Result<Token, StoreError>>
//! // Store::delete_token(field0) -> Program<Store, ()>
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DataEnum, DeriveInput, Fields, Ident, LitStr,
    Type, Variant,
};

/// Derive `operational::Instruction` and per-variant program constructors.
///
/// Attributes:
///
/// - `#[output(Type)]` on a variant: the result type handlers answer that
///   instruction with. Defaults to `()`.
/// - `#[instructions(vocabulary = "Name")]` on the enum: overrides the
///   vocabulary name, which otherwise is the enum's name.
#[proc_macro_derive(Instructions, attributes(output, instructions))]
pub fn derive_instructions(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Enum(DataEnum { variants, .. }) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Instructions can only be derived for enums",
        ));
    };

    let name = &input.ident;
    let vis = &input.vis;
    let vocabulary = vocabulary_name(input)?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let tags: Vec<String> = variants.iter().map(|v| v.ident.to_string()).collect();
    let idents: Vec<&Ident> = variants.iter().map(|v| &v.ident).collect();
    let constructors = variants
        .iter()
        .map(|variant| constructor(variant, vis))
        .collect::<syn::Result<Vec<_>>>()?;

    let mut constructor_where = where_clause.cloned().unwrap_or_else(|| parse_quote!(where));
    constructor_where
        .predicates
        .push(parse_quote!(Self: ::operational::Instruction));

    Ok(quote! {
        impl #impl_generics ::operational::Instruction for #name #ty_generics #where_clause {
            const VOCABULARY: &'static str = #vocabulary;
            const TAGS: &'static [&'static str] = &[#(#tags),*];

            fn tag(&self) -> &'static str {
                match *self {
                    #(Self::#idents { .. } => #tags,)*
                }
            }
        }

        impl #impl_generics #name #ty_generics #constructor_where {
            #(#constructors)*
        }
    })
}

fn vocabulary_name(input: &DeriveInput) -> syn::Result<String> {
    let mut vocabulary = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("instructions")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("vocabulary") {
                let value: LitStr = meta.value()?.parse()?;
                vocabulary = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported instructions attribute, expected `vocabulary`"))
            }
        })?;
    }
    Ok(vocabulary.unwrap_or_else(|| input.ident.to_string()))
}

fn output_type(attrs: &[Attribute]) -> syn::Result<Type> {
    let mut outputs = attrs.iter().filter(|a| a.path().is_ident("output"));
    let output = match outputs.next() {
        Some(attr) => attr.parse_args::<Type>()?,
        None => parse_quote!(()),
    };
    if let Some(duplicate) = outputs.next() {
        return Err(syn::Error::new_spanned(
            duplicate,
            "an instruction has exactly one output type",
        ));
    }
    Ok(output)
}

fn constructor(variant: &Variant, vis: &syn::Visibility) -> syn::Result<TokenStream2> {
    let ident = &variant.ident;
    let output = output_type(&variant.attrs)?;
    let fn_name = constructor_name(ident);
    let doc = format!("Emit a `{ident}` instruction.");

    let (params, build) = match &variant.fields {
        Fields::Named(fields) => {
            let names: Vec<_> = fields.named.iter().filter_map(|f| f.ident.as_ref()).collect();
            let types: Vec<_> = fields.named.iter().map(|f| &f.ty).collect();
            (
                quote!(#(#names: #types),*),
                quote!(Self::#ident { #(#names),* }),
            )
        }
        Fields::Unnamed(fields) => {
            let names: Vec<_> = (0..fields.unnamed.len())
                .map(|i| format_ident!("field{}", i))
                .collect();
            let types: Vec<_> = fields.unnamed.iter().map(|f| &f.ty).collect();
            (
                quote!(#(#names: #types),*),
                quote!(Self::#ident(#(#names),*)),
            )
        }
        Fields::Unit => (quote!(), quote!(Self::#ident)),
    };

    Ok(quote! {
        #[doc = #doc]
        #vis fn #fn_name(#params) -> ::operational::Program<Self, #output> {
            ::operational::Program::emit(#build)
        }
    })
}

fn constructor_name(variant: &Ident) -> Ident {
    let name = snake_case(&variant.to_string());
    let span = variant.span();
    match name.as_str() {
        "self" | "super" | "crate" => format_ident!("{}_", name, span = span),
        "try" | "gen" => Ident::new_raw(&name, span),
        _ if syn::parse_str::<Ident>(&name).is_err() => Ident::new_raw(&name, span),
        _ => Ident::new(&name, span),
    }
}

/// `CreateToken` becomes `create_token`, `HTTPRequest` becomes `http_request`.
fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
