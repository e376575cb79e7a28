use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident};

fn error(ident: &Ident, msg: &str) -> TokenStream {
    syn::Error::new_spanned(ident, msg).to_compile_error().into()
}

/// Derives `Encode`/`Decode` for a `#[repr(C)]`-style struct with named
/// fields, encoding/decoding each field in declaration order. Every field
/// type must itself implement `Encode`/`Decode`.
#[proc_macro_derive(RaidCodec)]
pub fn derive_raid_codec(input: TokenStream) -> TokenStream {
    let DeriveInput { ident, data, .. } = parse_macro_input!(input as DeriveInput);

    let data_struct = match data {
        Data::Struct(data_struct) => data_struct,
        _ => return error(&ident, "RaidCodec can only be derived for structs"),
    };

    let fields = match data_struct.fields {
        Fields::Named(named) => named.named,
        _ => return error(&ident, "RaidCodec requires named fields"),
    };

    let field_idents: Vec<&Ident> = fields
        .iter()
        .map(|f| f.ident.as_ref().expect("named field"))
        .collect();

    let encode_body = field_idents.iter().map(|name| {
        quote! {
            written += ::raid_codec::Encode::encode(&self.#name, endianness, &mut target[written..])?;
        }
    });

    let decode_body = field_idents.iter().map(|name| {
        quote! {
            let (#name, n) = ::raid_codec::Decode::decode(endianness, &input[read..])?;
            read += n;
        }
    });

    let construct = field_idents.iter().map(|name| quote! { #name });

    let expanded = quote! {
        impl ::raid_codec::Encode for #ident {
            fn encode(
                &self,
                endianness: ::raid_codec::Endianness,
                target: &mut [u8],
            ) -> Result<usize, ::raid_codec::EncodeError> {
                let mut written = 0usize;
                #(#encode_body)*
                Ok(written)
            }
        }

        impl ::raid_codec::Decode for #ident {
            fn decode(
                endianness: ::raid_codec::Endianness,
                input: &[u8],
            ) -> Result<(Self, usize), ::raid_codec::DecodeError> {
                let mut read = 0usize;
                #(#decode_body)*
                Ok((Self { #(#construct),* }, read))
            }
        }
    };

    expanded.into()
}
