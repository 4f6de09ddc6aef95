use std::collections::BTreeMap;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, LitStr, Result, Type, spanned::Spanned};

use crate::from_record::generic_argument;

pub(crate) fn expand_from_records(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        Err(Error::new(
            input.span(),
            "`FromRecords` may only be derived on structs.",
        ))?
    };

    let Fields::Named(fields) = &data.fields else {
        Err(Error::new(
            input.span(),
            "`FromRecords` may only be derived on structs with named fields.",
        ))?
    };

    // Keyed by frame type, so each type is matched by exactly one arm.
    let mut receivers = BTreeMap::new();

    for field in &fields.named {
        let Some(Receiver {
            name,
            frame_type,
            collection,
        }) = Receiver::parse(field)?
        else {
            continue;
        };

        let slot = match collection {
            Collection::One => quote! {
                Some(self.#name.insert(Default::default()))
            },
            Collection::Many => quote! {
                self.#name.push(Default::default());
                self.#name.last_mut().map(|r| r as _)
            },
        };

        if receivers.insert(frame_type.value(), (frame_type.clone(), slot)).is_some() {
            Err(Error::new_spanned(
                &frame_type,
                "Each frame type may only be received by one field.",
            ))?
        }
    }

    let cases = receivers
        .into_values()
        .map(|(frame_type, slot)| quote! { #frame_type => { #slot } });

    let name = &input.ident;

    let expanded = quote! {
        impl FromRecords for #name {
            fn add_record(&mut self, frame_type: &str) -> Option<&mut dyn FromRecord> {
                match frame_type {
                    #(#cases)*
                    _ => None,
                }
            }
        }
    };

    Ok(expanded.into())
}

/// A field receiving the records of one frame type.
struct Receiver {
    name: Ident,
    frame_type: LitStr,
    collection: Collection,
}

/// How many records a receiving field keeps.
enum Collection {
    /// `Option<T>`: the last record only.
    One,
    /// `Vec<T>`: every record, in order.
    Many,
}

impl Collection {
    fn classify(ty: &Type) -> Result<Self> {
        let unsupported = || {
            Error::new_spanned(ty, "Field must have an `Option<T>` or `Vec<T>` type.")
        };

        let Type::Path(path) = ty else {
            Err(unsupported())?
        };

        let segment = path.path.segments.last().ok_or_else(unsupported)?;
        generic_argument(&segment.arguments).ok_or_else(unsupported)?;

        if segment.ident == "Option" {
            Ok(Self::One)
        } else if segment.ident == "Vec" {
            Ok(Self::Many)
        } else {
            Err(unsupported())
        }
    }
}

impl Receiver {
    fn parse(field: &Field) -> Result<Option<Self>> {
        let Some(name) = field.ident.clone() else {
            Err(Error::new_spanned(field, "Field must be named."))?
        };

        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("record")) else {
            return Ok(None);
        };

        let frame_type = attr.meta.require_list()?.parse_args::<LitStr>()?;
        if frame_type.value().is_empty() {
            Err(Error::new_spanned(&frame_type, "Frame type must not be empty."))?
        }

        Ok(Some(Self {
            name,
            frame_type,
            collection: Collection::classify(&field.ty)?,
        }))
    }
}
