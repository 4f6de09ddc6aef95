use std::collections::{BTreeMap, HashSet};

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Data, DeriveInput, Error, Expr, ExprClosure, Field, Fields, GenericArgument, Ident, LitStr,
    Pat, PathArguments, Result, Token, Type,
    parse::{Parse, ParseStream},
    spanned::Spanned,
};

const NUMBERS: [&str; 10] = [
    "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64",
];

pub(crate) fn expand_from_record(input: &DeriveInput) -> Result<TokenStream> {
    let Data::Struct(data) = &input.data else {
        Err(Error::new(
            input.span(),
            "`FromRecord` may only be derived on structs.",
        ))?
    };

    let Fields::Named(fields) = &data.fields else {
        Err(Error::new(
            input.span(),
            "`FromRecord` may only be derived on structs with named fields.",
        ))?
    };

    let fields = fields
        .named
        .iter()
        .map(FieldMetadata::parse)
        .filter_map(Result::transpose) // Skip fields without an attribute.
        .collect::<Result<Vec<_>>>()?;

    let mut names = HashSet::new();
    let mut field_methods = BTreeMap::new();
    let mut offset_method = None;
    let mut index_method = None;

    for field in fields {
        let value = match field.primitive {
            Primitive::Bytes { owned: true } => quote! { value.to_vec() },
            _ => quote! { value },
        };
        let target = &field.name;

        let assignment = match &field.handler {
            Some(Handler {
                field_type,
                acc,
                val,
                body,
            }) => quote! {
                (|#acc: &mut #field_type, #val| { #body })(&mut self.#target, #value)
            },
            None => quote! { self.#target = Some(#value) },
        };

        match field.identifier {
            FieldIdentifier::Name(lit) => {
                if !names.insert(lit.value()) {
                    Err(Error::new_spanned(&lit, "Field names must be unique."))?
                }

                field_methods
                    .entry(field.primitive.method())
                    .or_insert_with(Vec::new)
                    .push(quote! { #lit => { #assignment } });
            }
            FieldIdentifier::Offset(ident) => {
                if offset_method.replace(assignment).is_some() {
                    Err(Error::new_spanned(ident, "`offset` may only be received once."))?
                }
            }
            FieldIdentifier::Index(ident) => {
                if index_method.replace(assignment).is_some() {
                    Err(Error::new_spanned(ident, "`index` may only be received once."))?
                }
            }
        }
    }

    let field_methods = field_methods.into_iter().map(|(primitive, cases)| {
        let method = format_ident!("add_{}", primitive);
        let parameter = if primitive == "bytes" {
            quote! { &[u8] }
        } else {
            let primitive = format_ident!("{}", primitive);
            quote! { #primitive }
        };

        quote! {
            fn #method(&mut self, field: &str, value: #parameter) {
                match field {
                    #(#cases)*
                    _ => {}
                };
            }
        }
    });

    let offset_method = offset_method.map(|assignment| {
        quote! {
            fn add_offset(&mut self, value: usize) {
                #assignment;
            }
        }
    });

    let index_method = index_method.map(|assignment| {
        quote! {
            fn add_index(&mut self, value: usize) {
                #assignment;
            }
        }
    });

    let name = &input.ident;

    let expanded = quote! {
        impl FromRecord for #name {
            #(#field_methods)*
            #offset_method
            #index_method
        }
    };

    Ok(expanded.into())
}

struct FieldMetadata {
    name: Ident,
    primitive: Primitive,
    identifier: FieldIdentifier,
    handler: Option<Handler>,
}

enum FieldIdentifier {
    Name(LitStr),
    Offset(Ident),
    Index(Ident),
}

/// Value type received for a field.
enum Primitive {
    Number(String),
    /// Raw bytes, received as `Vec<u8>` if owned, `&[u8]` otherwise.
    Bytes { owned: bool },
}

impl Primitive {
    fn classify(ty: &Type) -> Result<Self> {
        let unsupported = || {
            Error::new_spanned(
                ty,
                "Field values must be a numeric primitive, `Vec<u8>` or `&[u8]`.",
            )
        };

        match ty {
            Type::Reference(r) => match &*r.elem {
                Type::Slice(s) if is_ident(&s.elem, "u8") => Ok(Self::Bytes { owned: false }),
                _ => Err(unsupported()),
            },
            Type::Path(path) => {
                let segment = path.path.segments.last().ok_or_else(unsupported)?;

                if segment.ident == "Vec" {
                    return match generic_argument(&segment.arguments) {
                        Some(inner) if is_ident(inner, "u8") => Ok(Self::Bytes { owned: true }),
                        _ => Err(unsupported()),
                    };
                }

                let ident = segment.ident.to_string();
                if segment.arguments.is_empty() && NUMBERS.contains(&ident.as_str()) {
                    Ok(Self::Number(ident))
                } else {
                    Err(unsupported())
                }
            }
            _ => Err(unsupported()),
        }
    }

    /// Suffix of the receiving `add_` method.
    fn method(&self) -> String {
        match self {
            Self::Number(ident) => ident.clone(),
            Self::Bytes { .. } => "bytes".to_string(),
        }
    }
}

struct Handler {
    field_type: Type,
    acc: Pat,
    val: Pat,
    body: Expr,
}

impl FieldMetadata {
    fn parse(field: &Field) -> Result<Option<Self>> {
        let Some(name) = field.ident.clone() else {
            Err(Error::new_spanned(field, "Field must be named."))?
        };

        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("field")) else {
            return Ok(None);
        };

        let FieldAttribute {
            identifier,
            handler,
        } = attr.meta.require_list()?.parse_args()?;

        let (primitive, handler) = if let Some(handler) = handler {
            let mut inputs = handler.inputs.iter();

            let (Some(acc), Some(val), None) = (inputs.next(), inputs.next(), inputs.next()) else {
                Err(Error::new_spanned(
                    &handler,
                    "Handler closure must have two parameters.",
                ))?
            };

            let Pat::Type(pat_type) = val else {
                Err(Error::new_spanned(
                    val,
                    "Handler closure's second parameter must be annotated with the expected value type.",
                ))?
            };

            let primitive = match &identifier {
                FieldIdentifier::Name(_) => Primitive::classify(&pat_type.ty)?,
                _ => Primitive::Number("usize".to_string()),
            };

            let handler = Handler {
                field_type: field.ty.clone(),
                acc: acc.clone(),
                val: val.clone(),
                body: (*handler.body).clone(),
            };

            (primitive, Some(handler))
        } else {
            let inner = option_inner(&field.ty)?;

            let primitive = match &identifier {
                FieldIdentifier::Name(_) => Primitive::classify(inner)?,
                _ => Primitive::Number("usize".to_string()),
            };

            (primitive, None)
        };

        Ok(Some(Self {
            name,
            primitive,
            identifier,
            handler,
        }))
    }
}

/// The `T` of a field of type `Option<T>`.
fn option_inner(ty: &Type) -> Result<&Type> {
    let Type::Path(path) = ty else {
        Err(Error::new_spanned(ty, "Field must have a type annotation."))?
    };

    let Some(segment) = path.path.segments.last() else {
        Err(Error::new_spanned(
            &path.path.segments,
            "Field must have a type annotation.",
        ))?
    };

    if segment.ident != "Option" {
        Err(Error::new_spanned(
            &segment.ident,
            "Field without a handler must have type `Option<T>`.",
        ))?
    }

    generic_argument(&segment.arguments).ok_or_else(|| {
        Error::new_spanned(
            &segment.arguments,
            "Field of type `Option<T>` must have a generic parameter.",
        )
    })
}

pub(crate) fn generic_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(arguments) = arguments else {
        return None;
    };

    match arguments.args.first()? {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    }
}

fn is_ident(ty: &Type, name: &str) -> bool {
    matches!(ty, Type::Path(p) if p.path.is_ident(name))
}

struct FieldAttribute {
    identifier: FieldIdentifier,
    handler: Option<ExprClosure>,
}

impl Parse for FieldAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        let identifier = if input.peek(LitStr) {
            FieldIdentifier::Name(input.parse()?)
        } else {
            let ident = input.parse::<Ident>()?;

            if ident == "offset" {
                FieldIdentifier::Offset(ident)
            } else if ident == "index" {
                FieldIdentifier::Index(ident)
            } else {
                Err(Error::new_spanned(
                    ident,
                    "Field identifier must be a string literal, `offset` or `index`.",
                ))?
            }
        };

        let handler = if !input.is_empty() {
            input.parse::<Token![,]>()?;
            Some(input.parse::<ExprClosure>()?)
        } else {
            None
        };

        Ok(Self {
            identifier,
            handler,
        })
    }
}
