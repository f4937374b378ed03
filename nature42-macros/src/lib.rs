//! Proc macros for the Nature42 content oracle.
//!
//! `#[derive(Tool)]` turns a plain struct into a structured-output schema
//! the LLM is forced to fill in. The struct doubles as the deserialization
//! target for the model's reply.
//!
//! # Example
//!
//! ```ignore
//! /// Report how the player's command should be read
//! #[derive(Tool, Deserialize)]
//! #[tool(name = "report_interpretation")]
//! struct InterpretationReport {
//!     /// Verb describing the action
//!     #[tool(one_of = "move|take|drop|examine")]
//!     action: String,
//!     /// Object of the action, if any
//!     target: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, DeriveInput, Field, Lit, Meta, Type};

/// Derive macro for oracle tool schemas.
///
/// # Attributes
///
/// - `#[tool(name = "...")]` on the struct overrides the tool name (snake_case struct name by default)
/// - `#[tool(optional)]` on fields leaves the field out of `required`
/// - `#[tool(rename = "...")]` on fields overrides the property name
/// - `#[tool(one_of = "a|b|c")]` on string fields restricts the value to an enum
///
/// Attributes on one field can be combined: `#[tool(optional, rename = "x")]`.
#[proc_macro_derive(Tool, attributes(tool))]
pub fn derive_tool(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_tool(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

#[derive(Default)]
struct FieldOptions {
    optional: bool,
    rename: Option<String>,
    one_of: Vec<String>,
}

fn expand_tool(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let tool_name = get_tool_name(&input)?;
    let description = get_doc_comment(&input.attrs);

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Tool derive only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(&input, "Tool derive only supports structs")),
    };

    let mut property_tokens = Vec::new();
    let mut required_fields = Vec::new();

    for field in fields {
        let options = field_options(field)?;
        let field_name_str = match &options.rename {
            Some(name) => name.clone(),
            None => field_ident_name(field)?,
        };
        let field_desc = get_doc_comment(&field.attrs);
        let type_schema = type_to_schema(&field.ty)?;

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        let enum_token = if options.one_of.is_empty() {
            quote! {}
        } else {
            let variants = &options.one_of;
            quote! { property["enum"] = serde_json::json!([#(#variants),*]); }
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                #enum_token
                properties.insert(#field_name_str.to_string(), property);
            }
        });

        if !options.optional && !is_option_type(&field.ty) {
            required_fields.push(field_name_str);
        }
    }

    Ok(quote! {
        impl #struct_name {
            /// Tool name sent to the model.
            pub fn tool_name() -> &'static str {
                #tool_name
            }

            /// Tool description sent to the model.
            pub fn tool_description() -> &'static str {
                #description
            }

            /// JSON schema for this tool's input.
            pub fn input_schema() -> serde_json::Value {
                let mut properties = serde_json::Map::new();
                #(#property_tokens)*

                let required: Vec<&str> = vec![#(#required_fields),*];

                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }

            /// Tool definition for the Claude API.
            pub fn as_tool() -> claude::Tool {
                claude::Tool {
                    name: Self::tool_name().to_string(),
                    description: Self::tool_description().to_string(),
                    input_schema: Self::input_schema(),
                }
            }

            /// Decode the input the model produced for this tool.
            ///
            /// The struct must also derive `Deserialize`.
            pub fn from_tool_input(input: serde_json::Value) -> Result<Self, serde_json::Error> {
                serde_json::from_value(input)
            }
        }
    })
}

fn get_tool_name(input: &DeriveInput) -> syn::Result<String> {
    let mut name = None;
    for attr in tool_attrs(&input.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: syn::LitStr = meta.value()?.parse()?;
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported struct-level tool attribute"))
            }
        })?;
    }
    Ok(name.unwrap_or_else(|| to_snake_case(&input.ident.to_string())))
}

fn field_options(field: &Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in tool_attrs(&field.attrs) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("optional") {
                options.optional = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.rename = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("one_of") {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.one_of = value
                    .value()
                    .split('|')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                Ok(())
            } else {
                Err(meta.error("unsupported field-level tool attribute"))
            }
        })?;
    }
    Ok(options)
}

fn tool_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|attr| attr.path().is_ident("tool"))
}

fn field_ident_name(field: &Field) -> syn::Result<String> {
    field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))
}

fn get_doc_comment(attrs: &[Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn type_to_schema(ty: &Type) -> syn::Result<TokenStream2> {
    let Type::Path(type_path) = ty else {
        return Ok(quote! { serde_json::json!({}) });
    };
    let Some(segment) = type_path.path.segments.last() else {
        return Ok(quote! { serde_json::json!({}) });
    };

    Ok(match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!({"type": "string"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "integer"}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "number"}) },
        "bool" => quote! { serde_json::json!({"type": "boolean"}) },
        "Option" => match first_generic(segment) {
            Some(inner) => type_to_schema(inner)?,
            None => quote! { serde_json::json!({}) },
        },
        "Vec" => match first_generic(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner)?;
                quote! {
                    serde_json::json!({
                        "type": "array",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { serde_json::json!({"type": "array"}) },
        },
        // Nested structs that also derive Tool contribute their own schema.
        _ => quote! { <#ty>::input_schema() },
    })
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
