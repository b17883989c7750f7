use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};
use quote::quote;
use syn::Ident;

/// Escape identifiers that collide with Rust keywords, the way prost names
/// generated fields and types.
fn sanitize_identifier(ident: String) -> String {
    match ident.as_str() {
        "as" | "async" | "await" | "break" | "const" | "continue" | "dyn" | "else" | "enum" | "false" | "fn"
        | "for" | "gen" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod" | "move" | "mut" | "pub"
        | "ref" | "return" | "static" | "struct" | "trait" | "true" | "try" | "type" | "union" | "unsafe"
        | "use" | "where" | "while" | "abstract" | "become" | "box" | "do" | "final" | "macro" | "override"
        | "priv" | "typeof" | "unsized" | "virtual" | "yield" => format!("r#{ident}"),
        "self" | "Self" | "super" | "extern" | "crate" => format!("{ident}_"),
        _ => ident,
    }
}

pub fn to_snake(s: &str) -> String {
    sanitize_identifier(s.to_snake_case())
}

pub fn to_upper_camel(s: &str) -> String {
    sanitize_identifier(s.to_upper_camel_case())
}

pub fn field_ident(s: &str) -> Ident {
    syn::parse_str(&to_snake(s)).expect("field name is a valid identifier")
}

/// The operation constant name for one RPC, e.g.
/// `OPERATION_MESSAGING_GET_MESSAGE`.
pub fn operation_const_ident(service: &str, method: &str) -> Ident {
    syn::parse_str(&format!(
        "OPERATION_{}_{}",
        service.to_shouty_snake_case(),
        method.to_shouty_snake_case()
    ))
    .expect("operation constant is a valid identifier")
}

/// The Rust path of `message` relative to a service module generated for
/// `current_package`.
///
/// Generated service modules sit one level below the module holding the
/// prost output for their file, so a message of the same package is
/// `super::Message`; packages further away walk up with more `super`s, the
/// way tonic-generated code references its types.
pub fn message_import_path(current_package: &str, message: &MessageDescriptor) -> syn::Path {
    let current: Vec<&str> = current_package.split('.').filter(|part| !part.is_empty()).collect();
    let target: Vec<&str> = message.package_name().split('.').filter(|part| !part.is_empty()).collect();
    let common = current.iter().zip(&target).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    for _ in 0..(current.len() - common + 1) {
        parts.push("super".to_owned());
    }
    for package in &target[common..] {
        parts.push(to_snake(package));
    }

    let nested = message
        .full_name()
        .strip_prefix(message.package_name())
        .unwrap_or(message.full_name())
        .trim_start_matches('.');
    let mut nested: Vec<&str> = nested.split('.').collect();
    let name = nested.pop().expect("message has a name");
    for parent in nested {
        parts.push(to_snake(parent));
    }
    parts.push(to_upper_camel(name));

    syn::parse_str(&parts.join("::")).expect("import path is valid")
}

/// The primitive Rust type a scalar field maps to, `None` for messages and
/// bytes.
pub fn scalar_type(kind: &Kind) -> Option<proc_macro2::TokenStream> {
    Some(match kind {
        Kind::Double => quote!(::core::primitive::f64),
        Kind::Float => quote!(::core::primitive::f32),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => quote!(::core::primitive::i32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => quote!(::core::primitive::i64),
        Kind::Uint32 | Kind::Fixed32 => quote!(::core::primitive::u32),
        Kind::Uint64 | Kind::Fixed64 => quote!(::core::primitive::u64),
        Kind::Bool => quote!(::core::primitive::bool),
        Kind::String => quote!(::std::string::String),
        Kind::Enum(_) => quote!(::core::primitive::i32),
        Kind::Bytes | Kind::Message(_) => return None,
    })
}

/// The Rust type of a prost-generated field, before any `Option`/`Vec`
/// wrapping: scalars map to primitives, bytes to `Vec<u8>`, messages to
/// their import path.
pub fn base_field_type(current_package: &str, field: &FieldDescriptor) -> proc_macro2::TokenStream {
    match field.kind() {
        Kind::Bytes => quote!(::std::vec::Vec<::core::primitive::u8>),
        Kind::Message(message) => {
            let path = message_import_path(current_package, &message);
            quote!(#path)
        }
        kind => scalar_type(&kind).expect("scalar kinds always map"),
    }
}

/// The full Rust type of a prost-generated field, with repeated, map, and
/// presence wrapping applied.
pub fn field_type(current_package: &str, field: &FieldDescriptor) -> proc_macro2::TokenStream {
    if field.is_map() {
        let Kind::Message(entry) = field.kind() else {
            unreachable!("map fields have entry messages");
        };
        let key = entry.map_entry_key_field();
        let value = entry.map_entry_value_field();
        let key_ty = scalar_type(&key.kind()).expect("map keys are scalar");
        let value_ty = base_field_type(current_package, &value);
        return quote!(::std::collections::HashMap<#key_ty, #value_ty>);
    }

    let base = base_field_type(current_package, field);
    if field.is_list() {
        quote!(::std::vec::Vec<#base>)
    } else if field.supports_presence() {
        quote!(::core::option::Option<#base>)
    } else {
        base
    }
}
