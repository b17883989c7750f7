//! Emits the `<Service>HttpClient` side of a service module. The client
//! rebuilds each method's URL from the request message (primary binding
//! only), attaches query pairs for fields the server reads from the query
//! string, and decodes the reply.

use proc_macro2::TokenStream;
use quote::quote;

use super::utils;
use super::{MethodGen, ServiceGen};
use crate::bindings::{BodySource, MethodBinding, PathField};
use crate::extensions::HttpVerb;

pub(super) fn generate(service: &ServiceGen) -> TokenStream {
    let client_ident = &service.client_ident;
    let client_doc = format!(" HTTP client for `{}`.", service.service.full_name());
    let new_doc = format!(
        " A client calling `{}` endpoints through `client`.",
        service.service.full_name()
    );

    let methods = service.methods.iter().map(|method| client_method(service, method));

    quote! {
        #[doc = #client_doc]
        #[derive(::core::clone::Clone, ::core::fmt::Debug)]
        pub struct #client_ident {
            inner: ::trellis::client::Client,
        }

        impl #client_ident {
            #[doc = #new_doc]
            pub fn new(client: ::trellis::client::Client) -> Self {
                Self { inner: client }
            }

            #(#methods)*
        }
    }
}

fn client_method(service: &ServiceGen, method: &MethodGen) -> TokenStream {
    // The primary rule is registered last, after its additional bindings;
    // the client always calls the primary exposure.
    let binding = &method.bindings.last().expect("methods with no bindings are dropped").binding;

    let method_ident = &method.trait_ident;
    let op_const = &method.op_const;
    let request_path = utils::message_import_path(&service.package, &method.method.input());
    let reply_path = utils::message_import_path(&service.package, &method.method.output());

    let doc = format!(
        " Calls `{}` as `{} {}`.",
        method.operation,
        binding.verb.as_str(),
        binding.template.raw()
    );

    let path = path_expr(binding);
    let verb = verb_expr(&binding.verb);

    let body_arg = match &binding.body {
        BodySource::None => quote!(::core::option::Option::<&()>::None),
        BodySource::Whole => quote!(::core::option::Option::Some(request)),
        BodySource::Field(field) => {
            let ident = utils::field_ident(field.name());
            quote!(::core::option::Option::Some(&request.#ident))
        }
    };

    let (query_build, query_arg) = query_pairs(binding);

    let invoke = quote! {
        self.inner.invoke(#verb, &path, #op_const, #body_arg, #query_arg).await
    };

    let call = match &binding.response_body {
        None => invoke,
        Some(field) => {
            let ident = utils::field_ident(field.name());
            let field_ty = utils::field_type(&service.package, field);
            quote! {
                let value: #field_ty = #invoke?;
                ::core::result::Result::Ok(#reply_path {
                    #ident: value,
                    ..::core::default::Default::default()
                })
            }
        }
    };

    quote! {
        #[doc = #doc]
        pub async fn #method_ident(
            &self,
            request: &#request_path,
        ) -> ::core::result::Result<#reply_path, ::trellis::client::Error> {
            let path = #path;
            #query_build
            #call
        }
    }
}

fn verb_expr(verb: &HttpVerb) -> TokenStream {
    match verb {
        HttpVerb::Get => quote!(::trellis::reexports::http::Method::GET),
        HttpVerb::Put => quote!(::trellis::reexports::http::Method::PUT),
        HttpVerb::Post => quote!(::trellis::reexports::http::Method::POST),
        HttpVerb::Delete => quote!(::trellis::reexports::http::Method::DELETE),
        HttpVerb::Patch => quote!(::trellis::reexports::http::Method::PATCH),
        HttpVerb::Custom(kind) => match kind.to_ascii_uppercase().as_str() {
            "HEAD" => quote!(::trellis::reexports::http::Method::HEAD),
            "OPTIONS" => quote!(::trellis::reexports::http::Method::OPTIONS),
            _ => quote!(::trellis::reexports::http::Method::TRACE),
        },
    }
}

fn path_expr(binding: &MethodBinding) -> TokenStream {
    if binding.path_fields.is_empty() {
        let raw = binding.template.raw().to_owned();
        return quote!(::std::string::String::from(#raw));
    }

    let format = binding.template.format_string();
    let values = binding.path_fields.iter().map(path_value_expr);

    quote! {
        ::std::format!(#format, #(::trellis::client::path_value(#values)),*)
    }
}

/// The expression reading one path variable out of the request message, with
/// protobuf default semantics for absent intermediate messages.
fn path_value_expr(path_field: &PathField) -> TokenStream {
    if !path_field.bindable {
        return quote!(::std::string::String::new());
    }

    let leaf = path_field.chain.last().expect("chains are never empty");
    let leaf_ident = utils::field_ident(leaf.name());

    if path_field.chain.len() == 1 {
        if leaf.supports_presence() {
            return quote!(request.#leaf_ident.clone().unwrap_or_default());
        }
        return quote!(&request.#leaf_ident);
    }

    let mut steps = path_field.chain[..path_field.chain.len() - 1].iter();
    let first = utils::field_ident(steps.next().expect("chains with nesting have steps").name());
    let mut access = quote!(request.#first.as_ref());
    for step in steps {
        let step_ident = utils::field_ident(step.name());
        access = quote!(#access.and_then(|message| message.#step_ident.as_ref()));
    }

    if leaf.supports_presence() {
        quote!(#access.and_then(|message| message.#leaf_ident.clone()).unwrap_or_default())
    } else {
        quote!(#access.map(|message| message.#leaf_ident.clone()).unwrap_or_default())
    }
}

fn query_pairs(binding: &MethodBinding) -> (TokenStream, TokenStream) {
    if binding.query_fields.is_empty() {
        return (quote!(), quote!(&[]));
    }

    let pushes = binding.query_fields.iter().map(|query_field| {
        let name = &query_field.name;
        let field = &query_field.field;
        let ident = utils::field_ident(field.name());

        if field.is_list() {
            let indexed = format!("{name}[{{}}]");
            return quote! {
                for (index, value) in request.#ident.iter().enumerate() {
                    query.push((::std::format!(#indexed, index), value.to_string()));
                }
            };
        }

        if field.supports_presence() {
            return quote! {
                if let ::core::option::Option::Some(value) = &request.#ident {
                    query.push((::std::string::String::from(#name), value.to_string()));
                }
            };
        }

        quote! {
            query.push((::std::string::String::from(#name), request.#ident.to_string()));
        }
    });

    let build = quote! {
        let mut query: ::std::vec::Vec<(::std::string::String, ::std::string::String)> =
            ::std::vec::Vec::new();
        #(#pushes)*
    };

    (build, quote!(&query))
}
