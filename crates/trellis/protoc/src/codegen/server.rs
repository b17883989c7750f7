//! Emits the server side of a service module: operation constants, the
//! `<Service>HttpServer` trait, one handler per binding, and the
//! `<Service>HttpRouter` wrapper.

use proc_macro2::TokenStream;
use prost_reflect::FieldDescriptor;
use quote::{format_ident, quote};
use syn::Ident;

use super::utils;
use super::{BindingGen, MethodGen, ServiceGen};
use crate::bindings::BodySource;
use crate::extensions::HttpVerb;

/// The `axum::routing::MethodFilter` constant for a custom verb, when the
/// router supports it.
pub(super) fn method_filter(kind: &str) -> Option<&'static str> {
    match kind.to_ascii_uppercase().as_str() {
        "HEAD" => Some("HEAD"),
        "OPTIONS" => Some("OPTIONS"),
        "TRACE" => Some("TRACE"),
        _ => None,
    }
}

pub(super) fn generate(service: &ServiceGen) -> TokenStream {
    let constants = service.methods.iter().map(operation_constant);
    let server_trait = server_trait(service);
    let router = router(service);
    let handlers = service.methods.iter().flat_map(|method| {
        method
            .bindings
            .iter()
            .map(move |binding| handler(service, method, binding))
    });

    quote! {
        #(#constants)*
        #server_trait
        #router
        #(#handlers)*
    }
}

fn operation_constant(method: &MethodGen) -> TokenStream {
    let doc = format!(" Operation name of `{}`.", method.operation.trim_start_matches('/'));
    let op_const = &method.op_const;
    let operation = &method.operation;

    quote! {
        #[doc = #doc]
        pub const #op_const: &::core::primitive::str = #operation;
    }
}

fn server_trait(service: &ServiceGen) -> TokenStream {
    let trait_ident = &service.trait_ident;
    let trait_doc = format!(" Server trait for `{}` HTTP endpoints.", service.service.full_name());

    let methods = service.methods.iter().map(|method| {
        let method_ident = &method.trait_ident;
        let doc = format!(" Handles `{}`.", method.operation);
        let request = utils::message_import_path(&service.package, &method.method.input());
        let reply = utils::message_import_path(&service.package, &method.method.output());

        quote! {
            #[doc = #doc]
            fn #method_ident(
                &self,
                ctx: ::trellis::Context,
                request: #request,
            ) -> impl ::core::future::Future<
                Output = ::core::result::Result<#reply, ::trellis::Status>,
            > + ::core::marker::Send;
        }
    });

    quote! {
        #[doc = #trait_doc]
        pub trait #trait_ident: ::core::marker::Send + ::core::marker::Sync + 'static {
            #(#methods)*
        }
    }
}

fn router(service: &ServiceGen) -> TokenStream {
    let trait_ident = &service.trait_ident;
    let router_ident = &service.router_ident;
    let router_doc = format!(
        " Mounts a [`{}`] implementation as axum routes.",
        service.trait_ident
    );

    let routes = service.methods.iter().flat_map(|method| {
        method.bindings.iter().map(move |binding| {
            let op_const = &method.op_const;
            let route_path = &binding.route_path;
            let routing = routing_expr(&binding.binding.verb, &binding.handler);

            quote! {
                {
                    let route = ::trellis::reexports::axum::Router::new()
                        .route(#route_path, #routing)
                        .with_state(self.clone());
                    router = router.merge(configure(#op_const, route));
                }
            }
        })
    });

    quote! {
        #[doc = #router_doc]
        pub struct #router_ident<T> {
            inner: ::std::sync::Arc<T>,
        }

        impl<T> #router_ident<T> {
            /// Wrap a service implementation.
            pub fn new(inner: T) -> Self {
                Self {
                    inner: ::std::sync::Arc::new(inner),
                }
            }

            /// Wrap an implementation that is already shared.
            pub fn from_arc(inner: ::std::sync::Arc<T>) -> Self {
                Self { inner }
            }
        }

        impl<T> ::core::clone::Clone for #router_ident<T> {
            fn clone(&self) -> Self {
                Self {
                    inner: ::core::clone::Clone::clone(&self.inner),
                }
            }
        }

        impl<T> ::core::fmt::Debug for #router_ident<T> {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(::core::stringify!(#router_ident))
            }
        }

        impl<T> #router_ident<T>
        where
            T: #trait_ident,
        {
            /// Build a router with every HTTP binding of the service.
            pub fn into_router(self) -> ::trellis::reexports::axum::Router {
                self.into_router_with(|_, route| route)
            }

            /// Build a router, letting `configure` wrap each route.
            ///
            /// `configure` is called once per binding with the operation
            /// name, so middleware can be applied per method the way a
            /// configuration map keyed by operation would.
            pub fn into_router_with<F>(self, mut configure: F) -> ::trellis::reexports::axum::Router
            where
                F: ::core::ops::FnMut(
                    &'static ::core::primitive::str,
                    ::trellis::reexports::axum::Router,
                ) -> ::trellis::reexports::axum::Router,
            {
                let mut router = ::trellis::reexports::axum::Router::new();
                #(#routes)*
                router
            }
        }

        impl<T> ::trellis::HttpService for #router_ident<T>
        where
            T: #trait_ident,
        {
            fn into_router(self) -> ::trellis::reexports::axum::Router {
                #router_ident::into_router(self)
            }
        }
    }
}

fn routing_expr(verb: &HttpVerb, handler: &Ident) -> TokenStream {
    let method = match verb {
        HttpVerb::Get => quote!(get),
        HttpVerb::Put => quote!(put),
        HttpVerb::Post => quote!(post),
        HttpVerb::Delete => quote!(delete),
        HttpVerb::Patch => quote!(patch),
        HttpVerb::Custom(kind) => {
            let filter = format_ident!(
                "{}",
                method_filter(kind).expect("unsupported custom verbs are skipped during collection")
            );
            return quote! {
                ::trellis::reexports::axum::routing::on(
                    ::trellis::reexports::axum::routing::MethodFilter::#filter,
                    #handler::<T>,
                )
            };
        }
    };

    quote!(::trellis::reexports::axum::routing::#method(#handler::<T>))
}

fn handler(service: &ServiceGen, method: &MethodGen, binding: &BindingGen) -> TokenStream {
    let handler_ident = &binding.handler;
    let router_ident = &service.router_ident;
    let trait_ident = &service.trait_ident;
    let method_ident = &method.trait_ident;
    let op_const = &method.op_const;
    let request_path = utils::message_import_path(&service.package, &method.method.input());

    let body = body_tokens(service, binding, &request_path);
    let query = query_tokens(binding);
    let headers = header_tokens(binding);
    let path = path_tokens(binding);

    let reply_expr = match &binding.binding.response_body {
        Some(field) => {
            let ident = utils::field_ident(field.name());
            quote!(reply.#ident)
        }
        None => quote!(reply),
    };

    quote! {
        #[allow(non_snake_case, unused_mut, dead_code, unused_variables)]
        async fn #handler_ident<T>(
            ::trellis::reexports::axum::extract::State(service): ::trellis::reexports::axum::extract::State<
                #router_ident<T>,
            >,
            request: ::trellis::reexports::axum::extract::Request,
        ) -> ::trellis::reexports::axum::response::Response
        where
            T: #trait_ident,
        {
            let (mut parts, body) =
                ::trellis::reexports::axum::RequestExt::with_limited_body(request).into_parts();
            let mut target = <#request_path as ::core::default::Default>::default();

            #body
            #query
            #headers
            #path

            let ctx = ::trellis::Context::from_parts(&parts, #op_const);
            let reply = match #trait_ident::#method_ident(&*service.inner, ctx, target).await {
                ::core::result::Result::Ok(reply) => reply,
                ::core::result::Result::Err(status) => {
                    let mut response =
                        ::trellis::reexports::axum::response::IntoResponse::into_response(status);
                    response.extensions_mut().insert(::trellis::Operation(#op_const));
                    return response;
                }
            };

            let mut response = ::trellis::reexports::axum::response::IntoResponse::into_response(
                ::trellis::reexports::axum::Json(#reply_expr),
            );
            response.extensions_mut().insert(::trellis::Operation(#op_const));
            response
        }
    }
}

fn body_tokens(service: &ServiceGen, binding: &BindingGen, request_path: &syn::Path) -> TokenStream {
    match &binding.binding.body {
        BodySource::None => quote!(),
        BodySource::Whole => quote! {
            target = match ::trellis::__private::deserialize_body::<#request_path>(&parts, body).await {
                ::core::result::Result::Ok(value) => value,
                ::core::result::Result::Err(response) => return response,
            };
        },
        BodySource::Field(field) => {
            let ident = utils::field_ident(field.name());

            if matches!(field.kind(), prost_reflect::Kind::Bytes) && !field.is_list() {
                let assign = if field.supports_presence() {
                    quote!(target.#ident = ::core::option::Option::Some(raw.to_vec()))
                } else {
                    quote!(target.#ident = raw.to_vec())
                };
                return quote! {
                    let raw = match ::trellis::__private::body_bytes(body).await {
                        ::core::result::Result::Ok(raw) => raw,
                        ::core::result::Result::Err(response) => return response,
                    };
                    #assign;
                };
            }

            let value_ty = body_field_value_type(service, field);
            let assign = if field.supports_presence() && !field.is_list() && !field.is_map() {
                quote!(target.#ident = ::core::option::Option::Some(value))
            } else {
                quote!(target.#ident = value)
            };

            quote! {
                let value = match ::trellis::__private::deserialize_body::<#value_ty>(&parts, body).await {
                    ::core::result::Result::Ok(value) => value,
                    ::core::result::Result::Err(response) => return response,
                };
                #assign;
            }
        }
    }
}

/// The type a body-selected field is deserialized as: the field's type with
/// presence unwrapped, since the body is the value itself.
fn body_field_value_type(service: &ServiceGen, field: &FieldDescriptor) -> TokenStream {
    if field.is_map() || field.is_list() {
        utils::field_type(&service.package, field)
    } else {
        utils::base_field_type(&service.package, field)
    }
}

fn query_tokens(binding: &BindingGen) -> TokenStream {
    if binding.binding.query_fields.is_empty() {
        return quote!();
    }

    let mut defs = Vec::new();
    let mut assigns = Vec::new();

    for (idx, query_field) in binding.binding.query_fields.iter().enumerate() {
        let field_ident = format_ident!("field_{idx}");
        let name = &query_field.name;
        let field = &query_field.field;

        let scalar = utils::scalar_type(&field.kind()).expect("query fields are scalar");
        let ty = if field.is_list() {
            quote!(::core::option::Option<::std::vec::Vec<#scalar>>)
        } else {
            quote!(::core::option::Option<#scalar>)
        };

        defs.push(quote! {
            #[serde(rename = #name)]
            #field_ident: #ty
        });

        let target_ident = utils::field_ident(field.name());
        let value = if field.supports_presence() && !field.is_list() {
            quote!(::core::option::Option::Some(value))
        } else {
            quote!(value)
        };
        assigns.push(quote! {
            if let ::core::option::Option::Some(value) = query.#field_ident {
                target.#target_ident = #value;
            }
        });
    }

    quote! {
        #[derive(::core::default::Default, ::trellis::reexports::serde_derive::Deserialize)]
        #[serde(crate = "::trellis::reexports::serde", default)]
        #[allow(non_snake_case, dead_code)]
        struct QueryContent {
            #(#defs),*
        }

        let query = match ::trellis::__private::deserialize_query::<QueryContent>(&parts) {
            ::core::result::Result::Ok(query) => query,
            ::core::result::Result::Err(response) => return response,
        };
        #(#assigns)*
    }
}

fn header_tokens(binding: &BindingGen) -> TokenStream {
    let binds = binding.binding.header_fields.iter().map(|header_field| {
        let header = &header_field.header;
        let target_ident = utils::field_ident(header_field.field.name());
        let error = format!("invalid value for header `{header}`");

        let value = if header_field.field.supports_presence() {
            quote!(::core::option::Option::Some(value))
        } else {
            quote!(value)
        };

        quote! {
            if let ::core::option::Option::Some(raw) = ::trellis::__private::header_value(&parts, #header) {
                match raw.parse() {
                    ::core::result::Result::Ok(value) => target.#target_ident = #value,
                    ::core::result::Result::Err(_) => {
                        return ::trellis::reexports::axum::response::IntoResponse::into_response(
                            ::trellis::Status::invalid_argument(#error),
                        );
                    }
                }
            }
        }
    });

    quote!(#(#binds)*)
}

fn path_tokens(binding: &BindingGen) -> TokenStream {
    if binding.binding.path_fields.is_empty() {
        return quote!();
    }

    let mut defs = Vec::new();
    let mut assigns = Vec::new();

    for (idx, path_field) in binding.binding.path_fields.iter().enumerate() {
        let field_ident = format_ident!("field_{idx}");
        let variable = &path_field.variable;

        let ty = if path_field.bindable {
            let leaf = path_field.chain.last().expect("chains are never empty");
            utils::scalar_type(&leaf.kind()).expect("bindable leaves are scalar")
        } else {
            quote!(::std::string::String)
        };

        defs.push(quote! {
            #[serde(rename = #variable)]
            #field_ident: #ty
        });

        if !path_field.bindable {
            continue;
        }

        let leaf = path_field.chain.last().expect("chains are never empty");
        let mut access = quote!(target);
        for step in &path_field.chain[..path_field.chain.len() - 1] {
            let step_ident = utils::field_ident(step.name());
            access = quote!(#access.#step_ident.get_or_insert_default());
        }
        let leaf_ident = utils::field_ident(leaf.name());

        let value = if leaf.supports_presence() {
            quote!(::core::option::Option::Some(path.#field_ident))
        } else {
            quote!(path.#field_ident)
        };
        assigns.push(quote!(#access.#leaf_ident = #value;));
    }

    quote! {
        #[derive(::trellis::reexports::serde_derive::Deserialize)]
        #[serde(crate = "::trellis::reexports::serde")]
        #[allow(non_snake_case, dead_code)]
        struct PathContent {
            #(#defs),*
        }

        let path = match ::trellis::__private::deserialize_path::<PathContent>(&mut parts).await {
            ::core::result::Result::Ok(path) => path,
            ::core::result::Result::Err(response) => return response,
        };
        #(#assigns)*
    }
}
