//! Assembly of generated files: one `<stem>.trellis.rs` per proto file,
//! containing a `<service>_http` module per service.

use anyhow::Context as _;
use prost_reflect::{FileDescriptor, MethodDescriptor, ServiceDescriptor};
use prost_types::compiler::code_generator_response;
use quote::format_ident;
use syn::Ident;

use crate::bindings::MethodBinding;
use crate::diag::Diagnostics;
use crate::extensions::{Extensions, HttpVerb};
use crate::Options;

mod client;
mod server;
mod utils;

pub(crate) struct ServiceGen {
    pub(crate) service: ServiceDescriptor,
    pub(crate) package: String,
    pub(crate) module_ident: Ident,
    pub(crate) trait_ident: Ident,
    pub(crate) router_ident: Ident,
    pub(crate) client_ident: Ident,
    pub(crate) deprecated: bool,
    pub(crate) methods: Vec<MethodGen>,
}

pub(crate) struct MethodGen {
    pub(crate) method: MethodDescriptor,
    pub(crate) trait_ident: Ident,
    pub(crate) op_const: Ident,
    pub(crate) operation: String,
    pub(crate) bindings: Vec<BindingGen>,
}

pub(crate) struct BindingGen {
    pub(crate) binding: MethodBinding,
    pub(crate) route_path: String,
    pub(crate) handler: Ident,
}

/// Generate the companion file for `file`, or `None` when there is nothing
/// to generate.
pub(crate) fn generate_file(
    file: &FileDescriptor,
    options: &Options,
    compiler_version: Option<&prost_types::compiler::Version>,
    extensions: &Extensions,
    diag: &mut Diagnostics,
) -> anyhow::Result<Option<code_generator_response::File>> {
    if file.services().next().is_none() {
        return Ok(None);
    }
    if options.omitempty && !extensions.has_http_rules(file) {
        return Ok(None);
    }

    let mut services = Vec::new();
    for service in file.services() {
        if let Some(service_gen) = collect_service(&service, file, options, extensions, diag)? {
            services.push(service_gen);
        }
    }

    if services.is_empty() {
        return Ok(None);
    }

    let modules: Vec<syn::Item> = services
        .iter()
        .map(service_module)
        .collect::<syn::Result<_>>()
        .context("generated code failed to parse")?;

    let ast = syn::File {
        shebang: None,
        attrs: Vec::new(),
        items: modules,
    };

    let mut content = String::new();
    content.push_str("// Code generated by protoc-gen-trellis. DO NOT EDIT.\n");
    content.push_str("// versions:\n");
    content.push_str(&format!("// - protoc-gen-trellis v{}\n", env!("CARGO_PKG_VERSION")));
    content.push_str(&format!("// - protoc             {}\n", protoc_version(compiler_version)));
    if extensions.file_deprecated(file) {
        content.push_str(&format!("// {} is a deprecated file.\n", file.name()));
    } else {
        content.push_str(&format!("// source: {}\n", file.name()));
    }
    content.push('\n');
    content.push_str(&prettyplease::unparse(&ast));

    let name = format!("{}.trellis.rs", file.name().trim_end_matches(".proto"));

    Ok(Some(code_generator_response::File {
        name: Some(name),
        content: Some(content),
        ..Default::default()
    }))
}

fn protoc_version(version: Option<&prost_types::compiler::Version>) -> String {
    let Some(version) = version else {
        return "(unknown)".to_owned();
    };
    let suffix = match version.suffix() {
        "" => String::new(),
        suffix => format!("-{suffix}"),
    };
    format!("v{}.{}.{}{suffix}", version.major(), version.minor(), version.patch())
}

fn collect_service(
    service: &ServiceDescriptor,
    file: &FileDescriptor,
    options: &Options,
    extensions: &Extensions,
    diag: &mut Diagnostics,
) -> anyhow::Result<Option<ServiceGen>> {
    let mut methods = Vec::new();

    for method in service.methods() {
        if method.is_client_streaming() || method.is_server_streaming() {
            continue;
        }

        let bindings = match extensions.http_rule(&method) {
            Some(rule) => MethodBinding::from_rule(&method, &rule, extensions, diag)?,
            None if options.omitempty => continue,
            None => vec![MethodBinding::default_binding(&method, extensions, diag)?],
        };

        let mut binding_gens = Vec::new();
        for binding in bindings {
            if let HttpVerb::Custom(kind) = &binding.verb {
                if server::method_filter(kind).is_none() {
                    diag.warn(format!(
                        "method {}: the custom verb '{kind}' is not supported by the router; binding skipped",
                        method.full_name()
                    ));
                    continue;
                }
            }
            let route_path = binding.template.axum_path(diag);
            let handler = format_ident!("{}_{}", method.name(), binding_gens.len());
            binding_gens.push(BindingGen {
                binding,
                route_path,
                handler,
            });
        }

        if binding_gens.is_empty() {
            continue;
        }

        methods.push(MethodGen {
            trait_ident: utils::field_ident(method.name()),
            op_const: utils::operation_const_ident(service.name(), method.name()),
            operation: format!("/{}/{}", service.full_name(), method.name()),
            bindings: binding_gens,
            method,
        });
    }

    if methods.is_empty() {
        return Ok(None);
    }

    Ok(Some(ServiceGen {
        package: file.package_name().to_owned(),
        module_ident: format_ident!("{}_http", utils::to_snake(service.name())),
        trait_ident: format_ident!("{}HttpServer", utils::to_upper_camel(service.name())),
        router_ident: format_ident!("{}HttpRouter", utils::to_upper_camel(service.name())),
        client_ident: format_ident!("{}HttpClient", utils::to_upper_camel(service.name())),
        deprecated: extensions.service_deprecated(service),
        methods,
        service: service.clone(),
    }))
}

fn service_module(service: &ServiceGen) -> syn::Result<syn::Item> {
    let module_ident = &service.module_ident;
    let module_doc = format!(
        " HTTP bindings for `{}`, generated by `protoc-gen-trellis`.",
        service.service.full_name()
    );
    let deprecated_doc = service.deprecated.then(|| {
        quote::quote! {
            #[doc = ""]
            #[doc = " Deprecated: Do not use."]
        }
    });

    let server = server::generate(service);
    let client = client::generate(service);

    syn::parse2(quote::quote! {
        #[doc = #module_doc]
        #deprecated_doc
        pub mod #module_ident {
            #server
            #client
        }
    })
}
