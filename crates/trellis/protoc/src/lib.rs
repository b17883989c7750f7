#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! The library behind the `protoc-gen-trellis` binary.
//!
//! The plugin reads a serialized `CodeGeneratorRequest` on standard input and
//! writes a serialized `CodeGeneratorResponse` on standard output, as every
//! protoc plugin does. For each proto file it was asked to generate it emits
//! a `<stem>.trellis.rs` companion file containing, per service:
//!
//! - operation name constants (`/package.Service/Method`),
//! - a `<Service>HttpServer` trait and a `<Service>HttpRouter` that mounts
//!   one axum route per HTTP binding,
//! - a `<Service>HttpClient` calling the same endpoints through
//!   `trellis::client::Client`.
//!
//! HTTP bindings come from the `google.api.http` method option; field-level
//! overrides from the `trellis.tags` field option. Extension values are read
//! dynamically through a [`prost_reflect::DescriptorPool`] built from the
//! request, so the plugin works with whatever annotation files the user
//! compiled against.
//!
//! Parameters (`--trellis_opt`):
//!
//! - `omitempty=<bool>` (default `true`): skip files whose services carry no
//!   HTTP rule. When disabled, unannotated methods are exposed as
//!   `POST /<package>.<Service>/<Method>` with the message as JSON body.

use anyhow::Context as _;
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::compiler::CodeGeneratorResponse;
use prost_types::compiler::code_generator_response;

mod bindings;
mod codegen;
mod diag;
mod extensions;
mod path_template;

pub use diag::Diagnostics;
pub use extensions::{CustomHttpPattern, Extensions, FieldTags, HttpRule, Pattern};

/// A diagnostic the plugin cannot recover from. The binary reports it on
/// standard error and exits with status 2.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FatalDiagnostic(pub String);

/// Plugin behavior configured through the protoc parameter string.
#[derive(Debug, Clone)]
pub struct Options {
    /// Skip proto files whose services carry no `google.api.http` rule.
    pub omitempty: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { omitempty: true }
    }
}

impl Options {
    /// Parse a comma-separated `key=value` parameter string.
    pub fn parse(parameter: &str) -> anyhow::Result<Self> {
        let mut options = Self::default();

        for part in parameter.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let (key, value) = part.split_once('=').unwrap_or((part, "true"));
            match key {
                "omitempty" => {
                    options.omitempty = value
                        .parse()
                        .with_context(|| format!("invalid boolean for omitempty: {value}"))?;
                }
                _ => anyhow::bail!("unknown parameter: {key}"),
            }
        }

        Ok(options)
    }
}

/// `CodeGeneratorRequest` with the file descriptors kept as raw bytes.
///
/// Decoding descriptors through `prost_types` would silently drop every
/// extension value (prost does not keep unknown fields), losing the
/// `google.api.http` options this plugin exists to read. The raw bytes are
/// re-framed as a `FileDescriptorSet` and handed to `prost_reflect` instead.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawCodeGeneratorRequest {
    /// The files protoc was asked to generate.
    #[prost(string, repeated, tag = "1")]
    pub file_to_generate: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// The comma-joined plugin parameters.
    #[prost(string, optional, tag = "2")]
    pub parameter: ::core::option::Option<::prost::alloc::string::String>,
    /// The version of the compiler that invoked us.
    #[prost(message, optional, tag = "3")]
    pub compiler_version: ::core::option::Option<::prost_types::compiler::Version>,
    /// Every file descriptor in the compilation, imports included, as raw
    /// `FileDescriptorProto` bytes.
    #[prost(bytes, repeated, tag = "15")]
    pub proto_file: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct RawFileDescriptorSet {
    #[prost(bytes, repeated, tag = "1")]
    file: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

fn build_descriptor_pool(request: &RawCodeGeneratorRequest) -> anyhow::Result<DescriptorPool> {
    let set = RawFileDescriptorSet {
        file: request.proto_file.clone(),
    };
    DescriptorPool::decode(set.encode_to_vec().as_slice()).context("failed to decode file descriptor set")
}

/// Run generation for a decoded request, collecting warnings into `diag`.
pub fn generate_with_diagnostics(
    request: &RawCodeGeneratorRequest,
    diag: &mut Diagnostics,
) -> anyhow::Result<CodeGeneratorResponse> {
    let options = Options::parse(request.parameter.as_deref().unwrap_or(""))?;
    let pool = build_descriptor_pool(request)?;
    let extensions = Extensions::new(&pool);

    let mut files = Vec::new();
    for name in &request.file_to_generate {
        let file = pool
            .get_file_by_name(name)
            .with_context(|| format!("file not present in request: {name}"))?;

        let generated = codegen::generate_file(
            &file,
            &options,
            request.compiler_version.as_ref(),
            &extensions,
            diag,
        )?;
        files.extend(generated);
    }

    Ok(CodeGeneratorResponse {
        file: files,
        supported_features: Some(code_generator_response::Feature::Proto3Optional as u64),
        ..Default::default()
    })
}

/// Run generation for a decoded request, printing warnings to standard error.
pub fn generate(request: &RawCodeGeneratorRequest) -> anyhow::Result<CodeGeneratorResponse> {
    let mut diag = Diagnostics::new();
    generate_with_diagnostics(request, &mut diag)
}

/// Print a fatal diagnostic to standard error. The caller decides the exit.
pub fn report_fatal(fatal: &FatalDiagnostic) {
    diag::error(fatal);
}
