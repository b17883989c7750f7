//! Functional tests for the plugin pipeline: build a `CodeGeneratorRequest`
//! the way protoc would, run generation in-process, and assert on the
//! produced source text.
//!
//! The descriptors are assembled from local mirror structs because
//! `prost_types` drops extension values on decode; encoding mirrors with the
//! extension fields declared at their real tags produces exactly the bytes
//! protoc would hand the plugin.

use prost::Message;
use prost_types::descriptor_proto::ExtensionRange;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use protoc_gen_trellis::{
    Diagnostics, FatalDiagnostic, FieldTags, HttpRule, Pattern, RawCodeGeneratorRequest, generate_with_diagnostics,
};

// ---------------------------------------------------------------------------
// Descriptor mirrors that can carry extension values
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message)]
struct TestMethodOptions {
    #[prost(message, optional, tag = "72295728")]
    http: Option<HttpRule>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct TestFieldOptions {
    #[prost(message, optional, tag = "54901")]
    tags: Option<FieldTags>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct TestMethod {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(string, optional, tag = "2")]
    input_type: Option<String>,
    #[prost(string, optional, tag = "3")]
    output_type: Option<String>,
    #[prost(message, optional, tag = "4")]
    options: Option<TestMethodOptions>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct TestService {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    method: Vec<TestMethod>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct TestField {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(int32, optional, tag = "3")]
    number: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    label: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    r#type: Option<i32>,
    #[prost(string, optional, tag = "6")]
    type_name: Option<String>,
    #[prost(message, optional, tag = "8")]
    options: Option<TestFieldOptions>,
    #[prost(string, optional, tag = "10")]
    json_name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct TestMessage {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    field: Vec<TestField>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct TestFile {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(string, optional, tag = "2")]
    package: Option<String>,
    #[prost(string, repeated, tag = "3")]
    dependency: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    message_type: Vec<TestMessage>,
    #[prost(message, repeated, tag = "6")]
    service: Vec<TestService>,
    #[prost(string, optional, tag = "12")]
    syntax: Option<String>,
}

// ---------------------------------------------------------------------------
// Dependency descriptors, as protoc would include them
// ---------------------------------------------------------------------------

fn options_message(name: &str) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_owned()),
        extension_range: vec![ExtensionRange {
            start: Some(1000),
            end: Some(536870912),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn descriptor_stub() -> Vec<u8> {
    FileDescriptorProto {
        name: Some("google/protobuf/descriptor.proto".to_owned()),
        package: Some("google.protobuf".to_owned()),
        message_type: vec![options_message("MethodOptions"), options_message("FieldOptions")],
        ..Default::default()
    }
    .encode_to_vec()
}

fn proto_field(name: &str, number: i32, r#type: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(r#type as i32),
        json_name: Some(name.to_owned()),
        ..Default::default()
    }
}

fn proto_message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_owned()),
        ..proto_field(name, number, Type::Message)
    }
}

fn http_proto() -> Vec<u8> {
    let mut additional = proto_message_field("additional_bindings", 11, ".google.api.HttpRule");
    additional.label = Some(Label::Repeated as i32);

    FileDescriptorProto {
        name: Some("google/api/http.proto".to_owned()),
        package: Some("google.api".to_owned()),
        message_type: vec![
            DescriptorProto {
                name: Some("HttpRule".to_owned()),
                field: vec![
                    proto_field("selector", 1, Type::String),
                    proto_field("get", 2, Type::String),
                    proto_field("put", 3, Type::String),
                    proto_field("post", 4, Type::String),
                    proto_field("delete", 5, Type::String),
                    proto_field("patch", 6, Type::String),
                    proto_message_field("custom", 8, ".google.api.CustomHttpPattern"),
                    proto_field("body", 7, Type::String),
                    additional,
                    proto_field("response_body", 12, Type::String),
                ],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("CustomHttpPattern".to_owned()),
                field: vec![proto_field("kind", 1, Type::String), proto_field("path", 2, Type::String)],
                ..Default::default()
            },
        ],
        ..Default::default()
    }
    .encode_to_vec()
}

fn annotations_proto() -> Vec<u8> {
    let mut extension = proto_message_field("http", 72295728, ".google.api.HttpRule");
    extension.extendee = Some(".google.protobuf.MethodOptions".to_owned());

    FileDescriptorProto {
        name: Some("google/api/annotations.proto".to_owned()),
        package: Some("google.api".to_owned()),
        dependency: vec![
            "google/api/http.proto".to_owned(),
            "google/protobuf/descriptor.proto".to_owned(),
        ],
        extension: vec![extension],
        ..Default::default()
    }
    .encode_to_vec()
}

fn trellis_annotations_proto() -> Vec<u8> {
    let mut extension = proto_message_field("tags", 54901, ".trellis.FieldTags");
    extension.extendee = Some(".google.protobuf.FieldOptions".to_owned());

    FileDescriptorProto {
        name: Some("trellis/annotations.proto".to_owned()),
        package: Some("trellis".to_owned()),
        dependency: vec!["google/protobuf/descriptor.proto".to_owned()],
        message_type: vec![DescriptorProto {
            name: Some("FieldTags".to_owned()),
            field: vec![
                proto_field("query", 1, Type::String),
                proto_field("header", 2, Type::String),
                proto_field("skip", 3, Type::Bool),
            ],
            ..Default::default()
        }],
        extension: vec![extension],
        ..Default::default()
    }
    .encode_to_vec()
}

// ---------------------------------------------------------------------------
// The service under test
// ---------------------------------------------------------------------------

fn string_field(name: &str, number: i32) -> TestField {
    TestField {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::String as i32),
        json_name: Some(name.to_owned()),
        ..Default::default()
    }
}

fn int_field(name: &str, number: i32) -> TestField {
    TestField {
        r#type: Some(Type::Int32 as i32),
        ..string_field(name, number)
    }
}

fn get_rule(template: &str) -> HttpRule {
    HttpRule {
        pattern: Some(Pattern::Get(template.to_owned())),
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str, rule: Option<HttpRule>) -> TestMethod {
    TestMethod {
        name: Some(name.to_owned()),
        input_type: Some(input.to_owned()),
        output_type: Some(output.to_owned()),
        options: rule.map(|http| TestMethodOptions { http: Some(http) }),
    }
}

fn messaging_file(get_message_rule: Option<HttpRule>, revision_tags: Option<FieldTags>) -> Vec<u8> {
    TestFile {
        name: Some("helloworld.proto".to_owned()),
        package: Some("helloworld".to_owned()),
        dependency: vec![
            "google/api/annotations.proto".to_owned(),
            "trellis/annotations.proto".to_owned(),
        ],
        syntax: Some("proto3".to_owned()),
        message_type: vec![
            TestMessage {
                name: Some("GetMessageRequest".to_owned()),
                field: vec![
                    string_field("message_id", 1),
                    TestField {
                        options: revision_tags.map(|tags| TestFieldOptions { tags: Some(tags) }),
                        ..int_field("revision", 2)
                    },
                ],
            },
            TestMessage {
                name: Some("Message".to_owned()),
                field: vec![string_field("text", 1)],
            },
        ],
        service: vec![TestService {
            name: Some("Messaging".to_owned()),
            method: vec![
                method(
                    "GetMessage",
                    ".helloworld.GetMessageRequest",
                    ".helloworld.Message",
                    get_message_rule,
                ),
                method(
                    "CreateMessage",
                    ".helloworld.Message",
                    ".helloworld.Message",
                    Some(HttpRule {
                        pattern: Some(Pattern::Post("/v1/messages".to_owned())),
                        body: "*".to_owned(),
                        ..Default::default()
                    }),
                ),
            ],
        }],
    }
    .encode_to_vec()
}

fn request(files: Vec<Vec<u8>>, targets: &[&str], parameter: Option<&str>) -> RawCodeGeneratorRequest {
    RawCodeGeneratorRequest {
        file_to_generate: targets.iter().map(|name| (*name).to_owned()).collect(),
        parameter: parameter.map(str::to_owned),
        compiler_version: None,
        proto_file: files,
    }
}

fn annotated_request(get_message_rule: Option<HttpRule>, revision_tags: Option<FieldTags>) -> RawCodeGeneratorRequest {
    request(
        vec![
            descriptor_stub(),
            http_proto(),
            annotations_proto(),
            trellis_annotations_proto(),
            messaging_file(get_message_rule, revision_tags),
        ],
        &["helloworld.proto"],
        None,
    )
}

fn assert_contains(content: &str, needle: &str) {
    assert!(
        content.contains(needle),
        "expected to find {needle:?} in generated file:\n{content}"
    );
}

fn assert_not_contains(content: &str, needle: &str) {
    assert!(
        !content.contains(needle),
        "unexpected {needle:?} found in generated file:\n{content}"
    );
}

fn generated_content(request: &RawCodeGeneratorRequest, diag: &mut Diagnostics) -> String {
    let response = generate_with_diagnostics(request, diag).expect("generation succeeds");
    assert_eq!(response.file.len(), 1, "expected exactly one generated file");
    assert_eq!(response.file[0].name(), "helloworld.trellis.rs");
    response.file[0].content().to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn generates_server_router_and_client() {
    let mut diag = Diagnostics::quiet();
    let content = generated_content(
        &annotated_request(Some(get_rule("/v1/messages/{message_id}")), None),
        &mut diag,
    );

    assert_contains(&content, "// Code generated by protoc-gen-trellis. DO NOT EDIT.");
    assert_contains(&content, "// source: helloworld.proto");
    assert_contains(&content, "pub mod messaging_http");

    // Operation constants.
    assert_contains(&content, "OPERATION_MESSAGING_GET_MESSAGE");
    assert_contains(&content, "\"/helloworld.Messaging/GetMessage\"");
    assert_contains(&content, "OPERATION_MESSAGING_CREATE_MESSAGE");

    // Server trait.
    assert_contains(&content, "pub trait MessagingHttpServer");
    assert_contains(&content, "fn get_message(");
    assert_contains(&content, "fn create_message(");

    // Routes: the template passes through in axum syntax.
    assert_contains(&content, "\"/v1/messages/{message_id}\"");
    assert_contains(&content, "routing::get(GetMessage_0::<T>");
    assert_contains(&content, "routing::post(CreateMessage_0::<T>");
    assert_contains(&content, "pub struct MessagingHttpRouter");
    assert_contains(&content, "pub fn into_router_with");

    // Path binding lands in the request message; revision stays in the query.
    assert_contains(&content, "#[serde(rename = \"message_id\")]");
    assert_contains(&content, "#[serde(rename = \"revision\")]");
    assert_contains(&content, "target.message_id = path.field_0;");

    // The POST binding deserializes the whole message from the body.
    assert_contains(&content, "deserialize_body");

    // Client.
    assert_contains(&content, "pub struct MessagingHttpClient");
    assert_contains(&content, "pub async fn get_message(");
    assert_contains(&content, "\"/v1/messages/{}\"");
    assert_contains(&content, "path_value");

    assert!(diag.warnings().is_empty(), "unexpected warnings: {:?}", diag.warnings());
}

#[test]
fn additional_bindings_get_their_own_routes() {
    let rule = HttpRule {
        pattern: Some(Pattern::Get("/v1/messages/{message_id}".to_owned())),
        additional_bindings: vec![get_rule("/legacy/messages/{message_id}")],
        ..Default::default()
    };

    let mut diag = Diagnostics::quiet();
    let content = generated_content(&annotated_request(Some(rule), None), &mut diag);

    // The additional binding registers first, the primary last.
    assert_contains(&content, "GetMessage_0");
    assert_contains(&content, "GetMessage_1");
    assert_contains(&content, "\"/legacy/messages/{message_id}\"");
    assert_contains(&content, "\"/v1/messages/{message_id}\"");

    // Both routes share one operation constant, and the client calls the
    // primary exposure.
    assert_contains(&content, "\"/v1/messages/{}\"");
    assert_not_contains(&content, "\"/legacy/messages/{}\"");
}

#[test]
fn header_tags_bind_from_headers() {
    let tags = FieldTags {
        header: "x-revision".to_owned(),
        ..Default::default()
    };

    let mut diag = Diagnostics::quiet();
    let content = generated_content(
        &annotated_request(Some(get_rule("/v1/messages/{message_id}")), Some(tags)),
        &mut diag,
    );

    assert_contains(&content, "header_value");
    assert_contains(&content, "\"x-revision\"");
    assert_not_contains(&content, "#[serde(rename = \"revision\")]");
}

#[test]
fn query_rename_tag_applies() {
    let tags = FieldTags {
        query: "rev".to_owned(),
        ..Default::default()
    };

    let mut diag = Diagnostics::quiet();
    let content = generated_content(
        &annotated_request(Some(get_rule("/v1/messages/{message_id}")), Some(tags)),
        &mut diag,
    );

    assert_contains(&content, "#[serde(rename = \"rev\")]");
    assert_not_contains(&content, "#[serde(rename = \"revision\")]");
}

#[test]
fn response_body_selects_a_reply_field() {
    let rule = HttpRule {
        pattern: Some(Pattern::Get("/v1/messages/{message_id}".to_owned())),
        response_body: "text".to_owned(),
        ..Default::default()
    };

    let mut diag = Diagnostics::quiet();
    let content = generated_content(&annotated_request(Some(rule), None), &mut diag);

    assert_contains(&content, "Json(reply.text)");
}

#[test]
fn get_with_body_warns() {
    let rule = HttpRule {
        pattern: Some(Pattern::Get("/v1/messages/{message_id}".to_owned())),
        body: "*".to_owned(),
        ..Default::default()
    };

    let mut diag = Diagnostics::quiet();
    generated_content(&annotated_request(Some(rule), None), &mut diag);

    assert!(
        diag.warnings().iter().any(|w| w.contains("body should not be declared")),
        "missing warning in {:?}",
        diag.warnings()
    );
}

#[test]
fn missing_path_field_is_fatal() {
    let mut diag = Diagnostics::quiet();
    let err = generate_with_diagnostics(
        &annotated_request(Some(get_rule("/v1/messages/{nope}")), None),
        &mut diag,
    )
    .expect_err("unresolvable path variables are fatal");

    assert!(err.downcast_ref::<FatalDiagnostic>().is_some());
}

#[test]
fn omitempty_skips_files_without_rules() {
    // No annotation imports at all: a plain prost_types descriptor works.
    let plain = FileDescriptorProto {
        name: Some("plain.proto".to_owned()),
        package: Some("plain".to_owned()),
        syntax: Some("proto3".to_owned()),
        message_type: vec![DescriptorProto {
            name: Some("Ping".to_owned()),
            field: vec![proto_field("value", 1, Type::String)],
            ..Default::default()
        }],
        service: vec![prost_types::ServiceDescriptorProto {
            name: Some("Pinger".to_owned()),
            method: vec![prost_types::MethodDescriptorProto {
                name: Some("Ping".to_owned()),
                input_type: Some(".plain.Ping".to_owned()),
                output_type: Some(".plain.Ping".to_owned()),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
    .encode_to_vec();

    let mut diag = Diagnostics::quiet();
    let response =
        generate_with_diagnostics(&request(vec![plain.clone()], &["plain.proto"], None), &mut diag).unwrap();
    assert!(response.file.is_empty());

    // With omitempty disabled the method gets the default POST exposure.
    let response = generate_with_diagnostics(
        &request(vec![plain], &["plain.proto"], Some("omitempty=false")),
        &mut diag,
    )
    .unwrap();
    assert_eq!(response.file.len(), 1);
    let content = response.file[0].content();
    assert_contains(content, "\"/plain.Pinger/Ping\"");
    assert_contains(content, "routing::post(Ping_0::<T>");
    assert_contains(content, "deserialize_body");
}

#[test]
fn unknown_parameters_are_reported() {
    let err = generate_with_diagnostics(
        &request(vec![], &[], Some("paths=source_relative")),
        &mut Diagnostics::quiet(),
    )
    .expect_err("unknown parameters are rejected");
    assert!(format!("{err:#}").contains("unknown parameter"));
}
