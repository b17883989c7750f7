//! Dynamic extraction of the extension options this plugin reads:
//! `google.api.http` on methods and `trellis.tags` on fields.
//!
//! Extension values are looked up by full name in the descriptor pool built
//! from the request and re-decoded into local mirror types, so the plugin
//! never links generated googleapis code. A pool without the annotation
//! imports simply yields no rules.

use prost::Message;
use prost_reflect::{
    DescriptorPool, DynamicMessage, ExtensionDescriptor, FieldDescriptor, FileDescriptor, MethodDescriptor,
    ServiceDescriptor, Value,
};

/// Mirror of `google.api.HttpRule` (`google/api/http.proto`).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HttpRule {
    /// The method this rule applies to, unused by protoc plugins.
    #[prost(string, tag = "1")]
    pub selector: ::prost::alloc::string::String,
    /// The field of the request message bound from the request body.
    /// `*` binds the whole message.
    #[prost(string, tag = "7")]
    pub body: ::prost::alloc::string::String,
    /// The field of the reply message serialized as the response body.
    #[prost(string, tag = "12")]
    pub response_body: ::prost::alloc::string::String,
    /// Secondary exposures of the same method.
    #[prost(message, repeated, tag = "11")]
    pub additional_bindings: ::prost::alloc::vec::Vec<HttpRule>,
    /// The verb and path template.
    #[prost(oneof = "Pattern", tags = "2, 3, 4, 5, 6, 8")]
    pub pattern: ::core::option::Option<Pattern>,
}

/// The verb/template pattern of an [`HttpRule`].
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Pattern {
    /// `GET` with the given path template.
    #[prost(string, tag = "2")]
    Get(::prost::alloc::string::String),
    /// `PUT` with the given path template.
    #[prost(string, tag = "3")]
    Put(::prost::alloc::string::String),
    /// `POST` with the given path template.
    #[prost(string, tag = "4")]
    Post(::prost::alloc::string::String),
    /// `DELETE` with the given path template.
    #[prost(string, tag = "5")]
    Delete(::prost::alloc::string::String),
    /// `PATCH` with the given path template.
    #[prost(string, tag = "6")]
    Patch(::prost::alloc::string::String),
    /// Any other verb.
    #[prost(message, tag = "8")]
    Custom(CustomHttpPattern),
}

/// Mirror of `google.api.CustomHttpPattern`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CustomHttpPattern {
    /// The verb, e.g. `HEAD`.
    #[prost(string, tag = "1")]
    pub kind: ::prost::alloc::string::String,
    /// The path template.
    #[prost(string, tag = "2")]
    pub path: ::prost::alloc::string::String,
}

/// Mirror of the `trellis.FieldTags` message from `trellis/annotations.proto`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldTags {
    /// Name used when the field is bound from the query string.
    #[prost(string, tag = "1")]
    pub query: ::prost::alloc::string::String,
    /// Bind the field from this request header instead of the query string.
    #[prost(string, tag = "2")]
    pub header: ::prost::alloc::string::String,
    /// Exclude the field from HTTP binding entirely.
    #[prost(bool, tag = "3")]
    pub skip: bool,
}

const HTTP_RULE_EXTENSION: &str = "google.api.http";
const FIELD_TAGS_EXTENSION: &str = "trellis.tags";

/// Resolved extension descriptors for one plugin run.
#[derive(Debug)]
pub struct Extensions {
    http_rule: Option<ExtensionDescriptor>,
    field_tags: Option<ExtensionDescriptor>,
    has_service_options: bool,
    has_file_options: bool,
}

impl Extensions {
    /// Look up the extensions in `pool`. Missing imports are not an error.
    pub fn new(pool: &DescriptorPool) -> Self {
        Self {
            http_rule: pool.get_extension_by_name(HTTP_RULE_EXTENSION),
            field_tags: pool.get_extension_by_name(FIELD_TAGS_EXTENSION),
            has_service_options: pool.get_message_by_name("google.protobuf.ServiceOptions").is_some(),
            has_file_options: pool.get_message_by_name("google.protobuf.FileOptions").is_some(),
        }
    }

    /// The `google.api.http` rule attached to `method`, if any.
    pub fn http_rule(&self, method: &MethodDescriptor) -> Option<HttpRule> {
        decode_extension(&method.options(), self.http_rule.as_ref()?)
    }

    /// The `trellis.tags` overrides attached to `field`, if any.
    pub fn field_tags(&self, field: &FieldDescriptor) -> Option<FieldTags> {
        decode_extension(&field.options(), self.field_tags.as_ref()?)
    }

    /// Whether any non-streaming method in `file` carries an HTTP rule.
    pub fn has_http_rules(&self, file: &FileDescriptor) -> bool {
        file.services().any(|service| {
            service
                .methods()
                .filter(|method| !method.is_client_streaming() && !method.is_server_streaming())
                .any(|method| self.http_rule(&method).is_some())
        })
    }

    /// Whether `service` is marked deprecated.
    ///
    /// Only consulted when the pool carries `descriptor.proto`; a pool
    /// without it cannot have options set anywhere.
    pub fn service_deprecated(&self, service: &ServiceDescriptor) -> bool {
        if !self.has_service_options {
            return false;
        }
        service
            .options()
            .get_field_by_name("deprecated")
            .map(|value| value.as_ref() == &Value::Bool(true))
            .unwrap_or(false)
    }

    /// Whether `file` is marked deprecated.
    pub fn file_deprecated(&self, file: &FileDescriptor) -> bool {
        if !self.has_file_options {
            return false;
        }
        file.options()
            .get_field_by_name("deprecated")
            .map(|value| value.as_ref() == &Value::Bool(true))
            .unwrap_or(false)
    }
}

fn decode_extension<T: Message + Default>(options: &DynamicMessage, extension: &ExtensionDescriptor) -> Option<T> {
    if !options.has_extension(extension) {
        return None;
    }

    let value = options.get_extension(extension);
    let Value::Message(message) = value.as_ref() else {
        return None;
    };

    T::decode(message.encode_to_vec().as_slice()).ok()
}

impl HttpRule {
    /// The verb and template of this rule, when the pattern is set.
    pub fn verb_and_template(&self) -> Option<(HttpVerb, &str)> {
        match self.pattern.as_ref()? {
            Pattern::Get(path) => Some((HttpVerb::Get, path)),
            Pattern::Put(path) => Some((HttpVerb::Put, path)),
            Pattern::Post(path) => Some((HttpVerb::Post, path)),
            Pattern::Delete(path) => Some((HttpVerb::Delete, path)),
            Pattern::Patch(path) => Some((HttpVerb::Patch, path)),
            Pattern::Custom(custom) => Some((HttpVerb::Custom(custom.kind.clone()), &custom.path)),
        }
    }
}

/// The HTTP verb of one binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpVerb {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
    /// Any other verb, e.g. `HEAD`.
    Custom(String),
}

impl HttpVerb {
    /// The verb in upper case, as used in diagnostics.
    pub fn as_str(&self) -> &str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Put => "PUT",
            HttpVerb::Post => "POST",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Custom(kind) => kind,
        }
    }

    /// Whether requests with this verb carry a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, HttpVerb::Get | HttpVerb::Delete)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn verb_and_template() {
        let rule = HttpRule {
            pattern: Some(Pattern::Get("/v1/messages/{message_id}".to_owned())),
            ..Default::default()
        };
        let (verb, template) = rule.verb_and_template().unwrap();
        assert_eq!(verb, HttpVerb::Get);
        assert_eq!(template, "/v1/messages/{message_id}");

        assert!(HttpRule::default().verb_and_template().is_none());
    }

    #[test]
    fn custom_pattern() {
        let rule = HttpRule {
            pattern: Some(Pattern::Custom(CustomHttpPattern {
                kind: "HEAD".to_owned(),
                path: "/v1/messages".to_owned(),
            })),
            ..Default::default()
        };
        let (verb, template) = rule.verb_and_template().unwrap();
        assert_eq!(verb.as_str(), "HEAD");
        assert_eq!(template, "/v1/messages");
        assert!(verb.allows_body());
    }

    #[test]
    fn body_verbs() {
        assert!(!HttpVerb::Get.allows_body());
        assert!(!HttpVerb::Delete.allows_body());
        assert!(HttpVerb::Post.allows_body());
        assert!(HttpVerb::Put.allows_body());
        assert!(HttpVerb::Patch.allows_body());
    }
}
