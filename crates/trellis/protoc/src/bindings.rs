//! Binding resolution: the translation of one HTTP rule plus the input
//! message's field tree into a classification of where every field comes
//! from (path, query, header, or body), together with the validation
//! warnings for rule/verb mismatches.
//!
//! The resolved [`MethodBinding`] is the single source of truth for both the
//! server and the client generators.

use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor, MethodDescriptor};

use crate::FatalDiagnostic;
use crate::diag::Diagnostics;
use crate::extensions::{Extensions, HttpRule, HttpVerb};
use crate::path_template::PathTemplate;

/// One HTTP exposure of one RPC method.
#[derive(Debug)]
pub struct MethodBinding {
    /// The verb this binding is routed under.
    pub verb: HttpVerb,
    /// The parsed path template.
    pub template: PathTemplate,
    /// Fields bound from path segments, in template order.
    pub path_fields: Vec<PathField>,
    /// Top-level fields bound from the query string.
    pub query_fields: Vec<QueryField>,
    /// Top-level fields bound from request headers.
    pub header_fields: Vec<HeaderField>,
    /// Where the request body lands.
    pub body: BodySource,
    /// The reply field serialized as the response body; `None` is the whole
    /// reply.
    pub response_body: Option<FieldDescriptor>,
}

/// A path variable resolved against the input message.
#[derive(Debug)]
pub struct PathField {
    /// The variable spelling in the template, e.g. `user.id`.
    pub variable: String,
    /// The field chain from the input message down to the bound leaf.
    pub chain: Vec<FieldDescriptor>,
    /// Whether the leaf can actually be populated from a path segment.
    /// Unbindable variables still match a segment, they just do not fill a
    /// field.
    pub bindable: bool,
}

/// A top-level field bound from the query string.
#[derive(Debug)]
pub struct QueryField {
    /// The query parameter name, after `trellis.tags` renames.
    pub name: String,
    /// The bound field.
    pub field: FieldDescriptor,
}

/// A top-level field bound from a request header.
#[derive(Debug)]
pub struct HeaderField {
    /// The header name.
    pub header: String,
    /// The bound field.
    pub field: FieldDescriptor,
}

/// Where the request body is deserialized into.
#[derive(Debug)]
pub enum BodySource {
    /// The binding consumes no body.
    None,
    /// The whole request message is deserialized from the body.
    Whole,
    /// A single top-level field is deserialized from the body.
    Field(FieldDescriptor),
}

impl MethodBinding {
    /// Resolve every binding of `rule`: additional bindings first, the
    /// primary rule last, matching the registration order of the source
    /// annotation.
    pub fn from_rule(
        method: &MethodDescriptor,
        rule: &HttpRule,
        extensions: &Extensions,
        diag: &mut Diagnostics,
    ) -> anyhow::Result<Vec<MethodBinding>> {
        let mut bindings = Vec::new();

        for additional in &rule.additional_bindings {
            if !additional.additional_bindings.is_empty() {
                diag.warn(format!(
                    "method {}: additional_bindings must not be nested",
                    method.full_name()
                ));
            }
            match Self::from_single_rule(method, additional, extensions, diag)? {
                Some(binding) => bindings.push(binding),
                None => continue,
            }
        }

        bindings.extend(Self::from_single_rule(method, rule, extensions, diag)?);
        Ok(bindings)
    }

    /// The implicit `POST /<package>.<Service>/<Method>` exposure used when a
    /// method has no rule and `omitempty` is disabled.
    pub fn default_binding(
        method: &MethodDescriptor,
        extensions: &Extensions,
        diag: &mut Diagnostics,
    ) -> anyhow::Result<MethodBinding> {
        let template = format!("/{}/{}", method.parent_service().full_name(), method.name());
        Self::resolve(method, HttpVerb::Post, &template, "*", "", extensions, diag)
    }

    fn from_single_rule(
        method: &MethodDescriptor,
        rule: &HttpRule,
        extensions: &Extensions,
        diag: &mut Diagnostics,
    ) -> anyhow::Result<Option<MethodBinding>> {
        let Some((verb, template)) = rule.verb_and_template() else {
            diag.warn(format!("method {}: http rule has no pattern", method.full_name()));
            return Ok(None);
        };

        Self::resolve(method, verb, template, &rule.body, &rule.response_body, extensions, diag).map(Some)
    }

    fn resolve(
        method: &MethodDescriptor,
        verb: HttpVerb,
        template: &str,
        body_selector: &str,
        response_body_selector: &str,
        extensions: &Extensions,
        diag: &mut Diagnostics,
    ) -> anyhow::Result<MethodBinding> {
        let input = method.input();
        let template = PathTemplate::parse(template, diag);

        if !verb.allows_body() && !body_selector.is_empty() {
            diag.warn(format!("{} {} body should not be declared", verb.as_str(), template.raw()));
        }
        if verb.allows_body() && body_selector.is_empty() {
            diag.warn(format!("{} {} does not declare a body", verb.as_str(), template.raw()));
        }

        let mut path_fields = Vec::new();
        for variable in template.variables() {
            path_fields.push(resolve_path_variable(&input, &variable.field_path, template.raw(), diag)?);
        }

        let body = resolve_body(&input, body_selector, diag);
        let response_body = resolve_response_body(&method.output(), response_body_selector, diag);

        let mut header_fields = Vec::new();
        let mut query_fields = Vec::new();

        for field in input.fields() {
            let tags = extensions.field_tags(&field).unwrap_or_default();
            if tags.skip {
                continue;
            }

            let path_bound = path_fields
                .iter()
                .any(|path_field| path_field.chain[0].name() == field.name());

            if !tags.header.is_empty() {
                if path_bound {
                    diag.warn(format!(
                        "field {} is bound from the path; its header tag is ignored",
                        field.full_name()
                    ));
                } else if field.is_list() || field.is_map() || !is_scalar(&field.kind()) {
                    diag.warn(format!(
                        "field {} cannot be bound from a header; only singular scalar fields can",
                        field.full_name()
                    ));
                } else {
                    header_fields.push(HeaderField {
                        header: tags.header.clone(),
                        field,
                    });
                }
                continue;
            }

            if path_bound {
                continue;
            }

            match &body {
                BodySource::Whole => continue,
                BodySource::Field(body_field) if body_field.name() == field.name() => continue,
                _ => {}
            }

            if !is_query_representable(&field) {
                continue;
            }

            let name = if tags.query.is_empty() {
                field.name().to_owned()
            } else {
                tags.query.clone()
            };
            query_fields.push(QueryField { name, field });
        }

        Ok(MethodBinding {
            verb,
            template,
            path_fields,
            query_fields,
            header_fields,
            body,
            response_body,
        })
    }
}

fn resolve_path_variable(
    input: &MessageDescriptor,
    field_path: &str,
    template: &str,
    diag: &mut Diagnostics,
) -> anyhow::Result<PathField> {
    let mut chain: Vec<FieldDescriptor> = Vec::new();
    let mut message = Some(input.clone());
    let mut parts = field_path.split('.').peekable();

    while let Some(part) = parts.next() {
        let field = message
            .as_ref()
            .and_then(|message| message.get_field_by_name(part))
            .ok_or_else(|| {
                FatalDiagnostic(format!(
                    "the field '{field_path}' declared in path '{template}' could not be found in message '{}'",
                    input.full_name()
                ))
            })?;

        if field.is_map() {
            diag.warn(format!("the field in path:'{field_path}' shouldn't be a map"));
        } else if field.is_list() {
            diag.warn(format!("the field in path:'{field_path}' shouldn't be a list"));
        }

        message = match field.kind() {
            Kind::Message(inner) if !field.is_map() => Some(inner),
            _ => None,
        };

        if parts.peek().is_some() && message.is_none() {
            return Err(FatalDiagnostic(format!(
                "the field '{field_path}' declared in path '{template}' does not traverse messages in '{}'",
                input.full_name()
            ))
            .into());
        }

        chain.push(field);
    }

    let leaf = chain.last().expect("split produces at least one part");
    let mut bindable = !leaf.is_list() && !leaf.is_map() && is_scalar(&leaf.kind());

    if bindable {
        if let Some(member) = non_synthetic_oneof_member(leaf) {
            diag.warn(format!(
                "the field in path:'{field_path}' is part of oneof '{member}' and cannot be bound"
            ));
            bindable = false;
        }
    }
    if !is_scalar(&leaf.kind()) && !leaf.is_map() && !leaf.is_list() {
        diag.warn(format!("the field in path:'{field_path}' shouldn't be a message"));
    }

    Ok(PathField {
        variable: field_path.to_owned(),
        chain,
        bindable,
    })
}

fn resolve_body(input: &MessageDescriptor, selector: &str, diag: &mut Diagnostics) -> BodySource {
    match selector {
        "" => BodySource::None,
        "*" => BodySource::Whole,
        name => match input.get_field_by_name(name) {
            Some(field) => {
                if let Some(member) = non_synthetic_oneof_member(&field) {
                    diag.warn(format!(
                        "the body field '{name}' is part of oneof '{member}'; binding the whole message instead"
                    ));
                    return BodySource::Whole;
                }
                BodySource::Field(field)
            }
            None => {
                diag.warn(format!(
                    "the body field '{name}' is not a field of message '{}'; binding the whole message instead",
                    input.full_name()
                ));
                BodySource::Whole
            }
        },
    }
}

fn resolve_response_body(
    output: &MessageDescriptor,
    selector: &str,
    diag: &mut Diagnostics,
) -> Option<FieldDescriptor> {
    match selector {
        "" | "*" => None,
        name => {
            let field = output.get_field_by_name(name);
            if field.is_none() {
                diag.warn(format!(
                    "the response_body field '{name}' is not a field of message '{}'; returning the whole reply",
                    output.full_name()
                ));
            }
            field
        }
    }
}

fn is_scalar(kind: &Kind) -> bool {
    !matches!(kind, Kind::Message(_) | Kind::Bytes)
}

fn is_query_representable(field: &FieldDescriptor) -> bool {
    if field.is_map() || non_synthetic_oneof_member(field).is_some() {
        return false;
    }
    is_scalar(&field.kind())
}

/// The containing oneof's name, for fields that are real oneof members.
/// Proto3 `optional` fields live in a synthetic single-member oneof named
/// `_<field>` and are not members in this sense.
fn non_synthetic_oneof_member(field: &FieldDescriptor) -> Option<String> {
    let oneof = field.containing_oneof()?;
    if oneof.name() == format!("_{}", field.name()) && oneof.fields().count() == 1 {
        return None;
    }
    Some(oneof.name().to_owned())
}
