//! Request building: validated domain attributes in, `HttpRequest` out.
//!
//! # Design
//! One routine serves every operation. It validates the parameter set
//! against the operation's table entry, transcodes keys to the wire format,
//! applies the scalar codecs (`birthDate`, `metadata` -> `meta`), applies the
//! few operation-specific rewrites (`update` and `find` identity keys, `$or`
//! filters), fills the path template positionally with each value escaped as
//! one path segment, and encodes the body.
//! Every failure here is an `InvalidParam` raised before any I/O.

use serde_json::{Map, Value};
use url::Url;

use crate::case::map_to_wire;
use crate::codec::{format_date_value, metadata_to_meta};
use crate::config::{Config, Endpoints};
use crate::error::{UsersError, UsersResult};
use crate::http::HttpRequest;
use crate::operation::{Encoding, Operation, Scope};
use crate::params::{scalar_to_string, Attributes};

pub const AUTHORIZATION: &str = "authorization";
pub const CONTENT_TYPE: &str = "content-type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Build the request for `op`. The application secret is read from `config`
/// on every call.
pub fn build(
    op: Operation,
    config: &Config,
    endpoints: &Endpoints,
    attrs: Attributes,
) -> UsersResult<HttpRequest> {
    let descriptor = op.descriptor();
    attrs.validate(descriptor)?;

    let wire = encode_attributes(op, attrs);
    let values = descriptor
        .path_params
        .iter()
        .map(|key| {
            let value = wire.get(*key).and_then(scalar_to_string).ok_or_else(|| {
                UsersError::InvalidParam(format!("{} requires `{key}`", descriptor.name))
            })?;
            path_segment(key, &value)
        })
        .collect::<UsersResult<Vec<_>>>()?;
    let path = fill_template(config.paths.template(op), &values)?;

    let base = match descriptor.scope {
        Scope::User => &endpoints.user_base,
        Scope::Auth => &endpoints.auth_base,
    };
    let mut url = format!("{base}{path}");
    let mut headers = vec![(
        AUTHORIZATION.to_string(),
        config.application_secret.clone(),
    )];

    let body = match descriptor.encoding {
        Encoding::Empty => None,
        Encoding::Json => {
            headers.push((CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string()));
            let body = serde_json::to_string(&wire)
                .map_err(|e| UsersError::InvalidParam(e.to_string()))?;
            Some(body)
        }
        Encoding::Form => {
            headers.push((CONTENT_TYPE.to_string(), FORM_CONTENT_TYPE.to_string()));
            Some(encode_form(&wire)?)
        }
        Encoding::Query => {
            url.push('?');
            url.push_str(&encode_form(&wire)?);
            None
        }
    };

    tracing::debug!(operation = descriptor.name, method = %descriptor.method, %url, "built request");
    Ok(HttpRequest {
        method: descriptor.method,
        url,
        headers,
        body,
    })
}

/// Wire-format attributes for `op`.
pub fn encode_attributes(op: Operation, attrs: Attributes) -> Map<String, Value> {
    let mut domain = attrs.into_map();
    let metadata = domain.remove("metadata").filter(|v| !v.is_null());

    let mut wire = map_to_wire(&domain, &[]);
    if let Some(birth_date) = wire.remove("birthDate") {
        wire.insert("birthDate".to_string(), format_date_value(birth_date));
    }
    if let Some(metadata) = metadata {
        wire.insert("meta".to_string(), metadata_to_meta(metadata));
    }

    match op {
        Operation::Update => {
            if let Some(id) = wire.get("id").cloned() {
                wire.insert("_id".to_string(), id);
            }
        }
        Operation::Find => {
            // `Id` and `id` both name the identity; the lowercase key wins.
            for key in ["Id", "id"] {
                if let Some(id) = wire.remove(key) {
                    wire.insert("_id".to_string(), id);
                }
            }
            if let Some(Value::Array(filters)) = wire.get_mut("$or") {
                for filter in filters.iter_mut() {
                    if !filter.is_object() {
                        *filter = Value::Null;
                    }
                }
            }
        }
        _ => {}
    }
    wire
}

/// Escape `value` so it fills exactly one path segment: `/`, `?`, `#` and `%`
/// are percent-encoded along with the rest of the URL path set. Dot segments
/// are rejected since clients and servers normalize them away.
pub fn path_segment(key: &str, value: &str) -> UsersResult<String> {
    let invalid =
        || UsersError::InvalidParam(format!("`{key}` cannot be used as a path segment: {value:?}"));
    if value.is_empty() || value == "." || value == ".." {
        return Err(invalid());
    }
    let mut scratch = Url::parse("http://localhost/").map_err(|_| invalid())?;
    scratch.path_segments_mut().map_err(|()| invalid())?.push(value);
    Ok(scratch.path().trim_start_matches('/').to_string())
}

/// Substitute `%s` placeholders in order. The number of placeholders must
/// equal the number of values.
pub fn fill_template(template: &str, values: &[String]) -> UsersResult<String> {
    let pieces: Vec<&str> = template.split("%s").collect();
    let placeholders = pieces.len() - 1;
    if placeholders != values.len() {
        return Err(UsersError::InvalidParam(format!(
            "path template `{template}` takes {placeholders} parameter(s), got {}",
            values.len()
        )));
    }
    let mut path = String::with_capacity(template.len() + values.iter().map(String::len).sum::<usize>());
    for (index, piece) in pieces.iter().enumerate() {
        path.push_str(piece);
        if let Some(value) = values.get(index) {
            path.push_str(value);
        }
    }
    Ok(path)
}

/// `application/x-www-form-urlencoded` rendering of a flat wire map. Nulls are
/// dropped; nested values travel as JSON text.
fn encode_form(wire: &Map<String, Value>) -> UsersResult<String> {
    let pairs: Vec<(&str, String)> = wire
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = scalar_to_string(value).unwrap_or_else(|| value.to_string());
            (key.as_str(), text)
        })
        .collect();
    serde_urlencoded::to_string(&pairs).map_err(|e| UsersError::InvalidParam(e.to_string()))
}
