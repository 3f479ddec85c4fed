//! Response decoding and status dispatch.
//!
//! # Design
//! Every operation goes through [`check_status`]: a 200 passes, a status the
//! operation maps becomes `Validation` or `AuthFailed` with a message built
//! from the body's `message` and `errors` fields, and anything else becomes
//! `GenericError` carrying the raw status and body. Success bodies are parsed
//! once and transcoded to snake_case; `meta` subtrees stay verbatim so opaque
//! metadata comes back exactly as it was sent.

use serde_json::{Map, Value};

use crate::case::to_domain_preserving;
use crate::error::{UsersError, UsersResult};
use crate::http::HttpResponse;
use crate::operation::{Operation, Rejection, SUCCESS_STATUS};

/// Keys whose values are never transcoded.
const OPAQUE_KEYS: &[&str] = &["meta"];

/// Map a non-success status to the error the operation assigns to it.
pub fn check_status(op: Operation, response: &HttpResponse) -> UsersResult<()> {
    if response.status == SUCCESS_STATUS {
        return Ok(());
    }
    let err = match op.rejection(response.status) {
        Some(Rejection::Validation) => UsersError::Validation(error_message(&response.body)),
        Some(Rejection::AuthFailed) => UsersError::AuthFailed(error_message(&response.body)),
        None => UsersError::GenericError {
            status: response.status,
            body: response.body.clone(),
        },
    };
    tracing::warn!(operation = op.name(), status = response.status, error = %err, "request rejected");
    Err(err)
}

/// Check the status and return the body in domain format. An empty body
/// decodes to `Value::Null`.
pub fn decode(op: Operation, response: &HttpResponse) -> UsersResult<Value> {
    check_status(op, response)?;
    let body = response.body.trim();
    if body.is_empty() {
        return Ok(Value::Null);
    }
    let wire: Value = serde_json::from_str(body)
        .map_err(|e| UsersError::Decode(format!("{}: {e}", op.name())))?;
    tracing::debug!(operation = op.name(), "decoded response");
    Ok(to_domain_preserving(&wire, OPAQUE_KEYS))
}

/// Check the status of an operation whose only result is success.
pub fn decode_ack(op: Operation, response: &HttpResponse) -> UsersResult<bool> {
    check_status(op, response)?;
    Ok(true)
}

/// Decode a body that must be a single object.
pub fn decode_object(op: Operation, response: &HttpResponse) -> UsersResult<Map<String, Value>> {
    match decode(op, response)? {
        Value::Object(map) => Ok(map),
        other => Err(UsersError::Decode(format!(
            "{}: expected an object, got {other}",
            op.name()
        ))),
    }
}

/// Decode a body that must be an array of objects. Order is preserved and
/// nothing is deduplicated.
pub fn decode_list(op: Operation, response: &HttpResponse) -> UsersResult<Vec<Map<String, Value>>> {
    match decode(op, response)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(UsersError::Decode(format!(
                    "{}: expected an object, got {other}",
                    op.name()
                ))),
            })
            .collect(),
        other => Err(UsersError::Decode(format!(
            "{}: expected an array, got {other}",
            op.name()
        ))),
    }
}

/// `"<message> <errors>"` from an error body; the raw body when it is not a
/// JSON object.
///
/// The result is trimmed: a body without `errors` yields just the message,
/// with no trailing space, and one without `message` yields just the errors.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            let part = |key: &str| match map.get(key) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            format!("{} {}", part("message"), part("errors")).trim().to_string()
        }
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ERROR_BODY: &str = r#"{"code":"ValidationError","message":"Field error description","errors":"Optional array with detail of errors"}"#;

    #[test]
    fn mapped_statuses_raise_their_kind() {
        let err = check_status(Operation::Create, &HttpResponse::new(400, ERROR_BODY)).unwrap_err();
        match err {
            UsersError::Validation(message) => {
                assert_eq!(message, "Field error description Optional array with detail of errors")
            }
            other => panic!("unexpected {other:?}"),
        }
        let err = check_status(Operation::Create, &HttpResponse::new(401, ERROR_BODY)).unwrap_err();
        assert!(matches!(err, UsersError::AuthFailed(_)));
    }

    #[test]
    fn unmapped_statuses_are_generic() {
        let err = check_status(Operation::Create, &HttpResponse::new(500, "boom")).unwrap_err();
        assert!(matches!(
            err,
            UsersError::GenericError { status: 500, ref body } if body == "boom"
        ));
        let err = check_status(Operation::Current, &HttpResponse::new(400, ERROR_BODY)).unwrap_err();
        assert!(matches!(err, UsersError::GenericError { status: 400, .. }));
    }

    #[test]
    fn error_message_handles_arrays_and_plain_bodies() {
        assert_eq!(
            error_message(r#"{"message":"Bad","errors":["a","b"]}"#),
            r#"Bad ["a","b"]"#
        );
        assert_eq!(error_message(r#"{"message":"Bad"}"#), "Bad");
        assert_eq!(error_message(r#"{"message":"Bad","errors":null}"#), "Bad");
        assert_eq!(error_message(r#"{"errors":["a"]}"#), r#"["a"]"#);
        assert_eq!(error_message("gateway down"), "gateway down");
    }

    #[test]
    fn decode_transcodes_but_keeps_meta() {
        let response = HttpResponse::new(
            200,
            r#"{"_id":"u1","firstName":"Ann","meta":{"data":{"someKey":1}}}"#,
        );
        let value = decode(Operation::Current, &response).unwrap();
        assert_eq!(
            value,
            json!({ "_id": "u1", "first_name": "Ann", "meta": { "data": { "someKey": 1 } } })
        );
    }

    #[test]
    fn empty_success_body_is_null() {
        assert_eq!(
            decode(Operation::LogOut, &HttpResponse::new(200, "")).unwrap(),
            Value::Null
        );
        assert!(decode_ack(Operation::LogOut, &HttpResponse::new(200, "OK")).unwrap());
    }

    #[test]
    fn malformed_success_bodies_are_decode_errors() {
        let err = decode(Operation::Find, &HttpResponse::new(200, "not json")).unwrap_err();
        assert!(matches!(err, UsersError::Decode(_)));
        let err = decode_list(Operation::Find, &HttpResponse::new(200, "{}")).unwrap_err();
        assert!(matches!(err, UsersError::Decode(_)));
        let err = decode_object(Operation::Create, &HttpResponse::new(200, "[]")).unwrap_err();
        assert!(matches!(err, UsersError::Decode(_)));
    }

    #[test]
    fn decode_list_preserves_order_and_duplicates() {
        let response = HttpResponse::new(200, r#"[{"_id":"b"},{"_id":"a"},{"_id":"b"}]"#);
        let items = decode_list(Operation::Find, &response).unwrap();
        let ids: Vec<_> = items.iter().map(|m| m["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["b", "a", "b"]);
    }
}
