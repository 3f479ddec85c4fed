//! Caller-supplied parameters.
//!
//! Every operation takes either a single string or anything that serializes
//! to a JSON object. The typed structs below cover the documented operations;
//! `serde_json::Value` and [`Attributes`] work for free-form calls
//! (`find` filters, relations). Shape, required keys and closed key sets are
//! checked before a request is built.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{UsersError, UsersResult};
use crate::operation::{OperationDescriptor, Shape};

/// A validated domain-format (snake_case) key-value parameter set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `params` and require the result to be a mapping.
    pub fn from_params<P: Serialize + ?Sized>(params: &P) -> UsersResult<Self> {
        let value = serde_json::to_value(params).map_err(|e| UsersError::InvalidParam(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> UsersResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(UsersError::InvalidParam(format!("{other} is not a mapping"))),
        }
    }

    /// A one-key parameter set built from a scalar argument.
    pub fn scalar(key: &str, value: &str) -> UsersResult<Self> {
        if value.trim().is_empty() {
            return Err(UsersError::InvalidParam(format!("{key} must be a non-empty string")));
        }
        let mut attrs = Self::new();
        attrs.insert(key, value);
        Ok(attrs)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// String view of a scalar attribute. Numbers and booleans are rendered;
    /// nested values yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(scalar_to_string)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Check shape, required and permitted keys for `descriptor`. A scalar
    /// operation takes exactly its one key, holding a non-blank string.
    pub fn validate(&self, descriptor: &OperationDescriptor) -> UsersResult<()> {
        if let Shape::Scalar(key) = descriptor.shape {
            let single = self.0.len() == 1
                && matches!(self.0.get(key), Some(Value::String(s)) if !s.trim().is_empty());
            if !single {
                return Err(UsersError::InvalidParam(format!(
                    "{} takes a single non-blank `{key}`",
                    descriptor.name
                )));
            }
        }
        if let Some(missing) = descriptor.required.iter().find(|key| self.get(key).is_none()) {
            return Err(UsersError::InvalidParam(format!(
                "{} requires `{missing}`",
                descriptor.name
            )));
        }
        if let Some(permitted) = descriptor.permitted {
            if let Some(unknown) = self.0.keys().find(|key| !permitted.contains(&key.as_str())) {
                return Err(UsersError::InvalidParam(format!(
                    "{} does not accept `{unknown}`",
                    descriptor.name
                )));
            }
        }
        Ok(())
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Attributes for `create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Attributes for `update`. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserChanges {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Filter for `find`. Alternatives in `or` are sent as a `$or` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "$or", skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<UserFilter>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Identifies one contact of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactKey {
    pub user_id: String,
    pub contact_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactChanges {
    pub user_id: String,
    pub contact_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

/// Identifies one address of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressKey {
    pub user_id: String,
    pub address_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressChanges {
    pub user_id: String,
    pub address_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignUp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub email: String,
    pub password: String,
}

/// Attributes for `log_in`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub verify_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub email_token: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasswordUpdate {
    pub user_id: String,
    pub password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailUpdate {
    pub user_id: String,
    pub email: String,
}
