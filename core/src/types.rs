//! Domain entities returned by the users API.
//!
//! # Design
//! Entities are plain attribute containers. `id` is only ever assigned from a
//! service response, so a locally built entity carries `id: None` until a
//! create or lookup round trip fills it in. `User` owns its contacts and
//! addresses by value; their `user_id` is a back reference only.
//!
//! The `from_domain` constructors read a response that has already been
//! transcoded to snake_case keys.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{meta_to_domain, parse_date};
use crate::params::scalar_to_string;

/// A user record.
///
/// Not synchronized: mutate a `User` (and its collections) from one thread
/// at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub roles: Option<Vec<String>>,
    pub created_at: Option<NaiveDate>,
    pub updated_at: Option<NaiveDate>,
    pub metadata: Option<Value>,
    pub contacts: Option<Vec<Contact>>,
    pub addresses: Option<Vec<Address>>,
    pub auth: Option<Auth>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub user_id: Option<String>,
}

/// Credentials or verification data produced by an auth operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub email: Option<String>,
    pub email_token: Option<String>,
}

/// Entities matched by service-assigned identity.
pub trait Identified {
    fn id(&self) -> Option<&str>;
}

impl Identified for User {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl Identified for Contact {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl Identified for Address {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Replace the element of `items` whose id equals `item`'s, or append `item`.
/// Other elements keep their positions. An element without an id never
/// matches. Returns the index `item` ended up at.
pub fn reconcile<T: Identified>(items: &mut Vec<T>, item: T) -> usize {
    let position = item
        .id()
        .and_then(|id| items.iter().position(|existing| existing.id() == Some(id)));
    match position {
        Some(index) => {
            items[index] = item;
            index
        }
        None => {
            items.push(item);
            items.len() - 1
        }
    }
}

/// Read-only view over a domain-format object.
pub(crate) struct Fields<'a>(pub &'a Map<String, Value>);

impl<'a> Fields<'a> {
    pub fn str(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(scalar_to_string)
    }

    /// First of `keys` that holds a scalar.
    pub fn first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.str(key))
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn date(&self, keys: &[&str]) -> Option<NaiveDate> {
        keys.iter().find_map(|key| parse_date(self.str(key).as_deref()))
    }

    pub fn strings(&self, key: &str) -> Option<Vec<String>> {
        let items = self.0.get(key)?.as_array()?;
        Some(items.iter().filter_map(scalar_to_string).collect())
    }

    pub fn objects(&self, key: &str) -> Option<Vec<&'a Map<String, Value>>> {
        let items = self.0.get(key)?.as_array()?;
        Some(items.iter().filter_map(Value::as_object).collect())
    }
}

impl User {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a user from a response object (`_id`, `meta.data`, nested
    /// contacts and addresses).
    pub fn from_domain(map: &Map<String, Value>) -> Self {
        let fields = Fields(map);
        let id = fields.first_str(&["_id", "id", "user_id"]);
        let contacts = fields.objects("contacts").map(|items| {
            items
                .into_iter()
                .map(|item| Contact::from_domain(item, id.as_deref()))
                .collect()
        });
        let addresses = fields.objects("addresses").map(|items| {
            items
                .into_iter()
                .map(|item| Address::from_domain(item, id.as_deref()))
                .collect()
        });
        Self {
            first_name: fields.str("first_name"),
            last_name: fields.str("last_name"),
            birth_date: fields.date(&["birth_date"]),
            email: fields.str("email"),
            gender: fields.str("gender"),
            height: fields.number("height"),
            weight: fields.number("weight"),
            roles: fields.strings("roles"),
            created_at: fields.date(&["created_at", "create_at"]),
            updated_at: fields.date(&["updated_at", "update_at"]),
            metadata: meta_to_domain(map.get("meta")),
            contacts,
            addresses,
            auth: None,
            id,
        }
    }

    /// Overwrite every field that is set in `other`.
    pub fn copy_from(&mut self, other: User) {
        let User {
            id,
            first_name,
            last_name,
            birth_date,
            email,
            gender,
            height,
            weight,
            roles,
            created_at,
            updated_at,
            metadata,
            contacts,
            addresses,
            auth,
        } = other;
        overwrite(&mut self.id, id);
        overwrite(&mut self.first_name, first_name);
        overwrite(&mut self.last_name, last_name);
        overwrite(&mut self.birth_date, birth_date);
        overwrite(&mut self.email, email);
        overwrite(&mut self.gender, gender);
        overwrite(&mut self.height, height);
        overwrite(&mut self.weight, weight);
        overwrite(&mut self.roles, roles);
        overwrite(&mut self.created_at, created_at);
        overwrite(&mut self.updated_at, updated_at);
        overwrite(&mut self.metadata, metadata);
        overwrite(&mut self.contacts, contacts);
        overwrite(&mut self.addresses, addresses);
        overwrite(&mut self.auth, auth);
    }
}

impl Contact {
    /// Build a contact from a response object. The service names the identity
    /// `contactId`; `_id` and `id` are accepted as well.
    pub fn from_domain(map: &Map<String, Value>, user_id: Option<&str>) -> Self {
        let fields = Fields(map);
        Self {
            id: fields.first_str(&["contact_id", "_id", "id"]),
            label: fields.str("label"),
            kind: fields.str("type"),
            value: fields.str("value"),
            user_id: fields
                .str("user_id")
                .or_else(|| user_id.map(str::to_string)),
        }
    }

    /// Overwrite every field that is set in `other`.
    pub fn copy_from(&mut self, other: Contact) {
        let Contact {
            id,
            label,
            kind,
            value,
            user_id,
        } = other;
        overwrite(&mut self.id, id);
        overwrite(&mut self.label, label);
        overwrite(&mut self.kind, kind);
        overwrite(&mut self.value, value);
        overwrite(&mut self.user_id, user_id);
    }
}

impl Address {
    /// Build an address from a response object. The service names the
    /// identity `addressId`; `_id` and `id` are accepted as well.
    pub fn from_domain(map: &Map<String, Value>, user_id: Option<&str>) -> Self {
        let fields = Fields(map);
        Self {
            id: fields.first_str(&["address_id", "_id", "id"]),
            label: fields.str("label"),
            kind: fields.str("type"),
            address1: fields.str("address1"),
            address2: fields.str("address2"),
            city: fields.str("city"),
            state: fields.str("state"),
            country: fields.str("country"),
            zip_code: fields.str("zip_code"),
            user_id: fields
                .str("user_id")
                .or_else(|| user_id.map(str::to_string)),
        }
    }

    /// Overwrite every field that is set in `other`.
    pub fn copy_from(&mut self, other: Address) {
        let Address {
            id,
            label,
            kind,
            address1,
            address2,
            city,
            state,
            country,
            zip_code,
            user_id,
        } = other;
        overwrite(&mut self.id, id);
        overwrite(&mut self.label, label);
        overwrite(&mut self.kind, kind);
        overwrite(&mut self.address1, address1);
        overwrite(&mut self.address2, address2);
        overwrite(&mut self.city, city);
        overwrite(&mut self.state, state);
        overwrite(&mut self.country, country);
        overwrite(&mut self.zip_code, zip_code);
        overwrite(&mut self.user_id, user_id);
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact(id: &str, value: &str) -> Contact {
        Contact {
            id: Some(id.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn reconcile_appends_unknown_ids() {
        let mut items = vec![contact("c1", "a")];
        let index = reconcile(&mut items, contact("c2", "b"));
        assert_eq!(index, 1);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn reconcile_replaces_in_place() {
        let mut items = vec![contact("c1", "a"), contact("c2", "b"), contact("c3", "c")];
        let index = reconcile(&mut items, contact("c2", "updated"));
        assert_eq!(index, 1);
        let ids: Vec<_> = items.iter().map(|c| c.id.clone().unwrap()).collect();
        assert_eq!(ids, ["c1", "c2", "c3"]);
        assert_eq!(items[1].value.as_deref(), Some("updated"));
    }

    #[test]
    fn reconcile_never_matches_missing_ids() {
        let mut items = vec![Contact::default()];
        reconcile(&mut items, Contact::default());
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn user_from_domain_reads_service_fields() {
        let map = json!({
            "_id": "u1",
            "first_name": "Ann",
            "birth_date": "1990-05-01T00:00:00.000Z",
            "height": 170,
            "roles": ["admin", "user"],
            "create_at": "2020-01-02",
            "meta": { "data": { "k": 1 } },
            "contacts": [{ "contact_id": "c1", "type": "telephone", "value": 5551234 }]
        });
        let user = User::from_domain(map.as_object().unwrap());
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.first_name.as_deref(), Some("Ann"));
        assert_eq!(user.birth_date, NaiveDate::from_ymd_opt(1990, 5, 1));
        assert_eq!(user.height, Some(170.0));
        assert_eq!(user.roles, Some(vec!["admin".to_string(), "user".to_string()]));
        assert_eq!(user.created_at, NaiveDate::from_ymd_opt(2020, 1, 2));
        assert_eq!(user.metadata, Some(json!({ "k": 1 })));

        let contacts = user.contacts.unwrap();
        assert_eq!(contacts[0].id.as_deref(), Some("c1"));
        assert_eq!(contacts[0].value.as_deref(), Some("5551234"));
        assert_eq!(contacts[0].user_id.as_deref(), Some("u1"));
        assert!(user.addresses.is_none());
    }

    #[test]
    fn copy_from_keeps_fields_missing_in_source() {
        let mut user = User {
            id: Some("u1".to_string()),
            email: Some("a@b.com".to_string()),
            ..Default::default()
        };
        user.copy_from(User {
            first_name: Some("Ann".to_string()),
            ..Default::default()
        });
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
        assert_eq!(user.first_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn contact_copy_from_overwrites_set_fields() {
        let mut local = Contact {
            id: Some("c1".to_string()),
            label: Some("home".to_string()),
            value: Some("1".to_string()),
            ..Default::default()
        };
        local.copy_from(contact("c1", "2"));
        assert_eq!(local.label.as_deref(), Some("home"));
        assert_eq!(local.value.as_deref(), Some("2"));
    }
}
