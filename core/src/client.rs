//! Typed façade over the users service.
//!
//! # Design
//! `UsersClient` holds a `Config`, the base URLs derived from it and a
//! `Transport`. It keeps no other state. Every operation runs the same
//! pipeline: parameters -> `Attributes` (shape check) -> `request::build`
//! (key checks, transcoding, path filling) -> `Transport::send` ->
//! `response::decode*` (status dispatch, transcoding back) -> entity
//! construction. Parameter errors surface before the transport is called.
//!
//! Callers that run their own I/O can use [`UsersClient::build_request`] and
//! the `response` module directly; the building half needs no transport.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{Config, Endpoints};
use crate::error::UsersResult;
use crate::http::{HttpRequest, HttpResponse};
use crate::operation::Operation;
use crate::params::Attributes;
use crate::request;
use crate::response::{decode, decode_ack, decode_list, decode_object};
use crate::transport::Transport;
use crate::types::{Address, Auth, Contact, Fields, User};

/// Client for the users service.
///
/// Stateless between calls; shareable across threads when its transport is.
/// Reconfiguring while other threads issue requests is the caller's
/// responsibility.
#[derive(Debug, Clone)]
pub struct UsersClient<T> {
    config: Config,
    endpoints: Endpoints,
    transport: T,
}

impl<T> UsersClient<T> {
    pub fn new(config: Config, transport: T) -> Self {
        let endpoints = Endpoints::derive(&config);
        Self {
            config,
            endpoints,
            transport,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply `change` and re-derive the base URLs.
    pub fn reconfigure<F: FnOnce(&mut Config)>(&mut self, change: F) {
        change(&mut self.config);
        self.endpoints = Endpoints::derive(&self.config);
    }

    /// Build the request for `op` without sending it.
    pub fn build_request(&self, op: Operation, attrs: Attributes) -> UsersResult<HttpRequest> {
        request::build(op, &self.config, &self.endpoints, attrs)
    }

    /// Check the status of a response to `op` and return its body in
    /// domain format.
    pub fn parse_response(&self, op: Operation, response: &HttpResponse) -> UsersResult<Value> {
        decode(op, response)
    }
}

impl<T: Transport> UsersClient<T> {
    fn call(&self, op: Operation, attrs: Attributes) -> UsersResult<HttpResponse> {
        let request = self.build_request(op, attrs)?;
        self.transport.send(&request)
    }

    fn call_object(&self, op: Operation, attrs: Attributes) -> UsersResult<Map<String, Value>> {
        decode_object(op, &self.call(op, attrs)?)
    }

    fn call_list(&self, op: Operation, attrs: Attributes) -> UsersResult<Vec<Map<String, Value>>> {
        decode_list(op, &self.call(op, attrs)?)
    }

    fn call_ack(&self, op: Operation, attrs: Attributes) -> UsersResult<bool> {
        decode_ack(op, &self.call(op, attrs)?)
    }

    // --- users ---

    /// `POST {user}/create`. The returned user carries the submitted fields
    /// and the id assigned by the service.
    pub fn create<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<User> {
        let attrs = Attributes::from_params(params)?;
        let created = self.call_object(Operation::Create, attrs.clone())?;
        let mut user = User::from_domain(attrs.as_map());
        user.metadata = attrs.get("metadata").cloned();
        user.id = Fields(&created).first_str(&["user_id", "_id", "id"]);
        Ok(user)
    }

    /// `GET {user}/current?token=`.
    pub fn current(&self, token: &str) -> UsersResult<User> {
        let attrs = Attributes::scalar("token", token)?;
        let found = self.call_object(Operation::Current, attrs)?;
        Ok(User::from_domain(&found))
    }

    /// `POST {user}/save`.
    pub fn update<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<User> {
        let attrs = Attributes::from_params(params)?;
        let saved = self.call_object(Operation::Update, attrs)?;
        Ok(User::from_domain(&saved))
    }

    /// `POST {user}/find`. Accepts `id` or `Id` for the identity and a `$or`
    /// array of alternative filters.
    pub fn find<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Vec<User>> {
        let attrs = Attributes::from_params(params)?;
        let found = self.call_list(Operation::Find, attrs)?;
        Ok(found.iter().map(User::from_domain).collect())
    }

    pub fn add_relation<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<bool> {
        self.call_ack(Operation::AddRelation, Attributes::from_params(params)?)
    }

    // --- contacts ---

    pub fn add_contact<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Contact> {
        let attrs = Attributes::from_params(params)?;
        let created = self.call_object(Operation::AddContact, attrs.clone())?;
        let mut contact = Contact::from_domain(attrs.as_map(), None);
        contact.id = Fields(&created).first_str(&["contact_id", "_id", "id"]);
        Ok(contact)
    }

    pub fn all_contacts(&self, user_id: &str) -> UsersResult<Vec<Contact>> {
        let attrs = Attributes::scalar("user_id", user_id)?;
        let found = self.call_list(Operation::AllContacts, attrs)?;
        Ok(found
            .iter()
            .map(|item| Contact::from_domain(item, Some(user_id)))
            .collect())
    }

    pub fn find_contact<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Contact> {
        let attrs = Attributes::from_params(params)?;
        let user_id = attrs.get_str("user_id");
        let found = self.call_object(Operation::FindContact, attrs)?;
        let mut contact = Contact::from_domain(&found, None);
        contact.user_id = user_id;
        Ok(contact)
    }

    pub fn update_contact<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Contact> {
        let attrs = Attributes::from_params(params)?;
        let saved = self.call_object(Operation::UpdateContact, attrs.clone())?;
        let mut contact = Contact::from_domain(attrs.as_map(), None);
        if let Some(id) = Fields(&saved).first_str(&["contact_id", "_id", "id"]) {
            contact.id = Some(id);
        }
        Ok(contact)
    }

    pub fn delete_contact<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<bool> {
        self.call_ack(Operation::DeleteContact, Attributes::from_params(params)?)
    }

    // --- addresses ---

    pub fn add_address<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Address> {
        let attrs = Attributes::from_params(params)?;
        let created = self.call_object(Operation::AddAddress, attrs.clone())?;
        let mut address = Address::from_domain(attrs.as_map(), None);
        address.id = Fields(&created).first_str(&["address_id", "_id", "id"]);
        Ok(address)
    }

    pub fn all_addresses(&self, user_id: &str) -> UsersResult<Vec<Address>> {
        let attrs = Attributes::scalar("user_id", user_id)?;
        let found = self.call_list(Operation::AllAddresses, attrs)?;
        Ok(found
            .iter()
            .map(|item| Address::from_domain(item, Some(user_id)))
            .collect())
    }

    pub fn find_address<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Address> {
        let attrs = Attributes::from_params(params)?;
        let user_id = attrs.get_str("user_id");
        let found = self.call_object(Operation::FindAddress, attrs)?;
        let mut address = Address::from_domain(&found, None);
        address.user_id = user_id;
        Ok(address)
    }

    pub fn update_address<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Address> {
        let attrs = Attributes::from_params(params)?;
        let saved = self.call_object(Operation::UpdateAddress, attrs.clone())?;
        let mut address = Address::from_domain(attrs.as_map(), None);
        if let Some(id) = Fields(&saved).first_str(&["address_id", "_id", "id"]) {
            address.id = Some(id);
        }
        Ok(address)
    }

    pub fn delete_address<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<bool> {
        self.call_ack(Operation::DeleteAddress, Attributes::from_params(params)?)
    }

    // --- auth ---

    pub fn sign_up<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Auth> {
        let attrs = Attributes::from_params(params)?;
        let issued = self.call_object(Operation::SignUp, attrs.clone())?;
        Ok(Auth {
            user_id: attrs.get_str("user_id"),
            token: Fields(&issued).str("token"),
            email: attrs.get_str("email"),
            email_token: None,
        })
    }

    pub fn log_in<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<Auth> {
        let attrs = Attributes::from_params(params)?;
        let issued = self.call_object(Operation::LogIn, attrs.clone())?;
        Ok(Auth {
            token: Fields(&issued).str("token"),
            email: attrs.get_str("email"),
            ..Auth::default()
        })
    }

    pub fn log_out(&self, user_id: &str) -> UsersResult<bool> {
        self.call_ack(Operation::LogOut, Attributes::scalar("user_id", user_id)?)
    }

    /// Exchange a Facebook access token for a service token.
    pub fn facebook(&self, facebook_token: &str) -> UsersResult<Auth> {
        let attrs = Attributes::scalar("facebook_token", facebook_token)?;
        let issued = self.call_object(Operation::Facebook, attrs)?;
        Ok(Auth {
            token: Fields(&issued).str("token"),
            ..Auth::default()
        })
    }

    pub fn verify<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<bool> {
        self.call_ack(Operation::Verify, Attributes::from_params(params)?)
    }

    pub fn verify_request(&self, user_id: &str) -> UsersResult<bool> {
        self.call_ack(Operation::VerifyRequest, Attributes::scalar("user_id", user_id)?)
    }

    /// Start a password reset. The result carries the account email and the
    /// reset token issued by the service.
    pub fn reset_password_request(&self, email: &str) -> UsersResult<Auth> {
        let attrs = Attributes::scalar("email", email)?;
        let issued = self.call_object(Operation::ResetPasswordRequest, attrs)?;
        let fields = Fields(&issued);
        let email = issued
            .get("user")
            .and_then(Value::as_object)
            .and_then(|user| Fields(user).str("email"));
        Ok(Auth {
            email,
            email_token: fields.str("email_token"),
            ..Auth::default()
        })
    }

    pub fn reset_password<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<bool> {
        self.call_ack(Operation::ResetPassword, Attributes::from_params(params)?)
    }

    pub fn update_password<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<bool> {
        self.call_ack(Operation::UpdatePassword, Attributes::from_params(params)?)
    }

    pub fn update_email<P: Serialize + ?Sized>(&self, params: &P) -> UsersResult<bool> {
        self.call_ack(Operation::UpdateEmail, Attributes::from_params(params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UsersError;
    use crate::http::HttpMethod;
    use crate::params::{ContactKey, NewContact, NewUser};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::cell::RefCell;

    /// Answers every request with one canned response and records what it
    /// was sent.
    struct Canned {
        response: HttpResponse,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: HttpResponse::new(status, body),
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn send(&self, request: &HttpRequest) -> UsersResult<HttpResponse> {
            self.sent.borrow_mut().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn client(status: u16, body: &str) -> UsersClient<Canned> {
        UsersClient::new(Config::default(), Canned::new(status, body))
    }

    #[test]
    fn create_returns_submitted_fields_with_service_id() {
        let c = client(200, r#"{"userId":"u1"}"#);
        let user = c
            .create(&NewUser {
                first_name: Some("Ann".to_string()),
                birth_date: NaiveDate::from_ymd_opt(1990, 1, 2),
                height: Some(170.0),
                metadata: Some(json!({ "k": 1 })),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.first_name.as_deref(), Some("Ann"));
        assert_eq!(user.birth_date, NaiveDate::from_ymd_opt(1990, 1, 2));
        assert_eq!(user.height, Some(170.0));
        assert_eq!(user.metadata, Some(json!({ "k": 1 })));

        let sent = c.transport().sent.borrow();
        let body: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["meta"], json!({ "data": { "k": 1 } }));
        assert!(body.get("metadata").is_none());
    }

    #[test]
    fn non_mapping_params_never_reach_the_transport() {
        let c = client(200, "{}");
        assert!(matches!(c.create("word"), Err(UsersError::InvalidParam(_))));
        assert!(matches!(c.update(&42), Err(UsersError::InvalidParam(_))));
        assert!(matches!(c.find(&json!([1])), Err(UsersError::InvalidParam(_))));
        assert!(matches!(c.sign_up("x"), Err(UsersError::InvalidParam(_))));
        assert!(matches!(c.current(""), Err(UsersError::InvalidParam(_))));
        assert!(matches!(c.log_out("   "), Err(UsersError::InvalidParam(_))));
        assert!(c.transport().sent.borrow().is_empty());
    }

    #[test]
    fn current_decodes_nested_collections() {
        let c = client(
            200,
            r#"{"_id":"u1","email":"a@b.com","contacts":[{"contactId":"c1","type":"email"}],"addresses":[],"meta":{"data":{"plan":"pro"}}}"#,
        );
        let user = c.current("tok").unwrap();
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.contacts.unwrap()[0].id.as_deref(), Some("c1"));
        assert_eq!(user.addresses, Some(Vec::new()));
        assert_eq!(user.metadata, Some(json!({ "plan": "pro" })));
        let sent = c.transport().sent.borrow();
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert!(sent[0].url.ends_with("/current?token=tok"));
    }

    #[test]
    fn find_maps_every_element() {
        let c = client(200, r#"[{"_id":"u1","firstName":"Ann"},{"_id":"u2"}]"#);
        let users = c.find(&json!({})).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id.as_deref(), Some("u1"));
        assert_eq!(users[0].first_name.as_deref(), Some("Ann"));
        assert_eq!(users[1].id.as_deref(), Some("u2"));
    }

    #[test]
    fn add_contact_uses_submitted_fields() {
        let c = client(200, r#"{"contactId":"c1"}"#);
        let contact = c
            .add_contact(&NewContact {
                user_id: "u1".to_string(),
                label: Some("home".to_string()),
                kind: Some("telephone".to_string()),
                value: Some("555".to_string()),
            })
            .unwrap();
        assert_eq!(contact.id.as_deref(), Some("c1"));
        assert_eq!(contact.user_id.as_deref(), Some("u1"));
        assert_eq!(contact.kind.as_deref(), Some("telephone"));
        assert!(c.transport().sent.borrow()[0]
            .url
            .ends_with("/contact/create/userId/u1"));
    }

    #[test]
    fn find_contact_takes_user_id_from_the_request() {
        let c = client(200, r#"{"contactId":"c1","label":"work","value":"x@y.z"}"#);
        let contact = c
            .find_contact(&ContactKey {
                user_id: "u1".to_string(),
                contact_id: "c1".to_string(),
            })
            .unwrap();
        assert_eq!(contact.user_id.as_deref(), Some("u1"));
        assert_eq!(contact.label.as_deref(), Some("work"));
    }

    #[test]
    fn all_contacts_posts_the_user_id() {
        let c = client(200, r#"[{"contactId":"c1","type":"email"},{"contactId":"c2"}]"#);
        let contacts = c.all_contacts("u1").unwrap();
        assert_eq!(contacts.len(), 2);
        assert!(contacts.iter().all(|c| c.user_id.as_deref() == Some("u1")));
        let sent = c.transport().sent.borrow();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].body.as_deref(), Some("userId=u1"));
    }

    #[test]
    fn sign_up_combines_request_and_response() {
        let c = client(200, r#"{"token":"t1"}"#);
        let auth = c
            .sign_up(&json!({ "user_id": "u1", "email": "a@b.com", "password": "pw" }))
            .unwrap();
        assert_eq!(auth.token.as_deref(), Some("t1"));
        assert_eq!(auth.user_id.as_deref(), Some("u1"));
        assert_eq!(auth.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn reset_password_request_reads_nested_email() {
        let c = client(200, r#"{"user":{"email":"a@b.com"},"emailToken":"T1"}"#);
        let auth = c.reset_password_request("a@b.com").unwrap();
        assert_eq!(auth.email.as_deref(), Some("a@b.com"));
        assert_eq!(auth.email_token.as_deref(), Some("T1"));
    }

    #[test]
    fn facebook_returns_the_token() {
        let c = client(200, r#"{"token":"fb"}"#);
        assert_eq!(c.facebook("abc").unwrap().token.as_deref(), Some("fb"));
        assert_eq!(
            c.transport().sent.borrow()[0].body.as_deref(),
            Some("facebookToken=abc")
        );
    }

    #[test]
    fn ack_operations_return_true() {
        let c = client(200, "");
        assert!(c.log_out("u1").unwrap());
        assert!(c.verify_request("u1").unwrap());
        assert!(c
            .delete_contact(&json!({ "user_id": "u1", "contact_id": "c1" }))
            .unwrap());
        assert!(c.add_relation(&json!({ "user_id": "u1", "related_id": "u2" })).unwrap());
    }

    #[test]
    fn reconfigure_rederives_endpoints_and_secret() {
        let mut c = client(200, "");
        c.reconfigure(|config| {
            config.base_url = "http://td.user.com".to_string();
            config.application_secret = "rotated".to_string();
        });
        c.log_out("u1").unwrap();
        let sent = c.transport().sent.borrow();
        assert_eq!(sent[0].url, "http://td.user.com/api/v1/auth/logout/userId/u1");
        assert_eq!(sent[0].header("authorization"), Some("rotated"));
    }

    #[test]
    fn build_and_parse_without_a_transport() {
        let c = UsersClient::new(Config::default(), ());
        let request = c
            .build_request(Operation::Current, Attributes::scalar("token", "t").unwrap())
            .unwrap();
        assert_eq!(request.url, "http://localhost:9001/api/v1/user/current?token=t");

        let body = c
            .parse_response(Operation::Current, &HttpResponse::new(200, r#"{"firstName":"Ann"}"#))
            .unwrap();
        assert_eq!(body, json!({ "first_name": "Ann" }));
    }

    #[test]
    fn remote_errors_follow_the_status_table() {
        let body = r#"{"message":"nope","errors":[]}"#;
        assert!(matches!(
            client(404, body).update(&json!({ "id": "u1" })),
            Err(UsersError::Validation(_))
        ));
        assert!(matches!(
            client(403, body).update(&json!({ "id": "u1" })),
            Err(UsersError::AuthFailed(_))
        ));
        assert!(matches!(
            client(409, body).sign_up(&json!({ "email": "a@b.com" })),
            Err(UsersError::AuthFailed(_))
        ));
        assert!(matches!(
            client(500, "").create(&json!({})),
            Err(UsersError::GenericError { status: 500, .. })
        ));
    }
}
