//! The declarative table behind every remote operation.
//!
//! Each `Operation` maps to one `OperationDescriptor`: which base URL it hangs off,
//! how its request is shaped and encoded, which wire keys fill the path
//! template, which domain keys it requires or accepts, and which non-success
//! statuses it maps to which error kind. The request builder and the response
//! decoder read nothing else.

use crate::http::HttpMethod;

/// Every operation the service exposes. `all_relations` has no documented
/// wire contract and is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Current,
    Update,
    Find,
    AddContact,
    AllContacts,
    FindContact,
    UpdateContact,
    DeleteContact,
    AddAddress,
    AllAddresses,
    FindAddress,
    UpdateAddress,
    DeleteAddress,
    AddRelation,
    SignUp,
    LogIn,
    LogOut,
    Facebook,
    Verify,
    VerifyRequest,
    ResetPasswordRequest,
    ResetPassword,
    UpdatePassword,
    UpdateEmail,
}

/// Which configured base URL the path template is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    User,
    Auth,
}

/// What the caller hands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A key-value mapping.
    Mapping,
    /// A single non-blank string, stored under the given domain key.
    Scalar(&'static str),
}

/// How the transcoded attributes travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Nothing beyond the path.
    Empty,
    /// `application/json` body.
    Json,
    /// `application/x-www-form-urlencoded` body.
    Form,
    /// URL query string.
    Query,
}

/// Error kind an operation assigns to a non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Validation,
    AuthFailed,
}

#[derive(Debug)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub scope: Scope,
    pub method: HttpMethod,
    pub shape: Shape,
    pub encoding: Encoding,
    /// Wire keys substituted into the path template, in placeholder order.
    pub path_params: &'static [&'static str],
    /// Domain keys that must be present and non-null.
    pub required: &'static [&'static str],
    /// Closed key set, or `None` when the service accepts free-form input.
    pub permitted: Option<&'static [&'static str]>,
    pub statuses: &'static [(u16, Rejection)],
}

/// Status a successful call answers with.
pub const SUCCESS_STATUS: u16 = 200;

use Rejection::{AuthFailed as A, Validation as V};

const USER_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "birth_date",
    "email",
    "gender",
    "height",
    "weight",
    "roles",
    "metadata",
];
const USER_UPDATE_FIELDS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "birth_date",
    "email",
    "gender",
    "height",
    "weight",
    "roles",
    "metadata",
];
const NEW_CONTACT_FIELDS: &[&str] = &["user_id", "label", "type", "value"];
const CONTACT_KEY_FIELDS: &[&str] = &["user_id", "contact_id"];
const CONTACT_UPDATE_FIELDS: &[&str] = &["user_id", "contact_id", "label", "type", "value"];
const NEW_ADDRESS_FIELDS: &[&str] = &[
    "user_id", "label", "type", "address1", "address2", "city", "state", "country", "zip_code",
];
const ADDRESS_KEY_FIELDS: &[&str] = &["user_id", "address_id"];
const ADDRESS_UPDATE_FIELDS: &[&str] = &[
    "user_id", "address_id", "label", "type", "address1", "address2", "city", "state", "country",
    "zip_code",
];

const SUB_RESOURCE_STATUSES: &[(u16, Rejection)] = &[(400, V), (401, A), (404, V)];

const CREATE: OperationDescriptor = OperationDescriptor {
    name: "create",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Json,
    path_params: &[],
    required: &[],
    permitted: Some(USER_FIELDS),
    statuses: &[(400, V), (401, A)],
};

const CURRENT: OperationDescriptor = OperationDescriptor {
    name: "current",
    scope: Scope::User,
    method: HttpMethod::Get,
    shape: Shape::Scalar("token"),
    encoding: Encoding::Query,
    path_params: &[],
    required: &["token"],
    permitted: None,
    statuses: &[(401, A)],
};

const UPDATE: OperationDescriptor = OperationDescriptor {
    name: "update",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Json,
    path_params: &[],
    required: &["id"],
    permitted: Some(USER_UPDATE_FIELDS),
    statuses: &[(400, V), (401, A), (403, A), (404, V)],
};

const FIND: OperationDescriptor = OperationDescriptor {
    name: "find",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Json,
    path_params: &[],
    required: &[],
    permitted: None,
    statuses: &[(400, V), (401, A)],
};

const ADD_CONTACT: OperationDescriptor = OperationDescriptor {
    name: "add_contact",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: Some(NEW_CONTACT_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const ALL_CONTACTS: OperationDescriptor = OperationDescriptor {
    name: "all_contacts",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Scalar("user_id"),
    encoding: Encoding::Form,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: None,
    statuses: SUB_RESOURCE_STATUSES,
};

const FIND_CONTACT: OperationDescriptor = OperationDescriptor {
    name: "find_contact",
    scope: Scope::User,
    method: HttpMethod::Get,
    shape: Shape::Mapping,
    encoding: Encoding::Empty,
    path_params: &["userId", "contactId"],
    required: CONTACT_KEY_FIELDS,
    permitted: Some(CONTACT_KEY_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const UPDATE_CONTACT: OperationDescriptor = OperationDescriptor {
    name: "update_contact",
    scope: Scope::User,
    method: HttpMethod::Put,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &["userId", "contactId"],
    required: CONTACT_KEY_FIELDS,
    permitted: Some(CONTACT_UPDATE_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const DELETE_CONTACT: OperationDescriptor = OperationDescriptor {
    name: "delete_contact",
    scope: Scope::User,
    method: HttpMethod::Delete,
    shape: Shape::Mapping,
    encoding: Encoding::Empty,
    path_params: &["userId", "contactId"],
    required: CONTACT_KEY_FIELDS,
    permitted: Some(CONTACT_KEY_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const ADD_ADDRESS: OperationDescriptor = OperationDescriptor {
    name: "add_address",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: Some(NEW_ADDRESS_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const ALL_ADDRESSES: OperationDescriptor = OperationDescriptor {
    name: "all_addresses",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Scalar("user_id"),
    encoding: Encoding::Empty,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: None,
    statuses: SUB_RESOURCE_STATUSES,
};

const FIND_ADDRESS: OperationDescriptor = OperationDescriptor {
    name: "find_address",
    scope: Scope::User,
    method: HttpMethod::Get,
    shape: Shape::Mapping,
    encoding: Encoding::Empty,
    path_params: &["userId", "addressId"],
    required: ADDRESS_KEY_FIELDS,
    permitted: Some(ADDRESS_KEY_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const UPDATE_ADDRESS: OperationDescriptor = OperationDescriptor {
    name: "update_address",
    scope: Scope::User,
    method: HttpMethod::Put,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &["userId", "addressId"],
    required: ADDRESS_KEY_FIELDS,
    permitted: Some(ADDRESS_UPDATE_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const DELETE_ADDRESS: OperationDescriptor = OperationDescriptor {
    name: "delete_address",
    scope: Scope::User,
    method: HttpMethod::Delete,
    shape: Shape::Mapping,
    encoding: Encoding::Empty,
    path_params: &["userId", "addressId"],
    required: ADDRESS_KEY_FIELDS,
    permitted: Some(ADDRESS_KEY_FIELDS),
    statuses: SUB_RESOURCE_STATUSES,
};

const ADD_RELATION: OperationDescriptor = OperationDescriptor {
    name: "add_relation",
    scope: Scope::User,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &[],
    required: &[],
    permitted: None,
    statuses: &[(401, A), (404, V)],
};

const SIGN_UP: OperationDescriptor = OperationDescriptor {
    name: "sign_up",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &[],
    required: &["email"],
    permitted: None,
    statuses: &[(400, V), (401, A), (403, A), (404, A), (409, A)],
};

const LOG_IN: OperationDescriptor = OperationDescriptor {
    name: "log_in",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &[],
    required: &["email"],
    permitted: None,
    statuses: &[(400, V), (401, A), (403, A)],
};

const LOG_OUT: OperationDescriptor = OperationDescriptor {
    name: "log_out",
    scope: Scope::Auth,
    method: HttpMethod::Get,
    shape: Shape::Scalar("user_id"),
    encoding: Encoding::Empty,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: None,
    statuses: &[(401, A)],
};

const FACEBOOK: OperationDescriptor = OperationDescriptor {
    name: "facebook",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Scalar("facebook_token"),
    encoding: Encoding::Form,
    path_params: &[],
    required: &["facebook_token"],
    permitted: None,
    statuses: &[(400, V), (401, A), (403, A)],
};

const VERIFY: OperationDescriptor = OperationDescriptor {
    name: "verify",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &[],
    required: &[],
    permitted: None,
    statuses: &[(400, V), (401, A)],
};

const VERIFY_REQUEST: OperationDescriptor = OperationDescriptor {
    name: "verify_request",
    scope: Scope::Auth,
    method: HttpMethod::Get,
    shape: Shape::Scalar("user_id"),
    encoding: Encoding::Empty,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: None,
    statuses: &[(400, V), (401, A)],
};

const RESET_PASSWORD_REQUEST: OperationDescriptor = OperationDescriptor {
    name: "reset_password_request",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Scalar("email"),
    encoding: Encoding::Form,
    path_params: &[],
    required: &["email"],
    permitted: None,
    statuses: &[(400, V), (401, A)],
};

const RESET_PASSWORD: OperationDescriptor = OperationDescriptor {
    name: "reset_password",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &[],
    required: &[],
    permitted: None,
    statuses: &[(400, V), (401, A)],
};

const UPDATE_PASSWORD: OperationDescriptor = OperationDescriptor {
    name: "update_password",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: None,
    statuses: &[(400, V), (401, A), (403, A)],
};

const UPDATE_EMAIL: OperationDescriptor = OperationDescriptor {
    name: "update_email",
    scope: Scope::Auth,
    method: HttpMethod::Post,
    shape: Shape::Mapping,
    encoding: Encoding::Form,
    path_params: &["userId"],
    required: &["user_id"],
    permitted: None,
    statuses: &[(400, V), (401, A), (403, A)],
};

impl Operation {
    pub const ALL: [Operation; 25] = [
        Operation::Create,
        Operation::Current,
        Operation::Update,
        Operation::Find,
        Operation::AddContact,
        Operation::AllContacts,
        Operation::FindContact,
        Operation::UpdateContact,
        Operation::DeleteContact,
        Operation::AddAddress,
        Operation::AllAddresses,
        Operation::FindAddress,
        Operation::UpdateAddress,
        Operation::DeleteAddress,
        Operation::AddRelation,
        Operation::SignUp,
        Operation::LogIn,
        Operation::LogOut,
        Operation::Facebook,
        Operation::Verify,
        Operation::VerifyRequest,
        Operation::ResetPasswordRequest,
        Operation::ResetPassword,
        Operation::UpdatePassword,
        Operation::UpdateEmail,
    ];

    pub fn descriptor(self) -> &'static OperationDescriptor {
        match self {
            Operation::Create => &CREATE,
            Operation::Current => &CURRENT,
            Operation::Update => &UPDATE,
            Operation::Find => &FIND,
            Operation::AddContact => &ADD_CONTACT,
            Operation::AllContacts => &ALL_CONTACTS,
            Operation::FindContact => &FIND_CONTACT,
            Operation::UpdateContact => &UPDATE_CONTACT,
            Operation::DeleteContact => &DELETE_CONTACT,
            Operation::AddAddress => &ADD_ADDRESS,
            Operation::AllAddresses => &ALL_ADDRESSES,
            Operation::FindAddress => &FIND_ADDRESS,
            Operation::UpdateAddress => &UPDATE_ADDRESS,
            Operation::DeleteAddress => &DELETE_ADDRESS,
            Operation::AddRelation => &ADD_RELATION,
            Operation::SignUp => &SIGN_UP,
            Operation::LogIn => &LOG_IN,
            Operation::LogOut => &LOG_OUT,
            Operation::Facebook => &FACEBOOK,
            Operation::Verify => &VERIFY,
            Operation::VerifyRequest => &VERIFY_REQUEST,
            Operation::ResetPasswordRequest => &RESET_PASSWORD_REQUEST,
            Operation::ResetPassword => &RESET_PASSWORD,
            Operation::UpdatePassword => &UPDATE_PASSWORD,
            Operation::UpdateEmail => &UPDATE_EMAIL,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Error kind for a non-success `status`, or `None` when the operation
    /// does not map it.
    pub fn rejection(self, status: u16) -> Option<Rejection> {
        self.descriptor()
            .statuses
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, kind)| *kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathTemplates;

    #[test]
    fn names_are_unique_and_resolvable() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("all_relations"), None);
    }

    #[test]
    fn default_templates_have_one_placeholder_per_path_param() {
        let paths = PathTemplates::default();
        for op in Operation::ALL {
            let placeholders = paths.template(op).matches("%s").count();
            assert_eq!(placeholders, op.descriptor().path_params.len(), "{}", op.name());
        }
    }

    #[test]
    fn scalar_operations_require_their_scalar_key() {
        for op in Operation::ALL {
            if let Shape::Scalar(key) = op.descriptor().shape {
                assert!(op.descriptor().required.contains(&key), "{}", op.name());
            }
        }
    }

    #[test]
    fn status_lookup_follows_the_table() {
        assert_eq!(Operation::Update.rejection(403), Some(Rejection::AuthFailed));
        assert_eq!(Operation::Update.rejection(404), Some(Rejection::Validation));
        assert_eq!(Operation::Create.rejection(404), None);
        assert_eq!(Operation::SignUp.rejection(409), Some(Rejection::AuthFailed));
        assert_eq!(Operation::LogOut.rejection(400), None);
    }
}
