//! Synchronous client SDK for the TD users and authentication service.
//!
//! # Overview
//! Callers work with snake_case attributes and typed entities; the service
//! speaks camelCase JSON and form bodies. The crate translates between the
//! two, builds each request from a declarative per-operation table, checks
//! parameters before any I/O and maps every response status to a result or
//! a typed error.
//!
//! # Design
//! - `UsersClient` holds a `Config` and a `Transport` and nothing else.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   the round trip sits behind the `Transport` trait, so the building and
//!   decoding halves are deterministic and testable without a network.
//!   `UreqTransport` is the blocking default.
//! - `User` carries instance operations that keep its contacts and
//!   addresses in step with the service.
//! - Entity types are defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod case;
pub mod client;
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod http;
pub mod operation;
pub mod params;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;

pub use client::UsersClient;
pub use config::{Config, Configurator, Endpoints, PathTemplates};
pub use error::{ErrorKind, UsersError, UsersResult};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use operation::{Encoding, Operation, OperationDescriptor, Rejection, Scope, Shape};
pub use params::{
    AddressChanges, AddressKey, Attributes, ContactChanges, ContactKey, Credentials, EmailUpdate,
    NewAddress, NewContact, NewUser, PasswordReset, PasswordUpdate, SignUp, UserChanges,
    UserFilter, Verification,
};
pub use transport::{Transport, UreqTransport};
pub use types::{reconcile, Address, Auth, Contact, Identified, User};
