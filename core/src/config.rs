//! Client configuration: service location, application secret and the
//! path template of every operation.
//!
//! # Design
//! `Config` is a plain value. Build it once (defaults, then an optional JSON
//! document, then environment overrides) and hand it to `UsersClient::new`.
//! `Configurator` is for embedding applications that want post-configure
//! hooks: every registered listener runs, in registration order, after each
//! `configure` call. Settings that depend on several fields (the user and
//! auth base URLs) are recomputed by [`Endpoints::derive`] rather than
//! stored.

use serde::{Deserialize, Serialize};

use crate::error::{UsersError, UsersResult};
use crate::operation::Operation;

pub const ENV_BASE_URL: &str = "TD_USERS_BASE_URL";
pub const ENV_USER_URL: &str = "TD_USERS_USER_URL";
pub const ENV_AUTH_URL: &str = "TD_USERS_AUTH_URL";
pub const ENV_APPLICATION_SECRET: &str = "TD_USERS_APPLICATION_SECRET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub user_url: String,
    pub auth_url: String,
    pub application_secret: String,
    pub paths: PathTemplates,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9001".to_string(),
            user_url: "/api/v1/user".to_string(),
            auth_url: "/api/v1/auth".to_string(),
            application_secret: "TDUserToken-CHANGE-ME!".to_string(),
            paths: PathTemplates::default(),
        }
    }
}

impl Config {
    /// Load from a JSON document. Missing fields keep their defaults.
    pub fn from_json(document: &str) -> UsersResult<Self> {
        serde_json::from_str(document).map_err(|e| UsersError::Config(e.to_string()))
    }

    /// Defaults overridden by the `TD_USERS_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Override the connection settings from `lookup` (usually the process
    /// environment). Unset and empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fields: [(&str, &mut String); 4] = [
            (ENV_BASE_URL, &mut self.base_url),
            (ENV_USER_URL, &mut self.user_url),
            (ENV_AUTH_URL, &mut self.auth_url),
            (ENV_APPLICATION_SECRET, &mut self.application_secret),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
        self
    }
}

/// Path template per operation. `%s` marks a positional path parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTemplates {
    pub create: String,
    pub current: String,
    pub update: String,
    pub filter: String,
    pub add_contact: String,
    pub all_contacts: String,
    pub find_contact: String,
    pub update_contact: String,
    pub delete_contact: String,
    pub add_address: String,
    pub all_addresses: String,
    pub find_address: String,
    pub update_address: String,
    pub delete_address: String,
    pub add_relation: String,
    pub sign_up: String,
    pub log_in: String,
    pub log_out: String,
    pub facebook: String,
    pub verify: String,
    pub verify_request: String,
    pub reset_password_request: String,
    pub reset_password: String,
    pub update_password: String,
    pub update_email: String,
}

impl Default for PathTemplates {
    fn default() -> Self {
        Self {
            create: "/create".to_string(),
            current: "/current".to_string(),
            update: "/save".to_string(),
            filter: "/find".to_string(),
            add_contact: "/contact/create/userId/%s".to_string(),
            all_contacts: "/contact/list/userId/%s".to_string(),
            find_contact: "/contact/load/userId/%s/contactId/%s".to_string(),
            update_contact: "/contact/update/userId/%s/contactId/%s".to_string(),
            delete_contact: "/contact/delete/userId/%s/contactId/%s".to_string(),
            add_address: "/address/create/userId/%s".to_string(),
            all_addresses: "/address/list/userId/%s".to_string(),
            find_address: "/address/load/userId/%s/addressId/%s".to_string(),
            update_address: "/address/update/userId/%s/addressId/%s".to_string(),
            delete_address: "/address/delete/userId/%s/addressId/%s".to_string(),
            add_relation: "/relation/create".to_string(),
            sign_up: "/local/signup".to_string(),
            log_in: "/local/login".to_string(),
            log_out: "/logout/userId/%s".to_string(),
            facebook: "/facebook".to_string(),
            verify: "/verify".to_string(),
            verify_request: "/verify-request/userId/%s".to_string(),
            reset_password_request: "/password/reset-request".to_string(),
            reset_password: "/password/reset".to_string(),
            update_password: "/password/update/userId/%s".to_string(),
            update_email: "/email/update/userId/%s".to_string(),
        }
    }
}

impl PathTemplates {
    pub fn template(&self, op: Operation) -> &str {
        match op {
            Operation::Create => &self.create,
            Operation::Current => &self.current,
            Operation::Update => &self.update,
            Operation::Find => &self.filter,
            Operation::AddContact => &self.add_contact,
            Operation::AllContacts => &self.all_contacts,
            Operation::FindContact => &self.find_contact,
            Operation::UpdateContact => &self.update_contact,
            Operation::DeleteContact => &self.delete_contact,
            Operation::AddAddress => &self.add_address,
            Operation::AllAddresses => &self.all_addresses,
            Operation::FindAddress => &self.find_address,
            Operation::UpdateAddress => &self.update_address,
            Operation::DeleteAddress => &self.delete_address,
            Operation::AddRelation => &self.add_relation,
            Operation::SignUp => &self.sign_up,
            Operation::LogIn => &self.log_in,
            Operation::LogOut => &self.log_out,
            Operation::Facebook => &self.facebook,
            Operation::Verify => &self.verify,
            Operation::VerifyRequest => &self.verify_request,
            Operation::ResetPasswordRequest => &self.reset_password_request,
            Operation::ResetPassword => &self.reset_password,
            Operation::UpdatePassword => &self.update_password,
            Operation::UpdateEmail => &self.update_email,
        }
    }
}

/// Base URLs derived from a `Config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub user_base: String,
    pub auth_base: String,
}

impl Endpoints {
    pub fn derive(config: &Config) -> Self {
        let base = config.base_url.trim_end_matches('/');
        Self {
            user_base: format!("{base}{}", config.user_url),
            auth_base: format!("{base}{}", config.auth_url),
        }
    }
}

pub type Listener = Box<dyn Fn(&Config) + Send + Sync>;

/// Owns a `Config` and the listeners that react to its changes.
pub struct Configurator {
    config: Config,
    listeners: Vec<Listener>,
}

impl Configurator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            listeners: Vec::new(),
        }
    }

    pub fn on_configure<F>(&mut self, listener: F)
    where
        F: Fn(&Config) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Apply `change`, then notify every listener in registration order.
    pub fn configure<F>(&mut self, change: F) -> &Config
    where
        F: FnOnce(&mut Config),
    {
        change(&mut self.config);
        tracing::debug!(listeners = self.listeners.len(), "configuration changed");
        for listener in &self.listeners {
            listener(&self.config);
        }
        &self.config
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }
}

impl Default for Configurator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for Configurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configurator")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
