//! In-memory stand-in for the TD users service.
//!
//! Speaks the same wire protocol as the real service: camelCase JSON for the
//! user endpoints, form bodies for contacts, addresses and auth, an
//! `authorization` header carrying the application secret on every request,
//! and `{code, message, errors}` error bodies.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Form, Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_SECRET: &str = "TDUserToken-CHANGE-ME!";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub contact_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
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

/// Contact fields a form body may set. Path keys repeated in the body are
/// ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressForm {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    pub user_id: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacebookForm {
    pub facebook_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyForm {
    pub verify_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetForm {
    pub email_token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdateForm {
    pub password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailUpdateForm {
    pub email: String,
}

/// A stored user. `fields` holds the profile exactly as the client sent it.
#[derive(Clone, Debug)]
struct UserRecord {
    fields: Map<String, Value>,
    created_at: String,
    updated_at: String,
    contacts: Vec<Contact>,
    addresses: Vec<Address>,
}

impl UserRecord {
    fn new(fields: Map<String, Value>) -> Self {
        let now = timestamp();
        Self {
            fields,
            created_at: now.clone(),
            updated_at: now,
            contacts: Vec::new(),
            addresses: Vec::new(),
        }
    }

    fn render(&self, id: &str) -> Value {
        let mut out = self.fields.clone();
        out.insert("_id".to_string(), json!(id));
        out.insert("createdAt".to_string(), json!(self.created_at));
        out.insert("updatedAt".to_string(), json!(self.updated_at));
        out.insert("contacts".to_string(), json!(self.contacts));
        out.insert("addresses".to_string(), json!(self.addresses));
        Value::Object(out)
    }

    fn matches(&self, id: &str, filter: &Map<String, Value>) -> bool {
        filter.iter().all(|(key, expected)| match key.as_str() {
            "_id" => expected.as_str() == Some(id),
            "$or" => match expected.as_array() {
                Some(alternatives) => alternatives
                    .iter()
                    .filter_map(Value::as_object)
                    .any(|alternative| self.matches(id, alternative)),
                None => true,
            },
            _ => self.fields.get(key) == Some(expected),
        })
    }
}

#[derive(Clone, Debug)]
struct Account {
    user_id: String,
    password: String,
    verified: bool,
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<String, UserRecord>,
    /// Keyed by email.
    accounts: HashMap<String, Account>,
    /// Session token -> user id.
    sessions: HashMap<String, String>,
    /// Verify token -> user id.
    verify_tokens: HashMap<String, String>,
    /// Reset token -> email.
    reset_tokens: HashMap<String, String>,
    relations: Vec<Map<String, Value>>,
}

impl Store {
    fn user_mut(&mut self, user_id: &str) -> Result<&mut UserRecord, ApiError> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))
    }

    fn account_email(&self, user_id: &str) -> Option<String> {
        self.accounts
            .iter()
            .find(|(_, account)| account.user_id == user_id)
            .map(|(email, _)| email.clone())
    }

    fn open_session(&mut self, user_id: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), user_id.to_string());
        token
    }
}

type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    secret: Arc<str>,
}

/// `{code, message, errors}` error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "ValidationError", message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "AuthError", message)
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "AuthError", message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "Conflict", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status, message = %self.message, "rejecting request");
        let body = json!({ "code": self.code, "message": self.message, "errors": [] });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn app() -> Router {
    app_with_secret(DEFAULT_SECRET)
}

/// The service with a custom application secret.
pub fn app_with_secret(secret: &str) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Store::default())),
        secret: Arc::from(secret),
    };
    let user = Router::new()
        .route("/create", post(create_user))
        .route("/current", get(current_user))
        .route("/save", post(save_user))
        .route("/find", post(find_users))
        .route("/contact/create/userId/{user_id}", post(add_contact))
        .route("/contact/list/userId/{user_id}", post(list_contacts))
        .route("/contact/load/userId/{user_id}/contactId/{contact_id}", get(load_contact))
        .route("/contact/update/userId/{user_id}/contactId/{contact_id}", put(update_contact))
        .route("/contact/delete/userId/{user_id}/contactId/{contact_id}", delete(delete_contact))
        .route("/address/create/userId/{user_id}", post(add_address))
        .route("/address/list/userId/{user_id}", post(list_addresses))
        .route("/address/load/userId/{user_id}/addressId/{address_id}", get(load_address))
        .route("/address/update/userId/{user_id}/addressId/{address_id}", put(update_address))
        .route("/address/delete/userId/{user_id}/addressId/{address_id}", delete(delete_address))
        .route("/relation/create", post(add_relation));
    let auth = Router::new()
        .route("/local/signup", post(sign_up))
        .route("/local/login", post(log_in))
        .route("/logout/userId/{user_id}", get(log_out))
        .route("/facebook", post(facebook))
        .route("/verify", post(verify))
        .route("/verify-request/userId/{user_id}", get(verify_request))
        .route("/password/reset-request", post(reset_password_request))
        .route("/password/reset", post(reset_password))
        .route("/password/update/userId/{user_id}", post(update_password))
        .route("/email/update/userId/{user_id}", post(update_email));

    Router::new()
        .nest("/api/v1/user", user)
        .nest("/api/v1/auth", auth)
        .layer(middleware::from_fn_with_state(state.clone(), require_secret))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_secret(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if presented != Some(&*state.secret) {
        return ApiError::unauthorized("invalid application secret").into_response();
    }
    next.run(request).await
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn overwrite(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

// --- users ---

async fn create_user(
    State(state): State<AppState>,
    Json(mut fields): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    if let Some(email) = fields.get("email").and_then(Value::as_str) {
        let taken = db
            .users
            .values()
            .any(|user| user.fields.get("email").and_then(Value::as_str) == Some(email));
        if taken {
            return Err(ApiError::bad_request(format!("email {email} is already registered")));
        }
    }
    fields.remove("_id");
    let id = new_id();
    db.users.insert(id.clone(), UserRecord::new(fields));
    tracing::info!(user_id = %id, "user created");
    Ok(Json(json!({ "userId": id })))
}

async fn current_user(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let db = state.db.read().await;
    let user_id = query
        .get("token")
        .and_then(|token| db.sessions.get(token))
        .ok_or_else(|| ApiError::unauthorized("invalid or expired token"))?;
    let user = db
        .users
        .get(user_id)
        .ok_or_else(|| ApiError::unauthorized("invalid or expired token"))?;
    Ok(Json(user.render(user_id)))
}

async fn save_user(
    State(state): State<AppState>,
    Json(mut changes): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let id = match changes.remove("_id") {
        Some(Value::String(id)) => id,
        _ => return Err(ApiError::bad_request("_id is required")),
    };
    changes.remove("id");
    let mut db = state.db.write().await;
    let user = db.user_mut(&id)?;
    user.fields.extend(changes);
    user.updated_at = timestamp();
    Ok(Json(user.render(&id)))
}

async fn find_users(
    State(state): State<AppState>,
    Json(filter): Json<Map<String, Value>>,
) -> Json<Vec<Value>> {
    let db = state.db.read().await;
    let mut found: Vec<(&String, &UserRecord)> = db
        .users
        .iter()
        .filter(|(id, user)| user.matches(id, &filter))
        .collect();
    found.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(b.0)));
    Json(found.into_iter().map(|(id, user)| user.render(id)).collect())
}

async fn add_relation(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<StatusCode> {
    let user_id = form
        .get("userId")
        .cloned()
        .ok_or_else(|| ApiError::bad_request("userId is required"))?;
    let mut db = state.db.write().await;
    db.user_mut(&user_id)?;
    let record = form.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    db.relations.push(record);
    Ok(StatusCode::OK)
}

// --- contacts ---

async fn add_contact(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Form(form): Form<ContactForm>,
) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    let user = db.user_mut(&user_id)?;
    let contact = Contact {
        contact_id: new_id(),
        label: form.label,
        kind: form.kind,
        value: form.value,
    };
    let id = contact.contact_id.clone();
    user.contacts.push(contact);
    Ok(Json(json!({ "contactId": id })))
}

async fn list_contacts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Contact>>> {
    let mut db = state.db.write().await;
    Ok(Json(db.user_mut(&user_id)?.contacts.clone()))
}

async fn load_contact(
    State(state): State<AppState>,
    Path((user_id, contact_id)): Path<(String, String)>,
) -> ApiResult<Json<Contact>> {
    let mut db = state.db.write().await;
    db.user_mut(&user_id)?
        .contacts
        .iter()
        .find(|c| c.contact_id == contact_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("contact {contact_id} not found")))
}

async fn update_contact(
    State(state): State<AppState>,
    Path((user_id, contact_id)): Path<(String, String)>,
    Form(form): Form<ContactForm>,
) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    let contact = db
        .user_mut(&user_id)?
        .contacts
        .iter_mut()
        .find(|c| c.contact_id == contact_id)
        .ok_or_else(|| ApiError::not_found(format!("contact {contact_id} not found")))?;
    overwrite(&mut contact.label, form.label);
    overwrite(&mut contact.kind, form.kind);
    overwrite(&mut contact.value, form.value);
    Ok(Json(json!({ "contactId": contact_id })))
}

async fn delete_contact(
    State(state): State<AppState>,
    Path((user_id, contact_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut db = state.db.write().await;
    let contacts = &mut db.user_mut(&user_id)?.contacts;
    let before = contacts.len();
    contacts.retain(|c| c.contact_id != contact_id);
    if contacts.len() == before {
        return Err(ApiError::not_found(format!("contact {contact_id} not found")));
    }
    Ok(StatusCode::OK)
}

// --- addresses ---

async fn add_address(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Form(form): Form<AddressForm>,
) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    let user = db.user_mut(&user_id)?;
    let address = Address {
        address_id: new_id(),
        label: form.label,
        kind: form.kind,
        address1: form.address1,
        address2: form.address2,
        city: form.city,
        state: form.state,
        country: form.country,
        zip_code: form.zip_code,
    };
    let id = address.address_id.clone();
    user.addresses.push(address);
    Ok(Json(json!({ "addressId": id })))
}

async fn list_addresses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Address>>> {
    let mut db = state.db.write().await;
    Ok(Json(db.user_mut(&user_id)?.addresses.clone()))
}

async fn load_address(
    State(state): State<AppState>,
    Path((user_id, address_id)): Path<(String, String)>,
) -> ApiResult<Json<Address>> {
    let mut db = state.db.write().await;
    db.user_mut(&user_id)?
        .addresses
        .iter()
        .find(|a| a.address_id == address_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("address {address_id} not found")))
}

async fn update_address(
    State(state): State<AppState>,
    Path((user_id, address_id)): Path<(String, String)>,
    Form(form): Form<AddressForm>,
) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    let address = db
        .user_mut(&user_id)?
        .addresses
        .iter_mut()
        .find(|a| a.address_id == address_id)
        .ok_or_else(|| ApiError::not_found(format!("address {address_id} not found")))?;
    overwrite(&mut address.label, form.label);
    overwrite(&mut address.kind, form.kind);
    overwrite(&mut address.address1, form.address1);
    overwrite(&mut address.address2, form.address2);
    overwrite(&mut address.city, form.city);
    overwrite(&mut address.state, form.state);
    overwrite(&mut address.country, form.country);
    overwrite(&mut address.zip_code, form.zip_code);
    Ok(Json(json!({ "addressId": address_id })))
}

async fn delete_address(
    State(state): State<AppState>,
    Path((user_id, address_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut db = state.db.write().await;
    let addresses = &mut db.user_mut(&user_id)?.addresses;
    let before = addresses.len();
    addresses.retain(|a| a.address_id != address_id);
    if addresses.len() == before {
        return Err(ApiError::not_found(format!("address {address_id} not found")));
    }
    Ok(StatusCode::OK)
}

// --- auth ---

async fn sign_up(
    State(state): State<AppState>,
    Form(form): Form<SignUpForm>,
) -> ApiResult<Json<Value>> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }
    let mut db = state.db.write().await;
    if db.accounts.contains_key(&form.email) {
        return Err(ApiError::conflict(format!("{} is already signed up", form.email)));
    }
    let user_id = match form.user_id {
        Some(user_id) => {
            if !db.users.contains_key(&user_id) {
                return Err(ApiError::not_found(format!("user {user_id} not found")));
            }
            user_id
        }
        None => {
            let mut fields = Map::new();
            fields.insert("email".to_string(), json!(form.email));
            let user_id = new_id();
            db.users.insert(user_id.clone(), UserRecord::new(fields));
            user_id
        }
    };
    db.accounts.insert(
        form.email,
        Account {
            user_id: user_id.clone(),
            password: form.password,
            verified: false,
        },
    );
    let token = db.open_session(&user_id);
    tracing::info!(user_id = %user_id, "account signed up");
    Ok(Json(json!({ "token": token })))
}

async fn log_in(State(state): State<AppState>, Form(form): Form<LogInForm>) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    let user_id = match db.accounts.get(&form.email) {
        Some(account) if account.password == form.password => account.user_id.clone(),
        _ => return Err(ApiError::unauthorized("invalid email or password")),
    };
    let token = db.open_session(&user_id);
    Ok(Json(json!({ "token": token })))
}

async fn log_out(State(state): State<AppState>, Path(user_id): Path<String>) -> StatusCode {
    let mut db = state.db.write().await;
    db.sessions.retain(|_, owner| *owner != user_id);
    StatusCode::OK
}

async fn facebook(
    State(state): State<AppState>,
    Form(form): Form<FacebookForm>,
) -> ApiResult<Json<Value>> {
    if form.facebook_token.trim().is_empty() {
        return Err(ApiError::bad_request("facebookToken is required"));
    }
    let mut db = state.db.write().await;
    let mut fields = Map::new();
    fields.insert("facebookToken".to_string(), json!(form.facebook_token));
    let user_id = new_id();
    db.users.insert(user_id.clone(), UserRecord::new(fields));
    let token = db.open_session(&user_id);
    Ok(Json(json!({ "token": token })))
}

async fn verify_request(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    let verified = db
        .accounts
        .values()
        .find(|a| a.user_id == user_id)
        .map(|a| a.verified)
        .ok_or_else(|| ApiError::bad_request(format!("user {user_id} has no account")))?;
    if verified {
        return Err(ApiError::bad_request(format!("user {user_id} is already verified")));
    }
    let token = new_id();
    db.verify_tokens.insert(token.clone(), user_id);
    Ok(Json(json!({ "verifyToken": token })))
}

async fn verify(State(state): State<AppState>, Form(form): Form<VerifyForm>) -> ApiResult<StatusCode> {
    let mut db = state.db.write().await;
    let user_id = db
        .verify_tokens
        .remove(&form.verify_token)
        .ok_or_else(|| ApiError::bad_request("unknown verify token"))?;
    if let Some(account) = db.accounts.values_mut().find(|a| a.user_id == user_id) {
        account.verified = true;
    }
    Ok(StatusCode::OK)
}

async fn reset_password_request(
    State(state): State<AppState>,
    Form(form): Form<ResetRequestForm>,
) -> ApiResult<Json<Value>> {
    let mut db = state.db.write().await;
    if !db.accounts.contains_key(&form.email) {
        return Err(ApiError::bad_request(format!("{} is not signed up", form.email)));
    }
    let token = new_id();
    db.reset_tokens.insert(token.clone(), form.email.clone());
    Ok(Json(json!({ "user": { "email": form.email }, "emailToken": token })))
}

async fn reset_password(
    State(state): State<AppState>,
    Form(form): Form<ResetForm>,
) -> ApiResult<StatusCode> {
    let mut db = state.db.write().await;
    let email = db
        .reset_tokens
        .remove(&form.email_token)
        .ok_or_else(|| ApiError::bad_request("unknown email token"))?;
    let account = db
        .accounts
        .get_mut(&email)
        .ok_or_else(|| ApiError::bad_request(format!("{email} is not signed up")))?;
    account.password = form.password;
    Ok(StatusCode::OK)
}

async fn update_password(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Form(form): Form<PasswordUpdateForm>,
) -> ApiResult<StatusCode> {
    let mut db = state.db.write().await;
    let account = db
        .accounts
        .values_mut()
        .find(|a| a.user_id == user_id)
        .ok_or_else(|| ApiError::bad_request(format!("user {user_id} has no account")))?;
    if account.password != form.password {
        return Err(ApiError::forbidden("current password does not match"));
    }
    account.password = form.new_password;
    Ok(StatusCode::OK)
}

async fn update_email(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Form(form): Form<EmailUpdateForm>,
) -> ApiResult<StatusCode> {
    let mut db = state.db.write().await;
    let current = db
        .account_email(&user_id)
        .ok_or_else(|| ApiError::bad_request(format!("user {user_id} has no account")))?;
    if current != form.email && db.accounts.contains_key(&form.email) {
        return Err(ApiError::bad_request(format!("{} is already signed up", form.email)));
    }
    if let Some(account) = db.accounts.remove(&current) {
        db.accounts.insert(form.email.clone(), account);
    }
    if let Some(user) = db.users.get_mut(&user_id) {
        user.fields.insert("email".to_string(), json!(form.email));
        user.updated_at = timestamp();
    }
    Ok(StatusCode::OK)
}
