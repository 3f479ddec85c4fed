//! Full account lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises the client over
//! real HTTP through `UreqTransport`. Validates that request building,
//! transcoding and response decoding agree with an actual server.

use chrono::NaiveDate;
use serde_json::json;
use td_users::{
    Config, Credentials, EmailUpdate, ErrorKind, NewUser, PasswordReset, PasswordUpdate, SignUp,
    UreqTransport, User, UserFilter, UsersClient, Verification,
};

/// Serve the mock on a random port from a background thread and return its
/// base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(base_url: &str) -> UsersClient<UreqTransport> {
    let config = Config {
        base_url: base_url.to_string(),
        ..Config::default()
    };
    UsersClient::new(config, UreqTransport::new())
}

#[test]
fn account_lifecycle() {
    let base_url = start_server();
    let client = client(&base_url);

    // Step 1: create a profile through the entity.
    let mut user = User {
        first_name: Some("Ann".to_string()),
        last_name: Some("Lee".to_string()),
        email: Some("ann@example.com".to_string()),
        birth_date: NaiveDate::from_ymd_opt(1990, 1, 2),
        height: Some(170.0),
        metadata: Some(json!({ "some_key": { "nested_key": [1, 2] } })),
        ..User::default()
    };
    assert!(user.create(&client).unwrap());
    let id = user.id.clone().expect("service assigns an id");

    // Step 2: find by id; metadata comes back verbatim, the date as a date.
    let found = client
        .find(&UserFilter {
            id: Some(id.clone()),
            ..UserFilter::default()
        })
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id.as_deref(), Some(id.as_str()));
    assert_eq!(found[0].first_name.as_deref(), Some("Ann"));
    assert_eq!(found[0].birth_date, NaiveDate::from_ymd_opt(1990, 1, 2));
    assert_eq!(found[0].height, Some(170.0));
    assert_eq!(found[0].metadata, user.metadata);
    assert!(found[0].created_at.is_some());

    // Step 3: find with alternatives.
    let found = client
        .find(&UserFilter {
            or: Some(vec![
                UserFilter {
                    first_name: Some("Nobody".to_string()),
                    ..UserFilter::default()
                },
                UserFilter {
                    last_name: Some("Lee".to_string()),
                    ..UserFilter::default()
                },
            ]),
            ..UserFilter::default()
        })
        .unwrap();
    assert_eq!(found.len(), 1);

    // Step 4: update through the entity.
    user.gender = Some("female".to_string());
    assert!(user.update(&client).unwrap());
    assert_eq!(user.gender.as_deref(), Some("female"));
    assert_eq!(user.first_name.as_deref(), Some("Ann"));

    // Step 5: contacts.
    assert!(user
        .add_contact(&client, &json!({ "type": "telephone", "label": "home", "value": "5551234" }))
        .unwrap());
    let contact_id = user.contacts.as_ref().unwrap()[0].id.clone().unwrap();
    let refreshed = user.all_contacts(&client).unwrap();
    assert_eq!(refreshed.len(), 1);
    let updated = user
        .update_contact(&client, &contact_id, &json!({ "value": "5559999" }))
        .unwrap();
    assert_eq!(updated.value.as_deref(), Some("5559999"));
    assert_eq!(updated.label.as_deref(), Some("home"));
    let fetched = user.find_contact(&client, &contact_id).unwrap();
    assert_eq!(fetched.value.as_deref(), Some("5559999"));
    assert_eq!(user.contacts.as_ref().unwrap().len(), 1);
    assert!(user.delete_contact(&client, &contact_id).unwrap());
    assert!(user.contacts.as_ref().unwrap().is_empty());
    assert!(client.all_contacts(&id).unwrap().is_empty());

    // Step 6: addresses.
    assert!(user
        .add_address(&client, &json!({ "city": "Lima", "zip_code": "15001" }))
        .unwrap());
    let address_id = user.addresses.as_ref().unwrap()[0].id.clone().unwrap();
    let fetched = user.find_address(&client, &address_id).unwrap();
    assert_eq!(fetched.zip_code.as_deref(), Some("15001"));
    assert_eq!(fetched.user_id.as_deref(), Some(id.as_str()));
    user.update_address(&client, &address_id, &json!({ "country": "PE" }))
        .unwrap();
    assert_eq!(
        client.all_addresses(&id).unwrap()[0].country.as_deref(),
        Some("PE")
    );
    assert!(user.delete_address(&client, &address_id).unwrap());

    // Step 7: relation.
    assert!(client
        .add_relation(&json!({ "user_id": id, "related_user_id": "other" }))
        .unwrap());

    // Step 8: sign up and open a session.
    let auth = client
        .sign_up(&SignUp {
            user_id: Some(id.clone()),
            email: "ann@example.com".to_string(),
            password: "s3cret".to_string(),
        })
        .unwrap();
    assert_eq!(auth.user_id.as_deref(), Some(id.as_str()));
    let token = auth.token.expect("sign up issues a token");
    let current = client.current(&token).unwrap();
    assert_eq!(current.id.as_deref(), Some(id.as_str()));

    let err = client
        .sign_up(&SignUp {
            user_id: None,
            email: "ann@example.com".to_string(),
            password: "again".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);

    // Step 9: password flows.
    let reset = client.reset_password_request("ann@example.com").unwrap();
    assert_eq!(reset.email.as_deref(), Some("ann@example.com"));
    assert!(client
        .reset_password(&PasswordReset {
            email_token: reset.email_token.unwrap(),
            password: "changed".to_string(),
        })
        .unwrap());
    assert!(client
        .update_password(&PasswordUpdate {
            user_id: id.clone(),
            password: "changed".to_string(),
            new_password: "final".to_string(),
        })
        .unwrap());
    let err = client
        .update_password(&PasswordUpdate {
            user_id: id.clone(),
            password: "wrong".to_string(),
            new_password: "x".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);

    // Step 10: email change, then log in with the new credentials.
    assert!(client
        .update_email(&EmailUpdate {
            user_id: id.clone(),
            email: "ann@example.org".to_string(),
        })
        .unwrap());
    let auth = client
        .log_in(&Credentials {
            email: "ann@example.org".to_string(),
            password: "final".to_string(),
            remember_me: Some(true),
        })
        .unwrap();
    assert_eq!(auth.email.as_deref(), Some("ann@example.org"));
    let err = client
        .log_in(&Credentials {
            email: "ann@example.org".to_string(),
            password: "stale".to_string(),
            remember_me: None,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);

    // Step 11: verification.
    assert!(client.verify_request(&id).unwrap());
    let err = client
        .verify(&Verification {
            user_id: Some(id.clone()),
            verify_token: "not-issued".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Step 12: log out ends every session.
    let session = auth.token.unwrap();
    assert!(client.log_out(&id).unwrap());
    let err = client.current(&session).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);

    // Step 13: facebook issues a token for a fresh user.
    assert!(client.facebook("fb-access").unwrap().token.is_some());
}

#[test]
fn wrong_secret_is_rejected() {
    let base_url = start_server();
    let mut client = client(&base_url);
    client.reconfigure(|config| config.application_secret = "wrong".to_string());

    let err = client
        .create(&NewUser {
            first_name: Some("Ann".to_string()),
            ..NewUser::default()
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);
}

#[test]
fn missing_sub_resources_are_validation_errors() {
    let base_url = start_server();
    let client = client(&base_url);
    let err = client.all_contacts("no-such-user").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn unreachable_service_is_a_transport_error() {
    let client = client("http://127.0.0.1:1");
    let err = client.current("token").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}
