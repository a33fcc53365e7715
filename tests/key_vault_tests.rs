//! Key Vault client and credential tests
//!
//! Tests the secret store against a mocked Key Vault REST API.

use recipe_api::config::KeyVaultConfig;
use recipe_api::error::SecretStoreError;
use recipe_api::secrets::{
    CredentialProvider, KeyVaultClient, ManagedIdentityCredential, SecretStore,
    StaticTokenCredential,
};
use recipe_api::util::SecretString;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Create a test Key Vault client
fn create_test_vault(mock_server: &MockServer, max_retries: u32) -> KeyVaultClient {
    let config = KeyVaultConfig {
        url: Some(mock_server.uri()),
        max_retries,
        timeout_secs: 5,
        ..Default::default()
    };
    let credential = StaticTokenCredential::new("kv-test-token").unwrap();
    KeyVaultClient::new(&config, Box::new(credential)).unwrap()
}

fn secret_bundle(value: &str) -> serde_json::Value {
    json!({
        "value": value,
        "id": "https://vault.example/secrets/approved-users/6f1c",
        "attributes": { "enabled": true }
    })
}

#[tokio::test]
async fn test_fetch_allow_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/approved-users"))
        .and(query_param("api-version", "7.4"))
        .and(header("Authorization", "Bearer kv-test-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(secret_bundle(r#"["alice@x.com", "Bob@X.com"]"#)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let vault = create_test_vault(&mock_server, 0);
    let emails = vault.fetch_allow_list("approved-users").await.unwrap();

    assert_eq!(emails, vec!["alice@x.com", "Bob@X.com"]);
    assert_eq!(vault.store_type(), "Key Vault");
}

#[tokio::test]
async fn test_secret_name_is_url_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/approved%20users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_bundle("[]")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let vault = create_test_vault(&mock_server, 0);
    let emails = vault.fetch_allow_list("approved users").await.unwrap();
    assert!(emails.is_empty());
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "SecretNotFound", "message": "Secret not found" }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/locked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/denied"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let vault = create_test_vault(&mock_server, 0);

    assert!(matches!(
        vault.fetch_allow_list("missing").await,
        Err(SecretStoreError::NotFound { name }) if name == "missing"
    ));
    assert!(matches!(
        vault.fetch_allow_list("locked").await,
        Err(SecretStoreError::Forbidden { .. })
    ));
    assert!(matches!(
        vault.fetch_allow_list("denied").await,
        Err(SecretStoreError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/approved-users"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/approved-users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_bundle(r#"["a@x.com"]"#)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let vault = create_test_vault(&mock_server, 2);
    let emails = vault.fetch_allow_list("approved-users").await.unwrap();
    assert_eq!(emails, vec!["a@x.com"]);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/approved-users"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let vault = create_test_vault(&mock_server, 3);
    assert!(vault.fetch_allow_list("approved-users").await.is_err());
}

#[tokio::test]
async fn test_non_array_secret_is_invalid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/approved-users"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(secret_bundle("alice@x.com;bob@x.com")),
        )
        .mount(&mock_server)
        .await;

    let vault = create_test_vault(&mock_server, 0);
    assert!(matches!(
        vault.fetch_allow_list("approved-users").await,
        Err(SecretStoreError::InvalidSecret { .. })
    ));
}

// =============================================================================
// Managed identity
// =============================================================================

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[tokio::test]
async fn test_managed_identity_token_is_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .and(query_param("resource", "https://vault.azure.net"))
        .and(query_param("api-version", "2019-08-01"))
        .and(header("X-IDENTITY-HEADER", "identity-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "mi-token",
            "expires_on": (unix_now() + 3600).to_string(),
            "resource": "https://vault.azure.net",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let credential = ManagedIdentityCredential::new(
        reqwest::Client::new(),
        format!("{}/msi/token", mock_server.uri()),
        SecretString::new("identity-secret"),
    );

    let first = credential.access_token().await.unwrap();
    let second = credential.access_token().await.unwrap();

    assert_eq!(first.expose_secret(), "mi-token");
    assert_eq!(second.expose_secret(), "mi-token");
    assert_eq!(credential.credential_type(), "managed identity");
}

#[tokio::test]
async fn test_managed_identity_renews_near_expiry() {
    let mock_server = MockServer::start().await;

    // Expires inside the renewal margin, so every call fetches again
    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "short-lived",
            "expires_on": unix_now() + 60
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let credential = ManagedIdentityCredential::new(
        reqwest::Client::new(),
        format!("{}/msi/token", mock_server.uri()),
        SecretString::new("identity-secret"),
    );

    credential.access_token().await.unwrap();
    credential.access_token().await.unwrap();
}

#[tokio::test]
async fn test_managed_identity_token_used_for_vault() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "mi-token",
            "expires_on": unix_now() + 3600
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/approved-users"))
        .and(header("Authorization", "Bearer mi-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_bundle(r#"["a@x.com"]"#)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let credential = ManagedIdentityCredential::new(
        reqwest::Client::new(),
        format!("{}/msi/token", mock_server.uri()),
        SecretString::new("identity-secret"),
    );
    let config = KeyVaultConfig {
        url: Some(mock_server.uri()),
        max_retries: 0,
        ..Default::default()
    };
    let vault = KeyVaultClient::new(&config, Box::new(credential)).unwrap();

    assert_eq!(
        vault.fetch_allow_list("approved-users").await.unwrap(),
        vec!["a@x.com"]
    );
}

#[tokio::test]
async fn test_managed_identity_failure_surfaces_as_credential_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("identity unavailable"))
        .mount(&mock_server)
        .await;

    let credential = ManagedIdentityCredential::new(
        reqwest::Client::new(),
        format!("{}/msi/token", mock_server.uri()),
        SecretString::new("identity-secret"),
    );
    let config = KeyVaultConfig {
        url: Some(mock_server.uri()),
        ..Default::default()
    };
    let vault = KeyVaultClient::new(&config, Box::new(credential)).unwrap();

    assert!(matches!(
        vault.fetch_allow_list("approved-users").await,
        Err(SecretStoreError::Credential(_))
    ));
}
