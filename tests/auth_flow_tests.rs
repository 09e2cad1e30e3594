//! End-to-end authentication flows against a mock identity provider:
//! interactive sign-in, callback timeout, lazy refresh, and sign-out.

mod support;

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feima_bridge::auth::{AuthError, MemorySecretStore, SecretStore, StoredSession, TOKEN_STORAGE_KEY};

use support::{
    auth_service, bridge_config, fresh_stored_session, make_jwt, seed_session,
    stored_session_with, wait_for_opened_url, RecordingBrowser,
};

fn query_params(url: &str) -> HashMap<String, String> {
    Url::parse(url).unwrap().query_pairs().into_owned().collect()
}

fn form_params(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn challenge_of(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn callback(state: &str, code: &str) -> Url {
    Url::parse(&format!(
        "x-host://pub.ext/oauth/callback?state={state}&code={code}"
    ))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Interactive sign-in
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_sign_in_produces_a_session_and_one_added_event() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "expires_in": 3600,
            "token_type": "Bearer",
            "id_token": make_jwt(serde_json::json!({"sub": "u1", "email": "u@e"})),
        })))
        .expect(1)
        .mount(&idp)
        .await;

    let config = Arc::new(bridge_config(&idp.uri(), "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store.clone(), browser.clone()).await;
    let mut events = service.subscribe();

    let signing_in = {
        let service = service.clone();
        tokio::spawn(async move { service.create_session().await })
    };

    let opened = wait_for_opened_url(&browser).await;
    let params = query_params(&opened);
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "vc");
    assert_eq!(params["redirect_uri"], "x-host://pub.ext/oauth/callback");
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["scope"], "openid profile email");
    assert!(!params["state"].is_empty());
    assert!(!params["code_challenge"].is_empty());

    service.handle_uri(&callback(&params["state"], "abc"));

    let session = signing_in.await.unwrap().unwrap();
    assert_eq!(session.access_token, "AT1");
    assert_eq!(session.account.id, "u1");
    assert_eq!(session.account.label, "u@e");
    assert!(session.scopes.is_empty());

    // Token exchange carried the right form fields, and the verifier it
    // presented hashes to the challenge the browser saw.
    let requests = idp.received_requests().await.unwrap();
    let token_request = requests
        .iter()
        .find(|request| request.url.path() == "/oauth/token")
        .unwrap();
    let form = form_params(&token_request.body);
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["code"], "abc");
    assert_eq!(form["client_id"], "vc");
    assert_eq!(form["redirect_uri"], "x-host://pub.ext/oauth/callback");
    assert_eq!(challenge_of(&form["code_verifier"]), params["code_challenge"]);

    // Exactly one `added` event, carrying the session.
    let change = events.recv().await.unwrap();
    assert_eq!(change.added.len(), 1);
    assert!(change.removed.is_empty());
    assert_eq!(change.added[0].access_token, "AT1");

    // The flow record is gone and the store holds the session.
    assert_eq!(service.active_flow_count(), 0);
    let stored: StoredSession =
        serde_json::from_str(&store.get(TOKEN_STORAGE_KEY).await.unwrap().unwrap()).unwrap();
    assert_eq!(stored.token_response.access_token, "AT1");
    assert_eq!(stored.account_id, "u1");
}

#[tokio::test]
async fn concurrent_sign_ins_resolve_independently() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT",
            "expires_in": 3600,
        })))
        .expect(2)
        .mount(&idp)
        .await;

    let config = Arc::new(bridge_config(&idp.uri(), "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store, browser.clone()).await;

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.create_session().await })
    };
    let second = {
        let service = service.clone();
        tokio::spawn(async move { service.create_session().await })
    };

    // Wait until both flows opened a browser.
    let urls = loop {
        let urls = browser.opened();
        if urls.len() == 2 {
            break urls;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    };
    let states: Vec<String> = urls.iter().map(|url| query_params(url)["state"].clone()).collect();
    assert_ne!(states[0], states[1]);

    // Resolve in reverse order; each callback must reach its own flow.
    service.handle_uri(&callback(&states[1], "code-b"));
    service.handle_uri(&callback(&states[0], "code-a"));

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(service.active_flow_count(), 0);

    // Each exchange presented the verifier belonging to its own state.
    let challenges: HashMap<String, String> = urls
        .iter()
        .map(|url| {
            let params = query_params(url);
            (params["state"].clone(), params["code_challenge"].clone())
        })
        .collect();
    let requests = idp.received_requests().await.unwrap();
    for request in requests.iter().filter(|r| r.url.path() == "/oauth/token") {
        let form = form_params(&request.body);
        let expected_state = if form["code"] == "code-a" {
            &states[0]
        } else {
            &states[1]
        };
        assert_eq!(
            challenge_of(&form["code_verifier"]),
            challenges[expected_state]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn sign_in_times_out_after_five_minutes_without_a_callback() {
    let config = Arc::new(bridge_config("https://idp.example/auth", "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store.clone(), browser).await;

    let signing_in = {
        let service = service.clone();
        tokio::spawn(async move { service.create_session().await })
    };

    let result = signing_in.await.unwrap();
    assert!(matches!(result, Err(AuthError::CallbackTimedOut)));
    assert_eq!(service.active_flow_count(), 0);
    assert!(store.get(TOKEN_STORAGE_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_browser_launch_fails_fast() {
    let config = Arc::new(bridge_config("https://idp.example/auth", "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    let browser = Arc::new(RecordingBrowser::failing());
    let service = auth_service(config, store, browser).await;

    let result = service.create_session().await;
    assert!(matches!(result, Err(AuthError::CannotOpenBrowser(_))));
    assert_eq!(service.active_flow_count(), 0);
}

#[tokio::test]
async fn exchange_failure_surfaces_status_and_body() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&idp)
        .await;

    let config = Arc::new(bridge_config(&idp.uri(), "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store.clone(), browser.clone()).await;
    let mut events = service.subscribe();

    let signing_in = {
        let service = service.clone();
        tokio::spawn(async move { service.create_session().await })
    };
    let opened = wait_for_opened_url(&browser).await;
    service.handle_uri(&callback(&query_params(&opened)["state"], "abc"));

    match signing_in.await.unwrap() {
        Err(AuthError::TokenExchangeFailed { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "invalid_grant");
        }
        other => panic!("expected TokenExchangeFailed, got {other:?}"),
    }
    assert!(store.get(TOKEN_STORAGE_KEY).await.unwrap().is_none());
    assert!(events.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Lazy refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expiring_token_is_refreshed_and_refresh_token_preserved() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=RT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT2",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&idp)
        .await;

    let config = Arc::new(bridge_config(&idp.uri(), "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    // 3580 of 3600 seconds already burned: inside the refresh window.
    seed_session(&store, &stored_session_with("AT1", Some("RT1"), Some(3600), 3580)).await;
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store.clone(), browser).await;

    let before = chrono::Utc::now().timestamp_millis();
    let sessions = service.get_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].access_token, "AT2");

    let stored: StoredSession =
        serde_json::from_str(&store.get(TOKEN_STORAGE_KEY).await.unwrap().unwrap()).unwrap();
    assert_eq!(stored.token_response.access_token, "AT2");
    // The IdP returned no refresh token; the old one must survive.
    assert_eq!(stored.token_response.refresh_token.as_deref(), Some("RT1"));
    assert!(stored.issued_at >= before);

    // A second call finds a fresh token and does not hit the IdP again
    // (the mock's expect(1) verifies on drop).
    let again = service.get_sessions().await.unwrap();
    assert_eq!(again[0].access_token, "AT2");
}

#[tokio::test]
async fn failed_refresh_signs_out_silently() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&idp)
        .await;

    let config = Arc::new(bridge_config(&idp.uri(), "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    seed_session(&store, &stored_session_with("AT1", Some("RT1"), Some(3600), 3580)).await;
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store.clone(), browser).await;
    let mut events = service.subscribe();

    assert!(service.get_sessions().await.unwrap().is_empty());
    assert!(store.get(TOKEN_STORAGE_KEY).await.unwrap().is_none());
    assert!(service.cached_sessions().is_empty());
    // No event: observers simply see "no session" on their next poll.
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn token_without_refresh_token_is_served_until_rejected() {
    let config = Arc::new(bridge_config("https://idp.example/auth", "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    seed_session(&store, &stored_session_with("AT1", None, Some(3600), 3580)).await;
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store, browser).await;

    // Refresh is due but impossible; the stored token is still returned.
    let sessions = service.get_sessions().await.unwrap();
    assert_eq!(sessions[0].access_token, "AT1");
}

// ---------------------------------------------------------------------------
// Sign-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_out_clears_the_store_and_fires_one_removed_event() {
    let config = Arc::new(bridge_config("https://idp.example/auth", "https://api.example/v1"));
    let store = Arc::new(MemorySecretStore::new());
    seed_session(&store, &fresh_stored_session("AT1")).await;
    let browser = Arc::new(RecordingBrowser::new());
    let service = auth_service(config, store.clone(), browser).await;
    let mut events = service.subscribe();

    service.remove_session("session-test").await.unwrap();

    assert!(store.get(TOKEN_STORAGE_KEY).await.unwrap().is_none());
    assert!(service.cached_sessions().is_empty());
    let change = events.recv().await.unwrap();
    assert!(change.added.is_empty());
    assert_eq!(change.removed.len(), 1);
    assert_eq!(change.removed[0].access_token, "AT1");
    assert_eq!(change.removed[0].account.label, "u@e");

    // removeSession then getSessions returns [].
    assert!(service.get_sessions().await.unwrap().is_empty());
}
