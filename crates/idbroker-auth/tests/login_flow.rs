//! End-to-end login and renewal against a mock provider.

use std::time::Duration;

use idbroker_auth::prelude::*;
use idbroker_db_memory::create_storage;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A mock provider where `code-<user>` exchanges to `at-<user>`, and
/// `at-<user>` resolves to `<user>@d.com`.
struct Provider {
    server: MockServer,
}

impl Provider {
    async fn start() -> Self {
        init_tracing();
        Self {
            server: MockServer::start().await,
        }
    }

    async fn user(&self, user: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(format!("code=code-{user}&")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": format!("at-{user}"),
                "token_type": "Bearer",
                "expires_in": 3599,
                "refresh_token": format!("rt-{user}")
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/oauth2/v2/userinfo"))
            .and(header("authorization", format!("Bearer at-{user}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "email": format!("{user}@d.com"),
                "verified_email": true,
                "hd": "d.com"
            })))
            .mount(&self.server)
            .await;
    }

    fn backend(&self) -> Backend {
        let settings = BrokerSettings {
            provider: idbroker_auth::ProviderEndpoints::with_base_url(&self.server.uri()),
            ..BrokerSettings::default()
        };
        Backend::new(settings, create_storage()).unwrap()
    }
}

fn config() -> FieldData {
    FieldData::new()
        .with("client_id", "id")
        .with("client_secret", "sec")
        .with("redirect_url", "https://x/cb")
        .with("fetch_groups", false)
}

fn role_r1() -> FieldData {
    FieldData::new()
        .with("name", "r1")
        .with("policies", vec!["p1"])
        .with("bound_emails", vec!["a@d.com"])
        .with("ttl", 3600_i64)
        .with("max_ttl", 86400_i64)
}

fn login(code: &str, role: &str) -> FieldData {
    FieldData::new().with("code", code).with("role", role)
}

async fn configured(provider: &Provider) -> Backend {
    let backend = provider.backend();
    backend.write_config(&config()).await.unwrap();
    backend.upsert_role(&role_r1()).await.unwrap();
    backend
}

#[tokio::test]
async fn scenario_a_login_success() {
    let provider = Provider::start().await;
    provider.user("a").await;
    let backend = configured(&provider).await;

    let lease = backend
        .login(&login("code-a", "r1"))
        .await
        .unwrap()
        .into_lease()
        .unwrap();

    assert_eq!(lease.display_name, "a@d.com");
    assert_eq!(lease.policies, vec!["p1"]);
    assert_eq!(lease.options.ttl, Duration::from_secs(3600));
    assert!(lease.options.renewable);
    assert_eq!(lease.username(), Some("a@d.com"));
    assert_eq!(lease.metadata["domain"], "d.com");
    assert_eq!(lease.internal_data["role"], "r1");

    let token = TokenCodec::decode(&lease.internal_data["token"]).unwrap();
    assert_eq!(token.access_token, "at-a");
    assert_eq!(token.refresh_token.as_deref(), Some("rt-a"));
}

#[tokio::test]
async fn scenario_b_unbound_email() {
    let provider = Provider::start().await;
    provider.user("b").await;
    let backend = configured(&provider).await;

    let err = backend.login(&login("code-b", "r1")).await.unwrap_err();
    assert!(matches!(err, BrokerError::NotAuthorized { .. }));
    assert!(err.is_denial());
}

#[tokio::test]
async fn scenario_c_no_bindings() {
    let provider = Provider::start().await;
    let backend = provider.backend();

    let err = backend
        .upsert_role(
            &FieldData::new()
                .with("name", "r1")
                .with("policies", vec!["p1"])
                .with("bound_emails", Vec::<String>::new())
                .with("bound_groups", Vec::<String>::new()),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Validation(ValidationError::NoBindings)
    ));
    assert!(backend.list_roles().await.unwrap().keys().unwrap().is_empty());
}

#[tokio::test]
async fn scenario_d_ttl_exceeds_max_ttl() {
    let provider = Provider::start().await;
    let backend = provider.backend();

    let err = backend
        .upsert_role(&role_r1().with("ttl", 7200_i64).with("max_ttl", 3600_i64))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Validation(ValidationError::TtlExceedsMaxTtl { .. })
    ));
    assert!(
        backend
            .read_role(&FieldData::new().with("name", "r1"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn scenario_e_role_edited_after_login() {
    let provider = Provider::start().await;
    provider.user("a").await;
    let backend = configured(&provider).await;

    let lease = backend
        .login(&login("code-a", "r1"))
        .await
        .unwrap()
        .into_lease()
        .unwrap();
    assert_eq!(lease.policies, vec!["p1"]);

    backend
        .upsert_role(&role_r1().with("bound_emails", vec!["c@d.com"]))
        .await
        .unwrap();

    let err = backend.renew(&lease).await.unwrap_err();
    match err {
        BrokerError::PolicyDrift { stale, current } => {
            assert_eq!(stale, vec!["p1"]);
            assert!(current.is_empty());
        }
        other => panic!("expected policy drift, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_f_root_policy() {
    let provider = Provider::start().await;
    let backend = provider.backend();

    let err = backend
        .upsert_role(&role_r1().with("policies", vec!["root"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BrokerError::Validation(ValidationError::RootPolicy)
    ));
}

#[tokio::test]
async fn renewal_with_unchanged_role_succeeds() {
    let provider = Provider::start().await;
    provider.user("a").await;
    let backend = configured(&provider).await;

    let lease = backend
        .login(&login("code-a", "r1"))
        .await
        .unwrap()
        .into_lease()
        .unwrap();

    let renewed = backend.renew(&lease).await.unwrap().into_lease().unwrap();
    assert!(idbroker_auth::authz::same_policy_set(
        &renewed.policies,
        &lease.policies
    ));
    assert_eq!(renewed.options.issue_time, lease.options.issue_time);
    assert_eq!(renewed.options.ttl, Duration::from_secs(3600));
}

#[tokio::test]
async fn renewal_with_unbounded_ttl_does_not_overflow() {
    let provider = Provider::start().await;
    provider.user("a").await;
    let backend = configured(&provider).await;
    backend
        .upsert_role(&role_r1().with("ttl", i64::MAX).with("max_ttl", i64::MAX))
        .await
        .unwrap();

    let lease = backend
        .login(&login("code-a", "r1"))
        .await
        .unwrap()
        .into_lease()
        .unwrap();
    assert_eq!(lease.options.ttl, Duration::from_secs(i64::MAX as u64));

    let renewed = backend.renew(&lease).await.unwrap().into_lease().unwrap();
    assert_eq!(renewed.options.ttl, lease.options.ttl);
}

#[tokio::test]
async fn renewal_reverifies_without_reexchange() {
    let provider = Provider::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "at-a"})),
        )
        .expect(1)
        .mount(&provider.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"email": "a@d.com", "hd": "d.com"})),
        )
        .expect(3)
        .mount(&provider.server)
        .await;

    let backend = configured(&provider).await;
    let lease = backend
        .login(&login("code-a", "r1"))
        .await
        .unwrap()
        .into_lease()
        .unwrap();
    backend.renew(&lease).await.unwrap();
    backend.renew(&lease).await.unwrap();
}

#[tokio::test]
async fn renewal_with_revoked_token_fails_identity_lookup() {
    let provider = Provider::start().await;
    provider.user("a").await;
    let backend = configured(&provider).await;

    let lease = backend
        .login(&login("code-a", "r1"))
        .await
        .unwrap()
        .into_lease()
        .unwrap();

    provider.server.reset().await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&provider.server)
        .await;

    let err = backend.renew(&lease).await.unwrap_err();
    assert!(matches!(err, BrokerError::IdentityLookup(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn login_requires_config_and_role() {
    let provider = Provider::start().await;
    let backend = provider.backend();

    let err = backend.login(&login("code-a", "r1")).await.unwrap_err();
    assert!(matches!(err, BrokerError::RoleNotFound(_)));

    backend.upsert_role(&role_r1()).await.unwrap();
    let err = backend.login(&login("code-a", "r1")).await.unwrap_err();
    assert!(matches!(err, BrokerError::ConfigMissing));
}

#[tokio::test]
async fn rejected_code_is_exchange_error() {
    let provider = Provider::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Malformed auth code."
        })))
        .mount(&provider.server)
        .await;
    let backend = configured(&provider).await;

    let err = backend.login(&login("stale", "r1")).await.unwrap_err();
    assert!(matches!(err, BrokerError::Exchange(IdpError::OAuthError { .. })));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn out_of_range_token_lifetime_is_exchange_error() {
    let provider = Provider::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-a",
            "expires_in": i64::MAX
        })))
        .mount(&provider.server)
        .await;
    let backend = configured(&provider).await;

    let err = backend.login(&login("code-a", "r1")).await.unwrap_err();
    assert!(matches!(err, BrokerError::Exchange(IdpError::InvalidResponse(_))));
}

#[tokio::test]
async fn login_through_group_membership() {
    let provider = Provider::start().await;
    provider.user("g").await;

    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let private_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
    let sa_key = json!({
        "type": "service_account",
        "client_email": "sa@proj.iam.gserviceaccount.com",
        "private_key": private_pem,
        "token_uri": format!("{}/sa/token", provider.server.uri()),
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/sa/token"))
        .and(body_string_contains("assertion="))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "delegated"})),
        )
        .mount(&provider.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/directory/v1/groups"))
        .and(query_param("userKey", "g@d.com"))
        .and(header("authorization", "Bearer delegated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [{"email": "eng@d.com"}, {"email": "all@d.com"}]
        })))
        .mount(&provider.server)
        .await;

    let backend = provider.backend();
    backend
        .write_config(
            &config()
                .with("fetch_groups", true)
                .with("service_account_key", sa_key)
                .with("delegation_user", "admin@d.com"),
        )
        .await
        .unwrap();
    backend
        .upsert_role(
            &FieldData::new()
                .with("name", "eng")
                .with("policies", "reader, writer")
                .with("bound_groups", "eng@d.com")
                .with("bound_domain", "d.com"),
        )
        .await
        .unwrap();

    let lease = backend
        .login(&login("code-g", "eng"))
        .await
        .unwrap()
        .into_lease()
        .unwrap();
    assert_eq!(lease.policies, vec!["reader", "writer"]);

    let renewed = backend.renew(&lease).await.unwrap().into_lease().unwrap();
    assert_eq!(renewed.policies, lease.policies);

    let read = backend.read_config().await.unwrap();
    let data = read.data().unwrap();
    assert_eq!(data["delegation_user"], "admin@d.com");
    assert!(!data.contains_key("service_account_key"));
}

#[tokio::test]
async fn group_lookup_failure_is_reported() {
    let provider = Provider::start().await;
    provider.user("a").await;

    let backend = provider.backend();
    backend
        .write_config(
            &config()
                .with("fetch_groups", true)
                .with(
                    "service_account_key",
                    r#"{"client_email":"sa@p.iam","private_key":"not a pem"}"#,
                )
                .with("delegation_user", "admin@d.com"),
        )
        .await
        .unwrap();
    backend.upsert_role(&role_r1()).await.unwrap();

    let err = backend.login(&login("code-a", "r1")).await.unwrap_err();
    match err {
        BrokerError::GroupLookup(e) => assert!(e.is_credential_error()),
        other => panic!("expected group lookup error, got {other:?}"),
    }
}
