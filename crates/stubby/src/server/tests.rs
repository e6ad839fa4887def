use super::*;
use crate::config::{DEFAULT_ADMIN_PORT, DEFAULT_LOCATION, DEFAULT_STUBS_PORT};
use crate::contract::{RequestSpec, ResponseSpec, CONTRACT_VIOLATION};
use serial_test::serial;

fn contract(url: &str, status: i64) -> EndpointContract {
    EndpointContract::new(RequestSpec::new(url), vec![ResponseSpec::new(status)])
}

fn ephemeral() -> StartOptions {
    StartOptions {
        stubs: Some(0),
        admin: Some(0),
        location: Some("127.0.0.1".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_put_violation_returns_stable_message() {
    let stubby = Stubby::new();
    let err = stubby.put("42", contract("/somewhere", 800)).unwrap_err();
    assert_eq!(err.to_string(), CONTRACT_VIOLATION);
}

#[test]
fn test_put_upheld_contract() {
    let stubby = Stubby::new();
    let id = stubby.post(contract("/somewhere", 200)).unwrap();
    assert!(stubby.put(&id, contract("/elsewhere", 200)).is_ok());
    assert_eq!(stubby.endpoints().get(&id).unwrap().request.url, "/elsewhere");
}

#[test]
fn test_put_missing_id_is_not_found() {
    let stubby = Stubby::new();
    assert_eq!(
        stubby.put("42", contract("/somewhere", 200)),
        Err(StoreError::NotFound("42".to_string()))
    );
}

#[test]
fn test_post_violation_and_success() {
    let stubby = Stubby::new();
    let err = stubby.post(contract("/somewhere", 800)).unwrap_err();
    assert_eq!(err.to_string(), CONTRACT_VIOLATION);
    assert!(stubby.endpoints().is_empty());

    assert!(stubby.post(contract("/somewhere", 200)).is_ok());
    assert_eq!(stubby.endpoints().len(), 1);
}

#[test]
fn test_delete_all_empties_store() {
    let stubby = Stubby::new();
    stubby.delete_all();
    assert!(stubby.endpoints().get_all().is_empty());

    stubby.post(contract("/a", 200)).unwrap();
    stubby.post(contract("/b", 200)).unwrap();
    stubby.delete_all();
    assert!(stubby.endpoints().get_all().is_empty());
}

#[test]
fn test_delete_by_id() {
    let stubby = Stubby::new();
    let a = stubby.post(contract("/a", 200)).unwrap();
    let b = stubby.post(contract("/b", 200)).unwrap();

    assert_eq!(stubby.delete_by_id(&a).unwrap().id, a);
    let remaining: Vec<String> = stubby
        .endpoints()
        .get_all()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(remaining, vec![b]);

    assert_eq!(
        stubby.delete_by_id(&a),
        Err(StoreError::NotFound(a.clone()))
    );
}

#[test]
fn test_instances_are_independent() {
    let first = Stubby::new();
    let second = Stubby::new();
    first.post(contract("/a", 200)).unwrap();
    assert_eq!(first.endpoints().len(), 1);
    assert!(second.endpoints().is_empty());
}

#[tokio::test]
async fn test_start_reports_bound_ports_and_seeds_data() {
    let stubby = Stubby::new();
    let config = stubby
        .start(StartOptions {
            data: Some(vec![contract("/seeded", 204)]),
            ..ephemeral()
        })
        .await
        .unwrap();

    assert_ne!(config.stubs, 0);
    assert_ne!(config.admin, 0);
    assert_ne!(config.stubs, config.admin);
    assert_eq!(stubby.endpoints().len(), 1);

    let resp = reqwest::get(format!("http://127.0.0.1:{}/seeded", config.stubs))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = reqwest::get(format!("http://127.0.0.1:{}/ping", config.admin))
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "pong");

    stubby.stop().await;
}

#[tokio::test]
async fn test_start_rejects_invalid_data() {
    let stubby = Stubby::new();
    let err = stubby
        .start(StartOptions {
            data: Some(vec![contract("/ok", 200), contract("/bad", 800)]),
            ..ephemeral()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::Data(_)));
    assert!(stubby.endpoints().is_empty());
}

#[tokio::test]
async fn test_start_rejects_half_tls() {
    let stubby = Stubby::new();
    let err = stubby
        .start(StartOptions {
            key: Some("key.pem".into()),
            ..ephemeral()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::Config(ConfigError::IncompleteTls(_))));
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let stubby = Stubby::new();
    stubby.stop().await;

    let config = stubby.start(ephemeral()).await.unwrap();
    stubby.stop().await;
    stubby.stop().await;

    // The port is released once stop returns.
    assert!(TcpListener::bind(("127.0.0.1", config.stubs)).await.is_ok());
}

#[tokio::test]
async fn test_second_start_rejected_while_running() {
    let stubby = Stubby::new();
    let options = StartOptions {
        data: Some(vec![contract("/seeded", 200)]),
        ..ephemeral()
    };
    stubby.start(options.clone()).await.unwrap();

    let err = stubby.start(options).await.unwrap_err();
    assert!(matches!(err, StartError::AlreadyRunning));
    assert_eq!(stubby.endpoints().len(), 1);

    stubby.stop().await;
    stubby.start(ephemeral()).await.unwrap();
    assert_eq!(stubby.endpoints().len(), 1);
    stubby.stop().await;
}

#[tokio::test]
async fn test_failed_start_can_be_retried() {
    let stubby = Stubby::new();
    let bad = StartOptions {
        data: Some(vec![contract("/bad", 800)]),
        ..ephemeral()
    };
    assert!(matches!(
        stubby.start(bad).await.unwrap_err(),
        StartError::Data(_)
    ));

    stubby.start(ephemeral()).await.unwrap();
    stubby.stop().await;
}

#[tokio::test]
#[serial]
async fn test_start_with_defaults() {
    let stubby = Stubby::new();
    let config = stubby.start(StartOptions::default()).await.unwrap();

    assert_eq!(config.stubs, DEFAULT_STUBS_PORT);
    assert_eq!(config.admin, DEFAULT_ADMIN_PORT);
    assert_eq!(config.location, DEFAULT_LOCATION);
    assert_eq!(config.key, None);
    assert_eq!(config.cert, None);
    assert!(config.data.is_empty());

    stubby.stop().await;
}
