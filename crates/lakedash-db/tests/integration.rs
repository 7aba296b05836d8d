//! Behavioral tests for the connection manager and query executor, driven
//! through fake connector and token-source implementations.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use parking_lot::Mutex;

use lakedash_db::{
    AccessToken, AuthError, AuthMode, ConnectRequest, Connection, ConnectionManager, Connector,
    Error, Handle, OpenError, Params, QueryCacheConfig, QueryExecutor, Settings, Table, TokenFlow,
    TokenSource, Value,
};

const DRIVER_18: &str = "ODBC Driver 18 for SQL Server";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn drivers() -> Vec<String> {
    vec![DRIVER_18.to_string()]
}

fn spn_settings() -> Settings {
    Settings::new("myserver", "analytics")
        .client_id("app-id")
        .client_secret("s3cr3t")
}

fn device_code_settings() -> Settings {
    Settings::new("myserver", "analytics")
        .auth_mode(AuthMode::DeviceCode)
        .tenant_id("tenant-1")
}

/// A connection that serves a canned table and counts executions.
#[derive(Debug)]
struct CountingConnection {
    executions: AtomicUsize,
    fail_with: Option<String>,
}

impl CountingConnection {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            executions: AtomicUsize::new(0),
            fail_with: None,
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            executions: AtomicUsize::new(0),
            fail_with: Some(message.to_string()),
        })
    }

    fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for CountingConnection {
    async fn execute(&self, _sql: &str, _params: Option<&Params>) -> Result<Table, Error> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(Error::Query(message.clone())),
            None => Ok(Table::new(
                &["categoria", "qtd_alunos"],
                vec![vec![Value::from("6º ano"), Value::from(42i64)]],
            )),
        }
    }
}

/// A connector that follows a script of per-attempt outcomes and records
/// every request it saw.
struct ScriptedConnector {
    script: Mutex<VecDeque<Result<(), String>>>,
    requests: Mutex<Vec<ConnectRequest>>,
    opens: AtomicUsize,
    open_delay: Duration,
    connection: Arc<CountingConnection>,
}

impl ScriptedConnector {
    fn always_ok(connection: Arc<CountingConnection>) -> Arc<Self> {
        Self::scripted(Vec::new(), connection)
    }

    fn scripted(script: Vec<Result<(), String>>, connection: Arc<CountingConnection>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
            open_delay: Duration::from_millis(10),
            connection,
        })
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn request(&self, index: usize) -> ConnectRequest {
        self.requests.lock()[index].clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, request: &ConnectRequest) -> Result<Handle, OpenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        tokio::time::sleep(self.open_delay).await;
        match self.script.lock().pop_front() {
            Some(Err(message)) => Err(OpenError(message)),
            _ => Ok(Arc::clone(&self.connection) as Handle),
        }
    }
}

/// A token source that hands out a fixed token or a scripted failure.
struct FakeTokens {
    acquisitions: AtomicUsize,
    fail: bool,
}

impl FakeTokens {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            acquisitions: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            acquisitions: AtomicUsize::new(0),
            fail: true,
        })
    }
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn acquire(&self, _flow: TokenFlow) -> Result<AccessToken, AuthError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(AuthError::ProviderResponse {
                raw: r#"{"error":"invalid_client"}"#.to_string(),
            })
        } else {
            Ok(AccessToken::new("fake-jwt"))
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_opens_exactly_one_connection() {
    init_tracing();
    let connector = ScriptedConnector::always_ok(CountingConnection::ok());
    let manager = Arc::new(
        ConnectionManager::new(spn_settings(), connector.clone())
            .unwrap()
            .with_installed_drivers(drivers()),
    );

    let callers = (0..8).map(|_| {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.get_connection().await })
    });
    let handles: Vec<Handle> = join_all(callers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(connector.opens(), 1);
    for handle in &handles[1..] {
        assert!(Arc::ptr_eq(handle, &handles[0]));
    }
}

#[tokio::test]
async fn repeated_calls_reuse_the_cached_handle() {
    let connector = ScriptedConnector::always_ok(CountingConnection::ok());
    let manager = ConnectionManager::new(spn_settings(), connector.clone())
        .unwrap()
        .with_installed_drivers(drivers());

    let first = manager.get_connection().await.unwrap();
    let second = manager.get_connection().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.opens(), 1);
}

#[tokio::test]
async fn missing_driver_is_a_configuration_error_with_no_open() {
    let connector = ScriptedConnector::always_ok(CountingConnection::ok());
    let manager = ConnectionManager::new(spn_settings(), connector.clone())
        .unwrap()
        .with_installed_drivers(vec!["PostgreSQL Unicode".to_string()]);

    let err = manager.get_connection().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("PostgreSQL Unicode"));
    assert_eq!(connector.opens(), 0);
}

#[tokio::test]
async fn spn_failure_carries_context_and_hints() {
    let connector = ScriptedConnector::scripted(
        vec![Err("login failed for user 'app-id'".to_string())],
        CountingConnection::ok(),
    );
    let manager = ConnectionManager::new(spn_settings(), connector.clone())
        .unwrap()
        .with_installed_drivers(drivers());

    let err = manager.get_connection().await.unwrap_err();
    assert!(err.is_connection());
    let message = err.to_string();
    assert!(message.contains(DRIVER_18));
    assert!(message.contains("tcp:myserver,1433"));
    assert!(message.contains("analytics"));
    assert!(message.contains("login failed for user"));
    assert!(message.contains("client_secret"));
    // SPN has no fallback: one attempt only.
    assert_eq!(connector.opens(), 1);
}

#[tokio::test]
async fn spn_request_embeds_identity_without_token() {
    let connector = ScriptedConnector::always_ok(CountingConnection::ok());
    let manager = ConnectionManager::new(
        spn_settings().tenant_id("tenant-1"),
        connector.clone(),
    )
    .unwrap()
    .with_installed_drivers(drivers());

    manager.get_connection().await.unwrap();
    let request = connector.request(0);
    let conn_str = request.connection_string().to_string();
    assert!(conn_str.contains("Authentication=ActiveDirectoryServicePrincipal;"));
    assert!(conn_str.contains("UID=app-id;"));
    assert!(conn_str.contains("Authority Id=tenant-1;"));
    assert!(request.access_token().is_none());
}

#[tokio::test]
async fn token_attach_failure_falls_back_to_native_auth() {
    init_tracing();
    let connector = ScriptedConnector::scripted(
        vec![Err("HY000 manual token rejected".to_string()), Ok(())],
        CountingConnection::ok(),
    );
    let manager = ConnectionManager::new(device_code_settings(), connector.clone())
        .unwrap()
        .with_installed_drivers(drivers())
        .with_token_source(FakeTokens::ok());

    // Fallback success is indistinguishable from a first-attempt success.
    let handle = manager.get_connection().await;
    assert!(handle.is_ok());
    assert_eq!(connector.opens(), 2);

    let primary = connector.request(0);
    assert!(primary.access_token().is_some());
    assert!(!primary.connection_string().contains("Authentication="));

    let fallback = connector.request(1);
    assert!(fallback.access_token().is_none());
    assert!(
        fallback
            .connection_string()
            .contains("Authentication=ActiveDirectoryDeviceCode;")
    );
}

#[tokio::test]
async fn both_attempts_failing_yield_one_combined_error() {
    let connector = ScriptedConnector::scripted(
        vec![
            Err("token attach: HY000 attribute not supported".to_string()),
            Err("native auth: IM002 data source not found".to_string()),
        ],
        CountingConnection::ok(),
    );
    let manager = ConnectionManager::new(device_code_settings(), connector.clone())
        .unwrap()
        .with_installed_drivers(drivers())
        .with_token_source(FakeTokens::ok());

    let err = manager.get_connection().await.unwrap_err();
    assert!(err.is_connection());
    let message = err.to_string();
    assert!(message.contains("HY000 attribute not supported"));
    assert!(message.contains("IM002 data source not found"));
    assert!(message.contains("ActiveDirectoryDeviceCode"));
    assert_eq!(connector.opens(), 2);
}

#[tokio::test]
async fn failed_token_acquisition_surfaces_before_any_open() {
    let connector = ScriptedConnector::always_ok(CountingConnection::ok());
    let manager = ConnectionManager::new(device_code_settings(), connector.clone())
        .unwrap()
        .with_installed_drivers(drivers())
        .with_token_source(FakeTokens::failing());

    let err = manager.get_connection().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(err.to_string().contains("invalid_client"));
    assert_eq!(connector.opens(), 0);
}

#[tokio::test]
async fn identical_queries_within_ttl_execute_once() {
    let connection = CountingConnection::ok();
    let connector = ScriptedConnector::always_ok(Arc::clone(&connection));
    let manager = Arc::new(
        ConnectionManager::new(spn_settings(), connector)
            .unwrap()
            .with_installed_drivers(drivers()),
    );
    let executor = QueryExecutor::new(manager);

    let sql = "SELECT serie, COUNT(*) FROM dbo.tb_alunos GROUP BY serie";
    let first = executor.run_query(sql, None).await.unwrap();
    let second = executor.run_query(sql, None).await.unwrap();

    assert_eq!(connection.executions(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.rows()[0].get("qtd_alunos"), Some(&Value::Int(42)));
}

#[tokio::test]
async fn expired_entries_re_execute() {
    let connection = CountingConnection::ok();
    let connector = ScriptedConnector::always_ok(Arc::clone(&connection));
    let manager = Arc::new(
        ConnectionManager::new(spn_settings(), connector)
            .unwrap()
            .with_installed_drivers(drivers()),
    );
    let executor = QueryExecutor::with_cache_config(
        manager,
        QueryCacheConfig::default().ttl(Duration::from_millis(30)),
    );

    executor.run_query("SELECT 1", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    executor.run_query("SELECT 1", None).await.unwrap();

    assert_eq!(connection.executions(), 2);
}

#[tokio::test]
async fn distinct_parameters_are_distinct_cache_keys() {
    let connection = CountingConnection::ok();
    let connector = ScriptedConnector::always_ok(Arc::clone(&connection));
    let manager = Arc::new(
        ConnectionManager::new(spn_settings(), connector)
            .unwrap()
            .with_installed_drivers(drivers()),
    );
    let executor = QueryExecutor::new(manager);

    let sql = "SELECT * FROM dbo.tb_alunos WHERE serie = :serie";
    let mut sexto = Params::new();
    sexto.insert("serie".into(), Value::from("6º ano"));
    let mut setimo = Params::new();
    setimo.insert("serie".into(), Value::from("7º ano"));

    executor.run_query(sql, Some(&sexto)).await.unwrap();
    executor.run_query(sql, Some(&setimo)).await.unwrap();
    executor.run_query(sql, Some(&sexto)).await.unwrap();

    assert_eq!(connection.executions(), 2);
}

#[tokio::test]
async fn query_errors_propagate_and_are_not_cached() {
    let connection = CountingConnection::failing("invalid object name 'dbo.tb_missing'");
    let connector = ScriptedConnector::always_ok(Arc::clone(&connection));
    let manager = Arc::new(
        ConnectionManager::new(spn_settings(), connector)
            .unwrap()
            .with_installed_drivers(drivers()),
    );
    let executor = QueryExecutor::new(manager);

    let err = executor.run_query("SELECT 1", None).await.unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert!(err.to_string().contains("tb_missing"));

    // The failure was not cached; the next call hits the database again.
    let _ = executor.run_query("SELECT 1", None).await.unwrap_err();
    assert_eq!(connection.executions(), 2);
}
