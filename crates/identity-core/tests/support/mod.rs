//! Shared fixtures for integration tests: in-memory stand-ins for the two
//! remote services, a call-counting store wrapper, and app/server builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use identity_core::api::{self, ApiState};
use identity_core::clients::{
    AuthServiceError, AuthenticationApi, NotificationApi, NotificationError,
};
use identity_core::user_store::UserStore;
use identity_core::{NewUser, Result as CoreResult, SqliteUserStore, TokenScope, User, UserService};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Call record kept by [`FakeAuthService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCall {
    Authenticate { scope: TokenScope },
    SetPassword { user_id: i64 },
    AddPermission { user_id: i64, codes: Vec<String> },
    CreateToken { scope: TokenScope, user_id: i64 },
    DeleteAllTokens { scope: TokenScope, user_id: i64 },
}

#[derive(Default)]
struct FakeAuthState {
    tokens: HashMap<String, (TokenScope, i64)>,
    calls: Vec<AuthCall>,
    fail_set_password: bool,
    fail_create_token: bool,
}

/// In-memory stand-in for the remote authentication service. Tokens are
/// 26-character alphanumeric strings, looked up by plaintext and scope.
#[derive(Default, Clone)]
pub struct FakeAuthService {
    state: Arc<Mutex<FakeAuthState>>,
}

impl FakeAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every SetPassword call fail from now on.
    pub fn fail_set_password(&self) {
        self.state.lock().unwrap().fail_set_password = true;
    }

    /// Make every CreateToken call fail from now on.
    pub fn fail_create_token(&self) {
        self.state.lock().unwrap().fail_create_token = true;
    }

    pub fn calls(&self) -> Vec<AuthCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of live tokens a user holds in a scope.
    pub fn token_count(&self, scope: TokenScope, user_id: i64) -> usize {
        self.state
            .lock()
            .unwrap()
            .tokens
            .values()
            .filter(|(token_scope, owner)| *token_scope == scope && *owner == user_id)
            .count()
    }

    /// Plant a token directly, as if minted earlier.
    pub fn issue_token(&self, scope: TokenScope, user_id: i64) -> String {
        let token = random_token();
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(token.clone(), (scope, user_id));
        token
    }
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(26)
        .map(char::from)
        .collect()
}

#[async_trait]
impl AuthenticationApi for FakeAuthService {
    async fn authenticate(
        &self,
        scope: TokenScope,
        token_plaintext: &str,
    ) -> Result<i64, AuthServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(AuthCall::Authenticate { scope });

        match state.tokens.get(token_plaintext) {
            Some((token_scope, owner)) if *token_scope == scope => Ok(*owner),
            _ => Err(AuthServiceError::TokenNotFound),
        }
    }

    async fn set_password(&self, user_id: i64, _password: &str) -> Result<(), AuthServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(AuthCall::SetPassword { user_id });

        if state.fail_set_password {
            return Err(AuthServiceError::Status {
                status: 500,
                message: "password store unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn add_permission_for_user(
        &self,
        user_id: i64,
        codes: &[&str],
    ) -> Result<(), AuthServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(AuthCall::AddPermission {
            user_id,
            codes: codes.iter().map(|code| code.to_string()).collect(),
        });
        Ok(())
    }

    async fn create_token(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<String, AuthServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(AuthCall::CreateToken { scope, user_id });

        if state.fail_create_token {
            return Err(AuthServiceError::Status {
                status: 500,
                message: "token store unavailable".to_string(),
            });
        }

        let token = random_token();
        state.tokens.insert(token.clone(), (scope, user_id));
        Ok(token)
    }

    async fn delete_all_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), AuthServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(AuthCall::DeleteAllTokens { scope, user_id });
        state
            .tokens
            .retain(|_, entry| !(entry.0 == scope && entry.1 == user_id));
        Ok(())
    }
}

/// Activation email captured by [`RecordingNotifier`].
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub recipient: String,
    pub user_id: i64,
    pub token: String,
}

#[derive(Default)]
struct NotifierState {
    sent: Vec<SentEmail>,
    fail: bool,
}

/// Notification client that records emails instead of sending them.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail from now on.
    pub fn fail_sends(&self) {
        self.state.lock().unwrap().fail = true;
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl NotificationApi for RecordingNotifier {
    async fn send_activation_email(
        &self,
        recipient: &str,
        user_id: i64,
        token: &str,
    ) -> Result<(), NotificationError> {
        let mut state = self.state.lock().unwrap();
        if state.fail {
            return Err(NotificationError::Status {
                status: 500,
                message: "mail relay unavailable".to_string(),
            });
        }

        state.sent.push(SentEmail {
            recipient: recipient.to_string(),
            user_id,
            token: token.to_string(),
        });
        Ok(())
    }
}

/// Store wrapper that counts operations, for asserting that a rejected
/// request never reached storage.
pub struct CountingStore<S> {
    inner: S,
    operations: Arc<AtomicUsize>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            operations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.operations.clone()
    }
}

#[async_trait]
impl<S: UserStore> UserStore for CountingStore<S> {
    async fn insert(&self, new_user: NewUser) -> CoreResult<User> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(new_user).await
    }

    async fn get_by_email(&self, email: &str) -> CoreResult<User> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_email(email).await
    }

    async fn get_by_id(&self, user_id: i64) -> CoreResult<User> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_id(user_id).await
    }

    async fn update(&self, user: &mut User) -> CoreResult<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.inner.update(user).await
    }
}

/// Fully wired application over a temporary database, with handles to
/// every collaborator a test may want to inspect.
pub struct TestApp {
    pub router: axum::Router,
    pub service: UserService,
    pub store: SqliteUserStore,
    pub auth: FakeAuthService,
    pub notifier: RecordingNotifier,
    store_ops: Arc<AtomicUsize>,
    _temp_dir: TempDir,
}

impl TestApp {
    /// Number of store operations performed so far.
    pub fn store_op_count(&self) -> usize {
        self.store_ops.load(Ordering::SeqCst)
    }
}

pub async fn test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("identity.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = SqliteUserStore::new(&db_url)
        .await
        .expect("Failed to create test database");

    let counting = CountingStore::new(store.clone());
    let store_ops = counting.counter();

    let auth = FakeAuthService::new();
    let notifier = RecordingNotifier::new();

    let service = UserService::new(
        Arc::new(counting),
        Arc::new(auth.clone()),
        Arc::new(notifier.clone()),
    );
    let router = api::router(ApiState {
        service: service.clone(),
        environment: "test".to_string(),
    });

    TestApp {
        router,
        service,
        store,
        auth,
        notifier,
        store_ops,
        _temp_dir: temp_dir,
    }
}

/// Test server handle
pub struct TestServer {
    pub url: String,
    pub auth: FakeAuthService,
    pub notifier: RecordingNotifier,
    _temp_dir: TempDir,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Shutdown the test server
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Serve a fully wired application on an OS-assigned port.
pub async fn start_test_server() -> anyhow::Result<TestServer> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter("identity_core=debug,tower_http=debug")
        .try_init();

    let app = test_app().await;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let url = format!("http://{}", addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let router = app.router.clone();

    tokio::spawn(async move {
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        if let Err(e) = server.await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(TestServer {
        url,
        auth: app.auth.clone(),
        notifier: app.notifier.clone(),
        _temp_dir: app._temp_dir,
        shutdown_tx,
    })
}
