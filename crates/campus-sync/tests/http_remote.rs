//! HTTP remote store against an in-process document API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use campus_core::{EntityKind, Teacher};
use campus_db::{Database, DbConfig};
use campus_sync::{
    ConnectivityProbe, HttpRemoteStore, PassStatus, RemoteError, RemoteStore, RemoteStoreExt,
    SyncOrchestrator, TcpProbe, UnitContext, UnitOutcome, UnitRegistry,
};

const TOKEN: &str = "test-token";

#[derive(Clone)]
struct ApiState {
    collections: Arc<HashMap<String, Vec<Value>>>,
    broken: Arc<Vec<String>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {TOKEN}");
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

async fn collection(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    if state.broken.contains(&name) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let documents = state.collections.get(&name).cloned().unwrap_or_default();
    Ok(Json(json!({ "documents": documents })))
}

async fn document(
    State(state): State<ApiState>,
    Path((name, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    state
        .collections
        .get(&name)
        .and_then(|docs| docs.iter().find(|d| d["id"] == id.as_str()))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

fn teacher_doc(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "data": { "fullName": name, "subject": "Chemistry", "userId": null }
    })
}

async fn serve(broken: &[&str]) -> String {
    let mut collections = HashMap::new();
    collections.insert(
        "teachers".to_string(),
        vec![teacher_doc("t-1", "Marie"), teacher_doc("t-2", "Rosalind")],
    );

    let state = ApiState {
        collections: Arc::new(collections),
        broken: Arc::new(broken.iter().map(|s| s.to_string()).collect()),
    };

    let app = Router::new()
        .route("/collections/{name}", get(collection))
        .route("/collections/{name}/{id}", get(document))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

fn client(base: &str) -> HttpRemoteStore {
    HttpRemoteStore::new(base, Duration::from_secs(5))
        .unwrap()
        .with_token(TOKEN)
}

#[tokio::test]
async fn test_fetch_collection_with_token() {
    let base = serve(&[]).await;

    let teachers: Vec<Teacher> = client(&base).fetch_records().await.unwrap();

    assert_eq!(teachers.len(), 2);
    assert_eq!(teachers[0].id, "t-1");
    assert_eq!(teachers[1].full_name, "Rosalind");
}

#[tokio::test]
async fn test_missing_token_is_auth_error() {
    let base = serve(&[]).await;
    let store = HttpRemoteStore::new(&base, Duration::from_secs(5)).unwrap();

    let err = store.fetch_collection(EntityKind::Teachers).await.unwrap_err();

    assert!(matches!(err, RemoteError::Auth(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let base = serve(&["exams"]).await;

    let err = client(&base)
        .fetch_collection(EntityKind::Exams)
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Status { status: 500, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_fetch_single_document() {
    let base = serve(&[]).await;
    let store = client(&base);

    let found: Option<Teacher> = store.fetch_record("t-2").await.unwrap();
    assert_eq!(found.unwrap().full_name, "Rosalind");

    let missing = store.fetch_document(EntityKind::Teachers, "t-9").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_unknown_collection_is_empty() {
    let base = serve(&[]).await;

    let docs = client(&base).fetch_collection(EntityKind::Fees).await.unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_full_pass_over_http() {
    let base = serve(&["exams"]).await;
    let addr = base.trim_start_matches("http://").to_string();

    let probe = Arc::new(TcpProbe::new(addr, Duration::from_secs(1)));
    assert!(probe.is_reachable().await);

    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let ctx = UnitContext::new(Arc::new(client(&base)), Arc::new(db.clone()));
    let orchestrator = SyncOrchestrator::new(UnitRegistry::standard(), ctx, probe);

    let result = orchestrator.run_pass().await;

    assert_eq!(result.status, PassStatus::PartialFailure);
    assert_eq!(result.failed_entities(), vec![EntityKind::Exams]);
    assert_eq!(result.outcome(EntityKind::Teachers), Some(&UnitOutcome::success(2)));
    assert_eq!(db.records::<Teacher>().count().await.unwrap(), 2);
}
