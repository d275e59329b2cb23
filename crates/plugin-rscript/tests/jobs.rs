//! Integration tests for the R job flow against a real database.
//!
//! Exercises the handler end to end: analysis lookup, config decode,
//! script invocation, artifact ingestion, result insert, and the
//! conversation bookkeeping around chat runs. The dispatcher owns the
//! schema, so each test creates the tables the worker touches inline.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use seqstack_core::output::AnalysisStatus;
use seqstack_db::repositories::ConversationRepo;
use seqstack_dispatch::{DispatcherMessage, JobError, JobHandler};
use seqstack_plugin_rscript::handler::RscriptHandler;
use seqstack_plugin_rscript::runner::RscriptRunner;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

/// Stub script body generating all three conventional artifacts.
const ARTIFACT_STUB: &str = "cd \"$2\"\n\
                             printf 'PNG' > graph.png\n\
                             printf 'three clusters\\n' > result.txt\n\
                             printf '{\"clusters\": 3}' > data.json\n";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create_tables(pool: &PgPool) {
    sqlx::raw_sql(
        "CREATE TABLE analyses (
             id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
             config jsonb NOT NULL,
             created_at timestamptz NOT NULL DEFAULT now()
         );
         CREATE TABLE analysis_results (
             id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
             result jsonb NOT NULL,
             analysis_id uuid NOT NULL,
             plugin text NOT NULL,
             created_at timestamptz NOT NULL DEFAULT now()
         );
         CREATE TABLE conversations (
             id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
             project_id uuid NOT NULL UNIQUE,
             messages jsonb NOT NULL DEFAULT '[]'::jsonb,
             created_at timestamptz NOT NULL DEFAULT now()
         );",
    )
    .execute(pool)
    .await
    .expect("create tables");
}

async fn insert_analysis(pool: &PgPool, config: &Value) -> Uuid {
    sqlx::query_scalar("INSERT INTO analyses (config) VALUES ($1) RETURNING id")
        .bind(config)
        .fetch_one(pool)
        .await
        .expect("insert analysis")
}

async fn seed_conversation(pool: &PgPool, project_id: Uuid, messages: &Value) {
    sqlx::query("INSERT INTO conversations (project_id, messages) VALUES ($1, $2)")
        .bind(project_id)
        .bind(messages)
        .execute(pool)
        .await
        .expect("seed conversation");
}

/// Create `<root>/<organization_id>/samples/<sample>` holding `data.h5`.
fn create_sample_dir(download_root: &Path, organization_id: Uuid, sample: &str) -> PathBuf {
    let dir = download_root
        .join(organization_id.to_string())
        .join("samples")
        .join(sample);
    std::fs::create_dir_all(&dir).expect("create sample dir");
    std::fs::write(dir.join("data.h5"), b"\x89HDF\r\n").expect("write input file");
    dir
}

fn write_stub_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("rscript-stub");
    let mut f = std::fs::File::create(&path).expect("create stub");
    writeln!(f, "#!/bin/bash").expect("write shebang");
    write!(f, "{body}").expect("write body");
    drop(f);

    let mut perms = std::fs::metadata(&path).expect("stat stub").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod stub");
    path
}

fn build_handler(download_root: &Path, stub: &Path) -> RscriptHandler {
    RscriptHandler::with_scripts(
        "rscript",
        download_root.to_path_buf(),
        PathBuf::from("/app/scripts/analysis.R"),
        PathBuf::from("/app/scripts/chat.R"),
        RscriptRunner::with_program(stub.display().to_string()),
    )
}

fn job_message(organization_id: Uuid, analysis_id: Uuid) -> DispatcherMessage {
    DispatcherMessage {
        organization_id,
        analysis_id,
        plugin: "rscript".to_string(),
    }
}

async fn first_message(pool: &PgPool, project_id: Uuid) -> Value {
    let conversation = ConversationRepo::find_by_project(pool, project_id)
        .await
        .expect("find conversation")
        .expect("conversation row");
    conversation.messages[0].clone()
}

// ---------------------------------------------------------------------------
// Test: a chat run backfills the first message from the envelope payload
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn chat_run_backfills_the_first_message(pool: PgPool) {
    create_tables(&pool).await;

    let download_root = tempfile::tempdir().expect("tempdir");
    let organization_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    create_sample_dir(download_root.path(), organization_id, "S1");
    seed_conversation(
        &pool,
        project_id,
        &json!([{"role": "user", "content": "How many clusters?"}]),
    )
    .await;

    let analysis_id = insert_analysis(
        &pool,
        &json!({"rscript": {"sample": "S1", "type": "chat", "project": project_id}}),
    )
    .await;
    let stub = write_stub_tool(download_root.path(), ARTIFACT_STUB);
    let handler = build_handler(download_root.path(), &stub);

    let outcome = handler
        .handle(&pool, &job_message(organization_id, analysis_id))
        .await
        .expect("handle");
    assert_eq!(outcome.status, AnalysisStatus::Success);

    let r_key: Uuid =
        serde_json::from_value(outcome.result["rKey"].clone()).expect("rKey is a uuid");
    let envelope: Value = sqlx::query_scalar("SELECT result FROM analysis_results WHERE id = $1")
        .bind(r_key)
        .fetch_one(&pool)
        .await
        .expect("stored envelope");

    let first = first_message(&pool, project_id).await;
    assert_eq!(first["analysis_id"], json!(analysis_id));
    // The payload fields of the stored envelope land on the message.
    assert_eq!(first["text"], envelope["result"]["text"]);
    assert_eq!(first["image"], envelope["result"]["image"]);
    assert_eq!(first["data"], envelope["result"]["data"]);
    assert_eq!(first["text"], json!("three clusters"));
    assert_eq!(first["image"], json!(format!("{analysis_id}.png")));
    assert_eq!(first["data"], json!({"clusters": 3}));
    // The message's own fields survive the merge.
    assert_eq!(first["role"], json!("user"));
    assert_eq!(first["content"], json!("How many clusters?"));
}

// ---------------------------------------------------------------------------
// Test: a chat run creates the conversation when none exists
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn chat_run_creates_the_conversation_when_absent(pool: PgPool) {
    create_tables(&pool).await;

    let download_root = tempfile::tempdir().expect("tempdir");
    let organization_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    create_sample_dir(download_root.path(), organization_id, "S1");

    let analysis_id = insert_analysis(
        &pool,
        &json!({"rscript": {"sample": "S1", "type": "chat", "project": project_id}}),
    )
    .await;
    let stub = write_stub_tool(download_root.path(), ARTIFACT_STUB);
    let handler = build_handler(download_root.path(), &stub);

    let outcome = handler
        .handle(&pool, &job_message(organization_id, analysis_id))
        .await
        .expect("handle");
    assert_eq!(outcome.status, AnalysisStatus::Success);

    let conversation = ConversationRepo::find_by_project(&pool, project_id)
        .await
        .expect("find conversation")
        .expect("conversation created");
    let messages = conversation.messages.as_array().expect("messages array");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["analysis_id"], json!(analysis_id));
    assert_eq!(messages[0]["text"], json!("three clusters"));
}

// ---------------------------------------------------------------------------
// Test: an ordinary run stamps the first message but leaves its content
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn analysis_run_stamps_without_touching_content(pool: PgPool) {
    create_tables(&pool).await;

    let download_root = tempfile::tempdir().expect("tempdir");
    let organization_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    create_sample_dir(download_root.path(), organization_id, "S1");
    seed_conversation(
        &pool,
        project_id,
        &json!([{"role": "user", "content": "hello"}]),
    )
    .await;

    let analysis_id = insert_analysis(
        &pool,
        &json!({"rscript": {"sample": "S1", "project": project_id}}),
    )
    .await;
    let stub = write_stub_tool(download_root.path(), ARTIFACT_STUB);
    let handler = build_handler(download_root.path(), &stub);

    let outcome = handler
        .handle(&pool, &job_message(organization_id, analysis_id))
        .await
        .expect("handle");
    assert_eq!(outcome.status, AnalysisStatus::Success);

    // The run produced artifacts, but only the stamp reaches the message.
    let first = first_message(&pool, project_id).await;
    assert_eq!(first["analysis_id"], json!(analysis_id));
    assert_eq!(first["role"], json!("user"));
    assert!(first.get("text").is_none());
    assert!(first.get("image").is_none());
    assert!(first.get("data").is_none());
}

// ---------------------------------------------------------------------------
// Test: an ordinary run never creates a conversation
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn analysis_run_without_conversation_skips_the_stamp(pool: PgPool) {
    create_tables(&pool).await;

    let download_root = tempfile::tempdir().expect("tempdir");
    let organization_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    create_sample_dir(download_root.path(), organization_id, "S1");

    let analysis_id = insert_analysis(
        &pool,
        &json!({"rscript": {"sample": "S1", "project": project_id}}),
    )
    .await;
    let stub = write_stub_tool(download_root.path(), ARTIFACT_STUB);
    let handler = build_handler(download_root.path(), &stub);

    let outcome = handler
        .handle(&pool, &job_message(organization_id, analysis_id))
        .await
        .expect("handle");
    assert_eq!(outcome.status, AnalysisStatus::Success);

    let conversation = ConversationRepo::find_by_project(&pool, project_id)
        .await
        .expect("find conversation");
    assert!(conversation.is_none());
}

// ---------------------------------------------------------------------------
// Test: a chat job without a project id is rejected before running
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn chat_without_project_is_rejected(pool: PgPool) {
    create_tables(&pool).await;

    let download_root = tempfile::tempdir().expect("tempdir");
    let organization_id = Uuid::new_v4();
    create_sample_dir(download_root.path(), organization_id, "S1");

    let analysis_id =
        insert_analysis(&pool, &json!({"rscript": {"sample": "S1", "type": "chat"}})).await;
    let stub = write_stub_tool(download_root.path(), ARTIFACT_STUB);
    let handler = build_handler(download_root.path(), &stub);

    let err = handler
        .handle(&pool, &job_message(organization_id, analysis_id))
        .await
        .unwrap_err();
    assert_matches!(err, JobError::Config(_));

    let results: i64 = sqlx::query_scalar("SELECT count(*) FROM analysis_results")
        .fetch_one(&pool)
        .await
        .expect("count results");
    assert_eq!(results, 0);
}
