//! Repository for the `conversations` table.
//!
//! The `messages` jsonb array is shared with the web platform, so every
//! update here is a single self-contained statement. The worker never
//! reads, modifies, and writes the array back in separate steps.

use seqstack_core::types::EntityId;
use sqlx::PgPool;

use crate::models::Conversation;

/// Column list for `conversations` queries.
const COLUMNS: &str = "id, project_id, messages, created_at";

/// Conversation access for chat-driven analyses.
pub struct ConversationRepo;

impl ConversationRepo {
    /// Find the conversation for a project.
    pub async fn find_by_project(
        pool: &PgPool,
        project_id: EntityId,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM conversations WHERE project_id = $1");
        sqlx::query_as::<_, Conversation>(&query)
            .bind(project_id)
            .fetch_optional(pool)
            .await
    }

    /// Return the project's conversation, creating an empty one if none
    /// exists yet. Concurrent creation attempts converge on one row.
    pub async fn ensure_for_project(
        pool: &PgPool,
        project_id: EntityId,
    ) -> Result<Conversation, sqlx::Error> {
        let query = format!(
            "INSERT INTO conversations (project_id, messages) \
             VALUES ($1, '[]'::jsonb) \
             ON CONFLICT (project_id) DO UPDATE SET project_id = EXCLUDED.project_id \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Conversation>(&query)
            .bind(project_id)
            .fetch_one(pool)
            .await
    }

    /// Stamp `analysis_id` onto the first message of the project's
    /// conversation. Seeds a one-message array when the conversation is
    /// still empty.
    ///
    /// Returns `false` when the project has no conversation row; callers
    /// outside the chat flow treat that as a no-op.
    pub async fn stamp_first_message(
        pool: &PgPool,
        project_id: EntityId,
        analysis_id: EntityId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE conversations \
             SET messages = CASE jsonb_typeof(messages) \
                 WHEN 'array' THEN CASE \
                     WHEN jsonb_array_length(messages) = 0 \
                         THEN jsonb_build_array(jsonb_build_object('analysis_id', $2)) \
                     ELSE jsonb_set(messages, '{0,analysis_id}', to_jsonb($2), true) \
                 END \
                 ELSE jsonb_build_array(jsonb_build_object('analysis_id', $2)) \
             END \
             WHERE project_id = $1",
        )
        .bind(project_id)
        .bind(analysis_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Merge the run's `text`, `image`, and `data` payload fields into the
    /// first message of the project's conversation. Absent artifacts are
    /// written as explicit nulls.
    ///
    /// Returns `false` when there is no conversation or its message array
    /// is empty.
    pub async fn backfill_first_message(
        pool: &PgPool,
        project_id: EntityId,
        text: Option<&str>,
        image: Option<&str>,
        data: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE conversations \
             SET messages = jsonb_set( \
                 messages, \
                 '{0}', \
                 (messages->0) || jsonb_build_object('text', $2, 'image', $3, 'data', $4) \
             ) \
             WHERE project_id = $1 \
               AND CASE WHEN jsonb_typeof(messages) = 'array' \
                        THEN jsonb_array_length(messages) > 0 \
                        ELSE false END",
        )
        .bind(project_id)
        .bind(text)
        .bind(image)
        .bind(data)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
