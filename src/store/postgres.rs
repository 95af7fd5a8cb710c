use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Poll, Vote, VoteCount, VoterIdentity};
use crate::store::{PollStore, VoteInsert};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn poll_from_row(row: &PgRow) -> Result<Poll> {
    let status: String = row.get("status");
    Ok(Poll {
        id: row.get("id"),
        created_by: VoterIdentity::from_storage_key(row.get("created_by")),
        option_a_label: row.get("option_a_label"),
        option_b_label: row.get("option_b_label"),
        option_a_image: row.get("option_a_image"),
        option_b_image: row.get("option_b_image"),
        description: row.get("description"),
        is_public: row.get("is_public"),
        status: status.parse().map_err(AppError::Internal)?,
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    })
}

fn vote_from_row(row: &PgRow) -> Result<Vote> {
    let choice: String = row.get("choice");
    Ok(Vote {
        id: row.get("id"),
        poll_id: row.get("poll_id"),
        voter: VoterIdentity::from_storage_key(row.get("voter_key")),
        choice: choice.parse().map_err(AppError::Internal)?,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl PollStore for PgStore {
    async fn insert_poll(&self, poll: &Poll) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO polls (
                id, created_by, option_a_label, option_b_label,
                option_a_image, option_b_image, description, is_public,
                status, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(poll.id)
        .bind(poll.created_by.storage_key())
        .bind(&poll.option_a_label)
        .bind(&poll.option_b_label)
        .bind(&poll.option_a_image)
        .bind(&poll.option_b_image)
        .bind(&poll.description)
        .bind(poll.is_public)
        .bind(poll.status.as_str())
        .bind(poll.expires_at)
        .bind(poll.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_poll(&self, poll_id: Uuid) -> Result<Option<Poll>> {
        let row = sqlx::query("SELECT * FROM polls WHERE id = $1")
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(poll_from_row).transpose()
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<VoteInsert> {
        // The unique index on (poll_id, voter_key) is the serialization
        // point; a conflicting insert leaves the stored choice untouched.
        let result = sqlx::query(
            r#"
            INSERT INTO votes (id, poll_id, voter_key, choice, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (poll_id, voter_key) DO NOTHING
            "#,
        )
        .bind(vote.id)
        .bind(vote.poll_id)
        .bind(vote.voter.storage_key())
        .bind(vote.choice.as_str())
        .bind(vote.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(VoteInsert::DuplicateIdentity)
        } else {
            Ok(VoteInsert::Inserted)
        }
    }

    async fn find_vote(&self, poll_id: Uuid, voter: &VoterIdentity) -> Result<Option<Vote>> {
        let row = sqlx::query("SELECT * FROM votes WHERE poll_id = $1 AND voter_key = $2")
            .bind(poll_id)
            .bind(voter.storage_key())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(vote_from_row).transpose()
    }

    async fn count_votes(&self, poll_id: Uuid) -> Result<VoteCount> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE choice = 'option_a') AS option_a,
                COUNT(*) FILTER (WHERE choice = 'option_b') AS option_b
            FROM votes
            WHERE poll_id = $1
            "#,
        )
        .bind(poll_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(VoteCount {
            option_a: row.get::<Option<i64>, _>("option_a").unwrap_or(0),
            option_b: row.get::<Option<i64>, _>("option_b").unwrap_or(0),
        })
    }

    async fn mark_closed(&self, poll_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE polls SET status = 'closed' WHERE id = $1 AND status = 'active'")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_poll(&self, poll_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE polls SET status = 'deleted' WHERE id = $1 AND status <> 'deleted'")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM votes WHERE poll_id = $1")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE polls SET status = 'closed' WHERE status = 'active' AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
