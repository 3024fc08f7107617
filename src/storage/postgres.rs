//! PostgreSQL adapter
//!
//! Implements every repository port over a `deadpool-postgres` pool. Steps
//! that touch more than one row run inside a single transaction; dropping the
//! transaction on an early return rolls it back.

use std::collections::{HashMap, HashSet};

use anyhow::Context;
use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

use super::{migrate, DirectoryRepository, PullRequestRepository, StatsRepository};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{PullRequest, PullRequestShort, PullRequestStatus, Team, TeamMember, User};

/// Pull request columns followed by the ordered reviewer array
const PULL_REQUEST_COLUMNS: &str = r#"
    p.id, p.name, p.author_id, p.status, p.need_more_reviewers, p.created_at, p.merged_at,
    ARRAY(
        SELECT r.user_id FROM pull_request_reviewers r
        WHERE r.pull_request_id = p.id
        ORDER BY r.id
    ) AS reviewers
"#;

const USER_COLUMNS: &str = "u.id, u.username, t.name, u.is_active";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Build a pool from configuration and verify connectivity
    ///
    /// Migrations are applied when `run_migrations` is set.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let mut pool_config = PoolConfig::new();
        pool_config.url = Some(config.url.clone());
        pool_config.connect_timeout = Some(config.connect_timeout());
        if let Some(timeout) = config.statement_timeout() {
            pool_config.options = Some(format!("-c statement_timeout={}", timeout.as_millis()));
        }
        pool_config.pool = Some(deadpool_postgres::PoolConfig::new(config.pool_size));
        pool_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create PostgreSQL connection pool")?;

        // Test connection
        let client = pool
            .get()
            .await
            .context("Failed to connect to PostgreSQL")?;
        client.simple_query("SELECT 1").await?;
        drop(client);

        let store = Self { pool };
        if config.run_migrations {
            let applied = store.migrate().await?;
            tracing::info!(applied, "Database schema up to date");
        }

        Ok(store)
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> anyhow::Result<usize> {
        migrate::run(&self.pool).await
    }
}

fn is_violation(err: &tokio_postgres::Error, state: &SqlState) -> bool {
    err.code() == Some(state)
}

fn row_to_user(row: &Row) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        team_name: row.get(2),
        is_active: row.get(3),
    }
}

fn parse_status(raw: &str) -> Result<PullRequestStatus> {
    raw.parse().map_err(Error::storage)
}

fn row_to_pull_request(row: &Row) -> Result<PullRequest> {
    let status: String = row.get(3);
    Ok(PullRequest {
        id: row.get(0),
        name: row.get(1),
        author_id: row.get(2),
        status: parse_status(&status)?,
        need_more_reviewers: row.get(4),
        created_at: row.get(5),
        merged_at: row.get(6),
        assigned_reviewers: row.get(7),
    })
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

// ============================================================================
// Directory
// ============================================================================

#[async_trait]
impl DirectoryRepository for PostgresStore {
    async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<Team> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let team_id: i64 = match tx
            .query_one("INSERT INTO teams (name) VALUES ($1) RETURNING id", &[&name])
            .await
        {
            Ok(row) => row.get(0),
            Err(err) if is_violation(&err, &SqlState::UNIQUE_VIOLATION) => {
                tracing::error!(team = name, "Team name already taken");
                return Err(Error::TeamExists);
            }
            Err(err) => return Err(err.into()),
        };

        for member in members {
            tx.execute(
                r#"
                INSERT INTO users (id, username, team_id, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO UPDATE
                SET username = EXCLUDED.username,
                    team_id = EXCLUDED.team_id,
                    is_active = EXCLUDED.is_active,
                    updated_at = now()
                "#,
                &[&member.user_id, &member.username, &team_id, &member.is_active],
            )
            .await?;
        }

        tx.commit().await?;
        drop(client);

        self.get_team(name).await
    }

    async fn get_team(&self, name: &str) -> Result<Team> {
        let client = self.pool.get().await?;

        let team_id: i64 = client
            .query_opt("SELECT id FROM teams WHERE name = $1", &[&name])
            .await?
            .ok_or(Error::TeamNotFound)?
            .get(0);

        let rows = client
            .query(
                "SELECT id, username, is_active FROM users WHERE team_id = $1 ORDER BY username, id",
                &[&team_id],
            )
            .await?;

        let members = rows
            .iter()
            .map(|row| TeamMember {
                user_id: row.get(0),
                username: row.get(1),
                is_active: row.get(2),
            })
            .collect();

        Ok(Team::new(name, members))
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN teams t ON t.id = u.team_id WHERE u.id = $1"
        );
        let row = client
            .query_opt(&sql, &[&user_id])
            .await?
            .ok_or(Error::UserNotFound)?;
        Ok(row_to_user(&row))
    }

    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            UPDATE users u SET is_active = $2, updated_at = now()
            FROM teams t
            WHERE t.id = u.team_id AND u.id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = client
            .query_opt(&sql, &[&user_id, &is_active])
            .await?
            .ok_or(Error::UserNotFound)?;
        Ok(row_to_user(&row))
    }

    async fn list_active_members(&self, team_name: &str) -> Result<Vec<User>> {
        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users u JOIN teams t ON t.id = u.team_id
            WHERE t.name = $1 AND u.is_active
            ORDER BY u.id
            "#
        );
        let rows = client.query(&sql, &[&team_name]).await?;

        if rows.is_empty() {
            let exists = client
                .query_opt("SELECT 1 FROM teams WHERE name = $1", &[&team_name])
                .await?
                .is_some();
            if !exists {
                return Err(Error::TeamNotFound);
            }
        }

        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn bulk_set_active(
        &self,
        team_name: &str,
        user_ids: &[String],
        is_active: bool,
    ) -> Result<Vec<User>> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let team_id: i64 = tx
            .query_opt("SELECT id FROM teams WHERE name = $1", &[&team_name])
            .await?
            .ok_or(Error::TeamNotFound)?
            .get(0);

        let rows = if user_ids.is_empty() {
            tx.query(
                r#"
                UPDATE users u SET is_active = $2, updated_at = now()
                FROM teams t
                WHERE t.id = u.team_id AND u.team_id = $1
                RETURNING u.id, u.username, t.name, u.is_active
                "#,
                &[&team_id, &is_active],
            )
            .await?
        } else {
            tx.query(
                r#"
                UPDATE users u SET is_active = $2, updated_at = now()
                FROM teams t
                WHERE t.id = u.team_id AND u.team_id = $1 AND u.id = ANY($3)
                RETURNING u.id, u.username, t.name, u.is_active
                "#,
                &[&team_id, &is_active, &user_ids],
            )
            .await?
        };

        let users: Vec<User> = rows.iter().map(row_to_user).collect();

        let updated: HashSet<&str> = users.iter().map(|u| u.id.as_str()).collect();
        if let Some(missing) = user_ids.iter().find(|id| !updated.contains(id.as_str())) {
            tracing::debug!(team = team_name, user_id = %missing, "Requested user is not a team member");
            return Err(Error::UserNotFound);
        }

        tx.commit().await?;
        Ok(users)
    }
}

// ============================================================================
// Pull Requests
// ============================================================================

#[async_trait]
impl PullRequestRepository for PostgresStore {
    async fn create(&self, pull_request: &PullRequest) -> Result<PullRequest> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let inserted = tx
            .execute(
                r#"
                INSERT INTO pull_requests (id, name, author_id, status, need_more_reviewers)
                VALUES ($1, $2, $3, $4, $5)
                "#,
                &[
                    &pull_request.id,
                    &pull_request.name,
                    &pull_request.author_id,
                    &PullRequestStatus::Open.as_str(),
                    &pull_request.need_more_reviewers,
                ],
            )
            .await;

        match inserted {
            Ok(_) => {}
            Err(err) if is_violation(&err, &SqlState::UNIQUE_VIOLATION) => {
                tracing::error!(pr_id = %pull_request.id, "Pull request id already taken");
                return Err(Error::PullRequestExists);
            }
            Err(err) if is_violation(&err, &SqlState::FOREIGN_KEY_VIOLATION) => {
                tracing::error!(
                    pr_id = %pull_request.id,
                    author_id = %pull_request.author_id,
                    "Pull request author does not exist"
                );
                return Err(Error::AuthorNotFound);
            }
            Err(err) => return Err(err.into()),
        }

        for reviewer in &pull_request.assigned_reviewers {
            tx.execute(
                "INSERT INTO pull_request_reviewers (pull_request_id, user_id) VALUES ($1, $2)",
                &[&pull_request.id, reviewer],
            )
            .await?;
        }

        tx.commit().await?;
        drop(client);

        self.get(&pull_request.id).await
    }

    async fn get(&self, pr_id: &str) -> Result<PullRequest> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {PULL_REQUEST_COLUMNS} FROM pull_requests p WHERE p.id = $1");
        let row = client
            .query_opt(&sql, &[&pr_id])
            .await?
            .ok_or(Error::PullRequestNotFound)?;
        row_to_pull_request(&row)
    }

    async fn set_merged(&self, pr_id: &str) -> Result<PullRequest> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE pull_requests
                SET status = 'MERGED', merged_at = COALESCE(merged_at, now())
                WHERE id = $1
                "#,
                &[&pr_id],
            )
            .await?;
        drop(client);

        if updated == 0 {
            return Err(Error::PullRequestNotFound);
        }
        self.get(pr_id).await
    }

    async fn list_assigned_reviewers(&self, pr_id: &str) -> Result<Vec<String>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT user_id FROM pull_request_reviewers WHERE pull_request_id = $1 ORDER BY id",
                &[&pr_id],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn replace_reviewer(
        &self,
        pr_id: &str,
        old_id: &str,
        new_id: Option<&str>,
    ) -> Result<()> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let removed = tx
            .execute(
                "DELETE FROM pull_request_reviewers WHERE pull_request_id = $1 AND user_id = $2",
                &[&pr_id, &old_id],
            )
            .await?;
        if removed == 0 {
            return Err(Error::ReviewerNotAssigned);
        }

        if let Some(new_id) = new_id {
            tx.execute(
                "INSERT INTO pull_request_reviewers (pull_request_id, user_id) VALUES ($1, $2)",
                &[&pr_id, &new_id],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_review_pull_requests(&self, user_id: &str) -> Result<Vec<PullRequestShort>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT p.id, p.name, p.author_id, p.status
                FROM pull_requests p
                JOIN pull_request_reviewers r ON r.pull_request_id = p.id
                WHERE r.user_id = $1
                ORDER BY p.created_at DESC, p.id
                "#,
                &[&user_id],
            )
            .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.get(3);
                Ok(PullRequestShort {
                    id: row.get(0),
                    name: row.get(1),
                    author_id: row.get(2),
                    status: parse_status(&status)?,
                })
            })
            .collect()
    }

    async fn list_open_by_reviewers(
        &self,
        reviewer_ids: &[String],
    ) -> Result<HashMap<String, Vec<PullRequest>>> {
        let mut grouped: HashMap<String, Vec<PullRequest>> = HashMap::new();
        if reviewer_ids.is_empty() {
            return Ok(grouped);
        }

        let client = self.pool.get().await?;
        let sql = format!(
            r#"
            SELECT {PULL_REQUEST_COLUMNS}, rv.user_id AS reviewer_id
            FROM pull_request_reviewers rv
            JOIN pull_requests p ON p.id = rv.pull_request_id
            WHERE rv.user_id = ANY($1) AND p.status = 'OPEN'
            ORDER BY p.created_at, rv.id
            "#
        );
        let rows = client.query(&sql, &[&reviewer_ids]).await?;

        for row in &rows {
            let reviewer_id: String = row.get(8);
            grouped
                .entry(reviewer_id)
                .or_default()
                .push(row_to_pull_request(row)?);
        }

        Ok(grouped)
    }

    async fn update_need_more_reviewers(&self, pr_id: &str, need_more: bool) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE pull_requests SET need_more_reviewers = $2 WHERE id = $1",
                &[&pr_id, &need_more],
            )
            .await?;
        Ok(())
    }
}

// ============================================================================
// Stats
// ============================================================================

#[async_trait]
impl StatsRepository for PostgresStore {
    async fn count_assignments_by_reviewer(&self) -> Result<HashMap<String, u64>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT user_id, COUNT(*) FROM pull_request_reviewers GROUP BY user_id",
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get::<_, String>(0), count(row.get(1))))
            .collect())
    }

    async fn count_open_pull_requests(&self) -> Result<u64> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT COUNT(*) FROM pull_requests WHERE status = 'OPEN'", &[])
            .await?;
        Ok(count(row.get(0)))
    }
}
