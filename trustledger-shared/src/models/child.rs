/// Child model and database operations
///
/// Children are recorded under a member for the family register. Unlike
/// members they can be physically deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE gender AS ENUM ('Male', 'Female');
///
/// CREATE TABLE children (
///     id BIGSERIAL PRIMARY KEY,
///     member_id BIGINT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
///     name VARCHAR(200) NOT NULL,
///     date_of_birth DATE NOT NULL,
///     gender gender NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender")]
pub enum Gender {
    Male,
    Female,
}

/// Child of a member
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Child {
    pub id: i64,
    pub member_id: i64,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for adding a child
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChild {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
}

/// Partial child update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChild {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl UpdateChild {
    pub fn apply(self, child: &mut Child) {
        if let Some(name) = self.name {
            child.name = name;
        }
        if let Some(date_of_birth) = self.date_of_birth {
            child.date_of_birth = date_of_birth;
        }
        if let Some(gender) = self.gender {
            child.gender = gender;
        }
    }
}

const CHILD_COLUMNS: &str = "id, member_id, name, date_of_birth, gender, created_at, updated_at";

impl Child {
    pub async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        member_id: i64,
        data: &NewChild,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!(
            "INSERT INTO children (member_id, name, date_of_birth, gender) VALUES ($1, $2, $3, $4) RETURNING {}",
            CHILD_COLUMNS
        ))
        .bind(member_id)
        .bind(&data.name)
        .bind(data.date_of_birth)
        .bind(data.gender)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!("SELECT {} FROM children WHERE id = $1", CHILD_COLUMNS))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists children ordered by date of birth, optionally for one member
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        member_id: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!(
            "SELECT {} FROM children WHERE ($1::bigint IS NULL OR member_id = $1) ORDER BY date_of_birth, id",
            CHILD_COLUMNS
        ))
        .bind(member_id)
        .fetch_all(executor)
        .await
    }

    pub async fn save<'e, E: PgExecutor<'e>>(executor: E, child: &Child) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Child>(&format!(
            r#"
            UPDATE children
            SET name = $2, date_of_birth = $3, gender = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CHILD_COLUMNS
        ))
        .bind(child.id)
        .bind(&child.name)
        .bind(child.date_of_birth)
        .bind(child.gender)
        .fetch_optional(executor)
        .await
    }

    /// Deletes a child, returning true if it existed
    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM children WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
