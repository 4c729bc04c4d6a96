use serde_json::Value;
use uuid::Uuid;

use crate::application::repos::RepoError;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db)
            if db.message().contains("violates foreign key constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}

/// Decode a stored member index (a jsonb array of uuid strings).
pub(crate) fn decode_member_ids(schema_id: Uuid, value: Value) -> Result<Vec<Uuid>, RepoError> {
    serde_json::from_value(value).map_err(|err| {
        RepoError::corrupt(format!("member index of schema {schema_id} is malformed: {err}"))
    })
}
