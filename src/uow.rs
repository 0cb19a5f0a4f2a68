use sea_orm::{DatabaseTransaction, DbErr, SqlErr, TransactionTrait};

use crate::{
    db::OrmConn,
    error::{AppError, AppResult},
};

/// One transactional scope. Commit on success; dropping without commit rolls
/// back (SeaORM's transaction drop behavior), so early `?` returns are safe.
pub struct UnitOfWork {
    txn: DatabaseTransaction,
}

impl UnitOfWork {
    pub async fn begin(orm: &OrmConn) -> AppResult<Self> {
        let txn = orm.begin().await.map_err(map_db_err)?;
        Ok(Self { txn })
    }

    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> AppResult<()> {
        self.txn.commit().await.map_err(map_db_err)
    }
}

/// Translate driver errors into domain errors before they cross into the
/// service layer. Anything unmapped is logged and surfaced as a generic
/// internal error.
pub fn map_db_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::AlreadyExists,
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::RelatedResourceNotFound,
        _ => match err {
            DbErr::RecordNotFound(_) => AppError::NotFound,
            other => {
                tracing::warn!(error = %other, "unmapped database error class");
                AppError::OrmError(other)
            }
        },
    }
}

/// Delete-path variant: a foreign-key violation here means the row is still
/// referenced by something else.
pub fn map_delete_err(err: DbErr) -> AppError {
    if matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) {
        return AppError::StillReferenced;
    }
    map_db_err(err)
}
