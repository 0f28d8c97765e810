// sqlx::Error -> AppError
//
// Orphan rules prevent `impl From<sqlx::Error> for AppError` here, so every
// query maps through this helper.

use enrollment_core::error::AppError;

/// Convert sqlx::Error to AppError with structured information
///
/// Constraint violations become `Conflict` (terminal); lock and pool errors
/// become `Database` (transient, retried by workers).
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            match db_err.code().as_deref() {
                // SQLite error codes: https://www.sqlite.org/rescode.html
                Some(code @ ("2067" | "1555")) => {
                    AppError::Conflict(format!("Unique constraint violation: {} ({})", message, code))
                }
                Some(code @ ("787" | "3850")) => AppError::Conflict(format!(
                    "Foreign key constraint violation: {} ({})",
                    message, code
                )),
                Some(code @ ("275" | "1811")) => {
                    AppError::Conflict(format!("Check constraint violation: {} ({})", message, code))
                }
                Some("5") | Some("517") => {
                    AppError::Database(format!("Database locked (SQLITE_BUSY): {}", message))
                }
                Some("6") => AppError::Database(format!("Table locked: {}", message)),
                Some("13") => AppError::Database(format!("Database full: {}", message)),
                Some(code) => AppError::Database(format!("Database error [{}]: {}", code, message)),
                None => AppError::Database(format!("Database error: {}", message)),
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        sqlx::Error::ColumnDecode { index, source } => {
            AppError::Internal(format!("Cannot decode column {}: {}", index, source))
        }
        // Connection, pool timeout, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

/// Unique constraint violations, used to translate dedupe races
pub(crate) fn is_unique_violation(err: &AppError) -> bool {
    matches!(err, AppError::Conflict(msg) if msg.starts_with("Unique constraint violation"))
}

/// JSON column -> value
pub(crate) fn from_json<T: serde::de::DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>, AppError> {
    raw.map(serde_json::from_str).transpose().map_err(AppError::from)
}
