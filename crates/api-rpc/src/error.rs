//! RPC Error Types
//!
//! Maps application errors to stable JSON-RPC error codes.

use enrollment_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const ALREADY_ACTIVE: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const CONCURRENT_MODIFICATION: i32 = 5003;
}

/// Convert AppError to JSON-RPC ErrorObject
///
/// Validation messages are passed through verbatim so callers see the
/// rejection reason exactly as recorded.
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Validation(_) | AppError::Domain(_) | AppError::Serialization(_) => {
            code::VALIDATION_ERROR
        }
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Conflict(_) | AppError::InvalidState(_) => code::CONFLICT,
        AppError::AlreadyActive(_) => code::ALREADY_ACTIVE,
        AppError::ConcurrentModification(_) => code::CONCURRENT_MODIFICATION,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.reason(), None::<()>)
}
