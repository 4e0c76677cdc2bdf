use crate::{Error, error::StorageError};

/// Extension trait for Result types to simplify storage error mapping
///
/// Storage backends use this to turn driver errors into [`StorageError::Database`]
/// without repeating the `map_err` closure at every call site.
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse_core::error::utilities::StorageResultExt;
///
/// query.execute(&pool).await.map_storage_err()?;
/// ```
pub trait StorageResultExt<T> {
    /// Convert a backend error to a storage error
    fn map_storage_err(self) -> Result<T, Error>;

    /// Convert a backend error to a storage error, prefixed with context
    fn map_storage_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> StorageResultExt<T> for Result<T, E> {
    fn map_storage_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(e.to_string())))
    }

    fn map_storage_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(format!("{context}: {e}"))))
    }
}

/// Convert a `serde_json` failure on a stored value into [`StorageError::Corrupt`].
pub(crate) fn corrupt(name: &str, err: serde_json::Error) -> Error {
    Error::Storage(StorageError::Corrupt {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

/// Macro to convert any error to a storage database error
///
/// # Example
///
/// ```rust,ignore
/// use gatehouse_core::map_storage_err;
///
/// map_storage_err!(query.execute(&pool).await)?;
/// ```
#[macro_export]
macro_rules! map_storage_err {
    ($result:expr) => {
        $result.map_err(|e| {
            $crate::Error::Storage($crate::error::StorageError::Database(e.to_string()))
        })
    };
    ($result:expr, $context:expr) => {
        $result.map_err(|e| {
            $crate::Error::Storage($crate::error::StorageError::Database(format!(
                "{}: {}",
                $context, e
            )))
        })
    };
}
