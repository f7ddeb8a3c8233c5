use crate::backend::BackendFailure;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of errors surfaced to callers of the adapter.
///
/// Every backend failure is normalized onto exactly one of these kinds
/// before it crosses the adapter boundary; no backend-specific error
/// value ever reaches a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    NotFound(PathBuf),
    AlreadyExists(PathBuf),
    IsADirectory(PathBuf),
    NotADirectory(PathBuf),
    DirectoryNotEmpty(PathBuf),
    NotSupported(PathBuf, &'static str),
    Io(PathBuf, String),
}

impl Error {
    pub fn not_found<P: AsRef<Path>>(path: P) -> Self {
        Error::NotFound(path.as_ref().to_path_buf())
    }

    pub fn already_exists<P: AsRef<Path>>(path: P) -> Self {
        Error::AlreadyExists(path.as_ref().to_path_buf())
    }

    pub fn is_a_directory<P: AsRef<Path>>(path: P) -> Self {
        Error::IsADirectory(path.as_ref().to_path_buf())
    }

    pub fn not_a_directory<P: AsRef<Path>>(path: P) -> Self {
        Error::NotADirectory(path.as_ref().to_path_buf())
    }

    pub fn directory_not_empty<P: AsRef<Path>>(path: P) -> Self {
        Error::DirectoryNotEmpty(path.as_ref().to_path_buf())
    }

    pub fn not_supported<P: AsRef<Path>>(path: P, operation: &'static str) -> Self {
        Error::NotSupported(path.as_ref().to_path_buf(), operation)
    }

    pub fn io<P: AsRef<Path>, S: Into<String>>(path: P, message: S) -> Self {
        Error::Io(path.as_ref().to_path_buf(), message.into())
    }

    /// Normalize a backend failure onto the taxonomy, attaching `at` as the
    /// path when the backend did not report one.
    ///
    /// Unknown codes, malformed shapes, and payload-free failures all
    /// normalize to [`Error::Io`]. The default is fail-closed: a new backend
    /// error code never leaks its own vocabulary past this function.
    pub fn from_backend<P: AsRef<Path>>(failure: BackendFailure, at: P) -> Self {
        let at = at.as_ref();
        match failure {
            BackendFailure::Code(code) => classify(&code, at.to_path_buf()),
            BackendFailure::Coded { code, path } => {
                let path = path.unwrap_or_else(|| at.to_path_buf());
                classify(&code, path)
            }
            // An RPC fault is translated by whatever it wraps.
            BackendFailure::Rpc(inner) => Error::from_backend(*inner, at),
            BackendFailure::Absent => {
                Error::Io(at.to_path_buf(), "backend failed with no payload".to_string())
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Error::NotFound(p)
            | Error::AlreadyExists(p)
            | Error::IsADirectory(p)
            | Error::NotADirectory(p)
            | Error::DirectoryNotEmpty(p)
            | Error::NotSupported(p, _)
            | Error::Io(p, _) => p,
        }
    }
}

/// Map a backend error code onto the taxonomy.
///
/// The backends this adapter fronts do not share an error vocabulary, so a
/// few synonyms are accepted per kind. Anything unrecognized is an Io error.
fn classify(code: &str, path: PathBuf) -> Error {
    match code.to_ascii_uppercase().as_str() {
        "ENOENT" | "NOT_FOUND" | "NO_SUCH_FILE" => Error::NotFound(path),
        "EEXIST" | "ALREADY_EXISTS" | "FILE_EXISTS" => Error::AlreadyExists(path),
        "EISDIR" | "IS_DIRECTORY" => Error::IsADirectory(path),
        "ENOTDIR" | "NOT_A_DIRECTORY" => Error::NotADirectory(path),
        "ENOTEMPTY" | "DIRECTORY_NOT_EMPTY" => Error::DirectoryNotEmpty(path),
        "ENOSYS" | "ENOTSUP" | "NOT_SUPPORTED" => Error::NotSupported(path, "backend"),
        other => Error::Io(path, format!("backend error: {}", other)),
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NotFound(path) => write!(f, "Path not found: {}", path.display()),
            Error::AlreadyExists(path) => write!(f, "Entry already exists: {}", path.display()),
            Error::IsADirectory(path) => write!(f, "Is a directory: {}", path.display()),
            Error::NotADirectory(path) => write!(f, "Not a directory: {}", path.display()),
            Error::DirectoryNotEmpty(path) => {
                write!(f, "Directory not empty: {}", path.display())
            }
            Error::NotSupported(path, operation) => {
                write!(f, "Operation {} not supported: {}", operation, path.display())
            }
            Error::Io(path, message) => {
                write!(f, "I/O error: {}: {}", message, path.display())
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        let err = Error::from_backend(BackendFailure::Code("ENOENT".to_string()), "/a");
        assert_eq!(err, Error::not_found("/a"));
    }

    #[test]
    fn test_coded_shape_keeps_backend_path() {
        let failure = BackendFailure::Coded {
            code: "EEXIST".to_string(),
            path: Some(PathBuf::from("/backend/reported")),
        };
        let err = Error::from_backend(failure, "/caller");
        assert_eq!(err, Error::already_exists("/backend/reported"));
    }

    #[test]
    fn test_coded_shape_without_path_uses_operation_path() {
        let failure = BackendFailure::Coded {
            code: "ENOTDIR".to_string(),
            path: None,
        };
        let err = Error::from_backend(failure, "/caller");
        assert_eq!(err, Error::not_a_directory("/caller"));
    }

    #[test]
    fn test_rpc_fault_unwraps() {
        let failure = BackendFailure::Rpc(Box::new(BackendFailure::Coded {
            code: "ENOTEMPTY".to_string(),
            path: Some(PathBuf::from("/dir")),
        }));
        let err = Error::from_backend(failure, "/dir");
        assert_eq!(err, Error::directory_not_empty("/dir"));
    }

    #[test]
    fn test_unknown_code_fails_closed() {
        let err = Error::from_backend(BackendFailure::Code("EQUOTA".to_string()), "/a");
        assert!(matches!(err, Error::Io(_, _)));
        assert_eq!(err.path(), Path::new("/a"));
    }

    #[test]
    fn test_absent_payload_fails_closed() {
        let err = Error::from_backend(BackendFailure::Absent, "/a");
        assert!(matches!(err, Error::Io(_, _)));
    }

    #[test]
    fn test_code_case_insensitive() {
        let err = Error::from_backend(BackendFailure::Code("enoent".to_string()), "/a");
        assert_eq!(err, Error::not_found("/a"));
    }

    #[test]
    fn test_synonym_codes() {
        let err = Error::from_backend(BackendFailure::Code("NOT_FOUND".to_string()), "/a");
        assert_eq!(err, Error::not_found("/a"));
        let err = Error::from_backend(BackendFailure::Code("ENOTSUP".to_string()), "/a");
        assert!(matches!(err, Error::NotSupported(_, _)));
    }
}
