//! Remote failure taxonomy, backend code tables, and user-facing alert copy.

/// Closed classification of a failed remote operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("no internet connection")]
    NoInternet,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("rate limited")]
    RateLimited,
    #[error("server error")]
    ServerError,
    /// Blocked by a row-level security or bucket policy.
    #[error("blocked by security policy")]
    PolicyViolation,
    #[error("payload too large")]
    TooLarge,
    /// Only produced by image uploads.
    #[error("unsupported file type")]
    UnsupportedType,
    /// Anything the tables don't recognise; carries the backend message verbatim.
    #[error("{0}")]
    Unknown(String),
}

/// Which backend a failure came from; selects the code table and alert copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Product table (record creation and reads).
    Database,
    /// Image bucket.
    Storage,
}

/// A failure as reported by a backend, before classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteFailure {
    /// Structured error code, when the backend sent one.
    pub code: Option<String>,
    /// Human-readable message from the backend or transport.
    pub message: String,
    /// Transport could not reach the host at all.
    pub not_connected: bool,
}

impl RemoteFailure {
    /// Failure carrying a backend code and message.
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            not_connected: false,
        }
    }

    /// Transport-level "not connected" failure.
    pub fn offline(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            not_connected: true,
        }
    }

    /// Failure with only a message (unparseable body, unexpected transport error).
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            not_connected: false,
        }
    }
}

/// Database (PostgREST) error codes.
const DATABASE_CODES: &[(&str, ErrorKind)] = &[
    ("permission_denied", ErrorKind::Forbidden),
    ("access_denied", ErrorKind::Forbidden),
    ("invalid_jwt", ErrorKind::Unauthorized),
    ("jwt_expired", ErrorKind::Unauthorized),
    ("invalid_token", ErrorKind::Unauthorized),
    ("unauthorized", ErrorKind::Unauthorized),
    ("anonymous_provider_disabled", ErrorKind::Unauthorized),
    ("row_level_security_violation", ErrorKind::PolicyViolation),
    ("not_found", ErrorKind::NotFound),
    ("duplicate", ErrorKind::AlreadyExists),
    ("already_exists", ErrorKind::AlreadyExists),
    // PostgreSQL unique_violation
    ("23505", ErrorKind::AlreadyExists),
    ("rate_limit_exceeded", ErrorKind::RateLimited),
    ("too_many_requests", ErrorKind::RateLimited),
    ("slowdown", ErrorKind::RateLimited),
    ("server_error", ErrorKind::ServerError),
    ("internal_error", ErrorKind::ServerError),
];

/// Object storage error names.
const STORAGE_CODES: &[(&str, ErrorKind)] = &[
    ("NoSuchKey", ErrorKind::NotFound),
    ("AccessDenied", ErrorKind::PolicyViolation),
    ("EntityTooLarge", ErrorKind::TooLarge),
    ("Payload too large", ErrorKind::TooLarge),
    ("InvalidMimeType", ErrorKind::UnsupportedType),
    ("KeyAlreadyExists", ErrorKind::AlreadyExists),
    ("ResourceAlreadyExists", ErrorKind::AlreadyExists),
    ("Duplicate", ErrorKind::AlreadyExists),
    ("SlowDown", ErrorKind::RateLimited),
    ("DatabaseError", ErrorKind::ServerError),
    ("InternalError", ErrorKind::ServerError),
];

/// Classify a database failure. Never fails.
pub fn map_database_error(raw: &RemoteFailure) -> ErrorKind {
    classify(DATABASE_CODES, raw)
}

/// Classify a storage failure. Never fails.
pub fn map_storage_error(raw: &RemoteFailure) -> ErrorKind {
    classify(STORAGE_CODES, raw)
}

/// Classify with the table matching `backend`.
pub fn map_error(backend: Backend, raw: &RemoteFailure) -> ErrorKind {
    match backend {
        Backend::Database => map_database_error(raw),
        Backend::Storage => map_storage_error(raw),
    }
}

fn classify(table: &[(&str, ErrorKind)], raw: &RemoteFailure) -> ErrorKind {
    // Connectivity wins over whatever code came along with it.
    if raw.not_connected {
        return ErrorKind::NoInternet;
    }
    let known = raw
        .code
        .as_deref()
        .and_then(|code| table.iter().find(|(c, _)| *c == code))
        .map(|(_, kind)| kind.clone());
    known.unwrap_or_else(|| ErrorKind::Unknown(unknown_message(raw)))
}

fn unknown_message(raw: &RemoteFailure) -> String {
    match (&raw.code, raw.message.is_empty()) {
        (Some(code), true) => code.clone(),
        _ => raw.message.clone(),
    }
}

/// Recovery affordance offered alongside an alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertAction {
    /// Open the scanner to capture a barcode.
    ScanNow,
    /// Re-authenticate.
    SignIn,
    /// Offer to submit again.
    TryAgain,
    /// Plain acknowledgement.
    Dismiss,
}

/// User-facing failure description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: Option<String>,
    pub action: AlertAction,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: Option<&str>, action: AlertAction) -> Self {
        Self {
            title: title.into(),
            message: message.map(String::from),
            action,
        }
    }

    /// Shown when submit is pressed before a barcode was scanned.
    pub fn missing_barcode() -> Self {
        Self::new("Barcode Can't Be Empty", None, AlertAction::ScanNow)
    }

    /// Shown when the record was created but no image is selected.
    pub fn no_image_selected() -> Self {
        Self::new("No Image Selected!", None, AlertAction::Dismiss)
    }
}

impl ErrorKind {
    /// Recovery affordance for this kind.
    ///
    /// AlreadyExists is informational and only dismissed.
    pub fn action(&self) -> AlertAction {
        match self {
            ErrorKind::Unauthorized => AlertAction::SignIn,
            ErrorKind::NoInternet | ErrorKind::RateLimited | ErrorKind::ServerError => {
                AlertAction::TryAgain
            }
            _ => AlertAction::Dismiss,
        }
    }

    /// Alert copy for a failure from `backend`.
    pub fn alert(&self, backend: Backend) -> Alert {
        let action = self.action();
        let (title, message): (&str, Option<&str>) = match backend {
            Backend::Database => match self {
                ErrorKind::NoInternet => ("No Internet Connection!", None),
                ErrorKind::Unauthorized => ("Unauthorized Access. Please sign in again.", None),
                ErrorKind::Forbidden => ("You don't have permission to perform this action.", None),
                ErrorKind::PolicyViolation => (
                    "Access blocked by security rules. Contact support if this is unexpected.",
                    None,
                ),
                ErrorKind::AlreadyExists => ("Product already exists!", None),
                ErrorKind::NotFound => ("Product not found in database.", None),
                ErrorKind::RateLimited => {
                    ("Too many requests! Please slow down and try again later.", None)
                }
                ErrorKind::ServerError => {
                    ("A server error occurred. Please try again in a moment.", None)
                }
                ErrorKind::TooLarge => ("The request is too large!", None),
                ErrorKind::UnsupportedType => ("Unsupported request!", None),
                ErrorKind::Unknown(text) => return Alert::new(text.as_str(), None, action),
            },
            Backend::Storage => match self {
                ErrorKind::NoInternet => {
                    ("No Internet Connection!", Some("Please check your connection"))
                }
                ErrorKind::Unauthorized => ("Unauthorized Access", Some("Please sign in again")),
                ErrorKind::Forbidden => ("You Don't Have Permission", None),
                ErrorKind::PolicyViolation => (
                    "Access blocked by security rules!",
                    Some("Contact Support if this is unexpected"),
                ),
                ErrorKind::AlreadyExists => ("File already exists!", None),
                ErrorKind::NotFound => ("File not found in storage.", None),
                ErrorKind::TooLarge => (
                    "The file is too large to upload!",
                    Some("Please choose a smaller file"),
                ),
                ErrorKind::UnsupportedType => (
                    "Unsupported file type!",
                    Some("Please upload a valid WEBP image"),
                ),
                ErrorKind::RateLimited => (
                    "Too many requests!",
                    Some("Please slow down and try again later"),
                ),
                ErrorKind::ServerError => (
                    "A server error occurred!",
                    Some("Please try again in a moment"),
                ),
                ErrorKind::Unknown(text) => return Alert::new(text.as_str(), None, action),
            },
        };
        Alert::new(title, message, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(code: &str) -> ErrorKind {
        map_database_error(&RemoteFailure::coded(code, code))
    }

    fn storage(code: &str) -> ErrorKind {
        map_storage_error(&RemoteFailure::coded(code, code))
    }

    #[test]
    fn test_database_table() {
        // Every database code lands on its documented kind.
        assert_eq!(db("permission_denied"), ErrorKind::Forbidden);
        assert_eq!(db("access_denied"), ErrorKind::Forbidden);
        assert_eq!(db("jwt_expired"), ErrorKind::Unauthorized);
        assert_eq!(db("anonymous_provider_disabled"), ErrorKind::Unauthorized);
        assert_eq!(db("row_level_security_violation"), ErrorKind::PolicyViolation);
        assert_eq!(db("not_found"), ErrorKind::NotFound);
        assert_eq!(db("23505"), ErrorKind::AlreadyExists);
        assert_eq!(db("duplicate"), ErrorKind::AlreadyExists);
        assert_eq!(db("slowdown"), ErrorKind::RateLimited);
        assert_eq!(db("internal_error"), ErrorKind::ServerError);
    }

    #[test]
    fn test_storage_table() {
        // Every storage code lands on its documented kind.
        assert_eq!(storage("NoSuchKey"), ErrorKind::NotFound);
        assert_eq!(storage("AccessDenied"), ErrorKind::PolicyViolation);
        assert_eq!(storage("EntityTooLarge"), ErrorKind::TooLarge);
        assert_eq!(storage("Payload too large"), ErrorKind::TooLarge);
        assert_eq!(storage("InvalidMimeType"), ErrorKind::UnsupportedType);
        assert_eq!(storage("ResourceAlreadyExists"), ErrorKind::AlreadyExists);
        assert_eq!(storage("SlowDown"), ErrorKind::RateLimited);
        assert_eq!(storage("DatabaseError"), ErrorKind::ServerError);
    }

    #[test]
    fn test_tables_are_backend_specific() {
        // Codes from one backend are unknown to the other.
        assert_eq!(
            storage("row_level_security_violation"),
            ErrorKind::Unknown("row_level_security_violation".into())
        );
        assert_eq!(db("EntityTooLarge"), ErrorKind::Unknown("EntityTooLarge".into()));
    }

    #[test]
    fn test_unknown_carries_message_verbatim() {
        // Unrecognised codes keep the backend message untouched.
        let raw = RemoteFailure::coded("XX000", "Something odd: happened");
        assert_eq!(
            map_database_error(&raw),
            ErrorKind::Unknown("Something odd: happened".into())
        );
        assert_eq!(
            db("anything_unrecognized"),
            ErrorKind::Unknown("anything_unrecognized".into())
        );
        // Code-less failures are unknown too.
        let raw = RemoteFailure::message("HTTP status 502");
        assert_eq!(map_storage_error(&raw), ErrorKind::Unknown("HTTP status 502".into()));
    }

    #[test]
    fn test_not_connected_takes_precedence() {
        // A transport disconnect wins over any code.
        let mut raw = RemoteFailure::coded("23505", "duplicate key");
        raw.not_connected = true;
        assert_eq!(map_database_error(&raw), ErrorKind::NoInternet);
        assert_eq!(
            map_error(Backend::Storage, &RemoteFailure::offline("offline")),
            ErrorKind::NoInternet
        );
    }

    #[test]
    fn test_alert_copy_per_backend() {
        // The same kind reads differently for records and images.
        let a = ErrorKind::AlreadyExists.alert(Backend::Database);
        assert_eq!(a.title, "Product already exists!");
        assert_eq!(a.action, AlertAction::Dismiss);

        let a = ErrorKind::AlreadyExists.alert(Backend::Storage);
        assert_eq!(a.title, "File already exists!");

        let a = ErrorKind::TooLarge.alert(Backend::Storage);
        assert_eq!(a.message.as_deref(), Some("Please choose a smaller file"));

        let a = ErrorKind::Unknown("boom".into()).alert(Backend::Database);
        assert_eq!(a.title, "boom");
        assert_eq!(a.message, None);
    }

    #[test]
    fn test_alert_actions() {
        // Recovery affordances follow the kind.
        assert_eq!(ErrorKind::Unauthorized.action(), AlertAction::SignIn);
        assert_eq!(ErrorKind::ServerError.action(), AlertAction::TryAgain);
        assert_eq!(ErrorKind::NoInternet.action(), AlertAction::TryAgain);
        assert_eq!(ErrorKind::Forbidden.action(), AlertAction::Dismiss);
        assert_eq!(Alert::missing_barcode().action, AlertAction::ScanNow);
    }
}
