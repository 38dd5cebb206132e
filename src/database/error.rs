use potion::HtmlError;
use sqlx::error::ErrorKind;
use thiserror::Error;

use super::store::constraints;

#[derive(Debug, Clone, Error)]
#[error("{info}")]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::new("Row not found".to_owned()),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new("Pool timed out".to_owned()),
            sqlx::Error::PoolClosed => Self::new("Pool closed".to_owned()),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for potion::Error {
    fn from(value: QueryError) -> Self {
        potion::Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

/// Malformed input that could not be converted into a domain value.
#[derive(Debug, Clone, Error)]
#[error("({info})")]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_owned(),
        }
    }
}

impl From<TypeError> for potion::Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

/// Failures reported by a [`Store`](super::store::Store) adapter.
///
/// Constraint violations carry the name of the violated constraint so the
/// service layer can translate them into the matching [`ServiceError`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },
    #[error("referenced row missing ({constraint})")]
    MissingReference { constraint: String },
    #[error("check constraint {constraint} violated")]
    CheckViolation { constraint: String },
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl StoreError {
    pub fn unique(constraint: &str) -> Self {
        Self::UniqueViolation {
            constraint: constraint.to_owned(),
        }
    }

    pub fn missing(constraint: &str) -> Self {
        Self::MissingReference {
            constraint: constraint.to_owned(),
        }
    }

    pub fn check(constraint: &str) -> Self {
        Self::CheckViolation {
            constraint: constraint.to_owned(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(e) = &value {
            let constraint = e.constraint().unwrap_or_default();
            match e.kind() {
                ErrorKind::UniqueViolation => return Self::unique(constraint),
                ErrorKind::ForeignKeyViolation => return Self::missing(constraint),
                ErrorKind::CheckViolation => return Self::check(constraint),
                _ => {}
            }
        }

        log::error!("Storage failure: {value}");
        Self::Query(QueryError::from(value))
    }
}

/// Every failure a service operation can surface to its caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("you can't subscribe to yourself")]
    SelfReference,
    #[error("shopping list is empty")]
    EmptyBasket,
    #[error("{0}")]
    Validation(String),
    #[error("you don't have permission to perform this action")]
    Forbidden,
    #[error("storage failure: {0}")]
    Query(#[from] QueryError),
}

impl ServiceError {
    pub fn validation(info: impl Into<String>) -> Self {
        Self::Validation(info.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::AlreadyExists(_)
            | ServiceError::SelfReference
            | ServiceError::EmptyBasket
            | ServiceError::Validation(_) => 400,
            ServiceError::Forbidden => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Query(_) => 500,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation { constraint } => {
                Self::AlreadyExists(constraints::describe(&constraint).to_owned())
            }
            StoreError::MissingReference { constraint } => {
                Self::NotFound(constraints::describe(&constraint).to_owned())
            }
            StoreError::CheckViolation { constraint } => {
                if constraint == constraints::FOLLOWS_NO_SELF {
                    Self::SelfReference
                } else {
                    Self::Validation(format!(
                        "Invalid {}",
                        constraints::describe(&constraint)
                    ))
                }
            }
            StoreError::Query(e) => Self::Query(e),
        }
    }
}

impl From<TypeError> for ServiceError {
    fn from(value: TypeError) -> Self {
        Self::Validation(value.info)
    }
}

impl From<ServiceError> for potion::Error {
    fn from(value: ServiceError) -> Self {
        potion::Error {
            code: value.status_code().into(),
            info: Some(value.to_string()),
            redirect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ServiceError::AlreadyExists("favorite".to_owned()), 400)]
    #[case(ServiceError::NotFound("recipe".to_owned()), 404)]
    #[case(ServiceError::SelfReference, 400)]
    #[case(ServiceError::EmptyBasket, 400)]
    #[case(ServiceError::validation("bad amount"), 400)]
    #[case(ServiceError::Forbidden, 403)]
    #[case(ServiceError::Query(QueryError::new("boom".to_owned())), 500)]
    fn maps_errors_to_status_codes(#[case] error: ServiceError, #[case] code: u16) {
        assert_eq!(error.status_code(), code);
    }

    #[test]
    fn storage_violations_become_typed_errors() {
        let err = ServiceError::from(StoreError::unique(constraints::FAVORITES_UNIQUE));
        assert!(matches!(err, ServiceError::AlreadyExists(ref what) if what == "favorite"));

        let err = ServiceError::from(StoreError::check(constraints::FOLLOWS_NO_SELF));
        assert!(matches!(err, ServiceError::SelfReference));

        let err = ServiceError::from(StoreError::missing(constraints::COMPONENTS_PRODUCT_FKEY));
        assert!(matches!(err, ServiceError::NotFound(ref what) if what == "product"));

        let err = ServiceError::from(StoreError::check(constraints::COMPONENTS_AMOUNT_POSITIVE));
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
