pub mod bastion;
pub mod compliance;
pub mod connectivity;
pub mod databricks;
pub mod iam;
pub mod kms;
pub mod monitoring;
pub mod privatelink;
pub mod security;
pub mod storage;
pub mod vpc;

use aws_sdk_ec2::types::SdkError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("The provider returned no identifier for {0}")]
    MissingIdentifier(String),

    #[error("Invalid policy reference: {0}")]
    InvalidPolicyReference(String),

    #[error("Missing credentials: {0} is not set")]
    MissingCredentials(String),

    #[error("Encryption cannot be enforced on {0}")]
    UnsupportedService(String),

    #[error(transparent)]
    OutputError(#[from] crate::outputs::Error),

    #[error("Unknown error ocurred: {0}.")]
    UnknownError(String),
}

// Every AWS service crate of this generation re-exports the same
// `SdkError`, so one mapping covers all wrappers.
pub(crate) fn sdk_error<E>(error: SdkError<E>) -> Error
where
    E: std::error::Error,
{
    match error {
        SdkError::ServiceError { err, .. } => Error::ServiceError(err.to_string()),
        other => Error::UnknownError(other.to_string()),
    }
}

pub(crate) fn require_id(id: Option<&str>, resource: &str) -> Result<String, Error> {
    return id
        .map(str::to_string)
        .ok_or_else(|| Error::MissingIdentifier(resource.to_string()));
}
