use thiserror::Error;

/// Caller-side input problems. A generation request must not be issued while
/// one of these holds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("property address must not be empty")]
    EmptyAddress,
    #[error("at least one property image is required")]
    NoImages,
    #[error("floor area must be a positive number of square meters")]
    NonPositiveFloorArea,
    #[error("budget must be a positive amount")]
    NonPositiveBudget,
}

/// Failures reaching the generative service at all: credentials, network,
/// or a non-success HTTP status. Distinguishable from payload-level failures
/// so the caller can suggest the right remediation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("no API credential available")]
    MissingCredential,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("service request failed ({status}): {detail}")]
    Http { status: u16, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanGenerationError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("plan service returned an empty response")]
    EmptyResponse,
    #[error("plan payload did not match the declared schema: {detail}")]
    MalformedPayload { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetGenerationError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("image service produced no inline image")]
    NoImageProduced,
    #[error("inline image payload was unusable: {detail}")]
    BadImageData { detail: String },
}
