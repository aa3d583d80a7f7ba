use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Machine-readable error codes shared by every caller of the core.
pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const INVARIANT_VIOLATION: &str = "invariant_violation";
    pub const PERSIST_FAILURE: &str = "persist_failure";
    pub const PROVISIONING_FAILURE: &str = "provisioning_failure";
}

/// Failure reported by a repository implementation.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A natural-key uniqueness constraint rejected the write.
    #[error("unique key conflict on {0}")]
    Conflict(String),
    /// An update or delete addressed a row that does not exist for the tenant.
    #[error("{table} row {id} does not exist")]
    RowMissing { table: &'static str, id: uuid::Uuid },
    /// Driver or connection level failure.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl RepoError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

/// The repository operation that failed, used to annotate [`StatusError::PersistFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Beginning,
    Committing,
    Persisting,
    Updating,
    Deleting,
    Querying,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Beginning => "beginning",
            Operation::Committing => "committing",
            Operation::Persisting => "persisting",
            Operation::Updating => "updating",
            Operation::Deleting => "deleting",
            Operation::Querying => "querying",
        };
        f.write_str(verb)
    }
}

/// Provisioning pipeline stage in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStage {
    Tenant,
    GlobalStatuses,
    ActivityStatuses,
    Channels,
    ChannelStatuses,
    Signals,
    Ponders,
}

impl fmt::Display for SeedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            SeedStage::Tenant => "tenant",
            SeedStage::GlobalStatuses => "global statuses",
            SeedStage::ActivityStatuses => "activity statuses",
            SeedStage::Channels => "channels",
            SeedStage::ChannelStatuses => "channel statuses",
            SeedStage::Signals => "signals",
            SeedStage::Ponders => "ponders",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    /// A referenced status, channel or tenant does not exist.
    #[error("{model} not found ({field} = {id})")]
    NotFound {
        model: &'static str,
        field: &'static str,
        id: String,
    },
    /// The write would break a graph invariant (system rename, unknown target).
    #[error("invariant violated on `{field}`: {message}")]
    InvariantViolation { field: &'static str, message: String },
    /// The underlying store rejected a read or write.
    #[error("failed {operation} {model}: {source}")]
    PersistFailure {
        operation: Operation,
        model: &'static str,
        #[source]
        source: RepoError,
    },
    /// Any of the above, raised while seeding a tenant.
    #[error("provisioning failed while seeding {stage} ({entity}): {source}")]
    ProvisioningFailure {
        stage: SeedStage,
        entity: String,
        #[source]
        source: Box<StatusError>,
    },
}

impl StatusError {
    pub fn not_found(model: &'static str, field: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            model,
            field,
            id: id.to_string(),
        }
    }

    pub fn invariant(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            field,
            message: message.into(),
        }
    }

    /// Adapter for `map_err`: wraps a repository error with operation and model.
    pub fn store(operation: Operation, model: &'static str) -> impl FnOnce(RepoError) -> Self {
        move |source| Self::PersistFailure {
            operation,
            model,
            source,
        }
    }

    pub fn querying(model: &'static str) -> impl FnOnce(RepoError) -> Self {
        Self::store(Operation::Querying, model)
    }

    pub fn persisting(model: &'static str) -> impl FnOnce(RepoError) -> Self {
        Self::store(Operation::Persisting, model)
    }

    pub fn updating(model: &'static str) -> impl FnOnce(RepoError) -> Self {
        Self::store(Operation::Updating, model)
    }

    pub fn deleting(model: &'static str) -> impl FnOnce(RepoError) -> Self {
        Self::store(Operation::Deleting, model)
    }

    /// Annotates the error with the seeding stage it surfaced in. The innermost
    /// stage wins when the error is already a provisioning failure.
    pub fn in_stage(self, stage: SeedStage, entity: impl Into<String>) -> Self {
        match self {
            already @ Self::ProvisioningFailure { .. } => already,
            other => Self::ProvisioningFailure {
                stage,
                entity: entity.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::InvariantViolation { .. } => codes::INVARIANT_VIOLATION,
            Self::PersistFailure { .. } => codes::PERSIST_FAILURE,
            Self::ProvisioningFailure { .. } => codes::PROVISIONING_FAILURE,
        }
    }

    /// The offending field or model, for the outer layer's error payload.
    pub fn field(&self) -> Option<String> {
        match self {
            Self::NotFound { field, .. } => Some((*field).to_string()),
            Self::InvariantViolation { field, .. } => Some((*field).to_string()),
            Self::PersistFailure { model, .. } => Some((*model).to_string()),
            Self::ProvisioningFailure { entity, .. } => Some(entity.clone()),
        }
    }

    /// The error underneath any provisioning annotation.
    pub fn root(&self) -> &StatusError {
        match self {
            Self::ProvisioningFailure { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Structured error payload handed to transports and the CLI.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    /// Code of the underlying failure when `error` is a provisioning failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub message: String,
    /// Which field or entity caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<SeedStage>,
    pub correlation_id: String,
}

impl ErrorReport {
    pub fn new(err: &StatusError, correlation_id: &str) -> Self {
        let (cause, stage) = match err {
            StatusError::ProvisioningFailure { stage, .. } => {
                (Some(err.root().code().to_string()), Some(*stage))
            }
            _ => (None, None),
        };
        Self {
            error: err.code().to_string(),
            cause,
            message: err.to_string(),
            field: err.field(),
            stage,
            correlation_id: correlation_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_stage_keeps_innermost_stage() {
        let err = StatusError::not_found("status", "name", "Available")
            .in_stage(SeedStage::Signals, "rejected")
            .in_stage(SeedStage::Channels, "voice");

        match &err {
            StatusError::ProvisioningFailure { stage, entity, .. } => {
                assert_eq!(*stage, SeedStage::Signals);
                assert_eq!(entity, "rejected");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.root().code(), codes::NOT_FOUND);
    }

    #[test]
    fn report_carries_cause_for_provisioning_failures() {
        let err = StatusError::invariant("name", "can not rename system status")
            .in_stage(SeedStage::ChannelStatuses, "Available");
        let report = ErrorReport::new(&err, "corr-1");

        assert_eq!(report.error, codes::PROVISIONING_FAILURE);
        assert_eq!(report.cause.as_deref(), Some(codes::INVARIANT_VIOLATION));
        assert_eq!(report.stage, Some(SeedStage::ChannelStatuses));
        assert_eq!(report.field.as_deref(), Some("Available"));
        assert_eq!(report.correlation_id, "corr-1");
    }

    #[test]
    fn persist_failure_message_names_operation_and_model() {
        let err = StatusError::updating("status")(RepoError::Conflict("statuses_name".into()));
        assert_eq!(err.code(), codes::PERSIST_FAILURE);
        assert_eq!(
            err.to_string(),
            "failed updating status: unique key conflict on statuses_name"
        );
    }
}
