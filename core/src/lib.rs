//! Agent availability status graph for multi-tenant contact channels.
//!
//! Statuses live per channel and form a (possibly cyclic) graph of manual
//! transitions plus timer-driven auto-transitions. A handful of flags act as
//! channel-wide singleton selectors; [`status_service::StatusService`] keeps
//! them unique by demoting the previous holder on every write, and
//! [`provisioning::TenantProvisioner`] seeds a whole tenant from templates.

pub mod context;
pub mod error;
pub mod graph;
pub mod memory;
pub mod models;
pub mod provisioning;
pub mod repository;
pub mod status_service;
pub mod templates;

pub use context::RequestContext;
pub use error::{RepoError, StatusError};
pub use provisioning::TenantProvisioner;
pub use repository::{Store, UnitOfWork};
pub use status_service::{NewStatus, StatusPatch, StatusService};
pub use templates::ProvisioningTemplates;
