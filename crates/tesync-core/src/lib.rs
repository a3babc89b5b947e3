//! tesync core library
//!
//! Synchronizes ThousandEyes test definitions into Terraform configuration:
//! parsing and writing the managed HCL subset, reconciling desired state
//! into an existing document, and generating `import` blocks for bootstrap.

pub mod config;
pub mod desired;
pub mod document;
pub mod domain;
pub mod error;
pub mod identifier;
pub mod import;
pub mod lookup;
pub mod obs;
pub mod reconcile;
pub mod store;
pub mod telemetry;

pub use config::SyncConfig;

pub use desired::{
    AccountImport, DesiredState, DesiredStateBuilder, ImportBinding, ImportPlan, SkippedRecord,
};

pub use document::{
    parse_document, render_document, AttrValue, Attributes, ConfigDocument, ManagedProvider,
    ManagedResource, ResourceKey,
};

pub use domain::{AccountGroup, Agent, AgentsLabel, RemoteTest, TestDefinition, TestKind};

pub use error::{Result, SyncError, ValidationError};

pub use identifier::{normalize, IdentifierRegistry};

pub use import::{GeneratedFiles, ImportBlockGenerator, ImportOptions};

pub use lookup::{
    AccountGroupIndex, AccountGroupLookup, AgentLabelIndex, AgentLabelLookup, LookupSnapshot,
};

pub use reconcile::{ReconcileOutcome, ReconcileReport, ReconciliationEngine};

pub use store::{append_atomic, load_document, write_atomic};

pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
