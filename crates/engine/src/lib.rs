pub mod client;
pub mod executor;
pub mod service;

pub use client::{
    ClientCall, EnforcementClient, EnforcementError, InstantEnforcementClient,
    ScriptedEnforcementClient,
};
pub use executor::{
    ExecutorSettings, ImplementOutcome, ImplementationExecutor, ImplementationReport,
    RollbackReport,
};
pub use service::{CancelHandle, ChangeRequestService, ImplementationRun, ServiceDeps};
