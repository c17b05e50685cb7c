pub mod assembler;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod records;
pub mod resolver;
pub mod snapshot;
pub mod submission;
pub mod telemetry;
pub mod templates;
pub mod tenants;

pub use assembler::{Assembler, CrmLinks, EntityDocument};
pub use pipeline::{EntityStage, LogNotifier, Notifier, Phase, Pipeline, PipelineOutcome, Severity, Stage};
pub use records::SubscriptionRecord;
pub use resolver::{resolve, ResolvedSet};
pub use submission::{SubmissionEngine, SubmissionReport, SubmissionSettings};
pub use templates::{EntityKind, StaticTemplateStore, TemplateStore};
pub use tenants::{resolve_tenants, TenantSet, UsagePackage};
