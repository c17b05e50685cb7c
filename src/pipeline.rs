//! Accounts, then contracts, then tenants: a linear run of fallible stages.

use std::fmt;

use async_trait::async_trait;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::assembler::Assembler;
use crate::error::StageError;
use crate::resolver::ResolvedSet;
use crate::submission::{SubmissionEngine, SubmissionReport};
use crate::telemetry::TracingProgress;
use crate::templates::EntityKind;
use crate::tenants::TenantSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Accounts,
    Contracts,
    Tenants,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Accounts, Phase::Contracts, Phase::Tenants];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Accounts => "accounts",
            Phase::Contracts => "contracts",
            Phase::Tenants => "tenants",
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Phase::Accounts => EntityKind::Account,
            Phase::Contracts => EntityKind::Contract,
            Phase::Tenants => EntityKind::Tenant,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str, severity: Severity);
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(target: "pipeline.notify", subject, body, "notification"),
            Severity::Warning => warn!(target: "pipeline.notify", subject, body, "notification"),
            Severity::Error => error!(target: "pipeline.notify", subject, body, "notification"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub documents: usize,
    pub report: SubmissionReport,
}

#[derive(Debug)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub error: StageError,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub completed: Vec<PhaseReport>,
    pub failure: Option<PhaseFailure>,
    pub skipped: Vec<Phase>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn phase(&self) -> Phase;

    /// Warnings to raise before the stage runs. They never block it.
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }

    async fn execute(&self) -> Result<PhaseReport, StageError>;
}

/// Assembles one kind of document and submits it.
pub struct EntityStage<'a> {
    phase: Phase,
    assembler: &'a Assembler<'a>,
    resolved: &'a ResolvedSet,
    tenants: &'a TenantSet,
    engine: &'a SubmissionEngine,
}

impl<'a> EntityStage<'a> {
    pub fn new(
        phase: Phase,
        assembler: &'a Assembler<'a>,
        resolved: &'a ResolvedSet,
        tenants: &'a TenantSet,
        engine: &'a SubmissionEngine,
    ) -> Self {
        Self {
            phase,
            assembler,
            resolved,
            tenants,
            engine,
        }
    }
}

#[async_trait]
impl<'a> Stage for EntityStage<'a> {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn warnings(&self) -> Vec<String> {
        if self.phase == Phase::Tenants && self.tenants.has_duplicates() {
            vec![format!(
                "Duplicate tenant IDs found:\n {}",
                self.tenants.duplicate_tenant_ids.join(", ")
            )]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self) -> Result<PhaseReport, StageError> {
        let documents = self
            .assembler
            .assemble(self.phase.kind(), self.resolved, self.tenants)?;
        let progress = TracingProgress::new(self.phase.as_str());
        let report = self.engine.submit(&documents, &progress).await?;
        Ok(PhaseReport {
            phase: self.phase,
            documents: documents.len(),
            report,
        })
    }
}

pub struct Pipeline<'n> {
    notifier: &'n dyn Notifier,
    project_name: String,
}

impl<'n> Pipeline<'n> {
    pub fn new(notifier: &'n dyn Notifier, project_name: impl Into<String>) -> Self {
        Self {
            notifier,
            project_name: project_name.into(),
        }
    }

    /// Runs `stages` in order and stops at the first failure. Later stages are
    /// reported as skipped; nothing already submitted is undone.
    pub async fn run(&self, stages: &[Box<dyn Stage + '_>]) -> PipelineOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", %run_id, project = %self.project_name);
        self.run_stages(run_id, stages).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid, stages: &[Box<dyn Stage + '_>]) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            run_id,
            completed: Vec::new(),
            failure: None,
            skipped: Vec::new(),
        };

        for (position, stage) in stages.iter().enumerate() {
            let phase = stage.phase();
            for warning in stage.warnings() {
                self.notifier
                    .notify(&self.subject(Severity::Warning), &warning, Severity::Warning)
                    .await;
            }

            info!(target: "pipeline", %phase, "stage starting");
            match stage.execute().await {
                Ok(report) => {
                    info!(
                        target: "pipeline",
                        %phase,
                        documents = report.documents,
                        failed = report.report.failed,
                        "stage finished"
                    );
                    outcome.completed.push(report);
                }
                Err(err) => {
                    error!(target: "pipeline", %phase, error = %err, "stage failed");
                    let body = format!("Error posting the entities to {phase}: {err}");
                    self.notifier
                        .notify(&self.subject(Severity::Error), &body, Severity::Error)
                        .await;
                    outcome.skipped = stages[position + 1..].iter().map(|s| s.phase()).collect();
                    outcome.failure = Some(PhaseFailure { phase, error: err });
                    return outcome;
                }
            }
        }

        let body = outcome
            .completed
            .iter()
            .map(|done| format!("{}: {}", done.phase, done.report.summary()))
            .collect::<Vec<_>>()
            .join("\n");
        self.notifier
            .notify(&self.subject(Severity::Info), &body, Severity::Info)
            .await;
        outcome
    }

    fn subject(&self, severity: Severity) -> String {
        format!("{} - {}", severity.as_str(), self.project_name)
    }
}
