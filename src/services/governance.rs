//! Single entry point wiring every store under one data directory.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::{AdjustmentError, GovernanceError};
use crate::domain::models::checkpoint::CheckpointState;
use crate::domain::models::config::Config;
use crate::domain::models::constraint::default_base_constraints;
use crate::domain::models::evolution::RunContext;
use crate::domain::models::phase::{PhaseIndex, PhasePlan};
use crate::domain::models::threshold::default_thresholds;
use crate::domain::ports::ArtifactProbe;
use crate::infrastructure::persistence::WriteRetry;
use crate::infrastructure::{DataLayout, FsArtifactProbe};
use crate::services::adjustment_engine::{AdjustmentEngine, AnalysisReport, ConfirmOutcome};
use crate::services::checkpoint_store::CheckpointStore;
use crate::services::constraint_store::ConstraintStore;
use crate::services::evolution_log::{fold_proposals, read_run, EvolutionLog};
use crate::services::evolution_verifier::{EvolutionVerifier, VerificationReport};
use crate::services::hook_ledger::HookEventLedger;
use crate::services::phase_gate::{GateContext, GateDecision, PhaseGate};
use crate::services::scorecard::QualityScorecard;
use crate::services::threshold_store::ThresholdStore;

/// Per-run stores.
#[derive(Clone)]
pub struct RunHandle {
    pub run_id: String,
    pub scorecard: QualityScorecard,
    pub evolution: EvolutionLog,
}

/// Every governance component for one data directory.
#[derive(Clone)]
pub struct Governance {
    config: Config,
    layout: DataLayout,
    retry: WriteRetry,
    checkpoint: CheckpointStore,
    hooks: HookEventLedger,
    thresholds: ThresholdStore,
    constraints: ConstraintStore,
    engine: AdjustmentEngine,
    gate: PhaseGate,
    verifier: EvolutionVerifier,
}

impl Governance {
    /// Open with artifacts checked on disk under `config.artifact_root`.
    pub async fn open(config: &Config) -> Result<Self, GovernanceError> {
        let probe = Arc::new(FsArtifactProbe::new(&config.artifact_root));
        Self::open_with_probe(config, probe).await
    }

    #[instrument(skip_all, fields(data_dir = %config.data_dir))]
    pub async fn open_with_probe(
        config: &Config,
        probe: Arc<dyn ArtifactProbe>,
    ) -> Result<Self, GovernanceError> {
        let plan = PhasePlan::new(config.pipeline.clone())?;
        let layout = DataLayout::new(&config.data_dir);
        let retry = WriteRetry::from_millis(config.storage.write_retry_delay_ms);

        let checkpoint = CheckpointStore::new(layout.checkpoint(), retry);
        let hooks = HookEventLedger::open(layout.hook_ledger(), retry).await?;
        let thresholds = ThresholdStore::open(layout.thresholds(), retry, default_thresholds()).await?;
        let constraints =
            ConstraintStore::open(layout.constraints(), retry, default_base_constraints()).await?;

        let engine = AdjustmentEngine::new(
            config.adjustment.clone(),
            config.scorecard.clone(),
            hooks.clone(),
            thresholds.clone(),
            constraints.clone(),
        );
        let gate = PhaseGate::new(
            plan,
            probe,
            constraints.clone(),
            config.scorecard.gate_threshold,
            config.scorecard.weights.clone(),
        );
        let verifier = EvolutionVerifier::new(config.verifier.decline_tolerance);

        info!(root = %layout.root().display(), "governance opened");
        Ok(Self {
            config: config.clone(),
            layout,
            retry,
            checkpoint,
            hooks,
            thresholds,
            constraints,
            engine,
            gate,
            verifier,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn hooks(&self) -> &HookEventLedger {
        &self.hooks
    }

    pub fn thresholds(&self) -> &ThresholdStore {
        &self.thresholds
    }

    pub fn constraints(&self) -> &ConstraintStore {
        &self.constraints
    }

    pub fn engine(&self) -> &AdjustmentEngine {
        &self.engine
    }

    pub fn gate(&self) -> &PhaseGate {
        &self.gate
    }

    /// Open (creating if needed) the scorecard and evolution log of `run_id`.
    pub async fn run(&self, run_id: &str) -> Result<RunHandle, GovernanceError> {
        let scorecard = QualityScorecard::open(self.layout.score_log(run_id), self.retry).await?;
        let evolution =
            EvolutionLog::open(self.layout.evolution_log(run_id), run_id, self.retry).await?;
        Ok(RunHandle {
            run_id: run_id.to_string(),
            scorecard,
            evolution,
        })
    }

    /// Run the adjustment engine over one round of a run.
    pub async fn analyze(&self, ctx: &RunContext) -> Result<AnalysisReport, GovernanceError> {
        let run = self.run(&ctx.run_id).await?;
        Ok(self.engine.analyze(ctx, &run.scorecard, &run.evolution).await?)
    }

    /// Resolve a proposal. Without `run_id`, every run is searched for it.
    pub async fn confirm(
        &self,
        proposal_id: Uuid,
        approve: bool,
        run_id: Option<&str>,
    ) -> Result<ConfirmOutcome, GovernanceError> {
        let run_id = match run_id {
            Some(id) => id.to_string(),
            None => self
                .find_proposal_run(proposal_id)
                .await?
                .ok_or(AdjustmentError::ProposalNotFound(proposal_id))?,
        };
        let run = self.run(&run_id).await?;
        Ok(self.engine.confirm(&run.evolution, proposal_id, approve).await?)
    }

    async fn find_proposal_run(&self, proposal_id: Uuid) -> Result<Option<String>, GovernanceError> {
        for dir in self.run_dirs().await? {
            let (_, evolution) = crate::infrastructure::layout::run_files(&dir);
            let records = read_run(&evolution).await?;
            if fold_proposals(&records).iter().any(|p| p.id == proposal_id) {
                return Ok(records.first().map(|r| r.run_id.clone()));
            }
        }
        Ok(None)
    }

    /// Evaluate leaving `from` against `run_id`'s checkpoint without saving.
    /// A checkpoint saved by another run is an error.
    #[instrument(skip(self, ctx))]
    pub async fn check(
        &self,
        run_id: &str,
        from: PhaseIndex,
        ctx: &GateContext,
    ) -> Result<(GateDecision, CheckpointState), GovernanceError> {
        let state = self.checkpoint.load_or_new(run_id).await?;
        if state.run_id != run_id {
            warn!(checkpoint_run = %state.run_id, "checkpoint belongs to another run");
            return Err(GovernanceError::RunMismatch {
                expected: run_id.to_string(),
                found: state.run_id,
            });
        }
        let decision = self.gate.can_advance(from, &state, ctx).await?;
        Ok((decision, state))
    }

    /// Evaluate leaving `from` and, on a pass, persist the advanced checkpoint.
    #[instrument(skip(self, ctx))]
    pub async fn advance(
        &self,
        run_id: &str,
        from: PhaseIndex,
        ctx: &GateContext,
    ) -> Result<(GateDecision, CheckpointState), GovernanceError> {
        let (decision, state) = self.check(run_id, from, ctx).await?;
        if !decision.is_pass() {
            return Ok((decision, state));
        }
        let next = self.gate.next_state(from, &state);
        self.checkpoint.save(&next).await?;
        Ok((decision, next))
    }

    pub async fn run_dirs(&self) -> Result<Vec<PathBuf>, GovernanceError> {
        Ok(EvolutionVerifier::discover(&self.layout.runs_dir()).await?)
    }

    /// Verify the given run directories, or every run in the data directory.
    pub async fn verify(&self, run_dirs: &[PathBuf]) -> Result<VerificationReport, GovernanceError> {
        let dirs = if run_dirs.is_empty() {
            self.run_dirs().await?
        } else {
            run_dirs.to_vec()
        };
        Ok(self.verifier.verify(&dirs).await?)
    }
}
