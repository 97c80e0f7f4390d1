//! Migration plans and their execution.
//!
//! A plan takes one product from its recorded version to a target version
//! through an ordered list of unit steps. The [`PlanExecutor`] runs every
//! step inside one transactional scope and records the new version only
//! once that scope has committed.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use super::error::MigrationError;
use super::store::{ScopeProvider, VersionEntry, VersionStore};
use super::unit::{MigrationContext, MigrationUnit};
use super::version::Version;

/// One step of a plan.
#[derive(Clone)]
pub struct PlanStep {
    /// Version the product is at after this step.
    pub version: Version,
    /// Unit name, for logs and errors.
    pub unit_name: String,
    /// The unit to run.
    pub unit: Arc<dyn MigrationUnit>,
}

impl fmt::Debug for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanStep")
            .field("version", &self.version)
            .field("unit_name", &self.unit_name)
            .finish()
    }
}

/// Ordered steps taking a product from one version to another.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Product being migrated.
    pub product: String,
    /// Recorded version when the plan was built.
    pub from: Version,
    /// Version recorded once every step succeeds.
    pub to: Version,
    /// Steps, in execution order.
    pub steps: Vec<PlanStep>,
}

impl MigrationPlan {
    /// Create an empty plan.
    pub fn new(product: impl Into<String>, from: Version, to: Version) -> Self {
        Self {
            product: product.into(),
            from,
            to,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn with_step(mut self, version: Version, unit_name: impl Into<String>, unit: Arc<dyn MigrationUnit>) -> Self {
        self.steps.push(PlanStep {
            version,
            unit_name: unit_name.into(),
            unit,
        });
        self
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Runs plans inside the host's transactional scope.
pub struct PlanExecutor<'a> {
    scopes: &'a dyn ScopeProvider,
    store: &'a dyn VersionStore,
}

impl<'a> PlanExecutor<'a> {
    /// Create an executor.
    pub fn new(scopes: &'a dyn ScopeProvider, store: &'a dyn VersionStore) -> Self {
        Self { scopes, store }
    }

    /// Run every step, commit, then record `plan.to`.
    ///
    /// On failure the scope is released without committing and the recorded
    /// version is left unchanged. Side effects a unit already made outside
    /// the scope are not undone. If recording fails after the commit the
    /// plan runs again next time, so units must tolerate re-running.
    pub fn execute(&self, plan: &MigrationPlan, ctx: &MigrationContext<'_>) -> Result<Version, MigrationError> {
        let scope = self.scopes.begin()?;

        for step in &plan.steps {
            info!(
                product = %plan.product,
                unit = %step.unit_name,
                version = %step.version,
                "Running migration step"
            );
            if let Err(e) = step.unit.up(ctx) {
                let e = Self::label(step, e);
                error!(product = %plan.product, unit = %step.unit_name, error = %e, "Migration step failed");
                return Err(e);
            }
        }

        scope.commit()?;
        if let Err(e) = self.store.record(&VersionEntry::new(plan.product.clone(), plan.to)) {
            error!(product = %plan.product, version = %plan.to, error = %e, "Committed migration but could not record its version");
            return Err(e.into());
        }
        Ok(plan.to)
    }

    fn label(step: &PlanStep, e: MigrationError) -> MigrationError {
        match e {
            MigrationError::Unsupported { direction, .. } => MigrationError::Unsupported {
                unit: step.unit_name.clone(),
                direction,
            },
            e @ MigrationError::UnitFailed { .. } => e,
            other => MigrationError::UnitFailed {
                unit: step.unit_name.clone(),
                version: step.version.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
