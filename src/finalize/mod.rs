// ============================================================================
// Model Finalization
// ============================================================================
//
// Finalization is an explicit, ordered list of passes. Each pass consumes the
// model produced by the previous one and either returns the updated model or
// aborts the whole build with an error. Passes run synchronously, once per
// build, on a single thread; the result is frozen into a FinalizedModel.
//
// ============================================================================

pub mod context;
pub mod conventions;

pub use context::{ConfigurationRequest, FinalizeContext};
pub use conventions::{ColumnNameConvention, StructureValidation, TableNameConvention};

use crate::columns::SharedColumnReconciliation;
use crate::config::FinalizeConfig;
use crate::core::Result;
use crate::grouping::TableGroupingPass;
use crate::model::{FinalizedModel, Model};
use crate::temporal::{SharedTableTemporalValidation, TemporalConvention};
use tracing::{Level, event, info_span};

/// One step of model finalization.
pub trait FinalizePass: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, model: Model, context: &mut FinalizeContext<'_>) -> Result<Model>;
}

pub struct Pipeline {
    config: FinalizeConfig,
    passes: Vec<Box<dyn FinalizePass>>,
}

impl Pipeline {
    /// A pipeline with no passes.
    pub fn new(config: FinalizeConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
        }
    }

    /// Naming conventions, grouping, temporal resolution, then column
    /// reconciliation. Reconciliation runs after temporal resolution so it
    /// sees the forced value generation of period columns.
    pub fn standard(config: FinalizeConfig) -> Self {
        Self::new(config)
            .with_pass(StructureValidation)
            .with_pass(TableNameConvention)
            .with_pass(ColumnNameConvention)
            .with_pass(TableGroupingPass)
            .with_pass(TemporalConvention)
            .with_pass(SharedTableTemporalValidation)
            .with_pass(SharedColumnReconciliation)
    }

    pub fn with_pass(mut self, pass: impl FinalizePass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn config(&self) -> &FinalizeConfig {
        &self.config
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs every pass in order. Configuration requests a pass emits are
    /// applied before the next pass starts.
    pub fn run(&self, mut model: Model) -> Result<Model> {
        let span = info_span!("model.finalize", passes = self.passes.len());
        let _enter = span.enter();

        for pass in &self.passes {
            let pass_span = info_span!("model.finalize.pass", pass = pass.name());
            let _pass_enter = pass_span.enter();

            let mut context = FinalizeContext::new(&self.config);
            model = match pass.apply(model, &mut context) {
                Ok(model) => model,
                Err(err) => {
                    event!(Level::ERROR, error = %err, "finalization pass failed");
                    return Err(err);
                }
            };

            let applied = context.apply_requests(&mut model)?;
            event!(Level::DEBUG, requests = applied, "finalization pass applied");
        }

        Ok(model)
    }

    pub fn finalize(&self, model: Model) -> Result<FinalizedModel> {
        self.run(model).map(FinalizedModel::new)
    }
}
