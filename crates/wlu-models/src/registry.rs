//! Named model prototypes selectable from the command line.

use std::collections::BTreeMap;

use wlu_core::errors::{ErrorInfo, WluError};
use wlu_core::Model;

use crate::partial::PartialPoolingModel;
use crate::pooling::{CompletePoolingModel, NoPoolingModel};
use crate::regressor::{Lasso, LeastSquares, MeanRegressor};

/// Every built-in model keyed by label.
pub fn builtin_models() -> BTreeMap<String, Box<dyn Model>> {
    let mut models: BTreeMap<String, Box<dyn Model>> = BTreeMap::new();
    models.insert(
        "no-pooling-dummy".into(),
        Box::new(NoPoolingModel::new(MeanRegressor::default(), false)),
    );
    models.insert(
        "cpooling-dummy".into(),
        Box::new(CompletePoolingModel::new(MeanRegressor::default(), false)),
    );
    models.insert(
        "no-pooling-lin".into(),
        Box::new(NoPoolingModel::new(LeastSquares::default(), false)),
    );
    models.insert(
        "cpooling-lin".into(),
        Box::new(CompletePoolingModel::new(LeastSquares::default(), false)),
    );
    models.insert(
        "model_lasso_reg_no_pool".into(),
        Box::new(NoPoolingModel::new(Lasso::new(0.1), true)),
    );
    models.insert(
        "model_lasso_reg_cpool".into(),
        Box::new(CompletePoolingModel::new(Lasso::new(0.1), true)),
    );
    models.insert(
        "partial-pooling-ridge".into(),
        Box::new(PartialPoolingModel::default()),
    );
    models
}

/// Picks the requested labels from the built-ins, preserving their order.
///
/// An empty selection returns every built-in model.
pub fn select_models(labels: &[String]) -> Result<BTreeMap<String, Box<dyn Model>>, WluError> {
    let mut available = builtin_models();
    if labels.is_empty() {
        return Ok(available);
    }
    let known = available.keys().cloned().collect::<Vec<_>>().join(", ");
    let mut selected = BTreeMap::new();
    for label in labels {
        let model = available.remove(label).ok_or_else(|| {
            WluError::Config(
                ErrorInfo::new("model_unknown", "no model registered under label")
                    .with_context("model", label.clone())
                    .with_hint(format!("known models: {known}")),
            )
        })?;
        selected.insert(label.clone(), model);
    }
    Ok(selected)
}
