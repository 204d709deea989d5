//! # Operation Catalogue
//!
//! A serializable listing of the operations a registry can create, with the
//! layer each stage handles.

use serde::Serialize;
use stagewise_core::{Direction, LifecycleError, OperationRegistry};

/// One registered operation as listed by the `operations` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    /// Registry name.
    pub name: String,
    pub direction: Direction,
    pub stage_count: usize,
    /// Layer names in stage order. Stages without a layer are skipped.
    pub layers: Vec<&'static str>,
}

/// List every operation of `registry` in name order.
pub fn operation_catalogue(registry: &OperationRegistry) -> Result<Vec<OperationInfo>, LifecycleError> {
    let mut catalogue = Vec::with_capacity(registry.len());
    for name in registry.names() {
        let operation = registry.create(name)?;
        let layers = (0..operation.stage_count())
            .filter_map(|stage| operation.layer_at(stage))
            .map(|layer| layer.name())
            .collect();
        catalogue.push(OperationInfo {
            name: name.to_string(),
            direction: operation.direction(),
            stage_count: operation.stage_count(),
            layers,
        });
    }
    Ok(catalogue)
}
