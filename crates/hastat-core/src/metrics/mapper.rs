//! Maps raw fields to dimensioned metric samples.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::collector::aggregate::AggregatedEntity;
use crate::collector::parser::MergedInfo;
use crate::config::CollectorConfig;

use super::sink::{Dimensions, MetricSample};
use super::taxonomy::{self, MetricDef, MetricTier};

/// Dimension carrying the entity label of per-entity metrics.
pub const INSTANCE_DIMENSION: &str = "instance";

/// Dimension carrying the process discriminator of global metrics when
/// several processes are polled.
pub const PROCESS_DIMENSION: &str = "process_num";

/// Applies the taxonomy, tier and exclusion rules and builds dimensions.
#[derive(Debug, Clone)]
pub struct MetricMapper {
    enhanced_metrics: bool,
    excluded_metrics: HashSet<String>,
    custom_dimensions: Dimensions,
}

impl MetricMapper {
    pub fn new(config: &CollectorConfig) -> Self {
        debug!(
            "metric mapper: {} known fields, enhanced_metrics={}, {} excluded",
            taxonomy::len(),
            config.enhanced_metrics,
            config.excluded_metrics.len()
        );
        Self {
            enhanced_metrics: config.enhanced_metrics,
            excluded_metrics: config.excluded_metrics.clone(),
            custom_dimensions: config.custom_dimensions.clone(),
        }
    }

    /// Resolves a raw field to its reporting identity, or `None` if the
    /// field is unknown, belongs to a disabled tier, or is excluded.
    pub fn resolve(&self, field: &str) -> Option<MetricDef> {
        let Some(def) = taxonomy::lookup(field) else {
            trace!("metric {} is not in the taxonomy", field.to_lowercase());
            return None;
        };
        if def.tier == MetricTier::Enhanced && !self.enhanced_metrics {
            return None;
        }
        if self.excluded_metrics.contains(def.name) {
            debug!("excluding metric {}", def.name);
            return None;
        }
        Some(def)
    }

    /// Samples for the global `show info` attributes.
    ///
    /// Values that are not integers (versions, dates, node names) are skipped.
    pub fn map_info(&self, info: &MergedInfo) -> Vec<MetricSample> {
        let mut samples = Vec::new();

        for entry in &info.entries {
            let Some(def) = self.resolve(&entry.key) else {
                continue;
            };
            let Ok(value) = entry.value.parse::<i64>() else {
                continue;
            };

            let mut dims = Dimensions::new();
            if let Some(process) = &entry.process {
                dims.insert(PROCESS_DIMENSION.to_string(), process.clone());
            }
            samples.push(self.sample(def, value, dims));
        }

        samples
    }

    /// Samples for one aggregated frontend, backend, server, listener or
    /// nameserver.
    pub fn map_entity(&self, entity: &AggregatedEntity) -> Vec<MetricSample> {
        let instance = entity.key.to_string();
        let mut samples = Vec::new();

        for (field, aggregated) in &entity.fields {
            let Some(value) = aggregated.as_metric_value() else {
                continue;
            };
            let Some(def) = self.resolve(field) else {
                continue;
            };

            let mut dims = Dimensions::new();
            dims.insert(INSTANCE_DIMENSION.to_string(), instance.clone());
            samples.push(self.sample(def, value, dims));
        }

        samples
    }

    fn sample(&self, def: MetricDef, value: i64, mut dims: Dimensions) -> MetricSample {
        dims.extend(
            self.custom_dimensions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        MetricSample {
            name: def.name.to_string(),
            kind: def.kind,
            value,
            dimensions: (!dims.is_empty()).then_some(dims),
        }
    }
}
