//! Staged spatial analysis of one parcel against the configured layers.
//!
//! Stage failures never abort the run: a missing layer becomes a report warning and an
//! unreadable one a report error, and the remaining stages still execute.

use crate::config::layers::LayerDefinition;
use crate::config::toml_config::LayerConfig;
use crate::core::egrn::EgrnExtractor;
use crate::core::geometry::{self, Shape};
use crate::core::kpt::ZoneMapExtractor;
use crate::core::layers::{self, LayerFeature};
use crate::core::{matcher, resolver};
use crate::domain::model::{AnalysisReport, Parcel, ZoneRecord, ZoneResolution};
use crate::domain::ports::LayerStorage;
use crate::utils::error::Result;
use std::collections::BTreeMap;

const STAGES: usize = 4;

enum LayerLoad {
    NotConfigured,
    Missing(String),
    Loaded(Vec<LayerFeature>),
    Failed(String),
}

pub struct SpatialAnalyzer<S: LayerStorage> {
    storage: S,
    config: LayerConfig,
}

impl<S: LayerStorage> SpatialAnalyzer<S> {
    pub fn new(storage: S, config: LayerConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Whether each configured layer file is present, keyed by layer name.
    pub fn layer_availability(&self) -> BTreeMap<String, bool> {
        self.config
            .all_layers()
            .into_iter()
            .map(|layer| {
                let present = self.storage.exists(&layer.path);
                (layer.name, present)
            })
            .collect()
    }

    /// Parses both extracts with the configured field tables, then analyzes.
    pub fn analyze_documents(&self, egrn: &[u8], kpt: Option<&[u8]>) -> Result<AnalysisReport> {
        let parcel = EgrnExtractor::with_fields(self.config.egrn_fields()?).parse(egrn)?;
        let zone_map = match kpt {
            Some(bytes) => Some(ZoneMapExtractor::with_fields(self.config.kpt_fields()?).parse(bytes)?.zones),
            None => None,
        };
        Ok(self.analyze(parcel, zone_map.as_deref()))
    }

    /// Runs every stage for `parcel`. A non-empty `zone_map` is used for zoning unless
    /// the configuration prefers the zones layer.
    pub fn analyze(&self, parcel: Parcel, zone_map: Option<&[ZoneRecord]>) -> AnalysisReport {
        let label = parcel.cadastral_number.clone().unwrap_or_else(|| "-".to_string());
        tracing::info!("Starting spatial analysis for parcel {}", label);

        let shape = geometry::union(&parcel.contours);
        let mut report = AnalysisReport::new(parcel);

        let Some(shape) = shape else {
            tracing::error!("Parcel {} has no usable boundary, analysis skipped", label);
            report.add_error("Parcel has no usable boundary coordinates");
            return report;
        };

        tracing::info!("Stage 1/{}: territorial zone", STAGES);
        self.analyze_zone(&shape, zone_map, &mut report);

        tracing::info!("Stage 2/{}: capital construction objects", STAGES);
        self.analyze_capital_objects(&shape, &mut report);

        tracing::info!("Stage 3/{}: planning projects", STAGES);
        self.analyze_planning_projects(&shape, &mut report);

        tracing::info!("Stage 4/{}: restriction zones", STAGES);
        self.analyze_restrictions(&shape, &mut report);

        tracing::info!(
            "Spatial analysis finished: zone={}, objects={}, restrictions={}, warnings={}, errors={}",
            report.zone.name().unwrap_or("-"),
            report.capital_objects.len(),
            report.restrictions.len(),
            report.warnings.len(),
            report.errors.len()
        );
        report
    }

    fn load(&self, layer: Option<&LayerDefinition>) -> LayerLoad {
        let Some(layer) = layer else {
            return LayerLoad::NotConfigured;
        };
        if !self.storage.exists(&layer.path) {
            return LayerLoad::Missing(format!("Layer '{}' not found: {}", layer.name, layer.path));
        }
        match layers::load_layer(&self.storage, layer) {
            Ok(features) => LayerLoad::Loaded(features),
            Err(e) => LayerLoad::Failed(format!("Layer '{}' could not be read: {}", layer.name, e)),
        }
    }

    fn analyze_zone(&self, shape: &Shape, zone_map: Option<&[ZoneRecord]>, report: &mut AnalysisReport) {
        let from_map = zone_map.filter(|zones| !zones.is_empty() && !self.config.analysis.prefer_zone_layer);

        let resolution = match from_map {
            Some(zones) => {
                tracing::debug!("Resolving zone against {} zone map records", zones.len());
                resolver::resolve_from_records(shape, zones)
            }
            None => {
                if zone_map.is_some_and(|zones| zones.is_empty()) {
                    report.add_warning("Zone map contains no territorial zones");
                }
                let definition = self.config.zones();
                match self.load(definition.as_ref()) {
                    LayerLoad::NotConfigured => {
                        report.add_warning("No zone source: zone map absent and zones layer not configured");
                        return;
                    }
                    LayerLoad::Missing(message) => {
                        tracing::warn!("{}", message);
                        report.add_warning(message);
                        return;
                    }
                    LayerLoad::Failed(message) => {
                        tracing::error!("{}", message);
                        report.add_error(message);
                        return;
                    }
                    LayerLoad::Loaded(features) if features.is_empty() => {
                        tracing::warn!("Zones layer is empty");
                        report.add_warning("Zones layer contains no data");
                        return;
                    }
                    LayerLoad::Loaded(features) => {
                        let Some(definition) = definition else {
                            return;
                        };
                        let zones = layers::zones_from_features(&definition, features);
                        resolver::resolve_from_records(shape, &zones)
                    }
                }
            }
        };

        match &resolution {
            ZoneResolution::Undetermined => {
                tracing::warn!("Territorial zone could not be determined");
                report.add_warning("Territorial zone not determined");
            }
            zone => tracing::info!(
                "Zone determined: {} {}",
                zone.code().unwrap_or(""),
                zone.name().unwrap_or("")
            ),
        }
        report.zone = resolution;
    }

    fn analyze_capital_objects(&self, shape: &Shape, report: &mut AnalysisReport) {
        let definition = self.config.capital_objects();
        let features = match self.load(definition.as_ref()) {
            LayerLoad::NotConfigured => {
                tracing::debug!("Capital objects layer not configured");
                return;
            }
            LayerLoad::Missing(message) => {
                tracing::warn!("{}", message);
                report.add_warning(message);
                return;
            }
            LayerLoad::Failed(message) => {
                tracing::error!("{}", message);
                report.add_error(message);
                return;
            }
            LayerLoad::Loaded(features) => features,
        };
        let Some(definition) = definition else {
            return;
        };

        let records = layers::records_from_features(&definition, features);
        report.capital_objects = matcher::match_records(shape, &records);
        if report.capital_objects.is_empty() {
            tracing::info!("No capital construction objects on the parcel");
        } else {
            tracing::info!("Found {} capital construction objects", report.capital_objects.len());
        }
    }

    fn analyze_planning_projects(&self, shape: &Shape, report: &mut AnalysisReport) {
        let definition = self.config.planning_projects();
        let features = match self.load(definition.as_ref()) {
            LayerLoad::NotConfigured => {
                tracing::debug!("Planning projects layer not configured");
                return;
            }
            LayerLoad::Missing(message) => {
                tracing::warn!("{}", message);
                report.add_warning(message);
                return;
            }
            LayerLoad::Failed(message) => {
                tracing::error!("{}", message);
                report.add_error(message);
                return;
            }
            LayerLoad::Loaded(features) => features,
        };
        let Some(definition) = definition else {
            return;
        };

        let records = layers::records_from_features(&definition, features);
        report.planning_project = matcher::first_match(shape, &records);
        match &report.planning_project {
            Some(project) => tracing::info!(
                "Parcel lies within planning project: {}",
                project.decision.formatted()
            ),
            None => tracing::info!("Parcel is outside planning projects"),
        }
    }

    fn analyze_restrictions(&self, shape: &Shape, report: &mut AnalysisReport) {
        for definition in self.config.restrictions() {
            let features = match self.load(Some(&definition)) {
                LayerLoad::Loaded(features) => features,
                LayerLoad::NotConfigured => continue,
                // a broken restriction layer is not fatal to the report
                LayerLoad::Missing(message) | LayerLoad::Failed(message) => {
                    tracing::warn!("{}", message);
                    report.add_warning(message);
                    continue;
                }
            };

            let records = layers::records_from_features(&definition, features);
            let found = matcher::match_records(shape, &records);
            if !found.is_empty() {
                tracing::info!("Found {} restrictions of type '{}'", found.len(), definition.name);
            }
            report.restrictions.extend(found);
        }
    }
}
