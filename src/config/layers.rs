//! Logical layers and their attribute-name variants.

use crate::core::layers::AttributeRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field-name variants keyed by logical field, tried in declared order.
pub type FieldVariants = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Zones,
    CapitalObjects,
    PlanningProjects,
    Restriction,
}

const ZONE_FIELDS: &[(&str, &[&str])] = &[
    ("name", &["Код_объекта", "Наименование_объекта", "NAME"]),
    ("code", &["Индекс_зоны", "Код_Индекс_зоны", "CODE"]),
];

const CAPITAL_OBJECT_FIELDS: &[(&str, &[&str])] = &[
    ("cadnum", &["Кадастровый_номер", "CAD_NUM", "CADNUM"]),
    ("object_type", &["Вид_объекта", "Тип_объекта", "OBJECT_TYPE"]),
    ("purpose", &["Назначение", "PURPOSE"]),
    ("area", &["Площадь", "AREA"]),
    ("floors", &["Этажность", "Количество_этажей", "FLOORS"]),
];

const PLANNING_PROJECT_FIELDS: &[(&str, &[&str])] = &[
    ("name", &["Наименование_проекта", "Наименование", "NAME"]),
    ("decision_number", &["Номер_решения", "Номер"]),
    ("decision_date", &["Дата_решения", "Дата_регистрации"]),
    ("decision_authority", &["Орган_власти", "Орган"]),
];

const RESTRICTION_FIELDS: &[(&str, &[&str])] = &[
    (
        "name",
        &["Вид_или_наименование_по_доку_8", "Наименование", "Полное_наименование"],
    ),
    (
        "registry_number",
        &["Реестровый_номер_границы", "REGISTRY_NUMBER", "Реестровый_номер"],
    ),
    ("decision_number", &["Номер"]),
    ("decision_date", &["Дата_регистрации"]),
    ("decision_authority", &["Орган_власти", "Орган"]),
];

impl LayerKind {
    /// Fields lifted into [`RestrictionRecord`](crate::domain::model::RestrictionRecord)
    /// itself; everything else lands in its attribute payload.
    pub const COMMON_FIELDS: &'static [&'static str] = &[
        "name",
        "registry_number",
        "decision_number",
        "decision_date",
        "decision_authority",
    ];

    pub fn default_fields(self) -> FieldVariants {
        let table = match self {
            LayerKind::Zones => ZONE_FIELDS,
            LayerKind::CapitalObjects => CAPITAL_OBJECT_FIELDS,
            LayerKind::PlanningProjects => PLANNING_PROJECT_FIELDS,
            LayerKind::Restriction => RESTRICTION_FIELDS,
        };
        table
            .iter()
            .map(|(logical, variants)| {
                (
                    logical.to_string(),
                    variants.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    pub fn default_label(self) -> &'static str {
        match self {
            LayerKind::Zones => "Территориальные зоны",
            LayerKind::CapitalObjects => "ОКС",
            LayerKind::PlanningProjects => "ППТ",
            LayerKind::Restriction => "ЗОУИТ",
        }
    }
}

/// A fully resolved layer: where it lives and how its attributes are named.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDefinition {
    pub name: String,
    pub kind: LayerKind,
    pub path: String,
    pub fields: FieldVariants,
}

impl LayerDefinition {
    /// Built-in variants for `kind`, with `overrides` replacing whole logical entries.
    pub fn new(kind: LayerKind, name: impl Into<String>, path: impl Into<String>, overrides: &FieldVariants) -> Self {
        let mut fields = kind.default_fields();
        for (logical, variants) in overrides {
            fields.insert(logical.clone(), variants.clone());
        }
        Self {
            name: name.into(),
            kind,
            path: path.into(),
            fields,
        }
    }

    pub fn variants(&self, logical: &str) -> &[String] {
        self.fields.get(logical).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first_of(&self, row: &AttributeRow, logical: &str) -> Option<String> {
        row.first_of(self.variants(logical))
    }
}
