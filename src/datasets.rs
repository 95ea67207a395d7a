//! The read side: which pre-provisioned view backs each (dataset, country)
//! pair, and how view rows are reshaped for the dashboard.

use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::data_types::JsonObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
pub enum DatasetKind {
    #[strum(serialize = "line-data")]
    LineData,
    #[strum(serialize = "optimal-storage-capacity")]
    OptimalStorageCapacity,
    #[strum(serialize = "nominal-storage-capacity")]
    NominalStorageCapacity,
    #[strum(serialize = "optimal-generator-capacity")]
    OptimalGeneratorCapacity,
    #[strum(serialize = "nominal-generator-capacity")]
    NominalGeneratorCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Country {
    #[strum(serialize = "nigeria")]
    Nigeria,
    #[strum(serialize = "colombia")]
    Colombia,
    #[strum(serialize = "united states")]
    UnitedStates,
}

impl Country {
    /// Match an already-decoded path segment, ignoring case
    pub fn from_token(token: &str) -> Option<Self> {
        token.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSource {
    pub relation: &'static str,
    pub geometry_column: &'static str,
    /// Key the geometry's coordinates are returned under
    pub output_field: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    View(ViewSource),
    /// Known gap: the dataset doesn't exist for this country
    Unavailable,
}

const fn view(relation: &'static str) -> DataSource {
    DataSource::View(ViewSource {
        relation,
        geometry_column: "geom",
        output_field: "geom",
    })
}

const fn line_view(relation: &'static str, geometry_column: &'static str) -> DataSource {
    DataSource::View(ViewSource {
        relation,
        geometry_column,
        output_field: "line_geom",
    })
}

const SOURCES: &[(DatasetKind, Country, DataSource)] = &[
    (
        DatasetKind::NominalGeneratorCapacity,
        Country::Nigeria,
        view("view_nominal_generator_capacity_with_geom"),
    ),
    (
        DatasetKind::NominalGeneratorCapacity,
        Country::Colombia,
        view("view_nominal_generator_capacity_with_geom_co"),
    ),
    (
        DatasetKind::NominalGeneratorCapacity,
        Country::UnitedStates,
        view("view_nominal_generator_capacity_with_geom_us"),
    ),
    (
        DatasetKind::OptimalGeneratorCapacity,
        Country::Nigeria,
        view("view_optimal_generator_capacity_with_geom"),
    ),
    (
        DatasetKind::OptimalGeneratorCapacity,
        Country::Colombia,
        view("view_optimal_generator_capacity_with_geom_co"),
    ),
    (
        DatasetKind::OptimalGeneratorCapacity,
        Country::UnitedStates,
        view("view_optimal_generator_capacity_with_geom_us"),
    ),
    (
        DatasetKind::NominalStorageCapacity,
        Country::Nigeria,
        view("view_nominal_storage_unit_capacity_with_geom"),
    ),
    (
        DatasetKind::NominalStorageCapacity,
        Country::Colombia,
        view("view_nominal_storage_unit_capacity_with_geom_co"),
    ),
    (
        DatasetKind::NominalStorageCapacity,
        Country::UnitedStates,
        DataSource::Unavailable,
    ),
    (
        DatasetKind::OptimalStorageCapacity,
        Country::Nigeria,
        view("view_optimal_storage_unit_capacity_with_geom"),
    ),
    (
        DatasetKind::OptimalStorageCapacity,
        Country::Colombia,
        view("view_optimal_storage_unit_capacity_with_geom_co"),
    ),
    (
        DatasetKind::OptimalStorageCapacity,
        Country::UnitedStates,
        DataSource::Unavailable,
    ),
    (
        DatasetKind::LineData,
        Country::Nigeria,
        line_view("network_lines_view", "line_geom"),
    ),
    (
        DatasetKind::LineData,
        Country::Colombia,
        line_view("network_lines_view_co", "line_geom"),
    ),
    (
        DatasetKind::LineData,
        Country::UnitedStates,
        line_view("geojson_network_lines_view_US", "geom"),
    ),
];

pub fn lookup(kind: DatasetKind, country: Country) -> Option<DataSource> {
    SOURCES
        .iter()
        .find(|(k, c, _)| *k == kind && *c == country)
        .map(|(_, _, source)| *source)
}

/// Economic statistics only exist for the United States, one table per
/// scenario. Scenario names end up in a table name, so they're restricted to
/// ASCII alphanumerics and underscores.
pub fn economic_statistics_table(scenario: &str) -> Option<String> {
    if scenario.is_empty()
        || !scenario
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }

    Some(format!("json_statistics_{scenario}_US"))
}

/// Reduce a GeoJSON geometry object to its coordinates. Collections become
/// the list of their members' coordinates.
pub fn geometry_coordinates(geometry: Value) -> Value {
    match geometry {
        Value::Object(mut object) => {
            if let Some(coordinates) = object.remove("coordinates") {
                coordinates
            } else if let Some(Value::Array(members)) = object.remove("geometries") {
                Value::Array(members.into_iter().map(geometry_coordinates).collect())
            } else {
                Value::Null
            }
        }
        other => other,
    }
}

pub fn rows_with_coordinates(rows: Vec<JsonObject>, source: &ViewSource) -> Vec<JsonObject> {
    rows.into_iter()
        .map(|mut row| {
            if source.geometry_column == source.output_field {
                if let Some(cell) = row.get_mut(source.geometry_column) {
                    *cell = geometry_coordinates(cell.take());
                }
            } else {
                let geometry = row
                    .shift_remove(source.geometry_column)
                    .unwrap_or(Value::Null);
                row.insert(
                    source.output_field.to_string(),
                    geometry_coordinates(geometry),
                );
            }
            row
        })
        .collect()
}
