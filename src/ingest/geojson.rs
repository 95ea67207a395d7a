use geo::{coord, BoundingRect, Rect};
use geojson::feature::Id;
use geojson::{Feature, GeoJson};
use serde_json::Value;
use tracing::debug;
use wkt::ToWkt;

use crate::data_types::{Column, ColumnType, TableData, GEOMETRY_COLUMN};

use super::table::TableBuilder;
use super::IngestError;

/// Features of a GeoJSON document, flattened into a table
#[derive(Debug)]
pub struct GeoJsonTable {
    /// Feature properties plus a trailing geometry column holding WKT
    pub table: TableData,
    /// Number of features carrying a non-empty geometry
    pub geometries: usize,
    pub bounds: Option<Rect<f64>>,
}

/// Parse a FeatureCollection, a single Feature or a bare Geometry into a
/// table. Features without a geometry are kept, with a null geometry cell.
pub fn parse_geojson(bytes: &[u8], srid: i32) -> Result<GeoJsonTable, IngestError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let features = match GeoJson::from_json_value(value)? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut builder = TableBuilder::new();
    let mut cells = Vec::with_capacity(features.len());
    let mut geometries = 0;
    let mut bounds = None;

    for (index, feature) in features.into_iter().enumerate() {
        let mut properties = feature.properties.unwrap_or_default();
        if properties.shift_remove(GEOMETRY_COLUMN).is_some() {
            debug!("Dropping property {GEOMETRY_COLUMN:?} of feature {index}, it clashes with the geometry column");
        }
        if let Some(id) = feature.id {
            properties.entry("id").or_insert(match id {
                Id::String(s) => Value::String(s),
                Id::Number(n) => Value::Number(n),
            });
        }
        builder.push_object(properties);

        let cell = match feature.geometry {
            Some(geometry) => {
                if position_count(&geometry.value) == 0 {
                    Value::Null
                } else {
                    let geometry = geo::Geometry::<f64>::try_from(geometry.value)?;
                    geometries += 1;
                    if let Some(rect) = geometry.bounding_rect() {
                        bounds = Some(include_bounds(bounds, rect));
                    }
                    Value::String(geometry.wkt_string())
                }
            }
            None => Value::Null,
        };
        cells.push(cell);
    }

    let mut table = builder.finish();
    table.columns.push(Column {
        name: GEOMETRY_COLUMN.to_string(),
        column_type: ColumnType::Geometry { srid },
    });
    for (row, cell) in table.rows.iter_mut().zip(cells) {
        row.push(cell);
    }

    Ok(GeoJsonTable {
        table,
        geometries,
        bounds,
    })
}

/// Positions with fewer than two ordinates are already rejected by the
/// parser, so only empty coordinate lists are left to count here.
fn position_count(value: &geojson::Value) -> usize {
    use geojson::Value::*;

    match value {
        Point(_) => 1,
        MultiPoint(positions) | LineString(positions) => positions.len(),
        MultiLineString(lines) | Polygon(lines) => lines.iter().map(Vec::len).sum(),
        MultiPolygon(polygons) => polygons.iter().flatten().map(Vec::len).sum(),
        GeometryCollection(members) => members.iter().map(|g| position_count(&g.value)).sum(),
    }
}

fn include_bounds(bounds: Option<Rect<f64>>, rect: Rect<f64>) -> Rect<f64> {
    match bounds {
        None => rect,
        Some(current) => Rect::new(
            coord! {
                x: current.min().x.min(rect.min().x),
                y: current.min().y.min(rect.min().y),
            },
            coord! {
                x: current.max().x.max(rect.max().x),
                y: current.max().y.max(rect.max().y),
            },
        ),
    }
}
