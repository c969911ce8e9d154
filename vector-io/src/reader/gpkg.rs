//! Lecture GeoPackage (première table de features)

use std::path::Path;

use geozero::wkb::GpkgWkb;
use geozero::ToGeo;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use crate::types::{Crs, Feature, FeatureCollection, Properties};
use crate::VectorIoError;

/// Table de features décrite par `gpkg_contents` / `gpkg_geometry_columns`
#[derive(Debug, Clone)]
struct Layer {
    table: String,
    geometry_column: String,
    srs_id: i64,
}

/// Lit la première couche de features d'un GeoPackage
pub fn read(path: &Path) -> Result<(FeatureCollection, usize), VectorIoError> {
    if !path.exists() {
        return Err(VectorIoError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let layer = first_feature_layer(&conn)?
        .ok_or_else(|| VectorIoError::MissingLayer(path.display().to_string()))?;
    let crs = layer_crs(&conn, layer.srs_id)?;
    let primary_keys = primary_key_columns(&conn, &layer.table)?;

    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(&layer.table)))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut collection = FeatureCollection::new(crs);
    let mut skipped = 0;
    let mut index = 0;

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut geometry = None;
        let mut properties = Properties::new();

        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i)?;
            if *name == layer.geometry_column {
                if let ValueRef::Blob(blob) = value {
                    let decoded = GpkgWkb(blob.to_vec())
                        .to_geo()
                        .map_err(|e| VectorIoError::invalid_geometry(index, e.to_string()))?;
                    geometry = Some(decoded);
                }
                continue;
            }
            if primary_keys.contains(name) {
                continue;
            }
            properties.insert(name.clone(), value_to_json(value));
        }

        match geometry {
            Some(geometry) => collection.push(Feature::new(geometry, properties)),
            None => skipped += 1,
        }
        index += 1;
    }

    debug!(
        path = %path.display(),
        table = layer.table.as_str(),
        features = collection.len(),
        skipped = skipped,
        "Read GeoPackage layer"
    );

    Ok((collection, skipped))
}

fn first_feature_layer(conn: &Connection) -> Result<Option<Layer>, VectorIoError> {
    let layer = conn
        .query_row(
            r#"
            SELECT c.table_name, g.column_name, g.srs_id
            FROM gpkg_contents c
            JOIN gpkg_geometry_columns g ON g.table_name = c.table_name
            WHERE c.data_type = 'features'
            ORDER BY c.table_name
            LIMIT 1
            "#,
            [],
            |row| {
                Ok(Layer {
                    table: row.get(0)?,
                    geometry_column: row.get(1)?,
                    srs_id: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(layer)
}

/// CRS de la couche; les srs_id 0 et -1 signifient "non défini"
fn layer_crs(conn: &Connection, srs_id: i64) -> Result<Option<Crs>, VectorIoError> {
    if srs_id <= 0 {
        return Ok(None);
    }

    let definition: Option<(String, i64)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            [srs_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(definition.map(|(organization, code)| {
        if organization.eq_ignore_ascii_case("epsg") {
            Crs::new(format!("EPSG:{}", code))
        } else {
            Crs::new(format!("{}:{}", organization.to_ascii_uppercase(), code))
        }
    }))
}

fn primary_key_columns(conn: &Connection, table: &str) -> Result<Vec<String>, VectorIoError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let mut keys = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let pk: i64 = row.get(5)?;
        if pk > 0 {
            keys.push(name);
        }
    }
    Ok(keys)
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        // Les BLOB attributaires ne sont pas chargés
        ValueRef::Blob(_) => Value::Null,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
