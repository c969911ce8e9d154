//! Lecture Shapefile (.shp + .dbf, CRS depuis le .prj)

use std::path::Path;

use geo::Geometry;
use serde_json::Value;
use shapefile::dbase::{self, FieldValue, Record};
use shapefile::{Shape, ShapeReader};
use tracing::debug;

use crate::reader::prj;
use crate::types::{Feature, FeatureCollection, Properties};
use crate::VectorIoError;

/// Lit un shapefile et sa table attributaire
pub fn read(path: &Path) -> Result<(FeatureCollection, usize), VectorIoError> {
    let crs = prj::read_sidecar(path);

    let dbf_path = path.with_extension("dbf");
    if !dbf_path.exists() {
        return Err(shapefile::Error::MissingDbf.into());
    }
    let shape_reader = ShapeReader::from_path(path)?;
    let dbase_reader = dbase::Reader::from_path(&dbf_path).map_err(shapefile::Error::from)?;

    // Ordre déclaré dans l'en-tête DBF
    let field_names: Vec<String> = dbase_reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut reader = shapefile::Reader::new(shape_reader, dbase_reader);

    let mut collection = FeatureCollection::new(crs);
    let mut skipped = 0;

    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item?;

        if matches!(shape, Shape::NullShape) {
            skipped += 1;
            continue;
        }

        let geometry = Geometry::<f64>::try_from(shape)
            .map_err(|e| VectorIoError::invalid_geometry(index, e.to_string()))?;

        collection.push(Feature::new(
            geometry,
            record_to_properties(record, &field_names),
        ));
    }

    debug!(
        path = %path.display(),
        features = collection.len(),
        skipped = skipped,
        "Read shapefile"
    );

    Ok((collection, skipped))
}

/// Convertit un enregistrement DBF en attributs JSON, dans l'ordre des champs
/// de l'en-tête
fn record_to_properties(mut record: Record, field_names: &[String]) -> Properties {
    let mut properties = Properties::new();
    for name in field_names {
        if let Some(value) = record.remove(name) {
            properties.insert(name.clone(), field_to_json(value));
        }
    }
    properties
}

fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(s) => s.map(Value::String).unwrap_or(Value::Null),
        FieldValue::Memo(s) => Value::String(s),
        FieldValue::Numeric(n) => n.map(number).unwrap_or(Value::Null),
        FieldValue::Float(f) => f.map(|f| number(f as f64)).unwrap_or(Value::Null),
        FieldValue::Double(d) => number(d),
        FieldValue::Currency(c) => number(c),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Logical(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        FieldValue::Date(d) => d
            .map(|d| Value::String(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{:?}", other)),
    }
}

/// Nombre JSON; les entiers DBF (Numeric sans décimale) restent des entiers
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_conversion() {
        assert_eq!(
            field_to_json(FieldValue::Character(Some("abc".into()))),
            Value::String("abc".into())
        );
        assert_eq!(field_to_json(FieldValue::Character(None)), Value::Null);
        assert_eq!(field_to_json(FieldValue::Numeric(Some(42.0))), Value::from(42));
        assert_eq!(field_to_json(FieldValue::Numeric(Some(1.5))), Value::from(1.5));
        assert_eq!(field_to_json(FieldValue::Logical(Some(true))), Value::Bool(true));
        assert_eq!(field_to_json(FieldValue::Integer(7)), Value::from(7));
    }

    #[test]
    fn test_record_follows_header_order() {
        let mut record = Record::default();
        record.insert("zname".into(), FieldValue::Character(Some("Mairie".into())));
        record.insert("aval".into(), FieldValue::Numeric(Some(3.0)));

        let props = record_to_properties(record, &["zname".to_string(), "aval".to_string()]);
        let keys: Vec<&String> = props.keys().collect();

        assert_eq!(keys, vec!["zname", "aval"]);
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(number(f64::NAN), Value::Null);
    }

    #[test]
    fn test_missing_shapefile() {
        let path = std::env::temp_dir().join("vector_io_does_not_exist.shp");
        assert!(matches!(
            read(&path),
            Err(VectorIoError::Shapefile(shapefile::Error::MissingDbf))
        ));
    }
}
