//! Tests du pipeline complet sans base de données
//!
//! lecture -> validation -> réparation -> CRS -> doublons -> export GeoJSON

use std::path::PathBuf;

use geo::{Geometry, Validation};
use vector_etl::export::geojson::export_to_geojson;
use vector_etl::{GeometryCleaner, VectorValidator};
use vector_io::{Crs, VectorFormat};

const SAMPLE: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "bowtie", "area": 1.5},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,2],[2,0],[0,2],[0,0]]]}},
    {"type": "Feature", "properties": {"name": "well", "depth": 12},
     "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}},
    {"type": "Feature", "properties": {"name": "well copy", "depth": 12},
     "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}},
    {"type": "Feature", "properties": {"name": "road"},
     "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1],[2,1]]}},
    {"type": "Feature", "properties": {"name": "nowhere"}, "geometry": null}
  ]
}"#;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vector_etl_{}_{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_full_pipeline_without_database() {
    let dir = temp_dir("pipeline");
    let input = dir.join("sample.geojson");
    std::fs::write(&input, SAMPLE).unwrap();

    let validator = VectorValidator::new();
    let (validation, collection) = validator.validate_and_read(&input);
    assert!(validation.is_valid, "{:?}", validation.errors);
    assert_eq!(validation.metadata.feature_count, 4);
    assert_eq!(validation.metadata.format, Some(VectorFormat::GeoJson));
    // Sans membre `crs`, un GeoJSON est en WGS84
    assert_eq!(validation.metadata.crs.as_deref(), Some("EPSG:4326"));
    assert_eq!(
        validation.warnings,
        vec!["Skipped 1 features without geometry".to_string()]
    );

    let collection = collection.unwrap();
    let report = validator.check_geometry_validity(&collection);
    assert_eq!(report.invalid_count, 1);
    assert_eq!(report.invalid_indices, vec![0]);
    assert!((report.invalid_percentage - 25.0).abs() < 1e-9);

    let cleaner = GeometryCleaner::new();
    let fixed = cleaner.fix_invalid_geometries(collection);
    assert_eq!(fixed.fixed_count, 1);
    assert!(fixed.collection.geometries().all(|g| g.is_valid()));

    let normalized = cleaner
        .normalize_crs(fixed.collection, "EPSG:4326")
        .unwrap();
    assert!(!normalized.reprojected);
    assert_eq!(
        normalized.cleaning_log,
        vec!["Already in target CRS: EPSG:4326".to_string()]
    );
    assert_eq!(normalized.collection.crs, Some(Crs::wgs84()));

    let deduped = cleaner.remove_duplicates(normalized.collection);
    assert_eq!(deduped.removed_count, 1);
    assert_eq!(deduped.collection.len(), 3);
    // La première occurrence est conservée
    assert_eq!(
        deduped.collection.features[1].properties.get("name"),
        Some(&serde_json::Value::String("well".into()))
    );

    let output = dir.join("clean.geojson");
    export_to_geojson(&deduped.collection, &output).unwrap();

    let outcome = vector_io::read(&output).unwrap();
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.collection.len(), 3);
    assert_eq!(outcome.collection.crs, Some(Crs::wgs84()));
    assert!(matches!(
        outcome.collection.features[0].geometry,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_)
    ));
    assert_eq!(
        outcome.collection.features[2].properties.get("name"),
        Some(&serde_json::Value::String("road".into()))
    );

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_validation_rejects_unsupported_and_missing_files() {
    let dir = temp_dir("rejects");
    let csv = dir.join("points.csv");
    std::fs::write(&csv, "x,y\n1,2\n").unwrap();

    let validator = VectorValidator::new();

    let result = validator.validate_file(&csv);
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["Unsupported format: .csv".to_string()]);

    let missing = dir.join("missing.shp");
    let result = validator.validate_file(&missing);
    assert!(!result.is_valid);
    assert!(result.errors[0].starts_with("File not found:"));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_corrupt_geojson_cannot_be_read() {
    let dir = temp_dir("corrupt");
    let input = dir.join("broken.geojson");
    std::fs::write(&input, "{\"type\": \"FeatureCollection\", \"features\": [").unwrap();

    let result = VectorValidator::new().validate_file(&input);
    assert!(!result.is_valid);
    assert!(result.errors[0].starts_with("Cannot read file:"));

    std::fs::remove_dir_all(dir).ok();
}

#[cfg(feature = "reproject")]
#[test]
fn test_pipeline_reprojects_lambert93() {
    let dir = temp_dir("lambert");
    let input = dir.join("mairie.geojson");
    std::fs::write(
        &input,
        r#"{"type":"FeatureCollection",
            "crs":{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::2154"}},
            "features":[{"type":"Feature","properties":{"name":"Mairie"},
              "geometry":{"type":"Point","coordinates":[652469.0,6862035.0]}}]}"#,
    )
    .unwrap();

    let (validation, collection) = VectorValidator::new().validate_and_read(&input);
    assert_eq!(validation.metadata.crs.as_deref(), Some("EPSG:2154"));

    let result = GeometryCleaner::new()
        .normalize_crs(collection.unwrap(), "EPSG:4326")
        .unwrap();
    assert!(result.reprojected);

    match &result.collection.features[0].geometry {
        Geometry::Point(p) => {
            // Paris, environ 2.35 E / 48.86 N
            assert!((p.x() - 2.35).abs() < 0.05, "lon = {}", p.x());
            assert!((p.y() - 48.86).abs() < 0.05, "lat = {}", p.y());
        }
        other => panic!("unexpected geometry {:?}", other),
    }

    std::fs::remove_dir_all(dir).ok();
}
