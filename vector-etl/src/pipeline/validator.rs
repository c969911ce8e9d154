//! Validation des fichiers d'entrée et des géométries

use std::path::Path;

use geo::Validation;
use serde::Serialize;
use tracing::{debug, warn};
use vector_io::{FeatureCollection, VectorFormat, VectorIoError};

/// Métadonnées extraites d'un fichier lisible
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationMetadata {
    /// Nombre de features lues
    pub feature_count: usize,

    /// Types de géométrie distincts, dans l'ordre de première apparition
    pub geometry_types: Vec<String>,

    /// CRS déclaré par la source
    pub crs: Option<String>,

    /// Format détecté
    pub format: Option<VectorFormat>,
}

/// Résultat de la validation d'un fichier
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: ValidationMetadata,
}

impl ValidationResult {
    fn failed(error: String) -> Self {
        Self {
            is_valid: false,
            errors: vec![error],
            ..Default::default()
        }
    }
}

/// Statistiques de validité des géométries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeometryReport {
    pub total_features: usize,
    pub invalid_count: usize,
    /// 0 pour une collection vide
    pub invalid_percentage: f64,
    /// Index (base 0) des features invalides
    pub invalid_indices: Vec<usize>,
}

/// Validation des données vecteur
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorValidator;

impl VectorValidator {
    pub fn new() -> Self {
        Self
    }

    /// Vérifie existence, format et lisibilité d'un fichier.
    ///
    /// Les échecs sont rapportés dans `errors`, jamais propagés.
    pub fn validate_file(&self, path: &Path) -> ValidationResult {
        self.validate_and_read(path).0
    }

    /// Comme `validate_file`, en conservant les features lues
    pub fn validate_and_read(&self, path: &Path) -> (ValidationResult, Option<FeatureCollection>) {
        if !path.exists() {
            return (
                ValidationResult::failed(format!("File not found: {}", path.display())),
                None,
            );
        }

        if let Err(e) = vector_io::detect_format(path) {
            return (ValidationResult::failed(e.to_string()), None);
        }

        let outcome = match vector_io::read(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Read failed");
                return (
                    ValidationResult::failed(format!("Cannot read file: {}", read_error_detail(&e))),
                    None,
                );
            }
        };

        let mut warnings = Vec::new();
        if outcome.skipped > 0 {
            let message = format!("Skipped {} features without geometry", outcome.skipped);
            warn!(path = %path.display(), skipped = outcome.skipped, "{}", message);
            warnings.push(message);
        }
        if outcome.collection.crs.is_none() {
            warnings.push("No CRS defined in source".to_string());
        }

        let collection = outcome.collection;
        let metadata = ValidationMetadata {
            feature_count: collection.len(),
            geometry_types: collection.geometry_types(),
            crs: self.detect_crs(&collection),
            format: Some(outcome.format),
        };

        let result = ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings,
            metadata,
        };

        (result, Some(collection))
    }

    /// Compte les géométries qui échouent au prédicat de validité
    pub fn check_geometry_validity(&self, collection: &FeatureCollection) -> GeometryReport {
        let invalid_indices: Vec<usize> = collection
            .geometries()
            .enumerate()
            .filter(|(_, geom)| !geom.is_valid())
            .map(|(i, _)| i)
            .collect();

        let total_features = collection.len();
        let invalid_count = invalid_indices.len();
        let invalid_percentage = if total_features > 0 {
            invalid_count as f64 / total_features as f64 * 100.0
        } else {
            0.0
        };

        GeometryReport {
            total_features,
            invalid_count,
            invalid_percentage,
            invalid_indices,
        }
    }

    /// Libellé du CRS, `None` si absent
    pub fn detect_crs(&self, collection: &FeatureCollection) -> Option<String> {
        collection.crs.as_ref().map(|crs| crs.to_string())
    }
}

/// Message sans le préfixe de catégorie pour les erreurs I/O
fn read_error_detail(error: &VectorIoError) -> String {
    match error {
        VectorIoError::Io(e) => e.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, LineString, Point, Polygon};
    use vector_io::Crs;

    fn bowtie() -> Geometry {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        ))
    }

    fn square() -> Geometry {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]),
            vec![],
        ))
    }

    #[test]
    fn test_file_not_found() {
        let result = VectorValidator::new().validate_file(Path::new("/nonexistent/parcels.shp"));

        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["File not found: /nonexistent/parcels.shp"]);
    }

    #[test]
    fn test_unsupported_format() {
        let path = std::env::temp_dir().join(format!("vector_etl_{}.csv", std::process::id()));
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let result = VectorValidator::new().validate_file(&path);

        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Unsupported format: .csv"]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_unreadable_file() {
        let path = std::env::temp_dir().join(format!("vector_etl_{}_bad.geojson", std::process::id()));
        std::fs::write(&path, "{ this is not json").unwrap();

        let result = VectorValidator::new().validate_file(&path);

        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Cannot read file: "));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_valid_file_metadata() {
        let path = std::env::temp_dir().join(format!("vector_etl_{}_ok.geojson", std::process::id()));
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {}},
                {"type": "Feature", "geometry": null, "properties": {}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [3, 4]}, "properties": {}}
            ]}"#,
        )
        .unwrap();

        let (result, collection) = VectorValidator::new().validate_and_read(&path);

        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.metadata.feature_count, 2);
        assert_eq!(result.metadata.geometry_types, vec!["Point"]);
        assert_eq!(result.metadata.crs.as_deref(), Some("EPSG:4326"));
        assert_eq!(result.metadata.format, Some(VectorFormat::GeoJson));
        assert_eq!(collection.map(|c| c.len()), Some(2));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_bowtie_is_invalid() {
        let collection = FeatureCollection::from_geometries(vec![square(), bowtie()], None);

        let report = VectorValidator::new().check_geometry_validity(&collection);

        assert_eq!(report.total_features, 2);
        assert_eq!(report.invalid_count, 1);
        assert_eq!(report.invalid_indices, vec![1]);
        assert!((report.invalid_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_collection_zero_percent() {
        let report = VectorValidator::new().check_geometry_validity(&FeatureCollection::new(None));

        assert_eq!(report.total_features, 0);
        assert_eq!(report.invalid_count, 0);
        assert_eq!(report.invalid_percentage, 0.0);
    }

    #[test]
    fn test_detect_crs() {
        let validator = VectorValidator::new();
        let points = vec![Geometry::Point(Point::new(0.0, 0.0))];

        let with_crs = FeatureCollection::from_geometries(points.clone(), Some(Crs::from_epsg(2154)));
        assert_eq!(validator.detect_crs(&with_crs).as_deref(), Some("EPSG:2154"));

        let without = FeatureCollection::from_geometries(points, None);
        assert_eq!(validator.detect_crs(&without), None);
    }
}
