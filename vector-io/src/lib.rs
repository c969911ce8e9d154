//! # vector-io
//!
//! Lecture de fichiers vecteurs (Shapefile, GeoJSON, GeoPackage) vers les types `geo`.
//!
//! ## Formats
//!
//! - `.shp`: géométries + table DBF, CRS depuis le `.prj`
//! - `.geojson`: FeatureCollection / Feature / géométrie, CRS WGS84 par défaut
//! - `.gpkg`: première table de features déclarée dans `gpkg_contents`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vector_io::read;
//! use std::path::Path;
//!
//! let outcome = read(Path::new("parcels.geojson"))?;
//! println!("{} features ({})", outcome.collection.len(), outcome.format);
//! ```

pub mod error;
pub mod reader;
pub mod types;

pub use error::VectorIoError;
pub use types::{
    geometry_type_name, Crs, Feature, FeatureCollection, Properties, ReadOutcome, VectorFormat,
};

use std::path::Path;

/// Détermine le format d'un fichier depuis son extension.
///
/// L'erreur porte l'extension fautive (`(none)` si absente).
pub fn detect_format(path: &Path) -> Result<VectorFormat, VectorIoError> {
    VectorFormat::from_path(path).ok_or_else(|| {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| "(none)".to_string());
        VectorIoError::unsupported(ext)
    })
}

/// Lit un fichier vecteur complet en mémoire
pub fn read(path: &Path) -> Result<ReadOutcome, VectorIoError> {
    let format = detect_format(path)?;
    let (collection, skipped) = reader::read_as(path, format)?;

    Ok(ReadOutcome {
        collection,
        format,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format(Path::new("a.GeoJSON")).unwrap(),
            VectorFormat::GeoJson
        );

        let err = detect_format(Path::new("data.csv")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported format: .csv");

        let err = detect_format(Path::new("README")).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported format: (none)");
    }

    #[test]
    fn test_read_unsupported_before_io() {
        // Le format est vérifié avant toute lecture disque
        let err = read(Path::new("/nonexistent/data.kml")).unwrap_err();
        assert!(matches!(err, VectorIoError::UnsupportedFormat(_)));
    }
}
