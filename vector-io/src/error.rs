//! Types d'erreurs pour le crate vector-io

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un fichier vecteur
#[derive(Debug, Error)]
pub enum VectorIoError {
    /// Erreur d'I/O lors de la lecture du fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Extension absente de la liste des formats supportés
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Document GeoJSON illisible
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Shapefile (.shp/.shx/.dbf) illisible
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// Base GeoPackage illisible ou requête SQLite en échec
    #[error("GeoPackage error: {0}")]
    GeoPackage(#[from] rusqlite::Error),

    /// Aucune table de features dans le GeoPackage
    #[error("No feature layer found in {0}")]
    MissingLayer(String),

    /// Géométrie impossible à convertir en type `geo`
    #[error("Invalid geometry for feature {index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },
}

impl VectorIoError {
    /// Crée une erreur de géométrie avec l'index de la feature
    pub fn invalid_geometry(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            index,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de format non supporté
    pub fn unsupported(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat(extension.into())
    }
}
