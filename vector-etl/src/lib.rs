//! # vector-etl
//!
//! Pipeline de préparation de données vectorielles vers PostGIS.
//!
//! ## Étapes
//!
//! - Validation du fichier source (Shapefile, GeoJSON, GeoPackage)
//! - Réparation des géométries invalides
//! - Reprojection vers le CRS cible
//! - Suppression des doublons géométriques
//! - Chargement PostGIS par lots COPY et index spatial
//!
//! ## Usage CLI
//!
//! ```bash
//! # Pipeline complet
//! vector-etl process ./data/roads.shp --output-table roads --target-crs EPSG:2154
//!
//! # Sans base de données
//! vector-etl process ./data/roads.geojson --dry-run --output-geojson ./clean.geojson
//!
//! # Validation seule
//! vector-etl validate ./data/parcels.gpkg
//! ```

pub mod config;
pub mod export;
pub mod pipeline;
pub mod report;

pub use config::EtlConfig;
pub use export::pool::{create_pool, DatabaseConfig};
pub use pipeline::{CleaningResult, GeometryCleaner, ValidationResult, VectorValidator};
pub use report::{PipelineReport, PipelineStatus};
