//! Lecteurs par format

pub mod gpkg;
pub mod json;
pub mod prj;
pub mod shp;

use std::path::Path;

use crate::types::{FeatureCollection, VectorFormat};
use crate::VectorIoError;

/// Lit un fichier dans le format indiqué.
///
/// Retourne la collection et le nombre de features écartées faute de géométrie.
pub fn read_as(
    path: &Path,
    format: VectorFormat,
) -> Result<(FeatureCollection, usize), VectorIoError> {
    match format {
        VectorFormat::GeoJson => json::read(path),
        VectorFormat::Shapefile => shp::read(path),
        VectorFormat::GeoPackage => gpkg::read(path),
    }
}
