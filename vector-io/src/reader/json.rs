//! Lecture GeoJSON

use std::path::Path;

use geo::Geometry;
use geojson::GeoJson;
use tracing::debug;

use crate::types::{Crs, Feature, FeatureCollection, Properties};
use crate::VectorIoError;

/// Lit un fichier GeoJSON (FeatureCollection, Feature ou géométrie seule)
pub fn read(path: &Path) -> Result<(FeatureCollection, usize), VectorIoError> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse un document GeoJSON depuis une chaîne
pub fn parse_str(content: &str) -> Result<(FeatureCollection, usize), VectorIoError> {
    let geojson: GeoJson = content.parse()?;

    let mut skipped = 0;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(crs_from_members)
                .unwrap_or_else(Crs::wgs84);
            let mut collection = FeatureCollection::new(Some(crs));

            for (index, feature) in fc.features.into_iter().enumerate() {
                let Some(geometry) = feature.geometry else {
                    skipped += 1;
                    continue;
                };
                let geometry = convert_geometry(index, geometry)?;
                let properties = feature.properties.unwrap_or_default();
                collection.push(Feature::new(geometry, properties));
            }
            collection
        }
        GeoJson::Feature(feature) => {
            let crs = feature
                .foreign_members
                .as_ref()
                .and_then(crs_from_members)
                .unwrap_or_else(Crs::wgs84);
            let mut collection = FeatureCollection::new(Some(crs));
            match feature.geometry {
                Some(geometry) => {
                    let geometry = convert_geometry(0, geometry)?;
                    collection.push(Feature::new(
                        geometry,
                        feature.properties.unwrap_or_default(),
                    ));
                }
                None => skipped += 1,
            }
            collection
        }
        GeoJson::Geometry(geometry) => {
            let geometry = convert_geometry(0, geometry)?;
            let mut collection = FeatureCollection::new(Some(Crs::wgs84()));
            collection.push(Feature::new(geometry, Properties::new()));
            collection
        }
    };

    debug!(
        features = collection.len(),
        skipped = skipped,
        crs = ?collection.crs,
        "Parsed GeoJSON document"
    );

    Ok((collection, skipped))
}

fn convert_geometry(index: usize, geometry: geojson::Geometry) -> Result<Geometry, VectorIoError> {
    Geometry::<f64>::try_from(geometry)
        .map_err(|e| VectorIoError::invalid_geometry(index, e.to_string()))
}

/// Extrait le CRS du membre `crs` (GeoJSON 2008, encore écrit par GDAL et QGIS)
fn crs_from_members(members: &Properties) -> Option<Crs> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    parse_crs_name(name)
}

/// Interprète un nom de CRS OGC.
///
/// - `urn:ogc:def:crs:EPSG::2154` / `urn:ogc:def:crs:EPSG:6.6:2154` -> `EPSG:2154`
/// - `urn:ogc:def:crs:OGC:1.3:CRS84` -> `EPSG:4326`
/// - `EPSG:3857` -> `EPSG:3857`
pub fn parse_crs_name(name: &str) -> Option<Crs> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if name.to_ascii_uppercase().ends_with("CRS84") {
        return Some(Crs::wgs84());
    }

    if name.to_ascii_uppercase().contains("EPSG") {
        let code = name.rsplit(':').next()?.trim();
        return code.parse::<u32>().ok().map(Crs::from_epsg);
    }

    Some(Crs::new(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs_name() {
        assert_eq!(
            parse_crs_name("urn:ogc:def:crs:EPSG::2154"),
            Some(Crs::from_epsg(2154))
        );
        assert_eq!(
            parse_crs_name("urn:ogc:def:crs:EPSG:6.6:32636"),
            Some(Crs::from_epsg(32636))
        );
        assert_eq!(
            parse_crs_name("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(Crs::wgs84())
        );
        assert_eq!(parse_crs_name("EPSG:3857"), Some(Crs::from_epsg(3857)));
        assert_eq!(parse_crs_name(""), None);
    }

    #[test]
    fn test_parse_feature_collection() {
        let doc = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2154"}},
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [652381.0, 6862047.0]},
                 "properties": {"name": "Paris", "pop": 2100000}},
                {"type": "Feature", "geometry": null, "properties": {"name": "Nowhere"}},
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                 "properties": {"name": "Road", "lanes": 2}}
            ]
        }"#;

        let (collection, skipped) = parse_str(doc).unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(collection.crs, Some(Crs::from_epsg(2154)));
        assert_eq!(collection.columns, vec!["name", "pop", "lanes"]);
        assert_eq!(collection.geometry_types(), vec!["Point", "LineString"]);
    }

    #[test]
    fn test_default_crs_is_wgs84() {
        let doc = r#"{"type": "FeatureCollection", "features": []}"#;
        let (collection, skipped) = parse_str(doc).unwrap();

        assert!(collection.is_empty());
        assert_eq!(skipped, 0);
        assert_eq!(collection.crs, Some(Crs::wgs84()));
    }

    #[test]
    fn test_bare_geometry() {
        let doc = r#"{"type": "Polygon", "coordinates": [[[0, 0], [2, 2], [2, 0], [0, 2], [0, 0]]]}"#;
        let (collection, _) = parse_str(doc).unwrap();

        assert_eq!(collection.len(), 1);
        assert!(collection.columns.is_empty());
    }

    #[test]
    fn test_invalid_document() {
        assert!(parse_str("not geojson at all").is_err());
    }
}
