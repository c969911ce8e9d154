//! Export d'une collection nettoyée en GeoJSON (géométries streamées avec geozero)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use vector_io::{Crs, Feature, FeatureCollection};

/// Écrit la collection dans un fichier GeoJSON, membre `crs` inclus
pub fn export_to_geojson(collection: &FeatureCollection, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    write_collection(&mut writer, collection)?;
    writer.flush()?;

    Ok(())
}

/// Écrit une FeatureCollection dans un flux
pub fn write_collection<W: Write>(writer: &mut W, collection: &FeatureCollection) -> Result<()> {
    write!(writer, r#"{{"type":"FeatureCollection","#)?;
    if let Some(crs) = &collection.crs {
        write!(
            writer,
            r#""crs":{{"type":"name","properties":{{"name":{}}}}},"#,
            serde_json::to_string(&crs_urn(crs))?
        )?;
    }
    write!(writer, r#""features":["#)?;

    for (i, feature) in collection.features.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, feature)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

/// Écrit une feature: géométrie via geozero, attributs via serde_json
fn write_feature<W: Write>(writer: &mut W, feature: &Feature) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;

    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    feature
        .geometry
        .process_geom(&mut geom_writer)
        .context("Failed to encode geometry to GeoJSON")?;
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &feature.properties)?;
    write!(writer, "}}")?;

    Ok(())
}

/// `EPSG:2154` -> `urn:ogc:def:crs:EPSG::2154`
fn crs_urn(crs: &Crs) -> String {
    match crs.epsg() {
        Some(code) => format!("urn:ogc:def:crs:EPSG::{}", code),
        None => crs.to_string(),
    }
}
