//! Détection du CRS depuis un fichier .prj (WKT ESRI / OGC)

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::types::Crs;

fn authority_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:AUTHORITY|ID)\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#)
            .expect("static regex is valid")
    })
}

/// Lit le `.prj` voisin d'un `.shp`, si présent
pub fn read_sidecar(shp_path: &Path) -> Option<Crs> {
    let prj_path = shp_path.with_extension("prj");
    if !prj_path.exists() {
        debug!(path = %shp_path.display(), "No .prj sidecar, CRS unknown");
        return None;
    }

    match std::fs::read_to_string(&prj_path) {
        Ok(wkt) => {
            let crs = parse_wkt(&wkt);
            if crs.is_none() {
                warn!(path = %prj_path.display(), "Unrecognized CRS definition in .prj");
            }
            crs
        }
        Err(e) => {
            warn!(path = %prj_path.display(), error = %e, "Failed to read .prj");
            None
        }
    }
}

/// Extrait un CRS d'une définition WKT.
///
/// L'autorité du CRS englobant est la dernière du texte (WKT1 place
/// `AUTHORITY` en fin de bloc). Les .prj ESRI n'en ont souvent pas:
/// on reconnaît alors WGS 84 et Web Mercator par leur nom.
pub fn parse_wkt(wkt: &str) -> Option<Crs> {
    if let Some(code) = authority_regex()
        .captures_iter(wkt)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return Some(Crs::from_epsg(code));
    }

    let upper = wkt.trim().to_ascii_uppercase();
    if upper.contains("WEB_MERCATOR") || upper.contains("PSEUDO-MERCATOR") {
        return Some(Crs::from_epsg(3857));
    }
    let geographic = upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS");
    if geographic && (upper.contains("WGS_1984") || upper.contains("WGS 84")) {
        return Some(Crs::wgs84());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ogc_wkt_with_authority() {
        let wkt = r#"PROJCS["RGF93 / Lambert-93",GEOGCS["RGF93",DATUM["Reseau_Geodesique_Francais_1993",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6171"]],AUTHORITY["EPSG","4171"]],PROJECTION["Lambert_Conformal_Conic_2SP"],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","2154"]]"#;
        assert_eq!(parse_wkt(wkt), Some(Crs::from_epsg(2154)));
    }

    #[test]
    fn test_esri_wgs84() {
        let wkt = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(parse_wkt(wkt), Some(Crs::wgs84()));
    }

    #[test]
    fn test_esri_web_mercator() {
        let wkt = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Mercator_Auxiliary_Sphere"]]"#;
        assert_eq!(parse_wkt(wkt), Some(Crs::from_epsg(3857)));
    }

    #[test]
    fn test_unknown_projection() {
        let wkt = r#"PROJCS["Custom",GEOGCS["GCS_Unknown"],PROJECTION["Transverse_Mercator"]]"#;
        assert_eq!(parse_wkt(wkt), None);
    }
}
