//! Reprojection de géométries avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

#[cfg(feature = "reproject")]
use anyhow::{Context, Result};
#[cfg(feature = "reproject")]
use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
#[cfg(feature = "reproject")]
use proj::Proj;

/// Reprojection de géométries entre deux systèmes de coordonnées
#[cfg(feature = "reproject")]
pub struct Reprojector {
    /// None quand source == cible
    proj: Option<Proj>,
    source: String,
    target: String,
}

#[cfg(feature = "reproject")]
impl Reprojector {
    /// Crée un reprojector entre deux CRS (`EPSG:2154`, `EPSG:4326`, ...)
    pub fn new(source: &str, target: &str) -> Result<Self> {
        let proj = if source == target {
            None
        } else {
            // Ordre d'axes "GIS" (x = longitude / easting) quel que soit le CRS
            let proj = Proj::new_known_crs(source, target, None).context(format!(
                "Failed to create projection from {} to {}",
                source, target
            ))?;
            Some(proj)
        };

        Ok(Self {
            proj,
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    /// CRS source
    pub fn source(&self) -> &str {
        &self.source
    }

    /// CRS cible
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        let Some(proj) = &self.proj else {
            return Ok(geom.clone());
        };

        match geom {
            Geometry::Point(p) => {
                let (x, y) = transform_coord(proj, p.0)?;
                Ok(Geometry::Point(Point::new(x, y)))
            }
            Geometry::Line(l) => {
                let (x1, y1) = transform_coord(proj, l.start)?;
                let (x2, y2) = transform_coord(proj, l.end)?;
                Ok(Geometry::Line(geo::Line::new(
                    Coord { x: x1, y: y1 },
                    Coord { x: x2, y: y2 },
                )))
            }
            Geometry::LineString(ls) => Ok(Geometry::LineString(transform_linestring(proj, ls)?)),
            Geometry::Polygon(p) => Ok(Geometry::Polygon(transform_polygon(proj, p)?)),
            Geometry::MultiPoint(mp) => {
                let points: Result<Vec<Point>> =
                    mp.0.iter()
                        .map(|p| {
                            let (x, y) = transform_coord(proj, p.0)?;
                            Ok(Point::new(x, y))
                        })
                        .collect();
                Ok(Geometry::MultiPoint(MultiPoint::new(points?)))
            }
            Geometry::MultiLineString(mls) => {
                let lines: Result<Vec<LineString>> = mls
                    .0
                    .iter()
                    .map(|ls| transform_linestring(proj, ls))
                    .collect();
                Ok(Geometry::MultiLineString(MultiLineString::new(lines?)))
            }
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>> =
                    mp.0.iter().map(|p| transform_polygon(proj, p)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            Geometry::GeometryCollection(gc) => {
                let members: Result<Vec<Geometry>> =
                    gc.0.iter().map(|g| self.transform_geometry(g)).collect();
                Ok(Geometry::GeometryCollection(GeometryCollection::new_from(
                    members?,
                )))
            }
            // Un rectangle ou triangle ne le reste pas après projection
            Geometry::Rect(r) => Ok(Geometry::Polygon(transform_polygon(proj, &r.to_polygon())?)),
            Geometry::Triangle(t) => {
                Ok(Geometry::Polygon(transform_polygon(proj, &t.to_polygon())?))
            }
        }
    }
}

#[cfg(feature = "reproject")]
fn transform_coord(proj: &Proj, coord: Coord) -> Result<(f64, f64)> {
    proj.convert((coord.x, coord.y))
        .context("Coordinate transformation failed")
}

/// Transforme une LineString (conversion batch)
#[cfg(feature = "reproject")]
fn transform_linestring(proj: &Proj, ls: &LineString) -> Result<LineString> {
    let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

    proj.convert_array(&mut coords)
        .context("Batch coordinate transformation failed")?;

    Ok(LineString::new(
        coords.into_iter().map(|(x, y)| Coord { x, y }).collect(),
    ))
}

#[cfg(feature = "reproject")]
fn transform_polygon(proj: &Proj, p: &Polygon) -> Result<Polygon> {
    let exterior = transform_linestring(proj, p.exterior())?;
    let interiors: Result<Vec<LineString>> = p
        .interiors()
        .iter()
        .map(|ls| transform_linestring(proj, ls))
        .collect();
    Ok(Polygon::new(exterior, interiors?))
}


// Implémentation factice quand le feature reproject est désactivé
#[cfg(not(feature = "reproject"))]
use anyhow::{bail, Result};
#[cfg(not(feature = "reproject"))]
use geo::Geometry;

/// Reprojector factice - pas de reprojection disponible
#[cfg(not(feature = "reproject"))]
pub struct Reprojector {
    source: String,
    target: String,
}

#[cfg(not(feature = "reproject"))]
impl Reprojector {
    /// Échoue sauf si source == cible
    pub fn new(source: &str, target: &str) -> Result<Self> {
        if source == target {
            Ok(Self {
                source: source.to_string(),
                target: target.to_string(),
            })
        } else {
            bail!(
                "Reprojection from {} to {} requires the 'reproject' feature. \
                 Build with: cargo build --features reproject",
                source,
                target
            )
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Retourne la géométrie inchangée
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry> {
        Ok(geom.clone())
    }
}
