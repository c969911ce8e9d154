//! Réparation des géométries invalides ("make valid")
//!
//! Les surfaces passent par le moteur d'overlay de `geo` (union avec un
//! multipolygone vide), qui découpe les auto-intersections en polygones
//! valides. Si le résultat reste invalide, on se rabat sur l'enveloppe
//! convexe, puis sur une ligne ou un point pour les surfaces dégénérées.

use geo::{
    Area, BooleanOps, ConvexHull, Coord, CoordsIter, Geometry, GeometryCollection, LineString,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Validation,
};
use tracing::{debug, warn};

/// Vrai si toutes les coordonnées sont finies
pub fn has_finite_coords(geom: &Geometry) -> bool {
    geom.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Produit une version valide d'une géométrie.
///
/// Retourne `None` si la géométrie ne peut pas être réparée (coordonnées
/// NaN/infinies, ou aucune géométrie valide ne peut en être tirée).
pub fn make_valid(geom: &Geometry) -> Option<Geometry> {
    if !has_finite_coords(geom) {
        return None;
    }

    let repaired = match geom {
        Geometry::Polygon(p) => repair_areal(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => repair_areal(mp.clone()),
        Geometry::Rect(r) => repair_areal(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => repair_areal(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::Line(l) => {
            if l.start == l.end {
                Geometry::Point(Point::from(l.start))
            } else {
                geom.clone()
            }
        }
        Geometry::LineString(ls) => repair_linestring(ls)?,
        Geometry::MultiLineString(mls) => {
            let parts: Vec<LineString> = mls
                .0
                .iter()
                .filter(|ls| distinct_coords(ls.coords_iter()).len() >= 2)
                .cloned()
                .collect();
            Geometry::MultiLineString(MultiLineString::new(parts))
        }
        Geometry::GeometryCollection(gc) => {
            let mut members = Vec::with_capacity(gc.0.len());
            for member in &gc.0 {
                if member.is_valid() {
                    members.push(member.clone());
                } else {
                    members.push(make_valid(member)?);
                }
            }
            Geometry::GeometryCollection(GeometryCollection::new_from(members))
        }
        // Points et multipoints finis sont toujours valides
        Geometry::Point(_) | Geometry::MultiPoint(_) => geom.clone(),
    };

    if repaired.is_valid() {
        Some(repaired)
    } else {
        debug!(geometry = ?repaired, "Repair did not produce a valid geometry");
        None
    }
}

/// Ligne dont tous les sommets sont confondus -> point
fn repair_linestring(ls: &LineString) -> Option<Geometry> {
    let distinct = distinct_coords(ls.coords_iter());
    match distinct.len() {
        0 => None,
        1 => Some(Geometry::Point(Point::from(distinct[0]))),
        _ => Some(Geometry::LineString(ls.clone())),
    }
}

fn repair_areal(input: MultiPolygon) -> Geometry {
    let rebuilt = input.union(&MultiPolygon::new(vec![]));

    if !rebuilt.0.is_empty() {
        let candidate = if rebuilt.0.len() == 1 {
            Geometry::Polygon(rebuilt.0[0].clone())
        } else {
            Geometry::MultiPolygon(rebuilt)
        };
        if candidate.is_valid() {
            return candidate;
        }
    }

    let coords = distinct_coords(input.coords_iter());
    if coords.len() >= 3 {
        let hull: Polygon = MultiPoint::from(coords.clone()).convex_hull();
        if hull.unsigned_area() > 0.0 {
            warn!(
                points = coords.len(),
                "Overlay repair failed, using convex hull"
            );
            return Geometry::Polygon(hull);
        }
    }

    collapse(coords)
}

/// Surface d'aire nulle -> segment entre les extrémités, ou point
fn collapse(mut coords: Vec<Coord>) -> Geometry {
    coords.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));
    match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if first != last => {
            Geometry::LineString(LineString::new(vec![*first, *last]))
        }
        (Some(first), _) => Geometry::Point(Point::from(*first)),
        _ => Geometry::MultiPolygon(MultiPolygon::new(vec![])),
    }
}

/// Coordonnées distinctes dans l'ordre de première apparition
fn distinct_coords(coords: impl Iterator<Item = Coord>) -> Vec<Coord> {
    let mut distinct: Vec<Coord> = Vec::new();
    for c in coords {
        if !distinct.contains(&c) {
            distinct.push(c);
        }
    }
    distinct
}
