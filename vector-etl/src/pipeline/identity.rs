//! Empreinte exacte d'une géométrie pour la détection de doublons
//!
//! Contrairement à une comparaison tolérante, l'empreinte porte sur les bits
//! des coordonnées: deux géométries ne partagent une empreinte que si elles
//! sont identiques sommet par sommet, dans le même ordre.

use blake3::Hasher;
use geo::{Coord, Geometry, LineString, Polygon};

/// Empreinte blake3 (32 octets) d'une géométrie
pub type GeometryKey = [u8; 32];

/// Calcule l'empreinte exacte d'une géométrie
pub fn geometry_key(geom: &Geometry) -> GeometryKey {
    let mut hasher = Hasher::new();
    hash_geometry(&mut hasher, geom);
    *hasher.finalize().as_bytes()
}

fn hash_geometry(hasher: &mut Hasher, geom: &Geometry) {
    match geom {
        Geometry::Point(p) => {
            hasher.update(b"POINT");
            hash_coord(hasher, p.0);
        }
        Geometry::Line(l) => {
            hasher.update(b"LINE");
            hash_coord(hasher, l.start);
            hash_coord(hasher, l.end);
        }
        Geometry::LineString(ls) => {
            hasher.update(b"LINESTRING");
            hash_line(hasher, ls);
        }
        Geometry::Polygon(p) => {
            hasher.update(b"POLYGON");
            hash_polygon(hasher, p);
        }
        Geometry::MultiPoint(mp) => {
            hasher.update(b"MULTIPOINT");
            hash_len(hasher, mp.0.len());
            for point in &mp.0 {
                hash_coord(hasher, point.0);
            }
        }
        Geometry::MultiLineString(mls) => {
            hasher.update(b"MULTILINESTRING");
            hash_len(hasher, mls.0.len());
            for ls in &mls.0 {
                hash_line(hasher, ls);
            }
        }
        Geometry::MultiPolygon(mp) => {
            hasher.update(b"MULTIPOLYGON");
            hash_len(hasher, mp.0.len());
            for poly in &mp.0 {
                hash_polygon(hasher, poly);
            }
        }
        Geometry::GeometryCollection(gc) => {
            hasher.update(b"GEOMETRYCOLLECTION");
            hash_len(hasher, gc.0.len());
            for member in &gc.0 {
                hash_geometry(hasher, member);
            }
        }
        Geometry::Rect(r) => {
            hasher.update(b"RECT");
            hash_coord(hasher, r.min());
            hash_coord(hasher, r.max());
        }
        Geometry::Triangle(t) => {
            hasher.update(b"TRIANGLE");
            hash_coord(hasher, t.0);
            hash_coord(hasher, t.1);
            hash_coord(hasher, t.2);
        }
    }
}

fn hash_polygon(hasher: &mut Hasher, poly: &Polygon) {
    hash_line(hasher, poly.exterior());
    hash_len(hasher, poly.interiors().len());
    for interior in poly.interiors() {
        hash_line(hasher, interior);
    }
}

/// Préfixe chaque séquence par sa longueur: `[a, b] + [c]` != `[a] + [b, c]`
fn hash_line(hasher: &mut Hasher, ls: &LineString) {
    hash_len(hasher, ls.0.len());
    for coord in &ls.0 {
        hash_coord(hasher, *coord);
    }
}

fn hash_len(hasher: &mut Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

/// Hash les bits des coordonnées (-0.0 et 0.0 sont confondus)
fn hash_coord(hasher: &mut Hasher, coord: Coord) {
    hasher.update(&canonical_bits(coord.x).to_le_bytes());
    hasher.update(&canonical_bits(coord.y).to_le_bytes());
}

fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}
