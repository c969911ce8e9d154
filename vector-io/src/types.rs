//! Types de données pour le crate vector-io

use std::fmt;
use std::path::Path;

use geo::Geometry;
use serde::{Deserialize, Serialize};

/// Attributs d'une feature (clé -> valeur JSON)
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Formats de fichiers acceptés en entrée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VectorFormat {
    /// ESRI Shapefile (.shp + .shx + .dbf, .prj optionnel)
    Shapefile,
    /// GeoJSON (RFC 7946, membre `crs` historique toléré)
    GeoJson,
    /// GeoPackage (base SQLite OGC)
    GeoPackage,
}

impl VectorFormat {
    /// Extensions acceptées, dans l'ordre de la liste blanche
    pub const SUPPORTED_EXTENSIONS: [&'static str; 3] = [".shp", ".geojson", ".gpkg"];

    /// Détermine le format depuis l'extension (insensible à la casse)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "shp" => Some(Self::Shapefile),
            "geojson" => Some(Self::GeoJson),
            "gpkg" => Some(Self::GeoPackage),
            _ => None,
        }
    }

    /// Extension canonique, point inclus
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Shapefile => ".shp",
            Self::GeoJson => ".geojson",
            Self::GeoPackage => ".gpkg",
        }
    }
}

impl fmt::Display for VectorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shapefile => "ESRI Shapefile",
            Self::GeoJson => "GeoJSON",
            Self::GeoPackage => "GPKG",
        };
        f.write_str(name)
    }
}

/// Système de coordonnées de référence, sous forme de libellé (`EPSG:4326`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(String);

impl Crs {
    /// WGS84 longitude/latitude, CRS par défaut
    pub const DEFAULT_LABEL: &'static str = "EPSG:4326";

    /// Construit un CRS depuis un libellé libre.
    ///
    /// Les codes d'autorité EPSG sont normalisés (`epsg:2154` -> `EPSG:2154`).
    pub fn new(label: impl AsRef<str>) -> Self {
        let label = label.as_ref().trim();
        match label.split_once(':') {
            Some((authority, code)) if authority.eq_ignore_ascii_case("epsg") => {
                Self(format!("EPSG:{}", code.trim()))
            }
            _ => Self(label.to_string()),
        }
    }

    /// Construit un CRS depuis un code EPSG
    pub fn from_epsg(code: u32) -> Self {
        Self(format!("EPSG:{}", code))
    }

    /// CRS géographique WGS84
    pub fn wgs84() -> Self {
        Self(Self::DEFAULT_LABEL.to_string())
    }

    /// Code EPSG si le libellé est de la forme `EPSG:<code>`
    pub fn epsg(&self) -> Option<u32> {
        self.0.strip_prefix("EPSG:")?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Une feature avec sa géométrie et ses attributs
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Géométrie (toujours présente, les features sans géométrie sont écartées à la lecture)
    pub geometry: Geometry,

    /// Attributs de la feature
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }
}

/// Collection ordonnée de features partageant un CRS
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    /// Features dans l'ordre du fichier source
    pub features: Vec<Feature>,

    /// Colonnes attributaires, dans l'ordre de première apparition
    pub columns: Vec<String>,

    /// CRS de la colonne géométrie (None si inconnu)
    pub crs: Option<Crs>,
}

impl FeatureCollection {
    pub fn new(crs: Option<Crs>) -> Self {
        Self {
            features: Vec::new(),
            columns: Vec::new(),
            crs,
        }
    }

    /// Construit une collection depuis des géométries sans attributs
    pub fn from_geometries(geometries: impl IntoIterator<Item = Geometry>, crs: Option<Crs>) -> Self {
        let mut collection = Self::new(crs);
        for geometry in geometries {
            collection.push(Feature::new(geometry, Properties::new()));
        }
        collection
    }

    /// Ajoute une feature et enregistre ses nouvelles colonnes
    pub fn push(&mut self, feature: Feature) {
        for key in feature.properties.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn geometries(&self) -> impl Iterator<Item = &Geometry> {
        self.features.iter().map(|f| &f.geometry)
    }

    /// Types de géométrie distincts, dans l'ordre de première apparition
    pub fn geometry_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for geometry in self.geometries() {
            let name = geometry_type_name(geometry);
            if !types.iter().any(|t| t == name) {
                types.push(name.to_string());
            }
        }
        types
    }
}

/// Résultat de la lecture d'un fichier
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// Features lues
    pub collection: FeatureCollection,

    /// Format détecté
    pub format: VectorFormat,

    /// Nombre de features écartées faute de géométrie
    pub skipped: usize,
}

/// Nom OGC du type de géométrie
pub fn geometry_type_name(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "LineString",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Polygon",
        Geometry::Triangle(_) => "Polygon",
    }
}
