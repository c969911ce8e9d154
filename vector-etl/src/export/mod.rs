//! Modules d'export (GeoJSON, PostgreSQL) et reprojection

pub mod geojson;
pub mod pool;
pub mod postgres;
pub mod reproject;

pub use postgres::{IfExists, LoadResult, PostgisLoader};
pub use reproject::Reprojector;
