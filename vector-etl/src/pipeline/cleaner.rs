//! Nettoyage: réparation, normalisation du CRS, suppression des doublons
//!
//! Chaque étape consomme la collection et en rend une nouvelle dans un
//! `CleaningResult`, avec un journal lisible des opérations effectuées.

use std::collections::HashMap;

use anyhow::{Context, Result};
use geo::Validation;
use tracing::{debug, info, warn};
use vector_io::{Crs, FeatureCollection};

use crate::export::reproject::Reprojector;
use crate::pipeline::identity::{geometry_key, GeometryKey};
use crate::pipeline::repair::make_valid;

/// Résultat d'une étape de nettoyage
#[derive(Debug, Clone)]
pub struct CleaningResult {
    /// Collection nettoyée
    pub collection: FeatureCollection,
    /// Géométries remplacées par une version valide
    pub fixed_count: usize,
    /// Géométries invalides laissées telles quelles faute de réparation
    pub unrepairable_count: usize,
    /// Lignes supprimées (doublons)
    pub removed_count: usize,
    /// Vrai si les coordonnées ont été transformées
    pub reprojected: bool,
    /// Journal des opérations
    pub cleaning_log: Vec<String>,
}

impl CleaningResult {
    fn unchanged(collection: FeatureCollection) -> Self {
        Self {
            collection,
            fixed_count: 0,
            unrepairable_count: 0,
            removed_count: 0,
            reprojected: false,
            cleaning_log: Vec::new(),
        }
    }
}

/// Étapes de nettoyage des géométries
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryCleaner;

impl GeometryCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Remplace chaque géométrie invalide par sa version réparée
    pub fn fix_invalid_geometries(&self, mut collection: FeatureCollection) -> CleaningResult {
        let mut log = Vec::new();
        let mut fixed_count = 0;
        let mut unrepairable = Vec::new();

        let invalid: Vec<usize> = collection
            .geometries()
            .enumerate()
            .filter(|(_, g)| !g.is_valid())
            .map(|(i, _)| i)
            .collect();

        if invalid.is_empty() {
            log.push("No invalid geometries found, nothing to fix".to_string());
            let mut result = CleaningResult::unchanged(collection);
            result.cleaning_log = log;
            return result;
        }

        log.push(format!("Found {} invalid geometries", invalid.len()));

        for index in invalid {
            let feature = &mut collection.features[index];
            match make_valid(&feature.geometry) {
                Some(repaired) => {
                    feature.geometry = repaired;
                    fixed_count += 1;
                }
                None => {
                    warn!(index = index, "Geometry could not be repaired, keeping it as is");
                    unrepairable.push(index);
                }
            }
        }

        log.push(format!("Fixed {} geometries using make_valid", fixed_count));
        if !unrepairable.is_empty() {
            log.push(format!(
                "Could not repair {} geometries (rows {:?})",
                unrepairable.len(),
                unrepairable
            ));
        }

        info!(fixed = fixed_count, unrepairable = unrepairable.len(), "Geometry repair done");

        CleaningResult {
            collection,
            fixed_count,
            unrepairable_count: unrepairable.len(),
            removed_count: 0,
            reprojected: false,
            cleaning_log: log,
        }
    }

    /// Ramène la collection dans le CRS cible.
    ///
    /// Sans CRS source, `EPSG:4326` est supposé et attribué sans transformation.
    pub fn normalize_crs(
        &self,
        mut collection: FeatureCollection,
        target: &str,
    ) -> Result<CleaningResult> {
        let target = Crs::new(target);

        let Some(source) = collection.crs.clone() else {
            warn!("No CRS set, assuming {}", Crs::DEFAULT_LABEL);
            collection.crs = Some(Crs::wgs84());
            let mut result = CleaningResult::unchanged(collection);
            result
                .cleaning_log
                .push(format!("Warning: No CRS set, assuming {}", Crs::DEFAULT_LABEL));
            return Ok(result);
        };

        if source == target {
            let mut result = CleaningResult::unchanged(collection);
            result
                .cleaning_log
                .push(format!("Already in target CRS: {}", target));
            return Ok(result);
        }

        let reprojector = Reprojector::new(source.as_str(), target.as_str())?;
        for (index, feature) in collection.features.iter_mut().enumerate() {
            feature.geometry = reprojector
                .transform_geometry(&feature.geometry)
                .with_context(|| format!("Failed to reproject feature {}", index))?;
        }
        collection.crs = Some(target.clone());

        info!(
            from = reprojector.source(),
            to = reprojector.target(),
            features = collection.len(),
            "Reprojected"
        );

        let mut result = CleaningResult::unchanged(collection);
        result.reprojected = true;
        result
            .cleaning_log
            .push(format!(
                "Reprojected from {} to {}",
                reprojector.source(),
                reprojector.target()
            ));
        Ok(result)
    }

    /// Supprime les lignes dont la géométrie est identique à une ligne précédente
    pub fn remove_duplicates(&self, mut collection: FeatureCollection) -> CleaningResult {
        let original_count = collection.len();

        // Empreinte -> index des géométries conservées portant cette empreinte
        let mut seen: HashMap<GeometryKey, Vec<usize>> = HashMap::with_capacity(original_count);
        let mut kept: Vec<vector_io::Feature> = Vec::with_capacity(original_count);

        for feature in collection.features.drain(..) {
            let key = geometry_key(&feature.geometry);
            let candidates = seen.entry(key).or_default();
            // Égalité exacte derrière l'empreinte (NaN != NaN)
            let duplicate = candidates
                .iter()
                .any(|&i| kept[i].geometry == feature.geometry);
            if duplicate {
                continue;
            }
            candidates.push(kept.len());
            kept.push(feature);
        }

        collection.features = kept;
        let removed_count = original_count - collection.len();

        let message = if removed_count > 0 {
            format!("Removed {} duplicate geometries", removed_count)
        } else {
            "No duplicates found".to_string()
        };
        debug!(removed = removed_count, "Deduplication done");

        let mut result = CleaningResult::unchanged(collection);
        result.removed_count = removed_count;
        result.cleaning_log.push(message);
        result
    }
}
