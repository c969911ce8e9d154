//! Rapport d'exécution du pipeline
//!
//! Collecte les compteurs de chaque étape pour l'affichage final et la
//! sauvegarde JSON (`--report-json`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStatus {
    /// Pipeline complet, données chargées
    Success,
    /// Pipeline complet sans chargement (`--dry-run`)
    DryRun,
    /// Arrêt après la validation (`--validate-only`)
    ValidateOnly,
    /// Échec (validation, reprojection ou chargement)
    Failed,
}

/// Durée d'une étape
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub duration_secs: f64,
}

/// Rapport complet d'une exécution de `process`
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Fichier d'entrée
    pub input_file: PathBuf,
    /// Table cible
    pub table: String,
    /// Statut global
    pub status: PipelineStatus,
    /// Durée totale
    pub duration_secs: f64,

    /// Features lues
    pub input_features: usize,
    /// Features en sortie de nettoyage
    pub output_features: usize,
    /// Géométries invalides détectées
    pub invalid_geometries: usize,
    /// Géométries réparées
    pub fixed_geometries: usize,
    /// Géométries invalides chargées telles quelles
    pub unrepairable_geometries: usize,
    /// Doublons supprimés
    pub duplicates_removed: usize,
    /// Coordonnées transformées
    pub reprojected: bool,
    /// CRS source (None si absent)
    pub source_crs: Option<String>,
    /// CRS de sortie
    pub target_crs: String,

    /// Lignes chargées en base
    pub rows_loaded: u64,
    /// Index créés
    pub indexes_created: Vec<String>,
    /// Fichier GeoJSON écrit
    pub geojson_output: Option<PathBuf>,

    /// Durées par étape
    pub stages: Vec<StageTiming>,
    /// Journal de nettoyage
    pub cleaning_log: Vec<String>,
    /// Warnings
    pub warnings: Vec<String>,
    /// Erreurs
    pub errors: Vec<String>,
}

impl PipelineReport {
    /// Crée un rapport vide pour un fichier et une table
    pub fn new(input_file: &Path, table: &str, target_crs: &str) -> Self {
        Self {
            input_file: input_file.to_path_buf(),
            table: table.to_string(),
            status: PipelineStatus::Success,
            duration_secs: 0.0,
            input_features: 0,
            output_features: 0,
            invalid_geometries: 0,
            fixed_geometries: 0,
            unrepairable_geometries: 0,
            duplicates_removed: 0,
            reprojected: false,
            source_crs: None,
            target_crs: target_crs.to_string(),
            rows_loaded: 0,
            indexes_created: Vec::new(),
            geojson_output: None,
            stages: Vec::new(),
            cleaning_log: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Enregistre la durée d'une étape
    pub fn record_stage(&mut self, stage: &str, duration: Duration) {
        self.stages.push(StageTiming {
            stage: stage.to_string(),
            duration_secs: duration.as_secs_f64(),
        });
    }

    /// Enregistre une erreur
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Définit la durée totale
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Fixe le statut final: `completed` sauf si une erreur a été enregistrée
    pub fn finalize(&mut self, completed: PipelineStatus) {
        self.status = if self.errors.is_empty() {
            completed
        } else {
            PipelineStatus::Failed
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("PIPELINE REPORT - {}", self.input_file.display());
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!("  - Input features: {}", self.input_features);
        println!("  - Output features: {}", self.output_features);
        println!(
            "  - Geometries: {} invalid, {} fixed, {} unrepairable, {} duplicates removed",
            self.invalid_geometries,
            self.fixed_geometries,
            self.unrepairable_geometries,
            self.duplicates_removed
        );
        println!(
            "  - CRS: {} -> {}{}",
            self.source_crs.as_deref().unwrap_or("Not set"),
            self.target_crs,
            if self.reprojected { " (reprojected)" } else { "" }
        );
        match self.status {
            PipelineStatus::DryRun | PipelineStatus::ValidateOnly => println!("  - Target table: {} (not loaded)", self.table),
            _ => println!("  - Table: {} ({} rows)", self.table, self.rows_loaded),
        }
        if let Some(path) = &self.geojson_output {
            println!("  - GeoJSON: {}", path.display());
        }

        if !self.stages.is_empty() {
            println!("\n--- STAGES ---");
            for stage in &self.stages {
                println!("  {}: {:.3}s", stage.stage, stage.duration_secs);
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  {}", w);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in &self.errors {
                println!("  {}", e);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .context(format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} in, {} out, {} fixed, {} duplicates, {} rows loaded",
            self.input_file.display(),
            self.input_features,
            self.output_features,
            self.fixed_geometries,
            self.duplicates_removed,
            self.rows_loaded
        )
    }
}
