//! Configuration du pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::{Context, Result};

/// Taille de lot par défaut pour le chargement
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// CRS cible par défaut
pub const DEFAULT_TARGET_CRS: &str = "EPSG:4326";

/// Réglages ETL (fichier JSON, variables `ETL_*`, puis options CLI)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Nombre de lignes par lot COPY
    pub batch_size: usize,

    /// CRS de sortie
    pub target_crs: String,

    /// Créer l'index spatial après chargement
    pub create_indexes: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            target_crs: DEFAULT_TARGET_CRS.to_string(),
            create_indexes: true,
        }
    }
}

impl EtlConfig {
    /// Charge une configuration depuis un fichier JSON (clés absentes = défaut)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique `ETL_BATCH_SIZE`, `ETL_TARGET_CRS`, `ETL_CREATE_INDEXES`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(size) = lookup("ETL_BATCH_SIZE").and_then(|s| s.parse().ok()) {
            self.batch_size = size;
        }
        if let Some(crs) = lookup("ETL_TARGET_CRS").filter(|s| !s.trim().is_empty()) {
            self.target_crs = crs;
        }
        if let Some(flag) = lookup("ETL_CREATE_INDEXES").and_then(|s| parse_bool(&s)) {
            self.create_indexes = flag;
        }
    }

    /// Charge la configuration: fichier (optionnel) puis environnement
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
