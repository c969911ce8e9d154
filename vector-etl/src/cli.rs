//! Définition et implémentation des commandes CLI
//!
//! - `process`: validation -> réparation -> reprojection -> dédoublonnage -> PostGIS
//! - `validate`: validation seule, sans base de données

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::{info, warn};

use vector_etl::config::EtlConfig;
use vector_etl::export::geojson::export_to_geojson;
use vector_etl::export::pool::{create_pool, test_connection, DatabaseConfig};
use vector_etl::export::postgres::{spatial_index_name, GEOMETRY_COLUMN};
use vector_etl::export::{IfExists, PostgisLoader};
use vector_etl::pipeline::{CleaningResult, GeometryCleaner, ValidationResult, VectorValidator};
use vector_etl::report::{PipelineReport, PipelineStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Process vector data through the ETL pipeline
    Process(ProcessArgs),

    /// Validate a vector data file without processing
    Validate {
        /// Path to the shapefile, GeoJSON or GeoPackage to validate
        input_file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Path to the shapefile, GeoJSON or GeoPackage to process
    pub input_file: PathBuf,

    /// Output table name (optionally schema-qualified)
    #[arg(short, long, default_value = "processed_data")]
    pub output_table: String,

    /// Only validate, do not process
    #[arg(long)]
    pub validate_only: bool,

    /// Skip geometry repair
    #[arg(long)]
    pub skip_cleaning: bool,

    /// Target CRS for reprojection (défaut : env ETL_TARGET_CRS / EPSG:4326)
    #[arg(long)]
    pub target_crs: Option<String>,

    /// Run the pipeline without database loading
    #[arg(long)]
    pub dry_run: bool,

    /// What to do if the table exists: fail, replace, append
    #[arg(long, default_value = "replace")]
    pub if_exists: IfExists,

    /// Rows per COPY batch (défaut : env ETL_BATCH_SIZE / 5000)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip spatial index creation after loading
    #[arg(long)]
    pub skip_index: bool,

    /// Also write the cleaned data to this GeoJSON file
    #[arg(long)]
    pub output_geojson: Option<PathBuf>,

    /// Save the pipeline report as JSON
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Surcharges de la connexion PostgreSQL
#[derive(Args, Debug, Default)]
pub struct DatabaseArgs {
    /// PostgreSQL host (défaut : env DB_HOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL port (défaut : env DB_PORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// PostgreSQL database name (défaut : env DB_NAME / vector_etl)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env DB_USER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env DB_PASSWORD / postgres)
    #[arg(long)]
    pub password: Option<String>,

    /// SSL mode: disable, prefer, require (défaut : env DB_SSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

/// Exécute la commande process.
///
/// Retourne `false` si le pipeline échoue (code de sortie 1).
pub async fn cmd_process(args: ProcessArgs, etl: &EtlConfig) -> Result<bool> {
    let started_at = Instant::now();
    let target_crs = args
        .target_crs
        .clone()
        .unwrap_or_else(|| etl.target_crs.clone());
    let batch_size = args.batch_size.unwrap_or(etl.batch_size);

    let mut report = PipelineReport::new(&args.input_file, &args.output_table, &target_crs);

    println!("Starting ETL pipeline for: {}", args.input_file.display());
    println!("{}", "=".repeat(60));

    // Étape 1: validation
    println!("\nStep 1: Validating input file...");
    let stage = Instant::now();
    let validator = VectorValidator::new();
    let (validation, collection) = validator.validate_and_read(&args.input_file);
    report.record_stage("validate", stage.elapsed());
    report.warnings.extend(validation.warnings.iter().cloned());

    let collection = match collection {
        Some(collection) if validation.is_valid => collection,
        _ => {
            println!("Validation failed:");
            for error in &validation.errors {
                println!("  - {}", error);
            }
            for error in validation.errors {
                report.record_error(error);
            }
            return Ok(finish(report, &args, started_at));
        }
    };

    println!("Validation passed");
    print_validation_metadata(&validation);
    report.input_features = validation.metadata.feature_count;
    report.source_crs = validation.metadata.crs.clone();

    if args.validate_only {
        println!("\nValidation complete (--validate-only flag set)");
        return Ok(finish(report, &args, started_at));
    }

    // Étape 2: chargement en mémoire (déjà lu par la validation)
    println!("\nStep 2: Loading data...");
    println!("  - Loaded {} features", collection.len());

    // Étape 3: validité des géométries
    println!("\nStep 3: Checking geometry validity...");
    let stage = Instant::now();
    let geometry_report = validator.check_geometry_validity(&collection);
    report.record_stage("check_validity", stage.elapsed());
    report.invalid_geometries = geometry_report.invalid_count;

    if geometry_report.invalid_count > 0 {
        println!(
            "  Found {} invalid geometries ({:.1}%)",
            geometry_report.invalid_count, geometry_report.invalid_percentage
        );
    } else {
        println!("  All geometries valid");
    }

    // Étape 4: réparation
    let cleaner = GeometryCleaner::new();
    let collection = if !args.skip_cleaning && geometry_report.invalid_count > 0 {
        println!("\nStep 4: Cleaning invalid geometries...");
        let stage = Instant::now();
        let result = cleaner.fix_invalid_geometries(collection);
        report.record_stage("fix_geometries", stage.elapsed());
        record_repair(&mut report, &result);
        report.cleaning_log.extend(result.cleaning_log);
        result.collection
    } else {
        println!("\nStep 4: Skipping geometry cleaning");
        collection
    };

    // Étape 5: CRS
    println!("\nStep 5: Normalizing CRS to {}...", target_crs);
    let stage = Instant::now();
    let crs_result = match cleaner.normalize_crs(collection, &target_crs) {
        Ok(result) => result,
        Err(e) => {
            println!("  Reprojection failed: {:#}", e);
            report.record_error(format!("Reprojection failed: {:#}", e));
            return Ok(finish(report, &args, started_at));
        }
    };
    report.record_stage("normalize_crs", stage.elapsed());
    report.reprojected = crs_result.reprojected;
    if crs_result.reprojected {
        println!("  Reprojected to {}", target_crs);
    } else if report.source_crs.is_none() {
        println!("  No CRS set, assumed EPSG:4326");
    } else {
        println!("  Already in {}", target_crs);
    }
    report.cleaning_log.extend(crs_result.cleaning_log);
    let collection = crs_result.collection;

    // Étape 6: doublons
    println!("\nStep 6: Removing duplicates...");
    let stage = Instant::now();
    let dedup = cleaner.remove_duplicates(collection);
    report.record_stage("remove_duplicates", stage.elapsed());
    if dedup.removed_count > 0 {
        println!("  Removed {} duplicate geometries", dedup.removed_count);
    } else {
        println!("  No duplicates found");
    }
    report.duplicates_removed = dedup.removed_count;
    report.cleaning_log.extend(dedup.cleaning_log);
    let collection = dedup.collection;
    report.output_features = collection.len();

    if let Some(output) = &args.output_geojson {
        println!("\nExporting GeoJSON to {}...", output.display());
        let stage = Instant::now();
        if let Err(e) = export_to_geojson(&collection, output) {
            println!("  Export failed: {:#}", e);
            report.record_error(format!("GeoJSON export failed: {:#}", e));
            return Ok(finish(report, &args, started_at));
        }
        report.record_stage("export_geojson", stage.elapsed());
        report.geojson_output = Some(output.clone());
        println!("  Wrote {} features", collection.len());
    }

    // Étape 7: chargement
    if args.dry_run {
        println!("\nStep 7: Skipping database load (--dry-run mode)");
        println!(
            "  Would have loaded {} rows to table '{}'",
            collection.len(),
            args.output_table
        );
        return Ok(finish(report, &args, started_at));
    }

    println!("\nStep 7: Loading to PostGIS table '{}'...", args.output_table);

    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, &args.database);
    println!(
        "  Database: {} (SSL: {:?})",
        db_config.display_url(),
        db_config.ssl_mode
    );

    let pool = match create_pool(&db_config) {
        Ok(pool) => pool,
        Err(e) => {
            println!("Loading failed:\n  - {:#}", e);
            report.record_error(format!("{:#}", e));
            return Ok(finish(report, &args, started_at));
        }
    };
    if let Err(e) = test_connection(&pool).await {
        warn!(error = %format!("{:#}", e), "Connection test failed");
    }

    let loader = PostgisLoader::new(pool, batch_size);
    println!("  Batch size: {} rows", loader.batch_size());
    let mut load_result = loader
        .load_dataframe(&collection, &args.output_table, args.if_exists)
        .await;
    report.record_stage("load", std::time::Duration::from_secs_f64(load_result.load_time_seconds));

    if !load_result.errors.is_empty() {
        println!("Loading failed:");
        for error in &load_result.errors {
            println!("  - {}", error);
        }
        for error in load_result.errors {
            report.record_error(error);
        }
        return Ok(finish(report, &args, started_at));
    }

    report.rows_loaded = load_result.rows_loaded;
    println!(
        "  Loaded {} rows in {:.2}s",
        load_result.rows_loaded, load_result.load_time_seconds
    );

    // Étape 8: index spatial
    if etl.create_indexes && !args.skip_index {
        println!("\nStep 8: Creating spatial index...");
        let stage = Instant::now();
        if loader
            .create_spatial_index(&args.output_table, GEOMETRY_COLUMN)
            .await
        {
            println!("  Spatial index created");
            load_result
                .indexes_created
                .push(spatial_index_name(&args.output_table));
        } else {
            println!("  Failed to create index");
            report
                .warnings
                .push(format!("Failed to create spatial index on {}", args.output_table));
        }
        report.record_stage("create_index", stage.elapsed());
    }
    report.indexes_created = load_result.indexes_created;

    Ok(finish(report, &args, started_at))
}

/// Affiche le bilan de réparation et le reporte dans le rapport
fn record_repair(report: &mut PipelineReport, result: &CleaningResult) {
    println!("  Fixed {} geometries", result.fixed_count);
    if result.unrepairable_count > 0 {
        println!(
            "  Could not repair {} geometries, they will be loaded as is",
            result.unrepairable_count
        );
        report.warnings.push(format!(
            "{} invalid geometries could not be repaired",
            result.unrepairable_count
        ));
    }
    report.fixed_geometries = result.fixed_count;
    report.unrepairable_geometries = result.unrepairable_count;
}

/// Clôt le rapport, l'affiche, le sauvegarde si demandé
fn finish(mut report: PipelineReport, args: &ProcessArgs, started_at: Instant) -> bool {
    let completed = if args.validate_only {
        PipelineStatus::ValidateOnly
    } else if args.dry_run {
        PipelineStatus::DryRun
    } else {
        PipelineStatus::Success
    };
    report.set_duration(started_at.elapsed());
    report.finalize(completed);

    println!("\n{}", "=".repeat(60));
    match report.status {
        PipelineStatus::Success => println!("ETL Pipeline Complete!"),
        PipelineStatus::DryRun => println!("ETL Pipeline Complete (dry-run)!"),
        PipelineStatus::ValidateOnly => println!("ETL Pipeline Complete (validation only)!"),
        PipelineStatus::Failed => println!("ETL Pipeline Failed"),
    }
    report.display();

    if let Some(path) = &args.report_json {
        match report.save_to_file(path) {
            Ok(()) => info!(path = %path.display(), "Report saved"),
            Err(e) => warn!(path = %path.display(), error = %format!("{:#}", e), "Failed to save report"),
        }
    }

    info!("{}", report.summary());
    report.errors.is_empty()
}

fn print_validation_metadata(validation: &ValidationResult) {
    let metadata = &validation.metadata;
    println!("  - Features: {}", metadata.feature_count);
    println!("  - Geometry types: {:?}", metadata.geometry_types);
    if let Some(format) = metadata.format {
        println!("  - Format: {}", format);
    }
    for warning in &validation.warnings {
        println!("  - Warning: {}", warning);
    }
}

/// Exécute la commande validate
pub fn cmd_validate(input_file: &Path) -> Result<bool> {
    println!("Validating: {}\n", input_file.display());

    let validator = VectorValidator::new();
    let (result, collection) = validator.validate_and_read(input_file);

    let collection = match collection {
        Some(collection) if result.is_valid => collection,
        _ => {
            println!("Validation failed");
            for error in &result.errors {
                println!("  - {}", error);
            }
            return Ok(false);
        }
    };

    println!("File is valid");
    println!("\nMetadata:");
    print_validation_metadata(&result);

    let geom_report = validator.check_geometry_validity(&collection);
    println!("\nGeometry Validity:");
    println!("  - Total features: {}", geom_report.total_features);
    println!("  - Invalid geometries: {}", geom_report.invalid_count);
    println!("  - Invalid percentage: {:.1}%", geom_report.invalid_percentage);

    let crs = validator.detect_crs(&collection);
    println!("\nCRS: {}", crs.as_deref().unwrap_or("Not set"));

    Ok(true)
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: &DatabaseArgs) {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = &args.database {
        config.dbname = database.clone();
    }
    if let Some(user) = &args.user {
        config.user = user.clone();
    }
    if let Some(password) = &args.password {
        config.password = password.clone();
    }
    if let Some(ssl) = &args.ssl {
        match ssl.parse() {
            Ok(mode) => config.ssl_mode = mode,
            Err(e) => warn!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use vector_etl::export::pool::SslMode;
    use vector_io::FeatureCollection;

    const POINTS: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"name": "a"},
         "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}},
        {"type": "Feature", "properties": {"name": "a bis"},
         "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}},
        {"type": "Feature", "properties": {"name": "b"},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,2],[2,0],[0,2],[0,0]]]}}
      ]
    }"#;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vector_etl_cli_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn process_args(input_file: PathBuf, report_json: PathBuf) -> ProcessArgs {
        ProcessArgs {
            input_file,
            output_table: "processed_data".into(),
            validate_only: false,
            skip_cleaning: false,
            target_crs: None,
            dry_run: false,
            if_exists: IfExists::Replace,
            batch_size: None,
            skip_index: false,
            output_geojson: None,
            report_json: Some(report_json),
            database: DatabaseArgs::default(),
        }
    }

    fn read_report(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_process_dry_run_succeeds() {
        let dir = temp_dir("dry_run");
        let input = dir.join("points.geojson");
        std::fs::write(&input, POINTS).unwrap();
        let report_path = dir.join("report.json");
        let geojson_path = dir.join("clean.geojson");

        let mut args = process_args(input, report_path.clone());
        args.dry_run = true;
        args.output_geojson = Some(geojson_path.clone());

        assert!(cmd_process(args, &EtlConfig::default()).await.unwrap());

        let report = read_report(&report_path);
        assert_eq!(report["status"], "DryRun");
        assert_eq!(report["input_features"], 3);
        assert_eq!(report["invalid_geometries"], 1);
        assert_eq!(report["fixed_geometries"], 1);
        assert_eq!(report["duplicates_removed"], 1);
        assert_eq!(report["output_features"], 2);
        assert_eq!(report["rows_loaded"], 0);
        assert!(geojson_path.exists());

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_process_missing_file_fails() {
        let dir = temp_dir("missing");
        let report_path = dir.join("report.json");
        let mut args = process_args(dir.join("missing.shp"), report_path.clone());
        args.dry_run = true;

        assert!(!cmd_process(args, &EtlConfig::default()).await.unwrap());

        let report = read_report(&report_path);
        assert_eq!(report["status"], "Failed");
        assert!(report["errors"][0]
            .as_str()
            .unwrap()
            .starts_with("File not found:"));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_process_validate_only_writes_report() {
        let dir = temp_dir("validate_only");
        let input = dir.join("points.geojson");
        std::fs::write(&input, POINTS).unwrap();
        let report_path = dir.join("report.json");

        let mut args = process_args(input, report_path.clone());
        args.validate_only = true;

        assert!(cmd_process(args, &EtlConfig::default()).await.unwrap());

        let report = read_report(&report_path);
        assert_eq!(report["status"], "ValidateOnly");
        assert_eq!(report["input_features"], 3);
        // Arrêt avant le nettoyage
        assert_eq!(report["fixed_geometries"], 0);
        assert_eq!(report["duplicates_removed"], 0);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_process_unknown_target_crs_fails() {
        let dir = temp_dir("bad_crs");
        let input = dir.join("points.geojson");
        std::fs::write(&input, POINTS).unwrap();
        let report_path = dir.join("report.json");

        let mut args = process_args(input, report_path.clone());
        args.dry_run = true;
        args.target_crs = Some("EPSG:99999".into());

        assert!(!cmd_process(args, &EtlConfig::default()).await.unwrap());
        assert_eq!(read_report(&report_path)["status"], "Failed");

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL database"]
    async fn test_process_loads_and_indexes() {
        let dir = temp_dir("load");
        let input = dir.join("points.geojson");
        std::fs::write(&input, POINTS).unwrap();
        let report_path = dir.join("report.json");

        let mut args = process_args(input, report_path.clone());
        args.output_table = "cli_points".into();
        args.batch_size = Some(1);

        assert!(cmd_process(args, &EtlConfig::default()).await.unwrap());

        let report = read_report(&report_path);
        assert_eq!(report["status"], "Success");
        assert_eq!(report["rows_loaded"], 2);
        assert_eq!(report["indexes_created"][0], "cli_points_geom_idx");

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_unrepairable_geometries_recorded() {
        let collection = FeatureCollection::from_geometries(
            vec![
                Geometry::Point(Point::new(f64::NAN, 0.0)),
                Geometry::Point(Point::new(1.0, 2.0)),
            ],
            None,
        );
        let result = GeometryCleaner::new().fix_invalid_geometries(collection);
        let mut report = PipelineReport::new(Path::new("wells.gpkg"), "wells", "EPSG:4326");

        record_repair(&mut report, &result);

        assert_eq!(report.fixed_geometries, 0);
        assert_eq!(report.unrepairable_geometries, 1);
        assert_eq!(
            report.warnings,
            vec!["1 invalid geometries could not be repaired".to_string()]
        );
    }

    #[test]
    fn test_apply_database_overrides() {
        let mut config = DatabaseConfig::default();
        let args = DatabaseArgs {
            host: Some("db.example.org".into()),
            port: Some(6432),
            ssl: Some("require".into()),
            ..Default::default()
        };

        apply_database_overrides(&mut config, &args);

        assert_eq!(config.host, "db.example.org");
        assert_eq!(config.port, 6432);
        assert_eq!(config.dbname, "vector_etl");
        assert_eq!(config.ssl_mode, SslMode::Require);
    }

    #[test]
    fn test_invalid_ssl_override_ignored() {
        let mut config = DatabaseConfig::default();
        let args = DatabaseArgs {
            ssl: Some("sometimes".into()),
            ..Default::default()
        };

        apply_database_overrides(&mut config, &args);

        assert_eq!(config.ssl_mode, SslMode::Disable);
    }

    #[test]
    fn test_validate_missing_file() {
        assert!(!cmd_validate(Path::new("/nonexistent/input.geojson")).unwrap());
    }
}
