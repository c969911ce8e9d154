//! Chargement vers PostgreSQL/PostGIS
//!
//! La table est créée depuis le schéma déduit des attributs, puis remplie par
//! `COPY ... FROM STDIN` (CSV, géométrie en EWKT) par lots de `batch_size`
//! lignes, le tout dans une seule transaction.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use bytes::{Bytes, BytesMut};
use deadpool_postgres::Pool;
use futures::SinkExt;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vector_io::{Feature, FeatureCollection};

/// Nom de la colonne géométrie créée par le loader
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Comportement si la table existe déjà
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Échec si la table existe
    Fail,
    /// Supprime et recrée la table (défaut)
    #[default]
    Replace,
    /// Ajoute les lignes à la table existante
    Append,
}

impl std::str::FromStr for IfExists {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(IfExists::Fail),
            "replace" => Ok(IfExists::Replace),
            "append" => Ok(IfExists::Append),
            _ => Err(format!("Invalid if-exists mode: {}. Use: fail, replace, append", s)),
        }
    }
}

impl std::fmt::Display for IfExists {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IfExists::Fail => "fail",
            IfExists::Replace => "replace",
            IfExists::Append => "append",
        };
        f.write_str(name)
    }
}

/// Résultat d'un chargement
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadResult {
    pub table_name: String,
    pub rows_loaded: u64,
    pub indexes_created: Vec<String>,
    pub load_time_seconds: f64,
    pub errors: Vec<String>,
}

/// Type PostgreSQL d'une colonne attributaire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Text,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
        }
    }

    /// Type d'une valeur isolée (None pour null)
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Number(n) if n.is_i64() => Some(ColumnType::BigInt),
            Value::Number(_) => Some(ColumnType::Double),
            _ => Some(ColumnType::Text),
        }
    }

    /// Type commun à deux valeurs d'une même colonne
    fn merge(self, other: Self) -> Self {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (BigInt, Double) | (Double, BigInt) => Double,
            _ => Text,
        }
    }
}

/// Schéma de la table cible
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    /// Colonnes attributaires (nom, type), dans l'ordre de la collection
    pub columns: Vec<(String, ColumnType)>,
    /// SRID de la colonne géométrie (0 si inconnu)
    pub srid: u32,
}

impl TableSchema {
    /// Déduit le schéma des attributs et du CRS de la collection
    pub fn infer(collection: &FeatureCollection) -> Self {
        let mut columns = Vec::with_capacity(collection.columns.len());

        for name in &collection.columns {
            if name.eq_ignore_ascii_case(GEOMETRY_COLUMN) {
                warn!(column = name.as_str(), "Attribute clashes with the geometry column, skipped");
                continue;
            }

            let column_type = collection
                .features
                .iter()
                .filter_map(|f| f.properties.get(name).and_then(ColumnType::of))
                .reduce(ColumnType::merge)
                .unwrap_or(ColumnType::Text);

            columns.push((name.clone(), column_type));
        }

        let srid = match &collection.crs {
            Some(crs) => crs.epsg().unwrap_or_else(|| {
                warn!(crs = %crs, "CRS has no EPSG code, loading with SRID 0");
                0
            }),
            None => 0,
        };

        Self { columns, srid }
    }

    /// `CREATE TABLE IF NOT EXISTS ...`
    pub fn create_table_sql(&self, table: &str) -> String {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql()))
            .collect();
        defs.push(format!(
            "{} geometry(Geometry, {})",
            quote_ident(GEOMETRY_COLUMN),
            self.srid
        ));

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            qualified_name(table),
            defs.join(", ")
        )
    }

    /// `COPY ... FROM STDIN` au format CSV
    pub fn copy_sql(&self, table: &str) -> String {
        let mut cols: Vec<String> = self.columns.iter().map(|(n, _)| quote_ident(n)).collect();
        cols.push(quote_ident(GEOMETRY_COLUMN));

        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, DELIMITER '|', QUOTE '\"', ESCAPE '\"', NULL '')",
            qualified_name(table),
            cols.join(", ")
        )
    }
}

/// Chargement de collections dans PostGIS
pub struct PostgisLoader {
    pool: Pool,
    batch_size: usize,
}

impl PostgisLoader {
    pub fn new(pool: Pool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Charge la collection dans `table`.
    ///
    /// Les erreurs sont rapportées dans `LoadResult::errors` avec `rows_loaded = 0`.
    pub async fn load_dataframe(
        &self,
        collection: &FeatureCollection,
        table: &str,
        if_exists: IfExists,
    ) -> LoadResult {
        let started_at = Instant::now();
        let mut result = LoadResult {
            table_name: table.to_string(),
            ..Default::default()
        };

        match self.try_load(collection, table, if_exists).await {
            Ok(rows) => {
                result.rows_loaded = rows;
                info!(table = table, rows = rows, "Loaded data");
            }
            Err(e) => {
                warn!(table = table, error = %format!("{:#}", e), "Load failed");
                result.errors.push(format!("Failed to load data: {:#}", e));
            }
        }

        result.load_time_seconds = started_at.elapsed().as_secs_f64();
        result
    }

    async fn try_load(
        &self,
        collection: &FeatureCollection,
        table: &str,
        if_exists: IfExists,
    ) -> Result<u64> {
        let schema = TableSchema::infer(collection);

        let mut client = self
            .pool
            .get()
            .await
            .context("Failed to get connection from pool")?;
        let tx = client.transaction().await?;

        let exists: bool = tx
            .query_one("SELECT to_regclass($1) IS NOT NULL", &[&qualified_name(table)])
            .await
            .context("Failed to check table existence")?
            .get(0);

        if exists {
            match if_exists {
                IfExists::Fail => bail!("Table {} already exists", table),
                IfExists::Replace => {
                    debug!(table = table, "Dropping existing table");
                    tx.batch_execute(&format!("DROP TABLE IF EXISTS {}", qualified_name(table)))
                        .await
                        .context("Failed to drop existing table")?;
                }
                IfExists::Append => {}
            }
        }

        tx.batch_execute(&schema.create_table_sql(table))
            .await
            .context("Failed to create table")?;

        let copy_in = tx
            .copy_in(&schema.copy_sql(table))
            .await
            .context("Failed to start COPY")?;
        let mut pinned = std::pin::pin!(copy_in);

        let mut buf = BytesMut::with_capacity(64 * 1024);
        let mut wkt_buf = Vec::with_capacity(1024);
        let mut pending = 0usize;

        for (index, feature) in collection.features.iter().enumerate() {
            write_copy_row(&mut buf, feature, &schema, &mut wkt_buf)
                .with_context(|| format!("Failed to encode feature {}", index))?;
            pending += 1;

            if pending >= self.batch_size {
                let chunk: Bytes = buf.split().freeze();
                pinned
                    .as_mut()
                    .send(chunk)
                    .await
                    .context("Failed to send COPY chunk")?;
                debug!(rows = index + 1, "COPY batch sent");
                pending = 0;
            }
        }

        if !buf.is_empty() {
            pinned
                .as_mut()
                .send(buf.split().freeze())
                .await
                .context("Failed to send final COPY chunk")?;
        }

        let rows = pinned.as_mut().finish().await.context("COPY failed")?;
        tx.commit().await.context("Failed to commit")?;

        Ok(rows)
    }

    /// Crée l'index GiST `<table>_geom_idx`; toute erreur donne `false`
    pub async fn create_spatial_index(&self, table: &str, geometry_column: &str) -> bool {
        let sql = spatial_index_sql(table, geometry_column);

        let outcome: Result<()> = async {
            let client = self
                .pool
                .get()
                .await
                .context("Failed to get connection from pool")?;
            client.batch_execute(&sql).await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                info!(table = table, "Spatial index created");
                true
            }
            Err(e) => {
                warn!(table = table, error = %format!("{:#}", e), "Failed to create spatial index");
                false
            }
        }
    }
}

/// Nom de l'index spatial d'une table
pub fn spatial_index_name(table: &str) -> String {
    let bare = table.rsplit('.').next().unwrap_or(table);
    format!("{}_geom_idx", bare)
}

/// `CREATE INDEX IF NOT EXISTS <table>_geom_idx ON <table> USING GIST (<col>)`
pub fn spatial_index_sql(table: &str, geometry_column: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} USING GIST ({})",
        quote_ident(&spatial_index_name(table)),
        qualified_name(table),
        quote_ident(geometry_column)
    )
}

/// Identifiant SQL entre guillemets
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `schema.table` -> `"schema"."table"`
pub fn qualified_name(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

fn push_csv_text_field(buf: &mut BytesMut, value: &str) {
    buf.extend_from_slice(b"\"");
    for b in value.as_bytes() {
        match *b {
            b'"' => buf.extend_from_slice(b"\"\""),
            _ => buf.extend_from_slice(&[*b]),
        }
    }
    buf.extend_from_slice(b"\"");
}

fn push_csv_value(buf: &mut BytesMut, value: Option<&Value>, column_type: ColumnType) {
    let Some(value) = value else {
        return;
    };

    match (value, column_type) {
        (Value::Null, _) => {}
        (Value::Bool(b), ColumnType::Boolean) => {
            buf.extend_from_slice(if *b { b"true" } else { b"false" })
        }
        (Value::Number(n), ColumnType::BigInt | ColumnType::Double) => {
            buf.extend_from_slice(n.to_string().as_bytes())
        }
        (Value::String(s), _) => push_csv_text_field(buf, s),
        // Tableaux, objets et types mélangés: texte JSON
        (other, _) => push_csv_text_field(buf, &other.to_string()),
    }
}

/// Écrit une ligne CSV (attributs puis géométrie EWKT)
fn write_copy_row(
    buf: &mut BytesMut,
    feature: &Feature,
    schema: &TableSchema,
    wkt_buf: &mut Vec<u8>,
) -> Result<()> {
    let start_len = buf.len();

    let res: Result<()> = (|| {
        for (name, column_type) in &schema.columns {
            push_csv_value(buf, feature.properties.get(name), *column_type);
            buf.extend_from_slice(b"|");
        }

        wkt_buf.clear();
        {
            let mut writer = WktWriter::new(&mut *wkt_buf);
            feature
                .geometry
                .process_geom(&mut writer)
                .context("Failed to encode geometry to WKT")?;
        }
        buf.extend_from_slice(b"\"");
        buf.extend_from_slice(format!("SRID={};", schema.srid).as_bytes());
        buf.extend_from_slice(&wkt_buf[..]);
        buf.extend_from_slice(b"\"\n");
        Ok(())
    })();

    if res.is_err() {
        buf.truncate(start_len);
    }

    res
}
