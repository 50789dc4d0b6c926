//! Catalog DDL.

/// Light-curve table name.
pub const LIGHT_CURVES_TABLE: &str = "LightCurves";

/// Catalogue feature table name.
pub const TOIS_TABLE: &str = "TOIs";

/// Creates the light-curve table if absent.
pub const CREATE_LIGHT_CURVES: &str = r#"
CREATE TABLE IF NOT EXISTS LightCurves (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    TIC INTEGER,
    sector INTEGER,
    path_to_fits TEXT,
    UNIQUE (TIC, sector)
)
"#;

/// Inserts a record, replacing the path of an existing `(TIC, sector)` row.
pub const UPSERT_LIGHT_CURVE: &str = r#"
INSERT INTO LightCurves (TIC, sector, path_to_fits) VALUES (?, ?, ?)
ON CONFLICT(TIC, sector) DO UPDATE SET path_to_fits = excluded.path_to_fits
"#;

/// Quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
