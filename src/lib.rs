//! Estara extracts structured attributes from multilingual real-estate
//! listing text.
//!
//! Free-form Vietnamese or English listing text goes in; canonicalized,
//! validated attributes come out, resolved against a curated reference
//! dataset. Values the dataset does not know yet are canonicalized and
//! queued for admin review; approval grows the dataset so the same value
//! resolves on the next request.
//!
//! ```no_run
//! use estara::config::{default_db_path, EstaraConfig};
//! use estara::db::repository::reference::seed_reference_data;
//! use estara::db::sqlite::open_database;
//! use estara::pipeline::ExtractionPipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = open_database(&default_db_path())?;
//! seed_reference_data(&conn)?;
//!
//! let pipeline = ExtractionPipeline::from_config(EstaraConfig::default());
//! let result = pipeline.extract(&conn, "Bán căn hộ 2PN 75m2 Quận 7, giá 5,5 tỷ")?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod review;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Hosts embedding the crate in a
/// larger service should install their own instead.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("estara=info")),
        )
        .init();
}
