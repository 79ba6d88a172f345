//! Typed configuration for invoicing-service.
//!
//! Every setting the service consumes is an explicit, named field with a
//! default applied at load time; consumers never reach into loose maps.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct InvoicingConfig {
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub numbering: NumberingConfig,
    pub policy: PolicyConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Document numbering scheme, scoped per business and year.
#[derive(Deserialize, Clone, Debug)]
pub struct NumberingConfig {
    pub invoice_prefix: String,
    pub credit_note_prefix: String,
    pub quotation_prefix: String,
    pub pad_width: usize,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            invoice_prefix: "INV".to_string(),
            credit_note_prefix: "CN".to_string(),
            quotation_prefix: "QT".to_string(),
            pad_width: 6,
        }
    }
}

/// Business-rule knobs that are policy decisions rather than invariants.
#[derive(Deserialize, Clone, Debug)]
pub struct PolicyConfig {
    /// Whether a draft document may be voided directly, without being
    /// issued first. Defaults to false: drafts are deleted, not voided.
    pub allow_void_draft: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_void_draft: false,
        }
    }
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("INVOICING_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("INVOICING_SERVICE_PORT")
            .unwrap_or_else(|_| "3005".to_string())
            .parse()?;

        let db_url =
            env::var("INVOICING_DATABASE_URL").context("INVOICING_DATABASE_URL must be set")?;
        let max_connections = env::var("INVOICING_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("INVOICING_DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let log_level = env::var("INVOICING_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let otlp_endpoint = env::var("INVOICING_OTLP_ENDPOINT").ok();

        let mut numbering = NumberingConfig::default();
        if let Ok(prefix) = env::var("INVOICING_INVOICE_PREFIX") {
            numbering.invoice_prefix = prefix;
        }
        if let Ok(prefix) = env::var("INVOICING_CREDIT_NOTE_PREFIX") {
            numbering.credit_note_prefix = prefix;
        }
        if let Ok(prefix) = env::var("INVOICING_QUOTATION_PREFIX") {
            numbering.quotation_prefix = prefix;
        }
        if let Ok(width) = env::var("INVOICING_NUMBER_PAD_WIDTH") {
            numbering.pad_width = width.parse()?;
        }

        let allow_void_draft = env::var("INVOICING_ALLOW_VOID_DRAFT")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        Ok(Self {
            service_name: "invoicing-service".to_string(),
            log_level,
            otlp_endpoint,
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            numbering,
            policy: PolicyConfig { allow_void_draft },
        })
    }
}
