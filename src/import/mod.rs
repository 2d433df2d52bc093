//! CSV order import. [`decode`] turns the upload into text and records,
//! [`mapping`] turns one record into a [`mapping::ParsedRow`] without touching
//! the database. The service in `services::import_service` resolves products and
//! writes one transaction per row.

pub mod decode;
pub mod mapping;

use serde::Serialize;
use utoipa::ToSchema;

/// A row the pipeline refused. Collected into the report, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportRowError {
    /// 1-based line number in the file, header included.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportReport {
    pub success_count: usize,
    pub error_count: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<ImportRowError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub created_order_codes: Vec<String>,
}

impl ImportReport {
    pub fn warn(&mut self, row: usize, message: impl AsRef<str>) {
        self.warnings.push(format!("Row {row}: {}", message.as_ref()));
    }

    pub fn reject(&mut self, row: usize, reason: impl Into<String>) {
        self.error_count += 1;
        self.errors.push(ImportRowError {
            row,
            reason: reason.into(),
        });
    }
}
