use crate::columns::{self, ColumnCatalog};
use crate::config::Settings;
use crate::error::{DashboardError, Result};
use crate::table::Table;
use crate::{loader, saving};
use std::fmt;
use std::path::PathBuf;

#[cfg(feature = "web")]
use crate::sheets::SheetsClient;

/// Where the survey responses come from.
pub enum Source {
    #[cfg(feature = "web")]
    Remote(SheetsClient),
    CsvFile(PathBuf),
    Snapshot(PathBuf),
}

impl Source {
    /// Picks the source named by the settings: a snapshot first, then a CSV
    /// file, then the remote sheet.
    pub fn from_settings(settings: &Settings) -> Result<Source> {
        if let Some(path) = &settings.data_snapshot {
            return Ok(Source::Snapshot(path.clone()));
        }
        if let Some(path) = &settings.data_csv {
            return Ok(Source::CsvFile(path.clone()));
        }
        remote(settings)
    }

    /// Loads and cleans the table from a local file. The remote variant needs
    /// [`Source::load`].
    pub fn load_local(&self, catalog: &ColumnCatalog) -> Result<Table> {
        let raw = match self {
            Source::CsvFile(path) => loader::from_csv(path)?,
            Source::Snapshot(path) => saving::load_table(path)?,
            #[cfg(feature = "web")]
            Source::Remote(_) => {
                return Err(DashboardError::ConfigMissing("DATA_CSV"));
            }
        };
        Ok(clean_table(raw, catalog))
    }

    #[cfg(feature = "web")]
    pub async fn load(&self, catalog: &ColumnCatalog) -> Result<Table> {
        match self {
            Source::Remote(client) => {
                let raw = client.fetch_table().await?;
                Ok(clean_table(raw, catalog))
            }
            local => local.load_local(catalog),
        }
    }
}

#[cfg(feature = "web")]
fn remote(settings: &Settings) -> Result<Source> {
    Ok(Source::Remote(SheetsClient::from_settings(settings)?))
}

#[cfg(not(feature = "web"))]
fn remote(_settings: &Settings) -> Result<Source> {
    Err(DashboardError::ConfigMissing("DATA_CSV"))
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "web")]
            Source::Remote(client) => write!(f, "Google Sheets ({})", client.worksheet()),
            Source::CsvFile(path) => write!(f, "archivo CSV {}", path.display()),
            Source::Snapshot(path) => write!(f, "copia local {}", path.display()),
        }
    }
}

/// Drops blank records and turns zone codes and years into numbers.
///
/// Text cells are already trimmed and free of null markers by the time they
/// reach the table.
pub fn clean_table(mut table: Table, catalog: &ColumnCatalog) -> Table {
    let before = table.len();
    table.drop_empty_rows();

    let numeric: Vec<String> = columns::NUMERIC_COLUMNS
        .iter()
        .filter_map(|key| catalog.resolve(&table, key).map(str::to_string))
        .collect();
    table.coerce_numeric_columns(&numeric);

    log::info!(
        "cleaned table: {} records ({} blank dropped), numeric columns {:?}",
        table.len(),
        before - table.len(),
        numeric
    );
    table
}
