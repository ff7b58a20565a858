use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading the survey data.
///
/// Messages are shown on the dashboard as they are, so each one names the
/// likely cause.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("falta la configuración {0}; defínala como variable de entorno")]
    ConfigMissing(&'static str),

    #[error("no se pudieron leer las credenciales en {path}: {reason}")]
    Credentials { path: PathBuf, reason: String },

    #[error("error de autenticación con Google: {0}")]
    Auth(String),

    #[error(
        "no se encontró la hoja de cálculo {0}; verifique el ID y que esté compartida con la cuenta de servicio"
    )]
    SpreadsheetNotFound(String),

    #[error("no se encontró la pestaña '{0}' en la hoja de cálculo")]
    WorksheetNotFound(String),

    #[error("error de red al consultar la hoja: {0}")]
    Http(String),

    #[error("error de lectura/escritura: {0}")]
    Io(#[from] std::io::Error),

    #[error("respuesta JSON inválida: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV mal formado en la línea {line}: {reason}")]
    Csv { line: usize, reason: String },

    #[error("no se pudo leer la copia local de los datos: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("la hoja no tiene encabezados ni datos")]
    EmptySheet,
}

#[cfg(feature = "web")]
impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::Http(err.to_string())
    }
}

/// Why a page has nothing to show. These are expected states, not failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoData {
    #[error("no hay registros para los filtros seleccionados")]
    EmptyTable,

    #[error("no se encontró la columna '{column}' en los datos")]
    ColumnNotFound { column: String },

    #[error("la columna '{column}' no tiene respuestas")]
    EmptyColumn { column: String },

    #[error("la columna '{column}' no tiene categorías válidas")]
    NoTokens { column: String },

    #[error("no hay registros con ambas variables respondidas")]
    NoCompletePairs,
}

pub type Result<T> = std::result::Result<T, DashboardError>;
