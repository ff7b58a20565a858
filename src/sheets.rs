//! Read-only client for the Google Sheets values API.
//!
//! Authenticates as a service account: a short RS256 assertion signed with the
//! account's private key is exchanged for a bearer token, which is kept until
//! shortly before it expires.

use crate::cache::TtlCache;
use crate::config::Settings;
use crate::error::{DashboardError, Result};
use crate::table::Table;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// Tokens are dropped this long before Google would reject them.
const TOKEN_MARGIN: Duration = Duration::from_secs(300);

/// The fields of a service-account JSON key this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| DashboardError::Credentials {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| DashboardError::Credentials {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

pub struct SheetsClient {
    http: Client,
    key: ServiceAccountKey,
    sheet_id: String,
    worksheet: String,
    token: Mutex<TtlCache<String>>,
}

impl SheetsClient {
    pub fn new(key: ServiceAccountKey, sheet_id: impl Into<String>, worksheet: impl Into<String>) -> Self {
        SheetsClient {
            http: Client::new(),
            key,
            sheet_id: sheet_id.into(),
            worksheet: worksheet.into(),
            token: Mutex::new(TtlCache::new(
                Duration::from_secs(ASSERTION_LIFETIME_SECS) - TOKEN_MARGIN,
            )),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.sheet_id.is_empty() {
            return Err(DashboardError::ConfigMissing("GOOGLE_SHEET_ID"));
        }
        let key = ServiceAccountKey::from_file(&settings.credentials_path)?;
        Ok(SheetsClient::new(key, &settings.sheet_id, &settings.worksheet))
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    fn assertion(&self, now_unix: u64) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES.join(" "),
            aud: self.key.token_uri(),
            iat: now_unix,
            exp: now_unix + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| DashboardError::Credentials {
                path: "private_key".into(),
                reason: e.to_string(),
            })?;
        jsonwebtoken::encode(&header, &claims, &signing_key)
            .map_err(|e| DashboardError::Auth(e.to_string()))
    }

    async fn access_token(&self) -> Result<String> {
        let mut cache = self.token.lock().await;
        let now = Instant::now();
        if let Some(token) = cache.get(now) {
            return Ok(token.clone());
        }

        let now_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let assertion = self.assertion(now_unix)?;
        let response = self
            .http
            .post(self.key.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Auth(format!("{}: {}", status, body.trim())));
        }
        let token: TokenResponse = response.json().await?;
        log::debug!("obtained access token for {}", self.key.client_email);
        cache.store(token.access_token.clone(), now);
        Ok(token.access_token)
    }

    fn values_url(&self) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API).map_err(|e| DashboardError::Http(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| DashboardError::Http("URL base inválida".to_string()))?
            .push(&self.sheet_id)
            .push("values")
            .push(&self.worksheet);
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        Ok(url)
    }

    /// Every cell of the worksheet as text, row by row. Trailing empty cells
    /// are omitted by the API, so rows can be ragged.
    pub async fn fetch_values(&self) -> Result<Vec<Vec<String>>> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.values_url()?)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, &self.sheet_id, &self.worksheet));
        }

        let range: ValueRange = response.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    /// Fetches the worksheet and builds the raw table. Duplicate headers are
    /// suffixed, never rejected.
    pub async fn fetch_table(&self) -> Result<Table> {
        let values = self.fetch_values().await?;
        log::info!(
            "fetched {} rows from worksheet '{}'",
            values.len().saturating_sub(1),
            self.worksheet
        );
        Table::from_raw_rows(values).ok_or(DashboardError::EmptySheet)
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Maps a failed values request to the error that best explains it.
pub fn status_error(status: StatusCode, body: &str, sheet_id: &str, worksheet: &str) -> DashboardError {
    match status {
        StatusCode::NOT_FOUND => DashboardError::SpreadsheetNotFound(sheet_id.to_string()),
        StatusCode::BAD_REQUEST if body.contains("Unable to parse range") => {
            DashboardError::WorksheetNotFound(worksheet.to_string())
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DashboardError::Auth(format!("{}: sin permiso de lectura sobre la hoja", status))
        }
        _ => DashboardError::Http(format!("{}: {}", status, body.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SheetsClient {
        let key = ServiceAccountKey {
            client_email: "lector@proyecto.iam.gserviceaccount.com".into(),
            private_key: "no es una clave".into(),
            private_key_id: None,
            token_uri: None,
        };
        SheetsClient::new(key, "abc123", "Respuestas de formulario 1")
    }

    #[test]
    fn test_values_url_escapes_worksheet() {
        let url = client().values_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Respuestas%20de%20formulario%201?majorDimension=ROWS&valueRenderOption=FORMATTED_VALUE"
        );
    }

    #[test]
    fn test_status_errors() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", "abc", "Hoja"),
            DashboardError::SpreadsheetNotFound(id) if id == "abc"
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "Unable to parse range: Hoja", "abc", "Hoja"),
            DashboardError::WorksheetNotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "", "abc", "Hoja"),
            DashboardError::Auth(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "", "abc", "Hoja"),
            DashboardError::Http(_)
        ));
    }

    #[test]
    fn test_bad_private_key_is_a_credentials_error() {
        assert!(matches!(
            client().assertion(1_700_000_000),
            Err(DashboardError::Credentials { .. })
        ));
    }

    #[test]
    fn test_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sa.json");
        std::fs::write(
            &path,
            r#"{"type":"service_account","client_email":"a@b.c","private_key":"k","token_uri":"https://example.org/token"}"#,
        )
        .unwrap();
        let key = ServiceAccountKey::from_file(&path).unwrap();
        assert_eq!(key.token_uri(), "https://example.org/token");

        let missing = ServiceAccountKey::from_file(&dir.path().join("nada.json"));
        assert!(matches!(missing, Err(DashboardError::Credentials { .. })));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(serde_json::json!("Centro")), "Centro");
        assert_eq!(cell_text(serde_json::json!(3)), "3");
        assert_eq!(cell_text(serde_json::Value::Null), "");
    }
}
