use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SHEET_ID: &str = "1fbs-J474JbvV3USg5aQlLUW9sNqkBjcd63qBU1nJeeI";
pub const DEFAULT_WORKSHEET: &str = "Respuestas de formulario 1";
pub const DEFAULT_CREDENTIALS: &str = "credentials/service_account.json";
pub const DEFAULT_TITLE: &str = "Dashboard Comedores Comunitarios";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_TTL_SECS: u64 = 300;
pub const DEBUG_TTL_SECS: u64 = 60;

/// Runtime settings, read once at startup from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sheet_id: String,
    pub worksheet: String,
    pub credentials_path: PathBuf,
    pub cache_ttl: Duration,
    pub title: String,
    pub debug: bool,
    pub bind_addr: String,
    /// Local CSV export; takes precedence over the remote sheet.
    pub data_csv: Option<PathBuf>,
    /// Local table snapshot; takes precedence over the CSV and the remote sheet.
    pub data_snapshot: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sheet_id: DEFAULT_SHEET_ID.to_string(),
            worksheet: DEFAULT_WORKSHEET.to_string(),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS),
            cache_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            title: DEFAULT_TITLE.to_string(),
            debug: false,
            bind_addr: DEFAULT_BIND.to_string(),
            data_csv: None,
            data_snapshot: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Settings::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup. Unset or blank keys fall back to the
    /// defaults; an unparseable `CACHE_TTL` is logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let debug = get("DEBUG_MODE").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let default_ttl = if debug { DEBUG_TTL_SECS } else { DEFAULT_TTL_SECS };
        let ttl_secs = match get("CACHE_TTL") {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                log::warn!("CACHE_TTL={} is not a number of seconds, using {}", raw, default_ttl);
                default_ttl
            }),
            None => default_ttl,
        };

        Settings {
            sheet_id: get("GOOGLE_SHEET_ID").unwrap_or(defaults.sheet_id),
            worksheet: get("WORKSHEET_NAME").unwrap_or(defaults.worksheet),
            credentials_path: get("CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            cache_ttl: Duration::from_secs(ttl_secs),
            title: get("APP_TITLE").unwrap_or(defaults.title),
            debug,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            data_csv: get("DATA_CSV").map(PathBuf::from),
            data_snapshot: get("DATA_SNAPSHOT").map(PathBuf::from),
        }
    }

    /// True when data comes from a local file instead of the remote sheet.
    pub fn uses_local_source(&self) -> bool {
        self.data_csv.is_some() || self.data_snapshot.is_some()
    }

    /// Configuration problems worth showing on the landing page.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let missing = |p: &Path| !p.exists();

        if let Some(path) = &self.data_snapshot {
            if missing(path) {
                issues.push(format!("DATA_SNAPSHOT apunta a {} que no existe", path.display()));
            }
        }
        if let Some(path) = &self.data_csv {
            if missing(path) {
                issues.push(format!("DATA_CSV apunta a {} que no existe", path.display()));
            }
        }
        if !self.uses_local_source() {
            if self.sheet_id.is_empty() {
                issues.push("GOOGLE_SHEET_ID no está configurado".to_string());
            }
            if missing(&self.credentials_path) {
                issues.push(format!(
                    "Archivo de credenciales no encontrado: {}",
                    self.credentials_path.display()
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s, Settings::default());
        assert_eq!(s.cache_ttl, Duration::from_secs(300));
        assert!(!s.uses_local_source());
    }

    #[test]
    fn test_debug_mode_shortens_ttl() {
        let s = settings(&[("DEBUG_MODE", "True")]);
        assert!(s.debug);
        assert_eq!(s.cache_ttl, Duration::from_secs(60));

        let s = settings(&[("DEBUG_MODE", "true"), ("CACHE_TTL", "10")]);
        assert_eq!(s.cache_ttl, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides_and_bad_ttl() {
        let s = settings(&[
            ("WORKSHEET_NAME", "Hoja 2"),
            ("CACHE_TTL", "cinco"),
            ("DATA_CSV", "datos.csv"),
            ("APP_TITLE", "  "),
        ]);
        assert_eq!(s.worksheet, "Hoja 2");
        assert_eq!(s.cache_ttl, Duration::from_secs(300));
        assert_eq!(s.data_csv, Some(PathBuf::from("datos.csv")));
        assert_eq!(s.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_issues() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("respuestas.csv");
        std::fs::write(&csv, "BARRIO\nCentro\n").unwrap();

        let mut s = Settings {
            credentials_path: dir.path().join("no-existe.json"),
            ..Settings::default()
        };
        assert_eq!(s.issues().len(), 1);

        s.data_csv = Some(csv);
        assert!(s.issues().is_empty());

        s.data_snapshot = Some(dir.path().join("no-existe.bin.gz"));
        assert!(s.issues()[0].starts_with("DATA_SNAPSHOT"));
    }
}
