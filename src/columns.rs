//! Column discovery for the survey sheet.
//!
//! Form questions get renamed, re-punctuated and suffixed between exports, so no
//! page addresses a column by its literal header. Each page asks for a logical
//! name (`"barrio"`, `"problematicas"`, ...) and the [`ColumnCatalog`] resolves it
//! against whatever headers the loaded table actually has.

use crate::table::Table;
use lazy_static::lazy_static;
use serde::Serialize;

/// Finds the column that best matches an ordered list of candidate names.
///
/// Exact header matches win first, in candidate order. Failing that, the first
/// column whose name contains a candidate (case-insensitive) is returned, scanning
/// candidates in order and columns in order for each candidate.
pub fn find_column<'t>(table: &'t Table, candidates: &[&str]) -> Option<&'t str> {
    find_in_headers(table.columns(), candidates)
}

pub fn find_in_headers<'h>(headers: &'h [String], candidates: &[&str]) -> Option<&'h str> {
    for candidate in candidates {
        if let Some(col) = headers.iter().find(|h| h.as_str() == *candidate) {
            return Some(col.as_str());
        }
    }

    for candidate in candidates {
        let needle = candidate.to_lowercase();
        if needle.trim().is_empty() {
            continue;
        }
        if let Some(col) = headers.iter().find(|h| h.to_lowercase().contains(&needle)) {
            return Some(col.as_str());
        }
    }

    None
}

/// One logical column and the header fragments that identify it.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub candidates: Vec<&'static str>,
}

/// Declarative table of `{logical name: [candidate fragments]}` shared by every page.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnCatalog {
    entries: Vec<ColumnEntry>,
}

pub const TIPO_COMEDOR: &str = "tipo_comedor";
pub const NOMBRE_COMEDOR: &str = "nombre_comedor";
pub const BARRIO: &str = "barrio";
pub const COMUNA: &str = "comuna";
pub const NODO: &str = "nodo";
pub const NICHO: &str = "nicho";
pub const ANIO_VINCULACION: &str = "anio_vinculacion";
pub const PROBLEMATICAS: &str = "problematicas";
pub const NECESIDADES: &str = "necesidades";
pub const ENFOQUES: &str = "enfoques";
pub const ETAPA_VITAL: &str = "etapa_vital";
pub const OTRAS_CATEGORIAS: &str = "otras_categorias";
pub const ACCIONES_APARTE: &str = "acciones_aparte";
pub const FRECUENCIA_ACTIVIDADES: &str = "frecuencia_actividades";
pub const TEMAS_EJECUTADOS: &str = "temas_ejecutados";
pub const ARTICULACION_INSTITUCION: &str = "articulacion_institucion";
pub const SECTOR_ARTICULACION: &str = "sector_articulacion";
pub const LINEAS_ACCION: &str = "lineas_accion";
pub const SOCIAL_COMUNITARIA: &str = "social_comunitaria";
pub const COMERCIAL: &str = "comercial";
pub const INSTITUCIONAL: &str = "institucional";

/// Columns holding numeric zone codes and years.
pub const NUMERIC_COLUMNS: [&str; 4] = [COMUNA, NODO, NICHO, ANIO_VINCULACION];

/// Columns the variable explorer and cross-tabulation pages offer.
pub const ACTIVITY_COLUMNS: [&str; 9] = [
    ACCIONES_APARTE,
    FRECUENCIA_ACTIVIDADES,
    TEMAS_EJECUTADOS,
    ARTICULACION_INSTITUCION,
    SECTOR_ARTICULACION,
    LINEAS_ACCION,
    SOCIAL_COMUNITARIA,
    COMERCIAL,
    INSTITUCIONAL,
];

lazy_static! {
    static ref DEFAULT_CATALOG: ColumnCatalog = ColumnCatalog::builtin();
}

impl ColumnCatalog {
    pub fn new(entries: Vec<ColumnEntry>) -> Self {
        ColumnCatalog { entries }
    }

    /// Shared instance of [`ColumnCatalog::builtin`].
    pub fn default_ref() -> &'static ColumnCatalog {
        &DEFAULT_CATALOG
    }

    /// Header fragments observed across the published versions of the survey form.
    pub fn builtin() -> Self {
        let entry = |key, label, candidates: &[&'static str]| ColumnEntry {
            key,
            label,
            candidates: candidates.to_vec(),
        };

        ColumnCatalog::new(vec![
            entry(
                TIPO_COMEDOR,
                "Tipo de comedor",
                &["TIPO DE COMEDOR", "Tipo de Comedor", "tipo_de_comedor", "TIPO COMEDOR"],
            ),
            entry(
                NOMBRE_COMEDOR,
                "Nombre del comedor",
                &["NOMBRE DEL COMEDOR", "NOMBRE COMEDOR"],
            ),
            entry(BARRIO, "Barrio", &["BARRIO"]),
            entry(COMUNA, "Comuna", &["COMUNA"]),
            entry(NODO, "Nodo", &["NODO ", "NODO"]),
            entry(NICHO, "Nicho", &["NICHO ", "NICHO"]),
            entry(
                ANIO_VINCULACION,
                "Año de vinculación",
                &["AÑO DE VINCULACIÓN AL PROGRAMA", "AÑO DE VINCULACIÓN", "VINCULACION"],
            ),
            entry(
                PROBLEMATICAS,
                "Problemáticas",
                &["PROBLEMÁTICAS", "PROBLEMATICAS", "PROBLEMAS", "DIFICULTADES", "OBSTÁCULOS", "problem"],
            ),
            entry(
                NECESIDADES,
                "Necesidades",
                &["NECESIDADES", "NECESIDAD", "REQUERIMIENTOS", "DEMANDAS"],
            ),
            entry(
                ENFOQUES,
                "Enfoques diferenciales/étnicos",
                &[
                    "ENFOQUES DIFERENCIALES/ETNICOS",
                    "ENFOQUES DIFERENCIALES",
                    "ENFOQUE DIFERENCIAL",
                    "ETNICOS",
                    "ÉTNICOS",
                ],
            ),
            entry(
                ETAPA_VITAL,
                "Etapa vital",
                &["ETAPA VITAL", "ETAPAS VITALES", "EDADES", "EDAD"],
            ),
            entry(
                OTRAS_CATEGORIAS,
                "Otras categorías",
                &["OTRAS CATEGORIAS", "OTRAS CATEGORÍAS"],
            ),
            entry(
                ACCIONES_APARTE,
                "Otras acciones del comedor",
                &["acciones aparte", "otras acciones", "preparación y entrega"],
            ),
            entry(
                FRECUENCIA_ACTIVIDADES,
                "Frecuencia de actividades",
                &["frecuencia", "actividades y/o procesos"],
            ),
            entry(
                TEMAS_EJECUTADOS,
                "Temas o actividades ejecutadas",
                &["TEMAS O ACTIVIDADES", "ejecutado anteriormente"],
            ),
            entry(
                ARTICULACION_INSTITUCION,
                "Articulación con instituciones",
                &["articulado con alguna institución", "articulación"],
            ),
            entry(SECTOR_ARTICULACION, "Sector de articulación", &["De qué sector", "sector"]),
            entry(
                LINEAS_ACCION,
                "Líneas de acción / tipología",
                &["LINEAS DE ACCIÓN", "TIPOLOGIA DEL COMEDOR"],
            ),
            entry(
                SOCIAL_COMUNITARIA,
                "Social comunitaria",
                &["SOCIAL COMUNITARIA", "Colectivos, JAL"],
            ),
            entry(COMERCIAL, "Comercial", &["COMERCIAL", "Supermercados, tiendas"]),
            entry(
                INSTITUCIONAL,
                "Institucional",
                &["INSTITUCIONAL", "Alcaldía, gobernación"],
            ),
        ])
    }

    pub fn entries(&self) -> &[ColumnEntry] {
        &self.entries
    }

    pub fn entry(&self, key: &str) -> Option<&ColumnEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.entry(key).map(|e| e.label).unwrap_or(key)
    }

    /// Resolves a logical name to a header of `table`.
    pub fn resolve<'t>(&self, table: &'t Table, key: &str) -> Option<&'t str> {
        self.resolve_in_headers(table.columns(), key)
    }

    pub fn resolve_in_headers<'h>(&self, headers: &'h [String], key: &str) -> Option<&'h str> {
        let entry = self.entry(key)?;
        find_in_headers(headers, &entry.candidates)
    }

    /// Every logical column that resolves against `table`, in catalog order.
    pub fn available<'t>(&self, table: &'t Table) -> Vec<(&'static str, &'t str)> {
        self.entries
            .iter()
            .filter_map(|e| find_column(table, &e.candidates).map(|col| (e.key, col)))
            .collect()
    }
}

impl Default for ColumnCatalog {
    fn default() -> Self {
        ColumnCatalog::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Value;

    fn table_with(columns: &[&str]) -> Table {
        Table::new(
            columns.iter().map(|c| c.to_string()).collect(),
            vec![vec![Value::Missing; columns.len()]],
        )
    }

    #[test]
    fn test_case_insensitive_substring_match() {
        let table = table_with(&["BARRIO", "COMUNA"]);
        assert_eq!(find_column(&table, &["barrio"]), Some("BARRIO"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let table = table_with(&["BARRIO", "COMUNA"]);
        assert_eq!(find_column(&table, &["NOPE"]), None);
        assert_eq!(find_column(&Table::default(), &["BARRIO"]), None);
    }

    #[test]
    fn test_exact_match_beats_earlier_substring_match() {
        let table = table_with(&["NECESIDADES PRIORITARIAS", "NECESIDAD"]);
        // "NECESIDADES" only matches by substring, "NECESIDAD" exists exactly.
        assert_eq!(
            find_column(&table, &["NECESIDADES", "NECESIDAD"]),
            Some("NECESIDAD")
        );
    }

    #[test]
    fn test_candidate_order_then_column_order() {
        let table = table_with(&["OTRO SECTOR", "De qué sector articula"]);
        assert_eq!(
            find_column(&table, &["De qué sector", "sector"]),
            Some("De qué sector articula")
        );
        assert_eq!(find_column(&table, &["sector"]), Some("OTRO SECTOR"));
    }

    #[test]
    fn test_empty_candidate_never_matches_by_substring() {
        let table = table_with(&["BARRIO"]);
        assert_eq!(find_column(&table, &[""]), None);
    }

    #[test]
    fn test_catalog_resolves_long_form_headers() {
        let table = table_with(&[
            "Marca temporal",
            "NODO ",
            "ETAPA VITAL \r\n(Según su apreciación, indique cual es el tipo de población)",
            "PROBLEMÁTICAS",
        ]);
        let catalog = ColumnCatalog::builtin();
        assert_eq!(catalog.resolve(&table, NODO), Some("NODO "));
        assert!(catalog.resolve(&table, ETAPA_VITAL).unwrap().starts_with("ETAPA VITAL"));
        assert_eq!(catalog.resolve(&table, PROBLEMATICAS), Some("PROBLEMÁTICAS"));
        assert_eq!(catalog.resolve(&table, BARRIO), None);
        assert_eq!(catalog.resolve(&table, "desconocida"), None);

        let available: Vec<&str> = catalog.available(&table).iter().map(|(k, _)| *k).collect();
        assert_eq!(available, vec![NODO, PROBLEMATICAS, ETAPA_VITAL]);
    }
}
