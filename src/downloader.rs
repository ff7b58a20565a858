use crate::analysis::report::{CrossReport, Report};
use crate::cell::Value;
use crate::table::Table;
use chrono::{DateTime, TimeZone};

/// Build the downloadable table of a report
///
/// One row per category of the full distribution (not the bucketed chart),
/// with its count, its share of all mentions rounded to one decimal and,
/// when the report classifies categories, its tier label.
///
/// # Arguments
/// * `report` - The computed report
///
/// # Returns
/// * `Table` - Headers `Categoría, Frecuencia, Porcentaje` and optionally `Nivel`
pub fn report_table(report: &Report) -> Table {
    let with_tier = !report.tiers.is_empty();
    let mut headers = vec![
        "Categoría".to_string(),
        "Frecuencia".to_string(),
        "Porcentaje".to_string(),
    ];
    if with_tier {
        headers.push("Nivel".to_string());
    }

    let rows = report
        .rows
        .iter()
        .map(|row| {
            let mut out = vec![
                Value::Text(row.label.clone()),
                Value::Number(row.count as f64),
                Value::Number((row.percentage * 10.0).round() / 10.0),
            ];
            if with_tier {
                out.push(row.tier_label.map(Value::from).unwrap_or_default());
            }
            out
        })
        .collect();

    Table::new(headers, rows)
}

/// Build the downloadable contingency table of a cross-tabulation
///
/// The first column holds the row categories; one column per column category
/// follows, then row totals. The last row holds column totals.
pub fn crosstab_table(cross: &CrossReport) -> Table {
    let tab = &cross.tab;
    let mut headers = vec![cross.label1.clone()];
    headers.extend(tab.cols().iter().cloned());
    headers.push("Total".to_string());

    let row_totals = tab.row_totals();
    let mut rows: Vec<Vec<Value>> = tab
        .rows()
        .iter()
        .zip(tab.cells())
        .zip(row_totals)
        .map(|((label, cells), total)| {
            let mut out = vec![Value::Text(label.clone())];
            out.extend(cells.iter().map(|c| Value::Number(*c as f64)));
            out.push(Value::Number(total as f64));
            out
        })
        .collect();

    let mut totals = vec![Value::Text("Total".to_string())];
    totals.extend(tab.col_totals().into_iter().map(|c| Value::Number(c as f64)));
    totals.push(Value::Number(tab.total() as f64));
    rows.push(totals);

    Table::new(headers, rows)
}

/// Convert a table to CSV format
///
/// UTF-8, comma separated, one header row. Fields containing commas, quotes or
/// line breaks are quoted with inner quotes doubled. Missing values export as
/// empty fields.
///
/// # Arguments
/// * `table` - Reference to the table to convert
///
/// # Returns
/// * `String` - CSV content
///
/// # Examples
/// ```
/// use comedores::cell::Value;
/// use comedores::downloader::to_csv;
/// use comedores::table::Table;
///
/// let table = Table::new(vec!["BARRIO".into()], vec![vec![Value::from("Centro, Sur")]]);
/// assert_eq!(to_csv(&table), "BARRIO\n\"Centro, Sur\"\n");
/// ```
pub fn to_csv(table: &Table) -> String {
    let mut csv_content = String::new();

    push_record(&mut csv_content, table.columns().iter().map(String::as_str));
    for row in table.rows() {
        let labels: Vec<String> = row.iter().map(Value::to_label).collect();
        push_record(&mut csv_content, labels.iter().map(String::as_str));
    }

    csv_content
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, value) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
            let escaped = value.replace('"', "\"\"");
            out.push_str(&format!("\"{}\"", escaped));
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}

#[cfg(feature = "web")]
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no se pudo generar el archivo Excel: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Convert a table to XLSX format
///
/// Writes the headers in bold on the first row; numbers stay numeric so the
/// sheet can be re-sorted and summed in a spreadsheet application.
///
/// # Arguments
/// * `table` - Reference to the table to convert
/// * `sheet_name` - Worksheet name, truncated to Excel's 31 characters
///
/// # Returns
/// * `Result<Vec<u8>, ExportError>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    let name: String = sheet_name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if !name.is_empty() {
        worksheet.set_name(&name)?;
    }

    let bold = Format::new().set_bold();
    for (c, header) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, header, &bold)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Missing => {}
                Value::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Value::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// Download name `{key}_{YYYYMMDD_HHMMSS}.{extension}`.
pub fn export_filename<Tz>(key: &str, at: &DateTime<Tz>, extension: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.{}", key, at.format("%Y%m%d_%H%M%S"), extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::frequency::{CategoryCount, Tier};
    use crate::analysis::report::{ChartKind, ReportRow, TierCount};
    use chrono::Utc;

    fn report() -> Report {
        Report {
            key: "problematicas".into(),
            title: "Problemáticas".into(),
            column: "PROBLEMÁTICAS".into(),
            chart_kind: ChartKind::Bar,
            top_n: 7,
            total_records: 3,
            records_with_data: 3,
            total_mentions: 3,
            unique_categories: 2,
            rows: vec![
                ReportRow {
                    label: "Agua, potable".into(),
                    count: 2,
                    percentage: 200.0 / 3.0,
                    tier: Some(Tier::Critical),
                    tier_label: Some("Crítico"),
                },
                ReportRow {
                    label: "Luz".into(),
                    count: 1,
                    percentage: 100.0 / 3.0,
                    tier: Some(Tier::Critical),
                    tier_label: Some("Crítico"),
                },
            ],
            chart: CategoryCount::default(),
            tiers: vec![TierCount {
                tier: Tier::Critical,
                label: "Crítico",
                categories: 2,
            }],
            top3_share: 100.0,
            top5_share: 100.0,
        }
    }

    #[test]
    fn test_report_csv() {
        let csv = to_csv(&report_table(&report()));
        assert_eq!(
            csv,
            "Categoría,Frecuencia,Porcentaje,Nivel\n\"Agua, potable\",2,66.7,Crítico\nLuz,1,33.3,Crítico\n"
        );
    }

    #[test]
    fn test_quotes_are_doubled() {
        let table = Table::new(
            vec!["A".into(), "B".into()],
            vec![vec![Value::from("dijo \"sí\""), Value::Missing]],
        );
        assert_eq!(to_csv(&table), "A,B\n\"dijo \"\"sí\"\"\",\n");
    }

    #[test]
    fn test_export_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            export_filename("necesidades", &at, "csv"),
            "necesidades_20240309_140507.csv"
        );
    }
}
