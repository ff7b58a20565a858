use crate::error::{DashboardError, Result};
use crate::table::Table;
use std::fs;
use std::path::Path;

/// Load the survey table from a CSV export
///
/// The first record holds the headers. Quoted fields may contain commas,
/// doubled quotes and line breaks, which the form's long question titles use.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Table>` - The raw (uncleaned) table or an error
///
/// # Examples
/// ```no_run
/// use comedores::loader::from_csv;
///
/// match from_csv("respuestas.csv") {
///     Ok(table) => println!("Loaded {} records", table.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Table> {
    let text = fs::read_to_string(filepath)?;
    let records = parse_csv(&text)?;
    Table::from_raw_rows(records).ok_or(DashboardError::EmptySheet)
}

/// Parse CSV text into records
///
/// Follows RFC 4180: fields are separated by commas, records by `\n` or `\r\n`,
/// and quoted fields keep separators and line breaks verbatim. A leading UTF-8
/// byte order mark is skipped. Blank lines between records are ignored.
///
/// # Arguments
/// * `text` - Full CSV contents
///
/// # Returns
/// * `Result<Vec<Vec<String>>>` - One vector of fields per record, or an error
///   naming the line where a quoted field was left open
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut line = 1;
    let mut quote_line = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        // Doubled quote inside a quoted field
                        current_field.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    current_field.push(c);
                }
                _ => current_field.push(c),
            }
            continue;
        }

        match c {
            '"' if current_field.is_empty() => {
                in_quotes = true;
                field_started = true;
                quote_line = line;
            }
            ',' => {
                record.push(std::mem::take(&mut current_field));
                field_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                if field_started || !current_field.is_empty() || !record.is_empty() {
                    record.push(std::mem::take(&mut current_field));
                    records.push(std::mem::take(&mut record));
                }
                field_started = false;
            }
            _ => {
                current_field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(DashboardError::Csv {
            line: quote_line,
            reason: "campo entre comillas sin cerrar".to_string(),
        });
    }

    // Last record without a trailing newline
    if field_started || !current_field.is_empty() || !record.is_empty() {
        record.push(current_field);
        records.push(record);
    }

    Ok(records)
}
