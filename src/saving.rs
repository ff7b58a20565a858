use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::table::Table;

/// Writes a gzip-compressed bincode snapshot of the cleaned table, so the
/// dashboard can start without reaching the remote sheet.
pub fn save_table(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_snapshot(table, file)?;

    log::info!(
        "saved snapshot of {} records to {}",
        table.len(),
        path.as_ref().display()
    );
    Ok(())
}

pub fn load_table(path: impl AsRef<Path>) -> Result<Table> {
    let file = File::open(path.as_ref())?;
    read_snapshot(file)
}

/// Snapshot bytes of `table`, for downloads.
pub fn serialize_to_memory(table: &Table) -> Result<Vec<u8>> {
    write_snapshot(table, Vec::new())
}

pub fn deserialize_from_memory(buffer: &[u8]) -> Result<Table> {
    read_snapshot(buffer)
}

fn write_snapshot<W: Write>(table: &Table, sink: W) -> Result<W> {
    let encoder = GzEncoder::new(sink, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, table)?;
    writer.flush()?;
    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(encoder.finish()?)
}

fn read_snapshot<R: Read>(source: R) -> Result<Table> {
    let decoder = GzDecoder::new(source);
    let mut reader = BufReader::new(decoder);

    let table: Table = deserialize_from(&mut reader)?;
    Ok(table)
}
