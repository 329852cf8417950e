use crate::error::Result;
use crate::table::{CanonicalTable, Field};
use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Spreadsheet apps evaluate cells starting with these as formulas.
const FORMULA_PREFIXES: [char; 4] = ['=', '+', '-', '@'];

fn text_cell(s: &str) -> String {
    if s.starts_with(FORMULA_PREFIXES) {
        format!("'{s}")
    } else {
        s.to_string()
    }
}

fn cell(field: Field<'_>) -> String {
    match field {
        Field::Text(s) => text_cell(s),
        Field::Number(Some(v)) => v.to_string(),
        Field::Number(None) => String::new(),
    }
}

/// Save a table as CSV with header. Missing values are empty cells.
pub fn save_csv<P: AsRef<Path>>(table: &CanonicalTable, path: P) -> Result<()> {
    write_csv(table, File::create(path)?)
}

/// Write a table as CSV to any writer (stdout, a buffer, ...).
pub fn write_csv<W: Write>(table: &CanonicalTable, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(table.header()).map_err(std::io::Error::from)?;
    for rec in table.records() {
        wtr.write_record(rec.into_iter().map(cell))
            .map_err(std::io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save a table as pretty JSON.
pub fn save_json<P: AsRef<Path>>(table: &CanonicalTable, path: P) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut f, table).map_err(std::io::Error::from)?;
    f.flush()?;
    Ok(())
}
