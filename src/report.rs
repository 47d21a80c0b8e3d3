//! Structured file listing written to standard output.

use std::io::Write;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::model::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One JSON object per line.
    #[default]
    JsonLines,
    /// Header row plus one delimited row per record.
    Delimited(u8),
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" | "json" | "ndjson" => Ok(Self::JsonLines),
            "tsv" => Ok(Self::Delimited(b'\t')),
            "csv" => Ok(Self::Delimited(b',')),
            other => Err(Error::Config(format!(
                "unknown output format {other:?} (expected jsonl, tsv or csv)"
            ))),
        }
    }
}

/// Writes records one at a time as they are produced.
///
/// Delimited output takes its columns from the first record; later records
/// leave absent columns empty and drop columns the header does not know.
pub struct Reporter<W: Write> {
    format: OutputFormat,
    out: Option<W>,
    delimited: Option<DelimitedState<W>>,
    written: u64,
}

struct DelimitedState<W: Write> {
    header: Vec<String>,
    writer: csv::Writer<W>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            format,
            out: Some(out),
            delimited: None,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, record: &FileRecord) -> Result<()> {
        match self.format {
            OutputFormat::JsonLines => {
                let out = self.out.as_mut().ok_or_else(closed)?;
                serde_json::to_writer(&mut *out, record)
                    .map_err(|e| Error::Report(e.to_string()))?;
                out.write_all(b"\n").map_err(report_io)?;
                out.flush().map_err(report_io)?;
            }
            OutputFormat::Delimited(delimiter) => {
                let columns = record.columns();
                if self.delimited.is_none() {
                    let out = self.out.take().ok_or_else(closed)?;
                    let header: Vec<String> = columns.iter().map(|(k, _)| k.clone()).collect();
                    let mut writer = csv::WriterBuilder::new()
                        .delimiter(delimiter)
                        .from_writer(out);
                    writer.write_record(&header).map_err(report_csv)?;
                    self.delimited = Some(DelimitedState { header, writer });
                }
                let Some(state) = self.delimited.as_mut() else {
                    return Err(closed());
                };
                let row: Vec<&str> = state
                    .header
                    .iter()
                    .map(|name| {
                        columns
                            .iter()
                            .find(|(k, _)| k == name)
                            .map_or("", |(_, v)| v.as_str())
                    })
                    .collect();
                state.writer.write_record(&row).map_err(report_csv)?;
                state.writer.flush().map_err(report_io)?;
            }
        }
        self.written += 1;
        Ok(())
    }

    /// Writes every record of an already accumulated listing.
    pub fn write_all<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a FileRecord>,
    ) -> Result<()> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        match (self.out, self.delimited) {
            (Some(mut out), _) => {
                out.flush().map_err(report_io)?;
                Ok(out)
            }
            (None, Some(state)) => state
                .writer
                .into_inner()
                .map_err(|e| Error::Report(e.error().to_string())),
            (None, None) => Err(closed()),
        }
    }
}

fn closed() -> Error {
    Error::Report("output already closed".to_string())
}

fn report_io(e: std::io::Error) -> Error {
    Error::Report(e.to_string())
}

fn report_csv(e: csv::Error) -> Error {
    Error::Report(e.to_string())
}
