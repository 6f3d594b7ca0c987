//! Raw dataset artifacts, one CSV file per board.

use crate::error::Result;
use crate::extract::RawRecord;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Column order of the raw-stage artifact.
pub const RAW_HEADER: [&str; 5] = ["Title", "Content", "Link", "Date", "Comments"];

/// Byte-order mark written ahead of the header for spreadsheet tools.
pub const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Writes a board's records as a UTF-8 (with BOM) CSV artifact.
///
/// The output directory is created on demand; an existing file for the
/// board is overwritten.
pub fn write_raw_dataset(path: &Path, records: &[RawRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(RAW_HEADER)?;
    for record in records {
        let date = record.posted.format("%Y-%m-%d").to_string();
        let comments = record.comments_joined();
        writer.write_record([
            record.title.as_str(),
            record.body.as_str(),
            record.url.as_str(),
            date.as_str(),
            comments.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
