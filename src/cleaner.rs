//! Dataset normalization pass turning raw extracted rows into clean tables.
//!
//! The pass is idempotent on its own output: identifiers are recomputed
//! from scratch every run, and all scrubbing steps are fixpoints.

use crate::controls::DEFAULT_SCRUB_PHRASE;
use crate::dataset::UTF8_BOM;
use crate::error::Result;
use crate::extract::LOADING_SENTINEL;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Columns removed from the cleaned dataset when present.
const DROPPED_COLUMNS: [&str; 2] = ["Link", "ID"];
/// Columns subject to sentinel filtering and boilerplate scrubbing.
const TEXT_COLUMNS: [&str; 2] = ["Title", "Content"];

/// Cleaning tuning knobs.
#[derive(Clone, Debug)]
pub struct CleanConfig {
    /// Boilerplate phrases removed from text columns, exact substring match.
    pub scrub_phrases: Vec<String>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            scrub_phrases: vec![DEFAULT_SCRUB_PHRASE.to_string()],
        }
    }
}

/// Stateless dataset cleaning service.
#[derive(Clone, Debug)]
pub struct Cleaner {
    config: CleanConfig,
}

impl Cleaner {
    /// Builds a new cleaner instance.
    pub fn new(config: CleanConfig) -> Self {
        Self { config }
    }

    /// Builds a cleaner for the given boilerplate phrases.
    pub fn from_phrases(phrases: &[String]) -> Self {
        Self::new(CleanConfig {
            scrub_phrases: phrases.to_vec(),
        })
    }

    /// Cleans a dataset file, returning the number of surviving rows.
    ///
    /// Steps, in order: tolerant load (malformed rows skipped), drop the
    /// `Link` column and any pre-existing `ID` column, drop rows with
    /// missing fields, filter and scrub the text columns, drop rows left
    /// empty, renumber 1..N, write back. Input and output may be the same
    /// path; the result is built in memory before anything is written.
    pub fn clean_file(&self, input: &Path, output: &Path) -> Result<usize> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_path(input)?;

        let mut records = reader.records();
        let header = loop {
            match records.next() {
                Some(Ok(record)) => break record,
                Some(Err(err)) => {
                    debug!(error = %err, "skipping malformed header candidate");
                    continue;
                }
                None => {
                    // An empty file cleans to an empty file.
                    return write_rows(output, &["ID".to_string()], &[]);
                }
            }
        };

        let header: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let cell = if idx == 0 { strip_bom(cell) } else { cell };
                cell.to_string()
            })
            .collect();

        let kept: Vec<usize> = (0..header.len())
            .filter(|&idx| !DROPPED_COLUMNS.contains(&header[idx].as_str()))
            .collect();
        let kept_header: Vec<String> = kept.iter().map(|&idx| header[idx].clone()).collect();
        let text_positions: Vec<usize> = (0..kept_header.len())
            .filter(|&pos| TEXT_COLUMNS.contains(&kept_header[pos].as_str()))
            .collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in records {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    debug!(error = %err, "skipping malformed row");
                    continue;
                }
            };
            if record.len() != header.len() {
                debug!(fields = record.len(), "skipping row with missing fields");
                continue;
            }

            let mut row: Vec<String> = kept
                .iter()
                .map(|&idx| record.get(idx).unwrap_or_default().to_string())
                .collect();

            let mut keep = true;
            for &pos in &text_positions {
                if row[pos].trim() == LOADING_SENTINEL {
                    keep = false;
                    break;
                }
                row[pos] = scrub_text(&row[pos], &self.config.scrub_phrases);
                if row[pos].is_empty() {
                    keep = false;
                    break;
                }
            }
            if keep {
                rows.push(row);
            }
        }

        let mut full_header = Vec::with_capacity(kept_header.len() + 1);
        full_header.push("ID".to_string());
        full_header.extend(kept_header);

        write_rows(output, &full_header, &rows)
    }

    /// Cleans a dataset file in place.
    pub fn clean_in_place(&self, path: &Path) -> Result<usize> {
        self.clean_file(path, path)
    }
}

fn write_rows(output: &Path, header: &[String], rows: &[Vec<String>]) -> Result<usize> {
    let mut file = File::create(output)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(header)?;
    for (idx, row) in rows.iter().enumerate() {
        let mut full_row = Vec::with_capacity(row.len() + 1);
        full_row.push((idx + 1).to_string());
        full_row.extend(row.iter().cloned());
        writer.write_record(&full_row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

/// Collapses whitespace runs, removes boilerplate phrases, and trims.
fn scrub_text(input: &str, phrases: &[String]) -> String {
    let mut text = collapse_whitespace(input);
    for phrase in phrases {
        text = text.replace(phrase.as_str(), "");
    }
    collapse_whitespace(&text)
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim().to_string()
}

fn strip_bom(cell: &str) -> &str {
    cell.strip_prefix('\u{feff}').unwrap_or(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::write_raw_dataset;
    use crate::extract::RawRecord;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    fn read_lines(path: &Path) -> Vec<String> {
        let bytes = std::fs::read(path).expect("read cleaned file");
        assert!(bytes.starts_with(UTF8_BOM), "cleaned file keeps the BOM");
        String::from_utf8(bytes[UTF8_BOM.len()..].to_vec())
            .expect("utf8")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn scrubbing_collapses_whitespace_and_removes_phrases() {
        let phrases = vec!["Dcard 需要確認您的連線是安全的".to_string()];
        assert_eq!(
            scrub_text("Hello   world Dcard 需要確認您的連線是安全的 today", &phrases),
            "Hello world today"
        );
        // Scrubbing is a fixpoint.
        assert_eq!(scrub_text("Hello world today", &phrases), "Hello world today");
    }

    #[test]
    fn link_and_stale_id_columns_are_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(
            dir.path(),
            "raw.csv",
            "ID,Title,Content,Link,Date,Comments\n\
             7,標題一,這是一段夠長的內文,https://x.test/p/1,2024-01-02,推\n",
        );

        let cleaner = Cleaner::new(CleanConfig::default());
        let survivors = cleaner.clean_in_place(&input).expect("clean");
        assert_eq!(survivors, 1);

        let lines = read_lines(&input);
        assert_eq!(lines[0], "ID,Title,Content,Date,Comments");
        assert_eq!(lines[1], "1,標題一,這是一段夠長的內文,2024-01-02,推");
    }

    #[test]
    fn sentinel_and_emptied_rows_vanish_without_id_gaps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let phrase = "只剩樣板";
        let input = write_fixture(
            dir.path(),
            "raw.csv",
            &format!(
                "Title,Content,Link,Date,Comments\n\
                 請稍候...,內容正常,https://x.test/p/1,2024-01-02,\n\
                 {phrase},內容正常,https://x.test/p/2,2024-01-03,\n\
                 標題正常,內容也正常,https://x.test/p/3,2024-01-04,推\n"
            ),
        );

        let cleaner = Cleaner::from_phrases(&[phrase.to_string()]);
        let survivors = cleaner.clean_in_place(&input).expect("clean");
        assert_eq!(survivors, 1);

        let lines = read_lines(&input);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("1,標題正常"));
    }

    #[test]
    fn malformed_and_short_rows_are_skipped_individually() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(
            dir.path(),
            "raw.csv",
            "Title,Content,Link,Date,Comments\n\
             只有三欄,內容,https://x.test/p/1\n\
             標題,內容正常,https://x.test/p/2,2024-01-03,推\n",
        );

        let cleaner = Cleaner::new(CleanConfig::default());
        let survivors = cleaner.clean_in_place(&input).expect("clean");
        assert_eq!(survivors, 1);
        assert!(read_lines(&input)[1].starts_with("1,標題"));
    }

    #[test]
    fn cleaning_is_idempotent_modulo_renumbering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_fixture(
            dir.path(),
            "raw.csv",
            "Title,Content,Link,Date,Comments\n\
             甲,內容  有多餘   空白,https://x.test/p/1,2024-01-02,推 || 再推\n\
             乙,另一段內容,https://x.test/p/2,2024-01-03,\n",
        );

        let cleaner = Cleaner::new(CleanConfig::default());
        cleaner.clean_in_place(&input).expect("first pass");
        let first = read_lines(&input);
        cleaner.clean_in_place(&input).expect("second pass");
        let second = read_lines(&input);
        assert_eq!(first, second);
        assert_eq!(second[1], "1,甲,內容 有多餘 空白,2024-01-02,推 || 再推");
        assert_eq!(second[2], "2,乙,另一段內容,2024-01-03,");
    }

    #[test]
    fn raw_artifact_cleans_end_to_end() {
        // Of three discovered links, one timed out and one was stale, so
        // only a single record reached the raw dataset.
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("travel.csv");
        let survivor = RawRecord {
            title: "標題".to_string(),
            body: "一段夠長的內文敘述".to_string(),
            url: "https://www.dcard.tw/f/travel/p/3".to_string(),
            posted: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
            comments: vec!["推".to_string()],
        };
        write_raw_dataset(&path, &[survivor]).expect("write raw");

        let cleaner = Cleaner::new(CleanConfig::default());
        let survivors = cleaner.clean_in_place(&path).expect("clean");
        assert_eq!(survivors, 1);

        let lines = read_lines(&path);
        assert_eq!(lines[0], "ID,Title,Content,Date,Comments");
        assert_eq!(lines[1], "1,標題,一段夠長的內文敘述,2024-05-01,推");
    }
}
