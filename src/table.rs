use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::StatsError;
use crate::types::{MergeSummary, Results};

/// Copy every row from `reader` to `writer`, appending the instruction count
/// and binary size to rows whose first field is a key in `results`.
///
/// Row count and order are preserved; rows without a matching key are
/// written unchanged. Blank lines count as empty rows and are written back
/// as blank lines. There is no header handling: a header row is just a row
/// whose first field is unlikely to be a benchmark key.
pub fn augment_rows<R: io::Read, W: io::Write>(
    mut reader: R,
    writer: W,
    results: &Results,
) -> Result<MergeSummary, AugmentError> {
    // The csv reader skips blank lines, so they are recovered from the byte
    // ranges it consumed between records.
    let mut input = Vec::new();
    reader.read_to_end(&mut input).map_err(|e| AugmentError::Read(e.into()))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_slice());
    let builder = {
        let mut b = WriterBuilder::new();
        b.flexible(true);
        b
    };
    let mut writer = builder.from_writer(writer);

    let mut summary = MergeSummary::default();
    let mut matched = std::collections::BTreeSet::new();
    let mut record = StringRecord::new();
    let mut consumed = 0usize;

    while reader.read_record(&mut record).map_err(AugmentError::Read)? {
        let end = reader.position().byte() as usize;
        let blank = leading_blank_lines(&input, consumed, end);
        consumed = end;
        if blank > 0 {
            writer = write_blank_lines(writer, blank, &builder)?;
            summary.rows += blank;
        }
        summary.rows += 1;

        let measurement = record.get(0).and_then(|key| results.get_key_value(key));

        match measurement {
            Some((key, m)) => {
                let mut row = record.clone();
                row.push_field(&m.instructions.to_string());
                row.push_field(&m.binary_size.to_string());
                writer.write_record(&row).map_err(AugmentError::Write)?;
                summary.augmented += 1;
                matched.insert(key.as_str());
            }
            None => writer.write_record(&record).map_err(AugmentError::Write)?,
        }
    }

    let trailing = leading_blank_lines(&input, consumed, input.len());
    if trailing > 0 {
        writer = write_blank_lines(writer, trailing, &builder)?;
        summary.rows += trailing;
    }

    writer.flush().map_err(|e| AugmentError::Write(csv::Error::from(e)))?;

    summary.unmatched_keys = results
        .keys()
        .filter(|k| !matched.contains(k.as_str()))
        .cloned()
        .collect();

    Ok(summary)
}

/// Count the empty lines at the start of `input[start..end]`.
///
/// A record never starts with a line terminator, so every terminator before
/// the first other byte ends a blank line. A `\n` directly after a previous
/// record's `\r` finishes that record's CRLF and is not counted.
fn leading_blank_lines(input: &[u8], start: usize, end: usize) -> usize {
    let mut i = start;
    if i > 0 && input[i - 1] == b'\r' && input.get(i) == Some(&b'\n') {
        i += 1;
    }

    let mut lines = 0;
    while i < end {
        match input[i] {
            b'\r' => {
                lines += 1;
                if input.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => lines += 1,
            _ => break,
        }
        i += 1;
    }
    lines
}

/// Emit `count` bare line terminators. The csv writer has no way to write a
/// zero-field record, so the underlying writer is taken out and re-wrapped.
fn write_blank_lines<W: io::Write>(
    writer: csv::Writer<W>,
    count: usize,
    builder: &WriterBuilder,
) -> Result<csv::Writer<W>, AugmentError> {
    let mut inner = writer
        .into_inner()
        .map_err(|e| AugmentError::Write(e.into_error().into()))?;
    for _ in 0..count {
        inner
            .write_all(b"\n")
            .map_err(|e| AugmentError::Write(e.into()))?;
    }
    Ok(builder.from_writer(inner))
}

/// Which side of the copy failed.
#[derive(thiserror::Error, Debug)]
pub enum AugmentError {
    #[error("failed to read row: {0}")]
    Read(#[source] csv::Error),

    #[error("failed to write row: {0}")]
    Write(#[source] csv::Error),
}

/// Merge `results` into the table at `source`, writing the augmented table
/// to `destination`.
///
/// Rows go to a temporary file next to `destination` which replaces it only
/// once the whole table has been written, so a failed run never leaves a
/// partial table behind.
pub fn augment_table(
    source: &Path,
    destination: &Path,
    results: &Results,
) -> Result<MergeSummary, StatsError> {
    let input = std::fs::File::open(source).map_err(|e| StatsError::TableRead {
        path: source.to_path_buf(),
        source: e.into(),
    })?;

    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let write_err = |e: io::Error| StatsError::TableWrite {
        path: destination.to_path_buf(),
        source: e.into(),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
    debug!(staging = %staged.path().display(), "writing augmented table");

    let summary = augment_rows(input, staged.as_file_mut(), results).map_err(|e| match e {
        AugmentError::Read(source_err) => StatsError::TableRead {
            path: source.to_path_buf(),
            source: source_err,
        },
        AugmentError::Write(source_err) => StatsError::TableWrite {
            path: destination.to_path_buf(),
            source: source_err,
        },
    })?;

    staged.persist(destination).map_err(|e| write_err(e.error))?;

    info!(
        rows = summary.rows,
        augmented = summary.augmented,
        unmatched = summary.unmatched_keys.len(),
        destination = %destination.display(),
        "stats table written"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Measurement;
    use std::fs;

    fn results(entries: &[(&str, u64, u64)]) -> Results {
        entries
            .iter()
            .map(|(k, i, b)| {
                (
                    k.to_string(),
                    Measurement {
                        instructions: *i,
                        binary_size: *b,
                    },
                )
            })
            .collect()
    }

    fn merge(table: &str, res: &Results) -> (String, MergeSummary) {
        let mut out = Vec::new();
        let summary = augment_rows(table.as_bytes(), &mut out, res).unwrap();
        (String::from_utf8(out).unwrap(), summary)
    }

    fn rows(table: &str) -> Vec<Vec<String>> {
        ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(table.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn matched_row_gains_count_then_size() {
        let (out, summary) = merge("foo,a,b\n", &results(&[("foo", 120, 4096)]));
        assert_eq!(out, "foo,a,b,120,4096\n");
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.augmented, 1);
        assert!(summary.unmatched_keys.is_empty());
    }

    #[test]
    fn unmatched_row_unchanged() {
        let (out, summary) = merge("bar,x\n", &results(&[("foo", 120, 4096)]));
        assert_eq!(out, "bar,x\n");
        assert_eq!(summary.augmented, 0);
        assert_eq!(summary.unmatched_keys, vec!["foo".to_string()]);
    }

    #[test]
    fn row_count_and_order_preserved() {
        let table = "name,states,transitions\n\
                     zeta.1,10,20\n\
                     adding.1,5,7\n\
                     bar,1\n\
                     adding.2,3,4,extra\n";
        let res = results(&[("adding.1", 11, 22), ("adding.2", 33, 44)]);
        let (out, summary) = merge(table, &res);

        let before = rows(table);
        let after = rows(&out);
        assert_eq!(after.len(), before.len());
        assert_eq!(summary.rows, 5);
        assert_eq!(summary.augmented, 2);

        for (b, a) in before.iter().zip(&after) {
            assert_eq!(a[0], b[0]);
            match res.get(&b[0]) {
                Some(m) => {
                    assert_eq!(a.len(), b.len() + 2);
                    assert_eq!(&a[..b.len()], &b[..]);
                    assert_eq!(a[b.len()], m.instructions.to_string());
                    assert_eq!(a[b.len() + 1], m.binary_size.to_string());
                }
                None => assert_eq!(a, b),
            }
        }
    }

    #[test]
    fn quoted_fields_survive() {
        let table = "foo,\"a, with comma\",\"say \"\"hi\"\"\"\n";
        let (out, _) = merge(table, &results(&[("foo", 1, 2)]));
        assert_eq!(rows(&out), vec![vec!["foo", "a, with comma", "say \"hi\"", "1", "2"]]);
    }

    #[test]
    fn key_match_is_exact() {
        let (out, _) = merge("foo.1,a\nfoo,b\n", &results(&[("foo", 7, 8)]));
        assert_eq!(out, "foo.1,a\nfoo,b,7,8\n");
    }

    #[test]
    fn blank_lines_kept_as_rows() {
        let table = "name,a\n\nfoo,x\n\nbar,y\n";
        let (out, summary) = merge(table, &results(&[("foo", 1, 2)]));
        assert_eq!(out, "name,a\n\nfoo,x,1,2\n\nbar,y\n");
        assert_eq!(summary.rows, 5);
        assert_eq!(summary.augmented, 1);
        assert_eq!(out.lines().count(), table.lines().count());
    }

    #[test]
    fn leading_and_trailing_blank_lines_kept() {
        let table = "\n\nfoo,x\nbar,y\n\n";
        let (out, summary) = merge(table, &results(&[("bar", 3, 4)]));
        assert_eq!(out, "\n\nfoo,x\nbar,y,3,4\n\n");
        assert_eq!(summary.rows, 5);
    }

    #[test]
    fn crlf_table_blank_lines_counted_once() {
        let table = "foo,x\r\n\r\nbar,y\r\n";
        let (out, summary) = merge(table, &results(&[("foo", 1, 2)]));
        assert_eq!(out, "foo,x,1,2\n\nbar,y\n");
        assert_eq!(summary.rows, 3);
    }

    #[test]
    fn quoted_newline_is_not_a_blank_row() {
        let table = "foo,\"two\n\nlines\"\nbar,y\n";
        let (out, summary) = merge(table, &results(&[]));
        assert_eq!(summary.rows, 2);
        assert_eq!(rows(&out), vec![vec!["foo", "two\n\nlines"], vec!["bar", "y"]]);
    }

    #[test]
    fn blank_line_survives_file_merge() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let src = tmp.path().join("stats.csv");
        let dst = tmp.path().join("stats_1.csv");
        fs::write(&src, "foo,a\n\nbar,b\n").unwrap();

        let summary = augment_table(&src, &dst, &results(&[("bar", 5, 6)])).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "foo,a\n\nbar,b,5,6\n");
    }

    #[test]
    fn read_failure_names_the_reading_side() {
        let mut out = Vec::new();
        let err = augment_rows(&b"foo,a\nbar,\xff\n"[..], &mut out, &results(&[])).unwrap_err();
        assert!(matches!(err, AugmentError::Read(_)));
        assert!(err.to_string().starts_with("failed to read row"), "got: {err}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn empty_table() {
        let (out, summary) = merge("", &results(&[("foo", 1, 2)]));
        assert!(out.is_empty());
        assert_eq!(summary.rows, 0);
    }

    #[test]
    fn table_file_round_trip() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let src = tmp.path().join("stats.csv");
        let dst = tmp.path().join("stats_1.csv");
        fs::write(&src, "foo,a,b\nbar,x\n").unwrap();

        let summary = augment_table(&src, &dst, &results(&[("foo", 120, 4096)])).unwrap();
        assert_eq!(summary.augmented, 1);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "foo,a,b,120,4096\nbar,x\n");
        // Source is untouched.
        assert_eq!(fs::read_to_string(&src).unwrap(), "foo,a,b\nbar,x\n");
    }

    #[test]
    fn existing_destination_replaced() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let src = tmp.path().join("stats.csv");
        let dst = tmp.path().join("stats_1.csv");
        fs::write(&src, "foo,a\n").unwrap();
        fs::write(&dst, "stale,contents,from,before\n").unwrap();

        augment_table(&src, &dst, &results(&[])).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "foo,a\n");
    }

    #[test]
    fn missing_source_is_a_read_error() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let dst = tmp.path().join("stats_1.csv");
        let err = augment_table(&tmp.path().join("stats.csv"), &dst, &results(&[])).unwrap_err();
        assert!(matches!(err, StatsError::TableRead { .. }));
        assert!(!dst.exists());
    }

    #[test]
    fn missing_destination_dir_is_a_write_error() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let src = tmp.path().join("stats.csv");
        fs::write(&src, "foo,a\n").unwrap();
        let dst = tmp.path().join("missing").join("stats_1.csv");

        let err = augment_table(&src, &dst, &results(&[])).unwrap_err();
        assert!(matches!(err, StatsError::TableWrite { .. }));
    }

    #[test]
    fn invalid_utf8_source_leaves_no_destination() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let src = tmp.path().join("stats.csv");
        let dst = tmp.path().join("stats_1.csv");
        fs::write(&src, b"foo,a\nbar,\xff\xfe\n").unwrap();

        let err = augment_table(&src, &dst, &results(&[("foo", 1, 2)])).unwrap_err();
        assert!(matches!(err, StatsError::TableRead { .. }));
        assert!(!dst.exists());
        // No staging files left behind either.
        let leftovers = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
