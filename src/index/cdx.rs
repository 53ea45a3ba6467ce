//! Classic CDX listing
//!
//! Legend `CDX b e a m s c V n g` (`v` instead of `V` for flat containers),
//! one line per record including the first:
//! date, ip, url, media type, status, digest, offset, length, file stem.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::format::strip_container_suffixes;
use crate::reader::ArcReader;
use crate::record::RecordHeader;

/// Legend line for a container of the given encoding
pub fn cdx_legend(compressed: bool) -> String {
    format!("CDX b e a m s c {} n g", if compressed { "V" } else { "v" })
}

/// One CDX line
pub fn cdx_line(
    header: &RecordHeader,
    status: Option<u16>,
    digest: Option<&str>,
    stripped_name: &str,
) -> String {
    format!(
        "{} {} {} {} {} {} {} {} {}",
        header.date,
        header.ip,
        header.url,
        header.mimetype,
        status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
        digest.unwrap_or("-"),
        header.offset,
        header.length,
        if stripped_name.is_empty() { "-" } else { stripped_name }
    )
}

/// Write the legend and a line per remaining record, returning the count.
pub fn write_cdx<W: Write>(reader: &mut ArcReader, out: &mut W) -> Result<u64> {
    let stripped = strip_container_suffixes(reader.identifier()).to_string();
    writeln!(out, "{}", cdx_legend(reader.is_compressed()))?;
    let mut count = 0;
    while let Some(record) = reader.next_record()? {
        let header = record.header().clone();
        let status = record.http_header().and_then(|h| h.status_code);
        let digest = record.finish()?;
        writeln!(out, "{}", cdx_line(&header, status, digest.as_deref(), &stripped))?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

/// Write `<stem>.cdx` next to the container, returning its path.
pub fn write_cdx_file(reader: &mut ArcReader, container: &Path) -> Result<PathBuf> {
    let name = container
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = container.with_file_name(format!("{}.cdx", strip_container_suffixes(&name)));
    let mut out = BufWriter::new(File::create(&path)?);
    let count = write_cdx(reader, &mut out)?;
    tracing::info!(path = %path.display(), records = count, "Wrote CDX file");
    Ok(path)
}
