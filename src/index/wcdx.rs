//! Wide CDX index
//!
//! One gzip-compressed line per record (the container's first record is
//! skipped), headed by a legend naming the columns:
//!
//! ```text
//! CDX surt-uri b http-date s m sha1 g V end-offset n http-content-length
//!     http-last-modified http-expires http-etag http-location e a 0.1@<ts>
//! ```
//!
//! Output goes to `<stem>.wcdx.gz.open` and is renamed to `<stem>.wcdx.gz`
//! only after a clean pass. A failed pass leaves the `.open` file behind
//! (empty if nothing was written) as a visible marker.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::{IndexOptions, ReaderOptions};
use crate::error::Result;
use crate::format::{strip_container_suffixes, OCCUPIED_SUFFIX};
use crate::reader::ArcReader;
use crate::record::{HttpHeader, RecordHeader};
use crate::timestamp;

use super::surt::surt_from_uri;

/// Version tag closing the legend line
pub const WCDX_VERSION: &str = "0.1";

/// Extension of wide index files
pub const WCDX_EXTENSION: &str = ".wcdx.gz";

/// Column legend, stamped with the generation time
pub fn wcdx_legend(generated: &str) -> String {
    let version = format!("{}@{}", WCDX_VERSION, generated);
    [
        "CDX",
        "surt-uri",
        "b",
        "http-date",
        "s",
        "m",
        "sha1",
        "g",
        "V",
        "end-offset",
        "n",
        "http-content-length",
        "http-last-modified",
        "http-expires",
        "http-etag",
        "http-location",
        "e",
        "a",
        version.as_str(),
    ]
    .join(" ")
}

/// One index line for a record
pub fn wcdx_line(
    header: &RecordHeader,
    http: Option<&HttpHeader>,
    digest: Option<&str>,
    file_name: &str,
) -> String {
    let field = |name: &str| http.and_then(|h| h.get(name)).map(str::trim);
    let time_field = |name: &str| match field(name) {
        None => "-".to_string(),
        Some(value) => match timestamp::parse_http_date(value) {
            Some(date) => timestamp::repair_legacy_year(date),
            None => "e".to_string(),
        },
    };

    let columns = [
        surt_from_uri(&header.url),
        header.date.clone(),
        time_field("Date"),
        http.map(HttpHeader::status_text).unwrap_or_default(),
        header.mimetype.clone(),
        digest.unwrap_or_default().to_string(),
        file_name.to_string(),
        header.offset.to_string(),
        "-".to_string(),
        header.length.to_string(),
        field("Content-Length").unwrap_or_default().to_string(),
        time_field("Last-Modified"),
        time_field("Expires"),
        field("ETag").unwrap_or_default().to_string(),
        field("Location").unwrap_or_default().to_string(),
        header.ip.clone(),
        header.url.clone(),
    ];
    columns
        .iter()
        .map(|c| if c.is_empty() { "-" } else { c.as_str() })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of indexing one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    /// Final path of the index file
    pub path: PathBuf,

    /// Data lines written
    pub lines: u64,
}

/// Where the index for `container` goes, before the in-progress suffix
pub fn wcdx_path(container: &Path, options: &IndexOptions) -> PathBuf {
    let name = container
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = format!("{}{}", strip_container_suffixes(&name), WCDX_EXTENSION);
    match (&options.output_dir, container.parent()) {
        (Some(dir), _) => dir.join(file),
        (None, Some(parent)) => parent.join(file),
        (None, None) => PathBuf::from(file),
    }
}

/// Build the wide index for one container.
///
/// On failure the `.open` file stays on disk and the error is returned.
pub fn index_container(container: &Path, options: &IndexOptions) -> Result<IndexOutcome> {
    let final_path = wcdx_path(container, options);
    let mut open_path = final_path.clone().into_os_string();
    open_path.push(OCCUPIED_SUFFIX);
    let open_path = PathBuf::from(open_path);

    match write_index(container, &open_path) {
        Ok(lines) => {
            fs::rename(&open_path, &final_path)?;
            tracing::info!(
                container = %container.display(),
                index = %final_path.display(),
                lines,
                "Indexed container"
            );
            Ok(IndexOutcome {
                path: final_path,
                lines,
            })
        }
        Err(e) => {
            if !open_path.exists() {
                if let Err(marker) = File::create(&open_path) {
                    tracing::error!(
                        path = %open_path.display(),
                        error = %marker,
                        "Could not leave failure marker"
                    );
                }
            }
            tracing::warn!(
                container = %container.display(),
                marker = %open_path.display(),
                error = %e,
                "Indexing failed"
            );
            Err(e)
        }
    }
}

fn write_index(container: &Path, open_path: &Path) -> Result<u64> {
    let options = ReaderOptions::default().with_digest(true);
    let mut reader = ArcReader::open_path(container, 0, options)?;
    let file_name = reader.identifier().to_string();
    let file = File::create(open_path)?;
    let mut out = GzEncoder::new(BufWriter::new(file), Compression::default());
    writeln!(out, "{}", wcdx_legend(&timestamp::now_fourteen_digit()))?;

    let mut lines = 0;
    while let Some(record) = reader.next_record()? {
        if record.is_container_descriptor() {
            continue;
        }
        let header = record.header().clone();
        let http = record.http_header().cloned();
        let digest = record.finish()?;
        writeln!(out, "{}", wcdx_line(&header, http.as_ref(), digest.as_deref(), &file_name))?;
        lines += 1;
    }
    out.finish()?.flush()?;
    Ok(lines)
}
