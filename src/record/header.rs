//! Header line codec
//!
//! Reading side: pull one bounded line off a buffered stream, tokenize it and,
//! in lenient mode, repair the handful of anomalies legacy crawlers left in
//! their header lines. Writing side: build the five-field line and check it
//! before anything reaches disk.

use std::io::{BufRead, Read};

use crate::error::{ArcError, Result};
use crate::format::{
    FIELD_NAMES_LINE, FIELD_SEPARATOR, LINE_SEPARATOR, MAX_HEADER_LINE_LENGTH, NO_TYPE_MIMETYPE,
    PRODUCER_NAME, VERSION_1_FIELD_COUNT, version_for,
};

use super::RecordHeader;

/// Fewest tokens a lenient parse will try to repair.
const MIN_REPAIRABLE_TOKENS: usize = 3;

/// Most tokens a lenient parse will look at before giving up.
const MAX_REPAIRABLE_TOKENS: usize = 100;

// =============================================================================
// Line Reading
// =============================================================================

/// Read the next non-empty line, terminator stripped.
///
/// Returns `Ok(None)` on a clean end of stream. Lines longer than
/// [`MAX_HEADER_LINE_LENGTH`] fail as malformed; a partial line at end of
/// stream fails as truncated. Bytes are decoded as UTF-8, falling back to
/// Latin-1 for legacy headers.
pub fn read_header_line<R: BufRead + ?Sized>(
    reader: &mut R,
    offset: u64,
) -> Result<Option<String>> {
    loop {
        let (line, terminated) = read_bounded_line(reader, offset)?;
        if line.is_empty() && !terminated {
            return Ok(None);
        }
        if !terminated {
            return Err(ArcError::Truncated {
                offset,
                reason: "end of stream inside header line".to_string(),
            });
        }
        let trimmed = trim_eol(&line);
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(decode_line(trimmed)));
    }
}

/// One line, terminator included, plus whether the terminator was seen.
fn read_bounded_line<R: BufRead + ?Sized>(reader: &mut R, offset: u64) -> Result<(Vec<u8>, bool)> {
    let mut line = Vec::new();
    let mut limited = Read::take(&mut *reader, MAX_HEADER_LINE_LENGTH as u64 + 1);
    limited.read_until(LINE_SEPARATOR, &mut line)?;
    let terminated = line.last() == Some(&LINE_SEPARATOR);
    if !terminated && line.len() > MAX_HEADER_LINE_LENGTH {
        return Err(ArcError::MalformedHeader {
            offset,
            reason: format!("header line exceeds {} bytes", MAX_HEADER_LINE_LENGTH),
        });
    }
    Ok((line, terminated))
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

// =============================================================================
// Tokenizing and Repair
// =============================================================================

/// Split a header line into exactly five fields.
///
/// Strict mode takes the line as written: one separator between fields, five
/// fields, nothing else. Lenient mode collapses runs of separators and tries
/// the known repairs before giving up:
///
/// - a URL with unescaped spaces is re-joined with `%20`, anchored on an
///   IP-shaped, a date-shaped and a numeric token at the trailing positions
/// - a media type split before a `charset=` token is rejoined
/// - a missing media type between date and length becomes `-`
///
/// Tabs in the URL are always escaped to `%09`.
pub fn parse_header_tokens(line: &str, strict: bool, offset: u64) -> Result<Vec<String>> {
    let separator = FIELD_SEPARATOR as char;
    let mut tokens: Vec<String> = if strict {
        line.split(separator).map(str::to_string).collect()
    } else {
        line.split(separator)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };

    if tokens.len() != VERSION_1_FIELD_COUNT {
        if strict {
            return Err(malformed(offset, &tokens, line));
        }
        if tokens.len() < MIN_REPAIRABLE_TOKENS || tokens.len() > MAX_REPAIRABLE_TOKENS {
            return Err(malformed(offset, &tokens, line));
        }
        let repaired = fix_space_in_url(&tokens)
            .or_else(|| rejoin_charset(&tokens))
            .or_else(|| insert_missing_mimetype(&tokens));
        match repaired {
            Some(fixed) => {
                tracing::debug!(offset, original = line, "Repaired header line");
                tokens = fixed;
            }
            None => return Err(malformed(offset, &tokens, line)),
        }
    }

    if tokens.iter().any(String::is_empty) {
        return Err(malformed(offset, &tokens, line));
    }
    if tokens[0].contains('\t') {
        tokens[0] = tokens[0].replace('\t', "%09");
    }
    Ok(tokens)
}

fn malformed(offset: u64, tokens: &[String], line: &str) -> ArcError {
    ArcError::MalformedHeader {
        offset,
        reason: format!(
            "expected {} fields, found {}: {:?}",
            VERSION_1_FIELD_COUNT,
            tokens.len(),
            line
        ),
    }
}

/// `text/html; charset=UTF-8` written with a space inside the type.
fn rejoin_charset(tokens: &[String]) -> Option<Vec<String>> {
    if tokens.len() != VERSION_1_FIELD_COUNT + 1 {
        return None;
    }
    if !(is_ip(&tokens[1]) && is_date(&tokens[2])) {
        return None;
    }
    if !tokens[4].to_ascii_lowercase().starts_with("charset=") {
        return None;
    }
    Some(vec![
        tokens[0].clone(),
        tokens[1].clone(),
        tokens[2].clone(),
        format!("{}{}", tokens[3], tokens[4]),
        tokens[5].clone(),
    ])
}

/// The fetcher had no media type and wrote nothing in its place.
fn insert_missing_mimetype(tokens: &[String]) -> Option<Vec<String>> {
    if tokens.len() != VERSION_1_FIELD_COUNT - 1 {
        return None;
    }
    if !(is_ip(&tokens[1]) && is_date(&tokens[2]) && is_number(&tokens[3])) {
        return None;
    }
    let mut fixed = tokens.to_vec();
    fixed.insert(3, "-".to_string());
    Some(fixed)
}

/// The URL absorbed stray spaces. Everything before the IP is the URL.
fn fix_space_in_url(tokens: &[String]) -> Option<Vec<String>> {
    let n = tokens.len();
    if n <= VERSION_1_FIELD_COUNT {
        return None;
    }
    let (ip, date, mime, length) = (&tokens[n - 4], &tokens[n - 3], &tokens[n - 2], &tokens[n - 1]);
    if !(is_ip(ip) && is_date(date) && is_number(length)) {
        return None;
    }
    Some(vec![
        tokens[..n - 4].join("%20"),
        ip.clone(),
        date.clone(),
        mime.clone(),
        length.clone(),
    ])
}

fn is_ip(token: &str) -> bool {
    if token == "-" {
        return true;
    }
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 3 && p.parse::<u8>().is_ok())
}

fn is_date(token: &str) -> bool {
    token.len() == 14 && token.bytes().all(|b| b.is_ascii_digit())
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

// =============================================================================
// Full Header Parse
// =============================================================================

/// A header pulled off the stream, before the reader stamps its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub url: String,
    pub ip: String,
    pub date: String,
    pub mimetype: String,
    pub length: u64,
    pub header_line: String,

    /// Version from the producer line (first record only)
    pub version: Option<String>,

    /// Body bytes already consumed by the first record's extra lines
    pub preamble_length: u64,
}

impl ParsedHeader {
    /// Read and parse the header at the current position.
    ///
    /// At a container's start the two extra lines of the first record are
    /// read as well; the field-name line is skipped, not trusted.
    pub fn read<R: BufRead + ?Sized>(
        reader: &mut R,
        container_start: bool,
        strict: bool,
        offset: u64,
    ) -> Result<Option<Self>> {
        let line = match read_header_line(reader, offset)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let tokens = parse_header_tokens(&line, strict, offset)?;
        let length = tokens[4].parse::<u64>().map_err(|_| ArcError::MalformedHeader {
            offset,
            reason: format!("length field is not a number: {:?}", tokens[4]),
        })?;

        let mut date = tokens[2].clone();
        let mut version = None;
        let mut preamble_length = 0;
        if container_start {
            let (producer, producer_len) = read_preamble_line(reader, offset)?;
            let (_, names_len) = read_preamble_line(reader, offset)?;
            version = Some(version_from_producer_line(&producer, strict, offset)?);
            // The first line's own terminator is counted in the declared length.
            preamble_length = 1 + producer_len + names_len;
            date.truncate(14);
        }

        Ok(Some(Self {
            header_line: tokens.join(" "),
            url: tokens[0].clone(),
            ip: tokens[1].clone(),
            date,
            mimetype: tokens[3].clone(),
            length,
            version,
            preamble_length,
        }))
    }

    /// Body length left once the preamble lines have been consumed
    pub fn body_length(&self) -> u64 {
        self.length.saturating_sub(self.preamble_length)
    }

    pub fn into_record_header(
        self,
        version: String,
        offset: u64,
        identifier: &str,
    ) -> RecordHeader {
        RecordHeader {
            url: self.url,
            ip: self.ip,
            date: self.date,
            mimetype: self.mimetype,
            length: self.length,
            version,
            offset,
            identifier: identifier.to_string(),
            header_line: self.header_line,
        }
    }
}

fn read_preamble_line<R: BufRead + ?Sized>(reader: &mut R, offset: u64) -> Result<(String, u64)> {
    let (line, terminated) = read_bounded_line(reader, offset)?;
    if !terminated {
        return Err(ArcError::Truncated {
            offset,
            reason: "end of stream inside first record preamble".to_string(),
        });
    }
    Ok((decode_line(trim_eol(&line)), line.len() as u64))
}

/// `1 1 InternetArchive` → `1.1`
fn version_from_producer_line(line: &str, strict: bool, offset: u64) -> Result<String> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) if is_number(major) && is_number(minor) => {
            Ok(format!("{}.{}", major, minor))
        }
        _ if strict => Err(ArcError::MalformedHeader {
            offset,
            reason: format!("unreadable version line: {:?}", line),
        }),
        _ => {
            tracing::warn!(offset, line, "Unreadable version line, assuming default");
            Ok(crate::format::DEFAULT_VERSION.to_string())
        }
    }
}

// =============================================================================
// Writing Side
// =============================================================================

/// Build a header line in wire order, without the terminator.
pub fn format_header_line(url: &str, ip: &str, date: &str, mimetype: &str, length: u64) -> String {
    format!("{} {} {} {} {}", url, ip, date, mimetype, length)
}

/// Lines two and three of the first record, each preceded by a terminator.
pub fn descriptor_preamble(has_metadata: bool) -> String {
    format!(
        "\n{} {}\n{}\n",
        version_for(has_metadata).replace('.', " "),
        PRODUCER_NAME,
        FIELD_NAMES_LINE
    )
}

/// Check a generated header line: five non-empty fields separated by single
/// spaces, no other whitespace, within the maximum line length.
pub fn validate_header_line(line: &str) -> Result<()> {
    if line.len() + 1 > MAX_HEADER_LINE_LENGTH {
        return Err(ArcError::InvalidHeaderLine(format!(
            "header line of {} bytes exceeds {}",
            line.len(),
            MAX_HEADER_LINE_LENGTH
        )));
    }
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR as char).collect();
    let well_formed = fields.len() == VERSION_1_FIELD_COUNT
        && fields
            .iter()
            .all(|f| !f.is_empty() && !f.chars().any(char::is_whitespace));
    if !well_formed {
        return Err(ArcError::InvalidHeaderLine(line.to_string()));
    }
    Ok(())
}

/// Cut a media type at the first whitespace, `;` or `,`.
pub fn truncate_mimetype(mimetype: Option<&str>) -> String {
    let trimmed = mimetype.map(str::trim).unwrap_or("");
    let cut = trimmed
        .split(|c: char| c.is_whitespace() || c == ';' || c == ',')
        .next()
        .unwrap_or("");
    if cut.is_empty() {
        NO_TYPE_MIMETYPE.to_string()
    } else {
        cut.to_string()
    }
}
