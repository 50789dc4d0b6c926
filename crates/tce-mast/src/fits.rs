//! Minimal FITS primary-header reader.
//!
//! A FITS header is a sequence of 80-byte ASCII cards packed into
//! 2880-byte blocks and terminated by an `END` card. Only the primary
//! header is read; data units are never touched.

use std::collections::BTreeMap;
use std::path::Path;

use tce_core::{Error, Result, Sector, TicId};
use tokio::io::AsyncReadExt;

/// Bytes per header card.
pub const CARD_LEN: usize = 80;

/// Bytes per header block.
pub const BLOCK_LEN: usize = 2880;

/// Upper bound on primary header blocks read from disk.
const MAX_HEADER_BLOCKS: usize = 64;

/// Parsed primary header keywords.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: BTreeMap<String, String>,
}

impl FitsHeader {
    /// Parses header cards up to `END`.
    ///
    /// The first card must be `SIMPLE = T`. Errors name `origin` (usually the
    /// file path) so messages point at the offending file.
    pub fn parse(bytes: &[u8], origin: &Path) -> Result<Self> {
        let mut cards = BTreeMap::new();
        let mut saw_end = false;

        for (i, card) in bytes.chunks(CARD_LEN).enumerate() {
            if card.len() < CARD_LEN {
                break;
            }
            if !card.iter().all(|b| (0x20..=0x7e).contains(b)) {
                return Err(Error::invalid_fits(
                    origin,
                    format!("non-ASCII bytes in header card {}", i + 1),
                ));
            }
            // Checked above: every byte is printable ASCII
            let text = std::str::from_utf8(card).unwrap_or_default();
            let keyword = text[..8].trim_end();

            if i == 0 && keyword != "SIMPLE" {
                return Err(Error::invalid_fits(origin, "first card is not SIMPLE"));
            }
            if keyword == "END" {
                saw_end = true;
                break;
            }
            if keyword.is_empty() || &text[8..10] != "= " {
                // COMMENT, HISTORY, blank and continuation cards carry no value
                continue;
            }
            cards.insert(keyword.to_string(), parse_value(&text[10..]));
        }

        if !saw_end {
            return Err(Error::invalid_fits(origin, "header has no END card"));
        }
        if cards.get("SIMPLE").map(String::as_str) != Some("T") {
            return Err(Error::invalid_fits(origin, "SIMPLE is not T"));
        }

        Ok(Self { cards })
    }

    /// Reads and parses the primary header of a file.
    pub async fn read(path: &Path) -> Result<Self> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io_with_path(e, path))?;

        let mut buffer = Vec::with_capacity(BLOCK_LEN * 2);
        let mut block = vec![0u8; BLOCK_LEN];

        for _ in 0..MAX_HEADER_BLOCKS {
            let n = read_block(&mut file, &mut block)
                .await
                .map_err(|e| Error::io_with_path(e, path))?;
            if n < BLOCK_LEN {
                buffer.extend_from_slice(&block[..n]);
                break;
            }
            buffer.extend_from_slice(&block);
            if block.chunks(CARD_LEN).any(|card| card.starts_with(b"END ")) {
                break;
            }
        }

        if buffer.len() < BLOCK_LEN {
            return Err(Error::invalid_fits(
                path,
                format!("file is {} bytes, shorter than one header block", buffer.len()),
            ));
        }

        Self::parse(&buffer, path)
    }

    /// Raw value of a keyword (strings unquoted, comments stripped).
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.cards.get(keyword).map(String::as_str)
    }

    /// Integer value of a keyword.
    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        self.get(keyword)?.parse().ok()
    }

    /// Number of valued keywords.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Returns `true` if no valued keywords were found.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Checks the `TICID` and `SECTOR` keywords, when present, against the
    /// expected target and sector.
    pub fn verify_light_curve(&self, origin: &Path, tic: TicId, sector: Sector) -> Result<()> {
        if let Some(found) = self.get_int("TICID") {
            if found < 0 || found as u64 != tic.get() {
                return Err(Error::invalid_fits(
                    origin,
                    format!("TICID {found} does not match {tic}"),
                ));
            }
        }
        if let Some(found) = self.get_int("SECTOR") {
            if found != i64::from(sector.get()) {
                return Err(Error::invalid_fits(
                    origin,
                    format!("SECTOR {found} does not match sector {sector}"),
                ));
            }
        }
        Ok(())
    }
}

async fn read_block(file: &mut tokio::fs::File, block: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        let n = file.read(&mut block[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn parse_value(field: &str) -> String {
    let field = field.trim_start();
    if let Some(rest) = field.strip_prefix('\'') {
        // Quoted string; '' is an escaped quote
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        return out.trim_end().to_string();
    }
    field
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Builds a minimal primary header, padded to a whole block.
///
/// Used by tests across the workspace to fabricate light-curve files.
pub fn build_header(cards: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BLOCK_LEN);
    let mut push = |text: String| {
        let mut bytes = text.into_bytes();
        bytes.resize(CARD_LEN, b' ');
        out.extend_from_slice(&bytes[..CARD_LEN]);
    };
    push(format!("{:<8}= {:>20}", "SIMPLE", "T"));
    for (keyword, value) in cards {
        push(format!("{keyword:<8}= {value:>20}"));
    }
    push("END".to_string());
    let padded = out.len().div_ceil(BLOCK_LEN) * BLOCK_LEN;
    out.resize(padded, b' ');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn origin() -> PathBuf {
        PathBuf::from("test.fits")
    }

    #[test]
    fn test_parse_minimal_header() {
        let bytes = build_header(&[("TICID", "25155310"), ("SECTOR", "1"), ("OBJECT", "'TIC 25155310'")]);
        let header = FitsHeader::parse(&bytes, &origin()).unwrap();
        assert_eq!(header.get("SIMPLE"), Some("T"));
        assert_eq!(header.get_int("TICID"), Some(25155310));
        assert_eq!(header.get_int("SECTOR"), Some(1));
        assert_eq!(header.get("OBJECT"), Some("TIC 25155310"));
    }

    #[test]
    fn test_parse_rejects_non_fits() {
        let err = FitsHeader::parse(b"<html>Service Unavailable</html>", &origin()).unwrap_err();
        assert!(matches!(err, Error::InvalidFits { .. }));

        let mut html = b"<!DOCTYPE html>".to_vec();
        html.resize(BLOCK_LEN, b' ');
        let err = FitsHeader::parse(&html, &origin()).unwrap_err();
        assert!(err.to_string().contains("first card is not SIMPLE"));
    }

    #[test]
    fn test_parse_requires_end() {
        let mut bytes = build_header(&[]);
        // Blank out the END card
        bytes[CARD_LEN..CARD_LEN * 2].fill(b' ');
        let err = FitsHeader::parse(&bytes, &origin()).unwrap_err();
        assert!(err.to_string().contains("no END card"));
    }

    #[test]
    fn test_value_comments_and_quotes() {
        assert_eq!(parse_value("                 120 / exposure [s]"), "120");
        assert_eq!(parse_value("'O''Brien  '  / name"), "O'Brien");
        assert_eq!(parse_value("'a/b'"), "a/b");
    }

    #[test]
    fn test_verify_light_curve() {
        let bytes = build_header(&[("TICID", "42"), ("SECTOR", "7")]);
        let header = FitsHeader::parse(&bytes, &origin()).unwrap();
        let s7 = Sector::new(7).unwrap();

        assert!(header.verify_light_curve(&origin(), TicId::new(42), s7).is_ok());

        let err = header
            .verify_light_curve(&origin(), TicId::new(43), s7)
            .unwrap_err();
        assert!(err.to_string().contains("TICID 42 does not match TIC 43"));

        let err = header
            .verify_light_curve(&origin(), TicId::new(42), Sector::new(8).unwrap())
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_read_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lc.fits");
        let mut bytes = build_header(&[("TICID", "9")]);
        bytes.extend(std::iter::repeat_n(0u8, BLOCK_LEN));
        std::fs::write(&path, &bytes).unwrap();

        let header = FitsHeader::read(&path).await.unwrap();
        assert_eq!(header.get_int("TICID"), Some(9));
    }

    #[tokio::test]
    async fn test_read_short_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("short.fits");
        std::fs::write(&path, b"SIMPLE  =").unwrap();
        let err = FitsHeader::read(&path).await.unwrap_err();
        assert!(err.to_string().contains("shorter than one header block"));
    }
}
