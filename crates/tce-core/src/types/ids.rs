//! Identifier types for TESS targets and sectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// TESS Input Catalog identifier.
///
/// Parses plain integers, the `TIC 123` form used by the archive, and
/// integral floats such as `123.0` that spreadsheet exports produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicId(u64);

impl TicId {
    /// Creates a TIC id from its numeric value.
    ///
    /// # Examples
    ///
    /// ```
    /// use tce_core::TicId;
    ///
    /// let tic = TicId::new(25155310);
    /// assert_eq!(tic.to_string(), "TIC 25155310");
    /// ```
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric id.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// The `target_name` MAST stores for this TIC (the bare number).
    pub fn target_name(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for TicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TIC {}", self.0)
    }
}

impl From<u64> for TicId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for TicId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("TIC")
            .or_else(|| trimmed.strip_prefix("tic"))
            .map(|rest| rest.trim_start_matches(['-', '_', ' ']))
            .unwrap_or(trimmed);

        if let Ok(id) = digits.parse::<u64>() {
            return Ok(Self(id));
        }

        // Integer columns with missing values are often exported as floats
        match digits.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
                Ok(Self(f as u64))
            }
            _ => Err(Error::validation_field(
                "tic_id",
                format!("invalid TIC id '{trimmed}'"),
            )),
        }
    }
}

/// TESS observing sector (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Sector(u16);

impl Sector {
    /// Creates a sector, rejecting zero.
    pub fn new(sector: u16) -> Result<Self> {
        if sector == 0 {
            return Err(Error::validation_field("sector", "sectors start at 1"));
        }
        Ok(Self(sector))
    }

    /// Returns the sector number.
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Sector {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Sector> for u16 {
    fn from(sector: Sector) -> Self {
        sector.0
    }
}

impl FromStr for Sector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let value = trimmed.parse::<u16>().ok().or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u16::MAX))
                .map(|f| f as u16)
        });
        match value {
            Some(v) => Self::new(v),
            None => Err(Error::validation_field(
                "sector",
                format!("invalid sector '{trimmed}'"),
            )),
        }
    }
}

/// A sorted, deduplicated, non-empty set of sectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorSet(Vec<Sector>);

impl SectorSet {
    /// Builds a set from sectors. Returns `None` when `sectors` is empty.
    pub fn new(sectors: impl IntoIterator<Item = Sector>) -> Option<Self> {
        let mut sectors: Vec<Sector> = sectors.into_iter().collect();
        sectors.sort_unstable();
        sectors.dedup();
        if sectors.is_empty() {
            None
        } else {
            Some(Self(sectors))
        }
    }

    /// A set holding exactly one sector.
    pub fn single(sector: Sector) -> Self {
        Self(vec![sector])
    }

    /// Parses a catalogue cell.
    ///
    /// Accepts `[14, 15]`, `(14,15)`, `14, 15`, `14 15` and `14`. Cells that
    /// mean "no sectors" (empty, `nan`, `none`, `null`, `[]`) yield
    /// `Ok(None)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tce_core::SectorSet;
    ///
    /// let set = SectorSet::parse("[15, 14, 14]").unwrap().unwrap();
    /// assert_eq!(set.to_string(), "[14, 15]");
    /// assert!(SectorSet::parse("nan").unwrap().is_none());
    /// ```
    pub fn parse(cell: &str) -> Result<Option<Self>> {
        let trimmed = cell.trim();
        if matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "" | "nan" | "none" | "null" | "[]" | "()"
        ) {
            return Ok(None);
        }

        let inner = trimmed
            .trim_start_matches(['[', '('])
            .trim_end_matches([']', ')']);

        let sectors = inner
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(str::parse::<Sector>)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(sectors))
    }

    /// Sectors in ascending order.
    pub fn as_slice(&self) -> &[Sector] {
        &self.0
    }

    /// Number of sectors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `sector` is in the set.
    pub fn contains(&self, sector: Sector) -> bool {
        self.0.binary_search(&sector).is_ok()
    }

    /// Iterates over the sectors.
    pub fn iter(&self) -> impl Iterator<Item = Sector> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for SectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, sector) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{sector}")?;
        }
        write!(f, "]")
    }
}
