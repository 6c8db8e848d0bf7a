//! # Photometric bands
//!
//! The five SDSS filters `u, g, r, i, z` and a validated subset of them.
//!
//! [`Band::ALL`] fixes the **canonical order** used everywhere results are reassembled:
//! per-band outputs are always keyed by [`Band::index`], never appended in arrival order.
//!
//! A [`BandSelection`] is parsed from a compact string such as `"gri"`. Unknown letters are
//! rejected with [`GalaxyError::InvalidInput`] before any network activity takes place.
use std::{fmt, str::FromStr};

use crate::gmag_errors::GalaxyError;

/// One SDSS wavelength filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
}

impl Band {
    /// All bands in canonical order.
    pub const ALL: [Band; 5] = [Band::U, Band::G, Band::R, Band::I, Band::Z];

    /// Position of the band in [`Band::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Single lowercase letter used in archive file names.
    pub fn letter(self) -> char {
        match self {
            Band::U => 'u',
            Band::G => 'g',
            Band::R => 'r',
            Band::I => 'i',
            Band::Z => 'z',
        }
    }

    pub fn from_letter(c: char) -> Result<Self, GalaxyError> {
        match c.to_ascii_lowercase() {
            'u' => Ok(Band::U),
            'g' => Ok(Band::G),
            'r' => Ok(Band::R),
            'i' => Ok(Band::I),
            'z' => Ok(Band::Z),
            other => Err(GalaxyError::InvalidInput(format!(
                "unknown band '{other}', expected one of u, g, r, i, z"
            ))),
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A non-empty subset of [`Band::ALL`], always iterated in canonical order.
///
/// Duplicated letters collapse (`"ggr"` selects `g` and `r`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSelection {
    selected: [bool; 5],
}

impl BandSelection {
    /// Every band.
    pub fn all() -> Self {
        BandSelection {
            selected: [true; 5],
        }
    }

    pub fn contains(&self, band: Band) -> bool {
        self.selected[band.index()]
    }

    /// Selected bands in canonical order.
    pub fn bands(&self) -> impl Iterator<Item = Band> + '_ {
        Band::ALL.into_iter().filter(|b| self.contains(*b))
    }

    pub fn len(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether all five bands are selected.
    pub fn is_full(&self) -> bool {
        self.len() == Band::ALL.len()
    }
}

impl Default for BandSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for BandSelection {
    type Err = GalaxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut selected = [false; 5];
        for c in s.chars().filter(|c| !c.is_whitespace() && *c != ',') {
            selected[Band::from_letter(c)?.index()] = true;
        }
        if !selected.iter().any(|s| *s) {
            return Err(GalaxyError::InvalidInput(
                "band selection is empty".to_string(),
            ));
        }
        Ok(BandSelection { selected })
    }
}

impl fmt::Display for BandSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for band in self.bands() {
            write!(f, "{band}")?;
        }
        Ok(())
    }
}
