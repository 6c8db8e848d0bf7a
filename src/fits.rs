//! # Minimal FITS reader
//!
//! Reads the **primary HDU** of a FITS file: the header cards and a two-dimensional image.
//! This is all the frame archive needs, since calibrated SDSS frames store the image and its
//! celestial WCS in the primary HDU. Extensions that follow are ignored.
//!
//! ## Layout
//! -----------------
//! * The header is a sequence of 80-byte ASCII cards packed in 2880-byte blocks, terminated
//!   by an `END` card.
//! * The data unit starts at the next block boundary. Samples are big-endian with the type
//!   given by `BITPIX` (`8`, `16`, `32`, `-32`, `-64`) and are scaled by `BZERO + BSCALE·v`.
//! * `NAXIS1` is the fastest-varying axis (x, columns) and `NAXIS2` the slowest (y, rows), so
//!   the returned matrix has `NAXIS2` rows and `NAXIS1` columns and is indexed `(y, x)`.
use std::sync::LazyLock;

use nalgebra::DMatrix;
use regex::Regex;

use crate::GalaxyError;

const BLOCK: usize = 2880;
const CARD: usize = 80;

static STRING_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'((?:[^']|'')*)'").expect("valid FITS string regex"));

/// Value of one header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Empty,
}

/// Ordered header cards of one HDU. Commentary cards (`COMMENT`, `HISTORY`, blank) are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<(String, HeaderValue)>,
}

impl FitsHeader {
    pub fn new(cards: Vec<(String, HeaderValue)>) -> Self {
        FitsHeader { cards }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Numeric keyword, integers are widened.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            HeaderValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn require_i64(&self, key: &str) -> Result<i64, GalaxyError> {
        self.get_i64(key)
            .ok_or_else(|| GalaxyError::InvalidFrame(format!("missing integer keyword {key}")))
    }
}

/// Primary HDU image and header.
#[derive(Debug, Clone)]
pub struct FitsImage {
    pub header: FitsHeader,
    pub data: DMatrix<f32>,
}

fn parse_value(raw: &str) -> HeaderValue {
    let raw = raw.trim_start();
    if let Some(caps) = STRING_VALUE.captures(raw) {
        // trailing blanks are not significant in FITS strings
        return HeaderValue::Str(caps[1].replace("''", "'").trim_end().to_string());
    }
    let value = raw.split('/').next().unwrap_or("").trim();
    match value {
        "" => HeaderValue::Empty,
        "T" => HeaderValue::Bool(true),
        "F" => HeaderValue::Bool(false),
        v => {
            if let Ok(i) = v.parse::<i64>() {
                HeaderValue::Int(i)
            } else if let Ok(f) = v.replace(['D', 'd'], "E").parse::<f64>() {
                HeaderValue::Float(f)
            } else {
                HeaderValue::Str(v.to_string())
            }
        }
    }
}

/// Parse header cards from the start of `bytes`.
///
/// Return
/// ----------
/// * The header and the byte offset of the data unit (a multiple of 2880).
pub fn parse_header(bytes: &[u8]) -> Result<(FitsHeader, usize), GalaxyError> {
    let mut cards = Vec::new();
    let mut offset = 0;

    loop {
        let card = bytes
            .get(offset..offset + CARD)
            .ok_or_else(|| GalaxyError::InvalidFrame("header has no END card".to_string()))?;
        offset += CARD;

        if !card.is_ascii() {
            return Err(GalaxyError::InvalidFrame(
                "non-ASCII header card".to_string(),
            ));
        }
        let card = std::str::from_utf8(card)
            .map_err(|_| GalaxyError::InvalidFrame("non-ASCII header card".to_string()))?;
        let key = card[..8].trim_end();

        if key == "END" {
            break;
        }
        if key.is_empty() || key == "COMMENT" || key == "HISTORY" {
            continue;
        }
        if &card[8..10] == "= " {
            cards.push((key.to_string(), parse_value(&card[10..])));
        }
    }

    let data_start = offset.div_ceil(BLOCK) * BLOCK;
    Ok((FitsHeader { cards }, data_start))
}

/// Decode the primary HDU of a FITS file held in memory.
pub fn read_primary_image(bytes: &[u8]) -> Result<FitsImage, GalaxyError> {
    let (header, data_start) = parse_header(bytes)?;

    if header.get("SIMPLE") != Some(&HeaderValue::Bool(true)) {
        return Err(GalaxyError::InvalidFrame(
            "not a FITS file (SIMPLE = T missing)".to_string(),
        ));
    }
    let naxis = header.require_i64("NAXIS")?;
    if naxis != 2 {
        return Err(GalaxyError::InvalidFrame(format!(
            "expected a 2D image, NAXIS = {naxis}"
        )));
    }
    let bitpix = header.require_i64("BITPIX")?;
    let width = usize::try_from(header.require_i64("NAXIS1")?)
        .map_err(|_| GalaxyError::InvalidFrame("negative NAXIS1".to_string()))?;
    let height = usize::try_from(header.require_i64("NAXIS2")?)
        .map_err(|_| GalaxyError::InvalidFrame("negative NAXIS2".to_string()))?;

    let sample_size = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        -64 => 8,
        other => {
            return Err(GalaxyError::InvalidFrame(format!(
                "unsupported BITPIX {other}"
            )))
        }
    };

    let data_end = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(sample_size))
        .and_then(|len| data_start.checked_add(len))
        .ok_or_else(|| {
            GalaxyError::InvalidFrame(format!("image size {width}x{height} overflows"))
        })?;
    let raw = bytes
        .get(data_start..data_end)
        .ok_or_else(|| {
            GalaxyError::InvalidFrame(format!(
                "truncated data unit: {width}x{height} samples of {sample_size} bytes expected"
            ))
        })?;

    let bscale = header.get_f64("BSCALE").unwrap_or(1.0);
    let bzero = header.get_f64("BZERO").unwrap_or(0.0);
    let scale = |v: f64| (bzero + bscale * v) as f32;

    let samples: Vec<f32> = raw
        .chunks_exact(sample_size)
        .map(|c| match bitpix {
            8 => scale(c[0] as f64),
            16 => scale(i16::from_be_bytes([c[0], c[1]]) as f64),
            32 => scale(i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64),
            -32 => scale(f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64),
            _ => scale(f64::from_be_bytes([
                c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7],
            ])),
        })
        .collect();

    Ok(FitsImage {
        header,
        data: DMatrix::from_row_slice(height, width, &samples),
    })
}

/// Test helper building an in-memory FITS file.
#[cfg(test)]
pub(crate) fn encode_f32_fits(extra_cards: &[&str], width: usize, height: usize, data: &[f32]) -> Vec<u8> {
    let mut cards = vec![
        "SIMPLE  =                    T".to_string(),
        "BITPIX  =                  -32".to_string(),
        "NAXIS   =                    2".to_string(),
        format!("NAXIS1  = {width:>20}"),
        format!("NAXIS2  = {height:>20}"),
    ];
    cards.extend(extra_cards.iter().map(|c| c.to_string()));
    cards.push("END".to_string());

    let mut bytes: Vec<u8> = cards
        .iter()
        .flat_map(|c| format!("{c:<80}").into_bytes())
        .collect();
    bytes.resize(bytes.len().div_ceil(BLOCK) * BLOCK, b' ');
    for v in data {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    bytes.resize(bytes.len().div_ceil(BLOCK) * BLOCK, 0);
    bytes
}
