//! # World-to-pixel transforms
//!
//! The cutout geometry only needs one capability from a frame's coordinate system: mapping a
//! sky position to a pixel position. That capability is the [`WorldToPixel`] trait.
//!
//! [`TanWcs`] implements it for the gnomonic (`TAN`) projection used by SDSS frames, built from
//! the `CRVAL`, `CRPIX` and `CD` (or `CDELT`/`PC`) keywords of a FITS header.
//!
//! ## Header fix-ups
//! -----------------
//! Archive headers often carry deprecated or incomplete keywords which a strict reader would
//! complain about: `RADECSYS` instead of `RADESYS`, a missing `EQUINOX`, an old `dd/mm/yy`
//! `DATE-OBS`, scale given as `CDELT` rather than `CD`. [`TanWcs::from_header`] repairs them
//! and reports what it did as a list of [`WcsFixup`]. [`TanWcs::from_header_quiet`] is the
//! boundary where those notes are dropped: nothing outside that single call ever sees them.
//!
//! Pixel coordinates are **0-based** (the centre of the first pixel is `(0, 0)`).
use nalgebra::{Matrix2, Vector2};

use crate::{
    constants::{Degree, Pixel, RADEG},
    fits::FitsHeader,
    GalaxyError,
};

/// Maps sky coordinates to continuous pixel coordinates of one frame.
pub trait WorldToPixel: Send + Sync {
    /// Return `(x, y)` for `(ra, dec)` in degrees, or `None` when the point cannot be projected.
    fn world_to_pixel(&self, ra: Degree, dec: Degree) -> Option<(Pixel, Pixel)>;
}

/// A repair applied while reading WCS keywords.
#[derive(Debug, Clone, PartialEq)]
pub enum WcsFixup {
    DeprecatedKeyword { found: String, replacement: String },
    MissingEquinox,
    ObsoleteDateFormat(String),
    CdeltConvertedToCd,
}

/// Gnomonic projection.
#[derive(Debug, Clone, PartialEq)]
pub struct TanWcs {
    /// Reference sky position (degrees).
    pub crval: (Degree, Degree),
    /// Reference pixel, 1-based as stored in the header.
    pub crpix: (Pixel, Pixel),
    cd_inv: Matrix2<f64>,
}

impl TanWcs {
    /// Build from explicit keywords.
    ///
    /// Arguments
    /// -----------------
    /// * `crval`: reference `(ra, dec)` in degrees.
    /// * `crpix`: 1-based reference pixel.
    /// * `cd`: linear transform from pixel offsets to intermediate world coordinates (degrees),
    ///   row-major `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`.
    ///
    /// Return
    /// ----------
    /// * [`GalaxyError::InvalidFrame`] if `cd` is singular.
    pub fn new(
        crval: (Degree, Degree),
        crpix: (Pixel, Pixel),
        cd: [[f64; 2]; 2],
    ) -> Result<Self, GalaxyError> {
        let cd = Matrix2::new(cd[0][0], cd[0][1], cd[1][0], cd[1][1]);
        let cd_inv = cd
            .try_inverse()
            .ok_or_else(|| GalaxyError::InvalidFrame("singular CD matrix".to_string()))?;
        Ok(TanWcs {
            crval,
            crpix,
            cd_inv,
        })
    }

    /// Read a TAN WCS from header keywords, reporting every repair made.
    pub fn from_header(header: &FitsHeader) -> Result<(Self, Vec<WcsFixup>), GalaxyError> {
        let mut fixups = Vec::new();

        let ctype1 = header.get_str("CTYPE1").unwrap_or("");
        let ctype2 = header.get_str("CTYPE2").unwrap_or("");
        if !(ctype1.starts_with("RA---TAN") && ctype2.starts_with("DEC--TAN")) {
            return Err(GalaxyError::InvalidFrame(format!(
                "unsupported projection CTYPE1='{ctype1}' CTYPE2='{ctype2}'"
            )));
        }

        if header.contains("RADECSYS") && !header.contains("RADESYS") {
            fixups.push(WcsFixup::DeprecatedKeyword {
                found: "RADECSYS".to_string(),
                replacement: "RADESYS".to_string(),
            });
        }
        if !header.contains("EQUINOX") {
            fixups.push(WcsFixup::MissingEquinox);
        }
        if let Some(date) = header.get_str("DATE-OBS") {
            if date.len() == 8 && date.as_bytes()[2] == b'/' && date.as_bytes()[5] == b'/' {
                fixups.push(WcsFixup::ObsoleteDateFormat(date.to_string()));
            }
        }

        let key = |k: &str| {
            header
                .get_f64(k)
                .ok_or_else(|| GalaxyError::InvalidFrame(format!("missing WCS keyword {k}")))
        };

        let cd = if header.contains("CD1_1") {
            [
                [key("CD1_1")?, header.get_f64("CD1_2").unwrap_or(0.0)],
                [header.get_f64("CD2_1").unwrap_or(0.0), key("CD2_2")?],
            ]
        } else {
            fixups.push(WcsFixup::CdeltConvertedToCd);
            let (d1, d2) = (key("CDELT1")?, key("CDELT2")?);
            let pc = |k: &str, default: f64| header.get_f64(k).unwrap_or(default);
            [
                [d1 * pc("PC1_1", 1.0), d1 * pc("PC1_2", 0.0)],
                [d2 * pc("PC2_1", 0.0), d2 * pc("PC2_2", 1.0)],
            ]
        };

        let wcs = TanWcs::new(
            (key("CRVAL1")?, key("CRVAL2")?),
            (key("CRPIX1")?, key("CRPIX2")?),
            cd,
        )?;
        Ok((wcs, fixups))
    }

    /// Read a TAN WCS from header keywords, discarding fix-up notes.
    pub fn from_header_quiet(header: &FitsHeader) -> Result<Self, GalaxyError> {
        let (wcs, _fixups) = Self::from_header(header)?;
        Ok(wcs)
    }
}

impl WorldToPixel for TanWcs {
    fn world_to_pixel(&self, ra: Degree, dec: Degree) -> Option<(Pixel, Pixel)> {
        let (a, d) = (ra * RADEG, dec * RADEG);
        let (a0, d0) = (self.crval.0 * RADEG, self.crval.1 * RADEG);
        let da = a - a0;

        let cos_c = d0.sin() * d.sin() + d0.cos() * d.cos() * da.cos();
        if cos_c <= 0.0 {
            // opposite hemisphere
            return None;
        }

        let xi = d.cos() * da.sin() / cos_c / RADEG;
        let eta = (d0.cos() * d.sin() - d0.sin() * d.cos() * da.cos()) / cos_c / RADEG;

        let offset = self.cd_inv * Vector2::new(xi, eta);
        let x = offset.x + self.crpix.0 - 1.0;
        let y = offset.y + self.crpix.1 - 1.0;
        (x.is_finite() && y.is_finite()).then_some((x, y))
    }
}

#[cfg(test)]
mod wcs_test {
    use approx::assert_relative_eq;

    use super::*;
    use crate::fits::HeaderValue;

    const PIX: f64 = 0.396 / 3600.0; // SDSS plate scale in degrees

    fn header(extra: Vec<(&str, HeaderValue)>) -> FitsHeader {
        let mut cards = vec![
            ("CTYPE1".to_string(), HeaderValue::Str("RA---TAN".into())),
            ("CTYPE2".to_string(), HeaderValue::Str("DEC--TAN".into())),
            ("CRVAL1".to_string(), HeaderValue::Float(180.0)),
            ("CRVAL2".to_string(), HeaderValue::Float(0.0)),
            ("CRPIX1".to_string(), HeaderValue::Float(1025.0)),
            ("CRPIX2".to_string(), HeaderValue::Float(745.0)),
        ];
        cards.extend(extra.into_iter().map(|(k, v)| (k.to_string(), v)));
        FitsHeader::new(cards)
    }

    #[test]
    fn test_reference_point_maps_to_crpix() {
        let wcs = TanWcs::new((180.0, 0.0), (1025.0, 745.0), [[PIX, 0.0], [0.0, PIX]]).unwrap();
        let (x, y) = wcs.world_to_pixel(180.0, 0.0).unwrap();
        assert_relative_eq!(x, 1024.0, epsilon = 1e-9);
        assert_relative_eq!(y, 744.0, epsilon = 1e-9);
    }

    #[test]
    fn test_small_offsets_scale_linearly() {
        let wcs = TanWcs::new((180.0, 0.0), (1025.0, 745.0), [[PIX, 0.0], [0.0, PIX]]).unwrap();
        let (x, y) = wcs.world_to_pixel(180.0 + 100.0 * PIX, 50.0 * PIX).unwrap();
        assert_relative_eq!(x, 1124.0, epsilon = 1e-3);
        assert_relative_eq!(y, 794.0, epsilon = 1e-3);
    }

    #[test]
    fn test_opposite_hemisphere_not_projected() {
        let wcs = TanWcs::new((180.0, 0.0), (1.0, 1.0), [[PIX, 0.0], [0.0, PIX]]).unwrap();
        assert!(wcs.world_to_pixel(0.0, 0.0).is_none());
    }

    #[test]
    fn test_singular_cd_rejected() {
        assert!(TanWcs::new((0.0, 0.0), (1.0, 1.0), [[1.0, 2.0], [2.0, 4.0]]).is_err());
    }

    #[test]
    fn test_header_with_cd_has_no_fixups() {
        let h = header(vec![
            ("CD1_1", HeaderValue::Float(PIX)),
            ("CD2_2", HeaderValue::Float(PIX)),
            ("EQUINOX", HeaderValue::Float(2000.0)),
            ("RADESYS", HeaderValue::Str("ICRS".into())),
        ]);
        let (wcs, fixups) = TanWcs::from_header(&h).unwrap();
        assert!(fixups.is_empty());
        assert_eq!(wcs.crval, (180.0, 0.0));
    }

    #[test]
    fn test_header_fixups_reported_then_suppressed() {
        let h = header(vec![
            ("CDELT1", HeaderValue::Float(PIX)),
            ("CDELT2", HeaderValue::Float(PIX)),
            ("RADECSYS", HeaderValue::Str("ICRS".into())),
            ("DATE-OBS", HeaderValue::Str("28/03/00".into())),
        ]);
        let (wcs, fixups) = TanWcs::from_header(&h).unwrap();
        assert_eq!(fixups.len(), 4);
        assert!(fixups.contains(&WcsFixup::CdeltConvertedToCd));
        assert!(fixups.contains(&WcsFixup::MissingEquinox));

        assert_eq!(TanWcs::from_header_quiet(&h).unwrap(), wcs);
    }

    #[test]
    fn test_non_tan_projection_rejected() {
        let h = FitsHeader::new(vec![
            ("CTYPE1".to_string(), HeaderValue::Str("RA---SIN".into())),
            ("CTYPE2".to_string(), HeaderValue::Str("DEC--SIN".into())),
        ]);
        assert!(matches!(
            TanWcs::from_header(&h),
            Err(GalaxyError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_missing_keyword_rejected() {
        let h = header(vec![("CD1_1", HeaderValue::Float(PIX))]);
        let err = TanWcs::from_header(&h).unwrap_err();
        assert_eq!(
            err,
            GalaxyError::InvalidFrame("missing WCS keyword CD2_2".into())
        );
    }
}
