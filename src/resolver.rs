//! # Catalog resolution
//!
//! Turns a target specification into a catalog object identifier, then an identifier into the
//! [`ImagingDescriptor`] needed to locate and size its cutouts.
//!
//! ## Expanding-radius search
//! -----------------
//! [`Resolver::resolve_nearest`] looks for the nearest galaxy to a sky position with a series of
//! cheap, narrow queries before falling back to a wide one:
//!
//! ```text
//! radius = 1'
//! while radius < max_radius:
//!     hit = nearest within radius   → return on first hit
//!     radius *= 2
//! hit = nearest within max_radius    → return hit, or None
//! ```
//!
//! The returned object is the nearest one at the **smallest sufficient radius**, not
//! necessarily the globally nearest object within `max_radius`. The number of queries is
//! bounded by `ceil(log2(max_radius)) + 1`, and at least one query is always issued. No query
//! is repeated: the doubling loop never reaches `max_radius` itself, which is probed exactly
//! once by the closing query.
//!
//! An empty result is a valid outcome (`Ok(None)`), not an error.
use tracing::{debug, trace};

use crate::{
    catalog::{random_field, Catalog, CatalogQuery, SearchConstraints},
    constants::{ArcMin, ArcSec, Degree, ObjId, INITIAL_SEARCH_RADIUS},
    frames::FrameId,
    galaxy::Target,
    GalaxyError,
};

/// Imaging metadata of one catalog object.
///
/// Fields
/// -----------------
/// * `run`, `camcol`, `field` – identify the source frame.
/// * `ra`, `dec` – object position (degrees).
/// * `angular_size` – r-band Petrosian radius (arcseconds), used to size cutouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagingDescriptor {
    pub run: u32,
    pub camcol: u8,
    pub field: u32,
    pub ra: Degree,
    pub dec: Degree,
    pub angular_size: ArcSec,
}

impl ImagingDescriptor {
    pub fn frame_id(&self) -> FrameId {
        FrameId {
            run: self.run,
            camcol: self.camcol,
            field: self.field,
        }
    }
}

/// Catalog Resolver and Imaging Metadata Fetcher over any [`Catalog`].
#[derive(Debug, Clone)]
pub struct Resolver<C> {
    catalog: C,
}

impl<C: Catalog> Resolver<C> {
    pub fn new(catalog: C) -> Self {
        Resolver { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Draw one galaxy satisfying `constraints`, in randomized order.
    ///
    /// Return
    /// ----------
    /// * The object identifier, or [`GalaxyError::NotFound`] when no row matches.
    pub async fn resolve_by_constraints(
        &self,
        constraints: &SearchConstraints,
    ) -> Result<ObjId, GalaxyError> {
        let field = constraints
            .random_field
            .then(|| random_field(&mut rand::rng()));
        let query = CatalogQuery::Random {
            constraints: *constraints,
            field,
        };

        let rows = self.catalog.query(&query).await?;
        let row = rows.first().ok_or_else(|| {
            GalaxyError::NotFound(format!("no galaxy matches {constraints:?} in {field:?}"))
        })?;
        let id = row.get_i64("objid")?;
        debug!(objid = id, "random galaxy drawn");
        Ok(id)
    }

    /// Resolve a sky position to the nearest galaxy with the expanding-radius search.
    ///
    /// Arguments
    /// -----------------
    /// * `ra`, `dec`: position in degrees.
    /// * `max_radius`: largest radius probed, in arcminutes (must be > 0).
    ///
    /// Return
    /// ----------
    /// * `Ok(Some(id))` on the first hit, `Ok(None)` when nothing lies within `max_radius`.
    /// * [`GalaxyError::InvalidInput`] for a non-positive radius, or any transport error.
    pub async fn resolve_nearest(
        &self,
        ra: Degree,
        dec: Degree,
        max_radius: ArcMin,
    ) -> Result<Option<ObjId>, GalaxyError> {
        if !(max_radius.is_finite() && max_radius > 0.0) {
            return Err(GalaxyError::InvalidInput(format!(
                "max search radius must be > 0, got {max_radius}"
            )));
        }

        let mut radius = INITIAL_SEARCH_RADIUS;
        while radius < max_radius {
            if let Some(id) = self.nearest_within(ra, dec, radius).await? {
                return Ok(Some(id));
            }
            radius *= 2.0;
        }

        self.nearest_within(ra, dec, max_radius).await
    }

    async fn nearest_within(
        &self,
        ra: Degree,
        dec: Degree,
        radius: ArcMin,
    ) -> Result<Option<ObjId>, GalaxyError> {
        trace!(ra, dec, radius, "nearby query");
        let rows = self
            .catalog
            .query(&CatalogQuery::Nearby { ra, dec, radius })
            .await?;
        rows.first().map(|row| row.get_i64("objid")).transpose()
    }

    /// Resolve any [`Target`] to an identifier.
    ///
    /// Explicit identifiers are returned as-is; coordinate targets use
    /// [`resolve_nearest`](Resolver::resolve_nearest) with the target's own radius or
    /// `default_radius`.
    pub async fn resolve_target(
        &self,
        target: &Target,
        default_radius: ArcMin,
    ) -> Result<Option<ObjId>, GalaxyError> {
        match *target {
            Target::ObjectId(id) => Ok(Some(id)),
            Target::Coordinates {
                ra,
                dec,
                max_radius,
            } => {
                self.resolve_nearest(ra, dec, max_radius.unwrap_or(default_radius))
                    .await
            }
            Target::Random(constraints) => self.resolve_by_constraints(&constraints).await.map(Some),
        }
    }

    /// Fetch the imaging metadata of a known object.
    ///
    /// Return
    /// ----------
    /// * The [`ImagingDescriptor`], or [`GalaxyError::NotFound`] for an unknown identifier.
    pub async fn describe(&self, id: ObjId) -> Result<ImagingDescriptor, GalaxyError> {
        let rows = self.catalog.query(&CatalogQuery::ObjectById(id)).await?;
        let row = rows
            .first()
            .ok_or_else(|| GalaxyError::NotFound(format!("objid = {id}")))?;

        let narrow = |name: &str, v: i64| {
            GalaxyError::MalformedResponse(format!("column '{name}' out of range: {v}"))
        };
        let run = row.get_i64("run")?;
        let camcol = row.get_i64("camcol")?;
        let field = row.get_i64("field")?;

        Ok(ImagingDescriptor {
            run: u32::try_from(run).map_err(|_| narrow("run", run))?,
            camcol: u8::try_from(camcol).map_err(|_| narrow("camcol", camcol))?,
            field: u32::try_from(field).map_err(|_| narrow("field", field))?,
            ra: row.get_f64("ra")?,
            dec: row.get_f64("dec")?,
            angular_size: row.get_f64("petroRad_r")?,
        })
    }
}
