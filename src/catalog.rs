//! # Catalog query service
//!
//! The resolver talks to the remote catalog through a single seam, the [`Catalog`] trait:
//! *run a [`CatalogQuery`], get back rows*. Query text construction and response decoding are
//! concerns of the concrete service, [`SkyServerCatalog`], which speaks to the SDSS SkyServer
//! SQL search endpoint.
//!
//! ## Queries
//! -----------------
//! * [`CatalogQuery::ObjectById`] – one row of imaging metadata
//!   (`run, camcol, field, ra, dec, petroRad_r`) for a known `objID`.
//! * [`CatalogQuery::Nearby`] – the nearest galaxy within a radius (arcminutes) of a sky position,
//!   ordered by distance.
//! * [`CatalogQuery::Random`] – one galaxy satisfying [`SearchConstraints`], in randomized order,
//!   optionally restricted to a 10° [`SkyField`].
//!
//! ## Response format
//! -----------------
//! SkyServer answers `format=json` requests with a list of tables:
//!
//! ```text
//! [ { "TableName": "Table1", "Rows": [ { "objid": 1237..., "distance": 0.12 } ] } ]
//! ```
//!
//! Only the first table is read. Columns are kept as JSON values in a [`CatalogRow`] and read
//! back through typed accessors.
use std::future::Future;

use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    constants::{ArcMin, ArcSec, Degree, ObjId, SKYSERVER_SQL_URL},
    http::HttpClient,
    GalaxyError,
};

/// Rectangular sky window, bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyField {
    pub ra_min: Degree,
    pub ra_max: Degree,
    pub dec_min: Degree,
    pub dec_max: Degree,
}

/// Quality predicates for randomly drawn galaxies.
///
/// Fields
/// -----------------
/// * `clean_only` – require the photometry `clean` flag.
/// * `min_petro_radius` – minimum r-band Petrosian radius (arcsec).
/// * `require_valid_errors` – require a positive r-band Petrosian radius error
///   (SkyServer stores `-9999` for failed measurements).
/// * `random_field` – restrict the draw to a random 10° field (see [`random_field`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConstraints {
    pub clean_only: bool,
    pub min_petro_radius: ArcSec,
    pub require_valid_errors: bool,
    pub random_field: bool,
}

impl Default for SearchConstraints {
    fn default() -> Self {
        SearchConstraints {
            clean_only: true,
            min_petro_radius: 5.0,
            require_valid_errors: true,
            random_field: true,
        }
    }
}

/// Parameterized catalog request.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogQuery {
    ObjectById(ObjId),
    Nearby {
        ra: Degree,
        dec: Degree,
        radius: ArcMin,
    },
    Random {
        constraints: SearchConstraints,
        field: Option<SkyField>,
    },
}

impl CatalogQuery {
    /// SkyServer SQL text for this query.
    pub fn to_sql(&self) -> String {
        match self {
            CatalogQuery::ObjectById(id) => format!(
                "SELECT run, camcol, field, ra, dec, petroRad_r FROM Galaxy WHERE objid = {id}"
            ),
            CatalogQuery::Nearby { ra, dec, radius } => format!(
                "SELECT TOP 1 g.objid, n.distance FROM Galaxy AS g \
                 JOIN dbo.fGetNearbyObjEq({ra:.8}, {dec:.8}, {radius}) AS n ON g.objid = n.objid \
                 ORDER BY n.distance"
            ),
            CatalogQuery::Random { constraints, field } => {
                let mut predicates = Vec::new();
                if constraints.clean_only {
                    predicates.push("g.clean = 1".to_string());
                }
                predicates.push(format!("g.petroRad_r > {}", constraints.min_petro_radius));
                if constraints.require_valid_errors {
                    predicates.push("g.petroRadErr_r > 0".to_string());
                }
                if let Some(f) = field {
                    predicates.push(format!("g.ra BETWEEN {} AND {}", f.ra_min, f.ra_max));
                    predicates.push(format!("g.dec BETWEEN {} AND {}", f.dec_min, f.dec_max));
                }
                format!(
                    "SELECT TOP 1 g.objid FROM Galaxy AS g WHERE {} ORDER BY NEWID()",
                    predicates.join(" AND ")
                )
            }
        }
    }
}

/// One result row, column name → JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogRow(pub Map<String, Value>);

impl CatalogRow {
    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        CatalogRow(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn column(&self, name: &str) -> Result<&Value, GalaxyError> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
            .ok_or_else(|| GalaxyError::MalformedResponse(format!("missing column '{name}'")))
    }

    /// Integer column; numeric strings are accepted since 64-bit ids are sometimes quoted.
    pub fn get_i64(&self, name: &str) -> Result<i64, GalaxyError> {
        let v = self.column(name)?;
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| {
                GalaxyError::MalformedResponse(format!("column '{name}' is not an integer: {v}"))
            })
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, GalaxyError> {
        let v = self.column(name)?;
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| {
                GalaxyError::MalformedResponse(format!("column '{name}' is not a number: {v}"))
            })
    }
}

/// A queryable catalog: run a query, return its rows.
pub trait Catalog: Send + Sync {
    fn query(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = Result<Vec<CatalogRow>, GalaxyError>> + Send;
}

/// [`Catalog`] backed by the SDSS SkyServer SQL search web service.
#[derive(Debug, Clone)]
pub struct SkyServerCatalog {
    http: HttpClient,
    url: String,
}

impl SkyServerCatalog {
    pub fn new(http: HttpClient) -> Self {
        Self::with_url(http, SKYSERVER_SQL_URL)
    }

    /// Use another SqlSearch endpoint (another data release or a mirror).
    pub fn with_url(http: HttpClient, url: &str) -> Self {
        SkyServerCatalog {
            http,
            url: url.to_string(),
        }
    }
}

impl Catalog for SkyServerCatalog {
    async fn query(&self, query: &CatalogQuery) -> Result<Vec<CatalogRow>, GalaxyError> {
        let sql = query.to_sql();
        debug!(sql = %sql, "catalog query");
        let body = self
            .http
            .get_text(&self.url, &[("cmd", sql), ("format", "json".to_string())])
            .await?;
        parse_sql_response(&body)
    }
}

/// One table of a SkyServer JSON response.
#[derive(Debug, Deserialize)]
struct SqlTable {
    #[serde(rename = "Rows")]
    rows: Vec<Map<String, Value>>,
}

/// Decode a SkyServer JSON response into the rows of its first table.
pub fn parse_sql_response(body: &str) -> Result<Vec<CatalogRow>, GalaxyError> {
    let tables: Vec<SqlTable> = serde_json::from_str(body.trim()).map_err(|e| {
        let head: String = body.chars().take(120).collect();
        GalaxyError::MalformedResponse(format!("{e}; body starts with: {head}"))
    })?;

    let table = tables.into_iter().next().ok_or_else(|| {
        GalaxyError::MalformedResponse("response holds no table".to_string())
    })?;
    Ok(table.rows.into_iter().map(CatalogRow).collect())
}

/// Whether an integer sky window origin falls inside a region with no usable imaging.
fn in_excluded_region(ra: i32, dec: i32) -> bool {
    (50 < dec && dec < 90 && 0 < ra && ra < 20)
        || (-30 < dec && dec < -10 && 140 < ra && ra < 160)
        || (70 < dec && dec < 90 && 200 < ra && ra < 220)
}

/// Draw a random 10°×10° sky field inside the survey footprint.
///
/// The origin is drawn with integer RA in `[0, 350)` and Dec in `[-30, 80)`, which already
/// excludes the southern sky below −30°. Draws whose origin falls in one of the remaining
/// excluded regions are rejected and redrawn.
pub fn random_field(rng: &mut impl Rng) -> SkyField {
    loop {
        let ra: i32 = rng.random_range(0..350);
        let dec: i32 = rng.random_range(-30..80);
        if in_excluded_region(ra, dec) {
            continue;
        }
        return SkyField {
            ra_min: ra as f64,
            ra_max: (ra + 10) as f64,
            dec_min: dec as f64,
            dec_max: (dec + 10) as f64,
        };
    }
}
