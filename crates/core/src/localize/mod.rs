//! Localization: mapping between observation pixel coordinates and body
//! surface coordinates.
//!
//! Pixel space has its origin at the top left of the image; rows increase
//! downward and columns increase to the right. The mapping from PDS
//! line/sample to row/column is instrument-specific, but lines are
//! usually rows and samples columns.
//!
//! Localization here is the most accurate achievable *from cumulative
//! index metadata alone*; per-instrument assumptions introduce errors of
//! varying magnitude, bounded well below the segmentation resolution.

mod corners;
mod geodesic;
mod map;

pub use corners::{FourCornerLocalizer, HiRiseRdrNoMapLocalizer};
pub use geodesic::{
    CtxLocalizer, GeodesicLocalizer, HiRiseEdrLocalizer, LrocCdrLocalizer, MocLocalizer,
    ScaledLocalizer, ThemisLocalizer,
};
pub use map::{HiRiseRdrBrowseLocalizer, HiRiseRdrLocalizer, MapLocalizer, ProjectionType};

use crate::geom::geodesic_distance;
use crate::{Error, Result};
use pdsc_types::Metadata;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Pixel→surface mapping for one observation.
///
/// `pixel_to_latlon` must be defined on the closed pixel extent
/// `[0, n_rows] × [0, n_cols]` (one past the last pixel index, so the
/// footprint corners are reachable) and degrade gracefully slightly
/// outside it.
pub trait Localizer: Send + Sync + std::fmt::Debug {
    /// Radius of the observed body in meters.
    fn body_radius(&self) -> f64;

    /// Pixel rows in the observation; 1.0 for normalized pixel space.
    fn n_rows(&self) -> f64;

    /// Pixel columns in the observation; 1.0 for normalized pixel space.
    fn n_cols(&self) -> f64;

    /// Total cross-track width in meters.
    fn observation_width_m(&self) -> f64;

    /// Total along-track length in meters.
    fn observation_length_m(&self) -> f64;

    /// +1.0 when flight direction is top-down in pixel space, -1.0 for
    /// bottom-up. Controls segment winding.
    fn flight_direction(&self) -> f64 {
        1.0
    }

    /// Surface location (latitude, east longitude in degrees) of a pixel
    /// coordinate.
    fn pixel_to_latlon(&self, row: f64, col: f64) -> (f64, f64);

    /// Pixel coordinate of a surface location.
    ///
    /// The default implementation inverts `pixel_to_latlon` numerically;
    /// closed-form localizers override it.
    fn latlon_to_pixel(&self, lat: f64, lon: f64) -> (f64, f64) {
        invert_localizer(self, lat, lon)
    }

    /// Target surface resolution (meters) for the numeric inversion.
    fn pixel_resolution_m(&self) -> f64 {
        0.1
    }

    /// For each (lat, lon) pair, whether the point falls inside the
    /// pixel extent of this observation.
    fn location_mask(&self, latlons: &[(f64, f64)]) -> Vec<bool> {
        latlons
            .iter()
            .map(|&(lat, lon)| {
                let (row, col) = self.latlon_to_pixel(lat, lon);
                (0.0..=self.n_rows()).contains(&row) && (0.0..=self.n_cols()).contains(&col)
            })
            .collect()
    }
}

/// Numeric inversion of `pixel_to_latlon` by coarse-to-fine compass
/// search over pixel space.
///
/// Deterministic: starts at the image center with a step of half the
/// larger image dimension, greedily walks to the best of eight
/// neighbors, and halves the step when no neighbor improves. Stops once
/// the step falls below a twentieth of a pixel and the best distance
/// stops improving by the localizer's resolution hint.
fn invert_localizer<L: Localizer + ?Sized>(localizer: &L, lat: f64, lon: f64) -> (f64, f64) {
    let target = (lat.to_radians(), lon.to_radians());
    let radius = localizer.body_radius();
    let objective = |row: f64, col: f64| {
        let (plat, plon) = localizer.pixel_to_latlon(row, col);
        geodesic_distance(target, (plat.to_radians(), plon.to_radians()), radius)
    };

    let mut row = localizer.n_rows() / 2.0;
    let mut col = localizer.n_cols() / 2.0;
    let mut best = objective(row, col);
    let mut step = (localizer.n_rows().max(localizer.n_cols()) / 2.0).max(1.0);

    const STEPS: [[f64; 2]; 8] = [
        [-1.0, 0.0],
        [1.0, 0.0],
        [0.0, -1.0],
        [0.0, 1.0],
        [-1.0, -1.0],
        [-1.0, 1.0],
        [1.0, -1.0],
        [1.0, 1.0],
    ];

    let resolution_m = localizer.pixel_resolution_m();
    while step > 0.05 || best > resolution_m {
        let mut improved = false;
        for [dr, dc] in STEPS {
            let d = objective(row + dr * step, col + dc * step);
            if d < best {
                best = d;
                row += dr * step;
                col += dc * step;
                improved = true;
            }
        }
        if !improved {
            step /= 2.0;
            if step < 1e-6 {
                break;
            }
        }
    }

    (row, col)
}

/// Construction flags for localizer variants of one instrument.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LocalizerOptions {
    /// Use the non-map-projected (four-corner) product geometry.
    #[serde(default)]
    pub nomap: bool,
    /// Localize the reduced-resolution browse product.
    #[serde(default)]
    pub browse: bool,
    /// Browse product width in pixels, when it differs from the default.
    #[serde(default)]
    pub browse_width: Option<u32>,
}

/// Constructor registered for one instrument tag. The error string names
/// the metadata problem and is wrapped into
/// [`Error::LocalizerUnavailable`] by the registry.
pub type LocalizerCtor =
    fn(&Metadata, &LocalizerOptions) -> std::result::Result<Box<dyn Localizer>, String>;

/// Table mapping instrument tags to localizer constructors.
///
/// The process-wide instance is built once and frozen; instruments are a
/// closed set at build time, and extension happens by registering before
/// first use.
pub struct Registry {
    table: HashMap<String, LocalizerCtor>,
}

impl Registry {
    pub fn empty() -> Registry {
        Registry {
            table: HashMap::new(),
        }
    }

    /// The built-in instrument table.
    pub fn builtin() -> Registry {
        let mut reg = Registry::empty();
        reg.register("ctx", geodesic::make_ctx);
        reg.register("moc", geodesic::make_moc);
        reg.register("themis_ir", geodesic::make_themis);
        reg.register("themis_vis", geodesic::make_themis);
        reg.register("hirise_edr", geodesic::make_hirise_edr);
        reg.register("hirise_rdr", map::make_hirise_rdr);
        reg.register("lroc_cdr", geodesic::make_lroc_cdr);
        reg
    }

    pub fn register(&mut self, instrument: &str, ctor: LocalizerCtor) {
        self.table.insert(instrument.to_string(), ctor);
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Construct a localizer for the observation described by `metadata`.
    pub fn get(
        &self,
        metadata: &Metadata,
        options: &LocalizerOptions,
    ) -> Result<Box<dyn Localizer>> {
        let ctor = self.table.get(&metadata.instrument).ok_or_else(|| {
            Error::LocalizerUnavailable {
                instrument: metadata.instrument.clone(),
                reason: "no localizer registered".to_string(),
            }
        })?;
        ctor(metadata, options).map_err(|reason| Error::LocalizerUnavailable {
            instrument: metadata.instrument.clone(),
            reason,
        })
    }
}

fn global_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::builtin)
}

/// Construct a localizer from the process-wide registry.
pub fn get_localizer(metadata: &Metadata, options: &LocalizerOptions) -> Result<Box<dyn Localizer>> {
    global_registry().get(metadata, options)
}

/// Metadata field accessors shared by the localizer constructors. Each
/// returns a message naming the missing or mistyped field.
pub(crate) fn req_real(m: &Metadata, field: &str) -> std::result::Result<f64, String> {
    m.real(field)
        .ok_or_else(|| format!("missing numeric field '{field}'"))
}

pub(crate) fn req_text<'m>(m: &'m Metadata, field: &str) -> std::result::Result<&'m str, String> {
    m.text(field)
        .ok_or_else(|| format!("missing text field '{field}'"))
}
