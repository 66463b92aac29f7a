//! Geodesic localizers for along-track instruments.
//!
//! These instruments describe observation geometry with a center
//! latitude/longitude and a line-of-flight direction. Along-track pixels
//! in the center column follow the great circle of flight; cross-track
//! pixels in each row run perpendicular to it.

use super::{req_real, req_text, Localizer, LocalizerOptions};
use crate::geom::{direct, MARS_RADIUS_M, MOON_RADIUS_M};
use pdsc_types::Metadata;

/// Localizer parameterized by an observation center and flight line.
#[derive(Debug)]
pub struct GeodesicLocalizer {
    center_row: f64,
    center_col: f64,
    center_lat: f64,
    center_lon: f64,
    n_rows: f64,
    n_cols: f64,
    pixel_height_m: f64,
    pixel_width_m: f64,
    north_azimuth_deg: f64,
    flight_direction: f64,
    body_radius: f64,
    pixel_resolution_m: f64,
}

impl GeodesicLocalizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        center_row: f64,
        center_col: f64,
        center_lat: f64,
        center_lon: f64,
        n_rows: f64,
        n_cols: f64,
        pixel_height_m: f64,
        pixel_width_m: f64,
        north_azimuth_deg: f64,
        flight_direction: f64,
        body_radius: f64,
    ) -> Result<GeodesicLocalizer, String> {
        if n_rows <= 0.0 {
            return Err("no image rows".to_string());
        }
        if n_cols <= 0.0 {
            return Err("no image columns".to_string());
        }
        if pixel_height_m <= 0.0 {
            return Err(format!("non-positive pixel height {pixel_height_m}"));
        }
        if pixel_width_m <= 0.0 {
            return Err(format!("non-positive pixel width {pixel_width_m}"));
        }
        Ok(GeodesicLocalizer {
            center_row,
            center_col,
            center_lat,
            center_lon,
            n_rows,
            n_cols,
            pixel_height_m,
            pixel_width_m,
            north_azimuth_deg,
            flight_direction,
            body_radius,
            pixel_resolution_m: 1e-3,
        })
    }

    fn with_resolution(mut self, resolution_m: f64) -> GeodesicLocalizer {
        self.pixel_resolution_m = resolution_m;
        self
    }
}

impl Localizer for GeodesicLocalizer {
    fn body_radius(&self) -> f64 {
        self.body_radius
    }

    fn n_rows(&self) -> f64 {
        self.n_rows
    }

    fn n_cols(&self) -> f64 {
        self.n_cols
    }

    fn observation_width_m(&self) -> f64 {
        self.pixel_width_m * self.n_cols
    }

    fn observation_length_m(&self) -> f64 {
        self.pixel_height_m * self.n_rows
    }

    fn flight_direction(&self) -> f64 {
        self.flight_direction
    }

    fn pixel_resolution_m(&self) -> f64 {
        self.pixel_resolution_m
    }

    fn pixel_to_latlon(&self, row: f64, col: f64) -> (f64, f64) {
        let x_m = (col - self.center_col) * self.pixel_width_m;
        let y_m = (row - self.center_row) * self.pixel_height_m * self.flight_direction;

        // Down the flight line, then perpendicular across it.
        let (lat1, lon1, azi1) = direct(
            self.center_lat,
            self.center_lon,
            90.0 - self.north_azimuth_deg,
            y_m,
            self.body_radius,
        );
        let (lat2, lon2, _) = direct(lat1, lon1, azi1 - 90.0, x_m, self.body_radius);
        (lat2, lon2)
    }
}

/// CTX: bottom-up flight; the north azimuth flips when the usage note
/// marks the product as flipped.
pub struct CtxLocalizer;

impl CtxLocalizer {
    pub fn from_metadata(m: &Metadata) -> Result<GeodesicLocalizer, String> {
        let lines = req_real(m, "lines")?;
        let samples = req_real(m, "samples")?;
        let north_azimuth = req_real(m, "north_azimuth")?;
        let flipped_na = if m.text("usage_note") == Some("F") {
            180.0 - north_azimuth
        } else {
            north_azimuth
        };
        GeodesicLocalizer::new(
            lines / 2.0,
            samples / 2.0,
            req_real(m, "center_latitude")?,
            req_real(m, "center_longitude")?,
            lines,
            samples,
            req_real(m, "image_height")? / lines,
            req_real(m, "image_width")? / samples,
            flipped_na,
            -1.0,
            MARS_RADIUS_M,
        )
    }
}

/// MOC narrow/wide angle.
pub struct MocLocalizer;

impl MocLocalizer {
    pub fn from_metadata(m: &Metadata) -> Result<GeodesicLocalizer, String> {
        let lines = req_real(m, "lines")?;
        let samples = req_real(m, "samples")?;
        GeodesicLocalizer::new(
            lines / 2.0,
            samples / 2.0,
            req_real(m, "center_latitude")?,
            req_real(m, "center_longitude")?,
            lines,
            samples,
            req_real(m, "image_height")? / lines,
            req_real(m, "image_width")? / samples,
            req_real(m, "north_azimuth")?,
            1.0,
            MARS_RADIUS_M,
        )
    }
}

/// THEMIS VIS and IR: pixel height derived from the aspect ratio.
pub struct ThemisLocalizer;

impl ThemisLocalizer {
    pub fn from_metadata(m: &Metadata) -> Result<GeodesicLocalizer, String> {
        let lines = req_real(m, "lines")?;
        let samples = req_real(m, "samples")?;
        let pixel_width = req_real(m, "pixel_width")?;
        GeodesicLocalizer::new(
            lines / 2.0,
            samples / 2.0,
            req_real(m, "center_latitude")?,
            req_real(m, "center_longitude")?,
            lines,
            samples,
            req_real(m, "pixel_aspect_ratio")? * pixel_width,
            pixel_width,
            req_real(m, "north_azimuth")?,
            1.0,
            MARS_RADIUS_M,
        )
    }
}

/// LROC CDR (Moon).
pub struct LrocCdrLocalizer;

impl LrocCdrLocalizer {
    pub fn from_metadata(m: &Metadata) -> Result<GeodesicLocalizer, String> {
        let lines = req_real(m, "lines")?;
        let samples = req_real(m, "samples")?;
        let pixel_width = req_real(m, "pixel_width")?;
        Ok(GeodesicLocalizer::new(
            lines / 2.0,
            samples / 2.0,
            req_real(m, "center_latitude")?,
            req_real(m, "center_longitude")?,
            lines,
            samples,
            pixel_width,
            pixel_width,
            req_real(m, "north_azimuth")?,
            1.0,
            MOON_RADIUS_M,
        )?
        .with_resolution(1e-4))
    }
}

/// HiRISE EDR: per-CCD pixel offsets from the observation center.
pub struct HiRiseEdrLocalizer;

/// CCD center-pixel offsets from the observation center. Each CCD is
/// 2048 pixels across with a 48-pixel overlap between neighbors; see
/// figure 2.1.b of the HiRISE EDR SIS.
const CCD_TABLE: [(&str, f64); 14] = [
    ("RED0", -9000.0),
    ("RED1", -7000.0),
    ("RED2", -5000.0),
    ("RED3", -3000.0),
    ("RED4", -1000.0),
    ("RED5", 1000.0),
    ("RED6", 3000.0),
    ("RED7", 5000.0),
    ("RED8", 7000.0),
    ("RED9", 9000.0),
    ("IR10", -1000.0),
    ("IR11", 1000.0),
    ("BG12", -1000.0),
    ("BG13", 1000.0),
];

/// Channel center offsets within a CCD: each CCD is split into two
/// 1024-pixel channels.
const CHANNEL_OFFSET: [(i64, f64); 2] = [(0, 512.0), (1, -512.0)];

impl HiRiseEdrLocalizer {
    pub fn from_metadata(m: &Metadata) -> Result<GeodesicLocalizer, String> {
        let lines = req_real(m, "lines")?;
        let samples = req_real(m, "samples")?;
        let pixel_width = req_real(m, "pixel_width")?;
        let north_azimuth = req_real(m, "north_azimuth")?;
        let binning = req_real(m, "binning")?;
        if binning <= 0.0 {
            return Err(format!("non-positive binning {binning}"));
        }

        let ccd_name = req_text(m, "ccd_name")?;
        let ccd_offset = CCD_TABLE
            .iter()
            .find(|(name, _)| *name == ccd_name)
            .map(|(_, off)| *off)
            .ok_or_else(|| format!("unknown CCD '{ccd_name}'"))?;
        let channel = m
            .integer("channel_number")
            .ok_or_else(|| "missing numeric field 'channel_number'".to_string())?;
        let channel_offset = CHANNEL_OFFSET
            .iter()
            .find(|(n, _)| *n == channel)
            .map(|(_, off)| *off)
            .ok_or_else(|| format!("unknown channel {channel}"))?;

        let helper = GeodesicLocalizer::new(
            lines / 2.0,
            samples / 2.0,
            req_real(m, "center_latitude")?,
            req_real(m, "center_longitude")?,
            lines,
            samples,
            pixel_width,
            pixel_width,
            north_azimuth,
            1.0,
            MARS_RADIUS_M,
        )?;

        let edr_center_col = (ccd_offset + channel_offset) / binning;
        let (edr_center_lat, edr_center_lon) = helper.pixel_to_latlon(lines / 2.0, edr_center_col);

        Ok(GeodesicLocalizer::new(
            lines / 2.0,
            samples / 2.0,
            edr_center_lat,
            edr_center_lon,
            lines,
            samples,
            pixel_width,
            pixel_width,
            north_azimuth,
            1.0,
            MARS_RADIUS_M,
        )?
        .with_resolution(1e-6))
    }
}

/// A localizer for half-or-less resolution browse products: rescales
/// pixel coordinates into the full-resolution pixel space of `inner`.
#[derive(Debug)]
pub struct ScaledLocalizer<L> {
    inner: L,
    scale_factor: f64,
}

impl<L: Localizer> ScaledLocalizer<L> {
    pub fn new(inner: L, scale_factor: f64) -> Result<ScaledLocalizer<L>, String> {
        if scale_factor <= 0.0 {
            return Err(format!("invalid scale factor: {scale_factor}"));
        }
        Ok(ScaledLocalizer {
            inner,
            scale_factor,
        })
    }
}

impl<L: Localizer> Localizer for ScaledLocalizer<L> {
    fn body_radius(&self) -> f64 {
        self.inner.body_radius()
    }

    fn n_rows(&self) -> f64 {
        self.inner.n_rows() * self.scale_factor
    }

    fn n_cols(&self) -> f64 {
        self.inner.n_cols() * self.scale_factor
    }

    fn observation_width_m(&self) -> f64 {
        self.inner.observation_width_m()
    }

    fn observation_length_m(&self) -> f64 {
        self.inner.observation_length_m()
    }

    fn flight_direction(&self) -> f64 {
        self.inner.flight_direction()
    }

    fn pixel_resolution_m(&self) -> f64 {
        self.inner.pixel_resolution_m()
    }

    fn pixel_to_latlon(&self, row: f64, col: f64) -> (f64, f64) {
        self.inner
            .pixel_to_latlon(row / self.scale_factor, col / self.scale_factor)
    }

    fn latlon_to_pixel(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (row, col) = self.inner.latlon_to_pixel(lat, lon);
        (row * self.scale_factor, col * self.scale_factor)
    }
}

pub(super) fn make_ctx(
    m: &Metadata,
    _opts: &LocalizerOptions,
) -> Result<Box<dyn Localizer>, String> {
    Ok(Box::new(CtxLocalizer::from_metadata(m)?))
}

pub(super) fn make_moc(
    m: &Metadata,
    _opts: &LocalizerOptions,
) -> Result<Box<dyn Localizer>, String> {
    Ok(Box::new(MocLocalizer::from_metadata(m)?))
}

pub(super) fn make_themis(
    m: &Metadata,
    _opts: &LocalizerOptions,
) -> Result<Box<dyn Localizer>, String> {
    Ok(Box::new(ThemisLocalizer::from_metadata(m)?))
}

pub(super) fn make_hirise_edr(
    m: &Metadata,
    _opts: &LocalizerOptions,
) -> Result<Box<dyn Localizer>, String> {
    Ok(Box::new(HiRiseEdrLocalizer::from_metadata(m)?))
}

pub(super) fn make_lroc_cdr(
    m: &Metadata,
    opts: &LocalizerOptions,
) -> Result<Box<dyn Localizer>, String> {
    let inner = LrocCdrLocalizer::from_metadata(m)?;
    if opts.browse {
        // Browse images are published at half resolution.
        Ok(Box::new(ScaledLocalizer::new(inner, 0.5)?))
    } else {
        Ok(Box::new(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE_DEG: f64 = 5e-4;
    const TOLERANCE_PIXEL: f64 = 5.0;

    fn assert_latlon_close(got: (f64, f64), want: (f64, f64), atol: f64) {
        assert!(
            (got.0 - want.0).abs() < atol,
            "lat {} != {}",
            got.0,
            want.0
        );
        let dlon = (got.1.rem_euclid(360.0) - want.1.rem_euclid(360.0)).abs();
        let dlon = dlon.min(360.0 - dlon);
        assert!(dlon < atol, "lon {} != {}", got.1, want.1);
    }

    fn check_cases(localizer: &dyn Localizer, cases: &[((f64, f64), (f64, f64))], deg_tol: f64) {
        for &((lat, lon), (row, col)) in cases {
            let got = localizer.pixel_to_latlon(row, col);
            assert_latlon_close(got, (lat, lon), deg_tol);

            let (grow, gcol) = localizer.latlon_to_pixel(lat, lon);
            assert!(
                (grow - row).abs() < TOLERANCE_PIXEL && (gcol - col).abs() < TOLERANCE_PIXEL,
                "pixel ({grow}, {gcol}) != ({row}, {col})"
            );
        }
    }

    fn moc_s2200304() -> Metadata {
        // Regression fixture verified against JMARS footprint orientation.
        let mut m = Metadata::new("moc");
        m.set("usage_note", "F")
            .set("north_azimuth", 94.13)
            .set("lines", 480i64)
            .set("samples", 480i64)
            .set("center_latitude", -40.09)
            .set("center_longitude", -265.03)
            .set("image_height", 118_500.0)
            .set("image_width", 119_820.0);
        m
    }

    #[test]
    fn moc_regression() {
        let m = moc_s2200304();
        let loc = MocLocalizer::from_metadata(&m).unwrap();
        let cases = [
            ((-39.157512394355374, 93.57704018765617), (480.0, 480.0)),
            ((-39.014031900835406, 96.17481633368809), (480.0, 0.0)),
            ((-41.005342590109564, 96.40129571345858), (0.0, 0.0)),
        ];
        check_cases(&loc, &cases, TOLERANCE_DEG);
    }

    #[test]
    fn moc_narrow_angle_regression() {
        let mut m = Metadata::new("moc");
        m.set("usage_note", "N")
            .set("north_azimuth", 94.59)
            .set("lines", 3968i64)
            .set("samples", 1024i64)
            .set("center_latitude", -50.97)
            .set("center_longitude", -159.81)
            .set("image_height", 23_470.0)
            .set("image_width", 2_850.0);
        let loc = MocLocalizer::from_metadata(&m).unwrap();
        let cases = [
            ((-50.77456585933269, -159.87294768415293), (3968.0, 1024.0)),
            ((-50.770734429860006, -159.797159814558), (3968.0, 0.0)),
            ((-51.16540002433904, -159.74652039353282), (0.0, 0.0)),
        ];
        check_cases(&loc, &cases, TOLERANCE_DEG);
    }

    #[test]
    fn moc_observation_extent_matches_metadata() {
        let loc = MocLocalizer::from_metadata(&moc_s2200304()).unwrap();
        assert!((loc.observation_width_m() - 119_820.0).abs() < 1e-3);
        assert!((loc.observation_length_m() - 118_500.0).abs() < 1e-3);
    }

    #[test]
    fn ctx_regression() {
        let mut m = Metadata::new("ctx");
        m.set("north_azimuth", 276.93)
            .set("center_latitude", -12.45)
            .set("center_longitude", -69.29)
            .set("image_height", 43_530.0)
            .set("image_width", 25_970.0)
            .set("lines", 7168i64)
            .set("samples", 5056i64)
            .set("usage_note", "N");
        let loc = CtxLocalizer::from_metadata(&m).unwrap();
        let cases = [
            ((-12.111797753021992, -69.55772674321044), (7168.0, 0.0)),
            ((-12.059007889850992, -69.11293214267153), (7168.0, 5056.0)),
            ((-12.78793820020455, -69.02157480900689), (0.0, 5056.0)),
        ];
        check_cases(&loc, &cases, TOLERANCE_DEG);
    }

    #[test]
    fn ctx_flipped_regression() {
        let mut m = Metadata::new("ctx");
        m.set("north_azimuth", 179.85)
            .set("center_latitude", -85.42)
            .set("center_longitude", -260.56)
            .set("image_height", 86_490.0)
            .set("image_width", 31_440.0)
            .set("lines", 14336i64)
            .set("samples", 5056i64)
            .set("usage_note", "F");
        let loc = CtxLocalizer::from_metadata(&m).unwrap();
        let cases = [
            ((-85.10207160374867, 90.85528333927553), (14336.0, 5056.0)),
            ((-85.0985004494083, 108.00199482283183), (0.0, 5056.0)),
            ((-85.62209854254696, 109.05122054313493), (0.0, 0.0)),
        ];
        check_cases(&loc, &cases, TOLERANCE_DEG);
    }

    #[test]
    fn themis_regression() {
        // The reference values were produced on a slightly flattened
        // ellipsoid; the spherical model agrees to a few millidegrees.
        let mut m = Metadata::new("themis_ir");
        m.set("center_latitude", -54.121)
            .set("center_longitude", 202.748)
            .set("lines", 272i64)
            .set("samples", 320i64)
            .set("north_azimuth", 100.239)
            .set("pixel_aspect_ratio", 0.845)
            .set("pixel_height", 102.0)
            .set("pixel_width", 120.0);
        let loc = ThemisLocalizer::from_metadata(&m).unwrap();
        let cases = [
            ((-53.94804265851535, -157.86154852611733), (272.0, 320.0)),
            ((-53.83349019671131, -156.78373360980942), (272.0, 0.0)),
            ((-54.29083103668251, -156.63740954256997), (0.0, 0.0)),
        ];
        check_cases(&loc, &cases, 5e-3);
    }

    #[test]
    fn lroc_corners_hit_metadata_corners() {
        let mut m = Metadata::new("lroc_cdr");
        m.set("center_latitude", -63.14)
            .set("center_longitude", 354.8)
            .set("north_azimuth", 272.45)
            .set("lines", 5120i64)
            .set("samples", 5064i64)
            .set("pixel_width", 2.0);
        let loc = LrocCdrLocalizer::from_metadata(&m).unwrap();
        // The image centre must localize to the metadata centre exactly.
        let (lat, lon) = loc.pixel_to_latlon(2560.0, 2532.0);
        assert_latlon_close((lat, lon), (-63.14, 354.8), 1e-9);
        assert!((loc.body_radius() - MOON_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn lroc_browse_scales_pixel_space() {
        let mut m = Metadata::new("lroc_cdr");
        m.set("center_latitude", 10.0)
            .set("center_longitude", 20.0)
            .set("north_azimuth", 90.0)
            .set("lines", 1000i64)
            .set("samples", 500i64)
            .set("pixel_width", 4.0);
        let full = make_lroc_cdr(&m, &LocalizerOptions::default()).unwrap();
        let browse = make_lroc_cdr(
            &m,
            &LocalizerOptions {
                browse: true,
                ..Default::default()
            },
        )
        .unwrap();
        let a = full.pixel_to_latlon(500.0, 250.0);
        let b = browse.pixel_to_latlon(250.0, 125.0);
        assert_latlon_close(a, b, 1e-12);
        assert_eq!(browse.n_rows(), 500.0);
    }

    #[test]
    fn hirise_edr_ccds_tile_the_swath() {
        // Two red CCDs of one observation: their centers must be offset
        // cross-track by (offset difference / binning) * pixel_width.
        let base = |ccd: &str, channel: i64| {
            let mut m = Metadata::new("hirise_edr");
            m.set("lines", 16500i64)
                .set("samples", 512i64)
                .set("pixel_width", 0.6348)
                .set("ccd_name", ccd)
                .set("channel_number", channel)
                .set("binning", 2i64)
                .set("center_latitude", 84.4102)
                .set("center_longitude", 343.495)
                .set("north_azimuth", 60.0);
            m
        };
        let red0 = HiRiseEdrLocalizer::from_metadata(&base("RED0", 0)).unwrap();
        let red1 = HiRiseEdrLocalizer::from_metadata(&base("RED1", 0)).unwrap();

        let (lat0, lon0) = red0.pixel_to_latlon(8250.0, 256.0);
        let (lat1, lon1) = red1.pixel_to_latlon(8250.0, 256.0);
        let d = crate::geom::geodesic_distance(
            (lat0.to_radians(), lon0.to_radians()),
            (lat1.to_radians(), lon1.to_radians()),
            MARS_RADIUS_M,
        );
        // CCDs sit 2000 unbinned pixels apart.
        let expect = 2000.0 / 2.0 * 0.6348;
        assert!((d - expect).abs() < 1.0, "got {d}, expected {expect}");

        // Channels of the same CCD sit 1024 unbinned pixels apart.
        let ch1 = HiRiseEdrLocalizer::from_metadata(&base("RED0", 1)).unwrap();
        let (lat2, lon2) = ch1.pixel_to_latlon(8250.0, 256.0);
        let d = crate::geom::geodesic_distance(
            (lat0.to_radians(), lon0.to_radians()),
            (lat2.to_radians(), lon2.to_radians()),
            MARS_RADIUS_M,
        );
        let expect = 1024.0 / 2.0 * 0.6348;
        assert!((d - expect).abs() < 1.0, "got {d}, expected {expect}");
    }

    #[test]
    fn hirise_edr_rejects_unknown_ccd() {
        let mut m = Metadata::new("hirise_edr");
        m.set("lines", 100i64)
            .set("samples", 100i64)
            .set("pixel_width", 0.3)
            .set("ccd_name", "RED99")
            .set("channel_number", 0i64)
            .set("binning", 1i64)
            .set("center_latitude", 0.0)
            .set("center_longitude", 0.0)
            .set("north_azimuth", 90.0);
        let err = HiRiseEdrLocalizer::from_metadata(&m).unwrap_err();
        assert!(err.contains("RED99"));
    }

    #[test]
    fn validation_rejects_empty_images() {
        assert!(GeodesicLocalizer::new(
            0.0, 0.0, 0.0, 0.0, 0.0, 100.0, 1.0, 1.0, 0.0, 1.0, MARS_RADIUS_M
        )
        .is_err());
        assert!(GeodesicLocalizer::new(
            0.0, 0.0, 0.0, 0.0, 100.0, 100.0, -1.0, 1.0, 0.0, 1.0, MARS_RADIUS_M
        )
        .is_err());
    }
}
