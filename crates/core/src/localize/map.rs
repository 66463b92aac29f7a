//! Map-projected localizers for HiRISE RDR products.
//!
//! Supports the EQUIRECTANGULAR and POLAR STEREOGRAPHIC projections used
//! by HiRISE; both directions are closed-form. Projection parameters
//! come straight from the cumulative index (see the HiRISE DSMAP
//! catalog for their definitions).

use super::{corners::HiRiseRdrNoMapLocalizer, geodesic::ScaledLocalizer, req_real, req_text};
use super::{Localizer, LocalizerOptions};
use crate::geom::{MARS_RADIUS_EQUATORIAL_M, MARS_RADIUS_POLAR_M};
use pdsc_types::Metadata;

/// Default width of HiRISE browse images in pixels.
pub const HIRISE_BROWSE_WIDTH: u32 = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Equirectangular,
    PolarStereographic,
}

impl ProjectionType {
    pub fn parse(s: &str) -> Result<ProjectionType, String> {
        match s {
            "EQUIRECTANGULAR" => Ok(ProjectionType::Equirectangular),
            "POLAR STEREOGRAPHIC" => Ok(ProjectionType::PolarStereographic),
            other => Err(format!("unknown projection type \"{other}\"")),
        }
    }
}

/// Localizer for map-projected observations.
#[derive(Debug)]
pub struct MapLocalizer {
    proj_type: ProjectionType,
    proj_latitude: f64,
    proj_longitude: f64,
    map_scale: f64,
    row_offset: f64,
    col_offset: f64,
    lines: f64,
    samples: f64,
    /// Local sphere radius at the projection latitude.
    r_local: f64,
    cos_proj_lat: f64,
}

impl MapLocalizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proj_type: ProjectionType,
        proj_latitude_deg: f64,
        proj_longitude_deg: f64,
        map_scale: f64,
        row_offset: f64,
        col_offset: f64,
        lines: f64,
        samples: f64,
    ) -> Result<MapLocalizer, String> {
        if lines <= 0.0 {
            return Err("no image rows".to_string());
        }
        if samples <= 0.0 {
            return Err("no image columns".to_string());
        }
        if map_scale <= 0.0 {
            return Err(format!("non-positive map scale {map_scale}"));
        }

        let proj_latitude = proj_latitude_deg.to_radians();
        let a = MARS_RADIUS_POLAR_M * proj_latitude.cos();
        let b = MARS_RADIUS_EQUATORIAL_M * proj_latitude.sin();
        let r_local = (MARS_RADIUS_POLAR_M * MARS_RADIUS_EQUATORIAL_M) / (a * a + b * b).sqrt();

        Ok(MapLocalizer {
            proj_type,
            proj_latitude,
            proj_longitude: proj_longitude_deg.to_radians(),
            map_scale,
            row_offset,
            col_offset,
            lines,
            samples,
            r_local,
            cos_proj_lat: proj_latitude.cos(),
        })
    }

    fn map_xy(&self, row: f64, col: f64) -> (f64, f64) {
        (
            (col - self.col_offset) * self.map_scale,
            -(row - self.row_offset) * self.map_scale,
        )
    }

    fn equirect_pixel_to_latlon(&self, row: f64, col: f64) -> (f64, f64) {
        let (x, y) = self.map_xy(row, col);
        let lat = (y / self.r_local).to_degrees();
        let lon = (self.proj_longitude + x / (self.r_local * self.cos_proj_lat)).to_degrees();
        (lat, lon.rem_euclid(360.0))
    }

    fn equirect_latlon_to_pixel(&self, lat: f64, lon: f64) -> (f64, f64) {
        let lat_rad = lat.to_radians();
        let lon_rad = lon.rem_euclid(360.0).to_radians();
        let x = self.r_local * (lon_rad - self.proj_longitude) * self.cos_proj_lat;
        let y = self.r_local * lat_rad;
        (
            (-y / self.map_scale) + self.row_offset,
            (x / self.map_scale) + self.col_offset,
        )
    }

    fn polar_pixel_to_latlon(&self, row: f64, col: f64) -> (f64, f64) {
        let (x, y) = self.map_xy(row, col);
        let p = x.hypot(y);
        if p < 1e-12 {
            // The projection center pixel is the pole itself.
            return (
                self.proj_latitude.to_degrees(),
                self.proj_longitude.to_degrees().rem_euclid(360.0),
            );
        }
        let c = 2.0 * (p / (2.0 * MARS_RADIUS_POLAR_M)).atan();
        let lon = self.proj_longitude + x.atan2(-self.proj_latitude.signum() * y);
        let lat = (c.cos() * self.proj_latitude.sin()
            + y * c.sin() * self.proj_latitude.cos() / p)
            .clamp(-1.0, 1.0)
            .asin();
        (lat.to_degrees(), lon.to_degrees().rem_euclid(360.0))
    }

    fn polar_latlon_to_pixel(&self, lat: f64, lon: f64) -> (f64, f64) {
        let lat_rad = lat.to_radians();
        let lon_rad = lon.rem_euclid(360.0).to_radians();
        let t = (std::f64::consts::FRAC_PI_4 - (lat_rad / 2.0).abs()).tan();
        let a = 2.0 * MARS_RADIUS_POLAR_M * t;
        let x = a * (lon_rad - self.proj_longitude).sin();
        let y = -a * (lon_rad - self.proj_longitude).cos() * self.proj_latitude.signum();
        (
            (-y / self.map_scale) + self.row_offset,
            (x / self.map_scale) + self.col_offset,
        )
    }
}

impl Localizer for MapLocalizer {
    fn body_radius(&self) -> f64 {
        self.r_local
    }

    fn n_rows(&self) -> f64 {
        self.lines
    }

    fn n_cols(&self) -> f64 {
        self.samples
    }

    fn observation_width_m(&self) -> f64 {
        self.samples * self.map_scale
    }

    fn observation_length_m(&self) -> f64 {
        self.lines * self.map_scale
    }

    fn pixel_resolution_m(&self) -> f64 {
        1e-6
    }

    fn pixel_to_latlon(&self, row: f64, col: f64) -> (f64, f64) {
        match self.proj_type {
            ProjectionType::Equirectangular => self.equirect_pixel_to_latlon(row, col),
            ProjectionType::PolarStereographic => self.polar_pixel_to_latlon(row, col),
        }
    }

    fn latlon_to_pixel(&self, lat: f64, lon: f64) -> (f64, f64) {
        match self.proj_type {
            ProjectionType::Equirectangular => self.equirect_latlon_to_pixel(lat, lon),
            ProjectionType::PolarStereographic => self.polar_latlon_to_pixel(lat, lon),
        }
    }
}

/// HiRISE RDR map-projected products.
pub struct HiRiseRdrLocalizer;

impl HiRiseRdrLocalizer {
    pub fn from_metadata(m: &Metadata) -> Result<MapLocalizer, String> {
        MapLocalizer::new(
            ProjectionType::parse(req_text(m, "map_projection_type")?)?,
            req_real(m, "projection_center_latitude")?,
            req_real(m, "projection_center_longitude")?,
            req_real(m, "map_scale")?,
            req_real(m, "line_projection_offset")?,
            req_real(m, "sample_projection_offset")?,
            req_real(m, "lines")?,
            req_real(m, "samples")?,
        )
    }
}

/// HiRISE RDR browse products: the full-resolution localizer with pixel
/// coordinates rescaled to the browse width.
pub struct HiRiseRdrBrowseLocalizer;

impl HiRiseRdrBrowseLocalizer {
    pub fn from_metadata(
        m: &Metadata,
        browse_width: u32,
    ) -> Result<ScaledLocalizer<MapLocalizer>, String> {
        let samples = req_real(m, "samples")?;
        let inner = HiRiseRdrLocalizer::from_metadata(m)?;
        ScaledLocalizer::new(inner, f64::from(browse_width) / samples)
    }
}

pub(super) fn make_hirise_rdr(
    m: &Metadata,
    opts: &LocalizerOptions,
) -> Result<Box<dyn Localizer>, String> {
    if opts.nomap {
        Ok(Box::new(HiRiseRdrNoMapLocalizer::from_metadata(m)?))
    } else if opts.browse {
        let width = opts.browse_width.unwrap_or(HIRISE_BROWSE_WIDTH);
        Ok(Box::new(HiRiseRdrBrowseLocalizer::from_metadata(m, width)?))
    } else {
        Ok(Box::new(HiRiseRdrLocalizer::from_metadata(m)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference localizations produced with ISIS `mappt` on the named
    // HiRISE RDR products.
    const TOLERANCE_DEG: f64 = 5e-4;
    const TOLERANCE_PIXEL: f64 = 5.0;

    fn check(loc: &dyn Localizer, cases: &[((f64, f64), (f64, f64))]) {
        for &((lat, lon), (row, col)) in cases {
            let (glat, glon) = loc.pixel_to_latlon(row, col);
            assert!((glat - lat).abs() < TOLERANCE_DEG, "lat {glat} != {lat}");
            let dlon = (glon.rem_euclid(360.0) - lon.rem_euclid(360.0)).abs();
            assert!(dlon.min(360.0 - dlon) < TOLERANCE_DEG, "lon {glon} != {lon}");

            let (grow, gcol) = loc.latlon_to_pixel(lat, lon);
            assert!(
                (grow - row).abs() < TOLERANCE_PIXEL && (gcol - col).abs() < TOLERANCE_PIXEL,
                "pixel ({grow}, {gcol}) != ({row}, {col})"
            );
        }
    }

    fn esp_050016_1870() -> Metadata {
        let mut m = Metadata::new("hirise_rdr");
        m.set("map_projection_type", "EQUIRECTANGULAR")
            .set("projection_center_latitude", 5.0)
            .set("projection_center_longitude", 180.0)
            .set("map_scale", 0.25)
            .set("line_projection_offset", 1_658_135.5)
            .set("sample_projection_offset", 25_983_782.0)
            .set("lines", 23798i64)
            .set("samples", 22023i64)
            .set("corner1_latitude", 6.9035)
            .set("corner1_longitude", 70.0791)
            .set("corner2_latitude", 6.8934)
            .set("corner2_longitude", 69.9971)
            .set("corner3_latitude", 6.9837)
            .set("corner3_longitude", 69.9859)
            .set("corner4_latitude", 6.9937)
            .set("corner4_longitude", 70.068);
        m
    }

    #[test]
    fn equirectangular_esp_050016_1870() {
        let loc = HiRiseRdrLocalizer::from_metadata(&esp_050016_1870()).unwrap();
        check(
            &loc,
            &[
                ((6.9937526632708, 69.985892127602), (1.0, 1.0)),
                ((6.9937526632708, 70.079132239075), (1.0, 22023.0)),
                ((6.8933806899744, 70.079132239075), (23798.0, 22023.0)),
                ((6.8933806899744, 69.985892127602), (23798.0, 1.0)),
                ((6.9435687855433, 70.032512183339), (11899.0, 11012.0)),
            ],
        );
    }

    #[test]
    fn equirectangular_esp_050062_1345() {
        let mut m = Metadata::new("hirise_rdr");
        m.set("map_projection_type", "EQUIRECTANGULAR")
            .set("projection_center_latitude", -40.0)
            .set("projection_center_longitude", 180.0)
            .set("map_scale", 0.25)
            .set("line_projection_offset", -10_631_488.0)
            .set("sample_projection_offset", -14_646_768.0)
            .set("samples", 21831i64)
            .set("lines", 21856i64);
        let loc = HiRiseRdrLocalizer::from_metadata(&m).unwrap();
        check(
            &loc,
            &[
                ((-44.949798974587, 260.83910415798), (1.9730653911829, 2.033464346081)),
                ((-44.949798974587, 260.95959132319), (1.9730653911829, 21832.40427889)),
                ((-45.042204321234, 260.95959132319), (21857.609632041, 21832.40427889)),
                ((-45.042204321234, 260.83910415798), (21857.609632041, 2.033464346081)),
                (
                    (-44.996001647910504, 260.899347740585),
                    (10929.791348718, 10917.21887161),
                ),
            ],
        );
    }

    #[test]
    fn polar_north_esp_045245_2675() {
        let mut m = Metadata::new("hirise_rdr");
        m.set("map_projection_type", "POLAR STEREOGRAPHIC")
            .set("projection_center_latitude", 90.0)
            .set("projection_center_longitude", 0.0)
            .set("map_scale", 0.25)
            .set("line_projection_offset", -282_320.0)
            .set("sample_projection_offset", 579_212.0)
            .set("samples", 11385i64)
            .set("lines", 32073i64);
        let loc = HiRiseRdrLocalizer::from_metadata(&m).unwrap();
        check(
            &loc,
            &[
                ((87.266078122413, 296.01543481484), (375.0, 1.0)),
                ((87.305746158879, 296.39047246968), (2.0, 10244.0)),
                ((87.247615701464, 298.94304912096), (31696.0, 11385.0)),
                ((87.208765944927, 298.54015964047), (32073.0, 1142.0)),
                ((87.25773880432, 297.48428883797), (16037.0, 5693.0)),
            ],
        );
    }

    #[test]
    fn polar_north_esp_050054_2565() {
        let mut m = Metadata::new("hirise_rdr");
        m.set("map_projection_type", "POLAR STEREOGRAPHIC")
            .set("projection_center_latitude", 90.0)
            .set("projection_center_longitude", 0.0)
            .set("map_scale", 0.5)
            .set("line_projection_offset", 159_167.5)
            .set("sample_projection_offset", -1_615_142.5)
            .set("samples", 26027i64)
            .set("lines", 13224i64);
        let loc = HiRiseRdrLocalizer::from_metadata(&m).unwrap();
        check(
            &loc,
            &[
                ((76.0918, 95.545), (3.3481906144007, 24353.96564842)),
                ((76.0818, 95.3689), (4931.2083980744, 26026.240391183)),
                ((76.291, 95.1579), (13225.079025231, 1667.938772222)),
                ((76.3011, 95.3366), (8295.4296541251, 2.6312731597573)),
                ((76.19145, 95.3515), (6652.6553750653, 13016.659884301)),
            ],
        );
    }

    #[test]
    fn polar_south_esp_049989_0930() {
        let mut m = Metadata::new("hirise_rdr");
        m.set("map_projection_type", "POLAR STEREOGRAPHIC")
            .set("projection_center_latitude", -90.0)
            .set("projection_center_longitude", 0.0)
            .set("map_scale", 0.25)
            .set("line_projection_offset", -657_861.5)
            .set("sample_projection_offset", -265_537.5)
            .set("samples", 30226i64)
            .set("lines", 10375i64);
        let loc = HiRiseRdrLocalizer::from_metadata(&m).unwrap();
        check(
            &loc,
            &[
                ((-86.959605211451, 158.25660498659), (7940.0, 2.0)),
                ((-86.989790088818, 157.96944372902), (1.0, 665.0)),
                ((-86.931180262264, 155.87103130598), (2429.0, 30226.0)),
                ((-86.901547240436, 156.1734811286), (10375.0, 29560.0)),
                ((-86.946044198298, 157.05843125555), (5187.5, 15113.0)),
            ],
        );
    }

    #[test]
    fn polar_south_esp_050042_1000() {
        let mut m = Metadata::new("hirise_rdr");
        m.set("map_projection_type", "POLAR STEREOGRAPHIC")
            .set("projection_center_latitude", -90.0)
            .set("projection_center_longitude", 0.0)
            .set("map_scale", 0.5)
            .set("line_projection_offset", -237_703.5)
            .set("sample_projection_offset", -1_182_837.5)
            .set("samples", 20597i64)
            .set("lines", 10462i64);
        let loc = HiRiseRdrLocalizer::from_metadata(&m).unwrap();
        check(
            &loc,
            &[
                ((-79.7669, 101.843), (10463.328397211, 628.5909773563)),
                ((-79.7874, 101.43), (1443.6864533564, -0.33655633684248)),
                ((-79.625, 101.179), (0.37412327560014, 19964.313501756)),
                ((-79.6047, 101.587), (9043.8461438996, 20604.159140396)),
                ((-79.69605, 101.511), (5281.32804386, 10294.632151381)),
            ],
        );
    }

    #[test]
    fn browse_localizer_rescales_pixels() {
        let m = esp_050016_1870();
        let full = HiRiseRdrLocalizer::from_metadata(&m).unwrap();
        let browse = HiRiseRdrBrowseLocalizer::from_metadata(&m, HIRISE_BROWSE_WIDTH).unwrap();
        let factor = f64::from(HIRISE_BROWSE_WIDTH) / 22023.0;

        let a = full.pixel_to_latlon(1000.0, 2000.0);
        let b = browse.pixel_to_latlon(1000.0 * factor, 2000.0 * factor);
        assert!((a.0 - b.0).abs() < 1e-12 && (a.1 - b.1).abs() < 1e-12);

        let (row, col) = browse.latlon_to_pixel(a.0, a.1);
        assert!((row - 1000.0 * factor).abs() < 1e-6);
        assert!((col - 2000.0 * factor).abs() < 1e-6);
    }

    #[test]
    fn observation_extent_is_scale_times_pixels() {
        let loc = HiRiseRdrLocalizer::from_metadata(&esp_050016_1870()).unwrap();
        assert!((loc.observation_width_m() - 0.25 * 22023.0).abs() < 1e-3);
        assert!((loc.observation_length_m() - 0.25 * 23798.0).abs() < 1e-3);
    }

    #[test]
    fn nomap_option_selects_four_corner_localizer() {
        let m = esp_050016_1870();
        let loc = make_hirise_rdr(
            &m,
            &LocalizerOptions {
                nomap: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(loc.n_rows(), 1.0);
        let (lat, lon) = loc.pixel_to_latlon(0.0, 0.0);
        assert!((lat - 6.9035).abs() < 1e-9 && (lon - 70.0791).abs() < 1e-9);
    }

    #[test]
    fn unknown_projection_is_rejected() {
        let mut m = esp_050016_1870();
        m.set("map_projection_type", "SINUSOIDAL");
        let err = HiRiseRdrLocalizer::from_metadata(&m).unwrap_err();
        assert!(err.contains("SINUSOIDAL"));
    }
}
