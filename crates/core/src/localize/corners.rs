//! Four-corner localizer: bilinear interpolation between the corner
//! positions of a footprint.

use super::{req_real, Localizer};
use crate::geom::{geodesic_distance, latlon_to_unit, unit_to_latlon, Vec3, MARS_RADIUS_M};
use pdsc_types::Metadata;

/// Localizer for observations described only by their four footprint
/// corners. Interpolation happens in unit-vector space with a final
/// renormalization, so corner quads spanning the date line or a pole
/// behave correctly.
#[derive(Debug)]
pub struct FourCornerLocalizer {
    /// Corner unit vectors indexed `[row-axis][col-axis]`: the row axis
    /// interpolates corner 1 → corner 4, the column axis corner 1 →
    /// corner 2.
    corner_matrix: [[Vec3; 2]; 2],
    n_rows: f64,
    n_cols: f64,
    pixel_height_m: f64,
    pixel_width_m: f64,
    flight_direction: f64,
    body_radius: f64,
    pixel_resolution_m: f64,
}

impl FourCornerLocalizer {
    /// `corners` are (latitude, longitude) pairs in degrees, in the
    /// cumulative-index order corner 1 through corner 4 (top left,
    /// bottom left, bottom right, top right).
    pub fn new(
        corners: [[f64; 2]; 4],
        n_rows: f64,
        n_cols: f64,
        flight_direction: f64,
        body_radius: f64,
    ) -> Result<FourCornerLocalizer, String> {
        if n_rows <= 0.0 {
            return Err("no image rows".to_string());
        }
        if n_cols <= 0.0 {
            return Err("no image columns".to_string());
        }

        let unit: Vec<Vec3> = corners
            .iter()
            .map(|c| latlon_to_unit(c[0], c[1]))
            .collect();
        let corner_matrix = [[unit[0], unit[3]], [unit[1], unit[2]]];

        let rad: Vec<(f64, f64)> = corners
            .iter()
            .map(|c| (c[0].to_radians(), c[1].to_radians()))
            .collect();
        let pixel_height_m = (geodesic_distance(rad[0], rad[3], body_radius)
            + geodesic_distance(rad[1], rad[2], body_radius))
            / (2.0 * n_rows);
        let pixel_width_m = (geodesic_distance(rad[0], rad[1], body_radius)
            + geodesic_distance(rad[2], rad[3], body_radius))
            / (2.0 * n_cols);

        Ok(FourCornerLocalizer {
            corner_matrix,
            n_rows,
            n_cols,
            pixel_height_m,
            pixel_width_m,
            flight_direction,
            body_radius,
            pixel_resolution_m: 1e-6,
        })
    }
}

impl Localizer for FourCornerLocalizer {
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
        let c = &self.corner_matrix;
        let wr = [self.n_rows - row, row];
        let wc = [self.n_cols - col, col];

        let mut interp = [0.0; 3];
        for (i, &wci) in wc.iter().enumerate() {
            for (j, &wrj) in wr.iter().enumerate() {
                for (dim, acc) in interp.iter_mut().enumerate() {
                    *acc += wci * wrj * c[i][j][dim];
                }
            }
        }
        // The scale factor 1 / (n_rows * n_cols) drops out in the
        // renormalization inside unit_to_latlon.
        unit_to_latlon(interp)
    }
}

/// HiRISE RDR NOMAP products: the cumulative index does not record the
/// NOMAP image dimensions, so pixel space is normalized to [0, 1].
#[derive(Debug)]
pub struct HiRiseRdrNoMapLocalizer;

impl HiRiseRdrNoMapLocalizer {
    pub fn from_metadata(m: &Metadata) -> Result<FourCornerLocalizer, String> {
        let corners = [
            [
                req_real(m, "corner1_latitude")?,
                req_real(m, "corner1_longitude")?,
            ],
            [
                req_real(m, "corner2_latitude")?,
                req_real(m, "corner2_longitude")?,
            ],
            [
                req_real(m, "corner3_latitude")?,
                req_real(m, "corner3_longitude")?,
            ],
            [
                req_real(m, "corner4_latitude")?,
                req_real(m, "corner4_longitude")?,
            ],
        ];
        FourCornerLocalizer::new(corners, 1.0, 1.0, 1.0, MARS_RADIUS_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> FourCornerLocalizer {
        // A one-degree quad on the equator; corner order 1..4.
        FourCornerLocalizer::new(
            [[1.0, 10.0], [1.0, 11.0], [0.0, 11.0], [0.0, 10.0]],
            100.0,
            200.0,
            1.0,
            MARS_RADIUS_M,
        )
        .unwrap()
    }

    #[test]
    fn corners_map_to_pixel_extremes() {
        let loc = square();
        let close = |got: (f64, f64), want: (f64, f64)| {
            assert!(
                (got.0 - want.0).abs() < 1e-9 && (got.1 - want.1).abs() < 1e-9,
                "{got:?} != {want:?}"
            );
        };
        close(loc.pixel_to_latlon(0.0, 0.0), (1.0, 10.0));
        close(loc.pixel_to_latlon(100.0, 0.0), (0.0, 10.0));
        close(loc.pixel_to_latlon(0.0, 200.0), (1.0, 11.0));
        close(loc.pixel_to_latlon(100.0, 200.0), (0.0, 11.0));
    }

    #[test]
    fn interior_point_is_between_corners() {
        let loc = square();
        let (lat, lon) = loc.pixel_to_latlon(50.0, 100.0);
        assert!((lat - 0.5).abs() < 1e-4);
        assert!((lon - 10.5).abs() < 1e-4);
    }

    #[test]
    fn pixel_sizes_from_edge_lengths() {
        let loc = square();
        // One degree of arc over 100 rows / 200 cols.
        let deg = 1.0f64.to_radians() * MARS_RADIUS_M;
        assert!((loc.observation_length_m() - deg).abs() / deg < 1e-3);
        assert!((loc.observation_width_m() - deg).abs() / deg < 1e-3);
    }

    #[test]
    fn roundtrip_through_numeric_inversion() {
        let loc = square();
        for &(row, col) in &[(10.0, 20.0), (50.0, 100.0), (90.0, 180.0)] {
            let (lat, lon) = loc.pixel_to_latlon(row, col);
            let (grow, gcol) = loc.latlon_to_pixel(lat, lon);
            assert!(
                (grow - row).abs() < 0.1 && (gcol - col).abs() < 0.1,
                "({grow}, {gcol}) != ({row}, {col})"
            );
        }
    }

    #[test]
    fn quad_across_date_line() {
        let loc = FourCornerLocalizer::new(
            [[1.0, 359.5], [1.0, 0.5], [0.0, 0.5], [0.0, 359.5]],
            10.0,
            10.0,
            1.0,
            MARS_RADIUS_M,
        )
        .unwrap();
        let (lat, lon) = loc.pixel_to_latlon(5.0, 5.0);
        assert!((lat - 0.5).abs() < 1e-4);
        // The interpolated longitude stays on the date line, not at 180.
        assert!(lon < 0.1 || lon > 359.9, "lon = {lon}");
    }

    #[test]
    fn nomap_uses_normalized_pixel_space() {
        let mut m = Metadata::new("hirise_rdr");
        m.set("corner1_latitude", 6.9035)
            .set("corner1_longitude", 70.0791)
            .set("corner2_latitude", 6.8934)
            .set("corner2_longitude", 69.9971)
            .set("corner3_latitude", 6.9837)
            .set("corner3_longitude", 69.9859)
            .set("corner4_latitude", 6.9937)
            .set("corner4_longitude", 70.068);
        let loc = HiRiseRdrNoMapLocalizer::from_metadata(&m).unwrap();
        assert_eq!(loc.n_rows(), 1.0);
        assert_eq!(loc.n_cols(), 1.0);
        let (lat, lon) = loc.pixel_to_latlon(0.0, 0.0);
        assert!((lat - 6.9035).abs() < 1e-9);
        assert!((lon - 70.0791).abs() < 1e-9);
    }
}
