//! Triangular footprint segments and the footprint segmenter.
//!
//! Observation footprints are decomposed into spherical triangles for
//! indexing. Triangles are convex on the sphere by construction, so point
//! inclusion reduces to three inward-normal sign tests, and the
//! approximation error of the decomposition is bounded by the configured
//! segmentation resolution.

use crate::geom::{
    self, angular_distance, gnomonic, latlon_to_unit, tangent_basis, unit_to_latlon, Vec3,
};
use crate::localize::Localizer;
use crate::{Error, Result};

/// Numerical slack for point-inclusion tests; corresponds to roughly a
/// millimeter on the surface of Mars.
pub const INCLUSION_EPSILON: f64 = 1e-10;

/// Vertex pairs closer than this (radians) make a segment degenerate.
pub const DEGENERACY_EPSILON: f64 = 1e-12;

/// A point-inclusion query: all observations whose footprint intersects a
/// circle of `radius_m` around (`lat`, `lon`).
#[derive(Debug, Clone)]
pub struct PointQuery {
    lat: f64,
    lon: f64,
    radius_m: f64,
    xyz: Vec3,
}

impl PointQuery {
    /// Validates the latitude range and the radius sign; longitude is
    /// accepted in either sign convention.
    pub fn new(lat: f64, lon: f64, radius_m: f64) -> Result<PointQuery> {
        if !(-90.0..=90.0).contains(&lat) || !lat.is_finite() {
            return Err(Error::bad_query(format!(
                "latitude must be in range [-90, 90], got {lat}"
            )));
        }
        if !lon.is_finite() {
            return Err(Error::bad_query(format!("longitude must be finite, got {lon}")));
        }
        if !(radius_m >= 0.0) {
            return Err(Error::bad_query(format!(
                "radius must be non-negative, got {radius_m}"
            )));
        }
        Ok(PointQuery {
            lat,
            lon,
            radius_m,
            xyz: latlon_to_unit(lat, lon),
        })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// The query point as a unit vector.
    pub fn xyz(&self) -> Vec3 {
        self.xyz
    }
}

/// A single triangular segment of an observation footprint.
///
/// Vertices are listed in counter-clockwise order looking down on the
/// surface from outside the sphere, so every edge-plane normal points
/// into the triangle. The center (normalized vector mean of the vertices)
/// and bounding radius are computed on construction.
#[derive(Debug, Clone)]
pub struct TriSegment {
    latlon_points: [[f64; 2]; 3],
    body_radius: f64,
    xyz_points: [Vec3; 3],
    normals: [Vec3; 3],
    center: Vec3,
    radius_m: f64,
}

impl TriSegment {
    /// Build a segment from three (latitude, longitude) vertices in
    /// degrees, on a body of the given radius.
    pub fn new(
        latlon0: [f64; 2],
        latlon1: [f64; 2],
        latlon2: [f64; 2],
        body_radius: f64,
    ) -> TriSegment {
        let latlon_points = [latlon0, latlon1, latlon2];
        let xyz_points = [
            latlon_to_unit(latlon0[0], latlon0[1]),
            latlon_to_unit(latlon1[0], latlon1[1]),
            latlon_to_unit(latlon2[0], latlon2[1]),
        ];

        // The mean only vanishes for vertex sets no real footprint
        // produces; those are rejected as degenerate at ingest.
        let sum = geom::add(geom::add(xyz_points[0], xyz_points[1]), xyz_points[2]);
        let center = if geom::norm(sum) < 1e-12 {
            xyz_points[0]
        } else {
            geom::normalize(sum)
        };

        let mut normals = [[0.0; 3]; 3];
        for i in 0..3 {
            let c = geom::cross(xyz_points[i], xyz_points[(i + 1) % 3]);
            let n = geom::norm(c);
            normals[i] = if n < 1e-30 { c } else { geom::scale(c, 1.0 / n) };
        }

        let radius_m = xyz_points
            .iter()
            .map(|v| angular_distance(center, *v) * body_radius)
            .fold(0.0, f64::max);

        TriSegment {
            latlon_points,
            body_radius,
            xyz_points,
            normals,
            center,
            radius_m,
        }
    }

    /// Vertices as (latitude, longitude) degrees, counter-clockwise.
    pub fn latlon_points(&self) -> &[[f64; 2]; 3] {
        &self.latlon_points
    }

    /// Vertices as unit vectors.
    pub fn xyz_points(&self) -> &[Vec3; 3] {
        &self.xyz_points
    }

    /// Inward edge-plane normals, one per edge `(i, i+1)`.
    pub fn normals(&self) -> &[Vec3; 3] {
        &self.normals
    }

    /// Segment center as a unit vector.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Segment center as (latitude, longitude) degrees.
    pub fn center_latlon(&self) -> (f64, f64) {
        unit_to_latlon(self.center)
    }

    /// Maximum geodesic distance (meters) from the center to a vertex.
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn body_radius(&self) -> f64 {
        self.body_radius
    }

    /// True when any two vertices are closer than [`DEGENERACY_EPSILON`]
    /// or within it of antipodal.
    pub fn is_degenerate(&self) -> bool {
        for i in 0..3 {
            for j in (i + 1)..3 {
                let d = angular_distance(self.xyz_points[i], self.xyz_points[j]);
                if d < DEGENERACY_EPSILON || d > std::f64::consts::PI - DEGENERACY_EPSILON {
                    return true;
                }
            }
        }
        false
    }

    /// True iff `xyz` is on the inward side of all three edge planes.
    /// The boundary counts as inside.
    pub fn is_inside(&self, xyz: Vec3) -> bool {
        self.normals
            .iter()
            .all(|n| geom::dot(*n, xyz) >= -INCLUSION_EPSILON)
    }

    /// Closest point to `p` on the arc from vertex `i` to vertex `i+1`,
    /// or `None` when the projection falls outside the arc (the closest
    /// point is then an endpoint).
    fn closest_point_on_edge(&self, p: Vec3, i: usize) -> Option<Vec3> {
        let v1 = self.xyz_points[i];
        let v2 = self.xyz_points[(i + 1) % 3];
        let n = self.normals[i];

        let proj = geom::sub(p, geom::scale(n, geom::dot(n, p)));
        if geom::norm(proj) < 1e-15 {
            return None;
        }
        let q = geom::normalize(proj);

        // Arc membership: q must be on the v2 side of v1 and vice versa,
        // tested against the tangents of the edge's great circle.
        let t1 = geom::cross(n, v1);
        let t2 = geom::cross(v2, n);
        if geom::dot(q, t1) >= 0.0 && geom::dot(q, t2) >= 0.0 {
            Some(q)
        } else {
            None
        }
    }

    /// Geodesic distance (meters) from `xyz` to this segment: zero
    /// inside, otherwise the minimum over the three vertices and the
    /// valid arc projections.
    pub fn distance_to_point(&self, xyz: Vec3) -> f64 {
        if self.is_inside(xyz) {
            return 0.0;
        }

        let mut best = f64::INFINITY;
        for v in &self.xyz_points {
            best = best.min(angular_distance(xyz, *v));
        }
        for i in 0..3 {
            if let Some(q) = self.closest_point_on_edge(xyz, i) {
                best = best.min(angular_distance(xyz, q));
            }
        }
        best * self.body_radius
    }

    /// Exact phase of a point query: inclusion for a zero radius,
    /// distance comparison otherwise.
    pub fn includes_point(&self, query: &PointQuery) -> bool {
        if query.radius_m() == 0.0 {
            self.is_inside(query.xyz())
        } else {
            self.distance_to_point(query.xyz()) <= query.radius_m()
        }
    }

    /// True iff this segment and `other` overlap with positive area.
    ///
    /// Both triangles are projected gnomonically onto the tangent plane
    /// anchored at the renormalized mean of the two centers, then tested
    /// with the separating-axis check. Shared edges and vertices alone do
    /// not count as overlap. Segments more than a hemisphere apart cannot
    /// overlap and return false without projecting.
    pub fn overlaps_segment(&self, other: &TriSegment) -> bool {
        let sum = geom::add(self.center, other.center);
        if geom::norm(sum) < 1e-12 {
            return false;
        }
        let anchor = geom::normalize(sum);
        let (u, v) = tangent_basis(anchor);

        let mut a = [[0.0; 2]; 3];
        let mut b = [[0.0; 2]; 3];
        for i in 0..3 {
            match gnomonic(self.xyz_points[i], anchor, u, v) {
                Some(p) => a[i] = p,
                None => return false,
            }
            match gnomonic(other.xyz_points[i], anchor, u, v) {
                Some(p) => b[i] = p,
                None => return false,
            }
        }

        triangles_overlap(&a, &b)
    }
}

/// Separating-axis test for two planar triangles. Contact of measure
/// zero (shared vertex or edge, no interior intersection) is not overlap.
fn triangles_overlap(a: &[[f64; 2]; 3], b: &[[f64; 2]; 3]) -> bool {
    for tri in [a, b] {
        for i in 0..3 {
            let p = tri[i];
            let q = tri[(i + 1) % 3];
            // Outward-agnostic axis: the edge perpendicular.
            let axis = [q[1] - p[1], p[0] - q[0]];
            let (min_a, max_a) = project_interval(a, axis);
            let (min_b, max_b) = project_interval(b, axis);
            if max_a <= min_b || max_b <= min_a {
                return false;
            }
        }
    }
    true
}

fn project_interval(tri: &[[f64; 2]; 3], axis: [f64; 2]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for p in tri {
        let d = p[0] * axis[0] + p[1] * axis[1];
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

/// Decomposition of one observation footprint into triangular segments.
///
/// The pixel grid is walked with a step chosen so adjacent grid vertices
/// land roughly `resolution_m` apart on the surface; each grid cell emits
/// two triangles sharing the cell diagonal. The grid spans the full pixel
/// extent inclusive, so edge cells cover the final partial step. Winding
/// follows the localizer's flight direction so vertices always come out
/// counter-clockwise.
pub struct TriSegmentedFootprint {
    pub segments: Vec<TriSegment>,
}

impl TriSegmentedFootprint {
    pub fn new(
        localizer: &dyn Localizer,
        resolution_m: f64,
        body_radius: f64,
    ) -> TriSegmentedFootprint {
        let n_row_chunks = (localizer.observation_length_m() / resolution_m)
            .ceil()
            .max(1.0) as usize;
        let n_col_chunks = (localizer.observation_width_m() / resolution_m)
            .ceil()
            .max(1.0) as usize;

        let row_idx = linspace(0.0, localizer.n_rows(), n_row_chunks + 1);
        let col_idx = linspace(0.0, localizer.n_cols(), n_col_chunks + 1);

        // grid[c][r]: surface point of pixel (row_idx[r], col_idx[c])
        let grid: Vec<Vec<[f64; 2]>> = col_idx
            .iter()
            .map(|&col| {
                row_idx
                    .iter()
                    .map(|&row| {
                        let (lat, lon) = localizer.pixel_to_latlon(row, col);
                        [lat, lon]
                    })
                    .collect()
            })
            .collect();

        let top_down = localizer.flight_direction() > 0.0;
        let mut segments = Vec::with_capacity(2 * n_row_chunks * n_col_chunks);
        for c in 0..n_col_chunks {
            for r in 0..n_row_chunks {
                let p00 = grid[c][r];
                let p01 = grid[c][r + 1];
                let p10 = grid[c + 1][r];
                let p11 = grid[c + 1][r + 1];
                if top_down {
                    segments.push(TriSegment::new(p00, p01, p10, body_radius));
                    segments.push(TriSegment::new(p11, p10, p01, body_radius));
                } else {
                    segments.push(TriSegment::new(p00, p10, p01, body_radius));
                    segments.push(TriSegment::new(p11, p01, p10, body_radius));
                }
            }
        }

        TriSegmentedFootprint { segments }
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    debug_assert!(n >= 2);
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| {
            if i == n - 1 {
                end
            } else {
                start + step * i as f64
            }
        })
        .collect()
}
