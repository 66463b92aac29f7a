//! Spherical geometry kernel.
//!
//! All primitives operate on `[f64; 3]` unit vectors or on (latitude,
//! longitude) pairs and are deterministic with no global state. Inverse
//! trig inputs are clamped to [-1, 1] so values a few ulps outside the
//! domain from accumulated rounding cannot produce NaN.
//!
//! PDSC stores and indexes positions as unit vectors; latitude/longitude
//! appears only at the API boundary. Averaging latitudes and longitudes
//! directly would break near the poles and across the ±180° meridian.

/// Mean Mars equatorial radius in meters (https://tharsis.gsfc.nasa.gov/geodesy.html).
pub const MARS_RADIUS_M: f64 = 3_396_200.0;

/// Mean Moon radius in meters (https://nssdc.gsfc.nasa.gov/planetary/factsheet/moonfact.html).
pub const MOON_RADIUS_M: f64 = 1_736_000.0;

/// Mars polar radius used by HiRISE map projections (DSMAP.CAT).
pub const MARS_RADIUS_POLAR_M: f64 = 3_376_200.0;

/// Mars equatorial radius used by HiRISE map projections (DSMAP.CAT).
pub const MARS_RADIUS_EQUATORIAL_M: f64 = 3_396_190.0;

pub type Vec3 = [f64; 3];

/// Convert a latitude/longitude pair (degrees) to a unit vector.
///
/// Longitude is accepted in either the [0, 360) or the [-180, 180)
/// convention; both map to the same vector.
pub fn latlon_to_unit(lat_deg: f64, lon_deg: f64) -> Vec3 {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    [
        lat.cos() * lon.cos(),
        lat.cos() * lon.sin(),
        lat.sin(),
    ]
}

/// Convert a (not necessarily normalized) nonzero vector to latitude and
/// east longitude in degrees. Longitude is returned in [0, 360).
pub fn unit_to_latlon(v: Vec3) -> (f64, f64) {
    let n = norm(v);
    debug_assert!(n > 0.0, "unit_to_latlon: zero vector");
    let z = (v[2] / n).clamp(-1.0, 1.0);
    let lat = z.asin().to_degrees();
    let mut lon = v[1].atan2(v[0]).to_degrees();
    if lon < 0.0 {
        lon += 360.0;
    }
    // atan2 can return exactly -0.0 -> 360.0 after the shift
    if lon >= 360.0 {
        lon -= 360.0;
    }
    (lat, lon)
}

/// Haversine central angle (radians) between two (lat, lon) pairs given
/// in radians.
pub fn haversine(latlon1: (f64, f64), latlon2: (f64, f64)) -> f64 {
    let (lat1, lon1) = latlon1;
    let (lat2, lon2) = latlon2;
    let sdlat = ((lat2 - lat1) / 2.0).sin();
    let sdlon = ((lon2 - lon1) / 2.0).sin();
    let h = sdlat * sdlat + lat1.cos() * lat2.cos() * sdlon * sdlon;
    2.0 * h.sqrt().clamp(-1.0, 1.0).asin()
}

/// Geodesic distance in meters between two (lat, lon) pairs in radians,
/// on a sphere of the given radius.
pub fn geodesic_distance(latlon1: (f64, f64), latlon2: (f64, f64), radius_m: f64) -> f64 {
    radius_m * haversine(latlon1, latlon2)
}

/// Central angle (radians) between two unit vectors.
pub fn angular_distance(a: Vec3, b: Vec3) -> f64 {
    dot(a, b).clamp(-1.0, 1.0).acos()
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

/// Normalize a nonzero vector to unit length.
pub fn normalize(v: Vec3) -> Vec3 {
    let n = norm(v);
    debug_assert!(n > 0.0, "normalize: zero vector");
    [v[0] / n, v[1] / n, v[2] / n]
}

pub fn scale(v: Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Normalized mean of a set of unit vectors: the spherical centroid for
/// points spanning less than a hemisphere.
pub fn vector_mean(points: &[Vec3]) -> Vec3 {
    let mut acc = [0.0; 3];
    for p in points {
        acc = add(acc, *p);
    }
    normalize(acc)
}

/// Normal of the plane through `v1`, `v2`, and the origin, normalized.
///
/// For vertices listed counter-clockwise (viewed from outside the
/// sphere), the half-space `n · p >= 0` is the inward side of the edge.
pub fn edge_plane_normal(v1: Vec3, v2: Vec3) -> Vec3 {
    normalize(cross(v1, v2))
}

/// Orthonormal basis (u, v) of the tangent plane at `anchor`.
///
/// Built from the coordinate axis least aligned with the anchor, so the
/// basis is well-conditioned everywhere on the sphere.
pub fn tangent_basis(anchor: Vec3) -> (Vec3, Vec3) {
    let ax = [anchor[0].abs(), anchor[1].abs(), anchor[2].abs()];
    let idx = if ax[0] <= ax[1] && ax[0] <= ax[2] {
        0
    } else if ax[1] <= ax[2] {
        1
    } else {
        2
    };
    let mut e = [0.0; 3];
    e[idx] = 1.0;
    let u = normalize(cross(e, anchor));
    let v = normalize(cross(u, anchor));
    (u, v)
}

/// Compass bearing (radians, clockwise from north) of the great-circle
/// path from `from` to `to`, both (lat, lon) in radians.
pub fn bearing(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;
    let dlon = lon2 - lon1;
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x)
}

/// Spherical direct problem: walk `distance_m` (may be negative) along
/// the great circle leaving (`lat_deg`, `lon_deg`) at compass azimuth
/// `azimuth_deg`, on a sphere of radius `radius_m`.
///
/// Returns the destination (degrees, longitude in [0, 360)) and the
/// forward azimuth of the path at the destination (degrees).
pub fn direct(
    lat_deg: f64,
    lon_deg: f64,
    azimuth_deg: f64,
    distance_m: f64,
    radius_m: f64,
) -> (f64, f64, f64) {
    let lat1 = lat_deg.to_radians();
    let lon1 = lon_deg.to_radians();
    let az1 = azimuth_deg.to_radians();
    let sigma = distance_m / radius_m;

    if sigma.abs() < 1e-15 {
        return (lat_deg, lon_deg.rem_euclid(360.0), azimuth_deg);
    }

    let sin_lat2 = (lat1.sin() * sigma.cos() + lat1.cos() * sigma.sin() * az1.cos())
        .clamp(-1.0, 1.0);
    let lat2 = sin_lat2.asin();
    let lon2 = lon1
        + (az1.sin() * sigma.sin() * lat1.cos())
            .atan2(sigma.cos() - lat1.sin() * sin_lat2);

    // Forward azimuth at the destination. For a positive distance the
    // path points away from the origin; for a negative one the origin is
    // ahead of the destination.
    let back = bearing((lat2, lon2), (lat1, lon1));
    let az2 = if sigma >= 0.0 {
        back + std::f64::consts::PI
    } else {
        back
    };

    (
        lat2.to_degrees(),
        lon2.to_degrees().rem_euclid(360.0),
        az2.to_degrees(),
    )
}

/// Gnomonic (central) projection of `point` onto the tangent plane at
/// `anchor` with basis `(u, v)`.
///
/// Returns `None` when the point lies on or beyond the horizon from the
/// anchor (dot product <= 0), where the projection is undefined.
pub fn gnomonic(point: Vec3, anchor: Vec3, u: Vec3, v: Vec3) -> Option<[f64; 2]> {
    let d = dot(point, anchor);
    if d <= 0.0 {
        return None;
    }
    Some([dot(point, u) / d, dot(point, v) / d])
}
