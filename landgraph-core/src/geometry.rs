//! Planar reprojection and polygon-area helpers.
//!
//! Used when deriving patch weights from geographic polygons. The projection
//! is a sinusoidal approximation that is accurate at city scale; its error
//! grows with the extent of the projected region, which is an accepted
//! trade-off rather than a bug.

use crate::error::GeometryError;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;

/// Projects geographic coordinates onto a local plane, in meters.
///
/// Applies `y = lat · (π·R/180)` and `x = lon · (π·R/180) · cos(lat)`, with
/// `R` the mean Earth radius. Suitable for small-extent (city scale) areas
/// only.
///
/// # Errors
/// Returns [`GeometryError::MismatchedLengths`] when the slices differ in
/// length.
///
/// # Examples
/// ```
/// use landgraph_core::geometry::reproject;
///
/// let (x, y) = reproject(&[0.0], &[0.0])?;
/// assert_eq!(x, vec![0.0]);
/// assert_eq!(y, vec![0.0]);
/// # Ok::<(), landgraph_core::GeometryError>(())
/// ```
pub fn reproject(
    latitude: &[f64],
    longitude: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), GeometryError> {
    if latitude.len() != longitude.len() {
        return Err(GeometryError::MismatchedLengths {
            latitudes: latitude.len(),
            longitudes: longitude.len(),
        });
    }
    let lat_dist = std::f64::consts::PI * EARTH_RADIUS_M / 180.0;
    let y = latitude.iter().map(|lat| lat * lat_dist).collect();
    let x = latitude
        .iter()
        .zip(longitude)
        .map(|(lat, lon)| lon * lat_dist * lat.to_radians().cos())
        .collect();
    Ok((x, y))
}

/// Computes the area of a simple polygon via the shoelace formula.
///
/// The ring is implicitly closed: the first vertex follows the last. The
/// input must be a simple (non-self-intersecting) ring; the result is
/// meaningless (but not an error) otherwise. Returns `0.0` for fewer than
/// three vertices.
#[must_use]
pub fn polygon_area(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let prev = (i + n - 1) % n;
        let next = (i + 1) % n;
        twice_area += x[i] * (y[next] - y[prev]);
    }
    twice_area.abs() / 2.0
}

/// Projects a geographic `(latitude, longitude)` ring and returns its planar
/// area in square meters.
///
/// # Errors
/// Currently infallible for well-formed input; kept fallible for parity with
/// [`reproject`].
pub fn projected_area(points: &[(f64, f64)]) -> Result<f64, GeometryError> {
    let latitude: Vec<f64> = points.iter().map(|&(lat, _)| lat).collect();
    let longitude: Vec<f64> = points.iter().map(|&(_, lon)| lon).collect();
    let (x, y) = reproject(&latitude, &longitude)?;
    Ok(polygon_area(&x, &y))
}
