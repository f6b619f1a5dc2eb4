use std::f64::consts::PI;

use crate::error::RouteError;

use super::coordinate::Coordinate;

/// Mean Earth radius (IUGG), in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

// Below this angular separation (radians) two points are treated as equal or antipodal.
const ANGLE_EPSILON: f64 = 1e-12;

/// Great-circle distance between two coordinates using the haversine formula.
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.latitude().to_radians();
    let lat_b = b.latitude().to_radians();
    let d_lat = lat_b - lat_a;
    let d_lon = (b.longitude() - a.longitude()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h marginally outside [0, 1]
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Samples `steps + 1` points along the shortest great circle from `a` to `b`.
///
/// Interpolation happens on unit vectors (slerp), so long routes bend towards
/// the poles the way a real flight path does. The endpoints are returned
/// exactly as given.
///
/// Antipodal endpoints have infinitely many shortest paths; this picks the one
/// leaving `a` due north along its meridian, or along the prime meridian when
/// `a` is itself a pole.
pub fn interpolate_great_circle(a: &Coordinate, b: &Coordinate, steps: usize) -> Result<Vec<Coordinate>, RouteError> {
    if steps == 0 {
        return Err(RouteError::InvalidArgument("great-circle interpolation needs at least one step".into()));
    }

    let va = a.to_unit_vector();
    let vb = b.to_unit_vector();
    let angle = dot(va, vb).clamp(-1.0, 1.0).acos();

    let mut points = Vec::with_capacity(steps + 1);
    points.push(*a);

    if angle < ANGLE_EPSILON {
        // Same place, possibly spelled differently (poles, ±180°)
        points.extend(std::iter::repeat(*a).take(steps - 1));
        points.push(*b);
        return Ok(points);
    }

    let antipodal = PI - angle < ANGLE_EPSILON;
    let heading = if antipodal { northward_tangent(va) } else { [0.0; 3] };
    let sin_angle = angle.sin();

    for i in 1..steps {
        let t = i as f64 / steps as f64;
        let v = if antipodal {
            // Half a turn around the circle through `a` and `heading`
            let theta = PI * t;
            combine(va, theta.cos(), heading, theta.sin())
        } else {
            let wa = ((1.0 - t) * angle).sin() / sin_angle;
            let wb = (t * angle).sin() / sin_angle;
            combine(va, wa, vb, wb)
        };
        points.push(Coordinate::from_unit_vector(v));
    }

    points.push(*b);
    Ok(points)
}

/// Breaks a polyline wherever two consecutive points are more than 180° of
/// longitude apart, i.e. where the path wraps around the antimeridian.
///
/// Always returns at least one segment, and the segments concatenate back to
/// the input.
pub fn split_at_antimeridian(polyline: &[Coordinate]) -> Vec<Vec<Coordinate>> {
    let mut segments = Vec::new();
    let mut current: Vec<Coordinate> = Vec::with_capacity(polyline.len());

    for point in polyline {
        if let Some(previous) = current.last() {
            if (point.longitude() - previous.longitude()).abs() > 180.0 {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.push(*point);
    }
    segments.push(current);

    segments
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn combine(a: [f64; 3], wa: f64, b: [f64; 3], wb: f64) -> [f64; 3] {
    [a[0] * wa + b[0] * wb, a[1] * wa + b[1] * wb, a[2] * wa + b[2] * wb]
}

/// Unit tangent at `v` pointing north, or towards 0°E at the poles.
fn northward_tangent(v: [f64; 3]) -> [f64; 3] {
    let north = [0.0, 0.0, 1.0];
    let projected = combine(north, 1.0, v, -dot(north, v));
    let length = dot(projected, projected).sqrt();
    if length < ANGLE_EPSILON {
        return [1.0, 0.0, 0.0];
    }
    [projected[0] / length, projected[1] / length, projected[2] / length]
}
