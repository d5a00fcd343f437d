/// Mean Earth radius used for every great-circle computation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Spherical-Earth helpers operating on latitude/longitude in degrees.
pub struct GeodesyHelper;

impl GeodesyHelper {
    /// Haversine great-circle distance in meters.
    pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let phi1 = lat1.to_radians();
        let phi2 = lat2.to_radians();
        let delta_phi = (lat2 - lat1).to_radians();
        let delta_lambda = (lon2 - lon1).to_radians();

        let a = (delta_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
        // rounding can push `a` marginally above 1 for antipodal points
        let a = a.clamp(0.0, 1.0);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Initial bearing from the first point towards the second, in [0, 360).
    pub fn initial_bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let phi1 = lat1.to_radians();
        let phi2 = lat2.to_radians();
        let delta_lambda = (lon2 - lon1).to_radians();

        let y = delta_lambda.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    /// Point reached by travelling `distance_m` from the origin along `bearing_deg`.
    pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
        let phi = lat.to_radians();
        let lambda = lon.to_radians();
        let theta = bearing_deg.to_radians();
        let delta = distance_m / EARTH_RADIUS_M;

        let phi2 = (phi.sin() * delta.cos() + phi.cos() * delta.sin() * theta.cos()).asin();
        let lambda2 = lambda
            + (theta.sin() * delta.sin() * phi.cos()).atan2(delta.cos() - phi.sin() * phi2.sin());

        let lon2 = (lambda2.to_degrees() + 540.0) % 360.0 - 180.0;
        (phi2.to_degrees(), lon2)
    }
}
