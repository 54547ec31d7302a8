//! ASHRAE clear-sky irradiance as a weather source.
//!
//! Sun positions come from the host; this module only turns them into
//! direct-normal and diffuse-horizontal irradiance with the monthly
//! constants of the ASHRAE clear-sky model.

use nalgebra::Vector3;

use crate::error::{ensure_len, RadianceError, Result};
use crate::weather::WeatherSource;

// ── Monthly constants ───────────────────────────────────────────────────────

/// Apparent solar irradiance at air mass zero (W/m²).
const APPARENT_IRRADIANCE: [f32; 12] = [
    1202.0, 1187.0, 1164.0, 1130.0, 1106.0, 1092.0, 1093.0, 1107.0, 1136.0, 1166.0, 1190.0,
    1204.0,
];
/// Atmospheric extinction coefficient.
const EXTINCTION: [f32; 12] = [
    0.141, 0.142, 0.149, 0.164, 0.177, 0.185, 0.186, 0.182, 0.165, 0.152, 0.144, 0.141,
];
/// Diffuse-to-direct ratio.
const DIFFUSE_FACTOR: [f32; 12] = [
    0.103, 0.104, 0.109, 0.120, 0.130, 0.137, 0.138, 0.134, 0.121, 0.111, 0.106, 0.103,
];

/// Last day of each month in a non-leap year.
const MONTH_ENDS: [u32; 12] = [31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

/// Zero-based month of a 1-based day of the year.
fn month_of(day_of_year: u32) -> usize {
    MONTH_ENDS
        .iter()
        .position(|&end| day_of_year <= end)
        .unwrap_or(11)
}

/// Direct-normal and diffuse-horizontal irradiance (W/m²) for a sun at
/// `sun_altitude_deg`. Zero when the sun is down.
pub fn ashrae_clear_sky(
    sun_altitude_deg: f32,
    day_of_year: u32,
    sky_clearness: f32,
) -> (f32, f32) {
    if sun_altitude_deg <= 0.0 {
        return (0.0, 0.0);
    }
    let month = month_of(day_of_year);
    let sin_alt = sun_altitude_deg.to_radians().sin();
    let dni = sky_clearness * APPARENT_IRRADIANCE[month] * (-EXTINCTION[month] / sin_alt).exp();
    (dni, DIFFUSE_FACTOR[month] * dni)
}

/// Clear-sky series over host-supplied sun vectors, one per record.
#[derive(Debug, Clone)]
pub struct ClearSkyWeather {
    location: String,
    timestep: u32,
    days: Vec<u32>,
    sun_vectors: Vec<Option<Vector3<f32>>>,
    direct_normal: Vec<f32>,
    diffuse_horizontal: Vec<f32>,
}

impl ClearSkyWeather {
    /// `days` holds the 1-based day of the year of every record.
    /// `sky_clearness` scales the direct beam (1 is the standard clear sky).
    pub fn new(
        location: impl Into<String>,
        sun_vectors: Vec<Option<Vector3<f32>>>,
        days: Vec<u32>,
        sky_clearness: f32,
    ) -> Result<Self> {
        ensure_len("day of year series", sun_vectors.len(), days.len())?;
        if !sky_clearness.is_finite() || sky_clearness <= 0.0 {
            return Err(RadianceError::InvalidParameter(format!(
                "sky clearness {sky_clearness} must be positive"
            )));
        }
        if let Some(bad) = days.iter().find(|&&d| d == 0 || d > 366) {
            return Err(RadianceError::InvalidParameter(format!(
                "day of year {bad} must be between 1 and 366"
            )));
        }
        let (direct_normal, diffuse_horizontal) = sun_vectors
            .iter()
            .zip(&days)
            .map(|(sun, &day)| match sun {
                Some(s) => {
                    let altitude = s.z.clamp(-1.0, 1.0).asin().to_degrees();
                    ashrae_clear_sky(altitude, day, sky_clearness)
                }
                None => (0.0, 0.0),
            })
            .unzip();
        Ok(Self {
            location: location.into(),
            timestep: 1,
            days,
            sun_vectors,
            direct_normal,
            diffuse_horizontal,
        })
    }

    pub fn with_timestep(mut self, timestep: u32) -> Result<Self> {
        if timestep == 0 {
            return Err(RadianceError::InvalidParameter(
                "timestep must be at least one record per hour".into(),
            ));
        }
        self.timestep = timestep;
        Ok(self)
    }
}

impl WeatherSource for ClearSkyWeather {
    fn hour_count(&self) -> usize {
        self.sun_vectors.len()
    }

    fn timestep(&self) -> u32 {
        self.timestep
    }

    fn direct_normal(&self, hour: usize) -> f32 {
        self.direct_normal[hour]
    }

    fn diffuse_horizontal(&self, hour: usize) -> f32 {
        self.diffuse_horizontal[hour]
    }

    fn sun_vector(&self, hour: usize) -> Option<Vector3<f32>> {
        self.sun_vectors[hour]
    }

    fn location_name(&self) -> &str {
        &self.location
    }

    fn day_of_year(&self, hour: usize) -> u32 {
        self.days[hour]
    }
}
