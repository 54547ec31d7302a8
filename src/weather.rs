//! Weather-source collaborator.
//!
//! Weather file parsing and solar position live outside this crate. A
//! [`WeatherSource`] exposes just what the sky matrix needs for every
//! record: direct-normal and diffuse-horizontal irradiance (W/m²) and the
//! unit vector pointing from the ground towards the sun.

use nalgebra::Vector3;

use crate::error::{ensure_len, RadianceError, Result};

pub trait WeatherSource {
    /// Number of records. Valid analysis hours are `0..hour_count()`.
    fn hour_count(&self) -> usize;

    /// Records per hour.
    fn timestep(&self) -> u32 {
        1
    }

    fn direct_normal(&self, hour: usize) -> f32;

    fn diffuse_horizontal(&self, hour: usize) -> f32;

    /// Vector towards the sun, `None` when the sun is down.
    fn sun_vector(&self, hour: usize) -> Option<Vector3<f32>>;

    fn dry_bulb_temperature(&self, _hour: usize) -> Option<f32> {
        None
    }

    fn location_name(&self) -> &str {
        "-"
    }

    /// 1-based day of the year for a record.
    fn day_of_year(&self, hour: usize) -> u32 {
        (hour / (24 * self.timestep() as usize)) as u32 % 365 + 1
    }
}

/// In-memory weather series, one entry per record.
#[derive(Debug, Clone)]
pub struct HourlyWeather {
    location: String,
    timestep: u32,
    direct_normal: Vec<f32>,
    diffuse_horizontal: Vec<f32>,
    sun_vectors: Vec<Option<Vector3<f32>>>,
    dry_bulb: Option<Vec<f32>>,
}

impl HourlyWeather {
    pub fn new(
        location: impl Into<String>,
        direct_normal: Vec<f32>,
        diffuse_horizontal: Vec<f32>,
        sun_vectors: Vec<Option<Vector3<f32>>>,
    ) -> Result<Self> {
        let n = direct_normal.len();
        ensure_len("diffuse horizontal series", n, diffuse_horizontal.len())?;
        ensure_len("sun vector series", n, sun_vectors.len())?;
        Ok(Self {
            location: location.into(),
            timestep: 1,
            direct_normal,
            diffuse_horizontal,
            sun_vectors,
            dry_bulb: None,
        })
    }

    pub fn with_dry_bulb(mut self, dry_bulb: Vec<f32>) -> Result<Self> {
        ensure_len("dry bulb series", self.direct_normal.len(), dry_bulb.len())?;
        self.dry_bulb = Some(dry_bulb);
        Ok(self)
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

impl WeatherSource for HourlyWeather {
    fn hour_count(&self) -> usize {
        self.direct_normal.len()
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

    fn dry_bulb_temperature(&self, hour: usize) -> Option<f32> {
        self.dry_bulb.as_ref().map(|t| t[hour])
    }

    fn location_name(&self) -> &str {
        &self.location
    }
}

/// Resolve the analysis hours against a source.
///
/// `None` selects every record. Any index outside `[0, hour_count - 1]`
/// fails with [`RadianceError::InvalidHour`].
pub fn validate_hours<W: WeatherSource + ?Sized>(
    hours: Option<&[usize]>,
    source: &W,
) -> Result<Vec<usize>> {
    let count = source.hour_count();
    match hours {
        None => Ok((0..count).collect()),
        Some(hours) => {
            if let Some(&bad) = hours.iter().find(|&&h| h >= count) {
                return Err(RadianceError::InvalidHour {
                    hour: bad as i64,
                    max: count.saturating_sub(1),
                });
            }
            Ok(hours.to_vec())
        }
    }
}

/// Convert signed hour indices (as received from hosts) into `usize`s.
pub fn hours_from_signed(hours: &[i64], hour_count: usize) -> Result<Vec<usize>> {
    hours
        .iter()
        .map(|&h| {
            if h < 0 || h as usize >= hour_count {
                Err(RadianceError::InvalidHour {
                    hour: h,
                    max: hour_count.saturating_sub(1),
                })
            } else {
                Ok(h as usize)
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_hours() {
        let weather = test_support::synthetic_year();
        assert_eq!(validate_hours(None, &weather).unwrap().len(), 8760);
        assert_eq!(validate_hours(Some(&[0, 8759]), &weather).unwrap(), vec![0, 8759]);
        assert_eq!(
            validate_hours(Some(&[0, 8760]), &weather),
            Err(RadianceError::InvalidHour {
                hour: 8760,
                max: 8759
            })
        );
    }

    #[test]
    fn test_negative_hours_rejected() {
        assert!(matches!(
            hours_from_signed(&[3, -1], 8760),
            Err(RadianceError::InvalidHour { hour: -1, .. })
        ));
        assert_eq!(hours_from_signed(&[3, 4], 8760).unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_mismatched_series() {
        let result = HourlyWeather::new("x", vec![0.0; 3], vec![0.0; 2], vec![None; 3]);
        assert!(matches!(
            result,
            Err(RadianceError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_synthetic_sun_is_south_at_noon() {
        let sun = test_support::sun_vector(41.98, 172, 12.0);
        assert!(sun.y < 0.0);
        assert!(sun.z > 0.9);
        assert!(sun.x.abs() < 1e-5);
    }

    #[test]
    fn test_day_of_year() {
        let weather = test_support::synthetic_year();
        assert_eq!(weather.day_of_year(0), 1);
        assert_eq!(weather.day_of_year(8759), 365);
    }
}
