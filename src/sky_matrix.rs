//! Cumulative sky matrix: direct and diffuse radiation per sky patch.
//!
//! Built once from a [`WeatherSource`] over a set of analysis hours and
//! immutable afterwards. Values are in kWh/m² and live in the geographic
//! frame; `north` only orients the sky when it is projected into a scene.

use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_len, RadianceError, Result};
use crate::patches::{azimuth_of, patch_scheme, PatchScheme, SkyDensity};
use crate::perez::relative_luminance;
use crate::weather::{validate_hours, WeatherSource};

/// How diffuse-horizontal radiation is spread over the sky patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkyModel {
    /// Uniform radiance.
    Isotropic,
    /// Perez all-weather luminance distribution.
    #[default]
    Perez,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyMatrixConfig {
    /// Counterclockwise rotation of north from +Y, in degrees.
    pub north: f32,
    /// Reinhart (577) instead of Tregenza (145) patches.
    pub high_density: bool,
    pub ground_reflectance: f32,
    pub sky_model: SkyModel,
}

impl Default for SkyMatrixConfig {
    fn default() -> Self {
        Self {
            north: 0.0,
            high_density: false,
            ground_reflectance: 0.2,
            sky_model: SkyModel::Perez,
        }
    }
}

impl SkyMatrixConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ground_reflectance) {
            return Err(RadianceError::InvalidParameter(format!(
                "ground reflectance {} must be between 0 and 1",
                self.ground_reflectance
            )));
        }
        if !self.north.is_finite() {
            return Err(RadianceError::InvalidParameter("north must be finite".into()));
        }
        Ok(())
    }

    pub fn density(&self) -> SkyDensity {
        SkyDensity::from_high_density(self.high_density)
    }
}

/// Direct and diffuse value per patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchValues {
    pub direct: Array1<f32>,
    pub diffuse: Array1<f32>,
}

impl PatchValues {
    fn zeros(n: usize) -> Self {
        Self {
            direct: Array1::zeros(n),
            diffuse: Array1::zeros(n),
        }
    }

    pub fn total(&self) -> Array1<f32> {
        &self.direct + &self.diffuse
    }
}

/// Radiation split by whether it helps or harms the thermal balance.
#[derive(Debug, Clone, PartialEq)]
pub struct BenefitMatrix {
    pub balance_temperature: f32,
    pub balance_offset: f32,
    /// Hours colder than `balance_temperature - balance_offset`.
    pub benefit: PatchValues,
    /// Hours warmer than `balance_temperature + balance_offset`.
    pub harm: PatchValues,
    /// `benefit - harm`, patch by patch.
    pub difference: PatchValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkyMatrix {
    config: SkyMatrixConfig,
    location: String,
    analysis_hours: Vec<usize>,
    timestep: u32,
    values: PatchValues,
    benefit: Option<BenefitMatrix>,
}

impl SkyMatrix {
    /// Accumulate the sky over `analysis_hours` (`None` = every record).
    pub fn from_source<W>(
        source: &W,
        analysis_hours: Option<&[usize]>,
        config: SkyMatrixConfig,
    ) -> Result<Self>
    where
        W: WeatherSource + Sync + ?Sized,
    {
        config.validate()?;
        let hours = validate_hours(analysis_hours, source)?;
        let scheme = patch_scheme(config.density());
        let values = accumulate(source, &hours, scheme, config.sky_model);
        log::info!(
            "sky matrix: {} patches over {} hours for {}",
            scheme.len(),
            hours.len(),
            source.location_name()
        );
        Ok(Self {
            location: source.location_name().to_string(),
            timestep: source.timestep(),
            analysis_hours: hours,
            config,
            values,
            benefit: None,
        })
    }

    /// Sky matrix whose benefit values separate hours that are too cold
    /// (radiation helps) from hours that are too warm (radiation harms).
    ///
    /// Needs dry-bulb temperatures for every analysis hour.
    pub fn from_source_benefit<W>(
        source: &W,
        balance_temperature: f32,
        balance_offset: f32,
        analysis_hours: Option<&[usize]>,
        config: SkyMatrixConfig,
    ) -> Result<Self>
    where
        W: WeatherSource + Sync + ?Sized,
    {
        if balance_offset < 0.0 {
            return Err(RadianceError::InvalidParameter(format!(
                "balance offset {balance_offset} must not be negative"
            )));
        }
        let mut sky = Self::from_source(source, analysis_hours, config)?;

        let mut cold = Vec::new();
        let mut warm = Vec::new();
        for &hour in &sky.analysis_hours {
            let temp = source.dry_bulb_temperature(hour).ok_or_else(|| {
                RadianceError::InvalidParameter(format!(
                    "benefit sky needs a dry bulb temperature for hour {hour}"
                ))
            })?;
            if temp < balance_temperature - balance_offset {
                cold.push(hour);
            } else if temp > balance_temperature + balance_offset {
                warm.push(hour);
            }
        }
        log::debug!(
            "benefit sky: {} cold hours, {} warm hours of {}",
            cold.len(),
            warm.len(),
            sky.analysis_hours.len()
        );

        let scheme = patch_scheme(sky.config.density());
        let benefit = accumulate(source, &cold, scheme, sky.config.sky_model);
        let harm = accumulate(source, &warm, scheme, sky.config.sky_model);
        let difference = PatchValues {
            direct: &benefit.direct - &harm.direct,
            diffuse: &benefit.diffuse - &harm.diffuse,
        };
        sky.benefit = Some(BenefitMatrix {
            balance_temperature,
            balance_offset,
            benefit,
            harm,
            difference,
        });
        Ok(sky)
    }

    /// Wrap precomputed patch values (145 or 577 of each).
    pub fn from_values(
        direct: Array1<f32>,
        diffuse: Array1<f32>,
        analysis_hours: Vec<usize>,
        timestep: u32,
        config: SkyMatrixConfig,
    ) -> Result<Self> {
        config.validate()?;
        let expected = config.density().patch_count();
        ensure_len("direct values", expected, direct.len())?;
        ensure_len("diffuse values", expected, diffuse.len())?;
        if timestep == 0 {
            return Err(RadianceError::InvalidParameter(
                "timestep must be at least one record per hour".into(),
            ));
        }
        Ok(Self {
            config,
            location: "-".into(),
            analysis_hours,
            timestep,
            values: PatchValues { direct, diffuse },
            benefit: None,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn config(&self) -> &SkyMatrixConfig {
        &self.config
    }

    pub fn north(&self) -> f32 {
        self.config.north
    }

    pub fn high_density(&self) -> bool {
        self.config.high_density
    }

    pub fn density(&self) -> SkyDensity {
        self.config.density()
    }

    pub fn scheme(&self) -> &'static PatchScheme {
        patch_scheme(self.density())
    }

    pub fn ground_reflectance(&self) -> f32 {
        self.config.ground_reflectance
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn analysis_hours(&self) -> &[usize] {
        &self.analysis_hours
    }

    pub fn timestep(&self) -> u32 {
        self.timestep
    }

    /// Length of the analysis period in hours.
    pub fn analysis_duration(&self) -> f32 {
        self.analysis_hours.len() as f32 / self.timestep as f32
    }

    pub fn direct_values(&self) -> &Array1<f32> {
        &self.values.direct
    }

    pub fn diffuse_values(&self) -> &Array1<f32> {
        &self.values.diffuse
    }

    pub fn total_values(&self) -> Array1<f32> {
        self.values.total()
    }

    pub fn benefit_matrix(&self) -> Option<&BenefitMatrix> {
        self.benefit.as_ref()
    }

    pub fn is_benefit(&self) -> bool {
        self.benefit.is_some()
    }

    /// Number of sky patches.
    pub fn len(&self) -> usize {
        self.values.direct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.direct.is_empty()
    }

    /// `(direct, diffuse)` per patch, in patch order.
    pub fn iter(&self) -> PatchIter<'_> {
        PatchIter {
            sky: self,
            index: 0,
        }
    }

    /// Descriptive lines used in graphic titles.
    pub fn metadata(&self) -> Vec<String> {
        let period = match (self.analysis_hours.first(), self.analysis_hours.last()) {
            (Some(first), Some(last)) => format!("Hours {first} - {last}"),
            _ => "No analysis hours".to_string(),
        };
        let mut lines = vec![
            self.location.clone(),
            period,
            format!("Ground Reflectance: {}", self.config.ground_reflectance),
        ];
        if self.config.north != 0.0 {
            lines.push(format!("North: {}", self.config.north));
        }
        if let Some(benefit) = &self.benefit {
            lines.push(format!(
                "Balance Temp: {}C +/- {}C",
                benefit.balance_temperature, benefit.balance_offset
            ));
        }
        lines
    }
}

pub struct PatchIter<'a> {
    sky: &'a SkyMatrix,
    index: usize,
}

impl Iterator for PatchIter<'_> {
    type Item = (f32, f32);

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.index;
        if i >= self.sky.len() {
            return None;
        }
        self.index += 1;
        Some((self.sky.values.direct[i], self.sky.values.diffuse[i]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sky.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PatchIter<'_> {}

impl<'a> IntoIterator for &'a SkyMatrix {
    type Item = (f32, f32);
    type IntoIter = PatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ── Accumulation ────────────────────────────────────────────────────────────

fn accumulate<W>(source: &W, hours: &[usize], scheme: &PatchScheme, model: SkyModel) -> PatchValues
where
    W: WeatherSource + Sync + ?Sized,
{
    let n = scheme.len();
    if hours.is_empty() {
        return PatchValues::zeros(n);
    }
    let weight = 1.0 / (source.timestep() as f64 * 1000.0);

    let (direct, diffuse) = hours
        .par_iter()
        .fold(
            || (vec![0.0_f64; n], vec![0.0_f64; n]),
            |(mut direct, mut diffuse), &hour| {
                add_hour(source, hour, scheme, model, weight, &mut direct, &mut diffuse);
                (direct, diffuse)
            },
        )
        .reduce(
            || (vec![0.0_f64; n], vec![0.0_f64; n]),
            |(mut da, mut fa), (db, fb)| {
                da.iter_mut().zip(db).for_each(|(a, b)| *a += b);
                fa.iter_mut().zip(fb).for_each(|(a, b)| *a += b);
                (da, fa)
            },
        );

    PatchValues {
        direct: direct.into_iter().map(|v| v as f32).collect(),
        diffuse: diffuse.into_iter().map(|v| v as f32).collect(),
    }
}

fn add_hour<W>(
    source: &W,
    hour: usize,
    scheme: &PatchScheme,
    model: SkyModel,
    weight: f64,
    direct: &mut [f64],
    diffuse: &mut [f64],
) where
    W: WeatherSource + ?Sized,
{
    let dni = source.direct_normal(hour).max(0.0);
    let dhi = source.diffuse_horizontal(hour).max(0.0);
    let sun = source.sun_vector(hour).and_then(|s| s.try_normalize(f32::EPSILON));

    if let Some(sun) = sun {
        if dni > 0.0 {
            if let Some(patch) = scheme.patch_index(&sun) {
                direct[patch] += dni as f64 * weight;
            }
        }
    }
    if dhi <= 0.0 {
        return;
    }

    let luminance = match (model, sun) {
        (SkyModel::Perez, Some(sun)) if sun.z > 0.0 => relative_luminance(
            scheme,
            sun.z.asin().to_degrees(),
            azimuth_of(&sun),
            dhi,
            dni,
            source.day_of_year(hour),
        ),
        _ => vec![1.0; scheme.len()],
    };

    // Scale so that the horizontal projection returns the measured diffuse.
    let shares: Vec<f64> = luminance
        .iter()
        .zip(scheme.solid_angles())
        .map(|(&l, &omega)| l as f64 * omega as f64)
        .collect();
    let horizontal: f64 = shares
        .iter()
        .zip(scheme.altitudes())
        .map(|(&s, &alt)| s * (alt as f64).to_radians().sin())
        .sum();
    if horizontal <= 0.0 {
        return;
    }
    let scale = dhi as f64 * weight / horizontal;
    for (d, s) in diffuse.iter_mut().zip(&shares) {
        *d += s * scale;
    }
}
