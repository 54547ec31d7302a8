//! Reducing a sky matrix through an intersection matrix.
//!
//! Sky values are extended with one ground patch per sky patch so they
//! line up with the `2 × patch_count` columns of a sky intersection
//! matrix. Radiation is in kWh/m², irradiance in W/m².

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ensure_len, RadianceError, Result};
use crate::intersection::IntersectionMatrix;
use crate::sky_matrix::SkyMatrix;

const PI: f32 = std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadiationComponent {
    #[default]
    Total,
    Direct,
    Diffuse,
}

impl FromStr for RadiationComponent {
    type Err = RadianceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "total" => Ok(Self::Total),
            "direct" => Ok(Self::Direct),
            "diffuse" => Ok(Self::Diffuse),
            _ => Err(RadianceError::InvalidParameter(format!(
                "radiation component \"{s}\" must be total, direct or diffuse"
            ))),
        }
    }
}

impl RadiationComponent {
    pub fn label(self) -> &'static str {
        match self {
            Self::Total => "Total",
            Self::Direct => "Direct",
            Self::Diffuse => "Diffuse",
        }
    }
}

/// Direct and diffuse sky values to reduce: the signed benefit difference
/// for benefit skies, the raw values otherwise.
pub fn sky_components(sky: &SkyMatrix) -> (&Array1<f32>, &Array1<f32>) {
    match sky.benefit_matrix() {
        Some(benefit) => (&benefit.difference.direct, &benefit.difference.diffuse),
        None => (sky.direct_values(), sky.diffuse_values()),
    }
}

/// Sky patch values for `component` followed by the ground patch values
/// (`2 × patch_count` entries).
///
/// The ground is a diffuse reflector of the sky's horizontal radiation,
/// so each ground patch carries `ρ · E_h · Ω / π`. Direct excludes it.
pub fn patch_values(sky: &SkyMatrix, component: RadiationComponent) -> Array1<f32> {
    let (direct, diffuse) = sky_components(sky);
    let scheme = sky.scheme();

    let horizontal: f32 = direct
        .iter()
        .zip(diffuse.iter())
        .zip(scheme.altitudes())
        .map(|((d, f), alt)| (d + f) * alt.to_radians().sin())
        .sum();
    let ground_factor = sky.ground_reflectance() * horizontal / PI;

    let sky_part = match component {
        RadiationComponent::Total => direct + diffuse,
        RadiationComponent::Direct => direct.clone(),
        RadiationComponent::Diffuse => diffuse.clone(),
    };
    let ground_part = scheme.solid_angles().iter().map(|&omega| match component {
        RadiationComponent::Direct => 0.0,
        _ => ground_factor * omega,
    });
    sky_part.iter().copied().chain(ground_part).collect()
}

/// Row-by-row dot product of the matrix with the patch values.
pub fn reduce(matrix: &IntersectionMatrix, values: &Array1<f32>) -> Result<Array1<f32>> {
    ensure_len("patch values", matrix.ncols(), values.len())?;
    Ok(match matrix {
        IntersectionMatrix::Weighted(m) => m.dot(values),
        IntersectionMatrix::Boolean(m) => m
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(values.iter())
                    .filter(|(visible, _)| **visible)
                    .map(|(_, v)| v)
                    .sum::<f32>()
            })
            .collect(),
    })
}

/// Radiation (kWh/m²) for every row of a sky intersection matrix.
pub fn radiation(
    sky: &SkyMatrix,
    matrix: &IntersectionMatrix,
    component: RadiationComponent,
) -> Result<Array1<f32>> {
    reduce(matrix, &patch_values(sky, component))
}

/// Average irradiance (W/m²) over `duration_hours`; zero for an empty period.
pub fn irradiance(radiation: &Array1<f32>, duration_hours: f32) -> Array1<f32> {
    if duration_hours <= 0.0 {
        return Array1::zeros(radiation.len());
    }
    radiation.mapv(|r| r * 1000.0 / duration_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ContextGeometry;
    use crate::intersection::sky_intersection_matrix;
    use crate::sky_matrix::SkyMatrixConfig;
    use crate::weather::test_support::synthetic_year;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use ndarray::{array, Array2};

    #[test]
    fn test_reduce_dot() {
        let matrix = IntersectionMatrix::Weighted(array![[1.0, 0.5], [0.0, 1.0]]);
        let out = reduce(&matrix, &array![2.0, 4.0]).unwrap();
        assert_eq!(out, array![4.0, 4.0]);

        let matrix = IntersectionMatrix::Boolean(array![[true, false], [true, true]]);
        let out = reduce(&matrix, &array![2.0, 4.0]).unwrap();
        assert_eq!(out, array![2.0, 6.0]);
    }

    #[test]
    fn test_reduce_width_mismatch() {
        let matrix = IntersectionMatrix::Weighted(Array2::zeros((3, 4)));
        assert!(matches!(
            reduce(&matrix, &Array1::zeros(5)),
            Err(RadianceError::DimensionMismatch {
                expected: 4,
                found: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_ground_reflection() {
        let weather = synthetic_year();
        let hours: Vec<usize> = (4000..4100).collect();
        let sky = SkyMatrix::from_source(&weather, Some(&hours), SkyMatrixConfig::default()).unwrap();
        let n = sky.len();

        let direct = patch_values(&sky, RadiationComponent::Direct);
        assert_eq!(direct.len(), 2 * n);
        assert!(direct.iter().skip(n).all(|&v| v == 0.0));

        let total = patch_values(&sky, RadiationComponent::Total);
        let diffuse = patch_values(&sky, RadiationComponent::Diffuse);
        for i in 0..2 * n {
            assert_relative_eq!(total[i], direct[i] + diffuse[i], max_relative = 1e-5);
        }

        // a downward face sees the reflected horizontal radiation
        let up = sky_intersection_matrix(
            &sky,
            &[Point3::origin(), Point3::origin()],
            &[Vector3::z(), -Vector3::z()],
            &ContextGeometry::empty(),
            0.0,
            true,
        )
        .unwrap();
        let rad = reduce(&up, &total).unwrap();
        assert_relative_eq!(rad[1], 0.2 * rad[0], max_relative = 0.02);
    }

    #[test]
    fn test_irradiance() {
        let out = irradiance(&array![8.76, 0.0], 8760.0);
        assert_relative_eq!(out[0], 1.0, epsilon = 1e-5);
        assert_eq!(irradiance(&array![1.0], 0.0), array![0.0]);
    }

    #[test]
    fn test_component_parse() {
        assert_eq!("Direct".parse::<RadiationComponent>().unwrap(), RadiationComponent::Direct);
        assert!("beam".parse::<RadiationComponent>().is_err());
    }
}
