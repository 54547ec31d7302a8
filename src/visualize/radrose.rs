use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use super::{
    directional_values, legend_corners, title_text, titled_legend, ComponentValues, Compass,
    DisplayConfig, Drawing, LineSegment,
};
use crate::error::{RadianceError, Result};
use crate::geometry::{rotate_xy, Mesh3D, Occluder};
use crate::graphic::{ColoredMesh, GraphicContainer};
use crate::patches::direction_from_angles;
use crate::radiation::RadiationComponent;
use crate::sky_matrix::SkyMatrix;

const PI: f32 = std::f32::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoseConfig {
    /// Number of evenly spaced compass directions.
    pub direction_count: usize,
    /// 0 studies vertical surfaces, 90 faces straight up.
    pub tilt_angle: f32,
    /// Scales the width of the arrows.
    pub arrow_scale: f32,
}

impl Default for RoseConfig {
    fn default() -> Self {
        Self {
            direction_count: 36,
            tilt_angle: 0.0,
            arrow_scale: 1.0,
        }
    }
}

impl RoseConfig {
    fn validate(&self) -> Result<()> {
        if self.direction_count < 3 {
            return Err(RadianceError::InvalidParameter(format!(
                "a radiation rose needs at least 3 directions, got {}",
                self.direction_count
            )));
        }
        if !(-90.0..=90.0).contains(&self.tilt_angle) {
            return Err(RadianceError::InvalidParameter(format!(
                "tilt angle {} must be between -90 and 90",
                self.tilt_angle
            )));
        }
        if self.arrow_scale.is_nan() || self.arrow_scale <= 0.0 {
            return Err(RadianceError::InvalidParameter(format!(
                "arrow scale {} must be positive",
                self.arrow_scale
            )));
        }
        Ok(())
    }
}

/// Radiation received by surfaces facing each compass direction, drawn as
/// arrows around a centre.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiationRose {
    rose: RoseConfig,
    display: DisplayConfig,
    plot_irradiance: bool,
    north: f32,
    is_benefit: bool,
    metadata: Vec<String>,
    headings: Vec<Vector3<f32>>,
    directions: Vec<Vector3<f32>>,
    values: ComponentValues,
}

impl RadiationRose {
    pub fn new<O: Occluder + ?Sized>(
        sky: &SkyMatrix,
        context: &O,
        rose: RoseConfig,
        display: DisplayConfig,
        plot_irradiance: bool,
    ) -> Result<Self> {
        rose.validate()?;
        display.validate()?;
        let step = 360.0 / rose.direction_count as f32;
        let azimuths: Vec<f32> = (0..rose.direction_count).map(|i| i as f32 * step).collect();
        let headings = rotate_xy(
            &azimuths
                .iter()
                .map(|&az| direction_from_angles(0.0, az))
                .collect::<Vec<_>>(),
            sky.north(),
        );
        let directions = rotate_xy(
            &azimuths
                .iter()
                .map(|&az| direction_from_angles(rose.tilt_angle, az))
                .collect::<Vec<_>>(),
            sky.north(),
        );
        let values = directional_values(
            sky,
            &directions,
            context,
            display.center_point,
            plot_irradiance,
        )?;
        Ok(Self {
            rose,
            display,
            plot_irradiance,
            north: sky.north(),
            is_benefit: sky.is_benefit(),
            metadata: sky.metadata(),
            headings,
            directions,
            values,
        })
    }

    pub fn direction_count(&self) -> usize {
        self.rose.direction_count
    }

    pub fn tilt_angle(&self) -> f32 {
        self.rose.tilt_angle
    }

    pub fn arrow_scale(&self) -> f32 {
        self.rose.arrow_scale
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    pub fn plot_irradiance(&self) -> bool {
        self.plot_irradiance
    }

    pub fn north(&self) -> f32 {
        self.north
    }

    pub fn is_benefit(&self) -> bool {
        self.is_benefit
    }

    /// Normals of the studied surfaces.
    pub fn direction_vectors(&self) -> &[Vector3<f32>] {
        &self.directions
    }

    pub fn total_values(&self) -> &[f32] {
        self.values.total.as_slice().unwrap_or_default()
    }

    pub fn direct_values(&self) -> &[f32] {
        self.values.direct.as_slice().unwrap_or_default()
    }

    pub fn diffuse_values(&self) -> &[f32] {
        self.values.diffuse.as_slice().unwrap_or_default()
    }

    /// One arrow per direction, its length proportional to the value.
    pub fn draw(&self, component: RadiationComponent) -> Result<Drawing> {
        let values = self.values.get(component);
        let center = self.display.center_point;
        let radius = self.display.radius;
        let max_abs = values.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        let length_scale = if max_abs > 0.0 { radius / max_abs } else { 0.0 };
        let half_width =
            self.rose.arrow_scale * radius * (PI / self.rose.direction_count as f32) * 0.5;

        let mut vertices = Vec::with_capacity(3 * self.headings.len());
        let mut faces = Vec::with_capacity(self.headings.len());
        let mut orientation_lines = Vec::with_capacity(self.headings.len());
        for (i, (heading, value)) in self.headings.iter().zip(values.iter()).enumerate() {
            let side = Vector3::new(-heading.y, heading.x, 0.0) * half_width;
            let tip: Point3<f32> = center + heading * (value.abs() * length_scale);
            vertices.extend([center + side, center - side, tip]);
            faces.push(vec![3 * i, 3 * i + 1, 3 * i + 2]);
            orientation_lines.push(LineSegment {
                start: center,
                end: center + heading * radius,
            });
        }
        let mesh = Mesh3D::new(vertices, faces)?;

        let legend = titled_legend(self.display.legend_parameters.clone(), self.plot_irradiance);
        let extent = Vector3::new(radius, radius, 0.0);
        let (min_point, max_point) = legend_corners(center - extent, center + extent, radius);
        let graphic = GraphicContainer::new(values.clone(), min_point, max_point, legend)?;

        Ok(Drawing {
            mesh: ColoredMesh {
                mesh,
                colors: graphic.value_colors().to_vec(),
                by_vertex: false,
            },
            compass: Compass {
                center,
                radius,
                north: self.north,
                projection: None,
            },
            graphic,
            title: title_text(component, self.plot_irradiance, &self.metadata),
            values: values.to_vec(),
            orientation_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ContextGeometry;
    use crate::sky_matrix::SkyMatrixConfig;
    use crate::weather::test_support::synthetic_year;
    use approx::assert_relative_eq;

    fn year_sky() -> SkyMatrix {
        SkyMatrix::from_source(&synthetic_year(), None, SkyMatrixConfig::default()).unwrap()
    }

    #[test]
    fn test_radrose_defaults() {
        let sky = year_sky();
        let rose = RadiationRose::new(
            &sky,
            &ContextGeometry::empty(),
            RoseConfig::default(),
            DisplayConfig::default(),
            false,
        )
        .unwrap();
        assert_eq!(rose.direction_count(), 36);
        assert_eq!(rose.tilt_angle(), 0.0);
        assert_eq!(rose.arrow_scale(), 1.0);
        assert_eq!(rose.display().radius, 100.0);
        assert_eq!(rose.north(), 0.0);
        assert!(!rose.is_benefit());
        assert_eq!(rose.direction_vectors().len(), 36);
        assert_eq!(rose.total_values().len(), 36);
        assert_eq!(rose.direct_values().len(), 36);
        assert_eq!(rose.diffuse_values().len(), 36);

        // the northern-hemisphere sun favours the south-facing wall
        let north = rose.total_values()[0];
        let south = rose.total_values()[18];
        assert!(south > north);

        let drawing = rose.draw(RadiationComponent::Total).unwrap();
        assert_eq!(drawing.mesh.mesh.face_count(), 36);
        assert_eq!(drawing.orientation_lines.len(), 36);
        assert!(drawing.title.starts_with("Total Radiation"));
        let longest = drawing.orientation_lines[18].end;
        assert_relative_eq!((longest - Point3::origin()).norm(), 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_tilted_rose_points_up() {
        let sky = year_sky();
        let config = RoseConfig {
            direction_count: 8,
            tilt_angle: 90.0,
            ..Default::default()
        };
        let rose = RadiationRose::new(
            &sky,
            &ContextGeometry::empty(),
            config,
            DisplayConfig::default(),
            true,
        )
        .unwrap();
        // every surface is horizontal, so they all receive the same irradiance
        let first = rose.total_values()[0];
        for &v in rose.total_values() {
            assert_relative_eq!(v, first, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_invalid_rose_config() {
        let sky = year_sky();
        let config = RoseConfig {
            direction_count: 2,
            ..Default::default()
        };
        assert!(RadiationRose::new(
            &sky,
            &ContextGeometry::empty(),
            config,
            DisplayConfig::default(),
            false
        )
        .is_err());
    }
}
