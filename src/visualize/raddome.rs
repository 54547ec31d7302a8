use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::{
    directional_values, legend_corners, title_text, titled_legend, ComponentValues, Compass,
    DisplayConfig, Drawing,
};
use crate::error::{RadianceError, Result};
use crate::geometry::{rotate_xy, Mesh3D, Occluder};
use crate::graphic::{ColoredMesh, GraphicContainer};
use crate::patches::direction_from_angles;
use crate::radiation::RadiationComponent;
use crate::sky_matrix::SkyMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadDomeConfig {
    pub azimuth_count: usize,
    pub altitude_count: usize,
}

impl Default for RadDomeConfig {
    fn default() -> Self {
        Self {
            azimuth_count: 72,
            altitude_count: 18,
        }
    }
}

impl RadDomeConfig {
    fn validate(&self) -> Result<()> {
        if self.azimuth_count < 3 || self.altitude_count == 0 {
            return Err(RadianceError::InvalidParameter(format!(
                "radiation dome needs at least 3 azimuths and 1 altitude, got {} x {}",
                self.azimuth_count, self.altitude_count
            )));
        }
        Ok(())
    }

    /// Number of directions including the zenith.
    pub fn direction_count(&self) -> usize {
        self.azimuth_count * self.altitude_count + 1
    }
}

/// Radiation on surfaces facing every direction of the upper hemisphere,
/// drawn as a dome coloured by vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiationDome {
    dome: RadDomeConfig,
    display: DisplayConfig,
    plot_irradiance: bool,
    north: f32,
    is_benefit: bool,
    metadata: Vec<String>,
    directions: Vec<Vector3<f32>>,
    values: ComponentValues,
}

impl RadiationDome {
    pub fn new<O: Occluder + ?Sized>(
        sky: &SkyMatrix,
        context: &O,
        dome: RadDomeConfig,
        display: DisplayConfig,
        plot_irradiance: bool,
    ) -> Result<Self> {
        dome.validate()?;
        display.validate()?;
        let directions = rotate_xy(&dome_directions(&dome), sky.north());
        let values = directional_values(
            sky,
            &directions,
            context,
            display.center_point,
            plot_irradiance,
        )?;
        log::debug!("radiation dome: {} directions", directions.len());
        Ok(Self {
            dome,
            display,
            plot_irradiance,
            north: sky.north(),
            is_benefit: sky.is_benefit(),
            metadata: sky.metadata(),
            directions,
            values,
        })
    }

    pub fn azimuth_count(&self) -> usize {
        self.dome.azimuth_count
    }

    pub fn altitude_count(&self) -> usize {
        self.dome.altitude_count
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

    pub fn draw(&self, component: RadiationComponent) -> Result<Drawing> {
        let values = self.values.get(component);
        let center = self.display.center_point;
        let radius = self.display.radius;
        let projection = self.display.projection;

        let vertices = self
            .directions
            .iter()
            .map(|d| center + d * radius)
            .collect();
        let mut mesh = Mesh3D::new(vertices, dome_faces(&self.dome))?;
        if let Some(projection) = projection {
            mesh = projection.project_mesh(&mesh, radius, &center)?;
        }

        let legend = titled_legend(self.display.legend_parameters.clone(), self.plot_irradiance);
        let (min_point, max_point) = legend_corners(mesh.min(), mesh.max(), radius);
        let graphic = GraphicContainer::new(values.clone(), min_point, max_point, legend)?;

        Ok(Drawing {
            mesh: ColoredMesh {
                mesh,
                colors: graphic.value_colors().to_vec(),
                by_vertex: true,
            },
            compass: Compass {
                center,
                radius,
                north: self.north,
                projection,
            },
            graphic,
            title: title_text(component, self.plot_irradiance, &self.metadata),
            values: values.to_vec(),
            orientation_lines: Vec::new(),
        })
    }
}

/// Rings of `azimuth_count` directions from the horizon upwards, then the zenith.
fn dome_directions(dome: &RadDomeConfig) -> Vec<Vector3<f32>> {
    let alt_step = 90.0 / dome.altitude_count as f32;
    let azi_step = 360.0 / dome.azimuth_count as f32;
    let mut directions = Vec::with_capacity(dome.direction_count());
    for j in 0..dome.altitude_count {
        for i in 0..dome.azimuth_count {
            directions.push(direction_from_angles(j as f32 * alt_step, i as f32 * azi_step));
        }
    }
    directions.push(Vector3::z());
    directions
}

/// Quads between neighbouring rings and a triangle fan to the zenith.
fn dome_faces(dome: &RadDomeConfig) -> Vec<Vec<usize>> {
    let n = dome.azimuth_count;
    let rings = dome.altitude_count;
    let zenith = n * rings;
    let mut faces = Vec::with_capacity(n * rings);
    for j in 0..rings - 1 {
        for i in 0..n {
            let next = (i + 1) % n;
            faces.push(vec![j * n + i, (j + 1) * n + i, (j + 1) * n + next, j * n + next]);
        }
    }
    let top = (rings - 1) * n;
    for i in 0..n {
        faces.push(vec![top + i, zenith, top + (i + 1) % n]);
    }
    faces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ContextGeometry;
    use crate::sky_matrix::SkyMatrixConfig;
    use crate::visualize::Projection;
    use crate::weather::test_support::synthetic_year;

    #[test]
    fn test_raddome_defaults() {
        let sky =
            SkyMatrix::from_source(&synthetic_year(), None, SkyMatrixConfig::default()).unwrap();
        let dome = RadiationDome::new(
            &sky,
            &ContextGeometry::empty(),
            RadDomeConfig::default(),
            DisplayConfig::default(),
            false,
        )
        .unwrap();
        assert_eq!(dome.azimuth_count(), 72);
        assert_eq!(dome.altitude_count(), 18);
        assert_eq!(dome.display().projection, None);
        assert_eq!(dome.north(), 0.0);
        assert!(!dome.is_benefit());
        assert_eq!(dome.direction_vectors().len(), 72 * 18 + 1);
        assert_eq!(dome.total_values().len(), 72 * 18 + 1);
        assert_eq!(dome.direct_values().len(), 72 * 18 + 1);
        assert_eq!(dome.diffuse_values().len(), 72 * 18 + 1);

        let drawing = dome.draw(RadiationComponent::Total).unwrap();
        assert!(drawing.mesh.by_vertex);
        assert_eq!(drawing.mesh.colors.len(), drawing.mesh.mesh.vertex_count());
        assert_eq!(drawing.mesh.mesh.face_count(), 72 * 17 + 72);
        assert!(drawing.title.starts_with("Total Radiation"));
    }

    #[test]
    fn test_raddome_projection() {
        let sky = SkyMatrix::from_source(
            &synthetic_year(),
            Some(&(4000..4048).collect::<Vec<_>>()),
            SkyMatrixConfig::default(),
        )
        .unwrap();
        let display = DisplayConfig {
            projection: Some(Projection::Orthographic),
            ..Default::default()
        };
        let config = RadDomeConfig {
            azimuth_count: 8,
            altitude_count: 3,
        };
        let dome =
            RadiationDome::new(&sky, &ContextGeometry::empty(), config, display, true).unwrap();
        let drawing = dome.draw(RadiationComponent::Direct).unwrap();
        assert!(drawing.mesh.mesh.vertices().iter().all(|p| p.z == 0.0));
        assert!(drawing.title.starts_with("Direct Irradiance"));
    }

    #[test]
    fn test_invalid_dome_config() {
        let config = RadDomeConfig {
            azimuth_count: 2,
            altitude_count: 18,
        };
        assert!(config.validate().is_err());
    }
}
