//! Presentation adapters: sky dome, radiation rose and radiation dome.
//!
//! Each adapter resolves its values when constructed and builds meshes,
//! compass and legend payloads on `draw`. Nothing here is rendered.

mod raddome;
mod radrose;
mod skydome;

pub use raddome::{RadDomeConfig, RadiationDome};
pub use radrose::{RadiationRose, RoseConfig};
pub use skydome::SkyDome;

use std::fmt;
use std::str::FromStr;

use nalgebra::{Point3, Vector3};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{RadianceError, Result};
use crate::geometry::{Mesh3D, Occluder};
use crate::graphic::{ColoredMesh, GraphicContainer, LegendParameters};
use crate::intersection::{intersection_matrix, scene_patch_directions};
use crate::radiation::{irradiance, patch_values, reduce, RadiationComponent};
use crate::sky_matrix::SkyMatrix;

/// Hemisphere-to-plane projection for dome drawings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    Orthographic,
    Stereographic,
}

impl FromStr for Projection {
    type Err = RadianceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orthographic" => Ok(Self::Orthographic),
            "stereographic" => Ok(Self::Stereographic),
            _ => Err(RadianceError::UnsupportedProjection(s.to_string())),
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orthographic => write!(f, "Orthographic"),
            Self::Stereographic => write!(f, "Stereographic"),
        }
    }
}

impl Projection {
    /// Project a point of a dome centred on `center` onto the plane
    /// `z = center.z`.
    pub fn project(self, point: &Point3<f32>, radius: f32, center: &Point3<f32>) -> Point3<f32> {
        let rel = point - center;
        let (x, y) = match self {
            Self::Orthographic => (rel.x, rel.y),
            Self::Stereographic => {
                let factor = 1.0 + rel.z / radius;
                if factor.abs() <= f32::EPSILON {
                    (rel.x, rel.y)
                } else {
                    (rel.x / factor, rel.y / factor)
                }
            }
        };
        Point3::new(center.x + x, center.y + y, center.z)
    }

    pub fn project_mesh(self, mesh: &Mesh3D, radius: f32, center: &Point3<f32>) -> Result<Mesh3D> {
        let vertices = mesh
            .vertices()
            .iter()
            .map(|p| self.project(p, radius, center))
            .collect();
        Mesh3D::new(vertices, mesh.faces().to_vec())
    }
}

/// Where and how large the adapters draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub center_point: Point3<f32>,
    pub radius: f32,
    /// `None` draws a 3D dome.
    pub projection: Option<Projection>,
    pub legend_parameters: LegendParameters,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            center_point: Point3::origin(),
            radius: 100.0,
            projection: None,
            legend_parameters: LegendParameters::default(),
        }
    }
}

impl DisplayConfig {
    /// Set the projection from its name (`Orthographic` or `Stereographic`).
    pub fn with_projection_name(mut self, name: Option<&str>) -> Result<Self> {
        self.projection = name.map(str::parse).transpose()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.radius.is_nan() || self.radius <= 0.0 {
            return Err(RadianceError::InvalidParameter(format!(
                "radius {} must be positive",
                self.radius
            )));
        }
        Ok(())
    }
}

/// Compass placement accompanying a drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Compass {
    pub center: Point3<f32>,
    pub radius: f32,
    pub north: f32,
    pub projection: Option<Projection>,
}

impl Compass {
    /// Unit vector pointing north in the scene.
    pub fn north_vector(&self) -> Vector3<f32> {
        let angle = self.north.to_radians();
        Vector3::new(-angle.sin(), angle.cos(), 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Point3<f32>,
    pub end: Point3<f32>,
}

/// Everything a host needs to show one adapter drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub mesh: ColoredMesh,
    pub compass: Compass,
    pub graphic: GraphicContainer,
    pub title: String,
    /// Values aligned with the mesh faces (or vertices).
    pub values: Vec<f32>,
    pub orientation_lines: Vec<LineSegment>,
}

// ── Shared helpers ──────────────────────────────────────────────────────────

/// Total, direct and diffuse values in one struct.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ComponentValues {
    pub total: Array1<f32>,
    pub direct: Array1<f32>,
    pub diffuse: Array1<f32>,
}

impl ComponentValues {
    pub fn get(&self, component: RadiationComponent) -> &Array1<f32> {
        match component {
            RadiationComponent::Total => &self.total,
            RadiationComponent::Direct => &self.direct,
            RadiationComponent::Diffuse => &self.diffuse,
        }
    }

    fn scaled(self, sky: &SkyMatrix, plot_irradiance: bool) -> Self {
        if !plot_irradiance {
            return self;
        }
        let hours = sky.analysis_duration();
        Self {
            total: irradiance(&self.total, hours),
            direct: irradiance(&self.direct, hours),
            diffuse: irradiance(&self.diffuse, hours),
        }
    }
}

/// Radiation on surfaces at `center` facing each of `directions`.
pub(crate) fn directional_values<O: Occluder + ?Sized>(
    sky: &SkyMatrix,
    directions: &[Vector3<f32>],
    context: &O,
    center: Point3<f32>,
    plot_irradiance: bool,
) -> Result<ComponentValues> {
    let points = vec![center; directions.len()];
    let patch_dirs = scene_patch_directions(sky.scheme(), sky.north());
    let matrix = intersection_matrix(&points, directions, &patch_dirs, context, 0.0, true)?;
    let values = ComponentValues {
        total: reduce(&matrix, &patch_values(sky, RadiationComponent::Total))?,
        direct: reduce(&matrix, &patch_values(sky, RadiationComponent::Direct))?,
        diffuse: reduce(&matrix, &patch_values(sky, RadiationComponent::Diffuse))?,
    };
    Ok(values.scaled(sky, plot_irradiance))
}

pub(crate) fn units(plot_irradiance: bool) -> &'static str {
    if plot_irradiance {
        "W/m2"
    } else {
        "kWh/m2"
    }
}

pub(crate) fn title_text(
    component: RadiationComponent,
    plot_irradiance: bool,
    metadata: &[String],
) -> String {
    let kind = if plot_irradiance { "Irradiance" } else { "Radiation" };
    let mut lines = vec![format!("{} {}", component.label(), kind)];
    lines.extend(metadata.iter().cloned());
    lines.join("\n")
}

/// Legend corners pushed out by 15% of the radius around a drawing.
pub(crate) fn legend_corners(
    min: Point3<f32>,
    max: Point3<f32>,
    radius: f32,
) -> (Point3<f32>, Point3<f32>) {
    let margin = Vector3::new(radius * 0.15, radius * 0.15, 0.0);
    (min - margin, max + margin)
}

/// Legend parameters with the unit title filled in when missing.
pub(crate) fn titled_legend(mut legend: LegendParameters, plot_irradiance: bool) -> LegendParameters {
    if legend.title.is_none() {
        legend.title = Some(units(plot_irradiance).to_string());
    }
    legend
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_projection_parse() {
        assert_eq!("orthographic".parse::<Projection>().unwrap(), Projection::Orthographic);
        assert_eq!("Stereographic".parse::<Projection>().unwrap(), Projection::Stereographic);
        assert_eq!(
            "Fisheye".parse::<Projection>(),
            Err(RadianceError::UnsupportedProjection("Fisheye".into()))
        );
        let display = DisplayConfig::default().with_projection_name(Some("ORTHOGRAPHIC")).unwrap();
        assert_eq!(display.projection, Some(Projection::Orthographic));
        assert!(DisplayConfig::default().with_projection_name(Some("polar")).is_err());
    }

    #[test]
    fn test_projections() {
        let center = Point3::new(10.0, 0.0, 5.0);
        let zenith = Point3::new(10.0, 0.0, 105.0);
        let horizon = Point3::new(110.0, 0.0, 5.0);
        for projection in [Projection::Orthographic, Projection::Stereographic] {
            assert_relative_eq!(projection.project(&zenith, 100.0, &center), center);
            assert_relative_eq!(
                projection.project(&horizon, 100.0, &center),
                horizon,
                epsilon = 1e-4
            );
        }
        let mid = Point3::new(10.0 + 70.710_68, 0.0, 5.0 + 70.710_68);
        let ortho = Projection::Orthographic.project(&mid, 100.0, &center);
        let stereo = Projection::Stereographic.project(&mid, 100.0, &center);
        assert!(stereo.x - center.x < ortho.x - center.x);
    }

    #[test]
    fn test_compass_north() {
        let compass = Compass {
            center: Point3::origin(),
            radius: 1.0,
            north: 90.0,
            projection: None,
        };
        assert_relative_eq!(compass.north_vector(), Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-6);
    }
}
