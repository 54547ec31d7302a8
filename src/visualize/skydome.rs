use nalgebra::{Point3, Vector3};

use super::{
    legend_corners, title_text, titled_legend, units, ComponentValues, Compass, DisplayConfig,
    Drawing,
};
use crate::error::{ensure_len, Result};
use crate::geometry::{rotate_xy, Mesh3D};
use crate::graphic::{ColoredMesh, GraphicContainer};
use crate::patches::PatchScheme;
use crate::radiation::{sky_components, RadiationComponent};
use crate::sky_matrix::SkyMatrix;

/// A sky matrix shown as a coloured dome of patches.
///
/// The dome mesh itself comes from the host; it must be a unit dome whose
/// faces follow the scheme's face table (`PatchScheme::face_count`).
#[derive(Debug, Clone)]
pub struct SkyDome {
    display: DisplayConfig,
    plot_irradiance: bool,
    north: f32,
    scheme: &'static PatchScheme,
    is_benefit: bool,
    metadata: Vec<String>,
    values: ComponentValues,
}

impl SkyDome {
    pub fn new(sky: &SkyMatrix, display: DisplayConfig, plot_irradiance: bool) -> Result<Self> {
        display.validate()?;
        let (direct, diffuse) = sky_components(sky);
        let values = ComponentValues {
            total: direct + diffuse,
            direct: direct.clone(),
            diffuse: diffuse.clone(),
        }
        .scaled(sky, plot_irradiance);
        Ok(Self {
            display,
            plot_irradiance,
            north: sky.north(),
            scheme: sky.scheme(),
            is_benefit: sky.is_benefit(),
            metadata: sky.metadata(),
            values,
        })
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

    /// Patch directions oriented by north.
    pub fn patch_vectors(&self) -> Vec<Vector3<f32>> {
        rotate_xy(self.scheme.vectors(), self.north)
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

    /// Colour `dome_mesh` (a unit dome following the scheme's face table)
    /// with one radiation component.
    pub fn draw(&self, component: RadiationComponent, dome_mesh: &Mesh3D) -> Result<Drawing> {
        ensure_len("dome mesh faces", self.scheme.face_count(), dome_mesh.face_count())?;
        let values = self
            .scheme
            .expand_to_faces(self.values.get(component).as_slice().unwrap_or_default())?;

        let DisplayConfig {
            center_point: center,
            radius,
            projection,
            ..
        } = self.display;
        let mut mesh = dome_mesh
            .scale(radius, Point3::origin())
            .rotate_xy(self.north, Point3::origin())
            .translate(center.coords);
        if let Some(projection) = projection {
            mesh = projection.project_mesh(&mesh, radius, &center)?;
        }

        let mut legend = titled_legend(self.display.legend_parameters.clone(), self.plot_irradiance);
        if legend.min.is_none() && !self.is_benefit {
            legend.min = Some(0.0);
        }
        if legend.max.is_none() {
            legend.max = self.values.total.iter().copied().reduce(f32::max);
        }
        let (min_point, max_point) = legend_corners(mesh.min(), mesh.max(), radius);
        let graphic = GraphicContainer::new(values.clone().into(), min_point, max_point, legend)?;
        log::debug!(
            "sky dome: {} faces, {} legend",
            mesh.face_count(),
            units(self.plot_irradiance)
        );

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
                projection,
            },
            graphic,
            title: title_text(component, self.plot_irradiance, &self.metadata),
            values,
            orientation_lines: Vec::new(),
        })
    }
}
