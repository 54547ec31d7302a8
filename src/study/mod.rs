//! Studies over a mesh: cumulative radiation and direct sun hours.

mod directsun;
mod radiation;

pub use directsun::DirectSunStudy;
pub use radiation::RadiationStudy;

use std::cell::OnceCell;

use nalgebra::{Point3, Vector3};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_len, Result};
use crate::geometry::Mesh3D;
use crate::graphic::{ColoredMesh, GraphicContainer, LegendParameters};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Distance the study points are moved along their normals.
    pub offset_distance: f32,
    /// Study mesh vertices instead of face centres.
    pub by_vertex: bool,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            offset_distance: 0.0,
            by_vertex: false,
        }
    }
}

/// Drawn study result.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyGraphic {
    pub mesh: ColoredMesh,
    pub graphic: GraphicContainer,
    pub title: String,
}

/// Study points and unit normals of `mesh` (face centres, or vertices when
/// `by_vertex`), before any offset.
pub(crate) fn study_points(
    mesh: &Mesh3D,
    config: &StudyConfig,
) -> (Vec<Point3<f32>>, Vec<Vector3<f32>>) {
    if config.by_vertex {
        (mesh.vertices().to_vec(), mesh.vertex_normals())
    } else {
        (mesh.face_centers(), mesh.face_normals())
    }
}

/// Study points moved `offset_distance` along their normals, as rays are cast.
pub(crate) fn offset_study_points(mesh: &Mesh3D, config: &StudyConfig) -> Vec<Point3<f32>> {
    let (points, normals) = study_points(mesh, config);
    points
        .iter()
        .zip(&normals)
        .map(|(p, n)| p + n * config.offset_distance)
        .collect()
}

/// Areas paired with the study points.
pub(crate) fn study_areas(mesh: &Mesh3D, config: &StudyConfig) -> Vec<f32> {
    if config.by_vertex {
        mesh.vertex_areas()
    } else {
        mesh.face_areas()
    }
}

/// Area-weighted sum of per-point values.
pub(crate) fn area_weighted_total(values: &Array1<f32>, areas: &[f32]) -> Result<f32> {
    ensure_len("study areas", values.len(), areas.len())?;
    let total: f64 = values
        .iter()
        .zip(areas)
        .map(|(&v, &a)| v as f64 * a as f64)
        .sum();
    Ok(total as f32)
}

/// Read a lazily computed value, computing it on first use.
pub(crate) fn cached<T>(cell: &OnceCell<T>, compute: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = compute()?;
    Ok(cell.get_or_init(|| value))
}

pub(crate) fn draw_on_mesh(
    mesh: &Mesh3D,
    by_vertex: bool,
    values: Array1<f32>,
    mut legend: LegendParameters,
    units: &str,
    title_lines: Vec<String>,
) -> Result<StudyGraphic> {
    if legend.title.is_none() {
        legend.title = Some(units.to_string());
    }
    let graphic = GraphicContainer::new(values, mesh.min(), mesh.max(), legend)?;
    Ok(StudyGraphic {
        mesh: ColoredMesh {
            mesh: mesh.clone(),
            colors: graphic.value_colors().to_vec(),
            by_vertex,
        },
        graphic,
        title: title_lines.join("\n"),
    })
}
