use std::cell::OnceCell;

use nalgebra::{Point3, Vector3};
use ndarray::Array1;

use super::{
    area_weighted_total, cached, draw_on_mesh, offset_study_points, study_areas, study_points,
    StudyConfig, StudyGraphic,
};
use crate::error::{RadianceError, Result};
use crate::geometry::{ContextGeometry, Mesh3D, Occluder};
use crate::graphic::LegendParameters;
use crate::intersection::{intersection_matrix, IntersectionMatrix};

/// Hours of direct sun on every face (or vertex) of a mesh.
///
/// `vectors` point from the ground towards the sun, one per record; with a
/// timestep of `n` records per hour each visible record counts `1/n` hours.
/// Sun-to-ground vectors are accepted too: when every vector points
/// downwards the whole set is reversed.
#[derive(Debug)]
pub struct DirectSunStudy<O: Occluder = ContextGeometry> {
    vectors: Vec<Vector3<f32>>,
    mesh: Mesh3D,
    context: O,
    config: StudyConfig,
    timestep: u32,
    intersection: OnceCell<IntersectionMatrix>,
    sun_hours: OnceCell<Array1<f32>>,
}

impl<O: Occluder> DirectSunStudy<O> {
    pub fn new(
        vectors: Vec<Vector3<f32>>,
        mesh: Mesh3D,
        context: O,
        config: StudyConfig,
        timestep: u32,
    ) -> Result<Self> {
        check_timestep(timestep)?;
        Ok(Self {
            vectors: toward_sun(vectors),
            mesh,
            context,
            config,
            timestep,
            intersection: OnceCell::new(),
            sun_hours: OnceCell::new(),
        })
    }

    pub fn vectors(&self) -> &[Vector3<f32>] {
        &self.vectors
    }

    pub fn mesh(&self) -> &Mesh3D {
        &self.mesh
    }

    pub fn context(&self) -> &O {
        &self.context
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Points the rays start from: face centres (or vertices) moved
    /// `offset_distance` along their normals.
    pub fn study_points(&self) -> Vec<Point3<f32>> {
        offset_study_points(&self.mesh, &self.config)
    }

    pub fn study_normals(&self) -> Vec<Vector3<f32>> {
        study_points(&self.mesh, &self.config).1
    }

    pub fn timestep(&self) -> u32 {
        self.timestep
    }

    /// Hours covered by the sun vectors.
    pub fn analysis_duration(&self) -> f32 {
        self.vectors.len() as f32 / self.timestep as f32
    }

    pub fn set_vectors(&mut self, vectors: Vec<Vector3<f32>>) {
        self.vectors = toward_sun(vectors);
        self.reset();
    }

    pub fn set_mesh(&mut self, mesh: Mesh3D) {
        self.mesh = mesh;
        self.reset();
    }

    pub fn set_context(&mut self, context: O) {
        self.context = context;
        self.reset();
    }

    pub fn set_config(&mut self, config: StudyConfig) {
        self.config = config;
        self.reset();
    }

    pub fn set_timestep(&mut self, timestep: u32) -> Result<()> {
        check_timestep(timestep)?;
        self.timestep = timestep;
        self.sun_hours = OnceCell::new();
        Ok(())
    }

    fn reset(&mut self) {
        self.intersection = OnceCell::new();
        self.sun_hours = OnceCell::new();
    }

    /// Which sun vectors each study point sees.
    pub fn intersection_matrix(&self) -> Result<&IntersectionMatrix> {
        cached(&self.intersection, || {
            let (points, normals) = study_points(&self.mesh, &self.config);
            intersection_matrix(
                &points,
                &normals,
                &self.vectors,
                &self.context,
                self.config.offset_distance,
                false,
            )
        })
    }

    /// Visible share of the sun vectors times the analysis duration.
    pub fn direct_sun_hours(&self) -> Result<&Array1<f32>> {
        cached(&self.sun_hours, || {
            let step = self.timestep as f32;
            Ok(self
                .intersection_matrix()?
                .visible_counts()
                .mapv(|count| count as f32 / step))
        })
    }

    /// Sun hours summed over the mesh area.
    pub fn total_direct_sun_hours(&self) -> Result<f32> {
        area_weighted_total(self.direct_sun_hours()?, &study_areas(&self.mesh, &self.config))
    }

    pub fn draw(&self, legend: LegendParameters) -> Result<StudyGraphic> {
        let values = self.direct_sun_hours()?.clone();
        draw_on_mesh(
            &self.mesh,
            self.config.by_vertex,
            values,
            legend,
            "hours",
            vec!["Direct Sun Hours".to_string()],
        )
    }
}

/// Reverse a set of sun vectors that all point from the sky to the ground.
fn toward_sun(vectors: Vec<Vector3<f32>>) -> Vec<Vector3<f32>> {
    if !vectors.is_empty() && vectors.iter().all(|v| v.z < 0.0) {
        log::debug!("direct sun study: reversing {} downward sun vectors", vectors.len());
        return vectors.into_iter().map(|v| -v).collect();
    }
    vectors
}

fn check_timestep(timestep: u32) -> Result<()> {
    if timestep == 0 {
        return Err(RadianceError::InvalidParameter(
            "timestep must be at least one record per hour".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::test_support::sun_vector;
    use approx::assert_relative_eq;

    fn june_day() -> Vec<Vector3<f32>> {
        (0..24)
            .map(|h| sun_vector(41.98, 172, h as f32 + 0.5))
            .filter(|s| s.z > 0.0)
            .collect()
    }

    #[test]
    fn test_unshaded_ground_sees_every_sun() {
        let vectors = june_day();
        let count = vectors.len() as f32;
        let mesh = Mesh3D::from_grid(Point3::origin(), 2, 2, 1.0, 1.0).unwrap();
        let study =
            DirectSunStudy::new(vectors, mesh, ContextGeometry::empty(), StudyConfig::default(), 1)
                .unwrap();
        let hours = study.direct_sun_hours().unwrap();
        assert!(hours.iter().all(|&h| h == count));
        assert_relative_eq!(study.total_direct_sun_hours().unwrap(), 4.0 * count, epsilon = 1e-3);
        assert_eq!(study.draw(LegendParameters::default()).unwrap().title, "Direct Sun Hours");
    }

    #[test]
    fn test_wall_removes_sun_hours() {
        let vectors = june_day();
        let mesh = Mesh3D::from_grid(Point3::new(-1.0, -1.0, 0.0), 1, 1, 2.0, 2.0).unwrap();
        let wall = Mesh3D::from_extrusion(
            &[Point3::new(-5.0, -1.5, 0.0), Point3::new(5.0, -1.5, 0.0)],
            Vector3::new(0.0, 0.0, 10.0),
        )
        .unwrap();
        let mut study = DirectSunStudy::new(
            vectors.clone(),
            mesh,
            ContextGeometry::from_meshes(&[wall]),
            StudyConfig::default(),
            1,
        )
        .unwrap();
        let shaded = study.direct_sun_hours().unwrap()[0];
        assert!(shaded < vectors.len() as f32);

        study.set_timestep(2).unwrap();
        assert_relative_eq!(study.direct_sun_hours().unwrap()[0], shaded / 2.0);
        assert_relative_eq!(study.analysis_duration(), vectors.len() as f32 / 2.0);
    }

    #[test]
    fn test_zero_timestep_rejected() {
        let mesh = Mesh3D::from_grid(Point3::origin(), 1, 1, 1.0, 1.0).unwrap();
        assert!(matches!(
            DirectSunStudy::new(vec![], mesh, ContextGeometry::empty(), StudyConfig::default(), 0),
            Err(RadianceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_downward_sun_vectors_are_reversed() {
        let up = june_day();
        let down: Vec<Vector3<f32>> = up.iter().map(|v| -v).collect();
        let mesh = Mesh3D::from_grid(Point3::origin(), 1, 1, 1.0, 1.0).unwrap();
        let study =
            DirectSunStudy::new(down, mesh, ContextGeometry::empty(), StudyConfig::default(), 1)
                .unwrap();
        assert_eq!(study.vectors(), up.as_slice());
        assert_eq!(study.direct_sun_hours().unwrap()[0], up.len() as f32);
        assert_eq!(study.study_points().len(), 1);
        assert_eq!(study.study_normals().len(), 1);
    }
}
