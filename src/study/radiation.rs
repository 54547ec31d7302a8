use std::cell::OnceCell;

use nalgebra::{Point3, Vector3};
use ndarray::Array1;

use super::{
    area_weighted_total, cached, draw_on_mesh, offset_study_points, study_areas, study_points,
    StudyConfig, StudyGraphic,
};
use crate::error::Result;
use crate::geometry::{ContextGeometry, Mesh3D, Occluder};
use crate::graphic::LegendParameters;
use crate::intersection::{sky_intersection_matrix, IntersectionMatrix};
use crate::radiation::{irradiance, radiation, RadiationComponent};
use crate::sky_matrix::SkyMatrix;

/// Incident radiation on every face (or vertex) of a mesh.
///
/// The intersection matrix and radiation values are computed on first
/// request and kept until one of the inputs is replaced.
#[derive(Debug)]
pub struct RadiationStudy<O: Occluder = ContextGeometry> {
    sky: SkyMatrix,
    mesh: Mesh3D,
    context: O,
    config: StudyConfig,
    intersection: OnceCell<IntersectionMatrix>,
    radiation: OnceCell<Array1<f32>>,
}

impl<O: Occluder> RadiationStudy<O> {
    pub fn new(sky: SkyMatrix, mesh: Mesh3D, context: O, config: StudyConfig) -> Self {
        Self {
            sky,
            mesh,
            context,
            config,
            intersection: OnceCell::new(),
            radiation: OnceCell::new(),
        }
    }

    pub fn sky(&self) -> &SkyMatrix {
        &self.sky
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

    pub fn set_sky(&mut self, sky: SkyMatrix) {
        self.sky = sky;
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

    fn reset(&mut self) {
        self.intersection = OnceCell::new();
        self.radiation = OnceCell::new();
    }

    /// Weighted visibility of sky and ground patches from each study point.
    pub fn intersection_matrix(&self) -> Result<&IntersectionMatrix> {
        cached(&self.intersection, || {
            let (points, normals) = study_points(&self.mesh, &self.config);
            sky_intersection_matrix(
                &self.sky,
                &points,
                &normals,
                &self.context,
                self.config.offset_distance,
                true,
            )
        })
    }

    /// Cumulative radiation per study point in kWh/m².
    pub fn radiation_values(&self) -> Result<&Array1<f32>> {
        cached(&self.radiation, || {
            radiation(&self.sky, self.intersection_matrix()?, RadiationComponent::Total)
        })
    }

    /// Average irradiance per study point in W/m².
    pub fn irradiance_values(&self) -> Result<Array1<f32>> {
        Ok(irradiance(self.radiation_values()?, self.sky.analysis_duration()))
    }

    /// Radiation summed over the mesh area, in kWh.
    pub fn total_radiation(&self) -> Result<f32> {
        area_weighted_total(self.radiation_values()?, &study_areas(&self.mesh, &self.config))
    }

    pub fn draw(&self, plot_irradiance: bool, legend: LegendParameters) -> Result<StudyGraphic> {
        let (values, title, units) = if plot_irradiance {
            (self.irradiance_values()?, "Incident Irradiance", "W/m2")
        } else {
            (self.radiation_values()?.clone(), "Incident Radiation", "kWh/m2")
        };
        let mut lines = vec![title.to_string()];
        lines.extend(self.sky.metadata());
        draw_on_mesh(&self.mesh, self.config.by_vertex, values, legend, units, lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky_matrix::SkyMatrixConfig;
    use crate::weather::test_support::synthetic_year;
    use crate::weather::WeatherSource;
    use approx::assert_relative_eq;

    fn june_sky() -> SkyMatrix {
        let hours: Vec<usize> = (3624..3624 + 24 * 7).collect();
        SkyMatrix::from_source(&synthetic_year(), Some(&hours), SkyMatrixConfig::default()).unwrap()
    }

    fn grid() -> Mesh3D {
        Mesh3D::from_grid(Point3::new(-1.0, -1.0, 0.0), 2, 2, 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_open_grid_matches_horizontal() {
        let weather = synthetic_year();
        let hours: Vec<usize> = (3624..3624 + 24 * 7).collect();
        let sky = june_sky();
        let study = RadiationStudy::new(sky, grid(), ContextGeometry::empty(), StudyConfig::default());
        let values = study.radiation_values().unwrap();
        assert_eq!(values.len(), 4);

        // every face sees the whole sky, so it gets the global horizontal
        // radiation up to the patch discretisation of the direct beam
        let ghr: f32 = hours
            .iter()
            .map(|&h| {
                let sun_z = weather.sun_vector(h).map_or(0.0, |s| s.z);
                weather.direct_normal(h) * sun_z + weather.diffuse_horizontal(h)
            })
            .sum::<f32>()
            / 1000.0;
        for &v in values {
            assert_relative_eq!(v, ghr, max_relative = 0.05);
        }
        assert_relative_eq!(study.total_radiation().unwrap(), 4.0 * values[0], max_relative = 1e-5);
    }

    #[test]
    fn test_draw_titles() {
        let study =
            RadiationStudy::new(june_sky(), grid(), ContextGeometry::empty(), StudyConfig::default());
        let drawn = study.draw(false, LegendParameters::default()).unwrap();
        assert!(drawn.title.starts_with("Incident Radiation"));
        assert_eq!(drawn.mesh.colors.len(), 4);
        assert_eq!(drawn.graphic.title(), Some("kWh/m2"));

        let drawn = study.draw(true, LegendParameters::default()).unwrap();
        assert!(drawn.title.starts_with("Incident Irradiance"));
        let irr = study.irradiance_values().unwrap();
        let rad = study.radiation_values().unwrap();
        assert_relative_eq!(irr[0], rad[0] * 1000.0 / 168.0, max_relative = 1e-5);
    }

    #[test]
    fn test_setters_reset_cache() {
        let mut study =
            RadiationStudy::new(june_sky(), grid(), ContextGeometry::empty(), StudyConfig::default());
        let open = study.radiation_values().unwrap()[0];

        let wall = Mesh3D::from_extrusion(
            &[Point3::new(-3.0, -1.5, 0.0), Point3::new(3.0, -1.5, 0.0)],
            Vector3::new(0.0, 0.0, 5.0),
        )
        .unwrap();
        study.set_context(ContextGeometry::from_meshes(&[wall]));
        let shaded = study.radiation_values().unwrap()[0];
        assert!(shaded < open);

        study.set_config(StudyConfig {
            by_vertex: true,
            ..Default::default()
        });
        assert_eq!(study.radiation_values().unwrap().len(), 9);
    }

    #[test]
    fn test_offset_clears_coincident_context() {
        let lid = Mesh3D::from_grid(Point3::new(-2.0, -2.0, 0.01), 1, 1, 4.0, 4.0).unwrap();
        let mut study = RadiationStudy::new(
            june_sky(),
            grid(),
            ContextGeometry::from_meshes(&[lid]),
            StudyConfig::default(),
        );
        assert!(study.radiation_values().unwrap().iter().all(|&v| v == 0.0));

        study.set_config(StudyConfig {
            offset_distance: 0.1,
            ..Default::default()
        });
        assert!(study.radiation_values().unwrap().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_study_points_are_offset() {
        let config = StudyConfig {
            offset_distance: 0.1,
            ..Default::default()
        };
        let study = RadiationStudy::new(june_sky(), grid(), ContextGeometry::empty(), config);
        let points = study.study_points();
        let normals = study.study_normals();
        assert_eq!(points.len(), 4);
        assert_eq!(normals.len(), 4);
        assert_relative_eq!(points[0], Point3::new(-0.5, -0.5, 0.1), epsilon = 1e-6);
        assert_relative_eq!(normals[0], Vector3::z(), epsilon = 1e-6);
    }
}
