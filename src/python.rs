//! Python bindings over the array-level operations.

use nalgebra::{Point3, Vector3};
use ndarray::{Array1, ArrayView2};
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::error::RadianceError;
use crate::geometry::{ContextGeometry, Mesh3D};
use crate::intersection::{intersection_matrix, scene_patch_directions, IntersectionMatrix};
use crate::radiation::{patch_values, reduce, RadiationComponent};
use crate::sky_matrix::{SkyMatrix, SkyMatrixConfig, SkyModel};
use crate::weather::{hours_from_signed, HourlyWeather, WeatherSource};

impl From<RadianceError> for PyErr {
    fn from(err: RadianceError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

/// Sky matrix settings
#[pyclass]
#[derive(Clone)]
pub struct SkyParams {
    #[pyo3(get, set)]
    pub north: f32,
    #[pyo3(get, set)]
    pub high_density: bool,
    #[pyo3(get, set)]
    pub ground_reflectance: f32,
    #[pyo3(get, set)]
    pub isotropic: bool,
}

#[pymethods]
impl SkyParams {
    #[new]
    #[pyo3(signature = (north=0.0, high_density=false, ground_reflectance=0.2, isotropic=false))]
    pub fn new(north: f32, high_density: bool, ground_reflectance: f32, isotropic: bool) -> Self {
        Self {
            north,
            high_density,
            ground_reflectance,
            isotropic,
        }
    }
}

impl SkyParams {
    fn config(&self) -> SkyMatrixConfig {
        SkyMatrixConfig {
            north: self.north,
            high_density: self.high_density,
            ground_reflectance: self.ground_reflectance,
            sky_model: if self.isotropic {
                SkyModel::Isotropic
            } else {
                SkyModel::Perez
            },
        }
    }
}

/// Accumulated sky patch values (kWh/m2)
#[pyclass]
pub struct SkyMatrixResult {
    #[pyo3(get)]
    pub direct: Py<PyArray1<f32>>,
    #[pyo3(get)]
    pub diffuse: Py<PyArray1<f32>>,
    /// Sky and ground values in scene order, ready for `reduce_radiation`.
    #[pyo3(get)]
    pub patch_values: Py<PyArray1<f32>>,
    /// Scene-frame patch directions (sky then ground), one row per patch.
    #[pyo3(get)]
    pub patch_directions: Py<PyArray2<f32>>,
    #[pyo3(get)]
    pub analysis_duration: f32,
    #[pyo3(get)]
    pub metadata: Vec<String>,
}

// ── Array conversions ───────────────────────────────────────────────────────

fn rows3(view: ArrayView2<f32>, what: &'static str) -> PyResult<Vec<[f32; 3]>> {
    if view.ncols() != 3 {
        return Err(PyValueError::new_err(format!(
            "{what} must have shape (n, 3), got (n, {})",
            view.ncols()
        )));
    }
    Ok(view.rows().into_iter().map(|r| [r[0], r[1], r[2]]).collect())
}

fn to_points(view: ArrayView2<f32>, what: &'static str) -> PyResult<Vec<Point3<f32>>> {
    Ok(rows3(view, what)?.into_iter().map(Point3::from).collect())
}

fn to_vectors(view: ArrayView2<f32>, what: &'static str) -> PyResult<Vec<Vector3<f32>>> {
    Ok(rows3(view, what)?.into_iter().map(Vector3::from).collect())
}

fn to_context(
    vertices: Option<PyReadonlyArray2<f32>>,
    faces: Option<PyReadonlyArray2<i64>>,
) -> PyResult<ContextGeometry> {
    let (vertices, faces) = match (vertices, faces) {
        (Some(v), Some(f)) => (v, f),
        (None, None) => return Ok(ContextGeometry::empty()),
        _ => {
            return Err(PyValueError::new_err(
                "context_vertices and context_faces must be provided together",
            ))
        }
    };
    let vertices = to_points(vertices.as_array(), "context_vertices")?;
    let faces = faces
        .as_array()
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|&i| {
                    usize::try_from(i).map_err(|_| {
                        PyValueError::new_err(format!("negative vertex index {i} in context_faces"))
                    })
                })
                .collect::<PyResult<Vec<usize>>>()
        })
        .collect::<PyResult<Vec<_>>>()?;
    let mesh = Mesh3D::new(vertices, faces)?;
    Ok(ContextGeometry::from_meshes(&[mesh]))
}

// ── Functions ───────────────────────────────────────────────────────────────

#[pyfunction]
#[pyo3(signature = (direct_normal, diffuse_horizontal, sun_vectors, params, hours=None, timestep=1, location=None, dry_bulb=None, balance_temperature=None, balance_offset=2.0))]
/// Build a sky matrix from hourly weather arrays.
///
/// `sun_vectors` holds one row per record pointing towards the sun; rows
/// with a non-positive or non-finite z component are treated as night.
/// When `balance_temperature` is given the result holds the benefit
/// difference (heating-season minus cooling-season radiation) and
/// `dry_bulb` is required.
pub fn sky_matrix(
    py: Python,
    direct_normal: PyReadonlyArray1<f32>,
    diffuse_horizontal: PyReadonlyArray1<f32>,
    sun_vectors: PyReadonlyArray2<f32>,
    params: &SkyParams,
    hours: Option<Vec<i64>>,
    timestep: u32,
    location: Option<String>,
    dry_bulb: Option<PyReadonlyArray1<f32>>,
    balance_temperature: Option<f32>,
    balance_offset: f32,
) -> PyResult<Py<SkyMatrixResult>> {
    let suns = to_vectors(sun_vectors.as_array(), "sun_vectors")?
        .into_iter()
        .map(|s| (s.z > 0.0 && s.iter().all(|c| c.is_finite())).then_some(s))
        .collect();
    let mut weather = HourlyWeather::new(
        location.unwrap_or_else(|| "-".to_string()),
        direct_normal.as_array().to_vec(),
        diffuse_horizontal.as_array().to_vec(),
        suns,
    )?
    .with_timestep(timestep)?;
    if let Some(dry_bulb) = dry_bulb {
        weather = weather.with_dry_bulb(dry_bulb.as_array().to_vec())?;
    }
    let hours = hours
        .map(|h| hours_from_signed(&h, weather.hour_count()))
        .transpose()?;
    let config = params.config();

    let sky = py.allow_threads(|| match balance_temperature {
        Some(balance) => SkyMatrix::from_source_benefit(
            &weather,
            balance,
            balance_offset,
            hours.as_deref(),
            config,
        ),
        None => SkyMatrix::from_source(&weather, hours.as_deref(), config),
    })?;

    let (direct, diffuse) = crate::radiation::sky_components(&sky);
    let directions = scene_patch_directions(sky.scheme(), sky.north());
    let flat: Vec<f32> = directions.iter().flat_map(|d| [d.x, d.y, d.z]).collect();
    let patch_directions = ndarray::Array2::from_shape_vec((directions.len(), 3), flat)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Py::new(
        py,
        SkyMatrixResult {
            direct: direct.clone().into_pyarray(py).unbind(),
            diffuse: diffuse.clone().into_pyarray(py).unbind(),
            patch_values: patch_values(&sky, RadiationComponent::Total)
                .into_pyarray(py)
                .unbind(),
            patch_directions: patch_directions.into_pyarray(py).unbind(),
            analysis_duration: sky.analysis_duration(),
            metadata: sky.metadata(),
        },
    )
}

#[pyfunction]
#[pyo3(signature = (points, normals, directions, context_vertices=None, context_faces=None, offset_distance=0.0, numericalize=true))]
/// Visibility of every direction from every study point.
///
/// Returns an (n_points, n_directions) array of cosine weights, or of
/// 0/1 when `numericalize` is false.
pub fn calculate_intersection_matrix(
    py: Python,
    points: PyReadonlyArray2<f32>,
    normals: PyReadonlyArray2<f32>,
    directions: PyReadonlyArray2<f32>,
    context_vertices: Option<PyReadonlyArray2<f32>>,
    context_faces: Option<PyReadonlyArray2<i64>>,
    offset_distance: f32,
    numericalize: bool,
) -> PyResult<Py<PyArray2<f32>>> {
    let points = to_points(points.as_array(), "points")?;
    let normals = to_vectors(normals.as_array(), "normals")?;
    let directions = to_vectors(directions.as_array(), "directions")?;
    let context = to_context(context_vertices, context_faces)?;
    let matrix = py.allow_threads(|| {
        intersection_matrix(
            &points,
            &normals,
            &directions,
            &context,
            offset_distance,
            numericalize,
        )
    })?;
    Ok(matrix.to_weights().into_pyarray(py).unbind())
}

#[pyfunction]
/// Per-point radiation from a weighted intersection matrix and patch values.
pub fn reduce_radiation(
    py: Python,
    matrix: PyReadonlyArray2<f32>,
    values: PyReadonlyArray1<f32>,
) -> PyResult<Py<PyArray1<f32>>> {
    let matrix = IntersectionMatrix::Weighted(matrix.as_array().to_owned());
    let values: Array1<f32> = values.as_array().to_owned();
    let result = py.allow_threads(|| reduce(&matrix, &values))?;
    Ok(result.into_pyarray(py).unbind())
}

#[pyfunction]
#[pyo3(signature = (points, normals, sun_vectors, context_vertices=None, context_faces=None, offset_distance=0.0, timestep=1))]
/// Hours of direct sun at every study point.
pub fn direct_sun_hours(
    py: Python,
    points: PyReadonlyArray2<f32>,
    normals: PyReadonlyArray2<f32>,
    sun_vectors: PyReadonlyArray2<f32>,
    context_vertices: Option<PyReadonlyArray2<f32>>,
    context_faces: Option<PyReadonlyArray2<i64>>,
    offset_distance: f32,
    timestep: u32,
) -> PyResult<Py<PyArray1<f32>>> {
    if timestep == 0 {
        return Err(PyValueError::new_err(
            "timestep must be at least one record per hour",
        ));
    }
    let points = to_points(points.as_array(), "points")?;
    let normals = to_vectors(normals.as_array(), "normals")?;
    let suns = to_vectors(sun_vectors.as_array(), "sun_vectors")?;
    let context = to_context(context_vertices, context_faces)?;
    let matrix = py.allow_threads(|| {
        intersection_matrix(&points, &normals, &suns, &context, offset_distance, false)
    })?;
    let step = timestep as f32;
    let hours = matrix.visible_counts().mapv(|count| count as f32 / step);
    Ok(hours.into_pyarray(py).unbind())
}
