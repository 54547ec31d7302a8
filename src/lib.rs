//! Sky-patch radiation engine.
//!
//! Weather records are accumulated into a [`SkyMatrix`] of per-patch
//! direct and diffuse radiation, intersected with study geometry and
//! context occluders, and reduced to per-face radiation, irradiance and
//! direct-sun hours. The `visualize` adapters turn the same values into
//! sky domes, radiation roses and radiation domes.

pub mod clear_sky;
pub mod error;
pub mod geometry;
pub mod graphic;
pub mod intersection;
pub mod patches;
pub mod perez;
pub mod radiation;
pub mod sky_matrix;
pub mod study;
pub mod visualize;
pub mod weather;

#[cfg(feature = "python")]
mod python;

pub use clear_sky::ClearSkyWeather;
pub use error::{RadianceError, Result};
pub use geometry::{ContextGeometry, Mesh3D, Occluder};
pub use intersection::{intersection_matrix, sky_intersection_matrix, IntersectionMatrix};
pub use patches::{patch_scheme, PatchScheme, SkyDensity};
pub use radiation::{irradiance, radiation, reduce, RadiationComponent};
pub use sky_matrix::{SkyMatrix, SkyMatrixConfig, SkyModel};
pub use study::{DirectSunStudy, RadiationStudy, StudyConfig};
pub use weather::{HourlyWeather, WeatherSource};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn sky_radiance(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    register_skymatrix_module(py_module)?;
    register_intersection_module(py_module)?;
    register_study_module(py_module)?;

    py_module.add("__doc__", "Sky-patch radiation studies implemented in Rust.")?;

    Ok(())
}

#[cfg(feature = "python")]
fn register_skymatrix_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "skymatrix")?;
    submodule.add("__doc__", "Cumulative sky matrices from hourly weather.")?;
    submodule.add_class::<python::SkyParams>()?;
    submodule.add_class::<python::SkyMatrixResult>()?;
    submodule.add_function(wrap_pyfunction!(python::sky_matrix, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_intersection_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "intersection")?;
    submodule.add("__doc__", "Point-to-direction visibility against context geometry.")?;
    submodule.add_function(wrap_pyfunction!(
        python::calculate_intersection_matrix,
        &submodule
    )?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_study_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "study")?;
    submodule.add("__doc__", "Incident radiation and direct sun hours.")?;
    submodule.add_function(wrap_pyfunction!(python::reduce_radiation, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(python::direct_sun_hours, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}
