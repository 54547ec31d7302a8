//! Point × direction visibility matrices.
//!
//! Each row is a study point (position plus normal), each column a
//! direction. Rows are cast independently with rayon.

use nalgebra::{Point3, Vector3};
use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::error::{ensure_len, RadianceError, Result};
use crate::geometry::{rotate_xy, Occluder};
use crate::patches::PatchScheme;
use crate::sky_matrix::SkyMatrix;

/// Visibility of every direction from every point.
#[derive(Debug, Clone, PartialEq)]
pub enum IntersectionMatrix {
    /// `true` where the direction is in front of the point and unobstructed.
    Boolean(Array2<bool>),
    /// `cos(normal, direction)` where visible, `0` elsewhere.
    Weighted(Array2<f32>),
}

impl IntersectionMatrix {
    pub fn nrows(&self) -> usize {
        match self {
            Self::Boolean(m) => m.nrows(),
            Self::Weighted(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Self::Boolean(m) => m.ncols(),
            Self::Weighted(m) => m.ncols(),
        }
    }

    pub fn is_visible(&self, row: usize, col: usize) -> bool {
        match self {
            Self::Boolean(m) => m[[row, col]],
            Self::Weighted(m) => m[[row, col]] > 0.0,
        }
    }

    /// Number of visible directions per row.
    pub fn visible_counts(&self) -> Array1<usize> {
        match self {
            Self::Boolean(m) => m
                .rows()
                .into_iter()
                .map(|r| r.iter().filter(|&&v| v).count())
                .collect(),
            Self::Weighted(m) => m
                .rows()
                .into_iter()
                .map(|r| r.iter().filter(|&&v| v > 0.0).count())
                .collect(),
        }
    }

    /// Cell weights as `f32` (booleans become 1 or 0).
    pub fn to_weights(&self) -> Array2<f32> {
        match self {
            Self::Boolean(m) => m.mapv(|v| if v { 1.0 } else { 0.0 }),
            Self::Weighted(m) => m.clone(),
        }
    }
}

/// Cast every point against the sky and ground patch directions of `sky`
/// (`2 × patch_count` columns), oriented by the sky's north.
pub fn sky_intersection_matrix<O: Occluder + ?Sized>(
    sky: &SkyMatrix,
    points: &[Point3<f32>],
    normals: &[Vector3<f32>],
    context: &O,
    offset_distance: f32,
    numericalize: bool,
) -> Result<IntersectionMatrix> {
    let directions = scene_patch_directions(sky.scheme(), sky.north());
    intersection_matrix(points, normals, &directions, context, offset_distance, numericalize)
}

/// Sky and ground patch vectors rotated into a scene whose north is
/// `north` degrees counterclockwise from +Y.
pub fn scene_patch_directions(scheme: &PatchScheme, north: f32) -> Vec<Vector3<f32>> {
    rotate_xy(scheme.sphere_vectors(), north)
}

pub fn intersection_matrix<O: Occluder + ?Sized>(
    points: &[Point3<f32>],
    normals: &[Vector3<f32>],
    directions: &[Vector3<f32>],
    context: &O,
    offset_distance: f32,
    numericalize: bool,
) -> Result<IntersectionMatrix> {
    ensure_len("study normals", points.len(), normals.len())?;
    let rows = points.len();
    let cols = directions.len();
    let directions: Vec<Vector3<f32>> = directions
        .iter()
        .map(|d| d.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros))
        .collect();
    let skip_rays = context.is_empty();
    log::debug!(
        "intersection matrix: {rows} points x {cols} directions{}",
        if skip_rays { " (no context)" } else { "" }
    );

    let cells: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|r| {
            let normal = normals[r].try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
            let origin = points[r] + normal * offset_distance;
            let directions = &directions;
            directions.iter().map(move |dir| {
                let cos = normal.dot(dir);
                if cos <= 0.0 || (!skip_rays && context.occludes(&origin, dir)) {
                    0.0
                } else {
                    cos
                }
            })
        })
        .collect();

    let weights = Array2::from_shape_vec((rows, cols), cells)
        .map_err(|e| RadianceError::Geometry(e.to_string()))?;
    Ok(if numericalize {
        IntersectionMatrix::Weighted(weights)
    } else {
        IntersectionMatrix::Boolean(weights.mapv(|w| w > 0.0))
    })
}
