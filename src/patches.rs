//! Sky vault subdivision into Tregenza (145) and Reinhart (577) patches.
//!
//! Patches are laid out in altitude rows from the horizon up to a single
//! zenith cap. Azimuths are measured clockwise from north (+Y) towards east
//! (+X), and patch 0 of every row is centred on north.
//!
//! The tables depend only on the density, so they are built once per
//! process and handed out as `&'static` references.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{ensure_len, Result};

const PI: f32 = std::f32::consts::PI;
const DEG2RAD: f32 = PI / 180.0;
const RAD2DEG: f32 = 180.0 / PI;

// ── Row layouts ─────────────────────────────────────────────────────────────

const TREGENZA_PATCHES_PER_ROW: [usize; 8] = [30, 30, 24, 24, 18, 12, 6, 1];
const REINHART_PATCHES_PER_ROW: [usize; 15] =
    [60, 60, 60, 60, 48, 48, 48, 48, 36, 36, 24, 24, 12, 12, 1];

/// Sky subdivision density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkyDensity {
    /// 145 patches.
    Tregenza,
    /// 577 patches (Reinhart MF:2).
    Reinhart,
}

impl SkyDensity {
    pub fn from_high_density(high_density: bool) -> Self {
        if high_density {
            SkyDensity::Reinhart
        } else {
            SkyDensity::Tregenza
        }
    }

    /// Recover the density from the number of patch values.
    pub fn from_patch_count(count: usize) -> Option<Self> {
        match count {
            145 => Some(SkyDensity::Tregenza),
            577 => Some(SkyDensity::Reinhart),
            _ => None,
        }
    }

    pub fn is_high_density(self) -> bool {
        matches!(self, SkyDensity::Reinhart)
    }

    pub fn patch_count(self) -> usize {
        self.row_counts().iter().sum()
    }

    pub fn row_counts(self) -> &'static [usize] {
        match self {
            SkyDensity::Tregenza => &TREGENZA_PATCHES_PER_ROW,
            SkyDensity::Reinhart => &REINHART_PATCHES_PER_ROW,
        }
    }

    /// Reinhart multiplication factor; Tregenza is MF:1.
    fn multiplication_factor(self) -> usize {
        match self {
            SkyDensity::Tregenza => 1,
            SkyDensity::Reinhart => 2,
        }
    }

    /// Faces per patch edge in the dome display mesh.
    fn mesh_subdivision(self) -> usize {
        match self {
            SkyDensity::Tregenza => 3,
            SkyDensity::Reinhart => 1,
        }
    }
}

/// Direction, row and solid-angle tables for one sky density.
#[derive(Debug)]
pub struct PatchScheme {
    density: SkyDensity,
    row_height: f32,
    row_starts: Vec<usize>,
    rows: Vec<usize>,
    altitudes: Vec<f32>,
    azimuths: Vec<f32>,
    vectors: Vec<Vector3<f32>>,
    sphere_vectors: Vec<Vector3<f32>>,
    solid_angles: Vec<f32>,
    face_patch: Vec<usize>,
}

/// Cached patch scheme for a density.
pub fn patch_scheme(density: SkyDensity) -> &'static PatchScheme {
    static TREGENZA: OnceLock<PatchScheme> = OnceLock::new();
    static REINHART: OnceLock<PatchScheme> = OnceLock::new();

    match density {
        SkyDensity::Tregenza => TREGENZA.get_or_init(|| PatchScheme::build(density)),
        SkyDensity::Reinhart => REINHART.get_or_init(|| PatchScheme::build(density)),
    }
}

/// Unit vector for an altitude/azimuth pair given in degrees.
pub fn direction_from_angles(altitude_deg: f32, azimuth_deg: f32) -> Vector3<f32> {
    let alt = altitude_deg * DEG2RAD;
    let azi = azimuth_deg * DEG2RAD;
    Vector3::new(azi.sin() * alt.cos(), azi.cos() * alt.cos(), alt.sin())
}

/// Azimuth of a direction in degrees, clockwise from north, in `[0, 360)`.
pub fn azimuth_of(direction: &Vector3<f32>) -> f32 {
    (direction.x.atan2(direction.y) * RAD2DEG).rem_euclid(360.0)
}

impl PatchScheme {
    fn build(density: SkyDensity) -> Self {
        let row_counts = density.row_counts();
        let mf = density.multiplication_factor() as f32;
        let row_height = 90.0 / (7.0 * mf + 0.5);
        let cap_row = row_counts.len() - 1;
        let total = density.patch_count();

        let mut row_starts = Vec::with_capacity(row_counts.len());
        let mut rows = Vec::with_capacity(total);
        let mut altitudes = Vec::with_capacity(total);
        let mut azimuths = Vec::with_capacity(total);
        let mut vectors = Vec::with_capacity(total);
        let mut solid_angles = Vec::with_capacity(total);

        for (row, &count) in row_counts.iter().enumerate() {
            row_starts.push(altitudes.len());
            let alt_lo = row as f32 * row_height;
            let (alt_center, solid_angle) = if row == cap_row {
                (90.0, 2.0 * PI * (1.0 - (alt_lo * DEG2RAD).sin()))
            } else {
                let alt_hi = alt_lo + row_height;
                let band = (alt_hi * DEG2RAD).sin() - (alt_lo * DEG2RAD).sin();
                (alt_lo + row_height / 2.0, 2.0 * PI / count as f32 * band)
            };

            let azi_step = 360.0 / count as f32;
            for k in 0..count {
                let azimuth = k as f32 * azi_step;
                rows.push(row);
                altitudes.push(alt_center);
                azimuths.push(azimuth);
                vectors.push(direction_from_angles(alt_center, azimuth));
                solid_angles.push(solid_angle);
            }
        }

        // Ground patches mirror the sky patches below the horizon.
        let sphere_vectors = vectors
            .iter()
            .copied()
            .chain(vectors.iter().map(|v| Vector3::new(v.x, v.y, -v.z)))
            .collect();

        let face_patch = build_face_table(row_counts, &row_starts, density.mesh_subdivision());

        Self {
            density,
            row_height,
            row_starts,
            rows,
            altitudes,
            azimuths,
            vectors,
            sphere_vectors,
            solid_angles,
            face_patch,
        }
    }

    pub fn density(&self) -> SkyDensity {
        self.density
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn row_counts(&self) -> &'static [usize] {
        self.density.row_counts()
    }

    /// Angular height of one altitude row in degrees.
    pub fn row_height(&self) -> f32 {
        self.row_height
    }

    pub fn row_of(&self, patch: usize) -> usize {
        self.rows[patch]
    }

    /// Patch-centre altitudes in degrees.
    pub fn altitudes(&self) -> &[f32] {
        &self.altitudes
    }

    /// Patch-centre azimuths in degrees.
    pub fn azimuths(&self) -> &[f32] {
        &self.azimuths
    }

    /// Unit vectors from the dome centre to each patch centre.
    pub fn vectors(&self) -> &[Vector3<f32>] {
        &self.vectors
    }

    /// Sky patch vectors followed by their ground mirrors (`2 * len()` entries).
    pub fn sphere_vectors(&self) -> &[Vector3<f32>] {
        &self.sphere_vectors
    }

    /// Solid angle of each patch in steradians. Sums to one hemisphere.
    pub fn solid_angles(&self) -> &[f32] {
        &self.solid_angles
    }

    /// Index of the patch containing `direction`, or `None` at or below the horizon.
    pub fn patch_index(&self, direction: &Vector3<f32>) -> Option<usize> {
        let norm = direction.norm();
        if norm <= f32::EPSILON || direction.z <= 0.0 {
            return None;
        }
        let dir = direction / norm;
        let altitude = dir.z.clamp(-1.0, 1.0).asin() * RAD2DEG;

        let row_counts = self.row_counts();
        let cap_row = row_counts.len() - 1;
        let row = ((altitude / self.row_height) as usize).min(cap_row);
        if row == cap_row {
            return Some(self.len() - 1);
        }

        let count = row_counts[row];
        let step = 360.0 / count as f32;
        let col = ((azimuth_of(&dir) + step / 2.0) / step) as usize % count;
        Some(self.row_starts[row] + col)
    }

    // ── Dome display mesh metadata ──────────────────────────────────────────

    /// Faces per patch edge in the display mesh (each ring patch becomes
    /// `mesh_subdivision²` faces).
    pub fn mesh_subdivision(&self) -> usize {
        self.density.mesh_subdivision()
    }

    /// Number of triangular faces that make up the zenith cap.
    pub fn cap_face_count(&self) -> usize {
        let counts = self.row_counts();
        counts[counts.len() - 2] * self.mesh_subdivision()
    }

    /// Number of faces the display mesh must have.
    pub fn face_count(&self) -> usize {
        self.face_patch.len()
    }

    /// Patch index for every display-mesh face.
    pub fn face_patch(&self) -> &[usize] {
        &self.face_patch
    }

    /// Repeat per-patch values so that they align with the display mesh faces.
    pub fn expand_to_faces(&self, values: &[f32]) -> Result<Vec<f32>> {
        ensure_len("patch values", self.len(), values.len())?;
        Ok(self.face_patch.iter().map(|&p| values[p]).collect())
    }
}

/// Face order of the dome display mesh: every ring is split into
/// `subdivision` sub-rings, each patch into `subdivision` columns, and the
/// zenith patch into a triangle fan matching the ring below it.
fn build_face_table(row_counts: &[usize], row_starts: &[usize], subdivision: usize) -> Vec<usize> {
    let cap_row = row_counts.len() - 1;
    let mut faces = Vec::new();
    for row in 0..cap_row {
        let start = row_starts[row];
        for _ in 0..subdivision {
            for patch in start..start + row_counts[row] {
                faces.extend(std::iter::repeat(patch).take(subdivision));
            }
        }
    }
    let cap_faces = row_counts[cap_row - 1] * subdivision;
    faces.extend(std::iter::repeat(row_starts[cap_row]).take(cap_faces));
    faces
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_patch_counts() {
        assert_eq!(patch_scheme(SkyDensity::Tregenza).len(), 145);
        assert_eq!(patch_scheme(SkyDensity::Reinhart).len(), 577);
        assert_eq!(SkyDensity::from_patch_count(577), Some(SkyDensity::Reinhart));
        assert_eq!(SkyDensity::from_patch_count(146), None);
    }

    #[test]
    fn test_solid_angles_cover_hemisphere() {
        for density in [SkyDensity::Tregenza, SkyDensity::Reinhart] {
            let total: f32 = patch_scheme(density).solid_angles().iter().sum();
            assert_relative_eq!(total, 2.0 * PI, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_patch_vectors_bin_to_themselves() {
        for density in [SkyDensity::Tregenza, SkyDensity::Reinhart] {
            let scheme = patch_scheme(density);
            for (i, v) in scheme.vectors().iter().enumerate() {
                assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-5);
                assert_eq!(scheme.patch_index(v), Some(i), "patch {i} of {density:?}");
            }
        }
    }

    #[test]
    fn test_below_horizon_has_no_patch() {
        let scheme = patch_scheme(SkyDensity::Tregenza);
        assert_eq!(scheme.patch_index(&Vector3::new(0.0, 1.0, -0.1)), None);
        assert_eq!(scheme.patch_index(&Vector3::zeros()), None);
    }

    #[test]
    fn test_sphere_vectors_mirror_ground() {
        let scheme = patch_scheme(SkyDensity::Tregenza);
        let sphere = scheme.sphere_vectors();
        assert_eq!(sphere.len(), 290);
        assert_relative_eq!(sphere[145].z, -sphere[0].z);
        assert_relative_eq!(sphere[145].x, sphere[0].x);
    }

    #[test]
    fn test_display_mesh_face_counts() {
        let tregenza = patch_scheme(SkyDensity::Tregenza);
        assert_eq!(tregenza.cap_face_count(), 18);
        assert_eq!(tregenza.face_count(), 144 * 9 + 18);

        let reinhart = patch_scheme(SkyDensity::Reinhart);
        assert_eq!(reinhart.cap_face_count(), 12);
        assert_eq!(reinhart.face_count(), 576 + 12);
    }

    #[test]
    fn test_expand_to_faces() {
        let scheme = patch_scheme(SkyDensity::Tregenza);
        let values: Vec<f32> = (0..145).map(|i| i as f32).collect();
        let faces = scheme.expand_to_faces(&values).unwrap();
        assert_eq!(faces.len(), scheme.face_count());
        // first sub-ring: patch 0 three times, then patch 1
        assert_eq!(&faces[..4], &[0.0, 0.0, 0.0, 1.0]);
        assert!(faces[faces.len() - 18..].iter().all(|&v| v == 144.0));
        assert!(scheme.expand_to_faces(&values[..10]).is_err());
    }
}
