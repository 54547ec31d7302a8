//! Face-vertex meshes and the ray-occlusion context.
//!
//! [`Mesh3D`] carries study surfaces and context geometry; [`ContextGeometry`]
//! flattens any number of meshes into a triangle soup with one bounding box
//! and answers the occlusion queries made while building intersection
//! matrices.

use nalgebra::{Point3, Rotation3, Vector3};

use crate::error::{RadianceError, Result};

/// Ray hits closer than this to the origin are ignored.
const RAY_EPSILON: f32 = 1e-5;

/// Rotate vectors counterclockwise about +Z by `angle_deg`.
pub fn rotate_xy(vectors: &[Vector3<f32>], angle_deg: f32) -> Vec<Vector3<f32>> {
    if angle_deg == 0.0 {
        return vectors.to_vec();
    }
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), angle_deg.to_radians());
    vectors.iter().map(|v| rotation * v).collect()
}

// ── Mesh ────────────────────────────────────────────────────────────────────

/// Polygon mesh with triangle or quad faces (any convex polygon is accepted).
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh3D {
    vertices: Vec<Point3<f32>>,
    faces: Vec<Vec<usize>>,
}

impl Mesh3D {
    /// Build a mesh, rejecting faces with fewer than three vertices,
    /// out-of-range indices and non-finite coordinates.
    pub fn new(vertices: Vec<Point3<f32>>, faces: Vec<Vec<usize>>) -> Result<Self> {
        if let Some(v) = vertices.iter().find(|v| !v.coords.iter().all(|c| c.is_finite())) {
            return Err(RadianceError::Geometry(format!(
                "vertex ({}, {}, {}) is not finite",
                v.x, v.y, v.z
            )));
        }
        for (i, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(RadianceError::Geometry(format!(
                    "face {i} has {} vertices; at least 3 are required",
                    face.len()
                )));
            }
            if let Some(&bad) = face.iter().find(|&&idx| idx >= vertices.len()) {
                return Err(RadianceError::Geometry(format!(
                    "face {i} references vertex {bad} but the mesh has {}",
                    vertices.len()
                )));
            }
        }
        Ok(Self { vertices, faces })
    }

    /// Flat grid of `x_count × y_count` quads in the XY plane starting at
    /// `base`, with normals pointing up (+Z).
    pub fn from_grid(
        base: Point3<f32>,
        x_count: usize,
        y_count: usize,
        x_dim: f32,
        y_dim: f32,
    ) -> Result<Self> {
        if x_count == 0 || y_count == 0 || x_dim <= 0.0 || y_dim <= 0.0 {
            return Err(RadianceError::Geometry(
                "grid needs at least one cell of positive size".into(),
            ));
        }
        let mut vertices = Vec::with_capacity((x_count + 1) * (y_count + 1));
        for j in 0..=y_count {
            for i in 0..=x_count {
                vertices.push(Point3::new(
                    base.x + i as f32 * x_dim,
                    base.y + j as f32 * y_dim,
                    base.z,
                ));
            }
        }
        let row = x_count + 1;
        let mut faces = Vec::with_capacity(x_count * y_count);
        for j in 0..y_count {
            for i in 0..x_count {
                let a = j * row + i;
                faces.push(vec![a, a + 1, a + 1 + row, a + row]);
            }
        }
        Self::new(vertices, faces)
    }

    /// One quad per polyline segment, swept along `extrusion`.
    pub fn from_extrusion(polyline: &[Point3<f32>], extrusion: Vector3<f32>) -> Result<Self> {
        if polyline.len() < 2 {
            return Err(RadianceError::Geometry(
                "extrusion needs a polyline with at least two points".into(),
            ));
        }
        let n = polyline.len();
        let vertices: Vec<Point3<f32>> = polyline
            .iter()
            .copied()
            .chain(polyline.iter().map(|p| p + extrusion))
            .collect();
        let faces = (0..n - 1).map(|i| vec![i, i + 1, n + i + 1, n + i]).collect();
        Self::new(vertices, faces)
    }

    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Area-weighted Newell vector of a face: its direction is the face
    /// normal and its length twice the face area.
    fn newell(&self, face: &[usize]) -> Vector3<f32> {
        let mut n = Vector3::zeros();
        for (k, &i) in face.iter().enumerate() {
            let a = &self.vertices[i];
            let b = &self.vertices[face[(k + 1) % face.len()]];
            n.x += (a.y - b.y) * (a.z + b.z);
            n.y += (a.z - b.z) * (a.x + b.x);
            n.z += (a.x - b.x) * (a.y + b.y);
        }
        n
    }

    /// Vertex average of every face.
    pub fn face_centers(&self) -> Vec<Point3<f32>> {
        self.faces
            .iter()
            .map(|face| {
                let sum = face
                    .iter()
                    .fold(Vector3::zeros(), |acc, &i| acc + self.vertices[i].coords);
                Point3::from(sum / face.len() as f32)
            })
            .collect()
    }

    /// Unit normal of every face (zero for degenerate faces).
    pub fn face_normals(&self) -> Vec<Vector3<f32>> {
        self.faces
            .iter()
            .map(|face| {
                let n = self.newell(face);
                n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
            })
            .collect()
    }

    pub fn face_areas(&self) -> Vec<f32> {
        self.faces.iter().map(|face| self.newell(face).norm() / 2.0).collect()
    }

    /// Area-weighted average of the adjacent face normals.
    pub fn vertex_normals(&self) -> Vec<Vector3<f32>> {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for face in &self.faces {
            let n = self.newell(face);
            for &i in face {
                normals[i] += n;
            }
        }
        normals
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros))
            .collect()
    }

    /// Each face's area shared equally between its vertices.
    pub fn vertex_areas(&self) -> Vec<f32> {
        let mut areas = vec![0.0; self.vertices.len()];
        for (face, area) in self.faces.iter().zip(self.face_areas()) {
            let share = area / face.len() as f32;
            for &i in face {
                areas[i] += share;
            }
        }
        areas
    }

    // ── Transforms ──────────────────────────────────────────────────────────

    /// Counterclockwise rotation about the vertical axis through `origin`.
    pub fn rotate_xy(&self, angle_deg: f32, origin: Point3<f32>) -> Self {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), angle_deg.to_radians());
        self.map_vertices(|p| origin + rotation * (p - origin))
    }

    pub fn scale(&self, factor: f32, origin: Point3<f32>) -> Self {
        self.map_vertices(|p| origin + (p - origin) * factor)
    }

    pub fn translate(&self, offset: Vector3<f32>) -> Self {
        self.map_vertices(|p| p + offset)
    }

    fn map_vertices(&self, f: impl Fn(&Point3<f32>) -> Point3<f32>) -> Self {
        Self {
            vertices: self.vertices.iter().map(f).collect(),
            faces: self.faces.clone(),
        }
    }

    /// Lower corner of the bounding box (origin for an empty mesh).
    pub fn min(&self) -> Point3<f32> {
        self.vertices
            .iter()
            .copied()
            .reduce(|a, b| a.inf(&b))
            .unwrap_or_else(Point3::origin)
    }

    /// Upper corner of the bounding box (origin for an empty mesh).
    pub fn max(&self) -> Point3<f32> {
        self.vertices
            .iter()
            .copied()
            .reduce(|a, b| a.sup(&b))
            .unwrap_or_else(Point3::origin)
    }
}

// ── Occlusion ───────────────────────────────────────────────────────────────

/// Anything rays can be blocked by.
pub trait Occluder: Sync {
    /// Whether the ray from `origin` along `direction` hits anything.
    fn occludes(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> bool;

    /// An empty occluder never blocks, so callers may skip ray tests.
    fn is_empty(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v0: Point3<f32>,
    edge1: Vector3<f32>,
    edge2: Vector3<f32>,
}

impl Triangle {
    fn new(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Self {
        Self {
            v0: a,
            edge1: b - a,
            edge2: c - a,
        }
    }

    fn is_degenerate(&self) -> bool {
        self.edge1.cross(&self.edge2).norm_squared() <= f32::EPSILON * f32::EPSILON
    }

    /// Möller–Trumbore; two-sided, hits at `t <= RAY_EPSILON` ignored.
    fn hit(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> bool {
        let p = direction.cross(&self.edge2);
        let det = self.edge1.dot(&p);
        if det.abs() < 1e-9 {
            return false;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return false;
        }
        let q = s.cross(&self.edge1);
        let v = direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }
        self.edge2.dot(&q) * inv_det > RAY_EPSILON
    }
}

/// Triangulated context geometry blocking rays.
#[derive(Debug, Clone)]
pub struct ContextGeometry {
    triangles: Vec<Triangle>,
    lower: Point3<f32>,
    upper: Point3<f32>,
}

impl Default for ContextGeometry {
    fn default() -> Self {
        Self {
            triangles: Vec::new(),
            lower: Point3::origin(),
            upper: Point3::origin(),
        }
    }
}

impl ContextGeometry {
    /// No obstructions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fan-triangulate every face of every mesh. Zero-area triangles are dropped.
    pub fn from_meshes(meshes: &[Mesh3D]) -> Self {
        let mut triangles = Vec::new();
        let mut dropped = 0usize;
        for mesh in meshes {
            let verts = mesh.vertices();
            for face in mesh.faces() {
                for k in 1..face.len() - 1 {
                    let tri = Triangle::new(verts[face[0]], verts[face[k]], verts[face[k + 1]]);
                    if tri.is_degenerate() {
                        dropped += 1;
                    } else {
                        triangles.push(tri);
                    }
                }
            }
        }
        if dropped > 0 {
            log::debug!("context geometry: dropped {dropped} degenerate triangles");
        }

        let (lower, upper) = meshes
            .iter()
            .filter(|m| m.vertex_count() > 0)
            .map(|m| (m.min(), m.max()))
            .reduce(|(lo_a, hi_a), (lo_b, hi_b)| (lo_a.inf(&lo_b), hi_a.sup(&hi_b)))
            .unwrap_or((Point3::origin(), Point3::origin()));

        log::debug!("context geometry: {} triangles", triangles.len());
        Self {
            triangles,
            lower,
            upper,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Slab test against the overall bounding box.
    fn ray_hits_bounds(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> bool {
        let mut t_min = 0.0_f32;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let (lo, hi) = (self.lower[axis] - RAY_EPSILON, self.upper[axis] + RAY_EPSILON);
            if d.abs() < 1e-12 {
                if o < lo || o > hi {
                    return false;
                }
                continue;
            }
            let (t0, t1) = ((lo - o) / d, (hi - o) / d);
            t_min = t_min.max(t0.min(t1));
            t_max = t_max.min(t0.max(t1));
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

impl Occluder for ContextGeometry {
    fn occludes(&self, origin: &Point3<f32>, direction: &Vector3<f32>) -> bool {
        if self.triangles.is_empty() || !self.ray_hits_bounds(origin, direction) {
            return false;
        }
        self.triangles.iter().any(|tri| tri.hit(origin, direction))
    }

    fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wall() -> Mesh3D {
        Mesh3D::from_extrusion(
            &[Point3::new(-2.0, -2.0, 0.0), Point3::new(2.0, -2.0, 0.0)],
            Vector3::new(0.0, 0.0, 2.0),
        )
        .unwrap()
    }

    #[test]
    fn test_grid_faces_and_normals() {
        let grid = Mesh3D::from_grid(Point3::new(-1.0, -1.0, 0.0), 2, 2, 1.0, 1.0).unwrap();
        assert_eq!(grid.face_count(), 4);
        assert_eq!(grid.vertex_count(), 9);
        for n in grid.face_normals() {
            assert_relative_eq!(n, Vector3::z(), epsilon = 1e-6);
        }
        assert_relative_eq!(grid.face_areas().iter().sum::<f32>(), 4.0, epsilon = 1e-5);
        assert_relative_eq!(grid.vertex_areas().iter().sum::<f32>(), 4.0, epsilon = 1e-5);
        assert_relative_eq!(grid.face_centers()[0], Point3::new(-0.5, -0.5, 0.0));
        assert_eq!(grid.min(), Point3::new(-1.0, -1.0, 0.0));
        assert_eq!(grid.max(), Point3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_extrusion() {
        let mesh = wall();
        assert_eq!(mesh.face_count(), 1);
        assert_relative_eq!(mesh.face_areas()[0], 8.0, epsilon = 1e-5);
        assert_relative_eq!(mesh.face_normals()[0].y.abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_faces_rejected() {
        let verts = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        assert!(matches!(
            Mesh3D::new(verts.clone(), vec![vec![0, 1]]),
            Err(RadianceError::Geometry(_))
        ));
        assert!(Mesh3D::new(verts.clone(), vec![vec![0, 1, 5]]).is_err());
        assert!(Mesh3D::new(verts, vec![vec![0, 1, 2]]).is_ok());
        assert!(Mesh3D::from_grid(Point3::origin(), 0, 2, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_transforms() {
        let grid = Mesh3D::from_grid(Point3::origin(), 1, 1, 1.0, 1.0).unwrap();
        let rotated = grid.rotate_xy(90.0, Point3::origin());
        assert_relative_eq!(rotated.vertices()[1], Point3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        let moved = grid.translate(Vector3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(moved.min().z, 3.0);
        let scaled = grid.scale(2.0, Point3::origin());
        assert_relative_eq!(scaled.face_areas()[0], 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotate_vectors() {
        let out = rotate_xy(&[Vector3::new(0.0, 1.0, 0.0)], 90.0);
        assert_relative_eq!(out[0], Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_context_occlusion() {
        let context = ContextGeometry::from_meshes(&[wall()]);
        assert_eq!(context.triangle_count(), 2);
        let origin = Point3::new(0.0, 0.0, 0.0);
        // towards the wall, low enough to hit it
        assert!(context.occludes(&origin, &Vector3::new(0.0, -1.0, 0.2).normalize()));
        // over the top
        assert!(!context.occludes(&origin, &Vector3::new(0.0, -1.0, 2.0).normalize()));
        // away from it
        assert!(!context.occludes(&origin, &Vector3::new(0.0, 1.0, 0.2).normalize()));
    }

    #[test]
    fn test_empty_context() {
        let context = ContextGeometry::empty();
        assert!(context.is_empty());
        assert!(!context.occludes(&Point3::origin(), &Vector3::z()));
    }

    #[test]
    fn test_degenerate_triangles_dropped() {
        let verts = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        let mesh = Mesh3D::new(verts, vec![vec![0, 1, 2]]).unwrap();
        assert!(ContextGeometry::from_meshes(&[mesh]).is_empty());
    }
}
