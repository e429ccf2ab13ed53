//! Mesh data: input vertices, indexed triangle lists, OBJ loading and
//! normal generation helpers.

use std::path::Path;

use log::info;

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::math::{Vec2, Vec3};

/// Immutable input to the vertex stage.
#[derive(Debug, Clone)]
pub struct VertexInput {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub color: Color,
}

impl Default for VertexInput {
    fn default() -> VertexInput {
        VertexInput {
            position: Vec3::zeros(),
            normal: Vec3::zeros(),
            tex_coord: Vec2::zeros(),
            color: Color::WHITE,
        }
    }
}

/// An indexed triangle list. Indices are grouped in threes with no
/// primitive restart; positions are in object space.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<VertexInput>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// A quad of half-extent `size` facing `normal`, with unit UVs and
    /// white vertex colors.
    pub fn quad(size: f32, normal: Vec3) -> Mesh {
        let (tangent, bitangent) = face_basis(normal);

        let corners = [
            (-tangent - bitangent, Vec2::new(0.0, 0.0)),
            (tangent - bitangent, Vec2::new(1.0, 0.0)),
            (tangent + bitangent, Vec2::new(1.0, 1.0)),
            (-tangent + bitangent, Vec2::new(0.0, 1.0)),
        ];

        Mesh {
            name: "quad".to_string(),
            vertices: corners
                .iter()
                .map(|&(offset, uv)| VertexInput {
                    position: offset * size,
                    normal,
                    tex_coord: uv,
                    color: Color::WHITE,
                })
                .collect(),
            indices: vec![0, 2, 1, 0, 3, 2],
        }
    }

    /// An axis-aligned cube with edge length `size` centered at the origin,
    /// four vertices per face so each face shades flat.
    pub fn cube(size: f32) -> Mesh {
        let half = size * 0.5;
        let face_normals = [
            Vec3::y(),
            -Vec3::y(),
            Vec3::x(),
            -Vec3::x(),
            Vec3::z(),
            -Vec3::z(),
        ];

        let mut mesh = Mesh {
            name: "cube".to_string(),
            vertices: Vec::with_capacity(24),
            indices: Vec::with_capacity(36),
        };

        for normal in face_normals {
            let (tangent, bitangent) = face_basis(normal);
            let base = mesh.vertices.len() as u32;

            let corners = [
                (-tangent - bitangent, Vec2::new(0.0, 0.0)),
                (tangent - bitangent, Vec2::new(1.0, 0.0)),
                (tangent + bitangent, Vec2::new(1.0, 1.0)),
                (-tangent + bitangent, Vec2::new(0.0, 1.0)),
            ];

            for &(offset, uv) in &corners {
                mesh.vertices.push(VertexInput {
                    position: (offset + normal) * half,
                    normal,
                    tex_coord: uv,
                    color: Color::WHITE,
                });
            }

            mesh.indices
                .extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
        }

        mesh
    }

    /// Replace shared vertices with per-triangle copies carrying the face
    /// normal, for flat shading.
    pub fn compute_flat_normals(&mut self) {
        let mut vertices = Vec::with_capacity(self.indices.len());
        let mut indices = Vec::with_capacity(self.indices.len());

        for tri in self.indices.chunks_exact(3) {
            let mut v0 = self.vertices[tri[0] as usize].clone();
            let mut v1 = self.vertices[tri[1] as usize].clone();
            let mut v2 = self.vertices[tri[2] as usize].clone();

            let normal = (v1.position - v0.position)
                .cross(&(v2.position - v0.position))
                .normalize();

            v0.normal = normal;
            v1.normal = normal;
            v2.normal = normal;

            let base = vertices.len() as u32;
            vertices.push(v0);
            vertices.push(v1);
            vertices.push(v2);
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }

        self.vertices = vertices;
        self.indices = indices;
    }

    /// Average area-weighted face normals into each shared vertex, for
    /// smooth shading. Vertices touching no valid face fall back to +y.
    pub fn compute_smooth_normals(&mut self) {
        for vertex in &mut self.vertices {
            vertex.normal = Vec3::zeros();
        }

        for tri in self.indices.chunks_exact(3) {
            let p0 = self.vertices[tri[0] as usize].position;
            let p1 = self.vertices[tri[1] as usize].position;
            let p2 = self.vertices[tri[2] as usize].position;

            // The cross product's magnitude already weights by face area.
            let normal = (p1 - p0).cross(&(p2 - p0));

            for &i in tri {
                self.vertices[i as usize].normal += normal;
            }
        }

        for vertex in &mut self.vertices {
            if vertex.normal.norm() > 1e-4 {
                vertex.normal = vertex.normal.normalize();
            } else {
                vertex.normal = Vec3::y();
            }
        }
    }
}

fn face_basis(normal: Vec3) -> (Vec3, Vec3) {
    if normal.y.abs() > 0.9 {
        let bitangent = Vec3::new(0.0, 0.0, if normal.y > 0.0 { 1.0 } else { -1.0 });
        (Vec3::x(), bitangent)
    } else {
        let tangent = Vec3::y().cross(&normal).normalize();
        let bitangent = normal.cross(&tangent);
        (tangent, bitangent)
    }
}

/// One or more meshes loaded from a single file.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
}

impl Model {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    /// Load a model from an OBJ file, triangulating faces and merging
    /// position/uv/normal indices. Missing normals come back zeroed, to be
    /// filled by [`Mesh::compute_smooth_normals`] or
    /// [`Mesh::compute_flat_normals`]; missing UVs are (0, 0).
    pub fn load_obj<P: AsRef<Path>>(path: P) -> RenderResult<Model> {
        let path = path.as_ref();

        let (models, _materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
            .map_err(|e| RenderError::ObjLoad(format!("{}: {}", path.display(), e)))?;

        let meshes: Vec<Mesh> = models
            .into_iter()
            .map(|model| {
                let m = model.mesh;
                let vertex_count = m.positions.len() / 3;

                let mut vertices = Vec::with_capacity(vertex_count);
                for i in 0..vertex_count {
                    let normal = if m.normals.len() >= (i + 1) * 3 {
                        Vec3::new(m.normals[i * 3], m.normals[i * 3 + 1], m.normals[i * 3 + 2])
                    } else {
                        Vec3::zeros()
                    };
                    let tex_coord = if m.texcoords.len() >= (i + 1) * 2 {
                        Vec2::new(m.texcoords[i * 2], m.texcoords[i * 2 + 1])
                    } else {
                        Vec2::zeros()
                    };

                    vertices.push(VertexInput {
                        position: Vec3::new(
                            m.positions[i * 3],
                            m.positions[i * 3 + 1],
                            m.positions[i * 3 + 2],
                        ),
                        normal,
                        tex_coord,
                        color: Color::WHITE,
                    });
                }

                Mesh {
                    name: model.name,
                    vertices,
                    indices: m.indices,
                }
            })
            .collect();

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let model = Model { name, meshes };
        info!(
            "loaded model {}: {} meshes, {} triangles",
            model.name,
            model.meshes.len(),
            model.triangle_count()
        );

        Ok(model)
    }
}
