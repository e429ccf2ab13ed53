//! Vertex stage: matrix composition and per-vertex transformation into
//! clip, NDC, screen and world space.

use crate::camera::Camera;
use crate::color::Color;
use crate::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::mesh::VertexInput;
use crate::render::clip::ClipVertex;

/// Matrix state shared by every vertex of a draw call.
///
/// `mvp` and `normal_matrix` are derived and kept in sync by the processor
/// whenever a primary matrix changes.
#[derive(Debug, Clone)]
pub struct Uniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub mvp: Mat4,
    pub normal_matrix: Mat3,
}

impl Default for Uniforms {
    fn default() -> Uniforms {
        Uniforms {
            model: Mat4::identity(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            mvp: Mat4::identity(),
            normal_matrix: Mat3::identity(),
        }
    }
}

/// Everything the vertex stage produces for one input vertex.
#[derive(Debug, Clone)]
pub struct VertexOutput {
    /// Position in clip space, before the perspective divide
    pub clip_pos: Vec4,
    /// Position in normalized device coordinates
    pub ndc_pos: Vec3,
    /// Position in screen space: pixel x/y plus depth in [0, 1]
    pub screen_pos: Vec3,
    /// Position in world space, for lighting
    pub world_pos: Vec3,
    /// Normal in world space
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub color: Color,
}

impl VertexOutput {
    /// The subset of this output the clipper operates on.
    #[inline]
    pub fn into_clip(self) -> ClipVertex {
        ClipVertex {
            clip_pos: self.clip_pos,
            world_pos: self.world_pos,
            normal: self.normal,
            tex_coord: self.tex_coord,
            color: self.color,
        }
    }
}

/// The fixed-function vertex transform.
pub struct VertexProcessor {
    uniforms: Uniforms,
    viewport_width: usize,
    viewport_height: usize,
}

impl Default for VertexProcessor {
    fn default() -> VertexProcessor {
        VertexProcessor::new()
    }
}

impl VertexProcessor {
    pub fn new() -> VertexProcessor {
        VertexProcessor {
            uniforms: Uniforms::default(),
            viewport_width: 800,
            viewport_height: 600,
        }
    }

    pub fn set_model_matrix(&mut self, model: Mat4) {
        self.uniforms.model = model;
        self.update_matrices();
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.uniforms.view = view;
        self.update_matrices();
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.uniforms.projection = projection;
        self.update_matrices();
    }

    /// Apply a camera's view and projection in one step.
    pub fn set_camera(&mut self, camera: &Camera) {
        self.uniforms.view = camera.view_matrix();
        self.uniforms.projection = camera.projection_matrix();
        self.update_matrices();
    }

    /// Set the screen dimensions used by the NDC-to-screen transform.
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    fn update_matrices(&mut self) {
        self.uniforms.mvp = self.uniforms.projection * self.uniforms.view * self.uniforms.model;

        // Normal matrix: transpose of the inverse of the model's upper 3x3.
        // A singular model matrix (zero scale) degrades to the identity.
        let model3: Mat3 = self.uniforms.model.fixed_view::<3, 3>(0, 0).into_owned();
        self.uniforms.normal_matrix = model3
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or_else(Mat3::identity);
    }

    /// NDC x, y in [-1, 1] and z in [-1, 1] to screen-space pixels with a
    /// top-left origin (y flipped) and depth in [0, 1].
    fn ndc_to_screen(&self, ndc: Vec3) -> Vec3 {
        Vec3::new(
            (ndc.x + 1.0) * 0.5 * self.viewport_width as f32,
            (1.0 - ndc.y) * 0.5 * self.viewport_height as f32,
            (ndc.z + 1.0) * 0.5,
        )
    }

    /// Run the fixed transform for a single vertex.
    pub fn process_vertex(&self, input: &VertexInput) -> VertexOutput {
        let position = Vec4::new(input.position.x, input.position.y, input.position.z, 1.0);

        let clip_pos = self.uniforms.mvp * position;

        // Degenerate w passes raw xyz through; the clipper rejects it later.
        let ndc_pos = if clip_pos.w != 0.0 {
            clip_pos.xyz() / clip_pos.w
        } else {
            clip_pos.xyz()
        };

        let screen_pos = self.ndc_to_screen(ndc_pos);

        let world_pos = (self.uniforms.model * position).xyz();
        let normal = (self.uniforms.normal_matrix * input.normal).normalize();

        VertexOutput {
            clip_pos,
            ndc_pos,
            screen_pos,
            world_pos,
            normal,
            tex_coord: input.tex_coord,
            color: input.color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math;
    use approx::assert_relative_eq;

    fn vertex(position: Vec3) -> VertexInput {
        VertexInput {
            position,
            normal: Vec3::y(),
            tex_coord: Vec2::zeros(),
            color: Color::WHITE,
        }
    }

    #[test]
    fn identity_transform_maps_ndc_to_screen() {
        let mut vp = VertexProcessor::new();
        vp.set_viewport(200, 100);

        let out = vp.process_vertex(&vertex(Vec3::new(0.0, 0.0, 0.0)));
        assert_relative_eq!(out.screen_pos.x, 100.0);
        assert_relative_eq!(out.screen_pos.y, 50.0);
        assert_relative_eq!(out.screen_pos.z, 0.5);

        // +y in NDC is up, which is towards row zero of the image.
        let top = vp.process_vertex(&vertex(Vec3::new(0.0, 1.0, 0.0)));
        assert_relative_eq!(top.screen_pos.y, 0.0);
    }

    #[test]
    fn model_matrix_moves_world_position() {
        let mut vp = VertexProcessor::new();
        vp.set_model_matrix(math::translate(Vec3::new(3.0, 0.0, -1.0)));

        let out = vp.process_vertex(&vertex(Vec3::new(1.0, 2.0, 3.0)));
        assert_relative_eq!(out.world_pos, Vec3::new(4.0, 2.0, 2.0));
    }

    #[test]
    fn normal_matrix_undoes_nonuniform_scale() {
        let mut vp = VertexProcessor::new();
        vp.set_model_matrix(math::scale(Vec3::new(2.0, 1.0, 1.0)));

        // A normal of a surface slanted across x/y must be counter-scaled,
        // not scaled: for this model matrix the x component shrinks.
        let n = Vec3::new(1.0, 1.0, 0.0).normalize();
        let out = vp.process_vertex(&VertexInput {
            position: Vec3::zeros(),
            normal: n,
            tex_coord: Vec2::zeros(),
            color: Color::WHITE,
        });
        assert_relative_eq!(out.normal.norm(), 1.0, epsilon = 1e-6);
        assert!(out.normal.x < out.normal.y);
    }

    #[test]
    fn zero_w_passes_raw_coordinates() {
        // A projection that zeroes w: the fourth row of the matrix is zero.
        let mut vp = VertexProcessor::new();
        let mut proj = Mat4::identity();
        proj[(3, 3)] = 0.0;
        vp.set_projection_matrix(proj);

        let out = vp.process_vertex(&vertex(Vec3::new(0.25, -0.5, 0.75)));
        assert_relative_eq!(out.clip_pos.w, 0.0);
        assert_relative_eq!(out.ndc_pos, Vec3::new(0.25, -0.5, 0.75));
    }
}
