//! Shadow mapping: a depth-only render from a directional light's view,
//! and the percentage-closer-filtered sampling the fragment stage uses.

use crate::math::{Mat4, Vec2, Vec3, Vec4};
use crate::mesh::VertexInput;
use crate::render::clip::{self, ClipVertex};
use crate::render::raster::edge_function;
use crate::scene::{Assets, Scene};

/// Depth texture rendered from the light plus the matrices that map world
/// space into it.
///
/// Stored depths are in [0, 1] after the light-space NDC remap, smaller is
/// closer, cleared to 1.0. A scalar bias is added to the stored depth at
/// sample time to fight self-shadowing.
pub struct ShadowMap {
    width: usize,
    height: usize,
    depth: Vec<f32>,
    light_view: Mat4,
    light_projection: Mat4,
    light_space: Mat4,
    bias: f32,
}

impl ShadowMap {
    pub fn new(width: usize, height: usize) -> ShadowMap {
        ShadowMap {
            width,
            height,
            depth: vec![1.0; width * height],
            light_view: Mat4::identity(),
            light_projection: Mat4::identity(),
            light_space: Mat4::identity(),
            bias: 0.005,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub fn light_space_matrix(&self) -> Mat4 {
        self.light_space
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.depth = vec![1.0; width * height];
    }

    /// Reset every depth value to the far plane.
    pub fn clear(&mut self) {
        self.depth.fill(1.0);
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }

    #[inline]
    pub fn set_depth(&mut self, x: i32, y: i32, depth: f32) {
        if let Some(i) = self.index(x, y) {
            self.depth[i] = depth;
        }
    }

    /// Out-of-bounds reads return the far value.
    #[inline]
    pub fn get_depth(&self, x: i32, y: i32) -> f32 {
        match self.index(x, y) {
            Some(i) => self.depth[i],
            None => 1.0,
        }
    }

    /// Test-and-store: keep the closer depth, report whether it won.
    #[inline]
    pub fn depth_test(&mut self, x: i32, y: i32, new_depth: f32) -> bool {
        if let Some(i) = self.index(x, y) {
            if new_depth < self.depth[i] {
                self.depth[i] = new_depth;
                return true;
            }
        }
        false
    }

    /// Build the light matrices for a directional light covering a bounding
    /// sphere of the scene: an eye pulled back two radii along the light
    /// direction, looking at the center, with an orthographic projection
    /// one and a half radii wide.
    pub fn setup_directional_light(&mut self, direction: Vec3, scene_center: Vec3, scene_radius: f32) {
        let light_dir = direction.normalize();
        let light_pos = scene_center - light_dir * scene_radius * 2.0;

        // A vertical light is parallel to the usual up vector; use z instead.
        let up = if light_dir.y.abs() > 0.999 { Vec3::z() } else { Vec3::y() };

        self.light_view = crate::math::look_at(light_pos, scene_center, up);

        let ortho_size = scene_radius * 1.5;
        self.light_projection = crate::math::ortho(
            -ortho_size,
            ortho_size,
            -ortho_size,
            ortho_size,
            0.1,
            scene_radius * 4.0,
        );

        self.light_space = self.light_projection * self.light_view;
    }

    /// Map a world position into shadow-map UV plus depth, all in [0, 1]
    /// when the point is inside the light frustum.
    pub fn world_to_shadow_uv(&self, world_pos: Vec3) -> Vec3 {
        let clip = self.light_space * Vec4::new(world_pos.x, world_pos.y, world_pos.z, 1.0);

        // The projection is orthographic so w stays 1, but divide anyway.
        let ndc = if clip.w != 0.0 { clip.xyz() / clip.w } else { clip.xyz() };

        ndc * 0.5 + Vec3::new(0.5, 0.5, 0.5)
    }

    /// Single-tap shadow test.
    pub fn is_in_shadow(&self, world_pos: Vec3) -> bool {
        let uv = self.world_to_shadow_uv(world_pos);

        if uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
            return false;
        }

        let x = (uv.x * (self.width - 1) as f32) as i32;
        let y = ((1.0 - uv.y) * (self.height - 1) as f32) as i32;

        uv.z > self.get_depth(x, y) + self.bias
    }

    /// Percentage-closer filtering: average the shadow test over a
    /// `kernel_size` x `kernel_size` texel neighborhood. Returns the shadow
    /// factor in [0, 1]; points outside the light frustum are unshadowed.
    pub fn sample_pcf(&self, world_pos: Vec3, kernel_size: i32) -> f32 {
        let uv = self.world_to_shadow_uv(world_pos);

        if uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
            return 0.0;
        }

        let current_depth = uv.z;
        let center_x = (uv.x * (self.width - 1) as f32) as i32;
        let center_y = ((1.0 - uv.y) * (self.height - 1) as f32) as i32;

        let half_kernel = kernel_size / 2;
        let mut shadowed = 0u32;
        let mut samples = 0u32;

        for dy in -half_kernel..=half_kernel {
            for dx in -half_kernel..=half_kernel {
                let sx = center_x + dx;
                let sy = center_y + dy;

                if let Some(i) = self.index(sx, sy) {
                    if current_depth > self.depth[i] + self.bias {
                        shadowed += 1;
                    }
                    samples += 1;
                }
            }
        }

        if samples > 0 {
            shadowed as f32 / samples as f32
        } else {
            0.0
        }
    }

    /// Depth-only pass: rasterize every visible object of the scene from
    /// the light's view into this map. A stripped variant of the color
    /// rasterizer with no shading, color or blending.
    pub fn render_depth(&mut self, scene: &Scene, assets: &Assets) {
        let viewport = (self.width as f32, self.height as f32);

        for obj in scene.objects() {
            if !obj.visible {
                continue;
            }
            let Some(mesh) = obj.mesh.and_then(|key| assets.mesh(key)) else {
                continue;
            };

            let mvp = self.light_space * obj.transform.matrix();

            for tri in mesh.indices.chunks_exact(3) {
                let cv0 = light_clip_vertex(&mvp, &mesh.vertices[tri[0] as usize]);
                let cv1 = light_clip_vertex(&mvp, &mesh.vertices[tri[1] as usize]);
                let cv2 = light_clip_vertex(&mvp, &mesh.vertices[tri[2] as usize]);

                if clip::is_triangle_outside(&cv0, &cv1, &cv2) {
                    continue;
                }

                let clipped = clip::clip_triangle(&cv0, &cv1, &cv2);
                for fan in clipped.chunks_exact(3) {
                    let p0 = fan[0].normalize(viewport).position;
                    let p1 = fan[1].normalize(viewport).position;
                    let p2 = fan[2].normalize(viewport).position;

                    self.rasterize_depth(p0, p1, p2);
                }
            }
        }
    }

    fn rasterize_depth(&mut self, p0: Vec3, p1: Vec3, p2: Vec3) {
        let a = p0.xy();
        let b = p1.xy();
        let c = p2.xy();

        let area = edge_function(a, b, c);
        if area.abs() < 1e-3 {
            return;
        }
        let inv_area = 1.0 / area;

        let min_x = (a.x.min(b.x).min(c.x).floor() as i32).max(0);
        let min_y = (a.y.min(b.y).min(c.y).floor() as i32).max(0);
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i32).min(self.width as i32 - 1);
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i32).min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);

                let w0 = edge_function(b, c, p) * inv_area;
                let w1 = edge_function(c, a, p) * inv_area;
                let w2 = edge_function(a, b, p) * inv_area;

                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    let depth = w0 * p0.z + w1 * p1.z + w2 * p2.z;
                    self.depth_test(x, y, depth);
                }
            }
        }
    }
}

fn light_clip_vertex(mvp: &Mat4, v: &VertexInput) -> ClipVertex {
    ClipVertex {
        clip_pos: mvp * Vec4::new(v.position.x, v.position.y, v.position.z, 1.0),
        world_pos: Vec3::zeros(),
        normal: Vec3::y(),
        tex_coord: Vec2::zeros(),
        color: crate::color::Color::WHITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use approx::assert_relative_eq;

    #[test]
    fn depth_test_keeps_minimum() {
        let mut map = ShadowMap::new(4, 4);
        assert!(map.depth_test(2, 2, 0.6));
        assert!(map.depth_test(2, 2, 0.2));
        assert!(!map.depth_test(2, 2, 0.4));
        assert_relative_eq!(map.get_depth(2, 2), 0.2);
    }

    #[test]
    fn out_of_bounds_depth_reads_are_far() {
        let map = ShadowMap::new(4, 4);
        assert_relative_eq!(map.get_depth(-1, 0), 1.0);
        assert_relative_eq!(map.get_depth(0, 7), 1.0);
    }

    #[test]
    fn world_to_shadow_uv_centers_the_target() {
        let mut map = ShadowMap::new(64, 64);
        map.setup_directional_light(Vec3::new(0.0, -1.0, 0.0), Vec3::zeros(), 5.0);

        let uv = map.world_to_shadow_uv(Vec3::zeros());
        assert_relative_eq!(uv.x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(uv.y, 0.5, epsilon = 1e-5);
        assert!(uv.z > 0.0 && uv.z < 1.0);
    }

    #[test]
    fn cube_shadows_the_ground_below_it() {
        let mut assets = Assets::new();
        let ground = assets.insert_mesh(Mesh::quad(10.0, Vec3::y()));
        let cube = assets.insert_mesh(Mesh::cube(1.0));

        let mut scene = Scene::new();
        scene.add_object("ground").mesh = Some(ground);
        let obj = scene.add_object("cube");
        obj.mesh = Some(cube);
        obj.transform.position = Vec3::new(0.0, 1.0, 0.0);

        let mut map = ShadowMap::new(256, 256);
        map.setup_directional_light(Vec3::new(0.0, -1.0, 0.0), Vec3::zeros(), 10.0);
        map.render_depth(&scene, &assets);

        // Directly under the cube: fully shadowed.
        let under = map.sample_pcf(Vec3::new(0.0, 0.0, 0.0), 3);
        assert!(under > 0.9, "expected full shadow under the cube, got {}", under);

        // Far to the side: lit.
        let lit = map.sample_pcf(Vec3::new(4.0, 0.0, 0.0), 3);
        assert_relative_eq!(lit, 0.0);
    }
}
