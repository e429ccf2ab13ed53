//! Frame orchestration: shadow pass, opaque sub-pass, then blended
//! transparent sub-pass over a scene.

use std::cmp::Ordering;

use log::debug;

use crate::camera::Camera;
use crate::math::{Mat4, Vec3, Vec4};
use crate::render::clip;
use crate::render::fragment::{FragmentProcessor, LightKind};
use crate::render::framebuffer::{BlendMode, Framebuffer};
use crate::render::raster::{RasterVertex, Rasterizer};
use crate::render::shadow::ShadowMap;
use crate::render::vertex::VertexProcessor;
use crate::scene::{Assets, Scene, SceneObject};
use crate::texture::Texture;

/// Drives a scene through the pipeline.
///
/// Owns the vertex processor, rasterizer and shadow map; borrows the
/// framebuffer, scene, assets and camera per frame.
pub struct Renderer {
    vertex: VertexProcessor,
    rasterizer: Rasterizer,
    shadow_map: ShadowMap,
    shadows_enabled: bool,
    shadow_center: Vec3,
    shadow_radius: f32,
    parallel: bool,
}

impl Default for Renderer {
    fn default() -> Renderer {
        Renderer::new()
    }
}

impl Renderer {
    pub fn new() -> Renderer {
        Renderer {
            vertex: VertexProcessor::new(),
            rasterizer: Rasterizer::new(),
            shadow_map: ShadowMap::new(1024, 1024),
            shadows_enabled: false,
            shadow_center: Vec3::zeros(),
            shadow_radius: 20.0,
            parallel: true,
        }
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn rasterizer_mut(&mut self) -> &mut Rasterizer {
        &mut self.rasterizer
    }

    pub fn shadow_map(&self) -> &ShadowMap {
        &self.shadow_map
    }

    pub fn shadow_map_mut(&mut self) -> &mut ShadowMap {
        &mut self.shadow_map
    }

    pub fn enable_shadows(&mut self, enable: bool) {
        self.shadows_enabled = enable;
    }

    /// Bounding sphere the shadow map's orthographic frustum must cover.
    pub fn set_shadow_bounds(&mut self, center: Vec3, radius: f32) {
        self.shadow_center = center;
        self.shadow_radius = radius;
    }

    /// Toggle parallel dispatch for the opaque sub-pass. Transparent work
    /// is always sequential.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    /// Paint a screen-aligned texture (a sky, say) across the whole color
    /// buffer, before any geometry.
    pub fn draw_backdrop(&self, fb: &mut Framebuffer, texture: &Texture) {
        let (width, height) = (fb.width(), fb.height());
        for y in 0..height {
            let v = y as f32 / height as f32;
            for x in 0..width {
                let u = x as f32 / width as f32;
                fb.set_pixel(x as i32, y as i32, texture.sample(u, v));
            }
        }
    }

    /// Render a frame: shadow pass from the first directional light (when
    /// shadows are enabled), opaque objects front of queue, then
    /// transparent objects blended back-to-front.
    pub fn render(&mut self, scene: &Scene, assets: &Assets, camera: &Camera, fb: &mut Framebuffer) {
        self.vertex.set_viewport(fb.width(), fb.height());
        self.vertex.set_camera(camera);

        if self.shadows_enabled {
            if let Some(sun) = scene.lights().iter().find(|l| l.kind == LightKind::Directional) {
                debug!(
                    "shadow pass: {}x{} map, radius {}",
                    self.shadow_map.width(),
                    self.shadow_map.height(),
                    self.shadow_radius
                );
                self.shadow_map
                    .setup_directional_light(sun.direction, self.shadow_center, self.shadow_radius);
                self.shadow_map.clear();
                self.shadow_map.render_depth(scene, assets);
            }
        }

        let Renderer {
            ref mut vertex,
            ref mut rasterizer,
            ref shadow_map,
            shadows_enabled,
            parallel,
            ..
        } = *self;

        let mut frag = FragmentProcessor::new();
        frag.set_camera_position(camera.position());
        frag.set_ambient_light(scene.ambient_light());
        for light in scene.lights() {
            frag.add_light(*light);
        }
        if shadows_enabled {
            frag.set_shadow_map(Some(shadow_map));
            frag.enable_shadows(true);
        }

        // Opaque sub-pass: depth write on, blending off.
        rasterizer.set_blend_mode(BlendMode::None);
        rasterizer.set_depth_write(true);

        let opaque_count = scene.objects().iter().filter(|o| o.visible && !o.transparent).count();
        debug!("opaque pass: {} objects", opaque_count);

        for obj in scene.objects() {
            if !obj.visible || obj.transparent {
                continue;
            }
            draw_object(vertex, rasterizer, &mut frag, assets, obj, fb, parallel);
        }

        // Transparent sub-pass: alpha blending, depth write off. Blending
        // is order dependent, so objects are sorted back-to-front and
        // dispatched sequentially.
        rasterizer.set_blend_mode(BlendMode::Alpha);
        rasterizer.set_depth_write(false);

        let view = camera.view_matrix();
        let mut transparent: Vec<&SceneObject> = scene
            .objects()
            .iter()
            .filter(|o| o.visible && o.transparent)
            .collect();
        transparent.sort_by(|a, b| {
            let za = view_depth(&view, a.transform.position);
            let zb = view_depth(&view, b.transform.position);
            za.partial_cmp(&zb).unwrap_or(Ordering::Equal)
        });

        debug!("transparent pass: {} objects", transparent.len());
        for obj in transparent {
            draw_object(vertex, rasterizer, &mut frag, assets, obj, fb, false);
        }

        rasterizer.set_blend_mode(BlendMode::None);
        rasterizer.set_depth_write(true);
    }
}

/// View-space z of a world position. The camera looks down -z, so more
/// negative means farther away; ascending order is back-to-front.
fn view_depth(view: &Mat4, position: Vec3) -> f32 {
    (view * Vec4::new(position.x, position.y, position.z, 1.0)).z
}

fn draw_object<'a>(
    vertex: &mut VertexProcessor,
    rasterizer: &mut Rasterizer,
    frag: &mut FragmentProcessor<'a>,
    assets: &'a Assets,
    obj: &SceneObject,
    fb: &mut Framebuffer,
    parallel: bool,
) {
    let Some(mesh) = obj.mesh.and_then(|key| assets.mesh(key)) else {
        return;
    };

    vertex.set_model_matrix(obj.transform.matrix());
    frag.set_material(&obj.material, assets);

    let viewport = fb.viewport();
    let mut triangles: Vec<RasterVertex> = Vec::with_capacity(mesh.indices.len());

    for tri in mesh.indices.chunks_exact(3) {
        let cv0 = vertex.process_vertex(&mesh.vertices[tri[0] as usize]).into_clip();
        let cv1 = vertex.process_vertex(&mesh.vertices[tri[1] as usize]).into_clip();
        let cv2 = vertex.process_vertex(&mesh.vertices[tri[2] as usize]).into_clip();

        if clip::is_triangle_outside(&cv0, &cv1, &cv2) {
            continue;
        }

        for v in clip::clip_triangle(&cv0, &cv1, &cv2).iter() {
            triangles.push(v.normalize(viewport));
        }
    }

    if parallel {
        rasterizer.draw_triangles_parallel(fb, &*frag, &triangles);
    } else {
        rasterizer.draw_triangles(fb, &*frag, &triangles);
    }
}
