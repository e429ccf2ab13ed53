//! Rasterizer: barycentric triangle fill with depth testing, blending,
//! optional backface culling, a debug wireframe mode, and parallel dispatch
//! across worker threads sharing one framebuffer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::warn;
use parking_lot::Mutex;
use rayon::ThreadPool;

use crate::color::Color;
use crate::interpolate::Interpolate;
use crate::math::{Vec2, Vec3};
use crate::render::framebuffer::{BlendMode, Framebuffer};

/// Triangles with less than this double-area are dropped as degenerate.
pub const DEGENERATE_AREA_EPSILON: f32 = 1e-4;

/// Screen-space vertex fed to the rasterizer: pixel x/y plus depth in
/// [0, 1], carrying the attributes to interpolate per fragment.
#[derive(Debug, Clone)]
pub struct RasterVertex {
    pub position: Vec3,
    pub world_pos: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub color: Color,
}

/// Per-pixel record produced by barycentric interpolation.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub screen_pos: Vec3,
    pub world_pos: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub color: Color,
}

/// The callable the rasterizer invokes per covered pixel.
///
/// Implementations must be `Sync`: in parallel mode every worker shades
/// through the same program.
pub trait FragmentProgram: Sync {
    fn shade(&self, fragment: &Fragment) -> Color;
}

/// Builtin program returning the interpolated vertex color; the behavior
/// when no shader is bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexColor;

impl FragmentProgram for VertexColor {
    #[inline(always)]
    fn shade(&self, fragment: &Fragment) -> Color {
        fragment.color
    }
}

/// Adapter running a plain closure as a fragment program.
pub struct ShaderFn<F>(pub F);

impl<F> FragmentProgram for ShaderFn<F>
where
    F: Fn(&Fragment) -> Color + Sync,
{
    #[inline(always)]
    fn shade(&self, fragment: &Fragment) -> Color {
        (self.0)(fragment)
    }
}

/// Signed double area of the triangle (a, b, c); the 2D cross product
/// `(b - a) x (c - a)`.
#[inline]
pub fn edge_function(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

fn interpolate_fragment(
    bary: Vec3,
    v0: &RasterVertex,
    v1: &RasterVertex,
    v2: &RasterVertex,
    screen_pos: Vec3,
) -> Fragment {
    let (w0, w1, w2) = (bary.x, bary.y, bary.z);

    Fragment {
        screen_pos,
        world_pos: Interpolate::barycentric_interpolate(w0, &v0.world_pos, w1, &v1.world_pos, w2, &v2.world_pos),
        normal: Vec3::barycentric_interpolate(w0, &v0.normal, w1, &v1.normal, w2, &v2.normal).normalize(),
        tex_coord: Interpolate::barycentric_interpolate(w0, &v0.tex_coord, w1, &v1.tex_coord, w2, &v2.tex_coord),
        color: Interpolate::barycentric_interpolate(w0, &v0.color, w1, &v1.color, w2, &v2.color),
    }
}

/// Triangle setup: double area (None = culled or degenerate) and the
/// screen-clamped bounding box.
#[inline]
fn triangle_setup(
    p0: Vec2,
    p1: Vec2,
    p2: Vec2,
    cull: bool,
    width: i32,
    height: i32,
) -> Option<(f32, i32, i32, i32, i32)> {
    let area = edge_function(p0, p1, p2);

    if cull && area < 0.0 {
        return None;
    }

    if area.abs() < DEGENERATE_AREA_EPSILON {
        return None;
    }

    let min_x = (p0.x.min(p1.x).min(p2.x).floor() as i32).max(0);
    let min_y = (p0.y.min(p1.y).min(p2.y).floor() as i32).max(0);
    let max_x = (p0.x.max(p1.x).max(p2.x).ceil() as i32).min(width - 1);
    let max_y = (p0.y.max(p1.y).max(p2.y).ceil() as i32).min(height - 1);

    Some((area, min_x, min_y, max_x, max_y))
}

/// Triangle rasterizer.
///
/// Holds the raster state (wireframe, culling, blending, depth write,
/// worker count); the render target is borrowed per draw call, so the
/// rasterizer can never outlive or dangle its framebuffer.
pub struct Rasterizer {
    wireframe: bool,
    backface_culling: bool,
    blend_mode: BlendMode,
    depth_write: bool,
    num_threads: usize,
    pool: Option<ThreadPool>,
}

impl Default for Rasterizer {
    fn default() -> Rasterizer {
        Rasterizer::new()
    }
}

impl Rasterizer {
    pub fn new() -> Rasterizer {
        Rasterizer {
            wireframe: false,
            backface_culling: true,
            blend_mode: BlendMode::None,
            depth_write: true,
            num_threads: default_thread_count(),
            pool: None,
        }
    }

    pub fn set_wireframe(&mut self, enabled: bool) {
        self.wireframe = enabled;
    }

    pub fn set_backface_culling(&mut self, enabled: bool) {
        self.backface_culling = enabled;
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    /// Set the worker count for the parallel path. Zero selects the
    /// hardware parallelism (falling back to 4 when unknown).
    pub fn set_num_threads(&mut self, threads: usize) {
        let threads = if threads == 0 { default_thread_count() } else { threads };
        if threads != self.num_threads {
            self.num_threads = threads;
            self.pool = None;
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Rasterize a single triangle on the calling thread.
    pub fn draw_triangle<S>(
        &self,
        fb: &mut Framebuffer,
        shader: &S,
        v0: &RasterVertex,
        v1: &RasterVertex,
        v2: &RasterVertex,
    ) where
        S: FragmentProgram,
    {
        let p0 = v0.position.xy();
        let p1 = v1.position.xy();
        let p2 = v2.position.xy();

        // A negative double area means the triangle faces away.
        let area = edge_function(p0, p1, p2);
        if self.backface_culling && area < 0.0 {
            return;
        }
        if area.abs() < DEGENERATE_AREA_EPSILON {
            return;
        }

        if self.wireframe {
            self.draw_line(fb, p0.x as i32, p0.y as i32, p1.x as i32, p1.y as i32, v0.color);
            self.draw_line(fb, p1.x as i32, p1.y as i32, p2.x as i32, p2.y as i32, v1.color);
            self.draw_line(fb, p2.x as i32, p2.y as i32, p0.x as i32, p0.y as i32, v2.color);
            return;
        }

        let (width, height) = (fb.width() as i32, fb.height() as i32);
        let min_x = (p0.x.min(p1.x).min(p2.x).floor() as i32).max(0);
        let min_y = (p0.y.min(p1.y).min(p2.y).floor() as i32).max(0);
        let max_x = (p0.x.max(p1.x).max(p2.x).ceil() as i32).min(width - 1);
        let max_y = (p0.y.max(p1.y).max(p2.y).ceil() as i32).min(height - 1);

        let inv_area = 1.0 / area;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                // Sample at the pixel center.
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);

                let w0 = edge_function(p1, p2, p) * inv_area;
                let w1 = edge_function(p2, p0, p) * inv_area;
                let w2 = edge_function(p0, p1, p) * inv_area;

                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    let depth = w0 * v0.position.z + w1 * v1.position.z + w2 * v2.position.z;

                    // Blended fragments still depth-test, they just may not write.
                    if depth < fb.get_depth(x, y) {
                        let frag = interpolate_fragment(
                            Vec3::new(w0, w1, w2),
                            v0,
                            v1,
                            v2,
                            Vec3::new(x as f32, y as f32, depth),
                        );

                        let color = shader.shade(&frag);

                        match self.blend_mode {
                            BlendMode::None => fb.set_pixel(x, y, color),
                            mode => fb.set_pixel_blended(x, y, color, mode),
                        }

                        if self.depth_write {
                            fb.set_depth(x, y, depth);
                        }
                    }
                }
            }
        }
    }

    /// Rasterize a flat list of triangles (three vertices each) in
    /// submission order on the calling thread. The reference semantics.
    pub fn draw_triangles<S>(&self, fb: &mut Framebuffer, shader: &S, vertices: &[RasterVertex])
    where
        S: FragmentProgram,
    {
        for tri in vertices.chunks_exact(3) {
            self.draw_triangle(fb, shader, &tri[0], &tri[1], &tri[2]);
        }
    }

    /// Rasterize a flat list of triangles across the worker pool.
    ///
    /// Workers claim triangle indices from a shared counter until the list
    /// is exhausted; the commit of each pixel (depth test, blend, write) is
    /// a single critical section, so depth resolution matches the
    /// sequential path for opaque work. Inter-triangle ordering is
    /// unspecified: blended, non-depth-writing geometry must go through
    /// [`Rasterizer::draw_triangles`] instead.
    pub fn draw_triangles_parallel<S>(&mut self, fb: &mut Framebuffer, shader: &S, vertices: &[RasterVertex])
    where
        S: FragmentProgram,
    {
        if vertices.len() < 3 {
            return;
        }

        self.ensure_pool();
        let Some(ref pool) = self.pool else {
            return self.draw_triangles(fb, shader, vertices);
        };

        let num_triangles = vertices.len() / 3;
        let (width, height) = (fb.width() as i32, fb.height() as i32);

        let backface_culling = self.backface_culling;
        let blend_mode = self.blend_mode;
        let depth_write = self.depth_write;

        let next_triangle = AtomicUsize::new(0);
        let target = Mutex::new(fb);

        pool.broadcast(|_| loop {
            let idx = next_triangle.fetch_add(1, Ordering::Relaxed);
            if idx >= num_triangles {
                break;
            }

            let base = idx * 3;
            rasterize_triangle_locked(
                &target,
                (width, height),
                backface_culling,
                blend_mode,
                depth_write,
                shader,
                &vertices[base],
                &vertices[base + 1],
                &vertices[base + 2],
            );
        });
    }

    /// Draw a line with the integer midpoint algorithm, straight into the
    /// color buffer with no depth interaction. Used by wireframe mode.
    pub fn draw_line(&self, fb: &mut Framebuffer, mut x0: i32, mut y0: i32, x1: i32, y1: i32, color: Color) {
        let mut dx = x1 - x0;
        let mut dy = y1 - y0;

        let step_x = if dx >= 0 { 1 } else { -1 };
        let step_y = if dy >= 0 { 1 } else { -1 };

        dx = dx.abs();
        dy = dy.abs();

        fb.set_pixel(x0, y0, color);

        if dx >= dy {
            // x is the driving axis
            let mut d = 2 * dy - dx;
            let incr_e = 2 * dy;
            let incr_ne = 2 * (dy - dx);

            while x0 != x1 {
                if d <= 0 {
                    d += incr_e;
                } else {
                    d += incr_ne;
                    y0 += step_y;
                }
                x0 += step_x;
                fb.set_pixel(x0, y0, color);
            }
        } else {
            // y is the driving axis
            let mut d = 2 * dx - dy;
            let incr_e = 2 * dx;
            let incr_ne = 2 * (dx - dy);

            while y0 != y1 {
                if d <= 0 {
                    d += incr_e;
                } else {
                    d += incr_ne;
                    x0 += step_x;
                }
                y0 += step_y;
                fb.set_pixel(x0, y0, color);
            }
        }
    }

    fn ensure_pool(&mut self) {
        if self.pool.is_none() {
            match rayon::ThreadPoolBuilder::new().num_threads(self.num_threads).build() {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => warn!("failed to build raster worker pool ({}), falling back to sequential", e),
            }
        }
    }
}

/// Hardware parallelism, or 4 when it cannot be determined.
fn default_thread_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Worker-side triangle rasterization. Setup, coverage and shading run
/// lock-free; only the pixel commit takes the framebuffer lock.
#[allow(clippy::too_many_arguments)]
fn rasterize_triangle_locked<S>(
    target: &Mutex<&mut Framebuffer>,
    (width, height): (i32, i32),
    cull: bool,
    blend_mode: BlendMode,
    depth_write: bool,
    shader: &S,
    v0: &RasterVertex,
    v1: &RasterVertex,
    v2: &RasterVertex,
) where
    S: FragmentProgram,
{
    let p0 = v0.position.xy();
    let p1 = v1.position.xy();
    let p2 = v2.position.xy();

    let Some((area, min_x, min_y, max_x, max_y)) = triangle_setup(p0, p1, p2, cull, width, height) else {
        return;
    };

    let inv_area = 1.0 / area;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);

            let w0 = edge_function(p1, p2, p) * inv_area;
            let w1 = edge_function(p2, p0, p) * inv_area;
            let w2 = edge_function(p0, p1, p) * inv_area;

            if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                let depth = w0 * v0.position.z + w1 * v1.position.z + w2 * v2.position.z;

                let frag = interpolate_fragment(
                    Vec3::new(w0, w1, w2),
                    v0,
                    v1,
                    v2,
                    Vec3::new(x as f32, y as f32, depth),
                );
                let color = shader.shade(&frag);

                // Commit: depth read, compare and conditional writes happen
                // as one atomic unit so racing workers cannot interleave.
                let mut fb = target.lock();
                if depth < fb.get_depth(x, y) {
                    match blend_mode {
                        BlendMode::None => fb.set_pixel(x, y, color),
                        mode => fb.set_pixel_blended(x, y, color, mode),
                    }
                    if depth_write {
                        fb.set_depth(x, y, depth);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raster_vertex(x: f32, y: f32, z: f32, color: Color) -> RasterVertex {
        RasterVertex {
            position: Vec3::new(x, y, z),
            world_pos: Vec3::new(x, y, z),
            normal: Vec3::y(),
            tex_coord: Vec2::zeros(),
            color,
        }
    }

    #[test]
    fn single_triangle_coverage_on_2x2() {
        let mut fb = Framebuffer::new(2, 2);
        let mut raster = Rasterizer::new();
        raster.set_backface_culling(false);

        let v0 = raster_vertex(0.5, 0.5, 0.5, Color::RED);
        let v1 = raster_vertex(1.5, 0.5, 0.5, Color::GREEN);
        let v2 = raster_vertex(0.5, 1.5, 0.5, Color::BLUE);

        raster.draw_triangle(&mut fb, &VertexColor, &v0, &v1, &v2);

        // (0, 0) is exactly the first vertex.
        let c = fb.get_pixel(0, 0);
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.g, 0.0);

        // (1, 0) and (0, 1) land on the triangle boundary and get depth 0.5.
        assert_relative_eq!(fb.get_depth(1, 0), 0.5);
        assert_relative_eq!(fb.get_depth(0, 1), 0.5);

        // (1, 1) is outside and stays at the clear values.
        assert_eq!(fb.get_pixel(1, 1), Color::BLACK);
        assert_relative_eq!(fb.get_depth(1, 1), 1.0);
    }

    #[test]
    fn backface_culling_accepts_exactly_one_winding() {
        let v0 = raster_vertex(1.0, 1.0, 0.5, Color::WHITE);
        let v1 = raster_vertex(6.0, 1.0, 0.5, Color::WHITE);
        let v2 = raster_vertex(1.0, 6.0, 0.5, Color::WHITE);

        let raster = Rasterizer::new();

        let mut forward = Framebuffer::new(8, 8);
        raster.draw_triangle(&mut forward, &VertexColor, &v0, &v2, &v1);

        let mut reverse = Framebuffer::new(8, 8);
        raster.draw_triangle(&mut reverse, &VertexColor, &v0, &v1, &v2);

        let forward_hits = forward.color_buffer().iter().filter(|&&c| c != Color::BLACK).count();
        let reverse_hits = reverse.color_buffer().iter().filter(|&&c| c != Color::BLACK).count();

        assert!(forward_hits > 0);
        assert_eq!(reverse_hits, 0);
    }

    #[test]
    fn degenerate_triangle_is_dropped() {
        let mut fb = Framebuffer::new(8, 8);
        let mut raster = Rasterizer::new();
        raster.set_backface_culling(false);

        let v0 = raster_vertex(1.0, 1.0, 0.5, Color::WHITE);
        let v1 = raster_vertex(5.0, 1.0, 0.5, Color::WHITE);
        raster.draw_triangle(&mut fb, &VertexColor, &v0, &v1, &v1);

        assert!(fb.color_buffer().iter().all(|&c| c == Color::BLACK));
    }

    #[test]
    fn depth_ordering_keeps_the_closer_triangle() {
        let mut fb = Framebuffer::new(8, 8);
        let mut raster = Rasterizer::new();
        raster.set_backface_culling(false);

        let far = [
            raster_vertex(0.0, 0.0, 0.7, Color::BLUE),
            raster_vertex(8.0, 0.0, 0.7, Color::BLUE),
            raster_vertex(0.0, 8.0, 0.7, Color::BLUE),
        ];
        let near = [
            raster_vertex(0.0, 0.0, 0.3, Color::RED),
            raster_vertex(8.0, 0.0, 0.3, Color::RED),
            raster_vertex(0.0, 8.0, 0.3, Color::RED),
        ];

        // Blue first, then red in front of it.
        raster.draw_triangle(&mut fb, &VertexColor, &far[0], &far[1], &far[2]);
        raster.draw_triangle(&mut fb, &VertexColor, &near[0], &near[1], &near[2]);
        let c = fb.get_pixel(1, 1);
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.b, 0.0);

        // Same scene with the near triangle drawn first: blue loses the test.
        let mut fb2 = Framebuffer::new(8, 8);
        raster.draw_triangle(&mut fb2, &VertexColor, &near[0], &near[1], &near[2]);
        raster.draw_triangle(&mut fb2, &VertexColor, &far[0], &far[1], &far[2]);
        let c2 = fb2.get_pixel(1, 1);
        assert_relative_eq!(c2.r, 1.0);
        assert_relative_eq!(c2.b, 0.0);
    }

    #[test]
    fn sequential_rendering_is_deterministic() {
        let tris: Vec<RasterVertex> = (0..8)
            .flat_map(|i| {
                let o = i as f32;
                vec![
                    raster_vertex(o, 0.0, 0.5 - o * 0.01, Color::RED),
                    raster_vertex(o + 6.0, 2.0, 0.4, Color::GREEN),
                    raster_vertex(o, 7.0, 0.6, Color::BLUE),
                ]
            })
            .collect();

        let mut raster = Rasterizer::new();
        raster.set_backface_culling(false);

        let mut a = Framebuffer::new(16, 16);
        let mut b = Framebuffer::new(16, 16);
        raster.draw_triangles(&mut a, &VertexColor, &tris);
        raster.draw_triangles(&mut b, &VertexColor, &tris);

        assert!(a
            .color_buffer()
            .iter()
            .zip(b.color_buffer())
            .all(|(x, y)| x.r.to_bits() == y.r.to_bits()
                && x.g.to_bits() == y.g.to_bits()
                && x.b.to_bits() == y.b.to_bits()
                && x.a.to_bits() == y.a.to_bits()));
        assert!(a
            .depth_buffer()
            .iter()
            .zip(b.depth_buffer())
            .all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn parallel_matches_sequential_on_opaque_scenes() {
        // A pile of overlapping opaque triangles at distinct depths.
        let mut tris = Vec::new();
        for i in 0..24 {
            let o = (i % 6) as f32 * 2.0;
            let z = 0.1 + (i as f32) * 0.03;
            let color = Color::new((i as f32) / 24.0, 0.5, 1.0 - (i as f32) / 24.0, 1.0);
            tris.push(raster_vertex(o, 0.0, z, color));
            tris.push(raster_vertex(o + 10.0, 3.0, z, color));
            tris.push(raster_vertex(o, 12.0, z, color));
        }

        let mut raster = Rasterizer::new();
        raster.set_backface_culling(false);
        raster.set_num_threads(4);

        let mut sequential = Framebuffer::new(16, 16);
        raster.draw_triangles(&mut sequential, &VertexColor, &tris);

        let mut parallel = Framebuffer::new(16, 16);
        raster.draw_triangles_parallel(&mut parallel, &VertexColor, &tris);

        for (a, b) in sequential.color_buffer().iter().zip(parallel.color_buffer()) {
            assert_relative_eq!(a.r, b.r);
            assert_relative_eq!(a.g, b.g);
            assert_relative_eq!(a.b, b.b);
        }
        for (a, b) in sequential.depth_buffer().iter().zip(parallel.depth_buffer()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn wireframe_draws_edges_only() {
        let mut fb = Framebuffer::new(16, 16);
        let mut raster = Rasterizer::new();
        raster.set_backface_culling(false);
        raster.set_wireframe(true);

        let v0 = raster_vertex(1.0, 1.0, 0.5, Color::RED);
        let v1 = raster_vertex(13.0, 1.0, 0.5, Color::GREEN);
        let v2 = raster_vertex(1.0, 13.0, 0.5, Color::BLUE);
        raster.draw_triangle(&mut fb, &VertexColor, &v0, &v1, &v2);

        // The top edge carries v0's color.
        assert_eq!(fb.get_pixel(5, 1), Color::RED);
        // The interior stays untouched.
        assert_eq!(fb.get_pixel(4, 4), Color::BLACK);
        // Lines never touch depth.
        assert_relative_eq!(fb.get_depth(5, 1), 1.0);
    }
}
