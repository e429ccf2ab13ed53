//! Clipping implementation
//!
//! Sutherland-Hodgman polygon clipping of triangles against the six
//! clip-space half-spaces, with attribute interpolation at every edge
//! crossing. Output polygons come back fan-triangulated.

use smallvec::SmallVec;

use crate::color::Color;
use crate::interpolate::Interpolate;
use crate::math::{Vec2, Vec3, Vec4};
use crate::render::raster::RasterVertex;

/// The six frustum planes expressed in clip space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipPlane {
    /// x >= -w
    Left,
    /// x <= w
    Right,
    /// y >= -w
    Bottom,
    /// y <= w
    Top,
    /// z >= -w
    Near,
    /// z <= w
    Far,
}

/// Clipping order. Near goes first so no later stage sees a non-positive w.
pub const CLIP_PLANE_ORDER: [ClipPlane; 6] = [
    ClipPlane::Near,
    ClipPlane::Far,
    ClipPlane::Left,
    ClipPlane::Right,
    ClipPlane::Bottom,
    ClipPlane::Top,
];

impl ClipPlane {
    /// Signed distance of a clip-space point to the plane; non-negative
    /// means inside.
    #[inline]
    pub fn signed_distance(self, p: &Vec4) -> f32 {
        match self {
            ClipPlane::Left => p.x + p.w,
            ClipPlane::Right => p.w - p.x,
            ClipPlane::Bottom => p.y + p.w,
            ClipPlane::Top => p.w - p.y,
            ClipPlane::Near => p.z + p.w,
            ClipPlane::Far => p.w - p.z,
        }
    }

    /// Check if the clipping plane has the given clip-space point inside of it
    #[inline]
    pub fn has_inside(self, p: &Vec4) -> bool {
        self.signed_distance(p) >= 0.0
    }

    /// Find the intersection of an edge and the clipping plane
    #[inline]
    pub fn intersect(self, v0: &ClipVertex, v1: &ClipVertex) -> ClipVertex {
        let d0 = self.signed_distance(&v0.clip_pos);
        let d1 = self.signed_distance(&v1.clip_pos);

        let t = d0 / (d0 - d1);

        Interpolate::linear_interpolate(t, v0, v1)
    }
}

/// The polygon-vertex type clipping operates on: a clip-space position plus
/// the attributes that must survive to rasterization.
#[derive(Debug, Clone)]
pub struct ClipVertex {
    pub clip_pos: Vec4,
    pub world_pos: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub color: Color,
}

impl Interpolate for ClipVertex {
    fn barycentric_interpolate(u: f32, x1: &Self, v: f32, x2: &Self, w: f32, x3: &Self) -> Self {
        ClipVertex {
            clip_pos: Interpolate::barycentric_interpolate(u, &x1.clip_pos, v, &x2.clip_pos, w, &x3.clip_pos),
            world_pos: Interpolate::barycentric_interpolate(u, &x1.world_pos, v, &x2.world_pos, w, &x3.world_pos),
            normal: Vec3::barycentric_interpolate(u, &x1.normal, v, &x2.normal, w, &x3.normal).normalize(),
            tex_coord: Interpolate::barycentric_interpolate(u, &x1.tex_coord, v, &x2.tex_coord, w, &x3.tex_coord),
            color: Interpolate::barycentric_interpolate(u, &x1.color, v, &x2.color, w, &x3.color),
        }
    }

    fn linear_interpolate(t: f32, x1: &Self, x2: &Self) -> Self {
        ClipVertex {
            clip_pos: Interpolate::linear_interpolate(t, &x1.clip_pos, &x2.clip_pos),
            world_pos: Interpolate::linear_interpolate(t, &x1.world_pos, &x2.world_pos),
            normal: Vec3::linear_interpolate(t, &x1.normal, &x2.normal).normalize(),
            tex_coord: Interpolate::linear_interpolate(t, &x1.tex_coord, &x2.tex_coord),
            color: Interpolate::linear_interpolate(t, &x1.color, &x2.color),
        }
    }
}

impl ClipVertex {
    /// Normalizes the clip-space vertex to screen space using the given
    /// viewport: perspective divide, then the y-flipped viewport transform
    /// with depth remapped to [0, 1].
    ///
    /// A degenerate w passes the raw coordinates through; such vertices only
    /// reach this point when the caller skipped clipping.
    pub fn normalize(&self, viewport: (f32, f32)) -> RasterVertex {
        let (width, height) = viewport;

        let ndc = if self.clip_pos.w != 0.0 {
            self.clip_pos.xyz() / self.clip_pos.w
        } else {
            self.clip_pos.xyz()
        };

        RasterVertex {
            position: Vec3::new(
                (ndc.x + 1.0) * 0.5 * width,
                (1.0 - ndc.y) * 0.5 * height,
                (ndc.z + 1.0) * 0.5,
            ),
            world_pos: self.world_pos,
            normal: self.normal,
            tex_coord: self.tex_coord,
            color: self.color,
        }
    }
}

/// Buffer type for clipper output; sized so the common lightly-clipped case
/// stays on the stack.
pub type ClippedTriangles = SmallVec<[ClipVertex; 12]>;

type Polygon = SmallVec<[ClipVertex; 9]>;

fn clip_polygon_against_plane(polygon: &Polygon, plane: ClipPlane) -> Polygon {
    let mut result = Polygon::new();

    for i in 0..polygon.len() {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % polygon.len()];

        let current_inside = plane.has_inside(&current.clip_pos);
        let next_inside = plane.has_inside(&next.clip_pos);

        if current_inside {
            if next_inside {
                result.push(next.clone());
            } else {
                result.push(plane.intersect(current, next));
            }
        } else if next_inside {
            result.push(plane.intersect(current, next));
            result.push(next.clone());
        }
    }

    result
}

/// Clip a triangle against all six frustum planes.
///
/// The returned vertices are laid out as a triangle fan already expanded
/// into triangles: the length is a multiple of three, and zero when the
/// triangle is completely outside the frustum.
pub fn clip_triangle(v0: &ClipVertex, v1: &ClipVertex, v2: &ClipVertex) -> ClippedTriangles {
    let mut polygon = Polygon::new();
    polygon.push(v0.clone());
    polygon.push(v1.clone());
    polygon.push(v2.clone());

    for plane in CLIP_PLANE_ORDER {
        polygon = clip_polygon_against_plane(&polygon, plane);

        if polygon.len() < 3 {
            return ClippedTriangles::new();
        }
    }

    let mut result = ClippedTriangles::new();
    for i in 1..polygon.len() - 1 {
        result.push(polygon[0].clone());
        result.push(polygon[i].clone());
        result.push(polygon[i + 1].clone());
    }

    result
}

/// Check if a clip-space point lies inside the view frustum.
pub fn is_inside_frustum(p: &Vec4) -> bool {
    p.x >= -p.w && p.x <= p.w && p.y >= -p.w && p.y <= p.w && p.z >= -p.w && p.z <= p.w
}

/// Trivial rejection: all three vertices outside the same half-space.
pub fn is_triangle_outside(v0: &ClipVertex, v1: &ClipVertex, v2: &ClipVertex) -> bool {
    CLIP_PLANE_ORDER.iter().any(|&plane| {
        !plane.has_inside(&v0.clip_pos)
            && !plane.has_inside(&v1.clip_pos)
            && !plane.has_inside(&v2.clip_pos)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn clip_vertex(clip_pos: Vec4) -> ClipVertex {
        ClipVertex {
            clip_pos,
            world_pos: clip_pos.xyz(),
            normal: Vec3::y(),
            tex_coord: Vec2::new(clip_pos.x, clip_pos.y),
            color: Color::WHITE,
        }
    }

    #[test]
    fn fully_inside_triangle_is_unchanged() {
        let v0 = clip_vertex(Vec4::new(-0.5, -0.5, 0.0, 1.0));
        let v1 = clip_vertex(Vec4::new(0.5, -0.5, 0.0, 1.0));
        let v2 = clip_vertex(Vec4::new(0.0, 0.5, 0.0, 1.0));

        let out = clip_triangle(&v0, &v1, &v2);
        assert_eq!(out.len(), 3);
        assert_relative_eq!(out[0].clip_pos, v0.clip_pos);
        assert_relative_eq!(out[1].clip_pos, v1.clip_pos);
        assert_relative_eq!(out[2].clip_pos, v2.clip_pos);
    }

    #[test]
    fn near_clip_splits_into_two_triangles() {
        // Vertex w components (1, 1, -0.5); the third vertex sits behind the
        // near plane, so the near pass yields a quad and the fan two triangles.
        let v0 = clip_vertex(Vec4::new(0.0, 0.0, 0.0, 1.0));
        let v1 = clip_vertex(Vec4::new(0.2, 0.0, 0.0, 1.0));
        let v2 = clip_vertex(Vec4::new(0.0, 0.2, -0.9, -0.5));

        let out = clip_triangle(&v0, &v1, &v2);
        assert_eq!(out.len(), 6);

        for v in &out {
            assert!(ClipPlane::Near.signed_distance(&v.clip_pos) >= -1e-5);
        }
    }

    #[test]
    fn fully_outside_triangle_is_rejected() {
        // x > w for every vertex.
        let v0 = clip_vertex(Vec4::new(2.0, 0.0, 0.0, 1.0));
        let v1 = clip_vertex(Vec4::new(3.0, 0.0, 0.0, 1.0));
        let v2 = clip_vertex(Vec4::new(2.5, 1.0, 0.0, 1.0));

        assert!(is_triangle_outside(&v0, &v1, &v2));
        assert_eq!(clip_triangle(&v0, &v1, &v2).len(), 0);
    }

    #[test]
    fn clipped_output_respects_every_plane() {
        // A large triangle poking out of several planes at once.
        let v0 = clip_vertex(Vec4::new(-3.0, -2.0, 0.0, 1.0));
        let v1 = clip_vertex(Vec4::new(3.0, -2.0, 0.0, 1.0));
        let v2 = clip_vertex(Vec4::new(0.0, 3.0, 0.0, 1.0));

        let out = clip_triangle(&v0, &v1, &v2);
        assert!(!out.is_empty());
        assert_eq!(out.len() % 3, 0);

        for v in &out {
            for plane in CLIP_PLANE_ORDER {
                assert!(
                    plane.signed_distance(&v.clip_pos) >= -1e-4,
                    "vertex {:?} violates {:?}",
                    v.clip_pos,
                    plane
                );
            }
        }
    }

    #[test]
    fn intersection_attributes_are_linear_in_t() {
        let a = ClipVertex {
            clip_pos: Vec4::new(0.0, 0.0, 0.5, 1.0),
            world_pos: Vec3::new(1.0, 0.0, 0.0),
            normal: Vec3::x(),
            tex_coord: Vec2::new(0.0, 0.0),
            color: Color::RED,
        };
        let b = ClipVertex {
            clip_pos: Vec4::new(0.0, 0.0, 0.5, -1.0),
            world_pos: Vec3::new(0.0, 1.0, 0.0),
            normal: Vec3::y(),
            tex_coord: Vec2::new(1.0, 1.0),
            color: Color::BLUE,
        };

        // Near-plane distances: d0 = 1.5, d1 = -0.5, so t = 0.75.
        let t = 0.75;
        let v = ClipPlane::Near.intersect(&a, &b);

        assert_relative_eq!(
            v.clip_pos,
            Vec4::linear_interpolate(t, &a.clip_pos, &b.clip_pos),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            v.world_pos,
            Vec3::linear_interpolate(t, &a.world_pos, &b.world_pos),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            v.tex_coord,
            Vec2::linear_interpolate(t, &a.tex_coord, &b.tex_coord),
            epsilon = 1e-6
        );
        let c = Color::linear_interpolate(t, &a.color, &b.color);
        assert_relative_eq!(v.color.r, c.r, epsilon = 1e-6);
        assert_relative_eq!(v.color.b, c.b, epsilon = 1e-6);

        let n = Vec3::linear_interpolate(t, &a.normal, &b.normal).normalize();
        assert_relative_eq!(v.normal, n, epsilon = 1e-6);
        assert_relative_eq!(v.normal.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn perspective_divide_and_viewport_transform() {
        let v = clip_vertex(Vec4::new(0.0, 0.0, 0.0, 2.0));
        let rv = v.normalize((100.0, 50.0));
        assert_relative_eq!(rv.position.x, 50.0);
        assert_relative_eq!(rv.position.y, 25.0);
        assert_relative_eq!(rv.position.z, 0.5);
    }
}
