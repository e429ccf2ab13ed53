//! Rendering pipeline implementation

pub mod clip;
pub mod fragment;
pub mod framebuffer;
pub mod raster;
pub mod shadow;
pub mod vertex;

pub use self::clip::{clip_triangle, is_inside_frustum, is_triangle_outside, ClipPlane, ClipVertex};
pub use self::fragment::{FragmentProcessor, Light, LightKind, Material};
pub use self::framebuffer::{BlendMode, Framebuffer};
pub use self::raster::{Fragment, FragmentProgram, RasterVertex, Rasterizer, ShaderFn, VertexColor};
pub use self::shadow::ShadowMap;
pub use self::vertex::{Uniforms, VertexOutput, VertexProcessor};
