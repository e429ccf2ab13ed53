//! softpipe: a CPU software rasterizer.
//!
//! A self-contained triangle pipeline: vertex transform, Sutherland-Hodgman
//! frustum clipping, barycentric rasterization with depth testing and
//! blending, per-pixel Blinn-Phong shading, and PCF-filtered shadow
//! mapping. No GPU, no window system; frames land in a [`Framebuffer`] and
//! can be written out as PPM or TGA.
//!
//! The stages compose freely, but the usual entry point is
//! [`renderer::Renderer`], which drives a [`scene::Scene`] through the
//! shadow, opaque and transparent passes.

pub mod camera;
pub mod color;
pub mod error;
pub mod interpolate;
pub mod math;
pub mod mesh;
pub mod output;
pub mod render;
pub mod renderer;
pub mod scene;
pub mod texture;

pub use self::camera::Camera;
pub use self::color::Color;
pub use self::error::{RenderError, RenderResult};
pub use self::mesh::{Mesh, Model, VertexInput};
pub use self::render::{
    BlendMode, ClipVertex, Fragment, FragmentProcessor, FragmentProgram, Framebuffer, Light,
    LightKind, Material, RasterVertex, Rasterizer, ShaderFn, ShadowMap, VertexColor,
    VertexProcessor,
};
pub use self::renderer::Renderer;
pub use self::scene::{Assets, MeshKey, Scene, SceneObject, TextureKey, Transform};
pub use self::texture::{FilterMode, Texture, WrapMode};
