//! Fragment stage: per-pixel Blinn-Phong shading with directional, point
//! and spot lights, textured albedo/specular, and shadow-map sampling.

use num_traits::clamp;

use crate::color::Color;
use crate::math::Vec3;
use crate::render::raster::{Fragment, FragmentProgram};
use crate::render::shadow::ShadowMap;
use crate::scene::{Assets, TextureKey};
use crate::texture::Texture;

/// Light source variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Sun-like, parallel rays
    Directional,
    /// Radiates in all directions, attenuated by distance
    Point,
    /// Cone of light with a soft edge between the two cutoff angles
    Spot,
}

/// A single light source.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub kind: LightKind,
    /// Used by point and spot lights
    pub position: Vec3,
    /// Used by directional and spot lights
    pub direction: Vec3,
    pub color: Color,
    pub intensity: f32,
    pub constant_atten: f32,
    pub linear_atten: f32,
    pub quadratic_atten: f32,
    /// Cosine of the inner cone half-angle
    pub inner_cutoff: f32,
    /// Cosine of the outer cone half-angle
    pub outer_cutoff: f32,
}

impl Default for Light {
    fn default() -> Light {
        Light {
            kind: LightKind::Directional,
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Color::WHITE,
            intensity: 1.0,
            constant_atten: 1.0,
            linear_atten: 0.09,
            quadratic_atten: 0.032,
            inner_cutoff: 0.9763, // cos(12.5 degrees)
            outer_cutoff: 0.9659, // cos(15 degrees)
        }
    }
}

impl Light {
    pub fn directional(direction: Vec3, color: Color, intensity: f32) -> Light {
        Light {
            kind: LightKind::Directional,
            direction,
            color,
            intensity,
            ..Light::default()
        }
    }

    pub fn point(position: Vec3, color: Color, intensity: f32) -> Light {
        Light {
            kind: LightKind::Point,
            position,
            color,
            intensity,
            ..Light::default()
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, color: Color, intensity: f32) -> Light {
        Light {
            kind: LightKind::Spot,
            position,
            direction,
            color,
            intensity,
            ..Light::default()
        }
    }
}

/// Surface reflectance description.
///
/// The texture fields are registry keys, not owned pixels; they resolve
/// through [`Assets`] when the material is bound for shading. The alpha of
/// `diffuse` is the final fragment alpha.
#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub shininess: f32,
    pub diffuse_map: Option<TextureKey>,
    pub specular_map: Option<TextureKey>,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            ambient: Color::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Color::new(0.8, 0.8, 0.8, 1.0),
            specular: Color::WHITE,
            shininess: 32.0,
            diffuse_map: None,
            specular_map: None,
        }
    }
}

/// Per-pixel Blinn-Phong shading state.
///
/// Holds the lights, the currently bound material (with its textures
/// resolved), the ambient term, the camera position for the view vector,
/// and an optional borrowed shadow map. With shadows enabled but no map
/// bound, shading behaves as if shadows were disabled.
pub struct FragmentProcessor<'a> {
    lights: Vec<Light>,
    material: Material,
    diffuse_map: Option<&'a Texture>,
    specular_map: Option<&'a Texture>,
    ambient_light: Color,
    camera_position: Vec3,
    shadow_map: Option<&'a ShadowMap>,
    shadows_enabled: bool,
}

impl<'a> Default for FragmentProcessor<'a> {
    fn default() -> FragmentProcessor<'a> {
        FragmentProcessor::new()
    }
}

impl<'a> FragmentProcessor<'a> {
    pub fn new() -> FragmentProcessor<'a> {
        FragmentProcessor {
            lights: Vec::new(),
            material: Material::default(),
            diffuse_map: None,
            specular_map: None,
            ambient_light: Color::new(0.1, 0.1, 0.1, 1.0),
            camera_position: Vec3::zeros(),
            shadow_map: None,
            shadows_enabled: false,
        }
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }

    pub fn set_ambient_light(&mut self, color: Color) {
        self.ambient_light = color;
    }

    /// Bind a material, resolving its texture keys through the registry.
    /// Stale keys resolve to no texture.
    pub fn set_material(&mut self, material: &Material, assets: &'a Assets) {
        self.material = *material;
        self.diffuse_map = material.diffuse_map.and_then(|key| assets.texture(key));
        self.specular_map = material.specular_map.and_then(|key| assets.texture(key));
    }

    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera_position = position;
    }

    pub fn set_shadow_map(&mut self, map: Option<&'a ShadowMap>) {
        self.shadow_map = map;
    }

    pub fn enable_shadows(&mut self, enable: bool) {
        self.shadows_enabled = enable;
    }

    /// Shade one fragment.
    pub fn process_fragment(&self, fragment: &Fragment) -> Color {
        self.shade_phong(fragment)
    }

    /// Unlit shading: the interpolated vertex color.
    pub fn shade_flat(&self, fragment: &Fragment) -> Color {
        fragment.color
    }

    /// Per-pixel Blinn-Phong lighting.
    pub fn shade_phong(&self, fragment: &Fragment) -> Color {
        let normal = fragment.normal.normalize();

        // Base color: diffuse texture modulated by the vertex color when
        // bound, vertex color times material diffuse otherwise.
        let base_color = match self.diffuse_map {
            Some(tex) => tex.sample(fragment.tex_coord.x, fragment.tex_coord.y) * fragment.color,
            None => fragment.color * self.material.diffuse,
        };

        let spec_color = match self.specular_map {
            Some(tex) => tex.sample(fragment.tex_coord.x, fragment.tex_coord.y),
            None => self.material.specular,
        };

        // 0 = fully lit, 1 = fully shadowed.
        let shadow = match self.shadow_map {
            Some(map) if self.shadows_enabled => map.sample_pcf(fragment.world_pos, 3),
            _ => 0.0,
        };

        let view_dir = (self.camera_position - fragment.world_pos).normalize();

        // Ambient is never shadowed.
        let mut result = self.ambient_light * self.material.ambient * base_color;

        for light in &self.lights {
            result += self.light_contrib(light, fragment.world_pos, normal, view_dir, spec_color, shadow)
                * base_color;
        }

        let mut result = result.clamped();
        // Preserve the material's transparency.
        result.a = self.material.diffuse.a;
        result
    }

    fn light_contrib(
        &self,
        light: &Light,
        world_pos: Vec3,
        normal: Vec3,
        view_dir: Vec3,
        spec_color: Color,
        shadow: f32,
    ) -> Color {
        let (light_dir, attenuation) = match light.kind {
            LightKind::Directional => ((-light.direction).normalize(), 1.0),
            LightKind::Point => {
                let to_light = light.position - world_pos;
                let distance = to_light.norm();
                (to_light / distance, distance_attenuation(light, distance))
            }
            LightKind::Spot => {
                let to_light = light.position - world_pos;
                let distance = to_light.norm();
                let light_dir = to_light / distance;

                let theta = light_dir.dot(&(-light.direction).normalize());
                // Clamped denominator: inner == outer degrades to a hard cone.
                let epsilon = (light.inner_cutoff - light.outer_cutoff).max(1e-5);
                let cone = clamp((theta - light.outer_cutoff) / epsilon, 0.0, 1.0);

                (light_dir, distance_attenuation(light, distance) * cone)
            }
        };

        // Lambertian diffuse
        let n_dot_l = normal.dot(&light_dir).max(0.0);
        let diffuse = self.material.diffuse * n_dot_l;

        // Blinn specular via the halfway vector
        let halfway = (light_dir + view_dir).normalize();
        let n_dot_h = normal.dot(&halfway).max(0.0);
        let specular = spec_color * n_dot_h.powf(self.material.shininess);

        // Shadow scales diffuse and specular, never ambient.
        (diffuse + specular) * light.color * (light.intensity * attenuation * (1.0 - shadow))
    }
}

#[inline]
fn distance_attenuation(light: &Light, distance: f32) -> f32 {
    1.0 / (light.constant_atten + light.linear_atten * distance + light.quadratic_atten * distance * distance)
}

impl FragmentProgram for FragmentProcessor<'_> {
    #[inline]
    fn shade(&self, fragment: &Fragment) -> Color {
        self.process_fragment(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use approx::assert_relative_eq;

    fn fragment_at(world_pos: Vec3, normal: Vec3) -> Fragment {
        Fragment {
            screen_pos: Vec3::zeros(),
            world_pos,
            normal,
            tex_coord: Vec2::zeros(),
            color: Color::WHITE,
        }
    }

    #[test]
    fn unlit_fragment_keeps_only_ambient() {
        let mut proc = FragmentProcessor::new();
        proc.set_ambient_light(Color::new(0.5, 0.5, 0.5, 1.0));
        proc.set_camera_position(Vec3::new(0.0, 0.0, 5.0));

        // Light shining from behind the surface.
        proc.add_light(Light::directional(Vec3::new(0.0, 1.0, 0.0), Color::WHITE, 1.0));

        let out = proc.process_fragment(&fragment_at(Vec3::zeros(), Vec3::y()));
        let expected = Color::new(0.5, 0.5, 0.5, 1.0)
            * Material::default().ambient
            * (Color::WHITE * Material::default().diffuse);
        assert_relative_eq!(out.r, expected.r, epsilon = 1e-5);
        assert_relative_eq!(out.g, expected.g, epsilon = 1e-5);
    }

    #[test]
    fn head_on_directional_light_is_brighter_than_grazing() {
        let mut proc = FragmentProcessor::new();
        proc.set_camera_position(Vec3::new(0.0, 5.0, 0.0));
        proc.add_light(Light::directional(Vec3::new(0.0, -1.0, 0.0), Color::WHITE, 1.0));

        let head_on = proc.process_fragment(&fragment_at(Vec3::zeros(), Vec3::y()));
        let grazing = proc.process_fragment(&fragment_at(
            Vec3::zeros(),
            Vec3::new(1.0, 0.02, 0.0).normalize(),
        ));
        assert!(head_on.r > grazing.r);
    }

    #[test]
    fn point_light_attenuates_with_distance() {
        let mut proc = FragmentProcessor::new();
        proc.set_camera_position(Vec3::new(0.0, 5.0, 0.0));
        proc.add_light(Light::point(Vec3::new(0.0, 1.0, 0.0), Color::WHITE, 1.0));

        let near = proc.process_fragment(&fragment_at(Vec3::zeros(), Vec3::y()));
        let far = proc.process_fragment(&fragment_at(Vec3::new(8.0, 0.0, 0.0), Vec3::y()));
        assert!(near.r > far.r);
    }

    #[test]
    fn spot_with_equal_cutoffs_is_a_hard_cone() {
        let mut proc = FragmentProcessor::new();
        proc.set_camera_position(Vec3::new(0.0, 5.0, 0.0));

        let mut spot = Light::spot(
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Color::WHITE,
            1.0,
        );
        spot.inner_cutoff = 0.9;
        spot.outer_cutoff = 0.9;
        proc.add_light(spot);

        // Straight below the light: well inside the cone, finite brightness.
        let inside = proc.process_fragment(&fragment_at(Vec3::zeros(), Vec3::y()));
        assert!(inside.r.is_finite());
        assert!(inside.r > 0.0);

        // Far off axis: outside the cone, ambient only.
        let mut ambient_only = FragmentProcessor::new();
        ambient_only.set_camera_position(Vec3::new(0.0, 5.0, 0.0));
        let baseline = ambient_only.process_fragment(&fragment_at(Vec3::new(50.0, 0.0, 0.0), Vec3::y()));
        let outside = proc.process_fragment(&fragment_at(Vec3::new(50.0, 0.0, 0.0), Vec3::y()));
        assert_relative_eq!(outside.r, baseline.r, epsilon = 1e-6);
    }

    #[test]
    fn alpha_comes_from_the_material() {
        let mut proc = FragmentProcessor::new();
        let mut material = Material::default();
        material.diffuse = Color::new(0.2, 0.5, 0.25, 0.5);
        let assets = Assets::new();
        proc.set_material(&material, &assets);

        let out = proc.process_fragment(&fragment_at(Vec3::zeros(), Vec3::y()));
        assert_relative_eq!(out.a, 0.5);
    }
}
