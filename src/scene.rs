//! Scene description: transforms, renderable objects, lights, and the
//! asset registries the scene references without owning.

use slotmap::{new_key_type, SlotMap};

use crate::color::Color;
use crate::math::{self, Mat4, Vec3};
use crate::mesh::Mesh;
use crate::render::fragment::{Light, Material};
use crate::texture::Texture;

new_key_type! {
    /// Handle to a mesh in [`Assets`]
    pub struct MeshKey;
    /// Handle to a texture in [`Assets`]
    pub struct TextureKey;
}

/// Owner of meshes and textures.
///
/// Scene objects and materials hold keys into these arenas rather than the
/// data itself, so assets outlive and are shared by everything that
/// references them; a stale key simply resolves to nothing.
#[derive(Default)]
pub struct Assets {
    meshes: SlotMap<MeshKey, Mesh>,
    textures: SlotMap<TextureKey, Texture>,
}

impl Assets {
    pub fn new() -> Assets {
        Assets::default()
    }

    pub fn insert_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    pub fn insert_texture(&mut self, texture: Texture) -> TextureKey {
        self.textures.insert(texture)
    }

    pub fn mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    pub fn mesh_mut(&mut self, key: MeshKey) -> Option<&mut Mesh> {
        self.meshes.get_mut(key)
    }

    pub fn texture(&self, key: TextureKey) -> Option<&Texture> {
        self.textures.get(key)
    }

    pub fn texture_mut(&mut self, key: TextureKey) -> Option<&mut Texture> {
        self.textures.get_mut(key)
    }

    pub fn remove_mesh(&mut self, key: MeshKey) -> Option<Mesh> {
        self.meshes.remove(key)
    }

    pub fn remove_texture(&mut self, key: TextureKey) -> Option<Texture> {
        self.textures.remove(key)
    }
}

/// Position, euler rotation (radians) and scale of a scene object.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Transform {
        Transform {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// The model matrix: translate, then rotate about x, y, z, then scale.
    pub fn matrix(&self) -> Mat4 {
        math::translate(self.position)
            * math::rotate_x(self.rotation.x)
            * math::rotate_y(self.rotation.y)
            * math::rotate_z(self.rotation.z)
            * math::scale(self.scale)
    }
}

/// A renderable entry in the scene.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshKey>,
    pub material: Material,
    pub visible: bool,
    /// Transparent objects render in the blended sub-pass, after opaques,
    /// sorted back-to-front.
    pub transparent: bool,
}

impl SceneObject {
    fn named(name: &str) -> SceneObject {
        SceneObject {
            name: name.to_string(),
            transform: Transform::default(),
            mesh: None,
            material: Material::default(),
            visible: true,
            transparent: false,
        }
    }
}

/// Ordered objects and lights plus the scene-wide ambient term.
pub struct Scene {
    objects: Vec<SceneObject>,
    lights: Vec<Light>,
    ambient_light: Color,
}

impl Default for Scene {
    fn default() -> Scene {
        Scene::new()
    }
}

impl Scene {
    pub fn new() -> Scene {
        Scene {
            objects: Vec::new(),
            lights: Vec::new(),
            ambient_light: Color::new(0.1, 0.1, 0.1, 1.0),
        }
    }

    /// Append an object and hand back a reference for configuration.
    pub fn add_object(&mut self, name: &str) -> &mut SceneObject {
        self.objects.push(SceneObject::named(name));
        self.objects.last_mut().unwrap()
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    /// Remove the first object with the given name.
    pub fn remove_object(&mut self, name: &str) {
        if let Some(i) = self.objects.iter().position(|o| o.name == name) {
            self.objects.remove(i);
        }
    }

    pub fn clear_objects(&mut self) {
        self.objects.clear();
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        &mut self.objects
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }

    pub fn set_ambient_light(&mut self, color: Color) {
        self.ambient_light = color;
    }

    pub fn ambient_light(&self) -> Color {
        self.ambient_light
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn transform_applies_scale_before_translation() {
        let t = Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Vec3::zeros(),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let p = t.matrix() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.x, 12.0, epsilon = 1e-5);
    }

    #[test]
    fn objects_are_found_and_removed_by_name() {
        let mut scene = Scene::new();
        scene.add_object("ground");
        scene.add_object("hero").transform.position = Vec3::new(1.0, 0.0, 0.0);

        assert_eq!(scene.object_count(), 2);
        assert!(scene.object("hero").is_some());

        scene.remove_object("ground");
        assert_eq!(scene.object_count(), 1);
        assert!(scene.object("ground").is_none());
    }

    #[test]
    fn stale_mesh_keys_resolve_to_nothing() {
        let mut assets = Assets::new();
        let key = assets.insert_mesh(Mesh::quad(1.0, Vec3::y()));
        assert!(assets.mesh(key).is_some());

        assets.remove_mesh(key);
        assert!(assets.mesh(key).is_none());
    }
}
