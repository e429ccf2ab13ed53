//! Demo scene: a checkered ground plane, three teapots (copper, silver,
//! and transparent green glass) under a warm sun with shadow mapping,
//! rendered to `render.ppm`.
//!
//! Looks for `assets/models/teapot.obj` relative to the working directory
//! and falls back to cubes when the model is missing.

use log::warn;

use softpipe::color::Color;
use softpipe::math::Vec3;
use softpipe::mesh::{Mesh, Model};
use softpipe::output;
use softpipe::render::fragment::Light;
use softpipe::render::framebuffer::Framebuffer;
use softpipe::renderer::Renderer;
use softpipe::scene::{Assets, MeshKey, Scene};
use softpipe::texture::{Texture, WrapMode};
use softpipe::Camera;

const WIDTH: usize = 800;
const HEIGHT: usize = 600;

fn load_hero_mesh(assets: &mut Assets) -> MeshKey {
    match Model::load_obj("assets/models/teapot.obj") {
        Ok(mut model) if !model.meshes.is_empty() => {
            let mut mesh = model.meshes.remove(0);
            mesh.compute_smooth_normals();
            assets.insert_mesh(mesh)
        }
        Ok(_) => {
            warn!("teapot.obj contained no meshes, using a cube");
            assets.insert_mesh(Mesh::cube(2.5))
        }
        Err(e) => {
            warn!("could not load teapot.obj ({}), using a cube", e);
            assets.insert_mesh(Mesh::cube(2.5))
        }
    }
}

fn sky_gradient() -> Texture {
    // Vertical gradient from a pale horizon up to a saturated zenith.
    let height = 256;
    let horizon = Color::new(0.85, 0.9, 0.96, 1.0);
    let zenith = Color::new(0.35, 0.55, 0.85, 1.0);

    let pixels = (0..height)
        .map(|y| {
            let t = y as f32 / (height - 1) as f32;
            horizon * (1.0 - t) + zenith * t
        })
        .collect();

    let mut texture = Texture::from_pixels(1, height, pixels).expect("gradient dimensions");
    texture.set_wrap_mode(WrapMode::ClampToEdge);
    texture
}

fn main() {
    env_logger::init();

    let mut assets = Assets::new();

    let hero = load_hero_mesh(&mut assets);

    let mut ground_mesh = Mesh::quad(25.0, Vec3::y());
    for v in &mut ground_mesh.vertices {
        // Tile the ground texture.
        v.tex_coord *= 4.0;
    }
    let ground_mesh = assets.insert_mesh(ground_mesh);

    let mut checker = Texture::checkerboard(256, 256, 8, Color::grey(0.8), Color::grey(0.35));
    checker.set_wrap_mode(WrapMode::Repeat);
    let checker = assets.insert_texture(checker);

    let mut scene = Scene::new();
    scene.set_ambient_light(Color::new(0.15, 0.15, 0.2, 1.0));

    // Warm key light plus a cool fill from the opposite side.
    let sun = Light::directional(Vec3::new(-0.5, -1.0, -0.3), Color::new(1.0, 0.95, 0.85, 1.0), 1.2);
    scene.add_light(sun);
    scene.add_light(Light::directional(
        Vec3::new(0.5, -0.3, 0.5),
        Color::new(0.6, 0.7, 0.9, 1.0),
        0.3,
    ));

    let ground = scene.add_object("ground");
    ground.mesh = Some(ground_mesh);
    ground.material.ambient = Color::new(0.15, 0.12, 0.1, 1.0);
    ground.material.diffuse = Color::WHITE;
    ground.material.specular = Color::grey(0.1);
    ground.material.shininess = 8.0;
    ground.material.diffuse_map = Some(checker);

    let center = scene.add_object("teapot_center");
    center.mesh = Some(hero);
    center.material.ambient = Color::new(0.19, 0.07, 0.02, 1.0);
    center.material.diffuse = Color::new(0.7, 0.27, 0.08, 1.0);
    center.material.specular = Color::new(0.95, 0.64, 0.54, 1.0);
    center.material.shininess = 51.2;

    let left = scene.add_object("teapot_left");
    left.mesh = Some(hero);
    left.transform.position = Vec3::new(-6.0, 0.0, 2.0);
    left.transform.scale = Vec3::new(0.7, 0.7, 0.7);
    left.transform.rotation = Vec3::new(0.0, (-30f32).to_radians(), 0.0);
    left.material.ambient = Color::grey(0.19);
    left.material.diffuse = Color::grey(0.51);
    left.material.specular = Color::grey(0.77);
    left.material.shininess = 89.6;

    let right = scene.add_object("teapot_right");
    right.mesh = Some(hero);
    right.transform.position = Vec3::new(6.0, 0.0, 2.0);
    right.transform.scale = Vec3::new(0.7, 0.7, 0.7);
    right.transform.rotation = Vec3::new(0.0, 30f32.to_radians(), 0.0);
    right.material.ambient = Color::new(0.1, 0.15, 0.1, 0.5);
    right.material.diffuse = Color::new(0.2, 0.5, 0.25, 0.5);
    right.material.specular = Color::new(0.9, 0.95, 0.9, 1.0);
    right.material.shininess = 96.0;
    right.transparent = true;

    let mut camera = Camera::new();
    camera.set_position(Vec3::new(0.0, 5.0, 16.0));
    camera.set_target(Vec3::new(0.0, 2.5, 0.0));
    camera.set_perspective(50f32.to_radians(), WIDTH as f32 / HEIGHT as f32, 0.1, 100.0);

    let mut fb = Framebuffer::new(WIDTH, HEIGHT);

    let mut renderer = Renderer::new();
    renderer.enable_shadows(true);
    renderer.set_shadow_bounds(Vec3::new(0.0, 2.0, 0.0), 20.0);

    renderer.draw_backdrop(&mut fb, &sky_gradient());
    // Geometry depth-tests against a fresh depth plane but keeps the sky.
    fb.clear_depth(1.0);

    renderer.render(&scene, &assets, &camera, &mut fb);

    if let Err(e) = output::save(&fb, "render.ppm") {
        eprintln!("failed to save render: {}", e);
        std::process::exit(1);
    }
}
