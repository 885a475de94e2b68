/*!
Orrery 3D demo viewer.

Thin glue around the render core: a winit window, the Vulkan backend, a
programmatically built scene (a spinning cube with a checkerboard texture
plus a gizmo-flagged overlay node), and a notify-based shader watcher that
feeds hot-reload updates through the registry's handoff queue.

Shaders are loaded from `shaders/<name>.{vert,frag}.spv` next to the
working directory. Missing or broken shader files don't stop the app;
the affected materials are simply skipped until the files appear.
*/

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use glam::{Mat4, Quat, Vec3};
use notify::{RecursiveMode, Watcher};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use orrery_3d::graphics_device::{DeviceConfig, GraphicsDevice, IndexType};
use orrery_3d::orrery3d::{Viewer, ViewerConfig, GIZMO_SHADER};
use orrery_3d::resource::{Image, Material, Mesh, Submesh, VertexSemantic, VertexStream};
use orrery_3d::scene::{NodeKey, RootSet};
use orrery_3d::shader::{ShaderRegistry, ShaderUpdateQueue};
use orrery_3d::{render_info, render_warn};
use orrery_3d_renderer_vulkan::VulkanGraphicsDevice;

const SCENE_SHADER: &str = "scene";
const SHADER_DIR: &str = "shaders";

fn shader_paths(name: &str) -> (PathBuf, PathBuf) {
    let dir = Path::new(SHADER_DIR);
    (
        dir.join(format!("{}.vert.spv", name)),
        dir.join(format!("{}.frag.spv", name)),
    )
}

fn read_shader_pair(name: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let (vert, frag) = shader_paths(name);
    match (std::fs::read(&vert), std::fs::read(&frag)) {
        (Ok(vertex), Ok(fragment)) => Some((vertex, fragment)),
        _ => {
            render_warn!(
                "demo",
                "shader '{}' not found under {}/, material will be skipped",
                name,
                SHADER_DIR
            );
            None
        }
    }
}

fn load_initial_shaders(registry: &mut ShaderRegistry) {
    for name in [SCENE_SHADER, GIZMO_SHADER] {
        if let Some((vertex, fragment)) = read_shader_pair(name) {
            registry.register(name, vertex, fragment);
        }
    }
}

/// Watch the shader directory; on any change re-read both stages of every
/// known shader and push them through the registry's handoff queue. The
/// watcher thread never touches the registry itself.
fn spawn_shader_watcher(queue: ShaderUpdateQueue) -> Option<notify::RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if event.is_err() {
            return;
        }
        for name in [SCENE_SHADER, GIZMO_SHADER] {
            if let Some((vertex, fragment)) = read_shader_pair(name) {
                queue.push(name, vertex, fragment);
            }
        }
    })
    .ok()?;
    watcher
        .watch(Path::new(SHADER_DIR), RecursiveMode::NonRecursive)
        .ok()?;
    render_info!("demo", "watching {}/ for shader changes", SHADER_DIR);
    Some(watcher)
}

// ===== DEMO SCENE =====

fn checkerboard_image() -> Image {
    let size = 64u32;
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dark = ((x / 8) + (y / 8)) % 2 == 0;
            let value = if dark { 60 } else { 220 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    Image::new("checkerboard", size, size, pixels).expect("checkerboard dimensions")
}

fn cube_mesh(material: Arc<Material>) -> Mesh {
    let face_data: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    ];

    let mut positions: Vec<f32> = Vec::new();
    let mut normals: Vec<f32> = Vec::new();
    let mut texcoords: Vec<f32> = Vec::new();
    let mut indices: Vec<u8> = Vec::new();

    for (face, (normal, tangent, bitangent)) in face_data.iter().enumerate() {
        let base = (face * 4) as u16;
        let corners = [
            *normal - *tangent - *bitangent,
            *normal + *tangent - *bitangent,
            *normal + *tangent + *bitangent,
            *normal - *tangent + *bitangent,
        ];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        for (corner, uv) in corners.iter().zip(uvs) {
            let p = *corner * 0.5;
            positions.extend_from_slice(&[p.x, p.y, p.z]);
            normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
            texcoords.extend_from_slice(&uv);
        }
        for i in [0u16, 1, 2, 2, 3, 0] {
            indices.extend_from_slice(&(base + i).to_le_bytes());
        }
    }

    let to_bytes = |floats: &[f32]| -> Vec<u8> {
        floats.iter().flat_map(|f| f.to_le_bytes()).collect()
    };

    let index_count = (indices.len() / 2) as u32;
    Mesh::new(
        "cube",
        vec![
            VertexStream {
                semantic: VertexSemantic::Position,
                data: to_bytes(&positions).into(),
            },
            VertexStream {
                semantic: VertexSemantic::Normal,
                data: to_bytes(&normals).into(),
            },
            VertexStream {
                semantic: VertexSemantic::TexCoord,
                data: to_bytes(&texcoords).into(),
            },
        ],
        24,
        indices,
        IndexType::U16,
        vec![Submesh {
            index_count,
            index_offset: 0,
            material,
        }],
    )
    .expect("cube mesh data")
}

fn build_scene(viewer: &mut Viewer) -> NodeKey {
    let image = Arc::new(checkerboard_image());
    let material = Arc::new(
        Material::new("cube", SCENE_SHADER)
            .with_base_color([0.9, 0.85, 0.8, 1.0])
            .with_color_image(image),
    );
    let mesh = Arc::new(cube_mesh(material));

    let scene = viewer.scene_mut();
    let root = scene.create_node("demo_root");
    scene.add_root(RootSet::Scene, root);

    let cube = scene.create_node("cube");
    scene.add_child(root, cube);
    scene.node_mut(cube).unwrap().add_mesh(mesh);

    // Overlay marker with an axis gizmo, like a tracked-device anchor.
    let anchor = scene.create_node("anchor");
    scene.add_root(RootSet::Overlay, anchor);
    scene.node_mut(anchor).unwrap().translation = Vec3::new(0.0, 1.0, 0.0);
    scene.node_mut(anchor).unwrap().set_gizmo_enabled(true);

    cube
}

// ===== APP =====

struct DemoApp {
    window: Option<Arc<Window>>,
    viewer: Option<Viewer>,
    cube: Option<NodeKey>,
    _watcher: Option<notify::RecommendedWatcher>,
    started: Instant,
}

impl DemoApp {
    fn new() -> Self {
        Self {
            window: None,
            viewer: None,
            cube: None,
            _watcher: None,
            started: Instant::now(),
        }
    }

    fn update_camera(&mut self, aspect: f32) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let eye = Vec3::new(2.5, 1.8, 2.5);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 100.0);
        viewer.set_camera(view, projection);
    }

    fn animate(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f32();
        if let (Some(viewer), Some(cube)) = (self.viewer.as_mut(), self.cube) {
            if let Some(node) = viewer.scene_mut().node_mut(cube) {
                node.rotation = Quat::from_rotation_y(elapsed * 0.8);
            }
        }
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("Orrery 3D")
                        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720)),
                )
                .expect("create window"),
        );

        let device = VulkanGraphicsDevice::new(&window, DeviceConfig::default())
            .expect("create Vulkan device");
        let device: Arc<Mutex<dyn GraphicsDevice>> = Arc::new(Mutex::new(device));

        let swapchain = device
            .lock()
            .unwrap()
            .create_swapchain(&window)
            .expect("create swapchain");

        let mut registry = ShaderRegistry::new();
        load_initial_shaders(&mut registry);

        let mut viewer = Viewer::new(device, swapchain, registry, ViewerConfig::default())
            .expect("create viewer");
        self.cube = Some(build_scene(&mut viewer));
        self._watcher = spawn_shader_watcher(viewer.shader_update_queue());

        let size = window.inner_size();
        self.viewer = Some(viewer);
        self.update_camera(size.width.max(1) as f32 / size.height.max(1) as f32);
        self.window = Some(window);

        render_info!("demo", "viewer ready");
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    if let Some(viewer) = self.viewer.as_mut() {
                        if let Err(error) = viewer.resize(size.width, size.height) {
                            render_warn!("demo", "resize failed: {}", error);
                        }
                    }
                    self.update_camera(size.width as f32 / size.height as f32);
                }
            }
            WindowEvent::RedrawRequested => {
                self.animate();
                if let Some(viewer) = self.viewer.as_mut() {
                    if let Err(error) = viewer.on_frame() {
                        render_warn!("demo", "frame failed: {}", error);
                        event_loop.exit();
                        return;
                    }
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() {
    let event_loop = EventLoop::new().expect("create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = DemoApp::new();
    if let Err(error) = event_loop.run_app(&mut app) {
        eprintln!("event loop error: {}", error);
    }
}
