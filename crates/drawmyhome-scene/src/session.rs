//! Live 3D session: render loop, pointer tracking, picking and click dispatch

use std::sync::Arc;
use std::time::Duration;

use nalgebra::{Point3, Vector3};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use drawmyhome_core::{dispatch_click, DeviceClick, SceneGroup, SharedDevice, SurfaceEvents};

use crate::builder::{device_bounds, SceneData, WallMesh};
use crate::camera::{to_ndc, Camera};
use crate::picking::{intersect_ground, Ray};

/// Height of the ground plane that catches clicks outside the walls
pub const GROUND_LEVEL: f64 = -1.0;

/// Half size of the ground plane
pub const GROUND_HALF_SIZE: f64 = 500.0;

/// Draws the current scene. Provided by the host.
pub trait Renderer: Send {
    fn render(&mut self, frame: &Frame<'_>);
}

/// Everything a renderer needs for one frame
pub struct Frame<'a> {
    pub walls: &'a [WallMesh],
    pub devices: &'a [SharedDevice],
    pub camera: &'a Camera,
}

/// What a pick ray hit
#[derive(Debug, Clone, PartialEq)]
pub enum HitTarget {
    Wall(usize),
    Device(String),
    Ground,
}

/// A ray hit against the live scene
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub target: HitTarget,
    pub point: Point3<f64>,
    /// Rotation of the hit object
    pub rotation: Vector3<f64>,
    pub distance: f64,
}

struct SessionState {
    scene: Option<SceneData>,
    camera: Camera,
    viewport: (f64, f64),
    pointer: (f64, f64),
    pressed_down: bool,
    pressed_up: bool,
    renderer: Option<Box<dyn Renderer>>,
    frames: u64,
}

impl SessionState {
    fn ray(&self) -> Ray {
        self.camera.ray(self.pointer.0, self.pointer.1)
    }

    fn devices(&self) -> &[SharedDevice] {
        self.scene.as_ref().map(|s| s.devices.as_slice()).unwrap_or(&[])
    }

    fn hits(&self) -> Vec<Hit> {
        let ray = self.ray();
        let mut hits = Vec::new();

        if let Some(scene) = &self.scene {
            for (index, wall) in scene.walls.iter().enumerate() {
                if let Some(t) = wall.bounds().intersect(&ray) {
                    hits.push(Hit {
                        target: HitTarget::Wall(index),
                        point: ray.at(t),
                        rotation: wall.rotation(),
                        distance: t,
                    });
                }
            }
            for device in &scene.devices {
                let Some(t) = device_bounds(device).and_then(|b| b.intersect(&ray)) else {
                    continue;
                };
                let device = device.lock();
                hits.push(Hit {
                    target: HitTarget::Device(device.id().to_string()),
                    point: ray.at(t),
                    rotation: device.visual().map(|v| v.rotation).unwrap_or_else(Vector3::zeros),
                    distance: t,
                });
            }
        }

        if let Some(t) = intersect_ground(&ray, GROUND_LEVEL) {
            let point = ray.at(t);
            if point.x.abs() <= GROUND_HALF_SIZE && point.z.abs() <= GROUND_HALF_SIZE {
                hits.push(Hit {
                    target: HitTarget::Ground,
                    point,
                    rotation: Vector3::new(-std::f64::consts::FRAC_PI_2, 0.0, 0.0),
                    distance: t,
                });
            }
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// The device hit by a completed click, first in plan order
    fn check_click(&mut self) -> Option<SharedDevice> {
        if !(self.pressed_down && self.pressed_up) {
            return None;
        }
        self.pressed_down = false;
        self.pressed_up = false;

        let ray = self.ray();
        self.devices()
            .iter()
            .find(|device| device_bounds(device).and_then(|b| b.intersect(&ray)).is_some())
            .cloned()
    }

    fn step(&mut self) -> Option<SharedDevice> {
        let clicked = self.check_click();

        if let Some(mut renderer) = self.renderer.take() {
            let (walls, devices) = match &self.scene {
                Some(scene) => (scene.walls.as_slice(), scene.devices.as_slice()),
                None => (&[][..], &[][..]),
            };
            renderer.render(&Frame {
                walls,
                devices,
                camera: &self.camera,
            });
            self.renderer = Some(renderer);
        }
        self.frames += 1;
        clicked
    }
}

/// Owns the displayed scene and the render loop
pub struct SceneSession {
    state: Arc<Mutex<SessionState>>,
    surface: SurfaceEvents,
    frame_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SceneSession {
    pub fn new(surface: SurfaceEvents, frame_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                scene: None,
                camera: Camera::default(),
                viewport: (400.0, 400.0),
                pointer: (0.0, 0.0),
                pressed_down: false,
                pressed_up: false,
                renderer: None,
                frames: 0,
            })),
            surface,
            frame_interval,
            task: Mutex::new(None),
        }
    }

    pub fn surface(&self) -> &SurfaceEvents {
        &self.surface
    }

    pub fn set_renderer(&self, renderer: Box<dyn Renderer>) {
        self.state.lock().renderer = Some(renderer);
    }

    /// Fit the camera to a new viewport size in pixels
    pub fn resize(&self, width: f64, height: f64) {
        let mut state = self.state.lock();
        state.viewport = (width, height);
        state.camera.resize(width, height);
    }

    pub fn camera(&self) -> Camera {
        self.state.lock().camera.clone()
    }

    /// Replace the displayed scene and frame the camera on it
    pub fn display_scene(&self, scene: SceneData) {
        let mut state = self.state.lock();
        if let Some(previous) = state.scene.take() {
            detach(&previous);
        }

        for device in &scene.devices {
            if let Some(visual) = device.lock().visual_mut() {
                visual.parent = Some(SceneGroup::Devices);
            }
        }
        state.camera.frame(scene.average_position);
        info!(
            walls = scene.walls.len(),
            devices = scene.devices.len(),
            "Displaying scene"
        );
        state.scene = Some(scene);
    }

    /// Remove the displayed scene
    pub fn clear_scene(&self) {
        if let Some(previous) = self.state.lock().scene.take() {
            detach(&previous);
        }
    }

    pub fn has_scene(&self) -> bool {
        self.state.lock().scene.is_some()
    }

    /// Pointer moved: any half-finished click is abandoned
    pub fn pointer_move(&self, x: f64, y: f64) {
        let mut state = self.state.lock();
        state.pointer = to_ndc(x, y, state.viewport.0, state.viewport.1);
        state.pressed_down = false;
        state.pressed_up = false;
    }

    pub fn pointer_down(&self, x: f64, y: f64) {
        let mut state = self.state.lock();
        state.pointer = to_ndc(x, y, state.viewport.0, state.viewport.1);
        state.pressed_down = true;
    }

    pub fn pointer_up(&self) {
        self.state.lock().pressed_up = true;
    }

    /// All hits under the pointer, nearest first
    pub fn intersections(&self) -> Vec<Hit> {
        self.state.lock().hits()
    }

    /// Nearest hit under the pointer
    pub fn intersection(&self) -> Option<Hit> {
        self.intersections().into_iter().next()
    }

    /// Run one frame: resolve a pending click, then render
    pub fn frame(&self) -> Option<DeviceClick> {
        run_frame(&self.state, &self.surface)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.state.lock().frames
    }

    /// Start the render loop. Calling it while running does nothing.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime, render loop not started");
                return;
            }
        };

        let state = self.state.clone();
        let surface = self.surface.clone();
        let period = self.frame_interval.max(Duration::from_millis(1));
        *task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                run_frame(&state, &surface);
            }
        }));
        debug!(interval_ms = period.as_millis() as u64, "Render loop started");
    }

    /// Stop the render loop. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            debug!("Render loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SceneSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Step the session, then dispatch any click with the session unlocked
fn run_frame(state: &Mutex<SessionState>, surface: &SurfaceEvents) -> Option<DeviceClick> {
    let clicked = state.lock().step();
    clicked.map(|device| dispatch_click(&device, surface))
}

fn detach(scene: &SceneData) {
    for device in &scene.devices {
        if let Some(visual) = device.lock().visual_mut() {
            visual.parent = None;
        }
    }
}
