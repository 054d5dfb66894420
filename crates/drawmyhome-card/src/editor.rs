//! Floorplan editor controller
//!
//! Wires pointer input through the active snap strategy and drawing tool into
//! the floorplan model, rebuilds the 3D scene on view switches, places devices
//! on scene hits and routes entity links through the device adapter.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use drawmyhome_core::{
    render_plan, AssetLoader, AxisSnap, Canvas2d, DeviceFactory, DrawingTool, FloorplanModel,
    ModelDirLoader, Point2, ProximitySnap, Segment, SharedDevice, SnapData, SnapStrategy,
    SurfaceEvent, ToolError, ToolKind,
};
use drawmyhome_hass::{
    DeviceAdapter, EntityStateSource, FloorplanFileManager, HassError, JsonFilePlanStore,
    PlanStore, StoreError,
};
use drawmyhome_scene::{build, SceneSession};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::catalog::{EntityCatalog, EntityChoice};
use crate::config::CardConfig;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("No drawing tool selected")]
    NoActiveTool,

    #[error("Not connected to the home-automation API")]
    NoApi,

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("No plan selected")]
    NoPlanSelected,

    #[error("Invalid plan name: {0:?}")]
    InvalidPlanName(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("API error: {0}")]
    Hass(#[from] HassError),
}

/// Which surface the editor is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Draw2d,
    View3d,
}

pub struct FloorplanEditor {
    config: CardConfig,
    model: FloorplanModel,
    tool: Option<Box<dyn DrawingTool>>,
    drawing: bool,
    snap: Box<dyn SnapStrategy>,
    selected_device: Option<String>,
    mode: ViewMode,
    factory: DeviceFactory,
    session: SceneSession,
    adapter: Option<DeviceAdapter>,
    catalog: EntityCatalog,
    files: FloorplanFileManager,
    plans: Vec<String>,
    selected_plan: Option<String>,
}

impl FloorplanEditor {
    pub fn new(config: CardConfig, store: Arc<dyn PlanStore>, assets: Arc<dyn AssetLoader>) -> Self {
        let factory = DeviceFactory::new(assets).with_switch_asset(&config.models.switch);
        let files = FloorplanFileManager::new(store)
            .with_timeout(Duration::from_millis(config.storage.timeout_ms));
        let session = SceneSession::new(
            Default::default(),
            Duration::from_millis(config.session.frame_interval_ms),
        );
        let catalog = EntityCatalog::new(&config.entities);

        Self {
            config,
            model: FloorplanModel::new(),
            tool: None,
            drawing: false,
            snap: Box::new(ProximitySnap),
            selected_device: None,
            mode: ViewMode::Draw2d,
            factory,
            session,
            adapter: None,
            catalog,
            files,
            plans: Vec::new(),
            selected_plan: None,
        }
    }

    /// Editor backed by the file store and model directory named in the config
    pub fn from_config(config: CardConfig) -> Self {
        let store = Arc::new(JsonFilePlanStore::new(&config.storage.path));
        let assets = Arc::new(ModelDirLoader::new(Path::new(&config.models.path)));
        Self::new(config, store, assets)
    }

    /// Create the devices declared in the configuration
    pub fn configure(&mut self) {
        for declared in self.config.devices.clone() {
            let factory = match &declared.url {
                Some(url) => self.factory.clone().with_switch_asset(url),
                None => self.factory.clone(),
            };
            let device = factory.create(&declared.device_type);
            device.lock().link(&declared.entity_id);
            self.model.add_device(device.clone());
            if let Some(adapter) = self.adapter.as_mut() {
                if let Err(e) = adapter.link(&device, &declared.entity_id, false) {
                    warn!(entity = %declared.entity_id, error = %e, "Failed to bind configured device");
                }
            }
        }
        info!(devices = self.config.devices.len(), "Configured card");
    }

    /// Attach the external API and bind every linked device
    pub fn connect(&mut self, source: Arc<dyn EntityStateSource>) {
        if let Some(mut previous) = self.adapter.take() {
            previous.detach_all();
        }
        self.adapter = Some(DeviceAdapter::new(source));
        self.relink_devices();
    }

    fn relink_devices(&mut self) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        for device in self.model.devices() {
            let entity_id = device.lock().entity_id().map(str::to_string);
            if let Some(entity_id) = entity_id {
                if let Err(e) = adapter.link(device, &entity_id, false) {
                    warn!(entity = %entity_id, error = %e, "Failed to re-link device");
                }
            }
        }
    }

    pub fn model(&self) -> &FloorplanModel {
        &self.model
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn session(&self) -> &SceneSession {
        &self.session
    }

    pub fn adapter(&self) -> Option<&DeviceAdapter> {
        self.adapter.as_ref()
    }

    pub fn plans(&self) -> &[String] {
        &self.plans
    }

    pub fn selected_plan(&self) -> Option<&str> {
        self.selected_plan.as_deref()
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    pub fn active_tool(&self) -> Option<ToolKind> {
        self.tool.as_ref().map(|t| t.kind())
    }

    /// Events the host UI must act on (entity detail, entity selection)
    pub fn surface_events(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.session.surface().subscribe()
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.session.resize(width, height);
    }

    // Tools and snapping

    pub fn select_tool(&mut self, label: &str) -> Result<(), CardError> {
        let kind: ToolKind = label.parse()?;
        self.tool = Some(kind.create());
        self.drawing = false;
        debug!(tool = %kind, "Selected tool");
        Ok(())
    }

    /// Axis lock while the modifier is held, endpoint snapping otherwise
    pub fn set_axis_lock(&mut self, locked: bool) {
        self.snap = if locked {
            Box::new(AxisSnap)
        } else {
            Box::new(ProximitySnap)
        };
        debug!(strategy = self.snap.name(), "Snap strategy changed");
    }

    fn snapped(&self, x: f64, y: f64) -> Point2 {
        let last_point = self.tool.as_ref().and_then(|t| t.first_point());
        let data = SnapData::new(self.model.segments(), last_point);
        self.snap.resolve(Point2::new(x, y), &data)
    }

    // Pointer input. In the 3D view it feeds the scene session.

    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<(), CardError> {
        if self.mode == ViewMode::View3d {
            self.session.pointer_down(x, y);
            return Ok(());
        }
        if self.tool.is_none() {
            return Err(CardError::NoActiveTool);
        }
        let point = self.snapped(x, y);
        if let Some(tool) = self.tool.as_mut() {
            tool.press(point);
        }
        self.drawing = true;
        Ok(())
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.mode == ViewMode::View3d {
            self.session.pointer_move(x, y);
            return;
        }
        if !self.drawing {
            return;
        }
        let point = self.snapped(x, y);
        if let Some(tool) = self.tool.as_mut() {
            tool.hover(point, self.model.segments_mut());
        }
    }

    /// Finish a gesture. Returns the segments added to the plan.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<Vec<Segment>, CardError> {
        if self.mode == ViewMode::View3d {
            self.session.pointer_up();
            return Ok(Vec::new());
        }
        if !self.drawing {
            return Ok(Vec::new());
        }
        self.drawing = false;

        let point = self.snapped(x, y);
        let tool = self.tool.as_mut().ok_or(CardError::NoActiveTool)?;
        let added = tool.release(point)?.unwrap_or_default();
        self.model.add_segments(added.iter().copied());
        Ok(added)
    }

    /// Draw the plan and the in-progress preview
    pub fn render_2d(&self, canvas: &mut dyn Canvas2d, width: f64, height: f64) {
        render_plan(canvas, self.model.segments(), width, height);
        if self.drawing {
            if let Some(tool) = &self.tool {
                tool.draw(canvas);
            }
        }
    }

    // Views

    pub fn switch_to_3d(&mut self) {
        let scene = build(&self.model, &self.config.walls);
        self.session.display_scene(scene);
        self.session.start();
        self.drawing = false;
        self.mode = ViewMode::View3d;
    }

    pub fn switch_to_2d(&mut self) {
        self.session.stop();
        self.mode = ViewMode::Draw2d;
    }

    // Devices

    /// Device type placed by the next 3D click
    pub fn select_device(&mut self, label: &str) {
        self.selected_device = Some(label.to_string());
        debug!(device = %label, "Selected device type");
    }

    /// Place the selected device type at the scene hit under the pointer.
    ///
    /// The selection is cleared whatever the outcome.
    pub async fn place_device(&mut self) -> Result<Option<SharedDevice>, CardError> {
        let Some(label) = self.selected_device.take() else {
            warn!("No device selected for placement");
            return Ok(None);
        };
        let Some(hit) = self.session.intersection() else {
            warn!(device = %label, "No object under the pointer");
            return Ok(None);
        };

        let device = self.factory.create(&label);
        {
            let mut guard = device.lock();
            guard.set_position(hit.point);
            guard.set_rotation(hit.rotation);
            info!(device = %guard.id(), x = hit.point.x, y = hit.point.y, z = hit.point.z, "Placed device");
        }
        self.model.add_device(device.clone());

        if let Err(e) = self.save_plan().await {
            warn!(error = %e, "Plan not saved after placing device");
        }
        self.switch_to_3d();
        Ok(Some(device))
    }

    /// Remove a device and release its binding
    pub fn remove_device(&mut self, device_id: &str) -> Result<(), CardError> {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.unlink(device_id);
        }
        self.model
            .remove_device(device_id)
            .ok_or_else(|| CardError::UnknownDevice(device_id.to_string()))?;
        if self.mode == ViewMode::View3d {
            self.switch_to_3d();
        }
        Ok(())
    }

    /// Entities offered for linking
    pub fn entity_choices(&self, domain: Option<&str>) -> Result<Vec<EntityChoice>, CardError> {
        let adapter = self.adapter.as_ref().ok_or(CardError::NoApi)?;
        Ok(self.catalog.choices(adapter.source().as_ref(), domain))
    }

    /// Complete an entity selection: bind the device and save the plan
    pub async fn link_device(&mut self, device_id: &str, entity_id: &str) -> Result<(), CardError> {
        let device = self
            .model
            .find_device(device_id)
            .ok_or_else(|| CardError::UnknownDevice(device_id.to_string()))?;
        let adapter = self.adapter.as_mut().ok_or(CardError::NoApi)?;
        adapter.link(&device, entity_id, false)?;

        if let Err(e) = self.save_plan().await {
            warn!(error = %e, "Plan not saved after linking device");
        }
        Ok(())
    }

    // Plans

    /// Save and show the plan in 3D. An empty plan is refused.
    pub async fn submit(&mut self) -> Result<bool, CardError> {
        if self.model.is_empty() {
            error!("No walls to save");
            return Ok(false);
        }
        self.save_plan().await?;
        self.switch_to_3d();
        Ok(true)
    }

    /// Fetch the plan list and open the default plan when it exists
    pub async fn refresh_plans(&mut self) -> Result<Vec<String>, CardError> {
        self.plans = self.files.saved_plans().await?;
        info!(count = self.plans.len(), "Available plans");

        let default = self
            .config
            .default_plan
            .clone()
            .filter(|name| self.plans.contains(name));
        match default {
            Some(name) => {
                self.load_plan(&name).await;
            }
            None if self.selected_plan.is_none() => {
                self.selected_plan = self.plans.first().cloned();
            }
            None => {}
        }
        Ok(self.plans.clone())
    }

    /// Replace the model with a stored plan. On failure the current plan stays.
    pub async fn load_plan(&mut self, name: &str) -> bool {
        let Some(model) = self.files.load(name).await else {
            error!(plan = %name, "Failed to load plan");
            return false;
        };

        if let Some(adapter) = self.adapter.as_mut() {
            adapter.detach_all();
        }
        self.model = model;
        self.factory.restore_assets(&self.model);
        self.selected_plan = Some(name.to_string());
        self.relink_devices();
        self.switch_to_3d();
        true
    }

    pub async fn save_plan(&self) -> Result<(), CardError> {
        let name = self.selected_plan.as_deref().ok_or(CardError::NoPlanSelected)?;
        self.files.save(name, &self.model).await?;
        debug!(plan = %name, "Saved plan");
        Ok(())
    }

    /// Start an empty plan under a new name
    pub async fn create_plan(&mut self, name: &str) -> Result<(), CardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CardError::InvalidPlanName(name.to_string()));
        }

        let model = FloorplanModel::new();
        self.files.save(name, &model).await?;

        if let Some(adapter) = self.adapter.as_mut() {
            adapter.detach_all();
        }
        self.model = model;
        if !self.plans.iter().any(|p| p == name) {
            self.plans.push(name.to_string());
            self.plans.sort();
        }
        self.selected_plan = Some(name.to_string());
        self.switch_to_2d();
        info!(plan = %name, "Created plan");
        Ok(())
    }

    pub async fn delete_plan(&mut self, name: &str) -> Result<bool, CardError> {
        let existed = self.files.delete(name).await?;
        self.plans.retain(|p| p != name);
        if self.selected_plan.as_deref() == Some(name) {
            self.selected_plan = None;
        }
        Ok(existed)
    }

    /// Stop rendering and release every entity subscription
    pub fn teardown(&mut self) {
        self.session.stop();
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.detach_all();
        }
        info!("Editor torn down");
    }
}
