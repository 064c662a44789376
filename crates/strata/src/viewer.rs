//! The per-frame driver tying a scene, picking and a sample together.

use std::path::PathBuf;

use image::RgbaImage;
use strata_core::{Inspector, Options, SceneController, Selection};
use strata_render::{
    capture, GpuContext, PickupController, RenderResult, Scene, ViewportInput,
};

use crate::error::Result;
use crate::samples::{Sample, SampleRegistry};

struct ActiveSample<'ctx> {
    name: String,
    sample: Box<dyn Sample<'ctx> + 'ctx>,
}

/// Owns one viewport and everything drawn into it.
///
/// Call [`frame`](Self::frame) once per host frame with that frame's input.
pub struct Viewer<'ctx> {
    context: &'ctx GpuContext,
    options: Options,
    scene: Scene<'ctx>,
    pickup: PickupController<'ctx>,
    objects: SceneController,
    selection: Selection,
    active: Option<ActiveSample<'ctx>>,
    pending_capture: Option<PathBuf>,
}

impl<'ctx> Viewer<'ctx> {
    pub fn new(context: &'ctx GpuContext, width: u32, height: u32, options: Options) -> Result<Self> {
        options.validate()?;
        let scene = Scene::with_options(context, width, height, &options)?;
        let pickup = PickupController::new(context, width, height, &options)?;
        log::info!(
            "viewer created: {width}x{height} on {}",
            context.backend_name()
        );
        Ok(Self {
            context,
            options,
            scene,
            pickup,
            objects: SceneController::new(),
            selection: Selection::new(),
            active: None,
            pending_capture: None,
        })
    }

    /// Replaces the running sample with the named one from `registry`.
    pub fn load_sample(&mut self, registry: &SampleRegistry, name: &str) -> Result<()> {
        let sample = registry.create(name, self.context)?;
        self.set_sample(name, sample)
    }

    /// Replaces the running sample. Clears the objects and the selection
    /// before the new sample registers its own.
    pub fn set_sample(&mut self, name: &str, mut sample: Box<dyn Sample<'ctx> + 'ctx>) -> Result<()> {
        self.active = None;
        self.objects.clear();
        self.selection.clear();
        sample.configure(&self.options);
        sample.setup(&mut self.objects)?;
        log::info!("running sample '{name}' with {} objects", self.objects.len());
        self.active = Some(ActiveSample {
            name: name.to_string(),
            sample,
        });
        Ok(())
    }

    /// Runs one frame: update, draw, picking passes, outline, capture.
    ///
    /// A click is resolved against the id frame of the previous call.
    pub fn frame(&mut self, input: &ViewportInput) -> Result<()> {
        self.scene.update(input)?;
        if self.scene.is_closed() {
            return Ok(());
        }
        self.pickup
            .update(&self.scene, input, &self.objects, &mut self.selection)?;

        let params = self.scene.parameters();
        let scope = self.scene.begin();
        if let Some(active) = self.active.as_mut() {
            active.sample.update(self.scene.data(), &mut self.objects);
            active.sample.render(&params, &self.objects)?;
            let targets = active.sample.pick_targets(&self.objects);
            self.pickup.render(&params, &targets, &self.selection)?;
        }
        self.scene.end(scope);
        self.pickup.post_effects(&self.scene, &params)?;

        if let Some(path) = self.pending_capture.take() {
            capture::save_frame(self.scene.frame(), path)?;
        }
        Ok(())
    }

    /// Lets `inspector` edit the running sample's materials.
    pub fn inspect(&mut self, inspector: &mut dyn Inspector) -> RenderResult<usize> {
        match self.active.as_mut() {
            Some(active) => active.sample.inspect(inspector),
            None => Ok(0),
        }
    }

    /// Validates and applies new options. MSAA only affects new viewers.
    pub fn set_options(&mut self, options: Options) -> Result<()> {
        options.validate()?;
        self.pickup.apply_options(&options);
        self.scene.set_background_color(options.background_color);
        if let Some(active) = self.active.as_mut() {
            active.sample.configure(&options);
        }
        self.options = options;
        Ok(())
    }

    /// Saves the scene frame to `path` at the end of the next frame.
    pub fn request_capture(&mut self, path: impl Into<PathBuf>) {
        self.pending_capture = Some(path.into());
    }

    /// Reads the scene frame back now.
    pub fn capture(&self) -> Result<RgbaImage> {
        Ok(capture::frame_to_image(self.scene.frame())?)
    }

    pub fn sample_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn scene(&self) -> &Scene<'ctx> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene<'ctx> {
        &mut self.scene
    }

    pub fn pickup(&self) -> &PickupController<'ctx> {
        &self.pickup
    }

    pub fn objects(&self) -> &SceneController {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut SceneController {
        &mut self.objects
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }
}
