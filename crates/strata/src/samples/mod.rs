//! Built-in samples and the registry that lists them.
//!
//! The registry is an explicit static table. A sample is created from its
//! entry's factory once a GPU context exists, then registers its objects with
//! the viewer's [`SceneController`].

mod instancing;
mod layers;
mod outline;
mod picking;
mod triangle;

use strata_core::{Inspector, Options, SceneController};
use strata_render::{GlobalParameters, GpuContext, Mesh, PickTarget, RenderResult, SceneData};

use crate::error::{Error, Result};

pub use instancing::InstancingSample;
pub use layers::LayersSample;
pub use outline::OutlineSample;
pub use picking::PickingSample;
pub use triangle::TriangleSample;

/// A self-contained scene the viewer can run.
pub trait Sample<'ctx> {
    /// Picks up viewer options. Called before `setup` and whenever the
    /// options change.
    fn configure(&mut self, _options: &Options) {}

    /// Registers this sample's objects.
    fn setup(&mut self, objects: &mut SceneController) -> strata_core::Result<()>;

    /// Per-frame logic before drawing.
    fn update(&mut self, _scene: &SceneData, _objects: &mut SceneController) {}

    /// Draws into the bound scene frame.
    fn render(&self, params: &GlobalParameters, objects: &SceneController) -> RenderResult<()>;

    /// Geometry for every pickable object.
    fn pick_targets<'a>(&'a self, _objects: &SceneController) -> Vec<PickTarget<'a, 'ctx>> {
        Vec::new()
    }

    /// Hands the sample's editable properties to `inspector`. Returns how
    /// many changed.
    fn inspect(&mut self, _inspector: &mut dyn Inspector) -> RenderResult<usize> {
        Ok(0)
    }
}

/// Creates a sample against a context.
pub type SampleFactory = for<'ctx> fn(&'ctx GpuContext) -> RenderResult<Box<dyn Sample<'ctx> + 'ctx>>;

/// One row of the registry.
#[derive(Clone, Copy)]
pub struct SampleEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: SampleFactory,
}

impl std::fmt::Debug for SampleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

const BUILTIN: &[SampleEntry] = &[
    SampleEntry {
        name: "triangle",
        description: "A single vertex-coloured triangle",
        factory: triangle::create,
    },
    SampleEntry {
        name: "layers",
        description: "Sky, grid, opaque and transparent geometry in one frame",
        factory: layers::create,
    },
    SampleEntry {
        name: "picking",
        description: "Click objects to select them; ctrl-click toggles",
        factory: picking::create,
    },
    SampleEntry {
        name: "instancing",
        description: "Hundreds of quads drawn in instance pages",
        factory: instancing::create,
    },
    SampleEntry {
        name: "outline",
        description: "Two-pass shell outline around a cube",
        factory: outline::create,
    },
];

/// An ordered list of samples.
#[derive(Debug, Clone, Default)]
pub struct SampleRegistry {
    entries: Vec<SampleEntry>,
}

impl SampleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The samples shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.to_vec(),
        }
    }

    /// Adds an entry. Returns an error if the name is taken.
    pub fn register(&mut self, entry: SampleEntry) -> Result<()> {
        if self.get(entry.name).is_some() {
            return Err(Error::DuplicateSample(entry.name.to_string()));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SampleEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the factory of the named sample.
    pub fn create<'ctx>(
        &self,
        name: &str,
        context: &'ctx GpuContext,
    ) -> Result<Box<dyn Sample<'ctx> + 'ctx>> {
        let entry = self
            .get(name)
            .ok_or_else(|| Error::UnknownSample(name.to_string()))?;
        log::debug!("creating sample '{}'", entry.name);
        Ok((entry.factory)(context)?)
    }
}

/// Model matrix of a registered object, identity when it is missing.
fn model_of(objects: &SceneController, name: &str) -> glam::Mat4 {
    objects
        .get(name)
        .map_or(glam::Mat4::IDENTITY, strata_core::SceneObject::model_matrix)
}

/// Pick targets for the named objects that are registered and pickable.
fn pick_targets<'a, 'ctx>(
    objects: &SceneController,
    meshes: &[(&str, &'a Mesh<'ctx>)],
) -> Vec<PickTarget<'a, 'ctx>> {
    meshes
        .iter()
        .filter_map(|&(name, mesh)| {
            let object = objects.get(name).filter(|o| o.pickable)?;
            Some(PickTarget {
                id: object.id,
                mesh,
                model: object.model_matrix(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use strata_render::SoftwareBackend;

    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = SampleRegistry::builtin();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["triangle", "layers", "picking", "instancing", "outline"]);
        assert!(registry.iter().all(|e| !e.description.is_empty()));
    }

    #[test]
    fn test_every_builtin_sets_up() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let registry = SampleRegistry::builtin();
        for name in registry.names() {
            let mut sample = registry.create(name, &ctx).unwrap();
            let mut objects = SceneController::new();
            sample.setup(&mut objects).unwrap();
            assert!(!objects.is_empty(), "{name} registered nothing");
        }
    }

    #[test]
    fn test_unknown_and_duplicate() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let mut registry = SampleRegistry::builtin();
        assert!(matches!(
            registry.create("teapot", &ctx),
            Err(Error::UnknownSample(_))
        ));
        let entry = *registry.get("triangle").unwrap();
        assert!(matches!(
            registry.register(entry),
            Err(Error::DuplicateSample(_))
        ));
    }
}
