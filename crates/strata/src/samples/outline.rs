use glam::Vec3;
use strata_core::{Inspector, SceneController, SceneObject};
use strata_render::{
    shapes, GlobalParameters, GpuContext, Material, Mesh, Outline, PickTarget, RenderResult,
};

use super::{model_of, pick_targets, Sample};

const NAME: &str = "outlined cube";

/// A cube with a shell outline: a fill pipeline plus a front-culled shell.
pub struct OutlineSample<'ctx> {
    cube: Mesh<'ctx>,
    material: Material<'ctx, Outline>,
}

impl<'ctx> OutlineSample<'ctx> {
    pub fn new(context: &'ctx GpuContext) -> RenderResult<Self> {
        let (mut vertices, indices) = shapes::cube(1.0);
        // Radial normals keep the pushed-out shell closed along the edges.
        for vertex in &mut vertices {
            vertex.normal = Vec3::from(vertex.position).normalize().to_array();
        }
        Ok(Self {
            cube: Mesh::with_standard_attributes(context, &vertices, &indices)?,
            material: Material::new(context, Outline::default())?,
        })
    }
}

pub(super) fn create<'ctx>(context: &'ctx GpuContext) -> RenderResult<Box<dyn Sample<'ctx> + 'ctx>> {
    Ok(Box::new(OutlineSample::new(context)?))
}

impl<'ctx> Sample<'ctx> for OutlineSample<'ctx> {
    fn setup(&mut self, objects: &mut SceneController) -> strata_core::Result<()> {
        objects.insert(SceneObject::new(NAME))?;
        Ok(())
    }

    fn render(&self, params: &GlobalParameters, objects: &SceneController) -> RenderResult<()> {
        self.material
            .draw(&self.cube, &params.for_object(model_of(objects, NAME)))
    }

    fn pick_targets<'a>(&'a self, objects: &SceneController) -> Vec<PickTarget<'a, 'ctx>> {
        pick_targets(objects, &[(NAME, &self.cube)])
    }

    fn inspect(&mut self, inspector: &mut dyn Inspector) -> RenderResult<usize> {
        self.material.inspect(inspector)
    }
}
