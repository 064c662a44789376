use glam::Vec3;
use strata_core::{Inspector, SceneController, SceneObject};
use strata_render::{
    shapes, GlobalParameters, GpuContext, Material, Mesh, PickTarget, RenderLayer, RenderResult,
    VertexColor,
};

use super::{model_of, pick_targets, Sample};

const NAME: &str = "triangle";

/// One triangle with red, green and blue corners.
pub struct TriangleSample<'ctx> {
    mesh: Mesh<'ctx>,
    material: Material<'ctx, VertexColor>,
}

impl<'ctx> TriangleSample<'ctx> {
    pub fn new(context: &'ctx GpuContext) -> RenderResult<Self> {
        let (mut vertices, indices) = shapes::triangle(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let corners = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];
        for (vertex, color) in vertices.iter_mut().zip(corners) {
            vertex.color = color;
        }
        Ok(Self {
            mesh: Mesh::with_standard_attributes(context, &vertices, &indices)?,
            material: Material::new(context, VertexColor::new(RenderLayer::Geometry))?,
        })
    }
}

pub(super) fn create<'ctx>(context: &'ctx GpuContext) -> RenderResult<Box<dyn Sample<'ctx> + 'ctx>> {
    Ok(Box::new(TriangleSample::new(context)?))
}

impl<'ctx> Sample<'ctx> for TriangleSample<'ctx> {
    fn setup(&mut self, objects: &mut SceneController) -> strata_core::Result<()> {
        objects.insert(SceneObject::new(NAME))?;
        Ok(())
    }

    fn render(&self, params: &GlobalParameters, objects: &SceneController) -> RenderResult<()> {
        self.material
            .draw(&self.mesh, &params.for_object(model_of(objects, NAME)))
    }

    fn pick_targets<'a>(&'a self, objects: &SceneController) -> Vec<PickTarget<'a, 'ctx>> {
        pick_targets(objects, &[(NAME, &self.mesh)])
    }

    fn inspect(&mut self, inspector: &mut dyn Inspector) -> RenderResult<usize> {
        self.material.inspect(inspector)
    }
}
