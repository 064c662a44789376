use glam::{Mat4, Vec3, Vec4};
use strata_core::{Inspector, Options, SceneController, SceneObject};
use strata_render::{
    shapes, GlobalParameters, GpuContext, InstancedSolidColor, Material, Mesh, RenderResult,
};

use super::Sample;

const NAME: &str = "instances";

/// Quads per side of the grid; more than one page at the default size.
pub const GRID_SIDE: usize = 20;

/// A grid of quads sharing one mesh, drawn with paged instancing.
pub struct InstancingSample<'ctx> {
    quad: Mesh<'ctx>,
    material: Material<'ctx, InstancedSolidColor>,
}

impl<'ctx> InstancingSample<'ctx> {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(context: &'ctx GpuContext) -> RenderResult<Self> {
        let (vertices, indices) = shapes::quad(0.08);
        let step = 0.1;
        let origin = -(GRID_SIDE as f32 - 1.0) * step * 0.5;
        let models = (0..GRID_SIDE * GRID_SIDE)
            .map(|i| {
                let (row, col) = (i / GRID_SIDE, i % GRID_SIDE);
                Mat4::from_translation(Vec3::new(
                    origin + col as f32 * step,
                    origin + row as f32 * step,
                    0.0,
                ))
            })
            .collect();
        Ok(Self {
            quad: Mesh::with_standard_attributes(context, &vertices, &indices)?,
            material: Material::new(
                context,
                InstancedSolidColor::new(Vec4::new(1.0, 0.8, 0.2, 1.0), models),
            )?,
        })
    }

    pub fn instance_count(&self) -> usize {
        self.material.core().models.len()
    }

    pub fn material(&self) -> &Material<'ctx, InstancedSolidColor> {
        &self.material
    }
}

pub(super) fn create<'ctx>(context: &'ctx GpuContext) -> RenderResult<Box<dyn Sample<'ctx> + 'ctx>> {
    Ok(Box::new(InstancingSample::new(context)?))
}

impl<'ctx> Sample<'ctx> for InstancingSample<'ctx> {
    fn configure(&mut self, options: &Options) {
        self.material.set_instance_page_size(options.instance_page_size);
    }

    fn setup(&mut self, objects: &mut SceneController) -> strata_core::Result<()> {
        objects.insert(SceneObject::new(NAME).with_pickable(false))?;
        Ok(())
    }

    fn render(&self, params: &GlobalParameters, _objects: &SceneController) -> RenderResult<()> {
        // Instance matrices are world transforms.
        self.material.draw(&self.quad, params)
    }

    fn inspect(&mut self, inspector: &mut dyn Inspector) -> RenderResult<usize> {
        self.material.inspect(inspector)
    }
}
