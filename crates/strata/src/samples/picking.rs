use glam::{Quat, Vec3, Vec4};
use strata_core::{Inspector, SceneController, SceneObject, Transform};
use strata_render::{
    shapes, GlobalParameters, GpuContext, Material, Mesh, PickTarget, RenderResult, SceneData,
    SolidColor,
};

use super::{model_of, pick_targets, Sample};

/// Names and colours of the cubes, left to right.
const CUBES: [(&str, Vec4); 3] = [
    ("red cube", Vec4::new(0.9, 0.2, 0.2, 1.0)),
    ("green cube", Vec4::new(0.2, 0.8, 0.3, 1.0)),
    ("blue cube", Vec4::new(0.2, 0.4, 0.9, 1.0)),
];

/// Radians per second the middle cube turns.
const SPIN: f32 = 0.5;

/// Three separated cubes to click on.
pub struct PickingSample<'ctx> {
    cube: Mesh<'ctx>,
    materials: Vec<Material<'ctx, SolidColor>>,
}

impl<'ctx> PickingSample<'ctx> {
    pub fn new(context: &'ctx GpuContext) -> RenderResult<Self> {
        let (vertices, indices) = shapes::cube(0.8);
        let materials = CUBES
            .iter()
            .map(|&(_, color)| Material::new(context, SolidColor::new(color)))
            .collect::<RenderResult<Vec<_>>>()?;
        Ok(Self {
            cube: Mesh::with_standard_attributes(context, &vertices, &indices)?,
            materials,
        })
    }
}

pub(super) fn create<'ctx>(context: &'ctx GpuContext) -> RenderResult<Box<dyn Sample<'ctx> + 'ctx>> {
    Ok(Box::new(PickingSample::new(context)?))
}

impl<'ctx> Sample<'ctx> for PickingSample<'ctx> {
    #[allow(clippy::cast_precision_loss)]
    fn setup(&mut self, objects: &mut SceneController) -> strata_core::Result<()> {
        for (i, (name, _)) in CUBES.iter().enumerate() {
            let x = (i as f32 - 1.0) * 1.5;
            objects.insert(
                SceneObject::new(*name).with_transform(Transform::from_translation(Vec3::new(x, 0.0, 0.0))),
            )?;
        }
        Ok(())
    }

    fn update(&mut self, scene: &SceneData, objects: &mut SceneController) {
        if let Some(transform) = objects.transform_mut(CUBES[1].0) {
            transform.rotation = Quat::from_rotation_y(SPIN * scene.delta_time) * transform.rotation;
        }
    }

    fn render(&self, params: &GlobalParameters, objects: &SceneController) -> RenderResult<()> {
        for ((name, _), material) in CUBES.iter().zip(&self.materials) {
            material.draw(&self.cube, &params.for_object(model_of(objects, name)))?;
        }
        Ok(())
    }

    fn pick_targets<'a>(&'a self, objects: &SceneController) -> Vec<PickTarget<'a, 'ctx>> {
        let meshes = CUBES.map(|(name, _)| (name, &self.cube));
        pick_targets(objects, &meshes)
    }

    fn inspect(&mut self, inspector: &mut dyn Inspector) -> RenderResult<usize> {
        let mut changed = 0;
        for material in &mut self.materials {
            changed += material.inspect(inspector)?;
        }
        Ok(changed)
    }
}
