use glam::{Quat, Vec3, Vec4};
use strata_core::{Inspector, SceneController, SceneObject, Transform};
use strata_render::{
    shapes, GlobalParameters, GpuContext, Grid, Material, Mesh, PickTarget, RenderLayer,
    RenderResult, Sky, SolidColor, Specular,
};

use super::{model_of, pick_targets, Sample};

const CUBE: &str = "cube";
const GLASS: &str = "glass";
const GRID: &str = "grid";

/// One object per render layer, drawn in layer order.
pub struct LayersSample<'ctx> {
    fullscreen: Mesh<'ctx>,
    quad: Mesh<'ctx>,
    cube: Mesh<'ctx>,
    sky: Material<'ctx, Sky>,
    grid: Material<'ctx, Grid>,
    solid: Material<'ctx, Specular>,
    glass: Material<'ctx, SolidColor>,
}

impl<'ctx> LayersSample<'ctx> {
    pub fn new(context: &'ctx GpuContext) -> RenderResult<Self> {
        let (fv, fi) = shapes::fullscreen_triangle();
        let (qv, qi) = shapes::quad(1.0);
        let (cv, ci) = shapes::cube(1.0);
        Ok(Self {
            fullscreen: Mesh::with_standard_attributes(context, &fv, &fi)?,
            quad: Mesh::with_standard_attributes(context, &qv, &qi)?,
            cube: Mesh::with_standard_attributes(context, &cv, &ci)?,
            sky: Material::new(context, Sky::default())?,
            grid: Material::new(context, Grid::default())?,
            solid: Material::new(context, Specular::default())?,
            glass: Material::new(
                context,
                SolidColor::with_layer(Vec4::new(0.2, 0.6, 1.0, 0.5), RenderLayer::Transparent),
            )?,
        })
    }
}

pub(super) fn create<'ctx>(context: &'ctx GpuContext) -> RenderResult<Box<dyn Sample<'ctx> + 'ctx>> {
    Ok(Box::new(LayersSample::new(context)?))
}

impl<'ctx> Sample<'ctx> for LayersSample<'ctx> {
    fn setup(&mut self, objects: &mut SceneController) -> strata_core::Result<()> {
        // The grid quad lies in XZ.
        let floor = Transform {
            translation: Vec3::new(0.0, -0.5, 0.0),
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(10.0),
        };
        objects.insert(
            SceneObject::new(GRID)
                .with_transform(floor)
                .with_pickable(false),
        )?;
        objects.insert(SceneObject::new(CUBE))?;
        objects.insert(
            SceneObject::new(GLASS)
                .with_transform(Transform::from_translation(Vec3::new(0.3, 0.0, 0.8))),
        )?;
        Ok(())
    }

    fn render(&self, params: &GlobalParameters, objects: &SceneController) -> RenderResult<()> {
        self.sky.draw(&self.fullscreen, params)?;
        self.grid
            .draw(&self.quad, &params.for_object(model_of(objects, GRID)))?;
        self.solid
            .draw(&self.cube, &params.for_object(model_of(objects, CUBE)))?;
        self.glass
            .draw(&self.quad, &params.for_object(model_of(objects, GLASS)))
    }

    fn pick_targets<'a>(&'a self, objects: &SceneController) -> Vec<PickTarget<'a, 'ctx>> {
        pick_targets(objects, &[(CUBE, &self.cube), (GLASS, &self.quad)])
    }

    fn inspect(&mut self, inspector: &mut dyn Inspector) -> RenderResult<usize> {
        Ok(self.sky.inspect(inspector)?
            + self.grid.inspect(inspector)?
            + self.solid.inspect(inspector)?
            + self.glass.inspect(inspector)?)
    }
}
