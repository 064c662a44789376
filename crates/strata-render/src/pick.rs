//! Colour-coded object picking and the selection outline.
//!
//! Every pickable object is drawn into an id frame with the flat colour of
//! its [`ColorId`]. A click reads the pixel under the cursor back and matches
//! it against the live objects. Selected objects are drawn a second time into
//! a mask frame, which an edge-detection pass turns into an outline over the
//! scene.

use glam::{Mat4, Vec4};
use strata_core::{ClickMode, ColorId, ObjectId, Options, SceneController, Selection};

use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::frame::Frame;
use crate::material::{GlobalParameters, Material};
use crate::materials::{EdgeDetection, SolidColor};
use crate::mesh::{shapes, Mesh};
use crate::scene::{Scene, ViewportInput};
use crate::state::RenderLayer;

/// Id and mask draws keep both faces so open and double-sided meshes stay
/// pickable from behind.
fn flat(color: Vec4) -> SolidColor {
    SolidColor::with_layer(color, RenderLayer::Geometry)
}

/// One object as the picking passes see it.
pub struct PickTarget<'a, 'ctx> {
    pub id: ObjectId,
    pub mesh: &'a Mesh<'ctx>,
    pub model: Mat4,
}

/// Owns the id and mask frames and resolves clicks to selection changes.
pub struct PickupController<'ctx> {
    color_id_frame: Frame<'ctx>,
    mask_frame: Frame<'ctx>,
    id_material: Material<'ctx, SolidColor>,
    mask_material: Material<'ctx, SolidColor>,
    outline: Material<'ctx, EdgeDetection>,
    fullscreen: Mesh<'ctx>,
    last_hit: Option<ObjectId>,
}

impl<'ctx> PickupController<'ctx> {
    pub fn new(context: &'ctx GpuContext, width: u32, height: u32, options: &Options) -> RenderResult<Self> {
        let (vertices, indices) = shapes::fullscreen_triangle();
        Ok(Self {
            color_id_frame: Frame::new(context, width, height)?,
            mask_frame: Frame::new(context, width, height)?,
            id_material: Material::new(context, flat(Vec4::ZERO))?,
            mask_material: Material::new(context, flat(options.selection_mask_color))?,
            outline: Material::new(context, EdgeDetection::from(&options.outline))?,
            fullscreen: Mesh::with_standard_attributes(context, &vertices, &indices)?,
            last_hit: None,
        })
    }

    /// Picks up changed outline and mask colours.
    pub fn apply_options(&mut self, options: &Options) {
        *self.outline.core_mut() = EdgeDetection::from(&options.outline);
        self.mask_material.core_mut().color = options.selection_mask_color;
    }

    /// Tracks the scene size and resolves this frame's click, if any.
    ///
    /// Reads back the id frame rendered last frame. A miss is not an error: a
    /// plain click clears the selection and a ctrl-click leaves it alone.
    /// Returns whether the selection changed.
    pub fn update(
        &mut self,
        scene: &Scene<'_>,
        input: &ViewportInput,
        objects: &SceneController,
        selection: &mut Selection,
    ) -> RenderResult<bool> {
        let (width, height) = scene.size();
        self.color_id_frame.resize(width, height)?;
        self.mask_frame.resize(width, height)?;

        if !scene.is_focused() || !input.is_pick_click() {
            return Ok(false);
        }
        let Some((x, y)) = to_framebuffer(input, (width, height)) else {
            return Ok(false);
        };
        let pixel = ColorId(self.color_id_frame.read_pixel(x, y));
        let hit = objects
            .pickable()
            .find(|o| o.color_id() == pixel)
            .map(|o| o.id);
        match hit {
            Some(id) => log::debug!("picked {id} at ({x}, {y})"),
            None => log::trace!("pick at ({x}, {y}) hit nothing"),
        }
        self.last_hit = hit;
        Ok(selection.apply_click(hit, ClickMode::from_ctrl(input.ctrl)))
    }

    /// Draws every target into the id frame and the selected ones into the
    /// mask frame.
    pub fn render(
        &mut self,
        params: &GlobalParameters,
        targets: &[PickTarget<'_, 'ctx>],
        selection: &Selection,
    ) -> RenderResult<()> {
        {
            let scope = self.color_id_frame.begin();
            scope.clear([0.0; 4]);
            for target in targets {
                self.id_material.core_mut().color = target.id.color_id().to_vec4();
                self.id_material
                    .draw(target.mesh, &params.for_object(target.model))?;
            }
        }
        {
            let scope = self.mask_frame.begin();
            scope.clear([0.0; 4]);
            for target in targets.iter().filter(|t| selection.contains(t.id)) {
                self.mask_material
                    .draw(target.mesh, &params.for_object(target.model))?;
            }
        }
        Ok(())
    }

    /// Composites the selection outline over the scene frame.
    pub fn post_effects(&mut self, scene: &Scene<'_>, params: &GlobalParameters) -> RenderResult<()> {
        // Resizing replaces the mask texture, so rebind it every frame.
        self.outline.set_channel(0, self.mask_frame.color_texture())?;
        let _scope = scene.frame().begin();
        self.outline.draw(&self.fullscreen, params)
    }

    /// The object hit by the last resolved click.
    #[must_use]
    pub fn last_hit(&self) -> Option<ObjectId> {
        self.last_hit
    }

    #[must_use]
    pub fn color_id_frame(&self) -> &Frame<'ctx> {
        &self.color_id_frame
    }

    #[must_use]
    pub fn mask_frame(&self) -> &Frame<'ctx> {
        &self.mask_frame
    }

    pub fn outline_mut(&mut self) -> &mut Material<'ctx, EdgeDetection> {
        &mut self.outline
    }
}

/// Converts a top-left mouse position to bottom-left framebuffer pixels.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_framebuffer(input: &ViewportInput, size: (u32, u32)) -> Option<(u32, u32)> {
    if !input.mouse_inside() {
        return None;
    }
    let x = input.mouse.x.floor() as u32;
    let y = input.mouse.y.floor() as u32;
    if x >= size.0 || y >= size.1 {
        return None;
    }
    Some((x, size.1 - 1 - y))
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};
    use strata_core::SceneObject;

    use super::*;
    use crate::mesh::Vertex;
    use crate::software::SoftwareBackend;

    #[test]
    fn test_mouse_flip() {
        let input = ViewportInput {
            size: (4, 3),
            mouse: Vec2::new(1.5, 0.2),
            ..ViewportInput::default()
        };
        assert_eq!(to_framebuffer(&input, (4, 3)), Some((1, 2)));
        let outside = ViewportInput {
            mouse: Vec2::new(4.0, 0.0),
            ..input
        };
        assert_eq!(to_framebuffer(&outside, (4, 3)), None);
    }

    #[test]
    fn test_click_selects_then_background_clears() {
        let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
        let mut scene = Scene::new(&ctx, 2, 1).unwrap();
        *scene.camera_mut() = crate::camera::Camera::orthographic(Vec3::new(0.0, 0.0, 2.0), 0.5, 2.0);
        let mut pickup = PickupController::new(&ctx, 2, 1, &Options::default()).unwrap();

        let (v, i) = shapes::quad(1.0);
        let quad = Mesh::<Vertex>::with_standard_attributes(&ctx, &v, &i).unwrap();
        let mut objects = SceneController::new();
        let id = objects
            .insert(SceneObject::new("left").with_id(ObjectId(0x0102_0304)))
            .unwrap();
        let model = Mat4::from_translation(Vec3::new(-0.5, 0.0, 0.0));
        let targets = [PickTarget { id, mesh: &quad, model }];

        let mut selection = Selection::new();
        pickup.render(&scene.parameters(), &targets, &selection).unwrap();

        let mut input = ViewportInput {
            size: (2, 1),
            mouse: Vec2::new(0.5, 0.5),
            focused: true,
            left_click: true,
            ..ViewportInput::default()
        };
        scene.update(&input).unwrap();
        assert!(pickup.update(&scene, &input, &objects, &mut selection).unwrap());
        assert!(selection.contains(id));
        assert_eq!(pickup.last_hit(), Some(id));

        input.mouse = Vec2::new(1.5, 0.5);
        assert!(pickup.update(&scene, &input, &objects, &mut selection).unwrap());
        assert!(selection.is_empty());
    }
}
