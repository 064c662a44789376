//! Picking through the colour-id frame, and selection semantics of clicks.

use strata::*;

const WIDTH: u32 = 8;
const HEIGHT: u32 = 3;

/// Four unit quads in a row, each covering one pixel column of the middle
/// row: quad `i` sits under column `i + 2`.
struct Row<'ctx> {
    scene: Scene<'ctx>,
    pickup: PickupController<'ctx>,
    objects: SceneController,
    quad: Mesh<'ctx>,
    ids: Vec<ObjectId>,
}

impl<'ctx> Row<'ctx> {
    fn new(ctx: &'ctx GpuContext) -> Self {
        let mut scene = Scene::new(ctx, WIDTH, HEIGHT).unwrap();
        let mut camera = Camera::orthographic(Vec3::new(0.0, 0.0, 2.0), 1.5, 8.0 / 3.0);
        camera.near = 0.5;
        camera.far = 10.0;
        *scene.camera_mut() = camera;

        let mut objects = SceneController::new();
        let ids = (0..4u8)
            .map(|i| {
                let x = -1.5 + f32::from(i);
                objects
                    .insert(
                        SceneObject::new(format!("quad {i}"))
                            .with_id(ObjectId(u128::from(i) + 1))
                            .with_transform(Transform::from_translation(Vec3::new(x, 0.0, 0.0))),
                    )
                    .unwrap()
            })
            .collect();
        let (v, i) = shapes::quad(1.0);
        Self {
            scene,
            pickup: PickupController::new(ctx, WIDTH, HEIGHT, &Options::default()).unwrap(),
            objects,
            quad: Mesh::with_standard_attributes(ctx, &v, &i).unwrap(),
            ids,
        }
    }

    fn render_ids(&mut self, selection: &Selection) {
        let targets: Vec<_> = self
            .objects
            .pickable()
            .map(|o| PickTarget {
                id: o.id,
                mesh: &self.quad,
                model: o.model_matrix(),
            })
            .collect();
        self.pickup
            .render(&self.scene.parameters(), &targets, selection)
            .unwrap();
    }

    /// Clicks at a top-left pixel position.
    fn click(&mut self, column: u32, row: u32, ctrl: bool, selection: &mut Selection) -> bool {
        let input = ViewportInput {
            size: (WIDTH, HEIGHT),
            mouse: Vec2::new(column as f32 + 0.5, row as f32 + 0.5),
            focused: true,
            left_click: true,
            ctrl,
            ..ViewportInput::default()
        };
        self.scene.update(&input).unwrap();
        self.pickup
            .update(&self.scene, &input, &self.objects, selection)
            .unwrap()
    }
}

fn selected(selection: &Selection) -> Vec<ObjectId> {
    let mut ids: Vec<_> = selection.iter().collect();
    ids.sort();
    ids
}

#[test]
fn every_object_resolves_from_its_centre() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut row = Row::new(&ctx);
    let mut selection = Selection::new();
    row.render_ids(&selection);

    for (i, id) in row.ids.clone().into_iter().enumerate() {
        let column = u32::try_from(i).unwrap() + 2;
        let pixel = row.pickup.color_id_frame().read_pixel(column, 1);
        assert_eq!(ColorId(pixel), id.color_id());
        row.click(column, 1, false, &mut selection);
        assert_eq!(selected(&selection), [id]);
        assert_eq!(row.pickup.last_hit(), Some(id));
    }
}

#[test]
fn ctrl_click_toggles_and_plain_click_replaces() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut row = Row::new(&ctx);
    let (a, b, c) = (row.ids[0], row.ids[1], row.ids[2]);
    let mut selection = Selection::new();
    row.render_ids(&selection);

    row.click(2, 1, false, &mut selection);
    assert_eq!(selected(&selection), [a]);
    row.click(3, 1, true, &mut selection);
    assert_eq!(selected(&selection), [a, b]);
    row.click(2, 1, true, &mut selection);
    assert_eq!(selected(&selection), [b]);
    row.click(4, 1, false, &mut selection);
    assert_eq!(selected(&selection), [c]);

    // Background: ctrl keeps the selection, a plain click clears it.
    assert!(!row.click(0, 0, true, &mut selection));
    assert_eq!(selected(&selection), [c]);
    assert!(row.click(0, 0, false, &mut selection));
    assert!(selection.is_empty());
}

#[test]
fn mask_frame_holds_only_the_selection() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut row = Row::new(&ctx);
    let mut selection = Selection::new();
    selection.insert(row.ids[1]);
    row.render_ids(&selection);

    let mask = row.pickup.mask_frame();
    assert_eq!(mask.read_pixel(3, 1), [255, 255, 255, 255]);
    assert_eq!(mask.read_pixel(2, 1), [0, 0, 0, 0]);
    assert_eq!(mask.read_pixel(4, 1), [0, 0, 0, 0]);
}

#[test]
fn back_facing_objects_are_pickable() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut row = Row::new(&ctx);
    let id = row.ids[2];
    let name = row.objects.get_by_id(id).unwrap().name.clone();
    let turned = Transform {
        rotation: Quat::from_rotation_y(std::f32::consts::PI),
        ..*row.objects.transform(&name).unwrap()
    };
    row.objects.set_transform(&name, turned).unwrap();

    let mut selection = Selection::new();
    row.render_ids(&selection);
    let pixel = row.pickup.color_id_frame().read_pixel(4, 1);
    assert_eq!(ColorId(pixel), id.color_id());
    row.click(4, 1, false, &mut selection);
    assert_eq!(selected(&selection), [id]);

    row.render_ids(&selection);
    assert_eq!(row.pickup.mask_frame().read_pixel(4, 1), [255, 255, 255, 255]);
}

#[test]
fn unfocused_or_captured_clicks_are_ignored() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut row = Row::new(&ctx);
    let mut selection = Selection::new();
    row.render_ids(&selection);

    let mut input = ViewportInput {
        size: (WIDTH, HEIGHT),
        mouse: Vec2::new(2.5, 1.5),
        focused: false,
        left_click: true,
        ..ViewportInput::default()
    };
    row.scene.update(&input).unwrap();
    assert!(!row
        .pickup
        .update(&row.scene, &input, &row.objects, &mut selection)
        .unwrap());
    input.focused = true;
    input.input_captured = true;
    row.scene.update(&input).unwrap();
    assert!(!row
        .pickup
        .update(&row.scene, &input, &row.objects, &mut selection)
        .unwrap());
    assert!(selection.is_empty());
}
