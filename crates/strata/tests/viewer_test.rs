//! Driving built-in samples through the viewer.

use strata::*;

const SIZE: u32 = 32;

fn centre_input() -> ViewportInput {
    ViewportInput {
        size: (SIZE, SIZE),
        mouse: Vec2::splat(SIZE as f32 * 0.5),
        hovered: true,
        focused: true,
        ..ViewportInput::default()
    }
}

fn selected_names(viewer: &Viewer<'_>) -> Vec<String> {
    viewer
        .selection()
        .iter()
        .filter_map(|id| viewer.objects().get_by_id(id))
        .map(|o| o.name.clone())
        .collect()
}

#[test]
fn clicking_the_middle_cube_outlines_it() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut viewer = Viewer::new(&ctx, SIZE, SIZE, Options::default()).unwrap();
    viewer
        .load_sample(&SampleRegistry::builtin(), "picking")
        .unwrap();

    let mut input = centre_input();
    viewer.frame(&input).unwrap();
    let outline = [255, 153, 0, 255];
    assert!(!viewer.capture().unwrap().pixels().any(|p| p.0 == outline));

    input.left_click = true;
    viewer.frame(&input).unwrap();
    assert_eq!(selected_names(&viewer), ["green cube"]);
    assert!(viewer.capture().unwrap().pixels().any(|p| p.0 == outline));

    // Clicking the same spot again keeps a single selection.
    viewer.frame(&input).unwrap();
    assert_eq!(selected_names(&viewer), ["green cube"]);
}

#[test]
fn outline_colour_follows_options() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut viewer = Viewer::new(&ctx, SIZE, SIZE, Options::default()).unwrap();
    viewer
        .load_sample(&SampleRegistry::builtin(), "picking")
        .unwrap();

    let mut options = viewer.options().clone();
    options.outline.color = Vec4::new(1.0, 0.0, 1.0, 1.0);
    viewer.set_options(options).unwrap();

    let mut input = centre_input();
    viewer.frame(&input).unwrap();
    input.left_click = true;
    viewer.frame(&input).unwrap();
    let image = viewer.capture().unwrap();
    assert!(image.pixels().any(|p| p.0 == [255, 0, 255, 255]));
    assert!(!image.pixels().any(|p| p.0 == [255, 153, 0, 255]));
}

#[test]
fn invalid_options_are_rejected() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let options = Options {
        msaa_samples: 3,
        ..Options::default()
    };
    assert!(Viewer::new(&ctx, SIZE, SIZE, options).is_err());
}

struct Recolor {
    seen: Vec<String>,
}

impl Inspector for Recolor {
    fn edit(&mut self, label: &str, _kind: PropertyKind, value: &mut PropertyValue) -> bool {
        self.seen.push(label.to_string());
        if label == "Color" {
            *value = PropertyValue::Color(Vec4::ONE);
            return true;
        }
        false
    }
}

#[test]
fn inspector_reaches_every_material() {
    let ctx = GpuContext::new(SoftwareBackend::new(1, 1));
    let mut viewer = Viewer::new(&ctx, SIZE, SIZE, Options::default()).unwrap();
    let mut inspector = Recolor { seen: Vec::new() };
    assert_eq!(viewer.inspect(&mut inspector).unwrap(), 0);

    viewer
        .load_sample(&SampleRegistry::builtin(), "picking")
        .unwrap();
    assert_eq!(viewer.inspect(&mut inspector).unwrap(), 3);
    assert_eq!(inspector.seen, ["Color", "Color", "Color"]);

    // All three cubes are white now.
    viewer.frame(&centre_input()).unwrap();
    assert_eq!(
        viewer.scene().frame().read_pixel(SIZE / 2, SIZE / 2),
        [255, 255, 255, 255]
    );
}
