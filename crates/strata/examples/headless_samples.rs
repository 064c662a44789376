//! Renders every built-in sample with the software backend and writes one
//! PNG per sample.
//!
//! Run with: cargo run --example headless_samples -- [output-dir] [sample]

use std::path::PathBuf;

use strata::*;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn main() -> Result<()> {
    init();

    let mut args = std::env::args().skip(1);
    let output = PathBuf::from(args.next().unwrap_or_else(|| "target/samples".to_string()));
    let only = args.next();
    std::fs::create_dir_all(&output).map_err(StrataError::from)?;

    let registry = SampleRegistry::builtin();
    let context = GpuContext::new(SoftwareBackend::new(WIDTH, HEIGHT));
    let mut viewer = Viewer::new(&context, WIDTH, HEIGHT, Options::default())?;

    for entry in registry.iter() {
        if only.as_deref().is_some_and(|name| name != entry.name) {
            continue;
        }
        println!("{:<12} {}", entry.name, entry.description);
        viewer.load_sample(&registry, entry.name)?;

        let mut input = ViewportInput {
            size: (WIDTH, HEIGHT),
            mouse: Vec2::new(WIDTH as f32 * 0.5, HEIGHT as f32 * 0.5),
            hovered: true,
            focused: true,
            delta_time: 1.0 / 60.0,
            ..ViewportInput::default()
        };
        // First frame fills the id frame, the second clicks the centre,
        // the third shows the outline.
        viewer.frame(&input)?;
        input.left_click = true;
        viewer.frame(&input)?;
        input.left_click = false;
        let path = output.join(format!("{}.png", entry.name));
        viewer.request_capture(&path);
        viewer.frame(&input)?;

        let selected: Vec<_> = viewer
            .selection()
            .iter()
            .filter_map(|id| viewer.objects().get_by_id(id))
            .map(|o| o.name.as_str())
            .collect();
        println!("  selected {selected:?}, wrote {}", path.display());
    }
    Ok(())
}
