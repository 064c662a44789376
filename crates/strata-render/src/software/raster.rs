//! Triangle rasterization for the reference backend.
//!
//! Clip space is right-handed with z in `[0, w]`, so window depth is the
//! normalized z unchanged, as on wgpu. The framebuffer origin is bottom-left
//! and pixel centres sit at half-integer coordinates.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::program::{FragmentMode, ReferenceProgram, VertexMode};
use crate::backend::TextureFormat;
use crate::material::{TransformBlock, CHANNEL_TILING_SLOT, TEXTURE_CHANNEL_UNIT_START};
use crate::state::{BlendEquation, BlendFactor, Face, RenderState, Winding};

const DEPTH_EPSILON: f32 = 1e-5;

/// Index value that restarts primitive assembly when primitive restart is on.
pub(crate) const PRIMITIVE_RESTART_INDEX: u32 = u32::MAX;

/// CPU storage behind one texture.
#[derive(Debug, Clone)]
pub(crate) struct Surface {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// RGBA8, rows bottom-up. Empty for depth textures.
    pub color: Vec<u8>,
    /// Window-space depth. Empty for colour textures.
    pub depth: Vec<f32>,
    pub stencil: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        let texels = width as usize * height as usize;
        match format {
            TextureFormat::Rgba8 => Self {
                width,
                height,
                format,
                color: vec![0; texels * 4],
                depth: Vec::new(),
                stencil: Vec::new(),
            },
            TextureFormat::Depth24Stencil8 => Self {
                width,
                height,
                format,
                color: Vec::new(),
                depth: vec![1.0; texels],
                stencil: vec![0; texels],
            },
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn texel(&self, x: u32, y: u32) -> Vec4 {
        let i = self.index(x, y) * 4;
        match self.color.get(i..i + 4) {
            Some(px) => Vec4::new(
                f32::from(px[0]),
                f32::from(px[1]),
                f32::from(px[2]),
                f32::from(px[3]),
            ) / 255.0,
            None => Vec4::ZERO,
        }
    }

    /// Nearest-texel lookup with repeat wrapping; `uv` origin bottom-left.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 || self.color.is_empty() {
            return Vec4::ZERO;
        }
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.texel(x, y)
    }

    fn write_color(&mut self, x: u32, y: u32, c: Vec4) {
        let i = self.index(x, y) * 4;
        if let Some(px) = self.color.get_mut(i..i + 4) {
            for (dst, v) in px.iter_mut().zip(c.to_array()) {
                *dst = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
    }
}

/// One fetched vertex.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VertexInput {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec4,
    pub uv: Vec2,
}

/// Uniform data the reference routines read, resolved before rasterizing.
pub(crate) struct Uniforms<'a> {
    pub transform: Option<TransformBlock>,
    pub instances: Vec<Mat4>,
    pub lookup: &'a dyn Fn(u32) -> Option<&'a [u8]>,
    pub texture: &'a dyn Fn(u32) -> Option<&'a Surface>,
}

impl Uniforms<'_> {
    fn vec4(&self, slot: u32, offset: usize) -> Vec4 {
        (self.lookup)(slot)
            .and_then(|bytes| bytes.get(offset..offset + 16))
            .map_or(Vec4::ZERO, |b| {
                Vec4::from_array(bytemuck::pod_read_unaligned::<[f32; 4]>(b))
            })
    }

    fn float(&self, slot: u32, offset: usize) -> f32 {
        (self.lookup)(slot)
            .and_then(|bytes| bytes.get(offset..offset + 4))
            .map_or(0.0, bytemuck::pod_read_unaligned::<f32>)
    }
}

/// Viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Render targets for one draw.
pub(crate) struct Targets<'a> {
    pub color: &'a mut Surface,
    pub depth: Option<&'a mut Surface>,
}

#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    clip: Vec4,
    color: Vec4,
    uv: Vec2,
}

fn to_clip(program: &ReferenceProgram, v: &VertexInput, uniforms: &Uniforms, instance: u32) -> Option<Vec4> {
    let p = v.position.extend(1.0);
    let transform = uniforms.transform.unwrap_or_else(TransformBlock::identity);
    match program.vertex {
        VertexMode::Transform => Some(Mat4::from_cols_array_2d(&transform.object_to_clip) * p),
        VertexMode::Fullscreen => Some(p),
        VertexMode::Background => Some(Vec4::new(p.x, p.y, 1.0, 1.0)),
        VertexMode::Instanced => {
            let model = uniforms.instances.get(instance as usize)?;
            let view = Mat4::from_cols_array_2d(&transform.view);
            let projection = Mat4::from_cols_array_2d(&transform.projection);
            Some(projection * view * *model * p)
        }
        VertexMode::Shell { slot } => {
            let width = uniforms.float(slot, 16);
            let pushed = v.position + v.normal.normalize_or_zero() * width;
            Some(Mat4::from_cols_array_2d(&transform.object_to_clip) * pushed.extend(1.0))
        }
    }
}

fn factor(f: BlendFactor, src: Vec4, dst: Vec4) -> Vec4 {
    match f {
        BlendFactor::Zero => Vec4::ZERO,
        BlendFactor::One => Vec4::ONE,
        BlendFactor::SrcColor => src,
        BlendFactor::OneMinusSrcColor => Vec4::ONE - src,
        BlendFactor::DstColor => dst,
        BlendFactor::OneMinusDstColor => Vec4::ONE - dst,
        BlendFactor::SrcAlpha => Vec4::splat(src.w),
        BlendFactor::OneMinusSrcAlpha => Vec4::splat(1.0 - src.w),
        BlendFactor::DstAlpha => Vec4::splat(dst.w),
        BlendFactor::OneMinusDstAlpha => Vec4::splat(1.0 - dst.w),
    }
}

fn combine(eq: BlendEquation, s: f32, d: f32, src: f32, dst: f32) -> f32 {
    match eq {
        BlendEquation::Add => s + d,
        BlendEquation::Subtract => s - d,
        BlendEquation::ReverseSubtract => d - s,
        BlendEquation::Min => src.min(dst),
        BlendEquation::Max => src.max(dst),
    }
}

pub(crate) fn blend(state: &RenderState, src: Vec4, dst: Vec4) -> Vec4 {
    let s = src * factor(state.blend_src, src, dst);
    let d = dst * factor(state.blend_dst, src, dst);
    Vec4::new(
        combine(state.blend_equation_color, s.x, d.x, src.x, dst.x),
        combine(state.blend_equation_color, s.y, d.y, src.y, dst.y),
        combine(state.blend_equation_color, s.z, d.z, src.z, dst.z),
        combine(state.blend_equation_alpha, s.w, d.w, src.w, dst.w),
    )
}

fn edge_detect(uniforms: &Uniforms, slot: u32, unit: u32, px: u32, py: u32, target: (u32, u32)) -> Option<Vec4> {
    let mask = (uniforms.texture)(unit)?;
    if mask.width == 0 || mask.height == 0 {
        return None;
    }
    // Map the target pixel onto the mask in case the sizes differ.
    let mx = ((px as f32 + 0.5) / target.0 as f32 * mask.width as f32) as i64;
    let my = ((py as f32 + 0.5) / target.1 as f32 * mask.height as f32) as i64;
    let covered = |x: i64, y: i64| {
        x >= 0
            && y >= 0
            && x < i64::from(mask.width)
            && y < i64::from(mask.height)
            && mask.texel(x as u32, y as u32).w > 0.0
    };
    if covered(mx, my) {
        return None;
    }
    let radius = uniforms.float(slot, 16).max(1.0).round() as i64;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius && covered(mx + dx, my + dy) {
                return Some(uniforms.vec4(slot, 0));
            }
        }
    }
    None
}

fn shade(
    program: &ReferenceProgram,
    uniforms: &Uniforms,
    color: Vec4,
    uv: Vec2,
    pixel: (u32, u32),
    target: (u32, u32),
) -> Option<Vec4> {
    match program.fragment {
        FragmentMode::Flat { slot, offset } => Some(uniforms.vec4(slot, offset as usize)),
        FragmentMode::VertexColor => Some(color),
        FragmentMode::Textured { slot, unit } => {
            let base = uniforms.vec4(slot, 0);
            let channel = unit.saturating_sub(TEXTURE_CHANNEL_UNIT_START) as usize;
            let tiling = uniforms.vec4(CHANNEL_TILING_SLOT, channel * 16);
            let scale = if tiling.x == 0.0 && tiling.y == 0.0 {
                Vec2::ONE
            } else {
                Vec2::new(tiling.x, tiling.y)
            };
            let uv = uv * scale + Vec2::new(tiling.z, tiling.w);
            match (uniforms.texture)(unit) {
                Some(texture) => Some(base * texture.sample(uv)),
                None => Some(base),
            }
        }
        FragmentMode::EdgeDetect { slot, unit } => {
            edge_detect(uniforms, slot, unit, pixel.0, pixel.1, target)
        }
    }
}

/// Assembles triangles from an index list, honouring primitive restart.
pub(crate) fn assemble(indices: &[u32], restart: bool) -> Vec<[u32; 3]> {
    let mut triangles = Vec::with_capacity(indices.len() / 3);
    let mut pending = Vec::with_capacity(3);
    for &index in indices {
        if restart && index == PRIMITIVE_RESTART_INDEX {
            pending.clear();
            continue;
        }
        pending.push(index);
        if pending.len() == 3 {
            triangles.push([pending[0], pending[1], pending[2]]);
            pending.clear();
        }
    }
    triangles
}

fn is_culled(state: &RenderState, signed_area: f32) -> bool {
    if !state.cull_face {
        return false;
    }
    let ccw = signed_area > 0.0;
    let front = ccw == (state.front_face == Winding::CounterClockwise);
    match state.triangle_face {
        Face::Front => front,
        Face::Back => !front,
        Face::FrontAndBack => true,
    }
}

/// Rasterizes one instanced, indexed draw into `targets`.
pub(crate) fn draw(
    program: &ReferenceProgram,
    state: &RenderState,
    viewport: Viewport,
    vertices: &[VertexInput],
    triangles: &[[u32; 3]],
    instances: u32,
    uniforms: &Uniforms,
    targets: &mut Targets,
) -> usize {
    let mut fragments = 0;
    for instance in 0..instances {
        for tri in triangles {
            let mut corners = [None; 3];
            for (corner, &index) in corners.iter_mut().zip(tri) {
                let Some(v) = vertices.get(index as usize) else {
                    continue;
                };
                if let Some(clip) = to_clip(program, v, uniforms, instance) {
                    *corner = Some(ClipVertex {
                        clip,
                        color: v.color,
                        uv: v.uv,
                    });
                }
            }
            if let [Some(a), Some(b), Some(c)] = corners {
                fragments += triangle(program, state, viewport, [a, b, c], uniforms, targets);
            }
        }
    }
    fragments
}

#[allow(clippy::too_many_lines)]
fn triangle(
    program: &ReferenceProgram,
    state: &RenderState,
    viewport: Viewport,
    corners: [ClipVertex; 3],
    uniforms: &Uniforms,
    targets: &mut Targets,
) -> usize {
    // No near-plane clipping: triangles crossing w = 0 are dropped whole.
    if corners.iter().any(|v| v.clip.w <= f32::EPSILON) {
        return 0;
    }
    let window = corners.map(|v| {
        let ndc = v.clip.truncate() / v.clip.w;
        Vec3::new(
            viewport.x as f32 + (ndc.x * 0.5 + 0.5) * viewport.width as f32,
            viewport.y as f32 + (ndc.y * 0.5 + 0.5) * viewport.height as f32,
            ndc.z,
        )
    });
    let [p0, p1, p2] = window;
    let area = (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y);
    if area.abs() <= f32::EPSILON || is_culled(state, area) {
        return 0;
    }

    let target_size = (targets.color.width, targets.color.height);
    let min_x = p0.x.min(p1.x).min(p2.x).floor().max(viewport.x.max(0) as f32) as i64;
    let min_y = p0.y.min(p1.y).min(p2.y).floor().max(viewport.y.max(0) as f32) as i64;
    let max_x = (p0.x.max(p1.x).max(p2.x).ceil() as i64)
        .min(i64::from(viewport.x) + i64::from(viewport.width))
        .min(i64::from(target_size.0));
    let max_y = (p0.y.max(p1.y).max(p2.y).ceil() as i64)
        .min(i64::from(viewport.y) + i64::from(viewport.height))
        .min(i64::from(target_size.1));

    let inv_w = corners.map(|v| 1.0 / v.clip.w);
    let mut written = 0;
    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let edge = |a: Vec3, b: Vec3| (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
            let b0 = edge(p1, p2) / area;
            let b1 = edge(p2, p0) / area;
            let b2 = edge(p0, p1) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }
            let depth = b0 * p0.z + b1 * p1.z + b2 * p2.z;
            // Barycentric rounding may push a far-plane fragment just past 1.
            if !(-DEPTH_EPSILON..=1.0 + DEPTH_EPSILON).contains(&depth) {
                continue;
            }
            let depth = depth.clamp(0.0, 1.0);
            let (px, py) = (x as u32, y as u32);
            let index = targets.color.index(px, py);

            // Stencil then depth, as the fixed-function pipeline orders them.
            let mut stencil_slot = None;
            if let Some(ds) = targets.depth.as_deref_mut() {
                if state.stencil_test {
                    let mask = state.stencil_mask;
                    let stored = u32::from(ds.stencil[index]) & mask;
                    let reference = (state.stencil_reference as u32) & mask;
                    if !state.stencil_func.passes(reference, stored) {
                        continue;
                    }
                    stencil_slot = Some(index);
                }
                if state.depth_test && !state.depth_func.passes(depth, ds.depth[index]) {
                    continue;
                }
            }

            let w = b0 * inv_w[0] + b1 * inv_w[1] + b2 * inv_w[2];
            let persp = [b0 * inv_w[0] / w, b1 * inv_w[1] / w, b2 * inv_w[2] / w];
            let color = corners[0].color * persp[0]
                + corners[1].color * persp[1]
                + corners[2].color * persp[2];
            let uv = corners[0].uv * persp[0] + corners[1].uv * persp[1] + corners[2].uv * persp[2];

            let Some(src) = shade(program, uniforms, color, uv, (px, py), target_size) else {
                continue;
            };

            if let Some(ds) = targets.depth.as_deref_mut() {
                if state.depth_test && state.depth_write {
                    ds.depth[index] = depth;
                }
                if let (Some(i), true) = (stencil_slot, state.stencil_write) {
                    ds.stencil[i] = state.stencil_reference as u8;
                }
            }
            if state.color_write {
                let out = if state.blend {
                    blend(state, src, targets.color.texel(px, py))
                } else {
                    src
                };
                targets.color.write_color(px, py, out);
            }
            written += 1;
        }
    }
    written
}
