//! Program selection for the reference rasterizer.
//!
//! The reference backend cannot run shader code. Each stage may carry a
//! `#pragma reference(...)` line naming the built-in CPU routine that
//! approximates it:
//!
//! ```glsl
//! #pragma reference(vertex = shell, slot = 9)
//! #pragma reference(fragment = edge_detect, slot = 8, unit = 5)
//! #pragma reference(fragment = flat, slot = 8, offset = 32)
//! ```
//!
//! Stages without the pragma get the defaults: model-view-projection
//! transform and a flat colour read from the first material slot.

use crate::material::UNIFORM_BUFFER_BINDING_START;
use crate::shader::{ShaderCode, ShaderModule, ShaderStage};

/// How vertices reach clip space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VertexMode {
    /// `object_to_clip * position` from the transform block.
    Transform,
    /// `projection * view * instance[i] * position`, instance matrices in
    /// storage slot 0.
    Instanced,
    /// Positions are already clip-space.
    Fullscreen,
    /// Clip-space positions pushed onto the far plane.
    Background,
    /// Position pushed along the normal by the width stored at byte 16 of
    /// the given uniform slot, then transformed.
    Shell { slot: u32 },
}

/// How fragments are coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FragmentMode {
    /// A `vec4` at byte `offset` of a uniform slot.
    Flat { slot: u32, offset: u32 },
    /// Interpolated vertex colour.
    VertexColor,
    /// Flat colour modulated by the texture on `unit`.
    Textured { slot: u32, unit: u32 },
    /// Mask boundary search: colour and thickness from `slot`, mask on `unit`.
    EdgeDetect { slot: u32, unit: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReferenceProgram {
    pub vertex: VertexMode,
    pub fragment: FragmentMode,
    /// Compute-only programs cannot draw.
    pub drawable: bool,
}

fn parse_pragma(source: &str) -> Vec<(String, String)> {
    let Some(line) = source
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("#pragma reference("))
    else {
        return Vec::new();
    };
    let inner = line
        .trim_start_matches("#pragma reference(")
        .trim_end_matches(')');
    inner
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn lookup_u32(pairs: &[(String, String)], key: &str, default: u32) -> Result<u32, String> {
    match lookup(pairs, key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| format!("reference pragma: '{key}' must be an integer, got '{v}'")),
    }
}

fn check_source(module: &ShaderModule) -> Result<Option<&str>, String> {
    match &module.code {
        ShaderCode::Binary(bytes) if bytes.is_empty() => {
            Err(format!("{:?} stage: empty binary", module.stage))
        }
        ShaderCode::Binary(_) => Ok(None),
        ShaderCode::Source(source) => {
            if source.trim().is_empty() {
                return Err(format!("{:?} stage: empty source", module.stage));
            }
            if let Some(line) = source.lines().map(str::trim).find(|l| l.starts_with("#error")) {
                return Err(format!(
                    "{:?} stage: {}",
                    module.stage,
                    line.trim_start_matches("#error").trim()
                ));
            }
            Ok(Some(source))
        }
    }
}

fn vertex_mode(source: Option<&str>) -> Result<VertexMode, String> {
    let pairs = source.map(parse_pragma).unwrap_or_default();
    match lookup(&pairs, "vertex").unwrap_or("transform") {
        "transform" => Ok(VertexMode::Transform),
        "instanced" => Ok(VertexMode::Instanced),
        "fullscreen" => Ok(VertexMode::Fullscreen),
        "background" => Ok(VertexMode::Background),
        "shell" => Ok(VertexMode::Shell {
            slot: lookup_u32(&pairs, "slot", UNIFORM_BUFFER_BINDING_START)?,
        }),
        other => Err(format!("reference pragma: unknown vertex routine '{other}'")),
    }
}

fn fragment_mode(source: Option<&str>) -> Result<FragmentMode, String> {
    let pairs = source.map(parse_pragma).unwrap_or_default();
    let slot = lookup_u32(&pairs, "slot", UNIFORM_BUFFER_BINDING_START)?;
    let unit = lookup_u32(&pairs, "unit", crate::material::TEXTURE_CHANNEL_UNIT_START)?;
    match lookup(&pairs, "fragment").unwrap_or("flat") {
        "flat" => Ok(FragmentMode::Flat {
            slot,
            offset: lookup_u32(&pairs, "offset", 0)?,
        }),
        "vertex_color" => Ok(FragmentMode::VertexColor),
        "textured" => Ok(FragmentMode::Textured { slot, unit }),
        "edge_detect" => Ok(FragmentMode::EdgeDetect { slot, unit }),
        other => Err(format!("reference pragma: unknown fragment routine '{other}'")),
    }
}

/// Validates the stage set and picks the reference routines.
pub(crate) fn link(modules: &[ShaderModule]) -> Result<ReferenceProgram, String> {
    let mut vertex = None;
    let mut fragment = None;
    let mut compute = false;
    for module in modules {
        let source = check_source(module)?;
        match module.stage {
            ShaderStage::Vertex => vertex = Some(vertex_mode(source)?),
            ShaderStage::Fragment => fragment = Some(fragment_mode(source)?),
            ShaderStage::Compute => compute = true,
            ShaderStage::Geometry => {
                return Err("reference backend cannot execute geometry stages".into());
            }
        }
    }
    match (vertex, fragment) {
        (Some(vertex), Some(fragment)) if !compute => Ok(ReferenceProgram {
            vertex,
            fragment,
            drawable: true,
        }),
        (None, None) if compute => Ok(ReferenceProgram {
            vertex: VertexMode::Transform,
            fragment: FragmentMode::VertexColor,
            drawable: false,
        }),
        _ if compute => Err("compute stage cannot be linked with graphics stages".into()),
        (None, _) => Err("link error: missing vertex stage".into()),
        (Some(_), None) => Err("link error: missing fragment stage".into()),
        (Some(_), Some(_)) => Err("link error: unexpected stage combination".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(stage: ShaderStage, source: &str) -> ShaderModule {
        ShaderModule::source(stage, source)
    }

    #[test]
    fn test_defaults_without_pragma() {
        let program = link(&[
            module(ShaderStage::Vertex, "void main() {}"),
            module(ShaderStage::Fragment, "void main() {}"),
        ])
        .unwrap();
        assert_eq!(program.vertex, VertexMode::Transform);
        assert_eq!(
            program.fragment,
            FragmentMode::Flat {
                slot: UNIFORM_BUFFER_BINDING_START,
                offset: 0
            }
        );
    }

    #[test]
    fn test_pragma_parsing() {
        let program = link(&[
            module(ShaderStage::Vertex, "#pragma reference(vertex = shell, slot = 9)\n"),
            module(
                ShaderStage::Fragment,
                "#version 450\n#pragma reference(fragment=edge_detect, slot=8, unit=5)\n",
            ),
        ])
        .unwrap();
        assert_eq!(program.vertex, VertexMode::Shell { slot: 9 });
        assert_eq!(program.fragment, FragmentMode::EdgeDetect { slot: 8, unit: 5 });
    }

    #[test]
    fn test_link_errors() {
        assert!(link(&[module(ShaderStage::Vertex, "void main() {}")])
            .unwrap_err()
            .contains("fragment"));
        assert!(link(&[
            module(ShaderStage::Vertex, "void main() {}"),
            module(ShaderStage::Fragment, "#error undeclared identifier 'albedo'"),
        ])
        .unwrap_err()
        .contains("albedo"));
        assert!(link(&[
            module(ShaderStage::Vertex, "   "),
            module(ShaderStage::Fragment, "void main() {}"),
        ])
        .is_err());
    }

    #[test]
    fn test_compute_links_alone() {
        let compute = module(ShaderStage::Compute, "void main() {}");
        assert!(!link(&[compute.clone()]).unwrap().drawable);
        assert!(link(&[compute.clone(), module(ShaderStage::Vertex, "void main() {}")])
            .unwrap_err()
            .contains("compute"));
        assert!(link(&[
            compute,
            module(ShaderStage::Vertex, "void main() {}"),
            module(ShaderStage::Fragment, "void main() {}"),
        ])
        .unwrap_err()
        .contains("compute"));
    }
}
