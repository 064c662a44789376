//! Configuration options for strata.

use std::path::Path;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Upper bound on instances uploaded per instanced draw call.
pub const MAX_INSTANCES_PER_PAGE: usize = 256;

/// Global configuration options for a strata viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Clear colour of scene frames.
    pub background_color: Vec3,

    /// Selection outline configuration.
    pub outline: OutlineOptions,

    /// Colour selected objects are written with in the selection mask.
    pub selection_mask_color: Vec4,

    /// MSAA sample count requested for scene frames (1 = off).
    pub msaa_samples: u32,

    /// Number of instances per instanced draw call.
    pub instance_page_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            background_color: Vec3::new(0.1, 0.1, 0.12),
            outline: OutlineOptions::default(),
            selection_mask_color: Vec4::ONE,
            msaa_samples: 1,
            instance_page_size: MAX_INSTANCES_PER_PAGE,
        }
    }
}

/// Appearance of the selection outline post effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineOptions {
    /// Outline colour (RGBA, 0.0-1.0).
    pub color: Vec4,
    /// Outline thickness in pixels.
    pub thickness: u32,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        Self {
            color: Vec4::new(1.0, 0.6, 0.0, 1.0),
            thickness: 2,
        }
    }
}

impl Options {
    /// Parses options from a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loading options from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    /// Serializes the options to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.msaa_samples == 0 || !self.msaa_samples.is_power_of_two() {
            return Err(StrataError::InvalidOption(format!(
                "msaa_samples must be a power of two, got {}",
                self.msaa_samples
            )));
        }
        if self.instance_page_size == 0 || self.instance_page_size > MAX_INSTANCES_PER_PAGE {
            return Err(StrataError::InvalidOption(format!(
                "instance_page_size must be in 1..={MAX_INSTANCES_PER_PAGE}, got {}",
                self.instance_page_size
            )));
        }
        Ok(())
    }
}
