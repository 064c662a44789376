//! Object identifiers and their picking colours.
//!
//! Every pickable object carries a random 128-bit [`ObjectId`]. The picking pass
//! draws each object with a flat colour derived from that id; reading the pixel
//! under the cursor and matching it against the live objects resolves a click.

use std::fmt;

use glam::Vec4;

/// Alpha written for every object colour. The id buffer is cleared to alpha 0,
/// so background pixels never match an object.
pub const PICK_ALPHA: u8 = 255;

/// A random 128-bit object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u128);

impl ObjectId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// The flat colour this object is drawn with in the picking pass.
    #[must_use]
    pub fn color_id(self) -> ColorId {
        ColorId::from_object_id(self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// An RGBA8 picking colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorId(pub [u8; 4]);

impl ColorId {
    /// Folds the sixteen id bytes into three by XOR, byte `i` landing in
    /// channel `i % 3`. Alpha is always [`PICK_ALPHA`].
    ///
    /// The fold is not injective: two ids can share a colour.
    #[must_use]
    pub fn from_object_id(id: ObjectId) -> Self {
        let mut rgb = [0u8; 3];
        for (i, byte) in id.0.to_le_bytes().iter().enumerate() {
            rgb[i % 3] ^= byte;
        }
        Self([rgb[0], rgb[1], rgb[2], PICK_ALPHA])
    }

    /// Normalized colour as passed to a solid-colour material.
    #[must_use]
    pub fn to_vec4(self) -> Vec4 {
        let [r, g, b, a] = self.0;
        Vec4::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    /// Raw RGBA bytes.
    #[must_use]
    pub fn bytes(self) -> [u8; 4] {
        self.0
    }
}

impl From<[u8; 4]> for ColorId {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fold_small_ids() {
        // byte 0 -> R, byte 1 -> G, byte 2 -> B, byte 3 -> R again
        assert_eq!(ObjectId(0).color_id(), ColorId([0, 0, 0, 255]));
        assert_eq!(ObjectId(0x01).color_id(), ColorId([1, 0, 0, 255]));
        assert_eq!(ObjectId(0x0200).color_id(), ColorId([0, 2, 0, 255]));
        assert_eq!(ObjectId(0x03_0000).color_id(), ColorId([0, 0, 3, 255]));
        assert_eq!(ObjectId(0x0500_0001).color_id(), ColorId([4, 0, 0, 255]));
    }

    #[test]
    fn test_fold_can_collide() {
        // Swapping two bytes that land in the same channel keeps the colour.
        let a = ObjectId(0xAA00_00BB);
        let b = ObjectId(0xBB00_00AA);
        assert_ne!(a, b);
        assert_eq!(a.color_id(), b.color_id());
    }

    #[test]
    fn test_to_vec4() {
        let v = ColorId([255, 0, 51, 255]).to_vec4();
        assert!((v.x - 1.0).abs() < 1e-6);
        assert!((v.z - 0.2).abs() < 1e-6);
        assert!((v.w - 1.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn color_id_is_deterministic_and_opaque(raw in any::<u128>()) {
            let id = ObjectId(raw);
            prop_assert_eq!(id.color_id(), id.color_id());
            prop_assert_eq!(id.color_id().0[3], PICK_ALPHA);
        }
    }
}
