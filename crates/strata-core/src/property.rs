//! Statically declared, user-adjustable properties.
//!
//! Each material publishes a table of [`Property`] entries: a label, a kind
//! and a getter/setter pair. The GUI never sees the material type; it only
//! receives values through the [`Inspector`] trait and hands edited values
//! back within the same call.

use glam::Vec4;

use crate::error::{Result, StrataError};

/// What kind of widget a property wants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    /// RGBA colour picker.
    Color,
    /// Slider over an inclusive range.
    Float { min: f32, max: f32 },
    /// A texture channel slot (tiling and offset are edited as a `Vec4`).
    Texture { channel: usize },
}

impl PropertyKind {
    fn name(self) -> &'static str {
        match self {
            PropertyKind::Color => "colour",
            PropertyKind::Float { .. } => "float",
            PropertyKind::Texture { .. } => "texture",
        }
    }
}

/// A property value in transit between a material and the inspector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    /// RGBA colour.
    Color(Vec4),
    /// Scalar.
    Float(f32),
    /// Tiling (xy) and offset (zw) of a texture channel.
    Texture(Vec4),
}

impl PropertyValue {
    /// The colour, if this is a colour value.
    pub fn as_color(self) -> Option<Vec4> {
        match self {
            PropertyValue::Color(c) => Some(c),
            _ => None,
        }
    }

    /// The scalar, if this is a float value.
    pub fn as_float(self) -> Option<f32> {
        match self {
            PropertyValue::Float(f) => Some(f),
            _ => None,
        }
    }

    fn matches(self, kind: PropertyKind) -> bool {
        matches!(
            (self, kind),
            (PropertyValue::Color(_), PropertyKind::Color)
                | (PropertyValue::Float(_), PropertyKind::Float { .. })
                | (PropertyValue::Texture(_), PropertyKind::Texture { .. })
        )
    }
}

/// One row of a property table.
pub struct Property<T> {
    /// Display label.
    pub label: &'static str,
    /// Widget kind and range.
    pub kind: PropertyKind,
    /// Reads the current value.
    pub get: fn(&T) -> PropertyValue,
    /// Writes an edited value. Only called with a value matching `kind`.
    pub set: fn(&mut T, PropertyValue),
}

impl<T> Property<T> {
    /// Reads the property from `target`.
    pub fn read(&self, target: &T) -> PropertyValue {
        (self.get)(target)
    }

    /// Writes `value` into `target`, clamping floats to the declared range.
    pub fn write(&self, target: &mut T, value: PropertyValue) -> Result<()> {
        if !value.matches(self.kind) {
            return Err(StrataError::PropertyKindMismatch {
                label: self.label,
                expected: self.kind.name(),
            });
        }
        let value = match (value, self.kind) {
            (PropertyValue::Float(v), PropertyKind::Float { min, max }) => {
                PropertyValue::Float(v.clamp(min, max))
            }
            _ => value,
        };
        (self.set)(target, value);
        Ok(())
    }
}

/// The GUI side of property editing.
pub trait Inspector {
    /// Shows one property. Returns true if `value` was edited.
    fn edit(&mut self, label: &str, kind: PropertyKind, value: &mut PropertyValue) -> bool;
}

/// Walks `table`, letting `inspector` edit each property of `target`.
///
/// Returns the number of properties that changed.
pub fn inspect_table<T>(
    target: &mut T,
    table: &[Property<T>],
    inspector: &mut dyn Inspector,
) -> Result<usize> {
    let mut changed = 0;
    for property in table {
        let mut value = property.read(target);
        if inspector.edit(property.label, property.kind, &mut value) {
            property.write(target, value)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Looks a property up by index and writes it.
pub fn set_property<T>(
    target: &mut T,
    table: &[Property<T>],
    index: usize,
    value: PropertyValue,
) -> Result<()> {
    let property = table.get(index).ok_or(StrataError::PropertyOutOfRange {
        index,
        len: table.len(),
    })?;
    property.write(target, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Paint {
        color: Vec4,
        roughness: f32,
    }

    const PAINT_PROPERTIES: &[Property<Paint>] = &[
        Property {
            label: "Color",
            kind: PropertyKind::Color,
            get: |p| PropertyValue::Color(p.color),
            set: |p, v| {
                if let PropertyValue::Color(c) = v {
                    p.color = c;
                }
            },
        },
        Property {
            label: "Roughness",
            kind: PropertyKind::Float { min: 0.0, max: 1.0 },
            get: |p| PropertyValue::Float(p.roughness),
            set: |p, v| {
                if let PropertyValue::Float(f) = v {
                    p.roughness = f;
                }
            },
        },
    ];

    /// Doubles every float it sees and leaves colours alone.
    struct Doubler {
        seen: Vec<String>,
    }

    impl Inspector for Doubler {
        fn edit(&mut self, label: &str, _kind: PropertyKind, value: &mut PropertyValue) -> bool {
            self.seen.push(label.to_string());
            if let PropertyValue::Float(f) = value {
                *f *= 2.0;
                return true;
            }
            false
        }
    }

    #[test]
    fn test_inspect_writes_back_and_clamps() {
        let mut paint = Paint {
            color: Vec4::ONE,
            roughness: 0.75,
        };
        let mut inspector = Doubler { seen: Vec::new() };
        let changed = inspect_table(&mut paint, PAINT_PROPERTIES, &mut inspector).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(inspector.seen, ["Color", "Roughness"]);
        assert!((paint.roughness - 1.0).abs() < f32::EPSILON);
        assert_eq!(paint.color, Vec4::ONE);
    }

    #[test]
    fn test_set_property_checks_kind_and_index() {
        let mut paint = Paint {
            color: Vec4::ONE,
            roughness: 0.5,
        };
        assert!(set_property(&mut paint, PAINT_PROPERTIES, 1, PropertyValue::Color(Vec4::ZERO)).is_err());
        assert!(set_property(&mut paint, PAINT_PROPERTIES, 7, PropertyValue::Float(0.0)).is_err());
        set_property(&mut paint, PAINT_PROPERTIES, 0, PropertyValue::Color(Vec4::ZERO)).unwrap();
        assert_eq!(paint.color, Vec4::ZERO);
    }
}
