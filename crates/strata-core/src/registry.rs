//! Scene bookkeeping: object names, ids, transforms.

use std::collections::HashMap;

use glam::Mat4;

use crate::error::{Result, StrataError};
use crate::pick::{ColorId, ObjectId};
use crate::transform::Transform;

/// A named object in the scene.
#[derive(Debug, Clone)]
pub struct SceneObject {
    /// Unique display name.
    pub name: String,
    /// Random identifier; also the source of the picking colour.
    pub id: ObjectId,
    /// World transform. External systems (physics, gizmos) write here.
    pub transform: Transform,
    /// Whether the object takes part in the picking pass.
    pub pickable: bool,
}

impl SceneObject {
    /// Creates a pickable object with an identity transform and a random id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: ObjectId::random(),
            transform: Transform::identity(),
            pickable: true,
        }
    }

    /// Replaces the random id.
    #[must_use]
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    /// Sets the initial transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets whether the object can be picked.
    #[must_use]
    pub fn with_pickable(mut self, pickable: bool) -> Self {
        self.pickable = pickable;
        self
    }

    /// The object's model matrix.
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// The object's picking colour.
    #[must_use]
    pub fn color_id(&self) -> ColorId {
        self.id.color_id()
    }
}

/// Maps object names to objects, keeping registration order.
#[derive(Debug, Default)]
pub struct SceneController {
    objects: Vec<SceneObject>,
    by_name: HashMap<String, usize>,
}

impl SceneController {
    /// Creates an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object.
    ///
    /// Returns an error if the name is taken. A picking colour shared with a
    /// live object is accepted but logged.
    pub fn insert(&mut self, object: SceneObject) -> Result<ObjectId> {
        if self.by_name.contains_key(&object.name) {
            return Err(StrataError::ObjectExists(object.name));
        }
        if object.pickable {
            let color = object.color_id();
            if let Some(other) = self
                .objects
                .iter()
                .find(|o| o.pickable && o.color_id() == color)
            {
                log::warn!(
                    "picking colour {:?} of '{}' collides with '{}'",
                    color.bytes(),
                    object.name,
                    other.name
                );
            }
        }
        let id = object.id;
        self.by_name.insert(object.name.clone(), self.objects.len());
        self.objects.push(object);
        Ok(id)
    }

    /// Removes an object by name.
    pub fn remove(&mut self, name: &str) -> Result<SceneObject> {
        let index = self
            .by_name
            .remove(name)
            .ok_or_else(|| StrataError::ObjectNotFound(name.to_string()))?;
        let object = self.objects.remove(index);
        for slot in self.by_name.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Ok(object)
    }

    /// Looks an object up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.by_name.get(name).map(|&i| &self.objects[i])
    }

    /// Looks an object up by id.
    #[must_use]
    pub fn get_by_id(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// The transform of an object.
    #[must_use]
    pub fn transform(&self, name: &str) -> Option<&Transform> {
        self.get(name).map(|o| &o.transform)
    }

    /// Mutable access to the transform of an object.
    pub fn transform_mut(&mut self, name: &str) -> Option<&mut Transform> {
        let index = *self.by_name.get(name)?;
        Some(&mut self.objects[index].transform)
    }

    /// Overwrites an object's transform.
    pub fn set_transform(&mut self, name: &str, transform: Transform) -> Result<()> {
        let slot = self
            .transform_mut(name)
            .ok_or_else(|| StrataError::ObjectNotFound(name.to_string()))?;
        *slot = transform;
        Ok(())
    }

    /// All objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }

    /// Pickable objects in registration order.
    pub fn pickable(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| o.pickable)
    }

    /// Number of registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Removes every object.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.by_name.clear();
    }
}
