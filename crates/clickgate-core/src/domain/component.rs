//! Security component descriptors.
//!
//! A security component is an on-screen control (location button, paste
//! button, save button) whose click grants the owning application a
//! temporary permission.  The descriptor captures what the trust core needs
//! to know about it: the component type, where it is drawn, and an opaque
//! blob of backend-specific validity metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SecCompError;

/// Process-unique identifier assigned to a registered component.
pub type ComponentId = i32;

/// Tolerance used when comparing floating-point geometry.
const GEOMETRY_EPSILON: f64 = 0.001;

/// The kind of temporary permission a component unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    /// Precise location for the duration of the grant.
    Location,
    /// One-shot clipboard read.
    Paste,
    /// Write access to a user-chosen media/file location.
    Save,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentType::Location => "location",
            ComponentType::Paste => "paste",
            ComponentType::Save => "save",
        };
        f.write_str(name)
    }
}

/// An axis-aligned rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of the top-left corner.
    pub x: f64,
    /// Y coordinate of the top-left corner.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rightmost X coordinate (inclusive edge).
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom Y coordinate (inclusive edge).
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Inclusive hit test: points on any edge are inside.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Geometry equality within [`GEOMETRY_EPSILON`].
    pub fn approx_eq(&self, other: &Rect) -> bool {
        (self.x - other.x).abs() < GEOMETRY_EPSILON
            && (self.y - other.y).abs() < GEOMETRY_EPSILON
            && (self.width - other.width).abs() < GEOMETRY_EPSILON
            && (self.height - other.height).abs() < GEOMETRY_EPSILON
    }

    /// `true` when all fields are finite and the size is non-negative.
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// Everything the trust core knows about one security component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub component_type: ComponentType,
    /// Last-known on-screen rectangle of the control.
    pub rect: Rect,
    /// Rectangle of the window hosting the control.
    pub window_rect: Rect,
    /// Backend-opaque validity metadata (e.g. a signed render attestation).
    #[serde(default)]
    pub enhance_metadata: Vec<u8>,
}

impl ComponentDescriptor {
    pub fn new(component_type: ComponentType, rect: Rect, window_rect: Rect) -> Self {
        Self {
            component_type,
            rect,
            window_rect,
            enhance_metadata: Vec::new(),
        }
    }

    /// Checks the geometry fields.
    ///
    /// # Errors
    ///
    /// Returns [`SecCompError::InvalidValue`] if either rectangle has
    /// non-finite or negative dimensions, or if the component is not drawn
    /// inside its window.
    pub fn validate(&self) -> Result<(), SecCompError> {
        if !self.rect.is_well_formed() {
            return Err(SecCompError::InvalidValue(format!(
                "component rect is malformed: {:?}",
                self.rect
            )));
        }
        if !self.window_rect.is_well_formed() {
            return Err(SecCompError::InvalidValue(format!(
                "window rect is malformed: {:?}",
                self.window_rect
            )));
        }
        let inside = self.window_rect.contains(self.rect.x, self.rect.y)
            && self.window_rect.contains(self.rect.right(), self.rect.bottom());
        if !inside {
            return Err(SecCompError::InvalidValue(
                "component rect lies outside its window".to_string(),
            ));
        }
        Ok(())
    }

    /// Structural equality over the immutable identity fields.
    pub fn basic_info_eq(&self, other: &ComponentDescriptor) -> bool {
        self.component_type == other.component_type
            && self.rect.approx_eq(&other.rect)
            && self.window_rect.approx_eq(&other.window_rect)
            && self.enhance_metadata == other.enhance_metadata
    }

    /// Serializes the descriptor to the JSON form handed to enhance backends.
    ///
    /// # Errors
    ///
    /// Returns [`SecCompError::InvalidValue`] if serialization fails
    /// (only possible with non-finite geometry).
    pub fn to_json(&self) -> Result<String, SecCompError> {
        serde_json::to_string(self)
            .map_err(|e| SecCompError::InvalidValue(format!("descriptor to json: {e}")))
    }

    /// Parses a descriptor from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SecCompError::InvalidValue`] if the JSON does not describe a
    /// descriptor.
    pub fn from_json(raw: &str) -> Result<Self, SecCompError> {
        serde_json::from_str(raw)
            .map_err(|e| SecCompError::InvalidValue(format!("descriptor from json: {e}")))
    }
}
