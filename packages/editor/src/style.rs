//! # Style Model
//!
//! Declarative per-node style. Every field has a default; the document
//! store only keeps the fields that were explicitly set, as a
//! [`PartialStyle`]. The effective [`StyleRecord`] of a node is the defaults
//! with its partial (and any instance overrides) applied on top.
//!
//! The record is the union of the fields of every node type; the style
//! resolver decides which ones a given type uses.

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackDirection {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Layout {
    None,
    Stack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackAlign {
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackJustify {
    Start,
    Center,
    End,
    SpaceBetween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextHorizontalAlign {
    Start,
    Center,
    End,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextVerticalAlign {
    Start,
    Center,
    End,
}

/// Offset from one edge of the container. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PositionConstraint {
    Start { start: f64 },
    End { end: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionConstraints {
    pub x: PositionConstraint,
    pub y: PositionConstraint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SizeConstraint {
    Fixed { value: f64 },
    HugContents,
    Fill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub hex: String,
}

impl Color {
    pub fn new(hex: impl Into<String>) -> Self {
        Self { hex: hex.into() }
    }
}

// A present field always deserializes to `Some`, even when its value is
// `null`, so `Option<Option<_>>` fields keep "set to null" apart from "unset".
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

macro_rules! style_fields {
    ($( $(#[$doc:meta])* $field:ident : $ty:ty = $default:expr ),* $(,)?) => {
        /// Fully specified style of a node
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct StyleRecord {
            $( $(#[$doc])* pub $field: $ty, )*
        }

        impl Default for StyleRecord {
            fn default() -> Self {
                Self { $( $field: $default, )* }
            }
        }

        /// Explicitly set style fields; unset fields fall back to the defaults
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase", deny_unknown_fields)]
        pub struct PartialStyle {
            $(
                #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
                pub $field: Option<$ty>,
            )*
        }

        impl PartialStyle {
            /// Write every set field onto `style`
            pub fn apply_to(&self, style: &mut StyleRecord) {
                $( if let Some(value) = &self.$field { style.$field = value.clone(); } )*
            }

            /// Take every field set in `other`
            pub fn overlay(&mut self, other: &PartialStyle) {
                $( if other.$field.is_some() { self.$field = other.$field.clone(); } )*
            }

            pub fn is_empty(&self) -> bool {
                true $( && self.$field.is_none() )*
            }
        }

        impl From<&StyleRecord> for PartialStyle {
            fn from(style: &StyleRecord) -> Self {
                Self { $( $field: Some(style.$field.clone()), )* }
            }
        }
    };
}

style_fields! {
    position: PositionConstraints = PositionConstraints {
        x: PositionConstraint::Start { start: 0.0 },
        y: PositionConstraint::Start { start: 0.0 },
    },
    width: SizeConstraint = SizeConstraint::Fixed { value: 100.0 },
    height: SizeConstraint = SizeConstraint::Fixed { value: 100.0 },

    top_left_radius: f64 = 0.0,
    top_right_radius: f64 = 0.0,
    bottom_right_radius: f64 = 0.0,
    bottom_left_radius: f64 = 0.0,

    /// Ordered paint list; only the first fill is rendered
    fills: Vec<Color> = vec![],
    border: Option<Color> = None,
    border_top_width: f64 = 0.0,
    border_right_width: f64 = 0.0,
    border_bottom_width: f64 = 0.0,
    border_left_width: f64 = 0.0,

    opacity: f64 = 1.0,
    overflow_hidden: bool = false,

    layout: Layout = Layout::None,
    stack_direction: StackDirection = StackDirection::X,
    stack_align: StackAlign = StackAlign::Start,
    stack_justify: StackJustify = StackJustify::Start,
    gap: f64 = 0.0,
    padding_top: f64 = 0.0,
    padding_right: f64 = 0.0,
    padding_bottom: f64 = 0.0,
    padding_left: f64 = 0.0,

    text_content: String = String::new(),
    font_family: String = "Inter".to_string(),
    font_size: f64 = 16.0,
    font_weight: f64 = 400.0,
    line_height: f64 = 1.5,
    /// In em
    letter_spacing: f64 = 0.0,
    text_horizontal_align: TextHorizontalAlign = TextHorizontalAlign::Start,
    text_vertical_align: TextVerticalAlign = TextVerticalAlign::Start,

    /// Component rendered by an instance
    main_component: Option<String> = None,
    /// Content hash of a background image in the image store
    image_hash: Option<String> = None,
}

impl StyleRecord {
    /// Defaults with `partial` applied
    pub fn from_partial(partial: &PartialStyle) -> Self {
        let mut style = Self::default();
        partial.apply_to(&mut style);
        style
    }

    /// Direction children of this node are stacked along, if any
    pub fn child_stack_direction(&self) -> Option<StackDirection> {
        match self.layout {
            Layout::Stack => Some(self.stack_direction),
            Layout::None => None,
        }
    }
}

impl PartialStyle {
    /// Set fields as `(jsonName, value)` pairs
    pub fn to_fields(&self) -> serde_json::Result<Vec<(String, serde_json::Value)>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Ok(vec![]),
        }
    }

    /// Partial holding a single field, validating both name and value
    pub fn from_field(name: &str, value: serde_json::Value) -> serde_json::Result<Self> {
        let mut map = serde_json::Map::new();
        map.insert(name.to_string(), value);
        serde_json::from_value(serde_json::Value::Object(map))
    }
}

/// JSON names of every style field
pub fn field_names() -> &'static [String] {
    static NAMES: OnceLock<Vec<String>> = OnceLock::new();
    NAMES.get_or_init(|| match serde_json::to_value(StyleRecord::default()) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => vec![],
    })
}

pub fn is_field_name(name: &str) -> bool {
    field_names().iter().any(|n| n == name)
}
