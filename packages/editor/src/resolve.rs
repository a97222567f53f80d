//! # Style Resolver
//!
//! Turns a node's declarative style plus its parent's stack direction into
//! concrete layout and paint attributes. Pure: the result depends only on
//! the three inputs.

use crate::style::{
    PositionConstraint, SizeConstraint, StackAlign, StackDirection, StackJustify, StyleRecord,
    TextHorizontalAlign, TextVerticalAlign,
};
use crate::document::NodeType;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    Relative,
    Absolute,
}

/// Resolved extent along one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Px(f64),
    MaxContent,
    Percent(f64),
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Px(value) => write!(f, "{}px", value),
            Dimension::MaxContent => f.write_str("max-content"),
            Dimension::Percent(value) => write!(f, "{}%", value),
        }
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignSelf {
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overflow {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    Flex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlexDirection {
    Row,
    Column,
}

/// Value shared by `align-items` and `justify-content`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlexAlign {
    FlexStart,
    Center,
    FlexEnd,
    SpaceBetween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BorderStyle {
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhiteSpace {
    BreakSpaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAlign {
    Start,
    Center,
    End,
    Justify,
}

/// Concrete renderable attributes. Unset fields are not emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcreteAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flex: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align_self: Option<AlignSelf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overflow: Option<Overflow>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<Display>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flex_direction: Option<FlexDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align_items: Option<FlexAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justify_content: Option<FlexAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_top: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_right: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_bottom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_left: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Image store hash of the background image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_style: Option<BorderStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_right_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_left_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top_left_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top_right_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom_right_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom_left_radius: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_space: Option<WhiteSpace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    /// In em
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
}

const TRANSPARENT: &str = "transparent";

/// Resolve a node's style into concrete attributes.
///
/// `parent_stack_direction` is the stack direction of the parent, present
/// only when the parent lays its children out as a stack.
pub fn resolve(
    node_type: NodeType,
    style: &StyleRecord,
    parent_stack_direction: Option<StackDirection>,
) -> ConcreteAttributes {
    if node_type == NodeType::Component {
        return ConcreteAttributes::default();
    }

    let mut attrs = ConcreteAttributes::default();

    if parent_stack_direction.is_some() {
        attrs.position = Some(Position::Relative);
    } else {
        attrs.position = Some(Position::Absolute);
        match style.position.x {
            PositionConstraint::Start { start } => attrs.left = Some(start),
            PositionConstraint::End { end } => attrs.right = Some(end),
        }
        match style.position.y {
            PositionConstraint::Start { start } => attrs.top = Some(start),
            PositionConstraint::End { end } => attrs.bottom = Some(end),
        }
    }

    attrs.width = resolve_axis(
        &mut attrs,
        style.width,
        StackDirection::X,
        parent_stack_direction,
    );
    attrs.height = resolve_axis(
        &mut attrs,
        style.height,
        StackDirection::Y,
        parent_stack_direction,
    );

    attrs.opacity = Some(style.opacity);
    attrs.overflow = Some(if style.overflow_hidden {
        Overflow::Hidden
    } else {
        Overflow::Visible
    });

    match node_type {
        NodeType::Frame => resolve_frame(&mut attrs, style),
        NodeType::Text => resolve_text(&mut attrs, style),
        _ => {}
    }

    attrs
}

/// Extent along `axis`; fill sizing may set `flex` or `align_self` instead
fn resolve_axis(
    attrs: &mut ConcreteAttributes,
    size: SizeConstraint,
    axis: StackDirection,
    parent_stack_direction: Option<StackDirection>,
) -> Option<Dimension> {
    match size {
        SizeConstraint::Fixed { value } => Some(Dimension::Px(value)),
        SizeConstraint::HugContents => Some(Dimension::MaxContent),
        SizeConstraint::Fill => match parent_stack_direction {
            Some(direction) if direction == axis => {
                attrs.flex = Some(1.0);
                None
            }
            Some(_) => {
                attrs.align_self = Some(AlignSelf::Stretch);
                None
            }
            None => Some(Dimension::Percent(100.0)),
        },
    }
}

fn resolve_frame(attrs: &mut ConcreteAttributes, style: &StyleRecord) {
    attrs.display = Some(Display::Flex);
    attrs.flex_direction = Some(match style.stack_direction {
        StackDirection::X => FlexDirection::Row,
        StackDirection::Y => FlexDirection::Column,
    });
    attrs.align_items = Some(match style.stack_align {
        StackAlign::Start => FlexAlign::FlexStart,
        StackAlign::Center => FlexAlign::Center,
        StackAlign::End => FlexAlign::FlexEnd,
    });
    attrs.justify_content = Some(match style.stack_justify {
        StackJustify::Start => FlexAlign::FlexStart,
        StackJustify::Center => FlexAlign::Center,
        StackJustify::End => FlexAlign::FlexEnd,
        StackJustify::SpaceBetween => FlexAlign::SpaceBetween,
    });
    attrs.gap = Some(style.gap);
    attrs.padding_top = Some(style.padding_top);
    attrs.padding_right = Some(style.padding_right);
    attrs.padding_bottom = Some(style.padding_bottom);
    attrs.padding_left = Some(style.padding_left);

    attrs.background = Some(first_fill(style));
    attrs.background_image = style.image_hash.clone();
    attrs.border_style = Some(BorderStyle::Solid);
    attrs.border_color = Some(
        style
            .border
            .as_ref()
            .map(|c| c.hex.clone())
            .unwrap_or_else(|| TRANSPARENT.to_string()),
    );
    attrs.border_top_width = Some(style.border_top_width);
    attrs.border_right_width = Some(style.border_right_width);
    attrs.border_bottom_width = Some(style.border_bottom_width);
    attrs.border_left_width = Some(style.border_left_width);

    attrs.border_top_left_radius = Some(style.top_left_radius);
    attrs.border_top_right_radius = Some(style.top_right_radius);
    attrs.border_bottom_right_radius = Some(style.bottom_right_radius);
    attrs.border_bottom_left_radius = Some(style.bottom_left_radius);
}

fn resolve_text(attrs: &mut ConcreteAttributes, style: &StyleRecord) {
    attrs.white_space = Some(WhiteSpace::BreakSpaces);
    attrs.display = Some(Display::Flex);
    attrs.flex_direction = Some(FlexDirection::Column);
    attrs.color = Some(first_fill(style));
    attrs.font_family = Some(style.font_family.clone());
    attrs.font_size = Some(style.font_size);
    attrs.font_weight = Some(style.font_weight);
    attrs.line_height = Some(style.line_height);
    attrs.letter_spacing = Some(style.letter_spacing);
    attrs.text_align = Some(match style.text_horizontal_align {
        TextHorizontalAlign::Start => TextAlign::Start,
        TextHorizontalAlign::Center => TextAlign::Center,
        TextHorizontalAlign::End => TextAlign::End,
        TextHorizontalAlign::Justify => TextAlign::Justify,
    });
    attrs.justify_content = Some(match style.text_vertical_align {
        TextVerticalAlign::Start => FlexAlign::FlexStart,
        TextVerticalAlign::Center => FlexAlign::Center,
        TextVerticalAlign::End => FlexAlign::FlexEnd,
    });
}

fn first_fill(style: &StyleRecord) -> String {
    style
        .fills
        .first()
        .map(|fill| fill.hex.clone())
        .unwrap_or_else(|| TRANSPARENT.to_string())
}

fn px(value: f64) -> String {
    format!("{}px", value)
}

fn keyword<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

impl ConcreteAttributes {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// CSS declarations in a stable order
    pub fn to_css(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                out.push((name, value));
            }
        };

        push("position", self.position.as_ref().map(keyword));
        push("left", self.left.map(px));
        push("right", self.right.map(px));
        push("top", self.top.map(px));
        push("bottom", self.bottom.map(px));
        push("width", self.width.map(|d| d.to_string()));
        push("height", self.height.map(|d| d.to_string()));
        push("flex", self.flex.map(|f| f.to_string()));
        push("align-self", self.align_self.as_ref().map(keyword));
        push("opacity", self.opacity.map(|o| o.to_string()));
        push("overflow", self.overflow.as_ref().map(keyword));
        push("white-space", self.white_space.as_ref().map(keyword));
        push("display", self.display.as_ref().map(keyword));
        push("flex-direction", self.flex_direction.as_ref().map(keyword));
        push("align-items", self.align_items.as_ref().map(keyword));
        push("justify-content", self.justify_content.as_ref().map(keyword));
        push("gap", self.gap.map(px));
        push("padding-top", self.padding_top.map(px));
        push("padding-right", self.padding_right.map(px));
        push("padding-bottom", self.padding_bottom.map(px));
        push("padding-left", self.padding_left.map(px));
        push("background", self.background.clone());
        push(
            "background-image",
            self.background_image
                .as_ref()
                .map(|hash| format!("url(image:{})", hash)),
        );
        push("border-style", self.border_style.as_ref().map(keyword));
        push("border-color", self.border_color.clone());
        push("border-top-width", self.border_top_width.map(px));
        push("border-right-width", self.border_right_width.map(px));
        push("border-bottom-width", self.border_bottom_width.map(px));
        push("border-left-width", self.border_left_width.map(px));
        push("border-top-left-radius", self.border_top_left_radius.map(px));
        push("border-top-right-radius", self.border_top_right_radius.map(px));
        push(
            "border-bottom-right-radius",
            self.border_bottom_right_radius.map(px),
        );
        push("border-bottom-left-radius", self.border_bottom_left_radius.map(px));
        push("color", self.color.clone());
        push("font-family", self.font_family.clone());
        push("font-size", self.font_size.map(px));
        push("font-weight", self.font_weight.map(|w| w.to_string()));
        push("line-height", self.line_height.map(|l| l.to_string()));
        push("letter-spacing", self.letter_spacing.map(|l| format!("{}em", l)));
        push("text-align", self.text_align.as_ref().map(keyword));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Color, Layout};

    fn fill_both() -> StyleRecord {
        StyleRecord {
            width: SizeConstraint::Fill,
            height: SizeConstraint::Fill,
            ..Default::default()
        }
    }

    #[test]
    fn test_component_resolves_to_nothing() {
        let style = StyleRecord {
            fills: vec![Color::new("#ff0000")],
            opacity: 0.3,
            ..Default::default()
        };
        let attrs = resolve(NodeType::Component, &style, Some(StackDirection::X));
        assert!(attrs.is_empty());
        assert!(attrs.to_css().is_empty());
    }

    #[test]
    fn test_absolute_offsets() {
        let style = StyleRecord {
            position: crate::style::PositionConstraints {
                x: PositionConstraint::End { end: 12.0 },
                y: PositionConstraint::Start { start: 4.0 },
            },
            ..Default::default()
        };
        let attrs = resolve(NodeType::Frame, &style, None);

        assert_eq!(attrs.position, Some(Position::Absolute));
        assert_eq!(attrs.left, None);
        assert_eq!(attrs.right, Some(12.0));
        assert_eq!(attrs.top, Some(4.0));
        assert_eq!(attrs.bottom, None);
    }

    #[test]
    fn test_relative_inside_stack_ignores_offsets() {
        let attrs = resolve(NodeType::Frame, &StyleRecord::default(), Some(StackDirection::Y));
        assert_eq!(attrs.position, Some(Position::Relative));
        assert_eq!(attrs.left, None);
        assert_eq!(attrs.top, None);
    }

    #[test]
    fn test_fill_without_stack_is_full_size() {
        let attrs = resolve(NodeType::Frame, &fill_both(), None);
        assert_eq!(attrs.width, Some(Dimension::Percent(100.0)));
        assert_eq!(attrs.height, Some(Dimension::Percent(100.0)));
        assert_eq!(attrs.flex, None);
        assert_eq!(attrs.align_self, None);
    }

    #[test]
    fn test_fill_along_and_across_stack() {
        let row = resolve(NodeType::Text, &fill_both(), Some(StackDirection::X));
        assert_eq!(row.flex, Some(1.0));
        assert_eq!(row.align_self, Some(AlignSelf::Stretch));
        assert_eq!(row.width, None);
        assert_eq!(row.height, None);

        let column = resolve(
            NodeType::Frame,
            &StyleRecord {
                width: SizeConstraint::Fill,
                height: SizeConstraint::Fixed { value: 20.0 },
                ..Default::default()
            },
            Some(StackDirection::Y),
        );
        assert_eq!(column.flex, None);
        assert_eq!(column.align_self, Some(AlignSelf::Stretch));
        assert_eq!(column.height, Some(Dimension::Px(20.0)));
    }

    #[test]
    fn test_hug_contents() {
        let style = StyleRecord {
            width: SizeConstraint::HugContents,
            ..Default::default()
        };
        let attrs = resolve(NodeType::Text, &style, None);
        assert_eq!(attrs.width, Some(Dimension::MaxContent));
        assert_eq!(attrs.height, Some(Dimension::Px(100.0)));
    }

    #[test]
    fn test_frame_paint_and_stack() {
        let style = StyleRecord {
            layout: Layout::Stack,
            stack_direction: StackDirection::Y,
            stack_align: StackAlign::Center,
            stack_justify: StackJustify::SpaceBetween,
            gap: 8.0,
            fills: vec![Color::new("#112233"), Color::new("#445566")],
            border_top_width: 2.0,
            top_left_radius: 6.0,
            overflow_hidden: true,
            ..Default::default()
        };
        let attrs = resolve(NodeType::Frame, &style, None);

        assert_eq!(attrs.flex_direction, Some(FlexDirection::Column));
        assert_eq!(attrs.align_items, Some(FlexAlign::Center));
        assert_eq!(attrs.justify_content, Some(FlexAlign::SpaceBetween));
        assert_eq!(attrs.gap, Some(8.0));
        assert_eq!(attrs.background.as_deref(), Some("#112233"));
        assert_eq!(attrs.border_color.as_deref(), Some("transparent"));
        assert_eq!(attrs.border_style, Some(BorderStyle::Solid));
        assert_eq!(attrs.border_top_width, Some(2.0));
        assert_eq!(attrs.border_top_left_radius, Some(6.0));
        assert_eq!(attrs.overflow, Some(Overflow::Hidden));
        assert_eq!(attrs.color, None);
    }

    #[test]
    fn test_text_typography() {
        let style = StyleRecord {
            fills: vec![Color::new("#000000")],
            font_family: "Roboto".to_string(),
            letter_spacing: 0.1,
            text_horizontal_align: TextHorizontalAlign::Justify,
            text_vertical_align: TextVerticalAlign::End,
            ..Default::default()
        };
        let attrs = resolve(NodeType::Text, &style, None);

        assert_eq!(attrs.color.as_deref(), Some("#000000"));
        assert_eq!(attrs.background, None);
        assert_eq!(attrs.font_family.as_deref(), Some("Roboto"));
        assert_eq!(attrs.text_align, Some(TextAlign::Justify));
        assert_eq!(attrs.justify_content, Some(FlexAlign::FlexEnd));
        assert_eq!(attrs.flex_direction, Some(FlexDirection::Column));
        assert_eq!(attrs.white_space, Some(WhiteSpace::BreakSpaces));
    }

    #[test]
    fn test_text_without_fill_is_transparent() {
        let attrs = resolve(NodeType::Text, &StyleRecord::default(), None);
        assert_eq!(attrs.color.as_deref(), Some("transparent"));
    }

    #[test]
    fn test_instance_gets_box_attributes_only() {
        let attrs = resolve(NodeType::Instance, &StyleRecord::default(), None);
        assert_eq!(attrs.position, Some(Position::Absolute));
        assert_eq!(attrs.opacity, Some(1.0));
        assert_eq!(attrs.display, None);
        assert_eq!(attrs.background, None);
    }

    #[test]
    fn test_css_rendering() {
        let attrs = resolve(NodeType::Text, &fill_both(), Some(StackDirection::X));
        let css = attrs.to_css();

        assert!(css.contains(&("position", "relative".to_string())));
        assert!(css.contains(&("flex", "1".to_string())));
        assert!(css.contains(&("align-self", "stretch".to_string())));
        assert!(css.contains(&("white-space", "break-spaces".to_string())));
        assert!(css.contains(&("letter-spacing", "0em".to_string())));
    }

    #[test]
    fn test_serialized_attributes() {
        let attrs = resolve(NodeType::Frame, &fill_both(), None);
        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["width"], "100%");
        assert_eq!(json["justifyContent"], "flex-start");
        assert!(json.get("color").is_none());
    }
}
