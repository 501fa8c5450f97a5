use serde::Serialize;
use serde_with::DeserializeFromStr;
use strum::{Display as StrumDisplay, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which axis a drag is measured along.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    DeserializeFromStr,
    EnumString,
    EnumIter,
    StrumDisplay,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Rig {
    /// Only horizontal movement turns the object.
    #[default]
    #[strum(to_string = "horizontal", serialize = "h", serialize = "x")]
    Horizontal,
    /// Horizontal and vertical movement are summed, so a diagonal drag counts double.
    #[strum(to_string = "combined", serialize = "xy", serialize = "diagonal")]
    Combined,
}

impl Rig {
    /// Projects a point onto the rig's drag axis.
    pub fn coordinate(&self, point: Point) -> f64 {
        match self {
            Rig::Horizontal => point.x,
            Rig::Combined => point.x + point.y,
        }
    }
}

/// A document-level event stream the controller can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Mouse,
    Touch,
    Wheel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    PointerLeave,
    TouchStart(Point),
    TouchMove(Point),
    TouchEnd,
    Wheel(f64),
}

impl InputEvent {
    /// The listener channel that delivers this event, or `None` for events raised on the
    /// viewer surface itself (drag starts).
    pub fn channel(&self) -> Option<Channel> {
        match self {
            InputEvent::PointerDown(_) | InputEvent::TouchStart(_) => None,
            InputEvent::PointerMove(_) | InputEvent::PointerUp | InputEvent::PointerLeave => {
                Some(Channel::Mouse)
            }
            InputEvent::TouchMove(_) | InputEvent::TouchEnd => Some(Channel::Touch),
            InputEvent::Wheel(_) => Some(Channel::Wheel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_deserialization() {
        let cases = vec![
            ("\"horizontal\"", Rig::Horizontal),
            ("\"Horizontal\"", Rig::Horizontal),
            ("\"x\"", Rig::Horizontal),
            ("\"combined\"", Rig::Combined),
            ("\"XY\"", Rig::Combined),
            ("\"diagonal\"", Rig::Combined),
        ];

        for (json, expected) in cases {
            let deserialized: Rig = serde_json::from_str(json).unwrap();
            assert_eq!(deserialized, expected);
        }
    }

    #[test]
    fn test_rig_coordinate() {
        let p = Point::new(10.0, 4.0);
        assert_eq!(Rig::Horizontal.coordinate(p), 10.0);
        assert_eq!(Rig::Combined.coordinate(p), 14.0);
    }

    #[test]
    fn test_event_channels() {
        assert_eq!(InputEvent::PointerDown(Point::default()).channel(), None);
        assert_eq!(InputEvent::PointerLeave.channel(), Some(Channel::Mouse));
        assert_eq!(InputEvent::TouchEnd.channel(), Some(Channel::Touch));
        assert_eq!(InputEvent::Wheel(-1.0).channel(), Some(Channel::Wheel));
    }
}
