//! Left/right hold tracking from keyboard and touch

use crate::sim::TickInput;

/// Which rotation a key or touch maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Arrow keys and A/D
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" | "a" | "A" => Some(Side::Left),
            "ArrowRight" | "d" | "D" => Some(Side::Right),
            _ => None,
        }
    }

    /// Touches on the left half of the screen rotate left
    pub fn from_touch(x: f64, screen_width: f64) -> Self {
        if x < screen_width / 2.0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

/// Currently held directions
#[derive(Debug, Clone, Copy, Default)]
pub struct HeldInput {
    left: bool,
    right: bool,
}

impl HeldInput {
    pub fn set(&mut self, side: Side, held: bool) {
        match side {
            Side::Left => self.left = held,
            Side::Right => self.right = held,
        }
    }

    pub fn key_down(&mut self, key: &str) {
        if let Some(side) = Side::from_key(key) {
            self.set(side, true);
        }
    }

    pub fn key_up(&mut self, key: &str) {
        if let Some(side) = Side::from_key(key) {
            self.set(side, false);
        }
    }

    /// Drop every hold (focus loss, touch cancel)
    pub fn release_all(&mut self) {
        *self = Self::default();
    }

    pub fn tick_input(&self) -> TickInput {
        TickInput {
            left: self.left,
            right: self.right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(Side::from_key("ArrowLeft"), Some(Side::Left));
        assert_eq!(Side::from_key("a"), Some(Side::Left));
        assert_eq!(Side::from_key("D"), Some(Side::Right));
        assert_eq!(Side::from_key("w"), None);
    }

    #[test]
    fn test_hold_and_release() {
        let mut held = HeldInput::default();
        held.key_down("ArrowLeft");
        held.key_down("d");
        assert_eq!(held.tick_input(), TickInput { left: true, right: true });
        held.key_up("A");
        assert_eq!(held.tick_input(), TickInput { left: false, right: true });
        held.release_all();
        assert_eq!(held.tick_input(), TickInput::default());
    }

    #[test]
    fn test_touch_halves() {
        assert_eq!(Side::from_touch(10.0, 400.0), Side::Left);
        assert_eq!(Side::from_touch(200.0, 400.0), Side::Right);
    }
}
