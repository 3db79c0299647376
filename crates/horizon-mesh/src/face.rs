//! The six faces of an LOD column prism.

use horizon_lod::Direction;

/// Direction a face points. Side faces match the horizontal
/// [`Direction`]s: north is −Z, east is +X.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    Up = 0,
    Down = 1,
    North = 2,
    South = 3,
    East = 4,
    West = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Up,
        Face::Down,
        Face::North,
        Face::South,
        Face::East,
        Face::West,
    ];

    pub const SIDES: [Face; 4] = [Face::North, Face::South, Face::East, Face::West];

    /// Outward unit normal.
    pub fn normal(self) -> [i8; 3] {
        match self {
            Face::Up => [0, 1, 0],
            Face::Down => [0, -1, 0],
            Face::North => [0, 0, -1],
            Face::South => [0, 0, 1],
            Face::East => [1, 0, 0],
            Face::West => [-1, 0, 0],
        }
    }

    /// Horizontal direction of a side face, `None` for up and down.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Face::North => Some(Direction::North),
            Face::South => Some(Direction::South),
            Face::East => Some(Direction::East),
            Face::West => Some(Direction::West),
            Face::Up | Face::Down => None,
        }
    }

    pub fn from_direction(dir: Direction) -> Self {
        match dir {
            Direction::North => Face::North,
            Direction::South => Face::South,
            Direction::East => Face::East,
            Direction::West => Face::West,
        }
    }

    /// Normal as stored in a vertex, snorm-scaled.
    pub fn packed_normal(self) -> [i8; 3] {
        self.normal().map(|c| c * 127)
    }

    /// Brightness factor for multiplicative face shading.
    pub fn shade_factor(self) -> f32 {
        match self {
            Face::Up => 1.0,
            Face::Down => 0.5,
            Face::North | Face::South => 0.8,
            Face::East | Face::West => 0.6,
        }
    }

    /// Channel offset for additive face shading.
    pub fn shade_offset(self) -> i32 {
        match self {
            Face::Up => 0,
            Face::Down => -96,
            Face::North | Face::South => -40,
            Face::East | Face::West => -64,
        }
    }

    /// Unit cube corners in counter-clockwise order seen from outside.
    pub fn template(self) -> [[u8; 3]; 4] {
        match self {
            Face::Up => [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]],
            Face::Down => [[1, 0, 0], [1, 0, 1], [0, 0, 1], [0, 0, 0]],
            Face::East => [[1, 1, 0], [1, 1, 1], [1, 0, 1], [1, 0, 0]],
            Face::West => [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]],
            Face::South => [[1, 0, 1], [1, 1, 1], [0, 1, 1], [0, 0, 1]],
            Face::North => [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn corner(c: [u8; 3]) -> Vec3 {
        Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32)
    }

    #[test]
    fn test_templates_wind_counter_clockwise_outward() {
        for face in Face::ALL {
            let t = face.template();
            let (a, b, c) = (corner(t[0]), corner(t[1]), corner(t[2]));
            let n = (b - a).cross(c - a).normalize();
            let expected = face.normal();
            let expected = Vec3::new(expected[0] as f32, expected[1] as f32, expected[2] as f32);
            assert!(
                (n - expected).length() < 1e-6,
                "{face:?} winds towards {n:?}, expected {expected:?}"
            );
        }
    }

    #[test]
    fn test_direction_roundtrip() {
        for face in Face::SIDES {
            let dir = face.direction().unwrap();
            assert_eq!(Face::from_direction(dir), face);
        }
        assert_eq!(Face::Up.direction(), None);
    }
}
