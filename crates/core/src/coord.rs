//! Integer grid geometry: coordinates, faces, extents and regions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A world-absolute (or schematic-relative) block coordinate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const ZERO: Coord = Coord { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub const fn above(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub const fn above_n(self, n: i32) -> Self {
        self.offset(0, n, 0)
    }

    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }

    pub const fn below_n(self, n: i32) -> Self {
        self.offset(0, -n, 0)
    }

    /// The neighbouring cell across `face`.
    pub fn relative(self, face: Face) -> Self {
        let (dx, dy, dz) = face.step();
        self.offset(dx, dy, dz)
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Squared euclidean distance between the centres of two cells.
    pub fn distance_sq(self, other: Coord) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        let dz = i64::from(self.z - other.z);
        dx * dx + dy * dy + dz * dz
    }
}

impl Add for Coord {
    type Output = Coord;

    fn add(self, rhs: Coord) -> Coord {
        self.offset(rhs.x, rhs.y, rhs.z)
    }
}

impl Sub for Coord {
    type Output = Coord;

    fn sub(self, rhs: Coord) -> Coord {
        self.offset(-rhs.x, -rhs.y, -rhs.z)
    }
}

impl From<[i32; 3]> for Coord {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Coord> for [i32; 3] {
    fn from(c: Coord) -> Self {
        [c.x, c.y, c.z]
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Face {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Down,
        Face::Up,
        Face::North,
        Face::South,
        Face::West,
        Face::East,
    ];

    /// Every face except `Up`: horizontals first, then down.
    pub const HORIZONTALS_AND_DOWN: [Face; 5] = [
        Face::North,
        Face::South,
        Face::West,
        Face::East,
        Face::Down,
    ];

    pub const fn step(self) -> (i32, i32, i32) {
        match self {
            Face::Down => (0, -1, 0),
            Face::Up => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }

    pub const fn opposite(self) -> Face {
        match self {
            Face::Down => Face::Up,
            Face::Up => Face::Down,
            Face::North => Face::South,
            Face::South => Face::North,
            Face::West => Face::East,
            Face::East => Face::West,
        }
    }
}

/// The bounding box size of a schematic: width (x), height (y), length (z).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub width: i32,
    pub height: i32,
    pub length: i32,
}

impl Extent {
    pub const fn new(width: i32, height: i32, length: i32) -> Self {
        Self {
            width,
            height,
            length,
        }
    }

    /// Whether every axis is strictly positive.
    pub fn is_buildable(&self) -> bool {
        self.width > 0 && self.height > 0 && self.length > 0
    }

    pub fn volume(&self) -> u64 {
        if !self.is_buildable() {
            return 0;
        }
        self.width as u64 * self.height as u64 * self.length as u64
    }

    /// Whether a schematic-relative coordinate lies inside the box.
    pub fn contains(&self, rel: Coord) -> bool {
        rel.x >= 0
            && rel.y >= 0
            && rel.z >= 0
            && rel.x < self.width
            && rel.y < self.height
            && rel.z < self.length
    }

    /// Every relative coordinate, y-major then z then x.
    pub fn iter(self) -> impl Iterator<Item = Coord> {
        (0..self.height.max(0)).flat_map(move |y| {
            (0..self.length.max(0))
                .flat_map(move |z| (0..self.width.max(0)).map(move |x| Coord::new(x, y, z)))
        })
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.length)
    }
}

/// An inclusive, axis-aligned box between two corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub min: Coord,
    pub max: Coord,
}

impl Region {
    /// The bounding box of two arbitrary corners.
    pub fn spanning(a: Coord, b: Coord) -> Self {
        Self {
            min: Coord::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Coord::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(
            self.max.x - self.min.x + 1,
            self.max.y - self.min.y + 1,
            self.max.z - self.min.z + 1,
        )
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.min.x
            && c.y >= self.min.y
            && c.z >= self.min.z
            && c.x <= self.max.x
            && c.y <= self.max.y
            && c.z <= self.max.z
    }

    /// A cube of `radius` around `center`.
    pub fn around(center: Coord, radius: i32) -> Self {
        Self {
            min: center.offset(-radius, -radius, -radius),
            max: center.offset(radius, radius, radius),
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Coord> {
        let min = self.min;
        self.extent().iter().map(move |rel| min + rel)
    }
}
