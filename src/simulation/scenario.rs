//! Built-in downtown street grid used by the headless driver

use super::topology::Topology;

/// North/south avenues, west to east
pub const AVENUES: [&str; 9] = [
    "N Wacker", "Franklin", "Wells", "Lasalle", "Clark", "Dearborn", "State", "Wabash", "Michigan",
];

/// East/west streets, south to north
pub const STREETS: [&str; 8] = [
    "Jackson",
    "Adams",
    "Monroe",
    "Madison",
    "Washington",
    "Randolph",
    "Lake",
    "W Wacker",
];

/// Two-way grid of every avenue/street crossing
pub fn downtown_grid(road_capacity: u32, intersection_capacity: u32) -> Topology {
    Topology::grid(&AVENUES, &STREETS, road_capacity, intersection_capacity)
}
