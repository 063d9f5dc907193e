// SnapNet: Snapping public-transport schedules onto multimodal network graphs
// Copyright (C) 2024 The SnapNet Developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Hierarchical geospatial cells, spherical caps and great-circle distances.
//!
//! A [`CellId`] identifies a cell of a recursive 4-way subdivision of the lat/lng
//! rectangle. The 64-bit id stores the bit-interleaved cell position, followed by a
//! sentinel bit that marks the cell's level: `lsb = 1 << (2 * (MAX_LEVEL - level))`.
//! Coarser cells are prefixes of finer ones, so parents are obtained with pure bit
//! arithmetic. Level [`MAX_LEVEL`] cells are about two centimeters across.

use std::f64::consts::PI;

/// Mean earth radius in meters, used for all spherical distance computations.
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// Cell levels at which graph nodes are indexed in the spatial tree, coarse to fine.
/// Level 0 is the common parent of all indexed cells, below the synthetic super-root.
pub const INDEXING_LEVELS: [u8; 7] = [0, 6, 8, 12, 18, 24, 30];

/// The finest cell level.
pub const MAX_LEVEL: u8 = 30;

/// A position on the sphere, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    /// Latitude in degrees, in `[-90, 90]`.
    pub lat: f64,
    /// Longitude in degrees, in `[-180, 180)`.
    pub lng: f64,
}

impl LatLng {
    /// Create a new position, clamping the latitude and wrapping the longitude into
    /// their valid ranges.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lng: (lng + 180.0).rem_euclid(360.0) - 180.0,
        }
    }

    /// Great-circle distance to `other` as an angle in radians (haversine formula).
    pub fn distance_radians(&self, other: &Self) -> f64 {
        let lat_a = self.lat.to_radians();
        let lat_b = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * a.sqrt().min(1.0).asin()
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_m(&self, other: &Self) -> f64 {
        self.distance_radians(other) * EARTH_RADIUS
    }

    /// The position as a unit vector on the sphere.
    fn to_point(self) -> [f64; 3] {
        let lat = self.lat.to_radians();
        let lng = self.lng.to_radians();
        [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
    }

    /// The position under a (not necessarily unit) vector on the sphere.
    fn from_point(p: [f64; 3]) -> Self {
        let lat = p[2].atan2(p[0].hypot(p[1])).to_degrees();
        let lng = p[1].atan2(p[0]).to_degrees();
        Self::new(lat, lng)
    }
}

/// Spread the lower 32 bits of `x` so they occupy the even bit positions.
fn spread(x: u64) -> u64 {
    let mut x = x & 0xffff_ffff;
    x = (x | (x << 16)) & 0x0000_ffff_0000_ffff;
    x = (x | (x << 8)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

/// Inverse of [`spread`]: collect the even bit positions of `x` into the lower 32 bits.
fn compact(x: u64) -> u64 {
    let mut x = x & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x >> 4)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x >> 8)) & 0x0000_ffff_0000_ffff;
    x = (x | (x >> 16)) & 0x0000_0000_ffff_ffff;
    x
}

/// A 64-bit hierarchical geospatial cell identifier at a specific level.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CellId(u64);

impl std::fmt::Debug for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CellId({}/{})", self.0, self.level())
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CellId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl CellId {
    /// Encode a position into the level-[`MAX_LEVEL`] cell containing it.
    pub fn from_degrees(lat: f64, lng: f64) -> Self {
        let pos = LatLng::new(lat, lng);
        let cells = 1u64 << MAX_LEVEL;
        let u = (pos.lng + 180.0) / 360.0;
        let v = (pos.lat + 90.0) / 180.0;
        let i = ((u * cells as f64) as u64).min(cells - 1);
        let j = ((v * cells as f64) as u64).min(cells - 1);
        Self::from_position(spread(i) | (spread(j) << 1), MAX_LEVEL)
    }

    /// Build a cell id from its interleaved position and level.
    fn from_position(pos: u64, level: u8) -> Self {
        let shift = 2 * (MAX_LEVEL - level) as u32;
        Self((pos << (shift + 1)) | (1u64 << shift))
    }

    /// The raw 64-bit id.
    pub fn id(self) -> u64 {
        self.0
    }

    /// The level of this cell, in `0..=MAX_LEVEL`.
    pub fn level(self) -> u8 {
        MAX_LEVEL - (self.0.trailing_zeros() / 2) as u8
    }

    /// The interleaved cell position at this cell's level.
    fn position(self) -> u64 {
        self.0 >> (self.0.trailing_zeros() + 1)
    }

    /// The ancestor of this cell at the given coarser level.
    pub fn parent(self, level: u8) -> Self {
        let level = level.min(self.level());
        let pos = self.position() >> (2 * (self.level() - level) as u32);
        Self::from_position(pos, level)
    }

    /// The ancestor chain of this cell at the fixed [`INDEXING_LEVELS`], coarse to fine.
    pub fn ancestors(self) -> Vec<CellId> {
        INDEXING_LEVELS.iter().map(|l| self.parent(*l)).collect()
    }

    /// The position of the cell center.
    pub fn center(self) -> LatLng {
        let level = self.level();
        let pos = self.position();
        let cells = (1u64 << level) as f64;
        let i = compact(pos) as f64;
        let j = compact(pos >> 1) as f64;
        LatLng::new(
            ((j + 0.5) / cells) * 180.0 - 90.0,
            ((i + 0.5) / cells) * 360.0 - 180.0,
        )
    }

    /// Great-circle distance between the centers of two cells, in meters.
    pub fn distance_m(self, other: CellId) -> f64 {
        self.center().distance_m(&other.center())
    }

    /// Upper bound on the angular distance (radians) between the cell center and any
    /// point of the cell: half the latitude span plus half the longitude span.
    pub fn circumradius(self) -> f64 {
        1.5 * PI / (1u64 << self.level()) as f64
    }
}

/// A spherical cap: the region of the sphere within `radius` radians of `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cap {
    /// Center of the cap.
    center: LatLng,
    /// Opening angle of the cap in radians.
    radius: f64,
}

impl Cap {
    /// Build a cap of the given opening angle (radians) around a cell center.
    pub fn from_cell(cell: CellId, angle: f64) -> Self {
        Self {
            center: cell.center(),
            radius: angle,
        }
    }

    /// Build a cap covering all given cells plus an `angle` buffer: the center is the
    /// normalized midpoint of the cell centers, the radius is the largest distance from
    /// the midpoint to any cell center, plus `angle`. Returns `None` for an empty slice.
    pub fn covering(cells: &[CellId], angle: f64) -> Option<Self> {
        let points: Vec<[f64; 3]> = cells.iter().map(|c| c.center().to_point()).collect();
        let sum = points
            .iter()
            .fold([0.0; 3], |acc, p| [acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]]);
        if points.is_empty() {
            return None;
        }
        let center = LatLng::from_point(sum);
        let dist = cells
            .iter()
            .map(|c| center.distance_radians(&c.center()))
            .fold(0.0, f64::max);
        Some(Self {
            center,
            radius: dist + angle,
        })
    }

    /// Center of the cap.
    pub fn center(&self) -> LatLng {
        self.center
    }

    /// Opening angle of the cap in radians.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Whether the cap may intersect the given cell. Conservative: the answer is exact
    /// up to the cell's circumradius bound, so false positives occur at cell boundaries
    /// but false negatives never do.
    pub fn may_intersect(&self, cell: CellId) -> bool {
        self.center.distance_radians(&cell.center()) <= self.radius + cell.circumradius()
    }

    /// Whether the center of the given cell lies within the cap.
    pub fn contains(&self, cell: CellId) -> bool {
        self.center.distance_radians(&cell.center()) <= self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn encode_and_level() {
        let cell = CellId::from_degrees(53.483959, -2.244644);
        assert_eq!(cell.level(), MAX_LEVEL);
        for level in [0, 6, 8, 12, 18, 24, 30] {
            assert_eq!(cell.parent(level).level(), level);
        }
    }

    #[test]
    fn parents_contain_children() {
        let cell = CellId::from_degrees(49.766, -7.557);
        for level in [0, 6, 8, 12, 18, 24] {
            let parent = cell.parent(level);
            // the child center must lie within the parent's circumradius
            assert!(
                parent.center().distance_radians(&cell.center()) <= parent.circumradius()
            );
            // parents at the same level are idempotent
            assert_eq!(parent.parent(level), parent);
        }
    }

    #[test]
    fn ancestors_follow_indexing_levels() {
        let cell = CellId::from_degrees(49.766, -7.557);
        let chain = cell.ancestors();
        assert_eq!(chain.len(), INDEXING_LEVELS.len());
        for (ancestor, level) in chain.iter().zip(INDEXING_LEVELS) {
            assert_eq!(ancestor.level(), level);
        }
        assert_eq!(*chain.last().unwrap(), cell);
    }

    #[test]
    fn distance_of_identical_cells_is_zero() {
        let a = CellId::from_degrees(53.483959, -2.244644);
        let b = CellId::from_degrees(53.483959, -2.244644);
        assert_eq!(a, b);
        assert_eq!(a.distance_m(b), 0.0);
    }

    #[test]
    fn distance_against_reference_value() {
        // one degree of latitude is roughly 111.2 km on this sphere
        let a = CellId::from_degrees(49.0, -7.0);
        let b = CellId::from_degrees(50.0, -7.0);
        assert_relative_eq!(
            a.distance_m(b),
            EARTH_RADIUS * 1f64.to_radians(),
            max_relative = 1e-4
        );
    }

    #[test]
    fn cap_membership() {
        let center = CellId::from_degrees(49.766, -7.557);
        // 30 meters
        let cap = Cap::from_cell(center, 30.0 / EARTH_RADIUS);
        let near = CellId::from_degrees(49.7661, -7.557); // ~11 m
        let far = CellId::from_degrees(49.767, -7.557); // ~111 m
        assert!(cap.contains(near));
        assert!(cap.may_intersect(near));
        assert!(!cap.contains(far));
        assert!(!cap.may_intersect(far));
    }

    #[test]
    fn covering_cap_is_roughly_equidistant_from_both_cells() {
        let a = CellId::from_degrees(51.5074, -0.1278);
        let b = CellId::from_degrees(51.5080, -0.1290);
        let cap = Cap::covering(&[a, b], 0.0).unwrap();
        let d_a = cap.center().distance_radians(&a.center());
        let d_b = cap.center().distance_radians(&b.center());
        assert!(cap.contains(a));
        assert!(cap.contains(b));
        assert_relative_eq!(d_a, d_b, max_relative = 1e-6);
    }

    #[test]
    fn covering_cap_of_nothing_is_none() {
        assert!(Cap::covering(&[], 0.1).is_none());
    }
}
