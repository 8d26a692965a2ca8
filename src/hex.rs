//! Hex tiles, grid coordinates and the offset-row neighbour layout.

use indexmap::IndexSet;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::hash::Hash;

/// Cell address on the board. Signed so neighbour arithmetic can step off the edge;
/// lookups outside the board simply find no hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn neighbour(self, n: Neighbour) -> Self {
        n.of(self)
    }

    /// The six cells around `self`, in [`Neighbour::RING`] order.
    pub fn ring(self) -> [Self; 6] {
        Neighbour::RING.map(|n| n.of(self))
    }
}

/// Direction to one of the six cells touching a hex.
///
/// Rows are horizontally offset: odd rows sit half a cell left of even rows,
/// so the diagonal neighbours depend on the parity of the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Neighbour {
    BottomLeft,
    Left,
    TopLeft,
    TopRight,
    Right,
    BottomRight,
}

impl Neighbour {
    /// Clockwise on screen (y grows downward), starting at the bottom-left slot.
    /// A clockwise turn moves every hex one step forward in this order.
    pub const RING: [Self; 6] = [
        Self::BottomLeft,
        Self::Left,
        Self::TopLeft,
        Self::TopRight,
        Self::Right,
        Self::BottomRight,
    ];

    /// The three straight lines through a hex, as (first, second) pairs in scan order.
    pub const LINES: [(Self, Self); 3] = [
        (Self::Right, Self::Left),
        (Self::TopLeft, Self::BottomRight),
        (Self::TopRight, Self::BottomLeft),
    ];

    pub fn of(self, at: Coord) -> Coord {
        let odd = at.y.rem_euclid(2);
        let Coord { x, y } = at;
        match self {
            Self::BottomLeft => Coord::new(x - odd, y + 1),
            Self::Left => Coord::new(x - 1, y),
            Self::TopLeft => Coord::new(x - odd, y - 1),
            Self::TopRight => Coord::new(x - odd + 1, y - 1),
            Self::Right => Coord::new(x + 1, y),
            Self::BottomRight => Coord::new(x - odd + 1, y + 1),
        }
    }
}

/// Identity of one physical tile. Never reused for the lifetime of a [`HexFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexId(u64);

impl HexId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A coloured tile. The id lets renderers follow a tile as it moves between cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hex {
    pub id: HexId,
    /// Colour index in `0..colors`.
    pub color: u8,
}

/// A hex together with the cell it occupies; snapshot handed to animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placed {
    pub at: Coord,
    pub hex: Hex,
}

/// One hex sliding left by `distance` cells to close a gap in its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShiftEntry {
    pub at: Coord,
    pub distance: u32,
}

/// Hands out hexes with fresh ids and random colours.
#[derive(Debug)]
pub struct HexFactory {
    next_id: u64,
    colors: u8,
    rng: SmallRng,
    /// Colours handed out before falling back to the rng.
    queued: VecDeque<u8>,
}

impl HexFactory {
    /// `seed` makes the colour sequence reproducible; `None` seeds from the OS.
    pub fn new(colors: u8, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self {
            next_id: 0,
            colors: colors.max(1),
            rng,
            queued: VecDeque::new(),
        }
    }

    pub fn colors(&self) -> u8 {
        self.colors
    }

    /// New hex with a random colour.
    pub fn spawn(&mut self) -> Hex {
        let color = match self.queued.pop_front() {
            Some(c) => c % self.colors,
            None => self.rng.random_range(0..self.colors),
        };
        self.with_color(color)
    }

    /// New hex with the given colour (wrapped into range).
    pub fn with_color(&mut self, color: u8) -> Hex {
        let id = HexId(self.next_id);
        self.next_id += 1;
        Hex {
            id,
            color: color % self.colors,
        }
    }

    /// Fix the colours of the next hexes handed out by [`spawn`](Self::spawn).
    #[cfg(test)]
    pub fn queue_colors(&mut self, colors: impl IntoIterator<Item = u8>) {
        self.queued.extend(colors);
    }
}

/// Drops repeated entries, keeping the first occurrence of each in its original position.
pub fn unique<T: Hash + Eq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    items.into_iter().collect::<IndexSet<T>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_neighbours_even_row() {
        let c = Coord::new(3, 4);
        assert_eq!(c.neighbour(Neighbour::TopLeft), Coord::new(3, 3));
        assert_eq!(c.neighbour(Neighbour::TopRight), Coord::new(4, 3));
        assert_eq!(c.neighbour(Neighbour::BottomLeft), Coord::new(3, 5));
        assert_eq!(c.neighbour(Neighbour::BottomRight), Coord::new(4, 5));
        assert_eq!(c.neighbour(Neighbour::Left), Coord::new(2, 4));
        assert_eq!(c.neighbour(Neighbour::Right), Coord::new(4, 4));
    }

    #[test]
    fn test_neighbours_odd_row() {
        let c = Coord::new(3, 3);
        assert_eq!(c.neighbour(Neighbour::TopLeft), Coord::new(2, 2));
        assert_eq!(c.neighbour(Neighbour::TopRight), Coord::new(3, 2));
        assert_eq!(c.neighbour(Neighbour::BottomLeft), Coord::new(2, 4));
        assert_eq!(c.neighbour(Neighbour::BottomRight), Coord::new(3, 4));
    }

    #[test]
    fn test_lines_are_opposite() {
        // Each line's two ends are each other's neighbour mirrored through the centre.
        for y in 0..4 {
            let c = Coord::new(3, y);
            for (a, b) in Neighbour::LINES {
                let (pa, pb) = (c.neighbour(a), c.neighbour(b));
                assert_eq!(pa.y - c.y, c.y - pb.y);
                assert_ne!(pa, pb);
            }
        }
    }

    #[test]
    fn test_ring_has_six_distinct_cells() {
        let ring = Coord::new(2, 2).ring();
        let set: HashSet<_> = ring.iter().collect();
        assert_eq!(set.len(), 6);
        assert!(!ring.contains(&Coord::new(2, 2)));
    }

    #[test]
    fn test_factory_ids_unique_and_colors_in_range() {
        let mut f = HexFactory::new(4, Some(9));
        let hexes: Vec<Hex> = (0..500).map(|_| f.spawn()).collect();
        let ids: HashSet<_> = hexes.iter().map(|h| h.id).collect();
        assert_eq!(ids.len(), hexes.len());
        assert!(hexes.iter().all(|h| h.color < 4));
    }

    #[test]
    fn test_factory_seed_reproducible() {
        let mut a = HexFactory::new(6, Some(1234));
        let mut b = HexFactory::new(6, Some(1234));
        let ca: Vec<u8> = (0..32).map(|_| a.spawn().color).collect();
        let cb: Vec<u8> = (0..32).map(|_| b.spawn().color).collect();
        assert_eq!(ca, cb);
    }

    #[test]
    fn test_factory_queued_colors_first() {
        let mut f = HexFactory::new(6, Some(0));
        f.queue_colors([5, 0, 8]);
        assert_eq!(f.spawn().color, 5);
        assert_eq!(f.spawn().color, 0);
        assert_eq!(f.spawn().color, 2);
    }

    #[test]
    fn test_unique_keeps_first_occurrence_order() {
        let items = [
            Coord::new(3, 3),
            Coord::new(4, 3),
            Coord::new(3, 3),
            Coord::new(2, 3),
            Coord::new(4, 3),
        ];
        assert_eq!(
            unique(items),
            vec![Coord::new(3, 3), Coord::new(4, 3), Coord::new(2, 3)]
        );
    }

    #[test]
    fn test_unique_shift_entries_by_distance() {
        let a = ShiftEntry { at: Coord::new(5, 1), distance: 1 };
        let b = ShiftEntry { at: Coord::new(5, 1), distance: 2 };
        assert_eq!(unique([a, b, a]), vec![a, b]);
    }
}
