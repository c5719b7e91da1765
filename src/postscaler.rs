//! Postscaler lookup: total decimation factor to (inner, outer) depths.

/// Capacity of the fast (inner) averager ring.
pub const INNER_CAPACITY: usize = 16;
/// Capacity of the slow (outer) averager ring.
pub const OUTER_CAPACITY: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Postscaler {
    pub factor: u8,
    pub inner: u8,
    pub outer: u8,
}

const fn entry(factor: u8, inner: u8, outer: u8) -> Postscaler {
    Postscaler { factor, inner, outer }
}

/// Sorted by factor. `factor == max(inner, 1) * max(outer, 1)` for every row.
pub const TABLE: [Postscaler; 20] = [
    entry(1, 0, 0),
    entry(2, 2, 0),
    entry(3, 3, 0),
    entry(4, 4, 0),
    entry(5, 5, 0),
    entry(6, 6, 0),
    entry(8, 8, 0),
    entry(10, 10, 0),
    entry(12, 12, 0),
    entry(15, 15, 0),
    entry(20, 10, 2),
    entry(30, 10, 3),
    entry(40, 10, 4),
    entry(50, 10, 5),
    entry(60, 10, 6),
    entry(80, 10, 8),
    entry(100, 10, 10),
    entry(120, 12, 10),
    entry(150, 15, 10),
    entry(225, 15, 15),
];

/// Depth 0 counts as a factor of one.
pub const fn factor_of(inner: u8, outer: u8) -> u16 {
    let i = if inner == 0 { 1 } else { inner as u16 };
    let o = if outer == 0 { 1 } else { outer as u16 };
    i * o
}

/// Largest entry not above `requested`. Requests past the end get the last
/// entry, requests below the first get the first.
pub fn resolve(requested: u8) -> Postscaler {
    TABLE
        .iter()
        .rev()
        .find(|e| e.factor <= requested)
        .copied()
        .unwrap_or(TABLE[0])
}
