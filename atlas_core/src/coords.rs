//! Axial hex geometry for flat-top grids.

pub use atlas_schema::CellKey;

/// Neighbour offsets in axial `(dq, dr)` form. Index `i` is the neighbour
/// across the edge running from corner `i` to corner `i + 1`.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (0, 1), (-1, 1), (-1, 0), (0, -1), (1, -1)];

pub fn neighbor(q: i32, r: i32, direction: usize) -> (i32, i32) {
    let (dq, dr) = DIRECTIONS[direction % 6];
    (q + dq, r + dr)
}

pub fn neighbors(key: CellKey) -> impl Iterator<Item = CellKey> {
    DIRECTIONS
        .iter()
        .map(move |&(dq, dr)| CellKey::new(key.panel, key.q + dq, key.r + dr))
}

/// Centre of a hex in panel-local pixel space.
pub fn pixel_center(q: i32, r: i32, radius: f64) -> (f64, f64) {
    let q = f64::from(q);
    let r = f64::from(r);
    (1.5 * radius * q, 3f64.sqrt() * radius * (r + q / 2.0))
}

/// Offset of corner `i` from the hex centre.
pub fn corner_offset(corner: usize, radius: f64) -> (f64, f64) {
    let angle = std::f64::consts::FRAC_PI_3 * (corner % 6) as f64;
    (radius * angle.cos(), radius * angle.sin())
}

/// The two pixel corners bounding side `i` of the hex at `(q, r)`.
pub fn edge_endpoints(q: i32, r: i32, side: usize, radius: f64) -> [(f64, f64); 2] {
    let (cx, cy) = pixel_center(q, r, radius);
    let (ax, ay) = corner_offset(side, radius);
    let (bx, by) = corner_offset(side + 1, radius);
    [(cx + ax, cy + ay), (cx + bx, cy + by)]
}

/// Pixel position snapped to a 1/1000 lattice so shared corners of adjacent
/// hexes compare equal.
pub fn snap_point((x, y): (f64, f64)) -> (i64, i64) {
    ((x * 1000.0).round() as i64, (y * 1000.0).round() as i64)
}
