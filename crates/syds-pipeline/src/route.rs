//! Waste routes: shortest walkway path from each tenant to a bin.
//!
//! Routing runs on an [`OccupancyGrid`] of coded cells. Every tenant cell
//! gets its own breadth-first search over 4-connected neighbours, explored
//! in the fixed order left, right, up, down. Walls are impassable; all
//! other cells are walkable. The search stops at the first bin it
//! dequeues, which is a nearest bin by cell count. A tenant with no
//! reachable bin gets an empty route.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mask::Skeleton;
use crate::stitch::Direction;
use crate::types::{PipelineError, Point};

/// One occupancy grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    /// Walkable floor (code 0).
    Empty,
    /// A tenant door (code 1); walkable.
    Tenant,
    /// A waste bin (code 2); walkable.
    Bin,
    /// Impassable (code 3).
    Wall,
}

impl Cell {
    /// Decode a cell code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Empty),
            1 => Some(Self::Tenant),
            2 => Some(Self::Bin),
            3 => Some(Self::Wall),
            _ => None,
        }
    }

    /// Numeric cell code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Tenant => 1,
            Self::Bin => 2,
            Self::Wall => 3,
        }
    }
}

/// A rectangular grid of [`Cell`]s addressed by `(x, y)`.
///
/// Serializes as an array of rows of cell codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl OccupancyGrid {
    /// Build a grid from rows of cell codes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyGrid`] if there are no cells,
    /// [`PipelineError::RaggedGrid`] if a row differs in width from the
    /// first, and [`PipelineError::UnknownCellCode`] for a code outside
    /// `0..=3`.
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self, PipelineError> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(PipelineError::EmptyGrid);
        }
        let mut cells = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(PipelineError::RaggedGrid {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
            for (x, &code) in row.iter().enumerate() {
                cells.push(Cell::from_code(code).ok_or(PipelineError::UnknownCellCode {
                    x,
                    y,
                    code,
                })?);
            }
        }
        Ok(Self {
            width,
            height: rows.len(),
            cells,
        })
    }

    /// Derive a pixel-level grid from a walkway skeleton.
    ///
    /// Skeleton pixels are walkable, every other pixel is a wall. Where
    /// two skeleton pixels touch only diagonally, the pixel beside the
    /// upper one is opened as well so the 4-connected search can follow
    /// the 8-connected skeleton. Tenant and bin anchors inside the grid
    /// are marked on top; a bin placed on a tenant cell wins. Anchors
    /// outside the grid are ignored.
    #[must_use]
    pub fn from_skeleton(skeleton: &Skeleton, tenants: &[Point], bins: &[Point]) -> Self {
        let width = skeleton.width() as usize;
        let height = skeleton.height() as usize;
        let cells = skeleton
            .cells()
            .iter()
            .map(|&walkable| if walkable { Cell::Empty } else { Cell::Wall })
            .collect();
        let mut grid = Self {
            width,
            height,
            cells,
        };
        for p in skeleton.set_points() {
            for dx in [-1, 1] {
                let beside = p.offset(dx, 0);
                if skeleton.get(p.offset(dx, 1))
                    && !skeleton.get(beside)
                    && !skeleton.get(p.offset(0, 1))
                {
                    grid.set(beside, Cell::Empty);
                }
            }
        }
        for &p in tenants {
            grid.set(p, Cell::Tenant);
        }
        for &p in bins {
            grid.set(p, Cell::Bin);
        }
        grid
    }

    /// Grid width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Cell at `p`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, p: Point) -> Option<Cell> {
        self.index(p).map(|i| self.cells[i])
    }

    /// Overwrite the cell at `p`. Points outside the grid are ignored.
    pub fn set(&mut self, p: Point, cell: Cell) {
        if let Some(i) = self.index(p) {
            self.cells[i] = cell;
        }
    }

    /// Coordinates of every cell of `kind`, in row-major scan order.
    #[must_use]
    pub fn find(&self, kind: Cell) -> Vec<Point> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == kind)
            .filter_map(|(i, _)| self.point(i))
            .collect()
    }

    fn index(&self, p: Point) -> Option<usize> {
        let x = usize::try_from(p.x).ok().filter(|&x| x < self.width)?;
        let y = usize::try_from(p.y).ok().filter(|&y| y < self.height)?;
        Some(y * self.width + x)
    }

    fn point(&self, index: usize) -> Option<Point> {
        let x = i32::try_from(index % self.width).ok()?;
        let y = i32::try_from(index / self.width).ok()?;
        Some(Point::new(x, y))
    }
}

impl Serialize for OccupancyGrid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<Vec<u8>> = self
            .cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|c| c.code()).collect())
            .collect();
        rows.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OccupancyGrid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<Vec<i64>>::deserialize(deserializer)?;
        Self::from_rows(&rows).map_err(serde::de::Error::custom)
    }
}

/// The route of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRoute {
    /// The tenant cell the route starts from.
    pub tenant: Point,
    /// Cells from the tenant to a bin, both included. Empty when no bin
    /// is reachable.
    pub path: Vec<Point>,
}

impl TenantRoute {
    /// `true` if a bin was reached.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        !self.path.is_empty()
    }

    /// The bin the route ends on.
    #[must_use]
    pub fn bin(&self) -> Option<Point> {
        self.path.last().copied()
    }
}

/// Routes of every tenant on a grid, in scan order of the tenant cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    /// One entry per tenant cell.
    pub routes: Vec<TenantRoute>,
}

impl RouteTable {
    /// Number of tenants with a reachable bin.
    #[must_use]
    pub fn reachable(&self) -> usize {
        self.routes.iter().filter(|r| r.is_reachable()).count()
    }

    /// Number of tenants without a reachable bin.
    #[must_use]
    pub fn unreachable(&self) -> usize {
        self.routes.len() - self.reachable()
    }
}

/// Shortest path from `start` to the nearest bin.
///
/// The returned path starts at `start`, ends on a bin cell, and every
/// consecutive pair of cells is 4-adjacent. An empty path means no bin is
/// reachable (or `start` is a wall or outside the grid). If `start` is
/// itself a bin the path is just `[start]`.
#[must_use = "returns the route"]
pub fn solve_route(grid: &OccupancyGrid, start: Point) -> Vec<Point> {
    let Some(start_index) = grid.index(start) else {
        return Vec::new();
    };
    if grid.cells[start_index] == Cell::Wall {
        return Vec::new();
    }

    let mut predecessor: Vec<Option<usize>> = vec![None; grid.cells.len()];
    let mut visited = vec![false; grid.cells.len()];
    let mut queue = VecDeque::new();
    visited[start_index] = true;
    queue.push_back(start_index);

    while let Some(current) = queue.pop_front() {
        if grid.cells[current] == Cell::Bin {
            return reconstruct(grid, &predecessor, current);
        }
        let Some(here) = grid.point(current) else {
            continue;
        };
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            let Some(next) = grid.index(here.offset(dx, dy)) else {
                continue;
            };
            if visited[next] || grid.cells[next] == Cell::Wall {
                continue;
            }
            visited[next] = true;
            predecessor[next] = Some(current);
            queue.push_back(next);
        }
    }
    Vec::new()
}

fn reconstruct(grid: &OccupancyGrid, predecessor: &[Option<usize>], end: usize) -> Vec<Point> {
    let mut path: Vec<Point> =
        std::iter::successors(Some(end), |&i| predecessor[i])
            .filter_map(|i| grid.point(i))
            .collect();
    path.reverse();
    path
}

/// Route every tenant on the grid to its nearest bin.
///
/// Tenants are found by a row-major scan and routed independently.
#[must_use = "returns the route table"]
pub fn solve_routes(grid: &OccupancyGrid) -> RouteTable {
    let tenants = grid.find(Cell::Tenant);
    let bins = grid.find(Cell::Bin);
    if bins.is_empty() && !tenants.is_empty() {
        warn!(tenants = tenants.len(), "grid has tenants but no bins");
    }

    let routes: Vec<TenantRoute> = tenants
        .into_iter()
        .map(|tenant| TenantRoute {
            tenant,
            path: solve_route(grid, tenant),
        })
        .collect();
    let table = RouteTable { routes };
    debug!(
        tenants = table.routes.len(),
        bins = bins.len(),
        reachable = table.reachable(),
        "routes solved"
    );
    table
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::BinaryMask;

    /// 5x5 grid: tenant (0,0), bin (4,4), wall column x = 2 except y = 4.
    fn gap_grid() -> OccupancyGrid {
        OccupancyGrid::from_rows(&[
            vec![1, 0, 3, 0, 0],
            vec![0, 0, 3, 0, 0],
            vec![0, 0, 3, 0, 0],
            vec![0, 0, 3, 0, 0],
            vec![0, 0, 0, 0, 2],
        ])
        .unwrap()
    }

    fn assert_valid_path(grid: &OccupancyGrid, path: &[Point]) {
        for w in path.windows(2) {
            let d = (w[0].x - w[1].x).abs() + (w[0].y - w[1].y).abs();
            assert_eq!(d, 1, "{:?} -> {:?} is not 4-adjacent", w[0], w[1]);
        }
        let mut seen = path.to_vec();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), path.len(), "path repeats a cell");
        assert!(path.iter().all(|&p| grid.get(p) != Some(Cell::Wall)));
    }

    #[test]
    fn route_goes_around_wall_optimally() {
        let grid = gap_grid();
        let path = solve_route(&grid, Point::new(0, 0));
        assert_eq!(path.len(), 9);
        assert_eq!(path.first(), Some(&Point::new(0, 0)));
        assert_eq!(path.last(), Some(&Point::new(4, 4)));
        assert!(path.contains(&Point::new(2, 4)));
        let table = solve_routes(&grid);
        assert_eq!(table.routes[0].bin(), Some(Point::new(4, 4)));
        assert_valid_path(&grid, &path);
    }

    #[test]
    fn enclosed_tenant_is_unreachable() {
        let grid = OccupancyGrid::from_rows(&[
            vec![3, 3, 3, 0],
            vec![3, 1, 3, 0],
            vec![3, 3, 3, 2],
        ])
        .unwrap();
        assert!(solve_route(&grid, Point::new(1, 1)).is_empty());
        let table = solve_routes(&grid);
        assert_eq!(table.routes.len(), 1);
        assert_eq!(table.unreachable(), 1);
    }

    #[test]
    fn nearest_bin_is_chosen() {
        let grid = OccupancyGrid::from_rows(&[vec![2, 0, 0, 1, 0, 2]]).unwrap();
        let path = solve_route(&grid, Point::new(3, 0));
        assert_eq!(path, vec![Point::new(3, 0), Point::new(4, 0), Point::new(5, 0)]);
    }

    #[test]
    fn equal_bins_break_ties_by_exploration_order() {
        // Bins two steps left and two steps right: left is explored first.
        let grid = OccupancyGrid::from_rows(&[vec![2, 0, 1, 0, 2]]).unwrap();
        let path = solve_route(&grid, Point::new(2, 0));
        assert_eq!(path.last(), Some(&Point::new(0, 0)));
    }

    #[test]
    fn tenants_pass_through_other_tenants() {
        let grid = OccupancyGrid::from_rows(&[vec![1, 1, 1, 2]]).unwrap();
        let table = solve_routes(&grid);
        let lengths: Vec<usize> = table.routes.iter().map(|r| r.path.len()).collect();
        assert_eq!(lengths, vec![4, 3, 2]);
        assert_eq!(table.routes[0].tenant, Point::new(0, 0));
    }

    #[test]
    fn tenant_on_bin_cell_is_single_point() {
        let grid = OccupancyGrid::from_rows(&[vec![2, 0]]).unwrap();
        assert_eq!(solve_route(&grid, Point::new(0, 0)), vec![Point::new(0, 0)]);
    }

    #[test]
    fn wall_or_outside_start_gives_empty_route() {
        let grid = gap_grid();
        assert!(solve_route(&grid, Point::new(2, 0)).is_empty());
        assert!(solve_route(&grid, Point::new(-1, 0)).is_empty());
        assert!(solve_route(&grid, Point::new(0, 5)).is_empty());
    }

    #[test]
    fn malformed_grids_are_errors() {
        assert!(matches!(
            OccupancyGrid::from_rows(&[]),
            Err(PipelineError::EmptyGrid)
        ));
        assert!(matches!(
            OccupancyGrid::from_rows(&[vec![]]),
            Err(PipelineError::EmptyGrid)
        ));
        assert!(matches!(
            OccupancyGrid::from_rows(&[vec![0, 0], vec![0]]),
            Err(PipelineError::RaggedGrid {
                row: 1,
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            OccupancyGrid::from_rows(&[vec![0, 4]]),
            Err(PipelineError::UnknownCellCode { x: 1, y: 0, code: 4 })
        ));
    }

    #[test]
    fn grid_serializes_as_rows() {
        let grid = gap_grid();
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json[0], serde_json::json!([1, 0, 3, 0, 0]));
        let back: OccupancyGrid = serde_json::from_value(json).unwrap();
        assert_eq!(back, grid);
        assert!(serde_json::from_str::<OccupancyGrid>("[[0, 9]]").is_err());
    }

    #[test]
    fn grid_from_skeleton_marks_anchors() {
        let skeleton = BinaryMask::from_fn(6, 3, |_, y| y == 1);
        let grid = OccupancyGrid::from_skeleton(
            &skeleton,
            &[Point::new(0, 1), Point::new(9, 9)],
            &[Point::new(5, 1)],
        );
        assert_eq!(grid.get(Point::new(0, 0)), Some(Cell::Wall));
        assert_eq!(grid.get(Point::new(0, 1)), Some(Cell::Tenant));
        assert_eq!(grid.get(Point::new(5, 1)), Some(Cell::Bin));
        let table = solve_routes(&grid);
        assert_eq!(table.routes.len(), 1);
        assert_eq!(table.routes[0].path.len(), 6);
    }

    #[test]
    fn diagonal_skeleton_steps_are_walkable() {
        let mut skeleton = BinaryMask::new(4, 4);
        for i in 0..4 {
            skeleton.set(Point::new(i, i), true);
        }
        let grid = OccupancyGrid::from_skeleton(&skeleton, &[Point::new(0, 0)], &[Point::new(3, 3)]);
        assert_eq!(grid.get(Point::new(1, 0)), Some(Cell::Empty));
        assert_eq!(grid.get(Point::new(0, 1)), Some(Cell::Wall));
        let path = solve_route(&grid, Point::new(0, 0));
        assert_eq!(path.len(), 7);
        assert_valid_path(&grid, &path);
    }

    #[test]
    fn route_table_serializes_tenant_and_path() {
        let grid = OccupancyGrid::from_rows(&[vec![1, 2]]).unwrap();
        let table = solve_routes(&grid);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["routes"][0]["tenant"], serde_json::json!({"x": 0, "y": 0}));
        assert_eq!(json["routes"][0]["path"].as_array().unwrap().len(), 2);
    }
}
