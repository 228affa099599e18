//! Contiguous real-valued field storage on a uniform 2D grid.
//!
//! `Field2D` is the host-side representation of every grid-shaped array the
//! material stack touches: masks, flux and field components, and the memory
//! cells of host backends.

use crate::grid::Grid2D;

#[derive(Debug, Clone, PartialEq)]
pub struct Field2D {
    grid: Grid2D,
    data: Vec<f64>,
}

impl Field2D {
    pub fn zeros(grid: Grid2D) -> Self {
        Self::filled(grid, 0.0)
    }

    pub fn filled(grid: Grid2D, value: f64) -> Self {
        Self {
            data: vec![value; grid.len()],
            grid,
        }
    }

    pub fn from_vec(grid: Grid2D, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), grid.len(), "data length must match grid size");
        Self { grid, data }
    }

    /// Sample `f` at the physical position of every cell.
    pub fn from_fn<F>(grid: Grid2D, mut f: F) -> Self
    where
        F: FnMut(f64, f64) -> f64,
    {
        let mut data = Vec::with_capacity(grid.len());
        for iy in 0..grid.ny {
            for ix in 0..grid.nx {
                let [x, y] = grid.cell_position(ix, iy);
                data.push(f(x, y));
            }
        }
        Self { grid, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn grid(&self) -> Grid2D {
        self.grid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    pub fn same_shape(&self, other: &Field2D) -> bool {
        self.grid.same_shape(&other.grid)
    }

    pub fn idx(&self, ix: usize, iy: usize) -> usize {
        self.grid.idx(ix, iy)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.data[self.idx(ix, iy)]
    }

    pub fn get_mut(&mut self, ix: usize, iy: usize) -> &mut f64 {
        let idx = self.idx(ix, iy);
        &mut self.data[idx]
    }

    pub fn set(&mut self, ix: usize, iy: usize, value: f64) {
        *self.get_mut(ix, iy) = value;
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }
}

impl From<Field2D> for Vec<f64> {
    fn from(field: Field2D) -> Self {
        field.data
    }
}
