use std::slice;

/// Row-major 2D cell buffer. `(x, y)` addressing with `y * width + x` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid2<T> {
    cells: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> Grid2<T> {
    pub fn new(width: usize, height: usize, cells: Vec<T>) -> Self {
        assert_eq!(
            cells.len(),
            width * height,
            "cells length must equal width * height"
        );
        Self {
            cells,
            width,
            height,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &T {
        debug_assert!(x < self.width && y < self.height);
        &self.cells[y * self.width + x]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        debug_assert!(x < self.width && y < self.height);
        &mut self.cells[y * self.width + x]
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        debug_assert!(y < self.height);
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    #[inline]
    pub fn rows(&self) -> slice::Chunks<'_, T> {
        self.cells.chunks(self.width)
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.cells.iter()
    }

    /// Iterates `(x, y, &value)` in row-major order.
    pub fn enumerate_cells(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, value)| (idx % width, idx / width, value))
    }

    pub fn into_vec(self) -> Vec<T> {
        self.cells
    }
}

impl<T: Clone> Grid2<T> {
    pub fn new_filled(width: usize, height: usize, value: T) -> Self {
        Self {
            cells: vec![value; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
    }

    /// Copies the `w` by `h` sub-window anchored at `(x0, y0)`.
    pub fn window(&self, x0: usize, y0: usize, w: usize, h: usize) -> Grid2<T> {
        assert!(
            x0 + w <= self.width && y0 + h <= self.height,
            "window out of bounds"
        );
        let mut cells = Vec::with_capacity(w * h);
        for y in y0..y0 + h {
            cells.extend_from_slice(&self.row(y)[x0..x0 + w]);
        }
        Grid2::new(w, h, cells)
    }
}

impl<T: Default + Clone> Grid2<T> {
    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, T::default())
    }
}
