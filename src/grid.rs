use super::model::Block;

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CellState {
    Free,
    Allocated,
    Marked,
    Root,
}

impl CellState {
    // root beats marked beats allocated
    pub fn of(block: &Block) -> Self {
        if block.root {
            CellState::Root
        } else if block.marked {
            CellState::Marked
        } else if block.allocated {
            CellState::Allocated
        } else {
            CellState::Free
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            CellState::Free => '.',
            CellState::Allocated => 'A',
            CellState::Marked => 'M',
            CellState::Root => 'R',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridCell<'a> {
    pub index: usize,
    pub occupant: Option<&'a Block>,
    pub state: CellState,
}

/// The heap laid out as a square-ish grid of fixed size cells.
#[derive(Clone, Debug, PartialEq)]
pub struct GridProjection<'a> {
    cols: usize,
    cells: Vec<GridCell<'a>>,
}

/// Projects `blocks` onto `ceil(heap_size / block_size)` cells.
///
/// Blocks are laid out back to back in list order, each covering `size`
/// consecutive cells. Anything past the last cell is clipped.
pub fn project(blocks: &[Block], heap_size: u64, block_size: u64) -> GridProjection<'_> {
    let num_cells = if block_size == 0 {
        0
    } else {
        heap_size.div_ceil(block_size) as usize
    };
    let cols = (num_cells as f64).sqrt().ceil() as usize;

    let mut cells: Vec<GridCell> = (0..num_cells)
        .map(|index| GridCell {
            index,
            occupant: None,
            state: CellState::Free,
        })
        .collect();

    let mut offset = 0usize;
    for block in blocks {
        let start = offset.min(num_cells);
        let end = offset.saturating_add(block.size as usize).min(num_cells);
        let state = CellState::of(block);

        for cell in &mut cells[start..end] {
            cell.occupant = Some(block);
            cell.state = state;
        }

        offset = offset.saturating_add(block.size as usize);
    }

    GridProjection { cols, cells }
}

impl<'a> GridProjection<'a> {
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        if self.cols == 0 {
            0
        } else {
            self.cells.len().div_ceil(self.cols)
        }
    }

    pub fn cells(&self) -> &[GridCell<'a>] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|cell| cell.state == state).count()
    }

    pub fn occupied(&self) -> usize {
        self.cells.len() - self.count(CellState::Free)
    }
}

impl fmt::Display for GridProjection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cols == 0 {
            return writeln!(f, "(empty heap)");
        }

        for row in self.cells.chunks(self.cols) {
            let line: String = row.iter().map(|cell| cell.state.symbol()).collect();
            writeln!(f, "{}", line)?;
        }

        write!(
            f,
            "free {}  allocated {}  marked {}  root {}",
            self.count(CellState::Free),
            self.count(CellState::Allocated),
            self.count(CellState::Marked),
            self.count(CellState::Root),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockId;
    use rand::prelude::*;

    fn random_blocks(rng: &mut impl Rng, capacity: usize) -> Vec<Block> {
        let mut blocks = vec![];
        let mut used = 0;

        for i in 0..rng.gen_range(0..40) {
            let size = rng.gen_range(1..4);
            if used + size > capacity {
                break;
            }
            used += size;

            let mut block = Block::new(format!("{:08x}", i), size as u32);
            block.root = rng.gen_bool(0.3);
            block.marked = rng.gen_bool(0.3);
            blocks.push(block);
        }

        blocks
    }

    #[test]
    fn empty_heap_is_all_free() {
        let grid = project(&[], 1024, 16);

        assert_eq!(grid.len(), 64);
        assert_eq!(grid.cols(), 8);
        assert_eq!(grid.count(CellState::Free), 64);
    }

    #[test]
    fn uneven_heap_rounds_up() {
        let grid = project(&[], 100, 16);

        assert_eq!(grid.len(), 7);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.rows(), 3);
    }

    #[test]
    fn zero_block_size_has_no_cells() {
        let blocks = [Block::new("a", 1)];
        let grid = project(&blocks, 1024, 0);

        assert!(grid.is_empty());
        assert_eq!(grid.rows(), 0);
    }

    #[test]
    fn blocks_are_laid_out_back_to_back() {
        let blocks = vec![Block::new("a", 2), Block::new("b", 3).rooted()];
        let grid = project(&blocks, 1024, 16);

        let ids: Vec<Option<&BlockId>> = grid.cells()[..6]
            .iter()
            .map(|cell| cell.occupant.map(|block| &block.id))
            .collect();

        assert_eq!(ids[0].unwrap().as_str(), "a");
        assert_eq!(ids[1].unwrap().as_str(), "a");
        assert_eq!(ids[2].unwrap().as_str(), "b");
        assert_eq!(ids[4].unwrap().as_str(), "b");
        assert!(ids[5].is_none());
        assert_eq!(grid.cells()[3].state, CellState::Root);
    }

    #[test]
    fn root_takes_precedence_over_marked() {
        let blocks = vec![
            Block::new("a", 1).rooted().marked(),
            Block::new("b", 1).marked(),
            Block::new("c", 1),
        ];
        let grid = project(&blocks, 64, 16);

        assert_eq!(grid.cells()[0].state, CellState::Root);
        assert_eq!(grid.cells()[1].state, CellState::Marked);
        assert_eq!(grid.cells()[2].state, CellState::Allocated);
        assert_eq!(grid.cells()[3].state, CellState::Free);
    }

    #[test]
    fn unallocated_block_displays_free() {
        let mut block = Block::new("a", 2);
        block.allocated = false;
        let blocks = vec![block];
        let grid = project(&blocks, 64, 16);

        assert_eq!(grid.count(CellState::Free), 4);
        assert!(grid.cells()[0].occupant.is_some());
    }

    #[test]
    fn overflowing_blocks_are_clipped() {
        let blocks = vec![Block::new("a", 3), Block::new("b", 3)];
        let grid = project(&blocks, 64, 16);

        assert_eq!(grid.len(), 4);
        assert_eq!(grid.occupied(), 4);
    }

    #[test]
    fn occupied_cells_match_block_sizes() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let blocks = random_blocks(&mut rng, 64);
            let grid = project(&blocks, 1024, 16);
            let total: usize = blocks.iter().map(|block| block.size as usize).sum();

            assert_eq!(grid.occupied(), total);

            // each block owns exactly `size` cells
            for block in &blocks {
                let owned = grid
                    .cells()
                    .iter()
                    .filter(|cell| cell.occupant.map(|o| &o.id) == Some(&block.id))
                    .count();
                assert_eq!(owned, block.size as usize);
            }
        }
    }

    #[test]
    fn projection_is_repeatable() {
        let mut rng = StdRng::seed_from_u64(11);
        let blocks = random_blocks(&mut rng, 64);

        assert_eq!(project(&blocks, 1024, 16), project(&blocks, 1024, 16));
    }

    #[test]
    fn display_prints_rows_and_counts() {
        let blocks = vec![Block::new("a", 1).rooted(), Block::new("b", 1)];
        let text = project(&blocks, 64, 16).to_string();

        assert!(text.starts_with("RA\n..\n"));
        assert!(text.ends_with("free 2  allocated 1  marked 0  root 1"));
    }
}
