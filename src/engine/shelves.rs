use super::accumulator::FeedState;
use crate::feed::types::Item;

/// One horizontally scrolling row of the home view.
#[derive(Debug, Clone, PartialEq)]
pub struct Shelf {
    pub title: Option<String>,
    pub items: Vec<Item>,
}

/// Group the flat item list into shelves.
///
/// Section-like items (anything carrying a nested `contents` array) become a
/// shelf of their children. Runs of plain items are chunked into rows of
/// `row_width`.
pub fn group_shelves(items: &[Item], row_width: usize) -> Vec<Shelf> {
    let width = row_width.max(1);
    let mut shelves = Vec::new();
    let mut row: Vec<Item> = Vec::with_capacity(width);

    for item in items {
        if let Some(children) = item.children() {
            flush_row(&mut row, &mut shelves);
            if !children.is_empty() {
                shelves.push(Shelf {
                    title: item.title().map(String::from),
                    items: children,
                });
            }
            continue;
        }
        row.push(item.clone());
        if row.len() == width {
            flush_row(&mut row, &mut shelves);
        }
    }
    flush_row(&mut row, &mut shelves);
    shelves
}

fn flush_row(row: &mut Vec<Item>, shelves: &mut Vec<Shelf>) {
    if !row.is_empty() {
        shelves.push(Shelf { title: None, items: std::mem::take(row) });
    }
}

/// Caches the shelf grouping until the item revision moves.
pub struct ShelfView {
    row_width: usize,
    cached: Option<(u64, Vec<Shelf>)>,
}

impl ShelfView {
    pub fn new(row_width: usize) -> Self {
        Self { row_width, cached: None }
    }

    pub fn shelves(&mut self, state: &FeedState) -> &[Shelf] {
        let stale = !matches!(&self.cached, Some((rev, _)) if *rev == state.revision);
        if stale {
            let shelves = group_shelves(&state.items, self.row_width);
            self.cached = Some((state.revision, shelves));
        }
        match &self.cached {
            Some((_, shelves)) => shelves.as_slice(),
            None => &[],
        }
    }

    /// Revision the cached grouping was computed for.
    pub fn revision(&self) -> Option<u64> {
        self.cached.as_ref().map(|(rev, _)| *rev)
    }
}
