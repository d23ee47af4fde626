use serde::{Deserialize, Serialize};

/// Skip/limit window applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub skip: u64,
    pub limit: u32,
}

impl Page {
    pub const fn new(skip: u64, limit: u32) -> Self {
        Self { skip, limit }
    }

    /// Cuts the page out of an already filtered and sorted result set.
    pub fn slice<T>(self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        items
            .into_iter()
            .skip(skip)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 20 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: Page,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, page: Page) -> Self {
        Self { items, total, page }
    }

    pub fn has_more(&self) -> bool {
        self.page.skip + (self.items.len() as u64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_skips_then_limits() {
        let page = Page::new(2, 3);
        assert_eq!(page.slice((0..10).collect()), vec![2, 3, 4]);
        assert_eq!(Page::new(9, 3).slice((0..10).collect()), vec![9]);
    }

    #[test]
    fn has_more_compares_against_total() {
        let result = Paginated::new(vec![1, 2], 5, Page::new(0, 2));
        assert!(result.has_more());
        let last = Paginated::new(vec![5], 5, Page::new(4, 2));
        assert!(!last.has_more());
    }
}
