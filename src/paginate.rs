use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PageError {
    #[error("page number must be at least 1, got {0}")]
    PageNumber(i64),
    #[error("page size must be at least 1, got {0}")]
    PageSize(i64),
}

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paging {
    pub number: usize,
    pub size: usize,
}

impl Paging {
    pub fn new(number: i64, size: i64) -> Result<Self, PageError> {
        if number < 1 {
            return Err(PageError::PageNumber(number));
        }
        if size < 1 {
            return Err(PageError::PageSize(size));
        }
        Ok(Paging {
            number: number as usize,
            size: size as usize,
        })
    }

    pub fn offset(&self) -> usize {
        (self.number - 1).saturating_mul(self.size)
    }

    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.size)
    }
}

/// One display page cut from a stored collection.
#[derive(Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    /// 0-based position of the first item within the whole collection.
    pub fn offset(&self) -> usize {
        (self.number - 1).saturating_mul(self.size)
    }
}

/// Cut `items` into the requested page. Pages past the end are empty.
pub fn page<T>(items: Vec<T>, number: i64, size: i64) -> Result<Page<T>, PageError> {
    let paging = Paging::new(number, size)?;
    let total_items = items.len();
    let items = items
        .into_iter()
        .skip(paging.offset())
        .take(paging.size)
        .collect();
    Ok(Page {
        items,
        number: paging.number,
        size: paging.size,
        total_pages: paging.total_pages(total_items),
        total_items,
    })
}
