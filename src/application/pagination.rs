//! Numbered page pagination.
//!
//! Listings are sliced into fixed-size pages addressed by a 1-based number
//! taken from the `page` query parameter. Out-of-range numbers never fail:
//! anything unparsable or below one means the first page, and anything past
//! the end means the last page. An empty listing still has one (empty) page.

use serde::Serialize;

pub const POSTS_PER_PAGE: u32 = 10;

/// Requested page number as parsed from the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(u64);

impl PageNumber {
    pub const FIRST: Self = Self(1);

    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value >= 1)
            .map(Self)
            .unwrap_or(Self::FIRST)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Offset window handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: u32, offset: u64) -> Self {
        Self { limit, offset }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: u32,
    total: u64,
}

impl Paginator {
    pub fn new(per_page: u32, total: u64) -> Self {
        Self {
            per_page: per_page.max(1),
            total,
        }
    }

    pub fn num_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page)).max(1)
    }

    /// Clamp the requested number into `1..=num_pages`.
    pub fn resolve(&self, requested: PageNumber) -> u64 {
        requested.get().clamp(1, self.num_pages())
    }

    pub fn request_for(&self, number: u64) -> PageRequest {
        let offset = (number.saturating_sub(1)).saturating_mul(u64::from(self.per_page));
        PageRequest::new(self.per_page, offset)
    }

    pub fn page<T>(&self, number: u64, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            total: self.total,
        }
    }
}

/// One page of results plus the metadata templates need.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn previous_page_number(&self) -> u64 {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> u64 {
        (self.number + 1).min(self.num_pages)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}
