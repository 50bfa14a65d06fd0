use serde::{Deserialize, Serialize};

/// Page sizes a client may ask for. Anything else falls back to the first entry.
pub const ALLOWED_PAGE_SIZES: [u32; 4] = [20, 50, 100, 200];

/// A page size that is always one of [`ALLOWED_PAGE_SIZES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u32);

impl PageSize {
    pub const DEFAULT: PageSize = PageSize(ALLOWED_PAGE_SIZES[0]);

    pub fn from_raw(raw: i64) -> Self {
        ALLOWED_PAGE_SIZES
            .iter()
            .copied()
            .find(|&size| i64::from(size) == raw)
            .map(PageSize)
            .unwrap_or(Self::DEFAULT)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A clamped (page, page size) pair, ready to hand to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: PageSize,
}

impl PageRequest {
    /// Page numbers below 1 become 1; unknown page sizes become the default.
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.clamp(1, i64::from(u32::MAX)) as u32,
            size: PageSize::from_raw(per_page),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> PageSize {
        self.size
    }

    /// Rows to skip. Always an integer, never bound as text.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.size.get())
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size.get())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, i64::from(PageSize::DEFAULT.get()))
    }
}

/// `ceil(total / size)`; zero when the board is empty.
pub fn total_pages(total: i64, size: PageSize) -> i64 {
    if total <= 0 {
        return 0;
    }
    let size = i64::from(size.get());
    (total + size - 1) / size
}

/// Pagination metadata returned alongside a page of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_messages: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(request: PageRequest, total_messages: i64) -> Self {
        Self {
            current_page: request.page(),
            per_page: request.size().get(),
            total_messages,
            total_pages: total_pages(total_messages, request.size()),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        i64::from(self.current_page) < self.total_pages
    }
}

/// Parses an optional integer query parameter the strict way.
///
/// Missing or blank values are `Ok(None)`; anything that is not an integer is an error.
pub fn parse_param(raw: Option<&str>) -> Result<Option<i64>, std::num::ParseIntError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}
