//! Page and slice pagination.
//!
//! # Responsibility
//! - Validate page requests and derive offsets.
//! - Wrap fetched rows with page (total-count based) or slice (look-ahead
//!   based) metadata.
//!
//! # Invariants
//! - `PageRequest::size` is always greater than zero.
//! - `Page::total_pages == ceil(total_elements / size)`, and `0` when empty.
//! - `Slice` never carries total counts; it only knows whether more rows exist.

use crate::query::sort::{Direction, Sort};
use crate::query::QueryError;
use serde::Serialize;

/// Zero-based page index, page size and optional sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    size: u64,
    sort: Sort,
}

impl PageRequest {
    /// # Errors
    /// Returns `InvalidPageRequest` when `size` is zero.
    pub fn of(page: u64, size: u64) -> Result<Self, QueryError> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: u64, size: u64, sort: Sort) -> Result<Self, QueryError> {
        if size == 0 {
            return Err(QueryError::InvalidPageRequest(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { page, size, sort })
    }

    /// Shorthand for sorting all `fields` in one direction.
    pub fn of_direction(
        page: u64,
        size: u64,
        direction: Direction,
        fields: &[&str],
    ) -> Result<Self, QueryError> {
        Self::of_sorted(page, size, Sort::by(direction, fields))
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn previous_or_first(&self) -> Self {
        Self {
            page: self.page.saturating_sub(1),
            ..self.clone()
        }
    }

    pub fn first(&self) -> Self {
        Self {
            page: 0,
            ..self.clone()
        }
    }
}

/// Bounded result window with total-count metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
    pub is_first: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Converts the content while keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            is_first: self.is_first,
            has_next: self.has_next,
        }
    }
}

/// Bounded result window that only knows whether another window exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice<T> {
    pub content: Vec<T>,
    pub number: u64,
    pub size: u64,
    pub is_first: bool,
    pub has_next: bool,
}

impl<T> Slice<T> {
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            is_first: self.is_first,
            has_next: self.has_next,
        }
    }
}

/// Wraps one page of rows with metadata derived from `total_elements`.
pub fn build_page<T>(rows: Vec<T>, total_elements: u64, request: &PageRequest) -> Page<T> {
    let total_pages = total_elements.div_ceil(request.size);
    Page {
        content: rows,
        number: request.page,
        size: request.size,
        total_elements,
        total_pages,
        is_first: request.page == 0,
        has_next: request.page.saturating_add(1) < total_pages,
    }
}

/// Wraps rows fetched with one extra look-ahead row.
///
/// The look-ahead row, when present, is dropped and turns `has_next` on.
pub fn build_slice<T>(mut rows_with_extra: Vec<T>, request: &PageRequest) -> Slice<T> {
    let size = usize::try_from(request.size).unwrap_or(usize::MAX);
    let has_next = rows_with_extra.len() > size;
    rows_with_extra.truncate(size);
    Slice {
        content: rows_with_extra,
        number: request.page,
        size: request.size,
        is_first: request.page == 0,
        has_next,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_page, build_slice, PageRequest};
    use crate::query::{Direction, QueryError};

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            PageRequest::of(0, 0),
            Err(QueryError::InvalidPageRequest(_))
        ));
    }

    #[test]
    fn offset_and_navigation_follow_page_index() {
        let request = PageRequest::of_direction(2, 3, Direction::Desc, &["username"])
            .expect("valid request");
        assert_eq!(request.offset(), 6);
        assert_eq!(request.next().page(), 3);
        assert_eq!(request.previous_or_first().page(), 1);
        assert_eq!(request.first().page(), 0);
        assert_eq!(request.first().sort(), request.sort());
        assert_eq!(PageRequest::of(0, 3).expect("valid").previous_or_first().page(), 0);
    }

    #[test]
    fn page_metadata_from_total_count() {
        let request = PageRequest::of(0, 3).expect("valid request");
        let page = build_page(vec![1, 2, 3], 5, &request);
        assert_eq!(page.total_pages, 2);
        assert!(page.is_first);
        assert!(page.has_next);
        assert!(!page.has_previous());

        let last = build_page(vec![4, 5], 5, &request.next());
        assert!(!last.has_next);
        assert!(last.is_last());
        assert_eq!(last.number_of_elements(), 2);
    }

    #[test]
    fn empty_total_has_zero_pages() {
        let request = PageRequest::of(0, 10).expect("valid request");
        let page = build_page(Vec::<i32>::new(), 0, &request);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(page.is_first);
    }

    #[test]
    fn slice_trims_look_ahead_row() {
        let request = PageRequest::of(0, 3).expect("valid request");
        let slice = build_slice(vec![1, 2, 3, 4], &request);
        assert_eq!(slice.content, vec![1, 2, 3]);
        assert!(slice.has_next);

        let exact = build_slice(vec![1, 2, 3], &request);
        assert!(!exact.has_next);
        assert_eq!(exact.content.len(), 3);
    }

    #[test]
    fn map_keeps_metadata() {
        let request = PageRequest::of(1, 2).expect("valid request");
        let page = build_page(vec![1, 2], 5, &request).map(|n| n * 10);
        assert_eq!(page.content, vec![10, 20]);
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
    }
}
