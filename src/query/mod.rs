//! Client-side list querying: search, categorical filters, sorting and paging.
//!
//! [`ListQuery`] is the low-level pipeline (predicates, comparator, page spec). Screens
//! describe an entity once through [`ListView`] and keep their UI state in a [`ListState`],
//! which resets to page 1 whenever the filtering changes.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel meaning "no filter" in filter controls.
pub const ALL: &str = "all";

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A categorical equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter<V> {
    All,
    Only(V),
}

impl<V> Default for Filter<V> {
    fn default() -> Self {
        Filter::All
    }
}

impl<V> Filter<V> {
    pub fn is_active(&self) -> bool {
        matches!(self, Filter::Only(_))
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Filter::All => None,
            Filter::Only(v) => Some(v),
        }
    }
}

impl<V: PartialEq> Filter<V> {
    pub fn matches(&self, value: &V) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(expected) => expected == value,
        }
    }
}

impl<V: FromStr> Filter<V> {
    /// Parse a filter control value. Blank input and `"all"` mean no filter.
    pub fn parse(raw: &str) -> Result<Self, V::Err> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL) {
            return Ok(Filter::All);
        }
        raw.parse().map(Filter::Only)
    }
}

impl<V: fmt::Display> fmt::Display for Filter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str(ALL),
            Filter::Only(v) => v.fmt(f),
        }
    }
}

/// Case-insensitive substring match over several fields. A blank needle matches everything.
pub fn text_matches<'a>(needle: &str, fields: impl IntoIterator<Item = &'a str>) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields
        .into_iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Which slice of the result to return. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: usize,
    pub page_size: usize,
}

impl PageSpec {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of a filtered, sorted list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

type Predicate<'a, T> = Box<dyn Fn(&T) -> bool + 'a>;
type Comparator<'a, T> = Box<dyn Fn(&T, &T) -> Ordering + 'a>;

/// Predicate list + comparator + page spec.
pub struct ListQuery<'a, T> {
    predicates: Vec<Predicate<'a, T>>,
    comparator: Option<Comparator<'a, T>>,
    page: PageSpec,
}

impl<'a, T> ListQuery<'a, T> {
    pub fn new(page: PageSpec) -> Self {
        Self {
            predicates: Vec::new(),
            comparator: None,
            page,
        }
    }

    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + 'a) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Keep rows whose fields contain `needle`, ignoring case.
    pub fn search<F>(self, needle: &'a str, fields: F) -> Self
    where
        F: Fn(&T) -> Vec<&str> + 'a,
    {
        if needle.trim().is_empty() {
            return self;
        }
        self.filter(move |item| text_matches(needle, fields(item)))
    }

    pub fn sort_by(
        mut self,
        compare: impl Fn(&T, &T) -> Ordering + 'a,
        direction: SortDirection,
    ) -> Self {
        self.comparator = Some(Box::new(move |a, b| direction.apply(compare(a, b))));
        self
    }

    pub fn matches(&self, item: &T) -> bool {
        self.predicates.iter().all(|p| p(item))
    }

    /// All matching rows in sorted order, without paging. The sort is stable.
    pub fn collect<'i>(&self, items: &'i [T]) -> Vec<&'i T> {
        let mut rows: Vec<&T> = items.iter().filter(|item| self.matches(item)).collect();
        if let Some(compare) = &self.comparator {
            rows.sort_by(|a, b| compare(a, b));
        }
        rows
    }

    /// Filter, sort and slice. A page past the end is clamped to the last page.
    pub fn run(&self, items: &[T]) -> Page<T>
    where
        T: Clone,
    {
        let rows = self.collect(items);
        let total = rows.len();
        let page_size = self.page.page_size;
        let total_pages = total.div_ceil(page_size).max(1);
        let page = self.page.page.min(total_pages);

        let items = rows
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Page {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// How one entity is searched, filtered and sorted.
pub trait ListView {
    type Item: Clone;
    type Filters: Default + Clone + PartialEq;
    type SortKey: Copy + PartialEq + Default;

    /// Fields covered by free-text search.
    fn search_fields(item: &Self::Item) -> Vec<&str>;

    fn matches_filters(filters: &Self::Filters, item: &Self::Item) -> bool;

    /// Ascending comparison for a sort key.
    fn compare(key: Self::SortKey, a: &Self::Item, b: &Self::Item) -> Ordering;

    /// Direction chosen when a key is first selected.
    fn default_direction(_key: Self::SortKey) -> SortDirection {
        SortDirection::Asc
    }
}

/// Search text, filters, sort and page of one list screen.
pub struct ListState<V: ListView> {
    search: String,
    filters: V::Filters,
    sort_key: V::SortKey,
    direction: SortDirection,
    page: usize,
    page_size: usize,
}

impl<V: ListView> Clone for ListState<V> {
    fn clone(&self) -> Self {
        Self {
            search: self.search.clone(),
            filters: self.filters.clone(),
            sort_key: self.sort_key,
            direction: self.direction,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

impl<V: ListView> Default for ListState<V> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<V: ListView> ListState<V> {
    pub fn new(page_size: usize) -> Self {
        let sort_key = V::SortKey::default();
        Self {
            search: String::new(),
            filters: V::Filters::default(),
            sort_key,
            direction: V::default_direction(sort_key),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filters(&self) -> &V::Filters {
        &self.filters
    }

    pub fn sort_key(&self) -> V::SortKey {
        self.sort_key
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        if search != self.search {
            self.search = search;
            self.page = 1;
        }
    }

    pub fn set_filters(&mut self, filters: V::Filters) {
        if filters != self.filters {
            self.filters = filters;
            self.page = 1;
        }
    }

    /// Change filters in place; the page resets only if something changed.
    pub fn update_filters(&mut self, change: impl FnOnce(&mut V::Filters)) {
        let mut filters = self.filters.clone();
        change(&mut filters);
        self.set_filters(filters);
    }

    /// Select a sort key. Selecting the current key again flips the direction.
    pub fn set_sort(&mut self, key: V::SortKey) {
        if key == self.sort_key {
            self.direction = self.direction.toggled();
        } else {
            self.sort_key = key;
            self.direction = V::default_direction(key);
        }
        self.page = 1;
    }

    pub fn set_direction(&mut self, direction: SortDirection) {
        self.direction = direction;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        *self = Self::new(self.page_size);
    }

    pub fn has_active_filters(&self) -> bool {
        !self.search.trim().is_empty() || self.filters != V::Filters::default()
    }

    fn query(&self) -> ListQuery<'_, V::Item> {
        let filters = &self.filters;
        let key = self.sort_key;
        ListQuery::new(PageSpec::new(self.page, self.page_size))
            .search(&self.search, V::search_fields)
            .filter(move |item| V::matches_filters(filters, item))
            .sort_by(move |a, b| V::compare(key, a, b), self.direction)
    }

    pub fn apply(&self, items: &[V::Item]) -> Page<V::Item> {
        self.query().run(items)
    }

    /// Number of rows matching the current search and filters.
    pub fn count(&self, items: &[V::Item]) -> usize {
        self.query().collect(items).len()
    }
}

/// Case-insensitive string ordering.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        status: &'static str,
        score: u32,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "Rajesh Kumar", status: "pending", score: 3 },
            Row { name: "Priya Sharma", status: "completed", score: 9 },
            Row { name: "Amit Kumar", status: "pending", score: 5 },
            Row { name: "Sunita Rao", status: "delayed", score: 1 },
        ]
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct RowFilters {
        status: Filter<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    enum RowSort {
        #[default]
        Name,
        Score,
    }

    struct RowView;

    impl ListView for RowView {
        type Item = Row;
        type Filters = RowFilters;
        type SortKey = RowSort;

        fn search_fields(item: &Row) -> Vec<&str> {
            vec![item.name, item.status]
        }

        fn matches_filters(filters: &RowFilters, item: &Row) -> bool {
            filters.status.matches(&item.status.to_string())
        }

        fn compare(key: RowSort, a: &Row, b: &Row) -> Ordering {
            match key {
                RowSort::Name => compare_text(a.name, b.name),
                RowSort::Score => a.score.cmp(&b.score),
            }
        }

        fn default_direction(key: RowSort) -> SortDirection {
            match key {
                RowSort::Name => SortDirection::Asc,
                RowSort::Score => SortDirection::Desc,
            }
        }
    }

    #[test]
    fn test_filter_parse_treats_all_as_sentinel() {
        assert_eq!(Filter::<String>::parse("all").unwrap(), Filter::All);
        assert_eq!(Filter::<String>::parse(" ALL ").unwrap(), Filter::All);
        assert_eq!(Filter::<String>::parse("").unwrap(), Filter::All);
        assert_eq!(
            Filter::<String>::parse("pending").unwrap(),
            Filter::Only("pending".to_string())
        );
        assert!(Filter::<u32>::parse("many").is_err());
        assert_eq!(Filter::Only(5).to_string(), "5");
        assert_eq!(Filter::<u32>::All.to_string(), "all");
    }

    #[test]
    fn test_text_matches() {
        assert!(text_matches("kumar", ["Rajesh Kumar"]));
        assert!(text_matches("  ", ["anything"]));
        assert!(!text_matches("kumar", ["Priya Sharma", "pending"]));
    }

    #[test]
    fn test_status_filter_example() {
        let mut state = ListState::<RowView>::default();
        let statuses = ["pending", "completed", "pending"];
        let items: Vec<Row> = statuses
            .into_iter()
            .map(|s| Row { name: "x", status: s, score: 0 })
            .collect();

        state.update_filters(|f| f.status = Filter::Only("pending".to_string()));
        assert_eq!(state.apply(&items).total, 2);
    }

    #[test]
    fn test_result_is_subset_satisfying_every_predicate() {
        let items = rows();
        let searches = ["", "kumar", "a", "zzz"];
        let statuses = [Filter::All]
            .into_iter()
            .chain(["pending", "completed", "delayed", "cancelled"].map(|s| Filter::Only(s.to_string())));

        for status in statuses {
            for search in searches {
                for sort in [RowSort::Name, RowSort::Score] {
                    let mut state = ListState::<RowView>::new(2);
                    state.set_search(search);
                    state.set_filters(RowFilters { status: status.clone() });
                    state.set_sort(sort);

                    let first = state.apply(&items);
                    let mut seen = first.items.clone();
                    for page in 2..=first.total_pages {
                        state.set_page(page);
                        seen.extend(state.apply(&items).items);
                    }

                    assert_eq!(seen.len(), first.total);
                    for row in &seen {
                        assert!(items.contains(row));
                        assert!(status.matches(&row.status.to_string()));
                        assert!(text_matches(search, [row.name, row.status]));
                    }
                }
            }
        }
    }

    #[test]
    fn test_changing_filters_resets_page() {
        let mut state = ListState::<RowView>::new(1);
        state.set_page(3);
        state.update_filters(|f| f.status = Filter::Only("pending".to_string()));
        assert_eq!(state.page(), 1);

        state.set_page(2);
        state.update_filters(|f| f.status = Filter::Only("pending".to_string()));
        assert_eq!(state.page(), 2, "unchanged filters keep the page");

        state.set_search("kumar");
        assert_eq!(state.page(), 1);

        state.set_page(2);
        state.set_sort(RowSort::Score);
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn test_sort_defaults_and_toggle() {
        let items = rows();
        let mut state = ListState::<RowView>::default();
        let names: Vec<_> = state.apply(&items).items.iter().map(|r| r.name).collect();
        assert_eq!(names, ["Amit Kumar", "Priya Sharma", "Rajesh Kumar", "Sunita Rao"]);

        state.set_sort(RowSort::Score);
        assert_eq!(state.direction(), SortDirection::Desc);
        assert_eq!(state.apply(&items).items[0].name, "Priya Sharma");

        state.set_sort(RowSort::Score);
        assert_eq!(state.direction(), SortDirection::Asc);
        assert_eq!(state.apply(&items).items[0].name, "Sunita Rao");
    }

    #[test]
    fn test_pagination() {
        let items = rows();
        let mut state = ListState::<RowView>::new(3);
        let first = state.apply(&items);
        assert_eq!(first.items.len(), 3);
        assert_eq!(first.total_pages, 2);
        assert!(first.has_next());
        assert!(!first.has_previous());

        state.set_page(9);
        let last = state.apply(&items);
        assert_eq!(last.page, 2);
        assert_eq!(last.items.len(), 1);

        let empty = ListQuery::<Row>::new(PageSpec::default()).run(&[]);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.total_pages, 1);
    }

    #[test]
    fn test_query_is_idempotent() {
        let items = rows();
        let mut state = ListState::<RowView>::default();
        state.set_search("kumar");
        assert_eq!(state.apply(&items), state.apply(&items));
        assert_eq!(state.count(&items), 2);
        assert!(state.has_active_filters());

        state.reset();
        assert!(!state.has_active_filters());
        assert_eq!(state.count(&items), 4);
    }
}
