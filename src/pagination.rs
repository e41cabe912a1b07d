//! Page slicing over ordered entries.

use crate::{
    error::Error,
    routing::{RouteValue, UrlRegistry},
};

/// One page of `items`. Pages are 1-indexed.
#[derive(Debug)]
pub struct Pagination<'a, T> {
    items: &'a [T],
    page: usize,
    per_page: usize,
    endpoint: &'a str,
}

impl<'a, T> Pagination<'a, T> {
    /// A `per_page` of zero is treated as one.
    pub fn new(items: &'a [T], page: usize, per_page: usize, endpoint: &'a str) -> Self {
        Self {
            items,
            page: page.max(1),
            per_page: per_page.max(1),
            endpoint,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Number of pages; an empty sequence still has one (empty) page.
    pub fn pages(&self) -> usize {
        self.items.len().div_ceil(self.per_page).max(1)
    }

    fn upper(&self) -> usize {
        self.page.saturating_mul(self.per_page)
    }

    /// Items `[(page-1)*per_page, page*per_page)`, clamped to the sequence.
    pub fn slice(&self) -> &'a [T] {
        let start = ((self.page - 1) * self.per_page).min(self.items.len());
        let end = self.upper().min(self.items.len());
        &self.items[start..end]
    }

    pub fn has_next(&self) -> bool {
        self.upper() < self.items.len()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn next(&self) -> Self {
        self.with_page(self.page + 1)
    }

    pub fn previous(&self) -> Self {
        self.with_page(self.page - 1)
    }

    fn with_page(&self, page: usize) -> Self {
        Self::new(self.items, page, self.per_page, self.endpoint)
    }

    /// Link to this page through the registry; page 1 resolves to an
    /// un-paginated variant when one is registered.
    pub fn link(&self, urls: &UrlRegistry) -> Result<String, Error> {
        let values = [("page".to_owned(), RouteValue::from(self.page))].into();
        urls.build_link(self.endpoint, &values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, route_values, routing::RouteValues};

    #[test]
    fn test_pages_of_25_by_10() {
        let items: Vec<u32> = (0..25).collect();

        let first = Pagination::new(&items, 1, 10, "blog_index");
        assert_eq!(first.slice().len(), 10);
        assert!(first.has_next());
        assert!(!first.has_previous());
        assert_eq!(first.pages(), 3);

        let third = first.next().next();
        assert_eq!(third.page(), 3);
        assert_eq!(third.slice(), &items[20..25]);
        assert!(!third.has_next());
        assert!(third.has_previous());
        assert_eq!(third.previous().page(), 2);
    }

    #[test]
    fn test_exact_multiple_has_no_next() {
        let items = [1, 2, 3, 4];
        let page = Pagination::new(&items, 2, 2, "blog_index");
        assert_eq!(page.slice(), &[3, 4]);
        assert!(!page.has_next());
    }

    #[test]
    fn test_out_of_range_page_is_empty() {
        let items = [1, 2, 3];
        let page = Pagination::new(&items, 5, 2, "blog_index");
        assert!(page.slice().is_empty());
        assert!(!page.has_next());

        let empty: [u8; 0] = [];
        assert_eq!(Pagination::new(&empty, 1, 10, "blog_index").pages(), 1);
    }

    #[test]
    fn test_links_prefer_unpaginated_first_page() {
        let config = Config::default();
        let mut urls = UrlRegistry::new();
        urls.register("blog_index", "/", route_values!("page" => 1u64), &config).unwrap();
        urls.register("blog_index", "/page/<page>/", RouteValues::new(), &config).unwrap();

        let items: Vec<u32> = (0..25).collect();
        let first = Pagination::new(&items, 1, 10, "blog_index");
        assert_eq!(first.link(&urls).unwrap(), "/");
        assert_eq!(first.next().link(&urls).unwrap(), "/page/2/");
    }

    #[test]
    fn test_link_falls_back_to_paged_variant() {
        let config = Config::default();
        let mut urls = UrlRegistry::new();
        urls.register("listing", "/list/<int:page>/", RouteValues::new(), &config).unwrap();

        let items = [1];
        let page = Pagination::new(&items, 1, 10, "listing");
        assert_eq!(page.link(&urls).unwrap(), "/list/1/");
    }
}
