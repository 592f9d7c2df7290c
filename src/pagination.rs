use failure::Error;
use lazy_static::lazy_static;
use regex::Regex;
use std::vec::IntoIter;

/// One page of results and a link to the page after it, if there is one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<I> {
    pub items: Vec<I>,
    pub next: Option<String>,
}

/// Lazily walk a paginated endpoint, yielding items one at a time and only
/// fetching the next page once the current one is exhausted.
///
/// Iteration stops after the first error.
pub struct Paginated<I, F> {
    fetch: F,
    next_endpoint: Option<String>,
    items: IntoIter<I>,
    pages_fetched: usize,
    max_pages: Option<usize>,
}

impl<I, F> Paginated<I, F>
where
    F: FnMut(&str) -> Result<Page<I>, Error>,
{
    pub fn new(first_page: &str, fetch: F) -> Self {
        Paginated {
            fetch,
            next_endpoint: Some(String::from(first_page)),
            items: Vec::new().into_iter(),
            pages_fetched: 0,
            max_pages: None,
        }
    }

    /// Never request more than `max_pages` pages.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn limit_reached(&self) -> bool {
        match self.max_pages {
            Some(max) => self.pages_fetched >= max,
            None => false,
        }
    }
}

impl<I, F> Iterator for Paginated<I, F>
where
    F: FnMut(&str) -> Result<Page<I>, Error>,
{
    type Item = Result<I, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(next_item) = self.items.next() {
                return Some(Ok(next_item));
            }

            let next_endpoint = self.next_endpoint.take()?;

            if self.limit_reached() {
                warn!(
                    "Stopping after {} pages, skipping {}",
                    self.pages_fetched, next_endpoint
                );
                return None;
            }

            match (self.fetch)(&next_endpoint) {
                Ok(Page { items, next }) => {
                    self.pages_fetched += 1;
                    trace!(
                        "Page {} had {} items",
                        self.pages_fetched,
                        items.len()
                    );
                    self.next_endpoint = next;
                    self.items = items.into_iter();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

lazy_static! {
    /// One `<uri>; param=value; ...` entry of a `Link` header (RFC 8288).
    static ref LINK_VALUE: Regex = Regex::new(
        r#"<(?P<uri>[^>]*)>(?P<params>(?:\s*;\s*[^\s;,=]+(?:\s*=\s*(?:"(?:[^"\\]|\\.)*"|[^\s;,]*))?)*)"#
    ).expect("LINK_VALUE regex is valid");

    static ref LINK_PARAM: Regex = Regex::new(
        r#";\s*(?P<key>[^\s;,=]+)(?:\s*=\s*(?:"(?P<quoted>(?:[^"\\]|\\.)*)"|(?P<token>[^\s;,]*)))?"#
    ).expect("LINK_PARAM regex is valid");
}

/// Find the `rel="next"` URL in a `Link` header.
pub(crate) fn next_link(header: &str) -> Option<&str> {
    LINK_VALUE
        .captures_iter(header)
        .find(|link_value| is_next(&link_value["params"]))
        .and_then(|link_value| link_value.name("uri"))
        .map(|uri| uri.as_str())
}

fn is_next(params: &str) -> bool {
    LINK_PARAM.captures_iter(params).any(|param| {
        let value = param.name("quoted").or_else(|| param.name("token"));

        param["key"].eq_ignore_ascii_case("rel")
            && value
                .map(|relations| {
                    relations
                        .as_str()
                        .split_whitespace()
                        .any(|rel| rel.eq_ignore_ascii_case("next"))
                })
                .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pages(raw: Vec<(&str, Vec<u32>, Option<&str>)>) -> HashMap<String, Page<u32>> {
        raw.into_iter()
            .map(|(url, items, next)| {
                let page = Page {
                    items,
                    next: next.map(String::from),
                };
                (url.to_string(), page)
            })
            .collect()
    }

    #[test]
    fn get_next_link() {
        let src = r#"<https://api.github.com/user/repos?page=2>; rel="next", <https://api.github.com/user/repos?page=3>; rel="last""#;

        let should_be = "https://api.github.com/user/repos?page=2";
        let got = next_link(src).unwrap();
        assert_eq!(got, should_be);
    }

    #[test]
    fn last_page_has_no_next_link() {
        let src = r#"<https://api.github.com/user/repos?page=1>; rel="first", <https://api.github.com/user/repos?page=2>; rel="prev""#;

        assert_eq!(next_link(src), None);
        assert_eq!(next_link(""), None);
    }

    #[test]
    fn next_can_share_a_rel_with_others() {
        let src = r#"<https://example.com/2>; title="x"; rel="last next""#;

        assert_eq!(next_link(src), Some("https://example.com/2"));
    }

    #[test]
    fn commas_inside_the_url() {
        let src = r#"<https://api.github.com/user/repos?page=2&sort=a,b>; rel="next", <https://api.github.com/user/repos?page=3&sort=a,b>; rel="last""#;

        assert_eq!(
            next_link(src),
            Some("https://api.github.com/user/repos?page=2&sort=a,b")
        );
    }

    #[test]
    fn commas_inside_quoted_parameters() {
        let src = r#"<https://example.com/2>; title="a, b"; rel="next""#;

        assert_eq!(next_link(src), Some("https://example.com/2"));
    }

    #[test]
    fn unquoted_rel() {
        let src = "<https://example.com/1>; rel=prev, <https://example.com/3>; rel=next";

        assert_eq!(next_link(src), Some("https://example.com/3"));
    }

    #[test]
    fn items_from_every_page_are_yielded_in_order() {
        let mut responses = pages(vec![
            ("p1", vec![1, 2, 3], Some("p2")),
            ("p2", vec![4, 5], Some("p3")),
            ("p3", vec![6], None),
        ]);
        let mut requested = Vec::new();

        let got: Vec<u32> = Paginated::new("p1", |url: &str| {
            requested.push(url.to_string());
            Ok(responses.remove(url).unwrap())
        })
        .collect::<Result<_, _>>()
        .unwrap();

        assert_eq!(got, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(requested, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn empty_pages_dont_stop_iteration() {
        let mut responses =
            pages(vec![("p1", vec![], Some("p2")), ("p2", vec![7], None)]);

        let got: Vec<u32> =
            Paginated::new("p1", |url: &str| Ok(responses.remove(url).unwrap()))
                .collect::<Result<_, _>>()
                .unwrap();

        assert_eq!(got, vec![7]);
    }

    #[test]
    fn stop_after_max_pages() {
        let mut calls = 0;

        let mut paginated = Paginated::new("p", |_: &str| {
            calls += 1;
            Ok(Page {
                items: vec![calls],
                next: Some(String::from("p")),
            })
        })
        .with_max_pages(Some(3));

        let got: Vec<u32> = paginated.by_ref().map(Result::unwrap).collect();

        assert_eq!(got, vec![1, 2, 3]);
        assert_eq!(paginated.pages_fetched(), 3);
    }

    #[test]
    fn errors_end_iteration() {
        let mut paginated = Paginated::new("p1", |url: &str| -> Result<Page<u32>, Error> {
            Err(failure::err_msg(format!("{} is broken", url)))
        });

        let err = paginated.next().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "p1 is broken");
        assert!(paginated.next().is_none());
    }
}
