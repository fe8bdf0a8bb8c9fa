//! Static mapping from client paths to pages.
//!
//! # Route Structure
//!
//! ```text
//! /                -> redirect to /upload
//! /login           -> Login
//! /register        -> Register
//! /upload          -> Upload        (session)
//! /search/text     -> SearchText    (session)
//! /search/ocr      -> SearchOcr     (session)
//! /similar         -> Similar       (session)
//! /health          -> Health
//! ```

use std::fmt;

/// Pages reachable from the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Login,
    Register,
    Upload,
    SearchText,
    SearchOcr,
    Similar,
    Health,
}

impl Page {
    /// Whether the backend endpoints behind this page need a bearer token.
    pub fn requires_session(self) -> bool {
        matches!(
            self,
            Page::Upload | Page::SearchText | Page::SearchOcr | Page::Similar
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Page::Login => "Login",
            Page::Register => "Register",
            Page::Upload => "Upload",
            Page::SearchText => "SearchText",
            Page::SearchOcr => "SearchOCR",
            Page::Similar => "Similar",
            Page::Health => "Health",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a route entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Page(Page),
    Redirect(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: &'static str,
    pub target: RouteTarget,
}

/// Outcome of resolving a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `path` is the canonical path after following any redirect
    Page { page: Page, path: &'static str },
    NotFound,
}

/// Redirect chains longer than this are treated as unresolvable.
const MAX_REDIRECTS: usize = 4;

const STANDARD_ROUTES: &[RouteEntry] = &[
    RouteEntry {
        path: "/",
        target: RouteTarget::Redirect("/upload"),
    },
    RouteEntry {
        path: "/login",
        target: RouteTarget::Page(Page::Login),
    },
    RouteEntry {
        path: "/register",
        target: RouteTarget::Page(Page::Register),
    },
    RouteEntry {
        path: "/upload",
        target: RouteTarget::Page(Page::Upload),
    },
    RouteEntry {
        path: "/search/text",
        target: RouteTarget::Page(Page::SearchText),
    },
    RouteEntry {
        path: "/search/ocr",
        target: RouteTarget::Page(Page::SearchOcr),
    },
    RouteEntry {
        path: "/similar",
        target: RouteTarget::Page(Page::Similar),
    },
    RouteEntry {
        path: "/health",
        target: RouteTarget::Page(Page::Health),
    },
];

/// Ordered, immutable route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: &'static [RouteEntry],
}

impl RouteTable {
    /// The application's routes.
    pub fn standard() -> Self {
        Self {
            entries: STANDARD_ROUTES,
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        self.entries
    }

    /// Resolve `path` to a page, following redirects.
    ///
    /// Query strings and fragments are ignored, and a trailing slash is
    /// insignificant.
    pub fn resolve(&self, path: &str) -> Resolution {
        let mut current = normalize(path);

        for _ in 0..=MAX_REDIRECTS {
            match self.lookup(current) {
                Some(RouteEntry {
                    path,
                    target: RouteTarget::Page(page),
                }) => {
                    return Resolution::Page {
                        page: *page,
                        path: *path,
                    }
                }
                Some(RouteEntry {
                    target: RouteTarget::Redirect(to),
                    ..
                }) => current = *to,
                None => return Resolution::NotFound,
            }
        }

        Resolution::NotFound
    }

    /// Canonical path of a page.
    pub fn path_of(&self, page: Page) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|e| e.target == RouteTarget::Page(page))
            .map(|e| e.path)
    }

    fn lookup(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
