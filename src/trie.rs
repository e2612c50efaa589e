//! Path-segment trie mapping URL paths to route handles.
//!
//! Paths are split on `/` and each segment selects a child node. Three kinds
//! of segment are understood:
//!
//! ```text
//! /blog/archive/      literal segments
//! /blog/:slug/        a named parameter, binds exactly one segment
//! /files/*rest        a wildcard, binds the remainder of the path
//! ```
//!
//! ## Resolution Priority
//!
//! At every level, resolution tries the literal child first, then the
//! parameter child, then the wildcard. The order is a true backtracking
//! search: a literal subtree that exists but fails deeper down does not block
//! the parameter or wildcard alternatives at the shallower level.
//!
//! ```text
//! /a/          → literal route
//! /a/:id/      → /a/5/    binds id = "5"
//! /a/*rest     → /a/5/6/  binds rest = "5/6"
//! ```
//!
//! ## Limitations
//!
//! Each level holds at most one parameter child. Registering `/a/:id/` and
//! then `/a/:slug/x/` reuses the existing parameter node, and the later name
//! replaces the earlier one. Wildcards always terminate a path; anything
//! registered after `*name` is ignored.

use std::collections::BTreeMap;

/// Captured `:param` and `*wildcard` values, keyed by name.
pub type Params = BTreeMap<String, String>;

/// How a walked route is reached from its parent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Literal,
    Param,
    Wildcard,
}

/// A route visited by [`RouteTrie::walk`].
#[derive(Debug)]
pub struct WalkEntry<'a, T> {
    /// Reconstructed path, e.g. `/blog/:slug` or `/files/*rest`.
    pub path: String,
    pub kind: MatchKind,
    pub route: &'a T,
}

#[derive(Debug, Clone)]
struct ParamChild<T> {
    name: String,
    node: Box<RouteTrie<T>>,
}

#[derive(Debug, Clone)]
struct WildcardChild<T> {
    name: String,
    route: T,
}

/// A node of the routing trie. The root node is the trie itself.
#[derive(Debug, Clone)]
pub struct RouteTrie<T> {
    route: Option<T>,
    children: BTreeMap<String, RouteTrie<T>>,
    param: Option<ParamChild<T>>,
    wildcard: Option<WildcardChild<T>>,
}

impl<T> Default for RouteTrie<T> {
    fn default() -> Self {
        Self {
            route: None,
            children: BTreeMap::new(),
            param: None,
            wildcard: None,
        }
    }
}

impl<T> RouteTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `route` at `path`. An identical path registered earlier is
    /// overwritten.
    pub fn add(&mut self, path: &str, route: T) {
        let path = normalize(path);
        if path.is_empty() {
            self.route = Some(route);
            return;
        }

        let (head, tail) = split_head(path);
        if let Some(name) = head.strip_prefix('*') {
            self.wildcard = Some(WildcardChild {
                name: name.to_string(),
                route,
            });
            return;
        }

        let next = if let Some(name) = head.strip_prefix(':') {
            let param = self.param.get_or_insert_with(|| ParamChild {
                name: name.to_string(),
                node: Box::default(),
            });
            param.name = name.to_string();
            param.node.as_mut()
        } else {
            self.children.entry(head.to_string()).or_default()
        };
        next.add(tail, route);
    }

    /// Resolve `path` to a route and the parameters captured on the way.
    pub fn resolve(&self, path: &str) -> Option<(&T, Params)> {
        let mut params = Params::new();
        let route = self.resolve_into(normalize(path), &mut params)?;
        Some((route, params))
    }

    fn resolve_into<'a>(&'a self, path: &str, params: &mut Params) -> Option<&'a T> {
        if path.is_empty() {
            return self.route.as_ref();
        }

        let (head, tail) = split_head(path);

        if let Some(child) = self.children.get(head) {
            let mut scoped = params.clone();
            if let Some(route) = child.resolve_into(tail, &mut scoped) {
                *params = scoped;
                return Some(route);
            }
        }

        if let Some(param) = &self.param {
            let mut scoped = params.clone();
            scoped.insert(param.name.clone(), head.to_string());
            if let Some(route) = param.node.resolve_into(tail, &mut scoped) {
                *params = scoped;
                return Some(route);
            }
        }

        let wildcard = self.wildcard.as_ref()?;
        params.insert(
            wildcard.name.clone(),
            path.trim_end_matches('/').to_string(),
        );
        Some(&wildcard.route)
    }

    /// Depth-first visit of every registered route. Literal children are
    /// visited in lexical order, then the parameter subtree, then the
    /// wildcard.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(WalkEntry<'a, T>)) {
        self.walk_from("", MatchKind::Literal, &mut visit);
    }

    fn walk_from<'a>(
        &'a self,
        prefix: &str,
        kind: MatchKind,
        visit: &mut impl FnMut(WalkEntry<'a, T>),
    ) {
        if let Some(route) = &self.route {
            let path = if prefix.is_empty() { "/" } else { prefix };
            visit(WalkEntry {
                path: path.to_string(),
                kind,
                route,
            });
        }
        for (segment, child) in &self.children {
            child.walk_from(&format!("{prefix}/{segment}"), MatchKind::Literal, visit);
        }
        if let Some(param) = &self.param {
            param
                .node
                .walk_from(&format!("{prefix}/:{}", param.name), MatchKind::Param, visit);
        }
        if let Some(wildcard) = &self.wildcard {
            visit(WalkEntry {
                path: format!("{prefix}/*{}", wildcard.name),
                kind: MatchKind::Wildcard,
                route: &wildcard.route,
            });
        }
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.walk(|_| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip leading slashes.
fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Split `a/b/c` into (`a`, `b/c`). A path with no slash is all head.
fn split_head(path: &str) -> (&str, &str) {
    match path.find('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => (path, ""),
    }
}
