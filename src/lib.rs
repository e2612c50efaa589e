//! # Podsite
//!
//! The routing and build core of a static-site generator. Content becomes
//! routes, routes become files, and every build is reconciled against the
//! previous one by content hash.
//!
//! # Architecture: Route, Stage, Commit
//!
//! ```text
//! providers ──► Router (RouteTrie) ──► Builder ──► staging/ ──► output/
//!                                          │                      │
//!                                          └── manifest diff ◄────┘
//! ```
//!
//! 1. **Route**: providers enumerate routes (documents, static files, custom
//!    routes) and the router registers them in a segment trie.
//! 2. **Stage**: every route is rendered or copied into a private staging
//!    directory beside the output tree, on a bounded worker pool.
//! 3. **Commit**: only when every route succeeded are staged files renamed
//!    into the output tree. The new manifest is diffed against the previous
//!    one, and stale files are pruned.
//!
//! A failed build never touches the output tree.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`trie`] | Segment trie with literal, `:param` and `*wildcard` matching |
//! | [`route`] | `Route`, `RouteKind`, the `Render` seam and the `RouteProvider` trait |
//! | [`provider`] | Document, static directory and custom providers |
//! | [`render`] | Markdown to HTML with a Maud layout |
//! | [`locale`] | Translation tables and missing-translation tracking |
//! | [`router`] | Registrations, lazy warm-up, lookup and reset |
//! | [`builder`] | The build pipeline |
//! | [`staging`] | Staged writes and their commit into the output tree |
//! | [`manifest`] | Build manifests, content hashing, manifest diff |
//! | [`prune`] | Stale output removal |
//! | [`export`] | Reconcile a build into a separate publish tree |
//! | [`metrics`] | Per-build counts, sizes and memory use |
//! | [`git`] | Branch and commit metadata for the manifest |
//! | [`hooks`] | Callbacks around each build |
//! | [`pod`] | Opens a site root and wires everything together |
//! | [`config`] | `podsite.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Rebuild the Trie, Never Patch It
//!
//! When sources change the router drops its trie and re-asks every provider
//! for routes. Partial edits to the trie are never attempted.
//!
//! ## Incremental Builds Only Add
//!
//! A build restricted by `--pattern` sees only part of the site, so it cannot
//! know which outputs are stale. It adds and edits, never deletes.

pub mod builder;
pub mod config;
pub mod export;
pub mod git;
pub mod hooks;
pub mod locale;
pub mod manifest;
pub mod metrics;
pub mod output;
pub mod pod;
pub mod provider;
pub mod prune;
pub mod render;
pub mod route;
pub mod router;
pub mod staging;
pub mod trie;

#[cfg(test)]
pub(crate) mod test_helpers;
