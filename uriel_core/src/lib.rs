//! `uriel_core` is the engine of the uriel static site generator. It reads a
//! tree of nodes from `nodes/`, derives listings across the tree, and merges
//! each node into its template from `templates/` to produce the pages written
//! to `public/`.
//!
//! ## Processing Pipeline
//!
//! ```text
//! nodes/ directory
//!   → Node tree (headers cascade from parent to child as nodes are read)
//!   → Derivation (tag nodes, tag links and child listings stored as headers)
//!   → Page merge (templates, includes and node bodies expanded token by token)
//!   → public/<url>/index.html
//! ```
//!
//! ## Modules
//!
//! - [`config`]: configuration loading from `uriel.toml`.
//! - [`derive`]: tree-wide derivation of tag nodes and link listings.
//! - [`project`]: reading `nodes/`, rendering every node and writing `public/`.
//!
//! ## Key Types
//!
//! - [`NodeTree`]: arena owning every [`Node`] plus the injected [`Clock`] and
//!   [`LogSink`].
//! - [`Headers`]: the ordered, case-insensitive header map of a node.
//! - [`Page`]: renders one node, guarding includes with a [`TemplateStack`].
//! - [`Token`]: one literal run or `{{type:value}}` placeholder.
//! - [`SojuRegistry`]: user functions callable as `{{soju:name(args)}}`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use uriel_core::project::load_project;
//!
//! let mut project = load_project(Path::new(".")).unwrap();
//! project.render(None).unwrap();
//! project.write().unwrap();
//! ```

pub use clock::*;
pub use config::*;
pub use error::*;
pub use headers::Headers;
pub use log::*;
pub use node::*;
pub use page::*;
pub use soju::*;
pub use template_stack::*;
pub use token::*;

mod clock;
pub mod config;
pub mod derive;
#[allow(unused_assignments)]
mod error;
pub mod headers;
pub mod html;
pub(crate) mod lexer;
mod log;
mod node;
mod page;
pub mod project;
mod soju;
mod template_stack;
mod token;

#[cfg(test)]
mod __fixtures;
