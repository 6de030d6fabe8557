//! Read-only graph views over relational databases.
//!
//! A declarative mapping describes how tables, joins and value templates
//! turn rows into statements. [`mapping::compile`] resolves the mapping
//! once; [`mapping::CompiledMapping::find`] then answers triple patterns by
//! pushing bound terms down into SQL and streaming the results back as
//! triples. SQL text can be generated for several vendors; execution runs
//! against SQLite.

pub mod algebra;
pub mod download;
pub mod errors;
pub mod expr;
pub mod mapping;
pub mod names;
pub mod nodes;
pub mod plan;
pub mod rename;
pub mod sql;
pub mod values;
pub mod vendor;
pub mod vocab;

pub use crate::download::{DownloadContents, DownloadRelation};
pub use crate::errors::RelGraphError;
pub use crate::mapping::{compile, CompiledMapping, Database, PatternRelation, RawMapping};
pub use crate::nodes::{NodeMaker, Term, TermKind, Triple, TriplePattern};
pub use crate::plan::{build_plan, GraphIterator, QueryPlan};
pub use crate::vendor::Vendor;
