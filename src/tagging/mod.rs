//! Bulk tag rewriting of local source state.
//!
//! Between `import` and `sync`, an organization moving into a shared
//! destination often needs its resources retagged: team and business unit
//! tags added, environment names folded, stale keys renamed and synthetic
//! locations repointed. This module does that offline against the source
//! state files, keeping a `<type>_backup.json` copy of the untouched state.
//!
//! - [`mapping`]: the organization-specific YAML mapping
//! - [`ops`]: the individual rewrite steps
//! - [`retag`]: the ordered pipeline and its report

pub mod mapping;
pub mod ops;
pub mod retag;

pub use mapping::{TagMapping, TagRewriteSetting, VariableSwap};
pub use ops::TagRewrite;
pub use retag::{retag, Retagger, TagOptions, TagReport, TagStep};
