mod ids;
mod import_log;
mod link;
mod link_type;
mod node;
mod source_type;

pub use ids::{LinkId, NodeId};
pub use import_log::{ImportLog, ImportLogDraft};
pub use link::{LinkDraft, ObsidianLink};
pub use link_type::LinkType;
pub use node::{NodeBuilder, NodeDraft, ObsidianNode};
pub use source_type::SourceType;
