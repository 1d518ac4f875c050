//! Lane assignment for commit graph visualization.
//!
//! Converts an ordered window of commits with parent links into rendering
//! lanes ("columns") plus, per commit, the contiguous lane range that must
//! stay visually reserved for connector lines.

mod allocator;
mod layout;

pub use allocator::ColumnAllocator;
pub use layout::{Commit, GraphLayout, ParentRef, TRACKED_PARENTS};
