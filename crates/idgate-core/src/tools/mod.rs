//! Tool descriptors and the per-run tool filter.

pub mod filter;

pub use filter::ToolFilter;

/// What the filter needs to know about a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToolSpec {
    pub name: &'static str,
    pub collection: &'static str,
    pub read_only: bool,
}

impl ToolSpec {
    pub const fn read(name: &'static str, collection: &'static str) -> Self {
        Self {
            name,
            collection,
            read_only: true,
        }
    }

    pub const fn write(name: &'static str, collection: &'static str) -> Self {
        Self {
            name,
            collection,
            read_only: false,
        }
    }
}

impl AsRef<ToolSpec> for ToolSpec {
    fn as_ref(&self) -> &ToolSpec {
        self
    }
}
