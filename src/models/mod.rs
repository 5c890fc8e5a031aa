pub mod directory;
pub mod workload;

pub use directory::{
    ContentRequest, CreateRequest, DeleteRequest, DirectoryAction, DirectoryEntry, DirectoryError,
    EntryKind, ListRequest, RenameRequest, SaveRequest,
};
pub use workload::{LabelKey, ResourceQuota, Workload, WorkloadSpec};
