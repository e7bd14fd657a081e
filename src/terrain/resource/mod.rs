// ============================================
// Resource Module - Стриминг ресурсов ландшафта
// ============================================

mod streamed;
mod task;

pub use streamed::{LoadJob, Resource, ResourcePolicy};
pub use task::{TaskHandle, TaskManager, TaskPoll};

/// Нужен ли ресурс при текущих параметрах обзора
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceRequired {
    Yes,
    No,
}

impl From<bool> for ResourceRequired {
    fn from(required: bool) -> Self {
        if required {
            ResourceRequired::Yes
        } else {
            ResourceRequired::No
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Unloaded,
    Loading,
    Loaded,
}
