use std::sync::Arc;

use db::models::resource::ResourceKind;

use crate::{api::ResourceApi, slice::ResourceSlice};

/// Application state: one cache slice per resource, all sharing a transport.
/// Views receive it by reference.
#[derive(Clone)]
pub struct AppStore {
    pub flows: ResourceSlice,
    pub tasks: ResourceSlice,
    pub notes: ResourceSlice,
    pub users: ResourceSlice,
}

impl AppStore {
    pub fn new(api: Arc<dyn ResourceApi>) -> Self {
        Self {
            flows: ResourceSlice::new(ResourceKind::Flow, api.clone()),
            tasks: ResourceSlice::new(ResourceKind::Task, api.clone()),
            notes: ResourceSlice::new(ResourceKind::Note, api.clone()),
            users: ResourceSlice::new(ResourceKind::User, api),
        }
    }

    pub fn slice(&self, kind: ResourceKind) -> &ResourceSlice {
        match kind {
            ResourceKind::Flow => &self.flows,
            ResourceKind::Task => &self.tasks,
            ResourceKind::Note => &self.notes,
            ResourceKind::User => &self.users,
        }
    }
}
