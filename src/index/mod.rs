mod component_store;
mod controller_store;

use std::path::Path;
use std::sync::Arc;

pub use component_store::ComponentStore;
pub use controller_store::ControllerStore;

use crate::model::{Component, Controller};

/// 解析結果のファイル単位インデックス
///
/// ファイル変更時は `clear_document` で該当ファイル分だけ差し替える
pub struct Index {
    pub components: ComponentStore,
    pub controllers: ControllerStore,
}

impl Index {
    pub fn new() -> Self {
        Self {
            components: ComponentStore::new(),
            controllers: ControllerStore::new(),
        }
    }

    pub fn find_component_by_html_name(&self, html_name: &str) -> Option<Component> {
        self.components.find_by_html_name(html_name)
    }

    pub fn find_controller(&self, name: &str) -> Option<Arc<Controller>> {
        self.controllers.find(name)
    }

    pub fn clear_document(&self, path: &Path) {
        self.components.clear_document(path);
        self.controllers.clear_document(path);
    }

    pub fn clear_all(&self) {
        self.components.clear_all();
        self.controllers.clear_all();
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}
