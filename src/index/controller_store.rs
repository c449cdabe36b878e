use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::analyzer::PendingRename;
use crate::model::Controller;

/// コントローラーの管理ストア
pub struct ControllerStore {
    /// 宣言ファイル -> コントローラー
    controllers: DashMap<PathBuf, Vec<Arc<Controller>>>,
    /// 登録ファイル -> 宣言が別ファイルにある付け替え
    renames: DashMap<PathBuf, Vec<PendingRename>>,
}

impl ControllerStore {
    pub fn new() -> Self {
        Self {
            controllers: DashMap::new(),
            renames: DashMap::new(),
        }
    }

    pub fn add_controller(&self, controller: Arc<Controller>) {
        self.controllers
            .entry(controller.path.clone())
            .or_default()
            .push(controller);
    }

    pub fn get_controllers(&self, path: &Path) -> Vec<Arc<Controller>> {
        self.controllers
            .get(path)
            .map(|v| v.value().clone())
            .unwrap_or_default()
    }

    /// 登録名、なければ宣言名でコントローラーを探す
    pub fn find(&self, name: &str) -> Option<Arc<Controller>> {
        self.find_by(|c| c.name == name)
            .or_else(|| self.find_by(|c| c.class_name == name))
    }

    fn find_by(&self, predicate: impl Fn(&Controller) -> bool) -> Option<Arc<Controller>> {
        self.controllers.iter().find_map(|entry| {
            entry
                .value()
                .iter()
                .find(|c| predicate(Arc::as_ref(c)))
                .map(Arc::clone)
        })
    }

    /// 全コントローラーを取得
    pub fn get_all_controllers(&self) -> Vec<Arc<Controller>> {
        self.controllers
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    // ========== Renames ==========

    pub fn add_rename(&self, rename: PendingRename) {
        self.renames
            .entry(rename.path.clone())
            .or_default()
            .push(rename);
    }

    /// 記録済みの付け替えを全て取得
    pub fn get_all_renames(&self) -> Vec<PendingRename> {
        self.renames
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// 格納済みのコントローラーに付け替えを適用する
    ///
    /// 宣言名が一致するコントローラーがあれば true
    pub fn apply_rename(&self, rename: &PendingRename) -> bool {
        self.replace_name(&rename.class_name, |_| Some(rename.public_name.clone()))
    }

    /// 付け替えで設定された登録名を宣言名に戻す
    fn revert_rename(&self, rename: &PendingRename) {
        self.replace_name(&rename.class_name, |current| {
            (current == rename.public_name).then(|| rename.class_name.clone())
        });
    }

    fn replace_name(&self, class_name: &str, new_name: impl Fn(&str) -> Option<String>) -> bool {
        let mut matched = false;
        for mut entry in self.controllers.iter_mut() {
            for controller in entry.value_mut().iter_mut() {
                if controller.class_name != class_name {
                    continue;
                }
                matched = true;
                let name = new_name(controller.name.as_str());
                if let Some(name) = name.filter(|n| *n != controller.name) {
                    let mut renamed = (**controller).clone();
                    renamed.name = name;
                    *controller = Arc::new(renamed);
                }
            }
        }
        matched
    }

    /// ファイルのコントローラーと、そのファイルで登録された付け替えを消す
    pub fn clear_document(&self, path: &Path) {
        self.controllers.remove(path);
        if let Some((_, renames)) = self.renames.remove(path) {
            for rename in &renames {
                self.revert_rename(rename);
            }
        }
    }

    pub fn clear_all(&self) {
        self.controllers.clear();
        self.renames.clear();
    }
}

impl Default for ControllerStore {
    fn default() -> Self {
        Self::new()
    }
}
