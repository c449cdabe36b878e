use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::model::Component;

/// コンポーネントの管理ストア
pub struct ComponentStore {
    /// 登録呼び出しのあるファイル -> コンポーネント
    components: DashMap<PathBuf, Vec<Component>>,
    /// HTML要素名 -> 登録ファイル（逆引き）
    html_names: DashMap<String, PathBuf>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self {
            components: DashMap::new(),
            html_names: DashMap::new(),
        }
    }

    pub fn add_component(&self, component: Component) {
        self.html_names
            .insert(component.html_name.clone(), component.path.clone());
        self.components
            .entry(component.path.clone())
            .or_default()
            .push(component);
    }

    pub fn get_components(&self, path: &Path) -> Vec<Component> {
        self.components
            .get(path)
            .map(|v| v.value().clone())
            .unwrap_or_default()
    }

    /// HTML要素名（`user-card`）からコンポーネントを取得
    pub fn find_by_html_name(&self, html_name: &str) -> Option<Component> {
        let path = self.html_names.get(html_name)?;
        let components = self.components.get(path.value())?;
        components
            .iter()
            .find(|c| c.html_name == html_name)
            .cloned()
    }

    /// 全コンポーネントを取得
    pub fn get_all_components(&self) -> Vec<Component> {
        self.components
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    pub fn clear_document(&self, path: &Path) {
        if let Some((_, components)) = self.components.remove(path) {
            for component in components {
                self.html_names
                    .remove_if(&component.html_name, |_, registered| registered == path);
            }
        }
    }

    pub fn clear_all(&self) {
        self.components.clear();
        self.html_names.clear();
    }
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}
