use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::path_matcher::PathMatcher;
use crate::error::ConfigError;

/// ajsconfig.json の設定
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AjsConfig {
    /// templateUrl の起点ディレクトリ（相対パスはワークスペースルートからの相対）
    #[serde(default)]
    pub template_root: Option<PathBuf>,
    /// コンポーネント設定クラスを見分けるためのインターフェース名
    #[serde(default = "default_options_interface")]
    pub component_options_interface: String,
    /// テンプレートとして扱うファイルの拡張子
    #[serde(default = "default_markup_extensions")]
    pub markup_extensions: Vec<String>,
    /// 解析対象のglobパターン（空の場合は全ファイル対象）
    #[serde(default)]
    pub include: Vec<String>,
    /// 除外対象のglobパターン
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_options_interface() -> String {
    "IComponentOptions".to_string()
}

fn default_markup_extensions() -> Vec<String> {
    vec![".html".to_string(), ".htm".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/node_modules".to_string(),
        "**/node_modules/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/*.d.ts".to_string(),
    ]
}

impl Default for AjsConfig {
    fn default() -> Self {
        Self {
            template_root: None,
            component_options_interface: default_options_interface(),
            markup_extensions: default_markup_extensions(),
            include: Vec::new(),
            exclude: default_exclude(),
        }
    }
}

impl AjsConfig {
    /// 指定ディレクトリからajsconfig.jsonを読み込む
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join("ajsconfig.json");
        Self::load_from_path(&config_path)
    }

    /// 指定パスからajsconfig.jsonを読み込む
    ///
    /// ファイルがない、または壊れている場合はデフォルト設定を返す
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// templateUrl 解決に使うルートディレクトリ
    pub fn template_root_for(&self, workspace_root: &Path) -> PathBuf {
        match &self.template_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => crate::util::normalize_path(&workspace_root.join(root)),
            None => workspace_root.to_path_buf(),
        }
    }

    /// PathMatcherを作成
    pub fn create_path_matcher(&self) -> Result<PathMatcher, ConfigError> {
        PathMatcher::new(&self.include, &self.exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AjsConfig::default();
        assert_eq!(config.component_options_interface, "IComponentOptions");
        assert_eq!(config.markup_extensions, vec![".html", ".htm"]);
        assert!(config.template_root.is_none());
    }

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "templateRoot": "public",
            "componentOptionsInterface": "ComponentConfig",
            "markupExtensions": [".tpl.html"]
        }"#;
        let config: AjsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.component_options_interface, "ComponentConfig");
        assert_eq!(config.markup_extensions, vec![".tpl.html"]);
        assert_eq!(
            config.template_root_for(Path::new("/proj")),
            PathBuf::from("/proj/public")
        );
    }

    #[test]
    fn test_empty_config() {
        let json = r#"{}"#;
        let config: AjsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.component_options_interface, "IComponentOptions");
        assert!(config.exclude.iter().any(|p| p == "**/node_modules/**"));
        assert_eq!(
            config.template_root_for(Path::new("/proj")),
            PathBuf::from("/proj")
        );
    }

    #[test]
    fn test_broken_config_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ajsconfig.json"), "{ not json").unwrap();
        let config = AjsConfig::load_from_dir(dir.path());
        assert_eq!(config.component_options_interface, "IComponentOptions");
    }
}
