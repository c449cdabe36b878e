use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::Position;

use super::controller::Controller;
use super::template::Template;

/// controllerAs 未指定時のエイリアス
pub const DEFAULT_CONTROLLER_AS: &str = "$ctrl";

/// `.component(name, config)` で登録されたコンポーネント
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    /// HTML上の要素名（nameのkebab-case）
    pub html_name: String,
    /// 登録呼び出しがあるファイル
    pub path: PathBuf,
    /// 登録呼び出しのコンポーネント名の位置
    pub position: Position,
    /// 設定オブジェクトが宣言されているファイル（import追跡後の解決先）
    ///
    /// バインディングの位置はこのファイル基準
    pub config_path: PathBuf,
    pub bindings: Vec<Binding>,
    pub template: Option<Template>,
    pub controller_as: String,
    /// 紐付いたコントローラー（所有ではなく共有参照）
    pub controller: Option<Arc<Controller>>,
}

impl Component {
    /// 内部名からバインディングを取得
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// HTML属性名からバインディングを取得
    pub fn binding_by_html_name(&self, html_name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.html_name == html_name)
    }
}

/// コンポーネントのbindingsプロパティ1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// コントローラー側の名前
    pub name: String,
    /// HTML属性名
    pub html_name: String,
    /// 種別記号（'<', '=?', '@', '&' など）
    pub binding_type: String,
    pub position: Position,
}

/// バインディングの方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingMode {
    /// `<` 片方向
    OneWay,
    /// `=` 双方向
    TwoWay,
    /// `@` 文字列
    Text,
    /// `&` 式（コールバック）
    Expression,
    Unknown,
}

impl Binding {
    pub fn mode(&self) -> BindingMode {
        match self.binding_type.chars().next() {
            Some('<') => BindingMode::OneWay,
            Some('=') => BindingMode::TwoWay,
            Some('@') => BindingMode::Text,
            Some('&') => BindingMode::Expression,
            _ => BindingMode::Unknown,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.mode() != BindingMode::Unknown && self.binding_type.contains('?')
    }
}
