use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::Position;

/// コンポーネントのテンプレート
///
/// 外部ファイル（templateUrl / require）の場合は `body` が None で、
/// `position` はテンプレートファイル先頭を指す。
/// インラインの場合は宣言元ファイルとリテラルの位置を持つ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub path: PathBuf,
    pub position: Position,
    pub body: Option<String>,
}

impl Template {
    /// 外部テンプレートファイル
    pub fn external(path: PathBuf) -> Self {
        Self {
            path,
            position: Position::default(),
            body: None,
        }
    }

    /// 宣言元ファイル内のインラインテンプレート
    pub fn inline(path: PathBuf, position: Position, body: impl Into<String>) -> Self {
        Self {
            path,
            position,
            body: Some(body.into()),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.body.is_some()
    }
}
