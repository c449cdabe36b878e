use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 設定オブジェクトを静的に解決できなかった場合に添えるヒント
pub const UNSUPPORTED_CONFIG_HINT: &str =
    "declare the configuration as an object literal, a class, or export it from another module";

/// アナライザー解析エラー
///
/// いずれも1つの登録・1回の解決に閉じたエラーで、他の登録やファイルの解析は継続する
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Unsupported configuration for component '{component}': {reason} (hint: {hint})")]
    UnsupportedConfiguration {
        component: String,
        reason: String,
        hint: &'static str,
    },

    #[error(
        "'{identifier}' is bound to a {kind} in {}, which cannot be resolved statically",
        path.display()
    )]
    UnsupportedExpression {
        identifier: String,
        kind: String,
        path: PathBuf,
    },

    #[error("Import chain for '{identifier}' ends in {} without a declaration", path.display())]
    ImportDeadEnd { identifier: String, path: PathBuf },

    #[error("Import chain for '{identifier}' loops back into {}", path.display())]
    ImportCycle { identifier: String, path: PathBuf },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl AnalyzerError {
    /// 登録単位の「未対応の設定」エラーを作成する
    pub fn unsupported(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            component: component.into(),
            reason: reason.into(),
            hint: UNSUPPORTED_CONFIG_HINT,
        }
    }

    /// 解決途中のエラーをコンポーネント登録のエラーに包み直す
    ///
    /// import追跡の行き止まりも未対応の設定と同じ扱いにする
    pub fn for_component(self, component: &str) -> Self {
        match self {
            Self::UnsupportedConfiguration { .. } => self,
            other => Self::unsupported(component, other.to_string()),
        }
    }
}

/// 設定ファイル関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid ajsconfig.json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
