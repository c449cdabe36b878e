use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{self, DiagnosticSeverity, Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// 解析中に見つかった問題
///
/// 登録単位で閉じており、解析全体を止めることはない
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub path: PathBuf,
    pub position: Position,
}

impl Diagnostic {
    pub fn warning(
        path: impl Into<PathBuf>,
        position: Position,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            path: path.into(),
            position,
        }
    }

    pub fn error(path: impl Into<PathBuf>, position: Position, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            path: path.into(),
            position,
        }
    }

    /// LSP Diagnostic に変換
    pub fn to_lsp(&self) -> lsp_types::Diagnostic {
        let severity = match self.severity {
            Severity::Warning => DiagnosticSeverity::WARNING,
            Severity::Error => DiagnosticSeverity::ERROR,
        };
        lsp_types::Diagnostic {
            range: Range::new(self.position, self.position),
            severity: Some(severity),
            source: Some("angularjs-components".to_string()),
            message: self.message.clone(),
            ..Default::default()
        }
    }
}
