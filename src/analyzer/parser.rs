use std::path::Path;

use tree_sitter::{Language, Parser, Tree};

use crate::error::AnalyzerError;

/// ソースファイルの言語（拡張子から判定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts" | "mts" | "cts") => Dialect::TypeScript,
            Some("tsx") => Dialect::Tsx,
            _ => Dialect::JavaScript,
        }
    }

    fn language(self) -> Language {
        match self {
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

pub struct SourceParser {
    parser: Parser,
}

impl SourceParser {
    pub fn new(dialect: Dialect) -> Result<Self, AnalyzerError> {
        let mut parser = Parser::new();
        parser
            .set_language(&dialect.language())
            .map_err(|e| {
                AnalyzerError::Parse(format!("Failed to load {:?} grammar: {}", dialect, e))
            })?;

        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &str) -> Result<Tree, AnalyzerError> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| AnalyzerError::Parse("tree-sitter returned no tree".to_string()))
    }
}
