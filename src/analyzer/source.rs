//! 解析済みソースファイルとそのレジストリ

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Position;
use tracing::debug;
use tree_sitter::{Node, Tree};

use super::parser::{Dialect, SourceParser};
use crate::error::AnalyzerError;
use crate::util::{is_relative_specifier, resolve_relative_path};

/// 拡張子なしのimport指定子に対して試す拡張子（優先順）
pub const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// 1ファイル分の構文木
///
/// 一度パースしたら変更しない。内容が変わった場合はレジストリ側で差し替える
pub struct SourceIndex {
    path: PathBuf,
    text: String,
    tree: Tree,
    dialect: Dialect,
    /// 各行の先頭バイトオフセット
    line_starts: Vec<usize>,
}

impl SourceIndex {
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self, AnalyzerError> {
        let path = path.into();
        let text = text.into();
        let dialect = Dialect::from_path(&path);
        let tree = SourceParser::new(dialect)?.parse(&text)?;

        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Ok(Self {
            path,
            text,
            tree,
            dialect,
            line_starts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// バイトオフセットを行/文字位置に変換（文字はUTF-16単位）
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let character = self
            .text
            .get(line_start..offset)
            .map(|s| s.encode_utf16().count())
            .unwrap_or(0);
        Position::new(line as u32, character as u32)
    }

    pub fn node_position(&self, node: Node) -> Position {
        self.position_at(node.start_byte())
    }
}

/// ファイル読み込みの抽象化
///
/// import先の解決にのみ使う。ディレクトリ列挙は行わない
pub trait SourceLoader: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// ローカルファイルシステムから読み込むローダー
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// パス -> SourceIndex のレジストリ
///
/// 各キーは一度だけ埋める（check-then-fill）。同時に同じパスを読み込んだ場合は
/// 先に登録された方が残る
pub struct SourceRegistry {
    units: DashMap<PathBuf, Arc<SourceIndex>>,
    /// コンポーネント名 -> 設定の解決先ファイル
    origins: DashMap<String, PathBuf>,
    loader: Box<dyn SourceLoader>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::with_loader(FsLoader)
    }

    pub fn with_loader(loader: impl SourceLoader + 'static) -> Self {
        Self {
            units: DashMap::new(),
            origins: DashMap::new(),
            loader: Box::new(loader),
        }
    }

    /// 呼び出し側から渡されたテキストを登録する
    ///
    /// 既存のエントリは置き換える（ファイル変更時の差し替え用）
    pub fn insert_source(
        &self,
        path: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Result<Arc<SourceIndex>, AnalyzerError> {
        let unit = Arc::new(SourceIndex::parse(path, text)?);
        self.units.insert(unit.path().to_path_buf(), Arc::clone(&unit));
        Ok(unit)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<SourceIndex>> {
        self.units.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// 登録済みならそれを返し、なければローダーで読み込んでパースする
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<SourceIndex>, AnalyzerError> {
        if let Some(unit) = self.get(path) {
            return Ok(unit);
        }

        let text = self.loader.read(path).map_err(|source| AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("SourceRegistry: loaded {}", path.display());
        let unit = Arc::new(SourceIndex::parse(path, text)?);

        Ok(Arc::clone(
            self.units.entry(path.to_path_buf()).or_insert(unit).value(),
        ))
    }

    /// import指定子を参照元ファイル基準で解決し、該当するソースを返す
    ///
    /// パッケージ名（相対パスでない指定子）は追跡しない
    pub fn resolve_module(&self, from: &Path, specifier: &str) -> Option<Arc<SourceIndex>> {
        if !is_relative_specifier(specifier) {
            debug!("resolve_module: skipping package specifier '{}'", specifier);
            return None;
        }

        let base = resolve_relative_path(from, specifier);
        module_candidates(&base)
            .into_iter()
            .find_map(|candidate| self.get_or_load(&candidate).ok())
    }

    /// コンポーネント設定の解決先ファイルを記録する
    ///
    /// 最初の記録だけが残る。再解析の前に `forget_origin` か `invalidate` で消しておく
    pub fn record_origin(&self, component: &str, path: &Path) {
        self.origins
            .entry(component.to_string())
            .or_insert_with(|| path.to_path_buf());
    }

    pub fn forget_origin(&self, component: &str) {
        self.origins.remove(component);
    }

    /// コンポーネント設定の解決先ファイルを取得する
    pub fn origin(&self, component: &str) -> Option<PathBuf> {
        self.origins.get(component).map(|entry| entry.value().clone())
    }

    /// 記録済みの解決先ファイルのソースを取得する
    pub fn origin_unit(&self, component: &str) -> Option<Arc<SourceIndex>> {
        let path = self.origin(component)?;
        self.get(&path)
    }

    /// ファイルを登録から外す（そのファイルを解決先とする記録も消す）
    pub fn invalidate(&self, path: &Path) {
        self.units.remove(path);
        self.origins.retain(|_, origin| origin.as_path() != path);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn module_candidates(base: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    let has_script_extension = base
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e));
    if has_script_extension {
        candidates.push(base.to_path_buf());
    }

    for ext in SCRIPT_EXTENSIONS {
        let mut with_ext: OsString = base.as_os_str().to_os_string();
        with_ext.push(".");
        with_ext.push(ext);
        candidates.push(PathBuf::from(with_ext));
    }
    for ext in SCRIPT_EXTENSIONS {
        candidates.push(base.join(format!("index.{}", ext)));
    }

    candidates
}
