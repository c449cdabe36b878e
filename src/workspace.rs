//! ワークスペース単位の解析
//!
//! 1. 全ファイルのコントローラーを収集（ファイルをまたぐ登録名の付け替えもここで適用）
//! 2. 全ファイルのコンポーネントを解析し、収集済みコントローラーにリンク
//! 3. 結果を `Index` に格納

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tower_lsp::lsp_types::Position;
use tracing::{debug, info, warn};

use crate::analyzer::{
    reconcile, Analyzer, AnalyzerOptions, SourceIndex, SourceRegistry, SCRIPT_EXTENSIONS,
};
use crate::config::{AjsConfig, PathMatcher};
use crate::error::{AnalyzerError, ConfigError};
use crate::index::Index;
use crate::model::{Component, Controller, Diagnostic};

/// 解析結果
#[derive(Debug, Default, Serialize)]
pub struct AnalysisReport {
    pub components: Vec<Component>,
    pub controllers: Vec<Arc<Controller>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 解析状態はクローン間で共有される
#[derive(Clone)]
pub struct Workspace {
    root: PathBuf,
    registry: Arc<SourceRegistry>,
    analyzer: Analyzer,
    index: Arc<Index>,
    path_matcher: PathMatcher,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: &AjsConfig) -> Result<Self, ConfigError> {
        Self::with_registry(root, config, Arc::new(SourceRegistry::new()))
    }

    /// import先の読み込み方法を差し替えたレジストリで作成する
    pub fn with_registry(
        root: impl Into<PathBuf>,
        config: &AjsConfig,
        registry: Arc<SourceRegistry>,
    ) -> Result<Self, ConfigError> {
        let root = root.into();
        let options = AnalyzerOptions::from_config(config, &root);
        Ok(Self {
            path_matcher: config.create_path_matcher()?,
            analyzer: Analyzer::new(Arc::clone(&registry), options),
            index: Arc::new(Index::new()),
            registry,
            root,
        })
    }

    /// ワークスペースルートの ajsconfig.json を読み込んで作成する
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config = AjsConfig::load_from_dir(&root);
        Self::new(root, &config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// include/exclude 設定に照らして解析対象かどうか
    pub fn should_analyze(&self, path: &Path) -> bool {
        let relative_path = path.strip_prefix(&self.root).unwrap_or(path);
        self.path_matcher.should_include(relative_path)
    }

    /// ルート以下の解析対象スクリプトを列挙する
    pub fn collect_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_script_files(&self.root, &self.root, &self.path_matcher, &mut files);
        files.sort();
        files
    }

    /// メモリ上のテキストを解析する
    ///
    /// 渡されたファイルの以前の結果は置き換える。
    /// 他のファイルの解析済みコントローラーもリンク対象に含める
    pub fn analyze_sources(&self, sources: Vec<(PathBuf, String)>) -> AnalysisReport {
        let mut report = AnalysisReport::default();

        let mut units: Vec<Arc<SourceIndex>> = Vec::new();
        for (path, text) in sources {
            if !self.should_analyze(&path) {
                debug!("skipping excluded file {}", path.display());
                continue;
            }
            self.clear_document(&path);
            match self.registry.insert_source(&path, text) {
                Ok(unit) => units.push(unit),
                Err(e) => {
                    warn!("{}", e);
                    report
                        .diagnostics
                        .push(Diagnostic::error(&path, Position::default(), e.to_string()));
                }
            }
        }

        // 1. コントローラー
        let mut controllers = Vec::new();
        let mut renames = Vec::new();
        for unit in &units {
            let scan = self.analyzer.scan_controllers(unit);
            controllers.extend(scan.controllers);
            renames.extend(scan.renames);
        }

        // 以前に解析したファイルの付け替えを先に、今回の付け替えを後に適用する
        let mut pending = self.index.controllers.get_all_renames();
        pending.extend(renames.iter().cloned());
        let unmatched = reconcile(&mut controllers, pending);
        for rename in renames {
            let applied = self.index.controllers.apply_rename(&rename);
            if !applied && unmatched.contains(&rename) {
                debug!(
                    "controller '{}' registered as '{}' has no declaration yet ({})",
                    rename.class_name,
                    rename.public_name,
                    rename.path.display()
                );
            }
            self.index.controllers.add_rename(rename);
        }
        let controllers: Vec<Arc<Controller>> = controllers.into_iter().map(Arc::new).collect();

        let analyzed: HashSet<&Path> = units.iter().map(|unit| unit.path()).collect();
        let mut linkable = controllers.clone();
        linkable.extend(
            self.index
                .controllers
                .get_all_controllers()
                .into_iter()
                .filter(|c| !analyzed.contains(c.path.as_path())),
        );

        // 2. コンポーネント
        for unit in &units {
            let scan = self.analyzer.scan_components(unit, &linkable);
            report.components.extend(scan.components);
            report.diagnostics.extend(scan.diagnostics);
        }

        // 3. インデックス
        for controller in &controllers {
            self.index.controllers.add_controller(Arc::clone(controller));
        }
        for component in &report.components {
            self.index.components.add_component(component.clone());
        }

        info!(
            "analyzed {} file(s): {} component(s), {} controller(s), {} diagnostic(s)",
            units.len(),
            report.components.len(),
            controllers.len(),
            report.diagnostics.len()
        );
        report.controllers = controllers;
        report
    }

    /// ファイルを非同期に読み込んで解析する
    pub async fn analyze_paths(&self, paths: Vec<PathBuf>) -> AnalysisReport {
        let mut tasks = JoinSet::new();
        for (order, path) in paths.into_iter().enumerate() {
            if !self.should_analyze(&path) {
                debug!("skipping excluded file {}", path.display());
                continue;
            }
            tasks.spawn(async move {
                let text = tokio::fs::read_to_string(&path).await;
                (order, path, text)
            });
        }

        let mut sources = Vec::new();
        let mut read_errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((order, path, Ok(text))) => sources.push((order, path, text)),
                Ok((_, path, Err(source))) => {
                    let error = AnalyzerError::Io {
                        path: path.clone(),
                        source,
                    };
                    warn!("{}", error);
                    let diagnostic =
                        Diagnostic::error(path, Position::default(), error.to_string());
                    read_errors.push(diagnostic);
                }
                Err(e) => warn!("read task failed: {}", e),
            }
            tokio::task::yield_now().await;
        }
        sources.sort_by_key(|(order, _, _)| *order);

        let sources: Vec<(PathBuf, String)> = sources
            .into_iter()
            .map(|(_, path, text)| (path, text))
            .collect();
        // import先の読み込みは同期I/Oなのでブロッキングスレッドで解析する
        let workspace = self.clone();
        let mut report = tokio::task::spawn_blocking(move || workspace.analyze_sources(sources))
            .await
            .unwrap_or_else(|e| {
                warn!("analysis task failed: {}", e);
                AnalysisReport::default()
            });
        read_errors.append(&mut report.diagnostics);
        report.diagnostics = read_errors;
        report
    }

    /// ルート以下の全ファイルを解析する
    pub async fn analyze_all(&self) -> AnalysisReport {
        let workspace = self.clone();
        let files = tokio::task::spawn_blocking(move || workspace.collect_files())
            .await
            .unwrap_or_else(|e| {
                warn!("file collection failed: {}", e);
                Vec::new()
            });
        self.analyze_paths(files).await
    }

    /// コンポーネント設定の解決先ファイル
    pub fn origin_of(&self, component: &str) -> Option<PathBuf> {
        self.registry.origin(component)
    }

    /// ファイル変更時に登録と解析結果を破棄する
    pub fn invalidate(&self, path: &Path) {
        self.clear_document(path);
        self.registry.invalidate(path);
    }

    /// ファイルの解析結果と、そのファイルで登録されたコンポーネントの解決先記録を消す
    fn clear_document(&self, path: &Path) {
        for component in self.index.components.get_components(path) {
            self.registry.forget_origin(&component.name);
        }
        self.index.clear_document(path);
    }
}

fn collect_script_files(
    dir: &Path,
    root: &Path,
    path_matcher: &PathMatcher,
    files: &mut Vec<PathBuf>,
) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let relative_path = path.strip_prefix(root).unwrap_or(&path);

        if path.is_dir() {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with('.') || name == "node_modules");
            if !hidden {
                collect_script_files(&path, root, path_matcher, files);
            }
            continue;
        }

        let is_script = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SCRIPT_EXTENSIONS.contains(&e));
        if is_script && path_matcher.should_include(relative_path) {
            files.push(path);
        }
    }
}
