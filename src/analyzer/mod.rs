mod component;
mod config_accessor;
mod controller;
mod member;
mod parser;
mod source;
mod syntax;
mod template;
mod walk;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::AjsConfig;
use crate::error::AnalyzerError;
use crate::model::{Component, Controller, Diagnostic};

pub use component::{parse_binding_spec, ComponentResolver, ComponentScan};
pub use config_accessor::ConfigAccessor;
pub use controller::{reconcile, ControllerResolver, ControllerScan, PendingRename};
pub use member::MemberExtractor;
pub use parser::{Dialect, SourceParser};
pub use source::{FsLoader, SourceIndex, SourceLoader, SourceRegistry, SCRIPT_EXTENSIONS};
pub use syntax::{DeclarationKind, NodeRef, Resolution, SyntaxFacade};
pub use template::TemplateResolver;
pub use walk::{walk, Flow, NodeTag, SyntaxVisitor};

/// 解析の設定
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// templateUrl の起点ディレクトリ
    pub template_root: PathBuf,
    /// コンポーネント設定クラスを見分けるためのインターフェース名
    pub component_options_interface: String,
    /// テンプレートとして扱うファイルの拡張子
    pub markup_extensions: Vec<String>,
}

impl AnalyzerOptions {
    pub fn from_config(config: &AjsConfig, workspace_root: &Path) -> Self {
        Self {
            template_root: config.template_root_for(workspace_root),
            component_options_interface: config.component_options_interface.clone(),
            markup_extensions: config.markup_extensions.clone(),
        }
    }
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self::from_config(&AjsConfig::default(), Path::new("/"))
    }
}

/// 1ファイル単独で解析した結果
#[derive(Debug, Default)]
pub struct FileAnalysis {
    pub components: Vec<Component>,
    pub controllers: Vec<Arc<Controller>>,
    /// ファイル内で宣言が見つからなかった登録名の付け替え
    pub renames: Vec<PendingRename>,
    pub diagnostics: Vec<Diagnostic>,
}

/// AngularJS のコンポーネント/コントローラー登録を解析するアナライザー
///
/// コントローラーとコンポーネントは別々に走査する。
/// コンポーネントは走査済みのコントローラー一覧に対してリンクされる
#[derive(Clone)]
pub struct Analyzer {
    registry: Arc<SourceRegistry>,
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(registry: Arc<SourceRegistry>, options: AnalyzerOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// ファイル内のコントローラー宣言を収集する
    pub fn scan_controllers(&self, unit: &Arc<SourceIndex>) -> ControllerScan {
        let scan = ControllerResolver::new(
            SyntaxFacade::new(unit),
            &self.options.component_options_interface,
        )
        .scan();
        debug!(
            "{}: {} controller(s), {} pending rename(s)",
            unit.path().display(),
            scan.controllers.len(),
            scan.renames.len()
        );
        scan
    }

    /// ファイル内のコンポーネント登録を解析する
    pub fn scan_components(
        &self,
        unit: &Arc<SourceIndex>,
        controllers: &[Arc<Controller>],
    ) -> ComponentScan {
        let scan = ComponentResolver::new(
            SyntaxFacade::new(unit),
            &self.registry,
            controllers,
            &self.options,
        )
        .scan();
        debug!(
            "{}: {} component(s), {} diagnostic(s)",
            unit.path().display(),
            scan.components.len(),
            scan.diagnostics.len()
        );
        scan
    }

    /// テキストを登録して、そのファイルだけでコントローラーとコンポーネントを解析する
    ///
    /// import先のファイルはレジストリのローダーで読み込む
    pub fn analyze_source(
        &self,
        path: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Result<FileAnalysis, AnalyzerError> {
        let unit = self.registry.insert_source(path, text)?;

        let controller_scan = self.scan_controllers(&unit);
        let controllers: Vec<Arc<Controller>> = controller_scan
            .controllers
            .into_iter()
            .map(Arc::new)
            .collect();
        let component_scan = self.scan_components(&unit, &controllers);

        Ok(FileAnalysis {
            components: component_scan.components,
            controllers,
            renames: controller_scan.renames,
            diagnostics: component_scan.diagnostics,
        })
    }
}
