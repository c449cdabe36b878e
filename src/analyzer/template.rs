//! コンポーネントのテンプレート解決
//!
//! 優先順:
//! 1. `templateUrl` - テンプレートルートからのパス
//! 2. `template` - インライン文字列
//! 3. `template: require('./x.html')` / `import('./x.html')` - 宣言ファイルからの相対パス
//! 4. `template: tpl` - マークアップのimport、またはローカル変数（2, 3で解決）
//! 5. `component: 'name'` - `<name />` を合成

use std::path::Path;

use tree_sitter::Node;

use super::config_accessor::ConfigAccessor;
use super::syntax::{named_children, unwrap_expression, LocalBinding, SyntaxFacade};
use crate::model::Template;
use crate::util::{has_markup_extension, kebab_case, resolve_relative_path, resolve_under_root};

pub struct TemplateResolver<'a> {
    template_root: &'a Path,
    markup_extensions: &'a [String],
}

impl<'a> TemplateResolver<'a> {
    pub fn new(template_root: &'a Path, markup_extensions: &'a [String]) -> Self {
        Self {
            template_root,
            markup_extensions,
        }
    }

    pub fn resolve(&self, accessor: &ConfigAccessor) -> Option<Template> {
        let facade = accessor.facade();

        if let Some(url) = accessor
            .get("templateUrl")
            .and_then(|node| facade.string_constant(node))
        {
            return Some(Template::external(resolve_under_root(self.template_root, &url)));
        }

        if let Some(template) = accessor
            .get("template")
            .and_then(|node| self.from_expression(facade, node))
        {
            return Some(template);
        }

        accessor
            .get("component")
            .and_then(|node| Self::shorthand(facade, node))
    }

    fn from_expression(&self, facade: SyntaxFacade, node: Node) -> Option<Template> {
        let node = unwrap_expression(node);
        if node.kind() == "identifier" {
            return self.from_identifier(facade, node);
        }
        Self::from_literal_or_request(facade, node)
    }

    /// インライン文字列、または `require`/`import` されたファイル
    fn from_literal_or_request(facade: SyntaxFacade, node: Node) -> Option<Template> {
        let node = unwrap_expression(node);
        if let Some(body) = facade.string_value(node) {
            return Some(Template::inline(
                facade.path().to_path_buf(),
                facade.position(node),
                body,
            ));
        }
        facade
            .module_request(node)
            .map(|specifier| Template::external(resolve_relative_path(facade.path(), &specifier)))
    }

    fn from_identifier(&self, facade: SyntaxFacade, ident: Node) -> Option<Template> {
        let name = facade.text(ident);
        let binding = facade.lookup_local(name);

        // 識別子を束縛しているマークアップのimportを優先
        if let Some(LocalBinding::Import(import)) = &binding {
            if has_markup_extension(&import.specifier, self.markup_extensions) {
                return Some(Template::external(resolve_relative_path(
                    facade.path(),
                    &import.specifier,
                )));
            }
        }

        if let Some(specifier) = self.markup_import(facade) {
            return Some(Template::external(resolve_relative_path(facade.path(), &specifier)));
        }

        match binding {
            Some(LocalBinding::Variable {
                value: Some(value), ..
            }) => Self::from_literal_or_request(facade, value),
            _ => None,
        }
    }

    /// ファイル内で最初にマークアップファイルをimportしている指定子
    fn markup_import(&self, facade: SyntaxFacade) -> Option<String> {
        named_children(facade.root())
            .into_iter()
            .filter(|statement| statement.kind() == "import_statement")
            .filter_map(|statement| statement.child_by_field_name("source"))
            .filter_map(|source| facade.string_value(source))
            .find(|specifier| has_markup_extension(specifier, self.markup_extensions))
    }

    /// `component: 'userCard'` -> `<user-card />`
    fn shorthand(facade: SyntaxFacade, node: Node) -> Option<Template> {
        let name = facade.string_constant(node)?;
        let tag = kebab_case(&name);
        if tag.is_empty() {
            return None;
        }
        Some(Template::inline(
            facade.path().to_path_buf(),
            facade.position(unwrap_expression(node)),
            format!("<{} />", tag),
        ))
    }
}
