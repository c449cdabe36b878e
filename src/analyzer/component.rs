//! `.component(name, config)` 登録の解析

use std::sync::Arc;

use tracing::{debug, warn};
use tree_sitter::Node;

use super::config_accessor::ConfigAccessor;
use super::controller::ControllerResolver;
use super::syntax::{
    call_arguments, is_closure, named_children, unwrap_expression, DeclarationKind, LocalBinding,
    NodeRef, Resolution, SyntaxFacade,
};
use super::template::TemplateResolver;
use super::walk::{walk, Flow, NodeTag, SyntaxVisitor};
use super::AnalyzerOptions;
use crate::analyzer::source::SourceRegistry;
use crate::error::AnalyzerError;
use crate::model::{Binding, Component, Controller, Diagnostic, DEFAULT_CONTROLLER_AS};
use crate::util::camel_to_kebab;

/// 1ファイル分のコンポーネント走査結果
#[derive(Debug, Default)]
pub struct ComponentScan {
    pub components: Vec<Component>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ComponentResolver<'a> {
    facade: SyntaxFacade<'a>,
    registry: &'a SourceRegistry,
    controllers: &'a [Arc<Controller>],
    options: &'a AnalyzerOptions,
    found: Vec<(usize, Component)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ComponentResolver<'a> {
    pub fn new(
        facade: SyntaxFacade<'a>,
        registry: &'a SourceRegistry,
        controllers: &'a [Arc<Controller>],
        options: &'a AnalyzerOptions,
    ) -> Self {
        Self {
            facade,
            registry,
            controllers,
            options,
            found: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn scan(mut self) -> ComponentScan {
        walk(self.facade.root(), &mut self);
        // チェーン呼び出しは外側から訪問されるので名前引数の位置で並べ直す
        self.found.sort_by_key(|(start, _)| *start);
        ComponentScan {
            components: self.found.into_iter().map(|(_, c)| c).collect(),
            diagnostics: self.diagnostics,
        }
    }

    fn registration(&mut self, call: Node<'a>) {
        if self.facade.callee_property(call) != Some("component") {
            return;
        }
        let arguments = call_arguments(call);
        let [name_node, config] = arguments.as_slice() else {
            return;
        };
        let Some(name) = self.facade.string_constant(*name_node) else {
            debug!(
                "component name is not a string: {}",
                self.facade.text(*name_node)
            );
            return;
        };

        match self.component(&name, *name_node, *config) {
            Ok(component) => self.found.push((name_node.start_byte(), component)),
            Err(e) => {
                warn!("{}", e);
                self.diagnostics.push(Diagnostic::warning(
                    self.facade.path(),
                    self.facade.position(*config),
                    e.to_string(),
                ));
            }
        }
    }

    fn component(
        &mut self,
        name: &str,
        name_node: Node<'a>,
        config: Node<'a>,
    ) -> Result<Component, AnalyzerError> {
        let resolution = self.config_resolution(name, config)?;
        self.registry.record_origin(name, resolution.path());

        let accessor = ConfigAccessor::from_resolution(&resolution).ok_or_else(|| {
            AnalyzerError::unsupported(
                name,
                "configuration is declared in a form that cannot be read",
            )
        })?;
        let origin = accessor.facade();

        let bindings = self.bindings(name, &accessor);

        let template =
            TemplateResolver::new(&self.options.template_root, &self.options.markup_extensions)
                .resolve(&accessor);
        if template.is_none() {
            self.warn(origin, accessor.node(), format!("Component '{}' has no template", name));
        }

        let controller = self.link_controller(name, &accessor);
        let controller_as = self.controller_as(name, &accessor);

        Ok(Component {
            name: name.to_string(),
            html_name: camel_to_kebab(name),
            path: self.facade.path().to_path_buf(),
            position: self.facade.position(name_node),
            config_path: resolution.path().to_path_buf(),
            bindings,
            template,
            controller_as,
            controller,
        })
    }

    /// 設定の式を宣言まで解決する
    fn config_resolution(&self, name: &str, config: Node<'a>) -> Result<Resolution, AnalyzerError> {
        let config = unwrap_expression(config);
        let resolution = match config.kind() {
            "object" => Resolution {
                unit: Arc::clone(self.facade.unit()),
                node: NodeRef::of(config),
                kind: DeclarationKind::ObjectLiteral,
            },
            "identifier" => self
                .facade
                .resolve(self.facade.text(config), self.registry)
                .map_err(|e| e.for_component(name))?,
            "new_expression" => {
                let constructor = config
                    .child_by_field_name("constructor")
                    .filter(|c| c.kind() == "identifier")
                    .ok_or_else(|| {
                        AnalyzerError::unsupported(name, "constructed from a computed expression")
                    })?;
                let resolution = self
                    .facade
                    .resolve(self.facade.text(constructor), self.registry)
                    .map_err(|e| e.for_component(name))?;
                if resolution.kind != DeclarationKind::Class {
                    return Err(AnalyzerError::unsupported(
                        name,
                        format!("'{}' is not a class", self.facade.text(constructor)),
                    ));
                }
                resolution
            }
            kind => {
                return Err(AnalyzerError::unsupported(
                    name,
                    format!("configuration is a {}", kind.replace('_', " ")),
                ));
            }
        };

        if resolution.kind == DeclarationKind::Function {
            return Err(AnalyzerError::unsupported(name, "configuration resolves to a function"));
        }
        Ok(resolution)
    }

    fn bindings(&mut self, component: &str, accessor: &ConfigAccessor<'_>) -> Vec<Binding> {
        let facade = accessor.facade();
        let Some(value) = accessor.get("bindings").map(unwrap_expression) else {
            return Vec::new();
        };

        let object = match value.kind() {
            "object" => Some(value),
            "identifier" => match facade.lookup_local(facade.text(value)) {
                Some(LocalBinding::Variable {
                    value: Some(initializer),
                    ..
                }) => Some(unwrap_expression(initializer)).filter(|v| v.kind() == "object"),
                _ => None,
            },
            _ => None,
        };
        let Some(object) = object else {
            self.warn(
                facade,
                value,
                format!("Bindings of component '{}' are not an object literal", component),
            );
            return Vec::new();
        };

        let mut bindings = Vec::new();
        for (name, field) in facade.object_fields(object) {
            let Some(spec) = facade.string_value(unwrap_expression(field.value)) else {
                self.warn(
                    facade,
                    field.value,
                    format!("Binding '{}' of component '{}' is not a string", name, component),
                );
                continue;
            };
            let (binding_type, alternate) = parse_binding_spec(&spec);
            let html_name = camel_to_kebab(alternate.as_deref().unwrap_or(&name));
            bindings.push(Binding {
                name,
                html_name,
                binding_type,
                position: facade.position(field.key),
            });
        }
        bindings
    }

    /// `controller` フィールドからコントローラーを探す
    ///
    /// 文字列は登録名を、識別子は宣言名を優先して照合する
    fn link_controller(
        &mut self,
        component: &str,
        accessor: &ConfigAccessor<'_>,
    ) -> Option<Arc<Controller>> {
        let facade = accessor.facade();
        let value = unwrap_expression(accessor.get("controller")?);
        let value = match value.kind() {
            "array" => named_children(value)
                .last()
                .map(|last| unwrap_expression(*last))
                .unwrap_or(value),
            _ => value,
        };

        let (label, found) = if let Some(name) = facade.string_value(value) {
            let found = self
                .find_controller(|c| c.name == name)
                .or_else(|| self.find_controller(|c| c.class_name == name));
            (name, found)
        } else if value.kind() == "identifier" {
            let name = facade.text(value);
            let found = self
                .find_controller(|c| c.class_name == name)
                .or_else(|| self.find_controller(|c| c.name == name));
            (name.to_string(), found)
        } else if is_closure(value) || matches!(value.kind(), "class" | "method_definition") {
            let name = format!("{}Controller", component);
            return ControllerResolver::build_inline(facade, value, &name).map(Arc::new);
        } else {
            (facade.text(value).to_string(), None)
        };

        if found.is_none() {
            self.warn(
                facade,
                value,
                format!("Controller '{}' of component '{}' was not found", label, component),
            );
        }
        found
    }

    fn find_controller(&self, predicate: impl Fn(&Controller) -> bool) -> Option<Arc<Controller>> {
        self.controllers
            .iter()
            .find(|c| predicate(Arc::as_ref(c)))
            .map(Arc::clone)
    }

    fn controller_as(&mut self, component: &str, accessor: &ConfigAccessor<'_>) -> String {
        let facade = accessor.facade();
        let Some(value) = accessor.get("controllerAs") else {
            return DEFAULT_CONTROLLER_AS.to_string();
        };
        match facade.string_value(unwrap_expression(value)) {
            Some(alias) => alias,
            None => {
                self.warn(
                    facade,
                    value,
                    format!(
                        "controllerAs of component '{}' is not a string literal, using '{}'",
                        component, DEFAULT_CONTROLLER_AS
                    ),
                );
                DEFAULT_CONTROLLER_AS.to_string()
            }
        }
    }

    fn warn(&mut self, facade: SyntaxFacade, node: Node, message: String) {
        warn!("{}", message);
        self.diagnostics
            .push(Diagnostic::warning(facade.path(), facade.position(node), message));
    }
}

impl<'a> SyntaxVisitor<'a> for ComponentResolver<'a> {
    fn visit(&mut self, tag: NodeTag, node: Node<'a>) -> Flow {
        if tag == NodeTag::CallExpression {
            self.registration(node);
        }
        Flow::Descend
    }
}

/// バインディング指定文字列を種別記号と別名に分ける
///
/// `'<'` -> (`<`, None), `'=?item'` -> (`=?`, Some("item")), `'=*'` -> (`=*`, None)。
/// 解釈できない場合は文字列全体（前後の空白を除く）を種別記号とする
pub fn parse_binding_spec(spec: &str) -> (String, Option<String>) {
    let trimmed = spec.trim();
    let malformed = || (trimmed.to_string(), None);

    let mut marker_end = match trimmed.chars().next() {
        Some('<' | '=' | '@' | '&') => 1,
        _ => return malformed(),
    };
    if trimmed.starts_with('=') && trimmed[marker_end..].starts_with('*') {
        marker_end += 1;
    }
    if trimmed[marker_end..].starts_with('?') {
        marker_end += 1;
    }

    let alternate = trimmed[marker_end..].trim_start();
    if !alternate
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    {
        return malformed();
    }

    let alternate = (!alternate.is_empty()).then(|| alternate.to_string());
    (trimmed[..marker_end].to_string(), alternate)
}
