//! コントローラー宣言の収集
//!
//! 認識パターン:
//! - `class X {}`（コンポーネント設定インターフェースを実装するクラスは除く）
//! - `function X() { this.a = ...; }`（レガシー形式）
//! - `.controller('Name', inline)` - インラインの関数/クラス/DI配列
//! - `.controller('Public', Local)` - 登録名の付け替え（走査後にまとめて適用）

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::Position;
use tracing::debug;
use tree_sitter::Node;

use super::member::MemberExtractor;
use super::syntax::{call_arguments, is_closure, named_children, unwrap_expression, SyntaxFacade};
use super::walk::{walk, Flow, NodeTag, SyntaxVisitor};
use crate::model::Controller;

/// 宣言名と異なる登録名への付け替え
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRename {
    pub public_name: String,
    pub class_name: String,
    pub path: PathBuf,
    pub position: Position,
}

/// 1ファイル分のコントローラー走査結果
#[derive(Debug, Default)]
pub struct ControllerScan {
    pub controllers: Vec<Controller>,
    /// このファイル内に宣言が見つからなかった付け替え
    pub renames: Vec<PendingRename>,
}

pub struct ControllerResolver<'a> {
    facade: SyntaxFacade<'a>,
    options_interface: &'a str,
    controllers: Vec<Controller>,
    renames: Vec<PendingRename>,
}

impl<'a> ControllerResolver<'a> {
    pub fn new(facade: SyntaxFacade<'a>, options_interface: &'a str) -> Self {
        Self {
            facade,
            options_interface,
            controllers: Vec::new(),
            renames: Vec::new(),
        }
    }

    pub fn scan(mut self) -> ControllerScan {
        walk(self.facade.root(), &mut self);
        // チェーン呼び出しは外側から訪問されるのでソース順に並べ直す
        self.controllers.sort_by_key(|c| c.position);
        self.renames.sort_by_key(|r| r.position);
        let renames = reconcile(&mut self.controllers, std::mem::take(&mut self.renames));
        ControllerScan {
            controllers: self.controllers,
            renames,
        }
    }

    /// インライン定義（関数・アロー関数・クラス式・DI配列）からコントローラーを作る
    pub fn build_inline(
        facade: SyntaxFacade<'a>,
        node: Node<'a>,
        name: &str,
    ) -> Option<Controller> {
        let node = injectable(node);
        let extractor = MemberExtractor::new(facade);
        let (members, base_class_name) = match node.kind() {
            "class" | "class_declaration" | "abstract_class_declaration" => {
                (extractor.class_members(node), facade.heritage(node).base)
            }
            "method_definition" | "function_declaration" => (extractor.legacy_members(node), None),
            _ if is_closure(node) => (extractor.legacy_members(node), None),
            _ => return None,
        };

        Some(Controller {
            name: name.to_string(),
            class_name: name.to_string(),
            base_class_name,
            members,
            path: facade.path().to_path_buf(),
            position: facade.position(node),
        })
    }

    fn class_controller(&self, class: Node<'a>) -> Option<Controller> {
        let name_node = class.child_by_field_name("name")?;
        let heritage = self.facade.heritage(class);
        if heritage
            .type_names
            .iter()
            .any(|t| t.contains(self.options_interface))
        {
            debug!(
                "skipping component options class {}",
                self.facade.text(name_node)
            );
            return None;
        }

        let name = self.facade.text(name_node).to_string();
        Some(Controller {
            name: name.clone(),
            class_name: name,
            base_class_name: heritage.base,
            members: MemberExtractor::new(self.facade).class_members(class),
            path: self.facade.path().to_path_buf(),
            position: self.facade.position(name_node),
        })
    }

    fn function_controller(&self, function: Node<'a>) -> Option<Controller> {
        let name_node = function.child_by_field_name("name")?;
        let name = self.facade.text(name_node).to_string();
        Some(Controller {
            name: name.clone(),
            class_name: name,
            base_class_name: None,
            members: MemberExtractor::new(self.facade).legacy_members(function),
            path: self.facade.path().to_path_buf(),
            position: self.facade.position(name_node),
        })
    }

    /// `.controller(name, value)` の登録
    fn registration(&mut self, call: Node<'a>) {
        if self.facade.callee_property(call) != Some("controller") {
            return;
        }
        let arguments = call_arguments(call);
        let [name_node, value] = arguments.as_slice() else {
            return;
        };
        let Some(name) = self.facade.string_constant(*name_node) else {
            return;
        };

        let value = injectable(*value);
        if value.kind() == "identifier" {
            let class_name = self.facade.text(value);
            if class_name != name {
                self.renames.push(PendingRename {
                    public_name: name,
                    class_name: class_name.to_string(),
                    path: self.facade.path().to_path_buf(),
                    position: self.facade.position(*name_node),
                });
            }
        } else if let Some(controller) = Self::build_inline(self.facade, value, &name) {
            self.controllers.push(controller);
        }
    }
}

impl<'a> SyntaxVisitor<'a> for ControllerResolver<'a> {
    fn visit(&mut self, tag: NodeTag, node: Node<'a>) -> Flow {
        match tag {
            NodeTag::ClassDeclaration => {
                if let Some(controller) = self.class_controller(node) {
                    self.controllers.push(controller);
                }
                Flow::Skip
            }
            NodeTag::FunctionDeclaration => {
                if let Some(controller) = self.function_controller(node) {
                    self.controllers.push(controller);
                }
                Flow::Skip
            }
            NodeTag::CallExpression => {
                self.registration(node);
                Flow::Descend
            }
        }
    }
}

/// 付け替えを宣言名（class_name）が一致するコントローラーに適用する
///
/// 同じ宣言への付け替えが複数ある場合は後のものが残る。
/// 一致するコントローラーがなかった付け替えを返す
pub fn reconcile(
    controllers: &mut [Controller],
    renames: Vec<PendingRename>,
) -> Vec<PendingRename> {
    let mut unmatched = Vec::new();
    for rename in renames {
        match controllers
            .iter_mut()
            .find(|c| c.class_name == rename.class_name)
        {
            Some(controller) => {
                debug!(
                    "controller '{}' registered as '{}'",
                    controller.class_name, rename.public_name
                );
                controller.name = rename.public_name;
            }
            None => unmatched.push(rename),
        }
    }
    unmatched
}

/// DI配列記法 `['$http', function ($http) {...}]` の場合は最後の要素
fn injectable(node: Node) -> Node {
    let node = unwrap_expression(node);
    if node.kind() != "array" {
        return node;
    }
    named_children(node)
        .last()
        .map(|last| unwrap_expression(*last))
        .unwrap_or(node)
}
