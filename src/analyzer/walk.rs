//! 構文木の深さ優先走査
//!
//! リゾルバーは関心のあるノード種別だけを `NodeTag` で受け取る

use tree_sitter::Node;

/// 走査中にリゾルバーへ通知するノード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    /// `foo.component(...)`, `foo.controller(...)` など
    CallExpression,
    /// `class X {}` / `abstract class X {}`
    ClassDeclaration,
    /// `function X() {}`
    FunctionDeclaration,
}

impl NodeTag {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "call_expression" => Some(NodeTag::CallExpression),
            "class_declaration" | "abstract_class_declaration" => Some(NodeTag::ClassDeclaration),
            "function_declaration" | "generator_function_declaration" => {
                Some(NodeTag::FunctionDeclaration)
            }
            _ => None,
        }
    }
}

/// 子ノードへ降りるかどうか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Descend,
    Skip,
}

pub trait SyntaxVisitor<'tree> {
    fn visit(&mut self, tag: NodeTag, node: Node<'tree>) -> Flow;
}

/// `root` 以下をソース順（前順）に走査する
pub fn walk<'tree, V: SyntaxVisitor<'tree>>(root: Node<'tree>, visitor: &mut V) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let flow = match NodeTag::from_kind(node.kind()) {
            Some(tag) => visitor.visit(tag, node),
            None => Flow::Descend,
        };
        if flow == Flow::Skip {
            continue;
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::source::SourceIndex;

    struct Recorder {
        seen: Vec<(NodeTag, usize)>,
        skip_functions: bool,
    }

    impl<'tree> SyntaxVisitor<'tree> for Recorder {
        fn visit(&mut self, tag: NodeTag, node: Node<'tree>) -> Flow {
            self.seen.push((tag, node.start_byte()));
            if tag == NodeTag::FunctionDeclaration && self.skip_functions {
                Flow::Skip
            } else {
                Flow::Descend
            }
        }
    }

    #[test]
    fn test_walk_visits_in_source_order() {
        let unit = SourceIndex::parse("/a.js", "class A {}\nfunction f() { g(); }\nh();").unwrap();
        let mut recorder = Recorder { seen: Vec::new(), skip_functions: false };
        walk(unit.root(), &mut recorder);

        let tags: Vec<NodeTag> = recorder.seen.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tags,
            vec![
                NodeTag::ClassDeclaration,
                NodeTag::FunctionDeclaration,
                NodeTag::CallExpression,
                NodeTag::CallExpression,
            ]
        );
        assert!(recorder.seen.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn test_walk_skip_prunes_subtree() {
        let unit = SourceIndex::parse("/a.js", "function f() { g(); }\nh();").unwrap();
        let mut recorder = Recorder { seen: Vec::new(), skip_functions: true };
        walk(unit.root(), &mut recorder);

        let calls = recorder
            .seen
            .iter()
            .filter(|(t, _)| *t == NodeTag::CallExpression)
            .count();
        assert_eq!(calls, 1);
    }
}
