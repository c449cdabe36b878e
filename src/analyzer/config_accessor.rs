//! コンポーネント設定へのアクセス
//!
//! 設定はオブジェクトリテラルでもクラスでも書けるので、どちらでも
//! フィールド名から初期化式を取り出せるようにする

use tree_sitter::Node;

use super::syntax::{named_children, DeclarationKind, Resolution, SyntaxFacade};

#[derive(Clone, Copy)]
pub enum ConfigAccessor<'a> {
    /// `{ bindings: {...}, template: '...' }`
    FromObjectLiteral {
        facade: SyntaxFacade<'a>,
        object: Node<'a>,
    },
    /// `class Options { bindings = {...}; }` または コンストラクタでの `this.bindings = {...}`
    FromClassLike {
        facade: SyntaxFacade<'a>,
        class: Node<'a>,
    },
}

impl<'a> ConfigAccessor<'a> {
    /// 解決結果から作成する（関数宣言は設定として扱えないので None）
    pub fn from_resolution(resolution: &'a Resolution) -> Option<Self> {
        let facade = resolution.facade();
        let node = facade.node(resolution.node)?;
        match resolution.kind {
            DeclarationKind::ObjectLiteral => Some(Self::FromObjectLiteral {
                facade,
                object: node,
            }),
            DeclarationKind::Class => Some(Self::FromClassLike {
                facade,
                class: node,
            }),
            DeclarationKind::Function => None,
        }
    }

    pub fn facade(&self) -> SyntaxFacade<'a> {
        match self {
            Self::FromObjectLiteral { facade, .. } | Self::FromClassLike { facade, .. } => *facade,
        }
    }

    /// 設定本体のノード（オブジェクトリテラルまたはクラス）
    pub fn node(&self) -> Node<'a> {
        match self {
            Self::FromObjectLiteral { object, .. } => *object,
            Self::FromClassLike { class, .. } => *class,
        }
    }

    /// フィールドの初期化式を取得する
    pub fn get(&self, field: &str) -> Option<Node<'a>> {
        match self {
            Self::FromObjectLiteral { facade, object } => {
                facade.object_field(*object, field).map(|f| f.value)
            }
            Self::FromClassLike { facade, class } => {
                class_field(*facade, *class, field)
                    .or_else(|| constructor_field(*facade, *class, field))
            }
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

fn class_field<'a>(facade: SyntaxFacade<'a>, class: Node<'a>, field: &str) -> Option<Node<'a>> {
    let body = class.child_by_field_name("body")?;
    named_children(body).into_iter().find_map(|member| {
        let name = match member.kind() {
            // TypeScript
            "public_field_definition" => member.child_by_field_name("name")?,
            // JavaScript
            "field_definition" => member.child_by_field_name("property")?,
            _ => return None,
        };
        if facade.name_text(name) != field {
            return None;
        }
        member.child_by_field_name("value")
    })
}

fn constructor_field<'a>(
    facade: SyntaxFacade<'a>,
    class: Node<'a>,
    field: &str,
) -> Option<Node<'a>> {
    let body = constructor_body(facade, class)?;
    facade
        .member_assignments(body, &["this"])
        .into_iter()
        .find(|assignment| assignment.name == field)
        .map(|assignment| assignment.value)
}

/// クラスのコンストラクタ本体
pub fn constructor_body<'a>(facade: SyntaxFacade<'a>, class: Node<'a>) -> Option<Node<'a>> {
    let body = class.child_by_field_name("body")?;
    named_children(body)
        .into_iter()
        .filter(|member| member.kind() == "method_definition")
        .find(|member| facade.declaration_name(*member) == Some("constructor"))
        .and_then(|constructor| constructor.child_by_field_name("body"))
}
