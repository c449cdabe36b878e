use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::Position;

/// コントローラー宣言
///
/// `name` は登録名、`class_name` は宣言上の識別子。
/// `.controller('Public', LocalClass)` のように両者が異なる場合がある
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controller {
    pub name: String,
    pub class_name: String,
    /// extends先のクラス名（表示用のみ、メンバーは継承しない）
    pub base_class_name: Option<String>,
    pub members: Vec<Member>,
    pub path: PathBuf,
    pub position: Position,
}

impl Controller {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// 登録名・宣言名のどちらかで一致するか
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.class_name == name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Method,
    Property,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accessibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Accessibility {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "private" => Accessibility::Private,
            "protected" => Accessibility::Protected,
            _ => Accessibility::Public,
        }
    }
}

/// 型情報
///
/// 注釈も推論もできない場合は `Unknown` になる
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Known(String),
    Unknown,
}

impl TypeTag {
    pub fn known(name: impl Into<String>) -> Self {
        TypeTag::Known(name.into())
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            TypeTag::Known(name) => Some(name),
            TypeTag::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeTag::Unknown)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Known(name) => f.write_str(name),
            TypeTag::Unknown => f.write_str("any"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub type_tag: TypeTag,
}

/// コントローラーが公開するメソッド/プロパティ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    /// メソッドの引数（プロパティの場合は空）
    pub parameters: Vec<Parameter>,
    /// メソッドの戻り値型、またはプロパティの型
    pub type_tag: TypeTag,
    pub accessibility: Accessibility,
    pub position: Position,
}

impl Member {
    pub fn is_method(&self) -> bool {
        self.kind == MemberKind::Method
    }

    /// 補完ドキュメント用のシグネチャ文字列
    ///
    /// 例: `load(id: number): Promise<User>`, `name: string`
    pub fn signature(&self) -> String {
        match self.kind {
            MemberKind::Method => {
                let params = self
                    .parameters
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.type_tag))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({}): {}", self.name, params, self.type_tag)
            }
            MemberKind::Property => format!("{}: {}", self.name, self.type_tag),
        }
    }
}
