//! コントローラーのメンバー抽出
//!
//! クラス形式とコンストラクタ関数形式（`this.x = ...`）の両方を扱う。
//! 型は宣言された注釈を優先し、なければ初期化式から推論する

use tower_lsp::lsp_types::Position;
use tree_sitter::Node;

use super::config_accessor::constructor_body;
use super::syntax::{has_token, is_closure, named_children, unwrap_expression, SyntaxFacade};
use crate::model::{Accessibility, Member, MemberKind, Parameter, TypeTag};

pub struct MemberExtractor<'a> {
    facade: SyntaxFacade<'a>,
}

impl<'a> MemberExtractor<'a> {
    pub fn new(facade: SyntaxFacade<'a>) -> Self {
        Self { facade }
    }

    /// クラスのメンバー
    ///
    /// - メソッド -> Method、getter -> Property（setterは対象外）
    /// - フィールド -> Property（関数で初期化されていれば Method）
    /// - アクセス修飾子/readonly 付きのコンストラクタ引数 -> Property
    /// - コンストラクタ内の `this.x = ...` -> フィールド宣言がない場合のみ
    pub fn class_members(&self, class: Node<'a>) -> Vec<Member> {
        let mut members = Vec::new();
        let Some(body) = class.child_by_field_name("body") else {
            return members;
        };

        for element in named_children(body) {
            match element.kind() {
                "method_definition" => self.method_definition(element, &mut members),
                "public_field_definition" | "field_definition" => self.field(element, &mut members),
                "method_signature" | "abstract_method_signature" => {
                    if let Some((name, position)) = self.element_name(element) {
                        let accessibility = self.accessibility(element);
                        let method = self.method(name, element, accessibility, position);
                        push_member(&mut members, method);
                    }
                }
                _ => {}
            }
        }

        if let Some(body) = constructor_body(self.facade, class) {
            self.assigned_members(body, &["this"], &mut members);
        }
        members
    }

    /// コンストラクタ関数（レガシー形式）のメンバー
    ///
    /// 本体直下の文だけを見る。`var vm = this` のような別名も receiver として扱う
    pub fn legacy_members(&self, function: Node<'a>) -> Vec<Member> {
        let mut members = Vec::new();
        let Some(body) = function
            .child_by_field_name("body")
            .filter(|body| body.kind() == "statement_block")
        else {
            return members;
        };

        let mut receivers = vec!["this"];
        receivers.extend(self.this_aliases(body));
        self.assigned_members(body, &receivers, &mut members);
        members
    }

    fn this_aliases(&self, body: Node<'a>) -> Vec<&'a str> {
        named_children(body)
            .into_iter()
            .filter(|statement| {
                matches!(statement.kind(), "lexical_declaration" | "variable_declaration")
            })
            .flat_map(named_children)
            .filter(|declarator| declarator.kind() == "variable_declarator")
            .filter_map(|declarator| {
                let value = declarator.child_by_field_name("value")?;
                if unwrap_expression(value).kind() != "this" {
                    return None;
                }
                let name = declarator.child_by_field_name("name")?;
                (name.kind() == "identifier").then(|| self.facade.text(name))
            })
            .collect()
    }

    fn assigned_members(&self, body: Node<'a>, receivers: &[&str], members: &mut Vec<Member>) {
        for assignment in self.facade.member_assignments(body, receivers) {
            let value = unwrap_expression(assignment.value);
            let position = self.facade.position(assignment.property);
            let name = assignment.name.to_string();

            let member = if is_closure(value) {
                self.method(name, value, Accessibility::Public, position)
            } else {
                Member {
                    name,
                    kind: MemberKind::Property,
                    parameters: Vec::new(),
                    type_tag: self.infer_type(value),
                    accessibility: Accessibility::Public,
                    position,
                }
            };
            push_member(members, member);
        }
    }

    fn method_definition(&self, element: Node<'a>, members: &mut Vec<Member>) {
        let Some((name, position)) = self.element_name(element) else {
            return;
        };
        if name == "constructor" {
            self.parameter_properties(element, members);
            return;
        }
        if has_token(element, "set") {
            return;
        }

        let accessibility = self.accessibility(element);
        let member = if has_token(element, "get") {
            Member {
                name,
                kind: MemberKind::Property,
                parameters: Vec::new(),
                type_tag: self.annotation(element.child_by_field_name("return_type")),
                accessibility,
                position,
            }
        } else {
            self.method(name, element, accessibility, position)
        };
        push_member(members, member);
    }

    fn field(&self, element: Node<'a>, members: &mut Vec<Member>) {
        let Some((name, position)) = self.element_name(element) else {
            return;
        };
        let accessibility = self.accessibility(element);
        let value = element.child_by_field_name("value").map(unwrap_expression);

        let member = match value {
            Some(value) if is_closure(value) => self.method(name, value, accessibility, position),
            _ => {
                let declared = self.annotation(element.child_by_field_name("type"));
                let type_tag = match (declared, value) {
                    (TypeTag::Unknown, Some(value)) => self.infer_type(value),
                    (declared, _) => declared,
                };
                Member {
                    name,
                    kind: MemberKind::Property,
                    parameters: Vec::new(),
                    type_tag,
                    accessibility,
                    position,
                }
            }
        };
        push_member(members, member);
    }

    /// コンストラクタ引数のプロパティ宣言（`constructor(private http: Http)`）
    fn parameter_properties(&self, constructor: Node<'a>, members: &mut Vec<Member>) {
        let Some(parameters) = constructor.child_by_field_name("parameters") else {
            return;
        };
        for parameter in named_children(parameters) {
            if !matches!(parameter.kind(), "required_parameter" | "optional_parameter") {
                continue;
            }
            let modifier = named_children(parameter)
                .into_iter()
                .find(|child| child.kind() == "accessibility_modifier");
            if modifier.is_none() && !has_token(parameter, "readonly") {
                continue;
            }
            let Some(pattern) = parameter.child_by_field_name("pattern") else {
                continue;
            };
            push_member(
                members,
                Member {
                    name: self.facade.text(pattern).to_string(),
                    kind: MemberKind::Property,
                    parameters: Vec::new(),
                    type_tag: self.annotation(parameter.child_by_field_name("type")),
                    accessibility: modifier
                        .map(|m| Accessibility::from_keyword(self.facade.text(m)))
                        .unwrap_or_default(),
                    position: self.facade.position(pattern),
                },
            );
        }
    }

    /// インスタンスから参照できるメンバーの名前（static と `#private` は除く）
    fn element_name(&self, element: Node<'a>) -> Option<(String, Position)> {
        let name = element
            .child_by_field_name("name")
            .or_else(|| element.child_by_field_name("property"))?;
        if name.kind() == "private_property_identifier" || has_token(element, "static") {
            return None;
        }
        Some((self.facade.name_text(name), self.facade.position(name)))
    }

    fn accessibility(&self, element: Node<'a>) -> Accessibility {
        named_children(element)
            .into_iter()
            .find(|child| child.kind() == "accessibility_modifier")
            .map(|modifier| Accessibility::from_keyword(self.facade.text(modifier)))
            .unwrap_or_default()
    }

    fn method(
        &self,
        name: String,
        function: Node<'a>,
        accessibility: Accessibility,
        position: Position,
    ) -> Member {
        Member {
            name,
            kind: MemberKind::Method,
            parameters: self.parameters(function),
            type_tag: self.return_type(function),
            accessibility,
            position,
        }
    }

    pub fn parameters(&self, function: Node<'a>) -> Vec<Parameter> {
        // `x => ...` の括弧なし引数
        if let Some(single) = function.child_by_field_name("parameter") {
            return vec![Parameter {
                name: self.facade.text(single).to_string(),
                type_tag: TypeTag::Unknown,
            }];
        }
        let Some(parameters) = function.child_by_field_name("parameters") else {
            return Vec::new();
        };
        named_children(parameters)
            .into_iter()
            .filter_map(|parameter| self.parameter(parameter))
            .collect()
    }

    fn parameter(&self, parameter: Node<'a>) -> Option<Parameter> {
        let (name, type_tag) = match parameter.kind() {
            "required_parameter" | "optional_parameter" => {
                let pattern = parameter.child_by_field_name("pattern")?;
                let type_tag = match self.annotation(parameter.child_by_field_name("type")) {
                    TypeTag::Unknown => parameter
                        .child_by_field_name("value")
                        .map(|value| self.infer_type(value))
                        .unwrap_or(TypeTag::Unknown),
                    declared => declared,
                };
                (self.facade.text(pattern), type_tag)
            }
            "assignment_pattern" => {
                let left = parameter.child_by_field_name("left")?;
                let type_tag = parameter
                    .child_by_field_name("right")
                    .map(|value| self.infer_type(value))
                    .unwrap_or(TypeTag::Unknown);
                (self.facade.text(left), type_tag)
            }
            "identifier" | "rest_pattern" | "object_pattern" | "array_pattern" => {
                (self.facade.text(parameter), TypeTag::Unknown)
            }
            _ => return None,
        };
        Some(Parameter {
            name: name.to_string(),
            type_tag,
        })
    }

    fn return_type(&self, function: Node<'a>) -> TypeTag {
        match self.annotation(function.child_by_field_name("return_type")) {
            TypeTag::Unknown => {}
            declared => return declared,
        }
        // 式本体のアロー関数は本体から推論
        match function.child_by_field_name("body") {
            Some(body)
                if function.kind() == "arrow_function" && body.kind() != "statement_block" =>
            {
                self.infer_type(body)
            }
            _ => TypeTag::Unknown,
        }
    }

    /// `: Foo` 形式の型注釈
    fn annotation(&self, annotation: Option<Node<'a>>) -> TypeTag {
        let Some(annotation) = annotation else {
            return TypeTag::Unknown;
        };
        let ty = match annotation.kind() {
            "type_annotation" | "asserts_annotation" | "type_predicate_annotation" => {
                match named_children(annotation).first() {
                    Some(ty) => *ty,
                    None => return TypeTag::Unknown,
                }
            }
            _ => annotation,
        };
        TypeTag::known(self.facade.text(ty).trim())
    }

    /// 初期化式から型を推論する
    pub fn infer_type(&self, node: Node<'a>) -> TypeTag {
        let node = unwrap_expression(node);
        match node.kind() {
            "string" | "template_string" => TypeTag::known("string"),
            "number" => TypeTag::known("number"),
            "true" | "false" => TypeTag::known("boolean"),
            "null" => TypeTag::known("null"),
            "undefined" => TypeTag::known("undefined"),
            "regex" => TypeTag::known("RegExp"),
            "array" => self.array_type(node),
            "object" => self.object_type(node),
            "new_expression" => node
                .child_by_field_name("constructor")
                .map(|constructor| TypeTag::known(self.facade.text(constructor)))
                .unwrap_or(TypeTag::Unknown),
            "unary_expression" => self.unary_type(node),
            "binary_expression" => self.binary_type(node),
            "update_expression" => TypeTag::known("number"),
            _ if is_closure(node) => TypeTag::known(self.closure_signature(node)),
            _ => TypeTag::Unknown,
        }
    }

    fn array_type(&self, array: Node<'a>) -> TypeTag {
        let element_types: Vec<TypeTag> = named_children(array)
            .into_iter()
            .map(|element| self.infer_type(element))
            .collect();
        match element_types.first() {
            Some(TypeTag::Known(first))
                if element_types.iter().all(|t| t.as_known() == Some(first)) =>
            {
                TypeTag::known(format!("{}[]", first))
            }
            _ => TypeTag::known("any[]"),
        }
    }

    fn object_type(&self, object: Node<'a>) -> TypeTag {
        let fields = self.facade.object_fields(object);
        if fields.is_empty() {
            return TypeTag::known("{}");
        }
        let rendered = fields
            .iter()
            .map(|(name, field)| {
                let ty = if field.value.kind() == "method_definition" {
                    self.closure_signature(field.value)
                } else if field.value == field.key {
                    TypeTag::Unknown.to_string()
                } else {
                    self.infer_type(field.value).to_string()
                };
                format!("{}: {};", name, ty)
            })
            .collect::<Vec<_>>()
            .join(" ");
        TypeTag::known(format!("{{ {} }}", rendered))
    }

    fn unary_type(&self, node: Node<'a>) -> TypeTag {
        let operator = node
            .child_by_field_name("operator")
            .map(|op| self.facade.text(op))
            .unwrap_or_default();
        match operator {
            "!" | "delete" => TypeTag::known("boolean"),
            "typeof" => TypeTag::known("string"),
            "-" | "+" | "~" => TypeTag::known("number"),
            "void" => TypeTag::known("undefined"),
            _ => TypeTag::Unknown,
        }
    }

    fn binary_type(&self, node: Node<'a>) -> TypeTag {
        let operator = node
            .child_by_field_name("operator")
            .map(|op| self.facade.text(op))
            .unwrap_or_default();
        let operand = |field: &str| {
            node.child_by_field_name(field)
                .map(|side| self.infer_type(side))
                .unwrap_or(TypeTag::Unknown)
        };

        match operator {
            "==" | "===" | "!=" | "!==" | "<" | ">" | "<=" | ">=" | "instanceof" | "in" => {
                TypeTag::known("boolean")
            }
            "-" | "*" | "/" | "%" | "**" | "&" | "|" | "^" | "<<" | ">>" | ">>>" => {
                TypeTag::known("number")
            }
            "+" => {
                let (left, right) = (operand("left"), operand("right"));
                if left.as_known() == Some("string") || right.as_known() == Some("string") {
                    TypeTag::known("string")
                } else if left.as_known() == Some("number") && right.as_known() == Some("number") {
                    TypeTag::known("number")
                } else {
                    TypeTag::Unknown
                }
            }
            "&&" | "||" | "??" => {
                let (left, right) = (operand("left"), operand("right"));
                if left == right { left } else { TypeTag::Unknown }
            }
            _ => TypeTag::Unknown,
        }
    }

    /// `(id: number, force: any) => void`
    fn closure_signature(&self, function: Node<'a>) -> String {
        let parameters = self
            .parameters(function)
            .iter()
            .map(|p| format!("{}: {}", p.name, p.type_tag))
            .collect::<Vec<_>>()
            .join(", ");
        format!("({}) => {}", parameters, self.return_type(function))
    }
}

/// 同名のメンバーは最初のものを残す
fn push_member(members: &mut Vec<Member>, member: Member) {
    if members.iter().any(|existing| existing.name == member.name) {
        return;
    }
    members.push(member);
}
