//! 構文木への問い合わせとimport追跡
//!
//! `SyntaxFacade` は1ファイル分の構文木をラップし、識別子の宣言・export・
//! オブジェクトリテラルのフィールドなどを取り出す。ファイルをまたぐ解決は
//! `resolve` がimport/exportを辿って行う

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;
use std::sync::Arc;

use tower_lsp::lsp_types::Position;
use tracing::debug;
use tree_sitter::Node;

use super::source::{SourceIndex, SourceRegistry};
use crate::error::AnalyzerError;

/// import追跡でたどるファイル数の上限
const MAX_CHASE_DEPTH: usize = 32;

/// ノードを構文木の借用なしで保持するためのハンドル
///
/// `SourceIndex` は不変なので、同じファイルに対して常に同じノードを指す
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub start: usize,
    pub end: usize,
    pub kind: &'static str,
}

impl NodeRef {
    pub fn of(node: Node) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
            kind: node.kind(),
        }
    }
}

/// 解決先の宣言の形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    ObjectLiteral,
    Class,
    Function,
}

/// 識別子の解決結果
///
/// `unit` が実際に宣言を持っているファイル（import先の場合もある）
#[derive(Clone)]
pub struct Resolution {
    pub unit: Arc<SourceIndex>,
    pub node: NodeRef,
    pub kind: DeclarationKind,
}

impl Resolution {
    pub fn facade(&self) -> SyntaxFacade<'_> {
        SyntaxFacade::new(&self.unit)
    }

    pub fn path(&self) -> &Path {
        self.unit.path()
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("path", &self.unit.path())
            .field("node", &self.node)
            .field("kind", &self.kind)
            .finish()
    }
}

/// オブジェクトリテラルの1フィールド
///
/// 省略記法（`{ foo }`）の場合は key と value が同じノード、
/// メソッド記法の場合は value がメソッド定義ノード
#[derive(Debug, Clone, Copy)]
pub struct ObjectField<'a> {
    pub key: Node<'a>,
    pub value: Node<'a>,
}

/// ファイル内で識別子を束縛している宣言
#[derive(Debug, Clone)]
pub enum LocalBinding<'a> {
    Variable {
        name: Node<'a>,
        value: Option<Node<'a>>,
    },
    Class(Node<'a>),
    Function(Node<'a>),
    Import(ImportBinding),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub specifier: String,
    pub imported: Imported,
}

/// importで取り込んでいる対象
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imported {
    /// `import X from 'm'`
    Default,
    /// `import { X } from 'm'` / `import { Y as X } from 'm'`
    Named(String),
    /// `import * as X from 'm'`（追跡しない）
    Namespace,
    /// `import X = require('m')` / `const X = require('m')`
    Module,
}

/// export名の宣言先
#[derive(Debug, Clone)]
pub enum ExportTarget<'a> {
    /// `export class X {}` など、このファイル内の宣言
    Local(LocalBinding<'a>),
    /// `export default <expr>` / `module.exports = <expr>`
    Value(Node<'a>),
    /// `export { local as name }`
    Alias(String),
    /// `export { name } from 'm'`
    Forward { specifier: String, name: String },
    /// `export * from 'm'`（候補のモジュールを順に探す）
    Star(Vec<String>),
}

/// `this.name = value` 形式の代入
#[derive(Debug, Clone, Copy)]
pub struct Assignment<'a> {
    pub name: &'a str,
    pub property: Node<'a>,
    pub value: Node<'a>,
}

/// クラスの継承情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heritage {
    /// extends先（修飾名の場合は最後の要素）
    pub base: Option<String>,
    /// extends/implements に現れる全ての型名
    pub type_names: Vec<String>,
}

#[derive(Clone, Copy)]
pub struct SyntaxFacade<'a> {
    unit: &'a Arc<SourceIndex>,
}

impl<'a> SyntaxFacade<'a> {
    pub fn new(unit: &'a Arc<SourceIndex>) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> &'a Arc<SourceIndex> {
        self.unit
    }

    pub fn path(&self) -> &'a Path {
        self.unit.path()
    }

    pub fn root(&self) -> Node<'a> {
        self.unit.root()
    }

    pub fn text(&self, node: Node) -> &'a str {
        self.unit.text().get(node.byte_range()).unwrap_or("")
    }

    pub fn position(&self, node: Node) -> Position {
        self.unit.node_position(node)
    }

    /// `NodeRef` から同じノードを取り出す
    pub fn node(&self, node_ref: NodeRef) -> Option<Node<'a>> {
        let mut node = self
            .root()
            .descendant_for_byte_range(node_ref.start, node_ref.end)?;
        loop {
            if node.kind() == node_ref.kind
                && node.start_byte() == node_ref.start
                && node.end_byte() == node_ref.end
            {
                return Some(node);
            }
            node = node.parent()?;
            if node.start_byte() != node_ref.start || node.end_byte() != node_ref.end {
                return None;
            }
        }
    }

    /// ファイル内の全ての識別子ノード（浅いものから順）
    pub fn identifiers(&self) -> Vec<Node<'a>> {
        let mut identifiers = Vec::new();
        let mut queue = VecDeque::from([self.root()]);
        while let Some(node) = queue.pop_front() {
            if matches!(node.kind(), "identifier" | "type_identifier") {
                identifiers.push(node);
            }
            let mut cursor = node.walk();
            queue.extend(node.named_children(&mut cursor));
        }
        identifiers
    }

    /// 文字列リテラル、または置換を含まないテンプレート文字列の値
    pub fn string_value(&self, node: Node) -> Option<String> {
        let quote = match node.kind() {
            "string" => {
                let raw = self.text(node);
                raw.chars().next()?
            }
            "template_string" => {
                if named_children(node)
                    .iter()
                    .any(|child| child.kind() == "template_substitution")
                {
                    return None;
                }
                '`'
            }
            _ => return None,
        };
        self.text(node)
            .strip_prefix(quote)?
            .strip_suffix(quote)
            .map(unescape)
    }

    /// 文字列リテラル、またはファイル内で文字列リテラルに初期化された変数の値
    pub fn string_constant(&self, node: Node) -> Option<String> {
        let node = unwrap_expression(node);
        if let Some(value) = self.string_value(node) {
            return Some(value);
        }
        if node.kind() != "identifier" {
            return None;
        }
        match self.lookup_local(self.text(node))? {
            LocalBinding::Variable {
                value: Some(value), ..
            } => self.string_value(unwrap_expression(value)),
            _ => None,
        }
    }

    /// プロパティキー・export名などの名前ノードのテキスト（文字列キーはクォートを外す）
    pub fn name_text(&self, node: Node) -> String {
        self.string_value(node)
            .unwrap_or_else(|| self.text(node).to_string())
    }

    /// オブジェクトリテラルのフィールドをソース順で取得
    ///
    /// 同じキーが複数ある場合は後のものが値を上書きする
    pub fn object_fields(&self, object: Node<'a>) -> Vec<(String, ObjectField<'a>)> {
        let mut fields: Vec<(String, ObjectField<'a>)> = Vec::new();
        for child in named_children(object) {
            let entry = match child.kind() {
                "pair" => {
                    let (Some(key), Some(value)) = (
                        child.child_by_field_name("key"),
                        child.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    if key.kind() == "computed_property_name" {
                        continue;
                    }
                    (self.name_text(key), ObjectField { key, value })
                }
                "shorthand_property_identifier" => (
                    self.text(child).to_string(),
                    ObjectField {
                        key: child,
                        value: child,
                    },
                ),
                "method_definition" => {
                    let Some(key) = child.child_by_field_name("name") else {
                        continue;
                    };
                    (self.name_text(key), ObjectField { key, value: child })
                }
                _ => continue,
            };

            match fields.iter_mut().find(|(name, _)| *name == entry.0) {
                Some(existing) => existing.1 = entry.1,
                None => fields.push(entry),
            }
        }
        fields
    }

    pub fn object_field(&self, object: Node<'a>, name: &str) -> Option<ObjectField<'a>> {
        self.object_fields(object)
            .into_iter()
            .find(|(field, _)| field == name)
            .map(|(_, field)| field)
    }

    /// 識別子を束縛しているファイル内の宣言を探す
    pub fn lookup_local(&self, name: &str) -> Option<LocalBinding<'a>> {
        self.identifiers()
            .into_iter()
            .filter(|node| self.text(*node) == name)
            .find_map(|node| self.binding_site(node))
    }

    fn binding_site(&self, ident: Node<'a>) -> Option<LocalBinding<'a>> {
        let parent = ident.parent()?;
        let is_name = parent.child_by_field_name("name") == Some(ident);

        match parent.kind() {
            "variable_declarator" if is_name => {
                let value = parent.child_by_field_name("value");
                if let Some(specifier) = value.and_then(|v| self.require_specifier(v)) {
                    return Some(LocalBinding::Import(ImportBinding {
                        specifier,
                        imported: Imported::Module,
                    }));
                }
                Some(LocalBinding::Variable { name: ident, value })
            }
            "class_declaration" | "abstract_class_declaration" | "class" if is_name => {
                Some(LocalBinding::Class(parent))
            }
            "function_declaration" | "generator_function_declaration" if is_name => {
                Some(LocalBinding::Function(parent))
            }
            "import_specifier" => {
                let imported = parent.child_by_field_name("name")?;
                let local = parent.child_by_field_name("alias").unwrap_or(imported);
                if local != ident {
                    return None;
                }
                Some(LocalBinding::Import(ImportBinding {
                    specifier: self.import_source(parent)?,
                    imported: Imported::Named(self.name_text(imported)),
                }))
            }
            "import_clause" => Some(LocalBinding::Import(ImportBinding {
                specifier: self.import_source(parent)?,
                imported: Imported::Default,
            })),
            "namespace_import" => Some(LocalBinding::Import(ImportBinding {
                specifier: self.import_source(parent)?,
                imported: Imported::Namespace,
            })),
            "import_require_clause" => {
                let source = parent.child_by_field_name("source").or_else(|| {
                    named_children(parent)
                        .into_iter()
                        .find(|child| child.kind() == "string")
                });
                let specifier = match source {
                    Some(source) => self.string_value(source)?,
                    None => self.import_source(parent)?,
                };
                Some(LocalBinding::Import(ImportBinding {
                    specifier,
                    imported: Imported::Module,
                }))
            }
            _ => None,
        }
    }

    fn import_source(&self, node: Node<'a>) -> Option<String> {
        let statement = ancestors(node).find(|n| n.kind() == "import_statement")?;
        self.string_value(statement.child_by_field_name("source")?)
    }

    /// `require('x')` / `import('x')` の指定子
    pub fn module_request(&self, node: Node) -> Option<String> {
        self.call_specifier(node, &["require", "import"])
    }

    fn require_specifier(&self, node: Node) -> Option<String> {
        self.call_specifier(node, &["require"])
    }

    fn call_specifier(&self, node: Node, callees: &[&str]) -> Option<String> {
        let node = unwrap_expression(node);
        if node.kind() != "call_expression" {
            return None;
        }
        let callee = self.text(node.child_by_field_name("function")?);
        if !callees.contains(&callee) {
            return None;
        }
        match call_arguments(node).as_slice() {
            [argument] => self.string_value(*argument),
            _ => None,
        }
    }

    /// export名に対応する宣言を探す
    ///
    /// exportされていないトップレベル宣言も対象にする（スクリプト形式のモジュール向け）
    pub fn find_exported(&self, name: &str) -> Option<ExportTarget<'a>> {
        let mut stars = Vec::new();
        for statement in named_children(self.root()) {
            match statement.kind() {
                "export_statement" => {
                    if let Some(target) = self.match_export(statement, name, &mut stars) {
                        return Some(target);
                    }
                }
                "expression_statement" => {
                    if let Some(value) = self.commonjs_export(statement, name) {
                        return Some(ExportTarget::Value(value));
                    }
                }
                _ => {}
            }
        }

        // `export *` はdefaultを再exportしない
        if !stars.is_empty() && name != "default" {
            return Some(ExportTarget::Star(stars));
        }

        match self.lookup_local(name)? {
            LocalBinding::Import(_) => None,
            binding => Some(ExportTarget::Local(binding)),
        }
    }

    fn match_export(
        &self,
        statement: Node<'a>,
        name: &str,
        stars: &mut Vec<String>,
    ) -> Option<ExportTarget<'a>> {
        let source = statement
            .child_by_field_name("source")
            .and_then(|s| self.string_value(s));
        let is_default = has_token(statement, "default");

        if let Some(declaration) = statement.child_by_field_name("declaration") {
            if is_default {
                if name != "default" {
                    return None;
                }
                return match declaration.kind() {
                    "class_declaration" | "abstract_class_declaration" => {
                        Some(ExportTarget::Local(LocalBinding::Class(declaration)))
                    }
                    "function_declaration" | "generator_function_declaration" => {
                        Some(ExportTarget::Local(LocalBinding::Function(declaration)))
                    }
                    _ => None,
                };
            }
            return self.declared_in(declaration, name).map(ExportTarget::Local);
        }

        if let Some(value) = statement.child_by_field_name("value") {
            if !is_default || name != "default" {
                return None;
            }
            let value = unwrap_expression(value);
            return Some(match value.kind() {
                "identifier" => ExportTarget::Alias(self.text(value).to_string()),
                _ => ExportTarget::Value(value),
            });
        }

        let clauses: Vec<Node<'a>> = named_children(statement)
            .into_iter()
            .filter(|c| c.kind() == "export_clause")
            .collect();
        for clause in &clauses {
            for specifier in named_children(*clause) {
                if specifier.kind() != "export_specifier" {
                    continue;
                }
                let Some(local) = specifier.child_by_field_name("name") else {
                    continue;
                };
                let exported = specifier.child_by_field_name("alias").unwrap_or(local);
                if self.name_text(exported) != name {
                    continue;
                }
                let local = self.name_text(local);
                return Some(match &source {
                    Some(specifier) => ExportTarget::Forward {
                        specifier: specifier.clone(),
                        name: local,
                    },
                    None => ExportTarget::Alias(local),
                });
            }
        }

        let is_namespace_export = named_children(statement)
            .iter()
            .any(|c| c.kind() == "namespace_export");
        if clauses.is_empty() && !is_namespace_export && has_token(statement, "*") {
            if let Some(source) = source {
                stars.push(source);
            }
        }
        None
    }

    fn declared_in(&self, declaration: Node<'a>, name: &str) -> Option<LocalBinding<'a>> {
        match declaration.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                (self.declaration_name(declaration) == Some(name))
                    .then_some(LocalBinding::Class(declaration))
            }
            "function_declaration" | "generator_function_declaration" => (self
                .declaration_name(declaration)
                == Some(name))
            .then_some(LocalBinding::Function(declaration)),
            "lexical_declaration" | "variable_declaration" => named_children(declaration)
                .into_iter()
                .filter(|d| d.kind() == "variable_declarator")
                .find_map(|declarator| {
                    let ident = declarator.child_by_field_name("name")?;
                    (self.text(ident) == name).then(|| LocalBinding::Variable {
                        name: ident,
                        value: declarator.child_by_field_name("value"),
                    })
                }),
            _ => None,
        }
    }

    /// `module.exports = x` / `module.exports.name = x` / `exports.name = x`
    fn commonjs_export(&self, statement: Node<'a>, name: &str) -> Option<Node<'a>> {
        let assignment = statement
            .named_child(0)
            .filter(|n| n.kind() == "assignment_expression")?;
        let left = assignment.child_by_field_name("left")?;
        let right = assignment.child_by_field_name("right")?;

        let target = self.text(left);
        let matches = match target {
            "module.exports" => name == "default",
            _ => target
                .strip_prefix("module.exports.")
                .or_else(|| target.strip_prefix("exports."))
                == Some(name),
        };
        matches.then_some(right)
    }

    /// 識別子を宣言まで解決する
    ///
    /// ファイル内に宣言があればそれを、なければimportを辿って
    /// export先のクラス・オブジェクトリテラル・関数を返す
    pub fn resolve(
        &self,
        name: &str,
        registry: &SourceRegistry,
    ) -> Result<Resolution, AnalyzerError> {
        let mut chase = Chase {
            registry,
            identifier: name.to_string(),
            visited: HashSet::new(),
        };
        chase.run(Arc::clone(self.unit), Wanted::Local(name.to_string()), 0)
    }

    pub fn declaration_name(&self, declaration: Node) -> Option<&'a str> {
        declaration
            .child_by_field_name("name")
            .map(|name| self.text(name))
    }

    /// クラスの extends / implements から型名を集める
    pub fn heritage(&self, class: Node<'a>) -> Heritage {
        let mut heritage = Heritage::default();
        let Some(clause) = named_children(class)
            .into_iter()
            .find(|c| c.kind() == "class_heritage")
        else {
            return heritage;
        };

        for child in named_children(clause) {
            match child.kind() {
                "extends_clause" => {
                    if let Some(value) = child.child_by_field_name("value") {
                        let name = last_segment(self.text(value));
                        heritage.base.get_or_insert_with(|| name.clone());
                        heritage.type_names.push(name);
                    }
                }
                "implements_clause" => {
                    for ty in named_children(child) {
                        heritage.type_names.push(last_segment(self.text(ty)));
                    }
                }
                // JavaScript: class_heritage の直下が extends の式
                _ => {
                    let name = last_segment(self.text(child));
                    heritage.base.get_or_insert_with(|| name.clone());
                    heritage.type_names.push(name);
                }
            }
        }
        heritage
    }

    /// 関数本体直下の `receiver.name = value` 代入を集める
    pub fn member_assignments(&self, body: Node<'a>, receivers: &[&str]) -> Vec<Assignment<'a>> {
        named_children(body)
            .into_iter()
            .filter(|statement| statement.kind() == "expression_statement")
            .filter_map(|statement| {
                let assignment = statement
                    .named_child(0)
                    .filter(|n| n.kind() == "assignment_expression")?;
                let left = assignment.child_by_field_name("left")?;
                if left.kind() != "member_expression" {
                    return None;
                }
                let object = left.child_by_field_name("object")?;
                if !receivers.contains(&self.text(object)) {
                    return None;
                }
                let property = left.child_by_field_name("property")?;
                if property.kind() != "property_identifier" {
                    return None;
                }
                Some(Assignment {
                    name: self.text(property),
                    property,
                    value: assignment.child_by_field_name("right")?,
                })
            })
            .collect()
    }

    /// 呼び出し式 `obj.method(...)` のメソッド名
    pub fn callee_property(&self, call: Node) -> Option<&'a str> {
        let callee = call.child_by_field_name("function")?;
        if callee.kind() != "member_expression" {
            return None;
        }
        callee
            .child_by_field_name("property")
            .map(|property| self.text(property))
    }
}

/// コメントを除いた名前付き子ノード
pub fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// 呼び出し式の引数
pub fn call_arguments(call: Node) -> Vec<Node> {
    call.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// 括弧や型アサーションを外した式
pub fn unwrap_expression(node: Node) -> Node {
    let mut node = node;
    while matches!(
        node.kind(),
        "parenthesized_expression"
            | "as_expression"
            | "satisfies_expression"
            | "non_null_expression"
    ) {
        match named_children(node).first() {
            Some(inner) => node = *inner,
            None => break,
        }
    }
    node
}

pub fn is_closure(node: Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

fn ancestors(node: Node) -> impl Iterator<Item = Node> {
    std::iter::successors(node.parent(), |n| n.parent())
}

pub fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

/// 文字列リテラルのエスケープシーケンスを解釈する
///
/// `\'` `\n` `\xHH` `\uXXXX` `\u{...}`、行継続に対応。
/// 未知のエスケープはバックスラッシュを除いた文字になる
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    // `\uD83D\uDE00` のようなサロゲートペアは連続する間ためておく
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_utf16(&mut units, &mut out);
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };

        if escaped == 'u' {
            match unicode_escape(&mut chars) {
                Some(code) if code <= 0xFFFF => units.push(code as u16),
                Some(code) => {
                    flush_utf16(&mut units, &mut out);
                    out.extend(char::from_u32(code));
                }
                None => {
                    flush_utf16(&mut units, &mut out);
                    out.push('u');
                }
            }
            continue;
        }

        flush_utf16(&mut units, &mut out);
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            'x' => match hex_digits(&mut chars, 2).and_then(char::from_u32) {
                Some(ch) => out.push(ch),
                None => out.push('x'),
            },
            // 行継続
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }
    flush_utf16(&mut units, &mut out);
    out
}

fn flush_utf16(units: &mut Vec<u16>, out: &mut String) {
    out.extend(
        char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
}

/// `\u` に続く `XXXX` または `{X...}`
fn unicode_escape(chars: &mut Peekable<Chars>) -> Option<u32> {
    if chars.peek() != Some(&'{') {
        return hex_digits(chars, 4);
    }

    let mut probe = chars.clone();
    probe.next();
    let mut digits = String::new();
    loop {
        match probe.next()? {
            '}' => break,
            c => digits.push(c),
        }
    }
    if digits.is_empty() || digits.len() > 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let code = u32::from_str_radix(&digits, 16).ok().filter(|c| *c <= 0x10FFFF)?;
    *chars = probe;
    Some(code)
}

fn hex_digits(chars: &mut Peekable<Chars>, count: usize) -> Option<u32> {
    let digits: String = chars.clone().take(count).collect();
    if digits.len() != count || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    for _ in 0..count {
        chars.next();
    }
    u32::from_str_radix(&digits, 16).ok()
}

/// `ng.IComponentOptions<T>` -> `IComponentOptions`
fn last_segment(text: &str) -> String {
    let without_generics = text.split('<').next().unwrap_or(text);
    without_generics
        .rsplit('.')
        .next()
        .unwrap_or(without_generics)
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Wanted {
    /// ファイル内で束縛されている名前
    Local(String),
    /// モジュールがexportしている名前
    Export(String),
}

enum Step {
    Done(Resolution),
    Next(Arc<SourceIndex>, Wanted),
    /// `export *` の候補
    Fork(Vec<(Arc<SourceIndex>, Wanted)>),
}

struct Chase<'r> {
    registry: &'r SourceRegistry,
    identifier: String,
    visited: HashSet<(PathBuf, Wanted)>,
}

impl Chase<'_> {
    fn run(
        &mut self,
        mut unit: Arc<SourceIndex>,
        mut wanted: Wanted,
        mut depth: usize,
    ) -> Result<Resolution, AnalyzerError> {
        loop {
            if depth > MAX_CHASE_DEPTH
                || !self.visited.insert((unit.path().to_path_buf(), wanted.clone()))
            {
                return Err(AnalyzerError::ImportCycle {
                    identifier: self.identifier.clone(),
                    path: unit.path().to_path_buf(),
                });
            }
            depth += 1;
            debug!(
                "resolve '{}': looking for {:?} in {}",
                self.identifier,
                wanted,
                unit.path().display()
            );

            match self.step(&unit, &wanted)? {
                Step::Done(resolution) => return Ok(resolution),
                Step::Next(next_unit, next_wanted) => {
                    unit = next_unit;
                    wanted = next_wanted;
                }
                Step::Fork(branches) => {
                    for (branch_unit, branch_wanted) in branches {
                        match self.run(branch_unit, branch_wanted, depth) {
                            Ok(resolution) => return Ok(resolution),
                            Err(e) => {
                                debug!("resolve '{}': star export miss: {}", self.identifier, e)
                            }
                        }
                    }
                    return Err(self.dead_end(&unit));
                }
            }
        }
    }

    fn step(&self, unit: &Arc<SourceIndex>, wanted: &Wanted) -> Result<Step, AnalyzerError> {
        let facade = SyntaxFacade::new(unit);
        match wanted {
            Wanted::Local(name) => match facade.lookup_local(name) {
                Some(binding) => self.follow_binding(facade, binding),
                None => Err(self.dead_end(unit)),
            },
            Wanted::Export(name) => match facade.find_exported(name) {
                Some(ExportTarget::Local(binding)) => self.follow_binding(facade, binding),
                Some(ExportTarget::Value(value)) => self.follow_value(facade, value),
                Some(ExportTarget::Alias(local)) => {
                    Ok(Step::Next(Arc::clone(unit), Wanted::Local(local)))
                }
                Some(ExportTarget::Forward { specifier, name }) => {
                    let target = self.module(unit, &specifier)?;
                    Ok(Step::Next(target, Wanted::Export(name)))
                }
                Some(ExportTarget::Star(specifiers)) => {
                    let branches = specifiers
                        .iter()
                        .filter_map(|s| self.registry.resolve_module(unit.path(), s))
                        .map(|target| (target, Wanted::Export(name.clone())))
                        .collect();
                    Ok(Step::Fork(branches))
                }
                None => Err(self.dead_end(unit)),
            },
        }
    }

    fn follow_binding(
        &self,
        facade: SyntaxFacade,
        binding: LocalBinding,
    ) -> Result<Step, AnalyzerError> {
        match binding {
            LocalBinding::Variable {
                value: Some(value), ..
            } => self.follow_value(facade, value),
            LocalBinding::Variable { value: None, .. } => {
                Err(AnalyzerError::UnsupportedExpression {
                    identifier: self.identifier.clone(),
                    kind: "declaration without initializer".to_string(),
                    path: facade.path().to_path_buf(),
                })
            }
            LocalBinding::Class(node) => Ok(Step::Done(done(facade, node, DeclarationKind::Class))),
            LocalBinding::Function(node) => {
                Ok(Step::Done(done(facade, node, DeclarationKind::Function)))
            }
            LocalBinding::Import(ImportBinding { specifier, imported }) => {
                let wanted = match imported {
                    Imported::Named(name) => Wanted::Export(name),
                    Imported::Default | Imported::Module => Wanted::Export("default".to_string()),
                    Imported::Namespace => return Err(self.dead_end(facade.unit())),
                };
                let target = self.module(facade.unit(), &specifier)?;
                Ok(Step::Next(target, wanted))
            }
        }
    }

    fn follow_value(&self, facade: SyntaxFacade, value: Node) -> Result<Step, AnalyzerError> {
        let value = unwrap_expression(value);
        match value.kind() {
            "object" => Ok(Step::Done(done(facade, value, DeclarationKind::ObjectLiteral))),
            "class" => Ok(Step::Done(done(facade, value, DeclarationKind::Class))),
            _ if is_closure(value) => {
                Ok(Step::Done(done(facade, value, DeclarationKind::Function)))
            }
            "identifier" => Ok(Step::Next(
                Arc::clone(facade.unit()),
                Wanted::Local(facade.text(value).to_string()),
            )),
            "new_expression" => match value.child_by_field_name("constructor") {
                Some(constructor) if constructor.kind() == "identifier" => Ok(Step::Next(
                    Arc::clone(facade.unit()),
                    Wanted::Local(facade.text(constructor).to_string()),
                )),
                _ => Err(self.unsupported(facade, value)),
            },
            "call_expression" => match facade.require_specifier(value) {
                Some(specifier) => {
                    let target = self.module(facade.unit(), &specifier)?;
                    Ok(Step::Next(target, Wanted::Export("default".to_string())))
                }
                None => Err(self.unsupported(facade, value)),
            },
            _ => Err(self.unsupported(facade, value)),
        }
    }

    fn module(
        &self,
        unit: &Arc<SourceIndex>,
        specifier: &str,
    ) -> Result<Arc<SourceIndex>, AnalyzerError> {
        self.registry
            .resolve_module(unit.path(), specifier)
            .ok_or_else(|| self.dead_end(unit))
    }

    fn dead_end(&self, unit: &SourceIndex) -> AnalyzerError {
        AnalyzerError::ImportDeadEnd {
            identifier: self.identifier.clone(),
            path: unit.path().to_path_buf(),
        }
    }

    fn unsupported(&self, facade: SyntaxFacade, node: Node) -> AnalyzerError {
        AnalyzerError::UnsupportedExpression {
            identifier: self.identifier.clone(),
            kind: node.kind().replace('_', " "),
            path: facade.path().to_path_buf(),
        }
    }
}

fn done(facade: SyntaxFacade, node: Node, kind: DeclarationKind) -> Resolution {
    Resolution {
        unit: Arc::clone(facade.unit()),
        node: NodeRef::of(node),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(path: &str, text: &str) -> Arc<SourceIndex> {
        Arc::new(SourceIndex::parse(path, text).unwrap())
    }

    #[test]
    fn test_string_value() {
        let unit = unit("/a.js", "f('single', \"double\", `tpl`, `a${b}c`);");
        let facade = SyntaxFacade::new(&unit);
        let call = facade.root().named_child(0).unwrap().named_child(0).unwrap();
        let values: Vec<Option<String>> = call_arguments(call)
            .into_iter()
            .map(|arg| facade.string_value(arg))
            .collect();
        assert_eq!(
            values,
            vec![
                Some("single".to_string()),
                Some("double".to_string()),
                Some("tpl".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_string_value_decodes_escapes() {
        let unit = unit(
            "/a.js",
            r#"f('<p class=\'x\'>it\'s</p>', "a\"b\\c", `line\nnext`, 'caf\u00e9 \u{1F600}', 'x\
y');"#,
        );
        let facade = SyntaxFacade::new(&unit);
        let call = facade.root().named_child(0).unwrap().named_child(0).unwrap();
        let values: Vec<String> = call_arguments(call)
            .into_iter()
            .filter_map(|arg| facade.string_value(arg))
            .collect();
        assert_eq!(
            values,
            vec![
                "<p class='x'>it's</p>".to_string(),
                "a\"b\\c".to_string(),
                "line\nnext".to_string(),
                "café 😀".to_string(),
                "xy".to_string(),
            ]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"\x41\t\0"), "A\t\0");
        assert_eq!(unescape(r"\uD83D\uDE00"), "😀");
        assert_eq!(unescape(r"\q\u12"), "qu12");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn test_object_fields_keep_source_order() {
        let unit = unit(
            "/a.js",
            "var o = { b: 1, 'a': 2, 3: x, short, m() {}, [k]: 4, b: 5 };",
        );
        let facade = SyntaxFacade::new(&unit);
        let Some(LocalBinding::Variable {
            value: Some(object),
            ..
        }) = facade.lookup_local("o")
        else {
            panic!("expected variable");
        };
        let fields = facade.object_fields(object);
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "3", "short", "m"]);
        assert_eq!(facade.text(fields[0].1.value), "5");
        assert_eq!(fields[4].1.value.kind(), "method_definition");
    }

    #[test]
    fn test_lookup_local_import_forms() {
        let unit = unit(
            "/p/a.ts",
            r#"
import Def from './def';
import { A as B, C } from './named';
import * as ns from './ns';
import R = require('./req');
const cjs = require('./cjs');
"#,
        );
        let facade = SyntaxFacade::new(&unit);
        let imported = |name: &str| match facade.lookup_local(name) {
            Some(LocalBinding::Import(binding)) => Some(binding),
            _ => None,
        };

        assert_eq!(imported("Def").unwrap().imported, Imported::Default);
        assert_eq!(imported("B").unwrap().imported, Imported::Named("A".to_string()));
        assert_eq!(imported("C").unwrap().specifier, "./named");
        assert!(imported("A").is_none());
        assert_eq!(imported("ns").unwrap().imported, Imported::Namespace);
        assert_eq!(imported("R").unwrap().imported, Imported::Module);
        assert_eq!(imported("cjs").unwrap().specifier, "./cjs");
    }

    #[test]
    fn test_find_exported_forms() {
        let unit = unit(
            "/p/a.ts",
            r#"
const local = {};
export const direct = {};
export class Klass {}
export { local as renamed };
export { forwarded } from './other';
export * from './everything';
export default Klass;
"#,
        );
        let facade = SyntaxFacade::new(&unit);

        assert!(matches!(
            facade.find_exported("direct"),
            Some(ExportTarget::Local(LocalBinding::Variable { .. }))
        ));
        assert!(matches!(
            facade.find_exported("Klass"),
            Some(ExportTarget::Local(LocalBinding::Class(_)))
        ));
        assert!(matches!(
            facade.find_exported("renamed"),
            Some(ExportTarget::Alias(ref local)) if local == "local"
        ));
        assert!(matches!(
            facade.find_exported("forwarded"),
            Some(ExportTarget::Forward { ref specifier, .. }) if specifier == "./other"
        ));
        assert!(matches!(
            facade.find_exported("default"),
            Some(ExportTarget::Alias(ref local)) if local == "Klass"
        ));
        assert!(matches!(
            facade.find_exported("missing"),
            Some(ExportTarget::Star(ref specs)) if specs == &vec!["./everything".to_string()]
        ));
    }

    #[test]
    fn test_find_exported_commonjs() {
        let unit = unit(
            "/p/a.js",
            "module.exports = { template: '<p></p>' };\nexports.other = {};",
        );
        let facade = SyntaxFacade::new(&unit);
        assert!(matches!(
            facade.find_exported("default"),
            Some(ExportTarget::Value(node)) if node.kind() == "object"
        ));
        assert!(matches!(facade.find_exported("other"), Some(ExportTarget::Value(_))));
    }

    #[test]
    fn test_resolve_local_alias() {
        let unit = unit("/p/a.js", "var cfg = { bindings: {} };\nvar alias = cfg;");
        let registry = SourceRegistry::new();
        let resolution = SyntaxFacade::new(&unit).resolve("alias", &registry).unwrap();
        assert_eq!(resolution.kind, DeclarationKind::ObjectLiteral);
        assert_eq!(resolution.path(), Path::new("/p/a.js"));
        assert_eq!(resolution.facade().node(resolution.node).unwrap().kind(), "object");
    }

    #[test]
    fn test_resolve_through_reexport() {
        let registry = SourceRegistry::new();
        let entry = registry
            .insert_source("/p/a.ts", "import { Cfg } from './b';\nf(Cfg);")
            .unwrap();
        registry
            .insert_source("/p/b.ts", "export { Cfg } from './c';")
            .unwrap();
        registry
            .insert_source("/p/c.ts", "export class Cfg { template = '<p></p>'; }")
            .unwrap();

        let resolution = SyntaxFacade::new(&entry).resolve("Cfg", &registry).unwrap();
        assert_eq!(resolution.kind, DeclarationKind::Class);
        assert_eq!(resolution.path(), Path::new("/p/c.ts"));
    }

    #[test]
    fn test_resolve_star_export() {
        let registry = SourceRegistry::new();
        let entry = registry
            .insert_source("/p/a.ts", "import { Cfg } from './index';")
            .unwrap();
        registry
            .insert_source("/p/index.ts", "export * from './x';\nexport * from './y';")
            .unwrap();
        registry.insert_source("/p/x.ts", "export const other = {};").unwrap();
        registry.insert_source("/p/y.ts", "export const Cfg = {};").unwrap();

        let resolution = SyntaxFacade::new(&entry).resolve("Cfg", &registry).unwrap();
        assert_eq!(resolution.path(), Path::new("/p/y.ts"));
    }

    #[test]
    fn test_resolve_cycle_fails() {
        let registry = SourceRegistry::new();
        let entry = registry
            .insert_source("/p/a.ts", "import { X } from './b';\nexport { X };")
            .unwrap();
        registry
            .insert_source("/p/b.ts", "export { X } from './a';")
            .unwrap();

        let err = SyntaxFacade::new(&entry).resolve("X", &registry).unwrap_err();
        assert!(matches!(err, AnalyzerError::ImportCycle { .. }));
    }

    #[test]
    fn test_resolve_dead_ends() {
        let registry = SourceRegistry::new();
        let entry = registry
            .insert_source(
                "/p/a.ts",
                "import { X } from 'some-package';\nimport * as ns from './b';\nconst y = build();",
            )
            .unwrap();
        let facade = SyntaxFacade::new(&entry);

        assert!(matches!(
            facade.resolve("X", &registry),
            Err(AnalyzerError::ImportDeadEnd { .. })
        ));
        assert!(matches!(
            facade.resolve("ns", &registry),
            Err(AnalyzerError::ImportDeadEnd { .. })
        ));
        assert!(matches!(
            facade.resolve("nowhere", &registry),
            Err(AnalyzerError::ImportDeadEnd { .. })
        ));
        assert!(matches!(
            facade.resolve("y", &registry),
            Err(AnalyzerError::UnsupportedExpression { ref kind, .. }) if kind == "call expression"
        ));
    }

    #[test]
    fn test_heritage() {
        let unit = unit(
            "/p/a.ts",
            "class A extends ng.Base<T> implements angular.IComponentOptions, Other {}",
        );
        let facade = SyntaxFacade::new(&unit);
        let class = facade.root().named_child(0).unwrap();
        let heritage = facade.heritage(class);
        assert_eq!(heritage.base.as_deref(), Some("Base"));
        assert_eq!(heritage.type_names, vec!["Base", "IComponentOptions", "Other"]);

        let js = self::unit("/p/a.js", "class B extends lib.Base {}");
        let facade = SyntaxFacade::new(&js);
        let class = facade.root().named_child(0).unwrap();
        assert_eq!(facade.heritage(class).base.as_deref(), Some("Base"));
    }

    #[test]
    fn test_member_assignments() {
        let unit = unit(
            "/p/a.js",
            "function C() { var vm = this; this.a = 1; vm.b = 2; other.c = 3; this[d] = 4; if (x) { this.e = 5; } }",
        );
        let facade = SyntaxFacade::new(&unit);
        let function = facade.root().named_child(0).unwrap();
        let body = function.child_by_field_name("body").unwrap();
        let names: Vec<&str> = facade
            .member_assignments(body, &["this", "vm"])
            .iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
