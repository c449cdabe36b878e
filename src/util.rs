use std::path::{Component, Path, PathBuf};

/// camelCaseをkebab-caseに変換
///
/// 連続する大文字は1語として扱う
/// 例: "myDirective" -> "my-directive", "XMLHttpRequest" -> "xml-http-request"
pub fn camel_to_kebab(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower)
            {
                result.push('-');
            }
        }
        result.extend(c.to_lowercase());
    }
    result
}

/// 任意の識別子風文字列をkebab-caseに変換
///
/// 英数字以外は区切りとして扱う
/// 例: "my_widget" -> "my-widget", "MyWidget" -> "my-widget"
pub fn kebab_case(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(camel_to_kebab)
        .collect::<Vec<_>>()
        .join("-")
}

/// クエリパラメータとフラグメントを除去
pub fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// `.` と `..` を字句的に畳み込む（ファイルシステムにはアクセスしない）
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// import/require の指定子が相対パスかどうか
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

/// 参照元ファイルのディレクトリを起点として相対パスを解決
pub fn resolve_relative_path(from_file: &Path, specifier: &str) -> PathBuf {
    let specifier = strip_query(specifier);
    if specifier.starts_with('/') {
        return normalize_path(Path::new(specifier));
    }
    let dir = from_file.parent().unwrap_or_else(|| Path::new(""));
    normalize_path(&dir.join(specifier))
}

/// ルートディレクトリを起点としてテンプレートURLを解決
///
/// 先頭の `/` はルート相対として扱う
pub fn resolve_under_root(root: &Path, url: &str) -> PathBuf {
    let url = strip_query(url).trim_start_matches('/');
    normalize_path(&root.join(url))
}

/// 指定子がマークアップファイルの拡張子を含むかどうか
pub fn has_markup_extension(specifier: &str, extensions: &[String]) -> bool {
    let specifier = strip_query(specifier).to_lowercase();
    extensions.iter().any(|ext| specifier.contains(ext.as_str()))
}
