use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ConfigError;

/// パスマッチング用の構造体
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl PathMatcher {
    /// include/excludeパターンからPathMatcherを作成
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        let include_set = if include.is_empty() {
            None
        } else {
            Some(build_set(include)?)
        };

        Ok(Self {
            include: include_set,
            exclude: build_set(exclude)?,
        })
    }

    /// ファイルが解析対象かどうかを判定
    pub fn should_include(&self, relative_path: &Path) -> bool {
        if self.exclude.is_match(relative_path) {
            return false;
        }
        match &self.include {
            Some(include_set) => include_set.is_match(relative_path),
            None => true,
        }
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_include_means_all() {
        let matcher = PathMatcher::new(&[], &[]).unwrap();
        assert!(matcher.should_include(Path::new("src/app.ts")));
        assert!(matcher.should_include(Path::new("lib/utils.js")));
    }

    #[test]
    fn test_include_filter() {
        let matcher = PathMatcher::new(&["src/**/*.ts".to_string()], &[]).unwrap();
        assert!(matcher.should_include(Path::new("src/app.ts")));
        assert!(!matcher.should_include(Path::new("lib/other.ts")));
    }

    #[test]
    fn test_exclude_filter() {
        let matcher = PathMatcher::new(&[], &["**/*.spec.ts".to_string()]).unwrap();
        assert!(matcher.should_include(Path::new("src/app.ts")));
        assert!(!matcher.should_include(Path::new("src/app.spec.ts")));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PathMatcher::new(&["src/[".to_string()], &[]);
        assert!(matches!(result, Err(ConfigError::Pattern { .. })));
    }
}
