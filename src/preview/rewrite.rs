use aho_corasick::{AhoCorasick, MatchKind};
use std::collections::BTreeMap;

/// Rewrites references to assets inside a script's source text.
///
/// `assets` maps every spelling of an asset path to its handle.
pub trait AssetRewriter: Send + Sync {
    fn rewrite(&self, source: &str, assets: &BTreeMap<String, String>) -> String;
}

/// Replaces exact quoted literals: `"path"` and `'path'` become the quoted
/// handle. Paths built at runtime are not seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotedLiteralRewriter;

impl AssetRewriter for QuotedLiteralRewriter {
    fn rewrite(&self, source: &str, assets: &BTreeMap<String, String>) -> String {
        if assets.is_empty() {
            return source.to_string();
        }

        let mut patterns = Vec::with_capacity(assets.len() * 2);
        let mut replacements = Vec::with_capacity(assets.len() * 2);
        for (path, handle) in assets {
            for quote in ['"', '\''] {
                patterns.push(format!("{quote}{path}{quote}"));
                replacements.push(format!("{quote}{handle}{quote}"));
            }
        }

        match AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
        {
            Ok(matcher) => matcher.replace_all(source, &replacements),
            Err(error) => {
                tracing::warn!(%error, "asset rewrite skipped");
                source.to_string()
            }
        }
    }
}
