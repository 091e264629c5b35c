use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use sha2::{Digest, Sha256};

use crate::config::DesignTokens;
use crate::error::InlineResult;
use crate::style::owned_css::CUSTOM_PROPERTY_PREFIX;

/// At-rules that would make the compiler reach for the network or the
/// filesystem.
const OFFLINE_AT_RULES: &[&str] = &["@import", "@plugin", "@source"];

/// Turns a theme configuration into something that can emit CSS for a set
/// of candidate class names. Preparing may be slow; building should not be.
pub trait StylesheetCompiler: Send + Sync {
    fn prepare(
        &self,
        tokens: &DesignTokens,
        custom_css: Option<&str>,
    ) -> InlineResult<Arc<dyn PreparedStylesheet>>;
}

pub trait PreparedStylesheet: Send + Sync {
    /// CSS covering at least the given candidate class names.
    fn build(&self, candidates: &[String]) -> InlineResult<String>;
}

/// A compiler backed by an already generated utility stylesheet. Design
/// tokens are emitted as `:root` custom properties after it, so they win
/// over the stylesheet's own theme values.
#[derive(Debug, Clone)]
pub struct PrecompiledStylesheet {
    css: String,
}

impl PrecompiledStylesheet {
    pub fn new(css: impl Into<String>) -> Self {
        PrecompiledStylesheet { css: css.into() }
    }
}

#[derive(Debug, Clone)]
struct PreparedCss {
    css: String,
}

impl PreparedStylesheet for PreparedCss {
    fn build(&self, candidates: &[String]) -> InlineResult<String> {
        debug!("building stylesheet for {} candidates", candidates.len());
        Ok(self.css.clone())
    }
}

impl StylesheetCompiler for PrecompiledStylesheet {
    fn prepare(
        &self,
        tokens: &DesignTokens,
        custom_css: Option<&str>,
    ) -> InlineResult<Arc<dyn PreparedStylesheet>> {
        let mut css = self.css.clone();
        css.push_str(&theme_block(tokens));
        if let Some(custom_css) = custom_css {
            css.push('\n');
            css.push_str(&strip_offline_at_rules(custom_css));
        }
        Ok(Arc::new(PreparedCss { css }))
    }
}

/// `:root{--name:value;...}` for the given tokens; empty when there are none.
pub fn theme_block(tokens: &DesignTokens) -> String {
    if tokens.is_empty() {
        return String::new();
    }
    let mut block = String::from("\n:root{");
    for (name, value) in tokens {
        let name = name.trim_start_matches(CUSTOM_PROPERTY_PREFIX);
        let _ = write!(block, "{CUSTOM_PROPERTY_PREFIX}{name}:{value};");
    }
    block.push('}');
    block
}

/// Remove `@import`, `@plugin` and `@source` statements (or blocks) from
/// user CSS. Strings and comments are left alone.
pub fn strip_offline_at_rules(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut output = String::with_capacity(css.len());
    let mut idx = 0;
    let mut copied_to = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'"' | b'\'' => idx = skip_string(bytes, idx),
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                idx = css[idx + 2..].find("*/").map_or(bytes.len(), |end| idx + 2 + end + 2);
            }
            b'@' => {
                let keyword_end = idx
                    + 1
                    + bytes[idx + 1..]
                        .iter()
                        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'-')
                        .count();
                let keyword = &css[idx..keyword_end];
                if OFFLINE_AT_RULES.iter().any(|rule| rule.eq_ignore_ascii_case(keyword)) {
                    output.push_str(&css[copied_to..idx]);
                    idx = at_rule_end(bytes, keyword_end);
                    copied_to = idx;
                    debug!("stripped {} from custom CSS", keyword);
                } else {
                    idx = keyword_end;
                }
            }
            _ => idx += 1,
        }
    }
    output.push_str(&css[copied_to..]);
    output
}

fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut idx = open + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b if b == quote => return idx + 1,
            _ => idx += 1,
        }
    }
    bytes.len()
}

/// Index just past the `;` or the matching `}` that ends an at-rule.
fn at_rule_end(bytes: &[u8], from: usize) -> usize {
    let mut idx = from;
    let mut depth = 0usize;
    while idx < bytes.len() {
        match bytes[idx] {
            b'"' | b'\'' => {
                idx = skip_string(bytes, idx);
                continue;
            }
            b';' if depth == 0 => return idx + 1,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return idx + 1;
                }
            }
            _ => {}
        }
        idx += 1;
    }
    bytes.len()
}

/// Prepared stylesheets keyed by a digest of their configuration. Safe to
/// share between threads; concurrent misses for the same key may prepare
/// twice, and the later insert wins.
#[derive(Default)]
pub struct StylesheetCache {
    entries: RwLock<HashMap<String, Arc<dyn PreparedStylesheet>>>,
}

impl StylesheetCache {
    pub fn new() -> Self {
        StylesheetCache::default()
    }

    /// SHA-256 over the tokens (sorted) and the custom CSS.
    pub fn cache_key(tokens: &DesignTokens, custom_css: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in tokens {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([1u8]);
        if let Some(custom_css) = custom_css {
            hasher.update(custom_css.as_bytes());
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }

    pub fn get_or_prepare(
        &self,
        compiler: &dyn StylesheetCompiler,
        tokens: &DesignTokens,
        custom_css: Option<&str>,
    ) -> InlineResult<Arc<dyn PreparedStylesheet>> {
        let key = Self::cache_key(tokens, custom_css);
        if let Some(prepared) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            debug!("stylesheet cache hit {}", &key[..12]);
            return Ok(Arc::clone(prepared));
        }

        debug!("stylesheet cache miss {}", &key[..12]);
        let prepared = compiler.prepare(tokens, custom_css)?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&prepared));
        Ok(prepared)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
