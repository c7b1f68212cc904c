//! Asset minification for JS and CSS.
//!
//! Uses oxc for JavaScript and lightningcss for CSS. Both are pure
//! `&str -> String` transforms; a source that fails to parse is an error,
//! never a partially minified output. The HTML tokenizer in `html::minify`
//! calls back into these for embedded `<style>` and `<script>` blocks.

use lightningcss::stylesheet::{
    MinifyOptions, ParserOptions, PrinterOptions, StyleAttribute, StyleSheet,
};
use lightningcss::targets::{Browsers, Targets};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use thiserror::Error;

/// Oldest browser the CSS output must stay compatible with (IE 8).
const IE_COMPAT_VERSION: u32 = 8 << 16;

/// Minification failures.
#[derive(Debug, Error)]
pub enum MinifyError {
    #[error("css: {0}")]
    Css(String),
    #[error("js: {0}")]
    Js(String),
    #[error("html: {0}")]
    Html(String),
}

/// Which minifier a transform task applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinifyKind {
    Css,
    Js,
}

impl MinifyKind {
    pub fn minify(self, source: &str) -> Result<String, MinifyError> {
        match self {
            Self::Css => minify_css(source),
            Self::Js => minify_js(source),
        }
    }
}

/// How a JavaScript source is loaded by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// `<script>` / `<script src>`; top-level names are globals.
    Classic,
    /// `<script type="module">`
    Module,
}

fn css_targets() -> Targets {
    Targets::from(Browsers {
        ie: Some(IE_COMPAT_VERSION),
        ..Browsers::default()
    })
}

/// Minify a CSS stylesheet.
pub fn minify_css(source: &str) -> Result<String, MinifyError> {
    let mut stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| MinifyError::Css(e.to_string()))?;
    stylesheet
        .minify(MinifyOptions {
            targets: css_targets(),
            ..MinifyOptions::default()
        })
        .map_err(|e| MinifyError::Css(e.to_string()))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            targets: css_targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| MinifyError::Css(e.to_string()))?;
    Ok(result.code)
}

/// Minify the declarations of a `style="..."` attribute.
pub fn minify_style_attribute(source: &str) -> Result<String, MinifyError> {
    let attribute = StyleAttribute::parse(source, ParserOptions::default())
        .map_err(|_| MinifyError::Css("invalid style attribute".into()))?;
    let result = attribute
        .to_css(PrinterOptions {
            minify: true,
            targets: css_targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| MinifyError::Css(e.to_string()))?;
    Ok(result.code)
}

/// Minify a classic browser script. Console calls are kept.
pub fn minify_js(source: &str) -> Result<String, MinifyError> {
    minify_script(source, ScriptKind::Classic)
}

/// Minify JavaScript of the given kind.
pub fn minify_script(source: &str, kind: ScriptKind) -> Result<String, MinifyError> {
    let allocator = Allocator::default();
    // Script mode keeps top-level bindings: they are page globals.
    let source_type = match kind {
        ScriptKind::Classic => SourceType::script(),
        ScriptKind::Module => SourceType::mjs(),
    };
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(err) = ret.errors.first() {
        return Err(MinifyError::Js(err.to_string()));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions {
            top_level: Some(kind == ScriptKind::Module),
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions {
            drop_console: false,
            ..CompressOptions::smallest()
        }),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_css_strips_whitespace_and_comments() {
        let source = "/* header */\nbody {\n  color: red;\n  margin: 0px;\n}\n";
        let out = minify_css(source).unwrap();
        assert!(!out.contains("header"));
        assert!(!out.contains('\n'));
        assert!(out.starts_with("body{"));
        assert!(out.contains("color:red"));
    }

    #[test]
    fn test_minify_css_rejects_invalid_selector() {
        let err = minify_css("..broken { color: red }").unwrap_err();
        assert!(matches!(err, MinifyError::Css(_)));
    }

    #[test]
    fn test_minify_style_attribute() {
        let out = minify_style_attribute("color : red ;  margin: 0px ").unwrap();
        assert_eq!(out, "color:red;margin:0");
    }

    #[test]
    fn test_minify_js_keeps_console() {
        let source = "function greet(name) {\n  // say hi\n  console.log('hi ' + name);\n}\ngreet('x');\n";
        let out = minify_js(source).unwrap();
        assert!(out.contains("console.log"));
        assert!(!out.contains("say hi"));
        assert!(out.len() < source.len());
    }

    #[test]
    fn test_minify_js_keeps_top_level_names_of_classic_scripts() {
        let source = "function toggleMenu() { document.body.classList.toggle('open'); }";
        let out = minify_js(source).unwrap();
        assert!(out.contains("toggleMenu"));

        for (source, name) in [
            ("var siteName = 'tue';", "siteName"),
            ("let counter = 0;", "counter"),
            ("const API = '/api';", "API"),
            ("class Slider { next() { return 1; } }", "Slider"),
        ] {
            let out = minify_js(source).unwrap();
            assert!(out.contains(name), "{source:?} minified to {out:?}");
        }
    }

    #[test]
    fn test_minify_js_still_shortens_locals() {
        let source = "function openMenu() { var menuElement = document.body; menuElement.focus(); }";
        let out = minify_js(source).unwrap();
        assert!(out.contains("openMenu"));
        assert!(!out.contains("menuElement"));
    }

    #[test]
    fn test_minify_js_parse_error() {
        let err = minify_js("function ( {").unwrap_err();
        assert!(matches!(err, MinifyError::Js(_)));
        assert!(err.to_string().starts_with("js: "));
    }

    #[test]
    fn test_minify_module_script() {
        let out = minify_script("import { a } from './a.js';\nconsole.log(a);", ScriptKind::Module)
            .unwrap();
        assert!(out.contains("import"));
    }

    #[test]
    fn test_minify_kind_dispatch() {
        assert!(MinifyKind::Css.minify("a { color: blue; }").unwrap().contains("a{"));
        assert!(MinifyKind::Js.minify("var x = 1 + 2;").is_ok());
    }
}
