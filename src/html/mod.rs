//! HTML entry documents: reference rewriting and minification.

mod element;
mod minify;
mod rewrite;

pub use rewrite::run_html;
