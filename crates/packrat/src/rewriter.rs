//! Rewrites `require` calls into loader calls keyed by canonical module ids
//!
//! The rewriter parses a module with swc, walks the tree in pre-order and, for every call
//! whose callee is the bare identifier `require`, renames the callee to the bundle's loader
//! function and replaces the string argument with the resolved [`ModuleId`]. The mutated
//! tree is then printed back to source, so a rewritten module describes its own resolved
//! dependencies.

use std::fmt;

use anyhow::{Context, Result, anyhow};
use log::trace;
use swc_core::{
    common::{
        BytePos, FileName, GLOBALS, Globals, SourceFile, SourceMap, Span, Spanned,
        comments::SingleThreadedComments, sync::Lrc,
    },
    ecma::{
        ast::{CallExpr, Callee, EsVersion, Expr, Lit, OptChainBase, OptChainExpr, Script},
        codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter},
        parser::{Parser, StringInput, Syntax, error::Error as ParseError, lexer::Lexer},
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::module_id::ModuleId;

/// Identifier the bundled runtime exposes its loader function under
pub const LOADER_IDENT: &str = "__loader__";

const REQUIRE_IDENT: &str = "require";

/// Output of rewriting a single module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenModule {
    /// Source re-rendered from the rewritten tree
    pub code: String,
    /// Resolved ids in traversal order, duplicates included
    pub dependencies: Vec<ModuleId>,
}

/// Why a `require` call could not be resolved statically
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequireShape {
    MissingArgument,
    SpreadArgument,
    NonLiteralArgument,
    /// `require?.(...)`, which only runs when a global `require` exists
    OptionalCall,
}

impl fmt::Display for RequireShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument => f.write_str("require() called without arguments"),
            Self::SpreadArgument => f.write_str("require() called with a spread argument"),
            Self::NonLiteralArgument => {
                f.write_str("require() argument is not a string literal")
            }
            Self::OptionalCall => f.write_str("require?.() called through optional chaining"),
        }
    }
}

/// A `require` call whose target cannot be determined without running the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedRequire {
    pub module: ModuleId,
    pub line: usize,
    pub column: usize,
    pub shape: RequireShape,
}

impl fmt::Display for UnsupportedRequire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unsupported require in {} at {}:{}: {}",
            self.module, self.line, self.column, self.shape
        )
    }
}

impl std::error::Error for UnsupportedRequire {}

/// Rewrites `require` calls of one module at a time
#[derive(Debug, Clone)]
pub struct RequireRewriter {
    extension: String,
}

impl RequireRewriter {
    /// `extension` is appended to specifiers that have none, without the leading dot
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Parse `source`, rewrite its `require` calls relative to the directory of `module`
    /// and render the result
    pub fn rewrite(&self, module: &ModuleId, source: &str) -> Result<RewrittenModule> {
        GLOBALS.set(&Globals::new(), || self.rewrite_inner(module, source))
    }

    fn rewrite_inner(&self, module: &ModuleId, source: &str) -> Result<RewrittenModule> {
        let cm: Lrc<SourceMap> = Lrc::default();
        let fm = cm.new_source_file(
            FileName::Custom(module.to_string()).into(),
            source.to_owned(),
        );
        let comments = SingleThreadedComments::default();

        let mut script = parse_script(&cm, &fm, &comments, module)?;

        let mut visitor = RequireVisitor {
            module,
            extension: &self.extension,
            cm: &cm,
            dependencies: Vec::new(),
            error: None,
        };
        script.visit_mut_with(&mut visitor);
        if let Some(error) = visitor.error {
            return Err(error.into());
        }
        let dependencies = visitor.dependencies;

        // A hashbang is only valid at the very start of a file, not inside a factory body
        script.shebang = None;

        let code = render_script(&cm, &comments, &script)
            .with_context(|| format!("Failed to render rewritten module {module}"))?;

        Ok(RewrittenModule { code, dependencies })
    }
}

fn parse_script(
    cm: &SourceMap,
    fm: &SourceFile,
    comments: &SingleThreadedComments,
    module: &ModuleId,
) -> Result<Script> {
    let lexer = Lexer::new(
        Syntax::default(),
        EsVersion::EsNext,
        StringInput::from(fm),
        Some(comments),
    );
    let mut parser = Parser::new_from(lexer);
    let script = parser
        .parse_script()
        .map_err(|error| syntax_error(cm, module, &error))?;
    // Recoverable errors are still malformed input
    if let Some(error) = parser.take_errors().first() {
        return Err(syntax_error(cm, module, error));
    }
    Ok(script)
}

fn syntax_error(cm: &SourceMap, module: &ModuleId, error: &ParseError) -> anyhow::Error {
    let (line, column) = line_column(cm, error.span().lo);
    anyhow!(
        "Failed to parse {module} at {line}:{column}: {}",
        error.kind().msg()
    )
}

fn line_column(cm: &SourceMap, pos: BytePos) -> (usize, usize) {
    let loc = cm.lookup_char_pos(pos);
    (loc.line, loc.col_display + 1)
}

fn render_script(
    cm: &Lrc<SourceMap>,
    comments: &SingleThreadedComments,
    script: &Script,
) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut cfg = CodegenConfig::default();
        cfg.target = EsVersion::EsNext;
        cfg.minify = false;
        cfg.ascii_only = false;
        let mut emitter = Emitter {
            cfg,
            cm: cm.clone(),
            comments: Some(comments),
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter.emit_script(script)?;
    }
    String::from_utf8(buf).context("Rendered module is not valid UTF-8")
}

/// Renames `require` callees and collects the resolved ids
struct RequireVisitor<'a> {
    module: &'a ModuleId,
    extension: &'a str,
    cm: &'a SourceMap,
    dependencies: Vec<ModuleId>,
    error: Option<UnsupportedRequire>,
}

impl RequireVisitor<'_> {
    fn reject(&mut self, span: Span, shape: RequireShape) {
        let (line, column) = line_column(self.cm, span.lo);
        self.error = Some(UnsupportedRequire {
            module: self.module.clone(),
            line,
            column,
            shape,
        });
    }

    fn rewrite_call(&mut self, call: &mut CallExpr) {
        let span = call.span;
        let literal = match call.args.first_mut() {
            None => Err(RequireShape::MissingArgument),
            Some(arg) if arg.spread.is_some() => Err(RequireShape::SpreadArgument),
            Some(arg) => match &mut *arg.expr {
                Expr::Lit(Lit::Str(literal)) => Ok(literal),
                _ => Err(RequireShape::NonLiteralArgument),
            },
        };

        let literal = match literal {
            Ok(literal) => literal,
            Err(shape) => {
                self.reject(span, shape);
                return;
            }
        };

        let id = ModuleId::resolve(&literal.value, self.module.parent_dir(), self.extension);
        trace!("{}: require('{}') -> {id}", self.module, &*literal.value);
        literal.value = id.as_str().into();
        literal.raw = None;
        self.dependencies.push(id);

        if let Callee::Expr(callee) = &mut call.callee
            && let Expr::Ident(ident) = &mut **callee
        {
            ident.sym = LOADER_IDENT.into();
        }
    }
}

impl VisitMut for RequireVisitor<'_> {
    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        if self.error.is_some() {
            return;
        }
        // Handle the call before its arguments so dependencies come out in pre-order
        if is_require_call(call) {
            self.rewrite_call(call);
        }
        call.visit_mut_children_with(self);
    }

    fn visit_mut_opt_chain_expr(&mut self, chain: &mut OptChainExpr) {
        if self.error.is_some() {
            return;
        }
        if let OptChainBase::Call(call) = &*chain.base
            && is_require_ident(&call.callee)
        {
            self.reject(chain.span, RequireShape::OptionalCall);
            return;
        }
        chain.visit_mut_children_with(self);
    }
}

fn is_require_call(call: &CallExpr) -> bool {
    matches!(&call.callee, Callee::Expr(callee) if is_require_ident(callee))
}

fn is_require_ident(expr: &Expr) -> bool {
    matches!(expr, Expr::Ident(ident) if &*ident.sym == REQUIRE_IDENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(id: &str, source: &str) -> Result<RewrittenModule> {
        let module = ModuleId::resolve(id, ".", "js");
        RequireRewriter::new("js").rewrite(&module, source)
    }

    fn ids(module: &RewrittenModule) -> Vec<&str> {
        module.dependencies.iter().map(ModuleId::as_str).collect()
    }

    #[test]
    fn test_rewrites_require_to_loader_call() -> Result<()> {
        let module = rewrite(
            "./src/index.js",
            "const message = require('./message');\nconsole.log(message);\n",
        )?;
        assert_eq!(ids(&module), ["./src/message.js"]);
        assert!(module.code.contains(LOADER_IDENT));
        assert!(module.code.contains("./src/message.js"));
        assert!(!module.code.contains("require"));
        assert!(module.code.contains("console.log(message)"));
        Ok(())
    }

    #[test]
    fn test_dependencies_keep_duplicates_in_traversal_order() -> Result<()> {
        let module = rewrite(
            "./a.js",
            "var b = require('./b');\nvar c = require('./lib/c.js');\nvar again = require('./b');\n",
        )?;
        assert_eq!(ids(&module), ["./b.js", "./lib/c.js", "./b.js"]);
        Ok(())
    }

    #[test]
    fn test_nested_requires_are_visited_in_pre_order() -> Result<()> {
        let module = rewrite(
            "./a.js",
            "function load() { return require('./lazy'); }\n\
             wrap(require('./outer'), () => require('./inner'));\n",
        )?;
        assert_eq!(ids(&module), ["./lazy.js", "./outer.js", "./inner.js"]);
        Ok(())
    }

    #[test]
    fn test_member_require_calls_are_left_alone() -> Result<()> {
        let module = rewrite("./a.js", "module.require('./x');\nloader.require('./y');\n")?;
        assert!(module.dependencies.is_empty());
        assert!(module.code.contains("module.require"));
        Ok(())
    }

    #[test]
    fn test_specifier_resolves_against_module_directory() -> Result<()> {
        let module = rewrite("./src/app/main.js", "require('../shared/util');")?;
        assert_eq!(ids(&module), ["./src/shared/util.js"]);
        Ok(())
    }

    #[test]
    fn test_non_literal_argument_is_rejected() {
        let err = rewrite("./a.js", "const name = './b';\nrequire(name);\n").unwrap_err();
        let unsupported = err
            .downcast_ref::<UnsupportedRequire>()
            .expect("expected an unsupported require error");
        assert_eq!(unsupported.shape, RequireShape::NonLiteralArgument);
        assert_eq!(unsupported.module.as_str(), "./a.js");
        assert_eq!(unsupported.line, 2);
    }

    #[test]
    fn test_missing_argument_is_rejected() {
        let err = rewrite("./a.js", "require();").unwrap_err();
        let unsupported = err
            .downcast_ref::<UnsupportedRequire>()
            .expect("expected an unsupported require error");
        assert_eq!(unsupported.shape, RequireShape::MissingArgument);
    }

    #[test]
    fn test_spread_argument_is_rejected() {
        let err = rewrite("./a.js", "require(...names);").unwrap_err();
        let unsupported = err
            .downcast_ref::<UnsupportedRequire>()
            .expect("expected an unsupported require error");
        assert_eq!(unsupported.shape, RequireShape::SpreadArgument);
    }

    #[test]
    fn test_optional_require_call_is_rejected() {
        let err = rewrite("./a.js", "const x = 1;\nmodule.exports = require?.('./b');\n")
            .unwrap_err();
        let unsupported = err
            .downcast_ref::<UnsupportedRequire>()
            .expect("expected an unsupported require error");
        assert_eq!(unsupported.shape, RequireShape::OptionalCall);
        assert_eq!(unsupported.line, 2);
    }

    #[test]
    fn test_optional_member_call_is_left_alone() -> Result<()> {
        let module = rewrite("./a.js", "loader?.require('./x');\nmodule.exports = require('./b');")?;
        assert_eq!(ids(&module), ["./b.js"]);
        assert!(module.code.contains("loader?.require"));
        Ok(())
    }

    #[test]
    fn test_hashbang_is_dropped_from_rewritten_module() -> Result<()> {
        let module = rewrite(
            "./cli.js",
            "#!/usr/bin/env node\nmodule.exports = require('./b');\n",
        )?;
        assert_eq!(ids(&module), ["./b.js"]);
        assert!(!module.code.contains("#!"), "{}", module.code);
        assert!(module.code.starts_with("module.exports = __loader__("));
        Ok(())
    }

    #[test]
    fn test_malformed_source_is_a_parse_error() {
        let err = rewrite("./broken.js", "const = ;").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse ./broken.js at 1:"), "{message}");
    }

    #[test]
    fn test_module_without_requires_has_no_dependencies() -> Result<()> {
        let module = rewrite("./leaf.js", "module.exports = { answer: 42 };")?;
        assert!(module.dependencies.is_empty());
        assert!(module.code.contains("answer: 42"));
        Ok(())
    }
}
