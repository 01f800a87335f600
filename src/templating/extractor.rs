//! Static discovery of the variables a template needs.
//!
//! The template is parsed with Tera's parser and the resulting syntax tree is
//! walked; nothing is rendered and no data is required. A name counts as a
//! free variable when it is read somewhere without being bound first by the
//! template itself:
//!
//! - `{% for x in items %}` binds `x` (and `loop`) inside the loop body
//! - `{% for k, v in map %}` binds `k` and `v`
//! - `{% set x = ... %}` binds `x` for the rest of the enclosing scope
//!   (`set_global` binds it for the rest of the template)
//! - `{% macro m(a, b) %}` binds `a` and `b` inside the macro body
//!
//! Only the root of a path counts: `{{ sample.reads[0] }}` needs `sample`.
//! Identifiers used as subscripts (`{{ lanes[idx] }}`) are reads as well.

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tera::Tera;
use tera::ast::{Expr, ExprVal, FunctionCall, Node};

use super::syntax_error;

/// Names of the free variables of one template, sorted.
pub type VariableSet = BTreeSet<String>;

/// Names Tera injects into every render context.
const TERA_BUILTINS: &[&str] = &["__tera_context"];

/// Extract the free variables of the template at `template_path`.
///
/// # Errors
///
/// Fails if the file cannot be read, or with
/// [`crate::core::AppUtilError::TemplateSyntax`] if it does not parse.
pub fn extract_variables(template_path: &Path) -> Result<VariableSet> {
    let source = std::fs::read_to_string(template_path)
        .with_context(|| format!("Failed to read template: {}", template_path.display()))?;
    let name = template_path
        .file_name()
        .map_or_else(|| template_path.display().to_string(), |n| n.to_string_lossy().into_owned());

    extract_variables_from_str(&name, &source)
}

/// Extract the free variables of template source `source` named `name`.
///
/// # Errors
///
/// Returns [`crate::core::AppUtilError::TemplateSyntax`] if `source` does not parse.
pub fn extract_variables_from_str(name: &str, source: &str) -> Result<VariableSet> {
    let mut tera = Tera::default();
    tera.add_raw_template(name, source).map_err(|e| syntax_error(name, &e))?;
    let template = tera.get_template(name).map_err(|e| syntax_error(name, &e))?;

    let mut walker = FreeVariables::new();
    walker.visit_nodes(&template.ast);

    tracing::debug!("Template {} references {} free variable(s)", name, walker.free.len());
    Ok(walker.free)
}

/// AST walker tracking the names bound by enclosing constructs.
struct FreeVariables {
    scopes: Vec<HashSet<String>>,
    free: VariableSet,
}

impl FreeVariables {
    fn new() -> Self {
        Self {
            scopes: vec![HashSet::new()],
            free: VariableSet::new(),
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        TERA_BUILTINS.contains(&name) || self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn bind_global(&mut self, name: &str) {
        if let Some(scope) = self.scopes.first_mut() {
            scope.insert(name.to_string());
        }
    }

    fn with_scope<I, S>(&mut self, names: I, body: &[Node])
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.push(names.into_iter().map(Into::into).collect());
        self.visit_nodes(body);
        self.scopes.pop();
    }

    fn visit_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.visit_node(node);
        }
    }

    fn visit_node(&mut self, node: &Node) {
        match node {
            Node::VariableBlock(_, expr) => self.visit_expr(expr),
            Node::Set(_, set) => {
                // The value is evaluated before the name is bound
                self.visit_expr(&set.value);
                if set.global {
                    self.bind_global(&set.key);
                } else {
                    self.bind(&set.key);
                }
            }
            Node::Forloop(_, forloop, _) => {
                self.visit_expr(&forloop.container);

                let mut names = vec![forloop.value.clone(), "loop".to_string()];
                if let Some(key) = &forloop.key {
                    names.push(key.clone());
                }
                self.with_scope(names, &forloop.body);

                if let Some(empty_body) = &forloop.empty_body {
                    self.visit_nodes(empty_body);
                }
            }
            Node::If(if_node, _) => {
                for (_, condition, body) in &if_node.conditions {
                    self.visit_expr(condition);
                    self.visit_nodes(body);
                }
                if let Some((_, body)) = &if_node.otherwise {
                    self.visit_nodes(body);
                }
            }
            Node::FilterSection(_, section, _) => {
                self.visit_call(&section.filter);
                self.visit_nodes(&section.body);
            }
            Node::Block(_, block, _) => self.visit_nodes(&block.body),
            Node::MacroDefinition(_, definition, _) => {
                for default in definition.args.values().flatten() {
                    self.visit_expr(default);
                }
                let params: Vec<String> = definition.args.keys().cloned().collect();
                self.with_scope(params, &definition.body);
            }
            _ => {}
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.visit_val(&expr.val);
        for filter in &expr.filters {
            self.visit_call(filter);
        }
    }

    fn visit_call(&mut self, call: &FunctionCall) {
        for arg in call.args.values() {
            self.visit_expr(arg);
        }
    }

    fn visit_val(&mut self, val: &ExprVal) {
        match val {
            ExprVal::Ident(ident) => self.reference(ident),
            ExprVal::Math(math) => {
                self.visit_expr(&math.lhs);
                self.visit_expr(&math.rhs);
            }
            ExprVal::Logic(logic) => {
                self.visit_expr(&logic.lhs);
                self.visit_expr(&logic.rhs);
            }
            ExprVal::In(contains) => {
                self.visit_expr(&contains.lhs);
                self.visit_expr(&contains.rhs);
            }
            ExprVal::Test(test) => {
                self.reference(&test.ident);
                for arg in &test.args {
                    self.visit_expr(arg);
                }
            }
            ExprVal::FunctionCall(call) => self.visit_call(call),
            ExprVal::MacroCall(call) => {
                for arg in call.args.values() {
                    self.visit_expr(arg);
                }
            }
            ExprVal::Array(items) => {
                for item in items {
                    self.visit_expr(item);
                }
            }
            ExprVal::StringConcat(concat) => {
                for value in &concat.values {
                    self.visit_val(value);
                }
            }
            _ => {}
        }
    }

    /// Record the root of a path expression such as `a.b[c].d`, plus any
    /// identifiers used as subscripts.
    fn reference(&mut self, path: &str) {
        let root = root_name(path);
        if !root.is_empty() && !self.is_bound(root) {
            self.free.insert(root.to_string());
        }

        for subscript in subscripts(path) {
            if is_identifier_path(subscript) {
                self.reference(subscript);
            }
        }
    }
}

/// The part of a path before the first `.` or `[`.
fn root_name(path: &str) -> &str {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    path[..end].trim()
}

/// Contents of the top-level `[...]` groups of a path.
fn subscripts(path: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in path.char_indices() {
        match ch {
            '[' => {
                if depth == 0 {
                    start = idx + 1;
                }
                depth += 1;
            }
            ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    found.push(path[start..idx].trim());
                }
            }
            _ => {}
        }
    }

    found
}

/// Whether a subscript is a variable path rather than a string or number literal.
fn is_identifier_path(subscript: &str) -> bool {
    subscript.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
}
