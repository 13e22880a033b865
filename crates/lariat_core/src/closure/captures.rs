//! Free-variable analysis and non-lexical-`this` detection.
//!
//! # Scope model
//!
//! Two kinds of scope are tracked while walking a function's syntax tree:
//!
//! - **Function-var scope** — a single set per function-like node holding
//!   `var`-declared names, the function's parameters, its own name, and the
//!   implicit `this`/`arguments` of non-arrow functions.
//! - **Block scope** — a stack of sets pushed on block and catch-clause
//!   entry, holding `let`/`const` bindings, catch parameters, and class
//!   names.
//!
//! On entry to a function-like node the walker saves the current
//! function-var set, the capture maps, and the block-stack depth; on exit it
//! removes the function's own bindings from the child maps and merges the
//! remainder into the parent.  There is no hoisting pre-pass: a `var` used
//! before its declaration is first recorded as a capture and then removed at
//! function exit, which yields the same result.
//!
//! An identifier that survives to the top level is a **capture**: either of
//! the whole referent ([`CaptureSlot::All`]) or of specific properties, with
//! an `invoked` bit recording whether a property access was ever used as a
//! call target.  Identifiers observed only under `typeof` are *probed*
//! rather than required and land in the optional map.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use smallvec::{SmallVec, smallvec};

use crate::parser::ast::*;

// ─────────────────────────────────────────────────────────────────────────────
// Capture records
// ─────────────────────────────────────────────────────────────────────────────

/// A single property observed on a captured identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedProperty {
    /// The member name.
    pub name: String,
    /// `true` iff at least one access of this property was the callee of a
    /// call expression.
    pub invoked: bool,
}

/// What is needed of a captured identifier: everything, or selected
/// properties.
///
/// `All` is absorbing — once an identifier is used as a bare value no
/// property-level narrowing is permitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CaptureSlot {
    /// The whole referent must be serialized.
    All,
    /// Only the listed properties are read (ordered, de-duplicated).
    Properties(SmallVec<[CapturedProperty; 2]>),
}

impl CaptureSlot {
    /// Merge another observation of the same identifier into this slot
    /// under the absorption rule.
    fn absorb(&mut self, other: CaptureSlot) {
        match (&mut *self, other) {
            (CaptureSlot::All, _) => {}
            (_, CaptureSlot::All) => *self = CaptureSlot::All,
            (CaptureSlot::Properties(list), CaptureSlot::Properties(incoming)) => {
                for prop in incoming {
                    push_property(list, prop);
                }
            }
        }
    }
}

fn push_property(list: &mut SmallVec<[CapturedProperty; 2]>, prop: CapturedProperty) {
    if let Some(existing) = list.iter_mut().find(|p| p.name == prop.name) {
        existing.invoked |= prop.invoked;
    } else {
        list.push(prop);
    }
}

/// Captured identifiers, keyed by name.  A `BTreeMap` keeps downstream
/// serialization deterministic.
pub type CaptureSet = BTreeMap<String, CaptureSlot>;

/// The complete capture result of one analyzed function.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureRecord {
    /// Identifiers that must resolve for the function to be serialized.
    pub required: CaptureSet,
    /// Identifiers that are merely probed (`typeof x`) and may be absent.
    pub optional: CaptureSet,
}

/// The fixed set of per-module pseudo-globals that are never captures.
const MODULE_PSEUDO_GLOBALS: &[&str] = &["__dirname", "__filename", "exports", "module", "require"];

// ─────────────────────────────────────────────────────────────────────────────
// Async-wrapper recognition
// ─────────────────────────────────────────────────────────────────────────────

/// Match the compiler-lowered async wrapper
/// `__awaiter(this, …, …, function* () { … })` and return its fourth
/// argument.
///
/// The `this` passed as the first argument is an artifact of async lowering:
/// the walker must not record it as a capture and the detector must not
/// count it as a genuine use of non-lexical `this`.
fn awaiter_function(call: &CallExpr) -> Option<&Expr> {
    let Expr::Ident(callee) = call.callee.as_ref() else {
        return None;
    };
    if callee.name != "__awaiter" || call.arguments.len() != 4 {
        return None;
    }
    if !matches!(call.arguments[0], Expr::This(_)) {
        return None;
    }
    match &call.arguments[3] {
        target @ (Expr::Fn(_) | Expr::Arrow(_)) => Some(target),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Free-variable walker
// ─────────────────────────────────────────────────────────────────────────────

/// Walk `program` (a parenthesized function expression) and compute its
/// [`CaptureRecord`], filtering out ambient globals via `is_global`.
pub(crate) fn compute_captures(
    program: &Program,
    is_global: &dyn Fn(&str) -> bool,
) -> CaptureRecord {
    let mut walker = CaptureWalker::new();
    for stmt in &program.body {
        walker.visit_stmt(stmt);
    }
    walker.finish(is_global)
}

/// Which scope a binding name lands in.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BindingTarget {
    /// The nearest function-var scope (`var`, parameters, function names).
    FunctionScope,
    /// The innermost block scope (`let`/`const`, catch parameters, classes).
    BlockScope,
}

/// One observed use of an identifier.
enum Observation {
    /// Used as a bare value — the whole referent is needed.
    All,
    /// Used as the object of a named member access.
    Property(CapturedProperty),
}

struct CaptureWalker {
    /// Names bound in the current function-like node.
    function_vars: HashSet<String>,
    /// Stack of block scopes (shared across nested functions; truncated on
    /// function exit).
    block_scopes: Vec<HashSet<String>>,
    /// Captures of the current function that must resolve.
    required: HashMap<String, CaptureSlot>,
    /// Captures of the current function that are merely probed.
    optional: HashMap<String, CaptureSlot>,
}

impl CaptureWalker {
    fn new() -> Self {
        Self {
            function_vars: HashSet::new(),
            block_scopes: vec![HashSet::new()],
            required: HashMap::new(),
            optional: HashMap::new(),
        }
    }

    // ── Scope bookkeeping ─────────────────────────────────────────────────

    fn declare(&mut self, target: BindingTarget, name: &str) {
        match target {
            BindingTarget::FunctionScope => {
                self.function_vars.insert(name.to_owned());
            }
            BindingTarget::BlockScope => {
                self.block_scopes
                    .last_mut()
                    .expect("walker always keeps a root block scope")
                    .insert(name.to_owned());
            }
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.function_vars.contains(name)
            || self.block_scopes.iter().any(|scope| scope.contains(name))
    }

    fn record(&mut self, name: &str, observation: Observation, optional: bool) {
        if self.is_bound(name) {
            return;
        }
        let incoming = match observation {
            Observation::All => CaptureSlot::All,
            Observation::Property(prop) => CaptureSlot::Properties(smallvec![prop]),
        };
        let map = if optional {
            &mut self.optional
        } else {
            &mut self.required
        };
        match map.get_mut(name) {
            Some(slot) => slot.absorb(incoming),
            None => {
                map.insert(name.to_owned(), incoming);
            }
        }
    }

    // ── Function entry / exit ─────────────────────────────────────────────

    /// Enter a function-like node: fresh function-var scope and capture
    /// maps, parameters (and their defaults) visited inside, body walked by
    /// `walk_body`, then the child's own bindings removed and the remaining
    /// captures merged into the parent.
    fn enter_function(
        &mut self,
        params: &[Pat],
        own_name: Option<&str>,
        is_arrow: bool,
        walk_body: impl FnOnce(&mut Self),
    ) {
        let saved_vars = std::mem::take(&mut self.function_vars);
        let saved_required = std::mem::take(&mut self.required);
        let saved_optional = std::mem::take(&mut self.optional);
        let saved_depth = self.block_scopes.len();

        if !is_arrow {
            self.function_vars.insert("this".to_owned());
            self.function_vars.insert("arguments".to_owned());
        }
        if let Some(name) = own_name {
            self.function_vars.insert(name.to_owned());
        }
        for param in params {
            self.visit_binding_pattern(param, BindingTarget::FunctionScope);
        }

        walk_body(self);

        for name in &self.function_vars {
            self.required.remove(name);
            self.optional.remove(name);
        }
        self.block_scopes.truncate(saved_depth);

        let child_required = std::mem::replace(&mut self.required, saved_required);
        let child_optional = std::mem::replace(&mut self.optional, saved_optional);
        self.function_vars = saved_vars;

        for (name, slot) in child_required {
            match self.required.get_mut(&name) {
                Some(existing) => existing.absorb(slot),
                None => {
                    self.required.insert(name, slot);
                }
            }
        }
        for (name, slot) in child_optional {
            match self.optional.get_mut(&name) {
                Some(existing) => existing.absorb(slot),
                None => {
                    self.optional.insert(name, slot);
                }
            }
        }
    }

    fn visit_function(&mut self, func: &Function) {
        let own_name = func.name.as_ref().map(|n| n.name.as_str());
        self.enter_function(&func.params, own_name, false, |w| {
            w.visit_block_scope(&func.body);
        });
    }

    fn visit_method_value(&mut self, func: &Function) {
        // A method's name is not in scope within itself.
        self.enter_function(&func.params, None, false, |w| {
            w.visit_block_scope(&func.body);
        });
    }

    fn visit_arrow(&mut self, arrow: &ArrowExpr) {
        self.enter_function(&arrow.params, None, true, |w| match &arrow.body {
            ArrowBody::Block(block) => w.visit_block_scope(block),
            ArrowBody::Expr(expr) => w.visit_expr(expr),
        });
    }

    // ── Binding patterns ──────────────────────────────────────────────────

    /// Record every name a pattern introduces into `target`, and walk
    /// default-value initializers for captures.  Property keys of
    /// destructured fields bind nothing and reference nothing.
    fn visit_binding_pattern(&mut self, pat: &Pat, target: BindingTarget) {
        match pat {
            Pat::Ident(ident) => self.declare(target, &ident.name),
            Pat::Array(array) => {
                for element in array.elements.iter().flatten() {
                    self.visit_binding_pattern(element, target);
                }
            }
            Pat::Object(object) => {
                for prop in &object.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => {
                            self.visit_binding_pattern(&kv.value, target);
                        }
                        ObjectPatProp::Shorthand(sh) => {
                            self.declare(target, &sh.key.name);
                            if let Some(default) = &sh.default {
                                self.visit_expr(default);
                            }
                        }
                        ObjectPatProp::Rest(rest) => {
                            self.visit_binding_pattern(&rest.argument, target);
                        }
                    }
                }
            }
            Pat::Rest(rest) => self.visit_binding_pattern(&rest.argument, target),
            Pat::Assign(assign) => {
                self.visit_binding_pattern(&assign.left, target);
                self.visit_expr(&assign.right);
            }
        }
    }

    // ── Statements ────────────────────────────────────────────────────────

    fn visit_block_scope(&mut self, block: &BlockStmt) {
        self.block_scopes.push(HashSet::new());
        for stmt in &block.body {
            self.visit_stmt(stmt);
        }
        self.block_scopes.pop();
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.visit_block_scope(block),
            Stmt::VarDecl(decl) => self.visit_var_decl(decl),
            Stmt::FnDecl(func) => {
                // The declared name hoists into the enclosing function scope.
                if let Some(name) = &func.name {
                    self.declare(BindingTarget::FunctionScope, &name.name);
                }
                self.visit_function(func);
            }
            Stmt::ClassDecl(class) => {
                if let Some(name) = &class.name {
                    self.declare(BindingTarget::BlockScope, &name.name);
                }
                self.visit_class(class, false);
            }
            Stmt::Expr(stmt) => self.visit_expr(&stmt.expr),
            Stmt::If(stmt) => {
                self.visit_expr(&stmt.test);
                self.visit_stmt(&stmt.consequent);
                if let Some(alternate) = &stmt.alternate {
                    self.visit_stmt(alternate);
                }
            }
            Stmt::For(stmt) => {
                match &stmt.init {
                    Some(ForInit::VarDecl(decl)) => self.visit_var_decl(decl),
                    Some(ForInit::Expr(expr)) => self.visit_expr(expr),
                    None => {}
                }
                if let Some(test) = &stmt.test {
                    self.visit_expr(test);
                }
                if let Some(update) = &stmt.update {
                    self.visit_expr(update);
                }
                self.visit_stmt(&stmt.body);
            }
            Stmt::ForIn(stmt) => {
                self.visit_for_head(&stmt.left);
                self.visit_expr(&stmt.right);
                self.visit_stmt(&stmt.body);
            }
            Stmt::ForOf(stmt) => {
                self.visit_for_head(&stmt.left);
                self.visit_expr(&stmt.right);
                self.visit_stmt(&stmt.body);
            }
            Stmt::While(stmt) => {
                self.visit_expr(&stmt.test);
                self.visit_stmt(&stmt.body);
            }
            Stmt::DoWhile(stmt) => {
                self.visit_stmt(&stmt.body);
                self.visit_expr(&stmt.test);
            }
            Stmt::Switch(stmt) => {
                self.visit_expr(&stmt.discriminant);
                for case in &stmt.cases {
                    if let Some(test) = &case.test {
                        self.visit_expr(test);
                    }
                    for stmt in &case.consequent {
                        self.visit_stmt(stmt);
                    }
                }
            }
            Stmt::Try(stmt) => {
                self.visit_block_scope(&stmt.block);
                if let Some(handler) = &stmt.handler {
                    self.block_scopes.push(HashSet::new());
                    if let Some(param) = &handler.param {
                        self.visit_binding_pattern(param, BindingTarget::BlockScope);
                    }
                    self.visit_block_scope(&handler.body);
                    self.block_scopes.pop();
                }
                if let Some(finalizer) = &stmt.finalizer {
                    self.visit_block_scope(finalizer);
                }
            }
            Stmt::Return(stmt) => {
                if let Some(argument) = &stmt.argument {
                    self.visit_expr(argument);
                }
            }
            Stmt::Throw(stmt) => self.visit_expr(&stmt.argument),
            Stmt::Labeled(stmt) => self.visit_stmt(&stmt.body),
            Stmt::With(stmt) => {
                self.visit_expr(&stmt.object);
                self.visit_stmt(&stmt.body);
            }
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Debugger(_) | Stmt::Empty(_) => {}
        }
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) {
        let target = if decl.kind == VarKind::Var {
            BindingTarget::FunctionScope
        } else {
            BindingTarget::BlockScope
        };
        for declarator in &decl.declarators {
            self.visit_binding_pattern(&declarator.id, target);
            if let Some(init) = &declarator.init {
                self.visit_expr(init);
            }
        }
    }

    fn visit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::VarDecl(decl) => self.visit_var_decl(decl),
            ForHead::Target(expr) => self.visit_expr(expr),
        }
    }

    // ── Classes ───────────────────────────────────────────────────────────

    fn visit_class(&mut self, class: &Class, is_expression: bool) {
        // A class-expression name is visible only inside the class body.
        if is_expression {
            let mut scope = HashSet::new();
            if let Some(name) = &class.name {
                scope.insert(name.name.clone());
            }
            self.block_scopes.push(scope);
        }
        if let Some(super_class) = &class.super_class {
            self.visit_expr(super_class);
        }
        for member in &class.members {
            match member {
                ClassMember::Method(method) => {
                    if let Some(key) = method.key.computed() {
                        self.visit_expr(key);
                    }
                    self.visit_method_value(&method.value);
                }
                ClassMember::Field(field) => {
                    // Computed keys evaluate in the enclosing scope.
                    if let Some(key) = field.key.computed() {
                        self.visit_expr(key);
                    }
                    // Initializers run with the instance as `this`, like a
                    // method body.
                    if let Some(value) = &field.value {
                        self.enter_function(&[], None, false, |w| w.visit_expr(value));
                    }
                }
                ClassMember::StaticBlock(block) => {
                    // Static blocks run with the class as `this` and have no
                    // `arguments` of their own.
                    self.enter_function(&[], None, true, |w| {
                        w.function_vars.insert("this".to_owned());
                        w.block_scopes.push(HashSet::new());
                        for stmt in &block.body {
                            w.visit_stmt(stmt);
                        }
                        w.block_scopes.pop();
                    });
                }
            }
        }
        if is_expression {
            self.block_scopes.pop();
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────

    fn visit_expr(&mut self, expr: &Expr) {
        self.visit_expr_ctx(expr, false);
    }

    /// `as_callee` is set when `expr` is the callee of a call expression, so
    /// member accesses can record the `invoked` bit.
    fn visit_expr_ctx(&mut self, expr: &Expr, as_callee: bool) {
        match expr {
            Expr::Ident(ident) => self.record(&ident.name, Observation::All, false),
            // `this` is treated exactly like a captured identifier; non-arrow
            // functions bind it in their function-var scope.
            Expr::This(_) => self.record("this", Observation::All, false),
            // `super` is never an identifier and produces no capture entry.
            Expr::Super(_) => {}
            Expr::Member(member) => self.visit_member(member, as_callee),
            Expr::Call(call) => self.visit_call(call),
            Expr::New(new) => {
                self.visit_expr(&new.callee);
                for argument in &new.arguments {
                    self.visit_expr(argument);
                }
            }
            Expr::Unary(unary) => {
                // A bare identifier probed with `typeof` is an optional
                // capture, not a required one.
                if unary.op == UnaryOp::Typeof {
                    if let Expr::Ident(ident) = unary.argument.as_ref() {
                        self.record(&ident.name, Observation::All, true);
                        return;
                    }
                }
                self.visit_expr(&unary.argument);
            }
            Expr::Fn(func) => {
                let own_name = func.name.as_ref().map(|n| n.name.clone());
                self.enter_function(&func.params, own_name.as_deref(), false, |w| {
                    w.visit_block_scope(&func.body);
                });
            }
            Expr::Arrow(arrow) => self.visit_arrow(arrow),
            Expr::Class(class) => self.visit_class(class, true),
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        ObjectProp::Prop(prop) => self.visit_object_prop(prop),
                        ObjectProp::Spread(spread) => self.visit_expr(&spread.argument),
                    }
                }
            }
            Expr::Array(array) => {
                for element in array.elements.iter().flatten() {
                    self.visit_expr(element);
                }
            }
            Expr::Update(update) => self.visit_expr(&update.argument),
            Expr::Binary(binary) => {
                self.visit_expr(&binary.left);
                self.visit_expr(&binary.right);
            }
            Expr::Logical(logical) => {
                self.visit_expr(&logical.left);
                self.visit_expr(&logical.right);
            }
            Expr::Conditional(cond) => {
                self.visit_expr(&cond.test);
                self.visit_expr(&cond.consequent);
                self.visit_expr(&cond.alternate);
            }
            Expr::Assign(assign) => {
                self.visit_expr(&assign.left);
                self.visit_expr(&assign.right);
            }
            Expr::Sequence(seq) => {
                for expr in &seq.expressions {
                    self.visit_expr(expr);
                }
            }
            Expr::Spread(spread) => self.visit_expr(&spread.argument),
            Expr::Yield(yield_expr) => {
                if let Some(argument) = &yield_expr.argument {
                    self.visit_expr(argument);
                }
            }
            Expr::Await(await_expr) => self.visit_expr(&await_expr.argument),
            Expr::Template(template) => {
                for expr in &template.expressions {
                    self.visit_expr(expr);
                }
            }
            Expr::TaggedTemplate(tagged) => {
                self.visit_expr(&tagged.tag);
                for expr in &tagged.quasi.expressions {
                    self.visit_expr(expr);
                }
            }
            Expr::ImportCall(import) => {
                self.visit_expr(&import.source);
                if let Some(options) = &import.options {
                    self.visit_expr(options);
                }
            }
            // `new.target` / `import.meta` reference no lexical binding.
            Expr::MetaProp(_) => {}
            Expr::Null(_)
            | Expr::Bool(_)
            | Expr::Num(_)
            | Expr::Str(_)
            | Expr::BigInt(_)
            | Expr::Regexp(_) => {}
        }
    }

    fn visit_member(&mut self, member: &MemberExpr, as_callee: bool) {
        // A named access on a bare identifier (or on `this`) narrows the
        // capture to that property; everything else walks the object
        // normally, which records a capture-all for bare identifiers.
        let object_name = match member.object.as_ref() {
            Expr::Ident(ident) => Some(ident.name.as_str()),
            Expr::This(_) => Some("this"),
            _ => None,
        };
        match (object_name, &member.property) {
            (Some(name), MemberProp::Ident(prop)) => {
                self.record(
                    name,
                    Observation::Property(CapturedProperty {
                        name: prop.name.clone(),
                        invoked: as_callee,
                    }),
                    false,
                );
            }
            _ => self.visit_expr(&member.object),
        }
        // Member names never refer to a lexical binding; only computed
        // member expressions are walked.
        if let MemberProp::Computed(expr) = &member.property {
            self.visit_expr(expr);
        }
    }

    fn visit_call(&mut self, call: &CallExpr) {
        self.visit_expr_ctx(&call.callee, true);
        if let Some(target) = awaiter_function(call) {
            // The wrapper's `this`/`void 0` arguments are lowering
            // artifacts; only the wrapped function is walked, and it is
            // entered as an arrow so a genuine `this` inside it reaches the
            // enclosing function.
            match target {
                Expr::Fn(func) => {
                    self.enter_function(&func.params, None, true, |w| {
                        w.visit_block_scope(&func.body);
                    });
                }
                Expr::Arrow(arrow) => self.visit_arrow(arrow),
                _ => unreachable!("awaiter_function only matches function-like nodes"),
            }
            return;
        }
        for argument in &call.arguments {
            self.visit_expr(argument);
        }
    }

    fn visit_object_prop(&mut self, prop: &Prop) {
        // Computed keys capture variables; literal keys reference nothing.
        if let Some(key) = prop.key.computed() {
            self.visit_expr(key);
        }
        match &prop.value {
            PropValue::Value(value) => self.visit_expr(value),
            PropValue::Shorthand { default } => {
                // `{ x }` reads the variable `x`.
                if let PropKey::Ident(ident) = &prop.key {
                    self.record(&ident.name, Observation::All, false);
                }
                if let Some(default) = default {
                    self.visit_expr(default);
                }
            }
            PropValue::Get(func) | PropValue::Set(func) | PropValue::Method(func) => {
                self.visit_method_value(func);
            }
        }
    }

    // ── Post-processing ───────────────────────────────────────────────────

    /// Apply global filtering and the required/optional merge.
    ///
    /// A key present in both maps keeps only its `required` entry, but the
    /// `optional` property observations are folded into it first; downstream
    /// consumers depend on that fold.
    fn finish(mut self, is_global: &dyn Fn(&str) -> bool) -> CaptureRecord {
        let is_ambient =
            |name: &str| is_global(name) || MODULE_PSEUDO_GLOBALS.contains(&name);

        let mut required = CaptureSet::new();
        for (name, mut slot) in self.required.drain() {
            if is_ambient(&name) {
                self.optional.remove(&name);
                continue;
            }
            if let Some(probed) = self.optional.remove(&name) {
                slot.absorb(probed);
            }
            required.insert(name, slot);
        }

        let mut optional = CaptureSet::new();
        for (name, slot) in self.optional.drain() {
            if is_ambient(&name) {
                continue;
            }
            optional.insert(name, slot);
        }

        CaptureRecord { required, optional }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Non-lexical-this detector
// ─────────────────────────────────────────────────────────────────────────────

/// Returns `true` iff the analyzed function uses a non-lexical `this` (or
/// `super`).
///
/// Arrow functions never do: they inherit `this` lexically, so the walk is
/// skipped entirely.  Otherwise the outermost non-arrow function-like node
/// is a barrier: nested non-arrow functions have their own `this` and are
/// not descended into, while arrows stay transparent.
pub(crate) fn uses_non_lexical_this(program: &Program, is_arrow: bool) -> bool {
    if is_arrow {
        return false;
    }
    let mut detector = ThisDetector {
        in_topmost_function: false,
    };
    program.body.iter().any(|stmt| detector.stmt(stmt))
}

struct ThisDetector {
    in_topmost_function: bool,
}

impl ThisDetector {
    /// Enter a non-arrow function-like node: the outermost one is walked,
    /// nested ones are opaque.
    fn enter(&mut self, func: &Function) -> bool {
        if self.in_topmost_function {
            return false;
        }
        self.in_topmost_function = true;
        let found = func.params.iter().any(|p| self.pat(p))
            || func.body.body.iter().any(|s| self.stmt(s));
        self.in_topmost_function = false;
        found
    }

    /// Class field initializers and static blocks rebind `this`, so like
    /// nested methods they are opaque once inside the analyzed function.
    fn enter_initializer(&mut self, walk: impl FnOnce(&mut Self) -> bool) -> bool {
        if self.in_topmost_function {
            return false;
        }
        self.in_topmost_function = true;
        let found = walk(self);
        self.in_topmost_function = false;
        found
    }

    fn stmt(&mut self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Block(block) => block.body.iter().any(|s| self.stmt(s)),
            Stmt::VarDecl(decl) => decl.declarators.iter().any(|d| {
                self.pat(&d.id) || d.init.as_deref().is_some_and(|init| self.expr(init))
            }),
            Stmt::FnDecl(func) => self.enter(func),
            Stmt::ClassDecl(class) => self.class(class),
            Stmt::Expr(stmt) => self.expr(&stmt.expr),
            Stmt::If(stmt) => {
                self.expr(&stmt.test)
                    || self.stmt(&stmt.consequent)
                    || stmt.alternate.as_deref().is_some_and(|s| self.stmt(s))
            }
            Stmt::For(stmt) => {
                (match &stmt.init {
                    Some(ForInit::VarDecl(decl)) => decl.declarators.iter().any(|d| {
                        self.pat(&d.id) || d.init.as_deref().is_some_and(|init| self.expr(init))
                    }),
                    Some(ForInit::Expr(expr)) => self.expr(expr),
                    None => false,
                }) || stmt.test.as_deref().is_some_and(|e| self.expr(e))
                    || stmt.update.as_deref().is_some_and(|e| self.expr(e))
                    || self.stmt(&stmt.body)
            }
            Stmt::ForIn(stmt) => {
                self.for_head(&stmt.left) || self.expr(&stmt.right) || self.stmt(&stmt.body)
            }
            Stmt::ForOf(stmt) => {
                self.for_head(&stmt.left) || self.expr(&stmt.right) || self.stmt(&stmt.body)
            }
            Stmt::While(stmt) => self.expr(&stmt.test) || self.stmt(&stmt.body),
            Stmt::DoWhile(stmt) => self.stmt(&stmt.body) || self.expr(&stmt.test),
            Stmt::Switch(stmt) => {
                self.expr(&stmt.discriminant)
                    || stmt.cases.iter().any(|case| {
                        case.test.as_ref().is_some_and(|t| self.expr(t))
                            || case.consequent.iter().any(|s| self.stmt(s))
                    })
            }
            Stmt::Try(stmt) => {
                stmt.block.body.iter().any(|s| self.stmt(s))
                    || stmt.handler.as_ref().is_some_and(|handler| {
                        handler.param.as_ref().is_some_and(|p| self.pat(p))
                            || handler.body.body.iter().any(|s| self.stmt(s))
                    })
                    || stmt
                        .finalizer
                        .as_ref()
                        .is_some_and(|block| block.body.iter().any(|s| self.stmt(s)))
            }
            Stmt::Return(stmt) => stmt.argument.as_deref().is_some_and(|e| self.expr(e)),
            Stmt::Throw(stmt) => self.expr(&stmt.argument),
            Stmt::Labeled(stmt) => self.stmt(&stmt.body),
            Stmt::With(stmt) => self.expr(&stmt.object) || self.stmt(&stmt.body),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Debugger(_) | Stmt::Empty(_) => false,
        }
    }

    fn for_head(&mut self, head: &ForHead) -> bool {
        match head {
            ForHead::VarDecl(decl) => decl.declarators.iter().any(|d| {
                self.pat(&d.id) || d.init.as_deref().is_some_and(|init| self.expr(init))
            }),
            ForHead::Target(expr) => self.expr(expr),
        }
    }

    fn pat(&mut self, pat: &Pat) -> bool {
        match pat {
            Pat::Ident(_) => false,
            Pat::Array(array) => array
                .elements
                .iter()
                .flatten()
                .any(|element| self.pat(element)),
            Pat::Object(object) => object.props.iter().any(|prop| match prop {
                ObjectPatProp::KeyValue(kv) => self.pat(&kv.value),
                ObjectPatProp::Shorthand(sh) => {
                    sh.default.as_deref().is_some_and(|d| self.expr(d))
                }
                ObjectPatProp::Rest(rest) => self.pat(&rest.argument),
            }),
            Pat::Rest(rest) => self.pat(&rest.argument),
            Pat::Assign(assign) => self.pat(&assign.left) || self.expr(&assign.right),
        }
    }

    fn expr(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::This(_) | Expr::Super(_) => self.in_topmost_function,
            Expr::Fn(func) => self.enter(func),
            // Arrows are transparent: their `this` is the enclosing one.
            Expr::Arrow(arrow) => {
                arrow.params.iter().any(|p| self.pat(p))
                    || match &arrow.body {
                        ArrowBody::Block(block) => block.body.iter().any(|s| self.stmt(s)),
                        ArrowBody::Expr(expr) => self.expr(expr),
                    }
            }
            Expr::Class(class) => self.class(class),
            Expr::Call(call) => {
                if let Some(target) = awaiter_function(call) {
                    // The `this` argument is a lowering artifact; only the
                    // wrapped function body is inspected, transparently.
                    return match target {
                        Expr::Fn(func) => func.body.body.iter().any(|s| self.stmt(s)),
                        Expr::Arrow(arrow) => match &arrow.body {
                            ArrowBody::Block(block) => block.body.iter().any(|s| self.stmt(s)),
                            ArrowBody::Expr(expr) => self.expr(expr),
                        },
                        _ => false,
                    };
                }
                self.expr(&call.callee) || call.arguments.iter().any(|a| self.expr(a))
            }
            Expr::Member(member) => {
                self.expr(&member.object)
                    || match &member.property {
                        MemberProp::Computed(expr) => self.expr(expr),
                        _ => false,
                    }
            }
            Expr::New(new) => {
                self.expr(&new.callee) || new.arguments.iter().any(|a| self.expr(a))
            }
            Expr::Unary(unary) => self.expr(&unary.argument),
            Expr::Update(update) => self.expr(&update.argument),
            Expr::Binary(binary) => self.expr(&binary.left) || self.expr(&binary.right),
            Expr::Logical(logical) => self.expr(&logical.left) || self.expr(&logical.right),
            Expr::Conditional(cond) => {
                self.expr(&cond.test) || self.expr(&cond.consequent) || self.expr(&cond.alternate)
            }
            Expr::Assign(assign) => self.expr(&assign.left) || self.expr(&assign.right),
            Expr::Sequence(seq) => seq.expressions.iter().any(|e| self.expr(e)),
            Expr::Object(object) => object.props.iter().any(|prop| match prop {
                ObjectProp::Prop(prop) => {
                    prop.key.computed().is_some_and(|k| self.expr(k))
                        || match &prop.value {
                            PropValue::Value(value) => self.expr(value),
                            PropValue::Shorthand { default } => {
                                default.as_deref().is_some_and(|d| self.expr(d))
                            }
                            PropValue::Get(func)
                            | PropValue::Set(func)
                            | PropValue::Method(func) => self.enter(func),
                        }
                }
                ObjectProp::Spread(spread) => self.expr(&spread.argument),
            }),
            Expr::Array(array) => array.elements.iter().flatten().any(|e| self.expr(e)),
            Expr::Spread(spread) => self.expr(&spread.argument),
            Expr::Yield(yield_expr) => {
                yield_expr.argument.as_deref().is_some_and(|e| self.expr(e))
            }
            Expr::Await(await_expr) => self.expr(&await_expr.argument),
            Expr::Template(template) => template.expressions.iter().any(|e| self.expr(e)),
            Expr::TaggedTemplate(tagged) => {
                self.expr(&tagged.tag) || tagged.quasi.expressions.iter().any(|e| self.expr(e))
            }
            Expr::ImportCall(import) => {
                self.expr(&import.source)
                    || import.options.as_deref().is_some_and(|o| self.expr(o))
            }
            Expr::MetaProp(_)
            | Expr::Ident(_)
            | Expr::Null(_)
            | Expr::Bool(_)
            | Expr::Num(_)
            | Expr::Str(_)
            | Expr::BigInt(_)
            | Expr::Regexp(_) => false,
        }
    }

    fn class(&mut self, class: &Class) -> bool {
        class
            .super_class
            .as_deref()
            .is_some_and(|sc| self.expr(sc))
            || class.members.iter().any(|member| match member {
                ClassMember::Method(method) => {
                    method.key.computed().is_some_and(|k| self.expr(k)) || self.enter(&method.value)
                }
                ClassMember::Field(field) => {
                    field.key.computed().is_some_and(|k| self.expr(k))
                        || self.enter_initializer(|d| {
                            field.value.as_deref().is_some_and(|v| d.expr(v))
                        })
                }
                ClassMember::StaticBlock(block) => {
                    self.enter_initializer(|d| block.body.iter().any(|s| d.stmt(s)))
                }
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parser::parse;

    fn no_globals(_: &str) -> bool {
        false
    }

    fn captures(source: &str) -> CaptureRecord {
        let program = parse(&format!("({source})"))
            .unwrap_or_else(|e| panic!("parse failed for {source:?}: {e}"));
        compute_captures(&program, &no_globals)
    }

    fn required_names(record: &CaptureRecord) -> Vec<&str> {
        record.required.keys().map(String::as_str).collect()
    }

    fn props(slot: &CaptureSlot) -> &[CapturedProperty] {
        match slot {
            CaptureSlot::Properties(list) => list,
            CaptureSlot::All => panic!("expected property capture, got All"),
        }
    }

    // ── Basic shadowing ───────────────────────────────────────────────────

    #[test]
    fn test_parameter_is_not_captured() {
        let record = captures("function (x) { return x + y; }");
        assert_eq!(required_names(&record), vec!["y"]);
    }

    #[test]
    fn test_var_is_not_captured_even_before_declaration() {
        let record = captures("function () { f(x); var x; }");
        assert_eq!(required_names(&record), vec!["f"]);
    }

    #[test]
    fn test_let_in_block_shadows_only_inside() {
        // The `y` reference after the block refers to an outer binding.
        let record = captures("function () { { let y = 1; use(y); } return y; }");
        assert!(record.required.contains_key("y"));
    }

    #[test]
    fn test_function_declaration_name_hoists() {
        let record = captures("function () { helper(); function helper() {} }");
        assert!(record.required.is_empty());
    }

    #[test]
    fn test_named_function_expression_self_reference() {
        let record = captures("function () { return function again(n) { return again(n); }; }");
        assert!(record.required.is_empty());
    }

    #[test]
    fn test_catch_parameter_is_scoped() {
        let record = captures("function () { try { f(); } catch (e) { g(e); } return e; }");
        // `e` escapes the catch clause and is free afterwards.
        assert!(record.required.contains_key("e"));
        assert!(record.required.contains_key("f"));
        assert!(record.required.contains_key("g"));
    }

    #[test]
    fn test_class_declaration_name_is_bound() {
        let record = captures("function () { class C {} return new C(); }");
        assert!(record.required.is_empty());
    }

    #[test]
    fn test_class_field_initializer_rebinds_this() {
        let record = captures("function () { const obj = {}; class C { x = this; } return obj; }");
        assert!(!record.required.contains_key("this"));
    }

    #[test]
    fn test_arrow_with_class_field_this_is_not_a_capture() {
        // The field's `this` is the instance, not the arrow's lexical `this`.
        let record = captures("x => class { y = this.z; }");
        assert!(!record.required.contains_key("this"));
    }

    #[test]
    fn test_class_field_initializer_captures_propagate() {
        let record = captures("function () { class C { x = outside; } }");
        assert_eq!(record.required["outside"], CaptureSlot::All);
    }

    #[test]
    fn test_static_block_rebinds_this_but_still_captures() {
        let record = captures("function () { class C { static { init(this); } } }");
        assert!(record.required.contains_key("init"));
        assert!(!record.required.contains_key("this"));
    }

    // ── Property narrowing ────────────────────────────────────────────────

    #[test]
    fn test_property_access_narrows_capture() {
        let record = captures("function () { return cfg.region; }");
        let slot = &record.required["cfg"];
        assert_eq!(
            props(slot),
            &[CapturedProperty {
                name: "region".to_owned(),
                invoked: false,
            }]
        );
    }

    #[test]
    fn test_invoked_property() {
        let record = captures("function () { return client.send(m); }");
        let slot = &record.required["client"];
        assert_eq!(
            props(slot),
            &[CapturedProperty {
                name: "send".to_owned(),
                invoked: true,
            }]
        );
    }

    #[test]
    fn test_invoked_merges_with_read() {
        let record = captures("function () { f(client.send); return client.send(m); }");
        let slot = &record.required["client"];
        assert_eq!(props(slot).len(), 1);
        assert!(props(slot)[0].invoked);
    }

    #[test]
    fn test_bare_use_absorbs_property_narrowing() {
        let record = captures("function () { g(cfg.region); return cfg; }");
        assert_eq!(record.required["cfg"], CaptureSlot::All);
    }

    #[test]
    fn test_computed_member_is_capture_all() {
        let record = captures("function () { return table[key]; }");
        assert_eq!(record.required["table"], CaptureSlot::All);
        assert_eq!(record.required["key"], CaptureSlot::All);
    }

    #[test]
    fn test_deep_chain_narrows_only_head() {
        let record = captures("function () { return a.b.c(); }");
        let slot = &record.required["a"];
        // Only the head access `a.b` is recorded; `.c` belongs to the
        // intermediate value, and the head access is not itself the callee.
        assert_eq!(
            props(slot),
            &[CapturedProperty {
                name: "b".to_owned(),
                invoked: false,
            }]
        );
    }

    // ── typeof / optional ─────────────────────────────────────────────────

    #[test]
    fn test_typeof_is_optional() {
        let record = captures("function () { return typeof maybe; }");
        assert!(record.required.is_empty());
        assert_eq!(record.optional["maybe"], CaptureSlot::All);
    }

    #[test]
    fn test_required_wins_over_optional() {
        let record = captures("function () { f(typeof x); return x.y; }");
        assert!(record.required.contains_key("x"));
        assert!(!record.optional.contains_key("x"));
        // The optional capture-all observation is folded into the required
        // entry, absorbing the property narrowing.
        assert_eq!(record.required["x"], CaptureSlot::All);
    }

    #[test]
    fn test_typeof_of_member_is_required() {
        let record = captures("function () { return typeof obj.kind; }");
        assert!(record.required.contains_key("obj"));
        assert!(record.optional.is_empty());
    }

    // ── this ──────────────────────────────────────────────────────────────

    #[test]
    fn test_this_bound_by_non_arrow_function() {
        let record = captures("function () { return this.x; }");
        assert!(!record.required.contains_key("this"));
    }

    #[test]
    fn test_arrow_captures_this() {
        let record = captures("() => this.foo");
        let slot = &record.required["this"];
        assert_eq!(
            props(slot),
            &[CapturedProperty {
                name: "foo".to_owned(),
                invoked: false,
            }]
        );
    }

    #[test]
    fn test_arrow_inside_function_reaches_enclosing_this() {
        // The arrow's `this` is the enclosing function's, which binds it.
        let record = captures("function () { return () => this.x; }");
        assert!(!record.required.contains_key("this"));
    }

    // ── Destructuring ─────────────────────────────────────────────────────

    #[test]
    fn test_destructured_param_with_default() {
        let record = captures("({ x: y = z } = w) => y");
        assert_eq!(record.required["z"], CaptureSlot::All);
        assert_eq!(record.required["w"], CaptureSlot::All);
        assert!(!record.required.contains_key("y"));
        assert!(!record.required.contains_key("x"));
    }

    #[test]
    fn test_destructuring_declaration_binds_names() {
        let record = captures("function () { const { a, b: c, ...rest } = src; f(a, c, rest); }");
        assert_eq!(required_names(&record), vec!["f", "src"]);
    }

    #[test]
    fn test_object_literal_keys_are_not_references() {
        let record = captures("function () { return { a: 1, b: x, [k]: 2, c }; }");
        assert_eq!(required_names(&record), vec!["c", "k", "x"]);
    }

    // ── Async wrapper ─────────────────────────────────────────────────────

    #[test]
    fn test_awaiter_spurious_this_not_captured() {
        let record = captures(
            "function () { return __awaiter(this, void 0, void 0, function* () { return a; }); }",
        );
        assert_eq!(record.required["a"], CaptureSlot::All);
        assert!(!record.required.contains_key("this"));
        // The helper itself is a visited callee.
        assert!(record.required.contains_key("__awaiter"));
    }

    #[test]
    fn test_awaiter_body_this_reaches_enclosing_function() {
        // The wrapped generator is entered as an arrow, so its `this` is the
        // enclosing function's and is bound there.
        let record = captures(
            "function () { return __awaiter(this, void 0, void 0, function* () { return this.x; }); }",
        );
        assert!(!record.required.contains_key("this"));
    }

    #[test]
    fn test_non_awaiter_call_walks_arguments() {
        let record = captures("function () { return other(this, void 0, void 0, x); }");
        assert!(record.required.contains_key("other"));
        assert!(record.required.contains_key("x"));
    }

    // ── Sibling isolation / merging ───────────────────────────────────────

    #[test]
    fn test_sibling_functions_do_not_share_scopes() {
        let record =
            captures("function () { function a() { var v; } function b() { return v; } }");
        // `v` is local to `a`; the reference in `b` is free.
        assert!(record.required.contains_key("v"));
    }

    #[test]
    fn test_outer_function_vars_bind_inner_references() {
        let record = captures("function () { var shared; return function () { return shared; }; }");
        assert!(record.required.is_empty());
    }

    // ── Global filtering ──────────────────────────────────────────────────

    #[test]
    fn test_global_predicate_filters() {
        let program = parse("(function () { console.log(x); })").unwrap();
        let record = compute_captures(&program, &|name| name == "console");
        assert_eq!(required_names(&record), vec!["x"]);
    }

    #[test]
    fn test_module_pseudo_globals_filtered() {
        let record = captures("function () { return require(module.id + __dirname); }");
        assert!(record.required.is_empty());
    }

    // ── Non-lexical this detector ─────────────────────────────────────────

    fn detect(source: &str, is_arrow: bool) -> bool {
        let program = parse(&format!("({source})")).unwrap();
        uses_non_lexical_this(&program, is_arrow)
    }

    #[test]
    fn test_detector_arrow_short_circuits() {
        assert!(!detect("() => this.x", true));
    }

    #[test]
    fn test_detector_plain_this() {
        assert!(detect("function () { return this.x; }", false));
    }

    #[test]
    fn test_detector_super_counts() {
        assert!(detect("function () { super(); }", false));
    }

    #[test]
    fn test_detector_ignores_nested_function_this() {
        assert!(!detect(
            "function () { return function () { return this.x; }; }",
            false
        ));
    }

    #[test]
    fn test_detector_sees_through_arrows() {
        assert!(detect("function () { return () => this.x; }", false));
    }

    #[test]
    fn test_detector_awaiter_spurious_this_ignored() {
        assert!(!detect(
            "function () { return __awaiter(this, void 0, void 0, function* () { return a; }); }",
            false
        ));
    }

    #[test]
    fn test_detector_awaiter_genuine_this_counts() {
        assert!(detect(
            "function () { return __awaiter(this, void 0, void 0, function* () { return this.x; }); }",
            false
        ));
    }

    #[test]
    fn test_detector_ignores_class_field_this() {
        assert!(!detect("function () { class C { x = this; } }", false));
    }

    #[test]
    fn test_detector_ignores_static_block_this() {
        assert!(!detect("function () { class C { static { use(this); } } }", false));
    }

    #[test]
    fn test_detector_counts_computed_key_this() {
        // Computed member keys evaluate in the enclosing scope.
        assert!(detect("function () { class C { [this.k]() {} } }", false));
    }

    #[test]
    fn test_detector_no_this_at_all() {
        assert!(!detect("function () { return a + b; }", false));
    }
}
