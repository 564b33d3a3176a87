// ============================================================================
// spark-bind - Directive Compiler
// One walk over a UI subtree, producing binding records
// ============================================================================
//
// Elements are visited in document order. A list directive turns its element
// into a template: the markup is captured, the element leaves the tree and
// an empty anchor text node keeps its place. Everything below a template is
// compiled later, once per clone. Text nodes are scanned last so template
// bodies (already detached) are never seen at this level.
// ============================================================================

use std::cell::{Cell, RefCell};

use tracing::{debug, warn};

use crate::core::constants::*;
use crate::core::error::{BindError, Result};
use crate::dom::markup::normalize;
use crate::dom::{DomId, EventKind, UiTree};
use crate::expression::{
    parse_class_condition, parse_loop, Classifier, DirectiveKind, ExprType,
};

use super::record::{
    Binding, BindingRecord, ConditionKind, ConditionSource, InterpPart, ListSource, RecordId,
    SetterKind, TemplateBinding,
};
use super::state::EngineState;

/// Compile pass over one subtree.
pub struct Compiler<'a, T: UiTree + ?Sized> {
    state: &'a EngineState,
    tree: &'a mut T,
    classifier: Classifier,
    owner: Option<RecordId>,
    added: usize,
}

impl<'a, T: UiTree + ?Sized> Compiler<'a, T> {
    pub(crate) fn new(state: &'a EngineState, tree: &'a mut T, owner: Option<RecordId>) -> Self {
        Self {
            classifier: state.classifier(),
            state,
            tree,
            owner,
            added: 0,
        }
    }

    /// Compile `root` and its subtree. Returns the number of records added.
    ///
    /// Only a list directive without a loop variable aborts compilation;
    /// any other invalid directive is reported and skipped.
    pub fn compile(mut self, root: DomId) -> Result<usize> {
        let prefix = self.state.config.prefix.clone();
        let for_attr = self.state.config.directive(DIR_FOR);
        let mut templates: Vec<DomId> = Vec::new();

        for el in self.tree.query_prefix(root, &prefix) {
            if templates.iter().any(|&t| t != el && self.tree.contains(t, el)) {
                continue;
            }
            if let Some(expr) = self.tree.attribute(el, &for_attr) {
                templates.push(el);
                self.compile_template(el, &expr)?;
                continue;
            }
            for suffix in DIRECTIVES.iter().filter(|s| **s != DIR_FOR) {
                let name = self.state.config.directive(suffix);
                let Some(expr) = self.tree.attribute(el, &name) else {
                    continue;
                };
                let Some(kind) = DirectiveKind::from_suffix(suffix) else {
                    continue;
                };
                if let Err(err) = self.compile_directive(el, kind, &expr) {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    self.state.report(err);
                }
            }
        }

        for text in self.tree.text_nodes(root) {
            self.compile_text(text);
        }

        debug!(
            target: "spark_bind::compile",
            root = %root,
            owner = ?self.owner,
            records = self.added,
            "compiled"
        );
        Ok(self.added)
    }

    fn push(&mut self, node: DomId, expression: &str, binding: Binding) -> RecordId {
        let parent = self.tree.parent(node);
        let mut registry = self.state.registry.borrow_mut();
        let id = registry.next_id();
        registry.append(BindingRecord::new(id, self.owner, node, parent, expression, binding));
        self.added += 1;
        id
    }

    // =========================================================================
    // LIST TEMPLATES
    // =========================================================================

    fn compile_template(&mut self, el: DomId, expr: &str) -> Result<()> {
        let (var, source_text) = match parse_loop(expr) {
            Ok(parts) => parts,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                self.state.report(err);
                return Ok(());
            }
        };
        let source = match self.classifier.classify(&source_text, DirectiveKind::List) {
            Ok(ExprType::RootPath(path)) => ListSource::Root(path),
            Ok(ExprType::ComputedRef(name)) => ListSource::Computed(name),
            Ok(ExprType::ObjectPath(path)) => ListSource::Object(path),
            Ok(other) => {
                self.state.report(BindError::invalid(
                    DIR_FOR,
                    expr,
                    format!("unsupported list source {:?}", other),
                ));
                return Ok(());
            }
            Err(err) => {
                self.state.report(err);
                return Ok(());
            }
        };
        let Some(parent) = self.tree.parent(el) else {
            self.state
                .report(BindError::invalid(DIR_FOR, expr, "a list template needs a parent element"));
            return Ok(());
        };

        let for_attr = self.state.config.directive(DIR_FOR);
        let tag = self.tree.tag(el).unwrap_or_else(|| "div".to_string());
        let markup = normalize(&self.tree.inner_markup(el));
        let attrs = self
            .tree
            .attributes(el)
            .into_iter()
            .filter(|(name, _)| *name != for_attr)
            .collect();

        let anchor = self.tree.create_text("");
        self.tree.insert_before(parent, anchor, Some(el));
        self.tree.remove(el);

        // Object sources only make sense inside a clone of an outer template
        if let ListSource::Object(path) = &source {
            let scoped = self
                .state
                .linkage
                .borrow()
                .nearest_scope(&*self.tree, anchor, path.head())
                .is_some();
            if !scoped {
                self.state.report(BindError::invalid(
                    DIR_FOR,
                    expr,
                    "object source outside any enclosing list item",
                ));
                return Ok(());
            }
        }

        self.push(
            anchor,
            expr,
            Binding::Template(TemplateBinding {
                var,
                source,
                tag,
                markup,
                attrs,
                anchor,
                clones: RefCell::new(Vec::new()),
            }),
        );
        Ok(())
    }

    // =========================================================================
    // ATTRIBUTE DIRECTIVES
    // =========================================================================

    fn compile_directive(&mut self, el: DomId, kind: DirectiveKind, expr: &str) -> Result<()> {
        match kind {
            DirectiveKind::Bind => {
                let target = self.classifier.classify(expr, kind)?;
                self.check_loop_variable(el, &target);
                let handler = self
                    .tree
                    .attribute(el, &self.state.config.directive(DIR_BIND_HANDLER))
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty());
                let id = self.push(el, expr, Binding::Model { target: target.clone(), handler });
                self.link(id, el, &target);
            }
            DirectiveKind::Class | DirectiveKind::Src | DirectiveKind::Href => {
                let target = self.classifier.classify(expr, kind)?;
                let setter = match kind {
                    DirectiveKind::Class => SetterKind::Class,
                    DirectiveKind::Src => SetterKind::Src,
                    _ => SetterKind::Href,
                };
                let id = self.push(
                    el,
                    expr,
                    Binding::Setter {
                        kind: setter,
                        target: target.clone(),
                    },
                );
                self.link(id, el, &target);
            }
            DirectiveKind::Click => {
                let ExprType::Handler(call) = self.classifier.classify(expr, kind)? else {
                    return Err(BindError::invalid(DIR_CLICK, expr, "expected a handler call"));
                };
                self.tree.listen(el, EventKind::Click);
                self.push(el, expr, Binding::Handler { call });
            }
            DirectiveKind::Hide | DirectiveKind::Show | DirectiveKind::If | DirectiveKind::ClassIf => {
                let (condition_kind, condition) = match kind {
                    DirectiveKind::Hide => (ConditionKind::Hide, expr.to_string()),
                    DirectiveKind::Show => (ConditionKind::Show, expr.to_string()),
                    DirectiveKind::If => (ConditionKind::If, expr.to_string()),
                    _ => {
                        let (classes, condition) = parse_class_condition(expr)?;
                        (ConditionKind::ClassIf(classes), condition)
                    }
                };
                let source = match self.classifier.classify(&condition, kind)? {
                    ExprType::ComputedRef(name) => ConditionSource::Computed(name),
                    ExprType::RootExpr(e) => ConditionSource::Synthesized(self.state.synthesize(e)),
                    ExprType::ObjectExpr(e) => ConditionSource::Object(e),
                    other => {
                        return Err(BindError::invalid(
                            kind.name(),
                            expr,
                            format!("unexpected classification {:?}", other),
                        ));
                    }
                };
                self.push(
                    el,
                    expr,
                    Binding::Conditional {
                        kind: condition_kind,
                        source,
                        anchor: Cell::new(None),
                    },
                );
            }
            DirectiveKind::List | DirectiveKind::Interpolation => {}
        }
        Ok(())
    }

    /// Cache the bound object and key of a bind/setter record.
    fn link(&mut self, id: RecordId, el: DomId, target: &ExprType) {
        if let Some(slot) = self.state.resolve_slot(&*self.tree, el, target) {
            self.state.linkage.borrow_mut().set_link(id, slot);
        }
    }

    /// Inside a clone, a two-way binding should address the loop variable.
    fn check_loop_variable(&self, el: DomId, target: &ExprType) {
        let ExprType::ObjectPath(path) = target else {
            return;
        };
        if self.owner.is_none() {
            return;
        }
        let linkage = self.state.linkage.borrow();
        if let Some(scope) = linkage.nearest_scope(&*self.tree, el, None) {
            if path.head() != Some(scope.var.as_str()) {
                warn!(
                    target: "spark_bind::compile",
                    expected = %scope.var,
                    path = %path,
                    "two-way binding does not use the loop variable"
                );
            }
        }
    }

    // =========================================================================
    // TEXT INTERPOLATION
    // =========================================================================

    fn compile_text(&mut self, node: DomId) {
        let template = self.tree.text(node);
        if !template.contains(INTERP_OPEN) {
            return;
        }
        let mut parts = Vec::new();
        for (placeholder, inner) in placeholders(&template) {
            match self.classifier.classify(inner, DirectiveKind::Interpolation) {
                Ok(expr) => parts.push(InterpPart {
                    placeholder: placeholder.to_string(),
                    expr,
                }),
                Err(err) => self.state.report(err),
            }
        }
        if parts.is_empty() {
            return;
        }
        self.push(node, &template, Binding::Interpolation { template: template.clone(), parts });
    }
}

/// `{{ expr }}` occurrences as (placeholder, trimmed expression).
pub fn placeholders(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = text;
    let mut offset = 0;
    while let Some(open) = rest.find(INTERP_OPEN) {
        let after = open + INTERP_OPEN.len();
        let Some(close) = rest[after..].find(INTERP_CLOSE) else {
            break;
        };
        let end = after + close + INTERP_CLOSE.len();
        out.push((
            &text[offset + open..offset + end],
            text[offset + after..offset + after + close].trim(),
        ));
        offset += end;
        rest = &text[offset..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_every_placeholder() {
        assert_eq!(
            placeholders("Hello {{root.user.name}}, #{{ index }}!"),
            vec![("{{root.user.name}}", "root.user.name"), ("{{ index }}", "index")]
        );
        assert_eq!(placeholders("{{a}}{{b}}"), vec![("{{a}}", "a"), ("{{b}}", "b")]);
        assert!(placeholders("no braces").is_empty());
        assert!(placeholders("open {{ only").is_empty());
    }
}
