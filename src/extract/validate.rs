//! Path extraction: raw closure text -> PathSpec or one rejection.
//!
//! Rules are applied in a fixed order and the first violation wins:
//! 1) the path text must be an inline closure
//! 2) every step from the terminal member back to the root is a plain
//!    field/property read (no method calls, calls, or indexing)
//! 3) the chain is rooted at the closure parameter
//!
//! Only then is the chain resolved against the type catalog.

use crate::diagnostics::{Location, Reason, Rejection};
use crate::extract::syntax::{self, Expr, Span};
use crate::spec::{Link, PathSpec, TypeCatalog, TypeRef};

use serde::Serialize;

/// A path specification as written by its author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPath {
    pub root_type: String,
    /// Declaring scope; `None` is the global dispatch scope.
    pub scope: Option<String>,
    pub text: String,
    /// Position of the first character of `text`.
    pub location: Location,
}

impl RawPath {
    pub fn new(root_type: &str, text: &str) -> Self {
        Self {
            root_type: root_type.to_string(),
            scope: None,
            text: text.to_string(),
            location: Location::new(0, 1),
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Location of the byte offset `span` within `text`.
    fn locate(&self, span: Span) -> Location {
        let end = span.min(self.text.len());
        let chars = self
            .text
            .get(..end)
            .map(|s| s.chars().count())
            .unwrap_or(end);
        Location::new(self.location.line, self.location.column + chars)
    }

    fn reject(&self, reason: Reason, span: Span, detail: impl Into<String>) -> Verdict {
        Verdict::Rejected(Rejection::new(reason, self.locate(span), detail))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Valid(PathSpec),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid(_))
    }

    pub fn into_result(self) -> Result<PathSpec, Rejection> {
        match self {
            Verdict::Valid(p) => Ok(p),
            Verdict::Rejected(r) => Err(r),
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Valid(_) => None,
            Verdict::Rejected(r) => Some(r),
        }
    }
}

/// Extract and validate one path specification. Pure: no shared state.
pub fn extract(raw: &RawPath, catalog: &TypeCatalog) -> Verdict {
    let expr = match syntax::parse(&raw.text) {
        Ok(e) => e,
        Err(err) => return raw.reject(Reason::Malformed, err.offset, err.message),
    };

    // 1) Inline closure.
    let Expr::Closure {
        param,
        param_type,
        body,
        ..
    } = &expr
    else {
        return raw.reject(
            Reason::NotInline,
            expr.span(),
            format!("`{}` is not an inline closure", expr),
        );
    };

    // 2) Strip field links from the terminal member backward.
    let mut members: Vec<(&str, Span)> = Vec::new();
    let mut cur: &Expr = body;
    loop {
        match cur {
            Expr::Field { base, name, span } => {
                members.push((name, *span));
                cur = base;
            }
            Expr::MethodCall { name, span, .. } => {
                return raw.reject(
                    Reason::OnlyFieldOrPropertyAllowed,
                    *span,
                    format!("method call `{}()`", name),
                );
            }
            Expr::Call { callee, span, .. } => {
                return raw.reject(
                    Reason::OnlyFieldOrPropertyAllowed,
                    *span,
                    format!("call of `{}`", callee),
                );
            }
            Expr::Index { base, span, .. } => {
                return raw.reject(
                    Reason::OnlyFieldOrPropertyAllowed,
                    *span,
                    format!("index access on `{}`", base),
                );
            }
            Expr::Closure { .. } | Expr::Ident { .. } | Expr::Literal { .. } => break,
        }
    }
    members.reverse();

    // 3) Rooted at the parameter.
    match cur {
        Expr::Ident { name, .. } if name == param => {}
        other => {
            return raw.reject(
                Reason::ParameterUnused,
                other.span(),
                format!("path is rooted at `{}`, not at `{}`", other, param),
            );
        }
    }

    if members.is_empty() {
        return raw.reject(
            Reason::EmptyPath,
            body.span(),
            format!("`{}` reads no member", body),
        );
    }

    if let Some(annotated) = param_type
        && annotated != &raw.root_type
    {
        return raw.reject(
            Reason::ParameterTypeMismatch,
            expr.span(),
            format!(
                "parameter is annotated `{}` but the root type is `{}`",
                annotated, raw.root_type
            ),
        );
    }

    let root_type = TypeRef::new(&raw.root_type);
    if !catalog.knows(&root_type) {
        return raw.reject(
            Reason::UnknownType,
            expr.span(),
            format!("unknown root type `{}`", root_type),
        );
    }

    // Resolve links against the catalog.
    let mut links = Vec::with_capacity(members.len());
    let mut input = root_type.clone();
    for (name, span) in members {
        let Some(member) = catalog.member(&input, name) else {
            return raw.reject(
                Reason::UnknownMember,
                span,
                format!("`{}` has no member `{}`", input, name),
            );
        };
        if !member.kind.is_readable_link() {
            return raw.reject(
                Reason::OnlyFieldOrPropertyAllowed,
                span,
                format!("`{}.{}` is a {:?}", input, name, member.kind),
            );
        }
        links.push(Link {
            name: member.name.clone(),
            input_type: input.clone(),
            output_type: member.ty.clone(),
            kind: member.kind,
            visibility: member.visibility,
            settable: member.settable,
        });
        input = member.ty.clone();
    }

    Verdict::Valid(PathSpec::new(
        expr.to_string(),
        param.clone(),
        root_type,
        links,
    ))
}
