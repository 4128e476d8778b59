//! Path expression syntax: a small closure-shaped expression language.
//!
//! ```text
//! expr    := closure | chain
//! closure := "move"? "|" IDENT (":" IDENT)? "|" expr
//! chain   := primary postfix*
//! primary := IDENT | NUMBER | STRING | "(" expr ")"
//! postfix := "." IDENT | "." NUMBER | "." IDENT "(" args ")"
//!          | "(" args ")" | "[" expr "]"
//! ```
//!
//! The parser accepts more than a valid path (calls, indexing, captured
//! variables) so that the validator can say precisely what is wrong instead
//! of failing with a generic parse error.

use chumsky::{error::RichPattern, input::ValueInput, prelude::*};
use std::fmt;

/// Byte offset of a node's first character in the source text.
pub type Span = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Closure {
        param: String,
        param_type: Option<String>,
        body: Box<Expr>,
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    Literal {
        text: String,
        span: Span,
    },
    Field {
        base: Box<Expr>,
        name: String,
        span: Span,
    },
    MethodCall {
        base: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Closure { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Literal { span, .. }
            | Expr::Field { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. } => *span,
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Closure {
                param,
                param_type,
                body,
                ..
            } => match param_type {
                Some(t) => write!(f, "|{}: {}| {}", param, t, body),
                None => write!(f, "|{}| {}", param, body),
            },
            Expr::Ident { name, .. } => f.write_str(name),
            Expr::Literal { text, .. } => f.write_str(text),
            Expr::Field { base, name, .. } => write!(f, "{}.{}", base, name),
            Expr::MethodCall {
                base, name, args, ..
            } => {
                write!(f, "{}.{}(", base, name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            Expr::Call { callee, args, .. } => {
                write!(f, "{}(", callee)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            Expr::Index { base, index, .. } => write!(f, "{}[{}]", base, index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'src> {
    Ident(&'src str),
    Number(&'src str),
    Str(&'src str),
    Pipe,
    Colon,
    Dot,
    Comma,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) | Token::Number(s) => write!(f, "`{}`", s),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Pipe => f.write_str("`|`"),
            Token::Colon => f.write_str("`:`"),
            Token::Dot => f.write_str("`.`"),
            Token::Comma => f.write_str("`,`"),
            Token::ParenOpen => f.write_str("`(`"),
            Token::ParenClose => f.write_str("`)`"),
            Token::BracketOpen => f.write_str("`[`"),
            Token::BracketClose => f.write_str("`]`"),
        }
    }
}

fn start(span: SimpleSpan) -> Span {
    span.into_range().start
}

fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let punctuation = choice((
        just('|').to(Token::Pipe),
        just(':').to(Token::Colon),
        just('.').to(Token::Dot),
        just(',').to(Token::Comma),
        just('(').to(Token::ParenOpen),
        just(')').to(Token::ParenClose),
        just('[').to(Token::BracketOpen),
        just(']').to(Token::BracketClose),
    ));

    let string = just('"')
        .ignore_then(none_of('"').repeated().to_slice())
        .then_ignore(just('"'))
        .map(Token::Str);

    let number = any()
        .filter(char::is_ascii_digit)
        .then(
            any()
                .filter(|c: &char| c.is_ascii_digit() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(Token::Number);

    let ident = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(Token::Ident);

    choice((punctuation, string, number, ident))
        .map_with(|token, extra| (token, extra.span()))
        .padded()
        .repeated()
        .collect()
}

/// One postfix step of a chain, applied left to right onto its base.
enum Postfix {
    Member {
        name: String,
        args: Option<Vec<Expr>>,
        span: Span,
    },
    Call {
        args: Vec<Expr>,
        span: Span,
    },
    Index {
        index: Expr,
        span: Span,
    },
}

impl Postfix {
    fn apply(self, base: Expr) -> Expr {
        let base = Box::new(base);
        match self {
            Postfix::Member {
                name,
                args: Some(args),
                span,
            } => Expr::MethodCall {
                base,
                name,
                args,
                span,
            },
            Postfix::Member {
                name,
                args: None,
                span,
            } => Expr::Field { base, name, span },
            Postfix::Call { args, span } => Expr::Call {
                callee: base,
                args,
                span,
            },
            Postfix::Index { index, span } => Expr::Index {
                base,
                index: Box::new(index),
                span,
            },
        }
    }
}

fn parser<'src, I>() -> impl Parser<'src, I, Expr, extra::Err<Rich<'src, Token<'src>>>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = SimpleSpan>,
{
    recursive(|expr| {
        let ident = select! { Token::Ident(name) => name.to_string() };

        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let closure = just(Token::Ident("move"))
            .or_not()
            .ignore_then(just(Token::Pipe))
            .ignore_then(ident.clone())
            .then(just(Token::Colon).ignore_then(ident.clone()).or_not())
            .then_ignore(just(Token::Pipe))
            .then(expr.clone())
            .map_with(|((param, param_type), body), extra| Expr::Closure {
                param,
                param_type,
                body: Box::new(body),
                span: start(extra.span()),
            });

        let literal = select! {
            Token::Number(text) => text.to_string(),
            Token::Str(text) => format!("{:?}", text),
        }
        .map_with(|text, extra| Expr::Literal {
            text,
            span: start(extra.span()),
        });

        let primary = choice((
            ident.clone().map_with(|name, extra| Expr::Ident {
                name,
                span: start(extra.span()),
            }),
            literal,
            expr.clone()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        ));

        // Tuple fields (`p.0`) lex as numbers.
        let member = just(Token::Dot)
            .ignore_then(
                select! { Token::Ident(name) => name, Token::Number(name) => name }
                    .map_with(|name, extra| (name.to_string(), start(extra.span()))),
            )
            .then(args.clone().or_not())
            .map(|((name, span), args)| Postfix::Member { name, args, span });

        let call = args.clone().map_with(|args, extra| Postfix::Call {
            args,
            span: start(extra.span()),
        });

        let index = just(Token::BracketOpen)
            .map_with(|_, extra| start(extra.span()))
            .then(expr.clone())
            .then_ignore(just(Token::BracketClose))
            .map(|(span, index)| Postfix::Index { index, span });

        let chain = primary.foldl(choice((member, call, index)).repeated(), |base, step| {
            step.apply(base)
        });

        choice((closure, chain))
    })
}

fn lex_error(errors: Vec<Rich<'_, char>>) -> ParseError {
    match errors.into_iter().next() {
        Some(err) => {
            let message = match err.found() {
                Some(c) => format!("unexpected character {:?}", c),
                None => "unterminated string literal".to_string(),
            };
            ParseError::new(message, start(*err.span()))
        }
        None => ParseError::new("malformed expression", 0),
    }
}

fn syntax_error(errors: Vec<Rich<'_, Token<'_>>>) -> ParseError {
    let Some(err) = errors.into_iter().next() else {
        return ParseError::new("malformed expression", 0);
    };
    let found = match err.found() {
        Some(token) => token.to_string(),
        None => "end of input".to_string(),
    };
    let mut expected: Vec<String> = err
        .expected()
        .filter_map(|pattern| match pattern {
            RichPattern::Token(token) => Some((**token).to_string()),
            RichPattern::EndOfInput => Some("end of input".to_string()),
            _ => None,
        })
        .collect();
    expected.dedup();

    let message = if expected.is_empty() {
        format!("unexpected {}", found)
    } else {
        format!("expected {}, found {}", expected.join(" or "), found)
    };
    ParseError::new(message, start(*err.span()))
}

/// Parse a complete path expression.
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = lexer().parse(src).into_result().map_err(lex_error)?;
    let eoi: SimpleSpan = (src.len()..src.len()).into();
    parser()
        .parse(tokens.as_slice().map(eoi, |(token, span)| (token, span)))
        .into_result()
        .map_err(syntax_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_closure() {
        let e = parse("|h| h.child.value").unwrap();
        match &e {
            Expr::Closure {
                param,
                param_type,
                body,
                span,
            } => {
                assert_eq!(param, "h");
                assert_eq!(*param_type, None);
                assert_eq!(*span, 0);
                assert_eq!(body.to_string(), "h.child.value");
                assert_eq!(body.span(), 12);
            }
            other => panic!("expected closure, got {:?}", other),
        }
    }

    #[test]
    fn normalizes_whitespace_in_display() {
        let e = parse("move |h :Host|   h . child.value").unwrap();
        assert_eq!(e.to_string(), "|h: Host| h.child.value");
    }

    #[test]
    fn parses_calls_and_indexing() {
        let e = parse("|a| a.items[0].name().len").unwrap();
        assert_eq!(e.to_string(), "|a| a.items[0].name().len");

        let e = parse("make_path(1, \"x\")").unwrap();
        assert!(matches!(e, Expr::Call { .. }));
    }

    #[test]
    fn parenthesized_closure_unwraps() {
        let e = parse("(|a| a.value)").unwrap();
        assert!(matches!(e, Expr::Closure { .. }));
    }

    #[test]
    fn tuple_fields() {
        let e = parse("|p| p.0.name").unwrap();
        assert_eq!(e.to_string(), "|p| p.0.name");
    }

    #[test]
    fn reports_offsets() {
        let err = parse("|a| a.").unwrap_err();
        assert_eq!(err.offset, 6);

        let err = parse("|a| a.b ?").unwrap_err();
        assert_eq!(err.offset, 8);

        let err = parse("|a a.b").unwrap_err();
        assert_eq!(err.offset, 3);
        assert!(err.message.contains("`|`"), "{}", err.message);
        assert!(err.message.ends_with("found `a`"), "{}", err.message);

        let err = parse("|a| a.name(1").unwrap_err();
        assert_eq!(err.offset, 12);

        let err = parse("|s| \"open").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }
}
