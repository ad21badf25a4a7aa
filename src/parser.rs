// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::lexer::*;

use core::iter::Peekable;
use core::str::Chars;

use anyhow::{bail, Result};

#[derive(Clone)]
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    end: u32,
    num_expressions: u32,
    num_statements: u32,
    depth: u32,
}

// Nesting allowed for parenthesized, bracketed and unary expressions.
const MAX_NESTING_DEPTH: u32 = 32;

const KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

const AUG_ASSIGN_OPS: [(&str, BinOp); 13] = [
    ("+=", BinOp::Add),
    ("-=", BinOp::Sub),
    ("*=", BinOp::Mul),
    ("@=", BinOp::MatMul),
    ("/=", BinOp::Div),
    ("//=", BinOp::FloorDiv),
    ("%=", BinOp::Mod),
    ("**=", BinOp::Pow),
    ("<<=", BinOp::LShift),
    (">>=", BinOp::RShift),
    ("|=", BinOp::BitOr),
    ("^=", BinOp::BitXor),
    ("&=", BinOp::BitAnd),
];

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
            end: 0,
            num_expressions: 0,
            num_statements: 0,
            depth: 0,
        })
    }

    pub fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Number | TokenKind::Ident => self.tok.1.text(),
            _ => "",
        }
    }

    pub fn next_token(&mut self) -> Result<()> {
        self.end = self.tok.1.end;
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.source.error(self.tok.1.line, self.tok.1.col, &msg))
        }
    }

    fn expect_newline(&mut self, context: &str) -> Result<()> {
        match self.tok.0 {
            TokenKind::Newline => self.next_token(),
            TokenKind::Eof => Ok(()),
            _ => {
                let msg = format!("expecting end of line {context}");
                Err(self.source.error(self.tok.1.line, self.tok.1.col, &msg))
            }
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Result<Expr>) -> Result<Expr> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.source.error(
                self.tok.1.line,
                self.tok.1.col,
                "expression is nested too deeply",
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn is_keyword(ident: &str) -> bool {
        KEYWORDS.contains(&ident)
    }

    fn next_eidx(&mut self) -> u32 {
        let eidx = self.num_expressions;
        self.num_expressions += 1;
        eidx
    }

    fn next_sidx(&mut self) -> u32 {
        let sidx = self.num_statements;
        self.num_statements += 1;
        sidx
    }

    // Span from the start of `start` up to the end of the last consumed token.
    fn span_from(&self, start: &Span) -> Span {
        let mut span = start.clone();
        span.end = self.end.max(span.start);
        span
    }

    fn at_end_of_stmt(&self) -> bool {
        matches!(self.tok.0, TokenKind::Newline | TokenKind::Eof) || self.token_text() == ";"
    }

    fn at_expr_start(&self) -> bool {
        match self.tok.0 {
            TokenKind::String | TokenKind::Number => true,
            TokenKind::Ident => {
                let text = self.token_text();
                !Self::is_keyword(text)
                    || matches!(text, "None" | "True" | "False" | "not" | "lambda" | "await")
            }
            TokenKind::Symbol => matches!(
                self.token_text(),
                "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."
            ),
            _ => false,
        }
    }

    fn parse_ident(&mut self) -> Result<Span> {
        let span = self.tok.1.clone();
        if self.tok.0 != TokenKind::Ident {
            bail!(span.error("expecting identifier"));
        }
        if Self::is_keyword(span.text()) {
            bail!(span.error(&format!("unexpected keyword `{}`", span.text())));
        }
        self.next_token()?;
        Ok(span)
    }

    fn parse_dotted_name(&mut self) -> Result<(Span, String)> {
        let start = self.tok.1.clone();
        let mut name = self.parse_ident()?.text().to_string();
        while self.token_text() == "." {
            self.next_token()?;
            name.push('.');
            name.push_str(self.parse_ident()?.text());
        }
        Ok((self.span_from(&start), name))
    }

    fn parse_string(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let (mut value, mut kind) = decode_string(&start)?;
        self.next_token()?;

        // Adjacent literals are concatenated.
        while self.tok.0 == TokenKind::String {
            let (v, k) = decode_string(&self.tok.1)?;
            if (kind == StrKind::Bytes) != (k == StrKind::Bytes) {
                bail!(self.tok.1.error("cannot mix bytes and nonbytes literals"));
            }
            if k == StrKind::Formatted {
                kind = k;
            }
            value.push_str(&v);
            self.next_token()?;
        }

        Ok(Expr::Str {
            span: self.span_from(&start),
            value,
            kind,
            eidx: self.next_eidx(),
        })
    }

    fn parse_paren_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        self.next_token()?;

        if self.token_text() == ")" {
            self.next_token()?;
            return Ok(Expr::Tuple {
                span: self.span_from(&start),
                items: vec![],
                eidx: self.next_eidx(),
            });
        }

        if self.token_text() == "yield" {
            let expr = self.parse_yield_expr()?;
            self.expect(")", "while parsing parenthesized yield")?;
            return Ok(expr);
        }

        let first = self.parse_star_or_namedexpr()?;
        if matches!(self.token_text(), "for" | "async") {
            let generators = self.parse_comprehension_clauses()?;
            self.expect(")", "while parsing generator expression")?;
            return Ok(Expr::GeneratorExpr {
                span: self.span_from(&start),
                elt: Ref::new(first),
                generators,
                eidx: self.next_eidx(),
            });
        }

        if self.token_text() != "," {
            self.expect(")", "while parsing parenthesized expression")?;
            return Ok(first);
        }

        let mut items = vec![Ref::new(first)];
        while self.token_text() == "," {
            self.next_token()?;
            if self.token_text() == ")" {
                break;
            }
            items.push(Ref::new(self.parse_star_or_namedexpr()?));
        }
        self.expect(")", "while parsing tuple")?;
        Ok(Expr::Tuple {
            span: self.span_from(&start),
            items,
            eidx: self.next_eidx(),
        })
    }

    fn parse_list_or_compr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        self.next_token()?;

        let mut items = vec![];
        if self.token_text() != "]" {
            let first = self.parse_star_or_namedexpr()?;
            if matches!(self.token_text(), "for" | "async") {
                let generators = self.parse_comprehension_clauses()?;
                self.expect("]", "while parsing list comprehension")?;
                return Ok(Expr::ListCompr {
                    span: self.span_from(&start),
                    elt: Ref::new(first),
                    generators,
                    eidx: self.next_eidx(),
                });
            }
            items.push(Ref::new(first));
            while self.token_text() == "," {
                self.next_token()?;
                if self.token_text() == "]" {
                    break;
                }
                items.push(Ref::new(self.parse_star_or_namedexpr()?));
            }
        }
        self.expect("]", "while parsing list")?;
        Ok(Expr::List {
            span: self.span_from(&start),
            items,
            eidx: self.next_eidx(),
        })
    }

    fn parse_dict_entry(&mut self) -> Result<(Option<Ref<Expr>>, Ref<Expr>)> {
        if self.token_text() == "**" {
            self.next_token()?;
            return Ok((None, Ref::new(self.parse_bitor_expr()?)));
        }
        let key = self.parse_test()?;
        self.expect(":", "while parsing dict entry")?;
        let value = self.parse_test()?;
        Ok((Some(Ref::new(key)), Ref::new(value)))
    }

    fn parse_dict_or_set(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        self.next_token()?;

        if self.token_text() == "}" {
            self.next_token()?;
            return Ok(Expr::Dict {
                span: self.span_from(&start),
                items: vec![],
                eidx: self.next_eidx(),
            });
        }

        // A leading `**` or a `key:` prefix makes it a dict.
        let is_dict_start = self.token_text() == "**";
        let first = if is_dict_start {
            None
        } else {
            Some(self.parse_star_or_namedexpr()?)
        };

        match first {
            Some(first) if self.token_text() == ":" => {
                self.next_token()?;
                let value = self.parse_test()?;
                if matches!(self.token_text(), "for" | "async") {
                    let generators = self.parse_comprehension_clauses()?;
                    self.expect("}", "while parsing dict comprehension")?;
                    return Ok(Expr::DictCompr {
                        span: self.span_from(&start),
                        key: Ref::new(first),
                        value: Ref::new(value),
                        generators,
                        eidx: self.next_eidx(),
                    });
                }
                let mut items = vec![(Some(Ref::new(first)), Ref::new(value))];
                self.parse_dict_tail(&mut items)?;
                Ok(Expr::Dict {
                    span: self.span_from(&start),
                    items,
                    eidx: self.next_eidx(),
                })
            }
            Some(first) => {
                if matches!(self.token_text(), "for" | "async") {
                    let generators = self.parse_comprehension_clauses()?;
                    self.expect("}", "while parsing set comprehension")?;
                    return Ok(Expr::SetCompr {
                        span: self.span_from(&start),
                        elt: Ref::new(first),
                        generators,
                        eidx: self.next_eidx(),
                    });
                }
                let mut items = vec![Ref::new(first)];
                while self.token_text() == "," {
                    self.next_token()?;
                    if self.token_text() == "}" {
                        break;
                    }
                    items.push(Ref::new(self.parse_star_or_namedexpr()?));
                }
                self.expect("}", "while parsing set")?;
                Ok(Expr::Set {
                    span: self.span_from(&start),
                    items,
                    eidx: self.next_eidx(),
                })
            }
            None => {
                let mut items = vec![self.parse_dict_entry()?];
                self.parse_dict_tail(&mut items)?;
                Ok(Expr::Dict {
                    span: self.span_from(&start),
                    items,
                    eidx: self.next_eidx(),
                })
            }
        }
    }

    fn parse_dict_tail(&mut self, items: &mut Vec<(Option<Ref<Expr>>, Ref<Expr>)>) -> Result<()> {
        while self.token_text() == "," {
            self.next_token()?;
            if self.token_text() == "}" {
                break;
            }
            items.push(self.parse_dict_entry()?);
        }
        self.expect("}", "while parsing dict")
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::String => return self.parse_string(),
            TokenKind::Number => {
                self.next_token()?;
                return Ok(Expr::Number {
                    span,
                    eidx: self.next_eidx(),
                });
            }
            TokenKind::Ident => {
                return match span.text() {
                    "None" | "True" | "False" => {
                        self.next_token()?;
                        Ok(Expr::Constant {
                            span,
                            eidx: self.next_eidx(),
                        })
                    }
                    _ => {
                        let span = self.parse_ident()?;
                        Ok(Expr::Name {
                            span,
                            eidx: self.next_eidx(),
                        })
                    }
                }
            }
            _ => (),
        }

        match self.token_text() {
            "(" => self.parse_paren_expr(),
            "[" => self.parse_list_or_compr(),
            "{" => self.parse_dict_or_set(),
            "..." => {
                self.next_token()?;
                Ok(Expr::Constant {
                    span,
                    eidx: self.next_eidx(),
                })
            }
            _ => bail!(span.error("invalid syntax")),
        }
    }

    // Arguments of a call or of a class definition, after the opening `(`.
    fn parse_call_args(&mut self) -> Result<(Vec<Ref<Expr>>, Vec<Keyword>)> {
        let mut args = vec![];
        let mut keywords = vec![];
        while self.token_text() != ")" {
            let start = self.tok.1.clone();
            match self.token_text() {
                "*" => {
                    self.next_token()?;
                    let value = self.parse_test()?;
                    args.push(Ref::new(Expr::Starred {
                        span: self.span_from(&start),
                        value: Ref::new(value),
                        eidx: self.next_eidx(),
                    }));
                }
                "**" => {
                    self.next_token()?;
                    let value = self.parse_test()?;
                    keywords.push(Keyword {
                        span: self.span_from(&start),
                        arg: None,
                        value: Ref::new(value),
                    });
                }
                _ => {
                    let expr = self.parse_namedexpr_test()?;
                    let keyword = match &expr {
                        Expr::Name { span, .. } if self.token_text() == "=" => Some(span.clone()),
                        _ => None,
                    };
                    if let Some(arg) = keyword {
                        self.next_token()?;
                        let value = self.parse_test()?;
                        keywords.push(Keyword {
                            span: self.span_from(&start),
                            arg: Some(arg),
                            value: Ref::new(value),
                        });
                    } else if matches!(self.token_text(), "for" | "async") {
                        let generators = self.parse_comprehension_clauses()?;
                        args.push(Ref::new(Expr::GeneratorExpr {
                            span: self.span_from(&start),
                            elt: Ref::new(expr),
                            generators,
                            eidx: self.next_eidx(),
                        }));
                    } else {
                        args.push(Ref::new(expr));
                    }
                }
            }

            if self.token_text() != "," {
                break;
            }
            self.next_token()?;
        }
        self.expect(")", "while parsing call arguments")?;
        Ok((args, keywords))
    }

    fn parse_slice_item(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let lower = if self.token_text() != ":" {
            let expr = self.parse_namedexpr_test()?;
            if self.token_text() != ":" {
                return Ok(expr);
            }
            Some(Ref::new(expr))
        } else {
            None
        };

        self.expect(":", "while parsing slice")?;
        let upper = if matches!(self.token_text(), ":" | "]" | ",") {
            None
        } else {
            Some(Ref::new(self.parse_test()?))
        };

        let mut step = None;
        if self.token_text() == ":" {
            self.next_token()?;
            if !matches!(self.token_text(), "]" | ",") {
                step = Some(Ref::new(self.parse_test()?));
            }
        }

        Ok(Expr::Slice {
            span: self.span_from(&start),
            lower,
            upper,
            step,
            eidx: self.next_eidx(),
        })
    }

    fn parse_subscript_index(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let first = self.parse_slice_item()?;
        if self.token_text() != "," {
            return Ok(first);
        }

        let mut items = vec![Ref::new(first)];
        while self.token_text() == "," {
            self.next_token()?;
            if self.token_text() == "]" {
                break;
            }
            items.push(Ref::new(self.parse_slice_item()?));
        }
        Ok(Expr::Tuple {
            span: self.span_from(&start),
            items,
            eidx: self.next_eidx(),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut term = self.parse_atom()?;

        loop {
            match self.token_text() {
                "." => {
                    self.next_token()?;
                    let attr = self.parse_ident()?;
                    term = Expr::Attribute {
                        span: self.span_from(&start),
                        value: Ref::new(term),
                        attr,
                        eidx: self.next_eidx(),
                    };
                }
                "(" => {
                    self.next_token()?;
                    let (args, keywords) = self.parse_call_args()?;
                    term = Expr::Call {
                        span: self.span_from(&start),
                        func: Ref::new(term),
                        args,
                        keywords,
                        eidx: self.next_eidx(),
                    };
                }
                "[" => {
                    self.next_token()?;
                    let index = self.parse_subscript_index()?;
                    self.expect("]", "while parsing subscript")?;
                    term = Expr::Subscript {
                        span: self.span_from(&start),
                        value: Ref::new(term),
                        index: Ref::new(index),
                        eidx: self.next_eidx(),
                    };
                }
                _ => break,
            }
        }

        Ok(term)
    }

    fn parse_await_expr(&mut self) -> Result<Expr> {
        if self.token_text() != "await" {
            return self.parse_primary();
        }
        let start = self.tok.1.clone();
        self.next_token()?;
        let value = self.parse_primary()?;
        Ok(Expr::Await {
            span: self.span_from(&start),
            value: Ref::new(value),
            eidx: self.next_eidx(),
        })
    }

    fn parse_power_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let base = self.parse_await_expr()?;
        if self.token_text() != "**" {
            return Ok(base);
        }
        self.next_token()?;
        let exponent = self.nested(Self::parse_factor)?;
        Ok(Expr::BinExpr {
            span: self.span_from(&start),
            op: BinOp::Pow,
            lhs: Ref::new(base),
            rhs: Ref::new(exponent),
            eidx: self.next_eidx(),
        })
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let op = match self.token_text() {
            "-" => UnaryOp::Neg,
            "+" => UnaryOp::Pos,
            "~" => UnaryOp::Invert,
            _ => return self.parse_power_expr(),
        };
        self.next_token()?;
        let operand = self.nested(Self::parse_factor)?;
        Ok(Expr::UnaryExpr {
            span: self.span_from(&start),
            op,
            operand: Ref::new(operand),
            eidx: self.next_eidx(),
        })
    }

    // Left-associative binary operator level.
    fn parse_binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = next(self)?;

        loop {
            let op = match ops.iter().find(|(text, _)| *text == self.token_text()) {
                Some((_, op)) if self.tok.0 == TokenKind::Symbol => *op,
                _ => return Ok(expr),
            };
            self.next_token()?;
            let rhs = next(self)?;
            expr = Expr::BinExpr {
                span: self.span_from(&start),
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
                eidx: self.next_eidx(),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                ("*", BinOp::Mul),
                ("/", BinOp::Div),
                ("//", BinOp::FloorDiv),
                ("%", BinOp::Mod),
                ("@", BinOp::MatMul),
            ],
            Self::parse_factor,
        )
    }

    fn parse_arith_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::parse_term)
    }

    fn parse_shift_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[("<<", BinOp::LShift), (">>", BinOp::RShift)],
            Self::parse_arith_expr,
        )
    }

    fn parse_bitand_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("&", BinOp::BitAnd)], Self::parse_shift_expr)
    }

    fn parse_bitxor_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("^", BinOp::BitXor)], Self::parse_bitand_expr)
    }

    fn parse_bitor_expr(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("|", BinOp::BitOr)], Self::parse_bitxor_expr)
    }

    fn parse_comparison_op(&mut self) -> Result<Option<CmpOp>> {
        let op = match self.token_text() {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::NotEq,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::LtE,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::GtE,
            "in" => CmpOp::In,
            "not" => {
                self.next_token()?;
                self.expect("in", "after `not` in comparison")?;
                return Ok(Some(CmpOp::NotIn));
            }
            "is" => {
                self.next_token()?;
                if self.token_text() == "not" {
                    self.next_token()?;
                    return Ok(Some(CmpOp::IsNot));
                }
                return Ok(Some(CmpOp::Is));
            }
            _ => return Ok(None),
        };
        self.next_token()?;
        Ok(Some(op))
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let lhs = self.parse_bitor_expr()?;

        let mut comparisons = vec![];
        while let Some(op) = self.parse_comparison_op()? {
            comparisons.push((op, Ref::new(self.parse_bitor_expr()?)));
        }

        if comparisons.is_empty() {
            return Ok(lhs);
        }
        Ok(Expr::Compare {
            span: self.span_from(&start),
            lhs: Ref::new(lhs),
            comparisons,
            eidx: self.next_eidx(),
        })
    }

    fn parse_not_test(&mut self) -> Result<Expr> {
        if self.token_text() != "not" {
            return self.parse_comparison();
        }
        let start = self.tok.1.clone();
        self.next_token()?;
        let operand = self.nested(Self::parse_not_test)?;
        Ok(Expr::UnaryExpr {
            span: self.span_from(&start),
            op: UnaryOp::Not,
            operand: Ref::new(operand),
            eidx: self.next_eidx(),
        })
    }

    fn parse_bool_level(
        &mut self,
        keyword: &str,
        op: BoolOp,
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let start = self.tok.1.clone();
        let mut expr = next(self)?;
        while self.token_text() == keyword {
            self.next_token()?;
            let rhs = next(self)?;
            expr = Expr::BoolExpr {
                span: self.span_from(&start),
                op,
                lhs: Ref::new(expr),
                rhs: Ref::new(rhs),
                eidx: self.next_eidx(),
            };
        }
        Ok(expr)
    }

    fn parse_and_test(&mut self) -> Result<Expr> {
        self.parse_bool_level("and", BoolOp::And, Self::parse_not_test)
    }

    fn parse_or_test(&mut self) -> Result<Expr> {
        self.parse_bool_level("or", BoolOp::Or, Self::parse_and_test)
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        self.expect("lambda", "while parsing lambda")?;
        let params = self.parse_parameters(":", false)?;
        self.expect(":", "while parsing lambda")?;
        let body = self.parse_test()?;
        Ok(Expr::Lambda {
            span: self.span_from(&start),
            params,
            body: Ref::new(body),
            eidx: self.next_eidx(),
        })
    }

    pub fn parse_test(&mut self) -> Result<Expr> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        if self.token_text() == "lambda" {
            return self.parse_lambda();
        }

        let start = self.tok.1.clone();
        let body = self.parse_or_test()?;
        if self.token_text() != "if" {
            return Ok(body);
        }

        self.next_token()?;
        let test = self.parse_or_test()?;
        self.expect("else", "while parsing conditional expression")?;
        let orelse = self.parse_test()?;
        Ok(Expr::IfExpr {
            span: self.span_from(&start),
            test: Ref::new(test),
            body: Ref::new(body),
            orelse: Ref::new(orelse),
            eidx: self.next_eidx(),
        })
    }

    fn parse_namedexpr_test(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        let expr = self.parse_test()?;
        if self.token_text() != ":=" {
            return Ok(expr);
        }
        if !matches!(expr, Expr::Name { .. }) {
            bail!(expr.span().error("cannot use assignment expression with this target"));
        }
        self.next_token()?;
        let value = self.parse_test()?;
        Ok(Expr::NamedExpr {
            span: self.span_from(&start),
            target: Ref::new(expr),
            value: Ref::new(value),
            eidx: self.next_eidx(),
        })
    }

    fn parse_starred(&mut self, operand: fn(&mut Self) -> Result<Expr>) -> Result<Expr> {
        let start = self.tok.1.clone();
        self.expect("*", "while parsing starred expression")?;
        let value = self.nested(operand)?;
        Ok(Expr::Starred {
            span: self.span_from(&start),
            value: Ref::new(value),
            eidx: self.next_eidx(),
        })
    }

    fn parse_star_or_namedexpr(&mut self) -> Result<Expr> {
        if self.token_text() == "*" {
            return self.parse_starred(Self::parse_bitor_expr);
        }
        self.parse_namedexpr_test()
    }

    fn parse_star_or_test(&mut self) -> Result<Expr> {
        if self.token_text() == "*" {
            return self.parse_starred(Self::parse_bitor_expr);
        }
        self.parse_test()
    }

    fn parse_star_or_bitor(&mut self) -> Result<Expr> {
        if self.token_text() == "*" {
            return self.parse_starred(Self::parse_bitor_expr);
        }
        self.parse_bitor_expr()
    }

    // Comma separated items forming a tuple when more than one is given
    // or a trailing comma is present.
    fn parse_tuple_of(&mut self, item: fn(&mut Self) -> Result<Expr>) -> Result<Expr> {
        let start = self.tok.1.clone();
        let first = item(self)?;
        if self.token_text() != "," {
            return Ok(first);
        }

        let mut items = vec![Ref::new(first)];
        while self.token_text() == "," {
            self.next_token()?;
            if !self.at_expr_start() {
                break;
            }
            items.push(Ref::new(item(self)?));
        }
        Ok(Expr::Tuple {
            span: self.span_from(&start),
            items,
            eidx: self.next_eidx(),
        })
    }

    /// Parse an expression list such as the right hand side of an assignment.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_tuple_of(Self::parse_star_or_test)
    }

    fn parse_target_list(&mut self) -> Result<Expr> {
        self.parse_tuple_of(Self::parse_star_or_bitor)
    }

    fn parse_yield_expr(&mut self) -> Result<Expr> {
        let start = self.tok.1.clone();
        self.expect("yield", "while parsing yield")?;
        let mut from = false;
        let value = if self.token_text() == "from" {
            self.next_token()?;
            from = true;
            Some(Ref::new(self.parse_test()?))
        } else if self.at_expr_start() {
            Some(Ref::new(self.parse_expr()?))
        } else {
            None
        };
        Ok(Expr::Yield {
            span: self.span_from(&start),
            value,
            from,
            eidx: self.next_eidx(),
        })
    }

    fn parse_expr_or_yield(&mut self) -> Result<Expr> {
        if self.token_text() == "yield" {
            self.parse_yield_expr()
        } else {
            self.parse_expr()
        }
    }

    fn parse_comprehension_clauses(&mut self) -> Result<Vec<Comprehension>> {
        let mut generators = vec![];
        while matches!(self.token_text(), "for" | "async") {
            let start = self.tok.1.clone();
            let is_async = self.token_text() == "async";
            if is_async {
                self.next_token()?;
            }
            self.expect("for", "while parsing comprehension")?;
            let target = self.parse_target_list()?;
            self.expect("in", "while parsing comprehension")?;
            let iter = self.parse_or_test()?;

            let mut ifs = vec![];
            while self.token_text() == "if" {
                self.next_token()?;
                ifs.push(Ref::new(self.parse_or_test()?));
            }

            generators.push(Comprehension {
                span: self.span_from(&start),
                target: Ref::new(target),
                iter: Ref::new(iter),
                ifs,
                is_async,
            });
        }
        Ok(generators)
    }

    fn parse_param(&mut self, annotations: bool) -> Result<Param> {
        let span = self.parse_ident()?;
        let annotation = if annotations && self.token_text() == ":" {
            self.next_token()?;
            Some(Ref::new(self.parse_test()?))
        } else {
            None
        };
        Ok(Param {
            span,
            annotation,
            default: None,
        })
    }

    // Parameters of a def (annotations allowed, closed by `)`) or of a
    // lambda (no annotations, closed by `:`).
    fn parse_parameters(&mut self, close: &str, annotations: bool) -> Result<Parameters> {
        let mut params = Parameters::default();
        let mut keyword_only = false;

        while self.token_text() != close {
            match self.token_text() {
                // Positional-only marker.
                "/" => self.next_token()?,
                "*" => {
                    self.next_token()?;
                    if self.tok.0 == TokenKind::Ident {
                        params.vararg = Some(self.parse_param(annotations)?);
                    }
                    keyword_only = true;
                }
                "**" => {
                    self.next_token()?;
                    params.kwarg = Some(self.parse_param(annotations)?);
                }
                _ => {
                    let mut param = self.parse_param(annotations)?;
                    if self.token_text() == "=" {
                        self.next_token()?;
                        param.default = Some(Ref::new(self.parse_test()?));
                    }
                    if keyword_only {
                        params.kwonly.push(param);
                    } else {
                        params.args.push(param);
                    }
                }
            }

            if self.token_text() != "," {
                break;
            }
            self.next_token()?;
        }

        Ok(params)
    }

    fn parse_block(&mut self, context: &str) -> Result<Vec<Ref<Stmt>>> {
        self.expect(":", context)?;

        let mut body = vec![];
        if self.tok.0 != TokenKind::Newline {
            self.parse_simple_stmts(&mut body)?;
            return Ok(body);
        }

        self.next_token()?;
        if self.tok.0 != TokenKind::Indent {
            bail!(self.tok.1.error("expected an indented block"));
        }
        self.next_token()?;

        while !matches!(self.tok.0, TokenKind::Dedent | TokenKind::Eof) {
            self.parse_statement(&mut body)?;
        }
        if self.tok.0 == TokenKind::Dedent {
            self.next_token()?;
        }
        Ok(body)
    }

    fn parse_import(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        self.expect("import", "while parsing import")?;

        let mut names = vec![];
        loop {
            let (span, name) = self.parse_dotted_name()?;
            let asname = if self.token_text() == "as" {
                self.next_token()?;
                Some(self.parse_ident()?)
            } else {
                None
            };
            names.push(Alias {
                span: self.span_from(&span),
                name,
                asname,
            });

            if self.token_text() != "," {
                break;
            }
            self.next_token()?;
        }

        Ok(Stmt::Import {
            span: self.span_from(&start),
            names,
            sidx: self.next_sidx(),
        })
    }

    fn parse_import_from(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        self.expect("from", "while parsing import")?;

        let mut level = 0;
        loop {
            match self.token_text() {
                "." => level += 1,
                "..." => level += 3,
                _ => break,
            }
            self.next_token()?;
        }

        let module = if self.token_text() == "import" {
            None
        } else {
            Some(self.parse_dotted_name()?.1)
        };
        if module.is_none() && level == 0 {
            bail!(self.tok.1.error("expecting module name"));
        }
        self.expect("import", "while parsing from import")?;

        let mut names = vec![];
        if self.token_text() == "*" {
            names.push(Alias {
                span: self.tok.1.clone(),
                name: "*".to_string(),
                asname: None,
            });
            self.next_token()?;
        } else {
            let parenthesized = self.token_text() == "(";
            if parenthesized {
                self.next_token()?;
            }
            loop {
                let span = self.parse_ident()?;
                let asname = if self.token_text() == "as" {
                    self.next_token()?;
                    Some(self.parse_ident()?)
                } else {
                    None
                };
                names.push(Alias {
                    span: self.span_from(&span),
                    name: span.text().to_string(),
                    asname,
                });

                if self.token_text() != "," {
                    break;
                }
                self.next_token()?;
                if parenthesized && self.token_text() == ")" {
                    break;
                }
            }
            if parenthesized {
                self.expect(")", "while parsing from import")?;
            }
        }

        Ok(Stmt::ImportFrom {
            span: self.span_from(&start),
            module,
            level,
            names,
            sidx: self.next_sidx(),
        })
    }

    fn parse_name_list(&mut self) -> Result<Vec<Span>> {
        let mut names = vec![self.parse_ident()?];
        while self.token_text() == "," {
            self.next_token()?;
            names.push(self.parse_ident()?);
        }
        Ok(names)
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        let first = self.parse_expr_or_yield()?;

        if self.token_text() == "=" {
            let mut targets = vec![Ref::new(first)];
            loop {
                self.next_token()?;
                let expr = self.parse_expr_or_yield()?;
                if self.token_text() != "=" {
                    return Ok(Stmt::Assign {
                        span: self.span_from(&start),
                        targets,
                        value: Ref::new(expr),
                        sidx: self.next_sidx(),
                    });
                }
                targets.push(Ref::new(expr));
            }
        }

        if self.token_text() == ":" {
            self.next_token()?;
            let annotation = self.parse_test()?;
            let value = if self.token_text() == "=" {
                self.next_token()?;
                Some(Ref::new(self.parse_expr_or_yield()?))
            } else {
                None
            };
            return Ok(Stmt::AnnAssign {
                span: self.span_from(&start),
                target: Ref::new(first),
                annotation: Ref::new(annotation),
                value,
                sidx: self.next_sidx(),
            });
        }

        let aug_op = AUG_ASSIGN_OPS
            .iter()
            .find(|(text, _)| *text == self.token_text())
            .map(|(_, op)| *op);
        if let Some(op) = aug_op {
            self.next_token()?;
            let value = self.parse_expr_or_yield()?;
            return Ok(Stmt::AugAssign {
                span: self.span_from(&start),
                target: Ref::new(first),
                op,
                value: Ref::new(value),
                sidx: self.next_sidx(),
            });
        }

        Ok(Stmt::Expr {
            span: self.span_from(&start),
            value: Ref::new(first),
            sidx: self.next_sidx(),
        })
    }

    fn parse_small_stmt(&mut self) -> Result<Stmt> {
        let span = self.tok.1.clone();
        match self.token_text() {
            "pass" | "break" | "continue" => {
                let kind = span.text().to_string();
                self.next_token()?;
                let sidx = self.next_sidx();
                Ok(match kind.as_str() {
                    "pass" => Stmt::Pass { span, sidx },
                    "break" => Stmt::Break { span, sidx },
                    _ => Stmt::Continue { span, sidx },
                })
            }
            "return" => {
                self.next_token()?;
                let value = if self.at_end_of_stmt() {
                    None
                } else {
                    Some(Ref::new(self.parse_expr()?))
                };
                Ok(Stmt::Return {
                    span: self.span_from(&span),
                    value,
                    sidx: self.next_sidx(),
                })
            }
            "raise" => {
                self.next_token()?;
                let mut cause = None;
                let exc = if self.at_end_of_stmt() {
                    None
                } else {
                    let exc = self.parse_test()?;
                    if self.token_text() == "from" {
                        self.next_token()?;
                        cause = Some(Ref::new(self.parse_test()?));
                    }
                    Some(Ref::new(exc))
                };
                Ok(Stmt::Raise {
                    span: self.span_from(&span),
                    exc,
                    cause,
                    sidx: self.next_sidx(),
                })
            }
            "global" | "nonlocal" => {
                let global = span.text() == "global";
                self.next_token()?;
                let names = self.parse_name_list()?;
                let span = self.span_from(&span);
                let sidx = self.next_sidx();
                Ok(if global {
                    Stmt::Global { span, names, sidx }
                } else {
                    Stmt::Nonlocal { span, names, sidx }
                })
            }
            "del" => {
                self.next_token()?;
                let targets = match self.parse_target_list()? {
                    Expr::Tuple { items, .. } => items,
                    target => vec![Ref::new(target)],
                };
                Ok(Stmt::Delete {
                    span: self.span_from(&span),
                    targets,
                    sidx: self.next_sidx(),
                })
            }
            "assert" => {
                self.next_token()?;
                let test = self.parse_test()?;
                let msg = if self.token_text() == "," {
                    self.next_token()?;
                    Some(Ref::new(self.parse_test()?))
                } else {
                    None
                };
                Ok(Stmt::Assert {
                    span: self.span_from(&span),
                    test: Ref::new(test),
                    msg,
                    sidx: self.next_sidx(),
                })
            }
            "import" => self.parse_import(),
            "from" => self.parse_import_from(),
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_simple_stmts(&mut self, body: &mut Vec<Ref<Stmt>>) -> Result<()> {
        loop {
            body.push(Ref::new(self.parse_small_stmt()?));
            if self.token_text() != ";" {
                break;
            }
            self.next_token()?;
            if matches!(self.tok.0, TokenKind::Newline | TokenKind::Eof) {
                break;
            }
        }
        self.expect_newline("after statement")
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        // Consumes `if` or `elif`.
        self.next_token()?;
        let test = self.parse_namedexpr_test()?;
        let body = self.parse_block("while parsing if statement")?;

        let orelse = match self.token_text() {
            "elif" => vec![Ref::new(self.parse_if()?)],
            "else" => {
                self.next_token()?;
                self.parse_block("while parsing else clause")?
            }
            _ => vec![],
        };

        Ok(Stmt::If {
            span: self.span_from(&start),
            test: Ref::new(test),
            body,
            orelse,
            sidx: self.next_sidx(),
        })
    }

    fn parse_else_clause(&mut self) -> Result<Vec<Ref<Stmt>>> {
        if self.token_text() != "else" {
            return Ok(vec![]);
        }
        self.next_token()?;
        self.parse_block("while parsing else clause")
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        self.expect("while", "while parsing while statement")?;
        let test = self.parse_namedexpr_test()?;
        let body = self.parse_block("while parsing while statement")?;
        let orelse = self.parse_else_clause()?;
        Ok(Stmt::While {
            span: self.span_from(&start),
            test: Ref::new(test),
            body,
            orelse,
            sidx: self.next_sidx(),
        })
    }

    fn parse_for(&mut self, start: Span, is_async: bool) -> Result<Stmt> {
        self.expect("for", "while parsing for statement")?;
        let target = self.parse_target_list()?;
        self.expect("in", "while parsing for statement")?;
        let iter = self.parse_expr()?;
        let body = self.parse_block("while parsing for statement")?;
        let orelse = self.parse_else_clause()?;
        Ok(Stmt::For {
            span: self.span_from(&start),
            target: Ref::new(target),
            iter: Ref::new(iter),
            body,
            orelse,
            is_async,
            sidx: self.next_sidx(),
        })
    }

    fn parse_with(&mut self, start: Span, is_async: bool) -> Result<Stmt> {
        self.expect("with", "while parsing with statement")?;
        let mut items = vec![];
        loop {
            let context = self.parse_test()?;
            let vars = if self.token_text() == "as" {
                self.next_token()?;
                Some(Ref::new(self.parse_star_or_bitor()?))
            } else {
                None
            };
            items.push(WithItem {
                context: Ref::new(context),
                vars,
            });

            if self.token_text() != "," {
                break;
            }
            self.next_token()?;
        }
        let body = self.parse_block("while parsing with statement")?;
        Ok(Stmt::With {
            span: self.span_from(&start),
            items,
            body,
            is_async,
            sidx: self.next_sidx(),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        self.expect("try", "while parsing try statement")?;
        let body = self.parse_block("while parsing try statement")?;

        let mut handlers = vec![];
        while self.token_text() == "except" {
            let span = self.tok.1.clone();
            self.next_token()?;
            let mut name = None;
            let typ = if self.token_text() == ":" {
                None
            } else {
                let typ = self.parse_test()?;
                if self.token_text() == "as" {
                    self.next_token()?;
                    name = Some(self.parse_ident()?);
                }
                Some(Ref::new(typ))
            };
            let body = self.parse_block("while parsing except clause")?;
            handlers.push(ExceptHandler {
                span: self.span_from(&span),
                typ,
                name,
                body,
            });
        }

        let orelse = self.parse_else_clause()?;
        let finalbody = if self.token_text() == "finally" {
            self.next_token()?;
            self.parse_block("while parsing finally clause")?
        } else {
            vec![]
        };

        if handlers.is_empty() && finalbody.is_empty() {
            bail!(start.error("expecting `except` or `finally` block"));
        }

        Ok(Stmt::Try {
            span: self.span_from(&start),
            body,
            handlers,
            orelse,
            finalbody,
            sidx: self.next_sidx(),
        })
    }

    fn parse_function_def(
        &mut self,
        start: Span,
        decorators: Vec<Ref<Expr>>,
        is_async: bool,
    ) -> Result<Stmt> {
        self.expect("def", "while parsing function definition")?;
        let name = self.parse_ident()?;
        self.expect("(", "while parsing function parameters")?;
        let params = self.parse_parameters(")", true)?;
        self.expect(")", "while parsing function parameters")?;

        let returns = if self.token_text() == "->" {
            self.next_token()?;
            Some(Ref::new(self.parse_test()?))
        } else {
            None
        };

        let body = self.parse_block("while parsing function definition")?;
        Ok(Stmt::FunctionDef(Ref::new(FunctionDef {
            span: self.span_from(&start),
            name,
            params,
            returns,
            decorators,
            body,
            is_async,
            sidx: self.next_sidx(),
        })))
    }

    fn parse_class_def(&mut self, start: Span, decorators: Vec<Ref<Expr>>) -> Result<Stmt> {
        self.expect("class", "while parsing class definition")?;
        let name = self.parse_ident()?;

        let (bases, keywords) = if self.token_text() == "(" {
            self.next_token()?;
            self.parse_call_args()?
        } else {
            (vec![], vec![])
        };

        let body = self.parse_block("while parsing class definition")?;
        Ok(Stmt::ClassDef(Ref::new(ClassDef {
            span: self.span_from(&start),
            name,
            bases,
            keywords,
            decorators,
            body,
            sidx: self.next_sidx(),
        })))
    }

    fn parse_decorated(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        let mut decorators = vec![];
        while self.token_text() == "@" {
            self.next_token()?;
            decorators.push(Ref::new(self.parse_namedexpr_test()?));
            self.expect_newline("after decorator")?;
        }

        match self.token_text() {
            "def" => self.parse_function_def(start, decorators, false),
            "class" => self.parse_class_def(start, decorators),
            "async" => {
                self.next_token()?;
                self.parse_function_def(start, decorators, true)
            }
            _ => bail!(self
                .tok
                .1
                .error("expecting function or class definition after decorator")),
        }
    }

    fn parse_async_stmt(&mut self) -> Result<Stmt> {
        let start = self.tok.1.clone();
        self.expect("async", "while parsing async statement")?;
        match self.token_text() {
            "def" => self.parse_function_def(start, vec![], true),
            "for" => self.parse_for(start, true),
            "with" => self.parse_with(start, true),
            _ => bail!(self
                .tok
                .1
                .error("expecting `def`, `for` or `with` after `async`")),
        }
    }

    pub fn parse_statement(&mut self, body: &mut Vec<Ref<Stmt>>) -> Result<()> {
        let start = self.tok.1.clone();
        let stmt = match self.tok.0 {
            TokenKind::Indent => bail!(start.error("unexpected indent")),
            TokenKind::Newline => {
                self.next_token()?;
                return Ok(());
            }
            TokenKind::Ident | TokenKind::Symbol => match self.token_text() {
                "if" => self.parse_if()?,
                "while" => self.parse_while()?,
                "for" => self.parse_for(start, false)?,
                "with" => self.parse_with(start, false)?,
                "try" => self.parse_try()?,
                "def" => self.parse_function_def(start, vec![], false)?,
                "class" => self.parse_class_def(start, vec![])?,
                "@" => self.parse_decorated()?,
                "async" => self.parse_async_stmt()?,
                _ => return self.parse_simple_stmts(body),
            },
            _ => return self.parse_simple_stmts(body),
        };
        body.push(Ref::new(stmt));
        Ok(())
    }

    pub fn parse(&mut self) -> Result<Module> {
        let mut body = vec![];
        while self.tok.0 != TokenKind::Eof {
            self.parse_statement(&mut body)?;
        }

        Ok(Module {
            source: self.source.clone(),
            body,
            num_expressions: self.num_expressions,
            num_statements: self.num_statements,
        })
    }
}

fn decode_string(span: &Span) -> Result<(String, StrKind)> {
    let text = span.text();
    let prefix_len = text.find(['"', '\'']).unwrap_or(0);
    let prefix = text[..prefix_len].to_ascii_lowercase();
    let quoted = &text[prefix_len..];

    let delimiter = if quoted.len() >= 6 && (quoted.starts_with("\"\"\"") || quoted.starts_with("'''"))
    {
        3
    } else {
        1
    };
    if quoted.len() < 2 * delimiter {
        bail!(span.error("invalid string literal"));
    }
    let inner = &quoted[delimiter..quoted.len() - delimiter];

    let kind = if prefix.contains('f') {
        StrKind::Formatted
    } else if prefix.contains('b') {
        StrKind::Bytes
    } else {
        StrKind::Plain
    };

    let value = if prefix.contains('r') {
        inner.to_string()
    } else {
        unescape(inner, span)?
    };
    Ok((value, kind))
}

fn read_code_point(chars: &mut Peekable<Chars<'_>>, digits: usize, span: &Span) -> Result<char> {
    let mut code = String::with_capacity(digits);
    for _ in 0..digits {
        match chars.next() {
            Some(c) if c.is_ascii_hexdigit() => code.push(c),
            _ => bail!(span.error("invalid escape sequence in string literal")),
        }
    }
    match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
        Some(c) => Ok(c),
        None => bail!(span.error("invalid code point in string literal")),
    }
}

fn unescape(text: &str, span: &Span) -> Result<String> {
    let mut value = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }

        match chars.next() {
            // Line continuation inside the literal.
            Some('\n') => (),
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('a') => value.push('\x07'),
            Some('b') => value.push('\x08'),
            Some('f') => value.push('\x0c'),
            Some('v') => value.push('\x0b'),
            Some(c @ ('\\' | '\'' | '"')) => value.push(c),
            Some(c @ '0'..='7') => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                match char::from_u32(code) {
                    Some(c) => value.push(c),
                    None => bail!(span.error("invalid octal escape in string literal")),
                }
            }
            Some('x') => value.push(read_code_point(&mut chars, 2, span)?),
            Some('u') => value.push(read_code_point(&mut chars, 4, span)?),
            Some('U') => value.push(read_code_point(&mut chars, 8, span)?),
            // Unknown escapes are kept verbatim.
            Some(c) => {
                value.push('\\');
                value.push(c);
            }
            None => value.push('\\'),
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> Module {
        let source = Source::from_contents("test.py".to_string(), code.to_string()).unwrap();
        Parser::new(&source).unwrap().parse().unwrap()
    }

    #[test]
    fn string_escapes() {
        let module = parse("x = 'a\\tb' \"\\x41\\u00e9\"\n");
        match module.body[0].as_ref() {
            Stmt::Assign { value, .. } => {
                assert_eq!(value.string_literal(), Some("a\tbA\u{e9}"));
            }
            s => panic!("unexpected statement {s:?}"),
        }
    }

    #[test]
    fn raw_and_formatted_strings() {
        let module = parse("a = r'\\n'\nb = f'{a}'\nc = b'x'\n");
        let kinds: Vec<_> = module
            .body
            .iter()
            .map(|s| match s.as_ref() {
                Stmt::Assign { value, .. } => match value.as_ref() {
                    Expr::Str { value, kind, .. } => (value.clone(), *kind),
                    e => panic!("unexpected expression {e:?}"),
                },
                s => panic!("unexpected statement {s:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("\\n".to_string(), StrKind::Plain),
                ("{a}".to_string(), StrKind::Formatted),
                ("x".to_string(), StrKind::Bytes),
            ]
        );
    }

    #[test]
    fn indices_are_unique() {
        let module = parse("import boto3\ndef f(a, b=1):\n    return boto3.client('s3')\nf(1)\n");
        assert_eq!(module.num_statements, 4);
        assert!(module.num_expressions >= 8);
        let sidxs: Vec<u32> = module.body.iter().map(|s| s.sidx()).collect();
        let mut sorted = sidxs.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sidxs.len(), sorted.len());
    }
}
