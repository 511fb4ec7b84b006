// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Parser for native module definitions.
//!
//! Definitions use a small, closed statement language: calls, bindings,
//! and `if`/`elif`/`else` blocks delimited by indentation. Brackets may
//! span several physical lines.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1, char, multispace0, satisfy};
use nom::combinator::{all_consuming, map, not, opt, recognize, value, verify};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::{fold_many0, many0_count, separated_list0};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::IResult;

#[cfg(test)]
#[path = "./parser_test.rs"]
mod parser_test;

const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "and", "or", "not", "in", "None", "True", "False", "pass",
];

const TAB_WIDTH: usize = 4;

/// A parsed definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based line the statement starts on.
    pub line: usize,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Call(Call),
    Assign { name: String, value: Expr },
    If {
        branches: Vec<(Expr, Vec<Statement>)>,
        otherwise: Vec<Statement>,
    },
    Pass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    In,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    None,
    Bool(bool),
    List(Vec<Expr>),
    Name(String),
    Call(Call),
    Concat(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Syntax error with its 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new<S: Into<String>>(line: usize, message: S) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Parse a definition into its statement tree.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let lines = logical_lines(source)?;
    let mut pos = 0;
    let statements = parse_block(&lines, &mut pos, 0)?;
    Ok(Program { statements })
}

#[derive(Debug)]
struct LogicalLine {
    number: usize,
    indent: usize,
    text: String,
}

/// Join bracket continuations and strip comments.
fn logical_lines(source: &str) -> Result<Vec<LogicalLine>, ParseError> {
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;
    let mut depth: usize = 0;

    for (index, physical) in source.lines().enumerate() {
        let number = index + 1;
        let logical = current.get_or_insert_with(|| LogicalLine {
            number,
            indent: measure_indent(physical),
            text: String::new(),
        });
        if !logical.text.is_empty() {
            logical.text.push(' ');
        }

        let mut quote: Option<char> = None;
        let mut escaped = false;
        for c in physical.chars() {
            match quote {
                Some(q) => {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '#' => break,
                    '"' | '\'' => quote = Some(c),
                    '(' | '[' => depth += 1,
                    ')' | ']' => {
                        depth = depth
                            .checked_sub(1)
                            .ok_or_else(|| ParseError::new(number, format!("unmatched '{c}'")))?;
                    }
                    _ => {}
                },
            }
            logical.text.push(c);
        }
        if quote.is_some() {
            return Err(ParseError::new(number, "unterminated string literal"));
        }

        if depth == 0 {
            if let Some(done) = current.take() {
                if !done.text.trim().is_empty() {
                    lines.push(LogicalLine {
                        text: done.text.trim().to_string(),
                        ..done
                    });
                }
            }
        }
    }

    match current {
        Some(open) if depth > 0 => Err(ParseError::new(open.number, "unclosed bracket")),
        _ => Ok(lines),
    }
}

fn measure_indent(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// First line of a compound statement or a simple statement.
#[derive(Debug, Clone)]
enum Header {
    If(Expr),
    Elif(Expr),
    Else,
    Simple(StatementKind),
}

fn parse_header(line: &LogicalLine) -> Result<Header, ParseError> {
    match all_consuming(delimited(multispace0, header, multispace0))(line.text.as_str()) {
        Ok((_, header)) => Ok(header),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            let near: String = e.input.chars().take(20).collect();
            let message = if near.is_empty() {
                format!("invalid syntax: {}", line.text)
            } else {
                format!("invalid syntax near '{near}'")
            };
            Err(ParseError::new(line.number, message))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(line.number, "incomplete statement")),
    }
}

fn parse_block(
    lines: &[LogicalLine],
    pos: &mut usize,
    indent: usize,
) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    while let Some(line) = lines.get(*pos) {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(ParseError::new(line.number, "unexpected indent"));
        }
        let number = line.number;
        let header = parse_header(line)?;
        *pos += 1;
        match header {
            Header::Simple(kind) => statements.push(Statement { line: number, kind }),
            Header::If(condition) => {
                let body = parse_suite(lines, pos, indent, number)?;
                let mut branches = vec![(condition, body)];
                let mut otherwise = Vec::new();
                while let Some(next) = lines.get(*pos).filter(|l| l.indent == indent) {
                    let next_number = next.number;
                    match parse_header(next)? {
                        Header::Elif(condition) => {
                            *pos += 1;
                            let body = parse_suite(lines, pos, indent, next_number)?;
                            branches.push((condition, body));
                        }
                        Header::Else => {
                            *pos += 1;
                            otherwise = parse_suite(lines, pos, indent, next_number)?;
                            break;
                        }
                        _ => break,
                    }
                }
                statements.push(Statement {
                    line: number,
                    kind: StatementKind::If {
                        branches,
                        otherwise,
                    },
                });
            }
            Header::Elif(_) => return Err(ParseError::new(number, "'elif' without 'if'")),
            Header::Else => return Err(ParseError::new(number, "'else' without 'if'")),
        }
    }
    Ok(statements)
}

fn parse_suite(
    lines: &[LogicalLine],
    pos: &mut usize,
    parent_indent: usize,
    header_line: usize,
) -> Result<Vec<Statement>, ParseError> {
    match lines.get(*pos) {
        Some(next) if next.indent > parent_indent => parse_block(lines, pos, next.indent),
        _ => Err(ParseError::new(
            header_line,
            "expected an indented block",
        )),
    }
}

fn header(i: &str) -> IResult<&str, Header> {
    alt((
        map(
            delimited(keyword("if"), expr, ws(char(':'))),
            Header::If,
        ),
        map(
            delimited(keyword("elif"), expr, ws(char(':'))),
            Header::Elif,
        ),
        value(Header::Else, pair(keyword("else"), ws(char(':')))),
        value(Header::Simple(StatementKind::Pass), keyword("pass")),
        map(
            separated_pair(name, ws(assign_op), expr),
            |(name, value)| Header::Simple(StatementKind::Assign { name, value }),
        ),
        map(call, |c| Header::Simple(StatementKind::Call(c))),
        // bare string literals are documentation
        value(Header::Simple(StatementKind::Pass), string_literal),
    ))(i)
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag(word),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

fn assign_op(i: &str) -> IResult<&str, char> {
    terminated(char('='), not(char('=')))(i)
}

fn identifier(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(i)
}

fn name(i: &str) -> IResult<&str, String> {
    map(
        verify(identifier, |s: &str| !KEYWORDS.contains(&s)),
        String::from,
    )(i)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('"' | '\''))) => c,
        _ => return Err(nom::Err::Error(NomError::new(input, ErrorKind::Char))),
    };
    let mut out = String::new();
    let mut escaped = false;
    for (index, c) in chars {
        if escaped {
            match c {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '\\' | '"' | '\'' => out.push(c),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[index + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Char)))
}

enum Argument {
    Positional(Expr),
    Keyword(String, Expr),
}

fn argument(i: &str) -> IResult<&str, Argument> {
    alt((
        map(separated_pair(ws(name), assign_op, expr), |(k, v)| {
            Argument::Keyword(k, v)
        }),
        map(expr, Argument::Positional),
    ))(i)
}

fn call(i: &str) -> IResult<&str, Call> {
    let (i, name) = name(i)?;
    let (i, _) = ws(char('('))(i)?;
    let (i, arguments) = separated_list0(ws(char(',')), argument)(i)?;
    let (i, _) = opt(ws(char(',')))(i)?;
    let (i, _) = char(')')(i)?;

    let mut call = Call {
        name,
        args: Vec::new(),
        kwargs: Vec::new(),
    };
    for argument in arguments {
        match argument {
            Argument::Positional(e) if call.kwargs.is_empty() => call.args.push(e),
            Argument::Positional(_) => {
                return Err(nom::Err::Failure(NomError::new(i, ErrorKind::Verify)));
            }
            Argument::Keyword(k, v) => call.kwargs.push((k, v)),
        }
    }
    Ok((i, call))
}

fn list(i: &str) -> IResult<&str, Vec<Expr>> {
    delimited(
        ws(char('[')),
        terminated(separated_list0(ws(char(',')), expr), opt(ws(char(',')))),
        char(']'),
    )(i)
}

fn atom(i: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(string_literal, Expr::Str),
        value(Expr::None, keyword("None")),
        value(Expr::Bool(true), keyword("True")),
        value(Expr::Bool(false), keyword("False")),
        map(list, Expr::List),
        map(call, Expr::Call),
        map(name, Expr::Name),
        delimited(char('('), expr, char(')')),
    )))(i)
}

fn concat(i: &str) -> IResult<&str, Expr> {
    let (i, first) = atom(i)?;
    fold_many0(
        preceded(ws(char('+')), atom),
        move || first.clone(),
        |acc, e| Expr::Concat(Box::new(acc), Box::new(e)),
    )(i)
}

fn compare_op(i: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::In, keyword("in")),
    ))(i)
}

fn comparison(i: &str) -> IResult<&str, Expr> {
    let (i, left) = concat(i)?;
    let (i, rest) = opt(pair(ws(compare_op), concat))(i)?;
    Ok(match rest {
        Some((op, right)) => (i, Expr::Compare(op, Box::new(left), Box::new(right))),
        None => (i, left),
    })
}

fn not_expr(i: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(keyword("not")), not_expr), |e| {
            Expr::Not(Box::new(e))
        }),
        comparison,
    ))(i)
}

fn and_expr(i: &str) -> IResult<&str, Expr> {
    let (i, first) = not_expr(i)?;
    fold_many0(
        preceded(ws(keyword("and")), not_expr),
        move || first.clone(),
        |acc, e| Expr::And(Box::new(acc), Box::new(e)),
    )(i)
}

fn expr(i: &str) -> IResult<&str, Expr> {
    let (i, first) = and_expr(i)?;
    fold_many0(
        preceded(ws(keyword("or")), and_expr),
        move || first.clone(),
        |acc, e| Expr::Or(Box::new(acc), Box::new(e)),
    )(i)
}
