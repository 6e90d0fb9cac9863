//! Parser for pash source code.
//!
//! Transforms a token stream from the lexer into an Abstract Syntax Tree.
//! Uses chumsky for parser combinators.
//!
//! # Precedence (loosest to tightest)
//!
//! ```text
//! statement   assignment | keyword statement | pipeline
//! pipeline    element ( '|' command )*
//! logical     -and -or -xor
//! comparison  -eq -ne -gt -ge -lt -le -like -match -contains -in -replace -split -join …
//! additive    + -
//! multiply    * / %
//! format      -f
//! range       ..
//! comma       a, b, c
//! unary       - + ! -not ,x [type]x
//! postfix     .Member .Method() [index]
//! primary     literals, strings, variables, ( ), $( ), @( ), @{ }, { }, [Type]::Member
//! ```
//!
//! Whether a pipeline element is a command or an expression is decided by
//! its first token: a bareword, a path or `&` starts a command (argument
//! mode); anything else starts an expression.

use std::sync::Arc;

use crate::ast::{
    Arg, AssignOp, AssignValue, Assignment, BinaryOp, BlockBody, CatchClause, Command,
    CommandName, Expr, ForEachLoop, ForLoop, FunctionDef, FunctionKind, IfStmt, Literal,
    NamedBlocks, ParamDef, Pipeline, PipelineElement, Program, ScriptBlockAst, Stmt, StringPart,
    TryStmt, UnaryOp, VarRef, WhileLoop,
};
use crate::lexer::{self, Number, Piece, Token};
use chumsky::{input::ValueInput, prelude::*};

/// Span type used throughout the parser.
pub type Span = SimpleSpan;

type Extra<'tokens> = extra::Err<Rich<'tokens, Token, Span>>;

/// Parse error with location and context.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
    /// The error came from the lexer rather than the grammar.
    pub lexical: bool,
}

impl ParseError {
    /// One-based line and column of the error start within `source`.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let upto = source.get(..self.span.start).unwrap_or(source);
        let line = upto.matches('\n').count() + 1;
        let col = upto.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0) + 1;
        (line, col)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {:?}", self.message, self.span)
    }
}

impl std::error::Error for ParseError {}

/// Parse pash source code into a Program AST.
pub fn parse(source: &str) -> Result<Program, Vec<ParseError>> {
    let tokens = lexer::tokenize(source).map_err(|errs| {
        errs.into_iter()
            .map(|e| ParseError {
                span: (e.span.start..e.span.end).into(),
                message: format!("lexer error: {}", e.token),
                lexical: true,
            })
            .collect::<Vec<_>>()
    })?;
    parse_tokens(source, tokens)
}

/// Parse an already tokenized source. `source` must be the text the
/// tokens were produced from; script blocks keep slices of it.
pub fn parse_tokens(
    source: &str,
    tokens: Vec<lexer::Spanned<Token>>,
) -> Result<Program, Vec<ParseError>> {
    let tokens: Vec<(Token, Span)> = tokens
        .into_iter()
        .map(|spanned| (spanned.token, (spanned.span.start..spanned.span.end).into()))
        .collect();

    let end_span: Span = (source.len()..source.len()).into();

    let parser = program_parser(source);
    let result = parser.parse(tokens.as_slice().map(end_span, |(t, s)| (t, s)));

    result.into_result().map_err(|errs| {
        errs.into_iter()
            .map(|e| ParseError {
                span: *e.span(),
                message: e.to_string(),
                lexical: false,
            })
            .collect()
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn number_literal(n: Number) -> Literal {
    match n {
        Number::Int32(v) => Literal::Int32(v),
        Number::Int64(v) => Literal::Int64(v),
        Number::Double(v) => Literal::Double(v),
        Number::Decimal(d) => Literal::Decimal(d),
    }
}

/// `-5` in argument mode: a negative literal, widened if negation overflows.
fn negative_literal(n: Number) -> Literal {
    match n {
        Number::Int32(v) => v
            .checked_neg()
            .map(Literal::Int32)
            .unwrap_or(Literal::Int64(-(v as i64))),
        Number::Int64(v) => v
            .checked_neg()
            .map(Literal::Int64)
            .unwrap_or(Literal::Double(-(v as f64))),
        Number::Double(v) => Literal::Double(-v),
        Number::Decimal(d) => Literal::Decimal(-d),
    }
}

/// Turn the raw content of an expandable string into an expression.
/// Strings without any expansion collapse to a plain literal.
fn expand_string(raw: &str, doubled_quotes: bool) -> Result<Expr, String> {
    let pieces = lexer::split_expandable(raw, doubled_quotes).map_err(|e| e.to_string())?;
    let mut parts = Vec::with_capacity(pieces.len());
    for piece in pieces {
        parts.push(match piece {
            Piece::Text(text) => StringPart::Literal(text),
            Piece::Variable(name) => StringPart::Variable(VarRef::parse(&name)),
            Piece::SubExpression(source) => {
                let program = parse(&source).map_err(|errs| {
                    errs.iter()
                        .map(|e| e.message.clone())
                        .collect::<Vec<_>>()
                        .join("; ")
                })?;
                StringPart::SubExpr(program.statements)
            }
        });
    }

    match parts.as_slice() {
        [] => Ok(Expr::Literal(Literal::String(String::new()))),
        [StringPart::Literal(text)] => Ok(Expr::Literal(Literal::String(text.clone()))),
        _ => Ok(Expr::Expandable(parts)),
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Collapse a comma list: one item stays itself, more become an array.
fn comma_list(mut items: Vec<Expr>) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        Expr::Array(items)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parser Combinators - generic over input type
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level program parser.
fn program_parser<'tokens, I>(
    src: &'tokens str,
) -> impl Parser<'tokens, I, Program, Extra<'tokens>>
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    separators()
        .ignore_then(statement_parser(src).repeated().collect::<Vec<_>>())
        .map(|statements| Program { statements })
}

/// Statement separators: newlines and semicolons.
fn separators<'tokens, I>() -> impl Parser<'tokens, I, (), Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    choice((just(Token::Newline), just(Token::Semi))).repeated()
}

/// What must follow a statement: at least one separator, or the end of the
/// enclosing program, block, or group.
fn terminator<'tokens, I>() -> impl Parser<'tokens, I, (), Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    let closing = choice((just(Token::RBrace), just(Token::RParen))).rewind().ignored();
    choice((
        choice((just(Token::Newline), just(Token::Semi)))
            .repeated()
            .at_least(1),
        end(),
        closing,
    ))
    .labelled("end of statement")
}

fn newlines<'tokens, I>() -> impl Parser<'tokens, I, (), Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    just(Token::Newline).repeated()
}

/// Statement parser - dispatches on the leading token.
fn statement_parser<'tokens, I>(
    src: &'tokens str,
) -> impl Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    recursive(move |stmt| {
        let pipeline = pipeline_parser(src, stmt.clone());
        let item = item_parser(src, stmt.clone(), pipeline.clone());
        let postfix = postfix_expr_parser(src, stmt.clone(), pipeline.clone());
        let block = block_parser(stmt.clone());

        let condition = just(Token::LParen)
            .ignore_then(newlines())
            .ignore_then(pipeline.clone())
            .then_ignore(newlines())
            .then_ignore(just(Token::RParen))
            .labelled("condition");

        let assignment = assignment_parser(postfix, pipeline.clone());

        // Headers of `for (init; cond; step)` accept assignments or pipelines
        let simple = choice((
            assignment.clone().map(Stmt::Assignment),
            pipeline.clone().map(Stmt::Pipeline),
        ));

        let if_stmt = just(Token::If)
            .ignore_then(condition.clone())
            .then(block.clone())
            .then(
                newlines()
                    .ignore_then(just(Token::ElseIf))
                    .ignore_then(condition.clone())
                    .then(block.clone())
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then(
                newlines()
                    .ignore_then(just(Token::Else))
                    .ignore_then(block.clone())
                    .or_not(),
            )
            .map(|(((cond, body), elseifs), else_branch)| {
                let mut clauses = vec![(cond, body)];
                clauses.extend(elseifs);
                Stmt::If(IfStmt {
                    clauses,
                    else_branch,
                })
            })
            .labelled("if statement")
            .boxed();

        let while_stmt = just(Token::While)
            .ignore_then(condition.clone())
            .then(block.clone())
            .map(|(condition, body)| Stmt::While(WhileLoop { condition, body }))
            .labelled("while loop")
            .boxed();

        let for_stmt = just(Token::For)
            .ignore_then(just(Token::LParen))
            .ignore_then(newlines())
            .ignore_then(simple.clone().or_not())
            .then_ignore(just(Token::Semi))
            .then_ignore(newlines())
            .then(pipeline.clone().or_not())
            .then_ignore(just(Token::Semi))
            .then_ignore(newlines())
            .then(simple.or_not())
            .then_ignore(newlines())
            .then_ignore(just(Token::RParen))
            .then(block.clone())
            .map(|(((init, condition), step), body)| {
                Stmt::For(ForLoop {
                    init: init.map(Box::new),
                    condition,
                    step: step.map(Box::new),
                    body,
                })
            })
            .labelled("for loop")
            .boxed();

        let foreach_stmt = just(Token::ForEach)
            .ignore_then(just(Token::LParen))
            .ignore_then(select! { Token::Variable(name) => VarRef::parse(&name) })
            .then_ignore(just(Token::In))
            .then(pipeline.clone())
            .then_ignore(just(Token::RParen))
            .then(block.clone())
            .map(|((variable, items), body)| {
                Stmt::ForEach(ForEachLoop {
                    variable,
                    items,
                    body,
                })
            })
            .labelled("foreach loop")
            .boxed();

        let function_stmt = choice((
            just(Token::Function).to(FunctionKind::Function),
            just(Token::Filter).to(FunctionKind::Filter),
        ))
        .then(select! { Token::Ident(name) => name }.labelled("function name"))
        .then(param_list_parser(item.clone()).or_not())
        .then_ignore(newlines())
        .then(script_block_parser(src, stmt.clone(), item))
        .map(|(((kind, name), params), body)| {
            let body = match params {
                Some(mut params) => {
                    let mut merged = (*body).clone();
                    params.append(&mut merged.params);
                    merged.params = params;
                    Arc::new(merged)
                }
                None => body,
            };
            Stmt::Function(Arc::new(FunctionDef { name, kind, body }))
        })
        .labelled("function definition")
        .boxed();

        let return_stmt = just(Token::Return)
            .ignore_then(pipeline.clone().or_not())
            .map(Stmt::Return);

        let throw_stmt = just(Token::Throw)
            .ignore_then(pipeline.clone().or_not())
            .map(Stmt::Throw);

        let catch_clause = newlines()
            .ignore_then(just(Token::Catch))
            .ignore_then(
                select! { Token::TypeLiteral(name) => name }
                    .separated_by(just(Token::Comma))
                    .collect::<Vec<_>>(),
            )
            .then(block.clone())
            .map(|(types, body)| CatchClause { types, body });

        let try_stmt = just(Token::Try)
            .ignore_then(block.clone())
            .then(catch_clause.repeated().collect::<Vec<_>>())
            .then(
                newlines()
                    .ignore_then(just(Token::Finally))
                    .ignore_then(block)
                    .or_not(),
            )
            .try_map(|((body, catches), finally), span| {
                if catches.is_empty() && finally.is_none() {
                    return Err(Rich::custom(
                        span,
                        "try block needs a catch or finally block",
                    ));
                }
                Ok(Stmt::Try(TryStmt {
                    body,
                    catches,
                    finally,
                }))
            })
            .labelled("try statement")
            .boxed();

        choice((
            if_stmt,
            while_stmt,
            for_stmt,
            foreach_stmt,
            function_stmt,
            return_stmt,
            just(Token::Break).to(Stmt::Break),
            just(Token::Continue).to(Stmt::Continue),
            throw_stmt,
            try_stmt,
            assignment.map(Stmt::Assignment),
            pipeline.map(Stmt::Pipeline),
        ))
        .then_ignore(terminator())
        .boxed()
    })
}

/// `{ statements }` as the body of a keyword statement. Newlines before the
/// brace are allowed.
fn block_parser<'tokens, I, S>(
    stmt: S,
) -> impl Parser<'tokens, I, Vec<Stmt>, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
{
    newlines()
        .ignore_then(just(Token::LBrace))
        .ignore_then(separators())
        .ignore_then(stmt.repeated().collect::<Vec<_>>())
        .then_ignore(just(Token::RBrace))
        .labelled("block")
        .boxed()
}

/// Assignment: `target op value`, right-associative so `$a = $b = 1` nests.
fn assignment_parser<'tokens, I, X, P>(
    postfix: X,
    pipeline: P,
) -> impl Parser<'tokens, I, Assignment, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
    P: Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone + 'tokens,
{
    let op = select! {
        Token::Eq => AssignOp::Assign,
        Token::PlusEq => AssignOp::Add,
        Token::MinusEq => AssignOp::Sub,
        Token::StarEq => AssignOp::Mul,
        Token::SlashEq => AssignOp::Div,
        Token::PercentEq => AssignOp::Rem,
    };

    // Only variable-led statements can be assignments
    let target = select! { Token::Variable(_) => () }
        .rewind()
        .ignore_then(postfix)
        .try_map(|target, span| match target {
            Expr::Variable(_) | Expr::Index { .. } | Expr::Member { .. } => Ok(target),
            _ => Err(Rich::custom(span, "cannot assign to this expression")),
        });

    recursive(move |assignment| {
        let value = choice((
            assignment.map(AssignValue::Assignment),
            pipeline.clone().map(AssignValue::Pipeline),
        ));

        target
            .clone()
            .then(op)
            .then_ignore(newlines())
            .then(value)
            .map(|((target, op), value)| Assignment {
                target,
                op,
                value: Box::new(value),
            })
    })
    .labelled("assignment")
    .boxed()
}

/// `( [type]$a = default, $b )`
fn param_list_parser<'tokens, I, X>(
    item: X,
) -> impl Parser<'tokens, I, Vec<ParamDef>, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let param = select! { Token::TypeLiteral(name) => name }
        .then_ignore(newlines())
        .or_not()
        .then(select! { Token::Variable(name) => name })
        .then(just(Token::Eq).ignore_then(item).or_not())
        .map(|((type_name, name), default)| ParamDef {
            name,
            type_name,
            default,
        })
        .labelled("parameter");

    just(Token::LParen)
        .ignore_then(separators())
        .ignore_then(
            param
                .separated_by(just(Token::Comma).then_ignore(separators()))
                .collect::<Vec<_>>(),
        )
        .then_ignore(separators())
        .then_ignore(just(Token::RParen))
        .boxed()
}

/// `{ [param(...)] body }` where the body is plain statements or
/// `begin`/`process`/`end` blocks.
fn script_block_parser<'tokens, I, S, X>(
    src: &'tokens str,
    stmt: S,
    item: X,
) -> impl Parser<'tokens, I, Arc<ScriptBlockAst>, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let param_block = just(Token::Param)
        .ignore_then(param_list_parser(item))
        .then_ignore(separators());

    let named_block = select! {
        Token::Begin => 0usize,
        Token::Process => 1usize,
        Token::End => 2usize,
    }
    .then(block_parser(stmt.clone()))
    .then_ignore(separators());

    let named = named_block
        .repeated()
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|blocks| {
            let mut named = NamedBlocks::default();
            for (which, body) in blocks {
                match which {
                    0 => named.begin = Some(body),
                    1 => named.process = Some(body),
                    _ => named.end = Some(body),
                }
            }
            BlockBody::Named(named)
        });

    let plain = stmt.repeated().collect::<Vec<_>>().map(BlockBody::Plain);

    just(Token::LBrace)
        .ignore_then(separators())
        .ignore_then(param_block.or_not())
        .then(choice((named, plain)))
        .then_ignore(just(Token::RBrace))
        .map_with(move |(params, body), e| {
            let span: Span = e.span();
            let text = src
                .get(span.start + 1..span.end.saturating_sub(1))
                .unwrap_or_default()
                .to_string();
            Arc::new(ScriptBlockAst {
                params: params.unwrap_or_default(),
                body,
                text,
            })
        })
        .labelled("script block")
        .boxed()
}

/// Pipeline: `element ( | command )*`.
fn pipeline_parser<'tokens, I, S>(
    src: &'tokens str,
    stmt: S,
) -> impl Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
{
    recursive(move |pipeline| {
        let expr = expr_parser(src, stmt.clone(), pipeline.clone());
        let postfix = postfix_expr_parser(src, stmt.clone(), pipeline);
        let args = argument_parser(postfix.clone()).repeated().collect::<Vec<_>>();

        let first_name = choice((
            select! {
                Token::Ident(name) => CommandName::Bare(name),
                Token::Path(path) => CommandName::Bare(path),
            },
            just(Token::Amp)
                .ignore_then(postfix)
                .map(CommandName::Dynamic),
        ))
        .labelled("command name");

        // After a pipe, keywords (`foreach`) and `%`/`?` are command names too
        let later_name = choice((
            first_name.clone(),
            any().try_map(|token: Token, span| match token {
                Token::Percent => Ok(CommandName::Bare("%".to_string())),
                Token::Question => Ok(CommandName::Bare("?".to_string())),
                other => other
                    .keyword_text()
                    .map(|word| CommandName::Bare(word.to_string()))
                    .ok_or_else(|| Rich::custom(span, format!("expected a command, found {}", other))),
            }),
        ));

        let first = choice((
            first_name
                .then(args.clone())
                .map(|(name, args)| PipelineElement::Command(Command { name, args })),
            expr.map(PipelineElement::Expression),
        ));

        let later = later_name
            .then(args)
            .map(|(name, args)| PipelineElement::Command(Command { name, args }));

        first
            .then(
                just(Token::Pipe)
                    .ignore_then(newlines())
                    .ignore_then(later)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(first, rest)| {
                let mut elements = Vec::with_capacity(rest.len() + 1);
                elements.push(first);
                elements.extend(rest);
                Pipeline { elements }
            })
            .labelled("pipeline")
    })
    .boxed()
}

/// One command argument in argument mode.
///
/// Barewords become strings, `-Name` is a parameter, `-5` is a negative
/// number, and comma-joined values become one array argument.
fn argument_parser<'tokens, I, X>(
    postfix: X,
) -> impl Parser<'tokens, I, Arg, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let word = any().try_map(|token: Token, span| match token {
        Token::Ident(word) | Token::Path(word) => Ok(word),
        other => other
            .keyword_text()
            .map(str::to_string)
            .ok_or_else(|| Rich::custom(span, format!("expected an argument, found {}", other))),
    });

    // `file.txt` is one bareword, not member access on `file`
    let bareword = word
        .clone()
        .foldl(
            just(Token::Dot).ignore_then(word).repeated(),
            |mut acc, next| {
                acc.push('.');
                acc.push_str(&next);
                acc
            },
        )
        .map(|word| Expr::Literal(Literal::String(word)));

    let negative = just(Token::Minus)
        .ignore_then(select! { Token::Number(n) => n })
        .map(|n| Expr::Literal(negative_literal(n)));

    let value = choice((negative, bareword, postfix))
        .separated_by(just(Token::Comma).then_ignore(newlines()))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(comma_list);

    choice((
        select! { Token::Parameter(name) => Arg::Parameter(name) },
        value.map(Arg::Positional),
    ))
    .labelled("argument")
    .boxed()
}

/// Full expression, comma level included.
fn expr_parser<'tokens, I, S, P>(
    src: &'tokens str,
    stmt: S,
    pipeline: P,
) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    P: Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone + 'tokens,
{
    let item = item_parser(src, stmt.clone(), pipeline.clone());
    let unary = unary_parser(src, stmt, pipeline, item);

    let comma = unary
        .separated_by(just(Token::Comma).then_ignore(newlines()))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(comma_list);

    binary_levels(comma)
}

/// Expression without the comma level, for places where a comma separates:
/// method arguments, index lists, parameter defaults, hash keys.
fn item_parser<'tokens, I, S, P>(
    src: &'tokens str,
    stmt: S,
    pipeline: P,
) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    P: Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone + 'tokens,
{
    recursive(move |item| binary_levels(unary_parser(src, stmt.clone(), pipeline.clone(), item)))
        .boxed()
}

/// Postfix expression on its own: argument values and assignment targets.
fn postfix_expr_parser<'tokens, I, S, P>(
    src: &'tokens str,
    stmt: S,
    pipeline: P,
) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    P: Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone + 'tokens,
{
    let item = item_parser(src, stmt.clone(), pipeline.clone());
    postfix_parser(primary_parser(src, stmt, pipeline, item.clone()), item)
}

/// Binary operator levels from range up to the logical operators, all
/// left-associative.
fn binary_levels<'tokens, I, O>(
    operand: O,
) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    O: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let range = operand
        .clone()
        .foldl(
            just(Token::DotDot)
                .ignore_then(newlines())
                .ignore_then(operand)
                .repeated(),
            |left, right| binary(BinaryOp::Range, left, right),
        )
        .boxed();

    let format = range
        .clone()
        .foldl(
            dash_operator(|op| op == BinaryOp::Format)
                .then_ignore(newlines())
                .then(range)
                .repeated(),
            |left, (op, right)| binary(op, left, right),
        )
        .boxed();

    let mul_op = select! {
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Percent => BinaryOp::Rem,
    };
    let multiplicative = format
        .clone()
        .foldl(
            mul_op.then_ignore(newlines()).then(format).repeated(),
            |left, (op, right)| binary(op, left, right),
        )
        .boxed();

    let add_op = select! {
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
    };
    let additive = multiplicative
        .clone()
        .foldl(
            add_op.then_ignore(newlines()).then(multiplicative).repeated(),
            |left, (op, right)| binary(op, left, right),
        )
        .boxed();

    let comparison = additive
        .clone()
        .foldl(
            dash_operator(BinaryOp::is_comparison)
                .then_ignore(newlines())
                .then(additive)
                .repeated(),
            |left, (op, right)| binary(op, left, right),
        )
        .boxed();

    comparison
        .clone()
        .foldl(
            dash_operator(BinaryOp::is_logical)
                .then_ignore(newlines())
                .then(comparison)
                .repeated(),
            |left, (op, right)| binary(op, left, right),
        )
        .labelled("expression")
        .boxed()
}

/// A `-name` operator accepted by `allowed`.
fn dash_operator<'tokens, I>(
    allowed: fn(BinaryOp) -> bool,
) -> impl Parser<'tokens, I, BinaryOp, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    select! { Token::Parameter(name) => name }.try_map(move |name, span| {
        BinaryOp::from_dash_name(&name)
            .filter(|op| allowed(*op))
            .ok_or_else(|| Rich::custom(span, format!("unexpected operator -{}", name)))
    })
}

/// Unary operators and casts over a postfix expression.
fn unary_parser<'tokens, I, S, P, X>(
    src: &'tokens str,
    stmt: S,
    pipeline: P,
    item: X,
) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    P: Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone + 'tokens,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let postfix = postfix_parser(primary_parser(src, stmt, pipeline, item.clone()), item);

    let op = choice((
        just(Token::Minus).to(UnaryOp::Neg),
        just(Token::Plus).to(UnaryOp::Plus),
        just(Token::Bang).to(UnaryOp::Not),
        just(Token::Comma).to(UnaryOp::Comma),
        select! { Token::Parameter(name) if name.eq_ignore_ascii_case("not") => UnaryOp::Not },
    ));

    recursive(move |unary| {
        choice((
            op.then(unary.clone()).map(|(op, operand)| Expr::Unary {
                op,
                operand: Box::new(operand),
            }),
            // `[int]$x`; a bare `[int]` falls through to the primary
            select! { Token::TypeLiteral(name) => name }
                .then(unary)
                .map(|(type_name, operand)| Expr::Cast {
                    type_name,
                    operand: Box::new(operand),
                }),
            postfix.clone(),
        ))
    })
    .boxed()
}

enum Postfix {
    Member(String),
    Method(String, Vec<Expr>),
    Index(Expr),
}

/// Member name after `.` or `::`. Keywords and quoted names are allowed.
fn member_name_parser<'tokens, I>() -> impl Parser<'tokens, I, String, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    any()
        .try_map(|token: Token, span| match token {
            Token::Ident(name) | Token::VerbatimString(name) | Token::ExpandableString(name) => {
                Ok(name)
            }
            other => other
                .keyword_text()
                .map(str::to_string)
                .ok_or_else(|| Rich::custom(span, format!("expected a member name, found {}", other))),
        })
        .labelled("member name")
}

/// `( item, item, ... )`
fn call_args_parser<'tokens, I, X>(
    item: X,
) -> impl Parser<'tokens, I, Vec<Expr>, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    just(Token::LParen)
        .ignore_then(newlines())
        .ignore_then(
            item.separated_by(just(Token::Comma).then_ignore(newlines()))
                .collect::<Vec<_>>(),
        )
        .then_ignore(newlines())
        .then_ignore(just(Token::RParen))
        .labelled("arguments")
}

fn postfix_parser<'tokens, I, Q, X>(
    primary: Q,
    item: X,
) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    Q: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let member = just(Token::Dot)
        .ignore_then(member_name_parser())
        .then(call_args_parser(item.clone()).or_not())
        .map(|(name, args)| match args {
            Some(args) => Postfix::Method(name, args),
            None => Postfix::Member(name),
        });

    let index = just(Token::LBracket)
        .ignore_then(newlines())
        .ignore_then(
            item.separated_by(just(Token::Comma).then_ignore(newlines()))
                .at_least(1)
                .collect::<Vec<_>>()
                .map(comma_list),
        )
        .then_ignore(newlines())
        .then_ignore(just(Token::RBracket))
        .map(Postfix::Index);

    primary
        .foldl(choice((member, index)).repeated(), |target, op| match op {
            Postfix::Member(name) => Expr::Member {
                target: Box::new(target),
                name,
            },
            Postfix::Method(name, args) => Expr::MethodCall {
                target: Box::new(target),
                name,
                args,
            },
            Postfix::Index(index) => Expr::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
        })
        .boxed()
}

/// Primary expressions.
fn primary_parser<'tokens, I, S, P, X>(
    src: &'tokens str,
    stmt: S,
    pipeline: P,
    item: X,
) -> impl Parser<'tokens, I, Expr, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    S: Parser<'tokens, I, Stmt, Extra<'tokens>> + Clone + 'tokens,
    P: Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone + 'tokens,
    X: Parser<'tokens, I, Expr, Extra<'tokens>> + Clone + 'tokens,
{
    let literal = select! {
        Token::Number(n) => Expr::Literal(number_literal(n)),
        Token::VerbatimString(s) => Expr::Literal(Literal::String(s)),
        Token::VerbatimHereString(s) => Expr::Literal(Literal::String(s)),
    };

    let expandable = select! {
        Token::ExpandableString(raw) => (raw, true),
        Token::ExpandableHereString(raw) => (raw, false),
    }
    .try_map(|(raw, doubled_quotes), span| {
        expand_string(&raw, doubled_quotes).map_err(|message| Rich::custom(span, message))
    })
    .labelled("string");

    let variable = select! {
        Token::Variable(name) => Expr::Variable(VarRef::parse(&name)),
    }
    .labelled("variable");

    let statements = separators().ignore_then(stmt.clone().repeated().collect::<Vec<_>>());

    let paren = just(Token::LParen)
        .ignore_then(newlines())
        .ignore_then(pipeline.clone())
        .then_ignore(newlines())
        .then_ignore(just(Token::RParen))
        .map(|p| Expr::Paren(Box::new(p)));

    let subexpr = just(Token::DollarParen)
        .ignore_then(statements.clone())
        .then_ignore(just(Token::RParen))
        .map(Expr::SubExpr);

    let array_sub = just(Token::AtParen)
        .ignore_then(statements)
        .then_ignore(just(Token::RParen))
        .map(Expr::ArraySub);

    // Hash keys: barewords or expressions
    let hash_key = choice((
        any().try_map(|token: Token, span| match token {
            Token::Ident(word) => Ok(Expr::Literal(Literal::String(word))),
            other => other
                .keyword_text()
                .map(|word| Expr::Literal(Literal::String(word.to_string())))
                .ok_or_else(|| Rich::custom(span, "expected a key")),
        }),
        item.clone(),
    ));
    let hash = just(Token::AtBrace)
        .ignore_then(separators())
        .ignore_then(
            hash_key
                .then_ignore(just(Token::Eq))
                .then_ignore(newlines())
                .then(pipeline)
                .then_ignore(terminator())
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(just(Token::RBrace))
        .map(Expr::Hash)
        .labelled("hash literal");

    let script_block = script_block_parser(src, stmt, item.clone()).map(Expr::ScriptBlock);

    let type_name = select! { Token::TypeLiteral(name) => name };

    let static_access = type_name
        .clone()
        .then_ignore(just(Token::ColonColon))
        .then(member_name_parser())
        .then(call_args_parser(item).or_not())
        .map(|((type_name, name), args)| match args {
            Some(args) => Expr::StaticCall {
                type_name,
                name,
                args,
            },
            None => Expr::StaticMember { type_name, name },
        });

    choice((
        literal,
        expandable,
        variable,
        paren,
        subexpr,
        array_sub,
        hash,
        script_block,
        static_access,
        type_name.map(Expr::TypeLiteral),
    ))
    .labelled("expression")
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::sexpr::format_program;

    fn sexpr(source: &str) -> String {
        format_program(&parse(source).expect("parse ok"))
    }

    #[test]
    fn pipe_binds_loosest() {
        assert_eq!(
            sexpr("1 + 2 | Write-Output"),
            "(pipe (+ 1 2) (cmd Write-Output))"
        );
    }

    #[test]
    fn multiplication_before_addition() {
        assert_eq!(sexpr("1 + 2 * 3"), "(+ 1 (* 2 3))");
    }

    #[test]
    fn comma_binds_tighter_than_arithmetic() {
        assert_eq!(sexpr("1,2 * 2"), "(* (array 1 2) 2)");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(sexpr("$a = $b = 5"), "(= $a (= $b 5))");
    }

    #[test]
    fn argument_mode_barewords() {
        assert_eq!(
            sexpr("Get-Thing file.txt -Name x,y -5"),
            r#"(cmd Get-Thing "file.txt" -Name (array "x" "y") -5)"#
        );
    }

    #[test]
    fn cast_versus_static_member() {
        assert_eq!(sexpr("[int]'5'"), r#"(cast [int] "5")"#);
        assert_eq!(sexpr("[Math]::PI"), "(:: [Math] PI)");
        assert_eq!(sexpr("[int]"), "[int]");
    }

    #[test]
    fn script_block_keeps_text() {
        let program = parse("{ $_ * 2 }").expect("parse ok");
        let Stmt::Pipeline(p) = &program.statements[0] else {
            panic!("expected pipeline");
        };
        let Some(Expr::ScriptBlock(sb)) = p.as_expression() else {
            panic!("expected script block");
        };
        assert_eq!(sb.text, " $_ * 2 ");
    }

    #[test]
    fn lexer_errors_are_flagged() {
        let errors = parse("1 + ^").expect_err("should fail");
        assert!(errors[0].lexical);
        assert_eq!(errors[0].line_col("1 + ^"), (1, 5));
    }

    #[test]
    fn unclosed_block_is_an_error() {
        let errors = parse("if ($x) { 1").expect_err("should fail");
        assert!(!errors[0].lexical);
    }
}
