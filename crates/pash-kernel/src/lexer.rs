//! Lexer for pash source code.
//!
//! Converts source text into a stream of tokens using the logos lexer generator.
//! Every valid input produces exactly one token sequence; invalid input produces
//! positioned errors and no tokens.
//!
//! # Token Categories
//!
//! - **Keywords**: `if`, `elseif`, `else`, `while`, `for`, `foreach`, `function`, … (case-insensitive)
//! - **Literals**: numbers (with `L`/`D` suffixes and `0x` hex), expandable `"…"`,
//!   verbatim `'…'`, and here-strings `@"…"@` / `@'…'@`
//! - **Operators**: `+ - * / % = += -= *= /= %= , .. ! | & ?` and `-name` operators
//! - **Punctuation**: `( ) { } [ ] @( @{ $( ; . ::`
//! - **Variables**: `$name`, `$scope:name`, `${any text}`
//! - **Words**: command names, parameters (`-Name`), paths, type literals (`[int]`)

use bigdecimal::BigDecimal;
use logos::{Logos, Span};
use std::fmt;
use std::str::FromStr;

/// A token with its span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    UnterminatedHereString,
    UnterminatedSubExpression,
    InvalidNumber(String),
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexerError::UnterminatedString => write!(f, "unterminated string"),
            LexerError::UnterminatedHereString => write!(f, "unterminated here-string"),
            LexerError::UnterminatedSubExpression => {
                write!(f, "unterminated $( ) inside string")
            }
            LexerError::InvalidNumber(s) => write!(f, "invalid number: {}", s),
        }
    }
}

impl std::error::Error for LexerError {}

/// A numeric literal, already placed on the numeric tower.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(BigDecimal),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int32(n) => write!(f, "{}", n),
            Number::Int64(n) => write!(f, "{}L", n),
            Number::Double(n) => write!(f, "{}", n),
            Number::Decimal(d) => write!(f, "{}D", pash_types::format_decimal(d)),
        }
    }
}

/// Tokens produced by the pash lexer.
///
/// Keywords are literal tokens, so logos prefers them over the identifier
/// regex for the same text; longer identifiers (`if-then`) still win.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\f\r]+")]
pub enum Token {
    // ═══════════════════════════════════════════════════════════════════
    // Keywords
    // ═══════════════════════════════════════════════════════════════════
    #[token("if", ignore(ascii_case))]
    If,

    #[token("elseif", ignore(ascii_case))]
    ElseIf,

    #[token("else", ignore(ascii_case))]
    Else,

    #[token("while", ignore(ascii_case))]
    While,

    #[token("for", ignore(ascii_case))]
    For,

    #[token("foreach", ignore(ascii_case))]
    ForEach,

    #[token("in", ignore(ascii_case))]
    In,

    #[token("function", ignore(ascii_case))]
    Function,

    #[token("filter", ignore(ascii_case))]
    Filter,

    #[token("param", ignore(ascii_case))]
    Param,

    #[token("begin", ignore(ascii_case))]
    Begin,

    #[token("process", ignore(ascii_case))]
    Process,

    #[token("end", ignore(ascii_case))]
    End,

    #[token("return", ignore(ascii_case))]
    Return,

    #[token("break", ignore(ascii_case))]
    Break,

    #[token("continue", ignore(ascii_case))]
    Continue,

    #[token("throw", ignore(ascii_case))]
    Throw,

    #[token("try", ignore(ascii_case))]
    Try,

    #[token("catch", ignore(ascii_case))]
    Catch,

    #[token("finally", ignore(ascii_case))]
    Finally,

    // ═══════════════════════════════════════════════════════════════════
    // Multi-character operators (must come before single-char versions)
    // ═══════════════════════════════════════════════════════════════════
    #[token("+=")]
    PlusEq,

    #[token("-=")]
    MinusEq,

    #[token("*=")]
    StarEq,

    #[token("/=")]
    SlashEq,

    #[token("%=")]
    PercentEq,

    #[token("..")]
    DotDot,

    #[token("::")]
    ColonColon,

    #[token("@(")]
    AtParen,

    #[token("@{")]
    AtBrace,

    #[token("$(")]
    DollarParen,

    // ═══════════════════════════════════════════════════════════════════
    // Single-character operators and punctuation
    // ═══════════════════════════════════════════════════════════════════
    #[token("=")]
    Eq,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("!")]
    Bang,

    #[token("|")]
    Pipe,

    #[token("&")]
    Amp,

    #[token("?")]
    Question,

    #[token(",")]
    Comma,

    #[token(";")]
    Semi,

    #[token(".")]
    Dot,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    // ═══════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════

    /// Numeric literal, already typed: `42`, `42L`, `4.2`, `4.20D`, `0x2A`
    #[regex(r"0[xX][0-9a-fA-F]+[lL]?", lex_hex)]
    #[regex(r"[0-9]+[lL]", lex_long)]
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?[dD]", lex_decimal)]
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", lex_double)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", lex_double)]
    #[regex(r"[0-9]+", lex_int)]
    Number(Number),

    /// Expandable string `"..."`: raw content between the quotes.
    /// Escapes and `$` expansion are handled by [`split_expandable`].
    #[regex(r#""([^"`]|`[\s\S]|"")*""#, lex_expandable)]
    ExpandableString(String),

    /// Verbatim string `'...'`: the text between the quotes, untouched
    /// except that `''` stands for one `'`.
    #[regex(r"'([^']|'')*'", lex_verbatim)]
    VerbatimString(String),

    /// Expandable here-string: `@"` newline ... newline `"@`
    #[regex(r#"@"[ \t]*\r?\n"#, lex_expandable_here)]
    ExpandableHereString(String),

    /// Verbatim here-string: `@'` newline ... newline `'@`
    #[regex(r"@'[ \t]*\r?\n", lex_verbatim_here)]
    VerbatimHereString(String),

    // ═══════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════

    /// `$name` or `$scope:name`; the value excludes the `$`
    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*(:[a-zA-Z_][a-zA-Z0-9_]*)?", lex_variable)]
    /// `${any text}`; the value is the text between the braces
    #[regex(r"\$\{[^}]+\}", lex_braced_variable)]
    Variable(String),

    // ═══════════════════════════════════════════════════════════════════
    // Words
    // ═══════════════════════════════════════════════════════════════════

    /// Type literal: `[int]`, `[byte[]]`, `[System.Math]`; the value is the name
    #[regex(r"\[[a-zA-Z_][a-zA-Z0-9_.]*(\[\])?\]", lex_type_literal)]
    TypeLiteral(String),

    /// Dash word: `-Name` as a parameter, or `-eq` as an operator
    #[regex(r"-[a-zA-Z_][a-zA-Z0-9_]*", lex_dash_word)]
    Parameter(String),

    /// Path-like word: `./run.sh`, `../bin/x`, `/usr/bin/env`, `~/notes`
    #[regex(r"(\.\.?|~)?/[a-zA-Z_.][a-zA-Z0-9_./+-]*", lex_word)]
    Path(String),

    /// Identifier or bareword: `Write-Output`, `ls`, `Length`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*(-[a-zA-Z][a-zA-Z0-9_]*)*", lex_word)]
    Ident(String),

    // ═══════════════════════════════════════════════════════════════════
    // Structural tokens
    // ═══════════════════════════════════════════════════════════════════

    /// Comment: `# ...` to end of line
    #[regex(r"#[^\n]*")]
    Comment,

    /// Block comment: `<# ... #>`
    #[regex(r"<#([^#]|#+[^#>])*#+>")]
    BlockComment,

    /// Newline (ends statements)
    #[token("\n")]
    Newline,

    /// Line continuation: backtick at end of line
    #[regex(r"`[ \t]*\r?\n")]
    LineContinuation,
}

impl Token {
    /// The source spelling of a keyword token, for places where keywords
    /// are accepted as plain words (command arguments, member names).
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            Token::If => "if",
            Token::ElseIf => "elseif",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::ForEach => "foreach",
            Token::In => "in",
            Token::Function => "function",
            Token::Filter => "filter",
            Token::Param => "param",
            Token::Begin => "begin",
            Token::Process => "process",
            Token::End => "end",
            Token::Return => "return",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Throw => "throw",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Finally => "finally",
            _ => return None,
        })
    }
}

fn lex_int(lex: &mut logos::Lexer<Token>) -> Result<Number, LexerError> {
    let text = lex.slice();
    if let Ok(n) = text.parse::<i32>() {
        return Ok(Number::Int32(n));
    }
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Number::Int64(n));
    }
    text.parse::<f64>()
        .map(Number::Double)
        .map_err(|_| LexerError::InvalidNumber(text.to_string()))
}

fn lex_long(lex: &mut logos::Lexer<Token>) -> Result<Number, LexerError> {
    let text = lex.slice();
    text[..text.len() - 1]
        .parse::<i64>()
        .map(Number::Int64)
        .map_err(|_| LexerError::InvalidNumber(text.to_string()))
}

fn lex_hex(lex: &mut logos::Lexer<Token>) -> Result<Number, LexerError> {
    let text = lex.slice();
    let long = text.ends_with(['l', 'L']);
    let digits = text[2..].trim_end_matches(['l', 'L']);
    let n = i64::from_str_radix(digits, 16)
        .map_err(|_| LexerError::InvalidNumber(text.to_string()))?;
    match i32::try_from(n) {
        Ok(small) if !long => Ok(Number::Int32(small)),
        _ => Ok(Number::Int64(n)),
    }
}

fn lex_decimal(lex: &mut logos::Lexer<Token>) -> Result<Number, LexerError> {
    let text = lex.slice();
    BigDecimal::from_str(&text[..text.len() - 1])
        .map(Number::Decimal)
        .map_err(|_| LexerError::InvalidNumber(text.to_string()))
}

fn lex_double(lex: &mut logos::Lexer<Token>) -> Result<Number, LexerError> {
    let text = lex.slice();
    text.parse::<f64>()
        .map(Number::Double)
        .map_err(|_| LexerError::InvalidNumber(text.to_string()))
}

/// Strip the quotes; the content stays raw until [`split_expandable`].
fn lex_expandable(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    s[1..s.len() - 1].to_string()
}

/// Strip the quotes and fold `''` to `'`. No other escapes.
fn lex_verbatim(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    s[1..s.len() - 1].replace("''", "'")
}

fn lex_expandable_here(lex: &mut logos::Lexer<Token>) -> Result<String, LexerError> {
    lex_here_body(lex, '"')
}

fn lex_verbatim_here(lex: &mut logos::Lexer<Token>) -> Result<String, LexerError> {
    lex_here_body(lex, '\'')
}

/// Consume a here-string body up to the closing line (`"@` or `'@` at the
/// start of a line). The newlines next to the delimiters are not content.
fn lex_here_body(lex: &mut logos::Lexer<Token>, quote: char) -> Result<String, LexerError> {
    let closer = format!("{}@", quote);
    let rest = lex.remainder();

    if rest.starts_with(&closer) {
        lex.bump(closer.len());
        return Ok(String::new());
    }

    let needle = format!("\n{}", closer);
    match rest.find(&needle) {
        Some(pos) => {
            let content = rest[..pos].strip_suffix('\r').unwrap_or(&rest[..pos]).to_string();
            lex.bump(pos + needle.len());
            Ok(content)
        }
        None => Err(LexerError::UnterminatedHereString),
    }
}

fn lex_variable(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice()[1..].to_string()
}

fn lex_braced_variable(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    s[2..s.len() - 1].to_string()
}

fn lex_type_literal(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    s[1..s.len() - 1].to_string()
}

fn lex_dash_word(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice()[1..].to_string()
}

fn lex_word(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice().to_string()
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(word) = self.keyword_text() {
            return f.write_str(word);
        }
        match self {
            Token::PlusEq => write!(f, "+="),
            Token::MinusEq => write!(f, "-="),
            Token::StarEq => write!(f, "*="),
            Token::SlashEq => write!(f, "/="),
            Token::PercentEq => write!(f, "%="),
            Token::DotDot => write!(f, ".."),
            Token::ColonColon => write!(f, "::"),
            Token::AtParen => write!(f, "@("),
            Token::AtBrace => write!(f, "@{{"),
            Token::DollarParen => write!(f, "$("),
            Token::Eq => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Bang => write!(f, "!"),
            Token::Pipe => write!(f, "|"),
            Token::Amp => write!(f, "&"),
            Token::Question => write!(f, "?"),
            Token::Comma => write!(f, ","),
            Token::Semi => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Number(n) => write!(f, "{}", n),
            Token::ExpandableString(s) => write!(f, "\"{}\"", s),
            Token::VerbatimString(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Token::ExpandableHereString(_) => write!(f, "@\"...\"@"),
            Token::VerbatimHereString(_) => write!(f, "@'...'@"),
            Token::Variable(name) => write!(f, "${}", name),
            Token::TypeLiteral(name) => write!(f, "[{}]", name),
            Token::Parameter(name) => write!(f, "-{}", name),
            Token::Path(p) => write!(f, "{}", p),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Comment | Token::BlockComment => write!(f, "#"),
            Token::Newline => write!(f, "newline"),
            Token::LineContinuation => write!(f, "`"),
            _ => Ok(()),
        }
    }
}

/// Tokenize source code into a vector of spanned tokens.
///
/// Comments and line continuations are dropped. Returns every lexer error
/// with its position rather than stopping at the first one.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, Vec<Spanned<LexerError>>> {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, span) in lexer.spanned() {
        match result {
            Ok(token) => {
                if !matches!(
                    token,
                    Token::Comment | Token::BlockComment | Token::LineContinuation
                ) {
                    tokens.push(Spanned::new(token, span));
                }
            }
            Err(err) => errors.push(Spanned::new(err, span)),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(tokens)
}

// ═══════════════════════════════════════════════════════════════════════════
// Expandable string content
// ═══════════════════════════════════════════════════════════════════════════

/// One piece of an expandable string.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    /// Literal text with escapes already applied.
    Text(String),
    /// A variable reference, as it would appear after `$` (`name`, `env:HOME`).
    Variable(String),
    /// Source text of a `$( ... )` subexpression.
    SubExpression(String),
}

/// Split the raw content of an expandable string into literal text,
/// variable references and subexpressions.
///
/// Backtick escapes (`` `n ``, `` `t ``, `` `$ ``, …) are applied. `""` is a
/// literal quote in ordinary strings; here-strings pass `doubled_quotes = false`.
pub fn split_expandable(raw: &str, doubled_quotes: bool) -> Result<Vec<Piece>, LexerError> {
    let mut pieces = Vec::new();
    let mut text = String::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '`' => {
                i += 1;
                if let Some(&escaped) = chars.get(i) {
                    text.push(match escaped {
                        '0' => '\0',
                        'a' => '\x07',
                        'b' => '\x08',
                        'f' => '\x0c',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        'v' => '\x0b',
                        other => other,
                    });
                }
                i += 1;
            }
            '"' if doubled_quotes && chars.get(i + 1) == Some(&'"') => {
                text.push('"');
                i += 2;
            }
            '$' => {
                let next = chars.get(i + 1).copied();
                match next {
                    Some('(') => {
                        let (inner, consumed) = take_subexpression(&chars[i + 2..])?;
                        flush(&mut pieces, &mut text);
                        pieces.push(Piece::SubExpression(inner));
                        i += 2 + consumed;
                    }
                    Some('{') => {
                        let close = chars[i + 2..].iter().position(|&c| c == '}');
                        match close {
                            Some(len) => {
                                flush(&mut pieces, &mut text);
                                let name: String = chars[i + 2..i + 2 + len].iter().collect();
                                pieces.push(Piece::Variable(name));
                                i += 3 + len;
                            }
                            None => {
                                text.push('$');
                                i += 1;
                            }
                        }
                    }
                    Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                        let (name, consumed) = take_variable_name(&chars[i + 1..]);
                        flush(&mut pieces, &mut text);
                        pieces.push(Piece::Variable(name));
                        i += 1 + consumed;
                    }
                    _ => {
                        text.push('$');
                        i += 1;
                    }
                }
            }
            _ => {
                text.push(ch);
                i += 1;
            }
        }
    }

    flush(&mut pieces, &mut text);
    Ok(pieces)
}

fn flush(pieces: &mut Vec<Piece>, text: &mut String) {
    if !text.is_empty() {
        pieces.push(Piece::Text(std::mem::take(text)));
    }
}

/// `name` or `scope:name`, stopping at the first character that cannot
/// continue the reference.
fn take_variable_name(chars: &[char]) -> (String, usize) {
    let ident_len = |from: usize| {
        chars[from..]
            .iter()
            .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
            .count()
    };

    let first = ident_len(0);
    let mut name: String = chars[..first].iter().collect();
    let mut consumed = first;

    if chars.get(first) == Some(&':') {
        let starts_ident = chars
            .get(first + 1)
            .map(|c| c.is_ascii_alphabetic() || *c == '_')
            .unwrap_or(false);
        if starts_ident {
            let second = ident_len(first + 1);
            name.push(':');
            name.extend(&chars[first + 1..first + 1 + second]);
            consumed = first + 1 + second;
        }
    }
    (name, consumed)
}

/// Scan to the `)` matching an opening `$(`, skipping nested parentheses
/// and quoted text. Returns the inner source and the characters consumed
/// including the closing parenthesis.
fn take_subexpression(chars: &[char]) -> Result<(String, usize), LexerError> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((chars[..i].iter().collect(), i + 1));
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    Err(LexerError::UnterminatedSubExpression)
}
