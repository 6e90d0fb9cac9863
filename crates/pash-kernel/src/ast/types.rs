//! AST type definitions.

use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;

/// A complete pash program is a sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Pipeline: `1,2,3 | Where-Object { $_ -gt 1 }`
    Pipeline(Pipeline),
    /// Assignment: `$x = ...`, `$a[0] += 1`, `$h.Name = 'n'`
    Assignment(Assignment),
    /// Conditional: `if (c) { } elseif (d) { } else { }`
    If(IfStmt),
    /// `while (c) { }`
    While(WhileLoop),
    /// `for (init; cond; step) { }`
    For(ForLoop),
    /// `foreach ($x in items) { }`
    ForEach(ForEachLoop),
    /// `function Name { }` or `filter Name { }`
    Function(Arc<FunctionDef>),
    /// `return [pipeline]`
    Return(Option<Pipeline>),
    Break,
    Continue,
    /// `throw [pipeline]`
    Throw(Option<Pipeline>),
    /// `try { } catch { } finally { }`
    Try(TryStmt),
}

/// Assignment target with its operator and right side.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// A variable, an index expression or a member expression.
    pub target: Expr,
    pub op: AssignOp,
    pub value: Box<AssignValue>,
}

/// Right side of an assignment. `$a = $b = 5` nests.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    Pipeline(Pipeline),
    Assignment(Assignment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignOp::Assign => write!(f, "="),
            AssignOp::Add => write!(f, "+="),
            AssignOp::Sub => write!(f, "-="),
            AssignOp::Mul => write!(f, "*="),
            AssignOp::Div => write!(f, "/="),
            AssignOp::Rem => write!(f, "%="),
        }
    }
}

/// `if`/`elseif` clauses in order, then the optional `else`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub clauses: Vec<(Pipeline, Vec<Stmt>)>,
    pub else_branch: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub condition: Pipeline,
    pub body: Vec<Stmt>,
}

/// C-style loop. Each header part is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Pipeline>,
    pub step: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachLoop {
    pub variable: VarRef,
    pub items: Pipeline,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    /// A filter's plain body runs once per input object.
    Filter,
}

/// A named function or filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub kind: FunctionKind,
    /// Parameters from `function f($a, $b)` are merged into `body.params`.
    pub body: Arc<ScriptBlockAst>,
}

/// The body of a `{ ... }` script block or function.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBlockAst {
    pub params: Vec<ParamDef>,
    pub body: BlockBody,
    /// Source text between the braces.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockBody {
    /// Statements with no named blocks.
    Plain(Vec<Stmt>),
    /// `begin { } process { } end { }`
    Named(NamedBlocks),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedBlocks {
    pub begin: Option<Vec<Stmt>>,
    pub process: Option<Vec<Stmt>>,
    pub end: Option<Vec<Stmt>>,
}

/// Parameter declaration: `[int]$count = 1`
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub type_name: Option<String>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Vec<Stmt>,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Vec<Stmt>>,
}

/// `catch [Type1], [Type2] { }`. An empty type list catches everything.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub types: Vec<String>,
    pub body: Vec<Stmt>,
}

/// Pipeline elements joined by `|`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub elements: Vec<PipelineElement>,
}

impl Pipeline {
    /// True if any element is a command (as opposed to a pure expression).
    pub fn has_command(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, PipelineElement::Command(_)))
    }

    /// The expression, when this pipeline is a single expression.
    pub fn as_expression(&self) -> Option<&Expr> {
        match self.elements.as_slice() {
            [PipelineElement::Expression(expr)] => Some(expr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineElement {
    /// Only valid in first position.
    Expression(Expr),
    Command(Command),
}

/// A command invocation in argument mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: CommandName,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandName {
    /// `Write-Output`, `./run.sh`
    Bare(String),
    /// `& $block`, `& 'name with spaces'`
    Dynamic(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    /// `-Name` (the value, if any, is the next positional)
    Parameter(String),
}

/// An expression that evaluates to a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// `"Hello $name"` with its parts.
    Expandable(Vec<StringPart>),
    Variable(VarRef),
    /// `a, b, c` (and unary `,a`)
    Array(Vec<Expr>),
    /// `@( statements )`
    ArraySub(Vec<Stmt>),
    /// `$( statements )`
    SubExpr(Vec<Stmt>),
    /// `( pipeline )`
    Paren(Box<Pipeline>),
    /// `@{ key = value; ... }`
    Hash(Vec<(Expr, Pipeline)>),
    ScriptBlock(Arc<ScriptBlockAst>),
    /// `[int]` on its own
    TypeLiteral(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `[int]$x`
    Cast {
        type_name: String,
        operand: Box<Expr>,
    },
    /// `$x.Name`
    Member {
        target: Box<Expr>,
        name: String,
    },
    /// `$x.Method(args)`
    MethodCall {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `[Type]::Member`
    StaticMember {
        type_name: String,
        name: String,
    },
    /// `[Type]::Method(args)`
    StaticCall {
        type_name: String,
        name: String,
        args: Vec<Expr>,
    },
    /// `$x[index]`
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

/// Literal values, typed as the lexer read them.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(BigDecimal),
    String(String),
}

/// Part of an expandable string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(String),
    Variable(VarRef),
    SubExpr(Vec<Stmt>),
}

/// Scope modifier on a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    /// Unqualified: search the scope chain.
    Any,
    Local,
    Global,
    Script,
    /// `$env:NAME`: the process environment.
    Env,
}

/// A variable reference: `$x`, `$global:x`, `${odd name}`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub scope: VarScope,
    pub name: String,
}

impl VarRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scope: VarScope::Any,
            name: name.into(),
        }
    }

    /// Split `scope:name`. An unknown prefix stays part of the name.
    pub fn parse(text: &str) -> Self {
        if let Some((prefix, name)) = text.split_once(':') {
            let scope = match prefix.to_ascii_lowercase().as_str() {
                "local" => Some(VarScope::Local),
                "global" => Some(VarScope::Global),
                "script" => Some(VarScope::Script),
                "env" => Some(VarScope::Env),
                _ => None,
            };
            if let Some(scope) = scope {
                return Self {
                    scope,
                    name: name.to_string(),
                };
            }
        }
        Self::new(text)
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.scope {
            VarScope::Any => "",
            VarScope::Local => "local:",
            VarScope::Global => "global:",
            VarScope::Script => "script:",
            VarScope::Env => "env:",
        };
        write!(f, "${}{}", prefix, self.name)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    NotLike,
    Match,
    NotMatch,
    Contains,
    NotContains,
    In,
    NotIn,
    Replace,
    Split,
    Join,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// `-f`
    Format,
    /// `..`
    Range,
}

impl BinaryOp {
    /// Operators spelled `-name`. Case-insensitive; `-i` prefixed forms
    /// are accepted as aliases.
    pub fn from_dash_name(name: &str) -> Option<BinaryOp> {
        let lower = name.to_ascii_lowercase();
        let base = match lower.as_str() {
            "in" | "is" => lower.as_str(),
            other => other.strip_prefix('i').filter(|s| s.len() > 1).unwrap_or(other),
        };
        Some(match base {
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            "xor" => BinaryOp::Xor,
            "eq" => BinaryOp::Eq,
            "ne" => BinaryOp::Ne,
            "gt" => BinaryOp::Gt,
            "ge" => BinaryOp::Ge,
            "lt" => BinaryOp::Lt,
            "le" => BinaryOp::Le,
            "like" => BinaryOp::Like,
            "notlike" => BinaryOp::NotLike,
            "match" => BinaryOp::Match,
            "notmatch" => BinaryOp::NotMatch,
            "contains" => BinaryOp::Contains,
            "notcontains" => BinaryOp::NotContains,
            "in" => BinaryOp::In,
            "notin" => BinaryOp::NotIn,
            "replace" => BinaryOp::Replace,
            "split" => BinaryOp::Split,
            "join" => BinaryOp::Join,
            "f" => BinaryOp::Format,
            _ => return None,
        })
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Like
                | BinaryOp::NotLike
                | BinaryOp::Match
                | BinaryOp::NotMatch
                | BinaryOp::Contains
                | BinaryOp::NotContains
                | BinaryOp::In
                | BinaryOp::NotIn
                | BinaryOp::Replace
                | BinaryOp::Split
                | BinaryOp::Join
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::And => "-and",
            BinaryOp::Or => "-or",
            BinaryOp::Xor => "-xor",
            BinaryOp::Eq => "-eq",
            BinaryOp::Ne => "-ne",
            BinaryOp::Gt => "-gt",
            BinaryOp::Ge => "-ge",
            BinaryOp::Lt => "-lt",
            BinaryOp::Le => "-le",
            BinaryOp::Like => "-like",
            BinaryOp::NotLike => "-notlike",
            BinaryOp::Match => "-match",
            BinaryOp::NotMatch => "-notmatch",
            BinaryOp::Contains => "-contains",
            BinaryOp::NotContains => "-notcontains",
            BinaryOp::In => "-in",
            BinaryOp::NotIn => "-notin",
            BinaryOp::Replace => "-replace",
            BinaryOp::Split => "-split",
            BinaryOp::Join => "-join",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Format => "-f",
            BinaryOp::Range => "..",
        };
        f.write_str(s)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    /// `!` and `-not`
    Not,
    /// Unary comma: wraps its operand in a one-element array.
    Comma,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::Not => write!(f, "-not"),
            UnaryOp::Comma => write!(f, ","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_ref_scopes() {
        assert_eq!(VarRef::parse("global:x").scope, VarScope::Global);
        assert_eq!(VarRef::parse("env:PATH").name, "PATH");
        let odd = VarRef::parse("weird:name");
        assert_eq!(odd.scope, VarScope::Any);
        assert_eq!(odd.name, "weird:name");
    }

    #[test]
    fn dash_operator_names() {
        assert_eq!(BinaryOp::from_dash_name("EQ"), Some(BinaryOp::Eq));
        assert_eq!(BinaryOp::from_dash_name("ieq"), Some(BinaryOp::Eq));
        assert_eq!(BinaryOp::from_dash_name("in"), Some(BinaryOp::In));
        assert_eq!(BinaryOp::from_dash_name("f"), Some(BinaryOp::Format));
        assert_eq!(BinaryOp::from_dash_name("First"), None);
    }
}
