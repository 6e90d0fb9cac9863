//! S-expression rendering of the AST, for snapshot tests and `/ast` in the REPL.
//!
//! One statement per line. Pipelines of a single expression render as the
//! bare expression; anything else is `(pipe ...)`.

use super::*;
use pash_types::format_decimal;

/// Render a whole program.
pub fn format_program(program: &Program) -> String {
    program
        .statements
        .iter()
        .map(format_stmt)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_stmt(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Pipeline(p) => format_pipeline(p),
        Stmt::Assignment(a) => format_assignment(a),
        Stmt::If(if_stmt) => {
            let mut out = String::from("(if");
            for (i, (cond, body)) in if_stmt.clauses.iter().enumerate() {
                let head = if i == 0 { "" } else { "elseif " };
                out.push_str(&format!(" ({}{}{})", head, format_pipeline(cond), block(body)));
            }
            if let Some(body) = &if_stmt.else_branch {
                out.push_str(&format!(" (else{})", block(body)));
            }
            out.push(')');
            out
        }
        Stmt::While(w) => format!("(while {}{})", format_pipeline(&w.condition), block(&w.body)),
        Stmt::For(f) => format!(
            "(for {} {} {}{})",
            f.init.as_deref().map(format_stmt).unwrap_or_else(|| "_".into()),
            f.condition.as_ref().map(format_pipeline).unwrap_or_else(|| "_".into()),
            f.step.as_deref().map(format_stmt).unwrap_or_else(|| "_".into()),
            block(&f.body)
        ),
        Stmt::ForEach(f) => format!(
            "(foreach {} {}{})",
            f.variable,
            format_pipeline(&f.items),
            block(&f.body)
        ),
        Stmt::Function(def) => {
            let keyword = match def.kind {
                FunctionKind::Function => "function",
                FunctionKind::Filter => "filter",
            };
            format!("({} {} {})", keyword, def.name, format_script_block(&def.body))
        }
        Stmt::Return(p) => opt_keyword("return", p.as_ref()),
        Stmt::Break => "(break)".to_string(),
        Stmt::Continue => "(continue)".to_string(),
        Stmt::Throw(p) => opt_keyword("throw", p.as_ref()),
        Stmt::Try(t) => {
            let mut out = format!("(try{}", block(&t.body));
            for catch in &t.catches {
                out.push_str(" (catch");
                for ty in &catch.types {
                    out.push_str(&format!(" [{}]", ty));
                }
                out.push_str(&block(&catch.body));
                out.push(')');
            }
            if let Some(body) = &t.finally {
                out.push_str(&format!(" (finally{})", block(body)));
            }
            out.push(')');
            out
        }
    }
}

fn opt_keyword(keyword: &str, pipeline: Option<&Pipeline>) -> String {
    match pipeline {
        Some(p) => format!("({} {})", keyword, format_pipeline(p)),
        None => format!("({})", keyword),
    }
}

fn format_assignment(a: &Assignment) -> String {
    let value = match a.value.as_ref() {
        AssignValue::Pipeline(p) => format_pipeline(p),
        AssignValue::Assignment(inner) => format_assignment(inner),
    };
    format!("({} {} {})", a.op, format_expr(&a.target), value)
}

/// Statements rendered as ` s1 s2`, or empty.
fn block(stmts: &[Stmt]) -> String {
    stmts.iter().map(|s| format!(" {}", format_stmt(s))).collect()
}

pub fn format_pipeline(p: &Pipeline) -> String {
    if let Some(expr) = p.as_expression() {
        return format_expr(expr);
    }
    let parts: Vec<String> = p
        .elements
        .iter()
        .map(|e| match e {
            PipelineElement::Expression(expr) => format_expr(expr),
            PipelineElement::Command(cmd) => format_command(cmd),
        })
        .collect();
    if parts.len() == 1 {
        parts.into_iter().collect()
    } else {
        format!("(pipe {})", parts.join(" "))
    }
}

fn format_command(cmd: &Command) -> String {
    let mut out = match &cmd.name {
        CommandName::Bare(name) => format!("(cmd {}", name),
        CommandName::Dynamic(expr) => format!("(cmd & {}", format_expr(expr)),
    };
    for arg in &cmd.args {
        match arg {
            Arg::Positional(expr) => out.push_str(&format!(" {}", format_expr(expr))),
            Arg::Parameter(name) => out.push_str(&format!(" -{}", name)),
        }
    }
    out.push(')');
    out
}

fn format_script_block(sb: &ScriptBlockAst) -> String {
    let mut out = String::from("(block");
    if !sb.params.is_empty() {
        let params: Vec<String> = sb.params.iter().map(format_param).collect();
        out.push_str(&format!(" (params {})", params.join(" ")));
    }
    match &sb.body {
        BlockBody::Plain(stmts) => out.push_str(&block(stmts)),
        BlockBody::Named(named) => {
            for (label, body) in [
                ("begin", &named.begin),
                ("process", &named.process),
                ("end", &named.end),
            ] {
                if let Some(body) = body {
                    out.push_str(&format!(" ({}{})", label, block(body)));
                }
            }
        }
    }
    out.push(')');
    out
}

fn format_param(p: &ParamDef) -> String {
    let mut out = String::new();
    if let Some(ty) = &p.type_name {
        out.push_str(&format!("[{}]", ty));
    }
    out.push('$');
    out.push_str(&p.name);
    if let Some(default) = &p.default {
        out.push('=');
        out.push_str(&format_expr(default));
    }
    out
}

pub fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => format_literal(lit),
        Expr::Expandable(parts) => {
            let mut out = String::from("(str");
            for part in parts {
                match part {
                    StringPart::Literal(s) => out.push_str(&format!(" {:?}", s)),
                    StringPart::Variable(v) => out.push_str(&format!(" {}", v)),
                    StringPart::SubExpr(stmts) => out.push_str(&format!(" ($ {})", inline(stmts))),
                }
            }
            out.push(')');
            out
        }
        Expr::Variable(v) => v.to_string(),
        Expr::Array(items) => format!("(array {})", exprs(items)),
        Expr::ArraySub(stmts) => paren_stmts("@", stmts),
        Expr::SubExpr(stmts) => paren_stmts("$", stmts),
        Expr::Paren(p) => format!("(paren {})", format_pipeline(p)),
        Expr::Hash(entries) => {
            let mut out = String::from("(hash");
            for (key, value) in entries {
                out.push_str(&format!(" ({} {})", format_expr(key), format_pipeline(value)));
            }
            out.push(')');
            out
        }
        Expr::ScriptBlock(sb) => format_script_block(sb),
        Expr::TypeLiteral(name) => format!("[{}]", name),
        Expr::Binary { op, left, right } => {
            format!("({} {} {})", op, format_expr(left), format_expr(right))
        }
        Expr::Unary { op, operand } => format!("({} {})", op, format_expr(operand)),
        Expr::Cast { type_name, operand } => {
            format!("(cast [{}] {})", type_name, format_expr(operand))
        }
        Expr::Member { target, name } => format!("(. {} {})", format_expr(target), name),
        Expr::MethodCall { target, name, args } => {
            if args.is_empty() {
                format!("(call {} {})", format_expr(target), name)
            } else {
                format!("(call {} {} {})", format_expr(target), name, exprs(args))
            }
        }
        Expr::StaticMember { type_name, name } => format!("(:: [{}] {})", type_name, name),
        Expr::StaticCall {
            type_name,
            name,
            args,
        } => {
            if args.is_empty() {
                format!("(static-call [{}] {})", type_name, name)
            } else {
                format!("(static-call [{}] {} {})", type_name, name, exprs(args))
            }
        }
        Expr::Index { target, index } => {
            format!("(index {} {})", format_expr(target), format_expr(index))
        }
    }
}

fn format_literal(lit: &Literal) -> String {
    match lit {
        Literal::Int32(n) => n.to_string(),
        Literal::Int64(n) => format!("{}L", n),
        Literal::Double(n) => {
            let text = n.to_string();
            if text.contains(['.', 'e', 'E', 'N', 'i']) {
                text
            } else {
                format!("{}.0", text)
            }
        }
        Literal::Decimal(d) => format!("{}D", format_decimal(d)),
        Literal::String(s) => format!("{:?}", s),
    }
}

fn exprs(items: &[Expr]) -> String {
    items.iter().map(format_expr).collect::<Vec<_>>().join(" ")
}

fn inline(stmts: &[Stmt]) -> String {
    stmts.iter().map(format_stmt).collect::<Vec<_>>().join(" ")
}

fn paren_stmts(tag: &str, stmts: &[Stmt]) -> String {
    if stmts.is_empty() {
        format!("({})", tag)
    } else {
        format!("({} {})", tag, inline(stmts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_expression_pipeline_is_bare() {
        let program = Program {
            statements: vec![Stmt::Pipeline(Pipeline {
                elements: vec![PipelineElement::Expression(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: Box::new(Expr::Literal(Literal::String("red".into()))),
                    right: Box::new(Expr::Literal(Literal::Int32(3))),
                })],
            })],
        };
        assert_eq!(format_program(&program), r#"(* "red" 3)"#);
    }

    #[test]
    fn commands_show_arguments() {
        let pipeline = Pipeline {
            elements: vec![PipelineElement::Command(Command {
                name: CommandName::Bare("Select-Object".into()),
                args: vec![
                    Arg::Parameter("First".into()),
                    Arg::Positional(Expr::Literal(Literal::Int64(2))),
                ],
            })],
        };
        assert_eq!(format_pipeline(&pipeline), "(cmd Select-Object -First 2L)");
    }
}
