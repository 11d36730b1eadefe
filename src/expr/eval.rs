//! Built-in `f64` evaluator.

use std::sync::Arc;

use parking_lot::Mutex;

use super::parse::{Ast, BinaryOp, Func, parse_expression, parse_statement};
use super::{ArithmeticEvaluator, CurveKind, Variables};
use crate::error::{DomainError, EvalError, ParseError};
use crate::geom::Point;

/// Resolved expression tree: bindings and constants are folded to numbers.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Const(f64),
    X,
    Y,
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

impl Node {
    fn eval(&self, x: f64, y: f64) -> Result<f64, DomainError> {
        Ok(match self {
            Self::Const(value) => *value,
            Self::X => x,
            Self::Y => y,
            Self::Neg(inner) => -inner.eval(x, y)?,
            Self::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(x, y)?;
                let rhs = rhs.eval(x, y)?;
                match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            return Err(DomainError::DivisionByZero);
                        }
                        lhs / rhs
                    }
                    BinaryOp::Pow => lhs.powf(rhs),
                }
            }
            Self::Call(func, args) => {
                let a = args[0].eval(x, y)?;
                let b = match args.get(1) {
                    Some(arg) => arg.eval(x, y)?,
                    None => 0.0,
                };
                apply(*func, a, b)?
            }
        })
    }
}

fn apply(func: Func, a: f64, b: f64) -> Result<f64, DomainError> {
    let domain = || DomainError::OutOfDomain(func.name());
    Ok(match func {
        Func::Sin => a.sin(),
        Func::Cos => a.cos(),
        Func::Tan => a.tan(),
        Func::Asin | Func::Acos if !(-1.0..=1.0).contains(&a) => return Err(domain()),
        Func::Asin => a.asin(),
        Func::Acos => a.acos(),
        Func::Atan => a.atan(),
        Func::Sinh => a.sinh(),
        Func::Cosh => a.cosh(),
        Func::Tanh => a.tanh(),
        Func::Exp => a.exp(),
        Func::Ln | Func::Log if a <= 0.0 => return Err(domain()),
        Func::Ln => a.ln(),
        Func::Log => a.log10(),
        Func::Sqrt if a < 0.0 => return Err(domain()),
        Func::Sqrt => a.sqrt(),
        Func::Abs => a.abs(),
        Func::Floor => a.floor(),
        Func::Ceil => a.ceil(),
        Func::Sign if a == 0.0 => 0.0,
        Func::Sign => a.signum(),
        Func::Min => a.min(b),
        Func::Max => a.max(b),
        Func::Atan2 => a.atan2(b),
        Func::Pow => a.powf(b),
    })
}

/// Compiled request: classification plus the function to evaluate.
#[derive(Debug, Clone, PartialEq)]
struct Program {
    kind: CurveKind,
    body: Node,
}

fn compile(expression: &str, variables: &Variables) -> Result<Program, ParseError> {
    let mut bindings = Vec::with_capacity(variables.len());
    for (name, text) in variables {
        if name == "x" || name == "y" {
            return Err(ParseError::new(format!(
                "'{name}' is a coordinate and cannot be bound"
            )));
        }
        let ast = parse_expression(text)
            .map_err(|error| ParseError::new(format!("variable '{name}': {error}")))?;
        let value = resolve(&ast, &[], false)
            .map_err(|error| ParseError::new(format!("variable '{name}': {error}")))?
            .eval(0.0, 0.0)
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                ParseError::new(format!("variable '{name}' does not evaluate to a number"))
            })?;
        bindings.push((name.as_str(), value));
    }

    let statement = parse_statement(expression)?;
    let (kind, ast) = match statement.rhs {
        None if statement.lhs.mentions("y") => (CurveKind::Implicit, statement.lhs),
        None => (CurveKind::Explicit, statement.lhs),
        Some(rhs) if statement.lhs.is_ident("y") && !rhs.mentions("y") => {
            (CurveKind::Explicit, rhs)
        }
        Some(rhs) if rhs.is_ident("y") && !statement.lhs.mentions("y") => {
            (CurveKind::Explicit, statement.lhs)
        }
        Some(rhs) => (
            CurveKind::Implicit,
            Ast::Binary {
                op: BinaryOp::Sub,
                lhs: Box::new(statement.lhs),
                rhs: Box::new(rhs),
            },
        ),
    };
    let body = resolve(&ast, &bindings, true)?;
    Ok(Program { kind, body })
}

/// Turn an AST into a [`Node`], substituting bindings and folding constants.
///
/// With `coordinates` unset, `x` and `y` are unknown names.
fn resolve(ast: &Ast, bindings: &[(&str, f64)], coordinates: bool) -> Result<Node, ParseError> {
    let node = match ast {
        Ast::Number(value) => Node::Const(*value),
        Ast::Ident { name, offset } => {
            if let Some((_, value)) = bindings.iter().find(|(bound, _)| *bound == name.as_str()) {
                Node::Const(*value)
            } else {
                match name.as_str() {
                    "x" if coordinates => Node::X,
                    "y" if coordinates => Node::Y,
                    "pi" => Node::Const(std::f64::consts::PI),
                    "e" => Node::Const(std::f64::consts::E),
                    _ => {
                        return Err(ParseError::at(
                            *offset,
                            format!("unknown variable '{name}'"),
                        ));
                    }
                }
            }
        }
        Ast::Neg(inner) => Node::Neg(Box::new(resolve(inner, bindings, coordinates)?)),
        Ast::Binary { op, lhs, rhs } => Node::Binary(
            *op,
            Box::new(resolve(lhs, bindings, coordinates)?),
            Box::new(resolve(rhs, bindings, coordinates)?),
        ),
        Ast::Call { func, args } => Node::Call(
            *func,
            args.iter()
                .map(|arg| resolve(arg, bindings, coordinates))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(fold(node))
}

/// Collapse subtrees without coordinates into constants when they evaluate
/// cleanly; failing subtrees stay symbolic so errors surface per sample.
fn fold(node: Node) -> Node {
    let constant = match &node {
        Node::Neg(inner) => matches!(**inner, Node::Const(_)),
        Node::Binary(_, lhs, rhs) => {
            matches!(**lhs, Node::Const(_)) && matches!(**rhs, Node::Const(_))
        }
        Node::Call(_, args) => args.iter().all(|arg| matches!(arg, Node::Const(_))),
        _ => false,
    };
    if !constant {
        return node;
    }
    match node.eval(0.0, 0.0) {
        Ok(value) if value.is_finite() => Node::Const(value),
        _ => node,
    }
}

#[derive(Debug)]
struct CacheEntry {
    expression: String,
    variables: Variables,
    program: Result<Program, ParseError>,
}

/// Parsing `f64` evaluator for the built-in expression language.
///
/// The most recent compiled request is cached; the cache lock is released
/// before any evaluation runs.
#[derive(Debug, Default)]
pub struct ExprEvaluator {
    cache: Mutex<Option<Arc<CacheEntry>>>,
}

impl ExprEvaluator {
    /// Create an evaluator with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn program(&self, expression: &str, variables: &Variables) -> Arc<CacheEntry> {
        if let Some(entry) = self.cache.lock().as_ref()
            && entry.expression == expression
            && entry.variables == *variables
        {
            return Arc::clone(entry);
        }
        let entry = Arc::new(CacheEntry {
            expression: expression.to_string(),
            variables: variables.clone(),
            program: compile(expression, variables),
        });
        *self.cache.lock() = Some(Arc::clone(&entry));
        entry
    }
}

impl ArithmeticEvaluator for ExprEvaluator {
    fn classify(&self, expression: &str, variables: &Variables) -> Result<CurveKind, ParseError> {
        let entry = self.program(expression, variables);
        entry
            .program
            .as_ref()
            .map(|program| program.kind)
            .map_err(Clone::clone)
    }

    fn evaluate(
        &self,
        expression: &str,
        variables: &Variables,
        at: Point,
    ) -> Result<f64, EvalError> {
        let entry = self.program(expression, variables);
        let program = entry.program.as_ref().map_err(|error| error.clone())?;
        Ok(program.body.eval(at.x, at.y)?)
    }
}
