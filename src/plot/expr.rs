//! Sandboxed evaluation of single-variable expressions for plotting.
//!
//! Expression strings come from the text-generation service, so they are
//! untrusted. They are parsed with a small pest grammar into an AST whose only
//! leaves are numeric literals, the variable `x`, a few constants and a fixed
//! set of elementary functions. There is no way to name anything else, so
//! evaluation cannot reach host state.
//!
//! Unknown identifiers (`a`, `b`, `k`, `f`) mean the task is stated abstractly;
//! they surface as [`EvalError::AbstractOrInvalidExpression`] during the probe.

use std::f64::consts::{E, PI, TAU};

use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;
use tracing::debug;

use super::intent::Domain;

pub const DEFAULT_SAMPLES: usize = 100;
pub const MAX_SAMPLES: usize = 2000;
pub const MAX_EXPRESSION_CHARS: usize = 512;
pub const MAX_NESTING: usize = 32;
const PROBE_X: f64 = 1.0;

#[derive(Parser)]
#[grammar = "plot/expr.pest"]
struct ExprParser;

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
  /// Free parameters, unknown functions or syntax errors. Expected and common.
  #[error("abstract or invalid expression: {detail}")]
  AbstractOrInvalidExpression { detail: String },
  #[error("expression has no finite value anywhere on the domain")]
  NonFiniteResult,
  #[error("invalid sampling range [{x_min}, {x_max}]")]
  InvalidDomain { x_min: f64, x_max: f64 },
  #[error("sample count {0} outside 1..={max}", max = MAX_SAMPLES)]
  InvalidSampleCount(usize),
}

fn invalid(detail: impl Into<String>) -> EvalError {
  EvalError::AbstractOrInvalidExpression { detail: detail.into() }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum BinOp {
  Add,
  Sub,
  Mul,
  Div,
  Pow,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Func {
  Sin,
  Cos,
  Tan,
  Asin,
  Acos,
  Atan,
  Sinh,
  Cosh,
  Tanh,
  Exp,
  Ln,
  Log,
  Log10,
  Log2,
  Sqrt,
  Cbrt,
  Abs,
  Floor,
  Ceil,
  Sign,
  Min,
  Max,
}

impl Func {
  fn lookup(name: &str) -> Option<Self> {
    Some(match name {
      "sin" => Func::Sin,
      "cos" => Func::Cos,
      "tan" => Func::Tan,
      "asin" | "arcsin" => Func::Asin,
      "acos" | "arccos" => Func::Acos,
      "atan" | "arctan" => Func::Atan,
      "sinh" => Func::Sinh,
      "cosh" => Func::Cosh,
      "tanh" => Func::Tanh,
      "exp" => Func::Exp,
      "ln" => Func::Ln,
      "log" => Func::Log,
      "log10" => Func::Log10,
      "log2" => Func::Log2,
      "sqrt" => Func::Sqrt,
      "cbrt" => Func::Cbrt,
      "abs" => Func::Abs,
      "floor" => Func::Floor,
      "ceil" => Func::Ceil,
      "sign" => Func::Sign,
      "min" => Func::Min,
      "max" => Func::Max,
      _ => return None,
    })
  }

  fn accepts(self, argc: usize) -> bool {
    match self {
      Func::Log => argc == 1 || argc == 2,
      Func::Min | Func::Max => argc == 2,
      _ => argc == 1,
    }
  }

  fn apply(self, args: &[f64]) -> f64 {
    let a = args[0];
    match self {
      Func::Sin => a.sin(),
      Func::Cos => a.cos(),
      Func::Tan => a.tan(),
      Func::Asin => a.asin(),
      Func::Acos => a.acos(),
      Func::Atan => a.atan(),
      Func::Sinh => a.sinh(),
      Func::Cosh => a.cosh(),
      Func::Tanh => a.tanh(),
      Func::Exp => a.exp(),
      Func::Ln => a.ln(),
      // log(x) is natural (as in numpy/math), log(x, b) takes an explicit base.
      Func::Log => match args.get(1) {
        Some(base) => a.ln() / base.ln(),
        None => a.ln(),
      },
      Func::Log10 => a.log10(),
      Func::Log2 => a.log2(),
      Func::Sqrt => a.sqrt(),
      Func::Cbrt => a.cbrt(),
      Func::Abs => a.abs(),
      Func::Floor => a.floor(),
      Func::Ceil => a.ceil(),
      Func::Sign => {
        if a > 0.0 {
          1.0
        } else if a < 0.0 {
          -1.0
        } else {
          a
        }
      }
      Func::Min => a.min(args[1]),
      Func::Max => a.max(args[1]),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
enum Node {
  Num(f64),
  X,
  Neg(Box<Node>),
  Bin(BinOp, Box<Node>, Box<Node>),
  Call(Func, Vec<Node>),
}

impl Node {
  fn eval(&self, x: f64) -> f64 {
    match self {
      Node::Num(v) => *v,
      Node::X => x,
      Node::Neg(n) => -n.eval(x),
      Node::Bin(op, l, r) => {
        let (l, r) = (l.eval(x), r.eval(x));
        match op {
          BinOp::Add => l + r,
          BinOp::Sub => l - r,
          BinOp::Mul => l * r,
          BinOp::Div => l / r,
          BinOp::Pow => l.powf(r),
        }
      }
      Node::Call(f, args) => {
        let vals: Vec<f64> = args.iter().map(|a| a.eval(x)).collect();
        f.apply(&vals)
      }
    }
  }
}

/// A parsed, fully resolved expression in `x`.
#[derive(Clone, Debug)]
pub struct CompiledExpr {
  source: String,
  root: Node,
}

impl CompiledExpr {
  pub fn source(&self) -> &str {
    &self.source
  }

  pub fn eval(&self, x: f64) -> f64 {
    self.root.eval(x)
  }
}

/// Map the notations the generator likes (TeX-ish carets, unicode symbols,
/// numpy/math qualifiers) onto the grammar's spelling.
pub fn normalize_notation(src: &str) -> String {
  let mut s = src.trim().to_string();
  for (from, to) in [
    ("^", "**"),
    ("π", "pi"),
    ("×", "*"),
    ("·", "*"),
    ("⋅", "*"),
    ("−", "-"),
    ("²", "**2"),
    ("³", "**3"),
    ("numpy.", ""),
    ("np.", ""),
    ("math.", ""),
  ] {
    s = s.replace(from, to);
  }
  s
}

fn pratt() -> PrattParser<Rule> {
  // Lowest precedence first. Unary minus binds weaker than `**`: -x**2 == -(x**2).
  PrattParser::new()
    .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
    .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left))
    .op(Op::prefix(Rule::neg) | Op::prefix(Rule::pos))
    .op(Op::infix(Rule::pow, Assoc::Right))
}

/// Parse and resolve identifiers. Fails for anything outside the whitelist.
pub fn compile(expression: &str) -> Result<CompiledExpr, EvalError> {
  let source = normalize_notation(expression);
  if source.is_empty() {
    return Err(invalid("empty expression"));
  }
  if source.chars().count() > MAX_EXPRESSION_CHARS {
    return Err(invalid(format!("expression longer than {} characters", MAX_EXPRESSION_CHARS)));
  }
  if nesting_depth(&source) > MAX_NESTING {
    return Err(invalid(format!("parentheses nested deeper than {}", MAX_NESTING)));
  }

  let mut pairs = ExprParser::parse(Rule::program, &source)
    .map_err(|e| invalid(format!("syntax error: {}", e.variant.message())))?;
  let expr = pairs
    .next()
    .and_then(|program| program.into_inner().next())
    .ok_or_else(|| invalid("empty expression"))?;
  let root = build(expr.into_inner(), &pratt())?;
  Ok(CompiledExpr { source, root })
}

fn build(pairs: Pairs<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<Node, EvalError> {
  pratt
    .map_primary(|p| primary(p, pratt))
    .map_prefix(|op, rhs| match op.as_rule() {
      Rule::neg => Ok(Node::Neg(Box::new(rhs?))),
      _ => rhs,
    })
    .map_infix(|lhs, op, rhs| {
      let op = match op.as_rule() {
        Rule::add => BinOp::Add,
        Rule::sub => BinOp::Sub,
        Rule::mul => BinOp::Mul,
        Rule::div => BinOp::Div,
        _ => BinOp::Pow,
      };
      Ok(Node::Bin(op, Box::new(lhs?), Box::new(rhs?)))
    })
    .parse(pairs)
}

fn primary(p: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<Node, EvalError> {
  match p.as_rule() {
    Rule::number => p
      .as_str()
      .parse::<f64>()
      .map(Node::Num)
      .map_err(|_| invalid(format!("bad number '{}'", p.as_str()))),
    Rule::ident => resolve_ident(p.as_str()),
    Rule::expr => build(p.into_inner(), pratt),
    Rule::call => {
      let mut inner = p.into_inner();
      let name = inner.next().map(|n| n.as_str().to_string()).unwrap_or_default();
      let func = Func::lookup(&name).ok_or_else(|| invalid(format!("unknown function '{}'", name)))?;
      let args = inner.map(|a| build(a.into_inner(), pratt)).collect::<Result<Vec<_>, _>>()?;
      if !func.accepts(args.len()) {
        return Err(invalid(format!("wrong number of arguments for '{}'", name)));
      }
      Ok(Node::Call(func, args))
    }
    other => Err(invalid(format!("unexpected token {:?}", other))),
  }
}

fn resolve_ident(name: &str) -> Result<Node, EvalError> {
  match name {
    "x" => Ok(Node::X),
    "pi" => Ok(Node::Num(PI)),
    "e" => Ok(Node::Num(E)),
    "tau" => Ok(Node::Num(TAU)),
    other => Err(invalid(format!("unresolved variable '{}'", other))),
  }
}

fn nesting_depth(s: &str) -> usize {
  let mut depth = 0usize;
  let mut max = 0usize;
  for c in s.chars() {
    match c {
      '(' => {
        depth += 1;
        max = max.max(depth);
      }
      ')' => depth = depth.saturating_sub(1),
      _ => {}
    }
  }
  max
}

/// Compile and evaluate once at x = 1. Free parameters and syntax problems are
/// caught here, before any sampling happens.
pub fn probe(expression: &str) -> Result<CompiledExpr, EvalError> {
  let compiled = compile(expression)?;
  let y = compiled.eval(PROBE_X);
  debug!(target: "plot", expression = %compiled.source(), probe_y = y, "Expression probe ok");
  Ok(compiled)
}

/// `sample_count` evenly spaced x across `[x_min, x_max]` (inclusive).
pub fn linspace(x_min: f64, x_max: f64, sample_count: usize) -> Vec<f64> {
  if sample_count == 1 {
    return vec![x_min];
  }
  let step = (x_max - x_min) / (sample_count - 1) as f64;
  (0..sample_count)
    .map(|i| if i == sample_count - 1 { x_max } else { x_min + i as f64 * step })
    .collect()
}

/// Sample `expression` over the domain's x range.
///
/// Non-finite y values (poles, log of negatives) are dropped, so curves near an
/// asymptote come back partial rather than failing. Output is ascending in x.
pub fn evaluate(expression: &str, domain: &Domain, sample_count: usize) -> Result<Vec<(f64, f64)>, EvalError> {
  if sample_count == 0 || sample_count > MAX_SAMPLES {
    return Err(EvalError::InvalidSampleCount(sample_count));
  }
  let (x_min, x_max) = (domain.x_min, domain.x_max);
  if !(x_max - x_min).is_finite() || x_min >= x_max {
    return Err(EvalError::InvalidDomain { x_min, x_max });
  }

  let compiled = probe(expression)?;
  let pairs: Vec<(f64, f64)> = linspace(x_min, x_max, sample_count)
    .into_iter()
    .map(|x| (x, compiled.eval(x)))
    .filter(|(x, y)| x.is_finite() && y.is_finite())
    .collect();

  if pairs.is_empty() {
    return Err(EvalError::NonFiniteResult);
  }
  debug!(target: "plot", expression = %compiled.source(), kept = pairs.len(), requested = sample_count, "Expression sampled");
  Ok(pairs)
}
