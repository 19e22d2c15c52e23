//! Autofill and auto-calculation.
//!
//! Both directives derive field values from other fields:
//!
//! - **Autofill** copies columns of a looked-up foreign row into form fields
//!   when a selector field changes.
//! - **Auto-calculate** recomputes a field from an arithmetic formula when
//!   any of its trigger fields changes.
//!
//! [`DeriveEngine::new`] parses every formula once and orders all derived
//! fields topologically, so a change propagates through chained
//! derivations with each target computed exactly once. Cycles are rejected
//! when the engine is built.
//!
//! # Formula language
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER | FIELD | FUNC '(' expr (',' expr)* ')' | '(' expr ')'
//! FIELD   := identifier | '{' identifier '}'
//! FUNC    := round | min | max | abs
//! ```

use crate::lookup::LookupSet;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tablecraft_core::model::{AutofillConfig, TableDefinition};
use tablecraft_core::record::{as_number, is_blank, lookup, number_value};
use tablecraft_core::{Error, Record, Result};

// ============================================================================
// Formula AST
// ============================================================================

/// Binary arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

/// Built-in function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    /// `round(x)` or `round(x, digits)`
    Round,
    /// `min(a, b, ...)`
    Min,
    /// `max(a, b, ...)`
    Max,
    /// `abs(x)`
    Abs,
}

impl Func {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "round" => Some(Self::Round),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }

    fn arity_ok(self, n: usize) -> bool {
        match self {
            Self::Round => (1..=2).contains(&n),
            Self::Min | Self::Max => n >= 1,
            Self::Abs => n == 1,
        }
    }
}

/// Parsed formula expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// Field reference.
    Field(String),
    /// Unary minus.
    Neg(Box<Expr>),
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Function call.
    Call {
        /// Function.
        func: Func,
        /// Arguments.
        args: Vec<Expr>,
    },
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '{' => {
                let close = chars[i..]
                    .iter()
                    .position(|&ch| ch == '}')
                    .ok_or_else(|| Error::formula(source, "unclosed '{'"))?;
                let name: String = chars[i + 1..i + close].iter().collect();
                let name = name.trim();
                if !is_identifier(name) {
                    return Err(Error::formula(source, format!("invalid field name '{name}'")));
                }
                tokens.push(Token::Ident(name.to_string()));
                i += close + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| Error::formula(source, format!("invalid number '{text}'")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(Error::formula(
                    source,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }
    Ok(tokens)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::formula(self.source, message)
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(self.error(format!("expected {expected:?}, found {t:?}"))),
            None => Err(self.error(format!("expected {expected:?}, found end of formula"))),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(Token::Op(c @ ('+' | '-'))) = self.peek() {
            let op = if *c == '+' { BinOp::Add } else { BinOp::Sub };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(c @ ('*' | '/' | '%'))) = self.peek() {
            let op = match c {
                '*' => BinOp::Mul,
                '/' => BinOp::Div,
                _ => BinOp::Rem,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Field(name));
                }
                let func = Func::parse(&name)
                    .ok_or_else(|| self.error(format!("unknown function '{name}'")))?;
                self.pos += 1;
                let mut args = vec![self.expr()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.expr()?);
                }
                self.expect(&Token::RParen)?;
                if !func.arity_ok(args.len()) {
                    return Err(self.error(format!(
                        "wrong number of arguments to '{name}': {}",
                        args.len()
                    )));
                }
                Ok(Expr::Call { func, args })
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(t) => Err(self.error(format!("unexpected {t:?}"))),
            None => Err(self.error("unexpected end of formula")),
        }
    }
}

// ============================================================================
// Formula
// ============================================================================

/// A parsed, reusable formula.
#[derive(Clone, Debug)]
pub struct Formula {
    source: String,
    expr: Expr,
    fields: Vec<String>,
}

impl Formula {
    /// Parses formula text.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(Error::formula(source, "empty formula"));
        }
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.expr()?;
        if let Some(extra) = parser.peek() {
            return Err(parser.error(format!("unexpected {extra:?} after expression")));
        }

        let mut fields = Vec::new();
        collect_fields(&expr, &mut fields);
        Ok(Self {
            source: source.to_string(),
            expr,
            fields,
        })
    }

    /// Formula text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Referenced fields in order of first appearance.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Evaluates against field values.
    ///
    /// Returns `Ok(None)` when a referenced field is blank.
    pub fn evaluate(&self, values: &Record) -> Result<Option<f64>> {
        self.eval(&self.expr, values)
    }

    fn eval(&self, expr: &Expr, values: &Record) -> Result<Option<f64>> {
        Ok(match expr {
            Expr::Number(n) => Some(*n),
            Expr::Field(name) => {
                let value = lookup(values, name);
                if is_blank(value) {
                    None
                } else {
                    let n = value.and_then(as_number).ok_or_else(|| {
                        Error::formula(&self.source, format!("field '{name}' is not numeric"))
                    })?;
                    Some(n)
                }
            }
            Expr::Neg(inner) => self.eval(inner, values)?.map(|n| -n),
            Expr::Binary { op, lhs, rhs } => {
                let (Some(a), Some(b)) = (self.eval(lhs, values)?, self.eval(rhs, values)?) else {
                    return Ok(None);
                };
                Some(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div | BinOp::Rem if b == 0.0 => {
                        return Err(Error::formula(&self.source, "division by zero"));
                    }
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                })
            }
            Expr::Call { func, args } => {
                let mut nums = Vec::with_capacity(args.len());
                for arg in args {
                    match self.eval(arg, values)? {
                        Some(n) => nums.push(n),
                        None => return Ok(None),
                    }
                }
                match func {
                    Func::Abs => nums.first().map(|n| n.abs()),
                    Func::Min => nums.iter().copied().reduce(f64::min),
                    Func::Max => nums.iter().copied().reduce(f64::max),
                    Func::Round => {
                        let digits = nums.get(1).copied().unwrap_or(0.0).trunc();
                        if !(-MAX_ROUND_DIGITS..=MAX_ROUND_DIGITS).contains(&digits) {
                            return Err(Error::formula(
                                &self.source,
                                format!("round() digits must be between -15 and 15, got {digits}"),
                            ));
                        }
                        nums.first().map(|n| round_to(*n, digits as i32))
                    }
                }
            }
        })
    }
}

/// Largest `round()` precision; `f64` carries about 15 decimal digits.
const MAX_ROUND_DIGITS: f64 = 15.0;

fn round_to(n: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (n * factor).round() / factor
}

fn collect_fields(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Field(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Expr::Neg(inner) => collect_fields(inner, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_fields(lhs, out);
            collect_fields(rhs, out);
        }
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_fields(a, out)),
    }
}

// ============================================================================
// ChangeSet
// ============================================================================

/// One derived assignment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldChange {
    /// Field that received the value.
    pub field: String,
    /// New value.
    pub value: Value,
}

/// A formula that failed; its target was set to null.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeriveError {
    /// Target field.
    pub field: String,
    /// Failure description.
    pub message: String,
}

/// Result of propagating a change.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    /// Assignments in application order.
    pub changes: Vec<FieldChange>,
    /// Formula failures.
    pub errors: Vec<DeriveError>,
}

impl ChangeSet {
    /// Returns `true` if nothing changed and nothing failed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.errors.is_empty()
    }

    /// Changed field names in application order.
    pub fn fields(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.field.as_str()).collect()
    }

    /// Applies the assignments to a record.
    pub fn apply_to(&self, values: &mut Record) {
        for change in &self.changes {
            values.insert(change.field.clone(), change.value.clone());
        }
    }
}

// ============================================================================
// DeriveEngine
// ============================================================================

#[derive(Clone, Debug)]
struct Calculation {
    target: String,
    formula: Formula,
    triggers: Vec<String>,
}

#[derive(Clone, Debug)]
struct Autofill {
    selector: String,
    config: AutofillConfig,
}

/// Derived-value engine for one table.
#[derive(Clone, Debug)]
pub struct DeriveEngine {
    table: String,
    /// Topological order of every field taking part in a derivation.
    order: Vec<String>,
    calculations: BTreeMap<String, Calculation>,
    autofills: Vec<Autofill>,
}

impl DeriveEngine {
    /// Builds the engine for a table.
    ///
    /// Fails on formula syntax errors, references to unknown fields,
    /// two calculations writing the same field, and dependency cycles.
    pub fn new(definition: &TableDefinition) -> Result<Self> {
        let table = definition.name.clone();
        let known: BTreeSet<&str> = definition.form_fields.iter().map(|f| f.name.as_str()).collect();
        let require_field = |name: &str, role: &str| -> Result<()> {
            if known.contains(name) {
                Ok(())
            } else {
                Err(Error::config(format!(
                    "{role} '{name}' is not a form field of table '{table}'"
                )))
            }
        };

        let mut calculations: BTreeMap<String, Calculation> = BTreeMap::new();
        let mut autofills = Vec::new();

        for field in &definition.form_fields {
            if let Some(calc) = field.auto_calculate.as_ref().filter(|c| c.enabled) {
                let target = calc.target_field.clone().unwrap_or_else(|| field.name.clone());
                require_field(&target, "auto-calculate target")?;
                let formula = Formula::parse(&calc.formula)?;
                for source in formula.fields() {
                    require_field(source, "auto-calculate formula field")?;
                }
                for trigger in &calc.trigger_fields {
                    require_field(trigger, "auto-calculate trigger")?;
                }
                let triggers = if calc.trigger_fields.is_empty() {
                    formula.fields().to_vec()
                } else {
                    calc.trigger_fields.clone()
                };
                if calculations.contains_key(&target) {
                    return Err(Error::config(format!(
                        "field '{target}' of table '{table}' has more than one auto-calculation"
                    )));
                }
                calculations.insert(
                    target.clone(),
                    Calculation {
                        target,
                        formula,
                        triggers,
                    },
                );
            }

            if let Some(autofill) = field.autofill.as_ref().filter(|a| a.enabled) {
                for mapping in &autofill.mappings {
                    require_field(&mapping.target, "autofill target")?;
                }
                autofills.push(Autofill {
                    selector: field.name.clone(),
                    config: autofill.clone(),
                });
            }
        }

        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        let mut node = |graph: &mut DiGraph<String, ()>, name: &str| -> NodeIndex {
            *nodes
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        };
        for calc in calculations.values() {
            let to = node(&mut graph, &calc.target);
            for source in calc.formula.fields() {
                let from = node(&mut graph, source);
                graph.update_edge(from, to, ());
            }
        }
        for autofill in &autofills {
            let from = node(&mut graph, &autofill.selector);
            for mapping in &autofill.config.mappings {
                let to = node(&mut graph, &mapping.target);
                graph.update_edge(from, to, ());
            }
        }

        let order = match toposort(&graph, None) {
            Ok(sorted) => sorted.into_iter().map(|idx| graph[idx].clone()).collect(),
            Err(cycle) => {
                return Err(Error::CyclicDependency {
                    table,
                    fields: find_cycle(&graph, cycle.node_id()),
                });
            }
        };

        log::debug!(
            "derive engine for '{table}': {} calculations, {} autofills",
            calculations.len(),
            autofills.len()
        );

        Ok(Self {
            table,
            order,
            calculations,
            autofills,
        })
    }

    /// Table this engine belongs to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns `true` if the table has no derivations.
    pub fn is_empty(&self) -> bool {
        self.calculations.is_empty() && self.autofills.is_empty()
    }

    /// Fields written by a formula, in evaluation order.
    pub fn calculated_fields(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|f| self.calculations.contains_key(*f))
            .map(String::as_str)
            .collect()
    }

    /// The formula writing a field, if any.
    pub fn formula_for(&self, field: &str) -> Option<&Formula> {
        self.calculations.get(field).map(|c| &c.formula)
    }

    /// Derived assignments caused by a change of `field`.
    ///
    /// `values` must already contain the new value of `field`; it is not
    /// modified.
    pub fn apply_change(&self, values: &Record, field: &str, lookups: &LookupSet) -> ChangeSet {
        let mut working = values.clone();
        let mut dirty: BTreeSet<String> = BTreeSet::from([field.to_string()]);
        let mut changes = ChangeSet::default();

        for name in &self.order {
            if name != field
                && let Some(calc) = self.calculations.get(name)
                && calc.triggers.iter().any(|t| dirty.contains(t))
            {
                self.compute(calc, &mut working, &mut changes);
                dirty.insert(name.clone());
            }
            if dirty.contains(name) {
                for autofill in self.autofills.iter().filter(|a| &a.selector == name) {
                    for target in self.autofill(autofill, &mut working, lookups, &mut changes) {
                        dirty.insert(target);
                    }
                }
            }
        }
        changes
    }

    /// Evaluates every formula in dependency order.
    pub fn recompute_all(&self, values: &Record) -> ChangeSet {
        let mut working = values.clone();
        let mut changes = ChangeSet::default();
        for name in &self.order {
            if let Some(calc) = self.calculations.get(name) {
                self.compute(calc, &mut working, &mut changes);
            }
        }
        changes
    }

    fn compute(&self, calc: &Calculation, working: &mut Record, changes: &mut ChangeSet) {
        let value = match calc.formula.evaluate(working) {
            Ok(Some(n)) => number_value(n),
            Ok(None) => Value::Null,
            Err(e) => {
                log::debug!("formula for '{}.{}' failed: {e}", self.table, calc.target);
                changes.errors.push(DeriveError {
                    field: calc.target.clone(),
                    message: e.to_string(),
                });
                Value::Null
            }
        };
        assign(working, &calc.target, value, changes);
    }

    fn autofill(
        &self,
        autofill: &Autofill,
        working: &mut Record,
        lookups: &LookupSet,
        changes: &mut ChangeSet,
    ) -> Vec<String> {
        let config = &autofill.config;
        let selected = lookup(working, &autofill.selector).cloned();
        let values: Vec<(String, Value)> = match selected {
            Some(ref v) if !is_blank(Some(v)) => {
                let Some(row) = lookups.row_for(&config.source_table, &config.source_column, v)
                else {
                    log::debug!(
                        "autofill for '{}': no '{}' row with {} = {v}",
                        autofill.selector,
                        config.source_table,
                        config.source_column
                    );
                    return Vec::new();
                };
                config
                    .mappings
                    .iter()
                    .map(|m| {
                        let value = lookup(row, &m.source).cloned().unwrap_or(Value::Null);
                        (m.target.clone(), value)
                    })
                    .collect()
            }
            _ => config
                .mappings
                .iter()
                .map(|m| (m.target.clone(), Value::Null))
                .collect(),
        };

        values
            .into_iter()
            .map(|(target, value)| {
                assign(working, &target, value, changes);
                target
            })
            .collect()
    }
}

fn assign(working: &mut Record, field: &str, value: Value, changes: &mut ChangeSet) {
    let current = lookup(working, field).cloned();
    if current.as_ref() != Some(&value) {
        working.insert(field.to_string(), value.clone());
        changes.changes.push(FieldChange {
            field: field.to_string(),
            value,
        });
    }
}

/// A cycle through `start`, as field names ending where they began.
fn find_cycle(graph: &DiGraph<String, ()>, start: NodeIndex) -> Vec<String> {
    fn walk(
        graph: &DiGraph<String, ()>,
        start: NodeIndex,
        current: NodeIndex,
        path: &mut Vec<NodeIndex>,
        seen: &mut BTreeSet<NodeIndex>,
    ) -> bool {
        for next in graph.neighbors_directed(current, Direction::Outgoing) {
            if next == start {
                return true;
            }
            if seen.insert(next) {
                path.push(next);
                if walk(graph, start, next, path, seen) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    let mut path = vec![start];
    let mut seen = BTreeSet::from([start]);
    walk(graph, start, start, &mut path, &mut seen);
    path.push(start);
    path.into_iter().map(|idx| graph[idx].clone()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablecraft_core::model::{
        AutoCalculateConfig, FieldMapping, FieldType, FormField, SelectOptions,
    };
    use tablecraft_core::record::as_record;

    fn record(value: Value) -> Record {
        as_record(value).unwrap()
    }

    fn calc_field(name: &str, formula: &str) -> FormField {
        let mut field = FormField::new(name, FieldType::Number);
        field.auto_calculate = Some(AutoCalculateConfig {
            enabled: true,
            formula: formula.to_string(),
            target_field: None,
            trigger_fields: Vec::new(),
        });
        field
    }

    fn table(fields: Vec<FormField>) -> TableDefinition {
        TableDefinition {
            name: "order_details".into(),
            form_fields: fields,
            ..TableDefinition::default()
        }
    }

    fn order_table() -> TableDefinition {
        let mut product = FormField::new("product_id", FieldType::Select);
        product.options = Some(SelectOptions::foreign_key("products", "id", "name"));
        product.autofill = Some(AutofillConfig {
            enabled: true,
            source_table: "products".into(),
            source_column: "id".into(),
            mappings: vec![FieldMapping {
                source: "price".into(),
                target: "unit_price".into(),
            }],
        });
        table(vec![
            product,
            FormField::new("unit_price", FieldType::Number),
            FormField::new("quantity", FieldType::Number),
            calc_field("subtotal", "{unit_price} * {quantity}"),
            calc_field("total", "round(subtotal * 1.1, 0)"),
        ])
    }

    fn products() -> LookupSet {
        LookupSet::new().with_rows(
            "products",
            vec![
                record(json!({"ID": 1, "NAME": "Pen", "PRICE": 100})),
                record(json!({"ID": 2, "NAME": "Ink", "PRICE": 250.5})),
            ],
        )
    }

    // ------------------------------------------------------------------------
    // Formula tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_formula_precedence() {
        let f = Formula::parse("1 + 2 * 3 - 4 / 2").unwrap();
        assert_eq!(f.evaluate(&Record::new()).unwrap(), Some(5.0));
    }

    #[test]
    fn test_formula_parens_and_unary() {
        let f = Formula::parse("-(2 + 3) * -2").unwrap();
        assert_eq!(f.evaluate(&Record::new()).unwrap(), Some(10.0));
    }

    #[test]
    fn test_formula_fields_and_braces() {
        let f = Formula::parse("{price} * qty + price").unwrap();
        assert_eq!(f.fields(), &["price".to_string(), "qty".to_string()]);
        let values = record(json!({"PRICE": "2.5", "qty": 4}));
        assert_eq!(f.evaluate(&values).unwrap(), Some(12.5));
    }

    #[test]
    fn test_formula_functions() {
        let values = record(json!({"a": -3.456, "b": 7}));
        let eval = |src: &str| Formula::parse(src).unwrap().evaluate(&values).unwrap();
        assert_eq!(eval("abs(a)"), Some(3.456));
        assert_eq!(eval("round(a, 2)"), Some(-3.46));
        assert_eq!(eval("round(b / 2)"), Some(4.0));
        assert_eq!(eval("min(a, b, 0)"), Some(-3.456));
        assert_eq!(eval("max(a, b, 0)"), Some(7.0));
        assert_eq!(eval("b % 4"), Some(3.0));
    }

    #[test]
    fn test_formula_blank_operand_is_none() {
        let f = Formula::parse("a * b").unwrap();
        assert_eq!(f.evaluate(&record(json!({"a": 2, "b": ""}))).unwrap(), None);
        assert_eq!(f.evaluate(&record(json!({"a": 2}))).unwrap(), None);
    }

    #[test]
    fn test_formula_non_numeric_operand_errors() {
        let f = Formula::parse("a + 1").unwrap();
        let err = f.evaluate(&record(json!({"a": "abc"}))).unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_formula_division_by_zero_errors() {
        let f = Formula::parse("a / b").unwrap();
        let err = f.evaluate(&record(json!({"a": 1, "b": 0}))).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_formula_syntax_errors() {
        for bad in ["", "1 +", "(1", "foo(1)", "abs(1, 2)", "a $ b", "{1x}", "1 2"] {
            assert!(Formula::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    // ------------------------------------------------------------------------
    // Engine construction tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_engine_orders_chained_calculations() {
        let engine = DeriveEngine::new(&order_table()).unwrap();
        assert_eq!(engine.calculated_fields(), vec!["subtotal", "total"]);
        assert!(!engine.is_empty());
    }

    #[test]
    fn test_engine_rejects_cycle() {
        let err = DeriveEngine::new(&table(vec![
            calc_field("a", "b + 1"),
            calc_field("b", "a + 1"),
        ]))
        .unwrap_err();
        let Error::CyclicDependency { table, fields } = err else {
            unreachable!("Expected CyclicDependency");
        };
        assert_eq!(table, "order_details");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.first(), fields.last());
    }

    #[test]
    fn test_engine_rejects_self_reference() {
        let err = DeriveEngine::new(&table(vec![calc_field("a", "a * 2")])).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
        assert!(err.to_string().contains("a -> a"));
    }

    #[test]
    fn test_engine_rejects_unknown_trigger() {
        let err = DeriveEngine::new(&table(vec![calc_field("total", "price * qty")])).unwrap_err();
        assert!(err.to_string().contains("auto-calculate formula field 'price'"));
    }

    #[test]
    fn test_engine_rejects_unknown_explicit_trigger() {
        let mut field = calc_field("total", "qty * 2");
        field.auto_calculate.as_mut().unwrap().trigger_fields = vec!["nosuch".into()];
        let err = DeriveEngine::new(&table(vec![FormField::new("qty", FieldType::Number), field]))
            .unwrap_err();
        assert!(err.to_string().contains("auto-calculate trigger 'nosuch'"));
    }

    #[test]
    fn test_engine_rejects_unknown_formula_field_despite_triggers() {
        let mut field = calc_field("total", "nosuchfield + qty");
        field.auto_calculate.as_mut().unwrap().trigger_fields = vec!["qty".into()];
        let err = DeriveEngine::new(&table(vec![FormField::new("qty", FieldType::Number), field]))
            .unwrap_err();
        assert!(err.to_string().contains("formula field 'nosuchfield'"));
    }

    #[test]
    fn test_engine_rejects_cycle_hidden_by_triggers() {
        let mut a = calc_field("a", "b + 1");
        a.auto_calculate.as_mut().unwrap().trigger_fields = vec!["x".into()];
        let err = DeriveEngine::new(&table(vec![
            FormField::new("x", FieldType::Number),
            a,
            calc_field("b", "a + 1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
    }

    #[test]
    fn test_engine_rejects_duplicate_target() {
        let mut a = calc_field("a", "x + 1");
        a.auto_calculate.as_mut().unwrap().target_field = Some("total".into());
        let mut b = calc_field("b", "x + 2");
        b.auto_calculate.as_mut().unwrap().target_field = Some("total".into());
        let err = DeriveEngine::new(&table(vec![
            FormField::new("x", FieldType::Number),
            FormField::new("total", FieldType::Number),
            a,
            b,
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("more than one"));
    }

    #[test]
    fn test_disabled_calculation_ignored() {
        let mut field = calc_field("a", "missing + 1");
        field.auto_calculate.as_mut().unwrap().enabled = false;
        let engine = DeriveEngine::new(&table(vec![field])).unwrap();
        assert!(engine.is_empty());
    }

    // ------------------------------------------------------------------------
    // Propagation tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_autofill_then_calculate_in_order() {
        let engine = DeriveEngine::new(&order_table()).unwrap();
        let values = record(json!({"product_id": 1, "quantity": 3}));
        let changes = engine.apply_change(&values, "product_id", &products());
        assert_eq!(changes.fields(), vec!["unit_price", "subtotal", "total"]);
        assert_eq!(changes.changes[1].value, json!(300));
        assert_eq!(changes.changes[2].value, json!(330));
        assert!(changes.errors.is_empty());
    }

    #[test]
    fn test_cleared_selection_clears_targets() {
        let engine = DeriveEngine::new(&order_table()).unwrap();
        let values = record(json!({
            "product_id": "", "unit_price": 100, "quantity": 3, "subtotal": 300, "total": 330
        }));
        let changes = engine.apply_change(&values, "product_id", &products());
        assert_eq!(changes.fields(), vec!["unit_price", "subtotal", "total"]);
        assert!(changes.changes.iter().all(|c| c.value.is_null()));
    }

    #[test]
    fn test_unmatched_selection_leaves_targets() {
        let engine = DeriveEngine::new(&order_table()).unwrap();
        let values = record(json!({"product_id": 42, "unit_price": 5}));
        let changes = engine.apply_change(&values, "product_id", &products());
        assert!(changes.is_empty());
    }

    #[test]
    fn test_change_of_unrelated_field_is_noop() {
        let engine = DeriveEngine::new(&order_table()).unwrap();
        let values = record(json!({"note": "x"}));
        assert!(engine.apply_change(&values, "note", &products()).is_empty());
    }

    #[test]
    fn test_division_error_nulls_target_and_reports() {
        let engine = DeriveEngine::new(&table(vec![
            FormField::new("a", FieldType::Number),
            FormField::new("b", FieldType::Number),
            calc_field("ratio", "a / b"),
        ]))
        .unwrap();
        let values = record(json!({"a": 1, "b": 0, "ratio": 5}));
        let changes = engine.apply_change(&values, "b", &LookupSet::new());
        assert_eq!(changes.changes, vec![FieldChange { field: "ratio".into(), value: Value::Null }]);
        assert_eq!(changes.errors.len(), 1);
        assert_eq!(changes.errors[0].field, "ratio");
    }

    #[test]
    fn test_recompute_all() {
        let engine = DeriveEngine::new(&order_table()).unwrap();
        let values = record(json!({"UNIT_PRICE": 250.5, "QUANTITY": 2}));
        let changes = engine.recompute_all(&values);
        assert_eq!(changes.fields(), vec!["subtotal", "total"]);
        assert_eq!(changes.changes[0].value, json!(501));
        assert_eq!(changes.changes[1].value, json!(551));

        let mut applied = values.clone();
        changes.apply_to(&mut applied);
        assert!(engine.recompute_all(&applied).is_empty());
    }

    #[test]
    fn test_explicit_trigger_fields() {
        let mut field = calc_field("total", "price * qty");
        field.auto_calculate.as_mut().unwrap().trigger_fields = vec!["qty".into()];
        let engine = DeriveEngine::new(&table(vec![
            FormField::new("price", FieldType::Number),
            FormField::new("qty", FieldType::Number),
            field,
        ]))
        .unwrap();
        let values = record(json!({"price": 2, "qty": 3}));
        assert!(engine.apply_change(&values, "price", &LookupSet::new()).is_empty());
        assert_eq!(
            engine.apply_change(&values, "qty", &LookupSet::new()).changes[0].value,
            json!(6)
        );
    }

    #[test]
    fn test_trigger_fields_keep_formula_order() {
        // "a" sorts first by name but reads "b".
        let mut a = calc_field("a", "b + 1");
        a.auto_calculate.as_mut().unwrap().trigger_fields = vec!["x".into()];
        let mut b = calc_field("b", "x * 2");
        b.auto_calculate.as_mut().unwrap().trigger_fields = vec!["x".into()];
        let engine =
            DeriveEngine::new(&table(vec![FormField::new("x", FieldType::Number), a, b])).unwrap();
        assert_eq!(engine.calculated_fields(), vec!["b", "a"]);

        let values = record(json!({"x": 5}));
        let changes = engine.apply_change(&values, "x", &LookupSet::new());
        assert_eq!(changes.fields(), vec!["b", "a"]);
        assert_eq!(changes.changes[0].value, json!(10));
        assert_eq!(changes.changes[1].value, json!(11));
    }

    #[test]
    fn test_round_rejects_out_of_range_digits() {
        let values = record(json!({"x": 1.25}));
        for src in ["round(x, 10000000000)", "round(x, -16)"] {
            let err = Formula::parse(src).unwrap().evaluate(&values).unwrap_err();
            assert!(err.to_string().contains("round() digits"), "{src}");
        }
        let f = Formula::parse("round(x, 15)").unwrap();
        assert_eq!(f.evaluate(&values).unwrap(), Some(1.25));
    }
}
