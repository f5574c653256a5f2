//! Caller-supplied transformation snippets.
//!
//! A snippet is a small line-oriented program. Each non-empty line that does
//! not start with `#` is one statement:
//!
//! ```text
//! keep <expr>                 keep rows where the expression is truthy
//! remove <expr>               drop rows where the expression is truthy
//! set <column> = <expr>       overwrite (or append) a column
//! drop <col>, <col>           remove columns
//! select <col>, <col>         keep and reorder columns
//! rename <old> -> <new>       rename a column
//! sort <col> [asc|desc]       stable sort, missing values last
//! limit <n>                   keep the first n rows
//! ```
//!
//! Expressions use the evalexpr grammar. Each row binds its cells by
//! normalized header name and by position (`c0`, `c1`, ...), plus
//! `row_number` (1-based). Column utilities take column names as strings:
//! `sum("price")`, `avg`, `min`, `max`, `count`, `group_by("region")`, and the
//! per-group `group_sum("region", "sales")`, `group_avg`, `group_count`
//! evaluated for the current row's group.
//!
//! The statement set and the function allowlist are what confine a snippet.
//! The token denylist only rejects obvious attempts early with a clearer
//! message. Execution works on a copy of the rows, so a rejected or failing
//! snippet never alters the input.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
    time::{Duration, Instant},
};

use evalexpr::{
    Context, ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, Function,
    HashMapContext, Node, Value as EvalValue, build_operator_tree,
};
use log::{debug, info, warn};

use crate::{
    changes::{ChangeDetail, ChangeEntry},
    columns::ColumnResolver,
    config::SandboxConfig,
    data::{Value, normalize_column_name, value_from_evalexpr, value_to_evalexpr},
    dataset::{Dataset, Row},
    error::EngineError,
    operations::Applied,
};

pub const CODE_OPERATION: &str = "custom_code";

/// Column-level helpers exposed to snippets.
pub const UTILITY_FUNCTIONS: &[&str] = &[
    "sum",
    "avg",
    "min",
    "max",
    "count",
    "group_by",
    "group_sum",
    "group_avg",
    "group_count",
];

/// Pure evalexpr builtins snippets may call in addition to the utilities.
const BUILTIN_FUNCTIONS: &[&str] = &[
    "if",
    "len",
    "floor",
    "round",
    "ceil",
    "contains",
    "contains_any",
    "typeof",
];
const BUILTIN_PREFIXES: &[&str] = &["math::", "str::"];

const DENIED_TOKENS: &[&str] = &[
    "process",
    "require",
    "import",
    "eval",
    "function",
    "fs",
    "child_process",
    "exec",
    "spawn",
    "settimeout",
    "setinterval",
    "setimmediate",
    "global",
    "globalthis",
    "__proto__",
    "constructor",
    "prototype",
    "fetch",
    "xmlhttprequest",
    "websocket",
];

#[derive(Debug)]
struct Expression {
    source: String,
    node: Node,
    uses_utilities: bool,
}

#[derive(Debug)]
enum Statement {
    Keep(Expression),
    Remove(Expression),
    Set { column: String, expression: Expression },
    Drop(Vec<String>),
    Select(Vec<String>),
    Rename { from: String, to: String },
    Sort { column: String, descending: bool },
    Limit(usize),
}

/// A validated snippet, ready to run against any dataset.
#[derive(Debug)]
pub struct Program {
    statements: Vec<Statement>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

pub struct CodeSandbox {
    timeout: Duration,
    denied: HashSet<String>,
}

impl CodeSandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        let denied = DENIED_TOKENS
            .iter()
            .map(|token| token.to_string())
            .chain(config.extra_denied_tokens.iter().map(|t| t.to_lowercase()))
            .collect();
        Self {
            timeout: config.timeout(),
            denied,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the snippet against the denylist, then parses every statement.
    pub fn compile(&self, snippet: &str) -> Result<Program, EngineError> {
        if let Some(token) = self.denied_token(snippet) {
            warn!("Rejected snippet containing denied token '{token}'");
            return Err(EngineError::CodeValidationRejected {
                reason: format!("use of '{token}' is not allowed"),
            });
        }
        let statements = snippet
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .map(|(line_no, line)| {
                parse_statement(line).map_err(|reason| {
                    warn!("Rejected snippet line {line_no}: {reason}");
                    EngineError::CodeValidationRejected {
                        reason: format!("line {line_no}: {reason}"),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if statements.is_empty() {
            return Err(EngineError::CodeValidationRejected {
                reason: "snippet contains no statements".to_string(),
            });
        }
        Ok(Program { statements })
    }

    fn denied_token(&self, snippet: &str) -> Option<String> {
        snippet
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .map(str::to_lowercase)
            .find(|word| self.denied.contains(word))
    }

    /// Compiles and runs `snippet` over a copy of `dataset`.
    pub fn run(&self, snippet: &str, dataset: &Dataset) -> Result<Applied, EngineError> {
        let program = self.compile(snippet)?;
        self.execute(&program, dataset)
    }

    pub fn execute(&self, program: &Program, dataset: &Dataset) -> Result<Applied, EngineError> {
        let started = Instant::now();
        let mut work = Workspace {
            headers: dataset.headers().to_vec(),
            rows: dataset.rows().to_vec(),
            cells_modified: 0,
        };
        for (idx, statement) in program.statements.iter().enumerate() {
            debug!("Running snippet statement {} of {}", idx + 1, program.len());
            self.run_statement(statement, &mut work, started)?;
        }

        let original = dataset.headers();
        let columns_added = work
            .headers
            .iter()
            .filter(|h| !original.contains(h))
            .cloned()
            .collect::<Vec<_>>();
        let columns_removed = original
            .iter()
            .filter(|h| !work.headers.contains(h))
            .cloned()
            .collect::<Vec<_>>();
        let cells_modified = work.cells_modified;
        let result = Dataset::new(work.headers, work.rows).map_err(|err| {
            EngineError::CodeExecutionError {
                message: format!("snippet produced an invalid dataset: {err}"),
            }
        })?;
        info!(
            "Snippet ran {} statement(s) in {:?}: {} -> {} row(s)",
            program.len(),
            started.elapsed(),
            dataset.row_count(),
            result.row_count()
        );

        let entry = ChangeEntry::new(
            CODE_OPERATION,
            dataset.row_count(),
            ChangeDetail::Code {
                statements: program.len(),
                columns_added,
                columns_removed,
            },
        )
        .with_rows_after(result.row_count())
        .with_cells_modified(cells_modified);
        Ok(Applied {
            dataset: result,
            changes: vec![entry],
        })
    }

    fn check_budget(&self, started: Instant) -> Result<(), EngineError> {
        if started.elapsed() >= self.timeout {
            return Err(EngineError::CodeExecutionError {
                message: format!(
                    "snippet exceeded its time budget of {} ms",
                    self.timeout.as_millis()
                ),
            });
        }
        Ok(())
    }

    fn run_statement(
        &self,
        statement: &Statement,
        work: &mut Workspace,
        started: Instant,
    ) -> Result<(), EngineError> {
        match statement {
            Statement::Keep(expression) | Statement::Remove(expression) => {
                let keep_matching = matches!(statement, Statement::Keep(_));
                let verdicts = self.evaluate_rows(expression, work, started)?;
                let mut verdicts = verdicts.into_iter().map(|value| truthy(&value));
                work.rows
                    .retain(|_| verdicts.next().is_some_and(|hit| hit == keep_matching));
            }
            Statement::Set { column, expression } => {
                let values = self.evaluate_rows(expression, work, started)?;
                let idx = match exact_column(&work.headers, column) {
                    Some(idx) => idx,
                    None => {
                        work.headers.push(column.clone());
                        work.rows.iter_mut().for_each(|row| row.push(Value::Null));
                        work.headers.len() - 1
                    }
                };
                for (row, value) in work.rows.iter_mut().zip(values) {
                    let value = value_from_evalexpr(value);
                    if row[idx] != value {
                        row[idx] = value;
                        work.cells_modified += 1;
                    }
                }
            }
            Statement::Drop(columns) => {
                let mut drop = columns
                    .iter()
                    .map(|label| work.require_column(label))
                    .collect::<Result<Vec<_>, _>>()?;
                drop.sort_unstable();
                drop.dedup();
                for idx in drop.into_iter().rev() {
                    work.headers.remove(idx);
                    work.rows.iter_mut().for_each(|row| {
                        row.remove(idx);
                    });
                }
            }
            Statement::Select(columns) => {
                let order = columns
                    .iter()
                    .map(|label| work.require_column(label))
                    .collect::<Result<Vec<_>, _>>()?;
                work.headers = order.iter().map(|&idx| work.headers[idx].clone()).collect();
                for row in work.rows.iter_mut() {
                    *row = order.iter().map(|&idx| row[idx].clone()).collect();
                }
            }
            Statement::Rename { from, to } => {
                let idx = work.require_column(from)?;
                work.headers[idx] = to.clone();
            }
            Statement::Sort { column, descending } => {
                let idx = work.require_column(column)?;
                work.rows
                    .sort_by(|a, b| compare_cells(&a[idx], &b[idx], *descending));
            }
            Statement::Limit(limit) => work.rows.truncate(*limit),
        }
        self.check_budget(started)
    }

    fn evaluate_rows(
        &self,
        expression: &Expression,
        work: &Workspace,
        started: Instant,
    ) -> Result<Vec<EvalValue>, EngineError> {
        let cursor = Arc::new(AtomicUsize::new(0));
        let mut base = HashMapContext::new();
        if expression.uses_utilities {
            let snapshot = Arc::new(Snapshot::new(&work.headers, &work.rows, cursor.clone()));
            register_utilities(&mut base, snapshot).map_err(|err| execution_error(&err))?;
        }
        let bindings = work
            .headers
            .iter()
            .map(|h| normalize_column_name(h))
            .collect::<Vec<_>>();

        let mut results = Vec::with_capacity(work.rows.len());
        for (idx, row) in work.rows.iter().enumerate() {
            self.check_budget(started)?;
            cursor.store(idx, AtomicOrdering::Relaxed);
            let context = bind_row(&base, &bindings, row, idx + 1)?;
            let value = expression.node.eval_with_context(&context).map_err(|err| {
                EngineError::CodeExecutionError {
                    message: format!(
                        "evaluating '{}' on row {}: {err}",
                        expression.source,
                        idx + 1
                    ),
                }
            })?;
            results.push(value);
        }
        Ok(results)
    }
}

struct Workspace {
    headers: Vec<String>,
    rows: Vec<Row>,
    cells_modified: usize,
}

impl Workspace {
    fn require_column(&self, label: &str) -> Result<usize, EngineError> {
        find_column(&self.headers, label)
            .ok_or_else(|| EngineError::CodeExecutionError {
                message: format!("unknown column '{label}'"),
            })
    }
}

/// Exact header or matching normalized identifier. `set` targets only match this way.
fn exact_column(headers: &[String], label: &str) -> Option<usize> {
    let label = label.trim();
    headers.iter().position(|h| h == label).or_else(|| {
        let wanted = normalize_column_name(label);
        headers.iter().position(|h| normalize_column_name(h) == wanted)
    })
}

fn find_column(headers: &[String], label: &str) -> Option<usize> {
    exact_column(headers, label)
        .or_else(|| ColumnResolver::new(headers).resolve(label).map(|m| m.index))
}

fn bind_row(
    base: &HashMapContext,
    bindings: &[String],
    row: &Row,
    row_number: usize,
) -> Result<HashMapContext, EngineError> {
    let mut context = base.clone();
    for (idx, (name, cell)) in bindings.iter().zip(row).enumerate() {
        let value = value_to_evalexpr(cell);
        if context.get_value(name).is_none() {
            context
                .set_value(name.clone(), value.clone())
                .map_err(|err| execution_error(&err))?;
        }
        context
            .set_value(format!("c{idx}"), value)
            .map_err(|err| execution_error(&err))?;
    }
    context
        .set_value("row_number".to_string(), EvalValue::Int(row_number as i64))
        .map_err(|err| execution_error(&err))?;
    Ok(context)
}

fn execution_error(err: &EvalexprError) -> EngineError {
    EngineError::CodeExecutionError {
        message: err.to_string(),
    }
}

fn parse_statement(line: &str) -> Result<Statement, String> {
    let (keyword, rest) = line
        .split_once(char::is_whitespace)
        .map(|(k, r)| (k, r.trim()))
        .unwrap_or((line, ""));
    let keyword = keyword.to_ascii_lowercase();
    if rest.is_empty() {
        return Err(format!("'{keyword}' needs an argument"));
    }
    match keyword.as_str() {
        "keep" => Ok(Statement::Keep(parse_expression(rest)?)),
        "remove" => Ok(Statement::Remove(parse_expression(rest)?)),
        "set" => {
            let (column, expr) = rest
                .split_once('=')
                .ok_or_else(|| "expected 'set <column> = <expression>'".to_string())?;
            let column = unquote(column);
            if column.is_empty() {
                return Err("set needs a column name".to_string());
            }
            Ok(Statement::Set {
                column,
                expression: parse_expression(expr.trim())?,
            })
        }
        "drop" => Ok(Statement::Drop(parse_column_list(rest)?)),
        "select" => Ok(Statement::Select(parse_column_list(rest)?)),
        "rename" => {
            let (from, to) = rest
                .split_once("->")
                .ok_or_else(|| "expected 'rename <old> -> <new>'".to_string())?;
            let (from, to) = (unquote(from), unquote(to));
            if from.is_empty() || to.is_empty() {
                return Err("rename needs both an old and a new name".to_string());
            }
            Ok(Statement::Rename { from, to })
        }
        "sort" => {
            let (column, descending) = match rest.rsplit_once(char::is_whitespace) {
                Some((column, dir)) if dir.eq_ignore_ascii_case("desc") => (column, true),
                Some((column, dir)) if dir.eq_ignore_ascii_case("asc") => (column, false),
                _ => (rest, false),
            };
            Ok(Statement::Sort {
                column: unquote(column),
                descending,
            })
        }
        "limit" => rest
            .parse::<usize>()
            .map(Statement::Limit)
            .map_err(|_| format!("limit expects a row count, got '{rest}'")),
        other => Err(format!("unknown statement '{other}'")),
    }
}

fn parse_expression(source: &str) -> Result<Expression, String> {
    let node: Node = build_operator_tree(source)
        .map_err(|err| format!("cannot parse expression '{source}': {err}"))?;
    let mut uses_utilities = false;
    for name in node.iter_function_identifiers() {
        if UTILITY_FUNCTIONS.contains(&name) {
            uses_utilities = true;
        } else if !BUILTIN_FUNCTIONS.contains(&name)
            && !BUILTIN_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        {
            return Err(format!("function '{name}' is not available"));
        }
    }
    Ok(Expression {
        source: source.to_string(),
        node,
        uses_utilities,
    })
}

fn parse_column_list(raw: &str) -> Result<Vec<String>, String> {
    let columns = raw
        .split(',')
        .map(unquote)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>();
    if columns.is_empty() {
        return Err("expected at least one column".to_string());
    }
    Ok(columns)
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(trimmed)
        .to_string()
}

fn truthy(value: &EvalValue) -> bool {
    match value {
        EvalValue::Boolean(b) => *b,
        EvalValue::Int(i) => *i != 0,
        EvalValue::Float(f) => *f != 0.0,
        EvalValue::String(s) => !s.is_empty(),
        EvalValue::Tuple(values) => values.iter().any(truthy),
        EvalValue::Empty => false,
    }
}

/// Missing values sort last in either direction. Numeric cells order before
/// text cells; each group is compared within itself.
fn compare_cells(a: &Value, b: &Value, descending: bool) -> Ordering {
    match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.as_display().cmp(&b.as_display()),
            };
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Aggregate {
    sum: f64,
    numbers: usize,
    present: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl Aggregate {
    fn add(&mut self, value: &Value) {
        if value.is_missing() {
            return;
        }
        self.present += 1;
        if let Some(n) = value.as_number() {
            self.sum += n;
            self.numbers += 1;
            self.min = Some(self.min.map_or(n, |m| m.min(n)));
            self.max = Some(self.max.map_or(n, |m| m.max(n)));
        }
    }

    fn avg(&self) -> Option<f64> {
        (self.numbers > 0).then(|| self.sum / self.numbers as f64)
    }
}

type GroupKey = (usize, Option<usize>);

/// Read-only view of the rows an expression runs over, shared by utility functions.
struct Snapshot {
    headers: Vec<String>,
    rows: Vec<Row>,
    cursor: Arc<AtomicUsize>,
    columns: Mutex<HashMap<usize, Aggregate>>,
    groups: Mutex<HashMap<GroupKey, HashMap<String, (Aggregate, usize)>>>,
}

impl Snapshot {
    fn new(headers: &[String], rows: &[Row], cursor: Arc<AtomicUsize>) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: rows.to_vec(),
            cursor,
            columns: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
        }
    }

    fn column(&self, argument: &EvalValue) -> Result<usize, EvalexprError> {
        let EvalValue::String(label) = argument else {
            return Err(eval_error("column utilities expect a column name string"));
        };
        find_column(&self.headers, label)
            .ok_or_else(|| eval_error(&format!("unknown column '{label}'")))
    }

    fn aggregate(&self, idx: usize) -> Result<Aggregate, EvalexprError> {
        let mut cache = self
            .columns
            .lock()
            .map_err(|_| eval_error("aggregate cache unavailable"))?;
        Ok(*cache.entry(idx).or_insert_with(|| {
            let mut aggregate = Aggregate::default();
            self.rows
                .iter()
                .filter_map(|row| row.get(idx))
                .for_each(|value| aggregate.add(value));
            aggregate
        }))
    }

    /// Aggregate of `value_col` (or just the row count) over the current row's `key_col` group.
    fn group(&self, key_col: usize, value_col: Option<usize>) -> Result<(Aggregate, usize), EvalexprError> {
        let current = self.cursor.load(AtomicOrdering::Relaxed);
        let key = self
            .rows
            .get(current)
            .and_then(|row| row.get(key_col))
            .map(|value| value.as_display().into_owned())
            .unwrap_or_default();
        let mut cache = self
            .groups
            .lock()
            .map_err(|_| eval_error("group cache unavailable"))?;
        let groups = cache.entry((key_col, value_col)).or_insert_with(|| {
            let mut groups: HashMap<String, (Aggregate, usize)> = HashMap::new();
            for row in &self.rows {
                let key = row
                    .get(key_col)
                    .map(|value| value.as_display().into_owned())
                    .unwrap_or_default();
                let entry = groups.entry(key).or_default();
                entry.1 += 1;
                if let Some(value) = value_col.and_then(|idx| row.get(idx)) {
                    entry.0.add(value);
                }
            }
            groups
        });
        Ok(groups.get(&key).copied().unwrap_or_default())
    }

    fn distinct(&self, idx: usize) -> Vec<EvalValue> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|row| row.get(idx))
            .filter(|value| !value.is_missing())
            .filter(|value| seen.insert(value.as_display().into_owned()))
            .map(value_to_evalexpr)
            .collect()
    }
}

fn number(value: Option<f64>) -> EvalValue {
    value.map_or(EvalValue::Empty, EvalValue::Float)
}

fn register_utilities(
    context: &mut HashMapContext,
    snapshot: Arc<Snapshot>,
) -> Result<(), EvalexprError> {
    let shared = snapshot.clone();
    context.set_function(
        "sum".into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 1, "sum")?;
            let aggregate = shared.aggregate(shared.column(&args[0])?)?;
            Ok(number(Some(aggregate.sum)))
        }),
    )?;

    let shared = snapshot.clone();
    context.set_function(
        "avg".into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 1, "avg")?;
            Ok(number(shared.aggregate(shared.column(&args[0])?)?.avg()))
        }),
    )?;

    let shared = snapshot.clone();
    context.set_function(
        "min".into(),
        Function::new(move |arguments| match arguments {
            EvalValue::String(_) => Ok(number(shared.aggregate(shared.column(arguments)?)?.min)),
            other => numeric_fold(other, f64::min),
        }),
    )?;

    let shared = snapshot.clone();
    context.set_function(
        "max".into(),
        Function::new(move |arguments| match arguments {
            EvalValue::String(_) => Ok(number(shared.aggregate(shared.column(arguments)?)?.max)),
            other => numeric_fold(other, f64::max),
        }),
    )?;

    let shared = snapshot.clone();
    context.set_function(
        "count".into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 1, "count")?;
            let aggregate = shared.aggregate(shared.column(&args[0])?)?;
            Ok(EvalValue::Int(aggregate.present as i64))
        }),
    )?;

    let shared = snapshot.clone();
    context.set_function(
        "group_by".into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 1, "group_by")?;
            Ok(EvalValue::Tuple(shared.distinct(shared.column(&args[0])?)))
        }),
    )?;

    let shared = snapshot.clone();
    context.set_function(
        "group_sum".into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 2, "group_sum")?;
            let (key, column) = (shared.column(&args[0])?, shared.column(&args[1])?);
            Ok(number(Some(shared.group(key, Some(column))?.0.sum)))
        }),
    )?;

    let shared = snapshot.clone();
    context.set_function(
        "group_avg".into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 2, "group_avg")?;
            let (key, column) = (shared.column(&args[0])?, shared.column(&args[1])?);
            Ok(number(shared.group(key, Some(column))?.0.avg()))
        }),
    )?;

    let shared = snapshot;
    context.set_function(
        "group_count".into(),
        Function::new(move |arguments| {
            let args = expect_args(arguments, 1, "group_count")?;
            let (_, rows) = shared.group(shared.column(&args[0])?, None)?;
            Ok(EvalValue::Int(rows as i64))
        }),
    )?;

    Ok(())
}

fn numeric_fold(arguments: &EvalValue, fold: fn(f64, f64) -> f64) -> Result<EvalValue, EvalexprError> {
    let values = match arguments {
        EvalValue::Tuple(values) => values.clone(),
        other => vec![other.clone()],
    };
    let mut acc: Option<f64> = None;
    for value in values {
        let n = match value {
            EvalValue::Int(i) => i as f64,
            EvalValue::Float(f) => f,
            other => return Err(eval_error(&format!("expected numbers, got {other:?}"))),
        };
        acc = Some(acc.map_or(n, |a| fold(a, n)));
    }
    Ok(number(acc))
}

fn expect_args(
    arguments: &EvalValue,
    expected: usize,
    name: &str,
) -> Result<Vec<EvalValue>, EvalexprError> {
    match arguments {
        value if expected == 1 && !matches!(value, EvalValue::Tuple(_)) => Ok(vec![value.clone()]),
        EvalValue::Tuple(values) if values.len() == expected => Ok(values.clone()),
        EvalValue::Tuple(values) => Err(EvalexprError::wrong_function_argument_amount(
            values.len(),
            expected,
        )),
        _ => Err(eval_error(&format!(
            "{name} expects {expected} arguments provided as a tuple"
        ))),
    }
}

fn eval_error(message: &str) -> EvalexprError {
    EvalexprError::CustomMessage(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;

    fn sandbox() -> CodeSandbox {
        CodeSandbox::new(&SandboxConfig::default())
    }

    fn sales() -> Dataset {
        Dataset::new(
            vec!["region".to_string(), "sales".to_string(), "Unit Price".to_string()],
            vec![
                vec![Value::from("north"), Value::Number(10.0), Value::Number(2.5)],
                vec![Value::from("south"), Value::Number(30.0), Value::Number(1.0)],
                vec![Value::from("north"), Value::Number(20.0), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn denied_tokens_are_rejected_before_parsing() {
        let err = sandbox().compile("keep process.exit(1)").unwrap_err();
        assert!(matches!(err, EngineError::CodeValidationRejected { .. }));
        let err = sandbox().compile("set x = require(\"fs\")").unwrap_err();
        assert!(matches!(err, EngineError::CodeValidationRejected { .. }));
    }

    #[test]
    fn unknown_statements_and_functions_are_rejected() {
        assert!(matches!(
            sandbox().compile("explode everything").unwrap_err(),
            EngineError::CodeValidationRejected { .. }
        ));
        assert!(matches!(
            sandbox().compile("keep launch(sales)").unwrap_err(),
            EngineError::CodeValidationRejected { .. }
        ));
        assert!(matches!(
            sandbox().compile("# only a comment").unwrap_err(),
            EngineError::CodeValidationRejected { .. }
        ));
    }

    #[test]
    fn keep_and_set_transform_rows() {
        let applied = sandbox()
            .run("keep sales >= 20\nset doubled = sales * 2", &sales())
            .unwrap();
        let dataset = applied.dataset;
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.headers().last().map(String::as_str), Some("doubled"));
        assert_eq!(dataset.rows()[0][3], Value::Number(60.0));
        match &applied.changes[0].detail {
            ChangeDetail::Code { columns_added, .. } => assert_eq!(columns_added, &["doubled"]),
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn utilities_see_the_whole_column() {
        let applied = sandbox()
            .run(
                "set share = sales / sum(\"sales\")\nset region_total = group_sum(\"region\", \"sales\")",
                &sales(),
            )
            .unwrap();
        let rows = applied.dataset.rows().to_vec();
        assert_eq!(rows[1][3], Value::Number(0.5));
        assert_eq!(rows[0][4], Value::Number(30.0));
        assert_eq!(rows[1][4], Value::Number(30.0));
    }

    #[test]
    fn sorting_mixed_columns_puts_numbers_before_text() {
        let codes = ["10", "5x", "9", "abc", "", "2", "10b"];
        let dataset = Dataset::new(
            vec!["code".to_string()],
            codes.iter().map(|c| vec![Value::from_raw(c)]).collect(),
        )
        .unwrap();
        let sorted = sandbox().run("sort code", &dataset).unwrap().dataset;
        let order = sorted
            .rows()
            .iter()
            .map(|row| row[0].to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["2", "9", "10", "10b", "5x", "abc", ""]);

        let descending = sandbox().run("sort code desc", &dataset).unwrap().dataset;
        let order = descending
            .rows()
            .iter()
            .map(|row| row[0].to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["abc", "5x", "10b", "10", "9", "2", ""]);
    }

    #[test]
    fn mixed_cell_ordering_is_transitive() {
        let cells = [Value::Number(9.0), Value::Number(10.0), Value::from("5x")];
        for a in &cells {
            for b in &cells {
                for c in &cells {
                    if compare_cells(a, b, false) == Ordering::Less
                        && compare_cells(b, c, false) == Ordering::Less
                    {
                        assert_eq!(compare_cells(a, c, false), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn columns_bind_by_position_and_normalized_name() {
        let applied = sandbox()
            .run("remove c0 == \"south\"\ndrop unit_price\nsort sales desc", &sales())
            .unwrap();
        let dataset = applied.dataset;
        assert_eq!(dataset.headers(), &["region".to_string(), "sales".to_string()]);
        assert_eq!(dataset.rows()[0][1], Value::Number(20.0));
    }

    #[test]
    fn runtime_faults_leave_the_input_alone() {
        let input = sales();
        let before = input.clone();
        let err = sandbox().run("set broken = sales + \"text\" * 3", &input).unwrap_err();
        assert!(matches!(err, EngineError::CodeExecutionError { .. }));
        assert_eq!(input, before);

        let err = sandbox().run("drop missing_column", &input).unwrap_err();
        assert!(matches!(err, EngineError::CodeExecutionError { .. }));
    }

    #[test]
    fn zero_budget_times_out() {
        let err = sandbox()
            .with_timeout(Duration::ZERO)
            .run("keep sales > 0", &sales())
            .unwrap_err();
        match err {
            EngineError::CodeExecutionError { message } => assert!(message.contains("time budget")),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
