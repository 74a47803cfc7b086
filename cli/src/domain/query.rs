//! A small SQL-like language over the process metadata table.
//!
//! Pure functions only; no I/O, no async. The table is `processes`; rows are
//! [`ProcessInfo`] snapshots. Reads support projection, `COUNT(*)`, `WHERE`
//! conjunctions, `ORDER BY` and `LIMIT`. The only write is
//! `UPDATE processes SET label = ...`; statements that create or delete rows
//! are refused because rows mirror live processes.

use std::cmp::Ordering;
use std::fmt;

use devpilot_common::ProcessInfo;
use regex::Regex;
use thiserror::Error;

pub const TABLE: &str = "processes";

/// Statements refused because they would add or remove rows.
pub const ROW_MUTATING_KEYWORDS: &[&str] =
    &["DELETE", "INSERT", "DROP", "CREATE", "ALTER", "REPLACE", "TRUNCATE"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0}")]
    Parse(String),

    #[error("column '{0}' is read-only; only 'label' can be updated")]
    ReadOnlyColumn(String),

    #[error("{0} statements are not permitted on the process table; use devStop to stop servers")]
    Forbidden(String),
}

fn parse_err(msg: impl Into<String>) -> QueryError {
    QueryError::Parse(msg.into())
}

// ── Values and columns ───────────────────────────────────────────────────────

/// A cell or literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl Value {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Text(b)) => b.parse::<i64>().ok().map(|b| a.cmp(&b)),
            (Self::Text(a), Self::Int(b)) => a.parse::<i64>().ok().map(|a| a.cmp(b)),
            (Self::Bool(a), Self::Text(b)) => b.parse::<bool>().ok().map(|b| a.cmp(&b)),
            (Self::Text(a), Self::Bool(b)) => a.parse::<bool>().ok().map(|a| a.cmp(b)),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }

    fn sort_key_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            _ => self
                .compare(other)
                .unwrap_or_else(|| self.to_string().cmp(&other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Key,
    Script,
    Cwd,
    Pid,
    StartedAt,
    UptimeSecs,
    Command,
    Ready,
    Label,
}

impl Column {
    pub const ALL: &'static [Column] = &[
        Self::Key,
        Self::Script,
        Self::Cwd,
        Self::Pid,
        Self::StartedAt,
        Self::UptimeSecs,
        Self::Command,
        Self::Ready,
        Self::Label,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Script => "script",
            Self::Cwd => "cwd",
            Self::Pid => "pid",
            Self::StartedAt => "started_at",
            Self::UptimeSecs => "uptime_secs",
            Self::Command => "command",
            Self::Ready => "ready",
            Self::Label => "label",
        }
    }

    fn parse(word: &str) -> Result<Self, QueryError> {
        let lower = word.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == lower)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|c| c.name()).collect();
                parse_err(format!("unknown column '{word}'. Columns: {}", names.join(", ")))
            })
    }

    #[must_use]
    pub fn value(self, row: &ProcessInfo) -> Value {
        match self {
            Self::Key => Value::Text(row.key.clone()),
            Self::Script => Value::Text(row.script.clone()),
            Self::Cwd => Value::Text(row.cwd.clone()),
            Self::Pid => Value::Int(i64::from(row.pid)),
            Self::StartedAt => Value::Text(row.started_at.to_rfc3339()),
            Self::UptimeSecs => Value::Int(i64::try_from(row.uptime_secs).unwrap_or(i64::MAX)),
            Self::Command => Value::Text(row.command_line()),
            Self::Ready => Value::Bool(row.ready),
            Self::Label => row.label.clone().map_or(Value::Null, Value::Text),
        }
    }
}

// ── AST ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: Column,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    #[must_use]
    pub fn matches(&self, row: &ProcessInfo) -> bool {
        let cell = self.column.value(row);
        match self.op {
            Op::Eq => cell.compare(&self.value) == Some(Ordering::Equal),
            Op::Ne => cell.compare(&self.value) != Some(Ordering::Equal),
            Op::Lt => cell.compare(&self.value) == Some(Ordering::Less),
            Op::Le => matches!(
                cell.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::Gt => cell.compare(&self.value) == Some(Ordering::Greater),
            Op::Ge => matches!(
                cell.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Op::Like => like(&cell.to_string(), &self.value.to_string()),
        }
    }
}

/// Case-insensitive `LIKE` with `%` and `_` wildcards.
fn like(text: &str, pattern: &str) -> bool {
    let mut re = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).is_ok_and(|r| r.is_match(text))
}

/// Conjunction of conditions; empty matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter(pub Vec<Condition>);

impl Filter {
    #[must_use]
    pub fn matches(&self, row: &ProcessInfo) -> bool {
        self.0.iter().all(|c| c.matches(row))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<Column>),
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub projection: Projection,
    pub filter: Filter,
    pub order_by: Option<(Column, bool)>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub label: Option<String>,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Select(Select),
    Update(Update),
}

impl Statement {
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Update(_))
    }
}

/// Tabular result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Select {
    /// Run the select over a snapshot of the table.
    #[must_use]
    pub fn execute(&self, table: &[ProcessInfo]) -> ResultSet {
        let mut rows: Vec<&ProcessInfo> = table.iter().filter(|r| self.filter.matches(r)).collect();

        if let Projection::Count = self.projection {
            let count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
            return ResultSet {
                columns: vec!["count".to_string()],
                rows: vec![vec![Value::Int(count)]],
            };
        }

        if let Some((column, descending)) = self.order_by {
            rows.sort_by(|a, b| {
                let ord = column.value(a).sort_key_cmp(&column.value(b));
                if descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        let columns: Vec<Column> = match &self.projection {
            Projection::Columns(cols) => cols.clone(),
            _ => Column::ALL.to_vec(),
        };
        ResultSet {
            columns: columns.iter().map(|c| c.name().to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| columns.iter().map(|c| c.value(row)).collect())
                .collect(),
        }
    }
}

// ── Tokenizer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Int(i64),
    Str(String),
    Sym(&'static str),
    Param,
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut num = String::new();
                num.push(c);
                chars.next();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        num.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = num
                    .parse()
                    .map_err(|_| parse_err(format!("invalid number '{num}'")))?;
                tokens.push(Token::Int(value));
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            text.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => text.push(c),
                        None => return Err(parse_err("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '?' => {
                chars.next();
                tokens.push(Token::Param);
            }
            '*' | ',' | '(' | ')' | ';' | '=' => {
                chars.next();
                tokens.push(Token::Sym(match c {
                    '*' => "*",
                    ',' => ",",
                    '(' => "(",
                    ')' => ")",
                    ';' => ";",
                    _ => "=",
                }));
            }
            '!' | '<' | '>' => {
                chars.next();
                let next = chars.peek().copied();
                let sym = match (c, next) {
                    ('!', Some('=')) => "!=",
                    ('<', Some('=')) => "<=",
                    ('<', Some('>')) => "<>",
                    ('>', Some('=')) => ">=",
                    ('<', _) => "<",
                    ('>', _) => ">",
                    _ => return Err(parse_err("unexpected character '!'")),
                };
                if sym.len() == 2 {
                    chars.next();
                }
                tokens.push(Token::Sym(sym));
            }
            other => return Err(parse_err(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

// ── Parser ───────────────────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    params: &'a [Value],
    next_param: usize,
}

/// Parse `query`, binding `?` placeholders positionally from `params`.
///
/// # Errors
///
/// Returns [`QueryError::Forbidden`] for row-mutating statements,
/// [`QueryError::ReadOnlyColumn`] for writes to anything but `label`, and
/// [`QueryError::Parse`] for malformed input.
pub fn parse(query: &str, params: &[Value]) -> Result<Statement, QueryError> {
    let tokens = tokenize(query)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        params,
        next_param: 0,
    };
    let statement = parser.statement()?;
    if parser.next_param != params.len() {
        return Err(parse_err(format!(
            "query uses {} parameter(s) but {} were supplied",
            parser.next_param,
            params.len()
        )));
    }
    Ok(statement)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), QueryError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(parse_err(format!("expected {keyword}")))
        }
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Token::Sym(s)) if *s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, sym: &str) -> Result<(), QueryError> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(parse_err(format!("expected '{sym}'")))
        }
    }

    fn word(&mut self, what: &str) -> Result<String, QueryError> {
        match self.advance() {
            Some(Token::Word(w)) => Ok(w),
            _ => Err(parse_err(format!("expected {what}"))),
        }
    }

    fn statement(&mut self) -> Result<Statement, QueryError> {
        let first = match self.peek() {
            Some(Token::Word(w)) => w.to_ascii_uppercase(),
            _ => return Err(parse_err("query must start with SELECT or UPDATE")),
        };
        let statement = match first.as_str() {
            "SELECT" => {
                self.pos += 1;
                Statement::Select(self.select()?)
            }
            "UPDATE" => {
                self.pos += 1;
                Statement::Update(self.update()?)
            }
            kw if ROW_MUTATING_KEYWORDS.contains(&kw) => {
                return Err(QueryError::Forbidden(kw.to_string()));
            }
            other => {
                return Err(parse_err(format!(
                    "unsupported statement '{other}'; expected SELECT or UPDATE"
                )));
            }
        };
        self.eat_sym(";");
        if self.pos < self.tokens.len() {
            return Err(parse_err("unexpected trailing input"));
        }
        Ok(statement)
    }

    fn table(&mut self) -> Result<(), QueryError> {
        let name = self.word("table name")?;
        if name.eq_ignore_ascii_case(TABLE) {
            Ok(())
        } else {
            Err(parse_err(format!("unknown table '{name}'; the only table is '{TABLE}'")))
        }
    }

    fn select(&mut self) -> Result<Select, QueryError> {
        let projection = self.projection()?;
        self.expect_keyword("FROM")?;
        self.table()?;
        let filter = self.filter()?;

        let mut order_by = None;
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = Column::parse(&self.word("column name")?)?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            order_by = Some((column, descending));
        }

        let mut limit = None;
        if self.eat_keyword("LIMIT") {
            match self.advance() {
                Some(Token::Int(n)) if n >= 0 => limit = usize::try_from(n).ok(),
                _ => return Err(parse_err("LIMIT expects a non-negative integer")),
            }
        }

        Ok(Select {
            projection,
            filter,
            order_by,
            limit,
        })
    }

    fn projection(&mut self) -> Result<Projection, QueryError> {
        if self.eat_sym("*") {
            return Ok(Projection::All);
        }
        if self.peek_keyword("COUNT") {
            self.pos += 1;
            self.expect_sym("(")?;
            self.expect_sym("*")?;
            self.expect_sym(")")?;
            return Ok(Projection::Count);
        }
        let mut columns = vec![Column::parse(&self.word("column name or *")?)?];
        while self.eat_sym(",") {
            columns.push(Column::parse(&self.word("column name")?)?);
        }
        Ok(Projection::Columns(columns))
    }

    fn update(&mut self) -> Result<Update, QueryError> {
        self.table()?;
        self.expect_keyword("SET")?;
        let mut label = None;
        loop {
            let column = Column::parse(&self.word("column name")?)?;
            if column != Column::Label {
                return Err(QueryError::ReadOnlyColumn(column.name().to_string()));
            }
            self.expect_sym("=")?;
            label = match self.value()? {
                Value::Null => None,
                other => Some(other.to_string()),
            };
            if !self.eat_sym(",") {
                break;
            }
        }
        let filter = self.filter()?;
        Ok(Update { label, filter })
    }

    fn filter(&mut self) -> Result<Filter, QueryError> {
        let mut conditions = Vec::new();
        if self.eat_keyword("WHERE") {
            conditions.push(self.condition()?);
            while self.eat_keyword("AND") {
                conditions.push(self.condition()?);
            }
        }
        Ok(Filter(conditions))
    }

    fn condition(&mut self) -> Result<Condition, QueryError> {
        let column = Column::parse(&self.word("column name")?)?;
        let op = match self.advance() {
            Some(Token::Sym("=")) => Op::Eq,
            Some(Token::Sym("!=" | "<>")) => Op::Ne,
            Some(Token::Sym("<")) => Op::Lt,
            Some(Token::Sym("<=")) => Op::Le,
            Some(Token::Sym(">")) => Op::Gt,
            Some(Token::Sym(">=")) => Op::Ge,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("LIKE") => Op::Like,
            _ => return Err(parse_err("expected comparison operator")),
        };
        let value = self.value()?;
        Ok(Condition { column, op, value })
    }

    fn value(&mut self) -> Result<Value, QueryError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Value::Int(n)),
            Some(Token::Str(s)) => Ok(Value::Text(s)),
            Some(Token::Param) => {
                let value = self.params.get(self.next_param).cloned().ok_or_else(|| {
                    parse_err(format!("missing value for parameter {}", self.next_param + 1))
                })?;
                self.next_param += 1;
                Ok(value)
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("TRUE") => Ok(Value::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("FALSE") => Ok(Value::Bool(false)),
            _ => Err(parse_err("expected a value")),
        }
    }
}
