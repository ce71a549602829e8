//! In-process implementation of the call-level interface.
//!
//! `SimInterface` keeps handles, prepared statements and scripted results in
//! memory and follows the observable contract of the native layer: handles
//! must be live to be used, placeholders must be bound before execute,
//! fetched rows are written into the defined buffers in wire format, the row
//! count attribute is cumulative, and a short batch returns `NoData`.
//!
//! Results are scripted per SQL text with [`SimScript`]. Any statement
//! without a script behaves like DML touching zero rows, except queries,
//! which fail with ORA-00942.
//!
//! ```
//! use oracle_bound_rs::native::sim::{SimColumn, SimInterface, SimQuery, SimScript};
//!
//! let sim = SimInterface::new();
//! sim.register(
//!     "SELECT id FROM t",
//!     SimScript::query(SimQuery::new(vec![SimColumn::number("ID")]).row(vec![1.into()])),
//! );
//! ```

use super::constants::*;
use super::decode::{
    decode_oracle_date, decode_text, decode_varnum, encode_oracle_date, encode_text, encode_varnum,
};
use super::types::{OracleValue, WireType};
use super::{
    Attribute, BindTarget, CallInterface, DefineTarget, EnvMode, ErrorRecord, Handle, HandleType,
    NativeResult, Status,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Column exposed by a scripted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimColumn {
    pub name: String,
    pub type_code: u16,
    pub max_size: u32,
}

impl SimColumn {
    pub fn number(name: &str) -> Self {
        Self::raw(name, SQLT_NUM, 22)
    }

    pub fn date(name: &str) -> Self {
        Self::raw(name, SQLT_DAT, 7)
    }

    pub fn text(name: &str, max_size: u32) -> Self {
        Self::raw(name, SQLT_CHR, max_size)
    }

    /// Column with an arbitrary native type code.
    pub fn raw(name: &str, type_code: u16, max_size: u32) -> Self {
        Self {
            name: name.to_string(),
            type_code,
            max_size,
        }
    }
}

/// Columns and rows returned by a query or a ref cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimQuery {
    columns: Vec<SimColumn>,
    rows: Vec<Vec<OracleValue>>,
}

impl SimQuery {
    pub fn new(columns: Vec<SimColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: Vec<OracleValue>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<OracleValue>>) -> Self {
        self.rows.extend(rows);
        self
    }
}

/// Scripted behaviour of one SQL text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimScript {
    statement_type: Option<u16>,
    query: Option<SimQuery>,
    rows_affected: u32,
    out_binds: Vec<(String, OracleValue)>,
    cursor_binds: Vec<(String, SimQuery)>,
    failure: Option<ErrorRecord>,
    pending_polls: u32,
}

impl SimScript {
    /// A query returning `query`'s rows.
    pub fn query(query: SimQuery) -> Self {
        Self {
            query: Some(query),
            ..Self::default()
        }
    }

    /// DML reporting `rows_affected`.
    pub fn dml(rows_affected: u32) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// PL/SQL block; combine with [`out`](Self::out) and [`cursor`](Self::cursor).
    pub fn block() -> Self {
        Self::default()
    }

    /// Write `value` into the bind named `name` on execute.
    pub fn out(mut self, name: &str, value: impl Into<OracleValue>) -> Self {
        self.out_binds.push((name.to_string(), value.into()));
        self
    }

    /// Open `query` on the cursor bound as `name` on execute.
    pub fn cursor(mut self, name: &str, query: SimQuery) -> Self {
        self.cursor_binds.push((name.to_string(), query));
        self
    }

    /// Fail every execute with the given ORA- error.
    pub fn fails(mut self, code: i32, message: &str) -> Self {
        self.failure = Some(ErrorRecord {
            code,
            message: format!("ORA-{:05}: {}", code, message),
        });
        self
    }

    /// Override the statement type reported after prepare.
    pub fn statement_type(mut self, code: u16) -> Self {
        self.statement_type = Some(code);
        self
    }

    /// In non-blocking mode, report `StillExecuting` for this many execute calls first.
    pub fn still_executing(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }
}

/// Operations that can be made to fail once with [`SimInterface::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOperation {
    EnvCreate,
    HandleAlloc,
    AttrSet,
    ServerAttach,
    SessionBegin,
    Prepare,
    BindByName,
    Execute,
    ParamGet,
    DefineByPos,
    Fetch,
    Commit,
    Rollback,
}

/// Call counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub handles_allocated: u32,
    pub handles_freed: u32,
    /// Frees of handles that were not live.
    pub invalid_frees: u32,
    pub executes: u32,
    pub fetch_calls: u32,
    pub commits: u32,
    pub rollbacks: u32,
}

/// One execute call with its decoded input binds.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub sql: String,
    pub iters: u32,
    pub binds: Vec<(String, OracleValue)>,
}

#[derive(Debug)]
struct SimCursor {
    columns: Vec<SimColumn>,
    rows: Vec<Vec<OracleValue>>,
    position: usize,
}

impl SimCursor {
    fn open(query: &SimQuery) -> Self {
        Self {
            columns: query.columns.clone(),
            rows: query.rows.clone(),
            position: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SimStatement {
    sql: String,
    script: Option<SimScript>,
    statement_type: u16,
    binds: Vec<u64>,
    defines: HashMap<usize, u64>,
    cursor: Option<SimCursor>,
    row_count: u32,
    polls_left: u32,
}

#[derive(Debug)]
struct SimBind {
    name: String,
}

#[derive(Debug)]
struct SimDefine {
    stmt: u64,
    position: usize,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u64,
    live: HashMap<u64, HandleType>,
    statements: HashMap<u64, SimStatement>,
    binds: HashMap<u64, SimBind>,
    defines: HashMap<u64, SimDefine>,
    descriptors: HashMap<u64, (u64, usize)>,
    errors: HashMap<u64, ErrorRecord>,
    attributes: HashMap<u64, HashMap<u32, String>>,
    last_attributes: HashMap<u32, String>,
    scripts: HashMap<String, SimScript>,
    faults: HashMap<SimOperation, ErrorRecord>,
    credentials: Option<(String, String)>,
    attached: HashSet<u64>,
    sessions: HashSet<u64>,
    non_blocking: bool,
    env_mode: Option<EnvMode>,
    stats: SimStats,
    executions: Vec<ExecutionRecord>,
}

type SimFailure = ErrorRecord;

fn ora(code: i32, message: &str) -> SimFailure {
    ErrorRecord {
        code,
        message: format!("ORA-{:05}: {}", code, message),
    }
}

fn sql_key(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn classify(sql: &str) -> u16 {
    let keyword: String = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase();
    match keyword.as_str() {
        "SELECT" | "WITH" => OCI_STMT_SELECT,
        "UPDATE" => OCI_STMT_UPDATE,
        "DELETE" => OCI_STMT_DELETE,
        "INSERT" => OCI_STMT_INSERT,
        "CREATE" => OCI_STMT_CREATE,
        "DROP" => OCI_STMT_DROP,
        "ALTER" => OCI_STMT_ALTER,
        "BEGIN" => OCI_STMT_BEGIN,
        "DECLARE" => OCI_STMT_DECLARE,
        _ => 0,
    }
}

/// Placeholder names in `sql`, upper case without the sigil.
fn placeholders(sql: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;
    while let Some(c) = chars.next() {
        match c {
            '\'' => in_literal = !in_literal,
            ':' if !in_literal => {
                if chars.peek().is_some_and(|c| c.is_alphabetic()) {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_alphanumeric() || matches!(c, '_' | '$' | '#') {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    names.insert(name.to_uppercase());
                }
            }
            _ => {}
        }
    }
    names
}

fn bind_key(name: &str) -> String {
    name.trim_start_matches(BIND_SIGIL).to_uppercase()
}

/// Write `value` into one element slot, returning the value length.
fn write_value(value: &OracleValue, wire: WireType, slot: &mut [u8]) -> Result<u16, SimFailure> {
    let inconsistent = || ora(932, "inconsistent datatypes");
    match (wire, value) {
        (WireType::VarNum, OracleValue::Number(text) | OracleValue::Text(text)) => {
            encode_varnum(text, slot).map_err(|_| ora(1722, "invalid number"))?;
            Ok(slot.len() as u16)
        }
        (WireType::Date, OracleValue::Date(dt)) => {
            let bytes = encode_oracle_date(dt).map_err(|_| ora(1841, "year out of range"))?;
            slot.get_mut(..DATE_SIZE)
                .ok_or_else(inconsistent)?
                .copy_from_slice(&bytes);
            Ok(DATE_SIZE as u16)
        }
        (WireType::String, OracleValue::Text(text) | OracleValue::Number(text)) => {
            Ok(encode_text(text, slot) as u16)
        }
        (WireType::String, OracleValue::Date(dt)) => {
            Ok(encode_text(&dt.format("%Y-%m-%d %H:%M:%S").to_string(), slot) as u16)
        }
        _ => Err(inconsistent()),
    }
}

fn read_bind(target: &BindTarget<'_>) -> OracleValue {
    if *target.indicator == INDICATOR_NULL {
        return OracleValue::Null;
    }
    let decoded = match target.wire {
        WireType::VarNum => decode_varnum(target.data).map(OracleValue::Number),
        WireType::Date => decode_oracle_date(target.data).map(OracleValue::Date),
        WireType::String => decode_text(target.data, None).map(OracleValue::Text),
        WireType::NestedStatement => return OracleValue::Null,
    };
    decoded.unwrap_or(OracleValue::Null)
}

/// In-memory call-level interface.
#[derive(Debug, Default)]
pub struct SimInterface {
    state: RefCell<SimState>,
}

impl SimInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept logons with these credentials.
    pub fn with_credentials(username: &str, password: &str) -> Self {
        let sim = Self::default();
        sim.state.borrow_mut().credentials = Some((username.to_string(), password.to_string()));
        sim
    }

    /// Script the behaviour of `sql`. Matching ignores case and whitespace runs.
    pub fn register(&self, sql: &str, script: SimScript) {
        self.state.borrow_mut().scripts.insert(sql_key(sql), script);
    }

    /// Make the next call of `operation` fail with ORA-`code`.
    pub fn fail_next(&self, operation: SimOperation, code: i32, message: &str) {
        self.state
            .borrow_mut()
            .faults
            .insert(operation, ora(code, message));
    }

    pub fn stats(&self) -> SimStats {
        self.state.borrow().stats.clone()
    }

    /// Handles and descriptors allocated and not yet freed.
    pub fn live_handles(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn executions(&self) -> Vec<ExecutionRecord> {
        self.state.borrow().executions.clone()
    }

    /// Last value written for attribute `code` on any handle.
    pub fn attribute(&self, code: u32) -> Option<String> {
        self.state.borrow().last_attributes.get(&code).cloned()
    }

    pub fn is_non_blocking(&self) -> bool {
        self.state.borrow().non_blocking
    }

    /// Mode of the last environment created.
    pub fn env_mode(&self) -> Option<EnvMode> {
        self.state.borrow().env_mode
    }
}

impl SimState {
    fn alloc(&mut self, kind: HandleType) -> Handle {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, kind);
        self.stats.handles_allocated += 1;
        if kind == HandleType::Statement {
            self.statements.insert(id, SimStatement::default());
        }
        Handle::new(kind, id)
    }

    fn is_live(&self, handle: Handle, kind: HandleType) -> bool {
        handle.kind() == kind && self.live.get(&handle.id()) == Some(&kind)
    }

    fn record(&mut self, err: Handle, failure: SimFailure) -> Status {
        self.errors.insert(err.id(), failure);
        Status::Error
    }

    /// Consume an injected fault for `operation`, recording it on `err`.
    fn fault(&mut self, operation: SimOperation, err: Handle) -> Option<Status> {
        let failure = self.faults.remove(&operation)?;
        Some(self.record(err, failure))
    }

    fn statement(&mut self, stmt: Handle) -> Result<&mut SimStatement, Status> {
        if !self.is_live(stmt, HandleType::Statement) {
            return Err(Status::InvalidHandle);
        }
        self.statements.get_mut(&stmt.id()).ok_or(Status::InvalidHandle)
    }

    fn set_attribute(&mut self, target: Handle, attribute: &Attribute<'_>) {
        let value = match attribute {
            Attribute::Server(h) | Attribute::Session(h) => h.id().to_string(),
            Attribute::Username(s) | Attribute::Password(s) => s.to_string(),
            Attribute::Module(s) | Attribute::ClientInfo(s) => s.to_string(),
            Attribute::NonBlockingMode(on) => {
                self.non_blocking = *on;
                on.to_string()
            }
            Attribute::CharsetId(id) => id.to_string(),
        };
        self.last_attributes.insert(attribute.code(), value.clone());
        self.attributes
            .entry(target.id())
            .or_default()
            .insert(attribute.code(), value);
    }

    fn execute(
        &mut self,
        stmt: Handle,
        iters: u32,
        binds: &mut [BindTarget<'_>],
    ) -> Result<(), SimFailure> {
        let bound: HashMap<u64, String> = binds
            .iter()
            .filter_map(|t| Some((t.bind.id(), self.binds.get(&t.bind.id())?.name.clone())))
            .collect();
        let non_blocking = self.non_blocking;
        let statement = self.statement(stmt).map_err(|_| ora(24337, "statement handle not prepared"))?;
        if statement.sql.is_empty() {
            return Err(ora(24337, "statement handle not prepared"));
        }
        if non_blocking && statement.polls_left > 0 {
            statement.polls_left -= 1;
            return Err(ErrorRecord {
                code: 3123,
                message: "ORA-03123: operation would block".to_string(),
            });
        }

        let names: HashSet<String> = statement
            .binds
            .iter()
            .filter_map(|id| bound.get(id).map(|n| bind_key(n)))
            .collect();
        if !placeholders(&statement.sql).is_subset(&names) {
            return Err(ora(1008, "not all variables bound"));
        }

        let script = statement.script.clone().unwrap_or_default();
        let sql = statement.sql.clone();
        let statement_type = statement.statement_type;
        if let Some(failure) = script.failure.clone() {
            return Err(failure);
        }

        let journal = binds
            .iter()
            .filter_map(|t| Some((bound.get(&t.bind.id())?.clone(), read_bind(t))))
            .collect();
        self.executions.push(ExecutionRecord {
            sql,
            iters,
            binds: journal,
        });

        if statement_type == OCI_STMT_SELECT {
            let query = script
                .query
                .as_ref()
                .ok_or_else(|| ora(942, "table or view does not exist"))?;
            let statement = self.statement(stmt).map_err(|_| ora(24337, "statement handle not prepared"))?;
            statement.cursor = Some(SimCursor::open(query));
            statement.row_count = 0;
            return Ok(());
        }

        for (name, value) in &script.out_binds {
            let target = binds
                .iter_mut()
                .find(|t| bound.get(&t.bind.id()).is_some_and(|n| bind_key(n) == bind_key(name)))
                .ok_or_else(|| ora(1008, "not all variables bound"))?;
            if value.is_null() {
                *target.indicator = INDICATOR_NULL;
                continue;
            }
            let length = write_value(value, target.wire, target.data)?;
            *target.indicator = INDICATOR_PRESENT;
            *target.length = match target.wire {
                WireType::String => length + 1,
                _ => length,
            };
        }

        for (name, query) in &script.cursor_binds {
            let nested = binds
                .iter_mut()
                .find(|t| bound.get(&t.bind.id()).is_some_and(|n| bind_key(n) == bind_key(name)))
                .and_then(|t| {
                    *t.indicator = INDICATOR_PRESENT;
                    t.nested
                })
                .ok_or_else(|| ora(1008, "not all variables bound"))?;
            let child = self
                .statement(nested)
                .map_err(|_| ora(24338, "statement handle not executed"))?;
            child.statement_type = OCI_STMT_SELECT;
            child.cursor = Some(SimCursor::open(query));
            child.row_count = 0;
        }

        let statement = self.statement(stmt).map_err(|_| ora(24337, "statement handle not prepared"))?;
        statement.row_count = script.rows_affected;
        Ok(())
    }

    fn fetch(
        &mut self,
        stmt: Handle,
        rows: u32,
        targets: &mut [DefineTarget<'_>],
    ) -> Result<Status, SimFailure> {
        let positions: Vec<usize> = targets
            .iter()
            .map(|t| match self.defines.get(&t.define.id()) {
                Some(define) if define.stmt == stmt.id() => Ok(define.position),
                _ => Err(ora(24337, "define handle does not belong to statement")),
            })
            .collect::<Result<_, _>>()?;
        let statement = self
            .statement(stmt)
            .map_err(|_| ora(24338, "statement handle not executed"))?;
        let cursor = statement
            .cursor
            .as_mut()
            .ok_or_else(|| ora(24338, "statement handle not executed"))?;

        let mut delivered = 0u32;
        while delivered < rows && cursor.position < cursor.rows.len() {
            let row = &cursor.rows[cursor.position];
            let slot_index = delivered as usize;
            for (target, &position) in targets.iter_mut().zip(&positions) {
                let start = slot_index * target.element_size;
                let slot = target
                    .data
                    .get_mut(start..start + target.element_size)
                    .ok_or_else(|| ora(1406, "fetched column value was truncated"))?;
                let indicator = target
                    .indicators
                    .get_mut(slot_index)
                    .ok_or_else(|| ora(1406, "fetched column value was truncated"))?;
                let value = match row.get(position - 1) {
                    Some(value) if !value.is_null() => value,
                    _ => {
                        *indicator = INDICATOR_NULL;
                        continue;
                    }
                };
                let length = write_value(value, target.wire, slot)?;
                *indicator = INDICATOR_PRESENT;
                if let Some(len) = target.lengths.as_mut().and_then(|l| l.get_mut(slot_index)) {
                    *len = length;
                }
            }
            cursor.position += 1;
            delivered += 1;
        }
        statement.row_count += delivered;
        Ok(if delivered < rows {
            Status::NoData
        } else {
            Status::Success
        })
    }
}

impl CallInterface for SimInterface {
    fn env_create(&self, mode: EnvMode) -> NativeResult<Handle> {
        let mut state = self.state.borrow_mut();
        if state.faults.remove(&SimOperation::EnvCreate).is_some() {
            return Err(Status::Error);
        }
        state.env_mode = Some(mode);
        Ok(state.alloc(HandleType::Environment))
    }

    fn handle_alloc(&self, parent: Handle, kind: HandleType) -> NativeResult<Handle> {
        let mut state = self.state.borrow_mut();
        if !state.is_live(parent, HandleType::Environment) {
            return Err(Status::InvalidHandle);
        }
        if let Some(status) = state.fault(SimOperation::HandleAlloc, parent) {
            return Err(status);
        }
        Ok(state.alloc(kind))
    }

    fn handle_free(&self, handle: Handle) -> Status {
        let mut state = self.state.borrow_mut();
        if state.live.get(&handle.id()) != Some(&handle.kind()) {
            state.stats.invalid_frees += 1;
            return Status::InvalidHandle;
        }
        state.live.remove(&handle.id());
        state.stats.handles_freed += 1;
        state.errors.remove(&handle.id());
        state.descriptors.remove(&handle.id());
        if let Some(statement) = state.statements.remove(&handle.id()) {
            for bind in statement.binds {
                state.binds.remove(&bind);
            }
            for define in statement.defines.values() {
                state.defines.remove(define);
            }
        }
        Status::Success
    }

    fn attr_set(&self, target: Handle, attribute: Attribute<'_>, err: Handle) -> Status {
        let mut state = self.state.borrow_mut();
        let id = target.id();
        let known = match target.kind() {
            HandleType::Bind => state.binds.contains_key(&id),
            HandleType::Define => state.defines.contains_key(&id),
            _ => state.live.contains_key(&id),
        };
        if !known {
            return Status::InvalidHandle;
        }
        if let Some(status) = state.fault(SimOperation::AttrSet, err) {
            return status;
        }
        state.set_attribute(target, &attribute);
        Status::Success
    }

    fn server_attach(&self, server: Handle, err: Handle, service_name: &str) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.is_live(server, HandleType::Server) {
            return Status::InvalidHandle;
        }
        if let Some(status) = state.fault(SimOperation::ServerAttach, err) {
            return status;
        }
        if service_name.trim().is_empty() {
            return state.record(err, ora(12162, "TNS:net service name is incorrectly specified"));
        }
        state.attached.insert(server.id());
        Status::Success
    }

    fn server_detach(&self, server: Handle, err: Handle) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.attached.remove(&server.id()) {
            return state.record(err, ora(3114, "not connected to ORACLE"));
        }
        Status::Success
    }

    fn session_begin(&self, service: Handle, err: Handle, session: Handle) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.is_live(service, HandleType::ServiceContext)
            || !state.is_live(session, HandleType::Session)
        {
            return Status::InvalidHandle;
        }
        if let Some(status) = state.fault(SimOperation::SessionBegin, err) {
            return status;
        }
        if let Some((username, password)) = state.credentials.clone() {
            let attrs = state.attributes.get(&session.id());
            let given = |code| attrs.and_then(|a| a.get(&code)).cloned().unwrap_or_default();
            if !given(OCI_ATTR_USERNAME).eq_ignore_ascii_case(&username)
                || given(OCI_ATTR_PASSWORD) != password
            {
                return state.record(err, ora(1017, "invalid username/password; logon denied"));
            }
        }
        state.sessions.insert(session.id());
        Status::Success
    }

    fn session_end(&self, _service: Handle, err: Handle, session: Handle) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.sessions.remove(&session.id()) {
            return state.record(err, ora(1012, "not logged on"));
        }
        Status::Success
    }

    fn stmt_prepare(&self, stmt: Handle, err: Handle, sql: &str) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.is_live(stmt, HandleType::Statement) {
            return Status::InvalidHandle;
        }
        if let Some(status) = state.fault(SimOperation::Prepare, err) {
            return status;
        }
        if sql.trim().is_empty() {
            return state.record(err, ora(24373, "invalid length specified for statement"));
        }
        let script = state.scripts.get(&sql_key(sql)).cloned();
        if let Some(previous) = state.statements.remove(&stmt.id()) {
            for bind in previous.binds {
                state.binds.remove(&bind);
            }
            for define in previous.defines.values() {
                state.defines.remove(define);
            }
        }
        let statement_type = script
            .as_ref()
            .and_then(|s| s.statement_type)
            .unwrap_or_else(|| classify(sql));
        let polls_left = script.as_ref().map_or(0, |s| s.pending_polls);
        state.statements.insert(
            stmt.id(),
            SimStatement {
                sql: sql.to_string(),
                script,
                statement_type,
                polls_left,
                ..SimStatement::default()
            },
        );
        Status::Success
    }

    fn stmt_type(&self, stmt: Handle, _err: Handle) -> NativeResult<u16> {
        let mut state = self.state.borrow_mut();
        Ok(state.statement(stmt)?.statement_type)
    }

    fn bind_by_name(
        &self,
        stmt: Handle,
        err: Handle,
        name: &str,
        _wire: WireType,
        _element_size: usize,
    ) -> NativeResult<Handle> {
        let mut state = self.state.borrow_mut();
        let sql = state.statement(stmt)?.sql.clone();
        if let Some(status) = state.fault(SimOperation::BindByName, err) {
            return Err(status);
        }
        if !placeholders(&sql).contains(&bind_key(name)) {
            return Err(state.record(err, ora(1036, "illegal variable name/number")));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.binds.insert(
            id,
            SimBind {
                name: name.to_string(),
            },
        );
        state.statement(stmt)?.binds.push(id);
        Ok(Handle::new(HandleType::Bind, id))
    }

    fn stmt_execute(
        &self,
        _service: Handle,
        stmt: Handle,
        err: Handle,
        iters: u32,
        binds: &mut [BindTarget<'_>],
    ) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.is_live(stmt, HandleType::Statement) {
            return Status::InvalidHandle;
        }
        if let Some(status) = state.fault(SimOperation::Execute, err) {
            return status;
        }
        state.stats.executes += 1;
        match state.execute(stmt, iters, binds) {
            Ok(()) => Status::Success,
            Err(failure) if failure.code == 3123 => {
                state.errors.insert(err.id(), failure);
                Status::StillExecuting
            }
            Err(failure) => state.record(err, failure),
        }
    }

    fn param_count(&self, stmt: Handle, err: Handle) -> NativeResult<u32> {
        let mut state = self.state.borrow_mut();
        let count = state.statement(stmt)?.cursor.as_ref().map(|c| c.columns.len() as u32);
        count.ok_or_else(|| state.record(err, ora(24338, "statement handle not executed")))
    }

    fn param_get(&self, stmt: Handle, err: Handle, position: u32) -> NativeResult<Handle> {
        let mut state = self.state.borrow_mut();
        let count = state
            .statement(stmt)?
            .cursor
            .as_ref()
            .map_or(0, |c| c.columns.len());
        if let Some(status) = state.fault(SimOperation::ParamGet, err) {
            return Err(status);
        }
        let position = position as usize;
        if position == 0 || position > count {
            return Err(state.record(err, ora(24334, "no descriptor for this position")));
        }
        let descriptor = state.alloc(HandleType::ParamDescriptor);
        state.descriptors.insert(descriptor.id(), (stmt.id(), position));
        Ok(descriptor)
    }

    fn param_name(&self, param: Handle, _err: Handle) -> NativeResult<String> {
        self.describe(param, |c| c.name.clone())
    }

    fn param_data_type(&self, param: Handle, _err: Handle) -> NativeResult<u16> {
        self.describe(param, |c| c.type_code)
    }

    fn param_data_size(&self, param: Handle, _err: Handle) -> NativeResult<u32> {
        self.describe(param, |c| c.max_size)
    }

    fn descriptor_free(&self, descriptor: Handle) -> Status {
        self.handle_free(descriptor)
    }

    fn define_by_pos(
        &self,
        stmt: Handle,
        err: Handle,
        position: u32,
        _wire: WireType,
        _element_size: usize,
    ) -> NativeResult<Handle> {
        let mut state = self.state.borrow_mut();
        let count = state
            .statement(stmt)?
            .cursor
            .as_ref()
            .map_or(0, |c| c.columns.len());
        if let Some(status) = state.fault(SimOperation::DefineByPos, err) {
            return Err(status);
        }
        let position = position as usize;
        if position == 0 || position > count {
            return Err(state.record(err, ora(1007, "variable not in select list")));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.defines.insert(
            id,
            SimDefine {
                stmt: stmt.id(),
                position,
            },
        );
        if let Some(previous) = state.statement(stmt)?.defines.insert(position, id) {
            state.defines.remove(&previous);
        }
        Ok(Handle::new(HandleType::Define, id))
    }

    fn stmt_fetch(
        &self,
        stmt: Handle,
        err: Handle,
        rows: u32,
        targets: &mut [DefineTarget<'_>],
    ) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.is_live(stmt, HandleType::Statement) {
            return Status::InvalidHandle;
        }
        state.stats.fetch_calls += 1;
        if let Some(status) = state.fault(SimOperation::Fetch, err) {
            return status;
        }
        match state.fetch(stmt, rows, targets) {
            Ok(Status::NoData) => {
                state.errors.insert(err.id(), ora(1403, "no data found"));
                Status::NoData
            }
            Ok(status) => status,
            Err(failure) => state.record(err, failure),
        }
    }

    fn row_count(&self, stmt: Handle, _err: Handle) -> NativeResult<u32> {
        let mut state = self.state.borrow_mut();
        Ok(state.statement(stmt)?.row_count)
    }

    fn trans_commit(&self, service: Handle, err: Handle) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.is_live(service, HandleType::ServiceContext) {
            return Status::InvalidHandle;
        }
        if let Some(status) = state.fault(SimOperation::Commit, err) {
            return status;
        }
        state.stats.commits += 1;
        Status::Success
    }

    fn trans_rollback(&self, service: Handle, err: Handle) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.is_live(service, HandleType::ServiceContext) {
            return Status::InvalidHandle;
        }
        if let Some(status) = state.fault(SimOperation::Rollback, err) {
            return status;
        }
        state.stats.rollbacks += 1;
        Status::Success
    }

    fn error_get(&self, handle: Handle, record: u32) -> Option<ErrorRecord> {
        if record != 1 {
            return None;
        }
        self.state.borrow().errors.get(&handle.id()).cloned()
    }
}

impl SimInterface {
    fn describe<T>(&self, param: Handle, read: impl Fn(&SimColumn) -> T) -> NativeResult<T> {
        let state = self.state.borrow();
        if !state.is_live(param, HandleType::ParamDescriptor) {
            return Err(Status::InvalidHandle);
        }
        let (stmt, position) = *state.descriptors.get(&param.id()).ok_or(Status::InvalidHandle)?;
        state
            .statements
            .get(&stmt)
            .and_then(|s| s.cursor.as_ref())
            .and_then(|c| c.columns.get(position - 1))
            .map(read)
            .ok_or(Status::InvalidHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_leading_keyword() {
        assert_eq!(classify("  select * from dual"), OCI_STMT_SELECT);
        assert_eq!(classify("(SELECT 1 FROM dual)"), OCI_STMT_SELECT);
        assert_eq!(classify("WITH t AS (SELECT 1 FROM dual) SELECT * FROM t"), OCI_STMT_SELECT);
        assert_eq!(classify("insert into t values (1)"), OCI_STMT_INSERT);
        assert_eq!(classify("BEGIN NULL; END;"), OCI_STMT_BEGIN);
        assert_eq!(classify("MERGE INTO t"), 0);
    }

    #[test]
    fn test_placeholders() {
        let names = placeholders("BEGIN :nOut := f(:sName, ':notBind'); x := :dWhen; END;");
        let expected: HashSet<String> =
            ["NOUT", "SNAME", "DWHEN"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_sql_key_normalizes() {
        assert_eq!(sql_key("select  id\n from t"), sql_key("SELECT id FROM t"));
    }

    #[test]
    fn test_handle_accounting() {
        let sim = SimInterface::new();
        let env = sim.env_create(EnvMode::Default).unwrap();
        let stmt = sim.handle_alloc(env, HandleType::Statement).unwrap();
        assert_eq!(sim.live_handles(), 2);
        assert_eq!(sim.handle_free(stmt), Status::Success);
        assert_eq!(sim.handle_free(stmt), Status::InvalidHandle);
        assert_eq!(sim.stats().invalid_frees, 1);
        assert_eq!(sim.handle_free(env), Status::Success);
        assert_eq!(sim.live_handles(), 0);
    }

    #[test]
    fn test_injected_fault_is_reported_once() {
        let sim = SimInterface::new();
        let env = sim.env_create(EnvMode::Default).unwrap();
        sim.fail_next(SimOperation::HandleAlloc, 4031, "unable to allocate memory");
        assert_eq!(sim.handle_alloc(env, HandleType::Error), Err(Status::Error));
        let record = sim.error_get(env, 1).unwrap();
        assert_eq!(record.code, 4031);
        assert_eq!(record.message, "ORA-04031: unable to allocate memory");
        assert!(sim.handle_alloc(env, HandleType::Error).is_ok());
    }

    #[test]
    fn test_write_value_conversions() {
        let mut slot = [0u8; 8];
        assert_eq!(write_value(&OracleValue::from(12i64), WireType::String, &mut slot), Ok(2));
        assert_eq!(&slot[..3], b"12\0");
        let mut num = [0u8; VARNUM_SIZE];
        assert_eq!(
            write_value(&OracleValue::from("x"), WireType::VarNum, &mut num).unwrap_err().code,
            1722
        );
        let mut date = [0u8; DATE_SIZE];
        assert_eq!(
            write_value(&OracleValue::from(1i64), WireType::Date, &mut date).unwrap_err().code,
            932
        );
    }
}
