//! A scripted in-memory driver for exercising the facade end to end
//! without a real database. Each `MockConnection` is built with a fixed
//! sequence of responses; each `execute_*` call on the commands it
//! creates pops the next one, regardless of SQL text — tests are
//! expected to script calls in the order they make them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rowcaster::{Command, Connection, DbTypeHint, DbValue, MapperResult, Parameter, RowReader, Transaction};

pub enum ScriptedResponse {
    Reader { columns: Vec<String>, rows: Vec<Vec<DbValue>> },
    Scalar(Option<DbValue>),
    NonQuery(u64),
}

pub struct MockConnection {
    open: bool,
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
}

impl MockConnection {
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            open: false,
            script: Arc::new(Mutex::new(script.into())),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> MapperResult<()> {
        self.open = true;
        Ok(())
    }

    fn create_command(&self) -> Box<dyn Command> {
        Box::new(MockCommand {
            script: self.script.clone(),
            sql: String::new(),
            params: Vec::new(),
        })
    }
}

#[derive(Default)]
pub struct MockParameter {
    name: String,
    value: DbValue,
    hint: DbTypeHint,
}

impl Parameter for MockParameter {
    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
    fn set_value(&mut self, value: DbValue) {
        self.value = value;
    }
    fn set_type_hint(&mut self, hint: DbTypeHint) {
        self.hint = hint;
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn value(&self) -> &DbValue {
        &self.value
    }
    fn type_hint(&self) -> DbTypeHint {
        self.hint
    }
}

pub struct MockCommand {
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    sql: String,
    params: Vec<(String, DbValue, DbTypeHint)>,
}

impl MockCommand {
    pub fn bound_params(&self) -> &[(String, DbValue, DbTypeHint)] {
        &self.params
    }

    #[allow(dead_code)]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl Command for MockCommand {
    fn set_sql(&mut self, sql: &str) {
        self.sql = sql.to_string();
    }

    fn set_transaction(&mut self, _tx: Option<&dyn Transaction>) {}

    fn create_parameter(&self) -> Box<dyn Parameter> {
        Box::new(MockParameter::default())
    }

    fn add_parameter(&mut self, param: Box<dyn Parameter>) {
        self.params
            .push((param.name().to_string(), param.value().clone(), param.type_hint()));
    }

    async fn execute_non_query(&mut self) -> MapperResult<u64> {
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedResponse::NonQuery(n)) => Ok(n),
            other => panic!("mock script mismatch: expected NonQuery, got a different response ({})", describe(&other)),
        }
    }

    async fn execute_scalar(&mut self) -> MapperResult<Option<DbValue>> {
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedResponse::Scalar(v)) => Ok(v),
            other => panic!("mock script mismatch: expected Scalar, got a different response ({})", describe(&other)),
        }
    }

    async fn execute_reader(&mut self) -> MapperResult<Box<dyn RowReader>> {
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedResponse::Reader { columns, rows }) => Ok(Box::new(MockRowReader {
                columns,
                rows,
                position: None,
            })),
            other => panic!("mock script mismatch: expected Reader, got a different response ({})", describe(&other)),
        }
    }
}

fn describe(response: &Option<ScriptedResponse>) -> &'static str {
    match response {
        None => "nothing left in the script",
        Some(ScriptedResponse::Reader { .. }) => "Reader",
        Some(ScriptedResponse::Scalar(_)) => "Scalar",
        Some(ScriptedResponse::NonQuery(_)) => "NonQuery",
    }
}

pub struct MockRowReader {
    columns: Vec<String>,
    rows: Vec<Vec<DbValue>>,
    position: Option<usize>,
}

#[async_trait]
impl RowReader for MockRowReader {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn name(&self, index: usize) -> &str {
        &self.columns[index]
    }

    fn is_null(&self, index: usize) -> bool {
        self.position
            .map(|p| self.rows[p][index].is_null())
            .unwrap_or(true)
    }

    fn get_value(&self, index: usize) -> DbValue {
        self.position
            .map(|p| self.rows[p][index].clone())
            .unwrap_or(DbValue::Null)
    }

    fn get_typed(&self, index: usize, _hint: DbTypeHint) -> MapperResult<DbValue> {
        Ok(self.get_value(index))
    }

    async fn read(&mut self) -> MapperResult<bool> {
        let next = self.position.map(|p| p + 1).unwrap_or(0);
        if next >= self.rows.len() {
            return Ok(false);
        }
        self.position = Some(next);
        Ok(true)
    }

    async fn next_result(&mut self) -> MapperResult<bool> {
        Ok(false)
    }

    fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }
}
