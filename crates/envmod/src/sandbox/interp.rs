// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Interpreter for parsed native definitions.
//!
//! Every primitive call becomes an [`Intent`] mapped through the
//! execution mode. Intents are also applied to a private scratch copy of
//! the shell state so that `getenv` observes earlier intents of the same
//! definition; the caller's state is never touched.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::path::Path;

use itertools::Itertools;

use super::parser::{Call, CompareOp, Expr, Program, Statement, StatementKind};
use super::Execution;
use crate::environment::ShellState;
use crate::intent::{Intent, Mode};
use crate::module::Module;
use crate::MODULEPATH_VAR;

#[cfg(test)]
#[path = "./interp_test.rs"]
mod interp_test;

const DESCRIPTION_BINDING: &str = "description";
const WHATIS_BINDING: &str = "whatis";
const PLATFORM_BINDING: &str = "platform";
const SKIP: &str = "skip";

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    None,
    Bool(bool),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Str(_) => "str",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                let inner = items
                    .iter()
                    .map(|item| match item {
                        Self::Str(s) => format!("'{s}'"),
                        other => other.to_string(),
                    })
                    .join(", ");
                write!(f, "[{inner}]")
            }
        }
    }
}

/// Run a parsed definition in the given mode.
pub fn run(
    program: &Program,
    module: &Module,
    mode: Mode,
    state: &ShellState,
) -> crate::Result<Execution> {
    let mut interpreter = Interpreter::new(module, mode, state);
    let error = match interpreter.exec_block(&program.statements)? {
        ControlFlow::Break(Halt::Skip(reason)) => {
            let reason = reason.unwrap_or_else(|| {
                format!("not applicable on {}", state.platform().identifier())
            });
            tracing::info!("Skipping {}: {reason}", module.fullname);
            return Ok(Execution {
                skipped: Some(reason),
                ..Default::default()
            });
        }
        ControlFlow::Break(Halt::Failed(message)) => Some(message),
        ControlFlow::Continue(()) => None,
    };
    Ok(Execution {
        description: interpreter.text_binding(DESCRIPTION_BINDING),
        whatis: interpreter.text_binding(WHATIS_BINDING),
        intents: interpreter.intents,
        error,
        ..Default::default()
    })
}

/// Why a definition stopped before its last statement.
enum Halt {
    /// `skip()`, with its optional reason.
    Skip(Option<String>),
    /// `error()` while only describing the module.
    Failed(String),
}

/// Positional and keyword arguments of one call, after evaluation.
struct Arguments {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

struct Interpreter<'a> {
    module: &'a Module,
    mode: Mode,
    scratch: ShellState,
    bindings: HashMap<String, Value>,
    intents: Vec<Intent>,
    failure: Option<String>,
}

impl<'a> Interpreter<'a> {
    fn new(module: &'a Module, mode: Mode, state: &ShellState) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(
            PLATFORM_BINDING.to_string(),
            Value::Str(state.platform().identifier().to_string()),
        );
        Self {
            module,
            mode,
            scratch: state.clone(),
            bindings,
            intents: Vec::new(),
            failure: None,
        }
    }

    fn text_binding(&self, name: &str) -> Option<String> {
        match self.bindings.get(name)? {
            Value::None => None,
            value => Some(value.to_string()),
        }
    }

    fn error<S: Into<String>>(&self, line: usize, message: S) -> crate::Error {
        crate::Error::SandboxExecution {
            path: self.module.realpath.clone(),
            line,
            message: message.into(),
        }
    }

    fn exec_block(&mut self, statements: &[Statement]) -> crate::Result<ControlFlow<Halt>> {
        for statement in statements {
            let line = statement.line;
            match &statement.kind {
                StatementKind::Pass => {}
                StatementKind::Assign { name, value } => {
                    let value = self.eval(value, line)?;
                    self.bindings.insert(name.clone(), value);
                }
                StatementKind::Call(call) if call.name == SKIP => {
                    let mut args = self.arguments(call, line)?;
                    let [reason] = self.bind(SKIP, &mut args, &["reason"], 0, line)?;
                    let reason = match reason {
                        Value::None => None,
                        other => Some(self.string(SKIP, "reason", other, line)?),
                    };
                    return Ok(ControlFlow::Break(Halt::Skip(reason)));
                }
                StatementKind::Call(call) => {
                    self.call(call, line)?;
                }
                StatementKind::If {
                    branches,
                    otherwise,
                } => {
                    let mut chosen = otherwise;
                    for (condition, body) in branches {
                        if self.eval(condition, line)?.is_truthy() {
                            chosen = body;
                            break;
                        }
                    }
                    if let ControlFlow::Break(halt) = self.exec_block(chosen)? {
                        return Ok(ControlFlow::Break(halt));
                    }
                }
            }
            if let Some(message) = self.failure.take() {
                return Ok(ControlFlow::Break(Halt::Failed(message)));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn eval(&mut self, expr: &Expr, line: usize) -> crate::Result<Value> {
        Ok(match expr {
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::None => Value::None,
            Expr::Bool(b) => Value::Bool(*b),
            Expr::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item, line))
                    .collect::<crate::Result<_>>()?,
            ),
            Expr::Name(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| self.error(line, format!("name '{name}' is not defined")))?,
            Expr::Call(call) if call.name == SKIP => {
                return Err(self.error(line, "skip() can only be used as a statement"));
            }
            Expr::Call(call) => self.call(call, line)?,
            Expr::Concat(left, right) => {
                match (self.eval(left, line)?, self.eval(right, line)?) {
                    (Value::Str(mut l), Value::Str(r)) => {
                        l.push_str(&r);
                        Value::Str(l)
                    }
                    (Value::List(mut l), Value::List(r)) => {
                        l.extend(r);
                        Value::List(l)
                    }
                    (l, r) => {
                        return Err(self.error(
                            line,
                            format!(
                                "cannot concatenate {} and {}",
                                l.type_name(),
                                r.type_name()
                            ),
                        ));
                    }
                }
            }
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, line)?;
                let right = self.eval(right, line)?;
                match op {
                    CompareOp::Eq => Value::Bool(left == right),
                    CompareOp::Ne => Value::Bool(left != right),
                    CompareOp::In => match (&left, &right) {
                        (_, Value::List(items)) => Value::Bool(items.contains(&left)),
                        (Value::Str(needle), Value::Str(haystack)) => {
                            Value::Bool(haystack.contains(needle.as_str()))
                        }
                        _ => {
                            return Err(self.error(
                                line,
                                format!(
                                    "'in' is not supported between {} and {}",
                                    left.type_name(),
                                    right.type_name()
                                ),
                            ));
                        }
                    },
                }
            }
            Expr::Not(inner) => Value::Bool(!self.eval(inner, line)?.is_truthy()),
            Expr::And(left, right) => {
                let left = self.eval(left, line)?;
                if left.is_truthy() {
                    self.eval(right, line)?
                } else {
                    left
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left, line)?;
                if left.is_truthy() {
                    left
                } else {
                    self.eval(right, line)?
                }
            }
        })
    }

    fn arguments(&mut self, call: &Call, line: usize) -> crate::Result<Arguments> {
        let positional = call
            .args
            .iter()
            .map(|arg| self.eval(arg, line))
            .collect::<crate::Result<_>>()?;
        let mut keywords = Vec::with_capacity(call.kwargs.len());
        for (name, arg) in &call.kwargs {
            keywords.push((name.clone(), self.eval(arg, line)?));
        }
        Ok(Arguments {
            positional,
            keywords,
        })
    }

    /// Bind arguments to named parameters, the first `required` of which
    /// must be given. Missing optional parameters are `None`.
    fn bind<const N: usize>(
        &self,
        function: &str,
        args: &mut Arguments,
        params: &[&str; N],
        required: usize,
        line: usize,
    ) -> crate::Result<[Value; N]> {
        if args.positional.len() > N {
            return Err(self.error(
                line,
                format!(
                    "{function}() takes at most {N} argument(s) ({} given)",
                    args.positional.len()
                ),
            ));
        }
        let mut bound: [Option<Value>; N] = std::array::from_fn(|_| None);
        for (slot, value) in bound.iter_mut().zip(args.positional.drain(..)) {
            *slot = Some(value);
        }
        for (name, value) in args.keywords.drain(..) {
            let Some(index) = params.iter().position(|p| *p == name) else {
                return Err(self.error(
                    line,
                    format!("{function}() got an unexpected keyword argument '{name}'"),
                ));
            };
            if bound[index].replace(value).is_some() {
                return Err(self.error(
                    line,
                    format!("{function}() got multiple values for argument '{name}'"),
                ));
            }
        }
        if let Some(missing) = (0..required).find(|i| bound[*i].is_none()) {
            return Err(self.error(
                line,
                format!(
                    "{function}() missing required argument '{}'",
                    params[missing]
                ),
            ));
        }
        Ok(bound.map(|value| value.unwrap_or(Value::None)))
    }

    /// Arguments of a variadic primitive: one leading name, then values.
    fn variadic(
        &self,
        function: &str,
        args: Arguments,
        leading: usize,
        line: usize,
    ) -> crate::Result<Vec<String>> {
        if let Some((name, _)) = args.keywords.first() {
            return Err(self.error(
                line,
                format!("{function}() got an unexpected keyword argument '{name}'"),
            ));
        }
        if args.positional.len() <= leading {
            return Err(self.error(
                line,
                format!("{function}() requires at least {} argument(s)", leading + 1),
            ));
        }
        let mut out = Vec::new();
        for (index, value) in args.positional.into_iter().enumerate() {
            match value {
                Value::List(items) if index >= leading => {
                    for item in items {
                        out.push(self.string(function, "values", item, line)?);
                    }
                }
                other => out.push(self.string(function, "values", other, line)?),
            }
        }
        Ok(out)
    }

    fn string(
        &self,
        function: &str,
        param: &str,
        value: Value,
        line: usize,
    ) -> crate::Result<String> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(self.error(
                line,
                format!(
                    "{function}() argument '{param}' must be str, not {}",
                    other.type_name()
                ),
            )),
        }
    }

    fn optional_string(
        &self,
        function: &str,
        param: &str,
        value: Value,
        line: usize,
    ) -> crate::Result<Option<String>> {
        match value {
            Value::None => Ok(None),
            other => self.string(function, param, other, line).map(Some),
        }
    }

    fn emit(&mut self, intent: Intent) {
        let Some(intent) = intent.for_mode(self.mode) else {
            return;
        };
        match &intent {
            Intent::AddModulePath { path } => {
                self.scratch
                    .prepend_path(MODULEPATH_VAR, std::slice::from_ref(path));
            }
            Intent::RemoveModulePath { path } => {
                self.scratch
                    .remove_path(MODULEPATH_VAR, std::slice::from_ref(path));
            }
            other => {
                self.scratch.apply(other);
            }
        }
        tracing::trace!("{}: {intent}", self.module.fullname);
        self.intents.push(intent);
    }

    fn call(&mut self, call: &Call, line: usize) -> crate::Result<Value> {
        if self.failure.is_some() {
            return Ok(Value::None);
        }
        let function = call.name.as_str();
        let mut args = self.arguments(call, line)?;
        match function {
            "getenv" => {
                let [name, default] = self.bind(function, &mut args, &["name", "default"], 1, line)?;
                let name = self.string(function, "name", name, line)?;
                return Ok(self
                    .scratch
                    .get(&name)
                    .map(|v| Value::Str(v.to_string()))
                    .unwrap_or(default));
            }
            "exists" | "isfile" | "isdir" => {
                let [path] = self.bind(function, &mut args, &["path"], 1, line)?;
                let path = self.string(function, "path", path, line)?;
                let path = Path::new(&path);
                return Ok(Value::Bool(match function {
                    "exists" => path.exists(),
                    "isfile" => path.is_file(),
                    _ => path.is_dir(),
                }));
            }
            "setenv" => {
                let [name, value] = self.bind(function, &mut args, &["name", "value"], 2, line)?;
                let intent = Intent::SetEnv {
                    name: self.string(function, "name", name, line)?,
                    value: self.string(function, "value", value, line)?,
                };
                self.emit(intent);
            }
            "unsetenv" => {
                let [name] = self.bind(function, &mut args, &["name"], 1, line)?;
                let name = self.string(function, "name", name, line)?;
                self.emit(Intent::UnsetEnv { name });
            }
            "prepend_path" | "append_path" | "remove_path" => {
                let mut values = self.variadic(function, args, 1, line)?;
                let name = values.remove(0);
                self.emit(match function {
                    "prepend_path" => Intent::PrependPath { name, values },
                    "append_path" => Intent::AppendPath { name, values },
                    _ => Intent::RemovePath { name, values },
                });
            }
            "set_alias" | "set_shell_function" => {
                let [name, body] = self.bind(function, &mut args, &["name", "body"], 2, line)?;
                let name = self.string(function, "name", name, line)?;
                let body = self.string(function, "body", body, line)?;
                self.emit(if function == "set_alias" {
                    Intent::SetAlias { name, body }
                } else {
                    Intent::SetFunction { name, body }
                });
            }
            "unset_alias" | "unset_shell_function" => {
                let [name] = self.bind(function, &mut args, &["name"], 1, line)?;
                let name = self.string(function, "name", name, line)?;
                self.emit(if function == "unset_alias" {
                    Intent::UnsetAlias { name, body: None }
                } else {
                    Intent::UnsetFunction { name, body: None }
                });
            }
            "use" | "unuse" => {
                for path in self.variadic(function, args, 0, line)? {
                    self.emit(if function == "use" {
                        Intent::AddModulePath { path }
                    } else {
                        Intent::RemoveModulePath { path }
                    });
                }
            }
            "load" | "unload" | "conflict" => {
                for name in self.variadic(function, args, 0, line)? {
                    self.emit(match function {
                        "load" => Intent::LoadModule { name },
                        "unload" => Intent::UnloadModule { name },
                        _ => Intent::Conflict { name },
                    });
                }
            }
            "swap" => {
                let [from, to] = self.bind(function, &mut args, &["old", "new"], 2, line)?;
                let intent = Intent::SwapModules {
                    from: self.string(function, "old", from, line)?,
                    to: self.string(function, "new", to, line)?,
                };
                self.emit(intent);
            }
            "prereq" => {
                let [name, fallback] =
                    self.bind(function, &mut args, &["name", "fallback"], 1, line)?;
                let intent = Intent::Prereq {
                    name: self.string(function, "name", name, line)?,
                    fallback: self.optional_string(function, "fallback", fallback, line)?,
                };
                self.emit(intent);
            }
            "family" => {
                let [tag] = self.bind(function, &mut args, &["tag"], 1, line)?;
                let tag = self.string(function, "tag", tag, line)?;
                self.emit(Intent::Family { tag });
            }
            "warn" => {
                let [message] = self.bind(function, &mut args, &["message"], 1, line)?;
                if self.mode.is_effective() {
                    tracing::warn!("{}: {message}", self.module.fullname);
                }
            }
            "error" => {
                let [message] = self.bind(function, &mut args, &["message"], 1, line)?;
                match self.mode {
                    Mode::Load => {
                        return Err(crate::Error::ModuleError {
                            path: self.module.realpath.clone(),
                            message: message.to_string(),
                        });
                    }
                    Mode::Unload => tracing::warn!("{}: {message}", self.module.fullname),
                    // describing a module still works where loading it would fail
                    Mode::Help | Mode::Whatis => self.failure = Some(message.to_string()),
                }
            }
            unknown => {
                return Err(self.error(line, format!("name '{unknown}' is not defined")));
            }
        }
        Ok(Value::None)
    }
}
