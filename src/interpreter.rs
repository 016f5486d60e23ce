use super::ast::*;
use super::checker::{self, Analysis};
use super::config::Config;
use super::error::{Error, ErrorKind, Result};
use super::number::NumericValue;
use super::parser::PRINT;
use super::reverse::ReverseLog;
use super::trace::{Event, NoopTracer, Tracer};
use indexmap::IndexMap;
use log::debug;
use std::cmp::Ordering;
use std::time::Instant;

/// How often the wall clock is consulted, in statements.
const CLOCK_INTERVAL: u64 = 256;

/// Variable bindings of one frame, in first-assignment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: IndexMap<String, NumericValue>,
}

impl Environment {
    pub fn get(&self, name: &str) -> Option<&NumericValue> {
        self.vars.get(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NumericValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn set(&mut self, name: &str, value: NumericValue) {
        match self.vars.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.vars.insert(name.to_owned(), value);
            }
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Frame {
    pub(crate) env: Environment,
    pub(crate) reverse_logs: Vec<ReverseLog>,
}

enum Flow {
    Normal,
    Return(Option<NumericValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub return_value: Option<NumericValue>,
    pub output: Vec<String>,
    pub variables: IndexMap<String, NumericValue>,
    pub steps: u64,
    /// Variables whose reverse updates ran on floating-point values.
    pub degraded: Vec<String>,
}

/// One evaluation session over a checked program.
pub struct Interpreter<'p> {
    pub(crate) program: &'p Program,
    pub(crate) analysis: Analysis,
    config: Config,
    globals: Frame,
    frames: Vec<Frame>,
    output: Vec<String>,
    steps: u64,
    started: Instant,
    pub(crate) tracer: Box<dyn Tracer + 'p>,
    pub(crate) degraded: Vec<String>,
}

impl<'p> Interpreter<'p> {
    /// Checks `program` and refuses it if any diagnostic is reported.
    pub fn new(program: &'p Program) -> Result<Interpreter<'p>> {
        let analysis = checker::analyze(program);
        if !analysis.is_clean() {
            return Err(Error::rejected(analysis.diagnostics));
        }
        Ok(Interpreter {
            program,
            analysis,
            config: Config::default(),
            globals: Frame::default(),
            frames: Vec::new(),
            output: Vec::new(),
            steps: 0,
            started: Instant::now(),
            tracer: Box::new(NoopTracer),
            degraded: Vec::new(),
        })
    }

    pub fn with_config(mut self, config: Config) -> Interpreter<'p> {
        self.config = config;
        self
    }

    pub fn with_tracer(mut self, tracer: impl Tracer + 'p) -> Interpreter<'p> {
        self.tracer = Box::new(tracer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes the top-level statements from a clean global frame.
    pub fn run(&mut self) -> Result<ExecutionResult> {
        self.globals = Frame::default();
        self.frames.clear();
        self.output.clear();
        self.degraded.clear();
        self.begin();

        debug!("running {} top-level statement(s)", self.program.body.len());
        let program = self.program;
        let return_value = match self.exec_block(&program.body)? {
            Flow::Return(value) => value,
            Flow::Normal => None,
        };
        debug!("run finished after {} step(s)", self.steps);

        Ok(ExecutionResult {
            return_value,
            output: self.output.clone(),
            variables: self.globals.env.vars.clone(),
            steps: self.steps,
            degraded: self.degraded.clone(),
        })
    }

    /// Looks `name` up in the current frame, then the global frame.
    pub fn get_variable(&self, name: &str) -> Option<&NumericValue> {
        self.frame()
            .env
            .get(name)
            .or_else(|| self.globals.env.get(name))
    }

    pub fn globals(&self) -> &Environment {
        &self.globals.env
    }

    /// Calls a declared function (or `print`) with already evaluated arguments.
    pub fn call(&mut self, name: &str, args: &[NumericValue]) -> Result<Option<NumericValue>> {
        self.begin();
        self.invoke(name, args.to_vec())
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Variables whose reversibility is only approximate.
    pub fn degraded(&self) -> &[String] {
        &self.degraded
    }

    /// Starts a fresh step and time budget for one entry point.
    pub(crate) fn begin(&mut self) {
        self.steps = 0;
        self.started = Instant::now();
    }

    fn frame(&self) -> &Frame {
        self.frames.last().unwrap_or(&self.globals)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        }
    }

    pub(crate) fn tick(&mut self, line: usize) -> Result<()> {
        self.steps += 1;
        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(Error::from(ErrorKind::BudgetExhausted(format!(
                    "step limit of {} reached at line {}",
                    max, line
                ))));
            }
        }
        if let Some(limit) = self.config.time_limit {
            if self.steps % CLOCK_INTERVAL == 0 && self.started.elapsed() > limit {
                return Err(Error::from(ErrorKind::BudgetExhausted(format!(
                    "time limit of {:?} reached at line {}",
                    limit, line
                ))));
            }
        }
        self.tracer.event(&Event::Statement { line });
        Ok(())
    }

    fn assign(&mut self, name: &str, value: NumericValue) {
        self.tracer.event(&Event::Assign {
            name,
            value: &value,
        });
        self.frame_mut().env.set(name, value);
    }

    fn lookup(&self, name: &str) -> Result<NumericValue> {
        self.get_variable(name)
            .cloned()
            .ok_or_else(|| Error::from(ErrorKind::UndefinedReference(name.to_owned())))
    }

    pub(crate) fn eval_data(&mut self, node: &DataNode) -> Result<NumericValue> {
        match node {
            DataNode::Literal(value) => Ok(value.clone()),
            DataNode::Identifier(name) => self.lookup(name),
            DataNode::BinaryAdd(lhs, rhs) => {
                let lhs = self.eval_data(lhs)?;
                let rhs = self.eval_data(rhs)?;
                lhs.add(&rhs)
            }
            DataNode::PureCall { name, args, .. } => {
                let args = args
                    .iter()
                    .map(|a| self.eval_data(a))
                    .collect::<Result<Vec<_>>>()?;
                self.call_value(name, args)
            }
        }
    }

    fn eval_control(&mut self, expr: &ControlExpr) -> Result<NumericValue> {
        match expr {
            ControlExpr::Data(node) => self.eval_data(node),
            ControlExpr::Binary { op, lhs, rhs } => {
                let lhs = self.eval_control(lhs)?;
                let rhs = self.eval_control(rhs)?;
                match op {
                    ArithOp::Add => lhs.add(&rhs),
                    ArithOp::Sub => lhs.sub(&rhs),
                    ArithOp::Mul => lhs.mul(&rhs),
                    ArithOp::Div => lhs.div(&rhs),
                }
            }
            ControlExpr::Call(call) => {
                let args = self.eval_args(&call.args)?;
                self.call_value(&call.name, args)
            }
        }
    }

    fn eval_args(&mut self, args: &[ControlExpr]) -> Result<Vec<NumericValue>> {
        args.iter().map(|a| self.eval_control(a)).collect()
    }

    pub(crate) fn guard(&mut self, guard: &Guard) -> Result<bool> {
        let lhs = self.eval_data(&guard.lhs)?;
        let rhs = self.eval_data(&guard.rhs)?;
        Ok(match guard.op {
            CmpOp::Eq => lhs.equals(&rhs)?,
            CmpOp::Lt => lhs.compare(&rhs)? == Ordering::Less,
            CmpOp::Gt => lhs.compare(&rhs)? == Ordering::Greater,
            CmpOp::Le => lhs.compare(&rhs)? != Ordering::Greater,
            CmpOp::Ge => lhs.compare(&rhs)? != Ordering::Less,
        })
    }

    fn call_value(&mut self, name: &str, args: Vec<NumericValue>) -> Result<NumericValue> {
        self.invoke(name, args)?
            .ok_or_else(|| Error::mismatch(format!("`{}` returned no value", name)))
    }

    fn invoke(&mut self, name: &str, args: Vec<NumericValue>) -> Result<Option<NumericValue>> {
        if name == PRINT {
            let text = args
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            self.tracer.event(&Event::Output { text: &text });
            self.output.push(text);
            return Ok(None);
        }

        let program = self.program;
        let def = program
            .functions
            .get(name)
            .ok_or_else(|| Error::from(ErrorKind::UndefinedReference(name.to_owned())))?;
        if def.arity() != args.len() {
            return Err(Error::mismatch(format!(
                "`{}` takes {} argument(s) but {} were supplied",
                name,
                def.arity(),
                args.len()
            )));
        }
        if self.frames.len() >= self.config.max_call_depth {
            return Err(Error::from(ErrorKind::BudgetExhausted(format!(
                "call depth limit of {} reached calling `{}`",
                self.config.max_call_depth, name
            ))));
        }

        let mut frame = Frame::default();
        for (param, value) in def.params.iter().zip(args) {
            frame.env.set(&param.name, value);
        }
        self.frames.push(frame);
        let depth = self.frames.len();
        debug!("call {} at depth {}", name, depth);
        self.tracer.event(&Event::Call {
            function: name,
            depth,
        });

        let flow = self.exec_block(&def.body);
        self.frames.pop();
        let value = match flow? {
            Flow::Return(value) => value,
            Flow::Normal => None,
        };
        self.tracer.event(&Event::Return {
            function: name,
            value: value.as_ref(),
        });
        Ok(value)
    }

    fn exec_block(&mut self, block: &[Stmt]) -> Result<Flow> {
        for stmt in block {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow> {
        let line = stmt.span.line;
        self.tick(line)?;
        match &stmt.node {
            ControlNode::Assignment { target, value } => {
                let value = self.eval_control(value)?;
                self.assign(target, value);
            }
            ControlNode::If {
                guard,
                then_branch,
                else_branch,
            } => {
                if self.guard(guard)? {
                    return self.exec_block(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.exec_block(else_branch);
                }
            }
            ControlNode::While { guard, body } => {
                while self.guard(guard)? {
                    if let Flow::Return(value) = self.exec_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                    self.tick(line)?;
                }
            }
            ControlNode::For {
                var,
                start,
                end,
                body,
            } => {
                let start = self.bound(start)?;
                let end = self.bound(end)?;
                for i in start..end {
                    self.assign(var, NumericValue::Int(i));
                    if let Flow::Return(value) = self.exec_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                    self.tick(line)?;
                }
            }
            ControlNode::Return(value) => {
                let value = match value {
                    Some(expr) => Some(self.eval_control(expr)?),
                    None => None,
                };
                return Ok(Flow::Return(value));
            }
            ControlNode::FunctionDecl(_) => {}
            ControlNode::Call(call) => {
                let args = self.eval_args(&call.args)?;
                self.invoke(&call.name, args)?;
            }
            ControlNode::Reverse(block) => self.forward(block)?,
        }
        Ok(Flow::Normal)
    }

    fn bound(&mut self, node: &DataNode) -> Result<i64> {
        let value = self.eval_data(node)?;
        value.as_i64().ok_or_else(|| {
            Error::mismatch(format!(
                "`for` bounds must be integers, found {} `{}`",
                value.kind(),
                value
            ))
        })
    }
}

#[cfg(test)]
mod test {
    use super::super::parser::parse;
    use super::super::trace::Recorder;
    use super::*;
    use std::time::Duration;

    fn run_source(source: &str) -> Result<ExecutionResult> {
        let program = parse(source).unwrap();
        let result = Interpreter::new(&program)?.run();
        result
    }

    fn var(result: &ExecutionResult, name: &str) -> NumericValue {
        result.variables[name].clone()
    }

    fn error_kind(source: &str) -> ErrorKind {
        run_source(source).unwrap_err().kind().clone()
    }

    #[test]
    fn test_assignment_and_arithmetic() {
        let result = run_source("x = 5; y = 3; result = x + y\nz = (x - y) * 4 / 8").unwrap();
        assert_eq!(var(&result, "result"), NumericValue::Int(8));
        assert_eq!(var(&result, "z"), NumericValue::Int(1));
        assert_eq!(
            result.variables.keys().collect::<Vec<_>>(),
            vec!["x", "y", "result", "z"]
        );
    }

    #[test]
    fn test_exact_division() {
        let result = run_source("a = 7 / 2\nb = 1/2 + 1/3").unwrap();
        assert_eq!(var(&result, "a"), NumericValue::rational(7, 2).unwrap());
        assert_eq!(var(&result, "b"), NumericValue::rational(5, 6).unwrap());
        assert_eq!(error_kind("a = 1 / 0"), ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_control_flow() {
        let result = run_source(
            "total = 0
             for i in 0..5 { total = total + i }
             n = 0
             while n < 3 { n = n + 1 }
             if total == 10 { ok = 1 } else if total > 10 { ok = 2 } else { ok = 3 }",
        )
        .unwrap();
        assert_eq!(var(&result, "total"), NumericValue::Int(10));
        assert_eq!(var(&result, "n"), NumericValue::Int(3));
        assert_eq!(var(&result, "ok"), NumericValue::Int(1));
        assert_eq!(var(&result, "i"), NumericValue::Int(4));
    }

    #[test]
    fn test_for_bounds_fixed_at_entry() {
        let result = run_source("n = 3\ncount = 0\nfor i in 0..n { n = n + 1; count = count + 1 }")
            .unwrap();
        assert_eq!(var(&result, "count"), NumericValue::Int(3));
        assert!(matches!(
            error_kind("for i in 0..1/2 { }"),
            ErrorKind::TypeMismatch(_)
        ));
    }

    #[test]
    fn test_functions_and_frames() {
        let result = run_source(
            "base = 100
             @pure fn add(a, b) { return a + b + base }
             fn shadow(x) { base = x; return base }
             r = add(1, 2)
             s = shadow(7)
             t = add(1, 2) * 2",
        )
        .unwrap();
        assert_eq!(var(&result, "r"), NumericValue::Int(103));
        assert_eq!(var(&result, "s"), NumericValue::Int(7));
        assert_eq!(var(&result, "base"), NumericValue::Int(100));
        assert_eq!(var(&result, "t"), NumericValue::Int(206));
        assert!(!result.variables.contains_key("a"));
    }

    #[test]
    fn test_print_and_unit() {
        let result = run_source("x = 1/2\nprint(x, 0x1f, 'k + 1)\nprint()").unwrap();
        assert_eq!(result.output, vec!["1/2 0x1f 'k + 1", ""]);

        assert!(matches!(
            error_kind("x = print(1)"),
            ErrorKind::TypeMismatch(_)
        ));
        assert!(matches!(
            error_kind("fn f() { print(1) }\nx = f() + 1"),
            ErrorKind::TypeMismatch(_)
        ));
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(
            error_kind("x = y + 1"),
            ErrorKind::UndefinedReference("y".to_owned())
        );
        assert!(matches!(
            error_kind("x = 9223372036854775807 + 1"),
            ErrorKind::Overflow(_)
        ));
        assert!(matches!(
            error_kind("if 'a < 'b { x = 1 }"),
            ErrorKind::Incomparable(_)
        ));
    }

    #[test]
    fn test_top_level_return() {
        let result = run_source("x = 2\nreturn x * 21\nx = 3").unwrap();
        assert_eq!(result.return_value, Some(NumericValue::Int(42)));
        assert_eq!(var(&result, "x"), NumericValue::Int(2));
    }

    #[test]
    fn test_rejected_program() {
        let program = parse("@pure fn f(n) { while n < 1 { } return n }").unwrap();
        let err = Interpreter::new(&program).err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::Rejected(_)));
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn test_budgets() {
        let program = parse("n = 0\nwhile 0 == 0 { n = n + 1 }").unwrap();
        let err = Interpreter::new(&program)
            .unwrap()
            .with_config(Config::default().with_max_steps(50))
            .run()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BudgetExhausted(_)));

        let err = Interpreter::new(&program)
            .unwrap()
            .with_config(Config::default().with_time_limit(Duration::from_millis(20)))
            .run()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BudgetExhausted(_)));

        let program = parse("fn down(n) { return down(n + 1) }\nx = down(0)").unwrap();
        let err = Interpreter::new(&program)
            .unwrap()
            .with_config(Config::default().with_max_call_depth(16))
            .run()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BudgetExhausted(_)));
    }

    #[test]
    fn test_programmatic_call() {
        let program = parse("@pure fn fib2(a, b) { return a + b }\nbias = 1").unwrap();
        let mut interpreter = Interpreter::new(&program).unwrap();
        interpreter.run().unwrap();
        assert_eq!(
            interpreter
                .call("fib2", &[NumericValue::Int(2), NumericValue::Int(3)])
                .unwrap(),
            Some(NumericValue::Int(5))
        );
        assert_eq!(interpreter.get_variable("bias"), Some(&NumericValue::Int(1)));
        assert_eq!(interpreter.get_variable("a"), None);
        assert!(matches!(
            interpreter.call("missing", &[]).unwrap_err().kind(),
            ErrorKind::UndefinedReference(_)
        ));
        assert!(matches!(
            interpreter.call("fib2", &[]).unwrap_err().kind(),
            ErrorKind::TypeMismatch(_)
        ));
    }

    #[test]
    fn test_step_budget_per_call() {
        let program = parse("fn count(n) {\n  i = 0\n  while i < n { i = i + 1 }\n  return i\n}").unwrap();
        let mut interpreter = Interpreter::new(&program)
            .unwrap()
            .with_config(Config::default().with_max_steps(40));
        interpreter.run().unwrap();
        for _ in 0..10 {
            assert_eq!(
                interpreter.call("count", &[NumericValue::Int(10)]).unwrap(),
                Some(NumericValue::Int(10))
            );
        }
        assert!(matches!(
            interpreter
                .call("count", &[NumericValue::Int(100)])
                .unwrap_err()
                .kind(),
            ErrorKind::BudgetExhausted(_)
        ));
    }

    #[test]
    fn test_tracer() {
        let program = parse("fn f(n) { return n }\nx = f(1)\nprint(x)").unwrap();
        let mut recorder = Recorder::default();
        {
            let mut interpreter = Interpreter::new(&program)
                .unwrap()
                .with_tracer(&mut recorder);
            interpreter.run().unwrap();
        }
        assert_eq!(
            recorder.events,
            vec![
                "line 1",
                "line 2",
                "call f (depth 1)",
                "line 1",
                "return f = 1",
                "x = 1",
                "line 3",
                "output \"1\"",
            ]
        );
    }
}
