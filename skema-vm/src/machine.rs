// skema-vm - Heap-based virtual machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The heap-based register machine.
//!
//! One step reads the expression register (an instruction datum of the shape
//! `(opcode . operands)`), dispatches on the head symbol, and mutates the
//! five registers. The control stack is a chain of heap frames so `conti`
//! can take it first-class.

use std::fmt;
use std::rc::Rc;

use skema_core::{Env, Error as CoreError, lists};
use skema_parser::{Closure, Datum, DatumCustom, Symbol, Vector};

use crate::frame::{CallFrame, FrameHandle};

/// Runtime error during VM execution.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Reference or assignment to an unbound variable
    UnboundVariable(Symbol),
    /// `apply` of something that is not a procedure
    NotApplicable(String),
    /// Operand of the wrong shape
    TypeError { expected: String, got: String },
    /// Unknown or non-symbol instruction head
    BadInstruction(String),
    /// Wrong number of arguments for the applied procedure
    ArityError {
        expected: usize,
        got: usize,
        variadic: bool,
    },
    /// `return` with an empty control stack
    StackUnderflow,
    /// Invariant violation
    Internal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnboundVariable(sym) => write!(f, "unbound variable: {}", sym),
            RuntimeError::NotApplicable(what) => {
                write!(f, "value is not applicable: {}", what)
            }
            RuntimeError::TypeError { expected, got } => {
                write!(f, "type error: expected {}, got {}", expected, got)
            }
            RuntimeError::BadInstruction(head) => {
                write!(f, "unknown instruction: {}", head)
            }
            RuntimeError::ArityError {
                expected,
                got,
                variadic,
            } => {
                if *variadic {
                    write!(
                        f,
                        "wrong number of arguments: expected at least {}, got {}",
                        expected, got
                    )
                } else {
                    write!(
                        f,
                        "wrong number of arguments: expected {}, got {}",
                        expected, got
                    )
                }
            }
            RuntimeError::StackUnderflow => {
                write!(f, "return with an empty control stack")
            }
            RuntimeError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<CoreError> for RuntimeError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnboundVariable(sym) => RuntimeError::UnboundVariable(sym),
            CoreError::TypeError { expected, got, .. } => RuntimeError::TypeError {
                expected: expected.to_string(),
                got: got.to_string(),
            },
        }
    }
}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Halted,
}

/// The heap-based virtual machine: five registers and a step loop.
pub struct Vm {
    /// Accumulator: the last value computed
    acc: Datum,
    /// Expression: the next instruction datum
    exp: Datum,
    /// Current environment
    env: Env,
    /// Value rib: evaluated arguments for the pending call
    rib: Vector<Datum>,
    /// Top of the control stack
    frame: Option<Rc<CallFrame>>,
}

impl Vm {
    /// Create a machine over the given global environment. The expression
    /// register starts at `(halt)`; use [`Vm::load`] to install a program.
    pub fn new(env: Env) -> Self {
        Vm {
            acc: Datum::Unspecified,
            exp: Datum::list(vec![Datum::symbol("halt")]),
            env,
            rib: Vector::new(),
            frame: None,
        }
    }

    /// Install a program datum and reset the volatile registers. The
    /// environment register keeps its bindings across loads.
    pub fn load(&mut self, program: Datum) {
        self.acc = Datum::Unspecified;
        self.exp = program;
        self.rib = Vector::new();
        self.frame = None;
    }

    /// Run steps until `halt`; the accumulator is the result.
    pub fn run(&mut self) -> Result<Datum> {
        loop {
            if self.step()? == Step::Halted {
                return Ok(self.acc.clone());
            }
        }
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<Step> {
        let head_datum = match &self.exp {
            Datum::Pair(pair) => pair.car(),
            other => {
                return Err(RuntimeError::BadInstruction(other.to_string()));
            }
        };
        let Some(head) = head_datum.as_symbol().cloned() else {
            return Err(RuntimeError::BadInstruction(head_datum.to_string()));
        };

        match head.name() {
            // (halt)
            "halt" => return Ok(Step::Halted),

            // (refer var x)
            "refer" => {
                let [var, x] = self.operands()?;
                let var = symbol_operand(&var)?;
                self.acc = self.env.get(&var)?;
                self.exp = x;
            }

            // (constant obj x)
            "constant" => {
                let [obj, x] = self.operands()?;
                self.acc = obj;
                self.exp = x;
            }

            // (close vars body x)
            "close" => {
                let [vars, body, x] = self.operands()?;
                let (params, variadic) = parse_params(&vars)?;
                self.acc = Datum::closure(Closure::new(
                    Rc::new(self.env.clone()),
                    body,
                    params,
                    variadic,
                ));
                self.exp = x;
            }

            // (test then else)
            "test" => {
                let [then_exp, else_exp] = self.operands()?;
                self.exp = if self.acc.is_false() { else_exp } else { then_exp };
            }

            // (assign var x)
            "assign" => {
                let [var, x] = self.operands()?;
                let var = symbol_operand(&var)?;
                self.env.set(&var, self.acc.clone())?;
                self.exp = x;
            }

            // (conti x)
            "conti" => {
                let [x] = self.operands()?;
                let handle = DatumCustom::new(FrameHandle::new(self.frame.clone()));
                let var = Symbol::new("v");
                let body = Datum::list(vec![
                    Datum::symbol("nuate"),
                    Datum::Custom(handle.clone()),
                    Datum::Symbol(var.clone()),
                ]);
                self.acc = Datum::closure(Closure::with_frame(
                    Rc::new(Env::new()),
                    body,
                    vec![var],
                    None,
                    handle,
                ));
                self.exp = x;
            }

            // (nuate s var)
            "nuate" => {
                let [s, var] = self.operands()?;
                let handle = match &s {
                    Datum::Custom(custom) => {
                        custom.downcast_ref::<FrameHandle>().ok_or_else(|| {
                            RuntimeError::TypeError {
                                expected: "call-frame".to_string(),
                                got: custom.type_name().to_string(),
                            }
                        })?
                    }
                    other => {
                        return Err(RuntimeError::TypeError {
                            expected: "call-frame".to_string(),
                            got: other.type_name().to_string(),
                        });
                    }
                };
                self.frame = handle.frame().cloned();
                let var = symbol_operand(&var)?;
                self.acc = self.env.get(&var)?;
                self.exp = Datum::list(vec![Datum::symbol("return")]);
            }

            // (frame ret x)
            "frame" => {
                let [ret, x] = self.operands()?;
                self.frame = Some(Rc::new(CallFrame::new(
                    ret,
                    self.env.clone(),
                    self.rib.clone(),
                    self.frame.take(),
                )));
                self.rib = Vector::new();
                self.exp = x;
            }

            // (argument x)
            "argument" => {
                let [x] = self.operands()?;
                self.rib.push_back(self.acc.clone());
                self.exp = x;
            }

            // (apply)
            "apply" => {
                let closure = match &self.acc {
                    Datum::Closure(closure) => Rc::clone(closure),
                    other => {
                        return Err(RuntimeError::NotApplicable(other.type_name().to_string()));
                    }
                };
                let got = self.rib.len();
                let expected = closure.params().len();
                if closure.variadic().is_some() {
                    if got < expected {
                        return Err(RuntimeError::ArityError {
                            expected,
                            got,
                            variadic: true,
                        });
                    }
                } else if got != expected {
                    return Err(RuntimeError::ArityError {
                        expected,
                        got,
                        variadic: false,
                    });
                }
                let env = closure.env().downcast_ref::<Env>().ok_or_else(|| {
                    RuntimeError::Internal(
                        "closure environment is not an environment".to_string(),
                    )
                })?;
                let args: Vec<Datum> = self.rib.iter().cloned().collect();
                self.env = env.extend(closure.params(), closure.variadic(), &args);
                self.exp = closure.body().clone();
                self.rib = Vector::new();
            }

            // (return)
            "return" => {
                let frame = self.frame.take().ok_or(RuntimeError::StackUnderflow)?;
                self.exp = frame.ret().clone();
                self.env = frame.env().clone();
                self.rib = frame.rib().clone();
                self.frame = frame.next().cloned();
            }

            other => return Err(RuntimeError::BadInstruction(other.to_string())),
        }

        Ok(Step::Continue)
    }

    /// Accumulator register: the last value computed.
    #[must_use]
    pub fn accumulator(&self) -> &Datum {
        &self.acc
    }

    /// Expression register: the next instruction datum.
    #[must_use]
    pub fn expression(&self) -> &Datum {
        &self.exp
    }

    /// Environment register.
    #[must_use]
    pub fn environment(&self) -> &Env {
        &self.env
    }

    /// Value rib register.
    #[must_use]
    pub fn rib(&self) -> &Vector<Datum> {
        &self.rib
    }

    /// Top of the control stack.
    #[must_use]
    pub fn frame(&self) -> Option<&Rc<CallFrame>> {
        self.frame.as_ref()
    }

    /// The operands of the current instruction, checked for count.
    fn operands<const N: usize>(&self) -> Result<[Datum; N]> {
        let rest = match &self.exp {
            Datum::Pair(pair) => pair.cdr(),
            _ => Datum::Null,
        };
        let items = lists::to_vec(&rest).map_err(RuntimeError::from)?;
        let count = items.len();
        items.try_into().map_err(|_| RuntimeError::TypeError {
            expected: format!("{} instruction operands", N),
            got: count.to_string(),
        })
    }
}

/// Read a `close` parameter list in lambda-list shape: a proper list of
/// symbols, an improper list whose tail symbol is the variadic parameter, or
/// a bare symbol taking the whole argument list.
fn parse_params(vars: &Datum) -> Result<(Vec<Symbol>, Option<Symbol>)> {
    let mut params = Vec::new();
    let mut rest = vars.clone();
    loop {
        match rest {
            Datum::Null => return Ok((params, None)),
            Datum::Symbol(tail) => return Ok((params, Some(tail))),
            Datum::Pair(pair) => {
                let car = pair.car();
                match car.as_symbol() {
                    Some(sym) => params.push(sym.clone()),
                    None => {
                        return Err(RuntimeError::TypeError {
                            expected: "parameter symbol".to_string(),
                            got: car.type_name().to_string(),
                        });
                    }
                }
                rest = pair.cdr();
            }
            other => {
                return Err(RuntimeError::TypeError {
                    expected: "parameter list".to_string(),
                    got: other.type_name().to_string(),
                });
            }
        }
    }
}

fn symbol_operand(datum: &Datum) -> Result<Symbol> {
    datum
        .as_symbol()
        .cloned()
        .ok_or_else(|| RuntimeError::TypeError {
            expected: "variable symbol".to_string(),
            got: datum.type_name().to_string(),
        })
}

/// Sever a continuation's hold on its captured frame, breaking the reference
/// cycle a stored continuation can form (frame → env → closure → frame).
/// Clears the closure's captured-frame field and blanks the frame operand in
/// its `nuate` body; the continuation is inert afterwards. Returns whether
/// anything was released.
pub fn release_continuation(datum: &Datum) -> bool {
    let Datum::Closure(closure) = datum else {
        return false;
    };
    if closure.captured_frame().is_none() {
        return false;
    }
    closure.clear_captured_frame();
    if let Some(body) = closure.body().as_pair()
        && let Datum::Pair(operands) = body.cdr()
    {
        operands.set_car(Datum::Null);
    }
    true
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use skema_parser::{ParserInput, ParserResult, parse_datum};

    fn program(source: &str) -> Datum {
        let mut input = ParserInput::new(source);
        match parse_datum(&mut input) {
            ParserResult::Complete(datum) => datum,
            other => panic!("bad program {:?}: {:?}", source, other),
        }
    }

    fn run(source: &str) -> Result<Datum> {
        let mut vm = Vm::new(Env::new());
        vm.load(program(source));
        vm.run()
    }

    fn run_in(env: &Env, source: &str) -> Result<Datum> {
        let mut vm = Vm::new(env.clone());
        vm.load(program(source));
        vm.run()
    }

    #[test]
    fn test_constant_chain() {
        // Later constants overwrite earlier ones
        let result = run("(constant 1 (constant 2 (halt)))").unwrap();
        assert_eq!(result, Datum::integer(2));
    }

    #[test]
    fn test_halt_leaves_registers() {
        let mut vm = Vm::new(Env::new());
        vm.load(program("(constant 7 (halt))"));
        assert_eq!(vm.run().unwrap(), Datum::integer(7));
        assert_eq!(vm.accumulator(), &Datum::integer(7));
        assert!(vm.frame().is_none());
        assert!(vm.rib().is_empty());
    }

    #[test]
    fn test_refer_and_assign() {
        let env = Env::new();
        env.define(Symbol::new("x"), Datum::Unspecified);
        let result = run_in(&env, "(constant 42 (assign x (refer x (halt))))").unwrap();
        assert_eq!(result, Datum::integer(42));
        assert_eq!(env.get(&Symbol::new("x")).unwrap(), Datum::integer(42));
    }

    #[test]
    fn test_refer_unbound() {
        let result = run("(refer ghost (halt))");
        assert!(matches!(result, Err(RuntimeError::UnboundVariable(_))));
    }

    #[test]
    fn test_assign_never_creates_a_binding() {
        let env = Env::new();
        let result = run_in(&env, "(constant 1 (assign ghost (halt)))");
        assert!(matches!(result, Err(RuntimeError::UnboundVariable(_))));
        assert!(!env.is_defined(&Symbol::new("ghost")));
    }

    #[test]
    fn test_test_false_takes_else() {
        let result = run("(constant #f (test (constant 1 (halt)) (constant 2 (halt))))").unwrap();
        assert_eq!(result, Datum::integer(2));
    }

    #[test]
    fn test_test_everything_else_is_true() {
        for literal in ["#t", "()", "0", "\"\""] {
            let source = format!(
                "(constant {} (test (constant 1 (halt)) (constant 2 (halt))))",
                literal
            );
            assert_eq!(run(&source).unwrap(), Datum::integer(1), "literal {}", literal);
        }
    }

    #[test]
    fn test_close_and_apply() {
        // ((lambda (x) x) 5)
        let result = run(
            "(frame (halt) (constant 5 (argument (close (x) (refer x (return)) (apply)))))",
        )
        .unwrap();
        assert_eq!(result, Datum::integer(5));
    }

    #[test]
    fn test_apply_binds_arguments_in_order() {
        // ((lambda (a b) b) 1 2)
        let result = run(
            "(frame (halt) (constant 1 (argument (constant 2 (argument \
             (close (a b) (refer b (return)) (apply)))))))",
        )
        .unwrap();
        assert_eq!(result, Datum::integer(2));
    }

    #[test]
    fn test_variadic_tail_collects_rest() {
        // ((lambda (a . rest) rest) 1 2 3)
        let result = run(
            "(frame (halt) (constant 1 (argument (constant 2 (argument (constant 3 (argument \
             (close (a . rest) (refer rest (return)) (apply)))))))))",
        )
        .unwrap();
        assert_eq!(
            result,
            Datum::list(vec![Datum::integer(2), Datum::integer(3)])
        );
    }

    #[test]
    fn test_bare_symbol_params_take_everything() {
        // ((lambda args args) 1 2)
        let result = run(
            "(frame (halt) (constant 1 (argument (constant 2 (argument \
             (close args (refer args (return)) (apply)))))))",
        )
        .unwrap();
        assert_eq!(
            result,
            Datum::list(vec![Datum::integer(1), Datum::integer(2)])
        );
    }

    #[test]
    fn test_apply_arity_mismatch() {
        let result = run(
            "(frame (halt) (constant 1 (argument (close (a b) (refer a (return)) (apply)))))",
        );
        assert!(matches!(
            result,
            Err(RuntimeError::ArityError {
                expected: 2,
                got: 1,
                variadic: false,
            })
        ));
    }

    #[test]
    fn test_apply_variadic_needs_fixed_args() {
        let result =
            run("(frame (halt) (close (a . rest) (refer a (return)) (apply)))");
        assert!(matches!(
            result,
            Err(RuntimeError::ArityError { variadic: true, .. })
        ));
    }

    #[test]
    fn test_apply_non_closure() {
        let result = run("(frame (halt) (constant 3 (apply)))");
        assert!(matches!(result, Err(RuntimeError::NotApplicable(_))));
    }

    #[test]
    fn test_bad_instruction() {
        assert!(matches!(
            run("(launch-missiles)"),
            Err(RuntimeError::BadInstruction(_))
        ));
        assert!(matches!(
            run("(7 (halt))"),
            Err(RuntimeError::BadInstruction(_))
        ));
    }

    #[test]
    fn test_missing_operands() {
        assert!(matches!(
            run("(constant 1)"),
            Err(RuntimeError::TypeError { .. })
        ));
    }

    #[test]
    fn test_return_with_empty_stack() {
        assert!(matches!(run("(return)"), Err(RuntimeError::StackUnderflow)));
    }

    #[test]
    fn test_step_is_deterministic() {
        let make = || {
            let env = Env::new();
            env.define(Symbol::new("x"), Datum::integer(9));
            let mut vm = Vm::new(env);
            vm.load(program("(refer x (halt))"));
            vm
        };
        let mut a = make();
        let mut b = make();
        assert_eq!(a.step().unwrap(), b.step().unwrap());
        assert_eq!(a.accumulator(), b.accumulator());
        assert_eq!(a.expression(), b.expression());
    }

    #[test]
    fn test_release_non_continuation() {
        assert!(!release_continuation(&Datum::integer(1)));
        let plain = program("(frame (halt) (close () (constant 1 (return)) (halt)))");
        let mut vm = Vm::new(Env::new());
        vm.load(plain);
        // Run up to halt; accumulator holds the plain closure
        let result = vm.run().unwrap();
        assert!(!release_continuation(&result));
    }
}
