use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use log::debug;

use super::value::Value;
use crate::lang::ast::*;
use crate::lang::error::{Error, Result};
use crate::lang::functions::Function;
use crate::lang::scope::Scope;

pub struct Eval<'a> {
    sink: &'a mut dyn Write,
    input: &'a mut dyn BufRead,
    functions: BTreeMap<Identifier, Rc<Definition>>,
}

impl<'a> Eval<'a> {
    /// Create a new `Eval` instance
    ///
    /// `sink` is where host output is written (eg `print()` results);
    /// `input` is where `input()` reads lines from
    pub fn new(sink: &'a mut dyn Write, input: &'a mut dyn BufRead) -> Self {
        Eval {
            sink,
            input,
            functions: BTreeMap::new(),
        }
    }

    /// Register every definition, check the entry-point contract, then run
    /// `main` with an empty scope and return its value.
    pub fn run(&mut self, program: Vec<Definition>) -> Result<Value> {
        for definition in program {
            debug!("registering function '{}'", definition.name);
            // Same name: the later definition wins
            self.functions
                .insert(definition.name.clone(), Rc::new(definition));
        }

        let entry = Identifier("main".to_string());
        match self.functions.get(&entry) {
            Some(def) if def.params.is_empty() => (),
            _ => return Err(Error::MissingEntryPoint),
        }

        self.call_function(&entry, Vec::new())
    }

    /// The call protocol: user function first, host registry as fallback
    fn call_function(&mut self, name: &Identifier, args: Vec<Value>) -> Result<Value> {
        let definition = match self.functions.get(name).map(Rc::clone) {
            Some(def) => def,
            None => return self.call_host_function(name, args),
        };

        if definition.params.len() != args.len() {
            return Err(Error::Arity {
                name: name.to_string(),
                expected: definition.params.len(),
                actual: args.len(),
            });
        }

        // A fresh, empty scope per invocation; nothing is inherited from
        // the caller
        let mut scope = Scope::new();
        for (param, value) in definition.params.iter().zip(args) {
            scope.insert(param.clone(), value);
        }

        self.eval_sequence(&definition.body, &mut scope)
    }

    fn call_host_function(&mut self, name: &Identifier, args: Vec<Value>) -> Result<Value> {
        let func = match Function::lookup(&name.0) {
            Some(f) => f,
            None => return Err(Error::UnknownFunction(name.to_string())),
        };

        match func {
            Function::Print => {
                let rendered: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
                writeln!(self.sink, "{}", rendered.join(" "))?;

                Ok(Value::Unit)
            }
            Function::Input => {
                if args.len() > 1 {
                    return Err(Error::Arity {
                        name: func.to_string(),
                        expected: 1,
                        actual: args.len(),
                    });
                }

                if let Some(prompt) = args.first() {
                    write!(self.sink, "{}", prompt)?;
                    self.sink.flush()?;
                }

                let mut line = String::new();
                self.input.read_line(&mut line)?;
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }

                Ok(Value::Str(line))
            }
            Function::Str => {
                if args.len() != 1 {
                    return Err(Error::Arity {
                        name: func.to_string(),
                        expected: 1,
                        actual: args.len(),
                    });
                }

                Ok(Value::Str(args[0].to_string()))
            }
            Function::Len => {
                if args.len() != 1 {
                    return Err(Error::Arity {
                        name: func.to_string(),
                        expected: 1,
                        actual: args.len(),
                    });
                }

                match &args[0] {
                    Value::Str(s) => Ok(Value::Integer(s.chars().count() as i64)),
                    v => Err(Error::Type(format!(
                        "len() expects a string, got '{}'",
                        v.type_str()
                    ))),
                }
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expression, scope: &mut Scope<Value>) -> Result<Value> {
        match expr {
            Expression::Integer(i) => Ok(Value::Integer(*i)),
            Expression::Str(s) => Ok(Value::Str(s.clone())),
            Expression::Variable(ident) => scope
                .get(ident)
                .cloned()
                .ok_or_else(|| Error::UnboundVariable(ident.to_string())),
            Expression::Call(call) => self.eval_call(call, scope),
            Expression::Assignment(assignment) => {
                let value = self.eval_expr(&assignment.expr, scope)?;
                scope.insert(assignment.name.clone(), value);

                Ok(Value::Unit)
            }
            Expression::Sequence(items) => self.eval_sequence(items, scope),
            Expression::Operator(op) => Err(Error::Unevaluable(format!("a bare '{}' operator", op))),
        }
    }

    fn eval_call(&mut self, call: &Call, scope: &mut Scope<Value>) -> Result<Value> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval_expr(arg, scope)?);
        }

        self.call_function(&call.name, args)
    }

    /// Evaluate a sequence of expressions.
    ///
    /// An arithmetic run folds left to right; anything else is a statement
    /// sequence whose items run in order for their effects, with the last
    /// item's value as the result.
    fn eval_sequence(&mut self, items: &[Expression], scope: &mut Scope<Value>) -> Result<Value> {
        if is_arithmetic_run(items) {
            return self.eval_arithmetic_run(items, scope);
        }

        let mut last = Value::Unit;
        for item in items {
            last = self.eval_expr(item, scope)?;
        }

        Ok(last)
    }

    /// Strict left-to-right fold, no operator precedence: `2 + 3 * 4` is
    /// `(2 + 3) * 4`
    fn eval_arithmetic_run(
        &mut self,
        items: &[Expression],
        scope: &mut Scope<Value>,
    ) -> Result<Value> {
        let mut iter = items.iter();
        // `is_arithmetic_run` already checked the run is non-empty
        let mut accumulator = self.operand_value(iter.next().unwrap(), scope)?;

        loop {
            let op = match iter.next() {
                None => break,
                Some(Expression::Operator(op)) => *op,
                Some(_) => {
                    return Err(Error::MalformedExpression(
                        "an operand where an operator was expected".to_string(),
                    ))
                }
            };

            let operand = match iter.next() {
                Some(expr) => self.operand_value(expr, scope)?,
                None => {
                    return Err(Error::MalformedExpression(format!(
                        "dangling '{}' operator",
                        op
                    )))
                }
            };

            accumulator = apply_operator(op, accumulator, operand)?;
        }

        Ok(accumulator)
    }

    fn operand_value(&mut self, expr: &Expression, scope: &mut Scope<Value>) -> Result<Value> {
        match expr {
            Expression::Integer(i) => Ok(Value::Integer(*i)),
            Expression::Variable(ident) => scope
                .get(ident)
                .cloned()
                .ok_or_else(|| Error::UnboundVariable(ident.to_string())),
            Expression::Operator(op) => Err(Error::MalformedExpression(format!(
                "'{}' operator where an operand was expected",
                op
            ))),
            _ => Err(Error::MalformedExpression(
                "only integer literals and variables can be operands".to_string(),
            )),
        }
    }
}

fn is_arithmetic_run(items: &[Expression]) -> bool {
    !items.is_empty()
        && items.iter().all(|item| {
            matches!(
                item,
                Expression::Integer(_) | Expression::Variable(_) | Expression::Operator(_)
            )
        })
}

fn apply_operator(op: Operator, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        Operator::Add => match (lhs, rhs) {
            (Value::Integer(l), Value::Integer(r)) => l
                .checked_add(r)
                .map(Value::Integer)
                .ok_or_else(|| Error::Type(format!("{} + {} overflows", l, r))),
            (Value::Str(l), Value::Str(r)) => Ok(Value::Str(format!("{}{}", l, r))),
            (l @ Value::Float(_), r) | (l, r @ Value::Float(_)) => {
                Ok(Value::Float(l.as_float()? + r.as_float()?))
            }
            (l, r) => Err(Error::Type(format!(
                "cannot add types '{}' and '{}'",
                l.type_str(),
                r.type_str()
            ))),
        },
        Operator::Subtract => match (lhs, rhs) {
            (Value::Integer(l), Value::Integer(r)) => l
                .checked_sub(r)
                .map(Value::Integer)
                .ok_or_else(|| Error::Type(format!("{} - {} overflows", l, r))),
            (l, r) => Ok(Value::Float(l.as_float()? - r.as_float()?)),
        },
        Operator::Multiply => match (lhs, rhs) {
            (Value::Integer(l), Value::Integer(r)) => l
                .checked_mul(r)
                .map(Value::Integer)
                .ok_or_else(|| Error::Type(format!("{} * {} overflows", l, r))),
            (l, r) => Ok(Value::Float(l.as_float()? * r.as_float()?)),
        },
        Operator::Divide => {
            let divisor = rhs.as_float()?;
            if divisor == 0.0 {
                return Err(Error::DivideByZero);
            }

            // Division never truncates, even between integers
            Ok(Value::Float(lhs.as_float()? / divisor))
        }
    }
}

#[cfg(test)]
fn run_program(source: &str, stdin: &str) -> (Result<Value>, String) {
    use crate::lang::lex::lex;
    use crate::lang::parse::parse;

    let program = parse(lex(source).expect("Failed to lex")).expect("Failed to parse");

    let mut output = Vec::new();
    let mut input = stdin.as_bytes();
    let result = Eval::new(&mut output, &mut input).run(program);

    (result, String::from_utf8(output).expect("Output not utf-8"))
}

#[cfg(test)]
fn eval_main(body: &str) -> Result<Value> {
    run_program(&format!("def main()\n  {}\nend", body), "").0
}

#[test]
fn test_arithmetic_fold_has_no_precedence() {
    let tests = vec![
        ("2 + 3", Value::Integer(5)),
        ("2 + 3 * 4", Value::Integer(20)),
        ("10 - 4 - 1", Value::Integer(5)),
        ("7 / 2", Value::Float(3.5)),
        ("6 / 2", Value::Float(3.0)),
        ("2 * 3 + 4", Value::Integer(10)),
        ("42", Value::Integer(42)),
    ];

    for (body, expected) in tests {
        assert_eq!(
            eval_main(body).expect("Failed to eval"),
            expected,
            "body: {}",
            body
        );
    }
}

#[test]
fn test_assignment_binds_in_current_scope() {
    let (result, output) = run_program("def main()\n  x = 2 + 3\n  x\nend", "");
    assert_eq!(result.expect("Failed to eval"), Value::Integer(5));
    assert_eq!(output, "");

    // Bindings can be rebound and referenced in later runs
    let result = eval_main("x = 10\n  y = x - 4 - 1\n  y").expect("Failed to eval");
    assert_eq!(result, Value::Integer(5));

    // An assignment itself evaluates to unit
    assert_eq!(eval_main("x = 1").expect("Failed to eval"), Value::Unit);
}

#[test]
fn test_user_function_call() {
    let source = "def add(a, b)\n  a + b\nend\ndef main()\n  add(2, 3)\nend";
    let (result, output) = run_program(source, "");

    assert_eq!(result.expect("Failed to eval"), Value::Integer(5));
    assert_eq!(output, "");
}

#[test]
fn test_nested_call_arguments() {
    let source = "def add(a, b)\n  a + b\nend\ndef main()\n  add(add(1, 2), 3)\nend";
    assert_eq!(
        run_program(source, "").0.expect("Failed to eval"),
        Value::Integer(6)
    );
}

#[test]
fn test_call_result_assigned() {
    let source = "def double(n)\n  n * 2\nend\ndef main()\n  x = double(21)\n  x\nend";
    assert_eq!(
        run_program(source, "").0.expect("Failed to eval"),
        Value::Integer(42)
    );
}

#[test]
fn test_redefinition_last_wins() {
    let source = "def f()\n  1\nend\ndef f()\n  2\nend\ndef main()\n  f()\nend";
    assert_eq!(
        run_program(source, "").0.expect("Failed to eval"),
        Value::Integer(2)
    );
}

#[test]
fn test_entry_point_contract() {
    match run_program("def helper()\n  1\nend", "").0 {
        Err(Error::MissingEntryPoint) => (),
        other => panic!("Expected missing entry point, got {:?}", other),
    }

    // A `main` that takes parameters does not satisfy the contract
    match run_program("def main(a)\n  a\nend", "").0 {
        Err(Error::MissingEntryPoint) => (),
        other => panic!("Expected missing entry point, got {:?}", other),
    }

    // The check fires before any user code runs
    let (result, output) = run_program("def helper()\n  print('side effect')\nend", "");
    assert!(matches!(result, Err(Error::MissingEntryPoint)));
    assert_eq!(output, "");
}

#[test]
fn test_arity_enforcement() {
    let template =
        |call: &str| format!("def add(a, b)\n  a + b\nend\ndef main()\n  {}\nend", call);

    for call in vec!["add(1)", "add(1, 2, 3)"] {
        match run_program(&template(call), "").0 {
            Err(Error::Arity {
                name,
                expected,
                actual,
            }) => {
                assert_eq!(name, "add");
                assert_eq!(expected, 2);
                assert_ne!(actual, 2);
            }
            other => panic!("Expected arity error for {}, got {:?}", call, other),
        }
    }

    assert_eq!(
        run_program(&template("add(1, 2)"), "")
            .0
            .expect("Failed to eval"),
        Value::Integer(3)
    );
}

#[test]
fn test_scope_isolation() {
    // `x` assigned in `f` must not be visible in `g`, even though `g` is
    // called from `f`
    let source = "def g()\n  x\nend\ndef f()\n  x = 1\n  g()\nend\ndef main()\n  f()\nend";
    match run_program(source, "").0 {
        Err(Error::UnboundVariable(name)) => assert_eq!(name, "x"),
        other => panic!("Expected unbound variable, got {:?}", other),
    }
}

#[test]
fn test_arguments_evaluated_in_caller_scope() {
    let source = "def double(n)\n  n * 2\nend\ndef main()\n  x = 21\n  double(x)\nend";
    assert_eq!(
        run_program(source, "").0.expect("Failed to eval"),
        Value::Integer(42)
    );
}

#[test]
fn test_unknown_function() {
    match eval_main("foo()") {
        Err(Error::UnknownFunction(name)) => assert_eq!(name, "foo"),
        other => panic!("Expected unknown function, got {:?}", other),
    }
}

#[test]
fn test_unbound_variable() {
    match eval_main("nope") {
        Err(Error::UnboundVariable(name)) => assert_eq!(name, "nope"),
        other => panic!("Expected unbound variable, got {:?}", other),
    }
}

#[test]
fn test_malformed_arithmetic() {
    let tests = vec!["1 + + 2", "1 2", "+ 2", "1 +"];

    for body in tests {
        match eval_main(body) {
            Err(Error::MalformedExpression(_)) => (),
            other => panic!("Expected malformed expression for '{}', got {:?}", body, other),
        }
    }
}

#[test]
fn test_division() {
    assert_eq!(eval_main("7 / 2").expect("Failed to eval"), Value::Float(3.5));

    match eval_main("1 / 0") {
        Err(Error::DivideByZero) => (),
        other => panic!("Expected division by zero, got {:?}", other),
    }
}

#[test]
fn test_type_errors() {
    let source = "def inc(n)\n  n + 1\nend\ndef main()\n  inc('one')\nend";
    match run_program(source, "").0 {
        Err(Error::Type(_)) => (),
        other => panic!("Expected type error, got {:?}", other),
    }
}

#[test]
fn test_string_concat() {
    let source =
        "def cat(a, b)\n  a + b\nend\ndef main()\n  a = 'one'\n  b = 'two'\n  cat(a, b)\nend";
    assert_eq!(
        run_program(source, "").0.expect("Failed to eval"),
        Value::Str("onetwo".to_string())
    );
}

#[test]
fn test_bare_operator_is_unevaluable() {
    // A body mixing a statement with loose arithmetic is not an arithmetic
    // run, so the operator item has no evaluation rule
    match eval_main("print('x')\n  1 + 2") {
        Err(Error::Unevaluable(_)) => (),
        other => panic!("Expected unevaluable error, got {:?}", other),
    }
}

#[test]
fn test_host_print() {
    let (result, output) = run_program("def main()\n  print('a', 1, 'b')\nend", "");

    assert_eq!(result.expect("Failed to eval"), Value::Unit);
    assert_eq!(output, "a 1 b\n");
}

#[test]
fn test_host_input() {
    let source = "def main()\n  name = input('Name: ')\n  print('hi', name)\nend";
    let (result, output) = run_program(source, "joe\n");

    assert_eq!(result.expect("Failed to eval"), Value::Unit);
    assert_eq!(output, "Name: hi joe\n");
}

#[test]
fn test_host_input_via_user_function() {
    // The host fallback still applies inside user-defined functions
    let source = "def main()\n  username = get_input('user: ')\n  print('welcome', username)\nend\ndef get_input(prompt)\n  input(prompt)\nend";
    let (result, output) = run_program(source, "banks\n");

    assert_eq!(result.expect("Failed to eval"), Value::Unit);
    assert_eq!(output, "user: welcome banks\n");
}

#[test]
fn test_host_str_and_len() {
    assert_eq!(
        eval_main("str(1 + 2)").expect("Failed to eval"),
        Value::Str("3".to_string())
    );
    assert_eq!(
        eval_main("len('hello')").expect("Failed to eval"),
        Value::Integer(5)
    );

    match eval_main("len(1)") {
        Err(Error::Type(_)) => (),
        other => panic!("Expected type error, got {:?}", other),
    }

    match eval_main("str(1, 2)") {
        Err(Error::Arity { name, .. }) => assert_eq!(name, "str"),
        other => panic!("Expected arity error, got {:?}", other),
    }
}

#[test]
fn test_body_returns_last_value() {
    assert_eq!(
        eval_main("1\n  2\n  'three'").expect("Failed to eval"),
        Value::Str("three".to_string())
    );
}

#[test]
fn test_integer_overflow_is_an_error() {
    let source = format!(
        "def inc(n)\n  n + 1\nend\ndef main()\n  inc({})\nend",
        i64::MAX
    );
    match run_program(&source, "").0 {
        Err(Error::Type(_)) => (),
        other => panic!("Expected overflow error, got {:?}", other),
    }
}
