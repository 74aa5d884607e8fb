use std::io::{BufRead, Write};

use log::debug;

use crate::lang::error::Result;
use crate::lang::eval::Eval;
use crate::lang::lex::lex;
use crate::lang::parse::parse;

/// Ties the pipeline together: lex, parse, evaluate.
pub struct Runtime<'a> {
    sink: &'a mut dyn Write,
    input: &'a mut dyn BufRead,
}

impl<'a> Runtime<'a> {
    /// Create a new `Runtime` instance
    ///
    /// `sink` receives host output (eg `print()` results); `input` feeds
    /// the `input()` host function
    pub fn new(sink: &'a mut dyn Write, input: &'a mut dyn BufRead) -> Self {
        Runtime { sink, input }
    }

    pub fn run(&mut self, source: &str) -> Result<()> {
        let tokens = lex(source)?;
        debug!("lexed {} tokens", tokens.len());

        let program = parse(tokens)?;
        debug!("parsed {} function definitions", program.len());

        let mut eval = Eval::new(&mut *self.sink, &mut *self.input);
        // The value returned by `main` is discarded
        eval.run(program)?;

        Ok(())
    }
}

#[test]
fn test_pipeline() {
    let source = r#"
def greeting(prefix, name)
    prefix + name
end

def main()
    who = input('who? ')
    print(greeting('hello ', who))
end
"#;

    let mut output = Vec::new();
    let mut input = "world\n".as_bytes();
    let mut runtime = Runtime::new(&mut output, &mut input);

    runtime.run(source).expect("Failed to run");

    assert_eq!(
        String::from_utf8(output).expect("Output not utf-8"),
        "who? hello world\n"
    );
}

#[test]
fn test_pipeline_errors_propagate() {
    let mut output = Vec::new();
    let mut input = "".as_bytes();
    let mut runtime = Runtime::new(&mut output, &mut input);

    assert!(runtime.run("def main()\n  ?\nend").is_err());
    assert!(runtime.run("def lonely()\n  1\nend").is_err());
}
