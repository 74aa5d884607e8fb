use std::fmt;

use lazy_static::lazy_static;

/// A callable the host exposes to programs.
///
/// These are the fallback for calls whose name matches no user-defined
/// function. Argument count and type checking is each host function's own
/// responsibility (see `Eval::call_host_function`), not the call protocol's.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Function {
    Print,
    Input,
    Str,
    Len,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Print => "print",
            Function::Input => "input",
            Function::Str => "str",
            Function::Len => "len",
        }
    }

    /// Name-indexed lookup into the host registry
    pub fn lookup(name: &str) -> Option<Function> {
        FUNCTIONS.iter().copied().find(|func| func.name() == name)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

lazy_static! {
    pub static ref FUNCTIONS: Vec<Function> = vec![
        Function::Print,
        Function::Input,
        Function::Str,
        Function::Len,
    ];
}

#[test]
fn test_lookup() {
    assert_eq!(Function::lookup("print"), Some(Function::Print));
    assert_eq!(Function::lookup("input"), Some(Function::Input));
    assert_eq!(Function::lookup("str"), Some(Function::Str));
    assert_eq!(Function::lookup("len"), Some(Function::Len));
    assert_eq!(Function::lookup("missing"), None);
}
