//! An incremental session with a z3 child process.

use crate::expr::{Constant, Expression, Symbols};
use crate::solver::smtlib::{declarations, expr_to_smtlib2, parse_get_value};
use crate::solver::{SolverFactory, SolverSession};
use crate::Error;
use log::trace;
use rustc_hash::FxHashSet;
use std::io::{BufRead, BufReader, Write};
use std::process;

pub struct Z3Session {
    child: process::Child,
    stdin: process::ChildStdin,
    stdout: BufReader<process::ChildStdout>,
    frames: Vec<Vec<Expression>>,
    declared: FxHashSet<String>,
}

impl Z3Session {
    /// Start `program` (usually `z3`) reading SMT-LIB2 from its standard input.
    pub fn new(program: &str) -> Result<Z3Session, Error> {
        let mut child = process::Command::new(program)
            .arg("-in")
            .stdin(process::Stdio::piped())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::null())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Solver("Failed to get stdin for solver".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Solver("Failed to get stdout for solver".into()))?;

        let mut session = Z3Session {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            frames: vec![Vec::new()],
            declared: FxHashSet::default(),
        };
        session.send("(set-option :print-success false)")?;
        session.send("(set-option :produce-models true)")?;
        // declarations must survive pops
        session.send("(set-option :global-declarations true)")?;
        session.send("(set-logic QF_ABVFP)")?;
        Ok(session)
    }

    fn send(&mut self, command: &str) -> Result<(), Error> {
        trace!("z3 < {}", command);
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Read one complete response, which may span several lines.
    fn read_response(&mut self) -> Result<String, Error> {
        let mut response = String::new();
        let mut depth: i64 = 0;
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(Error::Solver("solver closed its output".into()));
            }
            for c in line.chars() {
                match c {
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                }
            }
            response.push_str(line.trim());
            if depth <= 0 && !response.is_empty() {
                break;
            }
            response.push(' ');
        }
        trace!("z3 > {}", response);
        if response.starts_with("(error") {
            return Err(Error::Solver(response));
        }
        Ok(response)
    }

    fn declare(&mut self, expression: &Expression) -> Result<(), Error> {
        let symbols: Symbols = expression.symbols();
        for (name, declaration) in declarations(&symbols) {
            if self.declared.insert(name) {
                self.send(&declaration)?;
            }
        }
        Ok(())
    }

    fn assert(&mut self, constraint: &Expression) -> Result<(), Error> {
        self.declare(constraint)?;
        let command = format!("(assert {})", expr_to_smtlib2(constraint)?);
        self.send(&command)
    }
}

impl SolverSession for Z3Session {
    fn add_constraint(&mut self, constraint: &Expression) -> Result<(), Error> {
        self.assert(constraint)?;
        if let Some(frame) = self.frames.last_mut() {
            frame.push(constraint.clone());
        }
        Ok(())
    }

    fn add_constraint_after_new_backtracking_point(
        &mut self,
        constraint: &Expression,
    ) -> Result<(), Error> {
        self.send("(push 1)")?;
        self.frames.push(Vec::new());
        self.add_constraint(constraint)
    }

    fn backtrack_once(&mut self) -> Result<(), Error> {
        if self.frames.len() <= 1 {
            return Err(Error::invariant("backtracked below the base level"));
        }
        self.send("(pop 1)")?;
        self.frames.pop();
        Ok(())
    }

    fn level(&self) -> usize {
        self.frames.len() - 1
    }

    fn is_satisfiable(&mut self) -> Result<bool, Error> {
        self.send("(check-sat)")?;
        match self.read_response()?.as_str() {
            "sat" => Ok(true),
            "unsat" => Ok(false),
            other => Err(Error::Solver(format!("check-sat answered {}", other))),
        }
    }

    fn label(&mut self, expression: &Expression) -> Result<Constant, Error> {
        self.declare(expression)?;
        if !self.is_satisfiable()? {
            return Err(Error::Solver(
                "cannot label under unsatisfiable constraints".into(),
            ));
        }
        let command = format!("(get-value ({}))", expr_to_smtlib2(expression)?);
        self.send(&command)?;
        let response = self.read_response()?;
        parse_get_value(expression.sort(), &response)
    }

    fn constraints(&self) -> Vec<Expression> {
        self.frames.iter().flatten().cloned().collect()
    }
}

impl Drop for Z3Session {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl std::fmt::Debug for Z3Session {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Z3Session(level {})", self.level())
    }
}

/// Starts one z3 process per session.
#[derive(Clone, Debug)]
pub struct Z3Factory {
    program: String,
}

impl Default for Z3Factory {
    fn default() -> Z3Factory {
        Z3Factory {
            program: "z3".to_string(),
        }
    }
}

impl Z3Factory {
    pub fn new<S: Into<String>>(program: S) -> Z3Factory {
        Z3Factory {
            program: program.into(),
        }
    }
}

impl SolverFactory for Z3Factory {
    fn create(&self) -> Result<Box<dyn SolverSession>, Error> {
        Ok(Box::new(Z3Session::new(&self.program)?))
    }
}
