use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use tracing::{debug, trace, warn};

use crate::{
    bytecode::{
        Op, Program,
        backpatch::resolve_jumps,
        compile_error::{CompileError, CompileErrorKind},
        ir::Pools,
        namespace::{Entry, EntryKind, Namespace},
    },
    frontend::{Lexer, Token, TokenKind},
};

/// Extension appended to `impl` targets and expected on source files.
pub const SOURCE_EXTENSION: &str = "eso";

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Name used in diagnostics.
    pub file_name: String,
    /// Directory `impl` paths are resolved against.
    pub base_dir: PathBuf,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            file_name: "repl".to_string(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Everything one translation unit produces; imports hand theirs back to
/// the including compiler.
struct Unit {
    instructions: Vec<Op>,
    pools: Pools,
    namespace: Namespace,
}

/// Single-pass recursive-descent compiler.
///
/// Statements are emitted straight into the innermost open buffer: the
/// global stream, or the body of the procedure/macro being defined. Named
/// blocks are copied into every call site, so the finished program needs no
/// symbol table at run time.
pub struct Compiler {
    file: String,
    base_dir: PathBuf,

    lexer: Lexer,
    current: Token,

    pools: Pools,
    namespace: Namespace,

    /// Output stream of the translation unit.
    global: Vec<Op>,
    /// Bodies currently being compiled, innermost last.
    blocks: Vec<Vec<Op>>,

    /// Lexical loop nesting of the block being compiled.
    loop_depth: usize,
    /// Name and kind of the definition whose body is open.
    defining: Option<(String, EntryKind)>,
    test_depth: usize,
    /// Set by the first statement that is not an `impl`.
    seen_statement: bool,

    /// Canonical paths imported by this file.
    imported: HashSet<PathBuf>,
    /// Canonical paths of the files currently being compiled, outermost first.
    import_chain: Vec<PathBuf>,
}

impl Compiler {
    pub fn new(file_name: &str) -> Self {
        Self::with_options(CompileOptions {
            file_name: file_name.to_string(),
            ..CompileOptions::default()
        })
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            file: options.file_name,
            base_dir: options.base_dir,
            lexer: Lexer::new(""),
            current: Token::new(TokenKind::Eof, "EOF", 1, 1),
            pools: Pools::new(),
            namespace: Namespace::new(),
            global: Vec::new(),
            blocks: Vec::new(),
            loop_depth: 0,
            defining: None,
            test_depth: 0,
            seen_statement: false,
            imported: HashSet::new(),
            import_chain: Vec::new(),
        }
    }

    pub fn compile_source(self, source: &str) -> Result<Program, CompileError> {
        let unit = self.compile_unit(source)?;
        let (int_constants, strings) = unit.pools.into_parts();

        Ok(Program {
            instructions: unit.instructions,
            int_constants,
            strings,
        })
    }

    pub fn compile_file(mut self, path: &Path) -> Result<Program, CompileError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            CompileError::new(
                &self.file,
                1,
                1,
                CompileErrorKind::ReadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                },
            )
        })?;

        if let Ok(canonical) = path.canonicalize() {
            self.import_chain.push(canonical);
        }

        self.compile_source(&source)
    }

    fn compile_unit(mut self, source: &str) -> Result<Unit, CompileError> {
        self.lexer = Lexer::new(source);
        self.current = self
            .lexer
            .next_token()
            .map_err(|e| CompileError::from_lexer(&self.file, e))?;

        self.program()?;

        let mut instructions = std::mem::take(&mut self.global);
        let summary = resolve_jumps(&mut instructions).map_err(|kind| self.error(kind))?;

        debug!(
            file = %self.file,
            instructions = instructions.len(),
            loops = summary.loops,
            breaks = summary.breaks,
            "compiled translation unit"
        );

        Ok(Unit {
            instructions,
            pools: self.pools,
            namespace: self.namespace,
        })
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    fn error(&self, kind: CompileErrorKind) -> CompileError {
        CompileError::at(&self.file, &self.current, kind)
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        let next = self
            .lexer
            .next_token()
            .map_err(|e| CompileError::from_lexer(&self.file, e))?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        if self.current.kind == kind {
            self.advance()
        } else {
            Err(CompileError::unexpected(&self.file, kind, &self.current))
        }
    }

    /// Consume an optional `;`.
    fn skip_semicolon(&mut self) -> Result<(), CompileError> {
        if self.current.kind == TokenKind::Semicolon {
            self.advance()?;
        }
        Ok(())
    }

    fn parse_int(&self, token: &Token) -> Result<i64, CompileError> {
        token.lexeme.parse::<i64>().map_err(|_| {
            CompileError::at(
                &self.file,
                token,
                CompileErrorKind::InvalidInteger(token.lexeme.clone()),
            )
        })
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn out(&mut self) -> &mut Vec<Op> {
        match self.blocks.last_mut() {
            Some(block) => block,
            None => &mut self.global,
        }
    }

    /// Append `op` and return its index within the current buffer.
    fn emit(&mut self, op: Op) -> usize {
        let out = self.out();
        out.push(op);
        out.len() - 1
    }

    /// Emit a print, in its string form when a string literal precedes it.
    /// The `Str` stays in place, so a jump landing on the print still prints
    /// the string.
    fn emit_print(&mut self, op: Op) {
        let out = self.out();
        let folded = match out.last() {
            Some(Op::Str(index)) => op.string_form(*index),
            _ => None,
        };
        out.push(folded.unwrap_or(op));
    }

    fn splice(&mut self, name: &str, kind: EntryKind) -> Result<(), CompileErrorKind> {
        let out = match self.blocks.last_mut() {
            Some(block) => block,
            None => &mut self.global,
        };

        let Some(entry) = self.namespace.get(name, kind) else {
            return Err(match kind {
                EntryKind::Procedure => CompileErrorKind::UndefinedProcedure(name.to_string()),
                EntryKind::Macro => CompileErrorKind::UndefinedMacro(name.to_string()),
            });
        };

        let at = out.len();
        entry.splice_into(out);
        trace!(block = name, %kind, at, len = out.len() - at, "inlined block");
        Ok(())
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    fn program(&mut self) -> Result<(), CompileError> {
        while !self.current.is_eof() {
            self.statement()?;
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<(), CompileError> {
        match self.current.kind {
            TokenKind::Semicolon => {
                self.advance()?;
                return Ok(());
            }
            TokenKind::Impl => {
                if self.seen_statement {
                    return Err(self.error(CompileErrorKind::ImportNotAtTop));
                }
                return self.import();
            }
            _ => self.seen_statement = true,
        }

        match self.current.kind {
            TokenKind::Int => {
                let token = self.advance()?;
                let value = self.parse_int(&token)?;
                let index = self.pools.intern_int(value);
                self.emit(Op::Push {
                    index,
                    negate: false,
                });
            }
            TokenKind::Neg => {
                self.advance()?;
                let token = self.expect(TokenKind::Int)?;
                let value = self.parse_int(&token)?;
                let index = self.pools.intern_int(value);
                self.emit(Op::Push {
                    index,
                    negate: true,
                });
            }
            TokenKind::Str => {
                let token = self.advance()?;
                let index = self.pools.intern_str(&token.lexeme);
                self.emit(Op::Str(index));
            }

            // Arithmetic and comparison
            TokenKind::Plus => self.simple(Op::Add)?,
            TokenKind::Minus => self.simple(Op::Sub)?,
            TokenKind::Star => self.simple(Op::Mul)?,
            TokenKind::Slash => self.simple(Op::Div)?,
            TokenKind::Less => self.simple(Op::Less)?,
            TokenKind::Greater => self.simple(Op::Greater)?,
            TokenKind::EqualTo => self.simple(Op::EqualTo)?,

            // Stack ops and I/O
            TokenKind::Dup => self.simple(Op::Duplicate)?,
            TokenKind::Pop => self.simple(Op::Pop)?,
            TokenKind::Ampersand => self.simple(Op::Swap)?,
            TokenKind::Rev => self.simple(Op::Reverse)?,
            TokenKind::QMark => self.simple(Op::Input)?,
            TokenKind::Dot => {
                self.advance()?;
                self.emit_print(Op::Print);
            }
            TokenKind::Comma => {
                self.advance()?;
                self.emit_print(Op::PrintChar);
            }

            // Control flow
            TokenKind::If => self.if_statement()?,
            TokenKind::LSquare => self.loop_statement()?,
            TokenKind::Break => {
                if self.loop_depth == 0 {
                    return Err(self.error(CompileErrorKind::BreakOutsideLoop));
                }
                self.advance()?;
                self.emit(Op::Break(None));
            }

            // Definitions
            TokenKind::Proc => self.definition(EntryKind::Procedure)?,
            TokenKind::Macro => self.definition(EntryKind::Macro)?,
            TokenKind::Undef => self.undef()?,
            TokenKind::Ident => {
                let token = self.advance()?;
                self.call(&token, EntryKind::Procedure)?;
            }
            TokenKind::Bang => {
                self.advance()?;
                let token = self.expect(TokenKind::Ident)?;
                self.call(&token, EntryKind::Macro)?;
            }

            // Testing
            TokenKind::Test => self.test_block()?,
            TokenKind::Assert => {
                self.advance()?;
                let message = self.expect(TokenKind::Str)?;
                let index = self.pools.intern_str(&message.lexeme);
                self.emit(Op::Assert(index));
            }

            kind => {
                return Err(self.error(CompileErrorKind::UnknownToken {
                    kind,
                    lexeme: self.current.lexeme.clone(),
                }));
            }
        }

        Ok(())
    }

    fn simple(&mut self, op: Op) -> Result<(), CompileError> {
        self.advance()?;
        self.emit(op);
        Ok(())
    }

    /// Compile statements until `terminator`, then consume it.
    fn block_until(
        &mut self,
        terminator: TokenKind,
        opener: &Token,
        what: &str,
    ) -> Result<(), CompileError> {
        while self.current.kind != terminator {
            if self.current.is_eof() {
                let kind = if terminator == TokenKind::End {
                    CompileErrorKind::MissingEnd(what.to_string())
                } else {
                    CompileErrorKind::UnexpectedToken {
                        expected: terminator,
                        found: TokenKind::Eof,
                        lexeme: self.current.lexeme.clone(),
                    }
                };
                return Err(CompileError::at(&self.file, opener, kind));
            }
            self.statement()?;
        }
        self.advance()?;
        Ok(())
    }

    /// `cond if ... end`
    fn if_statement(&mut self) -> Result<(), CompileError> {
        let opener = self.advance()?;
        let at = self.emit(Op::If(None));

        self.block_until(TokenKind::End, &opener, "'if'")?;

        let out = self.out();
        let after = out.len();
        out[at] = Op::If(Some(after));
        Ok(())
    }

    /// `[ ... ]`; an empty body emits nothing at all.
    fn loop_statement(&mut self) -> Result<(), CompileError> {
        let opener = self.advance()?;
        let start = self.emit(Op::LoopStart);

        self.loop_depth += 1;
        self.block_until(TokenKind::RSquare, &opener, "loop")?;
        self.loop_depth -= 1;

        let out = self.out();
        if out.len() == start + 1 {
            out.pop();
            trace!(at = start, "elided empty loop");
        } else {
            out.push(Op::LoopEnd(None));
        }
        Ok(())
    }

    /// `proc NAME argc [retc] ; ... end` or `macro NAME ; ... end`
    fn definition(&mut self, kind: EntryKind) -> Result<(), CompileError> {
        let opener = self.advance()?;
        if self.defining.is_some() || self.test_depth > 0 {
            return Err(CompileError::at(
                &self.file,
                &opener,
                CompileErrorKind::NestedDefinition(opener.lexeme.clone()),
            ));
        }

        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.lexeme.clone();
        if self.namespace.contains(&name, kind) {
            return Err(CompileError::at(
                &self.file,
                &name_token,
                CompileErrorKind::Redefinition { kind, name },
            ));
        }

        let header = match kind {
            EntryKind::Procedure => Some(self.procedure_header()?),
            EntryKind::Macro => None,
        };
        self.skip_semicolon()?;

        self.blocks.push(Vec::new());
        let saved_loop_depth = std::mem::take(&mut self.loop_depth);
        self.defining = Some((name.clone(), kind));

        let what = format!("{} '{}'", kind, name);
        self.block_until(TokenKind::End, &opener, &what)?;

        self.defining = None;
        self.loop_depth = saved_loop_depth;
        let mut body = self.blocks.pop().unwrap_or_default();

        let entry = match header {
            Some((argc, retc)) => {
                body.push(Op::Return);
                Entry::Procedure { argc, retc, body }
            }
            None => Entry::Macro { body },
        };

        debug!(block = %name, %kind, len = entry_len(&entry), "defined");
        self.namespace.define(&name, entry);
        Ok(())
    }

    /// `argc [retc]`, where `retc` is a count, `neg 1`, or absent (0).
    fn procedure_header(&mut self) -> Result<(usize, i64), CompileError> {
        let argc_token = self.expect(TokenKind::Int)?;
        let argc = argc_token.lexeme.parse::<usize>().map_err(|_| {
            CompileError::at(
                &self.file,
                &argc_token,
                CompileErrorKind::InvalidInteger(argc_token.lexeme.clone()),
            )
        })?;

        let retc = match self.current.kind {
            TokenKind::Int => {
                let token = self.advance()?;
                self.parse_int(&token)?
            }
            TokenKind::Neg => {
                self.advance()?;
                let token = self.expect(TokenKind::Int)?;
                let value = self.parse_int(&token)?;
                if value != 1 {
                    return Err(CompileError::at(
                        &self.file,
                        &token,
                        CompileErrorKind::InvalidReturnCount(-value),
                    ));
                }
                -1
            }
            _ => 0,
        };

        Ok((argc, retc))
    }

    fn undef(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        let token = self.expect(TokenKind::Ident)?;
        if self
            .namespace
            .undefine(&token.lexeme, EntryKind::Macro)
            .is_none()
        {
            return Err(CompileError::at(
                &self.file,
                &token,
                CompileErrorKind::UndefinedMacro(token.lexeme.clone()),
            ));
        }
        debug!(block = %token.lexeme, "undefined macro");
        Ok(())
    }

    fn call(&mut self, token: &Token, kind: EntryKind) -> Result<(), CompileError> {
        let is_self = matches!(
            &self.defining,
            Some((name, k)) if *name == token.lexeme && *k == kind
        );
        if is_self {
            return Err(CompileError::at(
                &self.file,
                token,
                CompileErrorKind::SelfReference {
                    kind,
                    name: token.lexeme.clone(),
                },
            ));
        }

        self.splice(&token.lexeme, kind)
            .map_err(|kind| CompileError::at(&self.file, token, kind))
    }

    /// `test 'name' ; ... end`
    fn test_block(&mut self) -> Result<(), CompileError> {
        let opener = self.advance()?;
        let name_token = self.expect(TokenKind::Str)?;
        let name = self.pools.intern_str(&name_token.lexeme);
        self.skip_semicolon()?;

        let at = self.emit(Op::TestCall { name, end: None });

        self.test_depth += 1;
        let saved_loop_depth = std::mem::take(&mut self.loop_depth);
        let what = format!("test '{}'", name_token.lexeme);
        self.block_until(TokenKind::End, &opener, &what)?;
        self.loop_depth = saved_loop_depth;
        self.test_depth -= 1;

        self.emit(Op::Return);
        let out = self.out();
        let after = out.len();
        out[at] = Op::TestCall {
            name,
            end: Some(after),
        };
        Ok(())
    }

    // =========================================================================
    // Imports
    // =========================================================================

    /// `impl 'dotted.name'`
    fn import(&mut self) -> Result<(), CompileError> {
        self.advance()?;
        let path_token = self.expect(TokenKind::Str)?;
        let path = self.base_dir.join(import_path(&path_token.lexeme));

        let not_found = |reason: String| {
            CompileError::at(
                &self.file,
                &path_token,
                CompileErrorKind::ImportNotFound {
                    path: path.display().to_string(),
                    reason,
                },
            )
        };

        let canonical = path.canonicalize().map_err(|e| not_found(e.to_string()))?;

        if self.import_chain.contains(&canonical) {
            return Err(CompileError::at(
                &self.file,
                &path_token,
                CompileErrorKind::CircularImport(path.display().to_string()),
            ));
        }

        if !self.imported.insert(canonical.clone()) {
            debug!(path = %path.display(), "skipping repeated import");
            return Ok(());
        }

        let source = std::fs::read_to_string(&canonical).map_err(|e| not_found(e.to_string()))?;

        let mut child = Compiler::with_options(CompileOptions {
            file_name: path.display().to_string(),
            base_dir: self.base_dir.clone(),
        });
        child.pools = std::mem::take(&mut self.pools);
        child.import_chain = self.import_chain.clone();
        child.import_chain.push(canonical);

        let unit = child.compile_unit(&source)?;
        self.pools = unit.pools;

        let offset = self.global.len();
        self.global
            .extend(unit.instructions.into_iter().map(|op| op.relocated(offset)));

        for (name, kind) in self.namespace.merge(unit.namespace) {
            warn!(
                file = %self.file,
                import = %path.display(),
                "{} '{}' is already defined; keeping the first definition",
                kind,
                name
            );
        }

        debug!(path = %path.display(), offset, "imported");
        Ok(())
    }
}

/// `lib.math` -> `lib/math.eso`; an existing `.eso` suffix is kept.
pub fn import_path(name: &str) -> PathBuf {
    let suffix = format!(".{}", SOURCE_EXTENSION);
    let stem = name.strip_suffix(&suffix).unwrap_or(name);

    let mut path: PathBuf = stem.split('.').collect();
    path.set_extension(SOURCE_EXTENSION);
    path
}

fn entry_len(entry: &Entry) -> usize {
    match entry {
        Entry::Procedure { body, .. } | Entry::Macro { body } => body.len(),
    }
}
