// ABOUTME: Diagnostic rendering and error types for lexing, parsing, and lowering

use crate::token::Pos;
use std::fmt;
use thiserror::Error;

/// A single source-anchored diagnostic: position, message, and (when the
/// source text is available) the offending line rendered with a caret.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub pos: Pos,
    pub end_column: Option<u32>,
    pub message: String,
    pub source_line: Option<String>,
}

impl Diagnostic {
    pub fn new(
        pos: Pos,
        end_column: Option<u32>,
        message: String,
        source_line: Option<String>,
    ) -> Self {
        Self {
            pos,
            end_column,
            message,
            source_line,
        }
    }

    /// Attach the offending source line, enabling caret rendering.
    pub fn with_source_line(mut self, line: impl Into<String>) -> Self {
        self.source_line = Some(line.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: error: {}", self.pos.line, self.pos.column, self.message)?;
        if let Some(line) = &self.source_line {
            let indent = "    ";
            write!(f, "\n{indent}{line}\n{indent}")?;
            let start = self.pos.column.saturating_sub(1) as usize;
            for _ in 0..start {
                write!(f, " ")?;
            }
            match self.end_column {
                Some(end) if end > self.pos.column => {
                    write!(f, "^")?;
                    for _ in self.pos.column..end.saturating_sub(1) {
                        write!(f, "~")?;
                    }
                    write!(f, "^")?;
                }
                _ => write!(f, "^")?,
            }
        }
        Ok(())
    }
}

/// Filename and source are attached here, once, at the point a `Diagnostic`
/// is finally printed, rather than threaded globally (see §9's resolution
/// for the two process-wide error-reporting pointers the original carried).
pub struct Reporter {
    pub filename: String,
    pub source: String,
}

impl Reporter {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            source: source.into(),
        }
    }

    /// Fill in a diagnostic's source line from `self.source` if it isn't set
    /// already, and prefix the rendered message with the filename.
    pub fn render(&self, diag: &Diagnostic) -> String {
        let mut diag = diag.clone();
        if diag.source_line.is_none() {
            if let Some(line_text) = self.source.lines().nth(diag.pos.line.saturating_sub(1) as usize) {
                diag = diag.with_source_line(line_text);
            }
        }
        format!("{}:{}", self.filename, diag)
    }
}

#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("{0}")]
    UnterminatedChar(Diagnostic),
    #[error("{0}")]
    UnterminatedString(Diagnostic),
    #[error("{0}")]
    UnexpectedByte(Diagnostic),

    #[error("{0}")]
    MissingCloseParen(Diagnostic),
    #[error("{0}")]
    MissingCloseBracket(Diagnostic),
    #[error("{0}")]
    MalformedAnnotation(Diagnostic),
    #[error("{0}")]
    MalformedSignature(Diagnostic),
    #[error("{0}")]
    UnknownSignatureToken(Diagnostic),
    #[error("{0}")]
    UnexpectedToken(Diagnostic),

    #[error("{0}")]
    UnboundSymbol(Diagnostic),
    #[error("{0}")]
    NotCallable(Diagnostic),
    #[error("{0}")]
    UnknownFunction(Diagnostic),

    #[error("{0}")]
    ArityMismatch(Diagnostic),

    #[error("{0}")]
    NonNumericOperand(Diagnostic),
    #[error("{0}")]
    MixedBase(Diagnostic),
    #[error("{0}")]
    UnknownType(Diagnostic),

    #[error("{0}")]
    IrEmission(Diagnostic),
    #[error("{0}")]
    VerificationFailed(Diagnostic),
    #[error("{0}")]
    TargetLookupFailed(Diagnostic),
    #[error("{0}")]
    LinkerFailed(Diagnostic),
}

impl CompileError {
    pub fn unterminated_char(d: Diagnostic) -> Self {
        Self::UnterminatedChar(d)
    }
    pub fn unterminated_string(d: Diagnostic) -> Self {
        Self::UnterminatedString(d)
    }
    pub fn unexpected_byte(d: Diagnostic) -> Self {
        Self::UnexpectedByte(d)
    }
    pub fn unexpected_token(d: Diagnostic) -> Self {
        Self::UnexpectedToken(d)
    }

    /// The diagnostic carried by any variant, for rendering with a `Reporter`.
    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            Self::UnterminatedChar(d)
            | Self::UnterminatedString(d)
            | Self::UnexpectedByte(d)
            | Self::MissingCloseParen(d)
            | Self::MissingCloseBracket(d)
            | Self::MalformedAnnotation(d)
            | Self::MalformedSignature(d)
            | Self::UnknownSignatureToken(d)
            | Self::UnexpectedToken(d)
            | Self::UnboundSymbol(d)
            | Self::NotCallable(d)
            | Self::UnknownFunction(d)
            | Self::ArityMismatch(d)
            | Self::NonNumericOperand(d)
            | Self::MixedBase(d)
            | Self::UnknownType(d)
            | Self::IrEmission(d)
            | Self::VerificationFailed(d)
            | Self::TargetLookupFailed(d)
            | Self::LinkerFailed(d) => d,
        }
    }
}
