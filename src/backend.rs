// ABOUTME: Artifact emission and linking: verifies the module, then drives it through the requested sinks

use std::path::Path;
use std::process::Command;

use inkwell::targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple};
use inkwell::OptimizationLevel;

use crate::config::{ArtifactKind, TargetConfig};
use crate::error::{CompileError, Diagnostic};
use crate::ir::Engine;
use crate::token::Pos;

fn backend_error(message: impl Into<String>) -> CompileError {
    CompileError::TargetLookupFailed(Diagnostic::new(Pos::default(), None, message.into(), None))
}

/// Drives a lowered module through emission and, when asked, linking.
/// Owns the target machine; the `Engine` owns the module itself.
pub struct Backend {
    target_machine: TargetMachine,
}

impl Backend {
    pub fn new(config: &TargetConfig) -> Result<Self, CompileError> {
        Target::initialize_all(&InitializationConfig::default());

        let triple = match &config.triple {
            Some(t) => TargetTriple::create(t),
            None => TargetMachine::get_default_triple(),
        };
        let target = Target::from_triple(&triple)
            .map_err(|e| backend_error(format!("unknown target triple '{}': {}", triple.as_str().to_string_lossy(), e)))?;
        let target_machine = target
            .create_target_machine(
                &triple,
                TargetConfig::CPU,
                TargetConfig::FEATURES,
                OptimizationLevel::Default,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| backend_error("failed to create a target machine for this triple"))?;

        Ok(Self { target_machine })
    }

    /// Verifies the module, aborting before any emission is attempted.
    pub fn verify(&self, engine: &Engine<'_>) -> Result<(), CompileError> {
        engine.module.verify().map_err(|e| {
            CompileError::VerificationFailed(Diagnostic::new(Pos::default(), None, e.to_string(), None))
        })
    }

    pub fn emit_ir(&self, engine: &Engine<'_>, path: &Path) -> Result<(), CompileError> {
        engine
            .module
            .print_to_file(path)
            .map_err(|e| backend_error(format!("failed to write IR to {}: {e}", path.display())))
    }

    pub fn emit_bitcode(&self, engine: &Engine<'_>, path: &Path) -> Result<(), CompileError> {
        if engine.module.write_bitcode_to_path(path) {
            Ok(())
        } else {
            Err(backend_error(format!("failed to write bitcode to {}", path.display())))
        }
    }

    pub fn emit_assembly(&self, engine: &Engine<'_>, path: &Path) -> Result<(), CompileError> {
        self.target_machine
            .write_to_file(&engine.module, FileType::Assembly, path)
            .map_err(|e| backend_error(format!("failed to write assembly to {}: {e}", path.display())))
    }

    pub fn emit_object(&self, engine: &Engine<'_>, path: &Path) -> Result<(), CompileError> {
        self.target_machine
            .write_to_file(&engine.module, FileType::Object, path)
            .map_err(|e| backend_error(format!("failed to write object to {}: {e}", path.display())))
    }

    /// Links `obj` into a native executable at `base` (no suffix), by
    /// shelling out to the system's C compiler (§6: `<cc> <obj> -o <base>
    /// -lm -no-pie`).
    pub fn link(&self, obj: &Path, base: &Path) -> Result<(), CompileError> {
        let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
        let status = Command::new(&cc)
            .arg(obj)
            .arg("-o")
            .arg(base)
            .arg("-lm")
            .arg("-no-pie")
            .status()
            .map_err(|e| CompileError::LinkerFailed(Diagnostic::new(Pos::default(), None, format!("failed to invoke '{cc}': {e}"), None)))?;
        if !status.success() {
            return Err(CompileError::LinkerFailed(Diagnostic::new(
                Pos::default(),
                None,
                format!("'{cc}' exited with {status}"),
                None,
            )));
        }
        Ok(())
    }
}

/// Given the output base name and the set of artifact kinds explicitly
/// requested, returns the path for one kind (§6 "Artifact naming").
pub fn artifact_path(base: &Path, kind: ArtifactKind) -> std::path::PathBuf {
    let mut path = base.to_path_buf();
    let suffix = kind.suffix();
    if suffix.is_empty() {
        path
    } else {
        let file_name = format!("{}{}", base.file_name().and_then(|n| n.to_str()).unwrap_or("a"), suffix);
        path.set_file_name(file_name);
        path
    }
}
