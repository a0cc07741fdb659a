// ABOUTME: Constants and small config records shared by the compiler and the REPL

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "Monad REPL";
pub const WELCOME_SUBTITLE: &str = "An ahead-of-time Lisp-style compiler, here in JIT mode";

/// One emittable artifact kind, in the order the backend driver tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Ir,
    Bitcode,
    Assembly,
    Object,
    Executable,
}

impl ArtifactKind {
    /// The file suffix for this kind (§6 "Artifact naming"); the linked
    /// executable carries no suffix at all.
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Ir => ".ll",
            ArtifactKind::Bitcode => ".bc",
            ArtifactKind::Assembly => ".s",
            ArtifactKind::Object => ".o",
            ArtifactKind::Executable => "",
        }
    }
}

/// Default target-machine parameters (§4.6): host triple, generic CPU,
/// position-independent relocation, default code model.
#[derive(Debug, Clone, Default)]
pub struct TargetConfig {
    pub triple: Option<String>,
}

impl TargetConfig {
    pub const CPU: &'static str = "generic";
    pub const FEATURES: &'static str = "";
}
