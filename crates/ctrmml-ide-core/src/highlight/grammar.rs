//! Grammar shared-library loading
//!
//! The ctrmml grammar ships as a compiled tree-sitter library exposing the
//! usual `tree_sitter_<name>` constructor. Each handle is owned by the
//! context that created it and loads lazily on first use; nothing here is
//! process-global.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use once_cell::sync::OnceCell;
use tree_sitter::Language;

use crate::error::GrammarError;

/// Constructor symbol every compiled tree-sitter grammar exports.
const LANGUAGE_SYMBOL: &[u8] = b"tree_sitter_ctrmml";

/// Stem of the grammar library file, completed with the platform's dynamic
/// library extension.
pub const GRAMMAR_FILE_STEM: &str = "ctrmml";

/// Lazily loaded handle to the ctrmml grammar.
pub struct Grammar {
    path: PathBuf,
    language: OnceCell<Language>,
}

impl Grammar {
    /// Handle for the grammar library at `path`. Nothing is loaded until
    /// [`Grammar::language`] is first called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            language: OnceCell::new(),
        }
    }

    /// Default library location under the storage root:
    /// `<storage>/grammars/ctrmml.<dll-ext>`.
    pub fn default_path(storage: &Path) -> PathBuf {
        storage.join("grammars").join(format!(
            "{GRAMMAR_FILE_STEM}.{}",
            std::env::consts::DLL_EXTENSION
        ))
    }

    /// Path this handle loads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded language, loading it on first use. Failures are not
    /// cached, so installing the library and retrying works.
    pub fn language(&self) -> Result<&Language, GrammarError> {
        self.language.get_or_try_init(|| load_language(&self.path))
    }
}

/// Load the `tree_sitter_ctrmml` constructor out of the shared library at
/// `path` and check its ABI against the linked tree-sitter runtime.
fn load_language(path: &Path) -> Result<Language, GrammarError> {
    if !path.exists() {
        return Err(GrammarError::Missing {
            path: path.to_path_buf(),
        });
    }

    // SAFETY: the symbol is the C constructor every compiled tree-sitter
    // grammar exports; we only dlopen files the user pointed us at.
    let language = unsafe {
        let library = Library::new(path).map_err(|err| GrammarError::Load(err.to_string()))?;
        let constructor: Symbol<unsafe extern "C" fn() -> Language> = library
            .get(LANGUAGE_SYMBOL)
            .map_err(|err| GrammarError::Load(err.to_string()))?;
        let language = constructor();
        // The language borrows code out of the library; keep it resident
        // for the life of the process.
        std::mem::forget(library);
        language
    };

    let version = language.version();
    let supported = tree_sitter::MIN_COMPATIBLE_LANGUAGE_VERSION..=tree_sitter::LANGUAGE_VERSION;
    if !supported.contains(&version) {
        return Err(GrammarError::Incompatible {
            found: version,
            min: tree_sitter::MIN_COMPATIBLE_LANGUAGE_VERSION,
            max: tree_sitter::LANGUAGE_VERSION,
        });
    }
    Ok(language)
}
