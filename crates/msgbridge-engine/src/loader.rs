//! Shared library loading and symbol resolution
//!
//! Libraries are opened once at start-up and stay loaded for the life of the
//! process. Resolution failures during start-up are fatal; the fallible API
//! exists for probing and tests.

use crate::config::LibrarySpec;
#[cfg(unix)]
use std::ffi::CString;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during library loading
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file not found or could not be loaded
    #[error("Library not found: {path}")]
    NotFound {
        /// Path that was attempted, with the loader's message
        path: String,
    },

    /// Symbol not found in library
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// Platform-specific error
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Invalid path encoding
    #[error("Invalid UTF-8 in path: {0}")]
    InvalidPath(String),
}

/// A loaded dynamic library
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl Library {
    /// Load a dynamic library with `dlopen(RTLD_NOW | RTLD_LOCAL)`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = LibraryHandle::load(path_str)?;

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Address of an exported symbol
    pub fn symbol_address(&self, symbol: &str) -> Result<usize, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }

    /// Get the path this library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(not(unix))]
type LibraryHandle = UnsupportedLibrary;

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(unix)]
fn last_dl_error() -> Option<String> {
    // SAFETY: dlerror returns a thread-local string or null
    unsafe {
        let err_ptr = libc::dlerror();
        if err_ptr.is_null() {
            None
        } else {
            Some(std::ffi::CStr::from_ptr(err_ptr).to_string_lossy().into_owned())
        }
    }
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path = CString::new(path)
            .map_err(|e| LoadError::PlatformError(format!("Invalid path: {}", e)))?;

        let handle = unsafe {
            // RTLD_NOW: Resolve all symbols immediately
            // RTLD_LOCAL: Symbols not available for subsequently loaded libraries
            libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL)
        };

        if handle.is_null() {
            let error = last_dl_error().unwrap_or_else(|| "Unknown error".to_string());
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, error),
            });
        }

        Ok(UnixLibrary { handle })
    }

    fn symbol(&self, name: &str, lib_path: &str) -> Result<usize, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))?;

        // Clear any previous errors
        last_dl_error();

        let symbol = unsafe { libc::dlsym(self.handle, c_name.as_ptr()) };

        if let Some(error) = last_dl_error() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", lib_path, error),
            });
        }

        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: lib_path.to_string(),
            });
        }

        Ok(symbol as usize)
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

#[cfg(not(unix))]
struct UnsupportedLibrary;

#[cfg(not(unix))]
impl UnsupportedLibrary {
    fn load(_path: &str) -> Result<Self, LoadError> {
        Err(LoadError::PlatformError(
            "dynamic loading of message-dispatch runtimes requires a unix host".to_string(),
        ))
    }

    fn symbol(&self, name: &str, lib_path: &str) -> Result<usize, LoadError> {
        Err(LoadError::SymbolNotFound {
            symbol: name.to_string(),
            library: lib_path.to_string(),
        })
    }
}

// ============================================================================
// Symbol resolver
// ============================================================================

/// The set of libraries loaded at start-up, by short name.
#[derive(Debug)]
pub struct SymbolResolver {
    libraries: Vec<(String, Library)>,
}

impl SymbolResolver {
    /// Open every library, aborting on the first failure.
    pub fn load(specs: &[LibrarySpec]) -> Self {
        match Self::try_load(specs) {
            Ok(resolver) => resolver,
            Err(e) => fatal!("failed to load required library: {}", e),
        }
    }

    /// Open every library, reporting the first failure.
    pub fn try_load(specs: &[LibrarySpec]) -> Result<Self, LoadError> {
        let mut libraries = Vec::with_capacity(specs.len());
        for spec in specs {
            let library = Library::open(&spec.path)?;
            tracing::info!(library = %spec.name, path = %spec.path, "loaded library");
            libraries.push((spec.name.clone(), library));
        }
        Ok(Self { libraries })
    }

    /// Library by short name
    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries
            .iter()
            .find(|(lib_name, _)| lib_name == name)
            .map(|(_, lib)| lib)
    }

    /// Address of `symbol` in library `lib`; fatal if either is missing.
    pub fn require(&self, lib: &str, symbol: &str) -> usize {
        let library = match self.library(lib) {
            Some(library) => library,
            None => fatal!("library '{}' was not loaded (needed for {})", lib, symbol),
        };
        match library.symbol_address(symbol) {
            Ok(address) => address,
            Err(e) => fatal!("{}", e),
        }
    }

    /// First library exporting `symbol`, searched in load order
    pub fn find(&self, symbol: &str) -> Option<usize> {
        self.libraries
            .iter()
            .find_map(|(_, lib)| lib.symbol_address(symbol).ok())
    }

    /// Value of an exported pointer-sized data constant (e.g. a string
    /// constant object); `None` when no library exports it.
    pub fn constant(&self, symbol: &str) -> Option<usize> {
        let address = self.find(symbol)?;
        // SAFETY: data symbols resolved here are pointer-sized globals
        let value = unsafe { *(address as *const usize) };
        Some(value)
    }

    /// Number of loaded libraries
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// True when nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library() {
        let result = Library::open("/nonexistent/libmissing.so");
        assert!(matches!(result, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_try_load_reports_failure() {
        let specs = vec![LibrarySpec::new("missing", "/nonexistent/libmissing.so")];
        assert!(SymbolResolver::try_load(&specs).is_err());
    }

    #[test]
    fn test_empty_resolver() {
        let resolver = SymbolResolver::try_load(&[]).unwrap();
        assert!(resolver.is_empty());
        assert_eq!(resolver.find("malloc"), None);
        assert!(resolver.library("objc").is_none());
    }

    #[test]
    #[should_panic(expected = "was not loaded")]
    fn test_require_missing_library_is_fatal() {
        let resolver = SymbolResolver::try_load(&[]).unwrap();
        resolver.require("objc", "objc_msgSend");
    }
}
