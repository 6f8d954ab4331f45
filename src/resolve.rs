use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use tracing::debug;

use crate::{config::RuntimeDescriptor, results::RuntimeInfo};

/// Finds an executable by name.
pub trait Lookup {
  fn lookup(&self, bin: &str) -> Option<PathBuf>;
}

/// Searches `PATH`.
pub struct PathLookup;

impl Lookup for PathLookup {
  fn lookup(&self, bin: &str) -> Option<PathBuf> {
    which::which(bin).ok()
  }
}

impl<L: Lookup + ?Sized> Lookup for &L {
  fn lookup(&self, bin: &str) -> Option<PathBuf> {
    (**self).lookup(bin)
  }
}

/// Resolves runtimes to executables, at most once per runtime name.
pub struct Resolver<L = PathLookup> {
  lookup: L,
  cache: HashMap<String, RuntimeInfo>,
}

impl Resolver {
  pub fn new() -> Self {
    Self::with_lookup(PathLookup)
  }
}

impl<L: Lookup> Resolver<L> {
  pub fn with_lookup(lookup: L) -> Self {
    Self {
      lookup,
      cache: HashMap::new(),
    }
  }

  /// Resolves `runtime`, returning the cached info if its name was seen
  /// before. A binary missing from `PATH` is not an error here: `bin` is used
  /// verbatim and the failure surfaces when the benchmark is spawned.
  pub fn resolve(&mut self, runtime: &RuntimeDescriptor) -> RuntimeInfo {
    let name = runtime.name();
    if let Some(cached) = self.cache.get(name) {
      return cached.clone();
    }

    let bin = runtime.bin().unwrap_or(name);
    let resolved = if Path::new(bin).is_absolute() {
      PathBuf::from(bin)
    } else {
      self.lookup.lookup(bin).unwrap_or_else(|| {
        debug!("runtime {name:?}: {bin:?} not found on PATH");
        PathBuf::from(bin)
      })
    };
    debug!("runtime {name:?} resolved to {resolved:?}");

    let info = RuntimeInfo {
      name: name.to_string(),
      bin: bin.to_string(),
      version: runtime.version().map(str::to_string),
      resolved,
    };
    self.cache.insert(name.to_string(), info.clone());

    info
  }
}
