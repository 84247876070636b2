//! Module (C8, §3): a loaded image or DLL inside a debuggee process. `path`
//! and `mapped_size` are lazy, memoized relations resolved through the
//! `ResourceLayer` on first access.

use std::cell::RefCell;

use super::error::EngineError;
use super::handle::{MemoryState, OsHandle, ResourceLayer};

/// Non-owning back-reference to the owning process, encoded as its pid
/// rather than a pointer (§9 Design Notes: back-references are non-owning
/// relations; implementers may use arena indices instead of cyclic pointers).
pub type ProcessRef = u32;

pub struct Module {
    pub base_address: u64,
    pub process: ProcessRef,
    path: RefCell<Option<String>>,
    mapped_size: RefCell<Option<u64>>,
}

impl Module {
    pub fn new(base_address: u64, process: ProcessRef) -> Self {
        Module {
            base_address,
            process,
            path: RefCell::new(None),
            mapped_size: RefCell::new(None),
        }
    }

    /// The section file name backing this module, resolved via VM query at
    /// first access and memoized thereafter.
    pub fn path(
        &self,
        resource: &dyn ResourceLayer,
        process_handle: OsHandle,
    ) -> Result<String, EngineError> {
        if let Some(p) = self.path.borrow().as_ref() {
            return Ok(p.clone());
        }
        let resolved = resource.query_section_name(process_handle, self.base_address)?;
        *self.path.borrow_mut() = Some(resolved.clone());
        Ok(resolved)
    }

    /// Iterates VM regions from `base_address` while each queried region's
    /// section file name equals this module's `path`, summing their sizes,
    /// until the query fails or the name differs (§3).
    pub fn mapped_size(
        &self,
        resource: &dyn ResourceLayer,
        process_handle: OsHandle,
    ) -> Result<u64, EngineError> {
        if let Some(size) = *self.mapped_size.borrow() {
            return Ok(size);
        }
        let path = self.path(resource, process_handle)?;

        let mut total = 0u64;
        let mut addr = self.base_address;
        loop {
            let info = match resource.query_memory(process_handle, addr) {
                Ok(info) => info,
                Err(_) => break,
            };
            if info.state == MemoryState::Free {
                break;
            }
            match resource.query_section_name(process_handle, addr) {
                Ok(name) if name == path => {}
                _ => break,
            }
            total += info.size;
            addr = info.base + info.size;
        }

        *self.mapped_size.borrow_mut() = Some(total);
        Ok(total)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("base_address", &format_args!("{:#010x}", self.base_address))
            .field("process", &self.process)
            .field("path", &self.path.borrow())
            .finish()
    }
}

/// `module!+rva` when a module is known, bare hex RVA otherwise --
/// `dbg.py`'s `Location.__str__` (§3 [SUPPLEMENT]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub module_name: Option<String>,
    pub rva: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.module_name {
            Some(name) => write!(f, "{name}+{:08x}", self.rva),
            None => write!(f, "{:08x}", self.rva),
        }
    }
}
