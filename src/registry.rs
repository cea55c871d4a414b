//! Opcode registry: the single source of truth for name/value/arity mapping.
//!
//! Merges the frozen built-in instruction table with extension opcodes
//! discovered as dynamic libraries in a designated directory. Built-ins and
//! extensions live in one flat descriptor table keyed by both name and value,
//! so the codec, compiler, disassembler, and engine all dispatch uniformly.
//!
//! Extension validation is deliberately forgiving: a broken, conflicting, or
//! incomplete extension is skipped with a warning and never prevents the
//! built-ins or the other extensions from loading.
//!
//! The registry is constructed once per invocation and immutable afterwards;
//! it can be shared read-only across machines.

use crate::errors::VMError;
use crate::extension::{
    self, RawExecuteFn, RawHasOperandFn, RawNameFn, RawValueFn, SYM_EXECUTE, SYM_HAS_OPERAND,
    SYM_OPCODE_NAME, SYM_OPCODE_VALUE,
};
use crate::opcodes::{BuiltinOp, EXTENSION_VALUE_MAX, EXTENSION_VALUE_MIN};
use crate::stack::Stack;
use crate::{info, warn};
use libloading::Library;
use std::collections::BTreeMap;
use std::ffi::CStr;
use std::fmt;
use std::path::Path;

/// Execution entry point of an accepted extension opcode.
pub type ExtensionHandler =
    Box<dyn Fn(&mut Stack, Option<i32>) -> Result<(), VMError> + Send + Sync>;

/// How an opcode executes: engine-internal dispatch or an extension handler.
pub enum OpcodeKind {
    /// One of the twelve frozen built-in opcodes.
    Builtin(BuiltinOp),
    /// A discovered extension opcode.
    Extension(ExtensionHandler),
}

impl fmt::Debug for OpcodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpcodeKind::Builtin(op) => f.debug_tuple("Builtin").field(op).finish(),
            OpcodeKind::Extension(_) => f.write_str("Extension(..)"),
        }
    }
}

/// One registered opcode: canonical name, numeric value, arity, behavior.
#[derive(Debug)]
pub struct OpcodeDescriptor {
    name: String,
    value: u8,
    has_operand: bool,
    kind: OpcodeKind,
}

impl OpcodeDescriptor {
    /// Canonical uppercase mnemonic.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric opcode value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Whether the opcode carries an operand.
    pub fn has_operand(&self) -> bool {
        self.has_operand
    }

    /// Dispatch kind.
    pub fn kind(&self) -> &OpcodeKind {
        &self.kind
    }

    /// Whether this descriptor came from a discovered extension.
    pub fn is_extension(&self) -> bool {
        matches!(self.kind, OpcodeKind::Extension(_))
    }
}

/// A validated-but-unmerged extension opcode candidate.
///
/// The dynamic-library loader produces these from exported symbols; tests
/// construct them directly. Both paths run through the same validation.
pub struct ExtensionSpec {
    /// Opcode mnemonic (canonicalized to uppercase on acceptance).
    pub name: String,
    /// Claimed numeric value; must lie in `0x10..=0xFE` and be unclaimed.
    pub value: u8,
    /// Whether the opcode carries an operand.
    pub has_operand: bool,
    /// Execution entry point.
    pub handler: ExtensionHandler,
}

/// Immutable mapping from opcode names and values to behavior.
pub struct OpcodeRegistry {
    descriptors: Vec<OpcodeDescriptor>,
    by_name: BTreeMap<String, usize>,
    by_value: BTreeMap<u8, usize>,
    // Keeps extension handler code mapped for the registry's lifetime.
    _libraries: Vec<Library>,
}

impl fmt::Debug for OpcodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeRegistry")
            .field("descriptors", &self.descriptors)
            .finish_non_exhaustive()
    }
}

impl OpcodeRegistry {
    /// Creates a registry holding only the built-in instruction table.
    pub fn builtin() -> Self {
        let mut registry = Self {
            descriptors: Vec::with_capacity(BuiltinOp::ALL.len()),
            by_name: BTreeMap::new(),
            by_value: BTreeMap::new(),
            _libraries: Vec::new(),
        };
        for op in BuiltinOp::ALL {
            registry.insert(OpcodeDescriptor {
                name: op.mnemonic().to_string(),
                value: op.value(),
                has_operand: op.has_operand(),
                kind: OpcodeKind::Builtin(op),
            });
        }
        registry
    }

    /// Creates a registry from the built-ins plus the given extension
    /// candidates, applying the same validation as directory discovery.
    ///
    /// Rejected candidates are skipped with a warning; they are never fatal.
    pub fn with_extensions(specs: impl IntoIterator<Item = ExtensionSpec>) -> Self {
        let mut registry = Self::builtin();
        for spec in specs {
            let origin = spec.name.clone();
            registry.try_accept(spec, &origin);
        }
        registry
    }

    /// Creates a registry by scanning `dir` for extension libraries.
    ///
    /// Candidates are regular files with the platform dynamic-library
    /// extension whose name does not start with `_`. A missing or unreadable
    /// directory yields a built-ins-only registry.
    pub fn discover(dir: &Path) -> Self {
        let mut registry = Self::builtin();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return registry,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with('_') {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(std::env::consts::DLL_EXTENSION) {
                continue;
            }

            match load_extension_library(&path) {
                Ok((spec, library)) => {
                    let origin = path.display().to_string();
                    if registry.try_accept(spec, &origin) {
                        registry._libraries.push(library);
                    }
                }
                Err(reason) => {
                    warn!("could not load extension {}: {}", path.display(), reason);
                }
            }
        }

        registry
    }

    /// Validates one candidate and merges it on success.
    ///
    /// Name and value conflicts are independent checks; either alone rejects
    /// the candidate.
    fn try_accept(&mut self, spec: ExtensionSpec, origin: &str) -> bool {
        let name = spec.name.trim().to_ascii_uppercase();

        if BuiltinOp::from_value(spec.value).is_some() {
            warn!(
                "extension {} uses reserved opcode value 0x{:02x}",
                origin, spec.value
            );
            return false;
        }
        if !(EXTENSION_VALUE_MIN..=EXTENSION_VALUE_MAX).contains(&spec.value) {
            warn!(
                "extension {} value 0x{:02x} is outside the extension range 0x{:02x}-0x{:02x}",
                origin, spec.value, EXTENSION_VALUE_MIN, EXTENSION_VALUE_MAX
            );
            return false;
        }
        if let Some(&idx) = self.by_value.get(&spec.value) {
            warn!(
                "extension {} value 0x{:02x} is already claimed by '{}'",
                origin,
                spec.value,
                self.descriptors[idx].name()
            );
            return false;
        }

        if name.is_empty() {
            warn!("extension {} has an empty opcode name", origin);
            return false;
        }
        if let Some(&idx) = self.by_name.get(&name) {
            if self.descriptors[idx].is_extension() {
                warn!("extension {} conflicts with existing opcode {}", origin, name);
            } else {
                warn!("extension {} tries to override built-in opcode {}", origin, name);
            }
            return false;
        }

        info!("Loaded extension: {} (0x{:02x})", name, spec.value);
        self.insert(OpcodeDescriptor {
            name,
            value: spec.value,
            has_operand: spec.has_operand,
            kind: OpcodeKind::Extension(spec.handler),
        });
        true
    }

    fn insert(&mut self, descriptor: OpcodeDescriptor) {
        let idx = self.descriptors.len();
        self.by_name.insert(descriptor.name.clone(), idx);
        self.by_value.insert(descriptor.value, idx);
        self.descriptors.push(descriptor);
    }

    /// Returns the complete name-to-value mapping (built-ins and extensions).
    pub fn get_opcodes(&self) -> BTreeMap<String, u8> {
        self.descriptors
            .iter()
            .map(|d| (d.name.clone(), d.value))
            .collect()
    }

    /// Looks up a descriptor by name, case-insensitively.
    pub fn descriptor(&self, name: &str) -> Option<&OpcodeDescriptor> {
        let canonical = name.to_ascii_uppercase();
        self.by_name
            .get(&canonical)
            .map(|&idx| &self.descriptors[idx])
    }

    /// Looks up a descriptor by numeric value.
    pub fn descriptor_by_value(&self, value: u8) -> Option<&OpcodeDescriptor> {
        self.by_value.get(&value).map(|&idx| &self.descriptors[idx])
    }

    /// Returns whether the named opcode carries an operand.
    ///
    /// Returns [`VMError::UnknownName`] if the name matches neither a
    /// built-in nor an accepted extension.
    pub fn has_operand(&self, name: &str) -> Result<bool, VMError> {
        self.descriptor(name)
            .map(OpcodeDescriptor::has_operand)
            .ok_or_else(|| VMError::UnknownName {
                name: name.to_string(),
            })
    }

    /// Returns whether the named opcode is an accepted extension.
    pub fn is_extension(&self, name: &str) -> bool {
        self.descriptor(name).is_some_and(OpcodeDescriptor::is_extension)
    }

    /// Dispatches to an extension opcode's handler.
    ///
    /// Returns [`VMError::UnknownExtensionOpcode`] if the name was never
    /// accepted as an extension.
    pub fn execute_extension(
        &self,
        name: &str,
        stack: &mut Stack,
        operand: Option<i32>,
    ) -> Result<(), VMError> {
        match self.descriptor(name).map(OpcodeDescriptor::kind) {
            Some(OpcodeKind::Extension(handler)) => handler(stack, operand),
            _ => Err(VMError::UnknownExtensionOpcode {
                name: name.to_string(),
            }),
        }
    }
}

/// Loads one candidate library and reads its four required exports.
fn load_extension_library(path: &Path) -> Result<(ExtensionSpec, Library), String> {
    // SAFETY: loading a library runs its initializers; extensions are trusted
    // code selected by the operator via the extensions directory.
    let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;

    let name_fn = *lookup::<RawNameFn>(&library, SYM_OPCODE_NAME)?;
    let value_fn = *lookup::<RawValueFn>(&library, SYM_OPCODE_VALUE)?;
    let has_operand_fn = *lookup::<RawHasOperandFn>(&library, SYM_HAS_OPERAND)?;
    let execute_fn = *lookup::<RawExecuteFn>(&library, SYM_EXECUTE)?;

    let name_ptr = unsafe { name_fn() };
    if name_ptr.is_null() {
        return Err("opcode name is null".to_string());
    }
    let name = unsafe { CStr::from_ptr(name_ptr) }
        .to_str()
        .map_err(|_| "opcode name is not valid UTF-8".to_string())?
        .to_string();
    let value = unsafe { value_fn() };
    let has_operand = unsafe { has_operand_fn() };

    let handler_name = name.trim().to_ascii_uppercase();
    let handler: ExtensionHandler = Box::new(move |stack, operand| {
        extension::invoke(execute_fn, &handler_name, stack, operand)
    });

    Ok((
        ExtensionSpec {
            name,
            value,
            has_operand,
            handler,
        },
        library,
    ))
}

/// Resolves one required export, reporting which binding is missing.
fn lookup<'lib, T>(
    library: &'lib Library,
    symbol: &[u8],
) -> Result<libloading::Symbol<'lib, T>, String> {
    // SAFETY: the symbol type is fixed by the extension ABI contract.
    unsafe { library.get::<T>(symbol) }
        .map_err(|_| format!("missing export `{}`", String::from_utf8_lossy(symbol)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_spec(name: &str, value: u8) -> ExtensionSpec {
        ExtensionSpec {
            name: name.to_string(),
            value,
            has_operand: false,
            handler: Box::new(|_, _| Ok(())),
        }
    }

    fn mod_spec() -> ExtensionSpec {
        ExtensionSpec {
            name: "MOD".to_string(),
            value: 0x10,
            has_operand: false,
            handler: Box::new(|stack, _| {
                let b = stack.pop()?;
                let a = stack.pop()?;
                if b == 0 {
                    return Err(VMError::DivisionByZero);
                }
                stack.push(a.rem_euclid(b));
                Ok(())
            }),
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = OpcodeRegistry::builtin();
        let opcodes = registry.get_opcodes();
        assert_eq!(opcodes.len(), 12);
        assert_eq!(opcodes["PUSH"], 0x01);
        assert_eq!(opcodes["HALT"], 0xFF);
        assert!(registry.descriptor_by_value(0x0B).is_some());
        assert!(registry.descriptor_by_value(0x10).is_none());
    }

    #[test]
    fn has_operand_is_case_insensitive() {
        let registry = OpcodeRegistry::builtin();
        assert!(registry.has_operand("PUSH").unwrap());
        assert!(registry.has_operand("push").unwrap());
        assert!(!registry.has_operand("Add").unwrap());
        assert!(matches!(
            registry.has_operand("NOSUCH"),
            Err(VMError::UnknownName { .. })
        ));
    }

    #[test]
    fn accepted_extension_is_queryable_and_executable() {
        let registry = OpcodeRegistry::with_extensions([mod_spec()]);
        assert!(registry.is_extension("MOD"));
        assert!(!registry.is_extension("PUSH"));
        assert_eq!(registry.get_opcodes()["MOD"], 0x10);

        let mut stack = Stack::new();
        stack.push(10);
        stack.push(3);
        registry.execute_extension("MOD", &mut stack, None).unwrap();
        assert_eq!(stack.peek().unwrap(), 1);
    }

    #[test]
    fn extension_name_is_canonicalized_uppercase() {
        let registry = OpcodeRegistry::with_extensions([noop_spec("depth", 0x18)]);
        assert!(registry.is_extension("DEPTH"));
        assert!(registry.is_extension("depth"));
        assert!(registry.get_opcodes().contains_key("DEPTH"));
    }

    #[test]
    fn rejects_reserved_builtin_value() {
        let registry = OpcodeRegistry::with_extensions([noop_spec("EXTRA", 0x05)]);
        assert!(!registry.is_extension("EXTRA"));
        // Built-in behavior is unaffected.
        assert_eq!(registry.descriptor_by_value(0x05).unwrap().name(), "MUL");
    }

    #[test]
    fn rejects_halt_value() {
        let registry = OpcodeRegistry::with_extensions([noop_spec("EXTRA", 0xFF)]);
        assert!(!registry.is_extension("EXTRA"));
        assert_eq!(registry.descriptor_by_value(0xFF).unwrap().name(), "HALT");
    }

    #[test]
    fn rejects_values_outside_extension_range() {
        for value in [0x00, 0x0C, 0x0F] {
            let registry = OpcodeRegistry::with_extensions([noop_spec("EXTRA", value)]);
            assert!(!registry.is_extension("EXTRA"), "0x{value:02x} accepted");
        }
    }

    #[test]
    fn rejects_name_collision_with_builtin() {
        // Value is fine; the name check alone rejects it.
        let registry = OpcodeRegistry::with_extensions([noop_spec("ADD", 0x10)]);
        assert!(!registry.is_extension("ADD"));
        assert!(!registry.has_operand("ADD").unwrap());
        assert!(registry.descriptor_by_value(0x10).is_none());
    }

    #[test]
    fn rejects_value_collision_between_extensions() {
        let registry = OpcodeRegistry::with_extensions([
            noop_spec("FIRST", 0x10),
            noop_spec("SECOND", 0x10),
        ]);
        assert!(registry.is_extension("FIRST"));
        assert!(!registry.is_extension("SECOND"));
    }

    #[test]
    fn rejects_name_collision_between_extensions() {
        let registry = OpcodeRegistry::with_extensions([
            noop_spec("TWIN", 0x10),
            noop_spec("twin", 0x11),
        ]);
        assert!(registry.is_extension("TWIN"));
        assert_eq!(registry.descriptor("TWIN").unwrap().value(), 0x10);
        assert!(registry.descriptor_by_value(0x11).is_none());
    }

    #[test]
    fn one_rejected_extension_does_not_block_others() {
        let registry = OpcodeRegistry::with_extensions([
            noop_spec("BAD", 0xFF),
            mod_spec(),
            noop_spec("NEG", 0x11),
        ]);
        assert!(!registry.is_extension("BAD"));
        assert!(registry.is_extension("MOD"));
        assert!(registry.is_extension("NEG"));
    }

    #[test]
    fn execute_extension_unknown_name_faults() {
        let registry = OpcodeRegistry::builtin();
        let mut stack = Stack::new();
        let err = registry
            .execute_extension("MOD", &mut stack, None)
            .unwrap_err();
        assert!(matches!(err, VMError::UnknownExtensionOpcode { ref name } if name == "MOD"));
    }

    #[test]
    fn execute_extension_rejects_builtin_name() {
        let registry = OpcodeRegistry::builtin();
        let mut stack = Stack::new();
        stack.push(1);
        let err = registry
            .execute_extension("PUSH", &mut stack, Some(5))
            .unwrap_err();
        assert!(matches!(err, VMError::UnknownExtensionOpcode { .. }));
    }

    #[test]
    fn discover_missing_directory_yields_builtins() {
        let registry = OpcodeRegistry::discover(Path::new("/nonexistent/extensions"));
        assert_eq!(registry.get_opcodes().len(), 12);
    }

    #[test]
    fn discover_skips_non_candidates_and_broken_libraries() {
        let dir = std::env::temp_dir().join(format!("stackm-discover-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let dll = std::env::consts::DLL_EXTENSION;
        std::fs::write(dir.join("notes.txt"), "not a library").unwrap();
        std::fs::write(dir.join(format!("_private.{dll}")), "ignored").unwrap();
        std::fs::write(dir.join(format!("broken.{dll}")), "not a real library").unwrap();

        let registry = OpcodeRegistry::discover(&dir);
        assert_eq!(registry.get_opcodes().len(), 12);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
