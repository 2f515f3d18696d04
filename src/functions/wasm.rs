//! WebAssembly-backed handler units
//!
//! Calling convention for a capability export `get|post|patch|put|delete`:
//!
//! - signature `(ptr: i32, len: i32) -> i64`
//! - when the module exports `alloc(len: i32) -> i32`, the JSON request
//!   envelope is written at the returned pointer and passed as `(ptr, len)`;
//!   otherwise the capability receives `(0, 0)`
//! - the result packs the response body location as `(ptr << 32) | len`
//!   within the exported `memory`
//!
//! Each invocation runs in a fresh instance; nothing is shared between calls.

use std::collections::HashMap;
use wasmer::{imports, Engine, ExternType, Instance, Module, Store, Type, TypedFunction};

use super::unit::{HandlerError, HandlerRequest, HandlerResponse, HandlerUnit, Verb};
use crate::logger;

const ALLOC_EXPORT: &str = "alloc";
const MEMORY_EXPORT: &str = "memory";

/// Reasons a handler unit cannot be loaded
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read handler unit: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to compile handler unit: {0}")]
    Compile(String),
    #[error("failed to instantiate handler unit: {0}")]
    Instantiate(String),
}

/// Engine shared by every unit loaded in this process
pub fn default_engine() -> Engine {
    Store::default().engine().clone()
}

/// A compiled handler unit
pub struct WasmUnit {
    name: String,
    engine: Engine,
    module: Module,
    verbs: Vec<Verb>,
}

impl WasmUnit {
    /// Compile `source` (WAT text or wasm binary) and inspect its exports.
    ///
    /// A trial instantiation rejects modules whose imports cannot be
    /// satisfied, so such units never produce routes.
    pub fn load(engine: &Engine, name: &str, source: &[u8]) -> Result<Self, LoadError> {
        let module = Module::new(engine, source).map_err(|e| LoadError::Compile(e.to_string()))?;

        let mut store = Store::new(engine.clone());
        Instance::new(&mut store, &module, &imports! {})
            .map_err(|e| LoadError::Instantiate(e.to_string()))?;

        let verbs = exported_verbs(name, &module);
        Ok(Self {
            name: name.to_string(),
            engine: engine.clone(),
            module,
            verbs,
        })
    }
}

/// Verbs whose export exists with the capability signature
fn exported_verbs(name: &str, module: &Module) -> Vec<Verb> {
    let exports: HashMap<String, ExternType> = module
        .exports()
        .map(|export| (export.name().to_string(), export.ty().clone()))
        .collect();

    Verb::ALL
        .into_iter()
        .filter(|verb| match exports.get(verb.export_name()) {
            Some(ExternType::Function(ty))
                if ty.params() == [Type::I32, Type::I32] && ty.results() == [Type::I64] =>
            {
                true
            }
            Some(other) => {
                logger::log_warning(&format!(
                    "Ignoring export '{}' of '{name}': expected (i32, i32) -> i64, found {other:?}",
                    verb.export_name()
                ));
                false
            }
            None => false,
        })
        .collect()
}

#[allow(clippy::cast_sign_loss)]
const fn guest_offset(ptr: i32) -> u64 {
    ptr as u32 as u64
}

/// Split a packed `(ptr << 32) | len` result
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
const fn unpack(packed: i64) -> (u64, usize) {
    let raw = packed as u64;
    (raw >> 32, (raw & 0xffff_ffff) as usize)
}

impl HandlerUnit for WasmUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    fn invoke(
        &self,
        verb: Verb,
        request: &HandlerRequest,
    ) -> Result<HandlerResponse, HandlerError> {
        if !self.verbs.contains(&verb) {
            return Err(HandlerError::MissingCapability {
                endpoint: self.name.clone(),
                verb,
            });
        }

        let mut store = Store::new(self.engine.clone());
        let instance = Instance::new(&mut store, &self.module, &imports! {})
            .map_err(|e| HandlerError::Trap(e.to_string()))?;
        let handler: TypedFunction<(i32, i32), i64> = instance
            .exports
            .get_typed_function(&store, verb.export_name())
            .map_err(|e| HandlerError::Abi(e.to_string()))?;

        let (ptr, len) = match instance
            .exports
            .get_typed_function::<i32, i32>(&store, ALLOC_EXPORT)
        {
            Ok(alloc) => {
                let payload =
                    serde_json::to_vec(request).map_err(|e| HandlerError::Abi(e.to_string()))?;
                let len = i32::try_from(payload.len())
                    .map_err(|_| HandlerError::Abi("request envelope too large".to_string()))?;
                let ptr = alloc
                    .call(&mut store, len)
                    .map_err(|e| HandlerError::Trap(e.to_string()))?;
                let memory = instance
                    .exports
                    .get_memory(MEMORY_EXPORT)
                    .map_err(|e| HandlerError::Abi(e.to_string()))?;
                memory
                    .view(&store)
                    .write(guest_offset(ptr), &payload)
                    .map_err(|e| HandlerError::Abi(format!("writing request: {e}")))?;
                (ptr, len)
            }
            Err(_) => (0, 0),
        };

        let packed = handler
            .call(&mut store, ptr, len)
            .map_err(|e| HandlerError::Trap(e.to_string()))?;

        let (out_ptr, out_len) = unpack(packed);
        let memory = instance
            .exports
            .get_memory(MEMORY_EXPORT)
            .map_err(|e| HandlerError::Abi(e.to_string()))?;
        let view = memory.view(&store);
        // Checked before allocating: the length comes from the guest
        let in_bounds = u64::try_from(out_len)
            .ok()
            .and_then(|len| out_ptr.checked_add(len))
            .is_some_and(|end| end <= view.data_size());
        if !in_bounds {
            return Err(HandlerError::Abi(format!(
                "response {out_ptr}+{out_len} exceeds memory of {} bytes",
                view.data_size()
            )));
        }
        let mut body = vec![0u8; out_len];
        view.read(out_ptr, &mut body)
            .map_err(|e| HandlerError::Abi(format!("reading response: {e}")))?;

        Ok(HandlerResponse::from_body(body))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Inline WAT handler units shared by tests across the crate

    /// GET returns the JSON string "hello"
    pub const HELLO: &str = r#"(module
  (memory (export "memory") 1)
  (data (i32.const 16) "\"hello\"")
  (func (export "get") (param i32 i32) (result i64)
    i64.const 68719476743))"#;

    /// POST echoes the request envelope back
    pub const ECHO: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "alloc") (param i32) (result i32)
    i32.const 1024)
  (func (export "post") (param i32 i32) (result i64)
    local.get 0
    i64.extend_i32_u
    i64.const 32
    i64.shl
    local.get 1
    i64.extend_i32_u
    i64.or))"#;

    /// GET traps
    pub const TRAP: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "get") (param i32 i32) (result i64)
    unreachable))"#;

    /// Valid module with no capability exports
    pub const NO_VERBS: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "helper") (result i32)
    i32.const 1))"#;

    /// Needs an import the host does not provide
    pub const MISSING_IMPORT: &str = r#"(module
  (import "env" "requests" (func $requests (result i32)))
  (memory (export "memory") 1)
  (func (export "get") (param i32 i32) (result i64)
    i64.const 0))"#;

    /// GET claims a 2 GiB response from a single 64 KiB page
    pub const OVERSIZED: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "get") (param i32 i32) (result i64)
    i64.const 2147483647))"#;

    pub const SYNTAX_ERROR: &str = "(module (func (export \"get\"";
}
