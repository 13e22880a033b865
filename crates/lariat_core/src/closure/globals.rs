//! Default ambient-global table for Node-style host runtimes.
//!
//! The analyzer itself takes the ambient-global predicate from the caller;
//! this table is the convenience default used by the CLI and FFI surfaces.

/// Ambient globals of a Node-style host runtime, plus the helpers that
/// compilers lower `async`/generator syntax into (those live in the emitted
/// module's ambient scope).
const NODE_GLOBALS: &[&str] = &[
    "AggregateError",
    "Array",
    "ArrayBuffer",
    "Atomics",
    "BigInt",
    "BigInt64Array",
    "BigUint64Array",
    "Boolean",
    "Buffer",
    "DataView",
    "Date",
    "Error",
    "EvalError",
    "Float32Array",
    "Float64Array",
    "Function",
    "Infinity",
    "Int16Array",
    "Int32Array",
    "Int8Array",
    "JSON",
    "Map",
    "Math",
    "NaN",
    "Number",
    "Object",
    "Promise",
    "Proxy",
    "RangeError",
    "ReferenceError",
    "Reflect",
    "RegExp",
    "Set",
    "SharedArrayBuffer",
    "String",
    "Symbol",
    "SyntaxError",
    "TextDecoder",
    "TextEncoder",
    "TypeError",
    "URIError",
    "URL",
    "URLSearchParams",
    "Uint16Array",
    "Uint32Array",
    "Uint8Array",
    "Uint8ClampedArray",
    "WeakMap",
    "WeakRef",
    "WeakSet",
    "__awaiter",
    "__generator",
    "clearImmediate",
    "clearInterval",
    "clearTimeout",
    "console",
    "decodeURI",
    "decodeURIComponent",
    "encodeURI",
    "encodeURIComponent",
    "eval",
    "fetch",
    "global",
    "globalThis",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "process",
    "queueMicrotask",
    "setImmediate",
    "setInterval",
    "setTimeout",
    "structuredClone",
    "undefined",
];

/// Returns `true` when `name` is an ambient global of a Node-style host.
pub fn is_node_global(name: &str) -> bool {
    NODE_GLOBALS.binary_search(&name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted_for_binary_search() {
        assert!(NODE_GLOBALS.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_known_globals() {
        assert!(is_node_global("console"));
        assert!(is_node_global("JSON"));
        assert!(is_node_global("undefined"));
        assert!(is_node_global("__awaiter"));
    }

    #[test]
    fn test_unknown_names() {
        assert!(!is_node_global("myVariable"));
        assert!(!is_node_global("require"));
    }
}
