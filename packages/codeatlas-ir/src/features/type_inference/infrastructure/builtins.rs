//! Builtin method return-type table
//!
//! Receiver type + method name → return type. Parametric receivers
//! (`list[int]`, `dict[str, int]`) resolve element templates: `T` is the
//! element type, `K`/`V` the dict key and value types.

use std::collections::HashMap;

#[derive(Debug)]
pub struct BuiltinMethodTable {
    /// (receiver base, method) → return type template
    methods: HashMap<(&'static str, &'static str), &'static str>,
    constructors: HashMap<&'static str, &'static str>,
}

impl BuiltinMethodTable {
    pub fn standard() -> Self {
        let mut methods = HashMap::new();

        // str
        for m in ["upper", "lower", "strip", "lstrip", "rstrip", "replace", "join", "format", "title", "capitalize"] {
            methods.insert(("str", m), "str");
        }
        methods.insert(("str", "split"), "list[str]");
        methods.insert(("str", "splitlines"), "list[str]");
        methods.insert(("str", "encode"), "bytes");
        methods.insert(("str", "startswith"), "bool");
        methods.insert(("str", "endswith"), "bool");
        methods.insert(("str", "find"), "int");
        methods.insert(("str", "index"), "int");
        methods.insert(("str", "count"), "int");

        // bytes
        methods.insert(("bytes", "decode"), "str");
        methods.insert(("bytes", "hex"), "str");

        // list
        methods.insert(("list", "pop"), "T");
        methods.insert(("list", "copy"), "list[T]");
        methods.insert(("list", "count"), "int");
        methods.insert(("list", "index"), "int");
        methods.insert(("list", "append"), "None");
        methods.insert(("list", "extend"), "None");
        methods.insert(("list", "sort"), "None");
        methods.insert(("list", "reverse"), "None");

        // dict
        methods.insert(("dict", "get"), "V");
        methods.insert(("dict", "pop"), "V");
        methods.insert(("dict", "keys"), "list[K]");
        methods.insert(("dict", "values"), "list[V]");
        methods.insert(("dict", "copy"), "dict[K, V]");
        methods.insert(("dict", "setdefault"), "V");

        // set
        methods.insert(("set", "pop"), "T");
        methods.insert(("set", "copy"), "set[T]");
        methods.insert(("set", "add"), "None");
        methods.insert(("set", "union"), "set[T]");
        methods.insert(("set", "intersection"), "set[T]");

        let mut constructors = HashMap::new();
        for (name, ty) in [
            ("str", "str"),
            ("int", "int"),
            ("float", "float"),
            ("bool", "bool"),
            ("list", "list"),
            ("dict", "dict"),
            ("set", "set"),
            ("tuple", "tuple"),
            ("frozenset", "frozenset"),
            ("bytes", "bytes"),
            ("len", "int"),
            ("abs", "int"),
            ("sorted", "list"),
            ("repr", "str"),
            ("input", "str"),
        ] {
            constructors.insert(name, ty);
        }

        Self {
            methods,
            constructors,
        }
    }

    /// Return type of `receiver.method()`, resolving parametric templates
    /// against the receiver's type arguments.
    pub fn lookup(&self, receiver_type: &str, method: &str) -> Option<String> {
        let (base, args) = split_parametric(receiver_type);
        let template = self.methods.get(&(base, method))?;
        Some(resolve_template(template, base, &args))
    }

    /// Return type of a builtin constructor or function call.
    pub fn constructor(&self, name: &str) -> Option<String> {
        self.constructors.get(name).map(|t| t.to_string())
    }
}

/// Split `dict[str, int]` into ("dict", ["str", "int"]).
fn split_parametric(ty: &str) -> (&str, Vec<String>) {
    match ty.split_once('[') {
        Some((base, rest)) => {
            let inner = rest.strip_suffix(']').unwrap_or(rest);
            let args = inner
                .split(',')
                .map(|a| a.trim().trim_end_matches(" ...").trim().to_string())
                .filter(|a| !a.is_empty() && a != "...")
                .collect();
            (base, args)
        }
        None => (ty, Vec::new()),
    }
}

fn resolve_template(template: &str, base: &str, args: &[String]) -> String {
    let element = args.first().map(String::as_str);
    let key = if base == "dict" { element } else { None };
    let value = if base == "dict" {
        args.get(1).map(String::as_str)
    } else {
        None
    };

    let mut out = template.to_string();
    if base == "dict" {
        out = substitute(&out, "K", key);
        out = substitute(&out, "V", value);
    } else {
        out = substitute(&out, "T", element);
    }
    out
}

fn substitute(template: &str, param: &str, concrete: Option<&str>) -> String {
    match concrete {
        Some(c) => {
            if template == param {
                c.to_string()
            } else {
                template.replace(param, c)
            }
        }
        // Unparameterized receiver degrades to the bare container
        None => {
            if template == param {
                "Any".to_string()
            } else if template.contains(param) {
                template.split('[').next().unwrap_or(template).to_string()
            } else {
                template.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_methods() {
        let table = BuiltinMethodTable::standard();
        assert_eq!(table.lookup("str", "upper").as_deref(), Some("str"));
        assert_eq!(table.lookup("str", "split").as_deref(), Some("list[str]"));
        assert_eq!(table.lookup("str", "startswith").as_deref(), Some("bool"));
    }

    #[test]
    fn test_parametric_list() {
        let table = BuiltinMethodTable::standard();
        assert_eq!(table.lookup("list[int]", "pop").as_deref(), Some("int"));
        assert_eq!(
            table.lookup("list[int]", "copy").as_deref(),
            Some("list[int]")
        );
        assert_eq!(table.lookup("list[int]", "append").as_deref(), Some("None"));
    }

    #[test]
    fn test_parametric_dict() {
        let table = BuiltinMethodTable::standard();
        assert_eq!(
            table.lookup("dict[str, int]", "get").as_deref(),
            Some("int")
        );
        assert_eq!(
            table.lookup("dict[str, int]", "keys").as_deref(),
            Some("list[str]")
        );
    }

    #[test]
    fn test_unknown_method() {
        let table = BuiltinMethodTable::standard();
        assert!(table.lookup("str", "frobnicate").is_none());
        assert!(table.lookup("CustomClass", "upper").is_none());
    }

    #[test]
    fn test_constructors() {
        let table = BuiltinMethodTable::standard();
        assert_eq!(table.constructor("int").as_deref(), Some("int"));
        assert_eq!(table.constructor("input").as_deref(), Some("str"));
        assert!(table.constructor("custom").is_none());
    }
}
