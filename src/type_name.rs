//! Structure recovered from `std::any::type_name` strings.
//!
//! Rust has no runtime reflection, so the generic structure and origin of a
//! type are read back from its name. The format of `type_name` is not
//! guaranteed; parsing is best effort and never fails or panics on odd input.

use serde::{Deserialize, Serialize};

/// Shape of a type, from the leading syntax of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// A named type: struct, enum, union or primitive
    Path,
    /// `dyn Trait`
    TraitObject,
    /// `&T` or `&mut T`
    Reference,
    /// `*const T` or `*mut T`
    Pointer,
    /// `[T]` or `[T; N]`
    Slice,
    /// `(A, B, ..)`, including `()`
    Tuple,
    /// `fn(A) -> B`
    Function,
}

/// Parts of a type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNameParts {
    pub kind: TypeKind,
    /// Name with every path shortened to its last segment, e.g. `Vec<String>`
    pub short_name: String,
    /// Module path of a named type, e.g. `alloc::vec`
    pub module: Option<String>,
    /// First path segment of a named type, e.g. `alloc`
    pub crate_name: Option<String>,
    /// Path of the generic type a named type instantiates, e.g. `alloc::vec::Vec`
    pub generic_definition: Option<String>,
    /// Full names of the generic arguments, in order
    pub generic_arguments: Vec<String>,
}

/// Parses a `std::any::type_name` string.
///
/// # Examples
///
/// ```
/// use ferrous_whitebox::type_name::{parse_type_name, TypeKind};
///
/// let parts = parse_type_name("std::collections::hash::map::HashMap<alloc::string::String, u32>");
/// assert_eq!(parts.kind, TypeKind::Path);
/// assert_eq!(parts.short_name, "HashMap<String, u32>");
/// assert_eq!(parts.crate_name.as_deref(), Some("std"));
/// assert_eq!(parts.module.as_deref(), Some("std::collections::hash::map"));
/// assert_eq!(parts.generic_arguments, vec!["alloc::string::String", "u32"]);
///
/// let erased = parse_type_name("dyn app::Logger");
/// assert_eq!(erased.kind, TypeKind::TraitObject);
/// assert_eq!(erased.short_name, "dyn Logger");
/// ```
pub fn parse_type_name(name: &str) -> TypeNameParts {
    let name = name.trim();
    let kind = kind_of(name);
    let short_name = shorten_paths(name);

    let path = match kind {
        TypeKind::Path => name,
        TypeKind::TraitObject => name.strip_prefix("dyn ").unwrap_or(name).trim(),
        _ => {
            return TypeNameParts {
                kind,
                short_name,
                module: None,
                crate_name: None,
                generic_definition: None,
                generic_arguments: Vec::new(),
            }
        }
    };

    // Auto traits and lifetimes follow the principal trait
    let path = top_level_split(path, '+').into_iter().next().unwrap_or(path).trim();

    let (head, generic_arguments) = split_generics(path);
    let segments: Vec<&str> = head.split("::").collect();
    let (module, crate_name) = if segments.len() > 1 {
        (
            Some(segments[..segments.len() - 1].join("::")),
            segments.first().map(|s| s.to_string()),
        )
    } else {
        (None, None)
    };
    let generic_definition = if generic_arguments.is_empty() {
        None
    } else {
        Some(head.to_string())
    };

    TypeNameParts {
        kind,
        short_name,
        module,
        crate_name,
        generic_definition,
        generic_arguments,
    }
}

fn kind_of(name: &str) -> TypeKind {
    if name.starts_with("dyn ") {
        TypeKind::TraitObject
    } else if name.starts_with('&') {
        TypeKind::Reference
    } else if name.starts_with('*') {
        TypeKind::Pointer
    } else if name.starts_with('[') {
        TypeKind::Slice
    } else if name.starts_with('(') {
        TypeKind::Tuple
    } else if name.starts_with("fn(")
        || name.starts_with("unsafe ")
        || name.starts_with("extern ")
        || name.starts_with("for<")
    {
        TypeKind::Function
    } else {
        TypeKind::Path
    }
}

#[inline]
fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '{' | '}' | '#')
}

/// Replaces every path in `name` with its last segment.
///
/// ```
/// use ferrous_whitebox::type_name::shorten_paths;
///
/// assert_eq!(shorten_paths("core::option::Option<&alloc::string::String>"), "Option<&String>");
/// assert_eq!(shorten_paths("(u8, [app::Id; 4])"), "(u8, [Id; 4])");
/// ```
pub fn shorten_paths(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut token = String::new();
    for c in name.chars() {
        if is_path_char(c) {
            token.push(c);
        } else {
            push_last_segment(&mut out, &token);
            token.clear();
            out.push(c);
        }
    }
    push_last_segment(&mut out, &token);
    out
}

fn push_last_segment(out: &mut String, token: &str) {
    match token.rfind("::") {
        Some(pos) => out.push_str(&token[pos + 2..]),
        None => out.push_str(token),
    }
}

/// Splits `Path<A, B>` into `Path` and its top-level arguments. Names without
/// a well-formed trailing argument list come back whole.
fn split_generics(path: &str) -> (&str, Vec<String>) {
    let open = match path.find('<') {
        Some(open) => open,
        None => return (path, Vec::new()),
    };
    if !path.ends_with('>') || open + 1 > path.len() - 1 {
        return (path, Vec::new());
    }
    let inner = &path[open + 1..path.len() - 1];
    let arguments: Vec<String> = top_level_split(inner, ',')
        .into_iter()
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect();
    (&path[..open], arguments)
}

/// Splits on `separator` where it is not nested in brackets.
fn top_level_split(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut previous = '\0';
    for (index, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            // `->` in function types is not a closing bracket
            '>' if previous == '-' => {}
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
        previous = c;
    }
    parts.push(&text[start..]);
    parts
}
