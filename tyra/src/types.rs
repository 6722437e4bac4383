//! The closed type grammar of the typed IR.
//!
//! Every resolved type is normalized: unions are flattened and
//! deduplicated on construction, and the textual form produced by
//! `Display` is exactly the form `Type::parse` accepts (the annotation
//! grammar of the external parser contract, e.g. `list[int64]`,
//! `str|none`).

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Integer width and signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl IntKind {
    pub fn bits(self) -> u8 {
        match self {
            IntKind::I8 | IntKind::U8 => 8,
            IntKind::I16 | IntKind::U16 => 16,
            IntKind::I32 | IntKind::U32 => 32,
            IntKind::I64 | IntKind::U64 => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, IntKind::I8 | IntKind::I16 | IntKind::I32 | IntKind::I64)
    }

    pub fn name(self) -> &'static str {
        match self {
            IntKind::I8 => "int8",
            IntKind::U8 => "uint8",
            IntKind::I16 => "int16",
            IntKind::U16 => "uint16",
            IntKind::I32 => "int32",
            IntKind::U32 => "uint32",
            IntKind::I64 => "int64",
            IntKind::U64 => "uint64",
        }
    }

    fn from_name(name: &str) -> Option<IntKind> {
        Some(match name {
            "int8" => IntKind::I8,
            "uint8" => IntKind::U8,
            "int16" => IntKind::I16,
            "uint16" => IntKind::U16,
            "int32" => IntKind::I32,
            "uint32" => IntKind::U32,
            "int64" => IntKind::I64,
            "uint64" => IntKind::U64,
            _ => return None,
        })
    }
}

/// A normalized type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Int(IntKind),
    Float32,
    Float64,
    Str,
    Bytes,
    /// The none value's type; a union with `None` models optionality
    None,
    /// Filesystem path; `/` on a path-like left operand is path-join
    Path,
    List(Box<Type>),
    Set(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Tuple(Vec<Type>),
    /// User-defined class type, by schema name
    Class(String),
    /// Dynamic type produced by inference when nothing better is known
    Unknown,
    /// Dynamic type declared by the user (`any` / `object`)
    Object,
    /// Ordered, deduplicated, non-nested union
    Union(Vec<Type>),
}

impl Type {
    pub const INT64: Type = Type::Int(IntKind::I64);
    pub const UINT64: Type = Type::Int(IntKind::U64);
    pub const UINT8: Type = Type::Int(IntKind::U8);

    /// Build a union, flattening nested unions and deduplicating while
    /// preserving first-occurrence order. A single remaining member
    /// collapses to that member.
    pub fn union(members: Vec<Type>) -> Type {
        let mut flat: Vec<Type> = Vec::new();
        for m in members {
            match m {
                Type::Union(inner) => {
                    for t in inner {
                        if !flat.contains(&t) {
                            flat.push(t);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.pop() {
            Some(only) if flat.is_empty() => only,
            Some(last) => {
                flat.push(last);
                Type::Union(flat)
            }
            Option::None => Type::Union(flat),
        }
    }

    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn set(elem: Type) -> Type {
        Type::Set(Box::new(elem))
    }

    pub fn dict(key: Type, value: Type) -> Type {
        Type::Dict(Box::new(key), Box::new(value))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float32 | Type::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_int() || self.is_float()
    }

    /// `unknown`, `any` and `object` all cross the dynamic boundary
    pub fn is_any_like(&self) -> bool {
        matches!(self, Type::Unknown | Type::Object)
    }

    /// Element type observed when iterating a value of this type
    pub fn iter_element(&self) -> Option<Type> {
        match self {
            Type::List(t) | Type::Set(t) => Some((**t).clone()),
            // dict iteration yields keys
            Type::Dict(k, _) => Some((**k).clone()),
            Type::Tuple(items) => items.first().cloned(),
            Type::Str => Some(Type::Str),
            Type::Bytes => Some(Type::UINT8),
            Type::Unknown | Type::Object => Some(Type::Unknown),
            _ => Option::None,
        }
    }

    /// Compatibility for rebinding and annotated assignment: equal
    /// types, any-like on either side, numeric on both sides, or
    /// membership in a union.
    pub fn compatible(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        if self.is_any_like() || other.is_any_like() {
            return true;
        }
        if self.is_numeric() && other.is_numeric() {
            return true;
        }
        if let Type::Union(members) = self {
            return members.iter().any(|m| m.compatible(other));
        }
        if let Type::Union(members) = other {
            return members.iter().any(|m| self.compatible(m));
        }
        false
    }

    /// Unify the types of the members of one container literal.
    /// Mismatched integer widths widen to 64 bits (signed wins over
    /// unsigned); mixed numeric kinds widen to `float64`.
    pub fn unify_all(types: &[Type]) -> Option<Type> {
        let first = types.first()?;
        if types.iter().all(|t| t == first) {
            return Some(first.clone());
        }
        if types.iter().all(Type::is_int) {
            return Some(unify_int_widths(types));
        }
        if types.iter().all(Type::is_numeric) {
            return Some(Type::Float64);
        }
        Option::None
    }

    /// Parse the normalized textual form. Returns `None` for text
    /// outside the grammar.
    pub fn parse(text: &str) -> Option<Type> {
        let text = text.trim();
        if text.is_empty() {
            return Option::None;
        }
        // Union split at top bracket depth
        let mut depth = 0usize;
        let mut parts: Vec<&str> = Vec::new();
        let mut last = 0usize;
        for (i, c) in text.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.checked_sub(1)?,
                '|' if depth == 0 => {
                    parts.push(&text[last..i]);
                    last = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Option::None;
        }
        if !parts.is_empty() {
            parts.push(&text[last..]);
            let members = parts
                .iter()
                .map(|p| Type::parse(p))
                .collect::<Option<Vec<Type>>>()?;
            return Some(Type::union(members));
        }
        parse_single(text)
    }
}

fn unify_int_widths(types: &[Type]) -> Type {
    let any_signed = types.iter().any(|t| match t {
        Type::Int(k) => k.is_signed(),
        _ => false,
    });
    if any_signed { Type::INT64 } else { Type::UINT64 }
}

fn parse_single(text: &str) -> Option<Type> {
    if let Some(open) = text.find('[') {
        if !text.ends_with(']') {
            return Option::None;
        }
        let base = text[..open].trim();
        let inner = &text[open + 1..text.len() - 1];
        let mut args = split_top_commas(inner)?
            .iter()
            .map(|a| Type::parse(a))
            .collect::<Option<Vec<Type>>>()?;
        return match (base, args.len()) {
            ("list", 1) => args.pop().map(Type::list),
            ("set", 1) => args.pop().map(Type::set),
            ("dict", 2) => {
                let v = args.pop()?;
                let k = args.pop()?;
                Some(Type::dict(k, v))
            }
            ("tuple", _) => Some(Type::Tuple(args)),
            _ => Option::None,
        };
    }
    let t = match text {
        "bool" => Type::Bool,
        "int" | "int64" => Type::INT64,
        "float" | "float64" => Type::Float64,
        "float32" => Type::Float32,
        "str" => Type::Str,
        "bytes" => Type::Bytes,
        "none" | "None" | "NoneType" => Type::None,
        "path" | "Path" => Type::Path,
        "unknown" => Type::Unknown,
        "any" | "object" => Type::Object,
        name => {
            if let Some(k) = IntKind::from_name(name) {
                Type::Int(k)
            } else if is_class_name(name) {
                Type::Class(name.to_string())
            } else {
                return Option::None;
            }
        }
    };
    Some(t)
}

fn is_class_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_top_commas(text: &str) -> Option<Vec<&str>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut last = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                out.push(&text[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Option::None;
    }
    out.push(&text[last..]);
    Some(out)
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int(k) => write!(f, "{}", k.name()),
            Type::Float32 => write!(f, "float32"),
            Type::Float64 => write!(f, "float64"),
            Type::Str => write!(f, "str"),
            Type::Bytes => write!(f, "bytes"),
            Type::None => write!(f, "none"),
            Type::Path => write!(f, "path"),
            Type::List(t) => write!(f, "list[{t}]"),
            Type::Set(t) => write!(f, "set[{t}]"),
            Type::Dict(k, v) => write!(f, "dict[{k},{v}]"),
            Type::Tuple(items) => {
                write!(f, "tuple[")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
            Type::Class(name) => write!(f, "{name}"),
            Type::Unknown => write!(f, "unknown"),
            Type::Object => write!(f, "object"),
            Type::Union(members) => {
                for (i, t) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
        }
    }
}

// Types travel as their textual form in the IR artifact.
impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Type::parse(&text).ok_or_else(|| D::Error::custom(format!("invalid type text: {text}")))
    }
}
