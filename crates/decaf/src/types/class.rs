//! Reference types and the per-run type store.
//!
//! Class and array types are interned into a [`TypeStore`] and addressed
//! by copyable ids, so the `Type` enum itself stays `Copy` and cross
//! references in the expression arena never dangle. The store is owned by
//! one decompilation run; nothing here is global.

use ahash::AHashMap;

use super::{Primitive, Type};
use crate::error::{DecompError, DecompResult};

/// Index of an interned class type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

/// Index of an interned array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(u32);

/// Index of an interned type-variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameId(u32);

/// Index of an interned wildcard bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundId(u32);

/// A class type parsed from its VM internal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassType {
    /// Fully qualified dotted name, e.g. `java.lang.String`.
    pub name: String,
    /// The last name segment. For anonymous classes this is
    /// `Enclosing$N`.
    pub simple_name: String,
    /// Simple name including enclosing class names.
    pub full_simple_name: String,
    /// Dotted package name, empty for the default package.
    pub package: String,
    /// Encoded descriptor form, e.g. `Ljava/lang/String;`.
    pub encoded_name: String,
    /// Generic arguments, empty for a raw type.
    pub parameters: Vec<Type>,
    pub enclosing: Option<ClassId>,
    pub is_nested: bool,
    pub is_anonymous: bool,
    pub is_package_info: bool,
}

/// An array type: innermost member type plus nesting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayType {
    /// The innermost non-array type.
    pub member: Type,
    /// Number of `[]` pairs, at least 1.
    pub nesting: u16,
}

/// Interner for the reference types of one decompilation run.
#[derive(Debug)]
pub struct TypeStore {
    classes: Vec<ClassType>,
    class_ids: AHashMap<(String, Vec<Type>), ClassId>,
    arrays: Vec<ArrayType>,
    array_ids: AHashMap<(Type, u16), ArrayId>,
    names: Vec<String>,
    bounds: Vec<Type>,
    object: ClassId,
    string: ClassId,
    class_class: ClassId,
    throwable: ClassId,
}

impl TypeStore {
    /// Creates a store with the handful of well-known classes pre-interned.
    pub fn new() -> Self {
        let mut store = Self {
            classes: Vec::new(),
            class_ids: AHashMap::new(),
            arrays: Vec::new(),
            array_ids: AHashMap::new(),
            names: Vec::new(),
            bounds: Vec::new(),
            object: ClassId(0),
            string: ClassId(0),
            class_class: ClassId(0),
            throwable: ClassId(0),
        };
        store.object = store.intern_class("java/lang/Object").expect("well-known class name");
        store.string = store.intern_class("java/lang/String").expect("well-known class name");
        store.class_class = store.intern_class("java/lang/Class").expect("well-known class name");
        store.throwable = store.intern_class("java/lang/Throwable").expect("well-known class name");
        store
    }

    pub fn object(&self) -> Type {
        Type::Class(self.object)
    }

    pub fn string(&self) -> Type {
        Type::Class(self.string)
    }

    pub fn class_class(&self) -> Type {
        Type::Class(self.class_class)
    }

    pub fn throwable(&self) -> Type {
        Type::Class(self.throwable)
    }

    pub fn is_object(&self, id: ClassId) -> bool {
        id == self.object
    }

    pub fn class(&self, id: ClassId) -> &ClassType {
        &self.classes[id.0 as usize]
    }

    pub fn array(&self, id: ArrayId) -> ArrayType {
        self.arrays[id.0 as usize]
    }

    pub fn type_var_name(&self, id: NameId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn bound(&self, id: BoundId) -> Type {
        self.bounds[id.0 as usize]
    }

    /// Interns a raw (non-generic) class from its internal name.
    pub fn intern_class(&mut self, internal_name: &str) -> DecompResult<ClassId> {
        self.intern_class_with_params(internal_name, Vec::new())
    }

    /// Interns a class with explicit generic arguments.
    pub fn intern_class_with_params(&mut self, internal_name: &str, parameters: Vec<Type>) -> DecompResult<ClassId> {
        let key = (internal_name.to_owned(), parameters.clone());
        if let Some(&id) = self.class_ids.get(&key) {
            return Ok(id);
        }
        let parsed = self.parse_class_name(internal_name)?;
        let id = ClassId(u32::try_from(self.classes.len()).expect("class count exceeds u32"));
        self.classes.push(ClassType { parameters, ..parsed });
        self.class_ids.insert(key, id);
        Ok(id)
    }

    /// Interns an array type, flattening nested arrays into one level count.
    pub fn intern_array(&mut self, member: Type, mut nesting: u16) -> Type {
        debug_assert!(nesting > 0, "array nesting cannot be zero");
        let mut member = member;
        if let Type::Array(inner) = member {
            let inner = self.array(inner);
            nesting += inner.nesting;
            member = inner.member;
        }
        let key = (member, nesting);
        if let Some(&id) = self.array_ids.get(&key) {
            return Type::Array(id);
        }
        let id = ArrayId(u32::try_from(self.arrays.len()).expect("array count exceeds u32"));
        self.arrays.push(ArrayType { member, nesting });
        self.array_ids.insert(key, id);
        Type::Array(id)
    }

    /// The element type of an array: one nesting level stripped.
    pub fn element_type(&mut self, id: ArrayId) -> Type {
        let array = self.array(id);
        if array.nesting == 1 {
            array.member
        } else {
            self.intern_array(array.member, array.nesting - 1)
        }
    }

    /// Interns a type-variable reference by name.
    pub fn intern_type_var(&mut self, name: &str) -> Type {
        if let Some(position) = self.names.iter().position(|n| n == name) {
            return Type::TypeVariable(NameId(u32::try_from(position).expect("name count exceeds u32")));
        }
        let id = NameId(u32::try_from(self.names.len()).expect("name count exceeds u32"));
        self.names.push(name.to_owned());
        Type::TypeVariable(id)
    }

    /// Interns a wildcard bound, returning its id.
    pub fn intern_bound(&mut self, bound: Type) -> BoundId {
        if let Some(position) = self.bounds.iter().position(|&b| b == bound) {
            return BoundId(u32::try_from(position).expect("bound count exceeds u32"));
        }
        let id = BoundId(u32::try_from(self.bounds.len()).expect("bound count exceeds u32"));
        self.bounds.push(bound);
        id
    }

    /// Parses a VM internal class name (`com/example/Outer$Inner`) into
    /// its components, validating the character set.
    fn parse_class_name(&mut self, internal_name: &str) -> DecompResult<ClassType> {
        let is_package_info = internal_name.ends_with("/package-info");
        let invalid = |at: usize| DecompError::InvalidClassName {
            name: internal_name.to_owned(),
            at,
        };

        if internal_name.is_empty() {
            return Err(invalid(0));
        }

        let mut name = String::with_capacity(internal_name.len());
        let mut name_start = 0usize;
        let mut package_end = 0usize;
        let mut enclosing_end = 0usize;

        for (i, ch) in internal_name.char_indices() {
            match ch {
                '/' => {
                    package_end = i;
                    name_start = i + 1;
                    name.push('.');
                }
                '$' => {
                    enclosing_end = i;
                    name_start = i + 1;
                    name.push('.');
                }
                '-' if is_package_info => name.push(ch),
                ';' | '<' | '\t' | '\n' | '\x0b' | '\x0c' | '\r' | ' ' | '!' | '"' | '#' | '%' | '&' | '\'' | '('
                | ')' | '*' | '+' | ',' | '.' | ':' | '=' | '?' | '@' | '[' | '\\' | ']' | '^' | '`' | '{' | '|'
                | '}' | '~' | '\x7f' | '-' => return Err(invalid(i)),
                _ => name.push(ch),
            }
        }

        let simple_name = name[name_start..].to_owned();
        let package = name[..package_end].to_owned();
        let encoded_name = format!("L{internal_name};");

        let mut class = ClassType {
            name: name.clone(),
            simple_name: simple_name.clone(),
            full_simple_name: simple_name.clone(),
            package,
            encoded_name,
            parameters: Vec::new(),
            enclosing: None,
            is_nested: false,
            is_anonymous: false,
            is_package_info,
        };

        if enclosing_end != 0 {
            class.is_nested = true;
            class.is_anonymous = !simple_name.is_empty() && simple_name.bytes().all(|b| b.is_ascii_digit());
            let enclosing_id = self.intern_class(&internal_name[..enclosing_end])?;
            let enclosing = self.class(enclosing_id);
            class.full_simple_name = format!(
                "{}{}{}",
                enclosing.full_simple_name,
                if class.is_anonymous { '$' } else { '.' },
                simple_name
            );
            if class.is_anonymous {
                // keep the `$` visible in the qualified and simple names
                class.name.replace_range(enclosing_end..=enclosing_end, "$");
                class.simple_name = format!("{}${}", enclosing.simple_name, simple_name);
            }
            class.enclosing = Some(enclosing_id);
        }

        Ok(class)
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower-camel-cases a class simple name for use as a variable stem.
pub(crate) fn to_lower_camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Variable-name stem for a type: primitive stems, camel-cased class
/// simple names, `...Array` for arrays.
pub fn var_name(ty: Type, store: &TypeStore) -> String {
    match ty {
        Type::Primitive(p) => p.var_name().to_owned(),
        Type::Integral(r) => r.reduced().var_name().to_owned(),
        Type::ExcludingBoolean => "e".to_owned(),
        Type::Any | Type::AnyObject => "o".to_owned(),
        Type::Class(id) => to_lower_camel_case(&store.class(id).simple_name),
        Type::Array(id) => {
            let array = store.array(id);
            match array.member {
                Type::Primitive(p) => format!("{}Array", p.name()),
                member => format!("{}Array", var_name(member, store)),
            }
        }
        Type::TypeVariable(id) => to_lower_camel_case(store.type_var_name(id)),
        Type::Wildcard | Type::WildcardExtends(_) | Type::WildcardSuper(_) => "o".to_owned(),
    }
}

impl Primitive {
    /// Default variable-name stem.
    pub fn var_name(self) -> &'static str {
        match self {
            Self::Void => "v",
            Self::Boolean => "bool",
            Self::Byte => "b",
            Self::Char => "c",
            Self::Short => "s",
            Self::Int => "n",
            Self::Long => "l",
            Self::Float => "f",
            Self::Double => "d",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_class() {
        let mut store = TypeStore::new();
        let id = store.intern_class("java/util/ArrayList").unwrap();
        let class = store.class(id);
        assert_eq!(class.name, "java.util.ArrayList");
        assert_eq!(class.simple_name, "ArrayList");
        assert_eq!(class.package, "java.util");
        assert_eq!(class.encoded_name, "Ljava/util/ArrayList;");
        assert!(!class.is_nested);
    }

    #[test]
    fn test_parse_nested_class() {
        let mut store = TypeStore::new();
        let id = store.intern_class("java/util/Map$Entry").unwrap();
        let class = store.class(id);
        assert_eq!(class.simple_name, "Entry");
        assert_eq!(class.full_simple_name, "Map.Entry");
        assert!(class.is_nested);
        assert!(!class.is_anonymous);
        let enclosing = store.class(class.enclosing.unwrap());
        assert_eq!(enclosing.simple_name, "Map");
    }

    #[test]
    fn test_parse_anonymous_class() {
        let mut store = TypeStore::new();
        let id = store.intern_class("com/example/Outer$1").unwrap();
        let class = store.class(id);
        assert!(class.is_anonymous);
        assert_eq!(class.simple_name, "Outer$1");
        assert_eq!(class.full_simple_name, "Outer$1");
        assert_eq!(class.name, "com.example.Outer$1");
    }

    #[test]
    fn test_invalid_class_name_rejected() {
        let mut store = TypeStore::new();
        assert!(matches!(
            store.intern_class("com/exa mple/Foo"),
            Err(DecompError::InvalidClassName { .. })
        ));
        assert!(store.intern_class("com/example/Foo-Bar").is_err());
    }

    #[test]
    fn test_package_info_allows_dash() {
        let mut store = TypeStore::new();
        assert!(store.intern_class("com/package-info/package-info").is_ok());
    }

    #[test]
    fn test_interning_returns_same_id() {
        let mut store = TypeStore::new();
        let a = store.intern_class("com/example/Foo").unwrap();
        let b = store.intern_class("com/example/Foo").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_array_flattening() {
        let mut store = TypeStore::new();
        let int_array = store.intern_array(Type::Primitive(Primitive::Int), 1);
        let nested = store.intern_array(int_array, 2);
        let Type::Array(id) = nested else {
            panic!("expected array")
        };
        assert_eq!(store.array(id).nesting, 3);
        assert_eq!(store.array(id).member, Type::Primitive(Primitive::Int));
    }

    #[test]
    fn test_var_name_stems() {
        let mut store = TypeStore::new();
        let list = store.intern_class("java/util/ArrayList").unwrap();
        assert_eq!(var_name(Type::Class(list), &store), "arrayList");
        let ints = store.intern_array(Type::Primitive(Primitive::Int), 1);
        assert_eq!(var_name(ints, &store), "intArray");
        assert_eq!(var_name(Type::Primitive(Primitive::Long), &store), "l");
    }
}
