//! Descriptor and signature parsing.
//!
//! Field descriptors (`I`, `[Ljava/lang/String;`), method descriptors
//! (`(IJ)V`) and the generic extensions of the signature grammar (type
//! arguments, type variables, wildcards, parameter declarations) all
//! parse through one byte cursor into [`Type`]s interned in the run's
//! [`TypeStore`].

use crate::{
    error::{DecompError, DecompResult},
    types::{Type, TypeStore},
};

/// Parsed method descriptor: argument types and return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// A generic parameter declaration, e.g. `T extends Number & Comparable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameter {
    pub name: String,
    pub bounds: Vec<Type>,
}

struct Cursor<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> DecompResult<u8> {
        let byte = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;
        Ok(byte)
    }

    fn eat(&mut self, expected: u8) -> DecompResult<()> {
        if self.bump()? == expected {
            Ok(())
        } else {
            self.pos -= 1;
            Err(self.error())
        }
    }

    fn take_until(&mut self, terminators: &[u8]) -> DecompResult<&'a str> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if terminators.contains(&byte) {
                return Ok(&self.source[start..self.pos]);
            }
            self.pos += 1;
        }
        Err(self.error())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn error(&self) -> DecompError {
        DecompError::InvalidDescriptor {
            descriptor: self.source.to_owned(),
            at: self.pos,
        }
    }
}

/// Parses a single field descriptor or signature type.
pub fn parse_type(store: &mut TypeStore, descriptor: &str) -> DecompResult<Type> {
    let mut cursor = Cursor::new(descriptor);
    let ty = type_from(&mut cursor, store)?;
    if cursor.at_end() { Ok(ty) } else { Err(cursor.error()) }
}

/// Parses a method descriptor `(args)ret`.
pub fn parse_method_descriptor(store: &mut TypeStore, descriptor: &str) -> DecompResult<MethodDescriptor> {
    let mut cursor = Cursor::new(descriptor);
    cursor.eat(b'(')?;
    let mut params = Vec::new();
    while cursor.peek() != Some(b')') {
        params.push(type_from(&mut cursor, store)?);
    }
    cursor.eat(b')')?;
    let ret = type_from(&mut cursor, store)?;
    if cursor.at_end() {
        Ok(MethodDescriptor { params, ret })
    } else {
        Err(cursor.error())
    }
}

/// Parses a generic parameter list `<T:bound(:bound)*...>`.
pub fn parse_generic_parameters(store: &mut TypeStore, signature: &str) -> DecompResult<Vec<GenericParameter>> {
    let mut cursor = Cursor::new(signature);
    cursor.eat(b'<')?;
    let mut parameters = Vec::new();
    while cursor.peek() != Some(b'>') {
        let name = cursor.take_until(&[b':'])?.to_owned();
        if name.is_empty() {
            return Err(cursor.error());
        }
        cursor.eat(b':')?;
        // an empty class bound (`T::Linterface;`) is legal
        let mut bounds = Vec::new();
        if cursor.peek() != Some(b':') {
            bounds.push(type_from(&mut cursor, store)?);
        }
        while cursor.peek() == Some(b':') {
            cursor.eat(b':')?;
            bounds.push(type_from(&mut cursor, store)?);
        }
        parameters.push(GenericParameter { name, bounds });
    }
    Ok(parameters)
}

fn type_from(cursor: &mut Cursor<'_>, store: &mut TypeStore) -> DecompResult<Type> {
    match cursor.bump()? {
        b'V' => Ok(Type::VOID),
        b'Z' => Ok(Type::BOOLEAN),
        b'B' => Ok(Type::BYTE),
        b'C' => Ok(Type::CHAR),
        b'S' => Ok(Type::SHORT),
        b'I' => Ok(Type::INT),
        b'J' => Ok(Type::LONG),
        b'F' => Ok(Type::FLOAT),
        b'D' => Ok(Type::DOUBLE),
        b'L' => class_from(cursor, store),
        b'T' => {
            let name = cursor.take_until(&[b';'])?.to_owned();
            cursor.eat(b';')?;
            if name.is_empty() {
                return Err(cursor.error());
            }
            Ok(store.intern_type_var(&name))
        }
        b'[' => {
            let mut nesting: u16 = 1;
            while cursor.peek() == Some(b'[') {
                cursor.pos += 1;
                nesting += 1;
            }
            let member = type_from(cursor, store)?;
            Ok(store.intern_array(member, nesting))
        }
        _ => {
            cursor.pos -= 1;
            Err(cursor.error())
        }
    }
}

fn class_from(cursor: &mut Cursor<'_>, store: &mut TypeStore) -> DecompResult<Type> {
    let name = cursor.take_until(&[b';', b'<'])?.to_owned();
    let mut parameters = Vec::new();
    if cursor.peek() == Some(b'<') {
        cursor.pos += 1;
        while cursor.peek() != Some(b'>') {
            parameters.push(type_argument(cursor, store)?);
        }
        cursor.eat(b'>')?;
    }
    cursor.eat(b';')?;
    let id = store.intern_class_with_params(&name, parameters)?;
    Ok(Type::Class(id))
}

fn type_argument(cursor: &mut Cursor<'_>, store: &mut TypeStore) -> DecompResult<Type> {
    match cursor.peek() {
        Some(b'*') => {
            cursor.pos += 1;
            Ok(Type::Wildcard)
        }
        Some(b'+') => {
            cursor.pos += 1;
            let bound = type_from(cursor, store)?;
            Ok(Type::WildcardExtends(store.intern_bound(bound)))
        }
        Some(b'-') => {
            cursor.pos += 1;
            let bound = type_from(cursor, store)?;
            Ok(Type::WildcardSuper(store.intern_bound(bound)))
        }
        _ => type_from(cursor, store),
    }
}
