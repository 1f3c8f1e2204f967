//! The type lattice.
//!
//! Types form a lattice with [`Type::Any`] at the top. Alongside the VM's
//! primitives and reference types it contains inference placeholders:
//! capacity intervals ([`IntegralRange`]) for integer values whose width
//! the bytecode does not record, [`Type::AnyObject`] for `null`, and
//! [`Type::ExcludingBoolean`] for contexts that accept anything but
//! `boolean`. The cast operations narrow placeholders toward concrete
//! types; narrowing is monotone, so refining a shared expression node is
//! safe no matter how many stack slots alias it.

mod class;
mod intern;

pub use class::{ArrayId, ArrayType, BoundId, ClassId, ClassType, NameId, TypeStore, var_name};
pub use intern::{
    ANY_INT, ANY_INT_OR_BOOLEAN, ANY_SIGNED_INT, BYTE_OR_BOOLEAN, CHAR_CAPACITY, CHAR_OR_INT, CHAR_OR_SHORT_OR_INT,
    INT_OR_BOOLEAN, IntegralRange, SHORT_OR_INT,
};

use strum::{Display, IntoStaticStr};

/// Stack-slot footprint of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSize {
    Zero,
    Four,
    Eight,
}

/// The VM's primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Primitive {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    /// One-letter descriptor encoding.
    pub fn encoded_name(self) -> char {
        match self {
            Self::Void => 'V',
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    /// Source-level name.
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn size(self) -> TypeSize {
        match self {
            Self::Void => TypeSize::Zero,
            Self::Long | Self::Double => TypeSize::Eight,
            _ => TypeSize::Four,
        }
    }

    /// Capacity in bytes for the integral subfamily.
    pub fn integral_capacity(self) -> Option<u8> {
        match self {
            Self::Byte => Some(1),
            Self::Short => Some(2),
            Self::Int => Some(4),
            Self::Long => Some(8),
            _ => None,
        }
    }

    /// Capacity for the types a capacity interval can contain. `long`
    /// lives outside intervals: widening to it is always explicit.
    fn interval_capacity(self) -> Option<u8> {
        match self {
            Self::Byte => Some(1),
            Self::Short => Some(2),
            Self::Int => Some(4),
            _ => None,
        }
    }

    /// The widest interval a value of this primitive type may stand for
    /// when it reaches the untyped operand stack.
    pub fn to_variable_capacity(self) -> Type {
        match self {
            Self::Byte => Type::Integral(ANY_INT),
            Self::Char => Type::Integral(CHAR_OR_INT),
            Self::Short => Type::Integral(SHORT_OR_INT),
            _ => Type::Primitive(self),
        }
    }
}

/// How an implicit conversion between two types behaves in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastStatus {
    /// Identical types, nothing to emit.
    Same,
    /// Widening conversion, implicit in source.
    Extend,
    /// Narrowing conversion, requires an explicit cast.
    Narrow,
    /// Conversion that narrows and re-extends (`byte` to `char`), requires
    /// an explicit cast.
    NarrowExtend,
    /// No conversion exists.
    Incompatible,
}

/// A node in the type lattice. `Copy`: reference types are ids into the
/// run's [`TypeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    /// Capacity interval: an integral value of not-yet-known width.
    Integral(IntegralRange),
    /// Anything except `boolean`; required type of the ordering compares.
    ExcludingBoolean,
    /// Top of the lattice.
    Any,
    /// Top of the reference types; the type of `null`.
    AnyObject,
    Class(ClassId),
    Array(ArrayId),
    /// A named type variable from a generic signature.
    TypeVariable(NameId),
    /// `?`
    Wildcard,
    /// `? extends T`
    WildcardExtends(BoundId),
    /// `? super T`
    WildcardSuper(BoundId),
}

impl Type {
    pub const VOID: Self = Self::Primitive(Primitive::Void);
    pub const BOOLEAN: Self = Self::Primitive(Primitive::Boolean);
    pub const BYTE: Self = Self::Primitive(Primitive::Byte);
    pub const CHAR: Self = Self::Primitive(Primitive::Char);
    pub const SHORT: Self = Self::Primitive(Primitive::Short);
    pub const INT: Self = Self::Primitive(Primitive::Int);
    pub const LONG: Self = Self::Primitive(Primitive::Long);
    pub const FLOAT: Self = Self::Primitive(Primitive::Float);
    pub const DOUBLE: Self = Self::Primitive(Primitive::Double);

    /// Stack-slot footprint.
    pub fn size(self) -> TypeSize {
        match self {
            Self::Primitive(p) => p.size(),
            _ => TypeSize::Four,
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    /// Reference types: classes, arrays, type variables, wildcards.
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            Self::Class(_) | Self::Array(_) | Self::TypeVariable(_) | Self::Wildcard | Self::WildcardExtends(_) | Self::WildcardSuper(_)
        )
    }

    /// Inference placeholders, as opposed to types a descriptor can name.
    pub fn is_special(self) -> bool {
        matches!(self, Self::Integral(_) | Self::ExcludingBoolean | Self::Any | Self::AnyObject)
    }

    /// Reflexive subtype relation. Primitive integrals follow the VM
    /// widening order, arrays are covariant, every reference is below
    /// `Object`, and `Any` sits at the top.
    pub fn is_subtype_of(self, other: Self, store: &TypeStore) -> bool {
        if self == other || matches!(other, Self::Any) || matches!(self, Self::Any) {
            return true;
        }
        match self {
            Self::Primitive(p) => match other {
                Self::Primitive(q) => primitive_subtype(p, q),
                _ => false,
            },
            Self::Integral(r) => match other {
                Self::Primitive(Primitive::Boolean) => r.include_boolean,
                Self::Primitive(Primitive::Char) => r.include_char || r.max > CHAR_CAPACITY,
                Self::Primitive(p) if p == r.high_primitive() => true,
                Self::Primitive(p) => p.interval_capacity().is_some_and(|c| c >= r.min),
                Self::Integral(o) => o.max >= r.min,
                _ => false,
            },
            Self::ExcludingBoolean => self.cast_impl(other, store, false).is_some(),
            Self::AnyObject => other.is_reference(),
            Self::Class(_) => matches!(other, Self::Class(_) | Self::AnyObject),
            Self::Array(id) => match other {
                Self::AnyObject => true,
                Self::Class(c) => store.is_object(c),
                Self::Array(other_id) => {
                    let a = store.array(id);
                    let b = store.array(other_id);
                    if a.nesting == b.nesting {
                        a.member.is_subtype_of(b.member, store)
                    } else {
                        // int[][] is a subtype of Object[] by stripping levels
                        a.nesting > b.nesting
                            && match b.member {
                                Self::Any | Self::AnyObject => true,
                                Self::Class(c) => store.is_object(c),
                                _ => false,
                            }
                    }
                }
                _ => false,
            },
            Self::TypeVariable(_) | Self::Wildcard | Self::WildcardExtends(_) | Self::WildcardSuper(_) => {
                other.is_reference() || matches!(other, Self::AnyObject)
            }
            Self::Any => true,
        }
    }

    /// Narrows `self` toward `other`. Returns `None` when the types are
    /// incompatible.
    pub fn cast(self, other: Self, store: &TypeStore) -> Option<Self> {
        self.cast_inner(other, store, false)
    }

    /// Unifies `self` with `other`, preferring the wider of the two. Used
    /// to type binary operators.
    pub fn cast_to_widest(self, other: Self, store: &TypeStore) -> Option<Self> {
        self.cast_inner(other, store, true)
    }

    /// Destination-driven narrowing: `other` is the sink type (a store
    /// into a typed local, a declared argument).
    pub fn reversed_cast(self, other: Self, store: &TypeStore) -> Option<Self> {
        if self == other {
            return Some(self);
        }
        match self {
            Self::Integral(r) => interval_reversed_cast(r, other, false).or_else(|| self.cast(other, store)),
            _ => self.cast(other, store),
        }
    }

    /// Destination-driven unification preferring the wider type.
    pub fn reversed_cast_to_widest(self, other: Self, store: &TypeStore) -> Option<Self> {
        if self == other {
            return Some(self);
        }
        match self {
            Self::Integral(r) => interval_reversed_cast(r, other, true).or_else(|| self.cast_to_widest(other, store)),
            _ => self.cast_to_widest(other, store),
        }
    }

    fn cast_inner(self, other: Self, store: &TypeStore, widest: bool) -> Option<Self> {
        if self == other {
            return Some(self);
        }
        if let Some(t) = self.cast_impl(other, store, widest) {
            return Some(t);
        }
        if self.can_reverse_cast(other) {
            if let Some(t) = other.reversed_cast_impl(self, store, widest) {
                return Some(t);
            }
        }
        None
    }

    /// Primitives only reverse-cast through inference placeholders.
    fn can_reverse_cast(self, other: Self) -> bool {
        match self {
            Self::Primitive(_) => other.is_special(),
            _ => true,
        }
    }

    fn cast_impl(self, other: Self, store: &TypeStore, widest: bool) -> Option<Self> {
        match self {
            Self::Primitive(p) => {
                if let Self::Primitive(q) = other {
                    if primitive_subtype(p, q) {
                        return Some(if widest { other } else { self });
                    }
                }
                None
            }
            Self::Integral(r) => interval_cast(r, other, widest),
            Self::ExcludingBoolean => match other {
                Self::Integral(o) => {
                    if o.include_boolean {
                        IntegralRange::get_instance(o.min, o.max, false, o.include_char).map(Self::Integral)
                    } else {
                        Some(other)
                    }
                }
                Self::Primitive(Primitive::Boolean) => None,
                _ => Some(other),
            },
            Self::Any => Some(if widest {
                match other {
                    Self::Primitive(p) => p.to_variable_capacity(),
                    _ => other,
                }
            } else {
                other
            }),
            Self::AnyObject => (other.is_reference() || matches!(other, Self::AnyObject)).then_some(other),
            Self::Class(_) | Self::Array(_) | Self::TypeVariable(_) | Self::Wildcard | Self::WildcardExtends(_)
            | Self::WildcardSuper(_) => self.is_subtype_of(other, store).then_some(self),
        }
    }

    fn reversed_cast_impl(self, other: Self, store: &TypeStore, widest: bool) -> Option<Self> {
        match self {
            Self::Integral(r) => interval_reversed_cast(r, other, widest),
            Self::Any => Some(other),
            _ => self.cast_impl(other, store, widest),
        }
    }

    /// Whether assigning a value of type `self` to a slot of type `other`
    /// needs an explicit source-level cast.
    pub fn implicit_cast_status(self, other: Self, store: &TypeStore) -> CastStatus {
        if self == other {
            return CastStatus::Same;
        }
        match (self, other) {
            (Self::Primitive(p), Self::Primitive(q)) => primitive_cast_status(p, q),
            (Self::Integral(r), _) => {
                if Self::Integral(r).is_subtype_of(other, store) {
                    CastStatus::Extend
                } else {
                    Self::Primitive(r.high_primitive()).implicit_cast_status(other, store)
                }
            }
            (_, Self::Integral(r)) => self.implicit_cast_status(Self::Primitive(r.high_primitive()), store),
            (a, b) if a.is_primitive() != b.is_primitive() => CastStatus::Incompatible,
            (a, b) => {
                if a.is_subtype_of(b, store) {
                    CastStatus::Extend
                } else if b.is_subtype_of(a, store) {
                    CastStatus::Narrow
                } else {
                    CastStatus::Incompatible
                }
            }
        }
    }
}

fn primitive_subtype(p: Primitive, q: Primitive) -> bool {
    use Primitive::{Byte, Char, Int, Short};
    p == q
        || match p {
            Byte => matches!(q, Short | Int),
            Short => q == Int,
            Char => q == Int,
            _ => false,
        }
}

fn primitive_cast_status(p: Primitive, q: Primitive) -> CastStatus {
    use Primitive::{Boolean, Byte, Char, Double, Float, Int, Long, Short, Void};
    if p == q {
        return CastStatus::Same;
    }
    if p == Void || q == Void || p == Boolean || q == Boolean {
        return CastStatus::Incompatible;
    }
    let widens = match p {
        Byte => matches!(q, Short | Int | Long | Float | Double),
        Short | Char => matches!(q, Int | Long | Float | Double),
        Int => matches!(q, Long | Float | Double),
        Long => matches!(q, Float | Double),
        Float => q == Double,
        _ => false,
    };
    if widens {
        CastStatus::Extend
    } else if p == Byte && q == Char {
        CastStatus::NarrowExtend
    } else {
        CastStatus::Narrow
    }
}

/// `cast` / `cast_to_widest` over a capacity interval.
fn interval_cast(r: IntegralRange, other: Type, widest: bool) -> Option<Type> {
    if let Type::Primitive(p) = other {
        if p == Primitive::Boolean {
            return r.include_boolean.then_some(other);
        }
        if p == r.high_primitive() {
            return Some(if widest { Type::Integral(r) } else { other });
        }
        if p == Primitive::Char {
            return r.include_char.then_some(other);
        }
        if let Some(c) = p.interval_capacity() {
            if c == r.min || c == r.max {
                return Some(if widest { Type::Integral(r) } else { other });
            }
            if c > r.min {
                return IntegralRange::get_instance(r.min, c.min(r.max), false, r.include_char && c > CHAR_CAPACITY)
                    .map(Type::Integral);
            }
        }
        return None;
    }
    if let Type::Integral(o) = other {
        return IntegralRange::get_instance(
            r.min,
            r.max.min(o.max),
            r.include_boolean && o.include_boolean,
            r.include_char && o.include_char,
        )
        .map(Type::Integral);
    }
    None
}

/// `reversed_cast` over a capacity interval: the other type is the sink.
fn interval_reversed_cast(r: IntegralRange, other: Type, widest: bool) -> Option<Type> {
    if let Type::Primitive(p) = other {
        if p == Primitive::Boolean {
            return r.include_boolean.then_some(other);
        }
        if p == r.high_primitive() {
            return Some(if widest { Type::Integral(r) } else { other });
        }
        if p == Primitive::Char {
            return if r.include_char || r.max > CHAR_CAPACITY {
                if widest {
                    IntegralRange::get_instance(CHAR_CAPACITY * 2, r.max, false, r.include_char).map(Type::Integral)
                } else {
                    Some(other)
                }
            } else {
                None
            };
        }
        if let Some(c) = p.interval_capacity() {
            if if widest { c <= r.min } else { c >= r.max } {
                return Some(Type::Integral(r));
            }
            if if widest { c <= r.max } else { c >= r.min } {
                return if widest {
                    IntegralRange::get_instance(r.min.max(c), c, false, r.include_char).map(Type::Integral)
                } else {
                    IntegralRange::get_instance(c, r.max.min(c), false, r.include_char).map(Type::Integral)
                };
            }
        }
        return None;
    }
    if let Type::Integral(o) = other {
        return interval_cast(o, Type::Integral(r), false);
    }
    None
}

/// Source-level name of a type, used in declarations and casts.
///
/// `java.lang` classes print by their nested simple name; everything else
/// by its qualified name. An unresolved interval prints as its widest
/// candidate.
pub fn source_name(ty: Type, store: &TypeStore) -> String {
    match ty {
        Type::Primitive(p) => p.name().to_owned(),
        Type::Integral(r) => r.high_primitive().name().to_owned(),
        Type::ExcludingBoolean | Type::Any | Type::AnyObject => "java.lang.Object".to_owned(),
        Type::Class(id) => {
            let class = store.class(id);
            let base = if class.package == "java.lang" {
                class.full_simple_name.clone()
            } else {
                class.name.clone()
            };
            if class.parameters.is_empty() {
                base
            } else {
                let args: Vec<String> = class.parameters.iter().map(|&p| source_name(p, store)).collect();
                format!("{base}<{}>", args.join(", "))
            }
        }
        Type::Array(id) => {
            let array = store.array(id);
            format!("{}{}", source_name(array.member, store), "[]".repeat(array.nesting as usize))
        }
        Type::TypeVariable(id) => store.type_var_name(id).to_owned(),
        Type::Wildcard => "?".to_owned(),
        Type::WildcardExtends(id) => format!("? extends {}", source_name(store.bound(id), store)),
        Type::WildcardSuper(id) => format!("? super {}", source_name(store.bound(id), store)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_is_reflexive() {
        let store = TypeStore::new();
        for ty in [Type::INT, Type::BOOLEAN, Type::Integral(ANY_INT), Type::Any, Type::AnyObject] {
            assert!(ty.is_subtype_of(ty, &store));
        }
    }

    #[test]
    fn test_integral_widening_order() {
        let store = TypeStore::new();
        assert!(Type::BYTE.is_subtype_of(Type::SHORT, &store));
        assert!(Type::BYTE.is_subtype_of(Type::INT, &store));
        assert!(Type::SHORT.is_subtype_of(Type::INT, &store));
        assert!(Type::CHAR.is_subtype_of(Type::INT, &store));
        assert!(!Type::INT.is_subtype_of(Type::SHORT, &store));
        assert!(!Type::CHAR.is_subtype_of(Type::SHORT, &store));
    }

    #[test]
    fn test_void_is_incomparable() {
        let store = TypeStore::new();
        assert!(!Type::VOID.is_subtype_of(Type::INT, &store));
        assert!(!Type::INT.is_subtype_of(Type::VOID, &store));
        assert!(Type::VOID.is_subtype_of(Type::VOID, &store));
    }

    #[test]
    fn test_any_is_top() {
        let store = TypeStore::new();
        assert!(Type::INT.is_subtype_of(Type::Any, &store));
        assert!(Type::AnyObject.is_subtype_of(Type::Any, &store));
    }

    #[test]
    fn test_subtype_implies_cast_succeeds() {
        let mut store = TypeStore::new();
        let string = store.string();
        let ints = store.intern_array(Type::INT, 1);
        let cases = [
            (Type::BYTE, Type::INT),
            (Type::Integral(ANY_INT_OR_BOOLEAN), Type::BOOLEAN),
            (Type::Integral(ANY_INT), Type::SHORT),
            (string, store.object()),
            (ints, store.object()),
            (Type::AnyObject, string),
        ];
        for (a, b) in cases {
            assert!(a.is_subtype_of(b, &store), "{a:?} should be a subtype of {b:?}");
            assert!(a.cast(b, &store).is_some(), "{a:?} should cast to {b:?}");
        }
    }

    #[test]
    fn test_interval_narrowing_is_monotone() {
        let store = TypeStore::new();
        let start = Type::Integral(ANY_INT_OR_BOOLEAN);
        let narrowed = start.cast(Type::Integral(SHORT_OR_INT), &store).unwrap();
        let Type::Integral(r) = narrowed else {
            panic!("expected interval")
        };
        assert!(r.min >= ANY_INT_OR_BOOLEAN.min && r.max <= ANY_INT_OR_BOOLEAN.max);
        assert!(!r.include_boolean);
        match narrowed.cast(Type::SHORT, &store).unwrap() {
            Type::Integral(narrower) => {
                assert!(narrower.max <= 2, "interval should shrink toward short");
                assert!(!narrower.include_boolean);
            }
            other => panic!("unexpected narrowing result {other:?}"),
        }
    }

    #[test]
    fn test_interval_rejects_excluded_boolean() {
        let store = TypeStore::new();
        assert_eq!(Type::Integral(ANY_INT).cast(Type::BOOLEAN, &store), None);
        assert_eq!(Type::Integral(ANY_INT_OR_BOOLEAN).cast(Type::BOOLEAN, &store), Some(Type::BOOLEAN));
    }

    #[test]
    fn test_interval_intersection() {
        let store = TypeStore::new();
        let a = Type::Integral(ANY_INT_OR_BOOLEAN);
        let b = Type::Integral(CHAR_OR_SHORT_OR_INT);
        match a.cast(b, &store) {
            Some(Type::Integral(r)) => {
                assert_eq!((r.min, r.max), (1, 4));
                assert!(!r.include_boolean);
                assert!(r.include_char);
            }
            other => panic!("unexpected intersection {other:?}"),
        }
    }

    #[test]
    fn test_concrete_int_casts_through_interval() {
        let store = TypeStore::new();
        assert_eq!(Type::INT.cast(Type::Integral(ANY_INT), &store), Some(Type::INT));
        assert_eq!(Type::INT.cast(Type::Integral(CHAR_OR_INT), &store), Some(Type::INT));
        assert_eq!(Type::LONG.cast(Type::Integral(ANY_INT), &store), None);
    }

    #[test]
    fn test_cast_to_widest_prefers_wider() {
        let store = TypeStore::new();
        assert_eq!(Type::BYTE.cast_to_widest(Type::INT, &store), Some(Type::INT));
        assert_eq!(
            Type::Integral(ANY_INT_OR_BOOLEAN).cast_to_widest(Type::INT, &store),
            Some(Type::Integral(ANY_INT_OR_BOOLEAN))
        );
    }

    #[test]
    fn test_excluding_boolean_strips_flag() {
        let store = TypeStore::new();
        match Type::ExcludingBoolean.cast(Type::Integral(ANY_INT_OR_BOOLEAN), &store) {
            Some(Type::Integral(r)) => assert!(!r.include_boolean),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(Type::ExcludingBoolean.cast(Type::BOOLEAN, &store), None);
    }

    #[test]
    fn test_array_covariance() {
        let mut store = TypeStore::new();
        let string = store.string();
        let strings = store.intern_array(string, 1);
        let objects = store.intern_array(store.object(), 1);
        assert!(strings.is_subtype_of(objects, &store));
        assert!(!objects.is_subtype_of(strings, &store));
        let nested_ints = store.intern_array(Type::INT, 2);
        assert!(nested_ints.is_subtype_of(objects, &store));
    }

    #[test]
    fn test_implicit_cast_status() {
        let store = TypeStore::new();
        assert_eq!(Type::INT.implicit_cast_status(Type::INT, &store), CastStatus::Same);
        assert_eq!(Type::INT.implicit_cast_status(Type::LONG, &store), CastStatus::Extend);
        assert_eq!(Type::LONG.implicit_cast_status(Type::INT, &store), CastStatus::Narrow);
        assert_eq!(Type::BYTE.implicit_cast_status(Type::CHAR, &store), CastStatus::NarrowExtend);
        assert_eq!(Type::BOOLEAN.implicit_cast_status(Type::INT, &store), CastStatus::Incompatible);
    }

    #[test]
    fn test_source_names() {
        let mut store = TypeStore::new();
        assert_eq!(source_name(Type::INT, &store), "int");
        assert_eq!(source_name(store.string(), &store), "String");
        let list = store.intern_class("java/util/List").unwrap();
        assert_eq!(source_name(Type::Class(list), &store), "java.util.List");
        let ints = store.intern_array(Type::INT, 2);
        assert_eq!(source_name(ints, &store), "int[][]");
        assert_eq!(source_name(Type::Integral(ANY_INT), &store), "int");
    }
}
