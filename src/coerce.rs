//! Value coercion: writing one leaf value into one destination slot.
//!
//! Coercion is planned against shapes before anything is written, so a slot
//! the plan declines is left untouched for the caller to handle.

use std::borrow::Cow;

use facet_core::{
    CloneIntoFn, Def, Facet, NumericType, PrimitiveType, Shape, ShapeLayout, Type, UserType,
};
use facet_reflect::{Partial, Peek, ReflectError, ScalarType};

use crate::{
    CopyError, CopyErrorKind,
    moves::Moves,
    resolve::{is_box_shape, is_record, option_value, pointee_value},
};

type Result<T> = std::result::Result<T, CopyError>;

/// How a source value ends up in a destination slot.
pub(crate) enum Coercion<'mem> {
    /// Set an optional slot to `None`.
    Clear,
    /// Leave the slot as it was.
    Keep,
    /// Identical shapes, copy the value across.
    Clone(Peek<'mem, 'static>),
    /// Numeric conversion into the slot's numeric type.
    Number(Number),
    /// Owned string built from borrowed text.
    Text(String),
    /// Decode text with the slot type's `FromStr` implementation.
    Parse(String),
    /// Fill `Some` of an optional slot.
    Optional(Box<Coercion<'mem>>),
    /// Fill the pointee of a `Box` slot.
    Boxed(Box<Coercion<'mem>>),
    /// Fill the inner value of a wrapper, running its fallible conversion
    /// when it has one.
    Inner(Box<Coercion<'mem>>),
}

/// Plans how `value` is written into a slot of shape `dest`.
///
/// Returns `None` when the value is a record (the caller copies it field by
/// field) or when there is no way to write it.
pub(crate) fn plan<'mem>(dest: &'static Shape, value: Peek<'mem, 'static>) -> Option<Coercion<'mem>> {
    let source = value.shape();
    if is_record(source) {
        return None;
    }

    if let Def::Option(option_def) = dest.def {
        if matches!(source.def, Def::Option(_)) && option_value(value).is_none() {
            return Some(Coercion::Clear);
        }
        return plan(option_def.t(), value).map(|inner| Coercion::Optional(Box::new(inner)));
    }
    if let Def::Pointer(pointer_def) = dest.def {
        if is_box_shape(dest) {
            let pointee = pointer_def.pointee()?;
            return plan(pointee, value).map(|inner| Coercion::Boxed(Box::new(inner)));
        }
    }

    if source == dest && can_replicate(source, &mut Vec::new()) {
        return Some(Coercion::Clone(value));
    }
    if is_numeric(dest) {
        if let Some(number) = Number::read(value) {
            return Some(Coercion::Number(number));
        }
    }
    if let Some(text) = text(value) {
        if dest == String::SHAPE {
            return Some(Coercion::Text(text));
        }
        if parses(dest) {
            return Some(Coercion::Parse(text));
        }
    }
    if let Some(inner) = dest.inner {
        if let Some(coercion) = plan(inner(), value) {
            return Some(Coercion::Inner(Box::new(coercion)));
        }
    }

    match source.def {
        Def::Option(_) => match option_value(value) {
            Some(inner) => plan(dest, inner),
            None => Some(Coercion::Keep),
        },
        Def::Pointer(_) => plan(dest, pointee_value(value)?),
        _ if source.inner.is_some() => {
            let inner = value.innermost_peek();
            if inner.shape() == source {
                return None;
            }
            plan(dest, inner)
        }
        _ => None,
    }
}

/// Tries to write `value` into the slot `partial` is positioned at.
///
/// Returns `Ok(false)`, without touching the slot, when the value cannot be
/// coerced. Errors only come from the reflection layer or a failed decode.
pub(crate) fn try_set(
    partial: &mut Partial<'static>,
    prior: Option<Peek<'_, 'static>>,
    value: Peek<'_, 'static>,
    moves: &Moves,
) -> Result<bool> {
    let Some(coercion) = plan(partial.shape(), value) else {
        log::trace!("No coercion from {} into {}", value.shape(), partial.path());
        return Ok(false);
    };
    apply(partial, prior, coercion, moves)?;
    Ok(true)
}

fn apply(
    partial: &mut Partial<'static>,
    prior: Option<Peek<'_, 'static>>,
    coercion: Coercion<'_>,
    moves: &Moves,
) -> Result<()> {
    match coercion {
        Coercion::Clear => {
            partial.set_default()?;
        }
        Coercion::Keep => retain(partial, prior, moves)?,
        Coercion::Clone(value) => replicate(partial, value)?,
        Coercion::Number(number) => number.write(partial)?,
        Coercion::Text(text) => {
            partial.set(text)?;
        }
        Coercion::Parse(text) => {
            let path = partial.path().to_string();
            log::trace!("Parsing {text:?} into {path}");
            partial
                .parse_from_str(&text)
                .map_err(|error| CopyErrorKind::Decode { path, error })?;
        }
        Coercion::Optional(inner) => {
            let prior = prior.and_then(option_value);
            partial.begin_some()?;
            apply(partial, prior, *inner, moves)?;
            partial.end()?;
        }
        Coercion::Boxed(inner) => {
            let prior = prior.and_then(pointee_value);
            partial.begin_smart_ptr()?;
            apply(partial, prior, *inner, moves)?;
            partial.end()?;
        }
        Coercion::Inner(inner) => {
            let path = partial.path().to_string();
            partial.begin_inner()?;
            apply(partial, None, *inner, moves)?;
            // Ending the inner frame runs the wrapper's conversion.
            partial
                .end()
                .map_err(|error| CopyErrorKind::Decode { path, error })?;
        }
    }
    Ok(())
}

/// Writes the slot's previous value back, or its zero value if it had none.
///
/// Values that cannot be replicated are moved out of the old destination.
pub(crate) fn retain(
    partial: &mut Partial<'static>,
    prior: Option<Peek<'_, 'static>>,
    moves: &Moves,
) -> Result<()> {
    match prior {
        Some(prior) if can_replicate(prior.shape(), &mut Vec::new()) => replicate(partial, prior),
        Some(prior) => moves.take(partial, prior),
        None => zero(partial),
    }
}

/// Writes a copy of `value` into the slot `partial` is positioned at, which
/// must have the same shape.
///
/// Uses the type's clone function where it has one. `Option`, `Box`, lists
/// and structs without one are copied part by part; check [`can_replicate`]
/// first.
pub(crate) fn replicate(partial: &mut Partial<'static>, value: Peek<'_, 'static>) -> Result<()> {
    let shape = value.shape();
    if let (Some(clone_fn), Some(source)) = (cloner(shape), value.data().thin()) {
        partial.set_from_function(|target| {
            // SAFETY: `source` holds a `shape` and `target` is an
            // uninitialized slot of the same shape.
            unsafe { clone_fn(source, target) };
            Ok(())
        })?;
        return Ok(());
    }

    match shape.def {
        Def::Option(_) => match option_value(value) {
            Some(inner) => {
                partial.begin_some()?;
                replicate(partial, inner)?;
                partial.end()?;
            }
            None => {
                partial.set_default()?;
            }
        },
        Def::Pointer(_) => {
            let pointee = pointee_value(value).ok_or(ReflectError::OperationFailed {
                shape,
                operation: "pointer has no pointee to copy",
            })?;
            partial.begin_smart_ptr()?;
            replicate(partial, pointee)?;
            partial.end()?;
        }
        Def::List(_) => {
            partial.begin_list()?;
            for item in value.into_list_like()?.iter() {
                partial.begin_list_item()?;
                replicate(partial, item)?;
                partial.end()?;
            }
        }
        _ => {
            let record = value.into_struct()?;
            for index in 0..record.field_count() {
                if let Ok(field) = record.field(index) {
                    partial.begin_nth_field(index)?;
                    replicate(partial, field)?;
                    partial.end()?;
                }
            }
        }
    }
    Ok(())
}

/// Whether [`replicate`] can copy a value of `shape`. `seen` holds the shapes
/// being checked further up, so recursive types terminate.
pub(crate) fn can_replicate(shape: &'static Shape, seen: &mut Vec<&'static Shape>) -> bool {
    if cloner(shape).is_some() || seen.contains(&shape) {
        return true;
    }
    seen.push(shape);
    let result = match (shape.def, shape.ty) {
        (Def::Option(option_def), _) => can_replicate(option_def.t(), seen),
        (Def::Pointer(pointer_def), _) if is_box_shape(shape) => pointer_def
            .pointee()
            .is_some_and(|pointee| can_replicate(pointee, seen)),
        (Def::List(list_def), _) => can_replicate(list_def.t(), seen),
        (Def::Scalar, _) => false,
        (_, Type::User(UserType::Struct(struct_type))) => struct_type
            .fields
            .iter()
            .all(|field| can_replicate(field.shape, seen)),
        _ => false,
    };
    seen.pop();
    result
}

fn cloner(shape: &Shape) -> Option<CloneIntoFn> {
    if is_opaque_field(shape) {
        return None;
    }
    shape.vtable.sized().and_then(|v| (v.clone_into)())
}

/// `#[facet(opaque)]` fields carry the vtable of `()`, which neither clones
/// nor defaults the real value.
fn is_opaque_field(shape: &Shape) -> bool {
    matches!(shape.ty, Type::User(UserType::Opaque)) && shape.type_identifier == "Opaque"
}

/// Writes the zero value of the slot's type: its `Default`, or for boxes and
/// records without one, the zero value of what they hold.
pub(crate) fn zero(partial: &mut Partial<'static>) -> Result<()> {
    let shape = partial.shape();
    if !has_default(shape) {
        if is_box_shape(shape) {
            partial.begin_smart_ptr()?;
            zero(partial)?;
            partial.end()?;
            return Ok(());
        }
        if let Type::User(UserType::Struct(struct_type)) = shape.ty {
            if is_record(shape) {
                for index in 0..struct_type.fields.len() {
                    partial.begin_nth_field(index)?;
                    zero(partial)?;
                    partial.end()?;
                }
                return Ok(());
            }
        }
    }
    partial.set_default()?;
    Ok(())
}

/// Whether [`zero`] can build a value of `shape`.
pub(crate) fn can_zero(shape: &'static Shape) -> bool {
    if has_default(shape) {
        return true;
    }
    match (shape.def, shape.ty) {
        (Def::Pointer(pointer_def), _) if is_box_shape(shape) => {
            pointer_def.pointee().is_some_and(can_zero)
        }
        (_, Type::User(UserType::Struct(struct_type))) if is_record(shape) => {
            struct_type.fields.iter().all(|field| can_zero(field.shape))
        }
        _ => false,
    }
}

fn has_default(shape: &Shape) -> bool {
    // Scalar wrappers such as `NonZero` share their inner type's vtable, whose
    // default is not a valid wrapper value.
    if (matches!(shape.def, Def::Scalar) && shape.inner.is_some()) || is_opaque_field(shape) {
        return false;
    }
    shape.vtable.sized().and_then(|v| (v.default_in_place)()).is_some()
}

fn is_numeric(shape: &Shape) -> bool {
    matches!(shape.ty, Type::Primitive(PrimitiveType::Numeric(_)))
}

fn text(value: Peek<'_, 'static>) -> Option<String> {
    if let Ok(s) = value.get::<String>() {
        return Some(s.clone());
    }
    if let Ok(s) = value.get::<&'static str>() {
        return Some((*s).to_owned());
    }
    if let Ok(s) = value.get::<Cow<'static, str>>() {
        return Some(s.to_string());
    }
    None
}

/// Opaque scalars other than `String` that can be parsed from text.
fn parses(shape: &Shape) -> bool {
    shape != String::SHAPE
        && matches!(shape.def, Def::Scalar)
        && matches!(shape.ty, Type::User(UserType::Opaque))
        && shape.vtable.has_parse()
}

/// A numeric value read out of any integer or float type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Signed(i128),
    Unsigned(u128),
    Float(f64),
}

impl Number {
    pub(crate) fn read(peek: Peek<'_, 'static>) -> Option<Self> {
        Some(match peek.scalar_type()? {
            ScalarType::I8 => Number::Signed(*peek.get::<i8>().ok()? as i128),
            ScalarType::I16 => Number::Signed(*peek.get::<i16>().ok()? as i128),
            ScalarType::I32 => Number::Signed(*peek.get::<i32>().ok()? as i128),
            ScalarType::I64 => Number::Signed(*peek.get::<i64>().ok()? as i128),
            ScalarType::I128 => Number::Signed(*peek.get::<i128>().ok()?),
            ScalarType::ISize => Number::Signed(*peek.get::<isize>().ok()? as i128),

            ScalarType::U8 => Number::Unsigned(*peek.get::<u8>().ok()? as u128),
            ScalarType::U16 => Number::Unsigned(*peek.get::<u16>().ok()? as u128),
            ScalarType::U32 => Number::Unsigned(*peek.get::<u32>().ok()? as u128),
            ScalarType::U64 => Number::Unsigned(*peek.get::<u64>().ok()? as u128),
            ScalarType::U128 => Number::Unsigned(*peek.get::<u128>().ok()?),
            ScalarType::USize => Number::Unsigned(*peek.get::<usize>().ok()? as u128),

            ScalarType::F32 => Number::Float(*peek.get::<f32>().ok()? as f64),
            ScalarType::F64 => Number::Float(*peek.get::<f64>().ok()?),

            _ => return None,
        })
    }

    fn signed(self) -> i128 {
        match self {
            Number::Signed(v) => v,
            Number::Unsigned(v) => v as i128,
            Number::Float(v) => v as i128,
        }
    }

    fn unsigned(self) -> u128 {
        match self {
            Number::Signed(v) => v as u128,
            Number::Unsigned(v) => v,
            Number::Float(v) => v as u128,
        }
    }

    fn float(self) -> f64 {
        match self {
            Number::Signed(v) => v as f64,
            Number::Unsigned(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// Writes the number with `as` semantics into the numeric slot `partial`
    /// is positioned at.
    pub(crate) fn write(self, partial: &mut Partial<'static>) -> Result<()> {
        let shape = partial.shape();
        // Pointer-sized integers share a layout with fixed-width ones, so
        // they are told apart by shape.
        if shape == usize::SHAPE {
            partial.set(self.unsigned() as usize)?;
            return Ok(());
        }
        if shape == isize::SHAPE {
            partial.set(self.signed() as isize)?;
            return Ok(());
        }

        let size = match shape.layout {
            ShapeLayout::Sized(layout) => layout.size(),
            ShapeLayout::Unsized => 0,
        };
        let Type::Primitive(PrimitiveType::Numeric(ty)) = shape.ty else {
            return Err(ReflectError::OperationFailed {
                shape,
                operation: "expected a numeric type",
            }
            .into());
        };
        match (ty, size) {
            (NumericType::Integer { signed: false }, 1) => partial.set(self.unsigned() as u8)?,
            (NumericType::Integer { signed: false }, 2) => partial.set(self.unsigned() as u16)?,
            (NumericType::Integer { signed: false }, 4) => partial.set(self.unsigned() as u32)?,
            (NumericType::Integer { signed: false }, 8) => partial.set(self.unsigned() as u64)?,
            (NumericType::Integer { signed: false }, 16) => partial.set(self.unsigned())?,
            (NumericType::Integer { signed: true }, 1) => partial.set(self.signed() as i8)?,
            (NumericType::Integer { signed: true }, 2) => partial.set(self.signed() as i16)?,
            (NumericType::Integer { signed: true }, 4) => partial.set(self.signed() as i32)?,
            (NumericType::Integer { signed: true }, 8) => partial.set(self.signed() as i64)?,
            (NumericType::Integer { signed: true }, 16) => partial.set(self.signed())?,
            (NumericType::Float, 4) => partial.set(self.float() as f32)?,
            (NumericType::Float, 8) => partial.set(self.float())?,
            _ => {
                return Err(ReflectError::OperationFailed {
                    shape,
                    operation: "expected an integer or float of a known width",
                }
                .into());
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_numbers_of_every_width() {
        assert_eq!(Number::read(Peek::new(&-3i8)), Some(Number::Signed(-3)));
        assert_eq!(Number::read(Peek::new(&40_000u16)), Some(Number::Unsigned(40_000)));
        assert_eq!(Number::read(Peek::new(&7usize)), Some(Number::Unsigned(7)));
        assert_eq!(Number::read(Peek::new(&1.5f32)), Some(Number::Float(1.5)));
        assert_eq!(Number::read(Peek::new(&true)), None);
    }

    #[test]
    fn conversions_follow_as_casts() {
        assert_eq!(Number::Signed(-1).unsigned() as u8, 255);
        assert_eq!(Number::Float(3.9).signed() as i32, 3);
        assert_eq!(Number::Unsigned(300).unsigned() as u8, 44);
    }

    #[test]
    fn records_are_declined() {
        use facet::Facet;

        #[derive(Facet)]
        struct Point {
            x: i32,
        }
        let point = Point { x: 1 };
        assert!(plan(i32::SHAPE, Peek::new(&point)).is_none());
    }

    #[test]
    fn empty_option_clears_optional_slot() {
        let empty: Option<u8> = None;
        let coercion = plan(<Option<u32>>::SHAPE, Peek::new(&empty));
        assert!(matches!(coercion, Some(Coercion::Clear)));
    }

    #[test]
    fn empty_option_keeps_plain_slot() {
        let empty: Option<u8> = None;
        let coercion = plan(u32::SHAPE, Peek::new(&empty));
        assert!(matches!(coercion, Some(Coercion::Keep)));
    }

    #[test]
    fn borrowed_text_becomes_string() {
        let text: &'static str = "hello";
        let coercion = plan(String::SHAPE, Peek::new(&text));
        assert!(matches!(coercion, Some(Coercion::Text(t)) if t == "hello"));
    }

    #[test]
    fn text_parses_into_opaque_scalars_only() {
        let text = "10.0.0.1".to_string();
        let coercion = plan(<std::net::IpAddr>::SHAPE, Peek::new(&text));
        assert!(matches!(coercion, Some(Coercion::Parse(t)) if t == "10.0.0.1"));

        let digits = "42".to_string();
        assert!(plan(u32::SHAPE, Peek::new(&digits)).is_none());
    }

    #[test]
    fn lists_and_options_replicate_without_clone_functions() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let coercion = plan(<Vec<String>>::SHAPE, Peek::new(&tags));
        assert!(matches!(coercion, Some(Coercion::Clone(_))));

        assert!(can_replicate(<Option<Box<Vec<u8>>>>::SHAPE, &mut Vec::new()));

        #[derive(facet::Facet)]
        struct Link {
            id: u32,
            next: Option<Box<Link>>,
        }
        assert!(can_replicate(Link::SHAPE, &mut Vec::new()));
    }

    #[test]
    fn zero_needs_default_somewhere() {
        #[derive(facet::Facet)]
        struct Peer {
            addr: std::net::IpAddr,
            port: u16,
        }
        assert!(can_zero(<Option<Peer>>::SHAPE));
        assert!(can_zero(String::SHAPE));
        assert!(!can_zero(Peer::SHAPE));
        assert!(!can_zero(<std::num::NonZero<u32>>::SHAPE));
    }
}
