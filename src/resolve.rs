//! Type resolution: peeling `Option`, pointer and sequence layers off values
//! and shapes to find the record underneath.

use facet_core::{Def, KnownPointer, PointerDef, Shape, Type, UserType};
use facet_reflect::Peek;

use crate::{CopyError, CopyErrorKind};

/// Whether `shape` is a record, i.e. a struct whose fields are copied one by
/// one. Transparent wrappers count as their inner value instead.
pub(crate) fn is_record(shape: &Shape) -> bool {
    matches!(shape.ty, Type::User(UserType::Struct(_))) && shape.inner.is_none()
}

/// Whether `shape` is something a source can be iterated as.
pub(crate) fn is_sequence(shape: &Shape) -> bool {
    matches!(shape.def, Def::List(_) | Def::Array(_) | Def::Slice(_))
}

fn is_box(def: &PointerDef) -> bool {
    def.known == Some(KnownPointer::Box)
}

/// Strips `Option`, pointer and sequence layers from a shape.
pub(crate) fn element_shape(mut shape: &'static Shape) -> &'static Shape {
    loop {
        shape = match shape.def {
            Def::Option(option_def) => option_def.t(),
            Def::Pointer(pointer_def) => match pointer_def.pointee() {
                Some(pointee) => pointee,
                None => return shape,
            },
            Def::List(list_def) => list_def.t(),
            Def::Array(array_def) => array_def.t(),
            Def::Slice(slice_def) => slice_def.t(),
            _ => return shape,
        };
    }
}

/// Strips the `Option` and `Box` layers a destination slot can be written
/// through.
pub(crate) fn slot_shape(mut shape: &'static Shape) -> &'static Shape {
    loop {
        shape = match shape.def {
            Def::Option(option_def) => option_def.t(),
            Def::Pointer(pointer_def) if is_box(&pointer_def) => match pointer_def.pointee() {
                Some(pointee) => pointee,
                None => return shape,
            },
            _ => return shape,
        };
    }
}

/// Follows `Option` and pointer layers of a value. Returns `None` when an
/// empty option is reached.
pub(crate) fn indirect<'mem, 'facet>(mut peek: Peek<'mem, 'facet>) -> Option<Peek<'mem, 'facet>> {
    loop {
        peek = match peek.shape().def {
            Def::Option(_) => peek.into_option().ok()?.value()?,
            Def::Pointer(_) => peek.into_pointer().ok()?.borrow_inner()?,
            _ => return Some(peek),
        };
    }
}

/// Follows the layers of a destination value down to the slot the copy
/// writes into, failing if that slot cannot be written in place.
pub(crate) fn addressable<'mem, 'facet>(
    mut peek: Peek<'mem, 'facet>,
) -> Result<Peek<'mem, 'facet>, CopyError> {
    loop {
        let shape = peek.shape();
        peek = match shape.def {
            Def::Option(_) => peek
                .into_option()?
                .value()
                .ok_or(CopyErrorKind::Unaddressable(shape))?,
            Def::Pointer(pointer_def) if is_box(&pointer_def) => peek
                .into_pointer()?
                .borrow_inner()
                .ok_or(CopyErrorKind::Unaddressable(shape))?,
            Def::Pointer(_) => return Err(CopyErrorKind::Unaddressable(shape).into()),
            _ => return Ok(peek),
        };
    }
}

/// The contents of an `Option` value, if any.
pub(crate) fn option_value<'mem, 'facet>(peek: Peek<'mem, 'facet>) -> Option<Peek<'mem, 'facet>> {
    peek.into_option().ok()?.value()
}

/// The pointee of a smart pointer value.
pub(crate) fn pointee_value<'mem, 'facet>(
    peek: Peek<'mem, 'facet>,
) -> Option<Peek<'mem, 'facet>> {
    peek.into_pointer().ok()?.borrow_inner()
}

/// Whether `shape` is written through `Partial::begin_smart_ptr`.
pub(crate) fn is_box_shape(shape: &Shape) -> bool {
    match shape.def {
        Def::Pointer(pointer_def) => is_box(&pointer_def),
        _ => false,
    }
}

/// Walks a path of struct field indices down from `peek`.
pub(crate) fn field_at<'mem, 'facet>(
    mut peek: Peek<'mem, 'facet>,
    path: &[usize],
) -> Option<Peek<'mem, 'facet>> {
    for &index in path {
        peek = peek.into_struct().ok()?.field(index).ok()?;
    }
    Some(peek)
}
