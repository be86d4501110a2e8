//! Values of the old destination moved into the one being built.
//!
//! A kept value that can be neither cloned nor defaulted is moved bitwise out
//! of the old destination. Once the new value has been swapped in, the old one
//! is dropped piece by piece, skipping everything that was moved out. Moves
//! only ever come from places the old value owns inline or through a `Box`:
//! struct fields, `Option` contents and `Box` pointees.

use std::{alloc::dealloc, cell::RefCell, mem::ManuallyDrop};

use facet_core::{Def, Facet, PtrConst, PtrMut, Shape, Type, UserType};
use facet_reflect::{Partial, Peek, ReflectError};

use crate::{
    CopyError,
    resolve::{is_box_shape, option_value, pointee_value},
};

type Taken = (usize, &'static Shape);

#[derive(Default)]
pub(crate) struct Moves {
    taken: RefCell<Vec<Taken>>,
}

impl Moves {
    /// Moves `value` into the slot `partial` is positioned at, which must have
    /// the same shape.
    pub(crate) fn take(
        &self,
        partial: &mut Partial<'static>,
        value: Peek<'_, 'static>,
    ) -> Result<(), CopyError> {
        let shape = value.shape();
        let source = value.data().thin().ok_or(ReflectError::Unsized {
            shape,
            operation: "moving a kept value",
        })?;
        log::trace!("Moving kept {shape} into {}", partial.path());
        partial.set_from_function(|target| {
            // SAFETY: both sides hold a `shape`, and the old copy is never
            // dropped (see `release`).
            unsafe { target.copy_from(source, shape) }.map_err(|_| ReflectError::Unsized {
                shape,
                operation: "moving a kept value",
            })?;
            Ok(())
        })?;
        self.taken
            .borrow_mut()
            .push((source.as_byte_ptr() as usize, shape));
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.taken.borrow().is_empty()
    }

    /// Disposes of a half-built value after a failed copy. If anything was
    /// moved into it, it is leaked rather than dropped, since the old
    /// destination still owns those values.
    pub(crate) fn abandon<T>(&self, building: T) {
        if !self.is_empty() {
            log::trace!("Leaking a partially built value that holds moved parts");
            std::mem::forget(building);
        }
    }

    /// Drops `old`, the previous destination value, except for the parts
    /// moved out of it. Moves were recorded while it lived at `was_at`.
    pub(crate) fn release<D: Facet<'static>>(&self, old: D, was_at: *const D) {
        if self.is_empty() {
            drop(old);
            return;
        }
        let mut old = ManuallyDrop::new(old);
        let now_at = &mut *old as *mut D;

        // Inline parts moved along with the value; heap parts stayed put.
        let from = was_at as usize;
        let to = now_at as usize;
        let size = size_of::<D>();
        let taken: Vec<Taken> = self
            .taken
            .borrow()
            .iter()
            .map(|&(addr, shape)| {
                if (from..from + size).contains(&addr) {
                    (addr - from + to, shape)
                } else {
                    (addr, shape)
                }
            })
            .collect();

        // SAFETY: `old` is never used again and `taken` lists exactly the
        // parts now owned by the new value.
        unsafe { drop_except(Peek::unchecked_new(PtrConst::new(now_at), D::SHAPE), &taken) }
    }
}

/// Whether `peek`, or anything it owns inline or through a `Box`, was moved.
fn holds_taken(peek: Peek<'_, 'static>, taken: &[Taken]) -> bool {
    let Some(data) = peek.data().thin() else {
        return false;
    };
    if taken.contains(&(data.as_byte_ptr() as usize, peek.shape())) {
        return true;
    }
    match peek.shape().def {
        Def::Option(_) => option_value(peek).is_some_and(|inner| holds_taken(inner, taken)),
        Def::Pointer(_) if is_box_shape(peek.shape()) => {
            pointee_value(peek).is_some_and(|inner| holds_taken(inner, taken))
        }
        _ => match peek.into_struct() {
            Ok(record) => (0..record.field_count())
                .filter_map(|index| record.field(index).ok())
                .any(|field| holds_taken(field, taken)),
            Err(_) => false,
        },
    }
}

/// # Safety
///
/// `peek` must point at an initialized value that nothing drops afterwards.
unsafe fn drop_except(peek: Peek<'_, 'static>, taken: &[Taken]) {
    let shape = peek.shape();
    let Some(data) = peek.data().thin() else {
        return;
    };
    if !holds_taken(peek, taken) {
        if let Some(drop_fn) = shape.vtable.sized().and_then(|v| (v.drop_in_place)()) {
            unsafe { drop_fn(PtrMut::new(data.as_byte_ptr() as *mut u8)) };
        }
        return;
    }
    if taken.contains(&(data.as_byte_ptr() as usize, shape)) {
        return;
    }

    match (shape.def, shape.ty) {
        (Def::Option(_), _) => {
            if let Some(inner) = option_value(peek) {
                unsafe { drop_except(inner, taken) };
            }
        }
        (Def::Pointer(_), _) => {
            let Some(pointee) = pointee_value(peek) else {
                return;
            };
            unsafe { drop_except(pointee, taken) };
            free_box(pointee);
        }
        (_, Type::User(UserType::Struct(_))) => {
            if let Ok(record) = peek.into_struct() {
                for index in 0..record.field_count() {
                    if let Ok(field) = record.field(index) {
                        unsafe { drop_except(field, taken) };
                    }
                }
            }
        }
        _ => {}
    }
}

/// Frees the allocation of a `Box` whose pointee was already dropped.
fn free_box(pointee: Peek<'_, 'static>) {
    let (Some(data), Ok(layout)) = (pointee.data().thin(), pointee.shape().layout.sized_layout())
    else {
        return;
    };
    if layout.size() > 0 {
        // SAFETY: the pointee was allocated by `Box` with this layout.
        unsafe { dealloc(data.as_byte_ptr() as *mut u8, layout) };
    }
}
